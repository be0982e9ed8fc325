use serde::Serialize;

use super::Color;

/// The format-prefix character, `§`.
pub const FORMAT_PREFIX: char = '\u{00A7}';

/// Colour and style flags shared by a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Style {
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub obfuscated: bool,
}

impl Style {
    pub fn is_default(&self) -> bool {
        *self == Style::default()
    }

    /// Legacy codes for the active flags, in `k l m n o` order.
    pub(crate) fn flag_codes(&self) -> impl Iterator<Item = char> {
        [
            (self.obfuscated, 'k'),
            (self.bold, 'l'),
            (self.strikethrough, 'm'),
            (self.underline, 'n'),
            (self.italic, 'o'),
        ]
        .into_iter()
        .filter_map(|(set, code)| set.then_some(code))
    }
}

/// An atomic styled span of text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FormatRun {
    pub text: String,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub obfuscated: bool,
}

impl FormatRun {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            color: style.color,
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
            strikethrough: style.strikethrough,
            obfuscated: style.obfuscated,
        }
    }

    pub fn style(&self) -> Style {
        Style {
            color: self.color,
            bold: self.bold,
            italic: self.italic,
            underline: self.underline,
            strikethrough: self.strikethrough,
            obfuscated: self.obfuscated,
        }
    }

    fn set_style(&mut self, style: Style) {
        self.color = style.color;
        self.bold = style.bold;
        self.italic = style.italic;
        self.underline = style.underline;
        self.strikethrough = style.strikethrough;
        self.obfuscated = style.obfuscated;
    }
}

/// Accumulates styled text into runs.
///
/// A run is only flushed when it already holds text and the style actually
/// changes, so repeated codes never produce duplicate runs. Only the final
/// run may be empty.
#[derive(Debug, Default)]
pub(crate) struct RunBuilder {
    runs: Vec<FormatRun>,
    current: FormatRun,
}

impl RunBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn restyle(&mut self, style: Style) {
        if self.current.style() == style {
            return;
        }

        if !self.current.text.is_empty() {
            let next = FormatRun::new(String::new(), style);
            self.runs.push(std::mem::replace(&mut self.current, next));
            return;
        }

        self.current.set_style(style);
    }

    /// Append `text`, interpreting `§` codes, starting from `base`.
    pub(crate) fn feed(&mut self, text: &str, base: Style) {
        self.restyle(base);

        let mut chars = text.chars();

        while let Some(c) = chars.next() {
            if c != FORMAT_PREFIX {
                self.current.text.push(c);
                continue;
            }

            // A dangling prefix at the very end is dropped.
            let Some(code) = chars.next() else {
                break;
            };

            let mut style = self.current.style();

            match code.to_ascii_lowercase() {
                'k' => style.obfuscated = true,
                'l' => style.bold = true,
                'm' => style.strikethrough = true,
                'n' => style.underline = true,
                'o' => style.italic = true,
                'r' => style = Style::default(),
                other => match Color::from_code(other) {
                    Some(color) => {
                        style = Style {
                            color,
                            ..Style::default()
                        }
                    }
                    // Unknown codes are consumed without effect.
                    None => continue,
                },
            }

            self.restyle(style);
        }
    }

    /// Close the builder. The trailing run is always kept, even without
    /// text, so trailing codes still carry their style.
    pub(crate) fn finish(mut self) -> Vec<FormatRun> {
        self.runs.push(self.current);
        self.runs
    }
}

/// Decode a `§`-coded string into styled runs.
///
/// Color codes reset every flag, format codes add to the current style and
/// `§r` returns to plain white.
pub fn parse_legacy(input: &str) -> Vec<FormatRun> {
    let mut builder = RunBuilder::new();

    builder.feed(input, Style::default());
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motd::to_legacy;

    fn texts(runs: &[FormatRun]) -> Vec<&str> {
        runs.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn mixed_color_and_format_codes() {
        let runs = parse_legacy("§5Test§6Test 2§8Test 3§kTest 4§n§mTest 5");

        assert_eq!(runs.len(), 5);
        assert_eq!(texts(&runs).concat(), "TestTest 2Test 3Test 4Test 5");

        assert_eq!(runs[0].color, Color::DarkPurple);
        assert_eq!(runs[1].color, Color::Gold);
        assert_eq!(runs[2].color, Color::DarkGray);
        assert!(!runs[2].obfuscated);

        assert_eq!(runs[3].color, Color::DarkGray);
        assert!(runs[3].obfuscated);

        assert_eq!(runs[4].color, Color::DarkGray);
        assert!(runs[4].obfuscated && runs[4].underline && runs[4].strikethrough);
        assert!(!runs[4].bold && !runs[4].italic);
    }

    #[test]
    fn color_code_resets_flags() {
        let runs = parse_legacy("§l§oBoldItalic§cRed");

        assert_eq!(texts(&runs), ["BoldItalic", "Red"]);
        assert!(runs[0].bold && runs[0].italic);
        assert_eq!(runs[1].color, Color::Red);
        assert!(!runs[1].bold && !runs[1].italic);
    }

    #[test]
    fn repeated_color_does_not_flush() {
        let runs = parse_legacy("§aHello §a§aWorld");

        assert_eq!(texts(&runs), ["Hello World"]);
        assert_eq!(runs[0].color, Color::Green);
    }

    #[test]
    fn reset_returns_to_white() {
        let runs = parse_legacy("§c§lAlert§r plain");

        assert_eq!(texts(&runs), ["Alert", " plain"]);
        assert_eq!(runs[1].style(), Style::default());
    }

    #[test]
    fn uppercase_and_unknown_codes() {
        let runs = parse_legacy("§ADone§z!§");

        assert_eq!(texts(&runs), ["Done!"]);
        assert_eq!(runs[0].color, Color::Green);
    }

    #[test]
    fn bedrock_minecoin_gold() {
        let runs = parse_legacy("§gCoins");

        assert_eq!(runs[0].color, Color::MinecoinGold);
    }

    #[test]
    fn empty_input_yields_single_empty_run() {
        let runs = parse_legacy("");

        assert_eq!(runs, vec![FormatRun::default()]);
    }

    #[test]
    fn trailing_codes_keep_final_empty_run() {
        let runs = parse_legacy("§bSky§e");

        assert_eq!(texts(&runs), ["Sky", ""]);
        assert_eq!(runs[0].color, Color::Aqua);
        assert_eq!(runs[1].color, Color::Yellow);
        assert_eq!(to_legacy(&runs), "§bSky§e");
    }

    #[test]
    fn only_the_trailing_run_may_be_empty() {
        let runs = parse_legacy("§a§lHi§c§o§r");

        assert_eq!(texts(&runs), ["Hi", ""]);
        assert!(runs[0].bold);
        assert_eq!(runs[1].style(), Style::default());
    }

    #[test]
    fn plain_text_never_contains_prefix() {
        for input in ["§", "§§", "a§§§b", "§§a§", "x§\u{00A7}y", "§k§l§m§n§o§r"] {
            let plain: String = parse_legacy(input).into_iter().map(|r| r.text).collect();

            assert!(!plain.contains(FORMAT_PREFIX), "{:?} -> {:?}", input, plain);
        }
    }
}
