use super::{
    legacy::{Style, FORMAT_PREFIX},
    Color, FormatRun,
};

/// CSS class attached to obfuscated runs. Animating it is up to the page.
pub const OBFUSCATED_CLASS: &str = "minecraft-format-obfuscated";

/// Re-encode runs as a canonical `§`-coded string.
///
/// Each style change emits the color code (omitted for white) followed by
/// the flag codes. A white run following a styled one starts with `§r` so
/// that decoding the output restores the same styles.
pub fn to_legacy(runs: &[FormatRun]) -> String {
    let mut result = String::new();
    let mut previous = Style::default();

    for run in runs {
        let style = run.style();

        if style != previous {
            if style.color != Color::White {
                result.push(FORMAT_PREFIX);
                result.push(style.color.code());
            } else if !previous.is_default() {
                result.push(FORMAT_PREFIX);
                result.push('r');
            }

            for code in style.flag_codes() {
                result.push(FORMAT_PREFIX);
                result.push(code);
            }

            previous = style;
        }

        result.push_str(&run.text);
    }

    result
}

/// Concatenate the text of every run.
pub fn to_plain(runs: &[FormatRun]) -> String {
    runs.iter().map(|run| run.text.as_str()).collect()
}

/// Render each run as a `<span>` with inline CSS.
pub fn to_html(runs: &[FormatRun]) -> String {
    let mut result = String::new();

    for run in runs {
        let mut css = vec![format!("color: {};", run.color.hex())];

        if run.bold {
            css.push("font-weight: bold;".into());
        }

        if run.italic {
            css.push("font-style: italic;".into());
        }

        let decorations = [
            (run.underline, "underline"),
            (run.strikethrough, "line-through"),
        ]
        .into_iter()
        .filter_map(|(set, value)| set.then_some(value))
        .collect::<Vec<_>>();

        if !decorations.is_empty() {
            css.push(format!("text-decoration: {};", decorations.join(" ")));
        }

        result.push_str("<span style=\"");
        result.push_str(&css.join(" "));
        result.push('"');

        if run.obfuscated {
            result.push_str(" class=\"");
            result.push_str(OBFUSCATED_CLASS);
            result.push('"');
        }

        result.push('>');
        escape_html_into(&run.text, &mut result);
        result.push_str("</span>");
    }

    result
}

fn escape_html_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br />"),
            other => out.push(other),
        }
    }
}
