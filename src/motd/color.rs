use serde::Serialize;

/// The 16 Java colors plus Bedrock's `minecoin_gold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    #[default]
    White,
    MinecoinGold,
}

// (color, legacy code, chat component name, CSS hex)
const TABLE: [(Color, char, &str, &str); 17] = [
    (Color::Black, '0', "black", "#000000"),
    (Color::DarkBlue, '1', "dark_blue", "#0000AA"),
    (Color::DarkGreen, '2', "dark_green", "#00AA00"),
    (Color::DarkAqua, '3', "dark_aqua", "#00AAAA"),
    (Color::DarkRed, '4', "dark_red", "#AA0000"),
    (Color::DarkPurple, '5', "dark_purple", "#AA00AA"),
    (Color::Gold, '6', "gold", "#FFAA00"),
    (Color::Gray, '7', "gray", "#AAAAAA"),
    (Color::DarkGray, '8', "dark_gray", "#555555"),
    (Color::Blue, '9', "blue", "#5555FF"),
    (Color::Green, 'a', "green", "#55FF55"),
    (Color::Aqua, 'b', "aqua", "#55FFFF"),
    (Color::Red, 'c', "red", "#FF5555"),
    (Color::LightPurple, 'd', "light_purple", "#FF55FF"),
    (Color::Yellow, 'e', "yellow", "#FFFF55"),
    (Color::White, 'f', "white", "#FFFFFF"),
    (Color::MinecoinGold, 'g', "minecoin_gold", "#DDD605"),
];

impl Color {
    /// Look up a legacy code character (`0`-`9`, `a`-`g`), case-insensitively.
    pub fn from_code(code: char) -> Option<Self> {
        let code = code.to_ascii_lowercase();

        TABLE.iter().find(|row| row.1 == code).map(|row| row.0)
    }

    /// Look up a chat component color name such as `dark_purple`.
    ///
    /// A bare legacy code is accepted too; anything else yields `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();

        if let Some(row) = TABLE.iter().find(|row| row.2.eq_ignore_ascii_case(name)) {
            return Some(row.0);
        }

        let mut chars = name.chars();

        match (chars.next(), chars.next()) {
            (Some(code), None) => Self::from_code(code),
            _ => None,
        }
    }

    fn row(self) -> &'static (Color, char, &'static str, &'static str) {
        // Every variant has exactly one row, in declaration order.
        &TABLE[self as usize]
    }

    pub fn code(self) -> char {
        self.row().1
    }

    pub fn name(self) -> &'static str {
        self.row().2
    }

    pub fn hex(self) -> &'static str {
        self.row().3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_in_declaration_order() {
        for (idx, row) in TABLE.iter().enumerate() {
            assert_eq!(row.0 as usize, idx);
        }
    }

    #[test]
    fn lookups() {
        assert_eq!(Color::from_code('5'), Some(Color::DarkPurple));
        assert_eq!(Color::from_code('A'), Some(Color::Green));
        assert_eq!(Color::from_code('g'), Some(Color::MinecoinGold));
        assert_eq!(Color::from_code('k'), None);

        assert_eq!(Color::from_name("light_purple"), Some(Color::LightPurple));
        assert_eq!(Color::from_name("minecoin_gold"), Some(Color::MinecoinGold));
        assert_eq!(Color::from_name("e"), Some(Color::Yellow));
        assert_eq!(Color::from_name("#FF0000"), None);
        assert_eq!(Color::from_name("reset"), None);

        assert_eq!(Color::Gold.code(), '6');
        assert_eq!(Color::Gold.name(), "gold");
        assert_eq!(Color::Gold.hex(), "#FFAA00");
        assert_eq!(Color::default(), Color::White);
    }
}
