//! Chat formatting engine.
//!
//! Server descriptions arrive either as `§`-coded strings or as JSON chat
//! component trees. Both are flattened into a sequence of [`FormatRun`]s,
//! which [`Motd`] can render back to legacy codes, plain text or HTML.

mod color;
mod component;
mod legacy;
mod render;

use serde::{ser::SerializeStruct, Deserialize, Serialize};

pub use color::Color;
pub use component::{parse_component, parse_node, ChatComponent, ChatNode};
pub use legacy::{parse_legacy, FormatRun, Style, FORMAT_PREFIX};
pub use render::{to_html, to_legacy, to_plain, OBFUSCATED_CLASS};

/// The `description` field of a status response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Description {
    Plain(String),
    // Arrays must be tried before objects: a derived struct also accepts sequences.
    Components(Vec<ChatComponent>),
    Component(ChatNode),
}

impl Default for Description {
    fn default() -> Self {
        Description::Plain(String::new())
    }
}

/// A decoded message of the day.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Motd {
    runs: Vec<FormatRun>,
}

impl Motd {
    /// Decode a `§`-coded string.
    pub fn parse(raw: &str) -> Self {
        Self {
            runs: parse_legacy(raw),
        }
    }

    pub fn from_component(component: &ChatComponent) -> Self {
        Self {
            runs: parse_component(component),
        }
    }

    pub fn from_description(description: &Description) -> Self {
        let runs = match description {
            Description::Plain(raw) => parse_legacy(raw),
            Description::Component(node) => parse_node(node),
            Description::Components(items) => parse_component(&ChatComponent::List(items.clone())),
        };

        Self { runs }
    }

    pub fn runs(&self) -> &[FormatRun] {
        &self.runs
    }

    pub fn into_runs(self) -> Vec<FormatRun> {
        self.runs
    }

    /// Canonical `§`-coded form.
    pub fn to_legacy(&self) -> String {
        to_legacy(&self.runs)
    }

    /// Text without any formatting.
    pub fn to_plain(&self) -> String {
        to_plain(&self.runs)
    }

    pub fn to_html(&self) -> String {
        to_html(&self.runs)
    }
}

impl From<Vec<FormatRun>> for Motd {
    fn from(runs: Vec<FormatRun>) -> Self {
        Self { runs }
    }
}

impl std::fmt::Display for Motd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain())
    }
}

impl Serialize for Motd {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Motd", 3)?;

        state.serialize_field("raw", &self.to_legacy())?;
        state.serialize_field("clean", &self.to_plain())?;
        state.serialize_field("html", &self.to_html())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_dispatch() {
        let plain: Description = serde_json::from_str(r#""§aA Minecraft Server""#).unwrap();
        let node: Description =
            serde_json::from_str(r#"{"text":"A Minecraft Server","color":"green"}"#).unwrap();
        let list: Description =
            serde_json::from_str(r#"[{"text":"A Minecraft ","color":"green"},"Server"]"#).unwrap();

        assert!(matches!(plain, Description::Plain(_)));
        assert!(matches!(node, Description::Component(_)));
        assert!(matches!(list, Description::Components(_)));

        for description in [plain, node, list] {
            let motd = Motd::from_description(&description);

            assert_eq!(motd.to_plain(), "A Minecraft Server");
            assert_eq!(motd.runs()[0].color, Color::Green);
        }
    }

    #[test]
    fn serializes_all_renderings() {
        let motd = Motd::parse("§lHi");
        let value = serde_json::to_value(&motd).unwrap();

        assert_eq!(value["raw"], "§lHi");
        assert_eq!(value["clean"], "Hi");
        assert_eq!(
            value["html"],
            "<span style=\"color: #FFFFFF; font-weight: bold;\">Hi</span>"
        );
        assert_eq!(motd.to_string(), "Hi");
    }
}
