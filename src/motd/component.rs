use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{
    legacy::{RunBuilder, Style},
    Color, FormatRun,
};

/// One node of a JSON chat component tree.
///
/// Style fields left unset inherit from the parent node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatNode {
    #[serde(deserialize_with = "deserialize_text", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(deserialize_with = "deserialize_flag", skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(deserialize_with = "deserialize_flag", skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(deserialize_with = "deserialize_flag", skip_serializing_if = "Option::is_none")]
    pub underlined: Option<bool>,
    #[serde(deserialize_with = "deserialize_flag", skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(deserialize_with = "deserialize_flag", skip_serializing_if = "Option::is_none")]
    pub obfuscated: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<ChatComponent>,
}

/// Anything that may appear where a chat component is expected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ChatComponent {
    Text(String),
    // Before `Node`, which would otherwise accept arrays positionally.
    List(Vec<ChatComponent>),
    Node(ChatNode),
}

impl ChatNode {
    /// Resolve this node's effective style on top of the inherited one.
    ///
    /// Unknown color names are dropped, leaving the inherited color.
    fn resolve(&self, inherited: Style) -> Style {
        Style {
            color: self
                .color
                .as_deref()
                .and_then(Color::from_name)
                .unwrap_or(inherited.color),
            bold: self.bold.unwrap_or(inherited.bold),
            italic: self.italic.unwrap_or(inherited.italic),
            underline: self.underlined.unwrap_or(inherited.underline),
            strikethrough: self.strikethrough.unwrap_or(inherited.strikethrough),
            obfuscated: self.obfuscated.unwrap_or(inherited.obfuscated),
        }
    }
}

impl ChatComponent {
    fn walk(&self, inherited: Style, builder: &mut RunBuilder) {
        match self {
            ChatComponent::Text(text) => builder.feed(text, inherited),
            ChatComponent::List(items) => {
                for item in items {
                    item.walk(inherited, builder);
                }
            }
            ChatComponent::Node(node) => walk_node(node, inherited, builder),
        }
    }
}

fn walk_node(node: &ChatNode, inherited: Style, builder: &mut RunBuilder) {
    let style = node.resolve(inherited);

    // Own text first, then children in array order.
    if let Some(text) = &node.text {
        builder.feed(text, style);
    }

    for child in &node.extra {
        child.walk(style, builder);
    }
}

/// Flatten a chat component tree into styled runs.
///
/// `§` codes embedded in a node's text apply on top of that node's style.
pub fn parse_component(component: &ChatComponent) -> Vec<FormatRun> {
    let mut builder = RunBuilder::new();

    component.walk(Style::default(), &mut builder);
    builder.finish()
}

/// Flatten a single [`ChatNode`] into styled runs.
pub fn parse_node(node: &ChatNode) -> Vec<FormatRun> {
    let mut builder = RunBuilder::new();

    walk_node(node, Style::default(), &mut builder);
    builder.finish()
}

/// Style flags arrive as native booleans or as `"true"`/`"false"` strings.
/// Anything else counts as unset.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::String(flag)) if flag.trim().eq_ignore_ascii_case("true") => Some(true),
        Some(Value::String(flag)) if flag.trim().eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    })
}

/// `text` is occasionally sent as a number or boolean.
fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(num)) => Some(num.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}
