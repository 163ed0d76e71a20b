mod builder;
pub mod user_agent;

pub use builder::ContextBuilder;

use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

pub const ATTR_MOBILE: &str = "Mobile";
pub const ATTR_PLATFORM: &str = "Platform";
pub const ATTR_OS: &str = "OS";
pub const ATTR_BROWSER: &str = "Browser";
pub const ATTR_JUNK_X: &str = "JunkX";
pub const ATTR_JUNK_Y: &str = "JunkY";
pub const ATTR_JUNK_Z: &str = "JunkZ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Text(String),
}

impl ContextValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::Text(value) => Some(value.as_str()),
            ContextValue::Bool(_) => None,
        }
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Bool(value) => write!(f, "{value}"),
            ContextValue::Text(value) => write!(f, "{value:?}"),
        }
    }
}

/// Visitor fingerprint sent to the decision service.
///
/// Attributes keep insertion order and cannot be changed once the context is
/// built; a later attribute with an existing name replaces the earlier value
/// in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Context {
    attributes: Vec<(String, ContextValue)>,
}

impl Context {
    pub fn from_attributes<I, K, V>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ContextValue>,
    {
        let mut context = Context::default();
        for (name, value) in attributes {
            context.insert(name.into(), value.into());
        }
        context
    }

    fn insert(&mut self, name: String, value: ContextValue) {
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Serializes as a flat JSON object in attribute order.
impl Serialize for Context {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.attributes.len()))?;
        for (name, value) in &self.attributes {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, (name, value)) in self.attributes.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}
