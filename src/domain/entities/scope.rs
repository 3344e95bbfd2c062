use serde::{Deserialize, Serialize};
use std::fmt;

/// Applicability level of a setting
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "group_id", rename_all = "snake_case")]
pub enum Scope {
    Global,
    Group(String),
}

impl Scope {
    pub fn group(id: impl Into<String>) -> Self {
        Scope::Group(id.into())
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Group(id) => Some(id),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// Storage form: "global" or "group:<id>"
    pub fn as_key(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::Group(id) => format!("group:{}", id),
        }
    }

    /// Inverse of `as_key`. A bare id is read as a group.
    pub fn from_key(key: &str) -> Self {
        match key.strip_prefix("group:") {
            Some(id) => Scope::Group(id.to_string()),
            None if key == "global" => Scope::Global,
            None => Scope::Group(key.to_string()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Group(id) => write!(f, "group {}", id),
        }
    }
}

/// Identifies a plugin or one of its features ("plugin" / "plugin:feature")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginKey {
    pub plugin: String,
    pub feature: Option<String>,
}

impl PluginKey {
    pub fn plugin(name: impl Into<String>) -> Self {
        Self {
            plugin: name.into(),
            feature: None,
        }
    }

    pub fn feature(plugin: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            feature: Some(feature.into()),
        }
    }

    pub fn parse(input: &str) -> Self {
        match input.split_once(':') {
            Some((plugin, feature)) if !feature.is_empty() => Self::feature(plugin, feature),
            Some((plugin, _)) => Self::plugin(plugin),
            None => Self::plugin(input),
        }
    }

    pub fn is_feature(&self) -> bool {
        self.feature.is_some()
    }

    /// The parent plugin's key
    pub fn parent(&self) -> PluginKey {
        Self::plugin(self.plugin.clone())
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.feature {
            Some(feature) => write!(f, "{}:{}", self.plugin, feature),
            None => write!(f, "{}", self.plugin),
        }
    }
}

impl Serialize for PluginKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PluginKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(PluginKey::parse(&raw))
    }
}
