//! Plugin catalog files
//!
//! Two formats are accepted:
//! - `.yaml` / `.yml`: a list of plugin descriptors
//! - anything else: one `Display name: plugin_id` per line, ASCII or
//!   full-width colon. Lines without a colon are ignored, so a plain
//!   readme can double as the catalog.

use regex_lite::Regex;
use std::path::Path;

use crate::application::errors::ConfigError;
use crate::domain::entities::PluginDescriptor;

/// Plugins listed in a catalog file, in file order
#[derive(Debug, Clone, Default)]
pub struct PluginManifest {
    pub plugins: Vec<PluginDescriptor>,
}

impl PluginManifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read catalog {}: {}", path.display(), e)))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Ok(Self::from_lines(&content)),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let plugins: Vec<PluginDescriptor> = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse catalog: {}", e)))?;
        Ok(Self { plugins })
    }

    pub fn from_lines(content: &str) -> Self {
        let line_re = match Regex::new(r"^\s*[-*]?\s*(.+?)\s*[:：]\s*([A-Za-z0-9_\-]+)\s*$") {
            Ok(re) => re,
            Err(_) => return Self::default(),
        };

        let mut plugins: Vec<PluginDescriptor> = Vec::new();
        for line in content.lines() {
            let Some(caps) = line_re.captures(line) else {
                continue;
            };
            let display = caps[1].trim();
            let id = &caps[2];

            // later lines win, like re-declaring a plugin
            match plugins.iter_mut().find(|p| p.name == id) {
                Some(existing) => existing.display_name = Some(display.to_string()),
                None => plugins.push(PluginDescriptor::new(id).with_display_name(display)),
            }
        }
        Self { plugins }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readme_lines() {
        let content = "插件列表\n今日人品: jrrp\n抽签：draw_lots\n- 撤回监控: recall\nhttps://example.com\n\n抽签: draw_lots\n";
        let manifest = PluginManifest::from_lines(content);
        let names: Vec<_> = manifest.plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["jrrp", "draw_lots", "recall"]);
        assert_eq!(manifest.plugins[0].label(), "今日人品");
        assert_eq!(manifest.plugins[2].label(), "撤回监控");
    }

    #[test]
    fn test_yaml_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(
            &path,
            "- name: recall\n  features: [monitor, self_recall]\n- name: setu\n  default-enabled: false\n",
        )
        .unwrap();

        let manifest = PluginManifest::from_file(&path).unwrap();
        assert_eq!(manifest.len(), 2);
        assert!(manifest.plugins[0].has_feature("self_recall"));
        assert!(!manifest.plugins[1].enabled_by_default());
    }

    #[test]
    fn test_missing_file() {
        assert!(PluginManifest::from_file("/nonexistent/catalog.md").is_err());
    }
}
