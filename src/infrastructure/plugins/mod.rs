//! Plugin catalog files
//!
//! A catalog lists the plugins a deployment knows about, either as a YAML
//! list of descriptors or as "Display name: plugin_id" lines.

pub mod manifest;

pub use manifest::PluginManifest;
