//! Plugin trait definitions

use crate::domain::entities::{Command, PluginDescriptor};

/// Core plugin trait that all built-in plugins implement.
///
/// A plugin is a capability descriptor plus the commands it contributes.
/// Plugins are registered once at startup; switching them on and off is
/// the registry's job, not the plugin's.
pub trait Plugin: Send + Sync {
    /// Unique identifier for the plugin
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Descriptor registered with the plugin registry
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(self.name())
    }

    /// Commands this plugin adds. Each should be tagged with the plugin
    /// (and feature) it belongs to so the gate can find it.
    fn commands(&self) -> Vec<Command>;
}

/// Stable 64-bit FNV-1a hash, used for per-day deterministic rolls
pub fn stable_hash(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in input.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_hash() {
        assert_eq!(stable_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(stable_hash("a"), 0xaf63_dc4c_8601_ec8c);
        assert_ne!(stable_hash("10001:2026-10-18"), stable_hash("10002:2026-10-18"));
    }
}
