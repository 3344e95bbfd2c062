use crate::application::errors::StorageError;
use crate::domain::entities::Snapshot;

/// ConfigStore trait - persistence for plugin switches, rules and cooldowns.
///
/// Implementations are synchronous: the management layer loads once at
/// startup and persists after each administrative mutation.
pub trait ConfigStore: Send + Sync {
    /// Read the persisted state. A store that was never written yields an empty snapshot.
    fn load(&self) -> Result<Snapshot, StorageError>;

    /// Replace the persisted state with `snapshot`
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// Short label for logs
    fn describe(&self) -> String;
}
