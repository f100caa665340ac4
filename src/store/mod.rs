//! Storage collaborator for ReadKey.
//!
//! The pipeline never talks to a database directly. Every persisted read and
//! write goes through the narrow [`Store`] interface: single values, ordered
//! lists (duplicates allowed), sets, and a capped list push. Multi-step
//! atomicity, such as push-then-trim, is the implementation's responsibility.

pub mod keys;
pub mod memory;

use async_trait::async_trait;

use crate::Result;

pub use memory::MemoryStore;

/// Key-value storage used by the ingestion pipeline.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get a single value, `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a single value, replacing any previous value.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Get a whole list. A missing key reads as an empty list.
    async fn get_list(&self, key: &str) -> Result<Vec<String>>;

    /// Append to the tail of a list. Duplicates are kept.
    async fn append_to_list(&self, key: &str, item: &str) -> Result<()>;

    /// Remove the first occurrence of `item`; returns whether one was removed.
    async fn remove_from_list(&self, key: &str, item: &str) -> Result<bool>;

    /// Push to the head of a list and trim it to `capacity` entries,
    /// dropping the oldest.
    async fn push_capped(&self, key: &str, item: &str, capacity: usize) -> Result<()>;

    /// Add a member to a set; returns whether it was newly added.
    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove a member from a set; returns whether it was present.
    async fn remove_from_set(&self, key: &str, member: &str) -> Result<bool>;

    /// Check set membership.
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    /// All members of a set. A missing key reads as an empty set.
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;
}
