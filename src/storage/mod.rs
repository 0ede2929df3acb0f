//! Storage abstraction
//!
//! The services only see `LinkStore` and `ClickStore`. The in-memory
//! implementations are the only shipped backends; anything persistent plugs
//! in behind the same traits.

use async_trait::async_trait;

use crate::errors::Result;

pub mod memory;
pub mod models;

pub use memory::{MemoryClickStore, MemoryLinkStore};
pub use models::{ClickEvent, Link, NewClickEvent};

/// Link records, keyed by code
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Insert only if the code was never used. Returns `false` when the code is
    /// taken or belonged to a deleted link.
    async fn insert_new(&self, link: Link) -> Result<bool>;

    async fn get(&self, code: &str) -> Result<Option<Link>>;

    /// Replace an existing record. Returns `false` if the code is unknown.
    async fn update(&self, link: Link) -> Result<bool>;

    /// Returns `true` if a record was removed. The code stays reserved.
    async fn remove(&self, code: &str) -> Result<bool>;

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Link>>;

    async fn count(&self) -> Result<usize>;
}

/// Click events, append-only
#[async_trait]
pub trait ClickStore: Send + Sync {
    /// Append one event and return it with its assigned id
    async fn append(&self, event: NewClickEvent) -> Result<ClickEvent>;

    async fn events_for(&self, code: &str) -> Result<Vec<ClickEvent>>;

    async fn count_for(&self, code: &str) -> Result<u64>;

    async fn count(&self) -> Result<usize>;
}
