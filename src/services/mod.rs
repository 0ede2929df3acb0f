//! Service layer for business logic
//!
//! Each service exposes plain async methods plus a `register` function that
//! publishes its capabilities into a `CapabilityRegistryBuilder`. Nothing
//! outside a service touches its storage.

mod analytics_service;
mod auth_service;
mod link_service;
mod redirect;

pub use analytics_service::*;
pub use auth_service::*;
pub use link_service::*;
pub use redirect::{RedirectService, RedirectState};
