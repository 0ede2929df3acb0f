pub mod analytics;
pub mod capabilities;
pub mod error_code;
pub mod health;
pub mod helpers;
pub mod links;
pub mod metrics;
pub mod redirect;
pub mod types;

pub use analytics::{AnalyticsApi, analytics_routes};
pub use capabilities::{CapabilityEndpoint, capability_routes};
pub use error_code::ErrorCode;
pub use health::{HealthService, health_routes};
pub use links::{LinksApi, link_routes};
pub use redirect::{RedirectApi, redirect_routes};
pub use types::*;
