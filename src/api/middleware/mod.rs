pub mod request_id;
pub mod timing;

pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdMiddleware};
pub use timing::{TimingMiddleware, classify_endpoint};
