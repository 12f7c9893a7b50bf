pub mod auth;
pub mod request_id;

pub use auth::{ApiAuth, Owner};
pub use request_id::{RequestId, RequestIdMiddleware};
