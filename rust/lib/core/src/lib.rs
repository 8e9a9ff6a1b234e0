pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use auth::{Authorizer, OwnerOrAdmin};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use types::{ListResult, new_id, now_rfc3339};
