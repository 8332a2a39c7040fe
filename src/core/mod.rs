pub mod gateway;
pub mod refresh;
pub mod session;

pub use crate::core::gateway::{AuthGateway, MAX_AUTH_RETRIES};
pub use crate::core::refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome, ResetCause};
pub use crate::utils::error::Result;
