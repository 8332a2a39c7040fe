// Domain layer: wire models, warehouse records and the ports the gateway is built on.

pub mod model;
pub mod ports;
pub mod warehouse;

pub use crate::domain::model::{ApiRequest, ApiResponse, CredentialPair, Method, RequestBody};
pub use crate::domain::ports::{CredentialStore, HttpTransport, NavigationShell};
