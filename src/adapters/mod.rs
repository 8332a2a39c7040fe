// Adapters layer: concrete implementations of the domain ports (storage, http, navigation).

pub mod http;
pub mod navigation;
pub mod storage;

pub use http::ReqwestTransport;
pub use navigation::{LoggingNavigator, RecordingNavigator};
pub use storage::{FileCredentialStore, MemoryCredentialStore};
