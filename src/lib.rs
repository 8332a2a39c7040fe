pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FileCredentialStore, LoggingNavigator, MemoryCredentialStore, ReqwestTransport};
pub use app::WarehouseApi;
pub use config::GatewayConfig;
pub use core::AuthGateway;
pub use utils::error::{GatewayError, Result};

/// CLI 使用的預設組合：檔案憑證、reqwest 傳輸層、終端提示
pub type DefaultGateway = AuthGateway<FileCredentialStore, ReqwestTransport, LoggingNavigator>;

impl DefaultGateway {
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        let store = FileCredentialStore::new(config.storage.credentials_path.clone());
        Ok(AuthGateway::new(store, transport, LoggingNavigator, config))
    }
}
