use crate::utils::error::{GatewayError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.warehouse.utilitiestech.online";
pub const BASE_URL_ENV: &str = "WAREHOUSE_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub headers: BTreeMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 60,
            headers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub login_path: String,
    /// 收到 409 時視為帳號已在他處登入並立即登出
    pub handle_session_conflict: bool,
    pub refresh: RefreshConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/api/Account/login".to_string(),
            handle_session_conflict: true,
            refresh: RefreshConfig::default(),
        }
    }
}

/// 更新端點的請求與回應格式。不同部署回傳的欄位不同，由設定決定而非判斷 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub path: String,
    pub request_field: String,
    pub access_token_field: String,
    /// 有設定時，從回應讀取輪替後的 refresh token；否則沿用原本的值
    pub refresh_token_field: Option<String>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            path: "/api/Account/refreshToken".to_string(),
            request_field: "refreshToken".to_string(),
            access_token_field: "token".to_string(),
            refresh_token_field: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub credentials_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(".whgate/credentials.json"),
        }
    }
}

/// 導向登入畫面時顯示的在地化訊息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub session_expired: String,
    pub signed_out_elsewhere: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            session_expired: "Phiên đăng nhập đã hết hạn. Vui lòng đăng nhập lại".to_string(),
            signed_out_elsewhere: "Đã đăng xuất do tài khoản đã được đăng nhập ở nơi khác"
                .to_string(),
        }
    }
}

impl GatewayConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GatewayError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| GatewayError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        config.merge_default_headers();
        Ok(config)
    }

    /// 預設配置，並套用 `WAREHOUSE_API_URL` 環境變數
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.api.base_url = base_url;
            }
        }
        config
    }

    /// 替換環境變數 (例如 ${API_URL})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| GatewayError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 設定檔的 `[api.headers]` 疊加在預設 header 上，名稱一律小寫
    fn merge_default_headers(&mut self) {
        let mut headers = ApiConfig::default().headers;
        headers.extend(
            std::mem::take(&mut self.api.headers)
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value)),
        );
        self.api.headers = headers;
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    pub fn with_rotating_refresh_token(mut self, field: impl Into<String>) -> Self {
        self.auth.refresh.refresh_token_field = Some(field.into());
        self
    }

    pub fn with_session_conflict_handling(mut self, enabled: bool) -> Self {
        self.auth.handle_session_conflict = enabled;
        self
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.credentials_path = path.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.api.base_url)?;
        validation::validate_range("api.timeout_seconds", self.api.timeout_seconds, 1, 600)?;

        validation::validate_api_path("auth.login_path", &self.auth.login_path)?;
        validation::validate_api_path("auth.refresh.path", &self.auth.refresh.path)?;
        validation::validate_non_empty_string(
            "auth.refresh.request_field",
            &self.auth.refresh.request_field,
        )?;
        validation::validate_non_empty_string(
            "auth.refresh.access_token_field",
            &self.auth.refresh.access_token_field,
        )?;
        if let Some(field) = &self.auth.refresh.refresh_token_field {
            validation::validate_non_empty_string("auth.refresh.refresh_token_field", field)?;
        }

        validation::validate_path(
            "storage.credentials_path",
            &self.storage.credentials_path.to_string_lossy(),
        )?;

        validation::validate_non_empty_string(
            "messages.session_expired",
            &self.messages.session_expired,
        )?;
        validation::validate_non_empty_string(
            "messages.signed_out_elsewhere",
            &self.messages.signed_out_elsewhere,
        )?;

        Ok(())
    }
}

impl Validate for GatewayConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_production_deployment() {
        let config = GatewayConfig::default();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.auth.refresh.path, "/api/Account/refreshToken");
        assert_eq!(config.auth.refresh.access_token_field, "token");
        assert!(config.auth.refresh.refresh_token_field.is_none());
        assert!(config.auth.handle_session_conflict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[api]
base_url = "http://poserdungeon.myddns.me:5001"
timeout_seconds = 30

[api.headers]
Content-Type = "application/json"
X-Client = "whgate"

[auth]
handle_session_conflict = false

[auth.refresh]
path = "/api/Auth/refresh"
access_token_field = "accessToken"
refresh_token_field = "refreshToken"
"#;

        let config = GatewayConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.api.base_url, "http://poserdungeon.myddns.me:5001");
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.api.headers.get("x-client").map(String::as_str), Some("whgate"));
        assert!(!config.auth.handle_session_conflict);
        assert_eq!(config.auth.login_path, "/api/Account/login");
        assert_eq!(config.auth.refresh.path, "/api/Auth/refresh");
        assert_eq!(config.auth.refresh.request_field, "refreshToken");
        assert_eq!(
            config.auth.refresh.refresh_token_field.as_deref(),
            Some("refreshToken")
        );
        assert_eq!(config.messages, MessagesConfig::default());
    }

    #[test]
    fn test_configured_headers_extend_defaults() {
        let toml_content = r#"
[api.headers]
X-Client = "whgate"
"#;

        let config = GatewayConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.api.headers.len(), 2);
        assert_eq!(
            config.api.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(config.api.headers.get("x-client").map(String::as_str), Some("whgate"));

        let overridden = GatewayConfig::from_toml_str(
            "[api.headers]\n\"Content-Type\" = \"application/json; charset=utf-8\"\n",
        )
        .unwrap();
        assert_eq!(
            overridden.api.headers.get("content-type").map(String::as_str),
            Some("application/json; charset=utf-8")
        );
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("WHGATE_TEST_BASE_URL", "https://staging.warehouse.test");

        let toml_content = r#"
[api]
base_url = "${WHGATE_TEST_BASE_URL}"

[storage]
credentials_path = "${WHGATE_TEST_UNDEFINED_DIR}/credentials.json"
"#;

        let config = GatewayConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.api.base_url, "https://staging.warehouse.test");
        assert_eq!(
            config.storage.credentials_path,
            PathBuf::from("${WHGATE_TEST_UNDEFINED_DIR}/credentials.json")
        );

        std::env::remove_var("WHGATE_TEST_BASE_URL");
    }

    #[test]
    fn test_config_validation() {
        let invalid_url = GatewayConfig::default().with_base_url("invalid-url");
        assert!(invalid_url.validate().is_err());

        let mut bad_path = GatewayConfig::default();
        bad_path.auth.refresh.path = "api/Account/refreshToken".to_string();
        assert!(bad_path.validate().is_err());

        let mut zero_timeout = GatewayConfig::default();
        zero_timeout.api.timeout_seconds = 0;
        assert!(zero_timeout.validate().is_err());

        let blank_rotation = GatewayConfig::default().with_rotating_refresh_token(" ");
        assert!(blank_rotation.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let result = GatewayConfig::from_toml_str("[api\nbase_url = 1");
        assert!(matches!(
            result,
            Err(GatewayError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[api]
base_url = "https://api.example.com"

[messages]
session_expired = "Session expired"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = GatewayConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.messages.session_expired, "Session expired");
        assert_eq!(
            config.messages.signed_out_elsewhere,
            MessagesConfig::default().signed_out_elsewhere
        );
    }
}
