use crate::config::toml_config::GatewayConfig;
use crate::domain::warehouse::{InboundStatus, LotTransferStatus, OutboundStatus};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "whgate")]
#[command(about = "Authenticated command-line client for the warehouse API")]
pub struct CliConfig {
    /// Path to TOML configuration file (defaults plus WAREHOUSE_API_URL when absent)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override api.base_url from config
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override storage.credentials_path from config
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// 列表查詢共用參數
#[derive(Debug, Clone, clap::Args)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = 10)]
    pub page_size: u32,

    #[arg(long)]
    pub search: Option<String>,

    /// RFC 3339 timestamp, e.g. 2025-03-01T00:00:00Z
    #[arg(long)]
    pub date_from: Option<chrono::DateTime<chrono::Utc>>,

    #[arg(long)]
    pub date_to: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sign in and store credentials
    Login {
        #[arg(short, long)]
        user: String,

        /// Falls back to WAREHOUSE_PASSWORD
        #[arg(short, long, env = "WAREHOUSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Clear stored credentials
    Logout,
    /// Show whether credentials are stored
    Status,
    /// Show the signed-in user
    Whoami,
    #[command(subcommand)]
    Inbound(InboundCommand),
    #[command(subcommand)]
    Outbound(OutboundCommand),
    #[command(subcommand)]
    LotTransfer(LotTransferCommand),
    /// List customers
    Customers {
        #[command(flatten)]
        list: ListArgs,
    },
    /// Create or amend an inbound problem report
    Report {
        /// Create a new report for this inbound
        #[arg(long, conflicts_with = "report_id", required_unless_present = "report_id")]
        inbound_id: Option<i64>,

        /// Amend an existing report
        #[arg(long)]
        report_id: Option<i64>,

        #[arg(short, long)]
        description: String,

        /// Image files to attach (at most 5)
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Download an inbound report attachment
    Asset {
        asset_path: String,

        #[arg(short, long)]
        output: PathBuf,
    },
    /// Send an arbitrary authenticated request
    Request {
        method: String,
        path: String,

        /// JSON body
        #[arg(long)]
        data: Option<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum InboundCommand {
    List {
        #[command(flatten)]
        list: ListArgs,

        #[arg(long)]
        status: Option<InboundStatus>,

        #[arg(long)]
        report_pending: Option<bool>,
    },
    Get {
        id: i64,
    },
    SetStatus {
        id: i64,
        status: InboundStatus,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum OutboundCommand {
    List {
        #[command(flatten)]
        list: ListArgs,

        #[arg(long)]
        customer_id: Option<i64>,

        #[arg(long)]
        status: Option<String>,
    },
    Get {
        id: i64,
    },
    SetStatus {
        id: i64,
        status: OutboundStatus,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum LotTransferCommand {
    List {
        #[command(flatten)]
        list: ListArgs,

        #[arg(long)]
        status: Option<String>,
    },
    Get {
        id: i64,
    },
    SetStatus {
        id: i64,
        status: LotTransferStatus,
    },
}

impl CliConfig {
    /// 載入設定檔（或預設值）並套用命令列覆寫
    pub fn load_gateway_config(&self) -> Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                GatewayConfig::from_file(path)?
            }
            None => GatewayConfig::from_env(),
        };

        if let Some(base_url) = &self.base_url {
            tracing::info!("🔧 Base URL overridden to: {}", base_url);
            config = config.with_base_url(base_url.clone());
        }
        if let Some(path) = &self.credentials {
            config = config.with_credentials_path(path.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_nested_subcommands() {
        let cli = CliConfig::try_parse_from([
            "whgate",
            "--base-url",
            "http://localhost:5001",
            "outbound",
            "set-status",
            "7",
            "in-progress",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::Outbound(OutboundCommand::SetStatus {
                id: 7,
                status: OutboundStatus::InProgress
            })
        ));
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:5001"));
    }

    #[test]
    fn test_report_requires_a_target() {
        let missing = CliConfig::try_parse_from(["whgate", "report", "-d", "móp"]);
        assert!(missing.is_err());

        let both = CliConfig::try_parse_from([
            "whgate",
            "report",
            "--inbound-id",
            "1",
            "--report-id",
            "2",
            "-d",
            "móp",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn test_overrides_are_applied_and_validated() {
        let cli = CliConfig::try_parse_from([
            "whgate",
            "--base-url",
            "http://localhost:5001",
            "--credentials",
            "/tmp/whgate-test/creds.json",
            "status",
        ])
        .unwrap();

        let config = cli.load_gateway_config().unwrap();
        assert_eq!(config.api.base_url, "http://localhost:5001");
        assert_eq!(
            config.storage.credentials_path,
            PathBuf::from("/tmp/whgate-test/creds.json")
        );

        let invalid = CliConfig::try_parse_from(["whgate", "--base-url", "nope", "status"]).unwrap();
        assert!(invalid.load_gateway_config().is_err());
    }
}
