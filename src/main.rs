use anyhow::Context;
use clap::Parser;
use warehouse_gateway::config::cli::{
    Command, InboundCommand, ListArgs, LotTransferCommand, OutboundCommand,
};
use warehouse_gateway::domain::model::Method;
use warehouse_gateway::domain::warehouse::{
    InboundQuery, LotTransferQuery, OutboundQuery, PageQuery, ReportImage, ReportSubmission,
    ReportTarget,
};
use warehouse_gateway::utils::error::{ErrorSeverity, GatewayError};
use warehouse_gateway::utils::logger;
use warehouse_gateway::{CliConfig, DefaultGateway, FileCredentialStore, LoggingNavigator,
    ReqwestTransport, WarehouseApi};

type CliApi = WarehouseApi<FileCredentialStore, ReqwestTransport, LoggingNavigator>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting whgate");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 載入並驗證配置
    let config = match cli.load_gateway_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    tracing::info!("✅ Configuration loaded: {}", config.api.base_url);
    let gateway = DefaultGateway::from_config(config).context("failed to build HTTP client")?;
    let api = WarehouseApi::new(gateway);

    if let Err(e) = run(&api, cli.command).await {
        report_failure(&e)
    }

    Ok(())
}

async fn run(api: &CliApi, command: Command) -> warehouse_gateway::Result<()> {
    match command {
        Command::Login { user, password } => {
            let login = api.gateway().sign_in(&user, &password).await?;
            println!("✅ Signed in as {} ({})", user, login.role);
        }
        Command::Logout => {
            api.gateway().sign_out().await?;
            println!("👋 Signed out");
        }
        Command::Status => {
            let path = api.gateway().store().path().display().to_string();
            if api.gateway().is_authenticated().await? {
                let updated = api.gateway().store().updated_at().await?;
                println!("🔐 Signed in (credentials: {})", path);
                if let Some(updated) = updated {
                    println!("🕒 Last refreshed: {}", updated.to_rfc3339());
                }
            } else {
                println!("🔓 Not signed in (credentials: {})", path);
            }
        }
        Command::Whoami => print_json(&api.whoami().await?)?,
        Command::Inbound(command) => match command {
            InboundCommand::List {
                list,
                status,
                report_pending,
            } => {
                let query = InboundQuery {
                    paging: page_query(list),
                    inbound_status: status,
                    is_report_pending_exist: report_pending,
                };
                print_json(&api.list_inbounds(&query).await?)?
            }
            InboundCommand::Get { id } => print_json(&api.get_inbound(id).await?)?,
            InboundCommand::SetStatus { id, status } => {
                api.update_inbound_status(id, status).await?;
                println!("✅ Inbound {} -> {}", id, status);
            }
        },
        Command::Outbound(command) => match command {
            OutboundCommand::List {
                list,
                customer_id,
                status,
            } => {
                let query = OutboundQuery {
                    paging: page_query(list),
                    customer_id,
                    status,
                };
                print_json(&api.list_outbounds(&query).await?)?
            }
            OutboundCommand::Get { id } => print_json(&api.get_outbound(id).await?)?,
            OutboundCommand::SetStatus { id, status } => {
                api.update_outbound_status(id, status).await?;
                println!("✅ Outbound {} -> {}", id, status);
            }
        },
        Command::LotTransfer(command) => match command {
            LotTransferCommand::List { list, status } => {
                let query = LotTransferQuery {
                    paging: page_query(list),
                    status,
                };
                print_json(&api.list_lot_transfers(&query).await?)?
            }
            LotTransferCommand::Get { id } => print_json(&api.get_lot_transfer(id).await?)?,
            LotTransferCommand::SetStatus { id, status } => {
                api.update_lot_transfer_status(id, status).await?;
                println!("✅ Lot transfer {} -> {}", id, status);
            }
        },
        Command::Customers { list } => print_json(&api.list_customers(&page_query(list)).await?)?,
        Command::Report {
            inbound_id,
            report_id,
            description,
            images,
        } => {
            let target = match (report_id, inbound_id) {
                (Some(report_id), _) => ReportTarget::Existing(report_id),
                (None, Some(inbound_id)) => ReportTarget::NewForInbound(inbound_id),
                (None, None) => {
                    return Err(GatewayError::InvalidRequestError {
                        message: "Either --inbound-id or --report-id is required".to_string(),
                    })
                }
            };

            let mut attachments = Vec::with_capacity(images.len());
            for path in images {
                attachments.push(ReportImage {
                    file_name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "image.jpg".to_string()),
                    content_type: image_content_type(&path).to_string(),
                    bytes: tokio::fs::read(&path).await?,
                });
            }

            let ack = api
                .submit_inbound_report(&ReportSubmission {
                    target,
                    problem_description: description,
                    images: attachments,
                })
                .await?;
            println!(
                "✅ {}",
                ack.message
                    .unwrap_or_else(|| "Báo cáo sự cố đã được gửi thành công".to_string())
            );
        }
        Command::Asset { asset_path, output } => {
            let bytes = api.download_report_asset(&asset_path).await?;
            tokio::fs::write(&output, &bytes).await?;
            println!("📁 Saved {} bytes to {}", bytes.len(), output.display());
        }
        Command::Request { method, path, data } => {
            let method: Method = method
                .parse()
                .map_err(|message| GatewayError::InvalidRequestError { message })?;
            let body = data
                .as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()?;
            let response = api.raw(method, &path, body).await?;
            println!("{}", response.text());
        }
    }
    Ok(())
}

fn page_query(list: ListArgs) -> PageQuery {
    PageQuery {
        page: list.page,
        page_size: list.page_size,
        search: list.search,
        date_from: list.date_from,
        date_to: list.date_to,
    }
}

fn image_content_type(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> warehouse_gateway::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_failure(e: &GatewayError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 4,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}
