use crate::app::query::ToQuery;
use crate::core::gateway::AuthGateway;
use crate::domain::model::{ApiResponse, FormPart, Method, RequestBody, RequestOptions};
use crate::domain::ports::{CredentialStore, HttpTransport, NavigationShell};
use crate::domain::warehouse::{
    Customer, InboundItem, InboundQuery, InboundStatus, LotTransferItem, LotTransferQuery,
    LotTransferStatus, OutboundItem, OutboundQuery, OutboundStatus, PageQuery, PaginatedResponse,
    ReportSubmission, ReportTarget, UserProfile,
};
use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// 一份報告最多可附的照片數
pub const MAX_REPORT_IMAGES: usize = 5;
pub const MAX_PROBLEM_DESCRIPTION_CHARS: usize = 1000;

/// 表單類 API 的回應
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAck {
    /// 缺少或無法辨識時為 0
    #[serde(default, deserialize_with = "lenient_code")]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// 接受數字或數字字串，例如 `200` 與 `"200"`
fn lenient_code<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

/// 倉儲 API 的型別化包裝，所有請求都經過閘道
pub struct WarehouseApi<S: CredentialStore, T: HttpTransport, N: NavigationShell> {
    gateway: AuthGateway<S, T, N>,
}

impl<S: CredentialStore, T: HttpTransport, N: NavigationShell> WarehouseApi<S, T, N> {
    pub fn new(gateway: AuthGateway<S, T, N>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &AuthGateway<S, T, N> {
        &self.gateway
    }

    pub async fn list_inbounds(
        &self,
        query: &InboundQuery,
    ) -> Result<PaginatedResponse<InboundItem>> {
        let path = query.to_query().append_to("/api/Inbound");
        self.gateway.get_json(&path).await
    }

    pub async fn get_inbound(&self, id: i64) -> Result<InboundItem> {
        self.gateway.get_json(&format!("/api/Inbound/{}", id)).await
    }

    pub async fn update_inbound_status(&self, id: i64, status: InboundStatus) -> Result<()> {
        tracing::info!("📦 Inbound {} -> {}", id, status);
        self.gateway
            .put(
                "/api/Inbound/status",
                &json!({ "inboundId": id, "inboundStatus": status }),
            )
            .await?;
        Ok(())
    }

    pub async fn list_outbounds(
        &self,
        query: &OutboundQuery,
    ) -> Result<PaginatedResponse<OutboundItem>> {
        let path = query.to_query().append_to("/api/Outbound");
        self.gateway.get_json(&path).await
    }

    pub async fn get_outbound(&self, id: i64) -> Result<OutboundItem> {
        self.gateway.get_json(&format!("/api/Outbound/{}", id)).await
    }

    pub async fn update_outbound_status(&self, id: i64, status: OutboundStatus) -> Result<()> {
        tracing::info!("🚚 Outbound {} -> {}", id, status);
        self.gateway
            .put(
                &format!("/api/Outbound?id={}", id),
                &json!({ "status": status }),
            )
            .await?;
        Ok(())
    }

    pub async fn list_lot_transfers(
        &self,
        query: &LotTransferQuery,
    ) -> Result<PaginatedResponse<LotTransferItem>> {
        let path = query.to_query().append_to("/api/LotTransfer");
        self.gateway.get_json(&path).await
    }

    pub async fn get_lot_transfer(&self, id: i64) -> Result<LotTransferItem> {
        self.gateway
            .get_json(&format!("/api/LotTransfer/{}", id))
            .await
    }

    pub async fn update_lot_transfer_status(
        &self,
        id: i64,
        status: LotTransferStatus,
    ) -> Result<()> {
        tracing::info!("🔀 Lot transfer {} -> {}", id, status);
        self.gateway
            .put(
                "/api/LotTransfer",
                &json!({ "lotTransferId": id, "lotTransferStatus": status }),
            )
            .await?;
        Ok(())
    }

    pub async fn list_customers(&self, query: &PageQuery) -> Result<PaginatedResponse<Customer>> {
        let path = query.to_query().append_to("/api/Customer");
        self.gateway.get_json(&path).await
    }

    pub async fn whoami(&self) -> Result<UserProfile> {
        self.gateway.get_json("/whoami").await
    }

    /// 新建或修改入庫異常報告（multipart）
    pub async fn submit_inbound_report(&self, submission: &ReportSubmission) -> Result<SubmissionAck> {
        let parts = report_form(submission)?;

        let response = match submission.target {
            ReportTarget::NewForInbound(inbound_id) => {
                tracing::info!("📝 Creating report for inbound {}", inbound_id);
                self.gateway.post_form("/api/InboundReport", parts).await?
            }
            ReportTarget::Existing(report_id) => {
                tracing::info!("📝 Amending inbound report {}", report_id);
                self.gateway.put_form("/api/InboundReport", parts).await?
            }
        };

        let ack: SubmissionAck = response.json().unwrap_or_else(|e| {
            tracing::warn!("⚠️ Unreadable report acknowledgement: {}", e);
            SubmissionAck::default()
        });
        if ack.code != 200 {
            return Err(GatewayError::InvalidRequestError {
                message: ack
                    .message
                    .unwrap_or_else(|| "Đã xảy ra lỗi khi gửi báo cáo".to_string()),
            });
        }
        Ok(ack)
    }

    /// 下載報告附件。接受完整路徑，只取最後一段檔名
    pub async fn download_report_asset(&self, asset_path: &str) -> Result<Vec<u8>> {
        let path = asset_download_path(asset_path)?;
        let response = self.gateway.get(&path).await?;
        tracing::debug!("🖼️ Downloaded {} bytes from {}", response.body.len(), path);
        Ok(response.body)
    }

    /// 直接送出任意請求，回應照原樣傳回
    pub async fn raw(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse> {
        self.gateway
            .send(method, path, body.map(RequestBody::Json), RequestOptions::default())
            .await
    }
}

fn report_form(submission: &ReportSubmission) -> Result<Vec<FormPart>> {
    let description = submission.problem_description.trim();
    if description.is_empty() {
        return Err(GatewayError::InvalidRequestError {
            message: "Mô tả sự cố là bắt buộc".to_string(),
        });
    }
    if description.chars().count() > MAX_PROBLEM_DESCRIPTION_CHARS {
        return Err(GatewayError::InvalidRequestError {
            message: format!(
                "Problem description exceeds {} characters",
                MAX_PROBLEM_DESCRIPTION_CHARS
            ),
        });
    }
    if submission.images.len() > MAX_REPORT_IMAGES {
        return Err(GatewayError::InvalidRequestError {
            message: format!(
                "A report can carry at most {} images, got {}",
                MAX_REPORT_IMAGES,
                submission.images.len()
            ),
        });
    }

    let mut parts = Vec::with_capacity(submission.images.len() + 2);
    parts.push(match submission.target {
        ReportTarget::NewForInbound(id) => FormPart::text("InboundId", id.to_string()),
        ReportTarget::Existing(id) => FormPart::text("InboundReportId", id.to_string()),
    });
    parts.push(FormPart::text("ProblemDescription", description));
    for image in &submission.images {
        let content_type = if image.content_type.is_empty() {
            "image/jpeg"
        } else {
            image.content_type.as_str()
        };
        parts.push(FormPart::file(
            "Images",
            image.file_name.clone(),
            content_type,
            image.bytes.clone(),
        ));
    }
    Ok(parts)
}

fn asset_download_path(asset_path: &str) -> Result<String> {
    let file_name = asset_path.rsplit('/').next().unwrap_or_default();
    if file_name.is_empty() {
        return Err(GatewayError::InvalidRequestError {
            message: format!("No file name in asset path '{}'", asset_path),
        });
    }

    let mut url = url::Url::parse("http://assets.invalid/api/Asset/inbound-report/").map_err(|e| {
        GatewayError::InvalidRequestError {
            message: e.to_string(),
        }
    })?;
    url.path_segments_mut()
        .map_err(|_| GatewayError::InvalidRequestError {
            message: "Asset URL cannot hold path segments".to_string(),
        })?
        .pop_if_empty()
        .push(file_name);
    Ok(url.path().to_string())
}
