use crate::config::toml_config::GatewayConfig;
use crate::domain::model::{ApiRequest, ApiResponse, FormValue, Method, RequestBody, CONTENT_TYPE};
use crate::domain::ports::HttpTransport;
use crate::utils::error::{Result, TransportError};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

/// 以 reqwest 實作的傳輸層，路徑相對於 base URL
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    default_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, default_timeout: Duration) -> Result<Self> {
        validate_url("api.base_url", base_url)?;
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::new(&config.api.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 組合完整 URL（路徑可帶查詢字串）
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build_form(parts: &[crate::domain::model::FormPart]) -> std::result::Result<Form, TransportError> {
        let mut form = Form::new();
        for part in parts {
            form = match &part.value {
                FormValue::Text(text) => form.text(part.name.clone(), text.clone()),
                FormValue::File {
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let file_part = Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(content_type)?;
                    form.part(part.name.clone(), file_part)
                }
            };
        }
        Ok(form)
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path);
        let is_multipart = matches!(request.body, Some(RequestBody::Form(_)));

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url)
            .timeout(request.timeout.unwrap_or(self.default_timeout));

        for (name, value) in &request.headers {
            // multipart 的 Content-Type 需要由 reqwest 產生 boundary
            if is_multipart && name == CONTENT_TYPE {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(parts)) => builder.multipart(Self::build_form(parts)?),
            None => builder,
        };

        tracing::debug!("📡 {} {}", request.method, url);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        tracing::debug!("📡 {} {} -> {}", request.method, url, status);

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        if !(200..300).contains(&status) {
            return Err(TransportError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::FormPart;
    use crate::domain::model::Method;
    use httpmock::prelude::*;

    #[test]
    fn test_url_joining() {
        let transport =
            ReqwestTransport::new("http://localhost:5001/", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:5001");
        assert_eq!(
            transport.url_for("/api/Inbound/3"),
            "http://localhost:5001/api/Inbound/3"
        );
        assert_eq!(
            transport.url_for("api/Outbound?id=4"),
            "http://localhost:5001/api/Outbound?id=4"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(ReqwestTransport::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_non_success_status_becomes_status_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/Inbound/404");
                then.status(404).json_body(serde_json::json!({"message": "not found"}));
            })
            .await;

        let transport = ReqwestTransport::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        let err = transport
            .request(&ApiRequest::new(Method::Get, "/api/Inbound/404"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert_eq!(err.server_message().as_deref(), Some("not found"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_json_body_and_headers_are_sent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/api/Inbound/status")
                    .header("authorization", "Bearer abc")
                    .json_body(serde_json::json!({"inboundId": 3, "inboundStatus": 3}));
                then.status(200).body("ok");
            })
            .await;

        let transport = ReqwestTransport::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        let request = ApiRequest::new(Method::Put, "/api/Inbound/status")
            .with_body(RequestBody::Json(
                serde_json::json!({"inboundId": 3, "inboundStatus": 3}),
            ))
            .with_bearer("abc");

        let response = transport.request(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_multipart_form_is_sent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/InboundReport")
                    .header_exists("content-type")
                    .body_includes("ProblemDescription")
                    .body_includes("photo_1.jpg");
                then.status(200).json_body(serde_json::json!({"code": 200}));
            })
            .await;

        let transport = ReqwestTransport::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        let request = ApiRequest::new(Method::Post, "/api/InboundReport")
            .with_header("Content-Type", "application/json")
            .with_body(RequestBody::Form(vec![
                FormPart::text("InboundId", "12"),
                FormPart::text("ProblemDescription", "Thùng bị móp"),
                FormPart::file("Images", "photo_1.jpg", "image/jpeg", b"jpeg-bytes".to_vec()),
            ]));

        transport.request(&request).await.unwrap();
        mock.assert_async().await;
    }
}
