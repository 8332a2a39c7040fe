//! 帶身分驗證的請求閘道。
//!
//! 每個請求都會附上目前的 access token。收到 401 時，同一時間只發出一次更新請求，
//! 其他同時失敗的請求排隊等待同一個結果後各自重送；收到 409 時代表帳號已在他處登入，
//! 立即清除憑證並導回登入畫面。

use crate::config::toml_config::GatewayConfig;
use crate::core::refresh::{
    RefreshCoordinator, RefreshFailure, RefreshLease, RefreshTicket, ResetCause,
};
use crate::domain::model::{
    ApiRequest, ApiResponse, CredentialPair, FormPart, Method, RequestBody, RequestOptions,
};
use crate::domain::ports::{CredentialStore, HttpTransport, NavigationShell};
use crate::utils::error::{GatewayError, Result, TransportError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::{Mutex, MutexGuard};

/// 每個邏輯請求最多經歷的更新次數
pub const MAX_AUTH_RETRIES: u32 = 1;

pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_CONFLICT: u16 = 409;

/// 傳輸層錯誤的分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthFailure {
    /// 409：帳號已在他處登入
    SessionInvalidated,
    /// 401 且尚未重試
    Expired,
    /// 重試後仍然 401
    Rejected,
    Unrelated,
}

pub struct AuthGateway<S: CredentialStore, T: HttpTransport, N: NavigationShell> {
    store: S,
    transport: T,
    navigator: N,
    config: GatewayConfig,
    refresh: RefreshCoordinator,
    /// 憑證寫入與更新輪次重置共用，確保過期的更新結果不會蓋掉新憑證
    credential_write: Mutex<()>,
}

impl<S: CredentialStore, T: HttpTransport, N: NavigationShell> AuthGateway<S, T, N> {
    pub fn new(store: S, transport: T, navigator: N, config: GatewayConfig) -> Self {
        Self {
            store,
            transport,
            navigator,
            config,
            refresh: RefreshCoordinator::new(),
            credential_write: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.refresh.is_in_flight()
    }

    pub fn queued_refresh_waiters(&self) -> usize {
        self.refresh.queued()
    }

    /// 讓進行中的更新輪次失效，回傳被取消的等待者數量。呼叫端須持有 `lock_credentials`
    pub(crate) fn reset_refresh(&self, cause: ResetCause) -> usize {
        self.refresh.reset(cause)
    }

    pub(crate) async fn lock_credentials(&self) -> MutexGuard<'_, ()> {
        self.credential_write.lock().await
    }

    /// 設定中的預設 header，名稱一律小寫
    pub(crate) fn default_headers(&self) -> BTreeMap<String, String> {
        lowercase_headers(&self.config.api.headers)
    }

    /// 送出請求並附上目前的 access token，2xx 回應原樣回傳
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let request = self.build_request(method, path, body, options)?;
        let access_token = self
            .store
            .get()
            .await?
            .map(|credentials| credentials.access_token)
            .filter(|token| !token.is_empty());

        if access_token.is_none() {
            tracing::debug!("🔓 {} {}: no stored credentials, sending anonymously", method, path);
        }

        self.dispatch(request, access_token).await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::Get, path, None, RequestOptions::default()).await
    }

    pub async fn get_with(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
        self.send(Method::Get, path, None, options).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = RequestBody::Json(serde_json::to_value(body)?);
        self.send(Method::Post, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = RequestBody::Json(serde_json::to_value(body)?);
        self.send(Method::Put, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = RequestBody::Json(serde_json::to_value(body)?);
        self.send(Method::Patch, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::Delete, path, None, RequestOptions::default())
            .await
    }

    pub async fn post_form(&self, path: &str, parts: Vec<FormPart>) -> Result<ApiResponse> {
        self.send(
            Method::Post,
            path,
            Some(RequestBody::Form(parts)),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn put_form(&self, path: &str, parts: Vec<FormPart>) -> Result<ApiResponse> {
        self.send(
            Method::Put,
            path,
            Some(RequestBody::Form(parts)),
            RequestOptions::default(),
        )
        .await
    }

    /// GET 並將回應解析為 `R`
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        self.get(path).await?.json()
    }

    /// 以 JSON 主體送出並將回應解析為 `R`
    pub async fn send_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let body = RequestBody::Json(serde_json::to_value(body)?);
        self.send(method, path, Some(body), RequestOptions::default())
            .await?
            .json()
    }

    /// 預設 header 先套用，呼叫端的 header 覆寫之
    pub(crate) fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<ApiRequest> {
        if path.trim().is_empty() {
            return Err(GatewayError::InvalidRequestError {
                message: "Request path cannot be empty".to_string(),
            });
        }

        let mut request = ApiRequest::new(method, path);
        request.headers = self.default_headers();
        request.headers.extend(lowercase_headers(&options.headers));
        request.body = body;
        request.timeout = Some(options.timeout.unwrap_or_else(|| self.config.request_timeout()));
        Ok(request)
    }

    /// 送出請求；重試次數以參數方式傳遞，不修改原請求
    async fn dispatch(
        &self,
        request: ApiRequest,
        mut access_token: Option<String>,
    ) -> Result<ApiResponse> {
        let mut retries = 0u32;

        loop {
            let outgoing = match access_token.as_deref() {
                Some(token) => request.with_bearer(token),
                None => request.clone(),
            };

            let err = match self.transport.request(&outgoing).await {
                Ok(response) => {
                    if retries > 0 {
                        tracing::info!(
                            "✅ {} {} succeeded after refreshing credentials",
                            request.method,
                            request.path
                        );
                    }
                    return Ok(response);
                }
                Err(err) => err,
            };

            match self.classify(&err, retries) {
                AuthFailure::SessionInvalidated => {
                    return Err(self.on_session_invalidated(&request).await);
                }
                AuthFailure::Expired => {
                    retries += 1;
                    tracing::info!(
                        "🔑 {} {} returned 401, refreshing credentials",
                        request.method,
                        request.path
                    );
                    access_token = Some(self.on_auth_failure(&request).await?);
                }
                AuthFailure::Rejected => {
                    tracing::warn!(
                        "❌ {} {} still unauthorized after refresh, ending session",
                        request.method,
                        request.path
                    );
                    self.end_rejected_session(access_token.as_deref()).await;
                    return Err(GatewayError::UnauthorizedError {
                        path: request.path.clone(),
                    });
                }
                AuthFailure::Unrelated => return Err(err.into()),
            }
        }
    }

    fn classify(&self, err: &TransportError, retries: u32) -> AuthFailure {
        match err.status() {
            Some(STATUS_CONFLICT) if self.config.auth.handle_session_conflict => {
                AuthFailure::SessionInvalidated
            }
            Some(STATUS_UNAUTHORIZED) if retries < MAX_AUTH_RETRIES => AuthFailure::Expired,
            Some(STATUS_UNAUTHORIZED) => AuthFailure::Rejected,
            _ => AuthFailure::Unrelated,
        }
    }

    /// 加入或發起一輪更新，回傳新的 access token
    async fn on_auth_failure(&self, request: &ApiRequest) -> Result<String> {
        let lease = match self.refresh.join() {
            RefreshTicket::Leader(lease) => lease,
            RefreshTicket::Follower(waiter) => {
                tracing::debug!(
                    "⏳ {} {} waiting for in-flight refresh",
                    request.method,
                    request.path
                );
                return match waiter.await {
                    Ok(Ok(access_token)) => Ok(access_token),
                    Ok(Err(failure)) => Err(failure.into()),
                    // 佇列被強制清空
                    Err(_) => Err(self.superseded_error(
                        self.refresh
                            .last_reset()
                            .unwrap_or(ResetCause::SessionConflict),
                    )),
                };
            }
        };

        let fetched = self.fetch_refreshed_credentials(&lease).await;

        // 輪次檢查、寫入與 settle 必須在同一把鎖內完成
        let _guard = self.credential_write.lock().await;
        if let Some(cause) = lease.superseded_by() {
            tracing::info!(
                "🔁 Refresh cycle {} superseded ({:?}), discarding its result",
                lease.cycle(),
                cause
            );
            lease.settle(Err(RefreshFailure::new(None, "refresh cycle was reset")));
            return Err(self.superseded_error(cause));
        }

        let persisted = match fetched {
            Ok(credentials) => self
                .store
                .set(&credentials)
                .await
                .map(|()| credentials)
                .map_err(|e| {
                    RefreshFailure::new(
                        None,
                        format!("could not persist refreshed credentials: {}", e),
                    )
                }),
            Err(failure) => Err(failure),
        };

        match persisted {
            Ok(credentials) => {
                tracing::info!("🔑 Credentials refreshed (cycle {})", lease.cycle());
                lease.settle(Ok(credentials.access_token.clone()));
                Ok(credentials.access_token)
            }
            Err(failure) => {
                tracing::warn!("❌ Credential refresh failed: {}", failure.reason);
                lease.settle(Err(failure.clone()));
                self.clear_and_redirect(&self.config.messages.session_expired)
                    .await;
                Err(failure.into())
            }
        }
    }

    /// 呼叫更新端點並組出新的憑證，不寫入儲存
    async fn fetch_refreshed_credentials(
        &self,
        lease: &RefreshLease<'_>,
    ) -> std::result::Result<CredentialPair, RefreshFailure> {
        let refresh_config = &self.config.auth.refresh;

        let current = self.store.get().await.map_err(|e| {
            RefreshFailure::new(None, format!("could not read stored credentials: {}", e))
        })?;
        let refresh_token = current
            .as_ref()
            .map(|c| c.refresh_token.clone())
            .filter(|t| !t.is_empty());
        if refresh_token.is_none() {
            tracing::warn!("⚠️ No refresh credential stored, refresh will most likely be rejected");
        }

        let mut body = serde_json::Map::new();
        body.insert(
            refresh_config.request_field.clone(),
            refresh_token.map(Value::String).unwrap_or(Value::Null),
        );

        let mut request = ApiRequest::new(Method::Post, refresh_config.path.clone())
            .with_body(RequestBody::Json(Value::Object(body)));
        request.headers = self.default_headers();
        request.timeout = Some(self.config.request_timeout());

        tracing::debug!(
            "🔁 Refresh cycle {}: POST {}",
            lease.cycle(),
            refresh_config.path
        );
        let response = self.transport.request(&request).await.map_err(|e| {
            RefreshFailure::new(e.status(), format!("refresh endpoint failed: {}", e))
        })?;

        let payload: Value = response.json().map_err(|e| {
            RefreshFailure::new(
                Some(response.status),
                format!("malformed refresh response: {}", e),
            )
        })?;

        let access_token = lookup_string(&payload, &refresh_config.access_token_field)
            .ok_or_else(|| {
                RefreshFailure::new(
                    Some(response.status),
                    format!(
                        "refresh response has no '{}' field",
                        refresh_config.access_token_field
                    ),
                )
            })?;

        let rotated = match &refresh_config.refresh_token_field {
            Some(field) => Some(lookup_string(&payload, field).ok_or_else(|| {
                RefreshFailure::new(
                    Some(response.status),
                    format!("refresh response has no '{}' field", field),
                )
            })?),
            None => None,
        };

        Ok(match &current {
            Some(existing) => existing.refreshed(access_token, rotated),
            None => CredentialPair::new(access_token, rotated.unwrap_or_default()),
        })
    }

    async fn on_session_invalidated(&self, request: &ApiRequest) -> GatewayError {
        let _guard = self.credential_write.lock().await;
        let cancelled = self.refresh.reset(ResetCause::SessionConflict);
        tracing::warn!(
            "🚪 {} {} returned 409, session superseded elsewhere ({} queued request(s) cancelled)",
            request.method,
            request.path,
            cancelled
        );

        self.clear_and_redirect(&self.config.messages.signed_out_elsewhere)
            .await;
        self.session_invalidated_error()
    }

    /// 重送後仍然 401。只有當儲存的憑證仍是這次送出的那組時才結束 session，
    /// 同一輪更新後的多個重送只會導向一次，也不會清掉之後重新登入的憑證
    async fn end_rejected_session(&self, sent_token: Option<&str>) {
        let _guard = self.credential_write.lock().await;
        match self.store.get().await {
            Ok(stored) if stored.as_ref().map(|c| c.access_token.as_str()) != sent_token => {
                tracing::debug!("🔐 Session already ended or replaced, skipping teardown");
                return;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("⚠️ Could not read credentials before teardown: {}", e),
        }

        self.clear_and_redirect(&self.config.messages.session_expired)
            .await;
    }

    /// 清除憑證並導回登入畫面。呼叫端須持有憑證鎖；清除失敗只記錄，不覆蓋原本的錯誤
    async fn clear_and_redirect(&self, message: &str) {
        if let Err(e) = self.store.clear().await {
            tracing::error!("❌ Failed to clear credentials: {}", e);
        }
        self.navigator.redirect_to_sign_in(Some(message));
    }

    fn session_invalidated_error(&self) -> GatewayError {
        GatewayError::SessionInvalidatedError {
            message: self.config.messages.signed_out_elsewhere.clone(),
        }
    }

    fn superseded_error(&self, cause: ResetCause) -> GatewayError {
        match cause {
            ResetCause::SessionConflict => self.session_invalidated_error(),
            ResetCause::SignedIn => GatewayError::RefreshSupersededError {
                reason: "a new sign-in replaced the session".to_string(),
            },
            ResetCause::SignedOut => GatewayError::RefreshSupersededError {
                reason: "signed out while refreshing".to_string(),
            },
        }
    }
}

fn lowercase_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect()
}

/// 以 `.` 分隔的欄位路徑讀取非空字串，例如 `data.token`
fn lookup_string(payload: &Value, field: &str) -> Option<String> {
    let pointer = format!("/{}", field.replace('.', "/"));
    payload
        .pointer(&pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
