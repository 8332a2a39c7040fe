use crate::core::gateway::AuthGateway;
use crate::core::refresh::ResetCause;
use crate::domain::model::{ApiRequest, LoginResponse, Method, RequestBody};
use crate::domain::ports::{CredentialStore, HttpTransport, NavigationShell};
use crate::utils::error::{GatewayError, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    user_name: &'a str,
    password: &'a str,
}

impl<S: CredentialStore, T: HttpTransport, N: NavigationShell> AuthGateway<S, T, N> {
    /// 以帳號密碼登入並保存取得的憑證。登入請求不經過更新流程
    pub async fn sign_in(&self, user_name: &str, password: &str) -> Result<LoginResponse> {
        if user_name.trim().is_empty() {
            return Err(GatewayError::InvalidRequestError {
                message: "User name cannot be empty".to_string(),
            });
        }

        let login_path = &self.config().auth.login_path;
        let mut request = ApiRequest::new(Method::Post, login_path.clone()).with_body(
            RequestBody::json(&SignInRequest {
                user_name,
                password,
            })?,
        );
        request.headers = self.default_headers();
        request.timeout = Some(self.config().request_timeout());

        tracing::info!("🔐 Signing in as {}", user_name);
        let response = self.transport().request(&request).await.map_err(|e| {
            let message = e
                .server_message()
                .unwrap_or_else(|| "Tên đăng nhập hoặc mật khẩu không đúng".to_string());
            match e.status() {
                Some(status) => GatewayError::SignInRejectedError {
                    status: Some(status),
                    message,
                },
                None => GatewayError::ApiError(e),
            }
        })?;

        let login: LoginResponse = response.json()?;
        if login.token.is_empty() {
            return Err(GatewayError::SignInRejectedError {
                status: Some(response.status),
                message: "Login response did not contain an access token".to_string(),
            });
        }

        {
            // 舊 session 遺留的更新輪次不得覆寫新憑證
            let _guard = self.lock_credentials().await;
            self.reset_refresh(ResetCause::SignedIn);
            self.store().set(&login.credentials()).await?;
        }
        tracing::info!("✅ Signed in as {} ({})", user_name, login.role);
        Ok(login)
    }

    /// 清除憑證並導回登入畫面
    pub async fn sign_out(&self) -> Result<()> {
        {
            let _guard = self.lock_credentials().await;
            self.reset_refresh(ResetCause::SignedOut);
            self.store().clear().await?;
        }
        tracing::info!("👋 Signed out");
        self.navigator().redirect_to_sign_in(None);
        Ok(())
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self
            .store()
            .get()
            .await?
            .is_some_and(|credentials| !credentials.access_token.is_empty()))
    }
}
