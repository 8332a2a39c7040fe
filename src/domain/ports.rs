use crate::domain::model::{ApiRequest, ApiResponse, CredentialPair};
use crate::utils::error::{Result, TransportError};
use async_trait::async_trait;
use std::sync::Arc;

/// 憑證儲存：整組讀取、整組覆寫、整組清除
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Result<Option<CredentialPair>>;
    async fn set(&self, credentials: &CredentialPair) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// HTTP 傳輸層。非 2xx 回應以 `TransportError::Status` 回報
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn request(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}

/// 導覽殼層：登入狀態失效時切回登入畫面
pub trait NavigationShell: Send + Sync {
    fn redirect_to_sign_in(&self, message: Option<&str>);
}

#[async_trait]
impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    async fn get(&self) -> Result<Option<CredentialPair>> {
        (**self).get().await
    }

    async fn set(&self, credentials: &CredentialPair) -> Result<()> {
        (**self).set(credentials).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn request(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        (**self).request(request).await
    }
}

impl<N: NavigationShell + ?Sized> NavigationShell for Arc<N> {
    fn redirect_to_sign_in(&self, message: Option<&str>) {
        (**self).redirect_to_sign_in(message)
    }
}
