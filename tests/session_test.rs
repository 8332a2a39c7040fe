use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use warehouse_gateway::adapters::{FileCredentialStore, RecordingNavigator, ReqwestTransport};
use warehouse_gateway::domain::model::CredentialPair;
use warehouse_gateway::domain::ports::CredentialStore;
use warehouse_gateway::{AuthGateway, GatewayConfig, GatewayError};

type FileGateway = AuthGateway<FileCredentialStore, ReqwestTransport, Arc<RecordingNavigator>>;

fn gateway_at(server: &MockServer, dir: &TempDir) -> (FileGateway, Arc<RecordingNavigator>) {
    let config = GatewayConfig::default()
        .with_base_url(server.base_url())
        .with_credentials_path(dir.path().join("whgate").join("credentials.json"));
    let navigator = Arc::new(RecordingNavigator::new());
    let gateway = AuthGateway::new(
        FileCredentialStore::new(config.storage.credentials_path.clone()),
        ReqwestTransport::from_config(&config).unwrap(),
        navigator.clone(),
        config,
    );
    (gateway, navigator)
}

/// 登入後的憑證在重新啟動後仍可使用
#[tokio::test]
async fn test_sign_in_survives_restart() -> Result<()> {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/Account/login")
                .header_missing("authorization")
                .json_body(json!({ "userName": "kho01", "password": "secret" }));
            then.status(200).json_body(json!({
                "token": "access-1",
                "refreshToken": "refresh-1",
                "role": "Staff"
            }));
        })
        .await;
    let whoami = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/whoami")
                .header("authorization", "Bearer access-1");
            then.status(200).json_body(json!({ "userName": "kho01" }));
        })
        .await;

    let temp_dir = TempDir::new()?;
    let (first, _) = gateway_at(&server, &temp_dir);
    let response = first.sign_in("kho01", "secret").await?;
    assert_eq!(response.role, "Staff");
    drop(first);

    // 模擬重新啟動
    let (second, _) = gateway_at(&server, &temp_dir);
    assert!(second.is_authenticated().await?);
    assert_eq!(
        second.store().get().await?,
        Some(CredentialPair::new("access-1", "refresh-1"))
    );

    let profile: serde_json::Value = second.get_json("/whoami").await?;
    assert_eq!(profile["userName"], "kho01");

    login.assert_async().await;
    whoami.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_rejected_sign_in_keeps_store_empty() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/Account/login");
            then.status(401)
                .json_body(json!({ "message": "Sai tên đăng nhập hoặc mật khẩu" }));
        })
        .await;

    let temp_dir = TempDir::new()?;
    let (gateway, navigator) = gateway_at(&server, &temp_dir);

    let err = gateway.sign_in("kho01", "wrong").await.unwrap_err();

    assert!(matches!(
        err,
        GatewayError::SignInRejectedError { status: Some(401), .. }
    ));
    assert!(!gateway.is_authenticated().await?);
    assert_eq!(navigator.redirect_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_sign_out_removes_credentials_file() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;
    let (gateway, navigator) = gateway_at(&server, &temp_dir);

    gateway
        .store()
        .set(&CredentialPair::new("access-1", "refresh-1"))
        .await?;
    assert!(gateway.store().path().exists());

    tokio_test::assert_ok!(gateway.sign_out().await);

    assert!(!gateway.store().path().exists());
    // 重複登出不是錯誤
    tokio_test::assert_ok!(gateway.sign_out().await);
    assert_eq!(navigator.redirects(), vec![None, None]);
    Ok(())
}
