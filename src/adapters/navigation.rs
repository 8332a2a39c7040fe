use crate::domain::ports::NavigationShell;
use std::sync::Mutex;

/// 命令列殼層：記錄並在 stderr 提示使用者重新登入
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl NavigationShell for LoggingNavigator {
    fn redirect_to_sign_in(&self, message: Option<&str>) {
        match message {
            Some(message) => {
                tracing::warn!("🔒 Redirecting to sign-in: {}", message);
                eprintln!("🔒 {}", message);
            }
            None => tracing::info!("🔒 Redirecting to sign-in"),
        }
        eprintln!("💡 Run `whgate login` to sign in again");
    }
}

/// 保存每一次導向登入的要求，供嵌入端輪詢或檢查
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<Option<String>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<Option<String>> {
        self.redirects
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn redirect_count(&self) -> usize {
        self.redirects().len()
    }

    pub fn last_message(&self) -> Option<String> {
        self.redirects().last().cloned().flatten()
    }
}

impl NavigationShell for RecordingNavigator {
    fn redirect_to_sign_in(&self, message: Option<&str>) {
        tracing::info!("🔒 Sign-in redirect recorded: {:?}", message);
        let mut redirects = self
            .redirects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        redirects.push(message.map(str::to_string));
    }
}
