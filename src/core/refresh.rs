//! 單一飛行中的憑證更新協調器。
//!
//! 同一個閘道實例上，任何時刻最多只有一個更新請求在外。第一個遇到 401 的呼叫者
//! 成為本輪的 leader 並取得 [`RefreshLease`]；更新進行中遇到 401 的呼叫者排隊等待
//! 同一個結果。旗標、輪次與等待佇列由同一把鎖保護，鎖不會跨越 `.await`。

use crate::utils::error::GatewayError;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

/// 一輪更新失敗的原因，會原樣發給本輪所有等待者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub status: Option<u16>,
    pub reason: String,
}

impl RefreshFailure {
    pub fn new(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

impl From<RefreshFailure> for GatewayError {
    fn from(failure: RefreshFailure) -> Self {
        GatewayError::RefreshFailedError {
            status: failure.status,
            reason: failure.reason,
        }
    }
}

/// 等待者收到的結果：新的 access token 或失敗原因。
/// 發送端被丟棄（輪次被強制重置）時接收端會得到 `RecvError`。
pub type RefreshOutcome = Result<String, RefreshFailure>;

/// 強制重置更新輪次的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    /// 409：帳號已在他處登入
    SessionConflict,
    SignedIn,
    SignedOut,
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    cycle: u64,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    last_reset: Option<ResetCause>,
}

#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

/// 呼叫 [`RefreshCoordinator::join`] 的結果
pub enum RefreshTicket<'a> {
    /// 由呼叫者發出更新請求
    Leader(RefreshLease<'a>),
    /// 已有更新在進行，等待其結果
    Follower(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        // 臨界區內不會 panic，中毒時直接沿用內部狀態
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 檢查旗標、設定旗標或加入佇列，三者在同一個臨界區內完成
    pub fn join(&self) -> RefreshTicket<'_> {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            tracing::debug!(
                "🔁 Refresh cycle {} in flight, queued waiter #{}",
                state.cycle,
                state.waiters.len()
            );
            RefreshTicket::Follower(rx)
        } else {
            state.in_flight = true;
            state.cycle += 1;
            tracing::debug!("🔁 Starting refresh cycle {}", state.cycle);
            RefreshTicket::Leader(RefreshLease {
                coordinator: self,
                cycle: state.cycle,
                settled: false,
            })
        }
    }

    /// 無條件清除旗標與佇列，並讓進行中的 leader 失效。回傳被取消的等待者數量。
    pub fn reset(&self, cause: ResetCause) -> usize {
        let mut state = self.lock();
        let cancelled = state.waiters.len();
        state.waiters.clear();
        state.in_flight = false;
        state.cycle += 1;
        state.last_reset = Some(cause);
        cancelled
    }

    /// 最近一次強制重置的原因
    pub fn last_reset(&self) -> Option<ResetCause> {
        self.lock().last_reset
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// 目前排隊中的等待者數量
    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    fn superseded_by(&self, cycle: u64) -> Option<ResetCause> {
        let state = self.lock();
        if state.in_flight && state.cycle == cycle {
            None
        } else {
            // 輪次已被重置時 last_reset 一定有值
            Some(state.last_reset.unwrap_or(ResetCause::SessionConflict))
        }
    }

    fn settle(&self, cycle: u64, outcome: RefreshOutcome) -> bool {
        let mut state = self.lock();
        if !state.in_flight || state.cycle != cycle {
            return false;
        }
        state.in_flight = false;
        let waiters = std::mem::take(&mut state.waiters);
        drop(state);

        tracing::debug!(
            "🔁 Settling refresh cycle {} for {} waiter(s): {}",
            cycle,
            waiters.len(),
            if outcome.is_ok() { "refreshed" } else { "failed" }
        );
        for waiter in waiters {
            // 等待者的 future 已被丟棄時忽略
            let _ = waiter.send(outcome.clone());
        }
        true
    }
}

/// leader 持有的本輪租約。未 settle 就被丟棄時，本輪以失敗結束，旗標一定會被清除。
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    cycle: u64,
    settled: bool,
}

impl RefreshLease<'_> {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// 本輪被重置時回傳重置原因
    pub fn superseded_by(&self) -> Option<ResetCause> {
        self.coordinator.superseded_by(self.cycle)
    }

    /// 結束本輪並通知所有等待者。本輪已被重置時回傳 `false` 且不做任何事。
    pub fn settle(mut self, outcome: RefreshOutcome) -> bool {
        self.settled = true;
        self.coordinator.settle(self.cycle, outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("⚠️ Refresh cycle {} abandoned before completion", self.cycle);
            self.coordinator.settle(
                self.cycle,
                Err(RefreshFailure::new(None, "refresh abandoned before completion")),
            );
        }
    }
}
