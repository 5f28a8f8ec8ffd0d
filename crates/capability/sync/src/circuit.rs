//! 上游健康熔断。
//!
//! 一次健康检查失败即断开（暂停入队），下一次成功即恢复。
//! 已在执行的任务不受影响。

use std::sync::RwLock;

use tracing::{info, warn};

/// 熔断状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitState {
    /// 上游可达，允许入队
    pub active: bool,
    pub consecutive_failures: u32,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            active: true,
            consecutive_failures: 0,
        }
    }
}

/// 调度器、健康监视器与 HTTP `/ping` 共享的熔断器。
#[derive(Debug, Default)]
pub struct HealthCircuit {
    state: RwLock<CircuitState>,
}

impl HealthCircuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// 锁中毒时按断开处理。
    pub fn is_active(&self) -> bool {
        self.state.read().map(|state| state.active).unwrap_or(false)
    }

    pub fn snapshot(&self) -> CircuitState {
        self.state.read().map(|state| *state).unwrap_or(CircuitState {
            active: false,
            consecutive_failures: 0,
        })
    }

    pub fn record_success(&self) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        if !state.active {
            info!(target: "lis.sync", previous_failures = state.consecutive_failures, "upstream_connection_restored");
        }
        state.active = true;
        state.consecutive_failures = 0;
    }

    pub fn record_failure(&self, reason: &str) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if state.active {
            warn!(target: "lis.sync", reason, "upstream_connection_lost");
        }
        state.active = false;
    }
}
