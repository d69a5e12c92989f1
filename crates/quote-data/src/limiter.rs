//! 라우트 등급별 요청 한도.
//!
//! 고정 윈도우 알고리즘을 사용합니다. 윈도우가 지나면 카운트가 초기화되며,
//! 스크래핑 부하가 큰 `strict` 등급은 더 낮은 한도를 가집니다.

use quote_core::{RateLimitConfig, RouteTier};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// 요청 한도 확인 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// 요청 허용됨
    Allowed {
        /// 현재 윈도우에 남은 허용 수
        remaining: u32,
    },
    /// 한도 초과
    Limited {
        /// 재시도까지 대기 시간 (초)
        retry_after_secs: u64,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// 윈도우 식별자. 클라이언트별 모드가 아니면 클라이언트는 `None`.
type WindowKey = (RouteTier, Option<String>);

#[derive(Debug)]
struct RateWindow {
    window_start: Instant,
    count: u32,
    limit: u32,
}

impl RateWindow {
    fn new(limit: u32, now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            limit,
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.window_start)
    }
}

/// 고정 윈도우 Rate Limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<WindowKey, RateWindow>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WindowKey, RateWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 요청 허용 여부를 확인하고, 허용되면 카운트를 증가시킵니다.
    ///
    /// 확인과 증가는 하나의 잠금 안에서 이루어집니다.
    pub fn admit(&self, tier: RouteTier, client: &str) -> RateLimitResult {
        let window_len = self.config.window();
        let limit = self.config.limit_for(tier);
        let key: WindowKey = if self.config.per_client {
            (tier, Some(client.to_string()))
        } else {
            (tier, None)
        };

        let now = Instant::now();
        let mut windows = self.lock();
        let window = windows
            .entry(key)
            .or_insert_with(|| RateWindow::new(limit, now));

        if window.elapsed(now) >= window_len {
            window.window_start = now;
            window.count = 0;
        }

        if window.count < window.limit {
            window.count += 1;
            RateLimitResult::Allowed {
                remaining: window.limit - window.count,
            }
        } else {
            let remaining = window_len.saturating_sub(window.elapsed(now));
            // 올림, 최소 1초
            let retry_after_secs = remaining.as_millis().div_ceil(1000).max(1) as u64;
            warn!(
                tier = %tier,
                client = %client,
                limit = window.limit,
                retry_after_secs,
                "Rate limit exceeded"
            );
            RateLimitResult::Limited { retry_after_secs }
        }
    }

    /// 윈도우가 완전히 지난 항목을 제거하고 제거한 개수를 반환합니다.
    pub fn purge_idle(&self) -> usize {
        let window_len = self.config.window();
        let now = Instant::now();
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, window| window.elapsed(now) < window_len);
        before - windows.len()
    }

    /// 현재 추적 중인 윈도우 수.
    pub fn tracked_windows(&self) -> usize {
        self.lock().len()
    }
}
