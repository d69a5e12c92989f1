//! 지수 백오프 + 지터 재시도.
//!
//! 시도 인덱스 `i`(0부터)가 일시적 에러로 실패하고 남은 시도가 있으면
//! `base_delay × 2^i + jitter` 만큼 대기합니다. 지터는 `[0, max_jitter]`
//! 구간의 균등 분포입니다.

use quote_core::{FetchError, FetchResult, RetryConfig};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 재시도 정책.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함, 최소 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
    /// 타임아웃을 재시도 대상으로 볼지 여부
    pub retry_on_timeout: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
            retry_on_timeout: config.retry_on_timeout,
        }
    }
}

impl RetryPolicy {
    /// 재시도 없이 한 번만 시도하는 정책.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// 지터를 제외한 대기 시간: `base_delay × 2^attempt_index`.
    pub fn backoff(&self, attempt_index: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt_index).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// 지터를 포함한 실제 대기 시간.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.backoff(attempt_index).saturating_add(jitter)
    }

    /// 이 에러를 재시도해야 하는지 확인합니다.
    pub fn should_retry(&self, err: &FetchError) -> bool {
        err.is_transient() || (self.retry_on_timeout && err.is_timeout())
    }
}

/// 정책에 따라 `attempt`를 반복 실행합니다.
///
/// `attempt`는 0부터 시작하는 시도 인덱스를 받습니다. 마지막 시도의 에러가
/// 그대로 반환되며, 재시도 대상이 아닌 에러는 즉시 반환됩니다.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, attempt: F) -> FetchResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    with_retry_notify(policy, attempt, |_, _, _| {}).await
}

/// [`with_retry`]와 같지만, 재시도 직전에 `on_retry(attempt_index, error, delay)`를
/// 호출합니다.
pub async fn with_retry_notify<T, F, Fut, N>(
    policy: &RetryPolicy,
    mut attempt: F,
    mut on_retry: N,
) -> FetchResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = FetchResult<T>>,
    N: FnMut(u32, &FetchError, Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut index = 0;

    loop {
        match attempt(index).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let is_last = index + 1 >= max_attempts;
                if is_last || !policy.should_retry(&err) {
                    return Err(err);
                }

                let delay = policy.delay_for(index);
                warn!(
                    attempt = index + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Fetch attempt failed, retrying"
                );
                on_retry(index, &err, delay);
                tokio::time::sleep(delay).await;
                index += 1;
            }
        }
    }
}
