//! 진행 중인 페치 병합 (in-flight coalescing).
//!
//! 같은 키에 대한 페치가 이미 진행 중이면 새 호출자는 구독자로 합류하고
//! 별도의 작업을 하지 않습니다. 페치가 끝나면 모든 구독자가 동일한 결과
//! 또는 동일한 에러를 받습니다.
//!
//! 잠금 순서는 항상 레지스트리 → 캐시입니다. `lookup`과 `commit`은
//! 레지스트리 잠금 안에서 호출됩니다.

use quote_core::{CacheKey, FetchError, FetchResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error};

/// 호출자가 결과를 얻은 경로.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRole {
    /// 레지스트리 잠금 안의 재확인에서 캐시 적중
    Cached,
    /// 새 페치를 시작함
    Leader,
    /// 진행 중인 페치에 합류함
    Follower,
}

/// 병합된 페치의 결과.
#[derive(Debug, Clone)]
pub struct CoalescedFetch<T> {
    pub role: JoinRole,
    pub result: FetchResult<T>,
}

struct PendingFetch<T> {
    subscribers: Vec<oneshot::Sender<FetchResult<T>>>,
    started_at: Instant,
}

type Registry<T> = Arc<Mutex<HashMap<CacheKey, PendingFetch<T>>>>;

fn lock<T>(registry: &Registry<T>) -> MutexGuard<'_, HashMap<CacheKey, PendingFetch<T>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 진행 중인 페치 레지스트리.
///
/// 키마다 최대 하나의 `PendingFetch`만 존재합니다.
pub struct Coalescer<T> {
    registry: Registry<T>,
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// 진행 중인 페치가 있으면 합류하고, 없으면 `producer`로 새 페치를 시작합니다.
    pub async fn fetch_or_join<P, Fut>(&self, key: CacheKey, producer: P) -> FetchResult<T>
    where
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        self.fetch_or_join_with(key, || None, producer, |_: &T| {})
            .await
            .result
    }

    /// 캐시 재확인과 캐시 반영을 포함한 확장 형태.
    ///
    /// - `lookup`: 레지스트리 잠금 안에서 새 페치를 등록하기 직전에 호출됩니다.
    ///   값을 반환하면 페치 없이 그 값을 돌려줍니다.
    /// - `commit`: 성공 시 `PendingFetch`가 제거된 직후, 구독자가 깨어나기 전에
    ///   레지스트리 잠금 안에서 호출됩니다.
    ///
    /// `producer`는 별도 태스크에서 실행되므로 호출자의 future가 drop되어도
    /// 다른 구독자는 결과를 받습니다. 태스크가 비정상 종료하면 모든 구독자가
    /// `Internal` 에러를 받습니다.
    pub async fn fetch_or_join_with<L, P, Fut, C>(
        &self,
        key: CacheKey,
        lookup: L,
        producer: P,
        commit: C,
    ) -> CoalescedFetch<T>
    where
        L: FnOnce() -> Option<T>,
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
        C: FnOnce(&T) + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let role = {
            let mut registry = lock(&self.registry);

            if let Some(value) = lookup() {
                return CoalescedFetch {
                    role: JoinRole::Cached,
                    result: Ok(value),
                };
            }

            if let Some(pending) = registry.get_mut(&key) {
                pending.subscribers.push(tx);
                debug!(
                    cache_key = %key,
                    subscribers = pending.subscribers.len(),
                    "Joined in-flight fetch"
                );
                JoinRole::Follower
            } else {
                registry.insert(
                    key.clone(),
                    PendingFetch {
                        subscribers: vec![tx],
                        started_at: Instant::now(),
                    },
                );
                self.spawn_driver(key, producer, commit);
                JoinRole::Leader
            }
        };

        let result = match rx.await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Internal(
                "in-flight fetch was dropped before settling".to_string(),
            )),
        };

        CoalescedFetch { role, result }
    }

    fn spawn_driver<P, Fut, C>(&self, key: CacheKey, producer: P, commit: C)
    where
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
        C: FnOnce(&T) + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let result = match tokio::spawn(async move { producer().await }).await {
                Ok(result) => result,
                Err(join_err) => {
                    error!(cache_key = %key, error = %join_err, "Fetch task terminated abnormally");
                    Err(FetchError::Internal(format!("fetch task failed: {}", join_err)))
                }
            };
            settle(&registry, &key, result, commit);
        });
    }

    /// 진행 중인 페치 수.
    pub fn pending_count(&self) -> usize {
        lock(&self.registry).len()
    }

    /// 해당 키의 페치가 진행 중인지 확인합니다.
    pub fn is_pending(&self, key: &CacheKey) -> bool {
        lock(&self.registry).contains_key(key)
    }
}

/// 페치 종료 처리: 항목 제거 → 캐시 반영 → 구독자 해제.
fn settle<T, C>(registry: &Registry<T>, key: &CacheKey, result: FetchResult<T>, commit: C)
where
    T: Clone,
    C: FnOnce(&T),
{
    let pending = {
        let mut registry = lock(registry);
        let pending = registry.remove(key);
        if let Ok(value) = &result {
            commit(value);
        }
        pending
    };

    let Some(pending) = pending else {
        return;
    };

    debug!(
        cache_key = %key,
        subscribers = pending.subscribers.len(),
        elapsed_ms = pending.started_at.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "In-flight fetch settled"
    );

    for subscriber in pending.subscribers {
        // 이미 떠난 구독자는 무시
        let _ = subscriber.send(result.clone());
    }
}
