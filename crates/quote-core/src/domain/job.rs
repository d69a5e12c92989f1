//! 스크래핑 작업 상태 머신.
//!
//! 상태 전이: `Spawning → Running → {Succeeded, Failed, TimedOut}`.
//! 종료 상태에서 다른 상태로의 전이는 거부됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::types::EndpointClass;

/// 스크래핑 작업 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 프로세스 생성 중
    Spawning,
    /// 실행 중
    Running,
    /// 정상 종료 및 출력 파싱 성공
    Succeeded,
    /// 실행 실패, 비정상 종료, 출력 오류
    Failed,
    /// 마감 시간 초과로 종료됨
    TimedOut,
}

impl JobStatus {
    /// 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    /// `self`에서 `next`로 전이할 수 있는지 확인합니다.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Spawning, JobStatus::Running) => true,
            // 실행 자체가 실패한 경우
            (JobStatus::Spawning, JobStatus::Failed) => true,
            (JobStatus::Running, JobStatus::Succeeded)
            | (JobStatus::Running, JobStatus::Failed)
            | (JobStatus::Running, JobStatus::TimedOut) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Spawning => "spawning",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// 잘못된 상태 전이.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid job transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// 외부 스크래퍼 프로세스 한 번의 실행.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    /// 작업 ID
    pub id: Uuid,
    /// 요청 심볼 (정규화됨)
    pub symbols: Vec<String>,
    /// 엔드포인트
    pub endpoint: EndpointClass,
    /// 생성 시각
    pub spawned_at: DateTime<Utc>,
    /// 마감 시각
    pub deadline: DateTime<Utc>,
    /// 현재 상태
    pub status: JobStatus,
}

impl ScrapeJob {
    /// 새 작업을 생성합니다. 마감 시각은 지금부터 `timeout` 후입니다.
    pub fn new(endpoint: EndpointClass, symbols: Vec<String>, timeout: Duration) -> Self {
        let spawned_at = Utc::now();
        let deadline = spawned_at
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            id: Uuid::new_v4(),
            symbols,
            endpoint,
            spawned_at,
            deadline,
            status: JobStatus::Spawning,
        }
    }

    /// 상태를 전이합니다.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// 스크래퍼에 전달할 심볼 JSON 배열.
    pub fn symbols_json(&self) -> String {
        serde_json::to_string(&self.symbols).unwrap_or_else(|_| "[]".to_string())
    }
}
