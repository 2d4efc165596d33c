//! 부분 실패 재시도를 지원하는 배치 전송기
//!
//! # 재시도 흐름
//! ```text
//! Sending ─▶ PartialFailure(k) ─▶ Backoff ─▶ Sending ─▶ ...
//!    │                                                   │
//!    └──▶ Delivered                      Exhausted ◀─────┘
//! ```
//!
//! - 첫 시도(attempt 0)는 배치 전체를 보냅니다.
//! - 일부가 거부되면 거부된 엔트리만 원래 상대 순서대로 다시 보냅니다.
//! - 재시도 전 `base_delay * 2^attempt`만큼 대기합니다 (취소 가능).
//! - `max_attempts`회 시도 후에도 남은 엔트리는 유실로 기록합니다.
//!
//! 어떤 엔트리를 다시 보낼지는 순수 함수 [`failed_entries`]가,
//! 대기 시간은 [`RetryPolicy::backoff`]가 결정합니다.

use std::time::Duration;

use metrics::{counter, histogram};
use tailpost_core::metrics as m;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::batch::{Batch, StreamEntry};
use crate::config::IngestConfig;
use crate::transport::{EntryOutcome, StreamTransport, TransportError};

/// 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 배치당 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 기본 대기 시간
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// 새 정책을 생성합니다.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// 수집 설정으로부터 생성합니다.
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }

    /// `attempt`번째 시도가 실패한 뒤 재시도 전에 기다릴 시간
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(500))
    }
}

/// 다음 시도에 보낼 엔트리를 계산합니다.
///
/// 결과가 거부이거나 누락된 엔트리만 원래 순서대로 남깁니다.
pub fn failed_entries(pending: Vec<StreamEntry>, outcomes: &[EntryOutcome]) -> Vec<StreamEntry> {
    pending
        .into_iter()
        .enumerate()
        .filter(|(i, _)| outcomes.get(*i).is_none_or(|o| !o.is_accepted()))
        .map(|(_, entry)| entry)
        .collect()
}

/// 배치 하나의 최종 전송 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 모든 엔트리 전달 완료
    Delivered {
        /// 사용한 시도 횟수
        attempts: u32,
        /// 전달된 레코드 수
        records: usize,
    },
    /// 재시도 한도 초과, 남은 엔트리 유실
    Exhausted {
        /// 사용한 시도 횟수
        attempts: u32,
        /// 전달된 레코드 수
        delivered: usize,
        /// 유실된 레코드 수
        lost: usize,
    },
    /// 재시도 불가 에러로 중단, 남은 엔트리 유실
    Aborted {
        /// 사용한 시도 횟수
        attempts: u32,
        /// 전달된 레코드 수
        delivered: usize,
        /// 유실된 레코드 수
        lost: usize,
        /// 중단 원인
        error: TransportError,
    },
    /// 백오프 대기 중 종료 요청
    Interrupted {
        /// 사용한 시도 횟수
        attempts: u32,
        /// 전달된 레코드 수
        delivered: usize,
        /// 전송되지 않은 레코드 수
        pending: usize,
    },
}

impl PublishOutcome {
    /// 전달된 레코드 수
    pub fn delivered(&self) -> usize {
        match self {
            Self::Delivered { records, .. } => *records,
            Self::Exhausted { delivered, .. }
            | Self::Aborted { delivered, .. }
            | Self::Interrupted { delivered, .. } => *delivered,
        }
    }

    /// 유실된 레코드 수
    pub fn lost(&self) -> usize {
        match self {
            Self::Exhausted { lost, .. } | Self::Aborted { lost, .. } => *lost,
            Self::Delivered { .. } | Self::Interrupted { .. } => 0,
        }
    }

    /// 사용한 시도 횟수
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. }
            | Self::Interrupted { attempts, .. } => *attempts,
        }
    }

    /// 재시도 불가 에러로 중단되었다면 그 원인
    pub fn fatal_error(&self) -> Option<&TransportError> {
        match self {
            Self::Aborted { error, .. } => Some(error),
            _ => None,
        }
    }

    /// 종료 요청으로 중단되었는지 여부
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Exhausted { .. } => "exhausted",
            Self::Aborted { .. } => "aborted",
            Self::Interrupted { .. } => "interrupted",
        }
    }
}

/// 부분 실패 재시도 전송기
pub struct ResilientPublisher<T> {
    transport: T,
    policy: RetryPolicy,
    request_timeout: Duration,
}

impl<T: StreamTransport> ResilientPublisher<T> {
    /// 새 전송기를 생성합니다.
    pub fn new(transport: T, policy: RetryPolicy, request_timeout: Duration) -> Self {
        Self {
            transport,
            policy,
            request_timeout,
        }
    }

    /// 재시도 정책
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 내부 전송 구현
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 배치를 전송합니다.
    ///
    /// 에러를 반환하지 않습니다. 유실과 중단은 [`PublishOutcome`]으로 보고됩니다.
    pub async fn publish(&self, batch: Batch, shutdown: &CancellationToken) -> PublishOutcome {
        let started = Instant::now();
        let outcome = self.publish_inner(batch, shutdown).await;
        histogram!(m::INGEST_PUBLISH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        counter!(m::INGEST_BATCHES_TOTAL, m::LABEL_RESULT => outcome.label()).increment(1);
        counter!(m::INGEST_RECORDS_PUBLISHED_TOTAL).increment(outcome.delivered() as u64);
        if outcome.lost() > 0 {
            counter!(m::INGEST_RECORDS_LOST_TOTAL).increment(outcome.lost() as u64);
        }
        outcome
    }

    async fn publish_inner(&self, batch: Batch, shutdown: &CancellationToken) -> PublishOutcome {
        let total = batch.len();
        let mut pending = batch.into_entries();
        let mut attempt = 0u32;

        loop {
            let attempts = attempt + 1;
            let sent = pending.len();
            let result =
                tokio::time::timeout(self.request_timeout, self.transport.put_records(&pending))
                    .await;

            pending = match result {
                Ok(Ok(outcomes)) => {
                    let remaining = failed_entries(pending, &outcomes);
                    if !remaining.is_empty() {
                        let code = outcomes.iter().find_map(|o| match o {
                            EntryOutcome::Rejected { code, .. } => Some(code.as_str()),
                            EntryOutcome::Accepted => None,
                        });
                        tracing::warn!(
                            attempt = attempts,
                            sent,
                            failed = remaining.len(),
                            error_code = code.unwrap_or("missing result"),
                            "partial publish failure"
                        );
                    }
                    remaining
                }
                Ok(Err(e)) if !e.retryable => {
                    tracing::error!(
                        attempt = attempts,
                        lost = sent,
                        error = %e,
                        "non-retryable transport error, records lost"
                    );
                    return PublishOutcome::Aborted {
                        attempts,
                        delivered: total - sent,
                        lost: sent,
                        error: e,
                    };
                }
                Ok(Err(e)) => {
                    tracing::warn!(attempt = attempts, sent, error = %e, "publish request failed");
                    pending
                }
                Err(_) => {
                    tracing::warn!(
                        attempt = attempts,
                        sent,
                        timeout_secs = self.request_timeout.as_secs_f64(),
                        "publish request timed out"
                    );
                    pending
                }
            };

            if pending.is_empty() {
                if attempt > 0 {
                    tracing::info!(attempts, records = total, "batch delivered after retry");
                }
                return PublishOutcome::Delivered {
                    attempts,
                    records: total,
                };
            }

            if attempts >= self.policy.max_attempts {
                tracing::error!(
                    attempts,
                    lost = pending.len(),
                    delivered = total - pending.len(),
                    "publish retries exhausted, records lost"
                );
                return PublishOutcome::Exhausted {
                    attempts,
                    delivered: total - pending.len(),
                    lost: pending.len(),
                };
            }

            let delay = self.policy.backoff(attempt);
            tracing::debug!(
                next_attempt = attempts + 1,
                retrying = pending.len(),
                delay_ms = delay.as_millis() as u64,
                "backing off before retry"
            );
            counter!(m::INGEST_PUBLISH_RETRIES_TOTAL).increment(1);

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(
                        attempts,
                        pending = pending.len(),
                        "shutdown during publish backoff"
                    );
                    return PublishOutcome::Interrupted {
                        attempts,
                        delivered: total - pending.len(),
                        pending: pending.len(),
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
