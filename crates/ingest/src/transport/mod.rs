//! 스트림 전송 추상화
//!
//! [`StreamTransport`]는 파티션 스트림에 엔트리 묶음(최대 500개)을 한 번에
//! 보내고, 엔트리별 결과를 돌려줍니다. 재시도 정책은 전송 구현이 아니라
//! [`ResilientPublisher`](crate::publisher::ResilientPublisher)가 담당합니다.
//!
//! - [`KinesisTransport`]: Amazon Kinesis Data Streams `PutRecords`
//! - 테스트에서는 스크립트된 응답을 돌려주는 mock 구현 사용

mod kinesis;

use std::future::Future;

pub use kinesis::KinesisTransport;

use crate::batch::StreamEntry;

/// 엔트리별 전송 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// 스트림이 수락함
    Accepted,
    /// 스트림이 거부함 (재시도 대상)
    Rejected {
        /// 에러 코드 (예: `ProvisionedThroughputExceededException`)
        code: String,
        /// 에러 메시지
        message: String,
    },
}

impl EntryOutcome {
    /// 거부 결과를 생성합니다.
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 수락 여부
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// 요청 전체 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    /// 에러 설명
    pub message: String,
    /// 같은 요청을 다시 보내면 성공할 수 있는지 여부
    pub retryable: bool,
}

impl TransportError {
    /// 재시도 가능한 에러를 생성합니다.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// 재시도해도 소용없는 에러를 생성합니다 (요청 구성 실패 등).
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// 파티션 스트림 전송 trait
///
/// 구현체는 입력 엔트리와 같은 순서로 결과를 반환해야 합니다.
/// 결과 개수가 입력보다 적으면 누락된 엔트리는 실패로 간주됩니다.
pub trait StreamTransport: Send + Sync + 'static {
    /// 엔트리 묶음을 한 번의 요청으로 전송합니다.
    ///
    /// # Errors
    ///
    /// 요청 자체가 실패하면 (네트워크, 인증, 스로틀링 등) [`TransportError`]를 반환합니다.
    /// 일부 엔트리만 거부된 경우는 에러가 아니라 `Ok`의 [`EntryOutcome::Rejected`]로 표현됩니다.
    fn put_records(
        &self,
        entries: &[StreamEntry],
    ) -> impl Future<Output = Result<Vec<EntryOutcome>, TransportError>> + Send;
}

/// 테스트용 mock 전송
///
/// 호출마다 스크립트 큐에서 응답을 하나씩 꺼냅니다. 큐가 비어 있으면 모든
/// 엔트리를 수락합니다. 받은 요청은 `calls`에 기록됩니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockTransport {
    script: std::sync::Mutex<std::collections::VecDeque<MockResponse>>,
    calls: std::sync::Mutex<Vec<Vec<StreamEntry>>>,
}

/// mock 전송의 한 번 응답
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// 주어진 인덱스의 엔트리만 거부
    RejectIndices(Vec<usize>),
    /// 모든 엔트리 거부
    RejectAll,
    /// 결과를 지정 개수만 반환 (나머지 누락)
    Truncated(usize),
    /// 요청 전체 실패
    Fail(TransportError),
    /// 응답하지 않음 (타임아웃 시뮬레이션)
    Hang,
}

#[cfg(test)]
impl MockTransport {
    /// 항상 성공하는 mock 전송을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 응답 스크립트를 설정합니다.
    pub fn with_script(self, script: impl IntoIterator<Item = MockResponse>) -> Self {
        if let Ok(mut queue) = self.script.lock() {
            queue.extend(script);
        }
        self
    }

    /// 지금까지 받은 요청 목록
    pub fn calls(&self) -> Vec<Vec<StreamEntry>> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl StreamTransport for MockTransport {
    async fn put_records(
        &self,
        entries: &[StreamEntry],
    ) -> Result<Vec<EntryOutcome>, TransportError> {
        self.calls.lock().unwrap().push(entries.to_vec());
        let response = self.script.lock().unwrap().pop_front();

        let reject = || EntryOutcome::rejected("InternalFailure", "mock rejection");
        match response {
            None => Ok(vec![EntryOutcome::Accepted; entries.len()]),
            Some(MockResponse::RejectIndices(indices)) => Ok((0..entries.len())
                .map(|i| {
                    if indices.contains(&i) {
                        reject()
                    } else {
                        EntryOutcome::Accepted
                    }
                })
                .collect()),
            Some(MockResponse::RejectAll) => Ok(vec![reject(); entries.len()]),
            Some(MockResponse::Truncated(n)) => Ok(vec![EntryOutcome::Accepted; n.min(entries.len())]),
            Some(MockResponse::Fail(e)) => Err(e),
            Some(MockResponse::Hang) => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn entries(n: usize) -> Vec<StreamEntry> {
        (0..n).map(|i| StreamEntry::new(Bytes::from(format!("{i}\n")))).collect()
    }

    #[test]
    fn transport_error_flags() {
        assert!(TransportError::retryable("throttled").retryable);
        assert!(!TransportError::fatal("bad request").retryable);
        assert_eq!(
            TransportError::retryable("timeout").to_string(),
            "transport error: timeout"
        );
    }

    #[tokio::test]
    async fn mock_accepts_everything_by_default() {
        let mock = MockTransport::new();
        let outcomes = mock.put_records(&entries(3)).await.unwrap();
        assert!(outcomes.iter().all(EntryOutcome::is_accepted));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn mock_follows_script_in_order() {
        let mock = MockTransport::new().with_script([
            MockResponse::RejectIndices(vec![1]),
            MockResponse::Fail(TransportError::retryable("503")),
        ]);
        let first = mock.put_records(&entries(3)).await.unwrap();
        assert!(!first[1].is_accepted());
        assert!(mock.put_records(&entries(1)).await.is_err());
        assert!(mock.put_records(&entries(1)).await.is_ok());
    }
}
