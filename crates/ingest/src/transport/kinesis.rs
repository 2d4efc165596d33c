//! Amazon Kinesis Data Streams 전송 구현

use aws_config::BehaviorVersion;
use aws_sdk_kinesis::config::Region;
use aws_sdk_kinesis::error::{DisplayErrorContext, SdkError};
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::PutRecordsRequestEntry;

use super::{EntryOutcome, StreamTransport, TransportError};
use crate::batch::StreamEntry;

/// Kinesis `PutRecords` 기반 전송
#[derive(Debug, Clone)]
pub struct KinesisTransport {
    client: aws_sdk_kinesis::Client,
    stream_name: String,
}

impl KinesisTransport {
    /// 기존 클라이언트로 전송을 생성합니다.
    pub fn new(client: aws_sdk_kinesis::Client, stream_name: impl Into<String>) -> Self {
        Self {
            client,
            stream_name: stream_name.into(),
        }
    }

    /// 기본 자격 증명 체인으로 클라이언트를 구성합니다.
    ///
    /// `endpoint_url`은 LocalStack 같은 호환 엔드포인트를 쓸 때 지정합니다.
    pub async fn connect(
        region: &str,
        endpoint_url: Option<&str>,
        stream_name: impl Into<String>,
    ) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .load()
            .await;

        let mut builder = aws_sdk_kinesis::config::Builder::from(&shared);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }

        let stream_name = stream_name.into();
        tracing::info!(
            stream = %stream_name,
            region,
            endpoint = endpoint_url.unwrap_or("default"),
            "kinesis transport configured"
        );
        Self::new(aws_sdk_kinesis::Client::from_conf(builder.build()), stream_name)
    }

    /// 대상 스트림 이름
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }
}

impl StreamTransport for KinesisTransport {
    async fn put_records(
        &self,
        entries: &[StreamEntry],
    ) -> Result<Vec<EntryOutcome>, TransportError> {
        let records = entries
            .iter()
            .map(|entry| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(entry.payload.to_vec()))
                    .partition_key(&entry.partition_key)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TransportError::fatal(format!("invalid request entry: {e}")))?;

        let output = self
            .client
            .put_records()
            .stream_name(&self.stream_name)
            .set_records(Some(records))
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(output
            .records()
            .iter()
            .map(|result| match result.error_code() {
                Some(code) => EntryOutcome::rejected(code, result.error_message().unwrap_or_default()),
                None => EntryOutcome::Accepted,
            })
            .collect())
    }
}

/// SDK 에러를 재시도 가능 여부와 함께 변환합니다.
///
/// 요청 구성 단계의 실패만 재시도 불가로 보고, 나머지(네트워크, 타임아웃,
/// 서비스 에러)는 모두 재시도 대상입니다.
fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> TransportError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::ConstructionFailure(_) => TransportError::fatal(message),
        _ => TransportError::retryable(message),
    }
}
