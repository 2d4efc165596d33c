//! 배치 구성 -- 레코드를 스트림 전송 단위로 분할
//!
//! [`Batcher`]는 레코드 목록을 순서를 유지한 채 최대 `batch_size`개씩
//! 연속된 [`Batch`]로 나누고, 각 레코드에 새 파티션 키(UUIDv4)를
//! 부여합니다. 파티션 키는 샤드 분산용일 뿐 순서를 보장하지 않습니다.

use bytes::Bytes;
use tailpost_core::config::MAX_STREAM_BATCH_SIZE;

use crate::error::IngestError;
use crate::record::Record;

/// 스트림으로 보낼 단일 엔트리
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// 페이로드 (JSON 객체 + 개행)
    pub payload: Bytes,
    /// 파티션 키
    pub partition_key: String,
}

impl StreamEntry {
    /// 새 파티션 키를 부여하여 엔트리를 생성합니다.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            partition_key: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// 레코드를 직렬화하여 엔트리를 생성합니다.
    pub fn from_record(record: &Record) -> Result<Self, IngestError> {
        Ok(Self::new(record.to_json_line()?))
    }
}

/// 전송 배치 (1 ~ 500 엔트리)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    entries: Vec<StreamEntry>,
}

impl Batch {
    /// 엔트리 목록으로 배치를 생성합니다.
    ///
    /// 비어 있거나 전송 한도를 넘으면 `None`을 반환합니다.
    pub fn new(entries: Vec<StreamEntry>) -> Option<Self> {
        if entries.is_empty() || entries.len() > MAX_STREAM_BATCH_SIZE {
            return None;
        }
        Some(Self { entries })
    }

    /// 엔트리 목록
    pub fn entries(&self) -> &[StreamEntry] {
        &self.entries
    }

    /// 엔트리 목록을 소유권과 함께 꺼냅니다.
    pub fn into_entries(self) -> Vec<StreamEntry> {
        self.entries
    }

    /// 엔트리 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 항상 false (빈 배치는 생성되지 않음)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 레코드 배처
#[derive(Debug, Clone)]
pub struct Batcher {
    batch_size: usize,
}

impl Batcher {
    /// 새 배처를 생성합니다. 배치 크기는 1 ~ 500으로 제한됩니다.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.clamp(1, MAX_STREAM_BATCH_SIZE),
        }
    }

    /// 배치 크기
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 레코드 목록을 순서를 유지하며 배치로 나눕니다.
    pub fn batch(&self, records: &[Record]) -> Result<Vec<Batch>, IngestError> {
        let mut batches = Vec::with_capacity(records.len().div_ceil(self.batch_size));
        for chunk in records.chunks(self.batch_size) {
            let entries = chunk
                .iter()
                .map(StreamEntry::from_record)
                .collect::<Result<Vec<_>, _>>()?;
            // chunks()는 빈 조각을 만들지 않고 크기도 batch_size 이하
            if let Some(batch) = Batch::new(entries) {
                batches.push(batch);
            }
        }
        Ok(batches)
    }
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new(MAX_STREAM_BATCH_SIZE)
    }
}
