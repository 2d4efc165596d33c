//! # tailpost-ingest
//!
//! 날짜별로 로테이션되는 구분자 기반 텍스트 파일(CSV)을 tail하여, 각 행을
//! 개별 메시지로 파티션 스트림(Kinesis Data Streams)에 전송합니다.
//! 부분 실패 시 실패한 엔트리만 지수 백오프로 재전송하며 at-least-once
//! 전달을 보장합니다.
//!
//! # 모듈 구성
//!
//! - [`source`]: 날짜 기반 소스 파일 식별 및 로테이션 감지
//! - [`schema`]: 헤더 줄에서 컬럼 스키마 감지
//! - [`cursor`]: 읽기 커서와 체크포인트 저장소
//! - [`tail`]: 커서 이후의 완성된 줄만 읽는 증분 리더
//! - [`record`]: 행 → 타입이 있는 레코드 디코딩
//! - [`batch`]: 레코드 → 전송 배치 (최대 500)
//! - [`transport`]: 스트림 전송 trait 및 Kinesis 구현
//! - [`publisher`]: 부분 실패 재시도 전송기
//! - [`pipeline`]: 폴링 루프 ([`Ingestor`])
//! - [`config`]: 수집 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! DatedSource -> SchemaDetector -> TailReader -> RecordDecoder -> Batcher -> ResilientPublisher
//!  (rotation)      (header)        (cursor)       (typed rows)    (<=500)     (retry + backoff)
//! ```

pub mod batch;
pub mod config;
pub mod cursor;
pub mod error;
pub mod pipeline;
pub mod publisher;
pub mod record;
pub mod schema;
pub mod source;
pub mod tail;
pub mod transport;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{Ingestor, PollReport};

// 설정
pub use config::{IngestConfig, IngestConfigBuilder, StartPosition};

// 에러
pub use error::IngestError;

// 소스 / 커서
pub use cursor::{
    ConfiguredCursorStore, Cursor, CursorStore, JsonFileCursorStore, MemoryCursorStore,
    SourceState,
};
pub use source::{Clock, DatedSource, SourceIdentity, SystemClock};

// 디코딩 / 배치
pub use batch::{Batch, Batcher, StreamEntry};
pub use record::{FieldValue, Record, RecordDecoder};
pub use schema::{Schema, SchemaDetector};

// 전송
pub use publisher::{PublishOutcome, ResilientPublisher, RetryPolicy};
pub use transport::{EntryOutcome, KinesisTransport, StreamTransport, TransportError};
