//! 수집 파이프라인 에러 타입
//!
//! [`IngestError`]는 수집 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! 폴링 루프는 이 에러들을 로그로 남기고 다음 폴링에서 재시도하며,
//! 프로세스를 종료시키지 않습니다.
//!
//! `From<IngestError> for TailpostError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use std::path::PathBuf;

use tailpost_core::error::{ConfigError, IngestFailure, TailpostError};

use crate::transport::TransportError;

/// 수집 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 헤더를 아직 읽을 수 없음 (파일 없음, 비어 있음, 헤더 미완성)
    #[error("schema unavailable for {path}: {reason}")]
    SchemaUnavailable {
        /// 소스 파일 경로
        path: PathBuf,
        /// 사유
        reason: String,
    },

    /// 소스 파일 접근 실패 (삭제, 권한, 타임아웃 등 일시적 I/O 문제)
    #[error("file access error on {path}: {reason}")]
    FileAccess {
        /// 소스 파일 경로
        path: PathBuf,
        /// 사유
        reason: String,
    },

    /// 배치 전체 전송 실패
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 레코드 직렬화 실패
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// 커서 체크포인트 저장/로드 실패
    #[error("checkpoint error: {path}: {reason}")]
    Checkpoint {
        /// 체크포인트 파일 경로
        path: PathBuf,
        /// 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl IngestError {
    /// 다음 폴링에서 재시도하면 해소될 수 있는 에러인지 여부
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Config { .. })
    }
}

impl From<IngestError> for TailpostError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Config { field, reason } => {
                TailpostError::Config(ConfigError::InvalidValue { field, reason })
            }
            IngestError::Checkpoint { .. } => {
                TailpostError::Ingest(IngestFailure::Checkpoint(err.to_string()))
            }
            IngestError::Transport(e) => TailpostError::Transport(e.to_string()),
            other => TailpostError::Ingest(IngestFailure::Source(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_unavailable_display() {
        let err = IngestError::SchemaUnavailable {
            path: PathBuf::from("/data/sample_data20240101.csv"),
            reason: "file is empty".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sample_data20240101.csv"));
        assert!(msg.contains("file is empty"));
    }

    #[test]
    fn config_error_is_not_transient() {
        let err = IngestError::Config {
            field: "batch_size".to_owned(),
            reason: "must be 1-500".to_owned(),
        };
        assert!(!err.is_transient());

        let err = IngestError::FileAccess {
            path: PathBuf::from("/tmp/x.csv"),
            reason: "gone".to_owned(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn converts_to_tailpost_error() {
        let err = IngestError::Config {
            field: "delimiter".to_owned(),
            reason: "bad".to_owned(),
        };
        let top: TailpostError = err.into();
        assert!(matches!(top, TailpostError::Config(_)));

        let err = IngestError::Checkpoint {
            path: PathBuf::from("/var/lib/tailpost/cursor.json"),
            reason: "read-only".to_owned(),
        };
        let top: TailpostError = err.into();
        assert!(matches!(top, TailpostError::Ingest(IngestFailure::Checkpoint(_))));
    }
}
