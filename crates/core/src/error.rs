//! 에러 타입 -- 도메인별 에러 정의

/// Tailpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TailpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 수집 파이프라인 에러
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestFailure),

    /// 스트림 전송 에러
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 수집 파이프라인 에러 (ingest 크레이트에서 변환되어 올라옴)
#[derive(Debug, thiserror::Error)]
pub enum IngestFailure {
    /// 소스 파일 접근 실패
    #[error("source unavailable: {0}")]
    Source(String),

    /// 체크포인트 저장/로드 실패
    #[error("checkpoint failed: {0}")]
    Checkpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_wraps_into_top_level() {
        let err: TailpostError = ConfigError::InvalidValue {
            field: "stream.batch_size".to_owned(),
            reason: "must be 1-500".to_owned(),
        }
        .into();
        assert!(matches!(err, TailpostError::Config(_)));
        assert!(err.to_string().contains("stream.batch_size"));
    }

    #[test]
    fn ingest_failure_display() {
        let err = TailpostError::from(IngestFailure::Checkpoint("disk full".to_owned()));
        assert_eq!(err.to_string(), "ingest error: checkpoint failed: disk full");
    }
}
