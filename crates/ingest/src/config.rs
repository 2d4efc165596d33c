//! 수집 파이프라인 설정
//!
//! [`IngestConfig`]는 core의 [`TailpostConfig`](tailpost_core::config::TailpostConfig)에서
//! 소스/스트림/체크포인트 섹션을 모아 수집 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use tailpost_core::config::TailpostConfig;
//! use tailpost_ingest::config::IngestConfig;
//!
//! let core_config = TailpostConfig::default();
//! let config = IngestConfig::from_core(&core_config)?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tailpost_core::config::{MAX_STREAM_BATCH_SIZE, TailpostConfig};

use crate::error::IngestError;

/// 기동 시 첫 소스 파일의 읽기 시작 위치
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPosition {
    /// 파일 처음부터 (헤더 다음 행부터) 읽음 (기본값)
    #[default]
    Beginning,
    /// 이미 존재하는 내용은 건너뛰고 이후 추가분만 읽음
    End,
}

impl std::str::FromStr for StartPosition {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginning" => Ok(Self::Beginning),
            "end" => Ok(Self::End),
            other => Err(IngestError::Config {
                field: "start_position".to_owned(),
                reason: format!("unknown start position '{other}'"),
            }),
        }
    }
}

/// 수집 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// 소스 파일 디렉토리
    pub directory: PathBuf,
    /// 파일명 접두어
    pub file_prefix: String,
    /// 날짜 포맷 (chrono strftime)
    pub date_format: String,
    /// 파일 확장자
    pub file_extension: String,
    /// 필드 구분자
    pub delimiter: u8,
    /// 기동 시 읽기 시작 위치
    pub start_position: StartPosition,
    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 폴링당 최대 읽기 바이트 수
    pub max_read_bytes: usize,
    /// 파일 I/O 타임아웃 (초)
    pub io_timeout_secs: u64,
    /// 빈 문자열 외 null 취급 값
    pub null_markers: Vec<String>,

    // --- 스트림 전송 ---
    /// 대상 스트림 이름
    pub stream_name: String,
    /// 배치 크기 (최대 500)
    pub batch_size: usize,
    /// 배치당 최대 전송 시도 횟수
    pub max_attempts: u32,
    /// 재시도 기본 대기 시간 (밀리초)
    pub base_delay_ms: u64,
    /// 전송 요청 타임아웃 (초)
    pub request_timeout_secs: u64,

    // --- 체크포인트 ---
    /// 커서 체크포인트 파일 경로 (None이면 메모리에만 유지)
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/lib/tailpost/incoming"),
            file_prefix: "sample_data".to_owned(),
            date_format: "%Y%m%d".to_owned(),
            file_extension: ".csv".to_owned(),
            delimiter: b',',
            start_position: StartPosition::Beginning,
            poll_interval_ms: 500,
            max_read_bytes: 8 * 1024 * 1024,
            io_timeout_secs: 10,
            null_markers: Vec::new(),
            stream_name: "spc-stream".to_owned(),
            batch_size: MAX_STREAM_BATCH_SIZE,
            max_attempts: 5,
            base_delay_ms: 500,
            request_timeout_secs: 30,
            checkpoint_path: None,
        }
    }
}

impl IngestConfig {
    /// core의 `TailpostConfig`에서 수집 설정을 생성합니다.
    pub fn from_core(core: &TailpostConfig) -> Result<Self, IngestError> {
        let delimiter = match core.source.delimiter.as_bytes() {
            [b] if b.is_ascii() => *b,
            _ => {
                return Err(IngestError::Config {
                    field: "delimiter".to_owned(),
                    reason: "must be a single ASCII character".to_owned(),
                });
            }
        };

        let checkpoint_path = core
            .checkpoint
            .enabled
            .then(|| PathBuf::from(&core.general.data_dir).join(&core.checkpoint.file_name));

        let config = Self {
            directory: PathBuf::from(&core.source.directory),
            file_prefix: core.source.file_prefix.clone(),
            date_format: core.source.date_format.clone(),
            file_extension: core.source.file_extension.clone(),
            delimiter,
            start_position: core.source.start_position.parse()?,
            poll_interval_ms: core.source.poll_interval_ms,
            max_read_bytes: core.source.max_read_bytes,
            io_timeout_secs: core.source.io_timeout_secs,
            null_markers: core.source.null_markers.clone(),
            stream_name: core.stream.stream_name.clone(),
            batch_size: core.stream.batch_size,
            max_attempts: core.stream.max_attempts,
            base_delay_ms: core.stream.base_delay_ms,
            request_timeout_secs: core.stream.request_timeout_secs,
            checkpoint_path,
        };
        config.validate()?;
        Ok(config)
    }

    /// 폴링 주기를 반환합니다.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 파일 I/O 타임아웃을 반환합니다.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.batch_size == 0 || self.batch_size > MAX_STREAM_BATCH_SIZE {
            return Err(IngestError::Config {
                field: "batch_size".to_owned(),
                reason: format!("must be 1-{}", MAX_STREAM_BATCH_SIZE),
            });
        }

        if self.max_attempts == 0 {
            return Err(IngestError::Config {
                field: "max_attempts".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.poll_interval_ms == 0 {
            return Err(IngestError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_read_bytes < 1024 {
            return Err(IngestError::Config {
                field: "max_read_bytes".to_owned(),
                reason: "must be at least 1024".to_owned(),
            });
        }

        if self.io_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(IngestError::Config {
                field: "timeout".to_owned(),
                reason: "timeouts must be greater than 0".to_owned(),
            });
        }

        if self.delimiter == b'\n' || self.delimiter == b'\r' || self.delimiter == b'"' {
            return Err(IngestError::Config {
                field: "delimiter".to_owned(),
                reason: "must not be a newline or quote character".to_owned(),
            });
        }

        if self.stream_name.is_empty() {
            return Err(IngestError::Config {
                field: "stream_name".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        // 날짜 포맷이 chrono에서 해석 가능한지 확인
        if chrono::format::StrftimeItems::new(&self.date_format)
            .any(|item| matches!(item, chrono::format::Item::Error))
        {
            return Err(IngestError::Config {
                field: "date_format".to_owned(),
                reason: format!("invalid strftime pattern '{}'", self.date_format),
            });
        }

        Ok(())
    }
}

/// 수집 설정 빌더
#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 소스 디렉토리를 설정합니다.
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.directory = dir.into();
        self
    }

    /// 파일명 접두어를 설정합니다.
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    /// 날짜 포맷을 설정합니다.
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.config.date_format = format.into();
        self
    }

    /// 파일 확장자를 설정합니다.
    pub fn file_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.file_extension = ext.into();
        self
    }

    /// 필드 구분자를 설정합니다.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    /// 기동 시 읽기 시작 위치를 설정합니다.
    pub fn start_position(mut self, position: StartPosition) -> Self {
        self.config.start_position = position;
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 폴링당 최대 읽기 바이트 수를 설정합니다.
    pub fn max_read_bytes(mut self, bytes: usize) -> Self {
        self.config.max_read_bytes = bytes;
        self
    }

    /// null 취급 값을 설정합니다.
    pub fn null_markers(mut self, markers: Vec<String>) -> Self {
        self.config.null_markers = markers;
        self
    }

    /// 대상 스트림 이름을 설정합니다.
    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.config.stream_name = name.into();
        self
    }

    /// 배치 크기를 설정합니다.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// 최대 전송 시도 횟수를 설정합니다.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// 재시도 기본 대기 시간(밀리초)을 설정합니다.
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.config.base_delay_ms = ms;
        self
    }

    /// 체크포인트 파일 경로를 설정합니다.
    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.checkpoint_path = Some(path.into());
        self
    }

    /// 설정을 검증하고 `IngestConfig`를 생성합니다.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
