//! 설정 관리 -- tailpost.toml 파싱 및 런타임 설정
//!
//! [`TailpostConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TAILPOST_STREAM_STREAM_NAME=spc-stream` 형식)
//! 3. 설정 파일 (`tailpost.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tailpost_core::error::TailpostError> {
//! use tailpost_core::config::TailpostConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TailpostConfig::load("tailpost.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TailpostConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TailpostError};

/// 스트림 전송 한 번에 담을 수 있는 최대 레코드 수 (Kinesis PutRecords 한도)
pub const MAX_STREAM_BATCH_SIZE: usize = 500;

/// Tailpost 통합 설정
///
/// `tailpost.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TailpostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 소스 파일 감시 설정
    #[serde(default)]
    pub source: SourceConfig,
    /// 스트림 전송 설정
    #[serde(default)]
    pub stream: StreamConfig,
    /// 커서 체크포인트 설정
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TailpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TailpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TailpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TailpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TailpostError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TailpostError> {
        toml::from_str(toml_str).map_err(|e| {
            TailpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TAILPOST_{SECTION}_{FIELD}`
    /// 예: `TAILPOST_SOURCE_DIRECTORY=/data/csv`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TAILPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TAILPOST_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "TAILPOST_GENERAL_DATA_DIR");

        // Source
        override_string(&mut self.source.directory, "TAILPOST_SOURCE_DIRECTORY");
        override_string(&mut self.source.file_prefix, "TAILPOST_SOURCE_FILE_PREFIX");
        override_string(&mut self.source.date_format, "TAILPOST_SOURCE_DATE_FORMAT");
        override_string(
            &mut self.source.file_extension,
            "TAILPOST_SOURCE_FILE_EXTENSION",
        );
        override_string(&mut self.source.delimiter, "TAILPOST_SOURCE_DELIMITER");
        override_string(
            &mut self.source.start_position,
            "TAILPOST_SOURCE_START_POSITION",
        );
        override_u64(
            &mut self.source.poll_interval_ms,
            "TAILPOST_SOURCE_POLL_INTERVAL_MS",
        );
        override_usize(
            &mut self.source.max_read_bytes,
            "TAILPOST_SOURCE_MAX_READ_BYTES",
        );
        override_u64(
            &mut self.source.io_timeout_secs,
            "TAILPOST_SOURCE_IO_TIMEOUT_SECS",
        );
        override_csv(&mut self.source.null_markers, "TAILPOST_SOURCE_NULL_MARKERS");

        // Stream
        override_string(&mut self.stream.stream_name, "TAILPOST_STREAM_STREAM_NAME");
        override_string(&mut self.stream.region, "TAILPOST_STREAM_REGION");
        override_string(&mut self.stream.endpoint_url, "TAILPOST_STREAM_ENDPOINT_URL");
        override_usize(&mut self.stream.batch_size, "TAILPOST_STREAM_BATCH_SIZE");
        override_u32(&mut self.stream.max_attempts, "TAILPOST_STREAM_MAX_ATTEMPTS");
        override_u64(&mut self.stream.base_delay_ms, "TAILPOST_STREAM_BASE_DELAY_MS");
        override_u64(
            &mut self.stream.request_timeout_secs,
            "TAILPOST_STREAM_REQUEST_TIMEOUT_SECS",
        );

        // Checkpoint
        override_bool(&mut self.checkpoint.enabled, "TAILPOST_CHECKPOINT_ENABLED");
        override_string(&mut self.checkpoint.file_name, "TAILPOST_CHECKPOINT_FILE_NAME");

        // Metrics
        override_bool(&mut self.metrics.enabled, "TAILPOST_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "TAILPOST_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "TAILPOST_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TailpostError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.source.directory.is_empty() {
            return Err(invalid("source.directory", "must not be empty".to_owned()));
        }

        if self.source.date_format.is_empty() {
            return Err(invalid("source.date_format", "must not be empty".to_owned()));
        }

        // 구분자는 정확히 1바이트 ASCII 문자여야 함
        if self.source.delimiter.len() != 1 || !self.source.delimiter.is_ascii() {
            return Err(invalid(
                "source.delimiter",
                "must be a single ASCII character".to_owned(),
            ));
        }

        let valid_positions = ["beginning", "end"];
        if !valid_positions.contains(&self.source.start_position.as_str()) {
            return Err(invalid(
                "source.start_position",
                format!("must be one of: {}", valid_positions.join(", ")),
            ));
        }

        if self.source.poll_interval_ms == 0 {
            return Err(invalid(
                "source.poll_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.source.max_read_bytes < 1024 {
            return Err(invalid(
                "source.max_read_bytes",
                "must be at least 1024".to_owned(),
            ));
        }

        if self.source.io_timeout_secs == 0 {
            return Err(invalid(
                "source.io_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.stream.stream_name.is_empty() {
            return Err(invalid("stream.stream_name", "must not be empty".to_owned()));
        }

        if self.stream.batch_size == 0 || self.stream.batch_size > MAX_STREAM_BATCH_SIZE {
            return Err(invalid(
                "stream.batch_size",
                format!("must be 1-{}", MAX_STREAM_BATCH_SIZE),
            ));
        }

        if self.stream.max_attempts == 0 {
            return Err(invalid(
                "stream.max_attempts",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.stream.request_timeout_secs == 0 {
            return Err(invalid(
                "stream.request_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.checkpoint.enabled && self.checkpoint.file_name.is_empty() {
            return Err(invalid(
                "checkpoint.file_name",
                "must not be empty when checkpoint is enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> TailpostError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리 (체크포인트 저장 위치)
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/tailpost".to_owned(),
        }
    }
}

/// 소스 파일 감시 설정
///
/// 감시 대상 경로는 `{directory}/{file_prefix}{날짜}{file_extension}` 형태로
/// 매 폴링마다 계산됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// 소스 파일 디렉토리
    pub directory: String,
    /// 파일명 접두어
    pub file_prefix: String,
    /// 날짜 포맷 (chrono strftime)
    pub date_format: String,
    /// 파일 확장자 (점 포함)
    pub file_extension: String,
    /// 필드 구분자
    pub delimiter: String,
    /// 기동 시 첫 파일의 읽기 시작 위치 (beginning, end)
    pub start_position: String,
    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 한 번의 폴링에서 읽을 최대 바이트 수
    pub max_read_bytes: usize,
    /// 파일 I/O 타임아웃 (초)
    pub io_timeout_secs: u64,
    /// 빈 문자열 외에 null로 취급할 값 목록
    pub null_markers: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: "/var/lib/tailpost/incoming".to_owned(),
            file_prefix: "sample_data".to_owned(),
            date_format: "%Y%m%d".to_owned(),
            file_extension: ".csv".to_owned(),
            delimiter: ",".to_owned(),
            start_position: "beginning".to_owned(),
            poll_interval_ms: 500,
            max_read_bytes: 8 * 1024 * 1024, // 8MB
            io_timeout_secs: 10,
            null_markers: Vec::new(),
        }
    }
}

/// 스트림 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 대상 스트림 이름
    pub stream_name: String,
    /// AWS 리전
    pub region: String,
    /// 엔드포인트 오버라이드 (로컬 테스트용, 비어 있으면 기본 엔드포인트)
    pub endpoint_url: String,
    /// 배치 크기 (최대 500)
    pub batch_size: usize,
    /// 배치당 최대 전송 시도 횟수
    pub max_attempts: u32,
    /// 재시도 기본 대기 시간 (밀리초)
    pub base_delay_ms: u64,
    /// 전송 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_name: "spc-stream".to_owned(),
            region: "ap-northeast-1".to_owned(),
            endpoint_url: String::new(),
            batch_size: MAX_STREAM_BATCH_SIZE,
            max_attempts: 5,
            base_delay_ms: 500,
            request_timeout_secs: 30,
        }
    }
}

/// 커서 체크포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// 활성화 여부 (비활성화 시 커서는 메모리에만 유지)
    pub enabled: bool,
    /// `general.data_dir` 아래 체크포인트 파일명
    pub file_name: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file_name: "cursor.json".to_owned(),
        }
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
