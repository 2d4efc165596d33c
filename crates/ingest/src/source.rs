//! 소스 파일 식별 및 로테이션 감지
//!
//! 감시 대상 파일은 날짜에 따라 바뀝니다 (`sample_data20240101.csv` →
//! `sample_data20240102.csv`). [`DatedSource`]는 [`Clock`]이 알려주는 오늘
//! 날짜로부터 "지금 기대하는" 파일 경로([`SourceIdentity`])를 계산하고,
//! [`DatedSource::check_rotation`]은 추적 중인 파일과 비교하여 전환 여부를
//! 결정합니다.
//!
//! # 전환 규칙
//! - 기대 경로가 다르고 새 파일이 존재하며 비어 있지 않음 → 전환
//! - 기대 경로가 다르지만 새 파일이 없거나 비어 있음 → 대기 (에러 아님)

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;

/// 특정 시점에 기대되는 소스 파일의 식별자 (날짜가 반영된 경로)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceIdentity(PathBuf);

impl SourceIdentity {
    /// 경로로부터 식별자를 생성합니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// 소스 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// 로그 출력용 파일명을 반환합니다.
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.display().to_string())
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// 현재 날짜를 제공하는 시계
///
/// 운영 환경에서는 [`SystemClock`]을, 테스트에서는 수동으로 날짜를
/// 넘길 수 있는 구현을 사용합니다.
pub trait Clock: Send + Sync {
    /// 오늘 날짜 (로컬 타임존)
    fn today(&self) -> NaiveDate;
}

/// 시스템 로컬 시간을 사용하는 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// 로테이션 판정 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationCheck {
    /// 추적 중인 파일이 여전히 기대 파일과 같음
    Unchanged,
    /// 새 파일로 전환해야 함
    Switch(SourceIdentity),
    /// 기대 파일이 바뀌었지만 아직 생성되지 않았거나 비어 있음
    Pending(SourceIdentity),
}

/// 날짜 기반으로 소스 파일 경로를 계산합니다.
#[derive(Debug, Clone)]
pub struct DatedSource {
    directory: PathBuf,
    file_prefix: String,
    date_format: String,
    file_extension: String,
}

impl DatedSource {
    /// 새 날짜 기반 소스를 생성합니다.
    pub fn new(
        directory: impl Into<PathBuf>,
        file_prefix: impl Into<String>,
        date_format: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            file_prefix: file_prefix.into(),
            date_format: date_format.into(),
            file_extension: file_extension.into(),
        }
    }

    /// 수집 설정으로부터 생성합니다.
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            config.directory.clone(),
            config.file_prefix.clone(),
            config.date_format.clone(),
            config.file_extension.clone(),
        )
    }

    /// 주어진 날짜의 소스 식별자를 계산합니다.
    pub fn identity_for(&self, date: NaiveDate) -> SourceIdentity {
        let name = format!(
            "{}{}{}",
            self.file_prefix,
            date.format(&self.date_format),
            self.file_extension
        );
        SourceIdentity(self.directory.join(name))
    }

    /// 시계 기준 현재 기대되는 소스 식별자를 계산합니다.
    pub fn current(&self, clock: &dyn Clock) -> SourceIdentity {
        self.identity_for(clock.today())
    }

    /// 추적 중인 식별자와 현재 기대 식별자를 비교합니다.
    ///
    /// 새 파일이 존재하고 비어 있지 않을 때만 [`RotationCheck::Switch`]를 반환합니다.
    pub async fn check_rotation(
        &self,
        tracked: &SourceIdentity,
        clock: &dyn Clock,
    ) -> RotationCheck {
        let expected = self.current(clock);
        if &expected == tracked {
            return RotationCheck::Unchanged;
        }

        match tokio::fs::metadata(expected.path()).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => RotationCheck::Switch(expected),
            _ => RotationCheck::Pending(expected),
        }
    }
}
