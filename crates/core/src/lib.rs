//! Tailpost 공통 크레이트
//!
//! 설정(`tailpost.toml`), 최상위 에러 타입, 메트릭 이름을 정의하며
//! `tailpost-ingest`와 `tailpost-daemon`이 함께 사용합니다.

pub mod config;
pub mod error;
pub mod metrics;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, IngestFailure, TailpostError};

// 설정
pub use config::TailpostConfig;
