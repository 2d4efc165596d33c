//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tailpost_`
//! - 모듈명: `ingest_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(tailpost_core::metrics::INGEST_ROWS_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (delivered, exhausted, aborted, interrupted)
pub const LABEL_RESULT: &str = "result";

// ─── Ingest 메트릭 ─────────────────────────────────────────────────

/// Ingest: 소스 파일에서 읽은 데이터 행 수 (counter)
pub const INGEST_ROWS_READ_TOTAL: &str = "tailpost_ingest_rows_read_total";

/// Ingest: 스트림에 전달 완료된 레코드 수 (counter)
pub const INGEST_RECORDS_PUBLISHED_TOTAL: &str = "tailpost_ingest_records_published_total";

/// Ingest: 재시도 한도 초과로 유실된 레코드 수 (counter)
pub const INGEST_RECORDS_LOST_TOTAL: &str = "tailpost_ingest_records_lost_total";

/// Ingest: 배치 재전송 횟수 (counter)
pub const INGEST_PUBLISH_RETRIES_TOTAL: &str = "tailpost_ingest_publish_retries_total";

/// Ingest: 배치 전송 결과 (counter, label: result)
pub const INGEST_BATCHES_TOTAL: &str = "tailpost_ingest_batches_total";

/// Ingest: 소스 파일 로테이션 횟수 (counter)
pub const INGEST_ROTATIONS_TOTAL: &str = "tailpost_ingest_rotations_total";

/// Ingest: 폴링 중 발생한 에러 수 (counter)
pub const INGEST_POLL_ERRORS_TOTAL: &str = "tailpost_ingest_poll_errors_total";

/// Ingest: 현재 커서 오프셋 (gauge, 바이트)
pub const INGEST_CURSOR_OFFSET_BYTES: &str = "tailpost_ingest_cursor_offset_bytes";

/// Ingest: 배치 하나를 전송하는 데 걸린 시간 (histogram, 초)
pub const INGEST_PUBLISH_DURATION_SECONDS: &str = "tailpost_ingest_publish_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "tailpost_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version)
pub const DAEMON_BUILD_INFO: &str = "tailpost_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 배치 전송 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 30s 범위, 백오프 대기를 포함한 전체 전송 주기
pub const PUBLISH_DURATION_BUCKETS: [f64; 10] =
    [0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 30.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        INGEST_ROWS_READ_TOTAL,
        "Total number of data rows decoded from source files"
    );
    describe_counter!(
        INGEST_RECORDS_PUBLISHED_TOTAL,
        "Total number of records accepted by the stream transport"
    );
    describe_counter!(
        INGEST_RECORDS_LOST_TOTAL,
        "Total number of records dropped after exhausting publish retries"
    );
    describe_counter!(
        INGEST_PUBLISH_RETRIES_TOTAL,
        "Total number of batch resubmissions after partial or full failure"
    );
    describe_counter!(
        INGEST_BATCHES_TOTAL,
        "Publish cycles by terminal result (delivered, exhausted, aborted, interrupted)"
    );
    describe_counter!(
        INGEST_ROTATIONS_TOTAL,
        "Total number of source file rotations"
    );
    describe_counter!(
        INGEST_POLL_ERRORS_TOTAL,
        "Total number of poll iterations that ended in an error"
    );
    describe_gauge!(
        INGEST_CURSOR_OFFSET_BYTES,
        "Byte offset consumed in the current source file"
    );
    describe_histogram!(
        INGEST_PUBLISH_DURATION_SECONDS,
        "Time to publish a single batch including retries in seconds"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Tailpost daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
