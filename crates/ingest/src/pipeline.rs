//! 폴링 루프 -- 로테이션 감지부터 커서 확정까지의 전체 흐름을 관리합니다.
//!
//! [`Ingestor`]는 한 번의 폴링([`Ingestor::poll_once`])마다 아래 순서로
//! 동작하며, [`Ingestor::run`]은 종료 요청이 올 때까지 이를 반복합니다.
//!
//! ```text
//! DatedSource ─▶ (rotate / re-create reset) ─▶ SchemaDetector ─▶ TailReader
//!      ─▶ RecordDecoder ─▶ Batcher ─▶ ResilientPublisher ─▶ cursor commit
//! ```
//!
//! 폴링 상태는 [`SourceState`] 값으로 넘겨받고 돌려줍니다. 커서는 배치 전송이
//! 끝난 뒤에만 전진하므로, 전송 도중 종료되면 재기동 시 같은 행을 다시
//! 보냅니다 (at-least-once).

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tailpost_core::metrics as m;
use tokio_util::sync::CancellationToken;

use crate::batch::Batcher;
use crate::config::{IngestConfig, StartPosition};
use crate::cursor::{CursorStore, SourceState, file_id};
use crate::error::IngestError;
use crate::publisher::{ResilientPublisher, RetryPolicy};
use crate::record::RecordDecoder;
use crate::schema::SchemaDetector;
use crate::source::{Clock, DatedSource, RotationCheck, SourceIdentity, SystemClock};
use crate::tail::TailReader;
use crate::transport::StreamTransport;

/// 한 번의 폴링 결과 요약
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// 이번 폴링에서 읽은 소스
    pub source: SourceIdentity,
    /// 이번 폴링에서 소스가 전환되었는지 여부
    pub rotated: bool,
    /// 디코딩된 행 수
    pub rows: usize,
    /// 전송한 배치 수
    pub batches: usize,
    /// 스트림에 전달된 레코드 수
    pub delivered: usize,
    /// 유실된 레코드 수
    pub lost: usize,
    /// 전송 도중 종료 요청으로 중단되었는지 여부 (커서 미확정)
    pub interrupted: bool,
}

impl PollReport {
    fn new(source: SourceIdentity, rotated: bool) -> Self {
        Self {
            source,
            rotated,
            rows: 0,
            batches: 0,
            delivered: 0,
            lost: 0,
            interrupted: false,
        }
    }
}

/// 로테이션 인식 tail 수집기
pub struct Ingestor<T, S> {
    config: IngestConfig,
    source: DatedSource,
    clock: Arc<dyn Clock>,
    detector: SchemaDetector,
    reader: TailReader,
    decoder: RecordDecoder,
    batcher: Batcher,
    publisher: ResilientPublisher<T>,
    store: S,
}

impl<T: StreamTransport, S: CursorStore> Ingestor<T, S> {
    /// 설정을 검증하고 수집기를 생성합니다. 시계는 시스템 로컬 시간입니다.
    pub fn new(config: IngestConfig, transport: T, store: S) -> Result<Self, IngestError> {
        config.validate()?;

        let publisher = ResilientPublisher::new(
            transport,
            RetryPolicy::from_config(&config),
            Duration::from_secs(config.request_timeout_secs),
        );

        Ok(Self {
            source: DatedSource::from_config(&config),
            clock: Arc::new(SystemClock),
            detector: SchemaDetector::new(config.delimiter, config.io_timeout()),
            reader: TailReader::new(config.max_read_bytes, config.io_timeout()),
            decoder: RecordDecoder::new(config.delimiter, config.null_markers.clone()),
            batcher: Batcher::new(config.batch_size),
            publisher,
            store,
            config,
        })
    }

    /// 날짜를 제공할 시계를 교체합니다.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 수집 설정
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// 배치 전송기
    pub fn publisher(&self) -> &ResilientPublisher<T> {
        &self.publisher
    }

    /// 커서 저장소
    pub fn store(&self) -> &S {
        &self.store
    }

    /// 기동 시 폴링 상태를 결정합니다.
    ///
    /// 저장된 커서가 있으면 그 위치에서 재개하고, 없으면 오늘 날짜의 소스를
    /// `start_position`에 따라 처음 또는 끝에서 시작합니다.
    pub async fn initial_state(&self) -> SourceState {
        match self.store.load().await {
            Ok(Some(cursor)) => {
                tracing::info!(
                    file = %cursor.source.file_name(),
                    offset = cursor.offset,
                    "resuming from checkpoint"
                );
                return SourceState::resume(cursor);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "failed to load checkpoint, starting fresh");
            }
        }

        let current = self.source.current(self.clock.as_ref());
        tracing::info!(
            file = %current.file_name(),
            start_position = ?self.config.start_position,
            "tracking source"
        );
        match self.config.start_position {
            StartPosition::End if has_content(current.path()).await => {
                SourceState::new(current).starting_at_end()
            }
            // 기동 시점에 없거나 빈 파일은 나중에 생겨도 처음부터 읽음
            _ => SourceState::new(current),
        }
    }

    /// 한 번 폴링합니다.
    ///
    /// 상태는 에러 여부와 관계없이 항상 돌려받습니다. 에러가 나도 커서는
    /// 마지막으로 확정된 위치에 남아 있습니다.
    pub async fn poll_once(
        &self,
        mut state: SourceState,
        shutdown: &CancellationToken,
    ) -> (SourceState, Result<PollReport, IngestError>) {
        let result = self.poll_inner(&mut state, shutdown).await;
        (state, result)
    }

    async fn poll_inner(
        &self,
        state: &mut SourceState,
        shutdown: &CancellationToken,
    ) -> Result<PollReport, IngestError> {
        let rotated = self.check_rotation(state).await;
        let mut report = PollReport::new(state.source().clone(), rotated);
        let path = state.source().path().to_path_buf();

        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && state.schema.is_none() => {
                return Err(IngestError::SchemaUnavailable {
                    path,
                    reason: "file not found".to_owned(),
                });
            }
            Err(e) => {
                return Err(IngestError::FileAccess {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        let recreated = match (state.cursor.file_id, file_id(&meta)) {
            (Some(before), Some(now)) => before != now,
            _ => false,
        } || meta.len() < state.cursor.offset;
        if recreated {
            tracing::warn!(
                file = %state.source().file_name(),
                offset = state.cursor.offset,
                size = meta.len(),
                "source file was re-created, reading from start"
            );
            state.restart_file();
        }

        let schema = match &state.schema {
            Some(schema) => schema.clone(),
            None => {
                let schema = self.detector.detect(&path).await?;
                tracing::info!(
                    file = %state.source().file_name(),
                    columns = schema.len(),
                    "schema detected"
                );
                if state.seek_to_end {
                    state.cursor = self.reader.skip_to_end(&state.cursor, &schema).await?;
                    state.seek_to_end = false;
                    tracing::info!(
                        file = %state.source().file_name(),
                        offset = state.cursor.offset,
                        "skipped existing rows"
                    );
                }
                state.schema = Some(schema.clone());
                schema
            }
        };

        let chunk = self.reader.read(&state.cursor, &schema).await?;
        if chunk.is_empty() {
            if chunk.cursor != state.cursor {
                state.cursor = chunk.cursor;
                self.commit(state).await;
            }
            return Ok(report);
        }

        let records = self.decoder.decode(&chunk.lines, &schema);
        report.rows = records.len();
        counter!(m::INGEST_ROWS_READ_TOTAL).increment(records.len() as u64);

        let mut fatal = None;
        for batch in self.batcher.batch(&records)? {
            let outcome = self.publisher.publish(batch, shutdown).await;
            report.batches += 1;
            if fatal.is_none() {
                fatal = outcome.fatal_error().cloned();
            }
            report.delivered += outcome.delivered();
            report.lost += outcome.lost();
            if outcome.is_interrupted() {
                report.interrupted = true;
                tracing::info!(
                    file = %state.source().file_name(),
                    offset = state.cursor.offset,
                    "publish interrupted, cursor left at last committed offset"
                );
                return Ok(report);
            }
        }

        state.cursor = chunk.cursor;
        self.commit(state).await;

        if report.rows > 0 {
            tracing::info!(
                file = %state.source().file_name(),
                rows = report.rows,
                delivered = report.delivered,
                lost = report.lost,
                "rows sent"
            );
        }
        // 중단된 배치의 행은 유실로 집계된 뒤이므로 커서는 이미 전진함
        match fatal {
            Some(e) => Err(e.into()),
            None => Ok(report),
        }
    }

    async fn check_rotation(&self, state: &mut SourceState) -> bool {
        match self
            .source
            .check_rotation(state.source(), self.clock.as_ref())
            .await
        {
            RotationCheck::Unchanged => false,
            RotationCheck::Pending(next) => {
                tracing::debug!(
                    current = %state.source().file_name(),
                    expected = %next.file_name(),
                    "waiting for next source file"
                );
                false
            }
            RotationCheck::Switch(next) => {
                tracing::info!(
                    from = %state.source().file_name(),
                    to = %next.file_name(),
                    "switching source file"
                );
                counter!(m::INGEST_ROTATIONS_TOTAL).increment(1);
                state.rotate_to(next);
                true
            }
        }
    }

    async fn commit(&self, state: &SourceState) {
        gauge!(m::INGEST_CURSOR_OFFSET_BYTES).set(state.cursor.offset as f64);
        if let Err(e) = self.store.save(&state.cursor).await {
            tracing::warn!(error = %e, "failed to save checkpoint");
        }
    }

    /// 종료 요청이 올 때까지 폴링을 반복합니다.
    ///
    /// 데이터/전송 에러로는 멈추지 않습니다. 에러로 끝난 폴링 뒤에는
    /// 폴링 주기만큼 추가로 대기합니다. 마지막 상태를 반환합니다.
    pub async fn run(&self, shutdown: CancellationToken) -> SourceState {
        let interval = self.config.poll_interval();
        let mut state = self.initial_state().await;
        tracing::info!(
            directory = %self.config.directory.display(),
            stream = %self.config.stream_name,
            poll_interval_ms = self.config.poll_interval_ms,
            "ingestor started"
        );

        while !shutdown.is_cancelled() {
            let (next, result) = self.poll_once(state, &shutdown).await;
            state = next;

            let delay = match result {
                Ok(report) if report.interrupted => break,
                Ok(_) => interval,
                Err(IngestError::SchemaUnavailable { path, reason }) => {
                    tracing::debug!(path = %path.display(), %reason, "schema not yet available");
                    interval
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!(error = %e, "poll failed");
                    } else {
                        tracing::error!(error = %e, "poll failed");
                    }
                    counter!(m::INGEST_POLL_ERRORS_TOTAL).increment(1);
                    interval.saturating_mul(2)
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(
            file = %state.source().file_name(),
            offset = state.cursor.offset,
            "ingestor stopped"
        );
        state
    }
}

async fn has_content(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.len() > 0)
}
