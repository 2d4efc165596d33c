//! 통합 테스트 -- 공개 API만으로 폴링 루프 전체 흐름 검증
//!
//! 전송 구현은 이 파일의 `RecordingTransport`로 대체합니다.

use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use tailpost_ingest::{
    Clock, CursorStore, EntryOutcome, IngestConfigBuilder, Ingestor, JsonFileCursorStore,
    MemoryCursorStore, StreamEntry, StreamTransport, TransportError,
};

/// 요청을 기록하고, 스크립트가 남아 있으면 지정된 인덱스를 거부하는 전송
#[derive(Default)]
struct RecordingTransport {
    rejections: Mutex<VecDeque<Vec<usize>>>,
    calls: Mutex<Vec<Vec<StreamEntry>>>,
}

impl RecordingTransport {
    fn rejecting(script: Vec<Vec<usize>>) -> Self {
        Self {
            rejections: Mutex::new(script.into()),
            calls: Mutex::default(),
        }
    }

    fn calls(&self) -> Vec<Vec<StreamEntry>> {
        self.calls.lock().unwrap().clone()
    }

    fn delivered_payloads(&self) -> Vec<serde_json::Value> {
        self.calls()
            .iter()
            .flatten()
            .map(|e| serde_json::from_slice(&e.payload).unwrap())
            .collect()
    }
}

impl StreamTransport for RecordingTransport {
    async fn put_records(
        &self,
        entries: &[StreamEntry],
    ) -> Result<Vec<EntryOutcome>, TransportError> {
        self.calls.lock().unwrap().push(entries.to_vec());
        let reject = self.rejections.lock().unwrap().pop_front().unwrap_or_default();
        Ok((0..entries.len())
            .map(|i| {
                if reject.contains(&i) {
                    EntryOutcome::rejected("ProvisionedThroughputExceededException", "slow down")
                } else {
                    EntryOutcome::Accepted
                }
            })
            .collect())
    }
}

struct ManualClock(Mutex<NaiveDate>);

impl ManualClock {
    fn at(y: i32, m: u32, d: u32) -> Arc<Self> {
        Arc::new(Self(Mutex::new(NaiveDate::from_ymd_opt(y, m, d).unwrap())))
    }

    fn advance_day(&self) {
        let mut today = self.0.lock().unwrap();
        *today = today.succ_opt().unwrap();
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap()
    }
}

fn append(path: &Path, content: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
}

#[tokio::test]
async fn rotation_from_one_day_to_the_next() {
    let dir = tempfile::tempdir().unwrap();
    let day1 = dir.path().join("src_20240101");
    append(&day1, "timestamp,product,value\n1,A,2.5\n");

    let clock = ManualClock::at(2024, 1, 1);
    let config = IngestConfigBuilder::new()
        .directory(dir.path())
        .file_prefix("src_")
        .file_extension("")
        .build()
        .unwrap();
    let ingestor = Ingestor::new(config, RecordingTransport::default(), MemoryCursorStore::new())
        .unwrap()
        .with_clock(clock.clone());
    let token = CancellationToken::new();

    let (state, report) = ingestor.poll_once(ingestor.initial_state().await, &token).await;
    assert_eq!(report.unwrap().rows, 1);

    // 쓰는 중인 행은 아직 보내지 않음
    append(&day1, "2,B,");
    let (state, report) = ingestor.poll_once(state, &token).await;
    assert_eq!(report.unwrap().rows, 0);

    append(&day1, "3.5\n");
    clock.advance_day();
    append(&dir.path().join("src_20240102"), "timestamp,product,value,operator\n9,C,,kim\n");

    // 새 파일이 있으면 이전 파일의 남은 행보다 전환이 우선
    let (state, report) = ingestor.poll_once(state, &token).await;
    let report = report.unwrap();
    assert!(report.rotated);
    assert_eq!(report.rows, 1);
    assert!(state.source().path().ends_with("src_20240102"));
    assert_eq!(state.cursor.offset, std::fs::metadata(dir.path().join("src_20240102")).unwrap().len());

    let sent = ingestor.publisher().transport().delivered_payloads();
    assert_eq!(
        sent,
        vec![
            serde_json::json!({"timestamp": 1, "product": "A", "value": 2.5}),
            serde_json::json!({"timestamp": 9, "product": "C", "value": null, "operator": "kim"}),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn twelve_hundred_rows_publish_in_three_independently_retried_batches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample_data20240101.csv");
    let mut content = String::from("seq,value\n");
    for i in 0..1200 {
        content.push_str(&format!("{i},{}.5\n", i % 10));
    }
    append(&path, &content);

    // 첫 번째 배치: 인덱스 3, 4 거부 → 재시도. 두 번째 배치: 통과. 세 번째: 0 거부 → 재시도
    let transport = RecordingTransport::rejecting(vec![vec![3, 4], vec![], vec![], vec![0]]);
    let config = IngestConfigBuilder::new()
        .directory(dir.path())
        .base_delay_ms(500)
        .build()
        .unwrap();
    let ingestor = Ingestor::new(config, transport, MemoryCursorStore::new())
        .unwrap()
        .with_clock(ManualClock::at(2024, 1, 1));

    let (_, report) = ingestor
        .poll_once(ingestor.initial_state().await, &CancellationToken::new())
        .await;
    let report = report.unwrap();
    assert_eq!(report.rows, 1200);
    assert_eq!(report.batches, 3);
    assert_eq!(report.delivered, 1200);
    assert_eq!(report.lost, 0);

    let sizes: Vec<usize> = ingestor
        .publisher()
        .transport()
        .calls()
        .iter()
        .map(Vec::len)
        .collect();
    assert_eq!(sizes, vec![500, 2, 500, 200, 1]);

    // 모든 행이 최소 한 번 전달됨
    let mut seqs: Vec<i64> = ingestor
        .publisher()
        .transport()
        .delivered_payloads()
        .iter()
        .map(|v| v["seq"].as_i64().unwrap())
        .collect();
    seqs.sort_unstable();
    seqs.dedup();
    assert_eq!(seqs, (0..1200).collect::<Vec<_>>());
}

#[tokio::test]
async fn checkpoint_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("sample_data20240101.csv");
    let checkpoint = dir.path().join("state").join("cursor.json");
    append(&source, "a,b\n1,2\n");

    let build = || {
        let config = IngestConfigBuilder::new()
            .directory(dir.path())
            .checkpoint_path(&checkpoint)
            .build()
            .unwrap();
        Ingestor::new(
            config,
            RecordingTransport::default(),
            JsonFileCursorStore::new(&checkpoint),
        )
        .unwrap()
        .with_clock(ManualClock::at(2024, 1, 1))
    };

    let first = build();
    let token = CancellationToken::new();
    let (_, report) = first.poll_once(first.initial_state().await, &token).await;
    assert_eq!(report.unwrap().rows, 1);
    assert!(first.store().load().await.unwrap().is_some());

    append(&source, "3,4\n");
    let second = build();
    let (_, report) = second.poll_once(second.initial_state().await, &token).await;
    assert_eq!(report.unwrap().rows, 1);
    assert_eq!(
        second.publisher().transport().delivered_payloads(),
        vec![serde_json::json!({"a": 3, "b": 4})]
    );
}
