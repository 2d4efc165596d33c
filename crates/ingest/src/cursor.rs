//! 커서 추적 및 체크포인트 저장소
//!
//! [`Cursor`]는 현재 소스 파일에서 이미 소비한 바이트 오프셋을 기억합니다.
//! [`SourceState`]는 커서와 스키마를 묶은 폴링 상태 값으로, 폴링 루프가
//! 한 반복마다 넘겨받고 다시 돌려줍니다 (전역 가변 상태 없음).
//!
//! # 커서 불변식
//! - 소스 식별자가 바뀌면 (로테이션) 오프셋은 0으로 리셋
//! - 파일이 재생성되면 (inode 변경, 크기 축소) 오프셋은 0으로 리셋
//! - 그 외에는 단조 증가
//!
//! # 체크포인트
//! [`CursorStore`]는 커서 영속화 확장 포인트입니다.
//! - [`MemoryCursorStore`]: 프로세스 메모리에만 보관 (재시작 시 처음부터)
//! - [`JsonFileCursorStore`]: JSON 파일에 원자적으로 기록 (write → rename)

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::IngestError;
use crate::schema::Schema;
use crate::source::SourceIdentity;

/// 소스 파일 읽기 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// 커서가 속한 소스 파일
    pub source: SourceIdentity,
    /// 소비 완료된 바이트 오프셋
    pub offset: u64,
    /// 파일 식별 번호 (Unix inode). 재생성 감지용
    #[serde(default)]
    pub file_id: Option<u64>,
    /// 너무 긴 줄을 버리는 중인지 여부 (다음 개행까지 건너뜀)
    #[serde(default)]
    pub discarding: bool,
}

impl Cursor {
    /// 오프셋 0의 새 커서를 생성합니다.
    pub fn new(source: SourceIdentity) -> Self {
        Self {
            source,
            offset: 0,
            file_id: None,
            discarding: false,
        }
    }

    /// 같은 소스의 처음으로 되돌립니다 (파일 재생성 시).
    pub fn rewind(&mut self) {
        self.offset = 0;
        self.file_id = None;
        self.discarding = false;
    }
}

/// 폴링 반복 사이에 유지되는 소스 상태
#[derive(Debug, Clone)]
pub struct SourceState {
    /// 읽기 커서
    pub cursor: Cursor,
    /// 감지된 스키마 (아직 감지 전이면 None)
    pub schema: Option<Schema>,
    /// 스키마 감지 직후 파일 끝으로 이동할지 여부 (기동 시 `start_position = end`)
    pub seek_to_end: bool,
}

impl SourceState {
    /// 새 소스 상태를 생성합니다.
    pub fn new(source: SourceIdentity) -> Self {
        Self {
            cursor: Cursor::new(source),
            schema: None,
            seek_to_end: false,
        }
    }

    /// 기존 내용을 건너뛰고 추가분만 읽도록 설정합니다.
    pub fn starting_at_end(mut self) -> Self {
        self.seek_to_end = true;
        self
    }

    /// 저장된 커서로부터 상태를 복원합니다. 스키마는 다시 감지합니다.
    pub fn resume(cursor: Cursor) -> Self {
        Self {
            cursor,
            schema: None,
            seek_to_end: false,
        }
    }

    /// 현재 추적 중인 소스 식별자
    pub fn source(&self) -> &SourceIdentity {
        &self.cursor.source
    }

    /// 새 소스로 전환합니다. 커서는 0, 스키마는 초기화됩니다.
    pub fn rotate_to(&mut self, source: SourceIdentity) {
        self.cursor = Cursor::new(source);
        self.schema = None;
        self.seek_to_end = false;
    }

    /// 같은 소스 파일이 재생성되었을 때 처음부터 다시 읽도록 초기화합니다.
    pub fn restart_file(&mut self) {
        self.cursor.rewind();
        self.schema = None;
        self.seek_to_end = false;
    }
}

/// 파일 메타데이터에서 재생성 감지용 식별 번호를 추출합니다.
#[cfg(unix)]
pub fn file_id(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

/// 파일 메타데이터에서 재생성 감지용 식별 번호를 추출합니다.
#[cfg(not(unix))]
pub fn file_id(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

/// 커서 영속화 저장소
pub trait CursorStore: Send + Sync + 'static {
    /// 마지막으로 저장된 커서를 읽습니다.
    fn load(&self) -> impl Future<Output = Result<Option<Cursor>, IngestError>> + Send;

    /// 커서를 저장합니다.
    fn save(&self, cursor: &Cursor) -> impl Future<Output = Result<(), IngestError>> + Send;
}

/// 메모리 전용 커서 저장소
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursor: Mutex<Option<Cursor>>,
}

impl MemoryCursorStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Option<Cursor>, IngestError> {
        Ok(self.cursor.lock().await.clone())
    }

    async fn save(&self, cursor: &Cursor) -> Result<(), IngestError> {
        *self.cursor.lock().await = Some(cursor.clone());
        Ok(())
    }
}

/// JSON 파일 커서 저장소
///
/// 임시 파일에 먼저 기록한 뒤 rename하여, 기록 도중 중단되어도
/// 이전 체크포인트가 손상되지 않습니다.
#[derive(Debug, Clone)]
pub struct JsonFileCursorStore {
    path: PathBuf,
}

impl JsonFileCursorStore {
    /// 체크포인트 파일 경로로 저장소를 생성합니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 체크포인트 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn checkpoint_error(&self, reason: impl ToString) -> IngestError {
        IngestError::Checkpoint {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl CursorStore for JsonFileCursorStore {
    async fn load(&self) -> Result<Option<Cursor>, IngestError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.checkpoint_error(e)),
        };
        let cursor = serde_json::from_slice(&content).map_err(|e| self.checkpoint_error(e))?;
        Ok(Some(cursor))
    }

    async fn save(&self, cursor: &Cursor) -> Result<(), IngestError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.checkpoint_error(e))?;
        }

        let body = serde_json::to_vec_pretty(cursor).map_err(|e| self.checkpoint_error(e))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.checkpoint_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.checkpoint_error(e))?;
        Ok(())
    }
}

/// 설정에 따라 선택되는 커서 저장소
#[derive(Debug)]
pub enum ConfiguredCursorStore {
    /// 메모리 전용
    Memory(MemoryCursorStore),
    /// JSON 파일
    File(JsonFileCursorStore),
}

impl ConfiguredCursorStore {
    /// 체크포인트 경로가 있으면 파일 저장소를, 없으면 메모리 저장소를 생성합니다.
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::File(JsonFileCursorStore::new(p)),
            None => Self::Memory(MemoryCursorStore::new()),
        }
    }
}

impl CursorStore for ConfiguredCursorStore {
    async fn load(&self) -> Result<Option<Cursor>, IngestError> {
        match self {
            Self::Memory(store) => store.load().await,
            Self::File(store) => store.load().await,
        }
    }

    async fn save(&self, cursor: &Cursor) -> Result<(), IngestError> {
        match self {
            Self::Memory(store) => store.save(cursor).await,
            Self::File(store) => store.save(cursor).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> SourceIdentity {
        SourceIdentity::new(format!("/data/{name}"))
    }

    #[test]
    fn rotate_resets_cursor_and_schema() {
        let mut state = SourceState::new(identity("src_20240101"));
        state.cursor.offset = 420;
        state.schema = Some(Schema::new(["a"], 2));

        state.rotate_to(identity("src_20240102"));
        assert_eq!(state.cursor.offset, 0);
        assert!(state.schema.is_none());
        assert_eq!(state.source(), &identity("src_20240102"));
    }

    #[test]
    fn restart_file_keeps_source() {
        let mut state = SourceState::new(identity("src_20240101")).starting_at_end();
        state.cursor.offset = 10;
        state.cursor.file_id = Some(7);
        state.restart_file();
        assert_eq!(state.cursor.offset, 0);
        assert_eq!(state.cursor.file_id, None);
        assert!(!state.seek_to_end);
        assert_eq!(state.source(), &identity("src_20240101"));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryCursorStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut cursor = Cursor::new(identity("a.csv"));
        cursor.offset = 99;
        store.save(&cursor).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(cursor));
    }

    #[tokio::test]
    async fn file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCursorStore::new(dir.path().join("cursor.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_persists_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCursorStore::new(dir.path().join("state/cursor.json"));

        let mut cursor = Cursor::new(identity("sample_data20240101.csv"));
        cursor.offset = 1234;
        cursor.file_id = Some(42);
        store.save(&cursor).await.unwrap();

        let reopened = JsonFileCursorStore::new(dir.path().join("state/cursor.json"));
        assert_eq!(reopened.load().await.unwrap(), Some(cursor));
        assert!(!dir.path().join("state/cursor.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_rejects_corrupt_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = JsonFileCursorStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, IngestError::Checkpoint { .. }));
    }

    #[tokio::test]
    async fn configured_store_selects_backend() {
        assert!(matches!(
            ConfiguredCursorStore::from_path(None),
            ConfiguredCursorStore::Memory(_)
        ));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let store = ConfiguredCursorStore::from_path(Some(&path));
        store.save(&Cursor::new(identity("x"))).await.unwrap();
        assert!(path.exists());
    }
}
