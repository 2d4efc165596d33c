//! 증분 tail 리더
//!
//! 커서 위치부터 파일 끝까지 **완성된 줄**만 읽어 돌려줍니다. 아직 개행으로
//! 끝나지 않은 마지막 줄은 소비하지 않으므로, 기록 중인 행이 잘린 채로
//! 디코딩되는 일은 없습니다. 그 행이 나중에 완성되면 정확히 한 번 읽힙니다.
//!
//! 따옴표로 감싼 필드 안의 개행은 줄 끝으로 보지 않습니다. 열린 따옴표가
//! 닫히지 않은 행은 미완성으로 취급하여 다음 읽기로 미룹니다.
//!
//! 한 번의 읽기는 `max_read_bytes`로 제한됩니다. 개행 없이 이 한도를 넘는
//! 줄은 경고와 함께 버리고 (`Cursor::discarding`), 다음 개행부터 읽기를
//! 재개합니다.

use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::cursor::{Cursor, file_id};
use crate::error::IngestError;
use crate::schema::Schema;

/// 한 번의 읽기 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailChunk {
    /// 완성된 줄들 (비어 있거나 개행으로 끝남)
    pub lines: Vec<u8>,
    /// 읽기 이후의 커서
    pub cursor: Cursor,
    /// 너무 긴 줄로 판단되어 버린 바이트 수
    pub discarded: u64,
}

impl TailChunk {
    /// 새로 읽은 줄이 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// tail 리더
#[derive(Debug, Clone)]
pub struct TailReader {
    max_read_bytes: usize,
    io_timeout: Duration,
}

impl TailReader {
    /// 새 리더를 생성합니다.
    pub fn new(max_read_bytes: usize, io_timeout: Duration) -> Self {
        Self {
            max_read_bytes: max_read_bytes.max(1),
            io_timeout,
        }
    }

    /// 커서 이후의 완성된 줄을 읽습니다.
    ///
    /// 커서가 0이면 스키마의 헤더 줄을 건너뜁니다. 입력 커서는 변경하지 않으며,
    /// 새 커서는 결과에 담겨 반환됩니다 (호출자가 전송 후 확정).
    ///
    /// # Errors
    ///
    /// 파일 열기/읽기 실패나 타임아웃 시 [`IngestError::FileAccess`]를 반환합니다.
    pub async fn read(&self, cursor: &Cursor, schema: &Schema) -> Result<TailChunk, IngestError> {
        let path = cursor.source.path();
        match tokio::time::timeout(self.io_timeout, self.read_inner(path, cursor, schema)).await {
            Ok(result) => result.map_err(|e| IngestError::FileAccess {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
            Err(_) => Err(IngestError::FileAccess {
                path: path.to_path_buf(),
                reason: format!("read timed out after {:?}", self.io_timeout),
            }),
        }
    }

    /// 이미 존재하는 완성된 줄을 모두 건너뛴 커서를 반환합니다.
    ///
    /// 기동 시 `start_position = end`일 때 사용합니다. 쓰는 중인 마지막 줄은
    /// 건너뛰지 않으므로 완성되면 정상적으로 읽힙니다.
    pub async fn skip_to_end(&self, cursor: &Cursor, schema: &Schema) -> Result<Cursor, IngestError> {
        let path = cursor.source.path();
        match tokio::time::timeout(self.io_timeout, self.skip_inner(path, cursor, schema)).await {
            Ok(result) => result.map_err(|e| IngestError::FileAccess {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
            Err(_) => Err(IngestError::FileAccess {
                path: path.to_path_buf(),
                reason: format!("seek timed out after {:?}", self.io_timeout),
            }),
        }
    }

    async fn skip_inner(
        &self,
        path: &Path,
        cursor: &Cursor,
        schema: &Schema,
    ) -> std::io::Result<Cursor> {
        let mut file = tokio::fs::File::open(path).await?;
        let meta = file.metadata().await?;
        let mut next = cursor.clone();
        next.file_id = file_id(&meta);

        let start = cursor.offset.max(schema.header_len());
        if meta.len() <= start {
            return Ok(next);
        }

        // 끝에서부터 한 창만큼만 읽어 마지막 개행을 찾음
        let window = (meta.len() - start).min(self.max_read_bytes as u64);
        let window_start = meta.len() - window;
        file.seek(SeekFrom::Start(window_start)).await?;
        let mut buf = Vec::with_capacity(window as usize);
        file.take(window).read_to_end(&mut buf).await?;

        match buf.iter().rposition(|&b| b == b'\n') {
            Some(last) => next.offset = window_start + last as u64 + 1,
            None if window_start > start => {
                // 창 전체가 한 줄의 일부: 그 줄은 끝날 때까지 버림
                next.offset = meta.len();
                next.discarding = true;
            }
            None => {}
        }
        Ok(next)
    }

    async fn read_inner(
        &self,
        path: &Path,
        cursor: &Cursor,
        schema: &Schema,
    ) -> std::io::Result<TailChunk> {
        let mut file = tokio::fs::File::open(path).await?;
        let meta = file.metadata().await?;

        let mut next = cursor.clone();
        next.file_id = file_id(&meta);

        let start = if cursor.offset == 0 {
            schema.header_len()
        } else {
            cursor.offset
        };
        if meta.len() <= start {
            return Ok(TailChunk {
                lines: Vec::new(),
                cursor: next,
                discarded: 0,
            });
        }

        let window = (meta.len() - start).min(self.max_read_bytes as u64);
        file.seek(SeekFrom::Start(start)).await?;
        let mut buf = Vec::with_capacity(window as usize);
        file.take(window).read_to_end(&mut buf).await?;
        let window_full = buf.len() >= self.max_read_bytes;

        let mut discarded = 0u64;
        if next.discarding {
            match buf.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    discarded = (pos + 1) as u64;
                    buf.drain(..=pos);
                    next.discarding = false;
                }
                None => {
                    next.offset = start + buf.len() as u64;
                    return Ok(TailChunk {
                        lines: Vec::new(),
                        cursor: next,
                        discarded: buf.len() as u64,
                    });
                }
            }
        }

        match last_record_end(&buf) {
            Some(last) => {
                buf.truncate(last + 1);
                next.offset = start + discarded + buf.len() as u64;
            }
            None if window_full && discarded == 0 => {
                tracing::warn!(
                    file = %cursor.source.file_name(),
                    offset = start,
                    limit = self.max_read_bytes,
                    "line exceeds read limit, discarding until next newline"
                );
                next.offset = start + buf.len() as u64;
                next.discarding = true;
                return Ok(TailChunk {
                    lines: Vec::new(),
                    cursor: next,
                    discarded: buf.len() as u64,
                });
            }
            None => {
                buf.clear();
                if discarded > 0 {
                    next.offset = start + discarded;
                }
            }
        }

        Ok(TailChunk {
            lines: buf,
            cursor: next,
            discarded,
        })
    }
}

/// 따옴표 밖에 있는 마지막 개행의 위치를 찾습니다.
///
/// `buf`는 행 경계에서 시작해야 합니다. 이스케이프된 따옴표(`""`)는 상태를
/// 두 번 뒤집으므로 따로 처리하지 않아도 됩니다.
fn last_record_end(buf: &[u8]) -> Option<usize> {
    let mut in_quotes = false;
    let mut last = None;
    for (i, &b) in buf.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => last = Some(i),
            _ => {}
        }
    }
    last
}
