//! 스키마(헤더) 감지
//!
//! 소스 파일의 첫 줄을 읽어 순서가 보존된 컬럼 이름 목록([`Schema`])을
//! 만듭니다. 스키마는 하나의 소스 파일에 대해서만 유효하며 로테이션 시
//! 다시 감지됩니다.
//!
//! # 헤더 정규화
//! - 선두 UTF-8 BOM 제거
//! - 컬럼명 앞뒤 공백 제거
//! - 빈 컬럼명 → `Unnamed: {index}`
//! - 중복 컬럼명 → `name.1`, `name.2`, ... (스키마 내 유일성 보장)

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::error::IngestError;

/// 헤더 한 줄의 최대 길이 (바이트)
pub const MAX_HEADER_BYTES: u64 = 64 * 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 소스 파일의 컬럼 스키마
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Arc<[String]>,
    header_len: u64,
}

impl Schema {
    /// 컬럼 목록과 헤더 줄 길이(개행 포함)로 스키마를 생성합니다.
    ///
    /// 컬럼명은 정규화되어 항상 유일합니다.
    pub fn new<I, S>(columns: I, header_len: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            columns: normalize_columns(columns).into(),
            header_len,
        }
    }

    /// 컬럼 이름 목록
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 공유 가능한 컬럼 목록 (레코드가 참조)
    pub fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    /// 컬럼 수
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// 컬럼이 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// 헤더 줄의 바이트 길이 (개행 문자 포함)
    ///
    /// 커서가 0일 때 리더는 이 위치부터 데이터를 읽습니다.
    pub fn header_len(&self) -> u64 {
        self.header_len
    }
}

/// 스키마 감지기
#[derive(Debug, Clone)]
pub struct SchemaDetector {
    delimiter: u8,
    timeout: Duration,
}

impl SchemaDetector {
    /// 새 감지기를 생성합니다.
    pub fn new(delimiter: u8, timeout: Duration) -> Self {
        Self { delimiter, timeout }
    }

    /// 파일의 헤더 줄을 읽어 스키마를 만듭니다.
    ///
    /// 파일이 없거나 비어 있거나, 헤더 줄이 아직 개행으로 끝나지 않은 경우
    /// [`IngestError::SchemaUnavailable`]을 반환합니다. 호출자는 이 경우
    /// 커서를 0에 둔 채 다음 폴링에서 다시 시도해야 합니다.
    pub async fn detect(&self, path: &Path) -> Result<Schema, IngestError> {
        let unavailable = |reason: String| IngestError::SchemaUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let line = tokio::time::timeout(self.timeout, read_first_line(path))
            .await
            .map_err(|_| unavailable("timed out reading header".to_owned()))?
            .map_err(|e| unavailable(e.to_string()))?;

        if line.is_empty() {
            return Err(unavailable("file is empty".to_owned()));
        }
        if line.last() != Some(&b'\n') {
            if line.len() as u64 >= MAX_HEADER_BYTES {
                return Err(unavailable(format!(
                    "header exceeds {MAX_HEADER_BYTES} bytes"
                )));
            }
            return Err(unavailable("header line not yet terminated".to_owned()));
        }

        let header_len = line.len() as u64;
        let mut body = line.strip_prefix(UTF8_BOM).unwrap_or(&line[..]);
        body = body.strip_suffix(b"\n").unwrap_or(body);
        body = body.strip_suffix(b"\r").unwrap_or(body);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .from_reader(body);
        let mut record = csv::ByteRecord::new();
        let has_record = reader
            .read_byte_record(&mut record)
            .map_err(|e| unavailable(format!("malformed header: {e}")))?;
        if !has_record {
            return Err(unavailable("header line is blank".to_owned()));
        }

        let names: Vec<String> = record
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        Ok(Schema::new(names, header_len))
    }
}

async fn read_first_line(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut reader = BufReader::new(file.take(MAX_HEADER_BYTES));
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line).await?;
    Ok(line)
}

fn normalize_columns<I, S>(columns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let raw: Vec<String> = columns
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let trimmed = name.as_ref().trim();
            if trimmed.is_empty() {
                format!("Unnamed: {i}")
            } else {
                trimmed.to_owned()
            }
        })
        .collect();

    let mut seen: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());
    for name in raw {
        let mut candidate = name.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{name}.{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> SchemaDetector {
        SchemaDetector::new(b',', Duration::from_secs(5))
    }

    #[tokio::test]
    async fn detects_ordered_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.csv");
        std::fs::write(&path, "timestamp,product,value\n1,A,2.5\n").unwrap();

        let schema = detector().detect(&path).await.unwrap();
        assert_eq!(schema.columns(), ["timestamp", "product", "value"]);
        assert_eq!(schema.header_len(), 24);
    }

    #[tokio::test]
    async fn strips_bom_and_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.csv");
        std::fs::write(&path, b"\xEF\xBB\xBFa, b\r\n1,2\r\n").unwrap();

        let schema = detector().detect(&path).await.unwrap();
        assert_eq!(schema.columns(), ["a", "b"]);
        // BOM과 CRLF 모두 헤더 길이에 포함
        assert_eq!(schema.header_len(), 3 + 4 + 2);
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = detector()
            .detect(&dir.path().join("absent.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::SchemaUnavailable { .. }));
    }

    #[tokio::test]
    async fn empty_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.csv");
        std::fs::write(&path, b"").unwrap();
        let err = detector().detect(&path).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn unterminated_header_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.csv");
        std::fs::write(&path, b"timestamp,prod").unwrap();
        let err = detector().detect(&path).await.unwrap_err();
        assert!(err.to_string().contains("not yet terminated"));
    }

    #[tokio::test]
    async fn honours_custom_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.tsv");
        std::fs::write(&path, b"a\tb\tc\n").unwrap();
        let schema = SchemaDetector::new(b'\t', Duration::from_secs(5))
            .detect(&path)
            .await
            .unwrap();
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn duplicate_and_blank_names_are_made_unique() {
        let schema = Schema::new(["a", "", "a", "a", "b"], 0);
        assert_eq!(schema.columns(), ["a", "Unnamed: 1", "a.1", "a.2", "b"]);
    }
}
