//! 레코드 디코딩 -- 구분자 기반 행을 타입이 있는 레코드로 변환
//!
//! [`RecordDecoder`]는 tail 리더가 돌려준 완성된 줄 묶음을 스키마의 컬럼
//! 순서에 맞춰 나누고, 각 필드를 독립적으로 변환합니다.
//!
//! # 필드 변환 규칙
//! - 빈 문자열 (또는 설정된 null 표식) → `null`
//! - 정수로 해석 가능 → 정수
//! - 유한한 실수로 해석 가능 → 실수
//! - 그 외 → 원본 문자열
//!
//! 컬럼 단위로 타입을 고정하지 않습니다. 같은 컬럼의 값이라도 행마다
//! 숫자와 문자열이 섞일 수 있습니다.
//!
//! 개별 필드가 잘못되어도 디코딩은 실패하지 않습니다 (null 또는 문자열로 처리).

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::schema::Schema;

/// 필드 값
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 빈 값
    Null,
    /// 정수
    Integer(i64),
    /// 유한한 실수
    Float(f64),
    /// 숫자로 해석되지 않는 문자열
    Text(String),
}

impl FieldValue {
    /// 원시 필드 문자열을 변환합니다.
    pub fn coerce(raw: &str, null_markers: &[String]) -> Self {
        if raw.is_empty() || null_markers.iter().any(|m| m == raw) {
            return Self::Null;
        }

        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Integer(i);
        }
        match trimmed.parse::<f64>() {
            // "NaN", "inf" 등은 JSON 숫자로 표현할 수 없으므로 문자열로 유지
            Ok(f) if f.is_finite() => Self::Float(f),
            _ => Self::Text(raw.to_owned()),
        }
    }

}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// 디코딩된 한 행
///
/// 키 집합은 항상 스키마의 컬럼이며, JSON 직렬화 시 컬럼 순서를 유지합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<FieldValue>,
}

impl Record {
    /// 컬럼과 값으로 레코드를 생성합니다. 값이 부족하면 null로 채웁니다.
    pub fn new(columns: Arc<[String]>, mut values: Vec<FieldValue>) -> Self {
        values.resize(columns.len(), FieldValue::Null);
        Self { columns, values }
    }

    /// 컬럼 이름으로 값을 조회합니다.
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// (컬럼, 값) 쌍을 컬럼 순서대로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// 컬럼 수
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 컬럼이 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 스트림 페이로드 형식(JSON 객체 + 개행)으로 직렬화합니다.
    pub fn to_json_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = serde_json::to_vec(self)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// 레코드 디코더
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    delimiter: u8,
    null_markers: Vec<String>,
}

impl RecordDecoder {
    /// 새 디코더를 생성합니다.
    pub fn new(delimiter: u8, null_markers: Vec<String>) -> Self {
        Self {
            delimiter,
            null_markers,
        }
    }

    /// 완성된 줄 묶음을 레코드 목록으로 변환합니다.
    ///
    /// 입력은 개행으로 끝나는 줄들이어야 합니다 (tail 리더가 보장).
    /// 빈 줄은 건너뛰고, 스키마보다 필드가 적으면 나머지는 null,
    /// 많으면 초과분은 버립니다.
    pub fn decode(&self, chunk: &[u8], schema: &Schema) -> Vec<Record> {
        let columns = schema.shared_columns();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(chunk);

        let mut records = Vec::new();
        let mut surplus_rows = 0usize;
        let mut row = csv::ByteRecord::new();
        loop {
            match reader.read_byte_record(&mut row) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable row");
                    continue;
                }
            }

            if row.len() > columns.len() {
                surplus_rows += 1;
            }
            let values = row
                .iter()
                .take(columns.len())
                .map(|field| FieldValue::coerce(&String::from_utf8_lossy(field), &self.null_markers))
                .collect();
            records.push(Record::new(Arc::clone(&columns), values));
        }

        if surplus_rows > 0 {
            tracing::debug!(
                rows = surplus_rows,
                columns = columns.len(),
                "rows had more fields than the header, extra fields dropped"
            );
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(cols: &[&str]) -> Schema {
        Schema::new(cols.iter().copied(), 0)
    }

    fn decoder() -> RecordDecoder {
        RecordDecoder::new(b',', Vec::new())
    }

    #[test]
    fn coerces_numeric_empty_and_text() {
        assert_eq!(FieldValue::coerce("12.5", &[]), FieldValue::Float(12.5));
        assert_eq!(FieldValue::coerce("", &[]), FieldValue::Null);
        assert_eq!(FieldValue::coerce("abc", &[]), FieldValue::Text("abc".to_owned()));
        assert_eq!(FieldValue::coerce("42", &[]), FieldValue::Integer(42));
        assert_eq!(FieldValue::coerce("-3e2", &[]), FieldValue::Float(-300.0));
    }

    #[test]
    fn non_finite_numbers_stay_text() {
        assert_eq!(FieldValue::coerce("NaN", &[]), FieldValue::Text("NaN".to_owned()));
        assert_eq!(FieldValue::coerce("inf", &[]), FieldValue::Text("inf".to_owned()));
    }

    #[test]
    fn null_markers_are_honoured() {
        let markers = vec!["NA".to_owned()];
        assert_eq!(FieldValue::coerce("NA", &markers), FieldValue::Null);
        assert_eq!(FieldValue::coerce("NAN", &markers), FieldValue::Text("NAN".to_owned()));
    }

    #[test]
    fn decodes_rows_positionally() {
        let schema = schema(&["ts", "product", "value"]);
        let records = decoder().decode(b"1,A,2.5\n2,B,\n", &schema);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("ts"), Some(&FieldValue::Integer(1)));
        assert_eq!(records[0].get("product"), Some(&FieldValue::Text("A".to_owned())));
        assert_eq!(records[0].get("value"), Some(&FieldValue::Float(2.5)));
        assert_eq!(records[1].get("value"), Some(&FieldValue::Null));
    }

    #[test]
    fn decoding_judges_each_field_independently() {
        // 컬럼 단위 타입 고정 없음: 같은 컬럼에서 숫자와 문자열이 섞일 수 있음
        let schema = schema(&["value"]);
        let records = decoder().decode(b"1.5\nERR\n7\n", &schema);
        assert_eq!(records[0].get("value"), Some(&FieldValue::Float(1.5)));
        assert_eq!(records[1].get("value"), Some(&FieldValue::Text("ERR".to_owned())));
        assert_eq!(records[2].get("value"), Some(&FieldValue::Integer(7)));
    }

    #[test]
    fn short_rows_fill_null_and_long_rows_truncate() {
        let schema = schema(&["a", "b", "c"]);
        let records = decoder().decode(b"1\n1,2,3,4,5\n", &schema);
        assert_eq!(records[0].len(), 3);
        assert_eq!(records[0].get("c"), Some(&FieldValue::Null));
        assert_eq!(records[1].len(), 3);
        assert_eq!(records[1].get("c"), Some(&FieldValue::Integer(3)));
    }

    #[test]
    fn handles_quotes_crlf_and_blank_lines() {
        let schema = schema(&["name", "note"]);
        let records = decoder().decode(b"\"Doe, J\",\"said \"\"hi\"\"\"\r\n\r\nx,y\r\n", &schema);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), Some(&FieldValue::Text("Doe, J".to_owned())));
        assert_eq!(
            records[0].get("note"),
            Some(&FieldValue::Text("said \"hi\"".to_owned()))
        );
    }

    #[test]
    fn json_line_preserves_column_order_and_unicode() {
        let schema = schema(&["z", "a", "製品"]);
        let records = decoder().decode("3,,ねじ\n".as_bytes(), &schema);
        let line = records[0].to_json_line().unwrap();
        assert_eq!(
            String::from_utf8(line).unwrap(),
            "{\"z\":3,\"a\":null,\"製品\":\"ねじ\"}\n"
        );
    }
}
