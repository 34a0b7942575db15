//! JSON-lines persistence of a record stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{Result, RetraceError};
use crate::types::{Record, RecordType};

use super::emitter::RecordSink;

/// Format version written in the header line
pub const RECORD_LOG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header {
    #[serde(rename = "type")]
    kind: String,
    version: u32,
    view_id: String,
    started_at: DateTime<Utc>,
    records: usize,
}

/// Recorded stream of one view, in emission order
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLog {
    pub view_id: String,
    pub started_at: DateTime<Utc>,
    pub records: Vec<Record>,
}

impl RecordLog {
    pub fn new(view_id: impl Into<String>) -> Self {
        Self {
            view_id: view_id.into(),
            started_at: Utc::now(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of one type
    pub fn of_type(&self, record_type: RecordType) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(move |record| record.record_type() == record_type)
    }

    /// Save the log: a header line, then one record per line
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);

        let header = Header {
            kind: "header".to_string(),
            version: RECORD_LOG_VERSION,
            view_id: self.view_id.clone(),
            started_at: self.started_at,
            records: self.records.len(),
        };
        writeln!(writer, "{}", serde_json::to_string(&header)?)?;

        for record in &self.records {
            writeln!(writer, "{}", serde_json::to_string(record)?)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load a log written by [`RecordLog::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut lines = BufReader::new(file).lines();

        let header_line = lines
            .next()
            .ok_or_else(|| RetraceError::RecordLog("empty file".to_string()))??;
        let header: Header = serde_json::from_str(&header_line)?;
        if header.kind != "header" {
            return Err(RetraceError::RecordLog(format!(
                "expected header line, found {}",
                header.kind
            )));
        }
        if header.version > RECORD_LOG_VERSION {
            return Err(RetraceError::RecordLog(format!(
                "unsupported version {}",
                header.version
            )));
        }

        let mut records = Vec::new();
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        if records.len() != header.records {
            return Err(RetraceError::RecordLog(format!(
                "header announces {} records, found {}",
                header.records,
                records.len()
            )));
        }

        Ok(Self {
            view_id: header.view_id,
            started_at: header.started_at,
            records,
        })
    }
}

impl RecordSink for RecordLog {
    fn write(&mut self, record: Record) {
        self.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FocusData, MetaData};

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("view.jsonl");

        let mut log = RecordLog::new("view-1");
        log.write(Record::Meta {
            timestamp: 1,
            data: MetaData {
                href: "https://example.test/".to_string(),
                width: 800,
                height: 600,
            },
        });
        log.write(Record::Focus {
            timestamp: 2,
            data: FocusData { has_focus: true },
        });
        log.write(Record::ViewEnd { timestamp: 3 });
        log.save(&path).unwrap();

        let loaded = RecordLog::load(&path).unwrap();
        assert_eq!(loaded.view_id, "view-1");
        assert_eq!(loaded.records, log.records);
        assert_eq!(loaded.of_type(RecordType::ViewEnd).count(), 1);
    }

    #[test]
    fn test_load_rejects_missing_header() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"type\":\"view_end\",\"timestamp\":3}\n").unwrap();

        assert!(RecordLog::load(&path).is_err());
    }

    #[test]
    fn test_load_empty_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.jsonl");
        std::fs::write(&path, "").unwrap();

        let err = RecordLog::load(&path).unwrap_err();
        assert!(matches!(err, RetraceError::RecordLog(_)));
    }

    #[test]
    fn test_load_rejects_record_count_mismatch() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("truncated.jsonl");
        let header = "{\"type\":\"header\",\"version\":1,\"view_id\":\"view-1\",\
            \"started_at\":\"2024-01-01T00:00:00Z\",\"records\":18446744073709551615}";
        std::fs::write(
            &path,
            format!("{header}\n{{\"type\":\"view_end\",\"timestamp\":3}}\n"),
        )
        .unwrap();

        let err = RecordLog::load(&path).unwrap_err();
        assert!(matches!(err, RetraceError::RecordLog(_)));
    }
}
