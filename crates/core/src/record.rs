//! Record sink - append-only store-write interface
//!
//! Decisions and alerts are emitted as [`ComplianceRecord`]s. The storage
//! schema belongs to the persistence collaborator; this crate only ships a
//! JSONL file sink and an in-memory sink for tests.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::decision::Decision;
use crate::error::SinkResult;

/// Records appended to the compliance store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum ComplianceRecord {
    DecisionRecorded {
        decision: Decision,
        recorded_at: DateTime<Utc>,
    },
    AlertPublished {
        alert: Alert,
        recorded_at: DateTime<Utc>,
    },
}

impl ComplianceRecord {
    pub fn decision(decision: &Decision) -> Self {
        ComplianceRecord::DecisionRecorded {
            decision: decision.clone(),
            recorded_at: Utc::now(),
        }
    }

    pub fn alert(alert: &Alert) -> Self {
        ComplianceRecord::AlertPublished {
            alert: alert.clone(),
            recorded_at: Utc::now(),
        }
    }
}

/// Store-write interface consumed by the evaluator and the alert hub
pub trait RecordSink: Send + Sync {
    fn append(&self, record: &ComplianceRecord) -> SinkResult<()>;
}

/// Append-only JSONL file sink
///
/// Each line is one serialized [`ComplianceRecord`].
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open (or create) the sink file in append mode
    pub fn new(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back (for audits and tests)
    pub fn read_all(&self) -> SinkResult<Vec<ComplianceRecord>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }
}

impl RecordSink for JsonlSink {
    fn append(&self, record: &ComplianceRecord) -> SinkResult<()> {
        let json = serde_json::to_string(record)?;
        let mut file = self.file.lock();
        writeln!(file, "{}", json)?;
        file.flush()?;
        Ok(())
    }
}

/// In-memory sink
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ComplianceRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ComplianceRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl RecordSink for MemorySink {
    fn append(&self, record: &ComplianceRecord) -> SinkResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
