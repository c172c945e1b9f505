//! Record persistence.

use std::fs::{File, OpenOptions};
use std::path::Path;

use tracing::debug;

use crate::error::SinkError;
use crate::models::{ResultRecord, RECORD_COLUMNS};

/// Destination for extracted records.
pub trait RecordSink: Send {
    /// Persist a batch. Records are durable once this returns.
    fn write_records(&mut self, records: &[ResultRecord]) -> Result<(), SinkError>;
}

/// Appends records to a CSV file in [`RECORD_COLUMNS`] order.
///
/// The header row is written only when the file is new or empty, so repeated
/// runs can append to the same file.
pub struct CsvSink {
    writer: csv::Writer<File>,
    written: usize,
}

impl CsvSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let needs_header = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(RECORD_COLUMNS)?;
            writer.flush()?;
            debug!("Wrote CSV header to {}", path.display());
        }

        Ok(Self {
            writer,
            written: 0,
        })
    }

    /// Records written through this sink.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl RecordSink for CsvSink {
    fn write_records(&mut self, records: &[ResultRecord]) -> Result<(), SinkError> {
        for record in records {
            self.writer.write_record(record.to_row())?;
        }
        self.writer.flush()?;
        self.written += records.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ResultRecord {
        ResultRecord {
            jurisdiction: "Berlin".into(),
            name: name.into(),
            office: "Kanzlei \"Muster\", Berlin".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_header_written_once_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("lawyers.csv");

        let mut sink = CsvSink::open(&path).unwrap();
        sink.write_records(&[record("A")]).unwrap();
        drop(sink);

        let mut sink = CsvSink::open(&path).unwrap();
        sink.write_records(&[record("B"), record("C")]).unwrap();
        assert_eq!(sink.written(), 2);
        drop(sink);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), RECORD_COLUMNS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][1], "B");
        assert_eq!(&rows[0][3], "Kanzlei \"Muster\", Berlin");
    }

    #[test]
    fn test_existing_empty_file_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();

        CsvSink::open(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("bar,name,professional_title,"));
    }
}
