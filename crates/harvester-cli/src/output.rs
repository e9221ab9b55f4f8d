use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use harvester_core::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One JSON object per line
    Jsonl,
    /// `id,captured_at,data` with the payload as a JSON string
    Csv,
}

/// Writes records as they are yielded, flushing after each one so a
/// force-stopped run keeps everything emitted so far.
pub enum RecordWriter<W: Write> {
    Jsonl(W),
    Csv(csv::Writer<W>),
}

impl<W: Write> RecordWriter<W> {
    pub fn new(format: Format, out: W) -> Result<Self> {
        Ok(match format {
            Format::Jsonl => RecordWriter::Jsonl(out),
            Format::Csv => {
                let mut writer = csv::Writer::from_writer(out);
                writer.write_record(["id", "captured_at", "data"])?;
                writer.flush()?;
                RecordWriter::Csv(writer)
            }
        })
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        match self {
            RecordWriter::Jsonl(out) => {
                serde_json::to_writer(&mut *out, record)?;
                out.write_all(b"\n")?;
                out.flush()?;
            }
            RecordWriter::Csv(writer) => {
                writer.write_record([
                    record.id.as_str(),
                    record.captured_at.to_rfc3339().as_str(),
                    record.data.to_string().as_str(),
                ])?;
                writer.flush()?;
            }
        }
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        Ok(match self {
            RecordWriter::Jsonl(out) => out,
            RecordWriter::Csv(writer) => writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> Record {
        Record::new(id, json!({"node": {"id": id, "text": "a, \"quoted\" caption"}}))
    }

    #[test]
    fn jsonl_writes_one_object_per_line() {
        let mut writer = RecordWriter::new(Format::Jsonl, Vec::new()).unwrap();
        writer.write(&record("1")).unwrap();
        writer.write(&record("2")).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], "1");
        assert_eq!(first["data"]["node"]["id"], "1");
        assert!(first["captured_at"].is_string());
    }

    #[test]
    fn csv_has_header_and_escaped_payload() {
        let mut writer = RecordWriter::new(Format::Csv, Vec::new()).unwrap();
        writer.write(&record("42")).unwrap();
        let out = writer.into_inner().unwrap();

        let mut reader = csv::Reader::from_reader(out.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), ["id", "captured_at", "data"]);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "42");
        let data: serde_json::Value = serde_json::from_str(&rows[0][2]).unwrap();
        assert_eq!(data["node"]["text"], "a, \"quoted\" caption");
    }

    #[test]
    fn csv_without_records_is_just_the_header() {
        let writer = RecordWriter::new(Format::Csv, Vec::new()).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "id,captured_at,data\n");
    }
}
