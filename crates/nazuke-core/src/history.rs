//! Append-only history of proposed names and its CSV sink.
//!
//! The history is owned by the caller and handed the candidates of each
//! request explicitly; nothing here is global or shared between sessions.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{NameCandidate, Scores, StoreError, TargetType};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Byte-order mark so spreadsheet tools detect UTF-8.
const UTF8_BOM: &str = "\u{feff}";

const HEADER: [&str; 12] = [
    "timestamp",
    "target",
    "name",
    "reading",
    "sound",
    "form",
    "originality",
    "readability",
    "intent",
    "overall",
    "rationale",
    "source_fragment",
];

/// One flattened row of the history log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub target: TargetType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
    pub scores: Scores,
    pub overall: f64,
    pub rationale: String,
    pub source_fragment: String,
}

impl LogRecord {
    pub fn from_candidate(candidate: &NameCandidate, target: TargetType, now: NaiveDateTime) -> Self {
        Self {
            timestamp: now,
            target,
            name: candidate.display_name.clone(),
            reading: candidate.reading.clone(),
            scores: candidate.scores,
            overall: candidate.overall,
            rationale: candidate.rationale.clone(),
            source_fragment: candidate.source_fragment.clone(),
        }
    }

    fn fields(&self) -> [String; 12] {
        let s = &self.scores;
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.target.label().to_string(),
            self.name.clone(),
            self.reading.clone().unwrap_or_default(),
            s.sound.to_string(),
            s.form.to_string(),
            s.originality.to_string(),
            s.readability.to_string(),
            s.intent.to_string(),
            format!("{:.1}", self.overall),
            self.rationale.clone(),
            self.source_fragment.clone(),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<LogRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record per candidate, preserving candidate order.
    pub fn record(&mut self, target: TargetType, candidates: &[NameCandidate], now: NaiveDateTime) {
        self.records.extend(
            candidates
                .iter()
                .map(|c| LogRecord::from_candidate(c, target, now)),
        );
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The whole history as a BOM-prefixed CSV document.
    pub fn to_csv(&self) -> String {
        let mut out = String::from(UTF8_BOM);
        write_row(&mut out, HEADER.iter().copied());
        for record in &self.records {
            let fields = record.fields();
            write_row(&mut out, fields.iter().map(String::as_str));
        }
        out
    }
}

/// File name used when exporting the history for a given day.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("naming_log_{}.csv", date.format("%Y%m%d"))
}

/// Append `records` to the CSV file at `path`, creating it (with BOM and
/// header) when it does not exist yet or is empty.
pub fn append_csv(path: &Path, records: &[LogRecord]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_new = file.metadata()?.len() == 0;

    let mut out = String::new();
    if is_new {
        out.push_str(UTF8_BOM);
        write_row(&mut out, HEADER.iter().copied());
    }
    for record in records {
        let fields = record.fields();
        write_row(&mut out, fields.iter().map(String::as_str));
    }
    file.write_all(out.as_bytes())?;
    Ok(())
}

fn write_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(h, 30, 0)
            .unwrap()
    }

    fn candidate(name: &str, rationale: &str) -> NameCandidate {
        NameCandidate {
            display_name: name.to_string(),
            reading: None,
            scores: Scores::default(),
            overall: 50.0,
            rationale: rationale.to_string(),
            source_fragment: format!("名前：{name}\n"),
        }
    }

    #[test]
    fn record_keeps_order_and_accumulates() {
        let mut history = History::new();
        history.record(TargetType::Pet, &[candidate("A", ""), candidate("B", "")], at(9));
        history.record(TargetType::Human, &[candidate("A", "")], at(10));

        let names: Vec<&str> = history.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "A"]);
        assert_eq!(history.records()[2].target, TargetType::Human);
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        let mut history = History::new();
        history.record(
            TargetType::Human,
            &[candidate("光", "明るい, \"元気\"な子に")],
            at(9),
        );
        let csv = history.to_csv();
        assert!(csv.starts_with('\u{feff}'));

        let lines: Vec<&str> = csv.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(lines[0], HEADER.join(","));
        assert!(lines[1].starts_with("2024-04-01 09:30:00,人間,光,,50,50,50,50,50,50.0,"));
        assert!(lines[1].contains("\"明るい, \"\"元気\"\"な子に\""));
        // source fragment ends in a newline, so it is quoted across two lines
        assert!(lines[1].ends_with("\"名前：光"));
    }

    #[test]
    fn append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log").join("naming_log.csv");
        let rec = LogRecord::from_candidate(&candidate("蒼", "blue"), TargetType::Character, at(8));

        append_csv(&path, &[rec.clone()]).unwrap();
        append_csv(&path, &[rec]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("timestamp,target").count(), 1);
        assert_eq!(content.matches('\u{feff}').count(), 1);
        assert_eq!(content.matches(",蒼,").count(), 2);
    }

    #[test]
    fn export_name_uses_compact_date() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 5).unwrap();
        assert_eq!(export_file_name(date), "naming_log_20241205.csv");
    }
}
