//! Interchange serialisations of the stored record set.

use std::fmt;
use std::str::FromStr;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use litharvest_common::{LitharvestError, Result};

use crate::models::CanonicalRecord;

const CSV_HEADER: [&str; 9] = ["ID", "Title", "Authors", "Date", "DOI", "URL", "Language", "Source", "Abstract"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Ndjson,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Ndjson => "ndjson",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = LitharvestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "ndjson" | "jsonl" => Ok(ExportFormat::Ndjson),
            other => Err(LitharvestError::InvalidRequest(format!("unsupported export format: {other}"))),
        }
    }
}

/// Pretty-printed JSON array of full records.
pub fn to_json(records: &[CanonicalRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// One compact JSON object per line, no trailing newline.
pub fn to_ndjson(records: &[CanonicalRecord]) -> Result<String> {
    let lines = records
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

/// Every field double-quoted, embedded quotes doubled, authors joined with
/// `"; "`. An empty record set exports as an empty string.
pub fn to_csv(records: &[CanonicalRecord]) -> Result<String> {
    if records.is_empty() {
        return Ok(String::new());
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for r in records {
        let id = r.id.to_string();
        let authors = r.authors.join("; ");
        let date = r.date.format("%Y-%m-%d").to_string();
        writer.write_record([
            id.as_str(),
            r.title.as_str(),
            authors.as_str(),
            date.as_str(),
            r.doi.as_deref().unwrap_or(""),
            r.url.as_str(),
            r.language.as_str(),
            r.source.as_str(),
            r.abstract_text.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| LitharvestError::Io(e.into_error()))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| LitharvestError::Parse(format!("CSV output is not UTF-8: {e}")))?;
    Ok(text.trim_end_matches('\n').to_string())
}

pub fn export_records(records: &[CanonicalRecord], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(records),
        ExportFormat::Csv => to_csv(records),
        ExportFormat::Ndjson => to_ndjson(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn record(title: &str) -> CanonicalRecord {
        CanonicalRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            authors: vec!["Doe, J.".into(), "Roe R".into()],
            date: NaiveDate::from_ymd_opt(2024, 4, 9).unwrap(),
            doi: None,
            url: "https://doi.org/10.1/q".into(),
            language: "en".into(),
            source: SourceKind::CrossRef,
            abstract_text: "Line one,\nline two".into(),
            full_text_chunks: vec!["chunk".into()],
            files: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn csv_doubles_quotes_and_round_trips() {
        let title = r#"The "quoted" title"#;
        let rec = record(title);
        let csv_text = to_csv(&[rec.clone()]).unwrap();

        let mut lines = csv_text.lines();
        assert_eq!(
            lines.next().unwrap(),
            r#""ID","Title","Authors","Date","DOI","URL","Language","Source","Abstract""#
        );
        assert!(csv_text.contains(r#""The ""quoted"" title""#));
        assert!(csv_text.contains(r#""Doe, J.; Roe R""#));

        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], rec.id.to_string());
        assert_eq!(&rows[0][1], title);
        assert_eq!(&rows[0][3], "2024-04-09");
        assert_eq!(&rows[0][4], "");
        assert_eq!(&rows[0][7], "CrossRef");
        assert_eq!(&rows[0][8], "Line one,\nline two");
    }

    #[test]
    fn empty_csv_is_empty_string() {
        assert_eq!(to_csv(&[]).unwrap(), "");
    }

    #[test]
    fn ndjson_is_one_compact_object_per_line() {
        let out = to_ndjson(&[record("a"), record("b")]).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value["title"].is_string());
            assert!(!line.contains('\n'));
        }
    }

    #[test]
    fn json_is_a_pretty_array_of_full_records() {
        let recs = vec![record("a")];
        let out = export_records(&recs, ExportFormat::Json).unwrap();
        assert!(out.starts_with("[\n"));
        let back: Vec<CanonicalRecord> = serde_json::from_str(&out).unwrap();
        assert_eq!(back, recs);
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("jsonl".parse::<ExportFormat>().unwrap(), ExportFormat::Ndjson);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
