//! Output formatting and persistence for datasets, reports and history.
//!
//! Supports pretty-printing, JSON and plain-text reports, and CSV export/append.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fmt::{Debug, Write as _};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::types::AnalysisReport;
use crate::dataset::{CarparkRecord, Dataset, DatasetSummary, Status};

/// Records included in the `data_sample` of a JSON report.
pub const REPORT_SAMPLE_SIZE: usize = 100;

/// Logs any value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs any value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends `record` as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record<T: Serialize>(path: &str, record: &T) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open {path}"))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Writes every record of `dataset` to a fresh CSV file at `path`.
pub fn write_dataset_csv(path: &str, dataset: &Dataset) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {path}"))?;
    let mut writer = WriterBuilder::new().from_writer(file);

    for record in dataset.iter() {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!(path, rows = dataset.len(), "Dataset exported to CSV");
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    summary: DatasetSummary,
    analysis: &'a AnalysisReport,
    data_sample: &'a [CarparkRecord],
}

/// Pretty JSON bundle of the summary, the full analysis and the first
/// [`REPORT_SAMPLE_SIZE`] records.
pub fn json_report(
    dataset: &Dataset,
    analysis: &AnalysisReport,
    generated_at: DateTime<Utc>,
) -> Result<String> {
    let records = dataset.records();
    let report = JsonReport {
        generated_at,
        summary: dataset.summary(),
        analysis,
        data_sample: &records[..records.len().min(REPORT_SAMPLE_SIZE)],
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Plain-text report with SUMMARY, BY AGENCY and BY STATUS sections.
pub fn text_report(summary: &DatasetSummary, generated_at: DateTime<Utc>) -> String {
    let rule = "=".repeat(60);
    let thin = "-".repeat(40);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "PARKSENSE PARKING REPORT");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out);

    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{thin}");
    let _ = writeln!(out, "Total Carparks: {}", thousands(summary.total_carparks as u64));
    let _ = writeln!(out, "Total Available Lots: {}", thousands(summary.total_available_lots));
    let _ = writeln!(out);

    let _ = writeln!(out, "BY AGENCY");
    let _ = writeln!(out, "{thin}");
    for agency in &summary.by_agency {
        let _ = writeln!(out, "{}:", agency.agency);
        let _ = writeln!(out, "  - Carparks: {}", agency.carparks);
        let _ = writeln!(out, "  - Available: {}", thousands(agency.available_lots));
        let _ = writeln!(out, "  - Avg: {:.1}", agency.avg_availability);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "BY STATUS");
    let _ = writeln!(out, "{thin}");
    for status in Status::ALL {
        let _ = writeln!(out, "{status}: {}", summary.by_status.get(status));
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{rule}");
    let _ = write!(out, "END OF REPORT");
    out
}

/// `1234567` -> `"1,234,567"`.
fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::analyzer::generate_report;
    use crate::dataset::{Agency, LotType};
    use chrono::TimeZone;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[derive(Serialize, Default)]
    struct Row {
        timestamp: String,
        value: u32,
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&sample_dataset().summary());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&sample_dataset().summary()).unwrap();
    }

    #[test]
    fn test_append_record_creates_file() {
        let path = temp_path("parksense_test_create.csv");
        let _ = fs::remove_file(&path); // clean up any prior run

        append_record(&path, &Row::default()).unwrap();

        assert!(Path::new(&path).exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.is_empty());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("parksense_test_header.csv");
        let _ = fs::remove_file(&path);

        append_record(&path, &Row::default()).unwrap();
        append_record(&path, &Row::default()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);

        // 1 header + 2 data rows
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_dataset_csv() {
        let path = temp_path("parksense_test_dataset.csv");
        let _ = fs::remove_file(&path);

        write_dataset_csv(&path, &sample_dataset()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("carpark_id,development,agency"));
        assert_eq!(lines.count(), 3);
        assert!(content.contains("Blk 1,HDB,,C,3,"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_text_report_sections() {
        let report = text_report(&sample_dataset().summary(), generated_at());

        assert!(report.contains("Generated: 2026-01-01 08:00:00"));
        assert!(report.contains("Total Carparks: 3"));
        assert!(report.contains("Total Available Lots: 1,563"));
        assert!(report.contains("HDB:\n  - Carparks: 2\n  - Available: 1,503\n  - Avg: 751.5"));
        assert!(report.contains("Limited: 1"));
        assert!(report.ends_with("END OF REPORT"));
    }

    #[test]
    fn test_json_report_shape() {
        let ds = sample_dataset();
        let analysis = generate_report(&ds);
        let json = json_report(&ds, &analysis, generated_at()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["summary"]["total_carparks"], 3);
        assert_eq!(value["data_sample"].as_array().unwrap().len(), 3);
        assert_eq!(value["analysis"]["overall_health"]["stressed_carparks"], 1);
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    // Helper functions for tests
    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()
    }

    fn sample_dataset() -> Dataset {
        let records = [(Agency::Hdb, 3), (Agency::Ura, 60), (Agency::Hdb, 1500)]
            .into_iter()
            .enumerate()
            .map(|(i, (agency, lots))| CarparkRecord {
                carpark_id: i.to_string(),
                development: format!("Blk {}", i + 1),
                agency,
                area: None,
                lot_type: LotType::Car,
                available_lots: lots,
                latitude: None,
                longitude: None,
                status: Status::from_lots(lots),
                fetch_time: generated_at(),
            })
            .collect();
        Dataset::from_records(records, generated_at())
    }
}
