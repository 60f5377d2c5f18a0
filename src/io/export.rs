//! Persistence sinks: merged panel and decoded records.
//!
//! The panel CSV is the hand-off format for the downstream store: `date` first,
//! then one column per series in panel order.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{MergedPanel, OutbreakRecord};
use crate::error::AppError;

/// Write the merged panel to a CSV file.
pub fn write_panel_csv(path: &Path, panel: &MergedPanel) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create panel CSV '{}': {e}", path.display())))?;
    write_panel(file, panel)
}

/// Write the merged panel as CSV to any writer.
pub fn write_panel<W: Write>(writer: W, panel: &MergedPanel) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(panel.columns.len() + 1);
    header.push("date");
    header.extend(panel.columns.iter().map(String::as_str));
    out.write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write panel CSV header: {e}")))?;

    for row in &panel.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.month.format("%Y-%m-%d").to_string());
        record.extend(row.values.iter().map(|v| v.to_string()));
        out.write_record(&record)
            .map_err(|e| AppError::new(2, format!("Failed to write panel CSV row: {e}")))?;
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush panel CSV: {e}")))?;
    Ok(())
}

/// Write the merged panel (rows + fill statistics) as pretty JSON.
pub fn write_panel_json(path: &Path, panel: &MergedPanel) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create panel JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, panel)
        .map_err(|e| AppError::new(2, format!("Failed to write panel JSON: {e}")))?;
    Ok(())
}

/// Write decoded outbreak records to a CSV file.
pub fn write_records_csv(path: &Path, records: &[OutbreakRecord]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create records CSV '{}': {e}", path.display())))?;
    write_records(file, records)
}

/// Write decoded outbreak records as CSV to any writer.
pub fn write_records<W: Write>(writer: W, records: &[OutbreakRecord]) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);
    for r in records {
        out.serialize(r)
            .map_err(|e| AppError::new(2, format!("Failed to write records CSV row: {e}")))?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush records CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{ColumnKind, FillStats, PanelRow};

    #[test]
    fn panel_csv_puts_date_first() {
        let panel = MergedPanel {
            columns: vec!["cpi".to_string(), "hpai_count".to_string()],
            kinds: vec![ColumnKind::Continuous, ColumnKind::Event],
            rows: vec![PanelRow {
                month: NaiveDate::from_ymd_opt(2020, 4, 1).unwrap(),
                values: vec![258.5, 1.0],
            }],
            fill_stats: vec![FillStats::default(), FillStats::default()],
        };

        let mut buf = Vec::new();
        write_panel(&mut buf, &panel).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "date,cpi,hpai_count\n2020-04-01,258.5,1\n");
    }

    #[test]
    fn records_csv_has_header_and_blank_active_release() {
        let record = OutbreakRecord::new(
            NaiveDate::from_ymd_opt(2022, 2, 9).unwrap(),
            "IN",
            "Dubois",
            "Turkeys",
            Some(29_000.0),
            None,
        )
        .unwrap();

        let mut buf = Vec::new();
        write_records(&mut buf, &[record]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("confirmation_date,state,county,production_type,affected_count,release_date,days_to_release")
        );
        assert_eq!(lines.next(), Some("2022-02-09,IN,Dubois,Turkeys,29000.0,,"));
    }
}
