//! CSV rendering of export rows.

use std::io;

use crate::projection::ExportRow;

/// Column order of every CSV export.
pub const CSV_HEADER: [&str; 8] = [
    "id",
    "title",
    "projectName",
    "captureType",
    "startedAt",
    "endedAt",
    "durationSeconds",
    "url",
];

/// Writes `rows` as CSV with a header line.
pub fn write_csv<W: io::Write>(writer: W, rows: &[ExportRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for row in rows {
        let duration = row
            .duration_seconds
            .map(|seconds| seconds.to_string())
            .unwrap_or_default();
        wtr.write_record([
            row.id.as_str(),
            row.title.as_str(),
            row.project_name.as_str(),
            row.capture_type.as_str(),
            row.started_at.as_str(),
            row.ended_at.as_deref().unwrap_or_default(),
            duration.as_str(),
            row.url.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Renders `rows` into an in-memory CSV document.
pub fn render_csv(rows: &[ExportRow]) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_csv(&mut buf, rows)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
