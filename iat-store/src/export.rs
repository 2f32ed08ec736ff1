//! CSV export of trial results.
//!
//! Output starts with a UTF-8 byte-order mark so spreadsheet tools pick the
//! right encoding for the Chinese stimulus words.

use iat_core::{SessionRecord, TrialResult};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const UTF8_BOM: &str = "\u{feff}";

pub const CSV_COLUMNS: [&str; 10] = [
    "participantId",
    "sessionId",
    "blockId",
    "sequenceIndexWithinBlock",
    "word",
    "category",
    "correctResponse",
    "observedResponse",
    "latencyMs",
    "isCorrect",
];

/// Writes the header and every result of `records`, in order. Returns the
/// number of data rows.
pub fn write_csv<'a, W: Write>(
    mut out: W,
    records: impl IntoIterator<Item = &'a SessionRecord>,
) -> io::Result<usize> {
    out.write_all(UTF8_BOM.as_bytes())?;
    out.write_all(CSV_COLUMNS.join(",").as_bytes())?;
    out.write_all(b"\r\n")?;

    let mut rows = 0;
    for record in records {
        for result in &record.results {
            write_row(&mut out, result)?;
            rows += 1;
        }
    }
    out.flush()?;
    Ok(rows)
}

pub fn to_csv_string<'a>(records: impl IntoIterator<Item = &'a SessionRecord>) -> io::Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, records)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn export_csv_file<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a SessionRecord>,
) -> io::Result<usize> {
    let file = File::create(path)?;
    let rows = write_csv(BufWriter::new(file), records)?;
    tracing::info!(path = %path.display(), rows, "exported csv");
    Ok(rows)
}

fn write_row<W: Write>(out: &mut W, r: &TrialResult) -> io::Result<()> {
    let block_id = r.block_id.to_string();
    let sequence_index = r.sequence_index.to_string();
    let latency_ms = r.latency_ms.to_string();
    let fields: [&str; 10] = [
        &r.participant_id,
        r.session_id.as_str(),
        &block_id,
        &sequence_index,
        &r.word,
        r.category.as_str(),
        r.correct_response.as_str(),
        r.observed_response.as_str(),
        &latency_ms,
        if r.is_correct { "true" } else { "false" },
    ];
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        out.write_all(escape(field).as_bytes())?;
    }
    out.write_all(b"\r\n")
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
