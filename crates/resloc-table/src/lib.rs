use color_eyre::eyre::{Result, WrapErr};
use resloc_core::{ResLocError, TableRow, TranslatableValue, TranslationMap};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

pub mod xlsx;

pub const HEADER: [&str; 3] = ["Original", "Translated", "Occurrences"];

/// On-disk table layout, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Spreadsheet with every column formatted as text.
    Xlsx,
    /// Anything that is not `.xlsx`.
    Csv,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => TableFormat::Xlsx,
            _ => TableFormat::Csv,
        }
    }
}

/// Write header plus one CSV row per value, every cell quoted.
///
/// Quoting keeps the cells intact for CSV readers only; spreadsheet programs
/// still guess types on import. Use an `.xlsx` table when `007` has to stay
/// `007` after a round trip through a spreadsheet.
pub fn write_rows<W: Write>(writer: W, rows: &[TableRow]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.write_record([&row.original, &row.translated, &row.occurrences])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Create the table file for `values`. The file must not exist yet.
pub fn write_table(path: &Path, values: &[TranslatableValue]) -> Result<()> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(ResLocError::file_exists("Translation table", path).into());
        }
        Err(e) => {
            return Err(e).wrap_err_with(|| format!("cannot create {}", path.display()));
        }
    };
    let rows: Vec<TableRow> = values.iter().map(TableRow::from).collect();
    let format = TableFormat::from_path(path);
    let written = match format {
        TableFormat::Xlsx => xlsx::write_rows(file, &rows),
        TableFormat::Csv => write_rows(file, &rows),
    };
    if let Err(e) = written {
        // half-written tables would block the next run
        let _ = std::fs::remove_file(path);
        return Err(e).wrap_err_with(|| format!("cannot write {}", path.display()));
    }
    tracing::info!(
        event = "table_written",
        path = %path.display(),
        format = ?format,
        rows = rows.len()
    );
    Ok(())
}

/// Byte offset where the data ends: the first blank line after some content,
/// or the end of `text`. Line breaks inside quoted cells do not count.
fn data_end(text: &str) -> usize {
    let mut in_quotes = false;
    let mut seen_content = false;
    let mut line_start = 0;
    for (i, &b) in text.as_bytes().iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => {
                if text[line_start..i].trim_end_matches('\r').is_empty() {
                    if seen_content {
                        return line_start;
                    }
                } else {
                    seen_content = true;
                }
                line_start = i + 1;
            }
            _ => {}
        }
    }
    text.len()
}

/// Data rows up to (not including) the first blank line or the first row
/// with an empty `Original`.
///
/// Anything below that row is ignored even if it holds data, so clearing a
/// row in a spreadsheet instead of removing it truncates the table there.
pub fn read_rows<R: Read>(mut reader: R) -> Result<Vec<TableRow>> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .wrap_err("table is not UTF-8 text")?;
    let end = data_end(&text);
    if end < text.len() {
        tracing::debug!(event = "table_end_marker", kind = "blank_line", offset = end);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text[..end].as_bytes());

    let mut out = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.wrap_err_with(|| format!("table row {}", i + 2))?;
        let original = record.get(0).unwrap_or("");
        if original.is_empty() {
            tracing::debug!(event = "table_end_marker", kind = "empty_original", row = i + 2);
            break;
        }
        out.push(TableRow {
            original: original.to_string(),
            translated: record.get(1).unwrap_or("").to_string(),
            occurrences: record.get(2).unwrap_or("").to_string(),
        });
    }
    Ok(out)
}

/// Read a table file into an original → translated mapping; later rows win.
pub fn read_table(path: &Path) -> Result<TranslationMap> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ResLocError::file_missing("Translation table", path).into());
        }
        Err(e) => return Err(e).wrap_err_with(|| format!("cannot open {}", path.display())),
    };
    let rows = match TableFormat::from_path(path) {
        TableFormat::Xlsx => xlsx::read_rows(file),
        TableFormat::Csv => read_rows(file),
    }
    .wrap_err_with(|| format!("cannot read {}", path.display()))?;

    let mut map = TranslationMap::with_capacity(rows.len());
    for row in rows {
        map.insert(row.original, row.translated);
    }
    tracing::info!(event = "table_read", path = %path.display(), entries = map.len());
    Ok(map)
}
