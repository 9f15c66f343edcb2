//! Single-sheet xlsx tables.
//!
//! Written workbooks format all three columns as text (number format `@`),
//! so spreadsheet programs keep values such as `007` or `1/2` as typed.
//! Reading accepts what those programs save back: shared strings, inline
//! strings and plain values.

use crate::HEADER;
use color_eyre::eyre::{eyre, Result, WrapErr};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use resloc_core::TableRow;
use std::io::{Read, Seek, Write};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const SHEET_NAME: &str = "Report Translation";

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const DOC_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";
const DEFAULT_SHEET: &str = "xl/worksheets/sheet1.xml";

/// Style index of the text-formatted cell format in `styles.xml`.
const TEXT_STYLE: u32 = 1;
const HEADER_STYLE: u32 = 2;
const COLUMNS: [char; 3] = ['A', 'B', 'C'];

fn content_types() -> String {
    let ct = "application/vnd.openxmlformats-officedocument.spreadsheetml";
    format!(
        "{DECL}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" \
         ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/xl/workbook.xml\" ContentType=\"{ct}.sheet.main+xml\"/>\
         <Override PartName=\"/{DEFAULT_SHEET}\" ContentType=\"{ct}.worksheet+xml\"/>\
         <Override PartName=\"/xl/styles.xml\" ContentType=\"{ct}.styles+xml\"/>\
         </Types>"
    )
}

fn package_rels() -> String {
    format!(
        "{DECL}<Relationships xmlns=\"{REL_NS}\">\
         <Relationship Id=\"rId1\" Type=\"{DOC_REL}/officeDocument\" \
         Target=\"xl/workbook.xml\"/>\
         </Relationships>"
    )
}

fn workbook() -> String {
    format!(
        "{DECL}<workbook xmlns=\"{MAIN_NS}\" xmlns:r=\"{DOC_REL}\"><sheets>\
         <sheet name=\"{SHEET_NAME}\" sheetId=\"1\" r:id=\"rId1\"/>\
         </sheets></workbook>"
    )
}

fn workbook_rels() -> String {
    format!(
        "{DECL}<Relationships xmlns=\"{REL_NS}\">\
         <Relationship Id=\"rId1\" Type=\"{DOC_REL}/worksheet\" \
         Target=\"worksheets/sheet1.xml\"/>\
         <Relationship Id=\"rId2\" Type=\"{DOC_REL}/styles\" Target=\"styles.xml\"/>\
         </Relationships>"
    )
}

// numFmtId 49 is the built-in "@" (text) format
fn styles() -> String {
    format!(
        "{DECL}<styleSheet xmlns=\"{MAIN_NS}\">\
         <fonts count=\"2\">\
         <font><sz val=\"11\"/><name val=\"Calibri\"/></font>\
         <font><b/><sz val=\"11\"/><name val=\"Calibri\"/></font>\
         </fonts>\
         <fills count=\"2\"><fill><patternFill patternType=\"none\"/></fill>\
         <fill><patternFill patternType=\"gray125\"/></fill></fills>\
         <borders count=\"1\">\
         <border><left/><right/><top/><bottom/><diagonal/></border></borders>\
         <cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/>\
         </cellStyleXfs>\
         <cellXfs count=\"3\">\
         <xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>\
         <xf numFmtId=\"49\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\" \
         applyNumberFormat=\"1\" applyAlignment=\"1\">\
         <alignment vertical=\"top\" wrapText=\"1\"/></xf>\
         <xf numFmtId=\"49\" fontId=\"1\" fillId=\"0\" borderId=\"0\" xfId=\"0\" \
         applyNumberFormat=\"1\" applyFont=\"1\"/>\
         </cellXfs>\
         <cellStyles count=\"1\">\
         <cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>\
         </styleSheet>"
    )
}

fn push_row(out: &mut String, number: usize, cells: [&str; 3], style: u32) {
    out.push_str(&format!("<row r=\"{number}\">"));
    for (col, text) in COLUMNS.iter().zip(cells) {
        out.push_str(&format!(
            "<c r=\"{col}{number}\" s=\"{style}\" t=\"inlineStr\">\
             <is><t xml:space=\"preserve\">{}</t></is></c>",
            escape(text)
        ));
    }
    out.push_str("</row>");
}

fn sheet(rows: &[TableRow]) -> String {
    let mut out = format!(
        "{DECL}<worksheet xmlns=\"{MAIN_NS}\">\
         <cols>\
         <col min=\"1\" max=\"2\" width=\"60\" style=\"{TEXT_STYLE}\" customWidth=\"1\"/>\
         <col min=\"3\" max=\"3\" width=\"30\" style=\"{TEXT_STYLE}\" customWidth=\"1\"/>\
         </cols><sheetData>"
    );
    push_row(&mut out, 1, HEADER, HEADER_STYLE);
    for (i, row) in rows.iter().enumerate() {
        let cells = [
            row.original.as_str(),
            row.translated.as_str(),
            row.occurrences.as_str(),
        ];
        push_row(&mut out, i + 2, cells, TEXT_STYLE);
    }
    out.push_str("</sheetData></worksheet>");
    out
}

/// Write a workbook with one sheet: header plus one row per value.
pub fn write_rows<W: Write + Seek>(writer: W, rows: &[TableRow]) -> Result<()> {
    let parts = [
        ("[Content_Types].xml", content_types()),
        ("_rels/.rels", package_rels()),
        ("xl/workbook.xml", workbook()),
        ("xl/_rels/workbook.xml.rels", workbook_rels()),
        ("xl/styles.xml", styles()),
        (DEFAULT_SHEET, sheet(rows)),
    ];

    let mut zip = ZipWriter::new(writer);
    for (name, body) in parts {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e).wrap_err_with(|| format!("workbook part {name}")),
    };
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .wrap_err_with(|| format!("workbook part {name}"))?;
    Ok(Some(text))
}

fn attr(start: &BytesStart, local: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Relationship id of the translation sheet, else of the first sheet.
fn sheet_rel_id(workbook: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(workbook);
    let mut first = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let id = attr(&e, b"id");
                if attr(&e, b"name").as_deref() == Some(SHEET_NAME) {
                    return Ok(id);
                }
                if first.is_none() {
                    first = id;
                }
            }
            Event::Eof => return Ok(first),
            _ => {}
        }
    }
}

fn rel_target(rels: &str, id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(rels);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e)
                if e.local_name().as_ref() == b"Relationship"
                    && attr(&e, b"Id").as_deref() == Some(id) =>
            {
                return Ok(attr(&e, b"Target"));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn sheet_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let Some(workbook) = read_part(archive, "xl/workbook.xml")? else {
        return Ok(DEFAULT_SHEET.to_string());
    };
    let Some(rels) = read_part(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(DEFAULT_SHEET.to_string());
    };
    let target = match sheet_rel_id(&workbook)? {
        Some(id) => rel_target(&rels, &id)?,
        None => None,
    };
    Ok(match target {
        Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
        Some(t) => format!("xl/{t}"),
        None => DEFAULT_SHEET.to_string(),
    })
}

fn shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    // phonetic runs are reading hints, not cell text
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => out.extend(current.take()),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Text(t) if in_text && !in_phonetic => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) if in_text && !in_phonetic => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => return Ok(out),
            _ => {}
        }
    }
}

/// Zero-based column of a cell reference such as `B12`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters
        .iter()
        .fold(0usize, |acc, b| acc * 26 + usize::from(b - b'A' + 1));
    Some(n - 1)
}

#[derive(Debug, Default)]
struct SheetRow {
    number: u32,
    cells: [String; 3],
}

#[derive(Debug, PartialEq)]
enum CellKind {
    Shared,
    Inline,
    Plain,
}

struct Cell {
    column: usize,
    kind: CellKind,
    text: String,
}

fn start_row(start: &BytesStart, last_number: &mut u32) -> SheetRow {
    let number = attr(start, b"r")
        .and_then(|r| r.parse().ok())
        .unwrap_or(*last_number + 1);
    *last_number = number;
    SheetRow {
        number,
        ..SheetRow::default()
    }
}

/// First three columns of every row in the sheet, in document order.
fn sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<SheetRow>> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row: Option<SheetRow> = None;
    let mut cell: Option<Cell> = None;
    let mut last_number = 0u32;
    let mut next_column = 0usize;
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                row = Some(start_row(&e, &mut last_number));
                next_column = 0;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                rows.push(start_row(&e, &mut last_number));
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let column = attr(&e, b"r")
                    .and_then(|r| column_index(&r))
                    .unwrap_or(next_column);
                next_column = column + 1;
                let kind = match attr(&e, b"t").as_deref() {
                    Some("s") => CellKind::Shared,
                    Some("inlineStr") => CellKind::Inline,
                    _ => CellKind::Plain,
                };
                cell = Some(Cell {
                    column,
                    kind,
                    text: String::new(),
                });
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                next_column = attr(&e, b"r")
                    .and_then(|r| column_index(&r))
                    .unwrap_or(next_column)
                    + 1;
            }
            Event::Start(e) => match e.local_name().as_ref() {
                b"v" => in_value = true,
                b"t" => in_inline_text = true,
                _ => {}
            },
            Event::Text(t) if in_value || in_inline_text => {
                if let Some(c) = cell.as_mut().filter(|c| in_value || c.kind == CellKind::Inline) {
                    c.text.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"c" => {
                    if let (Some(c), Some(r)) = (cell.take(), row.as_mut()) {
                        let text = match c.kind {
                            CellKind::Shared if c.text.trim().is_empty() => String::new(),
                            CellKind::Shared => {
                                let index: usize = c.text.trim().parse().map_err(|_| {
                                    eyre!("row {}: bad shared string index {:?}", r.number, c.text)
                                })?;
                                shared.get(index).cloned().ok_or_else(|| {
                                    eyre!("row {}: shared string {index} is missing", r.number)
                                })?
                            }
                            CellKind::Inline | CellKind::Plain => c.text,
                        };
                        if let Some(slot) = r.cells.get_mut(c.column) {
                            *slot = text;
                        }
                    }
                }
                b"row" => rows.extend(row.take()),
                _ => {}
            },
            Event::Eof => return Ok(rows),
            _ => {}
        }
    }
}

/// Data rows of the translation sheet, up to (not including) the first
/// missing row or the first row with an empty `Original`. Row 1 is the header.
pub fn read_rows<R: Read + Seek>(reader: R) -> Result<Vec<TableRow>> {
    let mut archive = ZipArchive::new(reader).wrap_err("table is not an xlsx workbook")?;
    let path = sheet_path(&mut archive)?;
    let shared = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => shared_strings(&xml).wrap_err("xl/sharedStrings.xml")?,
        None => Vec::new(),
    };
    let xml = read_part(&mut archive, &path)?
        .ok_or_else(|| eyre!("workbook has no worksheet {path}"))?;
    let rows = sheet_rows(&xml, &shared).wrap_err_with(|| path.clone())?;

    let mut out = Vec::new();
    let mut expected = 2;
    for row in rows {
        if row.number < 2 {
            continue;
        }
        if row.number != expected {
            tracing::debug!(event = "table_end_marker", kind = "missing_row", row = expected);
            break;
        }
        let [original, translated, occurrences] = row.cells;
        if original.is_empty() {
            tracing::debug!(event = "table_end_marker", kind = "empty_original", row = row.number);
            break;
        }
        out.push(TableRow {
            original,
            translated,
            occurrences,
        });
        expected += 1;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn row(original: &str, translated: &str) -> TableRow {
        TableRow {
            original: original.to_string(),
            translated: translated.to_string(),
            occurrences: "A.rdlc".to_string(),
        }
    }

    fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        read_part(&mut archive, name).unwrap().unwrap()
    }

    /// Workbook laid out the way spreadsheet programs save it: the sheet
    /// under its own name and most text in the shared string table.
    fn saved_workbook(sheet_data: &str, shared: &[&str]) -> Vec<u8> {
        let items: String = shared
            .iter()
            .map(|s| format!("<si><t xml:space=\"preserve\">{}</t></si>", escape(*s)))
            .collect();
        let parts = [
            (
                "xl/workbook.xml",
                format!(
                    "<workbook xmlns=\"{MAIN_NS}\" xmlns:r=\"{DOC_REL}\"><sheets>\
                     <sheet name=\"Notes\" sheetId=\"1\" r:id=\"rId7\"/>\
                     <sheet name=\"{SHEET_NAME}\" sheetId=\"2\" r:id=\"rId9\"/>\
                     </sheets></workbook>"
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    "<Relationships xmlns=\"{REL_NS}\">\
                     <Relationship Id=\"rId7\" Type=\"{DOC_REL}/worksheet\" \
                     Target=\"worksheets/sheet1.xml\"/>\
                     <Relationship Id=\"rId9\" Type=\"{DOC_REL}/worksheet\" \
                     Target=\"/xl/worksheets/translation.xml\"/>\
                     </Relationships>"
                ),
            ),
            (
                "xl/sharedStrings.xml",
                format!("<sst xmlns=\"{MAIN_NS}\">{items}</sst>"),
            ),
            ("xl/worksheets/sheet1.xml", String::from("<worksheet/>")),
            (
                "xl/worksheets/translation.xml",
                format!(
                    "<worksheet xmlns=\"{MAIN_NS}\">\
                     <sheetData>{sheet_data}</sheetData></worksheet>"
                ),
            ),
        ];
        let mut buf = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(&mut buf);
        for (name, body) in parts {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        buf.into_inner()
    }

    #[test]
    fn numeric_looking_text_survives_a_round_trip() {
        let rows = vec![
            row("007", "007"),
            row("1/2", "1/2"),
            row("  padded ", "  rembourré "),
            row("Line one\nLine <two> & \"three\"", "Ligne un\nLigne <deux>"),
        ];
        let mut buf = Cursor::new(Vec::new());
        write_rows(&mut buf, &rows).unwrap();
        let back = read_rows(Cursor::new(buf.into_inner())).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn written_columns_are_formatted_as_text() {
        let mut buf = Cursor::new(Vec::new());
        write_rows(&mut buf, &[row("007", "007")]).unwrap();
        let bytes = buf.into_inner();

        let styles = part(&bytes, "xl/styles.xml");
        assert!(styles.contains("<xf numFmtId=\"49\""));
        let workbook = part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains("name=\"Report Translation\""));

        let sheet = part(&bytes, DEFAULT_SHEET);
        assert!(sheet.contains("<col min=\"1\" max=\"2\" width=\"60\" style=\"1\""));
        assert!(sheet.contains(
            "<c r=\"A2\" s=\"1\" t=\"inlineStr\"><is><t xml:space=\"preserve\">007</t></is></c>"
        ));
    }

    #[test]
    fn reads_shared_strings_and_stops_at_a_missing_row() {
        let sheet = "<row r=\"1\"><c r=\"A1\" t=\"s\"><v>0</v></c>\
                     <c r=\"B1\" t=\"s\"><v>1</v></c></row>\
                     <row r=\"2\"><c r=\"A2\" t=\"s\"><v>2</v></c>\
                     <c r=\"B2\" t=\"s\"><v>3</v></c></row>\
                     <row r=\"3\"><c r=\"A3\" t=\"s\"><v>4</v></c><c r=\"C3\" t=\"inlineStr\">\
                     <is><r><t>B.</t></r><r><t>rdlc</t></r></is></c></row>\
                     <row r=\"4\"><c r=\"A4\"><v>7</v></c>\
                     <c r=\"B4\" t=\"str\"><v>sept</v></c></row>\
                     <row r=\"6\"><c r=\"A6\" t=\"s\"><v>2</v></c></row>";
        let shared = ["Original", "Translated", "007", "zéro zéro sept", "Bye"];
        let bytes = saved_workbook(sheet, &shared);
        let rows = read_rows(Cursor::new(bytes)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].original, "007");
        assert_eq!(rows[0].translated, "zéro zéro sept");
        assert_eq!(rows[1].original, "Bye");
        assert_eq!(rows[1].translated, "");
        assert_eq!(rows[1].occurrences, "B.rdlc");
        assert_eq!(rows[2].original, "7");
        assert_eq!(rows[2].translated, "sept");
    }

    #[test]
    fn empty_original_cell_ends_the_table() {
        let sheet = "<row r=\"1\"><c r=\"A1\" t=\"inlineStr\">\
                     <is><t>Original</t></is></c></row>\
                     <row r=\"2\"><c r=\"A2\" t=\"inlineStr\"><is><t>Hi</t></is></c>\
                     <c r=\"B2\" t=\"inlineStr\"><is><t>Salut</t></is></c></row>\
                     <row r=\"3\"><c r=\"B3\" t=\"inlineStr\"><is><t>orphan</t></is></c></row>\
                     <row r=\"4\"><c r=\"A4\" t=\"inlineStr\"><is><t>Later</t></is></c></row>";
        let rows = read_rows(Cursor::new(saved_workbook(sheet, &[]))).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].original, "Hi");
        assert_eq!(rows[0].translated, "Salut");
        assert_eq!(rows[0].occurrences, "");
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("c12"), Some(2));
        assert_eq!(column_index("AA3"), Some(26));
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn rejects_non_workbooks() {
        let err = read_rows(Cursor::new(b"Original,Translated\n".to_vec())).unwrap_err();
        assert!(err.to_string().contains("not an xlsx workbook"));
    }
}
