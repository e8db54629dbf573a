//! OpenDocument spreadsheet (.ods) reader
//!
//! An .ods file is a zip archive whose `content.xml` holds every sheet as
//! `table:table` elements. Rows and cells may carry repeat counts; editors
//! pad sheets with very large repeated blank ranges, so blank runs are kept
//! as counters and only materialised when real content follows them.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use super::{Result, Sheet, SpreadsheetError};

const CONTENT_XML: &str = "content.xml";

/// Read every sheet of an .ods file
pub(crate) fn read_ods(path: &Path) -> Result<Vec<Sheet>> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let content = archive.by_name(CONTENT_XML).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => {
            SpreadsheetError::Xml(format!("{} missing from {}", CONTENT_XML, path.display()))
        }
        other => SpreadsheetError::Zip(other),
    })?;

    parse_content(BufReader::new(content))
}

/// Cell being read
#[derive(Default)]
struct CellState {
    repeat: usize,
    paragraphs: Vec<String>,
    paragraph: Option<String>,
    /// Typed value attribute, used when the cell has no paragraph text
    fallback: Option<String>,
}

impl CellState {
    fn value(self) -> String {
        if self.paragraphs.is_empty() {
            self.fallback.unwrap_or_default()
        } else {
            self.paragraphs.join("\n")
        }
    }
}

/// Row being read
#[derive(Default)]
struct RowState {
    repeat: usize,
    cells: Vec<String>,
    pending_blank_cells: usize,
}

impl RowState {
    fn push_cells(&mut self, value: String, repeat: usize) {
        if value.is_empty() {
            self.pending_blank_cells += repeat;
            return;
        }
        self.cells
            .extend(std::iter::repeat(String::new()).take(self.pending_blank_cells));
        self.pending_blank_cells = 0;
        self.cells.extend(std::iter::repeat(value).take(repeat));
    }
}

/// Sheet being read
struct SheetState {
    name: String,
    rows: Vec<Vec<String>>,
    pending_blank_rows: usize,
}

impl SheetState {
    fn push_rows(&mut self, row: RowState) {
        if row.cells.is_empty() {
            self.pending_blank_rows += row.repeat;
            return;
        }
        self.rows
            .extend(std::iter::repeat(Vec::new()).take(self.pending_blank_rows));
        self.pending_blank_rows = 0;
        for _ in 0..row.repeat {
            self.rows.push(row.cells.clone());
        }
    }
}

fn xml_error(e: impl std::fmt::Display) -> SpreadsheetError {
    SpreadsheetError::Xml(e.to_string())
}

fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn repeat_count(e: &BytesStart, key: &[u8]) -> Result<usize> {
    Ok(attribute(e, key)?
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1))
}

fn typed_value(e: &BytesStart) -> Result<Option<String>> {
    const KEYS: [&[u8]; 5] = [
        b"office:string-value",
        b"office:value",
        b"office:date-value",
        b"office:time-value",
        b"office:boolean-value",
    ];
    for key in KEYS {
        if let Some(v) = attribute(e, key)? {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

/// Text inserted by an inline element inside a paragraph
fn inline_text(e: &BytesStart) -> Result<Option<String>> {
    let text = match e.name().as_ref() {
        b"text:s" => {
            let count = repeat_count(e, b"text:c")?;
            " ".repeat(count)
        }
        b"text:tab" => "\t".to_string(),
        b"text:line-break" => "\n".to_string(),
        _ => return Ok(None),
    };
    Ok(Some(text))
}

fn is_cell(name: &[u8]) -> bool {
    name == b"table:table-cell" || name == b"table:covered-table-cell"
}

fn parse_content<R: std::io::BufRead>(source: R) -> Result<Vec<Sheet>> {
    let mut reader = Reader::from_reader(source);

    let mut sheets = Vec::new();
    let mut buf = Vec::new();

    let mut sheet: Option<SheetState> = None;
    let mut row: Option<RowState> = None;
    let mut cell: Option<CellState> = None;
    // Comments attached to cells carry their own paragraphs
    let mut annotation_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                let name = name.as_ref();
                if name == b"office:annotation" {
                    annotation_depth += 1;
                } else if annotation_depth > 0 {
                    // skip
                } else if name == b"table:table" {
                    sheet = Some(SheetState {
                        name: attribute(e, b"table:name")?.unwrap_or_default(),
                        rows: Vec::new(),
                        pending_blank_rows: 0,
                    });
                } else if name == b"table:table-row" && sheet.is_some() {
                    row = Some(RowState {
                        repeat: repeat_count(e, b"table:number-rows-repeated")?,
                        ..RowState::default()
                    });
                } else if is_cell(name) && row.is_some() {
                    cell = Some(CellState {
                        repeat: repeat_count(e, b"table:number-columns-repeated")?,
                        fallback: typed_value(e)?,
                        ..CellState::default()
                    });
                } else if name == b"text:p" {
                    if let Some(c) = cell.as_mut() {
                        c.paragraph = Some(String::new());
                    }
                } else if let Some(text) = inline_text(e)? {
                    if let Some(p) = cell.as_mut().and_then(|c| c.paragraph.as_mut()) {
                        p.push_str(&text);
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                let name = name.as_ref();
                if annotation_depth > 0 {
                    // skip
                } else if name == b"table:table-row" {
                    if let Some(s) = sheet.as_mut() {
                        s.push_rows(RowState {
                            repeat: repeat_count(e, b"table:number-rows-repeated")?,
                            ..RowState::default()
                        });
                    }
                } else if is_cell(name) {
                    if let Some(r) = row.as_mut() {
                        let repeat = repeat_count(e, b"table:number-columns-repeated")?;
                        r.push_cells(typed_value(e)?.unwrap_or_default(), repeat);
                    }
                } else if name == b"text:p" {
                    if let Some(c) = cell.as_mut() {
                        c.paragraphs.push(String::new());
                    }
                } else if let Some(text) = inline_text(e)? {
                    if let Some(p) = cell.as_mut().and_then(|c| c.paragraph.as_mut()) {
                        p.push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                let name = name.as_ref();
                if name == b"office:annotation" {
                    annotation_depth = annotation_depth.saturating_sub(1);
                } else if annotation_depth > 0 {
                    // skip
                } else if name == b"text:p" {
                    if let Some(c) = cell.as_mut() {
                        if let Some(p) = c.paragraph.take() {
                            c.paragraphs.push(p);
                        }
                    }
                } else if is_cell(name) {
                    if let (Some(r), Some(c)) = (row.as_mut(), cell.take()) {
                        let repeat = c.repeat;
                        r.push_cells(c.value(), repeat);
                    }
                } else if name == b"table:table-row" {
                    if let (Some(s), Some(r)) = (sheet.as_mut(), row.take()) {
                        s.push_rows(r);
                    }
                } else if name == b"table:table" {
                    if let Some(s) = sheet.take() {
                        sheets.push(Sheet {
                            name: s.name,
                            rows: s.rows,
                        });
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if annotation_depth == 0 {
                    if let Some(p) = cell.as_mut().and_then(|c| c.paragraph.as_mut()) {
                        p.push_str(&e.unescape().map_err(xml_error)?);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if annotation_depth == 0 {
                    if let Some(p) = cell.as_mut().and_then(|c| c.paragraph.as_mut()) {
                        p.push_str(&String::from_utf8_lossy(&e));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Vec<Sheet> {
        let xml = crate::spreadsheet::fixtures::content_xml(body);
        parse_content(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_basic_sheet() {
        let sheets = parse(
            r#"<table:table table:name="Cardio">
                <table:table-row>
                  <table:table-cell office:value-type="string"><text:p>Condition</text:p></table:table-cell>
                  <table:table-cell office:value-type="string"><text:p>Diagnostics</text:p></table:table-cell>
                </table:table-row>
                <table:table-row>
                  <table:table-cell office:value-type="string"><text:p>Aortic stenosis</text:p></table:table-cell>
                  <table:table-cell office:value-type="string"><text:p>Echo</text:p></table:table-cell>
                </table:table-row>
              </table:table>"#,
        );
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "Cardio");
        assert_eq!(
            sheets[0].rows,
            vec![
                vec!["Condition".to_string(), "Diagnostics".to_string()],
                vec!["Aortic stenosis".to_string(), "Echo".to_string()],
            ]
        );
    }

    #[test]
    fn test_paragraphs_spaces_and_entities() {
        let sheets = parse(
            r#"<table:table table:name="S">
                <table:table-row>
                  <table:table-cell><text:p>Chest pain &amp; dyspnea</text:p><text:p>a<text:s text:c="3"/>b<text:tab/>c<text:line-break/>d</text:p></table:table-cell>
                </table:table-row>
              </table:table>"#,
        );
        assert_eq!(sheets[0].rows[0][0], "Chest pain & dyspnea\na   b\tc\nd");
    }

    #[test]
    fn test_spans_are_flattened_and_annotations_skipped() {
        let sheets = parse(
            r#"<table:table table:name="S">
                <table:table-row>
                  <table:table-cell><office:annotation><text:p>reviewer note</text:p></office:annotation><text:p><text:span text:style-name="T1">Bold</text:span> text</text:p></table:table-cell>
                </table:table-row>
              </table:table>"#,
        );
        assert_eq!(sheets[0].rows[0], vec!["Bold text".to_string()]);
    }

    #[test]
    fn test_repeats_expand_and_blank_padding_is_dropped() {
        let sheets = parse(
            r#"<table:table table:name="S">
                <table:table-row table:number-rows-repeated="2">
                  <table:table-cell table:number-columns-repeated="2"><text:p>x</text:p></table:table-cell>
                  <table:table-cell/>
                  <table:table-cell><text:p>y</text:p></table:table-cell>
                  <table:table-cell table:number-columns-repeated="16380"/>
                </table:table-row>
                <table:table-row table:number-rows-repeated="3"><table:table-cell table:number-columns-repeated="1024"/></table:table-row>
                <table:table-row><table:table-cell><text:p>z</text:p></table:table-cell></table:table-row>
                <table:table-row table:number-rows-repeated="1048000"><table:table-cell table:number-columns-repeated="1024"/></table:table-row>
              </table:table>"#,
        );
        let rows = &sheets[0].rows;
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], vec!["x", "x", "", "y"]);
        assert_eq!(rows[1], rows[0]);
        assert!(rows[2].is_empty() && rows[3].is_empty() && rows[4].is_empty());
        assert_eq!(rows[5], vec!["z"]);
    }

    #[test]
    fn test_typed_value_fallback() {
        let sheets = parse(
            r#"<table:table table:name="S">
                <table:table-row>
                  <table:table-cell office:value-type="float" office:value="42"/>
                  <table:table-cell office:value-type="float" office:value="3.5"><text:p>3.50</text:p></table:table-cell>
                </table:table-row>
              </table:table>"#,
        );
        assert_eq!(sheets[0].rows[0], vec!["42", "3.50"]);
    }

    #[test]
    fn test_multiple_sheets_in_order() {
        let sheets = parse(
            r#"<table:table table:name="Skin"><table:table-row><table:table-cell><text:p>a</text:p></table:table-cell></table:table-row></table:table>
               <table:table table:name="Renal"><table:table-row><table:table-cell><text:p>b</text:p></table:table-cell></table:table-row></table:table>"#,
        );
        let names: Vec<_> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Skin", "Renal"]);
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let result = parse_content("<a></b>".as_bytes());
        assert!(matches!(result, Err(SpreadsheetError::Xml(_))));
    }
}
