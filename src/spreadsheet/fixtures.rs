//! Test helpers that write small but real .ods workbooks

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const NAMESPACES: &str = concat!(
    r#"xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
    r#"xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" "#,
    r#"xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" "#,
    r#"office:version="1.3""#
);

/// Wrap sheet markup in a full `content.xml` document
pub(crate) fn content_xml(tables: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content {NAMESPACES}>
  <office:body>
    <office:spreadsheet>
      {tables}
    </office:spreadsheet>
  </office:body>
</office:document-content>"#
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render one sheet, splitting multi-line cells into paragraphs
pub(crate) fn table_xml(name: &str, rows: &[Vec<&str>]) -> String {
    let mut xml = format!(r#"<table:table table:name="{}">"#, escape(name));
    for row in rows {
        xml.push_str("<table:table-row>");
        for cell in row {
            if cell.is_empty() {
                xml.push_str("<table:table-cell/>");
                continue;
            }
            xml.push_str(r#"<table:table-cell office:value-type="string">"#);
            for line in cell.split('\n') {
                xml.push_str(&format!("<text:p>{}</text:p>", escape(line)));
            }
            xml.push_str("</table:table-cell>");
        }
        // Editors pad every row out to the sheet width
        xml.push_str(r#"<table:table-cell table:number-columns-repeated="1020"/>"#);
        xml.push_str("</table:table-row>");
    }
    xml.push_str(
        r#"<table:table-row table:number-rows-repeated="1048570"><table:table-cell table:number-columns-repeated="1024"/></table:table-row>"#,
    );
    xml.push_str("</table:table>");
    xml
}

/// Write an .ods file holding the given sheets
pub(crate) fn write_ods(path: &Path, sheets: &[(&str, Vec<Vec<&str>>)]) {
    let tables: String = sheets
        .iter()
        .map(|(name, rows)| table_xml(name, rows))
        .collect();

    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/vnd.oasis.opendocument.spreadsheet")
        .unwrap();
    zip.start_file("content.xml", deflated).unwrap();
    zip.write_all(content_xml(&tables).as_bytes()).unwrap();
    zip.finish().unwrap();
}

/// A three-condition cardiology sheet
pub(crate) fn cardio_rows() -> Vec<Vec<&'static str>> {
    vec![
        vec!["Condition", "Diagnostics"],
        vec!["Aortic Stenosis", "Echocardiogram"],
        vec!["Pericarditis", "ECG: diffuse ST elevation\nPR depression"],
        vec!["Myocardial Infarction", "Troponin & ECG"],
    ]
}
