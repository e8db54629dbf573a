//! Workbook reading
//!
//! Reads OpenDocument spreadsheets into plain string grids, one per sheet.

mod ods;

#[cfg(test)]
pub(crate) mod fixtures;

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Unsupported workbook format: {0}")]
    UnsupportedFormat(String),

    #[error("Sheet '{name}' not found in the workbook (sheets: {available})")]
    SheetNotFound { name: String, available: String },
}

pub type Result<T> = std::result::Result<T, SpreadsheetError>;

/// One named sheet as rows of cell text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Widest row, in cells
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// All sheets of a workbook, in document order
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Open a workbook file. Only `.ods` is understood.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SpreadsheetError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Workbook not found: {}", path.display()),
            )));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let sheets = match extension.as_str() {
            "ods" => ods::read_ods(path)?,
            other => return Err(SpreadsheetError::UnsupportedFormat(other.to_string())),
        };

        log::debug!("Read {} sheets from {:?}", sheets.len(), path);
        Ok(Self { sheets })
    }

    #[cfg(test)]
    pub(crate) fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a sheet by its exact name
    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SpreadsheetError::SheetNotFound {
                name: name.to_string(),
                available: self.sheet_names().join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_workbook() {
        let temp = TempDir::new().unwrap();
        let err = Workbook::open(&temp.path().join("nope.ods")).unwrap_err();
        assert!(matches!(err, SpreadsheetError::Io(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("book.xlsx");
        std::fs::write(&path, b"not really").unwrap();
        let err = Workbook::open(&path).unwrap_err();
        assert!(matches!(err, SpreadsheetError::UnsupportedFormat(ext) if ext == "xlsx"));
    }

    #[test]
    fn test_open_ods_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("TRISH.ods");
        fixtures::write_ods(
            &path,
            &[
                ("Skin", vec![vec!["Condition"], vec!["Psoriasis"]]),
                ("Cardio", fixtures::cardio_rows()),
            ],
        );

        let book = Workbook::open(&path).unwrap();
        assert_eq!(book.sheet_names(), vec!["Skin", "Cardio"]);

        let cardio = book.sheet("Cardio").unwrap();
        assert_eq!(cardio.row_count(), 4);
        assert_eq!(cardio.column_count(), 2);
        assert_eq!(cardio.rows[2][1], "ECG: diffuse ST elevation\nPR depression");
        assert_eq!(cardio.rows[3][1], "Troponin & ECG");
    }

    #[test]
    fn test_not_a_zip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.ods");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(Workbook::open(&path), Err(SpreadsheetError::Zip(_))));
    }

    #[test]
    fn test_sheet_lookup_is_exact() {
        let book = Workbook::from_sheets(vec![Sheet {
            name: "Cardio".to_string(),
            rows: vec![vec!["Condition".to_string()]],
        }]);
        assert!(book.sheet("Cardio").is_ok());
        assert!(matches!(
            book.sheet("cardio"),
            Err(SpreadsheetError::SheetNotFound { name, available }) if name == "cardio" && available == "Cardio"
        ));
    }
}
