//! Read access to spreadsheet books.
//!
//! `.xlsx` books go through umya-spreadsheet, legacy `.xls` books through
//! calamine. Both present the same [`Book`] interface: named sheets exposing
//! rows of cell text with spreadsheet escapes already decoded.

use crate::utils::{cell_address, unescape_cell_text};
use calamine::{Data, Reader, Xls, open_workbook};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use umya_spreadsheet::{Spreadsheet, Worksheet};

/// One spreadsheet row, padded to the sheet's used width.
pub type Row = Vec<String>;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("failed to open book {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("sheet {sheet:?} not found in {}", path.display())]
    SheetNotFound { sheet: String, path: PathBuf },
}

/// An open spreadsheet document.
pub trait Book {
    fn path(&self) -> &Path;

    fn sheet_names(&self) -> Vec<String>;

    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet_names().iter().any(|name| name == sheet)
    }

    /// Every row of `sheet` from the first row to the last used one.
    fn rows_in_sheet(&self, sheet: &str) -> Result<Vec<Row>, BookError>;
}

/// Open the book at `path`, picking a reader from its extension.
pub fn open_book(path: &Path) -> Result<Box<dyn Book>, BookError> {
    let legacy = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".xls"));
    if legacy {
        Ok(Box::new(XlsBook::load(path)?))
    } else {
        Ok(Box::new(XlsxBook::load(path)?))
    }
}

pub struct XlsxBook {
    path: PathBuf,
    spreadsheet: Spreadsheet,
}

impl XlsxBook {
    pub fn load(path: &Path) -> Result<Self, BookError> {
        let spreadsheet =
            umya_spreadsheet::reader::xlsx::read(path).map_err(|err| BookError::Open {
                path: path.to_path_buf(),
                source: Box::new(err),
            })?;
        tracing::debug!(path = %path.display(), "opened xlsx book");
        Ok(Self {
            path: path.to_path_buf(),
            spreadsheet,
        })
    }

    fn sheet(&self, name: &str) -> Result<&Worksheet, BookError> {
        self.spreadsheet
            .get_sheet_by_name(name)
            .ok_or_else(|| BookError::SheetNotFound {
                sheet: name.to_string(),
                path: self.path.clone(),
            })
    }
}

impl Book for XlsxBook {
    fn path(&self) -> &Path {
        &self.path
    }

    fn sheet_names(&self) -> Vec<String> {
        self.spreadsheet
            .get_sheet_collection()
            .iter()
            .map(|sheet| sheet.get_name().to_string())
            .collect()
    }

    fn rows_in_sheet(&self, sheet: &str) -> Result<Vec<Row>, BookError> {
        let sheet = self.sheet(sheet)?;
        let (max_col, max_row) = sheet.get_highest_column_and_row();
        let rows = (1..=max_row)
            .map(|row| {
                (1..=max_col)
                    .map(|col| {
                        sheet
                            .get_cell(cell_address(col, row).as_str())
                            .map(|cell| unescape_cell_text(&cell.get_value()).into_owned())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        Ok(rows)
    }
}

/// Legacy binary book. Sheets are read fully when the book is opened.
pub struct XlsBook {
    path: PathBuf,
    sheets: IndexMap<String, Vec<Row>>,
}

impl XlsBook {
    pub fn load(path: &Path) -> Result<Self, BookError> {
        let open_error = |err: calamine::XlsError| BookError::Open {
            path: path.to_path_buf(),
            source: Box::new(err),
        };
        let mut workbook: Xls<_> = open_workbook(path).map_err(open_error)?;
        let mut sheets = IndexMap::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name).map_err(open_error)?;
            let (first_row, first_col) = range.start().unwrap_or((0, 0));
            let width = first_col as usize + range.width();
            let mut rows: Vec<Row> = (0..first_row).map(|_| vec![String::new(); width]).collect();
            for cells in range.rows() {
                let mut row = vec![String::new(); first_col as usize];
                row.extend(cells.iter().map(data_text));
                rows.push(row);
            }
            sheets.insert(name, rows);
        }
        tracing::debug!(path = %path.display(), sheets = sheets.len(), "opened xls book");
        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }
}

fn data_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(text) => unescape_cell_text(text).into_owned(),
        other => other.to_string(),
    }
}

impl Book for XlsBook {
    fn path(&self) -> &Path {
        &self.path
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }

    fn rows_in_sheet(&self, sheet: &str) -> Result<Vec<Row>, BookError> {
        self.sheets
            .get(sheet)
            .cloned()
            .ok_or_else(|| BookError::SheetNotFound {
                sheet: sheet.to_string(),
                path: self.path.clone(),
            })
    }
}
