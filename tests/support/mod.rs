#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use sheet_to_triples::CliArgs;
use tempfile::{TempDir, tempdir};
use umya_spreadsheet::{self, Spreadsheet};

pub const SITES_TRANSFORM: &str = r#"
[[transform]]
sheet = "Sites"
subject = "site/{Site ID}"

[[transform.triples]]
predicate = "vm:name"
object = "{Name}"

[[transform.triples]]
predicate = "vm:atGeoPoint"
object = "geo/{Site ID}"
kind = "iri"
"#;

pub const GEO_TRANSFORM: &str = r#"
[[transform]]
sheet = "Sites"
subject = "geo/{Site ID}"

[[transform.triples]]
predicate = "vm:name"
object = "{Name} point"

[[transform.triples]]
predicate = "vm:latitude"
object = "{Lat}"
datatype = "xsd:decimal"
"#;

pub fn write_workbook_to_path<F>(path: &Path, f: F)
where
    F: FnOnce(&mut Spreadsheet),
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dir");
    }
    let mut book = umya_spreadsheet::new_file();
    f(&mut book);
    umya_spreadsheet::writer::xlsx::write(&book, path).expect("write workbook");
}

/// Fill a new sheet called `name` from rows of cell text.
pub fn fill_sheet(book: &mut Spreadsheet, name: &str, rows: &[&[&str]]) {
    if book.get_sheet_by_name(name).is_none() {
        book.new_sheet(name).expect("new sheet");
    }
    let sheet = book.get_sheet_by_name_mut(name).expect("sheet");
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet
                    .get_cell_mut(((c + 1) as u32, (r + 1) as u32))
                    .set_value(*value);
            }
        }
    }
}

pub struct TestWorkspace {
    _tempdir: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let tempdir = tempdir().expect("tempdir");
        let root = tempdir.path().to_path_buf();
        Self {
            _tempdir: tempdir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn transforms_dir(&self) -> PathBuf {
        self.path("transforms")
    }

    pub fn create_workbook<F>(&self, name: &str, f: F) -> PathBuf
    where
        F: FnOnce(&mut Spreadsheet),
    {
        let path = self.path(name);
        write_workbook_to_path(&path, f);
        path
    }

    /// Workbook with a `Sites` sheet of two rows.
    pub fn sites_workbook(&self, name: &str) -> PathBuf {
        self.create_workbook(name, |book| {
            fill_sheet(
                book,
                "Sites",
                &[
                    &["Site ID", "Name", "Lat"],
                    &["1", "North Gate", "51.5"],
                    &["2", "South Gate", "51.4"],
                ],
            );
        })
    }

    /// Write `transforms/<name>.toml`.
    pub fn write_transform(&self, name: &str, definition: &str) -> PathBuf {
        self.write_file(&format!("transforms/{name}.toml"), definition)
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dir");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn touch_file(&self, name: &str) -> PathBuf {
        self.write_file(name, "")
    }
}

pub fn parse_args(args: &[&str]) -> CliArgs {
    CliArgs::try_parse_from(std::iter::once("sheet-to-triples").chain(args.iter().copied()))
        .expect("parse args")
}

pub fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}
