//! Discovery of spreadsheet files from `--book` arguments.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const BOOK_SUFFIXES: &[&str] = &[".xls", ".xlsx"];

/// Whether the file name carries a recognised spreadsheet extension.
pub fn is_book_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| BOOK_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
}

/// Classify `path` and return the spreadsheet files it stands for.
///
/// A directory yields the spreadsheet files directly inside it, sorted by
/// name; nested directories are not visited. A regular file is returned as
/// is, whatever its extension. Anything else is an error.
pub fn locate_books(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(path).map_err(|source| path_error(path, source))?;

    if metadata.is_dir() {
        let mut books = Vec::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| path_error(path, err.into()))?;
            if entry.path().is_dir() || !is_book_path(entry.path()) {
                continue;
            }
            books.push(entry.into_path());
        }
        tracing::debug!(dir = %path.display(), count = books.len(), "located books in directory");
        Ok(books)
    } else if metadata.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(path_error(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a file or directory"),
        ))
    }
}

/// Locate books for every argument, preserving argument order.
pub fn locate_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut books = Vec::new();
    for path in paths {
        books.extend(locate_books(path.as_ref())?);
    }
    Ok(books)
}

fn path_error(path: &Path, source: io::Error) -> Error {
    Error::PathResolution {
        path: path.to_path_buf(),
        source,
    }
}
