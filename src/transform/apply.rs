use super::{ObjectKind, Transform, TripleTemplate};
use crate::model::GraphModel;
use crate::rdf::{Term, Triple, expand_iri};
use crate::workbook::{Book, BookError, Row, open_book};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Book(#[from] BookError),

    #[error("no book provides sheet {sheet:?}")]
    MissingSheet { sheet: String },

    #[error("sheet {sheet:?} in {} has no column {column:?}", book.display())]
    UnknownColumn {
        sheet: String,
        book: PathBuf,
        column: String,
    },
}

struct Slot {
    path: PathBuf,
    book: Option<Box<dyn Book>>,
}

/// The books of a run, opened the first time a transform needs them.
#[derive(Default)]
pub struct BookShelf {
    slots: Vec<Slot>,
}

impl BookShelf {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            slots: paths
                .into_iter()
                .map(|path| Slot { path, book: None })
                .collect(),
        }
    }

    /// Shelf over books that are already open.
    pub fn from_books(books: impl IntoIterator<Item = Box<dyn Book>>) -> Self {
        Self {
            slots: books
                .into_iter()
                .map(|book| Slot {
                    path: book.path().to_path_buf(),
                    book: Some(book),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Open, once, every book whose path passes `select`, in shelf order.
    pub fn open_matching<F>(&mut self, select: F) -> Result<Vec<&dyn Book>, BookError>
    where
        F: Fn(&Path) -> bool,
    {
        for slot in self.slots.iter_mut().filter(|slot| select(&slot.path)) {
            if slot.book.is_none() {
                slot.book = Some(open_book(&slot.path)?);
            }
        }
        Ok(self
            .slots
            .iter()
            .filter(|slot| select(&slot.path))
            .filter_map(|slot| slot.book.as_deref())
            .collect())
    }
}

impl Transform {
    /// Apply the transform, inserting its triples into `model`.
    ///
    /// Returns the number of triples added.
    pub fn apply(
        &self,
        shelf: &mut BookShelf,
        model: &mut GraphModel,
    ) -> Result<usize, TransformError> {
        model.allow_non_unique(self.non_unique.iter().cloned());

        let Some(sheet) = self.sheet.as_deref() else {
            return Ok(self.emit(&HashMap::new(), model));
        };

        let books = shelf.open_matching(|path| self.selects_book(path))?;
        let books: Vec<&dyn Book> = books
            .into_iter()
            .filter(|book| book.has_sheet(sheet))
            .collect();
        if books.is_empty() {
            return Err(TransformError::MissingSheet {
                sheet: sheet.to_string(),
            });
        }

        let mut added = 0;
        for book in books {
            let rows = book.rows_in_sheet(sheet)?;
            let Some((header, data)) = rows.split_first() else {
                continue;
            };
            let header: Vec<&str> = header.iter().map(|cell| cell.trim()).collect();
            self.check_columns(&header, sheet, book.path())?;

            for row in data.iter().filter(|row| !is_blank(row)) {
                let cells: HashMap<&str, &str> = header
                    .iter()
                    .copied()
                    .zip(row.iter().map(String::as_str))
                    .filter(|(name, _)| !name.is_empty())
                    .collect();
                added += self.emit(&cells, model);
            }
            tracing::debug!(
                transform = %self.name,
                book = %book.path().display(),
                sheet,
                rows = data.len(),
                "applied transform to sheet"
            );
        }
        Ok(added)
    }

    fn selects_book(&self, path: &Path) -> bool {
        match (&self.book, path.file_name()) {
            (None, _) => true,
            (Some(matcher), Some(name)) => matcher.is_match(name),
            (Some(_), None) => false,
        }
    }

    fn check_columns(
        &self,
        header: &[&str],
        sheet: &str,
        book: &Path,
    ) -> Result<(), TransformError> {
        let referenced = self
            .subject
            .columns()
            .chain(self.triples.iter().flat_map(|t| t.object.columns()));
        for column in referenced {
            if !header.contains(&column) {
                return Err(TransformError::UnknownColumn {
                    sheet: sheet.to_string(),
                    book: book.to_path_buf(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn emit(&self, cells: &HashMap<&str, &str>, model: &mut GraphModel) -> usize {
        let Some(subject) = self.subject.render(cells) else {
            return 0;
        };
        let subject = Term::iri(expand_iri(&subject, &self.base));
        self.triples
            .iter()
            .filter_map(|template| {
                let object = self.object_term(template, cells)?;
                Some(Triple::new(
                    subject.clone(),
                    Term::iri(template.predicate.clone()),
                    object,
                ))
            })
            .map(|triple| model.insert(triple))
            .filter(|inserted| *inserted)
            .count()
    }

    fn object_term(
        &self,
        template: &TripleTemplate,
        cells: &HashMap<&str, &str>,
    ) -> Option<Term> {
        let text = template.object.render(cells)?;
        Some(match template.kind {
            ObjectKind::Iri => Term::iri(expand_iri(&text, &self.base)),
            ObjectKind::Literal => Term::Literal {
                value: text,
                datatype: template.datatype.clone(),
                language: template.language.clone(),
            },
        })
    }
}

fn is_blank(row: &Row) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}
