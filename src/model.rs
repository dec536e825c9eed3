//! The in-memory graph model and its JSON persistence.
//!
//! Triples keep insertion order. Alongside them the model keeps a term index:
//! a term table (used for the JSON encoding) and a `(subject, predicate)`
//! property index used to enforce single-valued properties on insert. Bulk
//! Turtle ingestion bypasses the index, so callers must run [`GraphModel::set_terms`]
//! afterwards.

use crate::rdf::{self, PREFIXES, Term, Triple};
use indexmap::IndexSet;
use oxigraph::io::{RdfFormat, RdfParseError, RdfParser, RdfSerializer};
use oxigraph::model::vocab::xsd;
use oxigraph::model::{BlankNode, Literal, NamedNode, Term as OxTerm, Triple as OxTriple};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid model json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("triple {triple} refers to missing term {index}")]
    DanglingTerm { triple: usize, index: usize },

    #[error("turtle parse error: {0}")]
    Parse(#[from] RdfParseError),

    #[error("unsupported term {term}: {reason}")]
    InvalidTerm { term: String, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    terms: Vec<Term>,
    triples: Vec<[usize; 3]>,
    #[serde(flatten)]
    metadata: Map<String, Value>,
}

#[derive(Debug, Default, Clone)]
pub struct GraphModel {
    triples: IndexSet<Triple>,
    terms: IndexSet<Term>,
    properties: HashMap<(Term, Term), Vec<Term>>,
    non_unique: HashSet<String>,
    metadata: Map<String, Value>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a model saved by [`GraphModel::save`].
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path)?;
        let ModelFile {
            terms,
            triples,
            metadata,
        } = serde_json::from_reader(BufReader::new(file))?;

        let lookup = |triple: usize, index: usize| {
            terms
                .get(index)
                .cloned()
                .ok_or(ModelError::DanglingTerm { triple, index })
        };
        let mut model = Self {
            metadata,
            ..Self::default()
        };
        for (position, [s, p, o]) in triples.into_iter().enumerate() {
            model.triples.insert(Triple::new(
                lookup(position, s)?,
                lookup(position, p)?,
                lookup(position, o)?,
            ));
        }
        model.set_terms();
        tracing::debug!(path = %path.display(), triples = model.len(), "loaded model");
        Ok(model)
    }

    /// Write the model as JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let mut terms: IndexSet<&Term> = IndexSet::new();
        let mut encoded = Vec::with_capacity(self.triples.len());
        for triple in &self.triples {
            let mut ids = [0usize; 3];
            for (slot, term) in ids
                .iter_mut()
                .zip([&triple.subject, &triple.predicate, &triple.object])
            {
                *slot = terms.insert_full(term).0;
            }
            encoded.push(ids);
        }
        let file = ModelFile {
            terms: terms.into_iter().cloned().collect(),
            triples: encoded,
            metadata: self.metadata.clone(),
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = staging_file(dir)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &file)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        match fs::metadata(path) {
            Ok(existing) => staged.as_file().set_permissions(existing.permissions())?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        staged.persist(path).map_err(|err| err.error)?;
        tracing::debug!(path = %path.display(), triples = self.len(), "saved model");
        Ok(())
    }

    /// Add every triple of a Turtle document without touching the index.
    ///
    /// Relative IRIs resolve against the document's own `file:` IRI.
    pub fn parse_turtle(&mut self, path: &Path) -> Result<usize, ModelError> {
        let file = File::open(path)?;
        let base = file_iri(path)?;
        let parser = RdfParser::from_format(RdfFormat::Turtle)
            .with_base_iri(base.as_str())
            .map_err(|err| invalid_term(&base, err))?
            .for_reader(BufReader::new(file));
        let before = self.triples.len();
        for quad in parser {
            let quad = quad?;
            let triple = Triple::new(
                from_oxigraph(OxTerm::from(quad.subject))?,
                Term::iri(quad.predicate.into_string()),
                from_oxigraph(quad.object)?,
            );
            self.triples.insert(triple);
        }
        Ok(self.triples.len() - before)
    }

    /// Rebuild the term table and property index from all current triples.
    pub fn set_terms(&mut self) {
        let mut terms = IndexSet::new();
        let mut properties: HashMap<(Term, Term), Vec<Term>> = HashMap::new();
        for triple in &self.triples {
            terms.insert(triple.subject.clone());
            terms.insert(triple.predicate.clone());
            terms.insert(triple.object.clone());
            properties
                .entry((triple.subject.clone(), triple.predicate.clone()))
                .or_default()
                .push(triple.object.clone());
        }
        self.terms = terms;
        self.properties = properties;
    }

    /// Allow the given predicate IRIs to carry several objects per subject.
    pub fn allow_non_unique<I, S>(&mut self, predicates: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_unique.extend(predicates.into_iter().map(Into::into));
    }

    pub fn is_non_unique(&self, predicate: &Term) -> bool {
        predicate
            .as_iri()
            .is_some_and(|iri| self.non_unique.contains(iri))
    }

    /// Insert a triple, replacing other values of a single-valued property.
    ///
    /// The new triple takes the position of the first value it replaces.
    /// Returns false when the triple was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if self.triples.contains(&triple) {
            return false;
        }
        let unique = !self.is_non_unique(&triple.predicate);
        let objects = self
            .properties
            .entry((triple.subject.clone(), triple.predicate.clone()))
            .or_default();
        let mut stale = Vec::new();
        if unique {
            let triples = &self.triples;
            stale.extend(objects.drain(..).filter_map(|previous| {
                triples.get_index_of(&Triple::new(
                    triple.subject.clone(),
                    triple.predicate.clone(),
                    previous,
                ))
            }));
        }
        objects.push(triple.object.clone());

        self.terms.insert(triple.subject.clone());
        self.terms.insert(triple.predicate.clone());
        self.terms.insert(triple.object.clone());

        let Some((&slot, rest)) = stale.split_first() else {
            return self.triples.insert(triple);
        };
        let replaced = self.triples.replace_index(slot, triple).is_ok();
        if !rest.is_empty() {
            let rest: HashSet<usize> = rest.iter().copied().collect();
            let mut index = 0;
            self.triples.retain(|_| {
                let keep = !rest.contains(&index);
                index += 1;
                keep
            });
        }
        replaced
    }

    /// Keep only triples matching `keep`. Returns how many were dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Triple) -> bool,
    {
        let before = self.triples.len();
        self.triples.retain(|triple| keep(triple));
        let dropped = before - self.triples.len();
        if dropped > 0 {
            self.set_terms();
        }
        dropped
    }

    /// Merge nodes asserted to be the same entity and drop those assertions.
    ///
    /// `a sameAs b` folds `a` into `b`; chains resolve to their last node.
    /// Returns how many triples the model shrank by.
    pub fn resolve_same_identity(&mut self) -> usize {
        let mut parents: HashMap<Term, Term> = HashMap::new();
        for triple in self.triples.iter().filter(|t| rdf::asserts_same_identity(t)) {
            let alias = find_root(&parents, &triple.subject).clone();
            let target = find_root(&parents, &triple.object).clone();
            if alias != target {
                parents.insert(alias, target);
            }
        }

        let before = self.triples.len();
        let canonical = |term: Term| find_root(&parents, &term).clone();
        let resolved: IndexSet<Triple> = std::mem::take(&mut self.triples)
            .into_iter()
            .filter(|triple| !rdf::asserts_same_identity(triple))
            .map(|triple| {
                Triple::new(
                    canonical(triple.subject),
                    triple.predicate,
                    canonical(triple.object),
                )
            })
            .collect();
        self.triples = resolved;
        self.set_terms();
        before - self.triples.len()
    }

    /// Serialize the graph as Turtle with the known prefixes declared.
    pub fn write_turtle<W: Write>(&self, writer: W) -> Result<W, ModelError> {
        let mut serializer = RdfSerializer::from_format(RdfFormat::Turtle);
        for (name, iri) in PREFIXES {
            serializer = serializer
                .with_prefix(*name, *iri)
                .map_err(|err| invalid_term(iri, err))?;
        }
        let mut writer = serializer.for_writer(writer);
        for triple in &self.triples {
            writer.serialize_triple(&to_oxigraph(triple)?)?;
        }
        Ok(writer.finish()?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Distinct terms known to the index.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Objects recorded for a subject and predicate in the index.
    pub fn objects(&self, subject: &Term, predicate: &Term) -> &[Term] {
        self.properties
            .get(&(subject.clone(), predicate.clone()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn find_root<'a>(parents: &'a HashMap<Term, Term>, term: &'a Term) -> &'a Term {
    let mut current = term;
    while let Some(parent) = parents.get(current) {
        current = parent;
    }
    current
}

#[cfg(unix)]
fn staging_file(dir: &Path) -> io::Result<tempfile::NamedTempFile> {
    use std::os::unix::fs::PermissionsExt;
    tempfile::Builder::new()
        .permissions(fs::Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

#[cfg(not(unix))]
fn staging_file(dir: &Path) -> io::Result<tempfile::NamedTempFile> {
    tempfile::NamedTempFile::new_in(dir)
}

/// `file:` IRI of `path`, made absolute against the working directory.
fn file_iri(path: &Path) -> io::Result<String> {
    let absolute = std::path::absolute(path)?;
    let text = absolute.to_string_lossy().replace('\\', "/");
    let text = if text.starts_with('/') {
        text
    } else {
        format!("/{text}")
    };
    Ok(format!("file://{}", rdf::escape_iri(&text)))
}

fn invalid_term(term: impl ToString, err: impl ToString) -> ModelError {
    ModelError::InvalidTerm {
        term: term.to_string(),
        reason: err.to_string(),
    }
}

#[allow(unreachable_patterns)]
fn from_oxigraph(term: OxTerm) -> Result<Term, ModelError> {
    match term {
        OxTerm::NamedNode(node) => Ok(Term::iri(node.into_string())),
        OxTerm::BlankNode(node) => Ok(Term::blank(node.into_string())),
        OxTerm::Literal(literal) => {
            let language = literal.language().map(str::to_string);
            let datatype = (language.is_none() && literal.datatype() != xsd::STRING)
                .then(|| literal.datatype().as_str().to_string());
            Ok(Term::Literal {
                value: literal.value().to_string(),
                datatype,
                language,
            })
        }
        other => Err(invalid_term(other, "quoted triples are not supported")),
    }
}

fn to_oxigraph(triple: &Triple) -> Result<OxTriple, ModelError> {
    let predicate = match &triple.predicate {
        Term::Iri { value } => NamedNode::new(value).map_err(|err| invalid_term(value, err))?,
        other => return Err(invalid_term(other, "predicate must be an IRI")),
    };
    let object = match &triple.object {
        Term::Iri { value } => {
            OxTerm::from(NamedNode::new(value).map_err(|err| invalid_term(value, err))?)
        }
        Term::Blank { value } => {
            OxTerm::from(BlankNode::new(value).map_err(|err| invalid_term(value, err))?)
        }
        Term::Literal {
            value,
            datatype,
            language,
        } => OxTerm::from(match (language, datatype) {
            (Some(language), _) => Literal::new_language_tagged_literal(value, language)
                .map_err(|err| invalid_term(&triple.object, err))?,
            (None, Some(datatype)) => Literal::new_typed_literal(
                value,
                NamedNode::new(datatype).map_err(|err| invalid_term(datatype, err))?,
            ),
            (None, None) => Literal::new_simple_literal(value),
        }),
    };
    match &triple.subject {
        Term::Iri { value } => Ok(OxTriple::new(
            NamedNode::new(value).map_err(|err| invalid_term(value, err))?,
            predicate,
            object,
        )),
        Term::Blank { value } => Ok(OxTriple::new(
            BlankNode::new(value).map_err(|err| invalid_term(value, err))?,
            predicate,
            object,
        )),
        other => Err(invalid_term(other, "subject cannot be a literal")),
    }
}
