//! Named transforms and the expansion of transform names.
//!
//! A name resolves to a TOML definition file holding one or more
//! `[[transform]]` tables, optionally preceded by `include`d names. Names
//! ending in `.txt` refer to list files of further names. Resolution is
//! strictly sequential and stops at the first failure.

mod apply;
pub mod template;

pub use apply::{BookShelf, TransformError};

use crate::error::{Error, Result};
use crate::rdf::{VM, expand_iri};
use globset::{Glob, GlobMatcher};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use template::Template;

/// Deepest chain of list files and includes followed before giving up.
pub const MAX_NESTING: usize = 16;

const DEFINITION_EXTENSION: &str = ".toml";
const LIST_EXTENSION: &str = ".txt";

/// Expands transform names into transforms.
pub trait TransformSource {
    /// Resolve one name. `base` is the directory relative references start from.
    fn expand(&self, name: &str, base: Option<&Path>) -> Result<Vec<Transform>>;

    /// Expand every line of a list file, relative to the file's directory.
    ///
    /// An absent path yields nothing.
    fn from_list_file(&self, path: Option<&Path>) -> Result<Vec<Transform>> {
        let Some(path) = path else {
            return Ok(Vec::new());
        };
        let base = list_base(path);
        let mut transforms = Vec::new();
        for line in read_list(path)?.lines() {
            transforms.extend(self.expand(line, Some(&base))?);
        }
        Ok(transforms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionFile {
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    transform: Vec<TransformSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransformSpec {
    name: Option<String>,
    sheet: Option<String>,
    book: Option<String>,
    base: Option<String>,
    subject: String,
    #[serde(default)]
    non_unique: Vec<String>,
    #[serde(default)]
    triples: Vec<TripleSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TripleSpec {
    predicate: String,
    object: String,
    #[serde(default)]
    kind: ObjectKind,
    datatype: Option<String>,
    lang: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    #[default]
    Literal,
    Iri,
}

#[derive(Debug, Clone)]
pub(crate) struct TripleTemplate {
    pub(crate) predicate: String,
    pub(crate) object: Template,
    pub(crate) kind: ObjectKind,
    pub(crate) datatype: Option<String>,
    pub(crate) language: Option<String>,
}

/// A resolved unit of extraction work.
#[derive(Debug, Clone)]
pub struct Transform {
    pub name: String,
    /// Definition file the transform came from.
    pub origin: PathBuf,
    pub(crate) sheet: Option<String>,
    pub(crate) book: Option<GlobMatcher>,
    pub(crate) base: String,
    pub(crate) subject: Template,
    pub(crate) triples: Vec<TripleTemplate>,
    pub(crate) non_unique: Vec<String>,
}

impl Transform {
    /// Whether the transform reads spreadsheet data.
    pub fn uses_sheet(&self) -> bool {
        self.sheet.is_some()
    }

    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    /// Predicate IRIs this transform allows to repeat per subject.
    pub fn non_unique(&self) -> &[String] {
        &self.non_unique
    }

    fn compile(spec: TransformSpec, name: String, origin: &Path) -> Result<Self, String> {
        let base = spec.base.unwrap_or_else(|| VM.to_string());
        let book = spec
            .book
            .map(|pattern| {
                Glob::new(&pattern)
                    .map(|glob| glob.compile_matcher())
                    .map_err(|err| format!("invalid book pattern {pattern:?}: {err}"))
            })
            .transpose()?;
        let subject = Template::parse(&spec.subject)?;
        let triples = spec
            .triples
            .into_iter()
            .map(|triple| -> Result<TripleTemplate, String> {
                Ok(TripleTemplate {
                    predicate: expand_iri(&triple.predicate, &base),
                    object: Template::parse(&triple.object)?,
                    kind: triple.kind,
                    datatype: triple.datatype.map(|dt| expand_iri(&dt, &base)),
                    language: triple.lang,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if spec.sheet.is_none() {
            let columns = subject
                .columns()
                .chain(triples.iter().flat_map(|t| t.object.columns()))
                .collect::<Vec<_>>();
            if !columns.is_empty() {
                return Err(format!(
                    "transform {name:?} reads columns {columns:?} but names no sheet"
                ));
            }
        }

        let non_unique = spec
            .non_unique
            .iter()
            .map(|predicate| expand_iri(predicate, &base))
            .collect();

        Ok(Self {
            name,
            origin: origin.to_path_buf(),
            sheet: spec.sheet,
            book,
            base,
            subject,
            triples,
            non_unique,
        })
    }
}

/// Resolves names against definition files on disk.
#[derive(Debug, Clone)]
pub struct TransformLoader {
    root: PathBuf,
}

impl TransformLoader {
    /// `root` is searched for names not found relative to a base path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn expand_at(&self, name: &str, base: Option<&Path>, depth: usize) -> Result<Vec<Transform>> {
        let token = name.trim();
        if token.is_empty() || token.starts_with('#') {
            return Ok(Vec::new());
        }
        if token.starts_with('-') || token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::name_resolution(token, "malformed transform name"));
        }
        if depth >= MAX_NESTING {
            return Err(Error::name_resolution(
                token,
                format!("nested deeper than {MAX_NESTING} levels"),
            ));
        }

        if token.ends_with(LIST_EXTENSION) {
            let path = self
                .locate(token, base)
                .ok_or_else(|| Error::name_resolution(token, "unknown transform list"))?;
            return self.list_at(&path, depth + 1);
        }

        let file_name = if token.ends_with(DEFINITION_EXTENSION) {
            token.to_string()
        } else {
            format!("{token}{DEFINITION_EXTENSION}")
        };
        let path = self
            .locate(&file_name, base)
            .ok_or_else(|| Error::name_resolution(token, "unknown transform"))?;
        self.load_definition(token, &path, depth)
    }

    fn locate(&self, relative: &str, base: Option<&Path>) -> Option<PathBuf> {
        base.into_iter()
            .chain(std::iter::once(self.root.as_path()))
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_file())
    }

    fn list_at(&self, path: &Path, depth: usize) -> Result<Vec<Transform>> {
        let base = list_base(path);
        let mut transforms = Vec::new();
        for line in read_list(path)?.lines() {
            transforms.extend(self.expand_at(line, Some(&base), depth)?);
        }
        tracing::debug!(list = %path.display(), count = transforms.len(), "expanded list file");
        Ok(transforms)
    }

    fn load_definition(&self, token: &str, path: &Path, depth: usize) -> Result<Vec<Transform>> {
        let malformed = |reason: String| {
            Error::name_resolution(token, format!("{}: {reason}", path.display()))
        };
        let contents = fs::read_to_string(path).map_err(|err| malformed(err.to_string()))?;
        let definition: DefinitionFile =
            toml::from_str(&contents).map_err(|err| malformed(err.to_string()))?;

        let base = list_base(path);
        let mut transforms = Vec::new();
        for include in &definition.include {
            transforms.extend(self.expand_at(include, Some(&base), depth + 1)?);
        }

        let default_name = token.strip_suffix(DEFINITION_EXTENSION).unwrap_or(token);
        let several = definition.transform.len() > 1;
        for (index, spec) in definition.transform.into_iter().enumerate() {
            let name = match (&spec.name, several) {
                (Some(name), _) => name.clone(),
                (None, false) => default_name.to_string(),
                (None, true) => format!("{default_name}.{}", index + 1),
            };
            transforms.push(Transform::compile(spec, name, path).map_err(malformed)?);
        }
        if transforms.is_empty() {
            return Err(malformed("defines no transforms".to_string()));
        }
        Ok(transforms)
    }
}

impl TransformSource for TransformLoader {
    fn expand(&self, name: &str, base: Option<&Path>) -> Result<Vec<Transform>> {
        self.expand_at(name, base, 0)
    }

    fn from_list_file(&self, path: Option<&Path>) -> Result<Vec<Transform>> {
        match path {
            Some(path) => self.list_at(path, 0),
            None => Ok(Vec::new()),
        }
    }
}

fn list_base(path: &Path) -> PathBuf {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn read_list(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::ListFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dir");
        }
        fs::write(&path, contents).expect("write");
        path
    }

    const SITES: &str = r#"
[[transform]]
sheet = "Sites"
subject = "site/{Site ID}"
non_unique = ["vm:relatesTo"]

[[transform.triples]]
predicate = "vm:name"
object = "{Name}"
"#;

    const STATIC: &str = r#"
[[transform]]
name = "types"
subject = "vm:Site"

[[transform.triples]]
predicate = "rdfs:label"
object = "Site"
lang = "en"
"#;

    fn names(transforms: &[Transform]) -> Vec<&str> {
        transforms.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn single_definition_takes_the_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "sites.toml", SITES);
        let loader = TransformLoader::new(dir.path());

        let transforms = loader.expand("sites", None).expect("expand");
        assert_eq!(names(&transforms), vec!["sites"]);
        assert!(transforms[0].uses_sheet());
        assert_eq!(transforms[0].non_unique(), &[format!("{VM}relatesTo")]);
    }

    #[test]
    fn includes_expand_before_own_transforms() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "sites.toml", SITES);
        write(dir.path(), "types.toml", STATIC);
        write(dir.path(), "all.toml", "include = [\"types\", \"sites\"]\n");
        let loader = TransformLoader::new(dir.path());

        let transforms = loader.expand("all", None).expect("expand");
        assert_eq!(names(&transforms), vec!["types", "sites"]);
        assert!(!transforms[0].uses_sheet());
    }

    #[test]
    fn several_unnamed_transforms_are_numbered() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "pair.toml",
            "[[transform]]\nsubject = \"a\"\n[[transform]]\nsubject = \"b\"\n",
        );
        let loader = TransformLoader::new(dir.path());
        let transforms = loader.expand("pair", None).expect("expand");
        assert_eq!(names(&transforms), vec!["pair.1", "pair.2"]);
    }

    #[test]
    fn unknown_and_malformed_names_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loader = TransformLoader::new(dir.path());
        assert_matches!(
            loader.expand("missing", None),
            Err(Error::NameResolution { name, .. }) if name == "missing"
        );
        assert_matches!(
            loader.expand("two words", None),
            Err(Error::NameResolution { reason, .. }) if reason.contains("malformed")
        );
        assert_matches!(loader.expand("--flag", None), Err(Error::NameResolution { .. }));
    }

    #[test]
    fn blank_and_comment_names_expand_to_nothing() {
        let loader = TransformLoader::new("unused");
        assert!(loader.expand("", None).expect("blank").is_empty());
        assert!(loader.expand("   ", None).expect("spaces").is_empty());
        assert!(loader.expand("# note", None).expect("comment").is_empty());
    }

    #[test]
    fn invalid_definition_is_name_resolution_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "bad.toml", "[[transform]]\nsubject = \"{Name\"\n");
        write(dir.path(), "sheetless.toml", "[[transform]]\nsubject = \"{Name}\"\n");
        write(dir.path(), "empty.toml", "");
        let loader = TransformLoader::new(dir.path());
        for name in ["bad", "sheetless", "empty"] {
            assert_matches!(
                loader.expand(name, None),
                Err(Error::NameResolution { .. }),
                "{name} should fail"
            );
        }
    }

    #[test]
    fn list_file_resolves_relative_to_its_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "lists/local.toml", STATIC);
        write(dir.path(), "sites.toml", SITES);
        let list = write(dir.path(), "lists/run.txt", "local\n\nsites\n");
        let loader = TransformLoader::new(dir.path());

        let transforms = loader.from_list_file(Some(&list)).expect("list");
        assert_eq!(names(&transforms), vec!["types", "sites"]);
        assert!(loader.from_list_file(None).expect("absent").is_empty());
    }

    #[test]
    fn nested_list_reference_expands_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "sites.toml", SITES);
        write(dir.path(), "types.toml", STATIC);
        write(dir.path(), "inner.txt", "types\n");
        let outer = write(dir.path(), "outer.txt", "sites\ninner.txt\n");
        let loader = TransformLoader::new(dir.path());

        let transforms = loader.from_list_file(Some(&outer)).expect("list");
        assert_eq!(names(&transforms), vec!["sites", "types"]);
    }

    #[test]
    fn self_referencing_list_stops_at_nesting_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let list = write(dir.path(), "loop.txt", "loop.txt\n");
        let loader = TransformLoader::new(dir.path());
        assert_matches!(
            loader.from_list_file(Some(&list)),
            Err(Error::NameResolution { reason, .. }) if reason.contains("nested")
        );
    }

    #[test]
    fn unreadable_list_is_list_file_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loader = TransformLoader::new(dir.path());
        assert_matches!(
            loader.from_list_file(Some(&dir.path().join("absent.txt"))),
            Err(Error::ListFile { .. })
        );
    }
}
