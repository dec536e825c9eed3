//! Run orchestration: load, ingest, transform, then persist or print.

use crate::error::{Error, Result};
use crate::model::GraphModel;
use crate::purge::PurgeRule;
use crate::resolve::RunParameters;
use crate::transform::{BookShelf, Transform};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub graphs_added: usize,
    pub transforms_run: usize,
    pub triples_added: usize,
    pub triples_purged: usize,
    pub identities_merged: usize,
    pub saved_to: Option<PathBuf>,
}

/// Sole owner of the graph model for the duration of a run.
pub struct Runner {
    model: GraphModel,
    shelf: BookShelf,
    purge: PurgeRule,
    resolve_same: bool,
    verbose: bool,
}

impl Runner {
    pub fn new(model: GraphModel, shelf: BookShelf) -> Self {
        Self {
            model,
            shelf,
            purge: PurgeRule::None,
            resolve_same: true,
            verbose: false,
        }
    }

    /// Build a runner, loading the input model when one is named.
    pub fn from_params(params: &RunParameters) -> Result<Self> {
        let model = match &params.model {
            Some(path) => GraphModel::load(path).map_err(|source| Error::Persistence {
                path: path.clone(),
                source,
            })?,
            None => GraphModel::new(),
        };
        Ok(Self {
            model,
            shelf: BookShelf::new(params.books.iter().cloned()),
            purge: params.purge,
            resolve_same: params.resolve_same,
            verbose: params.verbose,
        })
    }

    pub fn with_purge(mut self, purge: PurgeRule) -> Self {
        self.purge = purge;
        self
    }

    pub fn with_resolve_same(mut self, resolve_same: bool) -> Self {
        self.resolve_same = resolve_same;
        self
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn into_model(self) -> GraphModel {
        self.model
    }

    /// Merge Turtle graphs in order, then rebuild the term index once.
    pub fn ingest_graphs(&mut self, paths: &[PathBuf]) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }
        for path in paths {
            let added = self
                .model
                .parse_turtle(path)
                .map_err(|source| Error::Persistence {
                    path: path.clone(),
                    source,
                })?;
            tracing::info!(graph = %path.display(), triples = added, "added graph");
        }
        self.model.set_terms();
        Ok(paths.len())
    }

    /// Allow the non-unique predicates of `transforms` without running them.
    pub fn use_non_uniques(&mut self, transforms: &[Transform]) {
        for transform in transforms {
            self.model
                .allow_non_unique(transform.non_unique().iter().cloned());
        }
    }

    /// Apply transforms in order, stopping at the first failure.
    pub fn run(&mut self, transforms: &[Transform]) -> Result<usize> {
        let mut added = 0;
        for transform in transforms {
            let started = Instant::now();
            let count = transform
                .apply(&mut self.shelf, &mut self.model)
                .map_err(|source| Error::Execution {
                    transform: transform.name.clone(),
                    source,
                })?;
            tracing::info!(
                transform = %transform.name,
                triples = count,
                duration_ms = started.elapsed().as_millis() as u64,
                "ran transform"
            );
            added += count;
        }
        Ok(added)
    }

    /// Merge same-identity nodes when enabled, then drop what the purge rule rejects.
    ///
    /// Returns `(merged, purged)`.
    pub fn finalize(&mut self) -> (usize, usize) {
        let merged = if self.resolve_same {
            self.model.resolve_same_identity()
        } else {
            0
        };
        let purge = self.purge;
        let purged = self.model.retain(|triple| purge.retains(triple));
        (merged, purged)
    }

    pub fn save_model(&self, path: &Path) -> Result<()> {
        self.model.save(path).map_err(|source| Error::Persistence {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the graph as Turtle.
    pub fn show_graph<W: Write>(&self, writer: W) -> Result<W> {
        self.model
            .write_turtle(writer)
            .map_err(|source| Error::Persistence {
                path: PathBuf::from("<stdout>"),
                source,
            })
    }
}

/// Execute a resolved run end to end.
pub fn run_runner(params: &RunParameters) -> Result<RunSummary> {
    let mut runner = Runner::from_params(params)?;
    let mut summary = RunSummary {
        graphs_added: runner.ingest_graphs(&params.add_graph)?,
        ..RunSummary::default()
    };

    runner.use_non_uniques(&params.non_unique_from);

    let mutating = !params.add_graph.is_empty() || !params.transforms.is_empty();
    if mutating {
        summary.triples_added = runner.run(&params.transforms)?;
        summary.transforms_run = params.transforms.len();
    }

    if let Some(out) = &params.model_out {
        let (merged, purged) = runner.finalize();
        summary.identities_merged = merged;
        summary.triples_purged = purged;
        runner.save_model(out)?;
        tracing::info!(
            path = %out.display(),
            triples = runner.model().len(),
            merged,
            purged,
            "saved model"
        );
        summary.saved_to = Some(out.clone());
    } else if runner.verbose && !mutating {
        let stdout = io::stdout().lock();
        let mut stdout = runner.show_graph(stdout)?;
        stdout.flush().map_err(|err| Error::Persistence {
            path: PathBuf::from("<stdout>"),
            source: err.into(),
        })?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{OWL, Term, Triple, VM};
    use assert_matches::assert_matches;

    fn vm(local: &str) -> Term {
        Term::iri(format!("{VM}{local}"))
    }

    fn params() -> RunParameters {
        RunParameters {
            transforms: Vec::new(),
            books: Vec::new(),
            add_graph: Vec::new(),
            model: None,
            model_out: None,
            purge: PurgeRule::None,
            resolve_same: true,
            non_unique_from: Vec::new(),
            verbose: false,
            debug: false,
        }
    }

    #[test]
    fn missing_input_model_is_persistence_error() {
        let mut params = params();
        params.model = Some(PathBuf::from("/nonexistent/model.json"));
        assert_matches!(Runner::from_params(&params).err(), Some(Error::Persistence { .. }));
    }

    #[test]
    fn finalize_merges_then_purges() {
        let mut model = GraphModel::new();
        model.insert(Triple::new(vm("geo/a"), vm("name"), Term::literal("Alpha")));
        model.insert(Triple::new(vm("site/a"), vm("atGeoPoint"), vm("point/1")));
        model.insert(Triple::new(
            vm("site/a"),
            Term::iri(format!("{OWL}sameAs")),
            vm("site/b"),
        ));
        model.insert(Triple::new(vm("site/b"), vm("code"), Term::literal("B")));

        let mut runner = Runner::new(model, BookShelf::default()).with_purge(PurgeRule::Geo);
        let (merged, purged) = runner.finalize();

        assert_eq!(merged, 1);
        assert_eq!(purged, 1);
        let model = runner.into_model();
        assert!(model.contains(&Triple::new(vm("site/b"), vm("atGeoPoint"), vm("point/1"))));
        assert!(model.contains(&Triple::new(vm("geo/a"), vm("name"), Term::literal("Alpha"))));
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn finalize_without_resolution_keeps_same_as() {
        let mut model = GraphModel::new();
        model.insert(Triple::new(
            vm("site/a"),
            Term::iri(format!("{OWL}sameAs")),
            vm("site/b"),
        ));
        let mut runner = Runner::new(model, BookShelf::default()).with_resolve_same(false);
        assert_eq!(runner.finalize(), (0, 0));
        assert_eq!(runner.model().len(), 1);
    }

    #[test]
    fn show_graph_writes_turtle() {
        let mut model = GraphModel::new();
        model.insert(Triple::new(vm("site/1"), vm("name"), Term::literal("Gate")));
        let runner = Runner::new(model, BookShelf::default());
        let out = runner.show_graph(Vec::new()).expect("turtle");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("\"Gate\""), "{text}");
    }
}
