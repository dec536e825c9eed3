//! Turning command line arguments into validated run parameters.

use crate::books;
use crate::config::{CliArgs, ToolConfig};
use crate::error::{ArgumentError, Error};
use crate::purge::PurgeRule;
use crate::transform::{Transform, TransformSource};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Everything a run needs, validated once and consumed by the runner.
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub transforms: Vec<Transform>,
    pub books: Vec<PathBuf>,
    pub add_graph: Vec<PathBuf>,
    pub model: Option<PathBuf>,
    pub model_out: Option<PathBuf>,
    pub purge: PurgeRule,
    pub resolve_same: bool,
    /// Transforms consulted only for their non-unique predicates.
    pub non_unique_from: Vec<Transform>,
    pub verbose: bool,
    pub debug: bool,
}

/// Validate `args`, expanding books and transform names.
///
/// Book and name resolution stop at the first failure; the error names the
/// argument responsible for it.
pub fn resolve_args<S>(
    args: &CliArgs,
    config: &ToolConfig,
    source: &S,
) -> Result<RunParameters, ArgumentError>
where
    S: TransformSource + ?Sized,
{
    let books = books::locate_all(&args.book).map_err(|err| ArgumentError::new("--book", err))?;

    let mut positional = Vec::new();
    for name in &args.transform {
        let expanded = source
            .expand(name, None)
            .map_err(|err| ArgumentError::new(name.as_str(), err))?;
        positional.extend(expanded);
    }

    let mut transforms = source
        .from_list_file(args.from_list.as_deref())
        .map_err(|err| ArgumentError::new("--from-list", err))?;
    transforms.extend(positional);

    let non_unique_from = source
        .from_list_file(args.non_unique_from.as_deref())
        .map_err(|err| ArgumentError::new("--non-unique-from", err))?;

    if books.is_empty() {
        let needing: BTreeSet<&str> = transforms
            .iter()
            .filter(|transform| transform.uses_sheet())
            .map(|transform| transform.name.as_str())
            .collect();
        if !needing.is_empty() {
            let names = needing.into_iter().collect::<Vec<_>>().join(", ");
            return Err(ArgumentError::new(
                "--book",
                Error::Validation(format!("transforms {{{names}}} require --book")),
            ));
        }
    }

    let purge = PurgeRule::from_name(&args.purge_except).ok_or_else(|| {
        ArgumentError::new(
            "--purge-except",
            Error::Validation(format!("must be one of {}", PurgeRule::choices())),
        )
    })?;

    let model = match (&args.model, &args.model_out) {
        (None, Some(_)) => Some(config.default_model.clone()),
        (model, _) => model.clone(),
    };

    tracing::debug!(
        transforms = transforms.len(),
        books = books.len(),
        non_unique_from = non_unique_from.len(),
        purge = %purge,
        "resolved run parameters"
    );

    Ok(RunParameters {
        transforms,
        books,
        add_graph: args.add_graph.clone(),
        model,
        model_out: args.model_out.clone(),
        purge,
        resolve_same: args.resolve_same,
        non_unique_from,
        verbose: args.verbose,
        debug: args.debug,
    })
}
