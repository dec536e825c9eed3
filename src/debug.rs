//! Failure reporting for `--debug` runs.

use crate::resolve::RunParameters;
use std::error::Error as StdError;
use std::fmt::Write as _;

/// Run `f`; when `enabled` and it fails, report the error chain and `params` on stderr.
pub fn context<T, E, F>(enabled: bool, params: &RunParameters, f: F) -> Result<T, E>
where
    E: StdError,
    F: FnOnce() -> Result<T, E>,
{
    let result = f();
    if enabled && let Err(err) = &result {
        tracing::error!(error = %err, "run failed");
        eprint!("{}", report(err, params));
    }
    result
}

/// Render the error chain followed by the run parameters.
pub fn report(err: &dyn StdError, params: &RunParameters) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(out, "  caused by: {cause}");
        source = cause.source();
    }
    let _ = writeln!(out, "{err:#?}");
    let _ = writeln!(out, "run parameters: {params:#?}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::purge::PurgeRule;
    use std::io;
    use std::path::PathBuf;

    fn params() -> RunParameters {
        RunParameters {
            transforms: Vec::new(),
            books: vec![PathBuf::from("sites.xlsx")],
            add_graph: Vec::new(),
            model: None,
            model_out: Some(PathBuf::from("out.json")),
            purge: PurgeRule::Geo,
            resolve_same: true,
            non_unique_from: Vec::new(),
            verbose: false,
            debug: true,
        }
    }

    #[test]
    fn report_lists_causes_and_parameters() {
        let err = Error::PathResolution {
            path: PathBuf::from("sites.xlsx"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        let text = report(&err, &params());
        assert!(text.starts_with("error: sites.xlsx: gone\n"), "{text}");
        assert!(text.contains("caused by: gone"), "{text}");
        assert!(text.contains("purge: Geo"), "{text}");
    }

    #[test]
    fn success_passes_through() {
        let value: Result<u8, Error> = context(true, &params(), || Ok(7));
        assert_eq!(value.ok(), Some(7));
    }
}
