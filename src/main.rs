use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use sheet_to_triples::{
    CliArgs, LoggingConfig, RunParameters, ToolConfig, TransformLoader, debug, init_logging,
    resolve_args, run_runner,
};

fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    let logging_config = LoggingConfig::from_env().verbose(cli.verbose);
    let guard = init_logging(logging_config)?;

    let params = match resolve(&cli) {
        Ok(params) => params,
        Err(err) => {
            drop(guard);
            err.exit()
        }
    };

    let summary = debug::context(params.debug, &params, || run_runner(&params))?;
    tracing::info!(
        transforms = summary.transforms_run,
        triples = summary.triples_added,
        saved = summary.saved_to.is_some(),
        "run complete"
    );
    Ok(())
}

/// Resolve arguments, reporting failures as usage errors.
fn resolve(cli: &CliArgs) -> Result<RunParameters, clap::Error> {
    let mut command = CliArgs::command();
    let config = ToolConfig::from_args(cli)
        .map_err(|err| command.error(ErrorKind::InvalidValue, format!("{err:#}")))?;
    let loader = TransformLoader::new(&config.transforms_dir);
    resolve_args(cli, &config, &loader)
        .map_err(|err| command.error(ErrorKind::ValueValidation, err))
}
