use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TRANSFORMS_DIR: &str = "transforms";
pub const DEFAULT_MODEL_PATH: &str = "model/default.json";

/// Settings that sit outside the command line proper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Directory transform names are resolved against.
    pub transforms_dir: PathBuf,
    /// Model read when `--model-out` is given without `--model`.
    pub default_model: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            transforms_dir: PathBuf::from(DEFAULT_TRANSFORMS_DIR),
            default_model: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

impl ToolConfig {
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let file_config = if let Some(path) = args.config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            transforms_dir: file_transforms_dir,
            default_model: file_default_model,
        } = file_config;

        let transforms_dir = args
            .transforms_dir
            .clone()
            .or(file_transforms_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TRANSFORMS_DIR));

        let default_model = args
            .default_model
            .clone()
            .or(file_default_model)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));

        anyhow::ensure!(
            !transforms_dir.as_os_str().is_empty(),
            "transforms directory must not be empty"
        );
        anyhow::ensure!(
            !default_model.as_os_str().is_empty(),
            "default model path must not be empty"
        );

        Ok(Self {
            transforms_dir,
            default_model,
        })
    }
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "sheet-to-triples",
    about = "Transform spreadsheet data into a graph model",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "PATH",
        action = ArgAction::Append,
        help = "Spreadsheet file, or directory of .xls/.xlsx files"
    )]
    pub book: Vec<PathBuf>,

    #[arg(
        long,
        value_name = "PATH",
        action = ArgAction::Append,
        help = "Turtle graph to merge into the model"
    )]
    pub add_graph: Vec<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Model file to start from")]
    pub model: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Where to write the resulting model")]
    pub model_out: Option<PathBuf>,

    #[arg(
        long,
        value_name = "RULE",
        default_value = "none",
        help = "Only keep triples matching this rule: none, geo or issues"
    )]
    pub purge_except: String,

    #[arg(
        long = "no-resolve-same",
        action = ArgAction::SetFalse,
        help = "Keep sameAs assertions instead of merging the nodes they join"
    )]
    pub resolve_same: bool,

    #[arg(long, help = "Report the error chain and run parameters on failure")]
    pub debug: bool,

    #[arg(short, long, help = "Log progress and print the graph when nothing changes")]
    pub verbose: bool,

    #[arg(long, value_name = "PATH", help = "File listing transform names to run first")]
    pub from_list: Option<PathBuf>,

    #[arg(
        long,
        value_name = "PATH",
        help = "File listing transforms whose non-unique predicates are allowed up front"
    )]
    pub non_unique_from: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEET_TO_TRIPLES_TRANSFORMS",
        value_name = "DIR",
        help = "Directory transform names are resolved in"
    )]
    pub transforms_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEET_TO_TRIPLES_DEFAULT_MODEL",
        value_name = "PATH",
        hide = true
    )]
    pub default_model: Option<PathBuf>,

    #[arg(value_name = "TRANSFORM", help = "Transforms to run, in order")]
    pub transform: Vec<String>,
}

impl Default for CliArgs {
    /// The same values clap produces for an empty command line.
    fn default() -> Self {
        Self {
            book: Vec::new(),
            add_graph: Vec::new(),
            model: None,
            model_out: None,
            purge_except: "none".to_string(),
            resolve_same: true,
            debug: false,
            verbose: false,
            from_list: None,
            non_unique_from: None,
            config: None,
            transforms_dir: None,
            default_model: None,
            transform: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    transforms_dir: Option<PathBuf>,
    default_model: Option<PathBuf>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
