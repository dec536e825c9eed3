pub mod books;
pub mod config;
pub mod debug;
pub mod error;
pub mod logging;
pub mod model;
pub mod purge;
pub mod rdf;
pub mod resolve;
pub mod runner;
pub mod transform;
pub mod utils;
pub mod workbook;

pub use config::{CliArgs, ToolConfig};
pub use error::{ArgumentError, Error, Result};
pub use logging::{LoggingConfig, init_logging};
pub use model::GraphModel;
pub use purge::PurgeRule;
pub use resolve::{RunParameters, resolve_args};
pub use runner::{RunSummary, Runner, run_runner};
pub use transform::{Transform, TransformLoader, TransformSource};
