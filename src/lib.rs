//! # `FlowWorks`
//!
//! `flowworks` is the main crate of the `FlowWorks` dataflow analysis
//! project. The project is subdivided into multiple crates, `flowworks` acts
//! as entry point by reexporting important structs and functions from those
//! sub-crates. Most of the reexport are done within the `flowworks::prelude`
//! namespace.
//!
//! ## Library basics
//!
//! Programs are read from a JSON document describing classes, fields and
//! method bodies. The `Repo` abstraction indexes them, and an
//! `AnalysisSession` runs and caches analyses over it:
//!
//! ```rust,no_run
//! use flowworks::prelude::*;
//! use flowworks::analysis::dispose::DisposeResult;
//!
//! let program = model::open("program.json")?;
//! let repo = Repo::new(&program)?;
//! let session = AnalysisSession::new(&repo, AnalysisConfig::default());
//! for method in repo.iter_methods().filter(|method| method.body().is_some()) {
//!     let result = session.analyze::<DisposeResult>(method)?;
//!     println!("{method}: {} leaked object(s)", result.leaked_objects().len());
//! }
//! # Ok::<(), FwError>(())
//! ```
//!
//! ## Sub-crates
//!
//!  - [`fw_model`] contains the program model: classes, methods, and method
//!    bodies given as control flow graphs of semantic operations,
//!  - [`fw_analysis`] contains the dataflow engine and every analysis built
//!    on it (points-to, copy, value content, null, dispose and parameter
//!    validation).

mod errors;
mod input;

pub mod cli;
pub mod fw_cfg;
pub mod fw_dataflow;
pub mod fw_dispose;
pub mod fw_paramcheck;

pub use fw_analysis as analysis;
pub use fw_model as model;

/// Reexport module of commonly used structures and functions from `FlowWorks`
/// project sub-crates:
///
/// ```rust
/// use flowworks::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{FwError, FwResult};

    pub use fw_analysis::controlflow;
    pub use fw_analysis::repo::{Class, Field, Method, Repo};
    pub use fw_analysis::{Analysis, AnalysisConfig, AnalysisKind, AnalysisSession};

    pub use fw_model::{self as model, OperationId, Program, TypeName};

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("FW_LOG", "info")
            .write_style("FW_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}
