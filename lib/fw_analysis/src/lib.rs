//! This crate provides the interprocedural dataflow analyses of the
//! `FlowWorks` project.
//!
//! Analyses run inside an [`AnalysisSession`], which caches every result
//! computed for a (method, configuration, calling context) triple, so that
//! prerequisites and callee summaries are computed once per session:
//!
//! ```rust,ignore
//! let repo = Repo::new(&program)?;
//! let session = AnalysisSession::new(&repo, AnalysisConfig::default());
//! let result = session.analyze::<DisposeResult>(method)?;
//! for leak in result.leaked_objects() {
//!     println!("{} created at {} is not disposed", leak.class, leak.operation);
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod controlflow;
pub mod copy;
pub mod dataflow;
pub mod dispose;
pub mod entity;
pub mod errors;
pub mod hierarchy;
pub mod interprocedural;
pub mod null;
pub mod param_validation;
pub mod points_to;
pub mod repo;
pub mod session;
pub mod value_content;

#[cfg(test)]
mod testing;

pub use crate::cancel::CancellationToken;
pub use crate::config::{AnalysisConfig, AnalysisKind, InterproceduralAnalysisKind, PessimisticMode};
pub use crate::errors::{AnalysisError, AnalysisResult};
pub use crate::session::{Analysis, AnalysisSession, SessionStats};

use crate::controlflow::Cfg;
use crate::repo::Method;

/// Builds the control flow graph of a method.
///
/// # Errors
///
/// Returns [`AnalysisError::NoCode`] for methods without body.
pub fn control_flow_graph<'a>(method: &Method<'a>) -> AnalysisResult<Cfg<'a>> {
    Cfg::for_method(method)
}
