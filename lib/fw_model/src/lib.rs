//! Program model for the `FlowWorks` dataflow analyses.
//!
//! A program is a set of classes whose methods may carry a body, given as
//! an already built control flow graph: basic blocks holding flat semantic
//! operations, linked by (possibly conditional) edges. The whole model is
//! read from a JSON document:
//!
//! ```rust
//! use fw_model::Program;
//!
//! let program = Program::from_json(r#"{
//!     "classes": [{
//!         "name": "Sample",
//!         "methods": [{
//!             "name": "Run",
//!             "body": {"blocks": [
//!                 {"id": 0, "kind": "entry", "successors": [{"target": 1}]},
//!                 {"id": 1, "kind": "exit"}
//!             ]}
//!         }]
//!     }]
//! }"#)?;
//! assert_eq!(program.classes.len(), 1);
//! # Ok::<(), fw_model::errors::ModelError>(())
//! ```

pub mod body;
pub mod errors;
pub mod operations;
pub mod program;
pub mod types;

pub use crate::body::{BlockId, Body, OperationId};
pub use crate::program::{ClassDef, FieldDef, MethodDef, ParameterDef, Program};
pub use crate::types::TypeName;

use crate::errors::ModelResult;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Opens and validates a program JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or if its content is not a
/// valid program description.
pub fn open<P: AsRef<Path>>(path: P) -> ModelResult<Program> {
    log::debug!("opening program {}", path.as_ref().display());
    let file = File::open(path)?;
    Program::from_reader(BufReader::new(file))
}
