//! Wrappers over `fw_model` raw definitions (classes, methods, fields)
//! to give them an identity and store them in the repository.

mod class;
mod field;
mod method;
mod repository;
mod uids;

pub use class::Class;
pub use field::Field;
pub use method::{Method, MethodDescr};
pub use repository::Repo;
pub use uids::{ClassUid, FieldUid, MethodUid, RepoCounters};
