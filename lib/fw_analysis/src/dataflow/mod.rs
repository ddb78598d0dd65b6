//! Generic forward dataflow machinery: lattice toolkit and worklist engine.

pub mod forward;
pub mod lattice;

pub use forward::{forward, OperationVisitor};
pub use lattice::{AbstractState, AbstractValue, AnalysisData, KeyedValue};

use fw_model::{BlockId, OperationId};
use std::collections::BTreeMap;

/// States computed by a fixed point. Unreachable blocks and operations
/// have no state (bottom).
#[derive(Debug, Clone)]
pub struct Dataflow<S> {
    pub entries: BTreeMap<BlockId, S>,
    pub exits: BTreeMap<BlockId, S>,
    pub operations: BTreeMap<OperationId, S>,
}

impl<S> Dataflow<S> {
    #[inline]
    pub fn entry_state(&self, block: BlockId) -> Option<&S> {
        self.entries.get(&block)
    }

    #[inline]
    pub fn exit_state(&self, block: BlockId) -> Option<&S> {
        self.exits.get(&block)
    }

    /// The state holding right before an operation.
    #[inline]
    pub fn state_before(&self, operation: OperationId) -> Option<&S> {
        self.operations.get(&operation)
    }

    #[inline]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.exits.contains_key(&block)
    }
}
