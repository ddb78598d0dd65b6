//! Method bodies: basic blocks and the edges between them.

use crate::errors::{ModelError, ModelResult};
use crate::operations::{LocalId, Operand, Operation, OperationKind};
use crate::types::TypeName;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Positional identity of an operation inside a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId {
    pub block: BlockId,
    pub index: u32,
}

impl OperationId {
    #[must_use]
    pub const fn new(block: BlockId, index: u32) -> Self {
        Self { block, index }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.block, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Entry,
    Exit,
    #[default]
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comp {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Comp {
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Ge => Self::Lt,
            Self::Gt => Self::Le,
            Self::Le => Self::Gt,
        }
    }

    /// The comparison obtained by swapping its operands.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Eq | Self::Ne => self,
            Self::Lt => Self::Gt,
            Self::Gt => Self::Lt,
            Self::Le => Self::Ge,
            Self::Ge => Self::Le,
        }
    }

    #[must_use]
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Ge => ordering != Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for Comp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
        };
        write!(f, "{symbol}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub left: Operand,
    pub comp: Comp,
    pub right: Operand,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.comp, self.right)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    #[default]
    Sequence,
    Jmp,
    Return,
    IfTrue(Condition),
    IfFalse(Condition),
}

impl Branch {
    /// The comparison that holds when this edge is taken, if any.
    #[must_use]
    pub fn assumption(&self) -> Option<(&Operand, Comp, &Operand)> {
        match self {
            Self::IfTrue(cond) => Some((&cond.left, cond.comp, &cond.right)),
            Self::IfFalse(cond) => Some((&cond.left, cond.comp.negate(), &cond.right)),
            Self::Sequence | Self::Jmp | Self::Return => None,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "<seq>"),
            Self::Jmp => write!(f, "<jmp>"),
            Self::Return => write!(f, "<return>"),
            Self::IfTrue(cond) => write!(f, "<{cond}>"),
            Self::IfFalse(cond) => write!(f, "<!({cond})>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub target: BlockId,
    #[serde(default)]
    pub branch: Branch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescr {
    pub id: BlockId,
    #[serde(default)]
    pub kind: BlockKind,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub successors: Vec<Edge>,
}

impl BlockDescr {
    /// Iterates over the operations with their positional identifiers.
    pub fn iter_operations(&self) -> impl Iterator<Item = (OperationId, &Operation)> {
        let block = self.id;
        self.operations
            .iter()
            .zip(0u32..)
            .map(move |(op, index)| (OperationId::new(block, index), op))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub id: LocalId,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub locals: Vec<LocalDecl>,
    pub blocks: Vec<BlockDescr>,
}

impl Body {
    #[must_use]
    pub fn entry(&self) -> Option<&BlockDescr> {
        self.blocks.iter().find(|b| b.kind == BlockKind::Entry)
    }

    #[must_use]
    pub fn exit(&self) -> Option<&BlockDescr> {
        self.blocks.iter().find(|b| b.kind == BlockKind::Exit)
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BlockDescr> {
        self.blocks.iter().find(|b| b.id == id)
    }

    #[must_use]
    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.block(id.block)?.operations.get(id.index as usize)
    }

    /// Checks that the body describes a well-formed control flow graph.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidBody`] describing the first violation found:
    /// entry or exit block missing or duplicated, duplicated block ids, edges
    /// leading to unknown blocks, edges leaving the exit block or reaching the
    /// entry block, non-exit blocks without successors that do not end with a
    /// `return` or a `throw`, and assignments to non-place operands.
    pub fn validate(&self, method: &str) -> ModelResult<()> {
        let invalid = |reason: String| ModelError::InvalidBody {
            method: method.to_string(),
            reason,
        };

        let mut ids = BTreeSet::new();
        let mut kinds = BTreeMap::new();
        for block in &self.blocks {
            if !ids.insert(block.id) {
                return Err(invalid(format!("duplicate block {}", block.id)));
            }
            kinds.insert(block.id, block.kind);
        }

        let count = |kind| self.blocks.iter().filter(|b| b.kind == kind).count();
        match count(BlockKind::Entry) {
            1 => (),
            0 => return Err(invalid("missing entry block".to_string())),
            n => return Err(invalid(format!("{n} entry blocks"))),
        }
        match count(BlockKind::Exit) {
            1 => (),
            0 => return Err(invalid("missing exit block".to_string())),
            n => return Err(invalid(format!("{n} exit blocks"))),
        }

        for block in &self.blocks {
            if block.kind == BlockKind::Exit && !block.successors.is_empty() {
                return Err(invalid(format!("exit block {} has successors", block.id)));
            }
            for edge in &block.successors {
                match kinds.get(&edge.target) {
                    None => {
                        return Err(invalid(format!(
                            "dangling edge {} -> {}",
                            block.id, edge.target
                        )))
                    }
                    Some(BlockKind::Entry) => {
                        return Err(invalid(format!(
                            "edge {} -> {} reaches the entry block",
                            block.id, edge.target
                        )))
                    }
                    Some(_) => (),
                }
            }
            if block.kind != BlockKind::Exit
                && block.successors.is_empty()
                && !block.operations.last().map_or(false, Operation::is_terminal)
            {
                return Err(invalid(format!(
                    "block {} has no successor and does not return nor throw",
                    block.id
                )));
            }
            for (id, op) in block.iter_operations() {
                if let OperationKind::Assign { target, .. } = &op.kind {
                    if !target.is_place() {
                        return Err(invalid(format!("{id}: cannot assign to {target}")));
                    }
                }
            }
        }

        Ok(())
    }
}
