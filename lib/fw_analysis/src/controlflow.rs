//! Control flow graph representation.
//!
//! Blocks are stored in a petgraph arena and designated by their
//! [`BlockId`]; edges carry the [`Branch`] that is taken. A graph is built
//! once per method body and never mutated afterwards.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::repo::Method;
use fw_model::body::{BlockDescr, BlockKind, Branch};
use fw_model::operations::{Operation, OperationKind};
use fw_model::{BlockId, Body, OperationId};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write;

/// Branch of the edges added from returning blocks without successors to
/// the exit block.
static IMPLICIT_RETURN: Branch = Branch::Return;

#[derive(Debug)]
pub struct Block<'a> {
    descr: &'a BlockDescr,
}

impl<'a> fmt::Display for Block<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.descr.kind {
            BlockKind::Entry => writeln!(f, "{} <ENTRY>", self.descr.id)?,
            BlockKind::Exit => writeln!(f, "{} <EXIT>", self.descr.id)?,
            BlockKind::Block => writeln!(f, "{}", self.descr.id)?,
        }
        for (id, op) in self.operations() {
            writeln!(f, "{:>8}: {op}", id.to_string())?;
        }
        Ok(())
    }
}

impl<'a> Block<'a> {
    #[inline]
    pub fn id(&self) -> BlockId {
        self.descr.id
    }

    #[inline]
    pub fn kind(&self) -> BlockKind {
        self.descr.kind
    }

    #[inline]
    pub fn operations(&self) -> impl Iterator<Item = (OperationId, &'a Operation)> {
        self.descr.iter_operations()
    }

    #[inline]
    pub fn nb_operations(&self) -> usize {
        self.descr.operations.len()
    }
}

#[derive(Debug)]
pub struct Cfg<'a> {
    pub(crate) inner: DiGraph<Block<'a>, &'a Branch>,
    node_ids: BTreeMap<BlockId, NodeIndex>,
    entry: NodeIndex,
    exit: NodeIndex,
}

impl<'a> Cfg<'a> {
    /// Builds the graph of a method body.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NoCode`] for abstract and external methods.
    pub fn for_method(method: &Method<'a>) -> AnalysisResult<Self> {
        let body = method.body().ok_or(AnalysisError::NoCode)?;
        Ok(Self::build(body))
    }

    /// Builds the graph of a body.
    ///
    /// # Panics
    ///
    /// Panics if the body does not have exactly one entry and one exit
    /// block, has duplicated block ids, or has edges to unknown blocks.
    /// Blocks without successors that end with a `return` fall through to
    /// the exit block.
    /// Bodies loaded through `fw_model` are validated beforehand, so this
    /// only happens on bodies built by hand.
    #[must_use]
    pub fn build(body: &'a Body) -> Self {
        let mut inner = DiGraph::new();
        let mut node_ids = BTreeMap::new();
        let mut entry = None;
        let mut exit = None;

        for descr in &body.blocks {
            let id = inner.add_node(Block { descr });
            assert!(
                node_ids.insert(descr.id, id).is_none(),
                "malformed control flow graph: duplicate block {}",
                descr.id
            );
            let slot = match descr.kind {
                BlockKind::Entry => &mut entry,
                BlockKind::Exit => &mut exit,
                BlockKind::Block => continue,
            };
            assert!(
                slot.replace(id).is_none(),
                "malformed control flow graph: several {:?} blocks",
                descr.kind
            );
        }

        for descr in &body.blocks {
            let src = node_ids[&descr.id];
            for edge in &descr.successors {
                let dst = node_ids.get(&edge.target).unwrap_or_else(|| {
                    panic!(
                        "malformed control flow graph: dangling edge {} -> {}",
                        descr.id, edge.target
                    )
                });
                inner.add_edge(src, *dst, &edge.branch);
            }
        }

        let exit = exit.expect("malformed control flow graph: missing exit block");
        for descr in &body.blocks {
            let returns = matches!(
                descr.operations.last().map(|op| &op.kind),
                Some(OperationKind::Return { .. })
            );
            if descr.kind != BlockKind::Exit && descr.successors.is_empty() && returns {
                inner.add_edge(node_ids[&descr.id], exit, &IMPLICIT_RETURN);
            }
        }

        Self {
            inner,
            node_ids,
            entry: entry.expect("malformed control flow graph: missing entry block"),
            exit,
        }
    }

    #[inline]
    pub(crate) fn entry_index(&self) -> NodeIndex {
        self.entry
    }

    #[inline]
    pub fn entry(&self) -> BlockId {
        self.inner[self.entry].id()
    }

    #[inline]
    pub fn exit(&self) -> BlockId {
        self.inner[self.exit].id()
    }

    /// # Panics
    ///
    /// Panics if the block does not belong to this graph.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block<'a> {
        &self.inner[self.node_ids[&id]]
    }

    /// Iterates over blocks, ordered by id.
    pub fn blocks(&self) -> impl Iterator<Item = &Block<'a>> {
        self.node_ids.values().map(move |id| &self.inner[*id])
    }

    #[inline]
    pub fn nb_blocks(&self) -> usize {
        self.inner.node_count()
    }

    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = (BlockId, &'a Branch)> + '_ {
        self.inner
            .edges_directed(self.node_ids[&id], Direction::Outgoing)
            .map(move |edge| (self.inner[edge.target()].id(), *edge.weight()))
    }

    pub fn predecessors(&self, id: BlockId) -> impl Iterator<Item = (BlockId, &'a Branch)> + '_ {
        self.inner
            .edges_directed(self.node_ids[&id], Direction::Incoming)
            .map(move |edge| (self.inner[edge.source()].id(), *edge.weight()))
    }

    /// Returns the blocks that can be reached from the entry block.
    #[must_use]
    pub fn reachable_blocks(&self) -> BTreeSet<BlockId> {
        let mut reachable = BTreeSet::new();
        let mut dfs = Dfs::new(&self.inner, self.entry);
        while let Some(id) = dfs.next(&self.inner) {
            reachable.insert(self.inner[id].id());
        }
        reachable
    }

    /// Finds an operation by its positional identifier.
    #[must_use]
    pub fn operation(&self, id: OperationId) -> Option<&'a Operation> {
        let node = self.node_ids.get(&id.block)?;
        self.inner[*node].descr.operations.get(id.index as usize)
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  nodesep=1;\n");
        let _ = write!(
            res,
            "{}",
            Dot::with_attr_getters(
                &self.inner,
                &[Config::GraphContentOnly, Config::EdgeNoLabel],
                &|_, edge| {
                    let color = match edge.weight() {
                        Branch::IfTrue(_) => "green",
                        Branch::IfFalse(_) => "red",
                        Branch::Jmp => "blue",
                        Branch::Return => "orchid",
                        Branch::Sequence => "black",
                    };
                    format!(
                        "color={},xlabel=\"{}\"",
                        color,
                        edge.weight().to_string().replace('"', "\\\"")
                    )
                },
                &|_, (_, block)| match block.kind() {
                    BlockKind::Entry | BlockKind::Exit => String::from("shape=box,color=blue"),
                    BlockKind::Block => String::from("shape=box,color=black"),
                }
            )
        );
        res.push('}');
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use fw_model::body::Comp;

    fn diamond() -> Body {
        body(vec![
            entry(0, vec![seq(1)]),
            block(
                1,
                vec![assign(local(0), use_(param(0)))],
                vec![
                    if_true(2, cond(local(0), Comp::Eq, null())),
                    if_false(3, cond(local(0), Comp::Eq, null())),
                ],
            ),
            block(2, vec![], vec![seq(4)]),
            block(3, vec![], vec![seq(4)]),
            exit(4),
            block(5, vec![], vec![seq(4)]),
        ])
    }

    #[test]
    fn build_diamond() {
        let body = diamond();
        let cfg = Cfg::build(&body);
        assert_eq!(cfg.entry(), BlockId(0));
        assert_eq!(cfg.exit(), BlockId(4));
        assert_eq!(cfg.nb_blocks(), 6);
        assert_eq!(cfg.successors(BlockId(1)).count(), 2);
        let mut preds: Vec<_> = cfg.predecessors(BlockId(4)).map(|(id, _)| id).collect();
        preds.sort();
        assert_eq!(preds, vec![BlockId(2), BlockId(3), BlockId(5)]);
        assert_eq!(cfg.block(BlockId(1)).nb_operations(), 1);
    }

    #[test]
    fn unreachable_blocks() {
        let body = diamond();
        let cfg = Cfg::build(&body);
        let reachable = cfg.reachable_blocks();
        assert!(reachable.contains(&BlockId(4)));
        assert!(!reachable.contains(&BlockId(5)));
    }

    #[test]
    fn dot_output() {
        let body = diamond();
        let dot = Cfg::build(&body).to_dot();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("color=green"));
        assert!(dot.ends_with('}'));
    }

    #[test]
    fn returning_blocks_reach_exit() {
        let body = body(vec![
            entry(0, vec![seq(1)]),
            block(1, vec![ret(None)], vec![]),
            block(2, vec![throw(null())], vec![]),
            exit(3),
        ]);
        let cfg = Cfg::build(&body);
        let succs: Vec<_> = cfg.successors(BlockId(1)).collect();
        assert_eq!(succs, vec![(BlockId(3), &Branch::Return)]);
        assert_eq!(cfg.successors(BlockId(2)).count(), 0);
        assert!(cfg.reachable_blocks().contains(&BlockId(3)));
    }

    #[test]
    #[should_panic(expected = "dangling edge")]
    fn dangling_edge_panics() {
        let body = body(vec![entry(0, vec![seq(9)]), exit(1)]);
        let _ = Cfg::build(&body);
    }

    #[test]
    #[should_panic(expected = "missing exit block")]
    fn missing_exit_panics() {
        let body = body(vec![entry(0, vec![])]);
        let _ = Cfg::build(&body);
    }
}
