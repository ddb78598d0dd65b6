use crate::cancel::CancellationToken;
use crate::controlflow::Cfg;
use crate::dataflow::lattice::AbstractState;
use crate::dataflow::Dataflow;
use crate::errors::AnalysisResult;
use fixedbitset::FixedBitSet;
use fw_model::body::Branch;
use fw_model::operations::Operation;
use fw_model::{BlockId, OperationId};
use petgraph::graph::NodeIndex;
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::Direction;
use std::collections::{BTreeMap, VecDeque};

/// Transfer functions of a forward analysis.
pub trait OperationVisitor<'a> {
    type State: AbstractState;

    fn visit_operation(
        &mut self,
        state: &mut Self::State,
        id: OperationId,
        operation: &'a Operation,
    ) -> AnalysisResult<()>;

    /// Refines `state` along an edge leaving block `from`. Returns `false`
    /// when the edge cannot be taken from this state.
    fn visit_branch(
        &mut self,
        _state: &mut Self::State,
        _from: BlockId,
        _branch: &'a Branch,
    ) -> AnalysisResult<bool> {
        Ok(true)
    }
}

/// Computes the forward fixed point of a visitor over a control flow graph,
/// starting with `seed` at the entry block.
///
/// Blocks are first visited in reverse postorder. A block is visited again
/// only when its entry state changed, and its successors are queued only
/// when its exit state changed. Blocks that cannot be reached (or only
/// through infeasible edges) get no state at all.
///
/// # Errors
///
/// Propagates visitor errors, and returns [`crate::AnalysisError::Cancelled`]
/// as soon as cancellation is requested.
pub fn forward<'a, V>(
    cfg: &Cfg<'a>,
    seed: V::State,
    visitor: &mut V,
    cancel: &CancellationToken,
) -> AnalysisResult<Dataflow<V::State>>
where
    V: OperationVisitor<'a>,
{
    let graph = &cfg.inner;
    let entry = cfg.entry_index();

    let mut inputs: BTreeMap<NodeIndex, V::State> = BTreeMap::new();
    let mut outputs: BTreeMap<NodeIndex, V::State> = BTreeMap::new();
    let mut operations = BTreeMap::new();

    let mut worklist = VecDeque::new();
    let mut queued = FixedBitSet::with_capacity(graph.node_count());
    let mut postorder = DfsPostOrder::new(graph, entry);
    while let Some(id) = postorder.next(graph) {
        worklist.push_back(id);
        queued.insert(id.index());
    }

    let mut visits = 0_usize;
    while let Some(id) = worklist.pop_back() {
        cancel.check()?;
        queued.set(id.index(), false);
        visits += 1;

        let block = &graph[id];
        log::debug!("    ---- block@{}", block.id());

        let input = if id == entry {
            Some(seed.clone())
        } else {
            let mut input: Option<V::State> = None;
            for edge in graph.edges_directed(id, Direction::Incoming) {
                let Some(pred_output) = outputs.get(&edge.source()) else {
                    continue;
                };
                let mut incoming = pred_output.clone();
                let from = graph[edge.source()].id();
                if !visitor.visit_branch(&mut incoming, from, *edge.weight())? {
                    log::trace!("    -- infeasible edge {} -> {}", from, block.id());
                    continue;
                }
                match &mut input {
                    Some(acc) => acc.join(&incoming),
                    None => input = Some(incoming),
                }
            }
            input
        };

        let Some(input) = input else {
            log::debug!("    -- no feasible predecessor yet");
            continue;
        };
        if inputs.get(&id) == Some(&input) {
            log::debug!("    -- entry state unchanged");
            continue;
        }
        log::trace!("    entry state:\n{input}");

        let mut state = input.clone();
        inputs.insert(id, input);
        for (op_id, operation) in block.operations() {
            operations.insert(op_id, state.clone());
            log::trace!("visit_operation( {operation} )");
            visitor.visit_operation(&mut state, op_id, operation)?;
            log::trace!("    after:\n{state}");
        }

        if outputs.get(&id) != Some(&state) {
            for edge in graph.edges_directed(id, Direction::Outgoing) {
                let target = edge.target();
                if !queued.contains(target.index()) {
                    queued.insert(target.index());
                    worklist.push_front(target);
                }
            }
            outputs.insert(id, state);
        }
    }
    log::debug!("fixed point reached after {visits} block visits");

    Ok(Dataflow {
        entries: inputs
            .into_iter()
            .map(|(id, state)| (graph[id].id(), state))
            .collect(),
        exits: outputs
            .into_iter()
            .map(|(id, state)| (graph[id].id(), state))
            .collect(),
        operations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AnalysisError;
    use crate::testing::*;
    use fw_model::body::Comp;
    use fw_model::operations::{Literal, Operand, OperationKind};
    use fw_model::Body;
    use std::collections::BTreeSet;
    use std::fmt;

    /// Set of locals assigned on some path.
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct Assigned(BTreeSet<u32>);

    impl AbstractState for Assigned {
        fn join(&mut self, other: &Self) {
            self.0.extend(other.0.iter().copied());
        }
    }

    impl fmt::Display for Assigned {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    #[derive(Default)]
    struct Collector {
        history: Vec<(OperationId, Assigned)>,
    }

    impl<'a> OperationVisitor<'a> for Collector {
        type State = Assigned;

        fn visit_operation(
            &mut self,
            state: &mut Assigned,
            id: OperationId,
            operation: &'a Operation,
        ) -> AnalysisResult<()> {
            if let OperationKind::Assign {
                target: Operand::Local(local),
                ..
            } = &operation.kind
            {
                state.0.insert(local.0);
            }
            self.history.push((id, state.clone()));
            Ok(())
        }

        fn visit_branch(
            &mut self,
            _state: &mut Assigned,
            _from: BlockId,
            branch: &'a Branch,
        ) -> AnalysisResult<bool> {
            // Only literal comparisons are decided.
            if let Some((
                Operand::Literal(Literal::Int(l)),
                comp,
                Operand::Literal(Literal::Int(r)),
            )) = branch.assumption()
            {
                return Ok(comp.holds(l.cmp(r)));
            }
            Ok(true)
        }
    }

    fn looping() -> Body {
        body(vec![
            entry(0, vec![seq(1)]),
            block(1, vec![assign(local(0), use_(int(0)))], vec![seq(2)]),
            block(
                2,
                vec![assign(local(1), use_(local(0)))],
                vec![
                    if_true(3, cond(local(1), Comp::Lt, int(10))),
                    if_false(4, cond(local(1), Comp::Lt, int(10))),
                ],
            ),
            block(3, vec![assign(local(2), use_(local(1)))], vec![seq(2)]),
            block(4, vec![ret(None)], vec![seq(5)]),
            exit(5),
            block(6, vec![assign(local(9), use_(int(1)))], vec![seq(5)]),
        ])
    }

    #[test]
    fn loop_reaches_fixed_point() {
        let body = looping();
        let cfg = Cfg::build(&body);
        let mut collector = Collector::default();
        let result = forward(
            &cfg,
            Assigned::default(),
            &mut collector,
            &CancellationToken::new(),
        )
        .unwrap();
        let exit = result.exit_state(BlockId(5)).unwrap();
        assert_eq!(exit.0, [0, 1, 2].into_iter().collect());
        let header = result.entry_state(BlockId(2)).unwrap();
        assert!(header.0.contains(&2));
    }

    #[test]
    fn unreachable_block_stays_bottom() {
        let body = looping();
        let cfg = Cfg::build(&body);
        let result = forward(
            &cfg,
            Assigned::default(),
            &mut Collector::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(!result.is_reachable(BlockId(6)));
        assert!(result.exit_state(BlockId(6)).is_none());
        assert!(result
            .state_before(OperationId::new(BlockId(6), 0))
            .is_none());
        assert!(!result.exit_state(BlockId(5)).unwrap().0.contains(&9));
    }

    #[test]
    fn infeasible_edge_is_not_taken() {
        let body = body(vec![
            entry(0, vec![seq(1)]),
            block(
                1,
                vec![],
                vec![
                    if_true(2, cond(int(1), Comp::Eq, int(0))),
                    if_false(3, cond(int(1), Comp::Eq, int(0))),
                ],
            ),
            block(2, vec![assign(local(7), use_(int(7)))], vec![seq(4)]),
            block(3, vec![assign(local(8), use_(int(8)))], vec![seq(4)]),
            exit(4),
        ]);
        let cfg = Cfg::build(&body);
        let result = forward(
            &cfg,
            Assigned::default(),
            &mut Collector::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(!result.is_reachable(BlockId(2)));
        assert_eq!(
            result.exit_state(BlockId(4)).unwrap().0,
            [8].into_iter().collect()
        );
    }

    #[test]
    fn states_are_monotone_and_deterministic() {
        let body = looping();
        let cfg = Cfg::build(&body);
        let mut first = Collector::default();
        let r1 = forward(&cfg, Assigned::default(), &mut first, &CancellationToken::new()).unwrap();
        let mut second = Collector::default();
        let r2 = forward(&cfg, Assigned::default(), &mut second, &CancellationToken::new()).unwrap();
        assert_eq!(r1.exits, r2.exits);
        assert_eq!(r1.operations, r2.operations);
        assert_eq!(first.history, second.history);

        let mut last: BTreeMap<OperationId, Assigned> = BTreeMap::new();
        for (id, state) in first.history {
            if let Some(previous) = last.get(&id) {
                assert!(previous.0.is_subset(&state.0), "state of {id} shrank");
            }
            last.insert(id, state);
        }
    }

    #[test]
    fn operation_states() {
        let body = straight(vec![
            assign(local(0), use_(int(0))),
            assign(local(1), use_(int(1))),
        ]);
        let cfg = Cfg::build(&body);
        let result = forward(
            &cfg,
            Assigned::default(),
            &mut Collector::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        let before_second = result.state_before(OperationId::new(BlockId(1), 1)).unwrap();
        assert_eq!(before_second.0, [0].into_iter().collect());
    }

    #[test]
    fn cancellation_stops_the_computation() {
        let body = looping();
        let cfg = Cfg::build(&body);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = forward(&cfg, Assigned::default(), &mut Collector::default(), &cancel)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
    }
}
