//! Value content analysis: the literal values an entity may hold.
//!
//! Besides constant folding, the results decide which branches can be
//! taken: an edge whose condition cannot hold on literal values is
//! infeasible, and the other analyses skip it.

use crate::cache::ResultCache;
use crate::config::AnalysisKind;
use crate::copy::{copies_of, CopyResult, CopyState};
use crate::dataflow::{
    forward, AbstractValue, AnalysisData, Dataflow, KeyedValue, OperationVisitor,
};
use crate::entity::{AnalysisEntity, Frame, ParamSlot};
use crate::errors::AnalysisResult;
use crate::interprocedural::{forget_escaping, splice_entities, ArgumentValues, Substitution};
use crate::points_to::{
    self, argument_values, constructor_ref, escaping_locations, place_entity, PointsToResult,
    PointsToState, PointsToValue, Targets,
};
use crate::session::{Analysis, AnalysisContext, AnalysisKey, SessionCaches};
use fw_model::body::{Branch, Comp};
use fw_model::operations::{
    BinaryOp, Literal, MethodRef, Operand, Operation, OperationKind, UnaryOp, Value,
};
use fw_model::{BlockId, OperationId};
use std::collections::BTreeSet;
use std::fmt;
use std::mem;
use std::sync::Arc;

/// Above this number of literals, a value is widened to unknown.
pub const MAX_LITERALS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueContentValue {
    Bottom,
    Literals(BTreeSet<Literal>),
    Unknown,
}

impl fmt::Display for ValueContentValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bottom => write!(f, "⊥"),
            Self::Literals(literals) => {
                let literals = literals
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{literals}}}")
            }
            Self::Unknown => write!(f, "⊤"),
        }
    }
}

impl ValueContentValue {
    #[must_use]
    pub fn literal(literal: Literal) -> Self {
        let mut literals = BTreeSet::new();
        literals.insert(literal);
        Self::Literals(literals)
    }

    #[must_use]
    pub fn from_set(literals: BTreeSet<Literal>) -> Self {
        if literals.is_empty() {
            Self::Bottom
        } else if literals.len() > MAX_LITERALS {
            Self::Unknown
        } else {
            Self::Literals(literals)
        }
    }

    pub fn literals(&self) -> Option<&BTreeSet<Literal>> {
        match self {
            Self::Literals(literals) => Some(literals),
            Self::Bottom | Self::Unknown => None,
        }
    }

    /// The value, if it is known to be a single literal.
    pub fn single(&self) -> Option<&Literal> {
        self.literals()
            .filter(|literals| literals.len() == 1)
            .and_then(|literals| literals.iter().next())
    }
}

impl AbstractValue for ValueContentValue {
    fn bottom() -> Self {
        Self::Bottom
    }

    fn unknown() -> Self {
        Self::Unknown
    }

    fn merge(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::Bottom, v) | (v, Self::Bottom) => v.clone(),
            (Self::Literals(l1), Self::Literals(l2)) => {
                Self::from_set(l1.union(l2).cloned().collect())
            }
        }
    }
}

impl KeyedValue<AnalysisEntity> for ValueContentValue {
    fn absent(key: &AnalysisEntity, _frame: Frame) -> Self {
        match key {
            AnalysisEntity::Return => Self::Bottom,
            _ => Self::Unknown,
        }
    }
}

pub type ValueContentState = AnalysisData<AnalysisEntity, ValueContentValue>;

/// Decides a comparison between two literals. Literals of different kinds
/// are never equal and cannot be ordered.
fn compare(comp: Comp, left: &Literal, right: &Literal) -> Option<bool> {
    if mem::discriminant(left) == mem::discriminant(right) {
        Some(comp.holds(left.cmp(right)))
    } else {
        match comp {
            Comp::Eq => Some(false),
            Comp::Ne => Some(true),
            Comp::Lt | Comp::Le | Comp::Gt | Comp::Ge => None,
        }
    }
}

fn fold_binary(op: BinaryOp, left: &Literal, right: &Literal) -> Option<Literal> {
    let comparison = |comp| compare(comp, left, right).map(Literal::Bool);
    match (op, left, right) {
        (BinaryOp::Add, Literal::Int(a), Literal::Int(b)) => a.checked_add(*b).map(Literal::Int),
        (BinaryOp::Sub, Literal::Int(a), Literal::Int(b)) => a.checked_sub(*b).map(Literal::Int),
        (BinaryOp::Mul, Literal::Int(a), Literal::Int(b)) => a.checked_mul(*b).map(Literal::Int),
        (BinaryOp::Div, Literal::Int(a), Literal::Int(b)) => a.checked_div(*b).map(Literal::Int),
        (BinaryOp::Rem, Literal::Int(a), Literal::Int(b)) => a.checked_rem(*b).map(Literal::Int),
        (BinaryOp::Add, Literal::Str(a), Literal::Str(b)) => Some(Literal::Str(format!("{a}{b}"))),
        (BinaryOp::And, Literal::Bool(a), Literal::Bool(b)) => Some(Literal::Bool(*a && *b)),
        (BinaryOp::Or, Literal::Bool(a), Literal::Bool(b)) => Some(Literal::Bool(*a || *b)),
        (BinaryOp::Eq, _, _) => comparison(Comp::Eq),
        (BinaryOp::Ne, _, _) => comparison(Comp::Ne),
        (BinaryOp::Lt, _, _) => comparison(Comp::Lt),
        (BinaryOp::Le, _, _) => comparison(Comp::Le),
        (BinaryOp::Gt, _, _) => comparison(Comp::Gt),
        (BinaryOp::Ge, _, _) => comparison(Comp::Ge),
        _ => None,
    }
}

fn fold_unary(op: UnaryOp, operand: &Literal) -> Option<Literal> {
    match (op, operand) {
        (UnaryOp::Not, Literal::Bool(b)) => Some(Literal::Bool(!b)),
        (UnaryOp::Neg, Literal::Int(i)) => i.checked_neg().map(Literal::Int),
        _ => None,
    }
}

/// Collects folded literals. A single combination that cannot be folded
/// makes the result unknown.
fn fold(combinations: impl Iterator<Item = Option<Literal>>) -> ValueContentValue {
    combinations
        .collect::<Option<BTreeSet<_>>>()
        .map_or(ValueContentValue::Unknown, ValueContentValue::from_set)
}

#[must_use]
pub fn binary(op: BinaryOp, left: &ValueContentValue, right: &ValueContentValue) -> ValueContentValue {
    use ValueContentValue::{Bottom, Literals};
    match (left, right) {
        (Bottom, _) | (_, Bottom) => Bottom,
        (Literals(ls), Literals(rs)) if ls.len() * rs.len() <= MAX_LITERALS => fold(
            ls.iter()
                .flat_map(|l| rs.iter().map(move |r| fold_binary(op, l, r))),
        ),
        _ => ValueContentValue::Unknown,
    }
}

#[must_use]
pub fn unary(op: UnaryOp, operand: &ValueContentValue) -> ValueContentValue {
    match operand {
        ValueContentValue::Literals(literals) => {
            fold(literals.iter().map(|literal| fold_unary(op, literal)))
        }
        other => other.clone(),
    }
}

/// The value of an operand. Fields are resolved with the points-to state
/// of the same program point.
#[must_use]
pub fn evaluate(
    state: &ValueContentState,
    points_to: &PointsToState,
    operand: &Operand,
) -> ValueContentValue {
    match operand {
        Operand::Literal(literal) => ValueContentValue::literal(literal.clone()),
        Operand::Field { .. } => {
            let targets = Targets::of(points_to, operand);
            if targets.is_empty() {
                return ValueContentValue::Unknown;
            }
            targets
                .entities
                .iter()
                .map(|entity| state.get(entity))
                .fold(ValueContentValue::Bottom, |acc, v| acc.merge(&v))
        }
        _ => place_entity(operand).map_or(ValueContentValue::Unknown, |entity| state.get(&entity)),
    }
}

/// Refines a state with the assumption of a branch. Returns `false` when
/// the branch condition cannot hold.
pub(crate) fn refine(
    state: &mut ValueContentState,
    points_to: &PointsToState,
    copies: Option<&CopyState>,
    branch: &Branch,
) -> bool {
    let Some((left, comp, right)) = branch.assumption() else {
        return true;
    };
    let left_value = evaluate(state, points_to, left);
    let right_value = evaluate(state, points_to, right);
    if let (Some(ls), Some(rs)) = (left_value.literals(), right_value.literals()) {
        let feasible = ls
            .iter()
            .any(|l| rs.iter().any(|r| compare(comp, l, r) != Some(false)));
        if !feasible {
            return false;
        }
    }
    narrow(state, points_to, copies, left, comp, &right_value);
    narrow(state, points_to, copies, right, comp.reverse(), &left_value);
    true
}

/// Keeps the values of `place`, and of its copies, for which `place comp
/// other` may hold.
fn narrow(
    state: &mut ValueContentState,
    points_to: &PointsToState,
    copies: Option<&CopyState>,
    place: &Operand,
    comp: Comp,
    other: &ValueContentValue,
) {
    let Some(others) = other.literals() else {
        return;
    };
    let targets = Targets::of(points_to, place);
    let Some(entity) = targets.single() else {
        return;
    };
    let mut entities = vec![entity.clone()];
    if let Some(copies) = copies {
        entities.extend(copies_of(copies, entity));
    }
    for entity in entities {
        let narrowed = match state.get(&entity) {
            ValueContentValue::Literals(literals) => ValueContentValue::from_set(
                literals
                    .into_iter()
                    .filter(|l| others.iter().any(|o| compare(comp, l, o) != Some(false)))
                    .collect(),
            ),
            ValueContentValue::Unknown if comp == Comp::Eq => {
                ValueContentValue::Literals(others.clone())
            }
            current => current,
        };
        state.set(entity, narrowed);
    }
}

pub struct ValueContentResult {
    frame: Frame,
    exit: BlockId,
    dataflow: Dataflow<ValueContentState>,
    empty: ValueContentState,
    points_to: Arc<PointsToResult>,
    copies: Option<Arc<CopyResult>>,
}

impl ValueContentResult {
    #[inline]
    pub fn dataflow(&self) -> &Dataflow<ValueContentState> {
        &self.dataflow
    }

    #[inline]
    pub fn points_to(&self) -> &PointsToResult {
        &self.points_to
    }

    pub fn state_before(&self, operation: OperationId) -> &ValueContentState {
        self.dataflow
            .state_before(operation)
            .unwrap_or(&self.empty)
    }

    pub fn exit_state(&self) -> Option<&ValueContentState> {
        self.dataflow.exit_state(self.exit)
    }

    #[must_use]
    pub fn value_before(&self, operation: OperationId, operand: &Operand) -> ValueContentValue {
        evaluate(
            self.state_before(operation),
            self.points_to.state_before(operation),
            operand,
        )
    }

    #[must_use]
    pub fn return_value(&self) -> ValueContentValue {
        self.exit_state().map_or(ValueContentValue::Bottom, |state| {
            state.get(&AnalysisEntity::Return)
        })
    }

    /// Whether an edge leaving `block` can be taken. Edges leaving
    /// unreachable blocks never are.
    #[must_use]
    pub fn edge_feasible(&self, block: BlockId, branch: &Branch) -> bool {
        let Some(state) = self.dataflow.exit_state(block) else {
            return false;
        };
        let mut state = state.clone();
        refine(
            &mut state,
            self.points_to.block_exit(block),
            self.copies.as_deref().map(|copies| copies.block_exit(block)),
            branch,
        )
    }
}

impl Analysis for ValueContentResult {
    const KIND: AnalysisKind = AnalysisKind::ValueContent;
    type Entry = ArgumentValues<ValueContentValue>;

    fn cache(caches: &SessionCaches) -> &ResultCache<AnalysisKey<Self::Entry>, Self> {
        &caches.value_content
    }

    fn compute(ctx: &AnalysisContext<'_, '_>, entry: &Self::Entry) -> AnalysisResult<Self> {
        let points_to = ctx.prerequisite::<PointsToResult>()?;
        let copies = if ctx.config().copy {
            Some(ctx.prerequisite::<CopyResult>()?)
        } else {
            None
        };

        let frame = ctx.frame();
        let mut seed = ValueContentState::new(frame);
        for (slot, value) in entry {
            seed.set(AnalysisEntity::Parameter(*slot), value.clone());
        }
        let mut visitor = ValueContentVisitor {
            ctx,
            points_to: Arc::clone(&points_to),
            copies: copies.clone(),
        };
        let dataflow = forward(ctx.cfg(), seed, &mut visitor, ctx.cancellation())?;
        Ok(Self {
            frame,
            exit: ctx.cfg().exit(),
            dataflow,
            empty: ValueContentState::new(frame),
            points_to,
            copies,
        })
    }

    fn frame(&self) -> Frame {
        self.frame
    }
}

struct ValueContentVisitor<'c, 's, 'a> {
    ctx: &'c AnalysisContext<'s, 'a>,
    points_to: Arc<PointsToResult>,
    copies: Option<Arc<CopyResult>>,
}

impl<'c, 's, 'a> OperationVisitor<'a> for ValueContentVisitor<'c, 's, 'a> {
    type State = ValueContentState;

    fn visit_operation(
        &mut self,
        state: &mut ValueContentState,
        id: OperationId,
        operation: &'a Operation,
    ) -> AnalysisResult<()> {
        let points_to_result = Arc::clone(&self.points_to);
        let pts = points_to_result.state_before(id);
        match &operation.kind {
            OperationKind::Assign { target, value } => {
                let targets = Targets::of(pts, target);
                let value = self.value(state, pts, id, value)?;
                targets.write(state, &value);
            }
            OperationKind::Invoke { call } => {
                let receiver = call
                    .instance
                    .as_ref()
                    .map(|instance| points_to::evaluate(pts, instance));
                self.invoke(state, pts, id, &call.callee, receiver, &call.args)?;
            }
            OperationKind::Return { value: Some(value) } => {
                let value = evaluate(state, pts, value);
                state.set(AnalysisEntity::Return, value);
            }
            OperationKind::Return { value: None }
            | OperationKind::Throw { .. }
            | OperationKind::Nop => (),
        }
        Ok(())
    }

    fn visit_branch(
        &mut self,
        state: &mut ValueContentState,
        from: BlockId,
        branch: &'a Branch,
    ) -> AnalysisResult<bool> {
        Ok(refine(
            state,
            self.points_to.block_exit(from),
            self.copies.as_deref().map(|copies| copies.block_exit(from)),
            branch,
        ))
    }
}

impl<'c, 's, 'a> ValueContentVisitor<'c, 's, 'a> {
    fn value(
        &mut self,
        state: &mut ValueContentState,
        pts: &PointsToState,
        id: OperationId,
        value: &Value,
    ) -> AnalysisResult<ValueContentValue> {
        match value {
            Value::Use(operand) => Ok(evaluate(state, pts, operand)),
            Value::New { class, args } => {
                let ctor = constructor_ref(self.ctx.repo(), class, args.len());
                let receiver = PointsToValue::single(self.ctx.creation_location(id));
                self.invoke(state, pts, id, &ctor, Some(receiver), args)?;
                Ok(ValueContentValue::Unknown)
            }
            Value::Invoke(call) => {
                let receiver = call
                    .instance
                    .as_ref()
                    .map(|instance| points_to::evaluate(pts, instance));
                self.invoke(state, pts, id, &call.callee, receiver, &call.args)
            }
            Value::Binary { op, left, right } => Ok(binary(
                *op,
                &evaluate(state, pts, left),
                &evaluate(state, pts, right),
            )),
            Value::Unary { op, operand } => Ok(unary(*op, &evaluate(state, pts, operand))),
        }
    }

    fn invoke(
        &mut self,
        state: &mut ValueContentState,
        pts: &PointsToState,
        id: OperationId,
        callee: &MethodRef,
        receiver: Option<PointsToValue>,
        args: &[Operand],
    ) -> AnalysisResult<ValueContentValue> {
        let entry = if self.ctx.is_context_sensitive() {
            args.iter()
                .enumerate()
                .map_while(|(i, arg)| Some((ParamSlot::index(i)?, evaluate(state, pts, arg))))
                .filter(|(_, value)| !value.is_unknown())
                .collect()
        } else {
            ArgumentValues::new()
        };
        let arg_locations = argument_values(pts, args);

        match self
            .ctx
            .analyze_callee::<ValueContentResult>(id, callee, entry)?
        {
            Some(callee) => {
                let subst = Substitution::new(callee.result.frame, pts, receiver, arg_locations);
                Ok(splice_entities(
                    state,
                    callee.result.exit_state(),
                    callee.points_to.exit_state(),
                    &subst,
                ))
            }
            None => {
                if self.ctx.is_pessimistic(AnalysisKind::ValueContent) {
                    let escaping = escaping_locations(receiver.iter().chain(&arg_locations));
                    forget_escaping(state, escaping.as_ref());
                }
                Ok(ValueContentValue::Unknown)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, InterproceduralAnalysisKind, PessimisticMode};
    use crate::dataflow::lattice::check_lattice_laws;
    use crate::repo::Repo;
    use crate::session::AnalysisSession;
    use crate::testing::*;

    fn ints(values: &[i64]) -> ValueContentValue {
        ValueContentValue::from_set(values.iter().copied().map(Literal::Int).collect())
    }

    fn binop(op: BinaryOp, left: Operand, right: Operand) -> Value {
        Value::Binary { op, left, right }
    }

    fn single_method(params: &[(&str, &str)], body: fw_model::Body) -> fw_model::Program {
        program(vec![class(
            "C",
            &[],
            &[("f", "int")],
            vec![method("m", params, Some(body))],
        )])
    }

    #[test]
    fn lattice_laws() {
        check_lattice_laws(&[
            ValueContentValue::Bottom,
            ValueContentValue::Unknown,
            ints(&[1]),
            ints(&[1, 2]),
            ValueContentValue::literal(Literal::Str("a".to_string())),
            ValueContentValue::literal(Literal::Null),
        ]);
    }

    #[test]
    fn widening() {
        let values: Vec<i64> = (0..=MAX_LITERALS as i64).collect();
        assert_eq!(ints(&values), ValueContentValue::Unknown);
        let value = values
            .iter()
            .map(|i| ints(&[*i]))
            .fold(ValueContentValue::Bottom, |acc, v| acc.merge(&v));
        assert_eq!(value, ValueContentValue::Unknown);
    }

    #[test]
    fn folding() {
        assert_eq!(binary(BinaryOp::Add, &ints(&[1, 2]), &ints(&[10])), ints(&[11, 12]));
        assert_eq!(
            binary(BinaryOp::Lt, &ints(&[1]), &ints(&[2])),
            ValueContentValue::literal(Literal::Bool(true))
        );
        assert_eq!(
            binary(BinaryOp::Div, &ints(&[1]), &ints(&[0])),
            ValueContentValue::Unknown
        );
        assert_eq!(
            binary(BinaryOp::Add, &ints(&[i64::MAX]), &ints(&[1])),
            ValueContentValue::Unknown
        );
        assert_eq!(
            binary(
                BinaryOp::Eq,
                &ValueContentValue::literal(Literal::Null),
                &ints(&[0])
            ),
            ValueContentValue::literal(Literal::Bool(false))
        );
        assert_eq!(
            binary(BinaryOp::Add, &ints(&[1]), &ValueContentValue::Unknown),
            ValueContentValue::Unknown
        );
        assert_eq!(
            binary(BinaryOp::Add, &ints(&[1]), &ValueContentValue::Bottom),
            ValueContentValue::Bottom
        );
        assert_eq!(unary(UnaryOp::Neg, &ints(&[3])), ints(&[-3]));
        assert_eq!(
            unary(UnaryOp::Not, &ValueContentValue::literal(Literal::Bool(true))),
            ValueContentValue::literal(Literal::Bool(false))
        );
    }

    #[test]
    fn operations_are_folded() {
        let program = single_method(
            &[],
            straight(vec![
                assign(local(0), use_(int(2))),
                assign(local(1), binop(BinaryOp::Add, local(0), int(3))),
                assign(field(this(), "C", "f"), use_(local(1))),
                assign(local(2), use_(field(this(), "C", "f"))),
                ret(Some(local(2))),
            ]),
        );
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<ValueContentResult>(m).unwrap();
        assert_eq!(
            result.value_before(OperationId::new(BlockId(1), 2), &local(1)),
            ints(&[5])
        );
        assert_eq!(result.return_value(), ints(&[5]));
    }

    #[test]
    fn infeasible_branches_are_pruned() {
        let condition = cond(local(0), Comp::Eq, int(2));
        let program = single_method(
            &[],
            body(vec![
                entry(0, vec![seq(1)]),
                block(
                    1,
                    vec![assign(local(0), use_(int(1)))],
                    vec![if_true(2, condition.clone()), if_false(3, condition.clone())],
                ),
                block(2, vec![assign(local(1), use_(int(10)))], vec![seq(4)]),
                block(3, vec![assign(local(1), use_(int(20)))], vec![seq(4)]),
                block(4, vec![ret(Some(local(1)))], vec![seq(5)]),
                exit(5),
            ]),
        );
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<ValueContentResult>(m).unwrap();

        assert!(!result.dataflow().is_reachable(BlockId(2)));
        assert!(!result.edge_feasible(BlockId(1), &Branch::IfTrue(condition.clone())));
        assert!(result.edge_feasible(BlockId(1), &Branch::IfFalse(condition)));
        assert!(!result.edge_feasible(BlockId(2), &Branch::Sequence));
        assert_eq!(result.return_value(), ints(&[20]));
    }

    fn narrowing_program() -> fw_model::Program {
        let condition = cond(param(0), Comp::Eq, int(3));
        single_method(
            &[("p", "int")],
            body(vec![
                entry(0, vec![seq(1)]),
                block(
                    1,
                    vec![assign(local(0), use_(param(0)))],
                    vec![if_true(2, condition.clone()), if_false(3, condition)],
                ),
                block(2, vec![assign(local(1), use_(local(0)))], vec![seq(3)]),
                block(3, vec![ret(None)], vec![seq(4)]),
                exit(4),
            ]),
        )
    }

    #[test]
    fn branches_narrow_copies() {
        let program = narrowing_program();
        let repo = Repo::new(&program).unwrap();
        let m = find_method(&repo, "C", "m");
        let before_copy = OperationId::new(BlockId(2), 0);

        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let result = session.analyze::<ValueContentResult>(m).unwrap();
        assert_eq!(result.value_before(before_copy, &param(0)), ints(&[3]));
        assert_eq!(result.value_before(before_copy, &local(0)), ints(&[3]));

        let config = AnalysisConfig {
            copy: false,
            ..AnalysisConfig::default()
        };
        let session = AnalysisSession::new(&repo, config);
        let result = session.analyze::<ValueContentResult>(m).unwrap();
        assert_eq!(result.value_before(before_copy, &param(0)), ints(&[3]));
        assert_eq!(
            result.value_before(before_copy, &local(0)),
            ValueContentValue::Unknown
        );
    }

    #[test]
    fn callee_values_flow_back() {
        let program = program(vec![class(
            "C",
            &[],
            &[("f", "int")],
            vec![
                static_method("id", &[("x", "int")], Some(straight(vec![ret(Some(param(0)))]))),
                static_method(
                    "set",
                    &[("target", "C")],
                    Some(straight(vec![
                        assign(field(param(0), "C", "f"), use_(int(7))),
                        ret(None),
                    ])),
                ),
                method(
                    "m",
                    &[],
                    Some(straight(vec![
                        assign(
                            local(0),
                            Value::Invoke(call("C", "id", &["int"], None, vec![int(5)])),
                        ),
                        invoke(call("C", "set", &["C"], None, vec![this()])),
                        assign(local(1), use_(field(this(), "C", "f"))),
                        ret(None),
                    ])),
                ),
            ],
        )]);
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<ValueContentResult>(m).unwrap();
        let before_return = OperationId::new(BlockId(1), 3);
        assert_eq!(result.value_before(before_return, &local(0)), ints(&[5]));
        assert_eq!(result.value_before(before_return, &local(1)), ints(&[7]));
    }

    #[test]
    fn unknown_callees_follow_the_pessimistic_mode() {
        let program = single_method(
            &[],
            straight(vec![
                assign(field(this(), "C", "f"), use_(int(1))),
                invoke(call("Ext", "touch", &["C"], None, vec![this()])),
                assign(local(1), use_(field(this(), "C", "f"))),
                ret(None),
            ]),
        );
        let repo = Repo::new(&program).unwrap();
        let m = find_method(&repo, "C", "m");
        let before_return = OperationId::new(BlockId(1), 3);

        let pessimistic = AnalysisConfig {
            interprocedural: InterproceduralAnalysisKind::None,
            pessimistic: PessimisticMode::Pessimistic,
            ..AnalysisConfig::default()
        };
        let session = AnalysisSession::new(&repo, pessimistic);
        let result = session.analyze::<ValueContentResult>(m).unwrap();
        assert_eq!(
            result.value_before(before_return, &local(1)),
            ValueContentValue::Unknown
        );

        let optimistic = AnalysisConfig {
            interprocedural: InterproceduralAnalysisKind::None,
            pessimistic: PessimisticMode::Optimistic,
            ..AnalysisConfig::default()
        };
        let session = AnalysisSession::new(&repo, optimistic);
        let result = session.analyze::<ValueContentResult>(m).unwrap();
        assert_eq!(result.value_before(before_return, &local(1)), ints(&[1]));
    }
}
