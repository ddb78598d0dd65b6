//! Null analysis: whether an entity may hold a null reference.

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
use crate::value_content::ValueContentResult;
use fw_model::body::{Branch, Comp};
use fw_model::operations::{Literal, MethodRef, Operand, Operation, OperationKind, Value};
use fw_model::{BlockId, OperationId};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullValue {
    Bottom,
    Null,
    NotNull,
    /// Null on some paths, not null on others.
    MaybeNull,
    Unknown,
}

impl fmt::Display for NullValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bottom => write!(f, "⊥"),
            Self::Null => write!(f, "null"),
            Self::NotNull => write!(f, "not-null"),
            Self::MaybeNull => write!(f, "maybe-null"),
            Self::Unknown => write!(f, "⊤"),
        }
    }
}

impl AbstractValue for NullValue {
    fn bottom() -> Self {
        Self::Bottom
    }

    fn unknown() -> Self {
        Self::Unknown
    }

    fn merge(&self, other: &Self) -> Self {
        match (*self, *other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::Bottom, v) | (v, Self::Bottom) => v,
            (v1, v2) if v1 == v2 => v1,
            _ => Self::MaybeNull,
        }
    }
}

impl KeyedValue<AnalysisEntity> for NullValue {
    fn absent(key: &AnalysisEntity, _frame: Frame) -> Self {
        match key {
            AnalysisEntity::Return => Self::Bottom,
            AnalysisEntity::Parameter(ParamSlot::This) => Self::NotNull,
            _ => Self::Unknown,
        }
    }
}

pub type NullState = AnalysisData<AnalysisEntity, NullValue>;

#[must_use]
pub fn evaluate(state: &NullState, points_to: &PointsToState, operand: &Operand) -> NullValue {
    match operand {
        Operand::Literal(Literal::Null) => NullValue::Null,
        Operand::Literal(_) => NullValue::NotNull,
        Operand::Field { .. } => {
            let targets = Targets::of(points_to, operand);
            if targets.is_empty() {
                return NullValue::Unknown;
            }
            targets
                .entities
                .iter()
                .map(|entity| state.get(entity))
                .fold(NullValue::Bottom, |acc, v| acc.merge(&v))
        }
        _ => place_entity(operand).map_or(NullValue::Unknown, |entity| state.get(&entity)),
    }
}

/// Sets the value of a place, and of its copies, if the place is known
/// for sure.
fn assume(
    state: &mut NullState,
    points_to: &PointsToState,
    copies: Option<&CopyState>,
    place: &Operand,
    value: NullValue,
) {
    let targets = Targets::of(points_to, place);
    let Some(entity) = targets.single() else {
        return;
    };
    if let Some(copies) = copies {
        for copy in copies_of(copies, entity) {
            state.set(copy, value);
        }
    }
    state.set(entity.clone(), value);
}

pub struct NullResult {
    frame: Frame,
    exit: BlockId,
    dataflow: Dataflow<NullState>,
    empty: NullState,
    points_to: Arc<PointsToResult>,
}

impl NullResult {
    #[inline]
    pub fn dataflow(&self) -> &Dataflow<NullState> {
        &self.dataflow
    }

    pub fn state_before(&self, operation: OperationId) -> &NullState {
        self.dataflow
            .state_before(operation)
            .unwrap_or(&self.empty)
    }

    pub fn exit_state(&self) -> Option<&NullState> {
        self.dataflow.exit_state(self.exit)
    }

    #[must_use]
    pub fn value_before(&self, operation: OperationId, operand: &Operand) -> NullValue {
        evaluate(
            self.state_before(operation),
            self.points_to.state_before(operation),
            operand,
        )
    }

    #[must_use]
    pub fn return_value(&self) -> NullValue {
        self.exit_state()
            .map_or(NullValue::Bottom, |state| state.get(&AnalysisEntity::Return))
    }
}

impl Analysis for NullResult {
    const KIND: AnalysisKind = AnalysisKind::Null;
    type Entry = ArgumentValues<NullValue>;

    fn cache(caches: &SessionCaches) -> &ResultCache<AnalysisKey<Self::Entry>, Self> {
        &caches.null
    }

    fn compute(ctx: &AnalysisContext<'_, '_>, entry: &Self::Entry) -> AnalysisResult<Self> {
        let points_to = ctx.prerequisite::<PointsToResult>()?;
        let copies = if ctx.config().copy {
            Some(ctx.prerequisite::<CopyResult>()?)
        } else {
            None
        };
        let value_content = if ctx.config().value_content {
            Some(ctx.prerequisite::<ValueContentResult>()?)
        } else {
            None
        };

        let frame = ctx.frame();
        let mut seed = NullState::new(frame);
        for (slot, value) in entry {
            seed.set(AnalysisEntity::Parameter(*slot), *value);
        }
        let mut visitor = NullVisitor {
            ctx,
            points_to: Arc::clone(&points_to),
            copies,
            value_content,
        };
        let dataflow = forward(ctx.cfg(), seed, &mut visitor, ctx.cancellation())?;
        Ok(Self {
            frame,
            exit: ctx.cfg().exit(),
            dataflow,
            empty: NullState::new(frame),
            points_to,
        })
    }

    fn frame(&self) -> Frame {
        self.frame
    }
}

struct NullVisitor<'c, 's, 'a> {
    ctx: &'c AnalysisContext<'s, 'a>,
    points_to: Arc<PointsToResult>,
    copies: Option<Arc<CopyResult>>,
    value_content: Option<Arc<ValueContentResult>>,
}

impl<'c, 's, 'a> OperationVisitor<'a> for NullVisitor<'c, 's, 'a> {
    type State = NullState;

    fn visit_operation(
        &mut self,
        state: &mut NullState,
        id: OperationId,
        operation: &'a Operation,
    ) -> AnalysisResult<()> {
        let points_to_result = Arc::clone(&self.points_to);
        let pts = points_to_result.state_before(id);
        let copies = self.copies.clone();
        let copies = copies.as_deref().map(|copies| copies.state_before(id));

        // past this operation, dereferenced operands were not null
        for operand in operation.dereferenced_operands() {
            assume(state, pts, copies, operand, NullValue::NotNull);
        }

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
        state: &mut NullState,
        from: BlockId,
        branch: &'a Branch,
    ) -> AnalysisResult<bool> {
        if let Some(value_content) = &self.value_content {
            if !value_content.edge_feasible(from, branch) {
                return Ok(false);
            }
        }
        let Some((left, comp, right)) = branch.assumption() else {
            return Ok(true);
        };
        let place = if right.is_null() {
            left
        } else if left.is_null() {
            right
        } else {
            return Ok(true);
        };
        let assumed = match comp {
            Comp::Eq => NullValue::Null,
            Comp::Ne => NullValue::NotNull,
            Comp::Lt | Comp::Le | Comp::Gt | Comp::Ge => return Ok(true),
        };

        let pts = self.points_to.block_exit(from);
        let current = evaluate(state, pts, place);
        if matches!(
            (current, assumed),
            (NullValue::Null, NullValue::NotNull) | (NullValue::NotNull, NullValue::Null)
        ) {
            return Ok(false);
        }
        let copies = self.copies.as_deref().map(|copies| copies.block_exit(from));
        assume(state, pts, copies, place, assumed);
        Ok(true)
    }
}

impl<'c, 's, 'a> NullVisitor<'c, 's, 'a> {
    fn value(
        &mut self,
        state: &mut NullState,
        pts: &PointsToState,
        id: OperationId,
        value: &Value,
    ) -> AnalysisResult<NullValue> {
        match value {
            Value::Use(operand) => Ok(evaluate(state, pts, operand)),
            Value::New { class, args } => {
                let ctor = constructor_ref(self.ctx.repo(), class, args.len());
                let receiver = PointsToValue::single(self.ctx.creation_location(id));
                self.invoke(state, pts, id, &ctor, Some(receiver), args)?;
                Ok(NullValue::NotNull)
            }
            Value::Invoke(call) => {
                let receiver = call
                    .instance
                    .as_ref()
                    .map(|instance| points_to::evaluate(pts, instance));
                self.invoke(state, pts, id, &call.callee, receiver, &call.args)
            }
            Value::Binary { .. } | Value::Unary { .. } => Ok(NullValue::NotNull),
        }
    }

    fn invoke(
        &mut self,
        state: &mut NullState,
        pts: &PointsToState,
        id: OperationId,
        callee: &MethodRef,
        receiver: Option<PointsToValue>,
        args: &[Operand],
    ) -> AnalysisResult<NullValue> {
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

        match self.ctx.analyze_callee::<NullResult>(id, callee, entry)? {
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
                if self.ctx.is_pessimistic(AnalysisKind::Null) {
                    let escaping = escaping_locations(receiver.iter().chain(&arg_locations));
                    forget_escaping(state, escaping.as_ref());
                }
                Ok(NullValue::Unknown)
            }
        }
    }
}
