//! Dispose analysis: whether the objects a method handles have been
//! disposed.
//!
//! The state maps abstract locations to a [`DisposeValue`]. Objects are
//! disposed by `Dispose`, `Close` and `DisposeAsync` invocations on any
//! reference that may point to them, and by followed callees doing so.

mod ledger;

pub use ledger::{FieldDisposal, FieldDisposeLedger};

use crate::cache::ResultCache;
use crate::config::AnalysisKind;
use crate::dataflow::{
    forward, AbstractValue, AnalysisData, Dataflow, KeyedValue, OperationVisitor,
};
use crate::entity::{AbstractLocation, AnalysisEntity, Frame, ParamSlot};
use crate::errors::AnalysisResult;
use crate::interprocedural::Substitution;
use crate::points_to::{
    self, argument_values, constructor_ref, operand_types, PointsToResult, PointsToState,
    PointsToValue,
};
use crate::session::{Analysis, AnalysisContext, AnalysisKey, SessionCaches};
use crate::value_content::ValueContentResult;
use fw_model::body::Branch;
use fw_model::operations::{
    FieldRef, Invocation, MethodRef, Operand, Operation, OperationKind, Span, Value,
};
use fw_model::program::CONSTRUCTOR_NAME;
use fw_model::{BlockId, OperationId, TypeName};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Names of the methods that release the resources of their receiver.
const DISPOSE_METHODS: [&str; 3] = ["Dispose", "Close", "DisposeAsync"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisposeValue {
    Bottom,
    NotDisposed,
    Disposed,
    /// Disposed on some paths only.
    MaybeDisposed,
    Unknown,
}

impl fmt::Display for DisposeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bottom => write!(f, "⊥"),
            Self::NotDisposed => write!(f, "not-disposed"),
            Self::Disposed => write!(f, "disposed"),
            Self::MaybeDisposed => write!(f, "maybe-disposed"),
            Self::Unknown => write!(f, "⊤"),
        }
    }
}

impl AbstractValue for DisposeValue {
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
            _ => Self::MaybeDisposed,
        }
    }
}

impl KeyedValue<AbstractLocation> for DisposeValue {
    /// Objects that exist before the method starts are not disposed yet.
    /// Objects it allocates do not exist before their creation.
    fn absent(key: &AbstractLocation, _frame: Frame) -> Self {
        match key {
            AbstractLocation::Null | AbstractLocation::Creation(_) => Self::Bottom,
            AbstractLocation::Parameter { .. }
            | AbstractLocation::FieldDefault { .. }
            | AbstractLocation::StaticDefault { .. } => Self::NotDisposed,
        }
    }
}

pub type DisposeState = AnalysisData<AbstractLocation, DisposeValue>;

/// Sets the value of every location of `value`, strongly if there is only
/// one of them.
fn set_locations(state: &mut DisposeState, value: &PointsToValue, disposal: DisposeValue) {
    if let Some(location) = value.single_location() {
        state.set(location.clone(), disposal);
        return;
    }
    for location in value.non_null_locations() {
        state.weak_set(location.clone(), disposal);
    }
}

/// A disposable object allocated by the analyzed method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedObject {
    pub class: TypeName,
    pub operation: OperationId,
    pub span: Option<Span>,
}

/// A disposable object that may still be alive when its creator returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakedObject {
    pub location: AbstractLocation,
    pub class: TypeName,
    pub operation: OperationId,
    pub span: Option<Span>,
    pub state: DisposeValue,
}

pub struct DisposeResult {
    frame: Frame,
    exit: BlockId,
    dataflow: Dataflow<DisposeState>,
    points_to: Arc<PointsToResult>,
    created: BTreeMap<AbstractLocation, CreatedObject>,
    owned: BTreeSet<FieldRef>,
    /// Disposable instance fields of the definer.
    candidates: BTreeSet<FieldRef>,
}

impl DisposeResult {
    #[inline]
    pub fn dataflow(&self) -> &Dataflow<DisposeState> {
        &self.dataflow
    }

    #[inline]
    pub fn points_to(&self) -> &PointsToResult {
        &self.points_to
    }

    pub fn exit_state(&self) -> Option<&DisposeState> {
        self.dataflow.exit_state(self.exit)
    }

    #[must_use]
    pub fn exit_value(&self, location: &AbstractLocation) -> DisposeValue {
        self.exit_state()
            .map_or(DisposeValue::Bottom, |state| state.get(location))
    }

    /// The dispose state, at exit, of the objects a field of `this` holds.
    #[must_use]
    pub fn field_state_at_exit(&self, field: &FieldRef) -> DisposeValue {
        let (Some(exit), Some(points_to)) = (self.exit_state(), self.points_to.exit_state())
        else {
            return DisposeValue::Bottom;
        };
        let this = AbstractLocation::Parameter {
            frame: self.frame,
            slot: ParamSlot::This,
        };
        let held = points_to.get(&AnalysisEntity::Field {
            instance: this,
            field: field.clone(),
        });
        match held {
            PointsToValue::Unknown => DisposeValue::Unknown,
            _ => held
                .non_null_locations()
                .map(|location| exit.get(location))
                .fold(DisposeValue::Bottom, |acc, v| acc.merge(&v)),
        }
    }

    /// Disposable fields of the definer, or owned by this method, that
    /// hold disposed objects at exit.
    #[must_use]
    pub fn disposed_fields(&self) -> BTreeSet<FieldRef> {
        self.candidates
            .iter()
            .chain(&self.owned)
            .filter(|field| self.field_state_at_exit(field) == DisposeValue::Disposed)
            .cloned()
            .collect()
    }

    /// Fields this method stores a disposable object it created into.
    #[inline]
    pub fn owned_fields(&self) -> &BTreeSet<FieldRef> {
        &self.owned
    }

    #[inline]
    pub fn created_objects(&self) -> &BTreeMap<AbstractLocation, CreatedObject> {
        &self.created
    }

    /// Disposable objects created by this method, not disposed on every
    /// path to its exit, and not escaping through its return value or a
    /// field.
    #[must_use]
    pub fn leaked_objects(&self) -> Vec<LeakedObject> {
        let (Some(exit), Some(points_to)) = (self.exit_state(), self.points_to.exit_state())
        else {
            return Vec::new();
        };
        let escaping: BTreeSet<&AbstractLocation> = points_to
            .iter()
            .filter(|(entity, _)| {
                matches!(
                    entity,
                    AnalysisEntity::Return | AnalysisEntity::Field { .. } | AnalysisEntity::Static(_)
                )
            })
            .flat_map(|(_, value)| value.non_null_locations())
            .collect();

        self.created
            .iter()
            .filter(|(location, _)| !escaping.contains(location))
            .filter_map(|(location, object)| {
                let state = exit.get(location);
                matches!(state, DisposeValue::NotDisposed | DisposeValue::MaybeDisposed).then(
                    || LeakedObject {
                        location: location.clone(),
                        class: object.class.clone(),
                        operation: object.operation,
                        span: object.span,
                        state,
                    },
                )
            })
            .collect()
    }
}

impl Analysis for DisposeResult {
    const KIND: AnalysisKind = AnalysisKind::Dispose;
    type Entry = ();

    fn cache(caches: &SessionCaches) -> &ResultCache<AnalysisKey<()>, Self> {
        &caches.dispose
    }

    fn compute(ctx: &AnalysisContext<'_, '_>, _entry: &()) -> AnalysisResult<Self> {
        let points_to = ctx.prerequisite::<PointsToResult>()?;
        let value_content = if ctx.config().value_content {
            Some(ctx.prerequisite::<ValueContentResult>()?)
        } else {
            None
        };

        let frame = ctx.frame();
        let mut visitor = DisposeVisitor {
            ctx,
            points_to: Arc::clone(&points_to),
            value_content,
            created: BTreeMap::new(),
            owned: BTreeSet::new(),
        };
        let dataflow = forward(
            ctx.cfg(),
            DisposeState::new(frame),
            &mut visitor,
            ctx.cancellation(),
        )?;

        let repo = ctx.repo();
        let candidates = repo
            .disposable_fields(ctx.method().definer())
            .into_iter()
            .map(|field| field.reference().clone())
            .collect();
        Ok(Self {
            frame,
            exit: ctx.cfg().exit(),
            dataflow,
            points_to,
            created: visitor.created,
            owned: visitor.owned,
            candidates,
        })
    }

    fn frame(&self) -> Frame {
        self.frame
    }
}

struct DisposeVisitor<'c, 's, 'a> {
    ctx: &'c AnalysisContext<'s, 'a>,
    points_to: Arc<PointsToResult>,
    value_content: Option<Arc<ValueContentResult>>,
    created: BTreeMap<AbstractLocation, CreatedObject>,
    owned: BTreeSet<FieldRef>,
}

impl<'c, 's, 'a> OperationVisitor<'a> for DisposeVisitor<'c, 's, 'a> {
    type State = DisposeState;

    fn visit_operation(
        &mut self,
        state: &mut DisposeState,
        id: OperationId,
        operation: &'a Operation,
    ) -> AnalysisResult<()> {
        let points_to_result = Arc::clone(&self.points_to);
        let pts = points_to_result.state_before(id);

        match &operation.kind {
            OperationKind::Assign { target, value } => {
                let stored = match value {
                    Value::New { class, args } => {
                        Some(self.create(state, pts, id, operation.span, class, args)?)
                    }
                    Value::Invoke(call) => {
                        self.invoke(state, pts, id, call)?;
                        None
                    }
                    Value::Use(operand) => Some(points_to::evaluate(pts, operand)),
                    Value::Binary { .. } | Value::Unary { .. } => None,
                };
                if let (Operand::Field { field, .. }, Some(stored)) = (target, stored) {
                    if stored
                        .non_null_locations()
                        .any(|location| self.created.contains_key(location))
                    {
                        self.owned.insert(field.clone());
                    }
                }
            }
            OperationKind::Invoke { call } => self.invoke(state, pts, id, call)?,
            OperationKind::Return { .. } | OperationKind::Throw { .. } | OperationKind::Nop => (),
        }
        Ok(())
    }

    fn visit_branch(
        &mut self,
        _state: &mut DisposeState,
        from: BlockId,
        branch: &'a Branch,
    ) -> AnalysisResult<bool> {
        Ok(self
            .value_content
            .as_ref()
            .map_or(true, |value_content| value_content.edge_feasible(from, branch)))
    }
}

impl<'c, 's, 'a> DisposeVisitor<'c, 's, 'a> {
    fn create(
        &mut self,
        state: &mut DisposeState,
        pts: &PointsToState,
        id: OperationId,
        span: Option<Span>,
        class: &TypeName,
        args: &[Operand],
    ) -> AnalysisResult<PointsToValue> {
        let location = self.ctx.creation_location(id);
        if self.ctx.repo().is_disposable(class) {
            state.set(location.clone(), DisposeValue::NotDisposed);
            self.created.insert(
                location.clone(),
                CreatedObject {
                    class: class.clone(),
                    operation: id,
                    span,
                },
            );
        }
        let receiver = PointsToValue::single(location);
        let ctor = constructor_ref(self.ctx.repo(), class, args.len());
        self.apply_call(state, pts, id, &ctor, Some(receiver.clone()), args)?;
        Ok(receiver)
    }

    fn invoke(
        &mut self,
        state: &mut DisposeState,
        pts: &PointsToState,
        id: OperationId,
        call: &Invocation,
    ) -> AnalysisResult<()> {
        let receiver = call
            .instance
            .as_ref()
            .map(|instance| points_to::evaluate(pts, instance));
        let disposes = call.args.is_empty()
            && DISPOSE_METHODS.contains(&call.callee.name.as_str())
            && receiver.is_some();
        if !disposes {
            return self.apply_call(state, pts, id, &call.callee, receiver, &call.args);
        }

        // whatever the callee does, the receiver ends up disposed
        if let Some(callee) = self.ctx.analyze_callee::<DisposeResult>(id, &call.callee, ())? {
            let subst = Substitution::new(callee.result.frame, pts, receiver.clone(), Vec::new());
            splice(state, &callee.result, &subst);
        }
        if let Some(receiver) = &receiver {
            set_locations(state, receiver, DisposeValue::Disposed);
        }
        Ok(())
    }

    fn apply_call(
        &mut self,
        state: &mut DisposeState,
        pts: &PointsToState,
        id: OperationId,
        callee: &MethodRef,
        receiver: Option<PointsToValue>,
        args: &[Operand],
    ) -> AnalysisResult<()> {
        let arg_locations = argument_values(pts, args);
        if let Some(results) = self.ctx.analyze_callee::<DisposeResult>(id, callee, ())? {
            let subst = Substitution::new(results.result.frame, pts, receiver, arg_locations);
            splice(state, &results.result, &subst);
            return Ok(());
        }
        if !self.ctx.is_pessimistic(AnalysisKind::Dispose) {
            return Ok(());
        }

        // the object under construction does not escape its constructor
        let receiver = receiver.filter(|_| callee.name != CONSTRUCTOR_NAME);
        let operands = std::iter::once(receiver)
            .chain(arg_locations.into_iter().map(Some))
            .zip(operand_types(callee));
        let repo = self.ctx.repo();
        for (value, (_, ty)) in operands {
            let Some(value) = value else {
                continue;
            };
            let disposable = repo.is_disposable(ty);
            for location in value.non_null_locations() {
                if disposable || self.created.contains_key(location) {
                    state.set(location.clone(), DisposeValue::Unknown);
                }
            }
        }
        Ok(())
    }
}

/// Applies the exit state of a callee to the caller state.
fn splice(state: &mut DisposeState, callee: &DisposeResult, subst: &Substitution) {
    let Some(exit) = callee.exit_state() else {
        return;
    };
    for (location, value) in exit.iter() {
        let Some(targets) = subst.locations(location) else {
            continue;
        };
        let strong = targets.len() == 1;
        for target in targets {
            match value {
                DisposeValue::Disposed if strong => state.set(target, *value),
                DisposeValue::Disposed | DisposeValue::MaybeDisposed => {
                    state.weak_set(target, *value);
                }
                DisposeValue::Unknown => state.set(target, *value),
                DisposeValue::NotDisposed if location.creation_site().is_some() => {
                    state.set(target, *value);
                }
                DisposeValue::NotDisposed | DisposeValue::Bottom => (),
            }
        }
    }
}
