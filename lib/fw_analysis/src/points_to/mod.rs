//! Points-to analysis.
//!
//! Computes, for every storage place (local, parameter, field of a
//! location, static field), the set of abstract locations it may point to.
//! Every other analysis relies on it to know which objects an operand
//! designates.

use crate::cache::ResultCache;
use crate::config::AnalysisKind;
use crate::dataflow::{
    forward, AbstractValue, AnalysisData, Dataflow, KeyedValue, OperationVisitor,
};
use crate::entity::{AbstractLocation, AnalysisEntity, Frame, ParamSlot};
use crate::errors::AnalysisResult;
use crate::interprocedural::{CallOutcome, Substitution};
use crate::repo::Repo;
use crate::session::{Analysis, AnalysisContext, AnalysisKey, SessionCaches};
use fw_model::operations::{
    FieldRef, Invocation, Literal, MethodRef, Operand, Operation, OperationKind, Value,
};
use fw_model::program::CONSTRUCTOR_NAME;
use fw_model::types::TypeName;
use fw_model::{BlockId, OperationId};
use std::collections::BTreeSet;
use std::fmt;

/// Above this number of locations, a points-to set is widened to unknown.
pub const MAX_POINTS_TO_LOCATIONS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointsToValue {
    Bottom,
    Known(BTreeSet<AbstractLocation>),
    Unknown,
}

impl fmt::Display for PointsToValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bottom => write!(f, "⊥"),
            Self::Known(locations) => {
                write!(f, "{{")?;
                for (i, location) in locations.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{location}")?;
                }
                write!(f, "}}")
            }
            Self::Unknown => write!(f, "⊤"),
        }
    }
}

impl AbstractValue for PointsToValue {
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
            (Self::Known(l1), Self::Known(l2)) => {
                let union: BTreeSet<_> = l1.union(l2).cloned().collect();
                if union.len() > MAX_POINTS_TO_LOCATIONS {
                    Self::Unknown
                } else {
                    Self::Known(union)
                }
            }
        }
    }
}

impl KeyedValue<AnalysisEntity> for PointsToValue {
    fn absent(key: &AnalysisEntity, frame: Frame) -> Self {
        match key {
            AnalysisEntity::Local(_) | AnalysisEntity::Return => Self::Bottom,
            AnalysisEntity::Field { instance, .. } if instance.is_null() => Self::Bottom,
            _ => key
                .default_location(frame)
                .map_or(Self::Unknown, Self::single),
        }
    }

    fn absent_after_havoc(key: &AnalysisEntity, frame: Frame) -> Self {
        match key {
            AnalysisEntity::Static(_) => Self::Unknown,
            _ => Self::absent(key, frame),
        }
    }
}

impl PointsToValue {
    #[must_use]
    pub fn single(location: AbstractLocation) -> Self {
        let mut locations = BTreeSet::new();
        locations.insert(location);
        Self::Known(locations)
    }

    pub fn locations(&self) -> Option<&BTreeSet<AbstractLocation>> {
        match self {
            Self::Known(locations) => Some(locations),
            Self::Bottom | Self::Unknown => None,
        }
    }

    /// Iterates over the locations that can be dereferenced.
    pub fn non_null_locations(&self) -> impl Iterator<Item = &AbstractLocation> {
        self.locations()
            .into_iter()
            .flatten()
            .filter(|location| !location.is_null())
    }

    /// The only non-null location, if there is exactly one and no other
    /// possibility.
    pub fn single_location(&self) -> Option<&AbstractLocation> {
        match self.locations() {
            Some(locations) if locations.len() == 1 => {
                locations.iter().next().filter(|location| !location.is_null())
            }
            _ => None,
        }
    }

    /// Returns `true` if the value is the null location only.
    pub fn is_null(&self) -> bool {
        matches!(self.locations(), Some(locations)
            if !locations.is_empty() && locations.iter().all(AbstractLocation::is_null))
    }
}

pub type PointsToState = AnalysisData<AnalysisEntity, PointsToValue>;

/// The entity denoted by a place that is not a field access.
#[must_use]
pub fn place_entity(operand: &Operand) -> Option<AnalysisEntity> {
    match operand {
        Operand::Local(id) => Some(AnalysisEntity::Local(*id)),
        Operand::Param(_) | Operand::This => ParamSlot::of(operand).map(AnalysisEntity::Parameter),
        Operand::Static(field) => Some(AnalysisEntity::Static(field.clone())),
        Operand::Literal(_) | Operand::Field { .. } => None,
    }
}

/// Reads a field through every location of an instance value.
#[must_use]
pub fn read_field(state: &PointsToState, instance: &PointsToValue, field: &FieldRef) -> PointsToValue {
    match instance {
        PointsToValue::Bottom => PointsToValue::Bottom,
        PointsToValue::Unknown => PointsToValue::Unknown,
        PointsToValue::Known(_) => instance
            .non_null_locations()
            .map(|location| {
                state.get(&AnalysisEntity::Field {
                    instance: location.clone(),
                    field: field.clone(),
                })
            })
            .fold(PointsToValue::Bottom, |acc, v| acc.merge(&v)),
    }
}

/// The locations an operand may point to.
#[must_use]
pub fn evaluate(state: &PointsToState, operand: &Operand) -> PointsToValue {
    match operand {
        Operand::Literal(Literal::Null) => PointsToValue::single(AbstractLocation::Null),
        Operand::Literal(_) => PointsToValue::Unknown,
        Operand::Field { instance, field } => read_field(state, &evaluate(state, instance), field),
        _ => place_entity(operand).map_or(PointsToValue::Unknown, |entity| state.get(&entity)),
    }
}

/// The entities a place operand may designate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    pub entities: Vec<AnalysisEntity>,
    /// Whether the designated entity is known for sure.
    pub strong: bool,
}

impl Targets {
    /// Resolves a place operand in a points-to state. Fields of unknown
    /// instances resolve to nothing.
    #[must_use]
    pub fn of(state: &PointsToState, operand: &Operand) -> Self {
        match operand {
            Operand::Field { instance, field } => {
                let entities: Vec<_> = evaluate(state, instance)
                    .non_null_locations()
                    .map(|location| AnalysisEntity::Field {
                        instance: location.clone(),
                        field: field.clone(),
                    })
                    .collect();
                let strong = entities.len() == 1;
                Self { entities, strong }
            }
            _ => place_entity(operand).map_or_else(Self::default, |entity| Self {
                entities: vec![entity],
                strong: true,
            }),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The single designated entity, if known for sure.
    pub fn single(&self) -> Option<&AnalysisEntity> {
        if self.strong {
            self.entities.first()
        } else {
            None
        }
    }

    /// Writes a value to every target, strongly if possible.
    pub fn write<V: KeyedValue<AnalysisEntity>>(
        &self,
        state: &mut AnalysisData<AnalysisEntity, V>,
        value: &V,
    ) {
        for entity in &self.entities {
            if self.strong {
                state.set(entity.clone(), value.clone());
            } else {
                state.weak_set(entity.clone(), value.clone());
            }
        }
    }
}

/// The instance fields an unknown callee may have modified on an object
/// of the given declared type.
pub(crate) fn declared_fields(repo: &Repo, ty: &TypeName) -> Vec<FieldRef> {
    repo.instance_fields(ty)
        .into_iter()
        .map(|field| field.reference().clone())
        .collect()
}

/// The locations passed to a callee by its arguments. Literals other
/// than `null` designate no location.
#[must_use]
pub fn argument_values(state: &PointsToState, args: &[Operand]) -> Vec<PointsToValue> {
    args.iter()
        .map(|arg| match arg {
            Operand::Literal(literal) if *literal != Literal::Null => PointsToValue::Bottom,
            _ => evaluate(state, arg),
        })
        .collect()
}

/// Locations a callee can reach through its receiver and arguments.
/// `None` when some of them are unknown.
pub(crate) fn escaping_locations<'v>(
    values: impl IntoIterator<Item = &'v PointsToValue>,
) -> Option<BTreeSet<AbstractLocation>> {
    let mut escaping = BTreeSet::new();
    for value in values {
        if value.is_unknown() {
            return None;
        }
        escaping.extend(value.non_null_locations().cloned());
    }
    Some(escaping)
}

/// The constructor invoked by `new class(args)`.
pub(crate) fn constructor_ref(repo: &Repo, class: &TypeName, arity: usize) -> MethodRef {
    repo.resolve_constructor(class, arity)
        .map(|ctor| ctor.reference())
        .unwrap_or_else(|| MethodRef::new(class.clone(), CONSTRUCTOR_NAME, Vec::new()))
}

/// Declared types of the receiver and arguments of an invocation, in
/// [`ParamSlot`] order. Arguments past the last addressable slot are left out.
pub(crate) fn operand_types(callee: &MethodRef) -> impl Iterator<Item = (ParamSlot, &TypeName)> {
    std::iter::once((ParamSlot::This, &callee.class)).chain(
        callee
            .parameters
            .iter()
            .enumerate()
            .map_while(|(i, ty)| Some((ParamSlot::index(i)?, ty))),
    )
}

pub struct PointsToResult {
    frame: Frame,
    exit: BlockId,
    dataflow: Dataflow<PointsToState>,
    empty: PointsToState,
}

impl PointsToResult {
    #[inline]
    pub fn dataflow(&self) -> &Dataflow<PointsToState> {
        &self.dataflow
    }

    /// The state right before an operation. Unreachable operations get an
    /// empty state.
    pub fn state_before(&self, operation: OperationId) -> &PointsToState {
        self.dataflow
            .state_before(operation)
            .unwrap_or(&self.empty)
    }

    /// The state at the end of a block, once its operations executed.
    pub fn block_exit(&self, block: BlockId) -> &PointsToState {
        self.dataflow.exit_state(block).unwrap_or(&self.empty)
    }

    /// The state at the exit of the method, `None` if it never returns.
    pub fn exit_state(&self) -> Option<&PointsToState> {
        self.dataflow.exit_state(self.exit)
    }

    #[must_use]
    pub fn value_before(&self, operation: OperationId, operand: &Operand) -> PointsToValue {
        evaluate(self.state_before(operation), operand)
    }

    #[must_use]
    pub fn return_value(&self) -> PointsToValue {
        self.exit_state()
            .map_or(PointsToValue::Bottom, |state| state.get(&AnalysisEntity::Return))
    }
}

impl Analysis for PointsToResult {
    const KIND: AnalysisKind = AnalysisKind::PointsTo;
    type Entry = ();

    fn cache(caches: &SessionCaches) -> &ResultCache<AnalysisKey<()>, Self> {
        &caches.points_to
    }

    fn compute(ctx: &AnalysisContext<'_, '_>, _entry: &()) -> AnalysisResult<Self> {
        let frame = ctx.frame();
        let mut visitor = PointsToVisitor {
            ctx,
            interprocedural: ctx.config().points_to,
        };
        let dataflow = forward(
            ctx.cfg(),
            PointsToState::new(frame),
            &mut visitor,
            ctx.cancellation(),
        )?;
        Ok(Self {
            frame,
            exit: ctx.cfg().exit(),
            dataflow,
            empty: PointsToState::new(frame),
        })
    }

    fn frame(&self) -> Frame {
        self.frame
    }
}

struct PointsToVisitor<'c, 's, 'a> {
    ctx: &'c AnalysisContext<'s, 'a>,
    interprocedural: bool,
}

impl<'c, 's, 'a> OperationVisitor<'a> for PointsToVisitor<'c, 's, 'a> {
    type State = PointsToState;

    fn visit_operation(
        &mut self,
        state: &mut PointsToState,
        id: OperationId,
        operation: &'a Operation,
    ) -> AnalysisResult<()> {
        match &operation.kind {
            OperationKind::Assign { target, value } => {
                let targets = Targets::of(state, target);
                let value = self.value(state, id, value)?;
                targets.write(state, &value);
            }
            OperationKind::Invoke { call } => {
                self.invoke(state, id, call)?;
            }
            OperationKind::Return { value: Some(value) } => {
                let value = evaluate(state, value);
                state.set(AnalysisEntity::Return, value);
            }
            OperationKind::Return { value: None }
            | OperationKind::Throw { .. }
            | OperationKind::Nop => (),
        }
        Ok(())
    }
}

impl<'c, 's, 'a> PointsToVisitor<'c, 's, 'a> {
    fn value(
        &mut self,
        state: &mut PointsToState,
        id: OperationId,
        value: &Value,
    ) -> AnalysisResult<PointsToValue> {
        match value {
            Value::Use(operand) => Ok(evaluate(state, operand)),
            Value::New { class, args } => {
                let object = PointsToValue::single(self.ctx.creation_location(id));
                let ctor = constructor_ref(self.ctx.repo(), class, args.len());
                self.invoke_method(state, id, &ctor, Some(object.clone()), args)?;
                Ok(object)
            }
            Value::Invoke(call) => self.invoke(state, id, call),
            Value::Binary { .. } | Value::Unary { .. } => Ok(PointsToValue::Unknown),
        }
    }

    fn invoke(
        &mut self,
        state: &mut PointsToState,
        id: OperationId,
        call: &Invocation,
    ) -> AnalysisResult<PointsToValue> {
        let receiver = call.instance.as_ref().map(|instance| evaluate(state, instance));
        self.invoke_method(state, id, &call.callee, receiver, &call.args)
    }

    fn invoke_method(
        &mut self,
        state: &mut PointsToState,
        id: OperationId,
        callee: &MethodRef,
        receiver: Option<PointsToValue>,
        args: &[Operand],
    ) -> AnalysisResult<PointsToValue> {
        let args: Vec<_> = args.iter().map(|arg| evaluate(state, arg)).collect();
        if self.interprocedural {
            if let CallOutcome::Analyze { callee: method, context } =
                self.ctx.resolve_call(id, callee)
            {
                match self
                    .ctx
                    .session()
                    .analyze_in::<PointsToResult>(method, context, ())
                {
                    Ok(result) => return Ok(splice(state, &result, receiver, args)),
                    Err(err) if err.is_cancelled() => return Err(err),
                    Err(err) => log::warn!("cannot follow call to {method}: {err}"),
                }
            }
        }
        Ok(self.fallback(state, id, callee, receiver.as_ref(), &args))
    }

    fn fallback(
        &self,
        state: &mut PointsToState,
        id: OperationId,
        callee: &MethodRef,
        receiver: Option<&PointsToValue>,
        args: &[PointsToValue],
    ) -> PointsToValue {
        if !self.ctx.is_pessimistic(AnalysisKind::PointsTo) {
            return PointsToValue::single(self.ctx.creation_location(id));
        }

        // the callee may have written any static field
        state.havoc_globals();
        let repo = self.ctx.repo();
        let values = std::iter::once(receiver).chain(args.iter().map(Some));
        for ((_, ty), value) in operand_types(callee).zip(values) {
            let Some(value) = value else { continue };
            let escaping: Vec<_> = value.non_null_locations().cloned().collect();
            if escaping.is_empty() {
                continue;
            }
            let mut fields: BTreeSet<FieldRef> = declared_fields(repo, ty).into_iter().collect();
            fields.extend(state.keys().filter_map(|entity| match entity {
                AnalysisEntity::Field { instance, field } if escaping.contains(instance) => {
                    Some(field.clone())
                }
                _ => None,
            }));
            for instance in escaping {
                for field in &fields {
                    state.set(
                        AnalysisEntity::Field {
                            instance: instance.clone(),
                            field: field.clone(),
                        },
                        PointsToValue::Unknown,
                    );
                }
            }
        }
        PointsToValue::Unknown
    }
}

/// Applies the effects of an analyzed callee to the caller state, and
/// returns the value of the call.
fn splice(
    state: &mut PointsToState,
    callee: &PointsToResult,
    receiver: Option<PointsToValue>,
    args: Vec<PointsToValue>,
) -> PointsToValue {
    let Some(exit) = callee.exit_state() else {
        return PointsToValue::Bottom;
    };
    let before = state.clone();
    if exit.is_havocked() {
        state.havoc_globals();
    }
    let subst = Substitution::new(callee.frame, &before, receiver, args);
    let mut result = PointsToValue::Bottom;
    for (entity, value) in exit.iter() {
        if *entity == AnalysisEntity::Return {
            result = subst.value(value);
            continue;
        }
        if let Some((entities, strong)) = subst.entity(entity) {
            let targets = Targets { entities, strong };
            targets.write(state, &subst.value(value));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, InterproceduralAnalysisKind, PessimisticMode};
    use crate::dataflow::lattice::check_lattice_laws;
    use crate::dataflow::AbstractState;
    use crate::entity::CreationSite;
    use crate::repo::Method;
    use crate::session::AnalysisSession;
    use crate::testing::*;
    use fw_model::operations::LocalId;

    fn this_location(method: &Method) -> AbstractLocation {
        AbstractLocation::Parameter {
            frame: Frame::new(method.uid(), 0),
            slot: ParamSlot::This,
        }
    }

    fn created(method: &Method, block: u32, index: u32) -> AbstractLocation {
        AbstractLocation::Creation(CreationSite {
            method: method.uid(),
            operation: OperationId::new(BlockId(block), index),
            context: Vec::new(),
        })
    }

    #[test]
    fn lattice_laws() {
        let frame = Frame::new(crate::repo::MethodUid::first(), 0);
        let p0 = AbstractLocation::Parameter {
            frame,
            slot: ParamSlot::Index(0),
        };
        let this = AbstractLocation::Parameter {
            frame,
            slot: ParamSlot::This,
        };
        let mut both = BTreeSet::new();
        both.insert(p0.clone());
        both.insert(AbstractLocation::Null);
        check_lattice_laws(&[
            PointsToValue::Bottom,
            PointsToValue::Unknown,
            PointsToValue::single(AbstractLocation::Null),
            PointsToValue::single(p0),
            PointsToValue::single(this),
            PointsToValue::Known(both),
        ]);
    }

    #[test]
    fn widening() {
        let frame = Frame::new(crate::repo::MethodUid::first(), 0);
        let value = (0..=MAX_POINTS_TO_LOCATIONS as u16)
            .map(|i| {
                PointsToValue::single(AbstractLocation::Parameter {
                    frame,
                    slot: ParamSlot::Index(i),
                })
            })
            .fold(PointsToValue::Bottom, |acc, v| acc.merge(&v));
        assert_eq!(value, PointsToValue::Unknown);
    }

    #[test]
    fn allocation_and_fields() {
        let program = program(vec![class(
            "C",
            &[],
            &[("f", "C")],
            vec![method(
                "m",
                &[("p", "C")],
                Some(straight(vec![
                    assign(local(0), new_obj("C", vec![])),
                    assign(local(1), use_(local(0))),
                    assign(field(this(), "C", "f"), use_(local(1))),
                    assign(local(2), use_(field(param(0), "C", "f"))),
                    ret(None),
                ])),
            )],
        )]);
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<PointsToResult>(m).unwrap();

        let state = result.state_before(OperationId::new(BlockId(1), 4));
        let object = PointsToValue::single(created(m, 1, 0));
        assert_eq!(state.get(&AnalysisEntity::Local(LocalId(1))), object);
        assert_eq!(
            state.get(&AnalysisEntity::Field {
                instance: this_location(m),
                field: FieldRef::new("C", "f"),
            }),
            object
        );
        let p0 = AbstractLocation::Parameter {
            frame: Frame::new(m.uid(), 0),
            slot: ParamSlot::Index(0),
        };
        assert_eq!(
            state.get(&AnalysisEntity::Local(LocalId(2))),
            PointsToValue::single(AbstractLocation::FieldDefault {
                frame: Frame::new(m.uid(), 0),
                instance: Box::new(p0),
                field: FieldRef::new("C", "f"),
            })
        );
    }

    fn setter_program() -> fw_model::Program {
        program(vec![
            class(
                "C",
                &[],
                &[("f", "D")],
                vec![
                    static_method(
                        "set",
                        &[("target", "C"), ("value", "D")],
                        Some(straight(vec![
                            assign(field(param(0), "C", "f"), use_(param(1))),
                            ret(None),
                        ])),
                    ),
                    method(
                        "m",
                        &[],
                        Some(straight(vec![
                            assign(local(0), new_obj("D", vec![])),
                            invoke(call("C", "set", &["C", "D"], None, vec![this(), local(0)])),
                            ret(None),
                        ])),
                    ),
                ],
            ),
            class(
                "D",
                &[],
                &[("g", "D")],
                vec![method(
                    ".ctor",
                    &[("next", "D")],
                    Some(straight(vec![
                        assign(field(this(), "D", "g"), use_(param(0))),
                        ret(None),
                    ])),
                )],
            ),
        ])
    }

    #[test]
    fn callee_effects_are_spliced() {
        let program = setter_program();
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<PointsToResult>(m).unwrap();
        let exit = result.exit_state().unwrap();
        assert_eq!(
            exit.get(&AnalysisEntity::Field {
                instance: this_location(m),
                field: FieldRef::new("C", "f"),
            }),
            PointsToValue::single(created(m, 1, 0))
        );
    }

    #[test]
    fn pessimistic_fallback_havocs_argument_fields() {
        let program = setter_program();
        let repo = Repo::new(&program).unwrap();
        let config = AnalysisConfig {
            interprocedural: InterproceduralAnalysisKind::None,
            pessimistic: PessimisticMode::Pessimistic,
            ..AnalysisConfig::default()
        };
        let session = AnalysisSession::new(&repo, config);
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<PointsToResult>(m).unwrap();
        let exit = result.exit_state().unwrap();
        assert_eq!(
            exit.get(&AnalysisEntity::Field {
                instance: this_location(m),
                field: FieldRef::new("C", "f"),
            }),
            PointsToValue::Unknown
        );
    }

    fn static_reader() -> fw_model::Program {
        program(vec![class(
            "C",
            &[],
            &[],
            vec![
                static_method(
                    "touch",
                    &[],
                    Some(straight(vec![
                        invoke(call("Ext", "unknown", &[], None, vec![])),
                        ret(None),
                    ])),
                ),
                static_method(
                    "m",
                    &[],
                    Some(straight(vec![
                        assign(local(0), use_(Operand::Static(FieldRef::new("S", "g")))),
                        invoke(call("Ext", "unknown", &[], None, vec![])),
                        assign(local(1), use_(Operand::Static(FieldRef::new("S", "g")))),
                        ret(None),
                    ])),
                ),
                static_method(
                    "indirect",
                    &[],
                    Some(straight(vec![
                        invoke(call("C", "touch", &[], None, vec![])),
                        assign(local(0), use_(Operand::Static(FieldRef::new("S", "g")))),
                        ret(None),
                    ])),
                ),
            ],
        )])
    }

    #[test]
    fn unknown_callees_overwrite_static_fields() {
        let program = static_reader();
        let repo = Repo::new(&program).unwrap();
        let config = AnalysisConfig {
            pessimistic: PessimisticMode::Pessimistic,
            ..AnalysisConfig::default()
        };
        let session = AnalysisSession::new(&repo, config);
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<PointsToResult>(m).unwrap();
        let exit = result.exit_state().unwrap();
        assert!(exit.is_havocked());
        assert_eq!(
            exit.get(&AnalysisEntity::Local(LocalId(0))),
            PointsToValue::single(AbstractLocation::StaticDefault {
                frame: Frame::new(m.uid(), 0),
                field: FieldRef::new("S", "g"),
            })
        );
        assert_eq!(exit.get(&AnalysisEntity::Local(LocalId(1))), PointsToValue::Unknown);

        // the overwrite is visible to the callers of a followed callee
        let indirect = find_method(&repo, "C", "indirect");
        let result = session.analyze::<PointsToResult>(indirect).unwrap();
        let exit = result.exit_state().unwrap();
        assert_eq!(exit.get(&AnalysisEntity::Local(LocalId(0))), PointsToValue::Unknown);
    }

    #[test]
    fn optimistic_callees_keep_static_fields() {
        let program = static_reader();
        let repo = Repo::new(&program).unwrap();
        let config = AnalysisConfig {
            pessimistic: PessimisticMode::Optimistic,
            ..AnalysisConfig::default()
        };
        let session = AnalysisSession::new(&repo, config);
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<PointsToResult>(m).unwrap();
        let exit = result.exit_state().unwrap();
        assert!(!exit.is_havocked());
        assert_eq!(
            exit.get(&AnalysisEntity::Local(LocalId(0))),
            exit.get(&AnalysisEntity::Local(LocalId(1)))
        );
    }

    #[test]
    fn havoc_survives_joins() {
        let frame = Frame::new(crate::repo::MethodUid::first(), 0);
        let g = AnalysisEntity::Static(FieldRef::new("S", "g"));
        let mut havocked = PointsToState::new(frame);
        havocked.set(g.clone(), PointsToValue::single(AbstractLocation::Null));
        havocked.havoc_globals();
        assert_eq!(havocked.get(&g), PointsToValue::Unknown);
        assert!(havocked.is_empty());

        let mut state = PointsToState::new(frame);
        state.set(AnalysisEntity::Local(LocalId(0)), PointsToValue::single(AbstractLocation::Null));
        state.join(&havocked);
        assert!(state.is_havocked());
        assert_eq!(state.get(&g), PointsToValue::Unknown);
        assert_eq!(
            state.get(&AnalysisEntity::Local(LocalId(0))),
            PointsToValue::single(AbstractLocation::Null)
        );
    }

    #[test]
    fn optimistic_fallback_returns_fresh_location() {
        let program = program(vec![class(
            "C",
            &[],
            &[],
            vec![method(
                "m",
                &[],
                Some(straight(vec![
                    assign(
                        local(0),
                        Value::Invoke(call("Ext", "make", &[], None, vec![])),
                    ),
                    ret(Some(local(0))),
                ])),
            )],
        )]);
        let repo = Repo::new(&program).unwrap();
        let config = AnalysisConfig {
            pessimistic: PessimisticMode::Optimistic,
            ..AnalysisConfig::default()
        };
        let session = AnalysisSession::new(&repo, config);
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<PointsToResult>(m).unwrap();
        assert_eq!(result.return_value(), PointsToValue::single(created(m, 1, 0)));
    }

    #[test]
    fn constructor_receives_created_object() {
        let program = program(vec![
            class(
                "D",
                &[],
                &[("g", "D")],
                vec![method(
                    ".ctor",
                    &[("next", "D")],
                    Some(straight(vec![
                        assign(field(this(), "D", "g"), use_(param(0))),
                        ret(None),
                    ])),
                )],
            ),
            class(
                "C",
                &[],
                &[],
                vec![method(
                    "m",
                    &[],
                    Some(straight(vec![
                        assign(local(0), use_(null())),
                        assign(local(1), new_obj("D", vec![this()])),
                        ret(None),
                    ])),
                )],
            ),
        ]);
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<PointsToResult>(m).unwrap();
        let exit = result.exit_state().unwrap();
        assert_eq!(
            exit.get(&AnalysisEntity::Field {
                instance: created(m, 1, 1),
                field: FieldRef::new("D", "g"),
            }),
            PointsToValue::single(this_location(m))
        );
    }

    #[test]
    fn operand_types_stop_at_the_last_addressable_slot() {
        let parameters = vec![TypeName::new("Res"); usize::from(u16::MAX) + 2];
        let callee = MethodRef::new("C", "wide", parameters);
        let slots: Vec<_> = operand_types(&callee).map(|(slot, _)| slot).collect();
        assert_eq!(slots.len(), usize::from(u16::MAX) + 2);
        assert_eq!(slots[0], ParamSlot::This);
        assert_eq!(slots[1], ParamSlot::Index(0));
        assert_eq!(slots.last(), Some(&ParamSlot::Index(u16::MAX)));
    }

    #[test]
    fn recursion_is_bounded() {
        let program = program(vec![class(
            "C",
            &[],
            &[("f", "C")],
            vec![static_method(
                "rec",
                &[("p", "C")],
                Some(straight(vec![
                    invoke(call("C", "rec", &["C"], None, vec![field(param(0), "C", "f")])),
                    assign(local(0), use_(field(param(0), "C", "f"))),
                    ret(Some(local(0))),
                ])),
            )],
        )]);
        let repo = Repo::new(&program).unwrap();
        let config = AnalysisConfig {
            max_call_chain: 2,
            ..AnalysisConfig::default()
        };
        let session = AnalysisSession::new(&repo, config);
        let rec = find_method(&repo, "C", "rec");
        session.analyze::<PointsToResult>(rec).unwrap();
        // depths 0, 1 and 2, the call at depth 2 is not followed
        assert_eq!(session.stats_of::<PointsToResult>().computations, 3);

        session.analyze::<PointsToResult>(rec).unwrap();
        assert_eq!(session.stats_of::<PointsToResult>().computations, 3);
        assert_eq!(session.stats_of::<PointsToResult>().hits, 1);
    }

    #[test]
    fn recursive_calls_beyond_the_bound_are_unknown() {
        let program = program(vec![class(
            "C",
            &[],
            &[],
            vec![static_method(
                "rec",
                &[("p", "C")],
                Some(straight(vec![
                    assign(
                        local(0),
                        Value::Invoke(call("C", "rec", &["C"], None, vec![param(0)])),
                    ),
                    ret(Some(local(0))),
                ])),
            )],
        )]);
        let repo = Repo::new(&program).unwrap();
        let rec = find_method(&repo, "C", "rec");

        let bounded = |pessimistic: PessimisticMode| AnalysisConfig {
            max_call_chain: 2,
            pessimistic,
            ..AnalysisConfig::default()
        };
        let session = AnalysisSession::new(&repo, bounded(PessimisticMode::Default));
        let result = session.analyze::<PointsToResult>(rec).unwrap();
        assert_eq!(session.stats_of::<PointsToResult>().computations, 3);
        // the unfollowed call at depth 2 flows back to the root
        assert_eq!(result.return_value(), PointsToValue::Unknown);

        let session = AnalysisSession::new(&repo, bounded(PessimisticMode::Optimistic));
        let result = session.analyze::<PointsToResult>(rec).unwrap();
        assert!(matches!(result.return_value(), PointsToValue::Known(_)));
    }
}
