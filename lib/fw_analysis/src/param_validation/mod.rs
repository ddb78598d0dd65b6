//! Parameter validation analysis: finds the parameters a method
//! dereferences before checking them against null.
//!
//! Reference-typed parameters start not validated. A null check, a
//! validation helper or a first dereference validates them. Only the
//! dereferences happening while a parameter is not validated are reported.

use crate::cache::ResultCache;
use crate::config::AnalysisKind;
use crate::dataflow::{
    forward, AbstractValue, AnalysisData, Dataflow, KeyedValue, OperationVisitor,
};
use crate::entity::{AbstractLocation, Frame, ParamSlot};
use crate::errors::AnalysisResult;
use crate::points_to::{self, constructor_ref, PointsToResult, PointsToState, PointsToValue};
use crate::session::{Analysis, AnalysisContext, AnalysisKey, SessionCaches};
use crate::value_content::ValueContentResult;
use fw_model::body::{Branch, Comp};
use fw_model::operations::{MethodRef, Operand, Operation, OperationKind, Span, Value};
use fw_model::{BlockId, OperationId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Names of the helpers that throw when their argument is null.
const VALIDATORS: [&str; 4] = ["ThrowIfNull", "NotNull", "AssertNotNull", "RequireNonNull"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterValidationValue {
    Bottom,
    Validated,
    NotValidated,
    Unknown,
}

impl fmt::Display for ParameterValidationValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bottom => write!(f, "⊥"),
            Self::Validated => write!(f, "validated"),
            Self::NotValidated => write!(f, "not-validated"),
            Self::Unknown => write!(f, "⊤"),
        }
    }
}

impl AbstractValue for ParameterValidationValue {
    fn bottom() -> Self {
        Self::Bottom
    }

    fn unknown() -> Self {
        Self::Unknown
    }

    fn merge(&self, other: &Self) -> Self {
        *self.max(other)
    }
}

impl KeyedValue<AbstractLocation> for ParameterValidationValue {
    fn absent(_key: &AbstractLocation, _frame: Frame) -> Self {
        Self::Unknown
    }
}

pub type ParameterValidationState = AnalysisData<AbstractLocation, ParameterValidationValue>;

fn validate(state: &mut ParameterValidationState, value: &PointsToValue) {
    if let Some(location) = value.single_location() {
        state.set(location.clone(), ParameterValidationValue::Validated);
    }
}

/// The first dereference of a parameter before its validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardousUsage {
    pub operation: OperationId,
    pub span: Option<Span>,
}

pub struct ParameterValidationResult {
    frame: Frame,
    exit: BlockId,
    dataflow: Dataflow<ParameterValidationState>,
    hazards: BTreeMap<u16, HazardousUsage>,
}

impl ParameterValidationResult {
    #[inline]
    pub fn dataflow(&self) -> &Dataflow<ParameterValidationState> {
        &self.dataflow
    }

    pub fn exit_state(&self) -> Option<&ParameterValidationState> {
        self.dataflow.exit_state(self.exit)
    }

    /// Parameters dereferenced while not validated, with the first such
    /// dereference.
    #[inline]
    pub fn hazardous_parameter_usages(&self) -> &BTreeMap<u16, HazardousUsage> {
        &self.hazards
    }

    /// The validation state of a parameter when the method returns.
    #[must_use]
    pub fn exit_value(&self, index: u16) -> ParameterValidationValue {
        let location = AbstractLocation::Parameter {
            frame: self.frame,
            slot: ParamSlot::Index(index),
        };
        self.exit_state()
            .map_or(ParameterValidationValue::Bottom, |state| state.get(&location))
    }

    /// Parameters validated on every path to the exit.
    #[must_use]
    pub fn validated_parameters(&self) -> BTreeSet<u16> {
        let Some(exit) = self.exit_state() else {
            return BTreeSet::new();
        };
        exit.iter()
            .filter_map(|(location, value)| match location {
                AbstractLocation::Parameter {
                    frame,
                    slot: ParamSlot::Index(index),
                } if *frame == self.frame && *value == ParameterValidationValue::Validated => {
                    Some(*index)
                }
                _ => None,
            })
            .collect()
    }
}

impl Analysis for ParameterValidationResult {
    const KIND: AnalysisKind = AnalysisKind::ParameterValidation;
    type Entry = ();

    fn cache(caches: &SessionCaches) -> &ResultCache<AnalysisKey<()>, Self> {
        &caches.param_validation
    }

    fn compute(ctx: &AnalysisContext<'_, '_>, _entry: &()) -> AnalysisResult<Self> {
        let points_to = ctx.prerequisite::<PointsToResult>()?;
        let value_content = if ctx.config().value_content {
            Some(ctx.prerequisite::<ValueContentResult>()?)
        } else {
            None
        };

        let frame = ctx.frame();
        let mut seed = ParameterValidationState::new(frame);
        for (i, parameter) in ctx.method().parameters().iter().enumerate() {
            if parameter.ty.is_reference() {
                let Some(slot) = ParamSlot::index(i) else {
                    log::warn!("{}: parameter {i} cannot be tracked", ctx.method());
                    break;
                };
                let location = AbstractLocation::Parameter { frame, slot };
                seed.set(location, ParameterValidationValue::NotValidated);
            }
        }

        let mut visitor = ParameterValidationVisitor {
            ctx,
            frame,
            points_to,
            value_content,
            hazards: BTreeMap::new(),
        };
        let dataflow = forward(ctx.cfg(), seed, &mut visitor, ctx.cancellation())?;

        let mut hazards: BTreeMap<u16, HazardousUsage> = BTreeMap::new();
        // the smallest operation wins
        for (operation, (parameters, span)) in visitor.hazards {
            if !dataflow.is_reachable(operation.block) {
                continue;
            }
            for index in parameters {
                hazards.entry(index).or_insert(HazardousUsage {
                    operation,
                    span,
                });
            }
        }
        if !hazards.is_empty() {
            log::debug!(
                "{}: {} hazardous parameter(s)",
                ctx.method(),
                hazards.len()
            );
        }

        Ok(Self {
            frame,
            exit: ctx.cfg().exit(),
            dataflow,
            hazards,
        })
    }

    fn frame(&self) -> Frame {
        self.frame
    }
}

struct ParameterValidationVisitor<'c, 's, 'a> {
    ctx: &'c AnalysisContext<'s, 'a>,
    frame: Frame,
    points_to: Arc<PointsToResult>,
    value_content: Option<Arc<ValueContentResult>>,
    /// Parameters found hazardous by the last visit of each operation.
    hazards: BTreeMap<OperationId, (BTreeSet<u16>, Option<Span>)>,
}

impl<'c, 's, 'a> OperationVisitor<'a> for ParameterValidationVisitor<'c, 's, 'a> {
    type State = ParameterValidationState;

    fn visit_operation(
        &mut self,
        state: &mut ParameterValidationState,
        id: OperationId,
        operation: &'a Operation,
    ) -> AnalysisResult<()> {
        let points_to_result = Arc::clone(&self.points_to);
        let pts = points_to_result.state_before(id);
        let mut hazardous = BTreeSet::new();

        for operand in operation.dereferenced_operands() {
            let value = points_to::evaluate(pts, operand);
            hazardous.extend(self.not_validated_parameters(state, &value));
            validate(state, &value);
        }

        let invocation = match &operation.kind {
            OperationKind::Invoke { call }
            | OperationKind::Assign {
                value: Value::Invoke(call),
                ..
            } => Some((call.callee.clone(), call.args.as_slice())),
            OperationKind::Assign {
                value: Value::New { class, args },
                ..
            } => Some((constructor_ref(self.ctx.repo(), class, args.len()), args.as_slice())),
            OperationKind::Assign { .. }
            | OperationKind::Return { .. }
            | OperationKind::Throw { .. }
            | OperationKind::Nop => None,
        };
        if let Some((callee, args)) = invocation {
            self.invoke(state, pts, id, &callee, args, &mut hazardous)?;
        }

        if hazardous.is_empty() {
            self.hazards.remove(&id);
        } else {
            self.hazards.insert(id, (hazardous, operation.span));
        }
        Ok(())
    }

    fn visit_branch(
        &mut self,
        state: &mut ParameterValidationState,
        from: BlockId,
        branch: &'a Branch,
    ) -> AnalysisResult<bool> {
        if let Some(value_content) = &self.value_content {
            if !value_content.edge_feasible(from, branch) {
                return Ok(false);
            }
        }
        if let Some((left, Comp::Eq | Comp::Ne, right)) = branch.assumption() {
            let checked = if right.is_null() {
                Some(left)
            } else if left.is_null() {
                Some(right)
            } else {
                None
            };
            if let Some(checked) = checked {
                let value = points_to::evaluate(self.points_to.block_exit(from), checked);
                validate(state, &value);
            }
        }
        Ok(true)
    }
}

impl<'c, 's, 'a> ParameterValidationVisitor<'c, 's, 'a> {
    /// Indices of the parameters of this frame among the not validated
    /// locations of `value`.
    fn not_validated_parameters(
        &self,
        state: &ParameterValidationState,
        value: &PointsToValue,
    ) -> Vec<u16> {
        value
            .non_null_locations()
            .filter(|location| state.get(location) == ParameterValidationValue::NotValidated)
            .filter_map(|location| match location {
                AbstractLocation::Parameter {
                    frame,
                    slot: ParamSlot::Index(index),
                } if *frame == self.frame => Some(*index),
                _ => None,
            })
            .collect()
    }

    fn invoke(
        &mut self,
        state: &mut ParameterValidationState,
        pts: &PointsToState,
        id: OperationId,
        callee: &MethodRef,
        args: &[Operand],
        hazardous: &mut BTreeSet<u16>,
    ) -> AnalysisResult<()> {
        let arg_values: Vec<_> = args
            .iter()
            .map(|arg| points_to::evaluate(pts, arg))
            .collect();

        if VALIDATORS.contains(&callee.name.as_str()) {
            for value in &arg_values {
                validate(state, value);
            }
            return Ok(());
        }

        match self
            .ctx
            .analyze_callee::<ParameterValidationResult>(id, callee, ())?
        {
            Some(results) => {
                let callee = results.result;
                for index in callee.hazardous_parameter_usages().keys() {
                    if let Some(value) = arg_values.get(*index as usize) {
                        hazardous.extend(self.not_validated_parameters(state, value));
                        validate(state, value);
                    }
                }
                for index in callee.validated_parameters() {
                    if let Some(value) = arg_values.get(index as usize) {
                        validate(state, value);
                    }
                }
            }
            None => {
                if self.ctx.is_pessimistic(AnalysisKind::ParameterValidation) {
                    for location in arg_values.iter().flat_map(|value| value.non_null_locations()) {
                        state.set(location.clone(), ParameterValidationValue::Unknown);
                    }
                }
            }
        }
        Ok(())
    }
}
