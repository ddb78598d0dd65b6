//! Interprocedural context and call effects substitution.
//!
//! Callees are analyzed in their own frame, with their own parameter
//! locations. Their result is then rewritten in terms of the caller's
//! locations by a [`Substitution`] built from the caller's points-to state
//! at the call site.

use crate::config::{AnalysisConfig, InterproceduralAnalysisKind};
use crate::dataflow::{AbstractValue, AnalysisData, KeyedValue};
use crate::entity::{AbstractLocation, AnalysisEntity, Frame, ParamSlot};
use crate::points_to::{read_field, PointsToState, PointsToValue, Targets};
use crate::repo::{Method, MethodUid, Repo};
use fw_model::operations::MethodRef;
use fw_model::OperationId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Initial knowledge about the parameters of a callee, given by a
/// context-sensitive caller.
pub type ArgumentValues<V> = BTreeMap<ParamSlot, V>;

/// One step of a call chain.
///
/// The calling operation is only recorded by context-sensitive analyses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallSite {
    pub caller: MethodUid,
    pub operation: Option<OperationId>,
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.operation {
            Some(operation) => write!(f, "{}@{operation}", self.caller),
            None => write!(f, "{}", self.caller),
        }
    }
}

/// The chain of calls that led to the analyzed method.
///
/// Contexts are never mutated: following a call produces a new context.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterproceduralContext {
    call_stack: Vec<CallSite>,
}

impl InterproceduralContext {
    /// The context of a method analyzed on its own.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.call_stack.len()
    }

    #[inline]
    #[must_use]
    pub fn call_stack(&self) -> &[CallSite] {
        &self.call_stack
    }

    #[must_use]
    pub fn push(&self, site: CallSite) -> Self {
        let mut call_stack = self.call_stack.clone();
        call_stack.push(site);
        Self { call_stack }
    }

    /// Returns `true` if the given method is already being analyzed down
    /// this call chain.
    #[must_use]
    pub fn is_recursive_call(&self, method: MethodUid) -> bool {
        self.call_stack.iter().any(|site| site.caller == method)
    }
}

impl fmt::Display for InterproceduralContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, site) in self.call_stack.iter().enumerate() {
            if i > 0 {
                write!(f, " > ")?;
            }
            write!(f, "{site}")?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Disabled,
    MissingCallee,
    NoBody,
    DepthExceeded,
    RecursionBound,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "interprocedural analysis is disabled"),
            Self::MissingCallee => write!(f, "callee not found"),
            Self::NoBody => write!(f, "callee has no body"),
            Self::DepthExceeded => write!(f, "maximum call chain length reached"),
            Self::RecursionBound => write!(f, "recursion bound reached"),
        }
    }
}

/// How an invocation is accounted for.
pub enum CallOutcome<'a> {
    /// The callee is analyzed in the given context.
    Analyze {
        callee: &'a Method<'a>,
        context: InterproceduralContext,
    },
    /// The call effects are approximated according to the pessimistic mode.
    Fallback(FallbackReason),
}

/// Decides whether the invocation of `callee` by `caller` at `operation`
/// is followed.
pub fn resolve_call<'a>(
    repo: &'a Repo<'a>,
    config: &AnalysisConfig,
    context: &InterproceduralContext,
    caller: MethodUid,
    operation: OperationId,
    callee: &MethodRef,
) -> CallOutcome<'a> {
    let outcome = resolve_call_impl(repo, config, context, caller, operation, callee);
    if let CallOutcome::Fallback(reason) = &outcome {
        log::trace!("not following call to {callee} at {operation}: {reason}");
    }
    outcome
}

fn resolve_call_impl<'a>(
    repo: &'a Repo<'a>,
    config: &AnalysisConfig,
    context: &InterproceduralContext,
    caller: MethodUid,
    operation: OperationId,
    callee: &MethodRef,
) -> CallOutcome<'a> {
    let site = match config.interprocedural {
        InterproceduralAnalysisKind::None => {
            return CallOutcome::Fallback(FallbackReason::Disabled)
        }
        InterproceduralAnalysisKind::NonContextSensitive => CallSite {
            caller,
            operation: None,
        },
        InterproceduralAnalysisKind::ContextSensitive => CallSite {
            caller,
            operation: Some(operation),
        },
    };
    let Some(method) = repo.resolve_method(callee) else {
        return CallOutcome::Fallback(FallbackReason::MissingCallee);
    };
    if method.body().is_none() {
        return CallOutcome::Fallback(FallbackReason::NoBody);
    }
    if context.depth() >= config.max_call_chain {
        let recursive = caller == method.uid() || context.is_recursive_call(method.uid());
        return CallOutcome::Fallback(if recursive {
            FallbackReason::RecursionBound
        } else {
            FallbackReason::DepthExceeded
        });
    }
    CallOutcome::Analyze {
        callee: method,
        context: context.push(site),
    }
}

/// Rewrites callee locations into caller locations.
pub struct Substitution<'p> {
    callee: Frame,
    caller: &'p PointsToState,
    receiver: PointsToValue,
    args: Vec<PointsToValue>,
}

impl<'p> Substitution<'p> {
    /// `caller` is the caller's points-to state right before the call,
    /// `receiver` and `args` the values of the invocation operands in it.
    #[must_use]
    pub fn new(
        callee: Frame,
        caller: &'p PointsToState,
        receiver: Option<PointsToValue>,
        args: Vec<PointsToValue>,
    ) -> Self {
        Self {
            callee,
            caller,
            receiver: receiver.unwrap_or(PointsToValue::Unknown),
            args,
        }
    }

    #[inline]
    #[must_use]
    pub fn callee(&self) -> Frame {
        self.callee
    }

    /// The caller locations a callee location may stand for.
    #[must_use]
    pub fn location(&self, location: &AbstractLocation) -> PointsToValue {
        if location.frame() != Some(self.callee) {
            return PointsToValue::single(location.clone());
        }
        match location {
            AbstractLocation::Parameter {
                slot: ParamSlot::This,
                ..
            } => self.receiver.clone(),
            AbstractLocation::Parameter {
                slot: ParamSlot::Index(idx),
                ..
            } => self
                .args
                .get(*idx as usize)
                .cloned()
                .unwrap_or(PointsToValue::Unknown),
            AbstractLocation::StaticDefault { field, .. } => {
                self.caller.get(&AnalysisEntity::Static(field.clone()))
            }
            AbstractLocation::FieldDefault {
                instance, field, ..
            } => read_field(self.caller, &self.location(instance), field),
            AbstractLocation::Null | AbstractLocation::Creation(_) => {
                PointsToValue::single(location.clone())
            }
        }
    }

    #[must_use]
    pub fn value(&self, value: &PointsToValue) -> PointsToValue {
        match value {
            PointsToValue::Known(locations) => locations
                .iter()
                .map(|location| self.location(location))
                .fold(PointsToValue::Bottom, |acc, v| acc.merge(&v)),
            other => other.clone(),
        }
    }

    /// Non-null caller locations of a callee location, `None` when they
    /// are unknown.
    #[must_use]
    pub fn locations(&self, location: &AbstractLocation) -> Option<BTreeSet<AbstractLocation>> {
        match self.location(location) {
            PointsToValue::Bottom => Some(BTreeSet::new()),
            PointsToValue::Known(locations) => Some(
                locations
                    .into_iter()
                    .filter(|location| !location.is_null())
                    .collect(),
            ),
            PointsToValue::Unknown => None,
        }
    }

    /// The caller entities standing for a callee entity that outlives the
    /// call, with whether a strong update applies to them.
    #[must_use]
    pub fn entity(&self, entity: &AnalysisEntity) -> Option<(Vec<AnalysisEntity>, bool)> {
        match entity {
            AnalysisEntity::Static(field) => {
                Some((vec![AnalysisEntity::Static(field.clone())], true))
            }
            AnalysisEntity::Field { instance, field } => {
                let targets: Vec<_> = self
                    .locations(instance)?
                    .into_iter()
                    .map(|instance| AnalysisEntity::Field {
                        instance,
                        field: field.clone(),
                    })
                    .collect();
                let strong = targets.len() == 1;
                Some((targets, strong))
            }
            AnalysisEntity::Local(_) | AnalysisEntity::Parameter(_) | AnalysisEntity::Return => {
                None
            }
        }
    }
}

/// Applies the exit state of a callee to the caller state, for an analysis
/// keyed by entities. Returns the callee's return value.
///
/// Every field or static field the callee wrote, according to its own
/// state or to its points-to exit state, takes its callee exit value.
pub fn splice_entities<V: KeyedValue<AnalysisEntity>>(
    state: &mut AnalysisData<AnalysisEntity, V>,
    callee: Option<&AnalysisData<AnalysisEntity, V>>,
    callee_points_to: Option<&PointsToState>,
    subst: &Substitution,
) -> V {
    let Some(exit) = callee else {
        return V::bottom();
    };
    let written: BTreeSet<&AnalysisEntity> = exit
        .keys()
        .chain(callee_points_to.into_iter().flat_map(AnalysisData::keys))
        .filter(|entity| {
            matches!(
                entity,
                AnalysisEntity::Field { .. } | AnalysisEntity::Static(_)
            )
        })
        .collect();
    for entity in written {
        if let Some((entities, strong)) = subst.entity(entity) {
            Targets { entities, strong }.write(state, &exit.get(entity));
        }
    }
    exit.get(&AnalysisEntity::Return)
}

/// Forgets the static fields and the fields of the escaping locations, for
/// analyses where a missing entry means unknown. `None` stands for
/// locations that are not known, in which case every field is forgotten.
///
/// Only the first level of fields is forgotten.
pub(crate) fn forget_escaping<V: KeyedValue<AnalysisEntity>>(
    state: &mut AnalysisData<AnalysisEntity, V>,
    escaping: Option<&BTreeSet<AbstractLocation>>,
) {
    state.retain(|entity, _| match entity {
        AnalysisEntity::Field { instance, .. } => {
            escaping.map_or(false, |escaping| !escaping.contains(instance))
        }
        AnalysisEntity::Static(_) => false,
        AnalysisEntity::Local(_) | AnalysisEntity::Parameter(_) | AnalysisEntity::Return => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use fw_model::operations::FieldRef;
    use fw_model::BlockId;

    #[test]
    fn context_push_is_persistent() {
        let root = InterproceduralContext::root();
        let site = CallSite {
            caller: crate::repo::MethodUid::first(),
            operation: None,
        };
        let child = root.push(site.clone());
        assert_eq!(root.depth(), 0);
        assert_eq!(child.depth(), 1);
        assert!(child.is_recursive_call(site.caller));
        assert_ne!(root, child);
    }

    #[test]
    fn call_resolution() {
        let program = program(vec![class(
            "C",
            &[],
            &[],
            vec![
                static_method("f", &[], Some(straight(vec![ret(None)]))),
                static_method("g", &[], None),
                static_method("h", &[], Some(straight(vec![ret(None)]))),
            ],
        )]);
        let repo = Repo::new(&program).unwrap();
        let f = find_method(&repo, "C", "f");
        let h = find_method(&repo, "C", "h");
        let op = OperationId::new(BlockId(1), 0);
        let config = AnalysisConfig::default();
        let root = InterproceduralContext::root();

        let callee = MethodRef::new("C", "f", vec![]);
        match resolve_call(&repo, &config, &root, f.uid(), op, &callee) {
            CallOutcome::Analyze { callee, context } => {
                assert_eq!(callee.uid(), f.uid());
                assert_eq!(context.call_stack()[0].operation, Some(op));
            }
            CallOutcome::Fallback(reason) => panic!("unexpected fallback: {reason}"),
        }

        let no_body = MethodRef::new("C", "g", vec![]);
        assert!(matches!(
            resolve_call(&repo, &config, &root, f.uid(), op, &no_body),
            CallOutcome::Fallback(FallbackReason::NoBody)
        ));
        let missing = MethodRef::new("D", "h", vec![]);
        assert!(matches!(
            resolve_call(&repo, &config, &root, f.uid(), op, &missing),
            CallOutcome::Fallback(FallbackReason::MissingCallee)
        ));

        let mut deep = root.clone();
        for _ in 0..config.max_call_chain {
            deep = deep.push(CallSite {
                caller: h.uid(),
                operation: Some(op),
            });
        }
        assert!(matches!(
            resolve_call(&repo, &config, &deep, h.uid(), op, &callee),
            CallOutcome::Fallback(FallbackReason::DepthExceeded)
        ));
        // f is already on the chain
        let recursive = deep.push(CallSite {
            caller: f.uid(),
            operation: Some(op),
        });
        assert!(matches!(
            resolve_call(&repo, &config, &recursive, h.uid(), op, &callee),
            CallOutcome::Fallback(FallbackReason::RecursionBound)
        ));
        assert!(matches!(
            resolve_call(&repo, &config, &deep, f.uid(), op, &callee),
            CallOutcome::Fallback(FallbackReason::RecursionBound)
        ));

        let disabled = AnalysisConfig {
            interprocedural: InterproceduralAnalysisKind::None,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            resolve_call(&repo, &disabled, &root, f.uid(), op, &callee),
            CallOutcome::Fallback(FallbackReason::Disabled)
        ));

        let insensitive = AnalysisConfig {
            interprocedural: InterproceduralAnalysisKind::NonContextSensitive,
            ..AnalysisConfig::default()
        };
        match resolve_call(&repo, &insensitive, &root, f.uid(), op, &callee) {
            CallOutcome::Analyze { context, .. } => {
                assert_eq!(context.call_stack()[0].operation, None);
            }
            CallOutcome::Fallback(reason) => panic!("unexpected fallback: {reason}"),
        }
    }

    #[test]
    fn substitution_of_callee_locations() {
        let caller_frame = Frame::new(crate::repo::MethodUid::first(), 0);
        let callee_frame = Frame::new(crate::repo::MethodUid::first(), 1);
        let caller = PointsToState::new(caller_frame);
        let caller_this = AbstractLocation::Parameter {
            frame: caller_frame,
            slot: ParamSlot::This,
        };
        let arg = PointsToValue::single(caller_this.clone());
        let subst = Substitution::new(callee_frame, &caller, None, vec![arg.clone()]);

        let callee_p0 = AbstractLocation::Parameter {
            frame: callee_frame,
            slot: ParamSlot::Index(0),
        };
        assert_eq!(subst.location(&callee_p0), arg);

        // fields of callee parameters read the caller's field content
        let field = FieldRef::new("C", "f");
        let callee_field = AbstractLocation::FieldDefault {
            frame: callee_frame,
            instance: Box::new(callee_p0.clone()),
            field: field.clone(),
        };
        let expected = AbstractLocation::FieldDefault {
            frame: caller_frame,
            instance: Box::new(caller_this),
            field,
        };
        assert_eq!(subst.location(&callee_field), PointsToValue::single(expected));

        // locations of other frames are kept
        assert_eq!(
            subst.location(&AbstractLocation::Null),
            PointsToValue::single(AbstractLocation::Null)
        );
        // missing arguments and receiver are unknown
        let callee_p1 = AbstractLocation::Parameter {
            frame: callee_frame,
            slot: ParamSlot::Index(1),
        };
        assert!(subst.location(&callee_p1).is_unknown());
        let callee_this = AbstractLocation::Parameter {
            frame: callee_frame,
            slot: ParamSlot::This,
        };
        assert!(subst.locations(&callee_this).is_none());
    }
}
