//! Copy analysis: which locals, parameters and static fields hold the same
//! value.
//!
//! The analysis is intraprocedural. Invocations only kill what a callee
//! could modify, that is static fields.

use crate::cache::ResultCache;
use crate::config::AnalysisKind;
use crate::dataflow::{
    forward, AbstractValue, AnalysisData, Dataflow, KeyedValue, OperationVisitor,
};
use crate::entity::{AnalysisEntity, Frame};
use crate::errors::AnalysisResult;
use crate::points_to::place_entity;
use crate::session::{Analysis, AnalysisContext, AnalysisKey, SessionCaches};
use fw_model::body::{Branch, Comp};
use fw_model::operations::{Operation, OperationKind, Value};
use fw_model::{BlockId, OperationId};
use std::collections::BTreeSet;
use std::fmt;

/// The other entities an entity is a copy of.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CopyValue {
    Bottom,
    Known(BTreeSet<AnalysisEntity>),
    /// No known copy.
    Unknown,
}

impl fmt::Display for CopyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bottom => write!(f, "⊥"),
            Self::Known(entities) => {
                let entities = entities
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "≡ {{{entities}}}")
            }
            Self::Unknown => write!(f, "⊤"),
        }
    }
}

impl CopyValue {
    #[must_use]
    pub fn from_set(entities: BTreeSet<AnalysisEntity>) -> Self {
        if entities.is_empty() {
            Self::Unknown
        } else {
            Self::Known(entities)
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = &AnalysisEntity> {
        match self {
            Self::Known(entities) => Some(entities),
            Self::Bottom | Self::Unknown => None,
        }
        .into_iter()
        .flatten()
    }
}

impl AbstractValue for CopyValue {
    fn bottom() -> Self {
        Self::Bottom
    }

    fn unknown() -> Self {
        Self::Unknown
    }

    /// Copies hold on a merge point only if they hold on every path.
    fn merge(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::Bottom, v) | (v, Self::Bottom) => v.clone(),
            (Self::Known(e1), Self::Known(e2)) => {
                Self::from_set(e1.intersection(e2).cloned().collect())
            }
        }
    }
}

impl KeyedValue<AnalysisEntity> for CopyValue {
    fn absent(_key: &AnalysisEntity, _frame: Frame) -> Self {
        Self::Unknown
    }
}

pub type CopyState = AnalysisData<AnalysisEntity, CopyValue>;

fn is_tracked(entity: &AnalysisEntity) -> bool {
    matches!(
        entity,
        AnalysisEntity::Local(_) | AnalysisEntity::Parameter(_) | AnalysisEntity::Static(_)
    )
}

/// The known copies of an entity.
#[must_use]
pub fn copies_of(state: &CopyState, entity: &AnalysisEntity) -> BTreeSet<AnalysisEntity> {
    state.get(entity).entities().cloned().collect()
}

/// Forgets every copy relation of an entity, before it is overwritten.
fn kill(state: &mut CopyState, entity: &AnalysisEntity) {
    for other in copies_of(state, entity) {
        let mut copies = copies_of(state, &other);
        copies.remove(entity);
        state.set(other, CopyValue::from_set(copies));
    }
    state.set(entity.clone(), CopyValue::Unknown);
}

/// Makes two entities, and all their copies, copies of each other.
fn relate(state: &mut CopyState, a: &AnalysisEntity, b: &AnalysisEntity) {
    let mut group = copies_of(state, a);
    group.extend(copies_of(state, b));
    group.insert(a.clone());
    group.insert(b.clone());
    for member in &group {
        let mut others = group.clone();
        others.remove(member);
        state.set(member.clone(), CopyValue::from_set(others));
    }
}

pub struct CopyResult {
    frame: Frame,
    dataflow: Dataflow<CopyState>,
    empty: CopyState,
}

impl CopyResult {
    #[inline]
    pub fn dataflow(&self) -> &Dataflow<CopyState> {
        &self.dataflow
    }

    pub fn state_before(&self, operation: OperationId) -> &CopyState {
        self.dataflow
            .state_before(operation)
            .unwrap_or(&self.empty)
    }

    pub fn block_exit(&self, block: BlockId) -> &CopyState {
        self.dataflow.exit_state(block).unwrap_or(&self.empty)
    }

    #[must_use]
    pub fn copies_before(
        &self,
        operation: OperationId,
        entity: &AnalysisEntity,
    ) -> BTreeSet<AnalysisEntity> {
        copies_of(self.state_before(operation), entity)
    }
}

impl Analysis for CopyResult {
    const KIND: AnalysisKind = AnalysisKind::Copy;
    type Entry = ();

    fn cache(caches: &SessionCaches) -> &ResultCache<AnalysisKey<()>, Self> {
        &caches.copy
    }

    fn compute(ctx: &AnalysisContext<'_, '_>, _entry: &()) -> AnalysisResult<Self> {
        let frame = ctx.frame();
        let dataflow = forward(
            ctx.cfg(),
            CopyState::new(frame),
            &mut CopyVisitor,
            ctx.cancellation(),
        )?;
        Ok(Self {
            frame,
            dataflow,
            empty: CopyState::new(frame),
        })
    }

    fn frame(&self) -> Frame {
        self.frame
    }
}

struct CopyVisitor;

impl CopyVisitor {
    fn kill_statics(state: &mut CopyState) {
        let statics: Vec<_> = state
            .keys()
            .filter(|entity| matches!(entity, AnalysisEntity::Static(_)))
            .cloned()
            .collect();
        for entity in &statics {
            kill(state, entity);
        }
    }
}

impl<'a> OperationVisitor<'a> for CopyVisitor {
    type State = CopyState;

    fn visit_operation(
        &mut self,
        state: &mut CopyState,
        _id: OperationId,
        operation: &'a Operation,
    ) -> AnalysisResult<()> {
        match &operation.kind {
            OperationKind::Assign { target, value } => {
                if matches!(value, Value::Invoke(_) | Value::New { .. }) {
                    Self::kill_statics(state);
                }
                let Some(target) = place_entity(target).filter(is_tracked) else {
                    return Ok(());
                };
                let source = match value {
                    Value::Use(source) => place_entity(source).filter(is_tracked),
                    _ => None,
                };
                if source.as_ref() == Some(&target) {
                    return Ok(());
                }
                kill(state, &target);
                if let Some(source) = source {
                    relate(state, &target, &source);
                }
            }
            OperationKind::Invoke { .. } => Self::kill_statics(state),
            OperationKind::Return { .. } | OperationKind::Throw { .. } | OperationKind::Nop => (),
        }
        Ok(())
    }

    fn visit_branch(
        &mut self,
        state: &mut CopyState,
        _from: BlockId,
        branch: &'a Branch,
    ) -> AnalysisResult<bool> {
        if let Some((left, Comp::Eq, right)) = branch.assumption() {
            if let (Some(left), Some(right)) = (
                place_entity(left).filter(is_tracked),
                place_entity(right).filter(is_tracked),
            ) {
                if left != right {
                    relate(state, &left, &right);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::dataflow::lattice::check_lattice_laws;
    use crate::entity::ParamSlot;
    use crate::repo::Repo;
    use crate::session::AnalysisSession;
    use crate::testing::*;
    use fw_model::operations::{FieldRef, LocalId, Operand};

    fn l(n: u32) -> AnalysisEntity {
        AnalysisEntity::Local(LocalId(n))
    }

    fn p(i: u16) -> AnalysisEntity {
        AnalysisEntity::Parameter(ParamSlot::Index(i))
    }

    fn set(entities: &[AnalysisEntity]) -> BTreeSet<AnalysisEntity> {
        entities.iter().cloned().collect()
    }

    #[test]
    fn lattice_laws() {
        check_lattice_laws(&[
            CopyValue::Bottom,
            CopyValue::Unknown,
            CopyValue::Known(set(&[l(0)])),
            CopyValue::Known(set(&[l(0), l(1)])),
            CopyValue::Known(set(&[l(2)])),
        ]);
    }

    #[test]
    fn copies_are_tracked_and_killed() {
        let program = program(vec![class(
            "C",
            &[],
            &[],
            vec![static_method(
                "m",
                &[("p", "C")],
                Some(straight(vec![
                    assign(local(0), use_(param(0))),
                    assign(local(1), use_(local(0))),
                    assign(local(0), use_(null())),
                    ret(None),
                ])),
            )],
        )]);
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<CopyResult>(m).unwrap();

        let before_kill = OperationId::new(BlockId(1), 2);
        assert_eq!(result.copies_before(before_kill, &l(1)), set(&[l(0), p(0)]));
        assert_eq!(result.copies_before(before_kill, &p(0)), set(&[l(0), l(1)]));

        let after_kill = OperationId::new(BlockId(1), 3);
        assert_eq!(result.copies_before(after_kill, &l(1)), set(&[p(0)]));
        assert!(result.copies_before(after_kill, &l(0)).is_empty());
    }

    #[test]
    fn equality_branches_relate_and_joins_intersect() {
        let body = body(vec![
            entry(0, vec![seq(1)]),
            block(
                1,
                vec![],
                vec![
                    if_true(2, cond(param(0), Comp::Eq, param(1))),
                    if_false(3, cond(param(0), Comp::Eq, param(1))),
                ],
            ),
            block(2, vec![assign(local(0), use_(param(0)))], vec![seq(4)]),
            block(3, vec![assign(local(0), use_(param(0)))], vec![seq(4)]),
            block(4, vec![ret(None)], vec![seq(5)]),
            exit(5),
        ]);
        let program = program(vec![class(
            "C",
            &[],
            &[],
            vec![static_method("m", &[("a", "C"), ("b", "C")], Some(body))],
        )]);
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<CopyResult>(m).unwrap();

        assert_eq!(
            copies_of(result.block_exit(BlockId(2)), &l(0)),
            set(&[p(0), p(1)])
        );
        assert_eq!(copies_of(result.block_exit(BlockId(3)), &l(0)), set(&[p(0)]));
        assert_eq!(
            result.copies_before(OperationId::new(BlockId(4), 0), &l(0)),
            set(&[p(0)])
        );
    }

    #[test]
    fn invocations_kill_static_copies() {
        let program = program(vec![class(
            "C",
            &[],
            &[],
            vec![static_method(
                "m",
                &[],
                Some(straight(vec![
                    assign(local(0), use_(Operand::Static(FieldRef::new("C", "s")))),
                    invoke(call("Ext", "touch", &[], None, vec![])),
                    ret(None),
                ])),
            )],
        )]);
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let result = session.analyze::<CopyResult>(m).unwrap();
        assert_eq!(result.copies_before(OperationId::new(BlockId(1), 1), &l(0)).len(), 1);
        assert!(result
            .copies_before(OperationId::new(BlockId(1), 2), &l(0))
            .is_empty());
    }
}
