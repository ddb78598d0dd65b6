//! Abstract locations and analysis entities.
//!
//! An [`AbstractLocation`] is the identity of an object an expression may
//! point to. An [`AnalysisEntity`] is a storage place (local, parameter,
//! field of a location, static field, return slot) whose content is
//! tracked by entity-keyed analyses such as points-to.
//!
//! Locations that stand for objects existing before a method started
//! (parameters, initial fields content) are tagged with the [`Frame`] of
//! the analysis that materialized them. When a callee result is spliced
//! back into its caller, exactly the locations tagged with the callee frame
//! are substituted by caller values.

use crate::interprocedural::CallSite;
use crate::repo::MethodUid;
use fw_model::operations::{FieldRef, LocalId, Operand};
use fw_model::OperationId;
use std::fmt;

/// Maximum number of nested field dereferences tracked from a parameter
/// or static field.
pub const MAX_ACCESS_PATH_DEPTH: usize = 3;

/// One analysis activation: a method analyzed at a given call depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame {
    pub method: MethodUid,
    pub depth: usize,
}

impl Frame {
    #[must_use]
    pub const fn new(method: MethodUid, depth: usize) -> Self {
        Self { method, depth }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.method, self.depth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamSlot {
    This,
    Index(u16),
}

impl ParamSlot {
    #[must_use]
    pub fn of(operand: &Operand) -> Option<Self> {
        match operand {
            Operand::This => Some(Self::This),
            Operand::Param(idx) => Some(Self::Index(*idx)),
            _ => None,
        }
    }

    /// Slot of the `i`-th declared parameter, `None` when `i` is not
    /// addressable by a parameter operand.
    #[must_use]
    pub fn index(i: usize) -> Option<Self> {
        u16::try_from(i).ok().map(Self::Index)
    }
}

impl fmt::Display for ParamSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::This => write!(f, "this"),
            Self::Index(idx) => write!(f, "p{idx}"),
        }
    }
}

/// The allocation operation of an object, in its calling context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreationSite {
    pub method: MethodUid,
    pub operation: OperationId,
    pub context: Vec<CallSite>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AbstractLocation {
    Null,
    Creation(CreationSite),
    Parameter {
        frame: Frame,
        slot: ParamSlot,
    },
    FieldDefault {
        frame: Frame,
        instance: Box<AbstractLocation>,
        field: FieldRef,
    },
    StaticDefault {
        frame: Frame,
        field: FieldRef,
    },
}

impl AbstractLocation {
    /// The frame that materialized this location, for locations standing
    /// for pre-existing objects.
    #[must_use]
    pub fn frame(&self) -> Option<Frame> {
        match self {
            Self::Parameter { frame, .. }
            | Self::FieldDefault { frame, .. }
            | Self::StaticDefault { frame, .. } => Some(*frame),
            Self::Null | Self::Creation(_) => None,
        }
    }

    #[must_use]
    pub fn access_depth(&self) -> usize {
        match self {
            Self::FieldDefault { instance, .. } => 1 + instance.access_depth(),
            _ => 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn creation_site(&self) -> Option<&CreationSite> {
        match self {
            Self::Creation(site) => Some(site),
            _ => None,
        }
    }
}

impl fmt::Display for AbstractLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Creation(site) => {
                write!(f, "new@{}:{}", site.method, site.operation)?;
                if !site.context.is_empty() {
                    write!(f, "[{}]", site.context.len())?;
                }
                Ok(())
            }
            Self::Parameter { frame, slot } => write!(f, "{slot}@{frame}"),
            Self::FieldDefault {
                instance, field, ..
            } => write!(f, "({instance}).{}", field.name),
            Self::StaticDefault { frame, field } => write!(f, "{field}@{frame}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalysisEntity {
    Local(LocalId),
    Parameter(ParamSlot),
    Field {
        instance: AbstractLocation,
        field: FieldRef,
    },
    Static(FieldRef),
    Return,
}

impl AnalysisEntity {
    /// The location an entity points to before anything was written to it
    /// in the given frame. Locals and the return slot have none, and
    /// access paths deeper than [`MAX_ACCESS_PATH_DEPTH`] are not tracked.
    #[must_use]
    pub fn default_location(&self, frame: Frame) -> Option<AbstractLocation> {
        match self {
            Self::Parameter(slot) => Some(AbstractLocation::Parameter { frame, slot: *slot }),
            Self::Field { instance, field } => (!instance.is_null()
                && instance.access_depth() < MAX_ACCESS_PATH_DEPTH)
                .then(|| AbstractLocation::FieldDefault {
                    frame,
                    instance: Box::new(instance.clone()),
                    field: field.clone(),
                }),
            Self::Static(field) => Some(AbstractLocation::StaticDefault {
                frame,
                field: field.clone(),
            }),
            Self::Local(_) | Self::Return => None,
        }
    }

    /// The location owning this entity, for fields.
    #[must_use]
    pub fn instance(&self) -> Option<&AbstractLocation> {
        match self {
            Self::Field { instance, .. } => Some(instance),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisEntity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Local(id) => write!(f, "{id}"),
            Self::Parameter(slot) => write!(f, "{slot}"),
            Self::Field { instance, field } => write!(f, "{instance}.{}", field.name),
            Self::Static(field) => write!(f, "{field}"),
            Self::Return => write!(f, "<return>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_slots() {
        assert_eq!(ParamSlot::of(&Operand::This), Some(ParamSlot::This));
        assert_eq!(ParamSlot::of(&Operand::Param(3)), Some(ParamSlot::Index(3)));
        assert_eq!(ParamSlot::index(3), Some(ParamSlot::Index(3)));
        assert_eq!(ParamSlot::index(65_535), Some(ParamSlot::Index(u16::MAX)));
        assert_eq!(ParamSlot::index(65_536), None);
    }
}
