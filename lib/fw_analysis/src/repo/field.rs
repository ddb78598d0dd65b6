use crate::repo::FieldUid;
use fw_model::operations::FieldRef;
use fw_model::types::{FieldFlags, TypeName};
use fw_model::FieldDef;
use std::fmt;

/// A field definition registered in the repository.
#[derive(Debug, Clone)]
pub struct Field<'a> {
    uid: FieldUid,
    def: &'a FieldDef,
    // Reference used by operations to designate this field
    reference: FieldRef,
}

impl<'a> Field<'a> {
    pub(crate) fn new(uid: FieldUid, class_name: &TypeName, def: &'a FieldDef) -> Self {
        Self {
            uid,
            def,
            reference: FieldRef::new(class_name.clone(), def.name.clone()),
        }
    }

    #[inline]
    pub fn uid(&self) -> FieldUid {
        self.uid
    }

    #[inline]
    pub fn reference(&self) -> &FieldRef {
        &self.reference
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    #[inline]
    pub fn type_(&self) -> &TypeName {
        &self.def.ty
    }

    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.def.flags().contains(FieldFlags::STATIC)
    }
}

impl<'a> fmt::Display for Field<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.def.ty, self.reference)
    }
}
