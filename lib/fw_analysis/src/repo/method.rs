use crate::repo::{ClassUid, MethodUid};
use fw_model::body::Body;
use fw_model::operations::MethodRef;
use fw_model::types::{MethodFlags, TypeName};
use fw_model::{MethodDef, ParameterDef};
use std::fmt;

/// A method definition registered in the repository.
#[derive(Debug, Clone)]
pub struct Method<'a> {
    // Unique identifier in the repository
    uid: MethodUid,
    // Declaring class
    class: ClassUid,
    // Raw definition
    def: &'a MethodDef,
    // Cached modifiers
    flags: MethodFlags,
    // Cache of names and types that identify the method
    descriptor: MethodDescr,
}

impl<'a> Method<'a> {
    pub(crate) fn new(uid: MethodUid, class: ClassUid, class_name: &TypeName, def: &'a MethodDef) -> Self {
        Self {
            uid,
            class,
            def,
            flags: def.flags(),
            descriptor: MethodDescr::from(&def.reference(class_name)),
        }
    }

    #[inline]
    pub fn uid(&self) -> MethodUid {
        self.uid
    }

    #[inline]
    pub fn class(&self) -> ClassUid {
        self.class
    }

    #[inline]
    pub fn descriptor(&self) -> &MethodDescr {
        &self.descriptor
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// A reference designating this method, as found in invocations.
    #[must_use]
    pub fn reference(&self) -> MethodRef {
        self.def.reference(self.definer())
    }

    #[inline]
    pub fn definer(&self) -> &TypeName {
        self.descriptor.definer()
    }

    #[inline]
    pub fn return_type(&self) -> &TypeName {
        &self.def.return_type
    }

    #[inline]
    pub fn parameters(&self) -> &'a [ParameterDef] {
        &self.def.parameters
    }

    #[inline]
    pub fn nb_parameters(&self) -> usize {
        self.def.parameters.len()
    }

    #[must_use]
    pub fn body(&self) -> Option<&'a Body> {
        self.def.body.as_ref()
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> MethodFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.flags.contains(MethodFlags::PUBLIC)
    }

    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    #[inline]
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.flags.contains(MethodFlags::ABSTRACT)
    }

    #[inline]
    #[must_use]
    pub const fn is_extern(&self) -> bool {
        self.flags.contains(MethodFlags::EXTERN)
    }

    #[inline]
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.def.is_constructor()
    }
}

impl<'a> fmt::Display for Method<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.flags, self.descriptor)
    }
}

/// A wrapper to cache the identity of a method and to allow deriving of
/// eq and ord traits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodDescr {
    definer: TypeName,
    name: String,
    parameters_types: Vec<TypeName>,
}

impl From<&MethodRef> for MethodDescr {
    fn from(reference: &MethodRef) -> Self {
        Self {
            definer: reference.class.clone(),
            name: reference.name.clone(),
            parameters_types: reference.parameters.clone(),
        }
    }
}

impl fmt::Display for MethodDescr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parameters = self
            .parameters_types
            .iter()
            .map(TypeName::as_str)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}::{}({})", self.definer, self.name, parameters)
    }
}

impl MethodDescr {
    #[inline]
    pub fn definer(&self) -> &TypeName {
        &self.definer
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parameters_types(&self) -> &[TypeName] {
        &self.parameters_types
    }
}
