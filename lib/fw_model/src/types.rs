//! Type names and declaration modifiers.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

const PRIMITIVES: [&str; 9] = [
    "bool", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// A fully qualified type name, such as `System.IO.Stream` or `int`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn void() -> Self {
        Self::new("void")
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for value types, whose instances can never be null.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        PRIMITIVES.contains(&self.0.as_str())
    }

    /// Returns `true` when a value of this type may hold a null reference.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Abstract,
    Virtual,
    Sealed,
    Extern,
    Readonly,
}

bitflags! {
    pub struct MethodFlags: u32 {
        const PUBLIC    = 0x0001;
        const PRIVATE   = 0x0002;
        const PROTECTED = 0x0004;
        const INTERNAL  = 0x0008;
        const STATIC    = 0x0010;
        const ABSTRACT  = 0x0020;
        const VIRTUAL   = 0x0040;
        const SEALED    = 0x0080;
        const EXTERN    = 0x0100;
    }
}

impl MethodFlags {
    #[must_use]
    pub fn from_modifiers(modifiers: &[Modifier]) -> Self {
        modifiers.iter().fold(Self::empty(), |flags, modifier| {
            flags
                | match modifier {
                    Modifier::Public => Self::PUBLIC,
                    Modifier::Private => Self::PRIVATE,
                    Modifier::Protected => Self::PROTECTED,
                    Modifier::Internal => Self::INTERNAL,
                    Modifier::Static => Self::STATIC,
                    Modifier::Abstract => Self::ABSTRACT,
                    Modifier::Virtual => Self::VIRTUAL,
                    Modifier::Sealed => Self::SEALED,
                    Modifier::Extern => Self::EXTERN,
                    Modifier::Readonly => Self::empty(),
                }
        })
    }
}

impl fmt::Display for MethodFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.contains(Self::PUBLIC) {
            write!(f, "public ")?;
        }
        if self.contains(Self::PRIVATE) {
            write!(f, "private ")?;
        }
        if self.contains(Self::PROTECTED) {
            write!(f, "protected ")?;
        }
        if self.contains(Self::INTERNAL) {
            write!(f, "internal ")?;
        }
        if self.contains(Self::STATIC) {
            write!(f, "static ")?;
        }
        if self.contains(Self::ABSTRACT) {
            write!(f, "abstract ")?;
        }
        if self.contains(Self::VIRTUAL) {
            write!(f, "virtual ")?;
        }
        if self.contains(Self::SEALED) {
            write!(f, "sealed ")?;
        }
        if self.contains(Self::EXTERN) {
            write!(f, "extern ")?;
        }
        Ok(())
    }
}

bitflags! {
    pub struct FieldFlags: u32 {
        const PUBLIC   = 0x0001;
        const PRIVATE  = 0x0002;
        const STATIC   = 0x0010;
        const READONLY = 0x0200;
    }
}

impl FieldFlags {
    #[must_use]
    pub fn from_modifiers(modifiers: &[Modifier]) -> Self {
        modifiers.iter().fold(Self::empty(), |flags, modifier| {
            flags
                | match modifier {
                    Modifier::Public => Self::PUBLIC,
                    Modifier::Private => Self::PRIVATE,
                    Modifier::Static => Self::STATIC,
                    Modifier::Readonly => Self::READONLY,
                    _ => Self::empty(),
                }
        })
    }
}
