use std::fmt;
use std::num::NonZeroUsize;

macro_rules! repo_uid {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroUsize);

        impl $name {
            /// Position of the designated item in the repository arena.
            #[allow(dead_code)]
            pub(crate) fn idx(self) -> usize {
                self.0.get() - 1
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

repo_uid!(
    /// Identity of a class registered in a repository.
    ClassUid,
    "c"
);
repo_uid!(
    /// Identity of a method registered in a repository.
    MethodUid,
    "m"
);
repo_uid!(
    /// Identity of a field registered in a repository.
    FieldUid,
    "f"
);

#[cfg(test)]
impl MethodUid {
    pub(crate) fn first() -> Self {
        Self(NonZeroUsize::MIN)
    }
}

/// Uid allocation. Uids are 1-based and allocated in registration order.
#[derive(Debug, Default)]
pub struct RepoCounters {
    classes: usize,
    methods: usize,
    fields: usize,
}

fn next(counter: &mut usize) -> NonZeroUsize {
    *counter += 1;
    NonZeroUsize::MIN.saturating_add(*counter - 1)
}

impl RepoCounters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn new_class_uid(&mut self) -> ClassUid {
        ClassUid(next(&mut self.classes))
    }

    pub(crate) fn new_method_uid(&mut self) -> MethodUid {
        MethodUid(next(&mut self.methods))
    }

    pub(crate) fn new_field_uid(&mut self) -> FieldUid {
        FieldUid(next(&mut self.fields))
    }

    pub(crate) fn nb_classes(&self) -> usize {
        self.classes
    }

    pub(crate) fn nb_methods(&self) -> usize {
        self.methods
    }

    pub(crate) fn nb_fields(&self) -> usize {
        self.fields
    }
}
