use crate::repo::*;
use fw_model::types::TypeName;
use fw_model::ClassDef;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

/// A class registered in the repository.
///
/// Classes that are only referenced (as base class or implemented
/// interface) without being defined in the program are kept as
/// declarations, without methods nor fields.
#[derive(Debug, Clone)]
pub struct Class<'a> {
    // Unique identifier in the repository
    uid: ClassUid,
    // Optional definition
    def: Option<&'a ClassDef>,
    // Cache of name that identify the class
    name: TypeName,
    // List of contained methods (declaration level)
    methods: Vec<MethodUid>,
    // List of contained fields (declaration level)
    fields: Vec<FieldUid>,
}

impl<'a> PartialEq for Class<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl<'a> Eq for Class<'a> {}

impl<'a> PartialOrd for Class<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> Ord for Class<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uid.cmp(&other.uid)
    }
}

impl<'a> fmt::Display for Class<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl<'a> Class<'a> {
    /// Registers a class definition along with its methods and fields.
    pub(crate) fn new_impl(
        uid: ClassUid,
        def: &'a ClassDef,
        counters: &mut RepoCounters,
        methods: &mut Vec<Method<'a>>,
        fields: &mut Vec<Field<'a>>,
    ) -> Self {
        let class_methods = def
            .methods
            .iter()
            .map(|method_def| {
                let method_uid = counters.new_method_uid();
                methods.push(Method::new(method_uid, uid, &def.name, method_def));
                method_uid
            })
            .collect();
        let class_fields = def
            .fields
            .iter()
            .map(|field_def| {
                let field_uid = counters.new_field_uid();
                fields.push(Field::new(field_uid, &def.name, field_def));
                field_uid
            })
            .collect();

        Self {
            uid,
            def: Some(def),
            name: def.name.clone(),
            methods: class_methods,
            fields: class_fields,
        }
    }

    pub(crate) fn new_no_def(uid: ClassUid, name: &TypeName) -> Self {
        Self {
            uid,
            def: None,
            name: name.clone(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    #[inline]
    pub fn uid(&self) -> ClassUid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn is_defined(&self) -> bool {
        self.def.is_some()
    }

    pub fn iter_methods<'r>(&'r self, repo: &'r Repo<'a>) -> impl Iterator<Item = &'r Method<'a>> + 'r {
        self.methods.iter().map(move |muid| &repo[*muid])
    }

    pub fn get_method<'r>(
        &self,
        name: &str,
        parameters_types: &[TypeName],
        repo: &'r Repo<'a>,
    ) -> Option<&'r Method<'a>> {
        self.methods.iter().map(|muid| &repo[*muid]).find(|meth| {
            meth.name() == name && meth.descriptor().parameters_types() == parameters_types
        })
    }

    pub fn find_methods<'r>(
        &'r self,
        pattern: &'r Regex,
        repo: &'r Repo<'a>,
    ) -> impl Iterator<Item = &'r Method<'a>> + 'r {
        self.iter_methods(repo)
            .filter(move |m| pattern.is_match(m.name()))
    }

    pub fn iter_fields<'r>(&'r self, repo: &'r Repo<'a>) -> impl Iterator<Item = &'r Field<'a>> + 'r {
        self.fields.iter().map(move |fuid| &repo[*fuid])
    }
}
