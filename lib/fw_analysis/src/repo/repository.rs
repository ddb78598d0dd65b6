//! A repository to centralize program classes, methods and fields.

use crate::errors::AnalysisResult;
use crate::hierarchy::{Hierarchy, Inheritance};
use crate::repo::*;
use fw_model::operations::MethodRef;
use fw_model::program::CONSTRUCTOR_NAME;
use fw_model::types::TypeName;
use fw_model::{ClassDef, Program};
use regex::Regex;
use std::ops;

pub struct Repo<'a> {
    hierarchy: Hierarchy<'a>,
    counters: RepoCounters,
    methods: Vec<Method<'a>>,
    fields: Vec<Field<'a>>,
}

impl<'a> ops::Index<MethodUid> for Repo<'a> {
    type Output = Method<'a>;

    fn index(&self, muid: MethodUid) -> &Method<'a> {
        &self.methods[muid.idx()]
    }
}

impl<'a> ops::Index<FieldUid> for Repo<'a> {
    type Output = Field<'a>;

    fn index(&self, fuid: FieldUid) -> &Field<'a> {
        &self.fields[fuid.idx()]
    }
}

impl<'a> Repo<'a> {
    /// Registers every class of the program and closes the classes hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if the hierarchy cannot be built (duplicated class).
    pub fn new(program: &'a Program) -> AnalysisResult<Self> {
        let mut repo = Self {
            hierarchy: Hierarchy::new(),
            counters: RepoCounters::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        };
        for class_def in program.iter_classes() {
            repo.register_class(class_def)?;
        }
        repo.hierarchy.close(&mut repo.counters)?;
        log::debug!(
            "repository: {} classes, {} methods, {} fields",
            repo.nb_classes(),
            repo.nb_methods(),
            repo.nb_fields()
        );
        Ok(repo)
    }

    fn register_class(&mut self, class_def: &'a ClassDef) -> AnalysisResult<()> {
        log::trace!("pushing '{}' in repository", class_def.name);

        let existing = self.hierarchy.get_class(&class_def.name).map(Class::uid);
        let uid = match existing {
            Some(uid) => uid,
            None => self.counters.new_class_uid(),
        };
        let class = Class::new_impl(
            uid,
            class_def,
            &mut self.counters,
            &mut self.methods,
            &mut self.fields,
        );
        if existing.is_some() {
            self.hierarchy.update_class(class)?;
        } else {
            self.hierarchy.insert_class(class)?;
        }

        let parents = class_def
            .base
            .iter()
            .map(|base| (base, Inheritance::Extends))
            .chain(
                class_def
                    .interfaces
                    .iter()
                    .map(|interface| (interface, Inheritance::Implements)),
            );
        for (parent, link) in parents {
            if !self.hierarchy.contains_class(parent) {
                self.hierarchy
                    .insert_class(Class::new_no_def(self.counters.new_class_uid(), parent))?;
            }
            self.hierarchy.insert_link(&class_def.name, parent, link)?;
        }

        Ok(())
    }

    #[inline]
    #[must_use]
    pub const fn hierarchy(&self) -> &Hierarchy<'a> {
        &self.hierarchy
    }

    #[inline]
    pub fn iter_classes(&self) -> impl Iterator<Item = &Class<'a>> {
        self.hierarchy.iter_classes()
    }

    pub fn get_class_by_name(&self, name: &TypeName) -> Option<&Class<'a>> {
        self.hierarchy.get_class(name)
    }

    pub fn find_classes<'r>(&'r self, pattern: &'r Regex) -> impl Iterator<Item = &'r Class<'a>> {
        self.hierarchy
            .iter_classes()
            .filter(move |class| pattern.is_match(class.name().as_str()))
    }

    pub fn iter_methods(&self) -> impl Iterator<Item = &Method<'a>> {
        self.methods.iter()
    }

    pub fn iter_classes_methods(&self) -> impl Iterator<Item = (&Class<'a>, &Method<'a>)> {
        self.iter_classes()
            .flat_map(move |class| class.iter_methods(self).map(move |method| (class, method)))
    }

    /// Finds the method an invocation designates, looking into the declaring
    /// class first and then into its parents.
    pub fn resolve_method(&self, reference: &MethodRef) -> Option<&Method<'a>> {
        let class = self.get_class_by_name(&reference.class)?;
        class
            .get_method(&reference.name, &reference.parameters, self)
            .or_else(|| {
                self.hierarchy
                    .all_parents(&reference.class)
                    .into_iter()
                    .find_map(|parent| {
                        parent.get_method(&reference.name, &reference.parameters, self)
                    })
            })
    }

    /// Finds the constructor of a class by number of arguments.
    pub fn resolve_constructor(&self, class: &TypeName, arity: usize) -> Option<&Method<'a>> {
        self.get_class_by_name(class)?
            .iter_methods(self)
            .find(|m| m.name() == CONSTRUCTOR_NAME && m.nb_parameters() == arity)
    }

    #[inline]
    #[must_use]
    pub fn is_disposable(&self, type_name: &TypeName) -> bool {
        self.hierarchy.is_disposable(type_name)
    }

    /// Returns the instance fields of a class, including inherited ones.
    pub fn instance_fields(&self, class: &TypeName) -> Vec<&Field<'a>> {
        self.hierarchy
            .all_parents(class)
            .into_iter()
            .flat_map(|class| class.iter_fields(self))
            .filter(|field| !field.is_static())
            .collect()
    }

    /// Returns the instance fields of a class, including inherited ones,
    /// whose type is disposable.
    pub fn disposable_fields(&self, class: &TypeName) -> Vec<&Field<'a>> {
        self.instance_fields(class)
            .into_iter()
            .filter(|field| self.is_disposable(field.type_()))
            .collect()
    }

    pub fn nb_classes(&self) -> usize {
        self.counters.nb_classes()
    }

    pub fn nb_methods(&self) -> usize {
        self.counters.nb_methods()
    }

    pub fn nb_fields(&self) -> usize {
        self.counters.nb_fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn sample() -> Program {
        let mut derived = class(
            "Derived",
            &[],
            &[("extra", "int")],
            vec![method(".ctor", &[("r", "Res")], Some(straight(vec![ret(None)])))],
        );
        derived.base = Some(TypeName::new("Base"));
        program(vec![
            class("Res", &["System.IDisposable"], &[], vec![method("Dispose", &[], None)]),
            class(
                "Base",
                &[],
                &[("res", "Res"), ("count", "int")],
                vec![method("Run", &[], Some(straight(vec![ret(None)])))],
            ),
            derived,
        ])
    }

    #[test]
    fn lookups() {
        let program = sample();
        let repo = Repo::new(&program).unwrap();
        assert_eq!(repo.nb_methods(), 3);
        assert_eq!(repo.nb_fields(), 3);
        assert!(repo.nb_classes() >= 3);

        let pattern = Regex::new("^(Base|Derived)$").unwrap();
        assert_eq!(repo.find_classes(&pattern).count(), 2);
        assert!(repo
            .iter_classes_methods()
            .all(|(class, method)| class.name() == method.definer()));

        let inherited = MethodRef::new("Derived", "Run", Vec::new());
        let resolved = repo.resolve_method(&inherited).unwrap();
        assert_eq!(resolved.definer().as_str(), "Base");
        assert!(repo.resolve_constructor(&TypeName::new("Derived"), 1).is_some());
        assert!(repo.resolve_constructor(&TypeName::new("Derived"), 0).is_none());
    }

    #[test]
    fn disposable_fields_include_inherited_ones() {
        let program = sample();
        let repo = Repo::new(&program).unwrap();
        assert!(repo.is_disposable(&TypeName::new("Res")));
        let fields: Vec<_> = repo
            .disposable_fields(&TypeName::new("Derived"))
            .into_iter()
            .map(|field| field.name().to_string())
            .collect();
        assert_eq!(fields, vec!["res".to_string()]);
    }
}
