//! Classes hierarchy graph representation.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::repo::{Class, RepoCounters};
use fw_model::types::TypeName;
use lazy_static::lazy_static;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

lazy_static! {
    pub static ref SYSTEM_OBJECT: TypeName = TypeName::new("System.Object");
    /// Interfaces whose implementors own a resource to release.
    pub static ref DISPOSABLE_INTERFACES: BTreeSet<TypeName> = [
        "System.IDisposable",
        "System.IAsyncDisposable",
    ]
    .into_iter()
    .map(TypeName::new)
    .collect();
}

#[derive(Debug, PartialEq, Eq)]
pub enum Inheritance {
    Extends,
    Implements,
}

impl fmt::Display for Inheritance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Extends => write!(f, "<extends>"),
            Self::Implements => write!(f, "<implements>"),
        }
    }
}

#[derive(Debug)]
pub struct Hierarchy<'a> {
    inner: DiGraph<Class<'a>, Inheritance>,
    node_ids: BTreeMap<TypeName, NodeIndex>,
}

impl<'a> Hierarchy<'a> {
    pub(crate) fn new() -> Self {
        Self {
            inner: DiGraph::new(),
            node_ids: BTreeMap::new(),
        }
    }

    pub(crate) fn insert_class(&mut self, class: Class<'a>) -> AnalysisResult<()> {
        if self.node_ids.contains_key(class.name()) {
            return Err(AnalysisError::Internal(format!(
                "duplicate class {} in hierarchy graph",
                class.name()
            )));
        }

        let class_name = class.name().clone();
        let id = self.inner.add_node(class);
        self.node_ids.insert(class_name, id);
        Ok(())
    }

    /// Replaces a declaration-only class by its definition.
    pub(crate) fn update_class(&mut self, class: Class<'a>) -> AnalysisResult<()> {
        let id = self
            .node_ids
            .get(class.name())
            .ok_or_else(|| AnalysisError::ClassNotFound(class.name().to_string()))?;
        self.inner[*id] = class;
        Ok(())
    }

    pub(crate) fn contains_class(&self, class_name: &TypeName) -> bool {
        self.node_ids.contains_key(class_name)
    }

    pub fn iter_classes(&self) -> impl Iterator<Item = &Class<'a>> {
        self.inner.node_weights()
    }

    pub(crate) fn insert_link(
        &mut self,
        from: &TypeName,
        to: &TypeName,
        link: Inheritance,
    ) -> AnalysisResult<()> {
        let src = self
            .node_ids
            .get(from)
            .ok_or_else(|| AnalysisError::ClassNotFound(from.to_string()))?;
        let dst = self
            .node_ids
            .get(to)
            .ok_or_else(|| AnalysisError::ClassNotFound(to.to_string()))?;
        self.inner.add_edge(*src, *dst, link);
        Ok(())
    }

    /// Roots every class without parent under `System.Object`.
    pub(crate) fn close(&mut self, counters: &mut RepoCounters) -> AnalysisResult<()> {
        if !self.contains_class(&SYSTEM_OBJECT) {
            self.insert_class(Class::new_no_def(counters.new_class_uid(), &SYSTEM_OBJECT))?;
        }

        let orphans: Vec<TypeName> = self
            .inner
            .externals(Direction::Outgoing)
            .map(|id| self.inner[id].name().clone())
            .filter(|name| *name != *SYSTEM_OBJECT)
            .collect();
        for orphan in orphans {
            log::trace!("rooting {orphan} under {}", *SYSTEM_OBJECT);
            self.insert_link(&orphan, &SYSTEM_OBJECT, Inheritance::Extends)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get_class(&self, class_name: &TypeName) -> Option<&Class<'a>> {
        self.node_ids.get(class_name).map(|id| &self.inner[*id])
    }

    /// Returns the class itself and all its (transitive) parents, classes
    /// and interfaces alike.
    #[must_use]
    pub fn all_parents(&self, class_name: &TypeName) -> BTreeSet<&Class<'a>> {
        let mut parents = BTreeSet::new();
        if let Some(id) = self.node_ids.get(class_name) {
            let mut dfs = Dfs::new(&self.inner, *id);
            while let Some(id) = dfs.next(&self.inner) {
                parents.insert(&self.inner[id]);
            }
        }
        parents
    }

    /// Checks whether the given type implements one of the well-known
    /// disposable interfaces, possibly through inheritance.
    #[must_use]
    pub fn is_disposable(&self, type_name: &TypeName) -> bool {
        DISPOSABLE_INTERFACES.contains(type_name)
            || self
                .all_parents(type_name)
                .iter()
                .any(|parent| DISPOSABLE_INTERFACES.contains(parent.name()))
    }
}
