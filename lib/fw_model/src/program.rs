//! Top-level program document: classes with their fields and methods.

use crate::body::Body;
use crate::errors::{ModelError, ModelResult};
use crate::operations::MethodRef;
use crate::types::{FieldFlags, MethodFlags, Modifier, TypeName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;

/// Name of constructors.
pub const CONSTRUCTOR_NAME: &str = ".ctor";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub classes: Vec<ClassDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: TypeName,
    #[serde(default)]
    pub base: Option<TypeName>,
    #[serde(default)]
    pub interfaces: Vec<TypeName>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeName,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

impl FieldDef {
    #[must_use]
    pub fn flags(&self) -> FieldFlags {
        FieldFlags::from_modifiers(&self.modifiers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeName,
}

fn void() -> TypeName {
    TypeName::void()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    #[serde(default = "void")]
    pub return_type: TypeName,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default)]
    pub body: Option<Body>,
}

impl MethodDef {
    #[must_use]
    pub fn flags(&self) -> MethodFlags {
        MethodFlags::from_modifiers(&self.modifiers)
    }

    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    /// Builds the reference that invocations use to designate this method.
    #[must_use]
    pub fn reference(&self, class: &TypeName) -> MethodRef {
        MethodRef {
            class: class.clone(),
            name: self.name.clone(),
            parameters: self.parameters.iter().map(|p| p.ty.clone()).collect(),
        }
    }
}

impl Program {
    /// Parses and validates a program from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid program description
    /// or if one of the method bodies is malformed.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        let program: Self = serde_json::from_str(json)?;
        program.validate()?;
        Ok(program)
    }

    /// Same as [`Program::from_json`] over raw bytes.
    ///
    /// # Errors
    ///
    /// See [`Program::from_json`].
    pub fn from_slice(json: &[u8]) -> ModelResult<Self> {
        let program: Self = serde_json::from_slice(json)?;
        program.validate()?;
        Ok(program)
    }

    /// Same as [`Program::from_json`] over a reader.
    ///
    /// # Errors
    ///
    /// See [`Program::from_json`].
    pub fn from_reader<R: Read>(reader: R) -> ModelResult<Self> {
        let program: Self = serde_json::from_reader(reader)?;
        program.validate()?;
        Ok(program)
    }

    /// Checks uniqueness of class and method definitions, and the control
    /// flow graph contract of every body.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> ModelResult<()> {
        let mut classes = BTreeSet::new();
        for class in &self.classes {
            if !classes.insert(&class.name) {
                return Err(ModelError::DuplicateClass(class.name.to_string()));
            }
            let mut methods = BTreeSet::new();
            for method in &class.methods {
                let reference = method.reference(&class.name);
                if let Some(body) = &method.body {
                    body.validate(&reference.to_string())?;
                }
                if !methods.insert(reference.clone()) {
                    return Err(ModelError::DuplicateMethod(reference.to_string()));
                }
            }
        }
        log::debug!("program validated: {} classes", self.classes.len());
        Ok(())
    }

    pub fn iter_classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BlockKind, Branch};
    use crate::operations::{Literal, Operand, OperationKind, Value};

    const PROGRAM: &str = r#"{
        "classes": [
            {
                "name": "Sample.Holder",
                "interfaces": ["System.IDisposable"],
                "fields": [{"name": "stream", "type": "System.IO.Stream", "modifiers": ["private"]}],
                "methods": [
                    {
                        "name": "Check",
                        "parameters": [{"name": "s", "type": "string"}],
                        "return_type": "int",
                        "modifiers": ["public"],
                        "body": {
                            "blocks": [
                                {"id": 0, "kind": "entry", "successors": [{"target": 1}]},
                                {
                                    "id": 1,
                                    "operations": [
                                        {"op": "assign", "target": {"local": 0}, "value": {"use": {"literal": "null"}}, "span": {"line": 3, "column": 9}},
                                        {"op": "return", "value": {"literal": {"int": 4}}}
                                    ],
                                    "successors": [
                                        {"target": 2, "branch": {"if_true": {"left": {"param": 0}, "comp": "ne", "right": {"literal": "null"}}}},
                                        {"target": 2, "branch": "return"}
                                    ]
                                },
                                {"id": 2, "kind": "exit"}
                            ]
                        }
                    },
                    {"name": "Dispose", "modifiers": ["public", "abstract"]}
                ]
            }
        ]
    }"#;

    #[test]
    fn parse_program() {
        let program = Program::from_json(PROGRAM).unwrap();
        assert_eq!(program.classes.len(), 1);
        let class = &program.classes[0];
        assert_eq!(class.interfaces, vec![TypeName::new("System.IDisposable")]);
        assert!(class.fields[0].flags().contains(FieldFlags::PRIVATE));

        let method = &class.methods[0];
        assert!(method.flags().contains(MethodFlags::PUBLIC));
        assert_eq!(method.return_type, TypeName::new("int"));
        let body = method.body.as_ref().unwrap();
        assert_eq!(body.entry().unwrap().kind, BlockKind::Entry);

        let ops = &body.blocks[1].operations;
        assert_eq!(
            ops[0].kind,
            OperationKind::Assign {
                target: Operand::Local(crate::operations::LocalId(0)),
                value: Value::Use(Operand::Literal(Literal::Null)),
            }
        );
        assert_eq!(ops[0].span.unwrap().line, 3);
        assert!(matches!(body.blocks[1].successors[0].branch, Branch::IfTrue(_)));
        assert_eq!(body.blocks[1].successors[1].branch, Branch::Return);

        assert!(class.methods[1].body.is_none());
        assert_eq!(class.methods[1].return_type, TypeName::void());
    }

    #[test]
    fn duplicate_method() {
        let json = r#"{"classes": [{"name": "A", "methods": [{"name": "m"}, {"name": "m"}]}]}"#;
        assert!(matches!(
            Program::from_json(json),
            Err(ModelError::DuplicateMethod(_))
        ));
    }

    #[test]
    fn overloads_are_distinct() {
        let json = r#"{"classes": [{"name": "A", "methods": [
            {"name": "m"},
            {"name": "m", "parameters": [{"name": "x", "type": "int"}]}
        ]}]}"#;
        assert!(Program::from_json(json).is_ok());
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            Program::from_json("{\"classes\": 3}"),
            Err(ModelError::Json(_))
        ));
    }
}
