//! Semantic operations contained in basic blocks.
//!
//! Operations are flat: every operand is either a storage place (local,
//! parameter, field, static field), the receiver or a literal, so that
//! analyses never need to evaluate nested expressions.

use crate::types::TypeName;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub u32);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Reference to a field, by declaring class and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub class: TypeName,
    pub name: String,
}

impl FieldRef {
    pub fn new<C: Into<TypeName>, S: Into<String>>(class: C, name: S) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

/// Reference to a method, by declaring class, name and parameters types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub class: TypeName,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<TypeName>,
}

impl MethodRef {
    pub fn new<C: Into<TypeName>, S: Into<String>>(
        class: C,
        name: S,
        parameters: Vec<TypeName>,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            parameters,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parameters = self
            .parameters
            .iter()
            .map(TypeName::as_str)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}::{}({})", self.class, self.name, parameters)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Local(LocalId),
    Param(u16),
    This,
    Literal(Literal),
    Field {
        instance: Box<Operand>,
        field: FieldRef,
    },
    Static(FieldRef),
}

impl Operand {
    /// Returns `true` if the operand denotes something that can be assigned.
    #[must_use]
    pub fn is_place(&self) -> bool {
        matches!(
            self,
            Self::Local(_) | Self::Param(_) | Self::Field { .. } | Self::Static(_)
        )
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Literal(Literal::Null))
    }

    /// Collects the operands that must be dereferenced to evaluate this one,
    /// innermost first.
    pub fn dereferenced<'o>(&'o self, acc: &mut Vec<&'o Operand>) {
        if let Self::Field { instance, .. } = self {
            instance.dereferenced(acc);
            acc.push(instance);
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Local(id) => write!(f, "{id}"),
            Self::Param(idx) => write!(f, "p{idx}"),
            Self::This => write!(f, "this"),
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Field { instance, field } => write!(f, "{instance}.{}", field.name),
            Self::Static(field) => write!(f, "{field}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        };
        write!(f, "{symbol}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Invocation {
    pub callee: MethodRef,
    #[serde(default)]
    pub instance: Option<Operand>,
    #[serde(default)]
    pub args: Vec<Operand>,
}

impl Invocation {
    /// Receiver first, then arguments.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.instance.iter().chain(self.args.iter())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(instance) = &self.instance {
            write!(f, "{instance}.")?;
        }
        let args = self
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({})", self.callee, args)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Use(Operand),
    New {
        class: TypeName,
        #[serde(default)]
        args: Vec<Operand>,
    },
    Invoke(Invocation),
    Binary {
        op: BinaryOp,
        left: Operand,
        right: Operand,
    },
    Unary {
        op: UnaryOp,
        operand: Operand,
    },
}

impl Value {
    /// Operands read to compute the value.
    #[must_use]
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Self::Use(operand) | Self::Unary { operand, .. } => vec![operand],
            Self::New { args, .. } => args.iter().collect(),
            Self::Invoke(call) => call.operands().collect(),
            Self::Binary { left, right, .. } => vec![left, right],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Use(operand) => write!(f, "{operand}"),
            Self::New { class, args } => {
                let args = args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "new {class}({args})")
            }
            Self::Invoke(invocation) => write!(f, "{invocation}"),
            Self::Binary { op, left, right } => write!(f, "{left} {op} {right}"),
            Self::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "!{operand}"),
            Self::Unary {
                op: UnaryOp::Neg,
                operand,
            } => write!(f, "-{operand}"),
        }
    }
}

/// Source location of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationKind {
    Assign {
        target: Operand,
        value: Value,
    },
    Invoke {
        call: Invocation,
    },
    Return {
        #[serde(default)]
        value: Option<Operand>,
    },
    Throw {
        value: Operand,
    },
    Nop,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    #[serde(flatten)]
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Operation {
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self { kind, span: None }
    }

    #[must_use]
    pub fn with_span(mut self, line: u32, column: u32) -> Self {
        self.span = Some(Span { line, column });
        self
    }

    /// Operands that must not be null for the operation to execute: the
    /// instances of accessed fields and the receivers of invocations.
    #[must_use]
    pub fn dereferenced_operands(&self) -> Vec<&Operand> {
        let mut acc = Vec::new();
        match &self.kind {
            OperationKind::Assign { target, value } => {
                target.dereferenced(&mut acc);
                for operand in value.operands() {
                    operand.dereferenced(&mut acc);
                }
                if let Value::Invoke(call) = value {
                    acc.extend(call.instance.iter());
                }
            }
            OperationKind::Invoke { call } => {
                for operand in call.operands() {
                    operand.dereferenced(&mut acc);
                }
                acc.extend(call.instance.iter());
            }
            OperationKind::Return { value: Some(value) } | OperationKind::Throw { value } => {
                value.dereferenced(&mut acc);
            }
            OperationKind::Return { value: None } | OperationKind::Nop => (),
        }
        acc
    }

    /// Returns `true` when control cannot fall through this operation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::Return { .. } | OperationKind::Throw { .. }
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            OperationKind::Assign { target, value } => write!(f, "{target} = {value}"),
            OperationKind::Invoke { call } => write!(f, "{call}"),
            OperationKind::Return { value: Some(value) } => write!(f, "return {value}"),
            OperationKind::Return { value: None } => write!(f, "return"),
            OperationKind::Throw { value } => write!(f, "throw {value}"),
            OperationKind::Nop => write!(f, "nop"),
        }
    }
}
