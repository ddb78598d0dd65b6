//! Small program builders shared by the unit tests.

use crate::repo::{Method, Repo};
use fw_model::body::{BlockDescr, BlockKind, Branch, Comp, Condition, Edge};
use fw_model::operations::{
    FieldRef, Invocation, Literal, LocalId, MethodRef, Operand, Operation, OperationKind, Value,
};
use fw_model::types::{Modifier, TypeName};
use fw_model::{BlockId, Body, ClassDef, FieldDef, MethodDef, ParameterDef, Program};

pub fn local(n: u32) -> Operand {
    Operand::Local(LocalId(n))
}

pub fn param(i: u16) -> Operand {
    Operand::Param(i)
}

pub fn this() -> Operand {
    Operand::This
}

pub fn null() -> Operand {
    Operand::Literal(Literal::Null)
}

pub fn int(i: i64) -> Operand {
    Operand::Literal(Literal::Int(i))
}

pub fn field(instance: Operand, class: &str, name: &str) -> Operand {
    Operand::Field {
        instance: Box::new(instance),
        field: FieldRef::new(class, name),
    }
}

pub fn use_(operand: Operand) -> Value {
    Value::Use(operand)
}

pub fn new_obj(class: &str, args: Vec<Operand>) -> Value {
    Value::New {
        class: TypeName::new(class),
        args,
    }
}

pub fn call(
    class: &str,
    name: &str,
    params: &[&str],
    instance: Option<Operand>,
    args: Vec<Operand>,
) -> Invocation {
    Invocation {
        callee: MethodRef::new(class, name, params.iter().copied().map(TypeName::new).collect()),
        instance,
        args,
    }
}

pub fn assign(target: Operand, value: Value) -> Operation {
    Operation::new(OperationKind::Assign { target, value })
}

pub fn invoke(call: Invocation) -> Operation {
    Operation::new(OperationKind::Invoke { call })
}

pub fn ret(value: Option<Operand>) -> Operation {
    Operation::new(OperationKind::Return { value })
}

pub fn throw(value: Operand) -> Operation {
    Operation::new(OperationKind::Throw { value })
}

pub fn cond(left: Operand, comp: Comp, right: Operand) -> Condition {
    Condition { left, comp, right }
}

pub fn seq(target: u32) -> Edge {
    Edge {
        target: BlockId(target),
        branch: Branch::Sequence,
    }
}

pub fn if_true(target: u32, condition: Condition) -> Edge {
    Edge {
        target: BlockId(target),
        branch: Branch::IfTrue(condition),
    }
}

pub fn if_false(target: u32, condition: Condition) -> Edge {
    Edge {
        target: BlockId(target),
        branch: Branch::IfFalse(condition),
    }
}

pub fn entry(id: u32, successors: Vec<Edge>) -> BlockDescr {
    BlockDescr {
        id: BlockId(id),
        kind: BlockKind::Entry,
        operations: Vec::new(),
        successors,
    }
}

pub fn block(id: u32, operations: Vec<Operation>, successors: Vec<Edge>) -> BlockDescr {
    BlockDescr {
        id: BlockId(id),
        kind: BlockKind::Block,
        operations,
        successors,
    }
}

pub fn exit(id: u32) -> BlockDescr {
    BlockDescr {
        id: BlockId(id),
        kind: BlockKind::Exit,
        operations: Vec::new(),
        successors: Vec::new(),
    }
}

pub fn body(blocks: Vec<BlockDescr>) -> Body {
    Body {
        locals: Vec::new(),
        blocks,
    }
}

/// Body made of a single block of operations between entry and exit.
pub fn straight(operations: Vec<Operation>) -> Body {
    body(vec![
        entry(0, vec![seq(1)]),
        block(1, operations, vec![seq(2)]),
        exit(2),
    ])
}

pub fn method(name: &str, params: &[(&str, &str)], body: Option<Body>) -> MethodDef {
    MethodDef {
        name: name.to_string(),
        parameters: params
            .iter()
            .map(|(name, ty)| ParameterDef {
                name: name.to_string(),
                ty: TypeName::new(*ty),
            })
            .collect(),
        return_type: TypeName::void(),
        modifiers: vec![Modifier::Public],
        body,
    }
}

pub fn static_method(name: &str, params: &[(&str, &str)], body: Option<Body>) -> MethodDef {
    let mut def = method(name, params, body);
    def.modifiers.push(Modifier::Static);
    def
}

pub fn class(
    name: &str,
    interfaces: &[&str],
    fields: &[(&str, &str)],
    methods: Vec<MethodDef>,
) -> ClassDef {
    ClassDef {
        name: TypeName::new(name),
        base: None,
        interfaces: interfaces.iter().copied().map(TypeName::new).collect(),
        modifiers: vec![Modifier::Public],
        fields: fields
            .iter()
            .map(|(name, ty)| FieldDef {
                name: name.to_string(),
                ty: TypeName::new(*ty),
                modifiers: vec![Modifier::Private],
            })
            .collect(),
        methods,
    }
}

pub fn program(classes: Vec<ClassDef>) -> Program {
    let program = Program { classes };
    program.validate().expect("valid test program");
    program
}

pub fn find_method<'r, 'a>(repo: &'r Repo<'a>, class: &str, name: &str) -> &'r Method<'a> {
    repo.iter_methods()
        .find(|m| m.definer().as_str() == class && m.name() == name)
        .expect("method exists")
}
