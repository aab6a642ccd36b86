//! Types every program can refer to.

use crate::{
    expr::{Abstraction, AbstractionKind, Expr, ExprKind},
    resolver::Module,
};

/// The type of types.
pub const KIND: &str = "Kind";

/// The type every other type can be substituted for.
pub const ANY: &str = "Any";

/// The type with no values.
pub const VOID: &str = "Void";

/// Leaf types available everywhere, besides [`KIND`], [`ANY`] and [`VOID`].
pub const ATOMIC: &[&str] = &[
    "boolean", "byte", "int", "long", "float", "double", "string",
];

/// The type of types.
pub fn kind() -> Expr {
    Expr::atomic(KIND)
}

/// The top type.
pub fn any() -> Expr {
    Expr::atomic(ANY)
}

/// The empty type.
pub fn void() -> Expr {
    Expr::atomic(VOID)
}

#[allow(missing_docs)]
pub fn boolean() -> Expr {
    Expr::atomic("boolean")
}

#[allow(missing_docs)]
pub fn int() -> Expr {
    Expr::atomic("int")
}

#[allow(missing_docs)]
pub fn float() -> Expr {
    Expr::atomic("float")
}

#[allow(missing_docs)]
pub fn string() -> Expr {
    Expr::atomic("string")
}

/// `list[V]`, an opaque type operator.
pub fn list() -> Expr {
    external_operator("list", ["V"])
}

/// `map[K, V]`, an opaque type operator.
pub fn map() -> Expr {
    external_operator("map", ["K", "V"])
}

fn external_operator<const N: usize>(name: &str, parameters: [&str; N]) -> Expr {
    Abstraction::external(parameters)
        .with_name(name)
        .with_kind(AbstractionKind::TypeOperator)
        .into()
}

fn is_atomic(expr: &Expr, name: &str) -> bool {
    matches!(expr.kind(), ExprKind::Atomic(atomic) if atomic.name == name && atomic.scope.is_none())
}

/// Whether `expr` is the builtin `Kind`.
pub fn is_kind(expr: &Expr) -> bool {
    is_atomic(expr, KIND)
}

/// Whether `expr` is the builtin `Any`.
pub fn is_any(expr: &Expr) -> bool {
    is_atomic(expr, ANY)
}

/// A root module declaring every builtin.
pub fn module() -> Module {
    let mut module = Module::new(None);

    let atomic = [KIND, ANY, VOID]
        .into_iter()
        .chain(ATOMIC.iter().copied())
        .map(|name| (name, Expr::atomic(name)));

    let operators = [("list", list()), ("map", map())];

    for (name, entity) in atomic.chain(operators) {
        // The builtin names are distinct
        let _ = module.add(name, entity);
    }

    module
}
