//! A small engine for working with typed lambda terms: capture-avoiding
//! substitution and beta-reduction, lexically scoped name resolution over a
//! chain of resolvers, structural type compatibility and alpha-equivalence.
//!
//! Expressions are immutable and shared. Every node carries a write-once
//! cache holding its free variables, the scope it was resolved in, its
//! resolved value and its inferred type.

pub mod builtins;
mod check;
mod display;
mod equiv;
mod errors;
mod expr;
mod reduce;
mod resolve;
mod resolver;
mod subst;
mod unify;

pub use equiv::equiv;
pub use errors::{Diagnostic, Position, Result};
pub use expr::{
    Abstraction, AbstractionKind, Application, AtomicType, ContainerTag, ContainerType, Expr,
    ExprKind, FunctionType, Literal, LiteralValue, Member, Parameter, Path, Slot, Temporary,
};
pub use reduce::Options;
pub use resolver::{Binding, MapResolver, Module, Resolver, ResolverStack};
pub use subst::{apply, fresh_name, Bindings};
pub use unify::can_substitute;
