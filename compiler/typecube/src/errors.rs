//! Errors produced while reducing, resolving and checking expressions.

use serde::Serialize;
use std::fmt;

/// Shorthand for results produced by the engine.
pub type Result<T> = std::result::Result<T, Diagnostic>;

/// Where a [`Diagnostic::TypeMismatch`] was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum Position {
    /// The argument at this index of an application.
    Argument(usize),

    /// The body of an abstraction, checked against its declared return
    /// type.
    Return,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Argument(index) => write!(f, "argument {index}"),
            Position::Return => f.write_str("return value"),
        }
    }
}

/// An error occurring while working with expressions.
///
/// Expressions are embedded by their rendered text so that a diagnostic is
/// plain data, independent of the node graph it was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum Diagnostic {
    /// The name could not be found anywhere in the resolver chain.
    UnresolvedName(String),

    /// An application supplied a different number of arguments than the
    /// operator accepts.
    #[serde(rename_all = "camelCase")]
    ArityMismatch {
        /// The number of parameters the operator accepts.
        expected: usize,

        /// The number of arguments provided.
        found: usize,
    },

    /// A value of type `actual` was used where `expected` is required.
    #[serde(rename_all = "camelCase")]
    TypeMismatch {
        /// Which part of the expression failed the check.
        position: Position,

        /// The declared type of the slot.
        expected: String,

        /// The inferred type of the value placed in the slot.
        actual: String,
    },

    /// A temporary variable, named slot or module entry collides with an
    /// existing one in the same scope.
    DuplicateBinding(String),

    /// A node already bound to one resolver was asked to bind to another.
    /// This indicates a tree shared between two scopes without being
    /// cloned first.
    ResolverReassignment(String),

    /// The resolved value of a node was requested before a resolver was
    /// attached to it.
    MissingResolver(String),

    /// The resolution of a node depends on itself.
    CyclicReference(String),

    /// The operator of an application is not something that can be
    /// applied.
    NotApplicable(String),

    /// A member was requested from a container that doesn't declare it.
    #[serde(rename_all = "camelCase")]
    UnknownMember {
        /// The container being indexed.
        container: String,

        /// The requested member.
        member: String,
    },

    /// A dotted path walked through a value that isn't a container type.
    #[serde(rename_all = "camelCase")]
    NotIndexable {
        /// The path being resolved.
        path: String,

        /// The value that couldn't be indexed.
        value: String,
    },

    /// Reduction did not reach a normal form within the configured number
    /// of steps.
    RecursionLimit(u32),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedName(name) => write!(f, "unable to resolve name `{name}`"),
            Diagnostic::ArityMismatch { expected, found } => write!(
                f,
                "expected at most {expected} argument(s), but found {found}"
            ),
            Diagnostic::TypeMismatch {
                position,
                expected,
                actual,
            } => write!(f, "{position}: expected `{expected}`, found `{actual}`"),
            Diagnostic::DuplicateBinding(name) => write!(f, "`{name}` is already declared"),
            Diagnostic::ResolverReassignment(expression) => {
                write!(f, "`{expression}` is already bound to a different scope")
            }
            Diagnostic::MissingResolver(expression) => {
                write!(f, "`{expression}` has no resolver attached")
            }
            Diagnostic::CyclicReference(expression) => {
                write!(f, "`{expression}` refers to itself")
            }
            Diagnostic::NotApplicable(expression) => {
                write!(f, "`{expression}` cannot be applied to arguments")
            }
            Diagnostic::UnknownMember { container, member } => {
                write!(f, "`{container}` has no member `{member}`")
            }
            Diagnostic::NotIndexable { path, value } => {
                write!(f, "cannot resolve `{path}`: `{value}` is not a container")
            }
            Diagnostic::RecursionLimit(limit) => {
                write!(f, "no normal form reached after {limit} reduction steps")
            }
        }
    }
}

impl std::error::Error for Diagnostic {}
