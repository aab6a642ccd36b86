//! Structural type compatibility.

use crate::{
    builtins,
    expr::{Expr, ExprKind, Slot},
};

/// Whether a value of type `peg` may be placed where `hole` is expected.
///
/// Both types are expected to be resolved. `Any` and generic placeholders
/// accept every type; otherwise the two types must have the same shape and
/// their children must be compatible position by position.
pub fn can_substitute(peg: &Expr, hole: &Expr) -> bool {
    if peg.ptr_eq(hole) || peg == hole || builtins::is_any(hole) {
        return true;
    }

    match (peg.kind(), hole.kind()) {
        (_, ExprKind::Parameter(_)) => true,
        (ExprKind::Atomic(peg), ExprKind::Atomic(hole)) => {
            peg.name == hole.name && peg.scope == hole.scope
        }
        (ExprKind::Container(peg), ExprKind::Container(hole)) => {
            peg.tag == hole.tag
                && peg.name == hole.name
                && (peg.name.is_none() || peg.scope == hole.scope)
                && all_slots(&peg.slots, &hole.slots)
        }
        (ExprKind::Function(peg), ExprKind::Function(hole)) => {
            all_slots(&peg.parameters, &hole.parameters)
                && can_substitute(&peg.output.r#type, &hole.output.r#type)
        }
        (ExprKind::TypeApplication(peg), ExprKind::TypeApplication(hole)) => {
            peg.arguments.len() == hole.arguments.len()
                && can_substitute(&peg.operator, &hole.operator)
                && peg
                    .arguments
                    .iter()
                    .zip(&hole.arguments)
                    .all(|(peg, hole)| can_substitute(peg, hole))
        }
        (ExprKind::Abstraction(peg), ExprKind::Abstraction(hole)) => {
            // Opaque type operators are compared by identity
            peg.is_external() && hole.is_external() && peg.name == hole.name
        }
        _ => false,
    }
}

fn all_slots(pegs: &[Slot], holes: &[Slot]) -> bool {
    pegs.len() == holes.len()
        && pegs
            .iter()
            .zip(holes)
            .all(|(peg, hole)| can_substitute(&peg.r#type, &hole.r#type))
}
