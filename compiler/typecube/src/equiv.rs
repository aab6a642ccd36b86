//! Alpha-equivalence.

use crate::expr::{Abstraction, ContainerType, Expr, ExprKind, FunctionType, Slot};
use std::collections::HashMap;

/// Whether the two expressions are equal up to a consistent renaming of
/// variables.
///
/// Binders are paired for the extent of their bodies. Free variables are
/// paired the first time they are encountered, and every later occurrence
/// must respect that pairing in both directions.
pub fn equiv(left: &Expr, right: &Expr) -> bool {
    Renaming::default().equiv(left, right)
}

#[derive(Default)]
struct Renaming {
    forward: HashMap<String, String>,
    backward: HashMap<String, String>,
}

impl Renaming {
    fn pair(&mut self, left: &str, right: &str) -> bool {
        match (self.forward.get(left), self.backward.get(right)) {
            (Some(mapped_right), Some(mapped_left)) => mapped_right == right && mapped_left == left,
            (None, None) => {
                self.forward.insert(left.to_string(), right.to_string());
                self.backward.insert(right.to_string(), left.to_string());
                true
            }
            _ => false,
        }
    }

    /// Pair each binder for the duration of `f`, restoring the previous
    /// pairings afterward.
    fn bind(&mut self, binders: &[(&str, &str)], f: impl FnOnce(&mut Self) -> bool) -> bool {
        let saved = binders
            .iter()
            .map(|&(left, right)| {
                let forward = self.forward.insert(left.to_string(), right.to_string());
                let backward = self.backward.insert(right.to_string(), left.to_string());
                (left, forward, right, backward)
            })
            .collect::<Vec<_>>();

        let result = f(self);

        for (left, forward, right, backward) in saved.into_iter().rev() {
            match forward {
                Some(previous) => self.forward.insert(left.to_string(), previous),
                None => self.forward.remove(left),
            };

            match backward {
                Some(previous) => self.backward.insert(right.to_string(), previous),
                None => self.backward.remove(right),
            };
        }

        result
    }

    fn equiv(&mut self, left: &Expr, right: &Expr) -> bool {
        if left.ptr_eq(right) {
            return true;
        }

        match (left.kind(), right.kind()) {
            (ExprKind::Variable(left), ExprKind::Variable(right)) => {
                left.tail() == right.tail() && self.pair(left.root(), right.root())
            }
            (ExprKind::Abstraction(left), ExprKind::Abstraction(right)) => {
                self.equiv_abstractions(left, right)
            }
            (ExprKind::Application(left), ExprKind::Application(right))
            | (ExprKind::TypeApplication(left), ExprKind::TypeApplication(right)) => {
                left.arguments.len() == right.arguments.len()
                    && self.equiv(&left.operator, &right.operator)
                    && left
                        .arguments
                        .iter()
                        .zip(&right.arguments)
                        .all(|(left, right)| self.equiv(left, right))
            }
            (ExprKind::Member(left), ExprKind::Member(right)) => {
                left.member == right.member && self.equiv(&left.target, &right.target)
            }
            (ExprKind::Container(left), ExprKind::Container(right)) => {
                self.equiv_containers(left, right)
            }
            (ExprKind::Function(left), ExprKind::Function(right)) => {
                self.equiv_functions(left, right)
            }
            _ => left == right,
        }
    }

    fn equiv_abstractions(&mut self, left: &Abstraction, right: &Abstraction) -> bool {
        if left.name != right.name
            || left.kind != right.kind
            || left.parameters.len() != right.parameters.len()
            || left.temporaries.len() != right.temporaries.len()
            || left.signature.is_some() != right.signature.is_some()
            || left.return_name().is_some() != right.return_name().is_some()
        {
            return false;
        }

        let binders = left
            .bound_names()
            .into_iter()
            .zip(right.bound_names())
            .collect::<Vec<_>>();

        self.bind(&binders, |renaming| {
            let signatures = match (&left.signature, &right.signature) {
                (Some(left), Some(right)) => renaming.equiv_functions(left, right),
                _ => true,
            };

            let temporaries = left
                .temporaries
                .iter()
                .zip(&right.temporaries)
                .all(|(left, right)| match (&left.r#type, &right.r#type) {
                    (Some(left), Some(right)) => renaming.equiv(left, right),
                    (None, None) => true,
                    _ => false,
                });

            let bodies = match (&left.body, &right.body) {
                (Some(left), Some(right)) => renaming.equiv(left, right),
                (None, None) => true,
                _ => false,
            };

            signatures && temporaries && bodies
        })
    }

    fn equiv_slots(&mut self, left: &Slot, right: &Slot) -> bool {
        left.name == right.name
            && left.optional == right.optional
            && self.equiv(&left.r#type, &right.r#type)
            && match (&left.default, &right.default) {
                (Some(left), Some(right)) => self.equiv(left, right),
                (None, None) => true,
                _ => false,
            }
    }

    fn equiv_functions(&mut self, left: &FunctionType, right: &FunctionType) -> bool {
        left.parameters.len() == right.parameters.len()
            && left
                .parameters
                .iter()
                .zip(&right.parameters)
                .all(|(left, right)| self.equiv_slots(left, right))
            && self.equiv_slots(&left.output, &right.output)
    }

    fn equiv_containers(&mut self, left: &ContainerType, right: &ContainerType) -> bool {
        if left.tag != right.tag
            || left.name != right.name
            || left.scope != right.scope
            || left.parameters.len() != right.parameters.len()
            || left.slots.len() != right.slots.len()
        {
            return false;
        }

        let binders = left
            .parameters
            .iter()
            .map(String::as_str)
            .zip(right.parameters.iter().map(String::as_str))
            .collect::<Vec<_>>();

        self.bind(&binders, |renaming| {
            left.slots
                .iter()
                .zip(&right.slots)
                .all(|(left, right)| renaming.equiv_slots(left, right))
        })
    }
}
