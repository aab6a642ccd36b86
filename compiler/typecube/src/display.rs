//! Rendering of expressions and type signatures.

use crate::expr::{
    Abstraction, ContainerTag, ContainerType, Expr, ExprKind, FunctionType, LiteralValue, Slot,
};
use itertools::Itertools;
use std::fmt;

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Variable(path) => write!(f, "{path}"),
            ExprKind::Literal(literal) => write!(f, "{}", literal.value),
            ExprKind::Abstraction(abstraction) => write!(f, "{}", DisplayAbstraction(abstraction)),
            ExprKind::Application(application) => write!(
                f,
                "({} {})",
                application.operator,
                application.arguments.iter().format(" ")
            ),
            ExprKind::TypeApplication(application) => write!(
                f,
                "{}[{}]",
                application.operator,
                application.arguments.iter().format(", ")
            ),
            ExprKind::Member(member) => write!(f, "{}.{}", member.target, member.member),
            ExprKind::Parameter(parameter) => f.write_str(&parameter.name),
            ExprKind::Atomic(atomic) => match &atomic.scope {
                Some(scope) => write!(f, "{scope}.{}", atomic.name),
                None => f.write_str(&atomic.name),
            },
            ExprKind::Container(container) => write!(f, "{}", DisplayContainer(container)),
            ExprKind::Function(function) => write!(f, "{}", DisplayFunction(function)),
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Boolean(value) => write!(f, "{value}"),
            LiteralValue::Integer(value) => write!(f, "{value}"),
            LiteralValue::Float(value) => write!(f, "{value:?}"),
            LiteralValue::Text(value) => write!(f, "{value:?}"),
        }
    }
}

struct DisplayAbstraction<'a>(&'a Abstraction);

impl fmt::Display for DisplayAbstraction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abstraction = self.0;

        match &abstraction.body {
            Some(body) => {
                write!(f, "λ{}", abstraction.parameters.iter().format(" "))?;

                if let Some(signature) = &abstraction.signature {
                    write!(f, " : {}", DisplayFunction(signature))?;
                }

                write!(f, ". {body}")
            }
            None => match &abstraction.name {
                Some(name) => f.write_str(name),
                None => write!(
                    f,
                    "λ{}. <external>",
                    abstraction.parameters.iter().format(" ")
                ),
            },
        }
    }
}

struct DisplaySlot<'a>(&'a Slot);

impl fmt::Display for DisplaySlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.0;

        if let Some(name) = &slot.name {
            write!(f, "{name}{}: ", if slot.optional { "?" } else { "" })?;
        }

        write!(f, "{}", slot.r#type)?;

        if let Some(default) = &slot.default {
            write!(f, " = {default}")?;
        }

        Ok(())
    }
}

struct DisplayFunction<'a>(&'a FunctionType);

impl fmt::Display for DisplayFunction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) -> {}",
            self.0.parameters.iter().map(DisplaySlot).format(", "),
            DisplaySlot(&self.0.output)
        )
    }
}

struct DisplayContainer<'a>(&'a ContainerType);

impl fmt::Display for DisplayContainer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let container = self.0;

        let separator = match container.tag {
            ContainerTag::Product => ", ",
            ContainerTag::Sum => " | ",
        };

        let slots = container.slots.iter().map(DisplaySlot).format(separator);

        let Some(name) = &container.name else {
            return if container.is_labelled() {
                write!(f, "{{ {slots} }}")
            } else {
                write!(f, "({slots})")
            };
        };

        let keyword = match container.tag {
            ContainerTag::Product => "record",
            ContainerTag::Sum => "union",
        };

        write!(f, "{keyword} ")?;

        if let Some(scope) = &container.scope {
            write!(f, "{scope}.")?;
        }

        f.write_str(name)?;

        if container.is_generic() {
            write!(f, "<{}>", container.parameters.iter().format(", "))?;
        }

        write!(f, " {{ {slots} }}")
    }
}

impl Expr {
    /// A short rendering identifying the expression: named types and
    /// abstractions by name, with the signatures of their children.
    pub fn signature(&self) -> String {
        match self.kind() {
            ExprKind::Container(container) => {
                let name = container.name.clone().unwrap_or_else(|| {
                    String::from(match container.tag {
                        ContainerTag::Product => "tuple",
                        ContainerTag::Sum => "union",
                    })
                });

                format!(
                    "{name}<{}>",
                    container
                        .slots
                        .iter()
                        .map(|slot| slot.r#type.signature())
                        .format(", ")
                )
            }
            ExprKind::Function(function) => format!(
                "function<{}>",
                function
                    .parameters
                    .iter()
                    .chain([&function.output])
                    .map(|slot| slot.r#type.signature())
                    .format(", ")
            ),
            ExprKind::Abstraction(abstraction) => match &abstraction.name {
                Some(name) => match &abstraction.signature {
                    Some(signature) => {
                        format!("{name}: {}", Expr::from(signature.clone()).signature())
                    }
                    None => name.clone(),
                },
                None => self.to_string(),
            },
            ExprKind::TypeApplication(application) => format!(
                "{}[{}]",
                application.operator.signature(),
                application
                    .arguments
                    .iter()
                    .map(Expr::signature)
                    .format(", ")
            ),
            _ => self.to_string(),
        }
    }
}
