//! Beta-reduction.

use crate::{
    errors::{Diagnostic, Result},
    expr::{Abstraction, Application, Expr, ExprKind, Member},
    subst::{self, map_container, map_function_type},
};

/// Controls how far [`Expr::reduce_with_options`] goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Options {
    /// The maximum number of steps taken before giving up. `None` removes
    /// the limit, in which case reducing a term without a normal form never
    /// returns.
    pub step_limit: Option<u32>,
}

impl Options {
    /// The default step limit.
    pub const DEFAULT_STEP_LIMIT: u32 = 10_000;

    /// Set the step limit.
    pub fn with_step_limit(mut self, step_limit: Option<u32>) -> Self {
        self.step_limit = step_limit;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            step_limit: Some(Options::DEFAULT_STEP_LIMIT),
        }
    }
}

impl Expr {
    /// Reduce the expression until no step makes progress, with the
    /// default [`Options`]. Returns the normal form and whether any step
    /// was taken.
    pub fn reduce(&self) -> Result<(Expr, bool)> {
        self.reduce_with_options(Options::default())
    }

    /// Like [`Expr::reduce`], with explicit options.
    pub fn reduce_with_options(&self, options: Options) -> Result<(Expr, bool)> {
        let mut current = self.clone();
        let mut steps = 0u32;

        loop {
            let (next, progressed) = current.reduce_once()?;
            if !progressed {
                tracing::trace!(steps, "reached normal form");
                return Ok((current, steps > 0));
            }

            if let Some(limit) = options.step_limit {
                if steps >= limit {
                    return Err(Diagnostic::RecursionLimit(limit));
                }
            }

            steps += 1;
            tracing::trace!(steps, expr = %next, "reduction step");
            current = next;
        }
    }

    /// Perform one reduction step over the whole tree. Returns the result
    /// and whether anything changed.
    pub fn reduce_once(&self) -> Result<(Expr, bool)> {
        match self.kind() {
            ExprKind::Variable(_)
            | ExprKind::Literal(_)
            | ExprKind::Parameter(_)
            | ExprKind::Atomic(_) => Ok((self.clone(), false)),
            ExprKind::Abstraction(abstraction) => {
                let Some(body) = &abstraction.body else {
                    return Ok((self.clone(), false));
                };

                let (body, progressed) = body.reduce_once()?;
                if !progressed {
                    return Ok((self.clone(), false));
                }

                let abstraction = Abstraction {
                    body: Some(body),
                    ..abstraction.clone()
                };

                Ok((abstraction.into(), true))
            }
            ExprKind::Application(application) => {
                reduce_application(self, application, |operator, arguments| {
                    Expr::app(operator, arguments)
                })
            }
            ExprKind::TypeApplication(application) => {
                reduce_application(self, application, |operator, arguments| {
                    Expr::type_app(operator, arguments)
                })
            }
            ExprKind::Member(member) => reduce_member(self, member),
            ExprKind::Container(container) => {
                let mut error = None;
                let (container, progressed) = map_container(container, &mut |expr| {
                    step_collecting(expr, &mut error)
                });

                match error {
                    Some(error) => Err(error),
                    None if progressed => Ok((container.into(), true)),
                    None => Ok((self.clone(), false)),
                }
            }
            ExprKind::Function(function) => {
                let mut error = None;
                let (function, progressed) = map_function_type(function, &mut |expr| {
                    step_collecting(expr, &mut error)
                });

                match error {
                    Some(error) => Err(error),
                    None if progressed => Ok((function.into(), true)),
                    None => Ok((self.clone(), false)),
                }
            }
        }
    }
}

fn step_collecting(expr: &Expr, error: &mut Option<Diagnostic>) -> (Expr, bool) {
    if error.is_some() {
        return (expr.clone(), false);
    }

    match expr.reduce_once() {
        Ok(result) => result,
        Err(e) => {
            *error = Some(e);
            (expr.clone(), false)
        }
    }
}

fn reduce_application(
    expr: &Expr,
    application: &Application,
    rebuild: fn(Expr, Vec<Expr>) -> Expr,
) -> Result<(Expr, bool)> {
    let (operator, mut progressed) = application.operator.reduce_once()?;

    let arguments = application
        .arguments
        .iter()
        .map(|argument| {
            let (argument, argument_progressed) = argument.reduce_once()?;
            progressed |= argument_progressed;
            Ok(argument)
        })
        .collect::<Result<Vec<_>>>()?;

    if arguments.is_empty() {
        return Ok((operator, true));
    }

    if subst::applicable(&operator).is_some() {
        return Ok((subst::apply(&operator, &arguments)?, true));
    }

    match operator.kind() {
        ExprKind::Literal(_)
        | ExprKind::Atomic(_)
        | ExprKind::Container(_)
        | ExprKind::Function(_) => Err(Diagnostic::ArityMismatch {
            expected: 0,
            found: arguments.len(),
        }),
        _ if progressed => Ok((rebuild(operator, arguments), true)),
        _ => Ok((expr.clone(), false)),
    }
}

fn reduce_member(expr: &Expr, member: &Member) -> Result<(Expr, bool)> {
    let (target, progressed) = member.target.reduce_once()?;

    if let Some(container) = target.as_container().filter(|container| !container.is_generic()) {
        let slot = container
            .slot(&member.member)
            .ok_or_else(|| Diagnostic::UnknownMember {
                container: target.to_string(),
                member: member.member.clone(),
            })?;

        return Ok((slot.r#type.clone(), true));
    }

    if progressed {
        Ok((Expr::member(target, member.member.clone()), true))
    } else {
        Ok((expr.clone(), false))
    }
}
