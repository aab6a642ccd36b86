//! Type inference and checking.

use crate::{
    builtins,
    errors::{Diagnostic, Position, Result},
    expr::{Abstraction, AbstractionKind, Application, Expr, ExprKind, FunctionType, Memo},
    resolve::{resolve_declared, settle},
    resolver::ResolverStack,
    unify::can_substitute,
};

impl Expr {
    /// The type of the expression, checking every application and declared
    /// return type reachable from it along the way. Requires a resolver to
    /// be attached. Computed once; failures are not cached.
    pub fn inferred_type(&self) -> Result<Expr> {
        if let Some(memo) = self.cache().inferred.get() {
            return Ok(memo.get(self));
        }

        let stack = self
            .resolver()
            .cloned()
            .ok_or_else(|| Diagnostic::MissingResolver(self.to_string()))?;

        let r#type = infer(self, &stack)?;
        tracing::trace!(expr = %self, ty = %r#type, "inferred");

        let _ = self.cache().inferred.set(Memo::of(self, &r#type));

        Ok(r#type)
    }
}

fn infer(expr: &Expr, stack: &ResolverStack) -> Result<Expr> {
    match expr.kind() {
        ExprKind::Variable(_) | ExprKind::Member(_) => expr.resolved_value()?.inferred_type(),
        ExprKind::Literal(literal) => literal.r#type.resolve_in(stack),
        ExprKind::Parameter(parameter) => match &parameter.annotation {
            Some(annotation) => resolve_declared(annotation, stack),
            None => Ok(settle(builtins::any(), stack)),
        },
        ExprKind::Abstraction(abstraction) => infer_abstraction(expr, abstraction, stack),
        ExprKind::Application(application) | ExprKind::TypeApplication(application) => {
            infer_application(expr, application, stack)
        }
        ExprKind::Container(container) if container.is_generic() => {
            Ok(operator_type(container.parameters.len(), stack))
        }
        ExprKind::Atomic(_) | ExprKind::Container(_) | ExprKind::Function(_) => {
            Ok(settle(builtins::kind(), stack))
        }
    }
}

/// `(Kind, ...) -> Kind`, or `Kind` itself for nullary operators.
fn operator_type(arity: usize, stack: &ResolverStack) -> Expr {
    if arity == 0 {
        return settle(builtins::kind(), stack);
    }

    let function = FunctionType::new(
        (0..arity).map(|_| settle(builtins::kind(), stack)),
        settle(builtins::kind(), stack),
    );

    settle(function.into(), stack)
}

fn infer_abstraction(
    expr: &Expr,
    abstraction: &Abstraction,
    stack: &ResolverStack,
) -> Result<Expr> {
    expr.resolved_value()?;

    if let Some(signature) = &abstraction.signature {
        let declared = FunctionType {
            parameters: signature
                .parameters
                .iter()
                .map(|slot| Ok(slot.map_type(slot.r#type.resolved_value()?)))
                .collect::<Result<_>>()?,
            output: signature
                .output
                .map_type(signature.output.r#type.resolved_value()?),
        };

        if let Some(body) = &abstraction.body {
            let actual = body.inferred_type()?;
            let expected = &declared.output.r#type;

            if !can_substitute(&actual, expected) {
                return Err(Diagnostic::TypeMismatch {
                    position: Position::Return,
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        return Ok(settle(declared.into(), stack));
    }

    match abstraction.kind {
        AbstractionKind::TypeOperator => Ok(operator_type(abstraction.parameters.len(), stack)),
        AbstractionKind::Quantifier => match &abstraction.body {
            Some(body) => body.inferred_type(),
            None => Ok(settle(builtins::any(), stack)),
        },
        AbstractionKind::Function => {
            let output = match &abstraction.body {
                Some(body) => body.inferred_type()?,
                None => settle(builtins::any(), stack),
            };

            let function = FunctionType::new(
                abstraction
                    .parameters
                    .iter()
                    .map(|_| settle(builtins::any(), stack)),
                output,
            );

            Ok(settle(function.into(), stack))
        }
    }
}

fn infer_application(
    expr: &Expr,
    application: &Application,
    stack: &ResolverStack,
) -> Result<Expr> {
    expr.resolved_value()?;

    let arguments = &application.arguments;
    let mut r#type = application.operator.inferred_type()?;
    let mut consumed = 0;

    while consumed < arguments.len() {
        let Some(function) = r#type.as_function_type() else {
            let unknown = consumed == 0
                || builtins::is_any(&r#type)
                || matches!(r#type.kind(), ExprKind::Parameter(_));

            if unknown {
                return Ok(settle(builtins::any(), stack));
            }

            return Err(Diagnostic::ArityMismatch {
                expected: consumed,
                found: arguments.len(),
            });
        };

        let count = function.parameters.len().min(arguments.len() - consumed);

        for (offset, (argument, slot)) in arguments[consumed..]
            .iter()
            .zip(&function.parameters)
            .enumerate()
        {
            let actual = argument.inferred_type()?;

            if !can_substitute(&actual, &slot.r#type) {
                return Err(Diagnostic::TypeMismatch {
                    position: Position::Argument(consumed + offset),
                    expected: slot.r#type.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        let next = if count == function.parameters.len() {
            function.output.r#type.clone()
        } else {
            let curried = FunctionType {
                parameters: function.parameters[count..].to_vec(),
                output: function.output.clone(),
            };

            settle(curried.into(), stack)
        };

        consumed += count;
        r#type = next;
    }

    Ok(r#type)
}
