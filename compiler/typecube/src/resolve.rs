//! Lazy, memoized name resolution.
//!
//! Every node is attached to the [`ResolverStack`] in scope where it
//! appears. Asking for its resolved value looks names up in that stack,
//! instantiates applications and caches the result on the node. Subtrees
//! that were already resolved (for example, arguments duplicated into the
//! body of an abstraction) keep their value wherever their free names
//! refer to the same declarations. Any other attempt to move a node to a
//! different stack fails with [`Diagnostic::ResolverReassignment`].

use crate::{
    errors::{Diagnostic, Result},
    expr::{Application, ContainerType, Expr, ExprKind, FunctionType, Memo, Path, Slot},
    resolver::{MapResolver, ResolverStack},
    subst,
};
use std::cell::Cell;

impl Memo {
    pub(crate) fn of(node: &Expr, value: &Expr) -> Self {
        if value.ptr_eq(node) {
            Memo::Itself
        } else {
            Memo::Value(value.clone())
        }
    }

    pub(crate) fn get(&self, node: &Expr) -> Expr {
        match self {
            Memo::Itself => node.clone(),
            Memo::Value(value) => value.clone(),
        }
    }
}

/// Marks a node as being resolved for as long as it's alive.
struct InProgress<'a>(&'a Cell<bool>);

impl<'a> InProgress<'a> {
    fn enter(expr: &'a Expr) -> Result<Self> {
        let flag = &expr.cache().in_progress;

        if flag.replace(true) {
            return Err(Diagnostic::CyclicReference(expr.to_string()));
        }

        Ok(InProgress(flag))
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// The stack the inside of `expr` is resolved in: `stack` with `frame` in
/// front. Built once per node, so retrying a failed resolution or following
/// an alias reuses the same stack.
fn inner_scope(
    expr: &Expr,
    stack: &ResolverStack,
    frame: impl FnOnce() -> MapResolver,
) -> ResolverStack {
    expr.cache()
        .scope
        .get_or_init(|| stack.push(frame()))
        .clone()
}

/// Attach `stack` to a freshly built node and record the node as its own
/// resolved value.
pub(crate) fn settle(expr: Expr, stack: &ResolverStack) -> Expr {
    let _ = expr.cache().resolver.set(stack.clone());
    let _ = expr.cache().resolved.set(Memo::Itself);
    expr
}

impl Expr {
    /// Bind the node to `stack`. A node can only ever be bound to one
    /// stack; attaching the same stack again is a no-op.
    pub fn attach(&self, stack: &ResolverStack) -> Result<()> {
        match self.cache().resolver.get() {
            Some(existing) if existing.ptr_eq(stack) => Ok(()),
            Some(_) => Err(Diagnostic::ResolverReassignment(self.to_string())),
            None => {
                let _ = self.cache().resolver.set(stack.clone());
                Ok(())
            }
        }
    }

    /// The stack the node is bound to, if any.
    pub fn resolver(&self) -> Option<&ResolverStack> {
        self.cache().resolver.get()
    }

    /// Whether the resolved value has been computed.
    pub fn is_resolved(&self) -> bool {
        self.cache().resolved.get().is_some()
    }

    /// Attach `stack` and resolve.
    pub fn resolve_with(&self, stack: &ResolverStack) -> Result<Expr> {
        self.attach(stack)?;
        self.resolved_value()
    }

    /// The value the node denotes once names are looked up and
    /// applications instantiated. Computed once; failures are not cached.
    pub fn resolved_value(&self) -> Result<Expr> {
        if let Some(memo) = self.cache().resolved.get() {
            return Ok(memo.get(self));
        }

        let stack = self
            .resolver()
            .cloned()
            .ok_or_else(|| Diagnostic::MissingResolver(self.to_string()))?;

        let _guard = InProgress::enter(self)?;

        let value = resolve(self, &stack)?;
        tracing::trace!(expr = %self, value = %value, "resolved");

        let _ = self.cache().resolved.set(Memo::of(self, &value));

        Ok(value)
    }

    /// Resolve a child node in `stack`.
    pub(crate) fn resolve_in(&self, stack: &ResolverStack) -> Result<Expr> {
        match self.resolver() {
            None => self.attach(stack)?,
            Some(existing) if existing.ptr_eq(stack) => {}
            Some(existing) if self.is_resolved() && same_meaning(self, existing, stack) => {}
            Some(_) => return Err(Diagnostic::ResolverReassignment(self.to_string())),
        }

        self.resolved_value()
    }
}

/// Whether every free name of `expr` refers to the same declaration in
/// `stack` as it does in `existing`.
fn same_meaning(expr: &Expr, existing: &ResolverStack, stack: &ResolverStack) -> bool {
    expr.free_variables().iter().all(|name| {
        match (existing.provider(name), stack.provider(name)) {
            (Some(old), Some(new)) if old.ptr_eq(new) => true,
            (Some(old), Some(new)) => match (old.resolve(name), new.resolve(name)) {
                (Ok(old), Ok(new)) => old.value.ptr_eq(&new.value) || old.value == new.value,
                _ => false,
            },
            _ => false,
        }
    })
}

/// Resolve a declaration, or part of a value that was already resolved, in
/// the scope it was first seen in.
pub(crate) fn resolve_declared(expr: &Expr, stack: &ResolverStack) -> Result<Expr> {
    if expr.resolver().is_none() {
        expr.attach(stack)?;
    }

    expr.resolved_value()
}

fn resolve(expr: &Expr, stack: &ResolverStack) -> Result<Expr> {
    match expr.kind() {
        ExprKind::Variable(path) => resolve_variable(path, stack),
        ExprKind::Literal(literal) => {
            literal.r#type.resolve_in(stack)?;
            Ok(expr.clone())
        }
        ExprKind::Parameter(_) | ExprKind::Atomic(_) => Ok(expr.clone()),
        ExprKind::Member(member) => {
            let target = member.target.resolve_in(stack)?;
            project(&target, &member.member, &expr.to_string(), stack)
        }
        ExprKind::Abstraction(abstraction) => {
            let scope = inner_scope(expr, stack, || MapResolver::for_abstraction(abstraction));

            if let Some(signature) = &abstraction.signature {
                resolve_slots(&signature.parameters, &scope)?;
                resolve_slot(&signature.output, &scope)?;
            }

            for temporary in &abstraction.temporaries {
                if let Some(r#type) = &temporary.r#type {
                    r#type.resolve_in(&scope)?;
                }
            }

            if let Some(body) = &abstraction.body {
                body.resolve_in(&scope)?;
            }

            Ok(expr.clone())
        }
        ExprKind::Container(container) => resolve_container(expr, container, stack),
        ExprKind::Function(function) => {
            let (parameters, parameters_changed) = resolve_slots(&function.parameters, stack)?;
            let (output, output_changed) = resolve_slot(&function.output, stack)?;

            if !parameters_changed && !output_changed {
                return Ok(expr.clone());
            }

            let function = FunctionType { parameters, output };

            Ok(settle(function.into(), stack))
        }
        ExprKind::Application(application) => resolve_application(application, false, stack),
        ExprKind::TypeApplication(application) => resolve_application(application, true, stack),
    }
}

fn resolve_variable(path: &Path, stack: &ResolverStack) -> Result<Expr> {
    let binding = stack.resolve_path(path)?;

    let value = resolve_declared(&binding.value, &binding.scope)?;
    let value = follow_aliases(value, &binding.scope)?;

    path.segments()
        .get(binding.consumed..)
        .unwrap_or_default()
        .iter()
        .try_fold(value, |value, member| {
            let value = project(&value, member, &path.to_string(), stack)?;
            follow_aliases(value, stack)
        })
}

/// Resolve the type and default of a slot. Returns the resolved slot and
/// whether it differs from the original.
fn resolve_slot(slot: &Slot, stack: &ResolverStack) -> Result<(Slot, bool)> {
    let r#type = follow_aliases(slot.r#type.resolve_in(stack)?, stack)?;
    let mut changed = !r#type.ptr_eq(&slot.r#type);

    let default = match &slot.default {
        Some(default) => {
            let resolved = default.resolve_in(stack)?;
            changed |= !resolved.ptr_eq(default);
            Some(resolved)
        }
        None => None,
    };

    let slot = Slot {
        r#type,
        default,
        ..slot.clone()
    };

    Ok((slot, changed))
}

fn resolve_slots(slots: &[Slot], stack: &ResolverStack) -> Result<(Vec<Slot>, bool)> {
    let mut changed = false;

    let slots = slots
        .iter()
        .map(|slot| {
            let (slot, slot_changed) = resolve_slot(slot, stack)?;
            changed |= slot_changed;
            Ok(slot)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((slots, changed))
}

fn resolve_container(
    expr: &Expr,
    container: &ContainerType,
    stack: &ResolverStack,
) -> Result<Expr> {
    // The slots of a generic container are resolved against placeholders
    // but kept symbolic, so they can be instantiated later
    if container.is_generic() {
        let scope = inner_scope(expr, stack, || MapResolver::for_container(container));
        resolve_slots(&container.slots, &scope)?;
        return Ok(expr.clone());
    }

    let (slots, changed) = resolve_slots(&container.slots, stack)?;
    if !changed {
        return Ok(expr.clone());
    }

    let container = ContainerType {
        slots,
        ..container.clone()
    };

    Ok(settle(container.into(), stack))
}

/// Replace type operators without parameters by what they stand for.
fn follow_aliases(mut value: Expr, stack: &ResolverStack) -> Result<Expr> {
    let mut visited: Vec<Expr> = Vec::new();

    loop {
        let alias = match value.kind() {
            ExprKind::Abstraction(abstraction)
                if abstraction.kind.is_type_operator() && abstraction.parameters.is_empty() =>
            {
                abstraction.body.clone().map(|body| (body, abstraction))
            }
            _ => None,
        };

        let Some((body, abstraction)) = alias else {
            return Ok(value);
        };

        if visited.iter().any(|seen| seen.ptr_eq(&value)) {
            return Err(Diagnostic::CyclicReference(value.to_string()));
        }

        let scope = inner_scope(&value, value.resolver().unwrap_or(stack), || {
            MapResolver::for_abstraction(abstraction)
        });

        let target = body.resolve_in(&scope)?;
        tracing::trace!(alias = %value, target = %target, "following alias");

        visited.push(value);
        value = target;
    }
}

/// Look up `member` in the resolved value `value`.
fn project(value: &Expr, member: &str, path: &str, stack: &ResolverStack) -> Result<Expr> {
    let not_indexable = || Diagnostic::NotIndexable {
        path: path.to_string(),
        value: value.to_string(),
    };

    let find_slot = |container: &ContainerType, container_expr: &Expr| {
        container
            .slot(member)
            .cloned()
            .ok_or_else(|| Diagnostic::UnknownMember {
                container: container_expr.to_string(),
                member: member.to_string(),
            })
    };

    match value.kind() {
        ExprKind::Container(container) if !container.is_generic() => {
            let slot = find_slot(container, value)?;
            resolve_declared(&slot.r#type, stack)
        }
        ExprKind::Parameter(parameter) => {
            let annotation = parameter.annotation.as_ref().ok_or_else(not_indexable)?;
            let annotation = follow_aliases(resolve_declared(annotation, stack)?, stack)?;

            let container = annotation.as_container().ok_or_else(not_indexable)?;
            let slot = find_slot(container, &annotation)?;
            let r#type = resolve_declared(&slot.r#type, stack)?;

            let placeholder =
                Expr::parameter(format!("{}.{member}", parameter.name), Some(r#type));

            Ok(settle(placeholder, stack))
        }
        _ => Err(not_indexable()),
    }
}

fn resolve_application(
    application: &Application,
    type_level: bool,
    stack: &ResolverStack,
) -> Result<Expr> {
    let operator = follow_aliases(application.operator.resolve_in(stack)?, stack)?;

    let arguments = application
        .arguments
        .iter()
        .map(|argument| argument.resolve_in(stack))
        .collect::<Result<Vec<_>>>()?;

    let rebuild = |operator: Expr, arguments: Vec<Expr>| {
        let application = if type_level {
            Expr::type_app(operator, arguments)
        } else {
            Expr::app(operator, arguments)
        };

        settle(application, stack)
    };

    match operator.kind() {
        ExprKind::Abstraction(abstraction) if abstraction.is_external() => {
            if arguments.len() > abstraction.parameters.len() {
                return Err(Diagnostic::ArityMismatch {
                    expected: abstraction.parameters.len(),
                    found: arguments.len(),
                });
            }

            return Ok(rebuild(operator.clone(), arguments));
        }
        // Not known until the enclosing abstraction is instantiated
        ExprKind::Parameter(_) | ExprKind::Application(_) | ExprKind::TypeApplication(_) => {
            return Ok(rebuild(operator.clone(), arguments));
        }
        _ => {}
    }

    let abstraction = subst::applicable(&operator)
        .ok_or_else(|| Diagnostic::NotApplicable(operator.to_string()))?;

    if type_level && arguments.len() > abstraction.parameters.len() {
        return Err(Diagnostic::ArityMismatch {
            expected: abstraction.parameters.len(),
            found: arguments.len(),
        });
    }

    if arguments.is_empty() {
        return Ok(operator.clone());
    }

    let scope = inner_scope(&operator, operator.resolver().unwrap_or(stack), || {
        MapResolver::for_abstraction(&abstraction)
    })
    .push(MapResolver::from_arguments(&abstraction, &arguments));

    tracing::debug!(
        operator = %operator,
        arguments = arguments.len(),
        "instantiating"
    );

    subst::apply(&operator, &arguments)?.resolve_in(&scope)
}
