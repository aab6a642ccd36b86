//! Capture-avoiding substitution, free variables and application.

use crate::{
    errors::{Diagnostic, Result},
    expr::{
        Abstraction, AbstractionKind, Application, ContainerType, Expr, ExprKind, FunctionType,
        Member, Slot, Temporary,
    },
};
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
};

/// A mapping from names to the expressions substituted for them.
pub type Bindings = BTreeMap<String, Expr>;

impl Expr {
    /// The names occurring free in the expression. Computed once per node.
    pub fn free_variables(&self) -> &BTreeSet<String> {
        self.cache()
            .free_variables
            .get_or_init(|| compute_free_variables(self))
    }

    /// Replace every free occurrence of a bound name with a duplicate of its
    /// value, renaming binders where needed so that no free variable of a
    /// value is captured. Returns whether anything changed; unchanged
    /// subtrees are shared with the original.
    pub fn substitute(&self, bindings: &Bindings) -> (Expr, bool) {
        let free_variables = self.free_variables();
        if !bindings
            .keys()
            .any(|name| free_variables.contains(name))
        {
            return (self.clone(), false);
        }

        match self.kind() {
            ExprKind::Variable(path) => match bindings.get(path.root()) {
                Some(value) => {
                    let projected = path
                        .tail()
                        .iter()
                        .fold(value.duplicate(), |target, member| {
                            Expr::member(target, member.clone())
                        });

                    (projected, true)
                }
                None => (self.clone(), false),
            },
            ExprKind::Literal(_) | ExprKind::Parameter(_) | ExprKind::Atomic(_) => {
                (self.clone(), false)
            }
            ExprKind::Application(application) => {
                let (application, changed) = substitute_application(application, bindings);
                (Expr::new(ExprKind::Application(application)), changed)
            }
            ExprKind::TypeApplication(application) => {
                let (application, changed) = substitute_application(application, bindings);
                (Expr::new(ExprKind::TypeApplication(application)), changed)
            }
            ExprKind::Member(member) => {
                let (target, changed) = member.target.substitute(bindings);
                let member = Member {
                    target,
                    member: member.member.clone(),
                };

                (Expr::new(ExprKind::Member(member)), changed)
            }
            ExprKind::Abstraction(abstraction) => {
                let bindings = relevant_bindings(bindings, free_variables);
                let abstraction = avoid_capture(abstraction, bindings.values());
                let (abstraction, changed) =
                    map_abstraction(&abstraction, &mut |expr| expr.substitute(&bindings));

                (abstraction.into(), changed)
            }
            ExprKind::Container(container) => {
                let bindings = relevant_bindings(bindings, free_variables);
                let container = avoid_capture_in_container(container, bindings.values());
                let (container, changed) =
                    map_container(&container, &mut |expr| expr.substitute(&bindings));

                (container.into(), changed)
            }
            ExprKind::Function(function) => {
                let (function, changed) =
                    map_function_type(function, &mut |expr| expr.substitute(bindings));

                (function.into(), changed)
            }
        }
    }
}

fn compute_free_variables(expr: &Expr) -> BTreeSet<String> {
    let mut free = BTreeSet::new();

    let mut collect = |expr: &Expr| {
        free.extend(expr.free_variables().iter().cloned());
        (expr.clone(), false)
    };

    let bound: Vec<&str> = match expr.kind() {
        ExprKind::Variable(path) => return BTreeSet::from([path.root().to_string()]),
        ExprKind::Literal(_) | ExprKind::Parameter(_) | ExprKind::Atomic(_) => Vec::new(),
        ExprKind::Application(application) | ExprKind::TypeApplication(application) => {
            collect(&application.operator);
            application.arguments.iter().for_each(|argument| {
                collect(argument);
            });
            Vec::new()
        }
        ExprKind::Member(member) => {
            collect(&member.target);
            Vec::new()
        }
        ExprKind::Abstraction(abstraction) => {
            map_abstraction(abstraction, &mut collect);
            abstraction.bound_names()
        }
        ExprKind::Container(container) => {
            map_container(container, &mut collect);
            container.parameters.iter().map(String::as_str).collect()
        }
        ExprKind::Function(function) => {
            map_function_type(function, &mut collect);
            Vec::new()
        }
    };

    for name in bound {
        free.remove(name);
    }

    free
}

fn relevant_bindings(bindings: &Bindings, free_variables: &BTreeSet<String>) -> Bindings {
    bindings
        .iter()
        .filter(|(name, _)| free_variables.contains(*name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn substitute_application(application: &Application, bindings: &Bindings) -> (Application, bool) {
    let (operator, mut changed) = application.operator.substitute(bindings);

    let arguments = application
        .arguments
        .iter()
        .map(|argument| {
            let (argument, argument_changed) = argument.substitute(bindings);
            changed |= argument_changed;
            argument
        })
        .collect();

    (
        Application {
            operator,
            arguments,
        },
        changed,
    )
}

/// Apply `f` to every expression directly contained in the slot.
pub(crate) fn map_slot(slot: &Slot, f: &mut impl FnMut(&Expr) -> (Expr, bool)) -> (Slot, bool) {
    let (r#type, mut changed) = f(&slot.r#type);

    let default = slot.default.as_ref().map(|default| {
        let (default, default_changed) = f(default);
        changed |= default_changed;
        default
    });

    (
        Slot {
            r#type,
            default,
            ..slot.clone()
        },
        changed,
    )
}

fn map_slots(slots: &[Slot], f: &mut impl FnMut(&Expr) -> (Expr, bool)) -> (Vec<Slot>, bool) {
    let mut changed = false;

    let slots = slots
        .iter()
        .map(|slot| {
            let (slot, slot_changed) = map_slot(slot, f);
            changed |= slot_changed;
            slot
        })
        .collect();

    (slots, changed)
}

pub(crate) fn map_function_type(
    function: &FunctionType,
    f: &mut impl FnMut(&Expr) -> (Expr, bool),
) -> (FunctionType, bool) {
    let (parameters, parameters_changed) = map_slots(&function.parameters, f);
    let (output, output_changed) = map_slot(&function.output, f);

    (
        FunctionType { parameters, output },
        parameters_changed || output_changed,
    )
}

pub(crate) fn map_container(
    container: &ContainerType,
    f: &mut impl FnMut(&Expr) -> (Expr, bool),
) -> (ContainerType, bool) {
    let (slots, changed) = map_slots(&container.slots, f);

    (
        ContainerType {
            slots,
            ..container.clone()
        },
        changed,
    )
}

/// Apply `f` to the body, the signature and the types of the temporaries.
pub(crate) fn map_abstraction(
    abstraction: &Abstraction,
    f: &mut impl FnMut(&Expr) -> (Expr, bool),
) -> (Abstraction, bool) {
    let mut changed = false;

    let body = abstraction.body.as_ref().map(|body| {
        let (body, body_changed) = f(body);
        changed |= body_changed;
        body
    });

    let signature = abstraction.signature.as_ref().map(|signature| {
        let (signature, signature_changed) = map_function_type(signature, f);
        changed |= signature_changed;
        signature
    });

    let temporaries = abstraction
        .temporaries
        .iter()
        .map(|temporary| Temporary {
            name: temporary.name.clone(),
            r#type: temporary.r#type.as_ref().map(|r#type| {
                let (r#type, type_changed) = f(r#type);
                changed |= type_changed;
                r#type
            }),
        })
        .collect();

    (
        Abstraction {
            body,
            signature,
            temporaries,
            ..abstraction.clone()
        },
        changed,
    )
}

/// Generate `<name>_0`, `<name>_1`, ... until a name not in `avoid` is
/// found.
pub fn fresh_name(name: &str, avoid: &BTreeSet<String>) -> String {
    let mut index = 0usize;

    loop {
        let candidate = format!("{name}_{index}");
        if !avoid.contains(&candidate) {
            return candidate;
        }

        index += 1;
    }
}

/// Pick a fresh name for every binder in `bound` that occurs in `incoming`.
fn renames_for<'a>(
    bound: impl IntoIterator<Item = &'a str>,
    incoming: &BTreeSet<String>,
    mut avoid: BTreeSet<String>,
) -> BTreeMap<String, String> {
    let mut renames = BTreeMap::new();

    for name in bound {
        if incoming.contains(name) && !renames.contains_key(name) {
            let fresh = fresh_name(name, &avoid);
            tracing::trace!(from = name, to = %fresh, "renaming binder to avoid capture");
            avoid.insert(fresh.clone());
            renames.insert(name.to_string(), fresh);
        }
    }

    renames
}

fn free_variables_of<'a>(values: impl IntoIterator<Item = &'a Expr>) -> BTreeSet<String> {
    values
        .into_iter()
        .flat_map(|value| value.free_variables().iter().cloned())
        .collect()
}

fn renaming(renames: &BTreeMap<String, String>) -> Bindings {
    renames
        .iter()
        .map(|(from, to)| (from.clone(), Expr::var(to)))
        .collect()
}

fn rename<'a>(name: &'a str, renames: &'a BTreeMap<String, String>) -> &'a str {
    renames.get(name).map_or(name, String::as_str)
}

/// Rename every name bound by `abstraction` that occurs free in one of
/// `values`, so that substituting the values into its body can't capture
/// them.
pub(crate) fn avoid_capture<'a>(
    abstraction: &'a Abstraction,
    values: impl IntoIterator<Item = &'a Expr>,
) -> Cow<'a, Abstraction> {
    let incoming = free_variables_of(values);
    let bound = abstraction.bound_names();

    if !bound.iter().any(|name| incoming.contains(*name)) {
        return Cow::Borrowed(abstraction);
    }

    let mut avoid = incoming.clone();
    avoid.extend(bound.iter().map(ToString::to_string));
    map_abstraction(abstraction, &mut |expr| {
        avoid.extend(expr.free_variables().iter().cloned());
        (expr.clone(), false)
    });

    let renames = renames_for(bound, &incoming, avoid);
    let renaming = renaming(&renames);

    let (mut renamed, _) = map_abstraction(abstraction, &mut |expr| expr.substitute(&renaming));

    for parameter in &mut renamed.parameters {
        *parameter = rename(parameter, &renames).to_string();
    }

    if let Some(signature) = &mut renamed.signature {
        if let Some(name) = &mut signature.output.name {
            *name = rename(name, &renames).to_string();
        }
    }

    for temporary in &mut renamed.temporaries {
        temporary.name = rename(&temporary.name, &renames).to_string();
    }

    Cow::Owned(renamed)
}

fn avoid_capture_in_container<'a>(
    container: &'a ContainerType,
    values: impl IntoIterator<Item = &'a Expr>,
) -> Cow<'a, ContainerType> {
    let incoming = free_variables_of(values);

    if !container
        .parameters
        .iter()
        .any(|name| incoming.contains(name))
    {
        return Cow::Borrowed(container);
    }

    let mut avoid = incoming.clone();
    avoid.extend(container.parameters.iter().cloned());
    map_container(container, &mut |expr| {
        avoid.extend(expr.free_variables().iter().cloned());
        (expr.clone(), false)
    });

    let renames = renames_for(
        container.parameters.iter().map(String::as_str),
        &incoming,
        avoid,
    );
    let renaming = renaming(&renames);

    let (mut renamed, _) = map_container(container, &mut |expr| expr.substitute(&renaming));

    for parameter in &mut renamed.parameters {
        *parameter = rename(parameter, &renames).to_string();
    }

    Cow::Owned(renamed)
}

/// View a generic container as the type operator over its parameters.
pub fn type_constructor(container: &ContainerType) -> Abstraction {
    let body = ContainerType {
        parameters: Vec::new(),
        ..container.clone()
    };

    Abstraction {
        name: container.name.clone(),
        kind: AbstractionKind::TypeOperator,
        parameters: container.parameters.clone(),
        body: Some(body.into()),
        signature: None,
        temporaries: Vec::new(),
    }
}

/// The abstraction `operator` denotes when applied, if it can be applied at
/// all: an abstraction with a body, or a generic container.
pub fn applicable(operator: &Expr) -> Option<Cow<'_, Abstraction>> {
    match operator.kind() {
        ExprKind::Abstraction(abstraction) if !abstraction.is_external() => {
            Some(Cow::Borrowed(abstraction))
        }
        ExprKind::Container(container) if container.is_generic() => {
            Some(Cow::Owned(type_constructor(container)))
        }
        _ => None,
    }
}

/// Bind the parameters of `operator` to `arguments`, positionally.
///
/// - With as many arguments as parameters, the result is the instantiated
///   body.
/// - With fewer, the result is an abstraction over the remaining
///   parameters whose body has the provided arguments substituted.
/// - With more, the result applies the instantiated body to the remaining
///   arguments.
pub fn apply(operator: &Expr, arguments: &[Expr]) -> Result<Expr> {
    let abstraction =
        applicable(operator).ok_or_else(|| Diagnostic::NotApplicable(operator.to_string()))?;

    if arguments.is_empty() {
        return Ok(operator.clone());
    }

    let count = arguments.len().min(abstraction.parameters.len());
    let (consumed, rest) = arguments.split_at(count);

    let abstraction = avoid_capture(&abstraction, consumed).into_owned();

    let bindings: Bindings = abstraction
        .parameters
        .iter()
        .cloned()
        .zip(consumed.iter().cloned())
        .collect();

    tracing::trace!(
        parameters = abstraction.parameters.len(),
        arguments = arguments.len(),
        "applying abstraction"
    );

    if count < abstraction.parameters.len() {
        let signature = abstraction.signature.as_ref().map(|signature| FunctionType {
            parameters: signature.parameters.iter().skip(count).cloned().collect(),
            output: signature.output.clone(),
        });

        let residual = Abstraction {
            parameters: abstraction.parameters[count..].to_vec(),
            signature,
            ..abstraction.clone()
        };

        let (residual, _) = map_abstraction(&residual, &mut |expr| expr.substitute(&bindings));

        return Ok(residual.into());
    }

    let body = match &abstraction.body {
        Some(body) => body.substitute(&bindings).0,
        None => return Err(Diagnostic::NotApplicable(operator.to_string())),
    };

    if rest.is_empty() {
        Ok(body)
    } else {
        Ok(Expr::app(body, rest.iter().cloned()))
    }
}
