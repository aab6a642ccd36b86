//! Scopes and name lookup.
//!
//! A [`ResolverStack`] is a persistent linked list of [`Resolver`] frames.
//! Pushing a frame returns a new stack and leaves every existing stack that
//! shares the tail untouched, so curried closures over the same enclosing
//! scope never interfere with each other.

use crate::{
    builtins,
    errors::{Diagnostic, Result},
    expr::{Abstraction, AbstractionKind, AtomicType, ContainerType, Expr, ExprKind, Path},
};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    rc::Rc,
};

/// Something that provides values for names.
pub trait Resolver {
    /// The value bound to `name`, if any.
    fn resolve_name(&self, name: &str) -> Option<Expr>;

    /// Resolve as many leading segments of `path` as this resolver knows
    /// about, returning the value and the number of segments consumed.
    /// By default only the first segment is looked up.
    fn resolve_path(&self, path: &[String]) -> Option<(Expr, usize)> {
        let name = path.first()?;
        self.resolve_name(name).map(|value| (value, 1))
    }

    /// Whether `name` is declared here, either as a value or as something
    /// a dotted path can walk into.
    fn declares(&self, name: &str) -> bool {
        self.resolve_name(name).is_some()
    }
}

/// A resolver backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    bindings: HashMap<String, Expr>,
}

impl MapResolver {
    /// Bind every `(name, value)` pair.
    pub fn new(bindings: impl IntoIterator<Item = (impl Into<String>, Expr)>) -> Self {
        MapResolver {
            bindings: bindings
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }

    /// Bind the parameters of `abstraction` to the provided arguments,
    /// positionally. Extra parameters are left unbound.
    pub fn from_arguments(abstraction: &Abstraction, arguments: &[Expr]) -> Self {
        MapResolver::new(
            abstraction
                .parameters
                .iter()
                .cloned()
                .zip(arguments.iter().cloned()),
        )
    }

    /// Bind every name bound by `abstraction` to a parameter placeholder,
    /// annotated with its declared type where the signature provides one.
    /// The parameters of quantifiers and type operators range over types
    /// and are annotated with `Kind`.
    pub fn for_abstraction(abstraction: &Abstraction) -> Self {
        let mut bindings = HashMap::new();

        for (index, name) in abstraction.parameters.iter().enumerate() {
            let annotation = abstraction
                .signature
                .as_ref()
                .and_then(|signature| signature.parameters.get(index))
                .map(|slot| slot.r#type.clone())
                .or_else(|| {
                    (abstraction.kind != AbstractionKind::Function).then(builtins::kind)
                });

            bindings.insert(name.clone(), Expr::parameter(name.clone(), annotation));
        }

        if let Some(signature) = &abstraction.signature {
            if let Some(name) = &signature.output.name {
                bindings.insert(
                    name.clone(),
                    Expr::parameter(name.clone(), Some(signature.output.r#type.clone())),
                );
            }
        }

        for temporary in &abstraction.temporaries {
            bindings.insert(
                temporary.name.clone(),
                Expr::parameter(temporary.name.clone(), temporary.r#type.clone()),
            );
        }

        MapResolver { bindings }
    }

    /// Bind the generic parameters of `container` to placeholders ranging
    /// over types.
    pub fn for_container(container: &ContainerType) -> Self {
        MapResolver::new(
            container
                .parameters
                .iter()
                .map(|name| {
                    let placeholder = Expr::parameter(name.clone(), Some(builtins::kind()));
                    (name.clone(), placeholder)
                }),
        )
    }
}

impl Resolver for MapResolver {
    fn resolve_name(&self, name: &str) -> Option<Expr> {
        self.bindings.get(name).cloned()
    }
}

/// A value found by a [`ResolverStack`], along with the stack starting at
/// the frame that provided it. The value is resolved in that scope.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The bound value.
    pub value: Expr,

    /// The scope in which the value was declared.
    pub scope: ResolverStack,

    /// How many segments of the requested path were consumed.
    pub consumed: usize,
}

/// An immutable, shareable chain of resolvers, innermost first.
#[derive(Clone)]
pub struct ResolverStack(Rc<Frame>);

struct Frame {
    resolver: Rc<dyn Resolver>,
    parent: Option<ResolverStack>,
}

impl ResolverStack {
    /// A stack with a single frame.
    pub fn new(resolver: impl Resolver + 'static) -> Self {
        ResolverStack::from_shared(Rc::new(resolver), None)
    }

    /// A stack whose first frame is shared with other stacks.
    pub fn from_shared(resolver: Rc<dyn Resolver>, parent: Option<ResolverStack>) -> Self {
        ResolverStack(Rc::new(Frame { resolver, parent }))
    }

    /// A new stack with `resolver` in front of this one.
    #[must_use]
    pub fn push(&self, resolver: impl Resolver + 'static) -> Self {
        ResolverStack::from_shared(Rc::new(resolver), Some(self.clone()))
    }

    /// The stack without its innermost frame.
    pub fn parent(&self) -> Option<&ResolverStack> {
        self.0.parent.as_ref()
    }

    /// Whether both stacks are the same chain of frames.
    pub fn ptr_eq(&self, other: &ResolverStack) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The number of frames.
    pub fn depth(&self) -> usize {
        1 + self.parent().map_or(0, ResolverStack::depth)
    }

    /// The stack starting at the innermost frame that declares `name`.
    pub fn provider(&self, name: &str) -> Option<&ResolverStack> {
        let mut stack = self;

        loop {
            if stack.0.resolver.declares(name) {
                return Some(stack);
            }

            stack = stack.parent()?;
        }
    }

    /// Look up `name`, innermost frame first.
    pub fn resolve(&self, name: &str) -> Result<Binding> {
        self.resolve_path(&Path::parse(name))
    }

    /// Look up the leading segments of `path`, innermost frame first.
    pub fn resolve_path(&self, path: &Path) -> Result<Binding> {
        let mut stack = self;

        loop {
            if let Some((value, consumed)) = stack.0.resolver.resolve_path(path.segments()) {
                return Ok(Binding {
                    value,
                    scope: stack.clone(),
                    consumed,
                });
            }

            match stack.parent() {
                Some(parent) => stack = parent,
                None => return Err(Diagnostic::UnresolvedName(path.to_string())),
            }
        }
    }
}

impl fmt::Debug for ResolverStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolverStack({} frames)", self.depth())
    }
}

/// A namespace of declarations, possibly containing other namespaces.
#[derive(Debug, Clone, Default)]
pub struct Module {
    fqn: Option<String>,
    entries: BTreeMap<String, Expr>,
    order: Vec<String>,
    modules: BTreeMap<String, Module>,
    aliases: BTreeMap<String, Path>,
}

impl Module {
    /// An empty module. The root module has no name.
    pub fn new(fqn: Option<String>) -> Self {
        Module {
            fqn,
            ..Default::default()
        }
    }

    /// The fully qualified name of the module.
    pub fn fqn(&self) -> Option<&str> {
        self.fqn.as_deref()
    }

    /// The last segment of the module's name.
    pub fn name(&self) -> Option<&str> {
        self.fqn
            .as_deref()
            .and_then(|fqn| fqn.rsplit('.').next())
    }

    /// Declare `entity` under `name`. Named types declared without a scope
    /// are recorded as belonging to this module.
    pub fn add(&mut self, name: impl Into<String>, entity: Expr) -> Result<()> {
        let name = name.into();

        if self.entries.contains_key(&name) || self.modules.contains_key(&name) {
            return Err(Diagnostic::DuplicateBinding(name));
        }

        let entity = match &self.fqn {
            Some(fqn) => declared_in(entity, fqn),
            None => entity,
        };

        self.order.push(name.clone());
        self.entries.insert(name, entity);

        Ok(())
    }

    /// Like [`Module::add`], but consumes and returns the module.
    pub fn with(mut self, name: impl Into<String>, entity: Expr) -> Result<Self> {
        self.add(name, entity)?;
        Ok(self)
    }

    /// Make `name` refer to the declaration at `fqn`, relative to this
    /// module.
    pub fn set_alias(&mut self, name: impl Into<String>, fqn: &str) {
        self.aliases.insert(name.into(), Path::parse(fqn));
    }

    /// The module at `fqn` relative to this module, creating any missing
    /// modules along the way. Fails if a segment names a declaration.
    pub fn ensure_module(&mut self, fqn: &str) -> Result<&mut Module> {
        let mut current = self;

        for part in fqn.split('.') {
            if current.entries.contains_key(part) {
                return Err(Diagnostic::DuplicateBinding(part.to_string()));
            }

            let child_fqn = match &current.fqn {
                Some(parent) => format!("{parent}.{part}"),
                None => part.to_string(),
            };

            current = current
                .modules
                .entry(part.to_string())
                .or_insert_with(|| Module::new(Some(child_fqn)));
        }

        Ok(current)
    }

    /// The declarations in this module, in the order they were added.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.order
            .iter()
            .filter_map(|name| Some((name.as_str(), self.entries.get(name)?)))
    }

    /// Find the declaration at the leading segments of `path`, walking child
    /// modules and aliases.
    pub fn get(&self, path: &[String]) -> Option<(Expr, usize)> {
        self.get_inner(path, 0)
    }

    fn get_inner(&self, path: &[String], depth: usize) -> Option<(Expr, usize)> {
        // Aliases can refer to each other; give up rather than loop forever
        if depth > self.aliases.len() {
            return None;
        }

        let (first, rest) = path.split_first()?;

        if let Some(target) = self.aliases.get(first) {
            let mut segments = target.segments().to_vec();
            segments.extend_from_slice(rest);

            let (value, consumed) = self.get_inner(&segments, depth + 1)?;
            let consumed_from_target = consumed.min(target.segments().len());

            return (consumed_from_target == target.segments().len())
                .then(|| (value, 1 + consumed - consumed_from_target));
        }

        if let Some(entry) = self.entries.get(first) {
            return Some((entry.clone(), 1));
        }

        let (value, consumed) = self.modules.get(first)?.get_inner(rest, 0)?;
        Some((value, consumed + 1))
    }
}

fn declared_in(entity: Expr, scope: &str) -> Expr {
    let scoped = match entity.kind() {
        ExprKind::Atomic(atomic) if atomic.scope.is_none() => Some(Expr::from(AtomicType {
            scope: Some(scope.to_string()),
            ..atomic.clone()
        })),
        ExprKind::Container(container) if container.name.is_some() && container.scope.is_none() => {
            Some(container.clone().in_scope(scope).into())
        }
        _ => None,
    };

    scoped.unwrap_or(entity)
}

impl Resolver for Module {
    fn resolve_name(&self, name: &str) -> Option<Expr> {
        self.get(Path::parse(name).segments())
            .map(|(value, _)| value)
    }

    fn resolve_path(&self, path: &[String]) -> Option<(Expr, usize)> {
        self.get(path)
    }

    fn declares(&self, name: &str) -> bool {
        self.entries.contains_key(name)
            || self.modules.contains_key(name)
            || self.aliases.contains_key(name)
    }
}
