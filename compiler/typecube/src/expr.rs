//! Expressions and types.
//!
//! An [`Expr`] is a cheaply clonable handle to an immutable node. Nodes are
//! never mutated after construction; substitution and reduction build new
//! nodes and share the subtrees they didn't change. The only interior
//! mutability is the write-once [`Cache`] attached to every node.

use crate::{
    errors::{Diagnostic, Result},
    resolver::ResolverStack,
};
use derivative::Derivative;
use std::{
    cell::{Cell, OnceCell},
    collections::BTreeSet,
    fmt,
    rc::Rc,
};

/// A handle to an expression node.
///
/// Two handles compare equal if their trees are structurally equal; use
/// [`Expr::ptr_eq`] to test for node identity.
#[derive(Clone, PartialEq)]
pub struct Expr(Rc<Node>);

#[derive(Derivative)]
#[derivative(PartialEq)]
pub(crate) struct Node {
    pub kind: ExprKind,

    #[derivative(PartialEq = "ignore")]
    pub cache: Cache,
}

/// A memoized value that may be the node it is attached to. Storing
/// `Itself` instead of a handle keeps nodes from owning themselves.
#[derive(Clone)]
pub(crate) enum Memo {
    Itself,
    Value(Expr),
}

#[derive(Default)]
pub(crate) struct Cache {
    pub free_variables: OnceCell<BTreeSet<String>>,
    pub resolver: OnceCell<ResolverStack>,
    pub scope: OnceCell<ResolverStack>,
    pub resolved: OnceCell<Memo>,
    pub inferred: OnceCell<Memo>,
    pub in_progress: Cell<bool>,
}

impl Cache {
    fn carry(&self) -> Self {
        Cache {
            free_variables: self.free_variables.clone(),
            resolver: self.resolver.clone(),
            scope: self.scope.clone(),
            resolved: self.resolved.clone(),
            inferred: self.inferred.clone(),
            in_progress: Cell::new(false),
        }
    }
}

/// The kinds of expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// An occurrence of a name, bound by lookup.
    Variable(Path),

    /// A constant tagged with its type.
    Literal(Literal),

    /// A function, generic quantifier or type constructor.
    Abstraction(Abstraction),

    /// A call or generic instantiation.
    Application(Application),

    /// A named or positional slot projected out of a container-typed
    /// expression.
    Member(Member),

    /// Stands in for a name bound by an enclosing abstraction while its
    /// body is resolved before instantiation.
    Parameter(Parameter),

    /// A leaf type.
    Atomic(AtomicType),

    /// A record, tuple, union or enumeration.
    Container(ContainerType),

    /// The signature of an abstraction.
    Function(FunctionType),

    /// The instantiation of a generic type.
    TypeApplication(Application),
}

/// A dot-separated name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Vec<String>);

impl Path {
    /// Split `path` on `.`.
    pub fn parse(path: &str) -> Self {
        Path(path.split('.').map(ToString::to_string).collect())
    }

    /// Build a path from its segments.
    pub fn from_segments(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Path(segments.into_iter().map(Into::into).collect())
    }

    /// The first segment, which is the name bound by lookup.
    pub fn root(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// Every segment after the first.
    pub fn tail(&self) -> &[String] {
        self.0.get(1..).unwrap_or_default()
    }

    /// All segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether the path has more than one segment.
    pub fn is_dotted(&self) -> bool {
        self.0.len() > 1
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A constant value.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    /// The value itself.
    pub value: LiteralValue,

    /// The type the value is tagged with.
    pub r#type: Expr,
}

/// The values a [`Literal`] can carry. Literals are never evaluated; the
/// value is carried alongside its type tag.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum LiteralValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for LiteralValue {
    fn from(value: bool) -> Self {
        LiteralValue::Boolean(value)
    }
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        LiteralValue::Integer(value)
    }
}

impl From<f64> for LiteralValue {
    fn from(value: f64) -> Self {
        LiteralValue::Float(value)
    }
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        LiteralValue::Text(value.to_string())
    }
}

/// What an [`Abstraction`] is used for. All kinds share substitution,
/// currying and resolution; the kind only matters when inferring types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AbstractionKind {
    /// A function over values.
    #[default]
    Function,

    /// A generic quantifier over types.
    Quantifier,

    /// A type constructor. A type operator without parameters is an alias
    /// for its body.
    TypeOperator,
}

impl AbstractionKind {
    /// Whether the abstraction constructs types.
    pub fn is_type_operator(self) -> bool {
        self == AbstractionKind::TypeOperator
    }
}

/// A parameterized expression binding names over a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Abstraction {
    /// The declared name, if any.
    pub name: Option<String>,

    /// What the abstraction is used for.
    pub kind: AbstractionKind,

    /// The names bound by the abstraction, in order.
    pub parameters: Vec<String>,

    /// The body. External abstractions (eg. builtin type constructors)
    /// have no body and are opaque.
    pub body: Option<Expr>,

    /// The declared signature. If present, it has one parameter slot per
    /// parameter.
    pub signature: Option<FunctionType>,

    /// Locally-declared variables, also bound by the abstraction.
    pub temporaries: Vec<Temporary>,
}

/// A variable declared inside an abstraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Temporary {
    /// The name of the variable.
    pub name: String,

    /// The declared type of the variable, if known.
    pub r#type: Option<Expr>,
}

impl Abstraction {
    /// An anonymous function binding `parameters` over `body`.
    pub fn new(parameters: impl IntoIterator<Item = impl Into<String>>, body: Expr) -> Self {
        Abstraction {
            name: None,
            kind: AbstractionKind::Function,
            parameters: parameters.into_iter().map(Into::into).collect(),
            body: Some(body),
            signature: None,
            temporaries: Vec::new(),
        }
    }

    /// An abstraction without a body, such as a builtin type constructor.
    pub fn external(parameters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Abstraction {
            name: None,
            kind: AbstractionKind::Function,
            parameters: parameters.into_iter().map(Into::into).collect(),
            body: None,
            signature: None,
            temporaries: Vec::new(),
        }
    }

    /// Set the declared name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the kind.
    pub fn with_kind(mut self, kind: AbstractionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the declared signature.
    pub fn with_signature(mut self, signature: FunctionType) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Whether the abstraction has no body.
    pub fn is_external(&self) -> bool {
        self.body.is_none()
    }

    /// The name given to the return slot of the signature, if any.
    pub fn return_name(&self) -> Option<&str> {
        self.signature
            .as_ref()
            .and_then(|signature| signature.output.name.as_deref())
    }

    /// Every name the abstraction binds: its parameters, the return slot's
    /// name and its temporaries.
    pub fn bound_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .map(String::as_str)
            .chain(self.return_name())
            .chain(self.temporaries.iter().map(|temporary| temporary.name.as_str()))
            .collect()
    }

    /// Declare a temporary variable. Fails if the name is already bound by
    /// the abstraction.
    pub fn declare_temporary(
        &mut self,
        name: impl Into<String>,
        r#type: Option<Expr>,
    ) -> Result<()> {
        let name = name.into();

        if self.bound_names().contains(&name.as_str()) {
            return Err(Diagnostic::DuplicateBinding(name));
        }

        self.temporaries.push(Temporary { name, r#type });

        Ok(())
    }

    /// Like [`Abstraction::declare_temporary`], but consumes and returns
    /// the abstraction.
    pub fn with_temporary(mut self, name: impl Into<String>, r#type: Option<Expr>) -> Result<Self> {
        self.declare_temporary(name, r#type)?;
        Ok(self)
    }
}

/// An operator applied to arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    /// The expression being applied.
    pub operator: Expr,

    /// The arguments, in order.
    pub arguments: Vec<Expr>,
}

/// A slot projected out of a container-typed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// The expression being projected.
    pub target: Expr,

    /// The slot name, or its index if the container is unlabelled.
    pub member: String,
}

/// A placeholder for a name bound by an abstraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// The bound name.
    pub name: String,

    /// The declared type of the slot the name is bound to, if known.
    pub annotation: Option<Expr>,
}

/// A leaf type like `int` or `string`.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicType {
    /// The name of the type.
    pub name: String,

    /// The fully qualified name of the enclosing scope, if any.
    pub scope: Option<String>,
}

/// Whether a container is a product or a sum of its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerTag {
    /// Records and tuples.
    Product,

    /// Unions and enumerations.
    Sum,
}

/// A type with child slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerType {
    /// Product or sum.
    pub tag: ContainerTag,

    /// The declared name, if any.
    pub name: Option<String>,

    /// The fully qualified name of the enclosing scope, if any.
    pub scope: Option<String>,

    /// Generic parameter names. A container with parameters can be applied
    /// like a type operator.
    pub parameters: Vec<String>,

    /// The child slots, in order.
    pub slots: Vec<Slot>,
}

impl ContainerType {
    /// An empty container.
    pub fn new(tag: ContainerTag) -> Self {
        ContainerType {
            tag,
            name: None,
            scope: None,
            parameters: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// An empty record.
    pub fn record(name: impl Into<String>) -> Self {
        ContainerType::new(ContainerTag::Product).with_name(name)
    }

    /// An empty union.
    pub fn union(name: impl Into<String>) -> Self {
        ContainerType::new(ContainerTag::Sum).with_name(name)
    }

    /// An unnamed tuple of the provided types.
    pub fn tuple(types: impl IntoIterator<Item = Expr>) -> Self {
        ContainerType {
            slots: types.into_iter().map(Slot::positional).collect(),
            ..ContainerType::new(ContainerTag::Product)
        }
    }

    /// Set the declared name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the enclosing scope.
    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the generic parameters.
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// Add a child slot. Fails if a slot with the same name already exists.
    pub fn add_slot(&mut self, slot: Slot) -> Result<()> {
        if let Some(name) = &slot.name {
            if self.slot_for_name(name).is_some() {
                return Err(Diagnostic::DuplicateBinding(name.clone()));
            }
        }

        self.slots.push(slot);

        Ok(())
    }

    /// Like [`ContainerType::add_slot`], but consumes and returns the
    /// container.
    pub fn with_slot(mut self, slot: Slot) -> Result<Self> {
        self.add_slot(slot)?;
        Ok(self)
    }

    /// Whether the slots carry names.
    pub fn is_labelled(&self) -> bool {
        self.slots.iter().any(|slot| slot.name.is_some())
    }

    /// Whether the container can be applied to type arguments.
    pub fn is_generic(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// The slot with the provided name.
    pub fn slot_for_name(&self, name: &str) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|slot| slot.name.as_deref() == Some(name))
    }

    /// The slot at the provided position.
    pub fn slot_at_index(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Look up a slot by name if the container is labelled, otherwise by
    /// position.
    pub fn slot(&self, member: &str) -> Option<&Slot> {
        if self.is_labelled() {
            self.slot_for_name(member)
        } else {
            member
                .parse()
                .ok()
                .and_then(|index| self.slot_at_index(index))
        }
    }
}

/// A child of a container or function type.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// The name of the slot, if labelled.
    pub name: Option<String>,

    /// The type of the slot.
    pub r#type: Expr,

    /// The value used when the slot is omitted.
    pub default: Option<Expr>,

    /// Whether the slot may be omitted.
    pub optional: bool,
}

impl Slot {
    /// A labelled slot.
    pub fn named(name: impl Into<String>, r#type: Expr) -> Self {
        Slot {
            name: Some(name.into()),
            r#type,
            default: None,
            optional: false,
        }
    }

    /// An unlabelled slot.
    pub fn positional(r#type: Expr) -> Self {
        Slot {
            name: None,
            r#type,
            default: None,
            optional: false,
        }
    }

    /// Mark the slot as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }

    pub(crate) fn map_type(&self, r#type: Expr) -> Self {
        Slot {
            r#type,
            ..self.clone()
        }
    }
}

/// The type of an abstraction.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    /// One slot per parameter.
    pub parameters: Vec<Slot>,

    /// The return slot. Naming it binds the name inside the abstraction's
    /// body.
    pub output: Slot,
}

impl FunctionType {
    /// A function type from unlabelled parameter types to `output`.
    pub fn new(parameters: impl IntoIterator<Item = Expr>, output: Expr) -> Self {
        FunctionType {
            parameters: parameters.into_iter().map(Slot::positional).collect(),
            output: Slot::positional(output),
        }
    }

    /// Name the return slot.
    pub fn with_return_name(mut self, name: impl Into<String>) -> Self {
        self.output.name = Some(name.into());
        self
    }
}

impl Expr {
    /// Wrap a node kind in a fresh node.
    pub fn new(kind: ExprKind) -> Self {
        Expr(Rc::new(Node {
            kind,
            cache: Cache::default(),
        }))
    }

    /// A reference to a name.
    pub fn var(path: &str) -> Self {
        Expr::new(ExprKind::Variable(Path::parse(path)))
    }

    /// A constant tagged with `type`.
    pub fn literal(value: impl Into<LiteralValue>, r#type: Expr) -> Self {
        Expr::new(ExprKind::Literal(Literal {
            value: value.into(),
            r#type,
        }))
    }

    /// An anonymous function binding `parameters` over `body`.
    pub fn abs(parameters: impl IntoIterator<Item = impl Into<String>>, body: Expr) -> Self {
        Abstraction::new(parameters, body).into()
    }

    /// Apply `operator` to `arguments`.
    pub fn app(operator: Expr, arguments: impl IntoIterator<Item = Expr>) -> Self {
        Expr::new(ExprKind::Application(Application {
            operator,
            arguments: arguments.into_iter().collect(),
        }))
    }

    /// Instantiate the generic type `operator` with `arguments`.
    pub fn type_app(operator: Expr, arguments: impl IntoIterator<Item = Expr>) -> Self {
        Expr::new(ExprKind::TypeApplication(Application {
            operator,
            arguments: arguments.into_iter().collect(),
        }))
    }

    /// Project `member` out of `target`.
    pub fn member(target: Expr, member: impl Into<String>) -> Self {
        Expr::new(ExprKind::Member(Member {
            target,
            member: member.into(),
        }))
    }

    /// A placeholder for the bound name `name`.
    pub fn parameter(name: impl Into<String>, annotation: Option<Expr>) -> Self {
        Expr::new(ExprKind::Parameter(Parameter {
            name: name.into(),
            annotation,
        }))
    }

    /// A leaf type.
    pub fn atomic(name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Atomic(AtomicType {
            name: name.into(),
            scope: None,
        }))
    }

    /// The node's kind.
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub(crate) fn cache(&self) -> &Cache {
        &self.0.cache
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A new node with the same contents and the same memoized state.
    /// Children are shared.
    pub fn duplicate(&self) -> Self {
        Expr(Rc::new(Node {
            kind: self.0.kind.clone(),
            cache: self.0.cache.carry(),
        }))
    }

    /// Whether the expression denotes a type.
    pub fn is_type(&self) -> bool {
        matches!(
            self.kind(),
            ExprKind::Atomic(_)
                | ExprKind::Container(_)
                | ExprKind::Function(_)
                | ExprKind::TypeApplication(_)
        )
    }

    /// The name of a variable, atomic type, parameter or named container
    /// or abstraction.
    pub fn name(&self) -> Option<String> {
        match self.kind() {
            ExprKind::Variable(path) => Some(path.to_string()),
            ExprKind::Parameter(parameter) => Some(parameter.name.clone()),
            ExprKind::Atomic(atomic) => Some(atomic.name.clone()),
            ExprKind::Container(container) => container.name.clone(),
            ExprKind::Abstraction(abstraction) => abstraction.name.clone(),
            _ => None,
        }
    }

    /// The container type, if the expression is one.
    pub fn as_container(&self) -> Option<&ContainerType> {
        match self.kind() {
            ExprKind::Container(container) => Some(container),
            _ => None,
        }
    }

    /// The abstraction, if the expression is one.
    pub fn as_abstraction(&self) -> Option<&Abstraction> {
        match self.kind() {
            ExprKind::Abstraction(abstraction) => Some(abstraction),
            _ => None,
        }
    }

    /// The function type, if the expression is one.
    pub fn as_function_type(&self) -> Option<&FunctionType> {
        match self.kind() {
            ExprKind::Function(function) => Some(function),
            _ => None,
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind().fmt(f)
    }
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Expr::new(kind)
    }
}

impl From<Abstraction> for Expr {
    fn from(abstraction: Abstraction) -> Self {
        Expr::new(ExprKind::Abstraction(abstraction))
    }
}

impl From<ContainerType> for Expr {
    fn from(container: ContainerType) -> Self {
        Expr::new(ExprKind::Container(container))
    }
}

impl From<FunctionType> for Expr {
    fn from(function: FunctionType) -> Self {
        Expr::new(ExprKind::Function(function))
    }
}

impl From<AtomicType> for Expr {
    fn from(atomic: AtomicType) -> Self {
        Expr::new(ExprKind::Atomic(atomic))
    }
}
