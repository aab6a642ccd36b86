#![allow(missing_docs)]
#![cfg(test)]

use itertools::iproduct;
use rstest::rstest;
use typecube::{
    builtins, equiv, Abstraction, AbstractionKind, ContainerType, Diagnostic, Expr, ExprKind,
    FunctionType, Module, Options, Position, ResolverStack, Slot,
};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn reduce(expr: Expr) -> Expr {
    init_tracing();
    expr.reduce().expect("reduction failed").0
}

fn var(name: &str) -> Expr {
    Expr::var(name)
}

fn abs<const N: usize>(parameters: [&str; N], body: Expr) -> Expr {
    Expr::abs(parameters, body)
}

fn app<const N: usize>(operator: Expr, arguments: [Expr; N]) -> Expr {
    Expr::app(operator, arguments)
}

mod church {
    use super::*;

    pub fn r#true() -> Expr {
        abs(["t"], abs(["f"], var("t")))
    }

    pub fn r#false() -> Expr {
        abs(["t"], abs(["f"], var("f")))
    }

    pub fn boolean(value: bool) -> Expr {
        if value {
            r#true()
        } else {
            r#false()
        }
    }

    pub fn and() -> Expr {
        abs(["p"], abs(["q"], app(var("p"), [var("q"), var("p")])))
    }

    pub fn or() -> Expr {
        abs(["p"], abs(["q"], app(var("p"), [var("p"), var("q")])))
    }

    pub fn not() -> Expr {
        abs(["p"], abs(["a"], abs(["b"], app(var("p"), [var("b"), var("a")]))))
    }

    pub fn r#if() -> Expr {
        abs(["c"], abs(["t"], abs(["e"], app(var("c"), [var("t"), var("e")]))))
    }

    pub fn numeral(n: usize) -> Expr {
        let body = (0..n).fold(var("x"), |body, _| app(var("f"), [body]));
        abs(["f"], abs(["x"], body))
    }

    pub fn succ() -> Expr {
        abs(
            ["n"],
            abs(
                ["f"],
                abs(["x"], app(var("f"), [app(var("n"), [var("f"), var("x")])])),
            ),
        )
    }

    pub fn plus() -> Expr {
        abs(
            ["m"],
            abs(
                ["n"],
                abs(
                    ["f"],
                    abs(
                        ["x"],
                        app(var("m"), [var("f"), app(var("n"), [var("f"), var("x")])]),
                    ),
                ),
            ),
        )
    }

    pub fn pair() -> Expr {
        abs(["x"], abs(["y"], abs(["z"], app(var("z"), [var("x"), var("y")]))))
    }

    pub fn first() -> Expr {
        abs(["p"], app(var("p"), [abs(["x"], abs(["y"], var("x")))]))
    }

    pub fn second() -> Expr {
        abs(["p"], app(var("p"), [abs(["x"], abs(["y"], var("y")))]))
    }
}

#[test]
fn identity_with_free_variable() {
    let result = reduce(app(abs(["x"], var("x")), [var("y")]));
    assert_eq!(result.name().as_deref(), Some("y"));
}

#[rstest]
#[case(church::r#true(), "v")]
#[case(church::r#false(), "w")]
fn boolean_selects_branch(#[case] condition: Expr, #[case] expected: &str) {
    let result = reduce(app(condition, [var("v"), var("w")]));
    assert!(equiv(&result, &var(expected)), "got {result}");
}

#[test]
fn truth_tables() {
    for (p, q) in iproduct!([false, true], [false, true]) {
        let and = reduce(app(church::and(), [church::boolean(p), church::boolean(q)]));
        assert!(equiv(&and, &church::boolean(p && q)), "{p} and {q} gave {and}");

        let or = reduce(app(church::or(), [church::boolean(p), church::boolean(q)]));
        assert!(equiv(&or, &church::boolean(p || q)), "{p} or {q} gave {or}");
    }

    for p in [false, true] {
        let not = reduce(app(church::not(), [church::boolean(p)]));
        assert!(equiv(&not, &church::boolean(!p)), "not {p} gave {not}");
    }
}

#[rstest]
#[case(true, "a")]
#[case(false, "b")]
fn if_then_else(#[case] condition: bool, #[case] expected: &str) {
    let result = reduce(app(
        church::r#if(),
        [church::boolean(condition), var("a"), var("b")],
    ));

    assert!(equiv(&result, &var(expected)));
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(4)]
fn successor(#[case] n: usize) {
    let result = reduce(app(church::succ(), [church::numeral(n)]));
    assert!(equiv(&result, &church::numeral(n + 1)), "succ {n} gave {result}");
}

#[test]
fn nested_successor() {
    let two = app(church::succ(), [app(church::succ(), [church::numeral(0)])]);
    assert!(equiv(&reduce(two), &church::numeral(2)));
}

#[rstest]
#[case(0, 0)]
#[case(1, 2)]
#[case(2, 3)]
fn addition(#[case] m: usize, #[case] n: usize) {
    let sum = reduce(app(church::plus(), [church::numeral(m), church::numeral(n)]));
    assert!(equiv(&sum, &church::numeral(m + n)), "{m} + {n} gave {sum}");
}

#[test]
fn pair_projections() {
    let pair = reduce(app(church::pair(), [var("a"), var("b")]));

    let first = reduce(app(church::first(), [pair.clone()]));
    assert_eq!(first.name().as_deref(), Some("a"));

    let second = reduce(app(church::second(), [pair]));
    assert_eq!(second.name().as_deref(), Some("b"));
}

#[test]
fn currying_matches_full_application() {
    let operator = Expr::abs(
        ["a", "b", "c"],
        app(var("g"), [var("a"), var("b"), var("c")]),
    );

    let partial = reduce(app(operator.clone(), [var("x")]));
    let ExprKind::Abstraction(abstraction) = partial.kind() else {
        panic!("expected an abstraction, got {partial}");
    };
    assert_eq!(abstraction.parameters, ["b", "c"]);

    let curried = reduce(app(partial.clone(), [var("y"), var("z")]));
    let direct = reduce(app(operator, [var("x"), var("y"), var("z")]));

    assert!(equiv(&curried, &direct));
    assert!(equiv(
        &direct,
        &app(var("g"), [var("x"), var("y"), var("z")])
    ));
}

#[test]
fn reduction_is_idempotent() {
    let once = reduce(app(church::plus(), [church::numeral(1), church::numeral(1)]));
    let (twice, progressed) = once.reduce().unwrap();
    assert!(!progressed);
    assert!(twice.ptr_eq(&once));
}

#[test]
fn divergent_term_reports_step_limit() {
    let omega = abs(["x"], app(var("x"), [var("x")]));
    let expr = app(omega.clone(), [omega]);

    let result = expr.reduce_with_options(Options::default().with_step_limit(Some(100)));
    assert_eq!(result, Err(Diagnostic::RecursionLimit(100)));
}

#[test]
fn capture_is_avoided_in_nested_bodies() {
    // (\x. \y. x y) y must not capture the free y
    let expr = app(abs(["x"], abs(["y"], app(var("x"), [var("y")]))), [var("y")]);
    let result = reduce(expr);

    assert!(equiv(&result, &abs(["z"], app(var("y"), [var("z")]))));
    assert!(result.free_variables().contains("y"));
}

#[test]
fn fresh_names_skip_names_free_in_the_argument() {
    // (\x. \y. x y) (y y_0) renames the binder past both y and y_0
    let argument = app(var("y"), [var("y_0")]);
    let expr = app(abs(["x"], abs(["y"], app(var("x"), [var("y")]))), [argument.clone()]);
    let result = reduce(expr);

    insta::assert_snapshot!(result.to_string(), @"λy_1. ((y y_0) y_1)");
    assert!(equiv(&result, &abs(["z"], app(argument, [var("z")]))));
    assert!(result.free_variables().contains("y_0"));
}

#[test]
fn display() {
    insta::assert_snapshot!(church::pair().to_string(), @"λx. λy. λz. (z x y)");
    insta::assert_snapshot!(church::numeral(2).to_string(), @"λf. λx. (f (f x))");

    let record = ContainerType::record("Point")
        .with_slot(Slot::named("x", builtins::int()))
        .unwrap()
        .with_slot(Slot::named("y", builtins::int()))
        .unwrap();
    insta::assert_snapshot!(Expr::from(record).to_string(), @"record Point { x: int, y: int }");
}

#[test]
fn diagnostic_serialization() {
    let diagnostic = Diagnostic::ArityMismatch {
        expected: 2,
        found: 3,
    };

    insta::assert_json_snapshot!(diagnostic, @r###"
    {
      "type": "arityMismatch",
      "value": {
        "expected": 2,
        "found": 3
      }
    }
    "###);

    insta::assert_snapshot!(
        Diagnostic::UnresolvedName(String::from("Foo")).to_string(),
        @"unable to resolve name `Foo`"
    );
}

mod resolution {
    use super::*;

    fn pair() -> Expr {
        ContainerType::record("Pair")
            .with_parameters(["F", "S"])
            .with_slot(Slot::named("first", var("F")))
            .unwrap()
            .with_slot(Slot::named("second", var("S")))
            .unwrap()
            .into()
    }

    fn alias(body: Expr) -> Expr {
        Abstraction::new(Vec::<String>::new(), body)
            .with_kind(AbstractionKind::TypeOperator)
            .into()
    }

    fn program() -> ResolverStack {
        init_tracing();

        let mut module = builtins::module();
        module.add("Pair", pair()).unwrap();
        module
            .add(
                "IntPair",
                alias(Expr::type_app(var("Pair"), [var("int"), var("int")])),
            )
            .unwrap();

        let geometry = module.ensure_module("geometry").unwrap();
        geometry
            .add(
                "Point",
                ContainerType::record("Point")
                    .in_scope("geometry")
                    .with_slot(Slot::named("x", var("float")))
                    .unwrap()
                    .with_slot(Slot::named("y", var("float")))
                    .unwrap()
                    .into(),
            )
            .unwrap();

        module.set_alias("Point", "geometry.Point");

        let signature = FunctionType::new([var("int")], var("int"));
        module
            .add(
                "identity",
                Abstraction::new(["x"], var("x"))
                    .with_name("identity")
                    .with_signature(signature)
                    .into(),
            )
            .unwrap();

        ResolverStack::new(module)
    }

    #[test]
    fn instantiates_generic_record() {
        let stack = program();
        let expr = Expr::type_app(var("Pair"), [var("int"), var("string")]);

        let value = expr.resolve_with(&stack).unwrap();
        insta::assert_snapshot!(value.to_string(), @"record Pair { first: int, second: string }");
        insta::assert_snapshot!(value.signature(), @"Pair<int, string>");
    }

    #[test]
    fn instantiated_slots_accept_matching_types() {
        let stack = program();
        let value = Expr::type_app(var("Pair"), [var("int"), var("string")])
            .resolve_with(&stack)
            .unwrap();

        let container = value.as_container().unwrap();
        let first = &container.slot("first").unwrap().r#type;
        let second = &container.slot("second").unwrap().r#type;

        assert!(typecube::can_substitute(&builtins::int(), first));
        assert!(!typecube::can_substitute(&builtins::string(), first));
        assert!(typecube::can_substitute(&builtins::string(), second));
    }

    #[test]
    fn modules_distinguish_types_with_the_same_name() {
        let mut module = builtins::module();
        for scope in ["geometry", "charts"] {
            module
                .ensure_module(scope)
                .unwrap()
                .add(
                    "Point",
                    ContainerType::record("Point")
                        .with_slot(Slot::named("x", var("float")))
                        .unwrap()
                        .into(),
                )
                .unwrap();
        }

        let stack = ResolverStack::new(module);
        let geometry = var("geometry.Point").resolve_with(&stack).unwrap();
        let charts = var("charts.Point").resolve_with(&stack).unwrap();

        insta::assert_snapshot!(geometry.to_string(), @"record geometry.Point { x: float }");
        assert!(!typecube::can_substitute(&geometry, &charts));
        assert!(typecube::can_substitute(&geometry, &geometry));
    }

    #[test]
    fn shared_subtrees_keep_their_scope() {
        let shared = var("x");
        let left = Expr::from(ContainerType::tuple([shared.clone()]));
        let right = Expr::from(ContainerType::tuple([shared]));

        let first = Module::new(None).with("x", builtins::int()).unwrap();
        let second = Module::new(None).with("x", builtins::string()).unwrap();

        let value = left.resolve_with(&ResolverStack::new(first)).unwrap();
        insta::assert_snapshot!(value.to_string(), @"(int)");

        assert!(matches!(
            right.resolve_with(&ResolverStack::new(second)),
            Err(Diagnostic::ResolverReassignment(_))
        ));
    }

    #[test]
    fn curried_instantiation_matches_full() {
        let stack = program();

        let partial = Expr::type_app(var("Pair"), [var("int")]);
        let partial = partial.resolve_with(&stack).unwrap();
        assert!(matches!(partial.kind(), ExprKind::Abstraction(_)));

        let curried = Expr::type_app(partial, [var("string")]);
        let curried = curried.resolve_with(&stack).unwrap();

        let direct = Expr::type_app(var("Pair"), [var("int"), var("string")]);
        let direct = direct.resolve_with(&stack).unwrap();

        assert!(typecube::can_substitute(&curried, &direct));
        assert!(typecube::can_substitute(&direct, &curried));
    }

    #[rstest]
    #[case("IntPair.first", "int")]
    #[case("Point.y", "float")]
    #[case("geometry.Point.x", "float")]
    fn dotted_paths(#[case] path: &str, #[case] expected: &str) {
        let stack = program();
        let value = var(path).resolve_with(&stack).unwrap();
        assert_eq!(value.to_string(), expected);
    }

    #[rstest]
    #[case("missing", "UnresolvedName")]
    #[case("IntPair.third", "UnknownMember")]
    #[case("int.first", "NotIndexable")]
    fn resolution_errors(#[case] path: &str, #[case] kind: &str) {
        let stack = program();
        let error = var(path).resolve_with(&stack).unwrap_err();
        assert!(format!("{error:?}").starts_with(kind), "got {error:?}");
    }

    #[test]
    fn resolution_is_idempotent() {
        let stack = program();
        let expr = Expr::type_app(var("Pair"), [var("int"), var("string")]);

        let first = expr.resolve_with(&stack).unwrap();
        let second = expr.resolve_with(&stack).unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn reassignment_is_rejected() {
        let expr = var("int");
        expr.resolve_with(&program()).unwrap();

        assert!(matches!(
            expr.resolve_with(&program()),
            Err(Diagnostic::ResolverReassignment(_))
        ));
    }

    #[test]
    fn application_is_type_checked() {
        let stack = program();

        let call = app(var("identity"), [Expr::literal(1i64, var("int"))]);
        call.attach(&stack).unwrap();
        assert_eq!(call.inferred_type().unwrap(), builtins::int());

        let call = app(var("identity"), [Expr::literal(1.5, var("float"))]);
        call.attach(&stack).unwrap();
        assert_eq!(
            call.inferred_type(),
            Err(Diagnostic::TypeMismatch {
                position: Position::Argument(0),
                expected: String::from("int"),
                actual: String::from("float"),
            })
        );
    }

    #[test]
    fn applied_function_resolves_to_argument() {
        let stack = program();
        let literal = Expr::literal(7i64, var("int"));
        let call = app(var("identity"), [literal]);

        let value = call.resolve_with(&stack).unwrap();
        insta::assert_snapshot!(value.to_string(), @"7");
    }
}

mod unifier {
    use super::*;
    use typecube::can_substitute;

    fn tuple<const N: usize>(types: [Expr; N]) -> Expr {
        ContainerType::tuple(types).into()
    }

    #[rstest]
    #[case(builtins::int(), builtins::int(), true)]
    #[case(builtins::int(), builtins::any(), true)]
    #[case(builtins::any(), builtins::int(), false)]
    #[case(builtins::int(), builtins::string(), false)]
    #[case(builtins::string(), Expr::parameter("T", None), true)]
    #[case(
        tuple([builtins::int(), builtins::string()]),
        tuple([builtins::int(), builtins::any()]),
        true
    )]
    #[case(
        tuple([builtins::int(), builtins::string()]),
        tuple([builtins::int()]),
        false
    )]
    #[case(
        FunctionType::new([builtins::int()], builtins::string()).into(),
        FunctionType::new([builtins::int()], builtins::string()).into(),
        true
    )]
    #[case(
        FunctionType::new([builtins::int()], builtins::string()).into(),
        FunctionType::new([builtins::int(), builtins::int()], builtins::string()).into(),
        false
    )]
    #[case(
        Expr::type_app(builtins::list(), [builtins::int()]),
        Expr::type_app(builtins::list(), [builtins::any()]),
        true
    )]
    #[case(
        Expr::type_app(builtins::list(), [builtins::int()]),
        Expr::type_app(builtins::map(), [builtins::int()]),
        false
    )]
    fn substitutability(#[case] peg: Expr, #[case] hole: Expr, #[case] expected: bool) {
        assert_eq!(can_substitute(&peg, &hole), expected, "{peg} into {hole}");
    }

    #[test]
    fn equal_types_substitute_both_ways() {
        let types = [
            builtins::int(),
            tuple([builtins::int(), builtins::float()]),
            FunctionType::new([builtins::string()], builtins::boolean()).into(),
        ];

        for r#type in types {
            let copy = r#type.duplicate();
            assert!(can_substitute(&r#type, &copy));
            assert!(can_substitute(&copy, &r#type));
        }
    }

    #[test]
    fn scope_distinguishes_named_types() {
        let local = Expr::from(ContainerType::record("Point").in_scope("geometry"));
        let other = Expr::from(ContainerType::record("Point").in_scope("charts"));
        assert!(!can_substitute(&local, &other));
        assert!(can_substitute(&local, &local.duplicate()));
    }
}

mod scopes {
    use super::*;
    use typecube::{MapResolver, Resolver};

    #[test]
    fn shared_tails_are_independent() {
        let base = ResolverStack::new(MapResolver::new([("x", builtins::int())]));
        let left = base.push(MapResolver::new([("y", builtins::string())]));
        let right = base.push(MapResolver::new([("y", builtins::boolean())]));

        assert_eq!(left.resolve("y").unwrap().value, builtins::string());
        assert_eq!(right.resolve("y").unwrap().value, builtins::boolean());
        assert_eq!(left.resolve("x").unwrap().value, builtins::int());
        assert!(base.resolve("y").is_err());
    }

    #[test]
    fn module_entries_keep_insertion_order() {
        let mut module = Module::new(Some(String::from("root")));
        module.add("b", builtins::int()).unwrap();
        module.add("a", builtins::string()).unwrap();

        let names = module.entries().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(
            module.resolve_name("a").map(|value| value.to_string()),
            Some(String::from("root.string"))
        );
        assert!(matches!(
            module.add("a", builtins::int()),
            Err(Diagnostic::DuplicateBinding(_))
        ));
    }
}
