//! Whole-program construction scenarios driving the frontend and the full
//! resolver pipeline over in-memory Go sources.

use gocpg::config::CpgConfig;
use gocpg::frontend::{self, Translation};
use gocpg::node::{NodeId, NodeKind, RecordKind};
use gocpg::project::Project;

fn build(sources: &[(&str, &str)]) -> Translation {
    build_with_module(Some("p"), sources)
}

fn build_with_module(module: Option<&str>, sources: &[(&str, &str)]) -> Translation {
    let project = Project::from_sources(module, sources);
    let config = CpgConfig::default();
    frontend::construct(&project, &config).expect("construction failed")
}

fn record<'a>(translation: &'a Translation, fqn: &str) -> &'a gocpg::node::Node {
    let id = translation
        .graph
        .record_by_fqn(fqn)
        .unwrap_or_else(|| panic!("record {} not in FQN index", fqn));
    translation.graph.node(id)
}

fn find_nodes(translation: &Translation, pred: impl Fn(&gocpg::node::Node) -> bool) -> Vec<NodeId> {
    translation
        .graph
        .all_nodes()
        .filter(|n| pred(n))
        .map(|n| n.id)
        .collect()
}

#[test]
fn struct_with_method_and_field() {
    let translation = build(&[(
        "struct.go",
        r#"package p

type MyStruct struct {
	MyField int
}

func (s MyStruct) MyFunc() string {
	return s.myOtherFunc()
}

func (s MyStruct) myOtherFunc() string {
	return ""
}
"#,
    )]);

    let my_struct = record(&translation, "p.MyStruct");
    let NodeKind::Record {
        kind,
        fields,
        methods,
        ..
    } = &my_struct.kind
    else {
        panic!("not a record");
    };

    assert_eq!(*kind, RecordKind::Struct);

    assert_eq!(fields.len(), 1);
    let field = translation.graph.node(fields[0]);
    assert_eq!(field.name, "MyField");
    assert_eq!(translation.types.name(field.ty.unwrap()), "int");

    assert_eq!(methods.len(), 2);
    let method = translation.graph.node(methods[0]);
    assert_eq!(method.name, "MyFunc");
    assert_eq!(
        translation.types.name(method.ty.unwrap()),
        "func() string"
    );
}

#[test]
fn methods_are_value_declarations_in_the_name_scope() {
    let translation = build(&[(
        "struct.go",
        "package p\n\ntype S struct{}\n\nfunc (s S) Do() {}\n",
    )]);

    let scope = translation
        .scopes
        .name_scope("p")
        .expect("package name scope");
    let slot = translation
        .scopes
        .scope(scope)
        .value_decls
        .get("Do")
        .expect("method reachable in name scope");
    assert_eq!(slot.len(), 1);

    let s = record(&translation, "p.S");
    let NodeKind::Record { methods, .. } = &s.kind else {
        panic!("not a record")
    };
    assert_eq!(methods[0], slot[0]);
}

#[test]
fn interface_embedding() {
    let translation = build(&[(
        "embed.go",
        r#"package p

type MyOtherInterface interface {
	OtherFunc() string
}

type MyInterface interface {
	MyOtherInterface
	MyFunc() string
}
"#,
    )]);

    let embedded = translation.graph.record_by_fqn("p.MyOtherInterface").unwrap();
    let my_interface = record(&translation, "p.MyInterface");

    let NodeKind::Record {
        super_types,
        super_type_decls,
        ..
    } = &my_interface.kind
    else {
        panic!("not a record");
    };

    let super_names: Vec<&str> = super_types
        .iter()
        .map(|t| translation.types.name(*t))
        .collect();
    assert_eq!(super_names, vec!["p.MyOtherInterface"]);
    assert_eq!(super_type_decls.as_slice(), &[embedded]);
}

#[test]
fn structural_interface_implementation() {
    let translation = build(&[(
        "impl.go",
        r#"package p

type I interface {
	F() int
}

type S struct{}

func (s S) F() int {
	return 1
}

var x I
"#,
    )]);

    let s = record(&translation, "p.S");
    let NodeKind::Record {
        implemented_interfaces,
        ..
    } = &s.kind
    else {
        panic!("not a record");
    };

    let names: Vec<&str> = implemented_interfaces
        .iter()
        .map(|t| translation.types.name(*t))
        .collect();
    assert_eq!(names, vec!["p.I"]);

    // widening: anything typed I may be an S at runtime
    let x = find_nodes(&translation, |n| {
        n.name == "x" && matches!(n.kind, NodeKind::Variable { .. })
    });
    assert_eq!(x.len(), 1);
    let sub_names: Vec<&str> = translation
        .graph
        .node(x[0])
        .possible_sub_types
        .iter()
        .map(|t| translation.types.name(*t))
        .collect();
    assert!(sub_names.contains(&"p.S"), "missing p.S in {:?}", sub_names);
}

#[test]
fn multiple_return_with_destructuring() {
    let translation = build(&[(
        "destructure.go",
        r#"package p

func f() (int, error) {
	return 1, nil
}

func g() int {
	a, b := f()
	if b != nil {
		return 0
	}
	return a
}
"#,
    )]);

    // one declaration statement holding both variables
    let decl_stmts = find_nodes(&translation, |n| match &n.kind {
        NodeKind::DeclarationStmt { declarations } => declarations.len() == 2,
        _ => false,
    });
    assert_eq!(decl_stmts.len(), 1);

    let NodeKind::DeclarationStmt { declarations } =
        &translation.graph.node(decl_stmts[0]).kind
    else {
        unreachable!()
    };

    let mut tuples = Vec::new();
    for (expected_index, variable) in declarations.iter().enumerate() {
        let NodeKind::Variable {
            initializer: Some(init),
        } = &translation.graph.node(*variable).kind
        else {
            panic!("variable without initializer");
        };

        let NodeKind::DestructureTuple { index, tuple } = &translation.graph.node(*init).kind
        else {
            panic!("initializer is not a destructure");
        };
        assert_eq!(*index, expected_index);
        tuples.push(*tuple);
    }

    // both destructures project the same call expression
    assert_eq!(tuples[0], tuples[1]);
    assert!(matches!(
        translation.graph.node(tuples[0]).kind,
        NodeKind::Call { .. }
    ));
}

#[test]
fn type_assertion_is_a_cast() {
    let translation = build(&[(
        "main/type_assert.go",
        r#"package main

type MyStructTA struct{}

type MyInterface interface {
	MyFunc()
}

func (MyStructTA) MyFunc() {}

func main() {
	var f MyInterface = MyStructTA{}
	var s = f.(MyStructTA)
	_ = s
}
"#,
    )]);

    let s = find_nodes(&translation, |n| {
        n.name == "s" && matches!(n.kind, NodeKind::Variable { .. })
    });
    assert_eq!(s.len(), 1);

    let NodeKind::Variable {
        initializer: Some(init),
    } = &translation.graph.node(s[0]).kind
    else {
        panic!("s has no initializer");
    };

    let NodeKind::Cast { cast_type, inner } = &translation.graph.node(*init).kind else {
        panic!("initializer of s is not a cast");
    };
    assert_eq!(translation.types.name(*cast_type), "p/main.MyStructTA");

    // the inner expression refers to f
    let inner = inner.expect("cast has an inner expression");
    let f_decl = translation
        .graph
        .node(inner)
        .refers_to()
        .expect("inner reference resolved");
    assert_eq!(translation.graph.node(f_decl).name, "f");
}

#[test]
fn composite_literal_field_dfg() {
    let translation = build(&[(
        "dfg.go",
        r#"package p

type Person struct {
	Name string
	Age  int
}

func build() Person {
	p := Person{Name: "x", Age: 2}
	return p
}
"#,
    )]);

    let variable = find_nodes(&translation, |n| {
        n.name == "p" && matches!(n.kind, NodeKind::Variable { .. })
    });
    assert_eq!(variable.len(), 1);

    // backward traversal: variable <- construct <- list <- key-value <- value
    let mut frontier = vec![variable[0]];
    for _ in 0..4 {
        frontier = frontier
            .iter()
            .flat_map(|n| translation.graph.dfg_predecessors(*n).to_vec())
            .collect();
        assert!(!frontier.is_empty());
    }

    // after exactly 4 steps we are at the two value expressions
    assert_eq!(frontier.len(), 2);

    let person = translation.graph.record_by_fqn("p.Person").unwrap();
    let NodeKind::Record { fields, .. } = &translation.graph.node(person).kind else {
        panic!("not a record");
    };

    // each value flows into the matching field definition
    for value in &frontier {
        let flows_into_field = translation
            .graph
            .dfg_successors(*value)
            .iter()
            .any(|succ| fields.contains(succ));
        assert!(flows_into_field, "value has no DFG edge to a field");
    }
}

#[test]
fn function_pointer_call_binding() {
    let translation = build(&[(
        "fnptr.go",
        r#"package p

func target() int {
	return 1
}

func run() int {
	var f func() int = target
	return f()
}
"#,
    )]);

    let target = find_nodes(&translation, |n| {
        n.name == "target" && matches!(n.kind, NodeKind::Function { .. })
    });
    assert_eq!(target.len(), 1);

    let bound_calls = find_nodes(&translation, |n| match &n.kind {
        NodeKind::Call { invokes, .. } => invokes.contains(&target[0]),
        _ => false,
    });
    assert!(
        !bound_calls.is_empty(),
        "function pointer call was not bound to target"
    );
}

#[test]
fn embedded_member_promotion() {
    let translation = build(&[(
        "promote.go",
        r#"package p

type Inner struct{}

func (i Inner) Do() int {
	return 1
}

type Outer struct {
	Inner
}

func use(o Outer) int {
	return o.Do()
}
"#,
    )]);

    // the member call base was rewritten from `o` to `o.Inner`
    let member_calls = find_nodes(&translation, |n| {
        matches!(n.kind, NodeKind::MemberCall { .. })
    });
    assert_eq!(member_calls.len(), 1);

    let NodeKind::MemberCall { base, invokes, .. } =
        &translation.graph.node(member_calls[0]).kind
    else {
        unreachable!()
    };

    let base_node = translation.graph.node(*base);
    assert!(
        matches!(base_node.kind, NodeKind::Member { .. }),
        "base was not promoted through the embedded field"
    );
    assert_eq!(base_node.name, "Inner");

    // after promotion the call binds to Inner's method
    let inner = translation.graph.record_by_fqn("p.Inner").unwrap();
    let NodeKind::Record { methods, .. } = &translation.graph.node(inner).kind else {
        panic!("not a record");
    };
    assert_eq!(invokes.as_slice(), methods.as_slice());
}

#[test]
fn records_merge_across_files() {
    let translation = build(&[
        ("a.go", "package p\n\ntype A struct {\n\tB B\n}\n"),
        ("b.go", "package p\n\ntype B struct{}\n"),
    ]);

    // one shared name scope for the package
    assert!(translation.scopes.name_scope("p").is_some());

    let a = record(&translation, "p.A");
    let NodeKind::Record { fields, .. } = &a.kind else {
        panic!("not a record")
    };
    assert_eq!(translation.types.name(translation.graph.node(fields[0]).ty.unwrap()), "p.B");
    assert!(translation.graph.record_by_fqn("p.B").is_some());
}

#[test]
fn unresolved_references_survive() {
    let translation = build(&[(
        "dangling.go",
        "package p\n\nfunc f() int {\n\treturn undefinedThing\n}\n",
    )]);

    let dangling = find_nodes(&translation, |n| {
        n.name == "undefinedThing" && matches!(n.kind, NodeKind::Reference { refers_to: None })
    });
    assert_eq!(dangling.len(), 1, "dangling reference must survive unbound");
}

#[test]
fn parse_failure_drops_file_not_project() {
    let translation = build(&[
        ("broken.go", "package p\n\nfunc {{{\n"),
        ("ok.go", "package p\n\ntype Fine struct{}\n"),
    ]);

    assert_eq!(translation.graph.translation_units().len(), 1);
    assert!(translation.graph.record_by_fqn("p.Fine").is_some());
}

#[test]
fn import_qualified_references() {
    let translation = build(&[(
        "imports.go",
        r#"package p

import "fmt"

func greet() {
	fmt.Println("hi")
}
"#,
    )]);

    // the package-qualified call keeps its import-path FQN
    let calls = find_nodes(&translation, |n| {
        matches!(n.kind, NodeKind::Call { .. }) && n.name == "Println"
    });
    assert_eq!(calls.len(), 1);
    assert_eq!(
        translation.graph.node(calls[0]).fqn.as_deref(),
        Some("fmt.Println")
    );
}

#[test]
fn running_the_pipeline_twice_is_isomorphic() {
    let sources = &[(
        "main.go",
        r#"package p

type I interface {
	F() int
}

type S struct {
	Value int
}

func (s S) F() int {
	return s.Value
}

func use(i I) int {
	return i.F()
}
"#,
    )];

    let first = build(sources);
    let second = build(sources);

    assert_eq!(first.graph.len(), second.graph.len());
    assert_eq!(first.graph.dfg_edge_count(), second.graph.dfg_edge_count());

    let fqns = |t: &Translation| {
        let mut v: Vec<String> = t.graph.records().map(|(fqn, _)| fqn.clone()).collect();
        v.sort();
        v
    };
    assert_eq!(fqns(&first), fqns(&second));

    let kind_histogram = |t: &Translation| {
        let mut counts: std::collections::BTreeMap<&'static str, usize> = Default::default();
        for node in t.graph.all_nodes() {
            *counts.entry(node.kind.kind_name()).or_insert(0) += 1;
        }
        counts
    };
    assert_eq!(kind_histogram(&first), kind_histogram(&second));
}

#[test]
fn oracle_types_range_variables() {
    let source = r#"package p

func sum(xs []int) int {
	total := 0
	for _, x := range xs {
		total += x
	}
	return total
}
"#;

    // the oracle answers for the range value variable only
    let x_offset = source.find("x :=").unwrap();
    let mut oracle = gocpg::frontend::TableOracle::new();
    oracle.insert("range.go", (x_offset, x_offset + 1), "int");

    let project = Project::from_sources(Some("p"), &[("range.go", source)]);
    let translation =
        frontend::construct_with_oracle(&project, &CpgConfig::default(), Box::new(oracle))
            .expect("construction failed");

    let x = find_nodes(&translation, |n| {
        n.name == "x" && matches!(n.kind, NodeKind::Variable { .. })
    });
    assert_eq!(x.len(), 1);
    assert_eq!(
        translation
            .graph
            .node(x[0])
            .ty
            .map(|t| translation.types.name(t).to_string()),
        Some("int".to_string())
    );

    // the foreach holds one declaration statement with both loop variables
    let foreach = find_nodes(&translation, |n| {
        matches!(n.kind, NodeKind::ForEach { .. })
    });
    assert_eq!(foreach.len(), 1);
    let NodeKind::ForEach {
        variables,
        iterable,
        ..
    } = &translation.graph.node(foreach[0]).kind
    else {
        unreachable!()
    };
    assert_eq!(variables.len(), 1);
    assert!(matches!(
        translation.graph.node(variables[0]).kind,
        NodeKind::DeclarationStmt { .. }
    ));
    assert!(iterable.is_some());
}

#[test]
fn inferred_members_are_recorded() {
    let translation = build(&[(
        "infer.go",
        r#"package p

type Box struct{}

func open(b Box) {
	_ = b.Hidden
}
"#,
    )]);

    assert!(
        !translation.graph.inferred().is_empty(),
        "member on a known record without a declaration should be inferred"
    );

    let box_record = translation.graph.record_by_fqn("p.Box").unwrap();
    let NodeKind::Record { fields, .. } = &translation.graph.node(box_record).kind else {
        panic!("not a record");
    };
    assert!(fields
        .iter()
        .any(|f| translation.graph.node(*f).name == "Hidden"));
}
