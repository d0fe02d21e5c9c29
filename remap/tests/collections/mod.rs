use std::sync::Arc;

use remap::{ElementConversion, Mapper, MapperConfig, ResolverKind};
use remap_core::{StructDef, TypeId, Universe, Value};

use crate::fixtures::{map_both, member, orders, show};

#[test]
fn sequences_keep_their_destination_shape() {
    remap_testhelpers::setup();
    let o = orders();
    let mapper = Mapper::new(o.u.clone(), MapperConfig::default());
    let cx = mapper.context(o.order, o.order_dto);

    let source = o.order(vec![o.line("a", 1), o.line("b", 2)]);
    let out = map_both(&cx, &source).unwrap();
    insta::assert_snapshot!(
        show(&o.u, &out),
        @r#"OrderDto { Lines: [LineDto { Sku: "a", Qty: 1 }, LineDto { Sku: "b", Qty: 2 }], Tags: ["x", "y"], Notes: ["fragile"] }"#
    );

    let lines = member(&o.u, &out, "Lines");
    assert!(lines.as_list().unwrap().is_fixed());
    let tags = member(&o.u, &out, "Tags");
    assert!(!tags.as_list().unwrap().is_fixed());
    assert_eq!(tags.as_list().unwrap().capacity(), 2);

    // equal sequence types are copied, not shared
    let notes = member(&o.u, &out, "Notes");
    let source_notes = member(&o.u, &source, "Notes");
    assert!(!notes.as_list().unwrap().ptr_eq(source_notes.as_list().unwrap()));

    let plan = cx.plan().unwrap();
    assert_eq!(plan.loops().len(), 3);
}

#[test]
fn null_elements_and_sequences_stay_null() {
    remap_testhelpers::setup();
    let o = orders();
    let mapper = Mapper::new(o.u.clone(), MapperConfig::default());
    let cx = mapper.context(o.order, o.order_dto);

    let source = o.order(vec![Value::Null, o.line("b", 2)]);
    let out = map_both(&cx, &source).unwrap();
    insta::assert_snapshot!(
        show(&o.u, &member(&o.u, &out, "Lines")),
        @r#"[null, LineDto { Sku: "b", Qty: 2 }]"#
    );

    let source = o.u.object(o.order, [("Lines", Value::Null)]).unwrap();
    let out = map_both(&cx, &source).unwrap();
    insta::assert_snapshot!(show(&o.u, &out), @"OrderDto { Lines: null, Tags: null, Notes: null }");
}

#[test]
fn element_mappings_are_inlined() {
    remap_testhelpers::setup();
    let o = orders();
    let mapper = Mapper::new(o.u.clone(), MapperConfig::default());
    let cx = mapper.context(o.order, o.order_dto);

    let compiled = cx.compile().unwrap();
    let ast = compiled.ast().to_string();
    assert!(ast.contains("new LineDto"), "{ast}");
    assert!(!ast.contains("map("), "{ast}");

    let resolver = cx
        .resolver("Lines", o.lines, o.line_dtos, None)
        .unwrap();
    let ResolverKind::Enumerable(enumerable) = resolver.kind() else {
        panic!("expected a sequence resolver, got {resolver:?}");
    };
    assert!(enumerable.is_fixed());
    assert_eq!(enumerable.elements(), (o.line, o.line_dto));
    assert!(matches!(enumerable.element(), ElementConversion::Nested(_)));
}

#[test]
fn inner_maps_compile_eagerly_when_asked() {
    remap_testhelpers::setup();
    let o = orders();

    let lazy = Mapper::new(o.u.clone(), MapperConfig::default());
    lazy.context(o.order, o.order_dto).plan().unwrap();
    assert!(!lazy.context(o.line, o.line_dto).is_compiled());

    let eager = Mapper::new(
        o.u.clone(),
        MapperConfig::default().compile_inner_maps(true),
    );
    let cx = eager.context(o.order, o.order_dto);
    cx.plan().unwrap();
    assert!(eager.context(o.line, o.line_dto).is_compiled());
    assert!(!cx.is_compiled());

    let out = map_both(&cx, &o.order(vec![o.line("a", 1)])).unwrap();
    assert_eq!(show(&o.u, &member(&o.u, &out, "Lines")), r#"[LineDto { Sku: "a", Qty: 1 }]"#);
}

#[test]
fn sequence_and_scalar_pairs_convert_as_a_whole() {
    remap_testhelpers::setup();
    let o = orders();
    let mapper = Mapper::new(o.u.clone(), MapperConfig::default());
    let cx = mapper.context(o.lines, o.line_dtos);
    assert!(cx.plan().unwrap().conversion().is_some());
    assert_eq!(cx.plan().unwrap().members().len(), 0);

    let source = o.u.list(o.lines, [o.line("a", 1), Value::Null]);
    let out = map_both(&cx, &source).unwrap();
    insta::assert_snapshot!(show(&o.u, &out), @r#"[LineDto { Sku: "a", Qty: 1 }, null]"#);
    assert!(out.as_list().unwrap().is_fixed());

    let widened = mapper.map(&Value::I32(5), TypeId::I64).unwrap();
    assert_eq!(widened, Value::I64(5));

    let err = mapper.context(TypeId::STRING, o.line).plan().unwrap_err();
    insta::assert_snapshot!(err, @"no conversion from `string` to `Line` for `<root>`");
}

struct Trees {
    u: Arc<Universe>,
    tree: TypeId,
    trees: TypeId,
    node: TypeId,
}

fn trees() -> Trees {
    let mut b = Universe::builder();
    let tree = b.declare("Tree");
    let trees = b.list(tree);
    b.define(
        tree,
        StructDef::new()
            .field("Name", TypeId::STRING)
            .field("Children", trees),
    );
    let node = b.declare("Node");
    let nodes = b.list(node);
    b.define(
        node,
        StructDef::new()
            .field("Name", TypeId::STRING)
            .field("Children", nodes),
    );
    Trees {
        u: b.build().unwrap(),
        tree,
        trees,
        node,
    }
}

impl Trees {
    fn tree(&self, name: &str, children: Option<Vec<Value>>) -> Value {
        let children = match children {
            Some(children) => self.u.list(self.trees, children),
            None => Value::Null,
        };
        self.u
            .object(self.tree, [("Name", Value::from(name)), ("Children", children)])
            .unwrap()
    }
}

#[test]
fn recursive_types_map_through_their_own_context() {
    remap_testhelpers::setup();
    let t = trees();
    let source = t.tree(
        "root",
        Some(vec![
            t.tree("a", Some(vec![t.tree("a1", None)])),
            t.tree("b", Some(vec![])),
        ]),
    );

    for config in [
        MapperConfig::default(),
        MapperConfig::default().compile_inner_maps(true),
    ] {
        let mapper = Mapper::new(t.u.clone(), config);
        let cx = mapper.context(t.tree, t.node);
        let out = map_both(&cx, &source).unwrap();
        insta::allow_duplicates! {
            insta::assert_snapshot!(
                show(&t.u, &out),
                @r#"Node { Name: "root", Children: [Node { Name: "a", Children: [Node { Name: "a1", Children: null }] }, Node { Name: "b", Children: [] }] }"#
            );
        }

        // the element mapping is the context itself, called rather than inlined
        let ast = cx.compile().unwrap().ast().to_string();
        assert!(ast.contains("map("), "{ast}");
        assert_eq!(mapper.len(), 1);
    }
}
