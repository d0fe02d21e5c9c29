use std::sync::Arc;

use remap::{Engine, MapError, Mapper, MapperConfig, Resolver, Selector};
use remap_core::{StructDef, TypeId, Universe, Value};

use crate::fixtures::{ENGINES, Shop, map_both, member, show};

#[test]
fn remaps_nested_source_paths() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);
    cx.remap("Sub/Name", "SubName").unwrap();
    cx.remap("Sub/SubSub/Value", "SubSubValue").unwrap();

    let out = map_both(&cx, &shop.customer("Ann", Some("X"))).unwrap();
    insta::assert_snapshot!(
        show(&shop.u, &out),
        @r#"CustomerDto { FirstName: "Ann", Age: 42, Color: 2, SubName: "X", SubSubValue: "7" }"#
    );
}

#[test]
fn shared_source_paths_are_read_once() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);
    cx.remap("Sub/Name", "SubName").unwrap();
    cx.remap("Sub/Name", "FirstName").unwrap();
    cx.remap("Sub/SubSub/Value", "SubSubValue").unwrap();
    let source = shop.customer("Ann", Some("X"));

    for engine in ENGINES {
        shop.reset_counters();
        let out = cx.map_with(engine, &source, &Value::Null).unwrap();
        assert_eq!(shop.reads(), (1, 1), "{engine:?}");
        assert_eq!(member(&shop.u, &out, "FirstName"), Value::from("X"));
        assert_eq!(member(&shop.u, &out, "SubName"), Value::from("X"));
    }
}

#[test]
fn one_source_feeds_flat_and_nested_destinations() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.view);
    cx.remap("Sub/Name", "SubName").unwrap();
    cx.remap("Sub/Name", "SubSub/Name").unwrap();
    let source = shop.customer("Ann", Some("X"));

    let mut outputs = Vec::new();
    for engine in ENGINES {
        shop.reset_counters();
        let out = cx.map_with(engine, &source, &Value::Null).unwrap();
        assert_eq!(shop.reads(), (1, 1), "{engine:?}");
        outputs.push(show(&shop.u, &out));
    }
    assert_eq!(outputs[0], outputs[1]);
    insta::assert_snapshot!(
        outputs[0],
        @r#"CustomerView { FirstName: "Ann", SubName: "X", SubSub: SubView { Name: "X" } }"#
    );
}

#[test]
fn null_intermediate_source_is_attributed() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);
    cx.remap("Sub/Name", "SubName").unwrap();
    let source = shop.customer("Ann", None);

    for engine in ENGINES {
        let err = cx.map_with(engine, &source, &Value::Null).unwrap_err();
        insta::allow_duplicates! {
            insta::assert_snapshot!(err, @"`Sub` is null while mapping `Customer` to `CustomerDto`");
        }
    }
}

#[test]
fn unknown_members_suggest_a_spelling() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);

    let err = cx.remap("Sub/Nmae", "SubName").unwrap_err();
    insta::assert_snapshot!(err, @"type `Sub` has no member `Nmae` (did you mean `Name`?)");

    // nothing of the failed registration is kept
    assert!(cx.plan().unwrap().remaps().is_empty());
    assert!(cx.plan().unwrap().source_routes().find("Sub").is_none());

    let err = cx.remap("FirstName", "/").unwrap_err();
    assert!(matches!(err, MapError::UnknownMember { .. }), "{err}");
}

#[test]
fn last_registration_wins() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);
    cx.remap("FirstName", "SubName").unwrap();
    cx.remap("Sub/Name", "/SubName/").unwrap();

    let plan = cx.plan().unwrap();
    assert_eq!(plan.remaps().len(), 1);
    assert_eq!(plan.remaps()[0].source_path.as_deref(), Some("Sub/Name"));

    let out = map_both(&cx, &shop.customer("Ann", Some("X"))).unwrap();
    assert_eq!(member(&shop.u, &out, "SubName"), Value::from("X"));
}

#[test]
fn source_lookup_rejects_ambiguous_remaps() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);
    cx.remap("Sub/Name", "SubName").unwrap();
    cx.remap("Sub/Name", "FirstName").unwrap();
    cx.remap("Sub/SubSub/Value", "SubSubValue").unwrap();

    let err = cx.source_for("Sub/Name").unwrap_err();
    insta::assert_snapshot!(err, @"`Sub/Name` is consumed by several remaps: SubName, FirstName");

    let record = cx.source_for("Sub/SubSub/Value").unwrap().unwrap();
    assert_eq!(record.destination_path, "SubSubValue");
    assert!(cx.source_for("FirstName").unwrap().is_none());
    assert!(cx.plan().unwrap().source_for("Sub/SubSub/Value").unwrap().is_some());
}

#[test]
fn a_different_separator() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default().separator('.'));
    let cx = mapper.context(shop.customer, shop.dto);
    cx.remap("Sub.Name", "SubName").unwrap();

    let out = map_both(&cx, &shop.customer("Ann", Some("X"))).unwrap();
    assert_eq!(member(&shop.u, &out, "SubName"), Value::from("X"));
    assert_eq!(
        cx.plan().unwrap().remaps()[0].source_path.as_deref(),
        Some("Sub.Name")
    );
}

fn people() -> (Arc<Universe>, TypeId, TypeId) {
    let mut b = Universe::builder();
    let person = b.structure(
        "Person",
        StructDef::new()
            .field("First", TypeId::STRING)
            .field("Last", TypeId::STRING)
            .field("Age", TypeId::I32),
    );
    let dto = b.structure(
        "PersonDto",
        StructDef::new()
            .field("FullName", TypeId::STRING)
            .field("Age", TypeId::STRING),
    );
    (b.build().unwrap(), person, dto)
}

#[test]
fn selectors_compute_from_the_whole_source() {
    remap_testhelpers::setup();
    let (u, person, dto) = people();
    let mapper = Mapper::new(u.clone(), MapperConfig::default());
    let cx = mapper.context(person, dto);

    let table = u.accessors(person);
    cx.remap_from(
        Selector::new(move |source| {
            let first = table.get("First").unwrap().get(source)?;
            let last = table.get("Last").unwrap().get(source)?;
            Ok(Value::String(format!(
                "{} {}",
                first.as_str().unwrap_or_default(),
                last.as_str().unwrap_or_default()
            )))
        }),
        "FullName",
    )
    .unwrap();
    let table = u.accessors(person);
    cx.remap_from_with(
        Selector::new(move |source| Ok(table.get("Age").unwrap().get(source)?)),
        "Age",
        Arc::new(Resolver::convert(&u, TypeId::I32, TypeId::STRING).unwrap()),
    )
    .unwrap();

    let source = u
        .object(
            person,
            [
                ("First", Value::from("Ada")),
                ("Last", Value::from("Lovelace")),
                ("Age", Value::I32(36)),
            ],
        )
        .unwrap();
    let out = map_both(&cx, &source).unwrap();
    insta::assert_snapshot!(show(&u, &out), @r#"PersonDto { FullName: "Ada Lovelace", Age: "36" }"#);

    let plan = cx.plan().unwrap();
    let record = &plan.remaps()[0];
    assert!(record.source_path.is_none());
    assert!(record.selector.is_some());
}

#[test]
fn selector_failures_surface() {
    remap_testhelpers::setup();
    let (u, person, dto) = people();
    let mapper = Mapper::new(u.clone(), MapperConfig::default());
    let cx = mapper.context(person, dto);
    cx.remap_from(
        Selector::new(|_| Err(MapError::Selector("no name today".into()))),
        "FullName",
    )
    .unwrap();
    let source = u.construct(person).unwrap();

    for engine in [Engine::Interpreted, Engine::Compiled] {
        let err = cx.map_with(engine, &source, &Value::Null).unwrap_err();
        insta::allow_duplicates! {
            insta::assert_snapshot!(err, @"selector failed: no name today");
        }
    }
}
