use std::sync::Arc;

use remap::{MapError, Mapper, MapperConfig, Resolver};
use remap_core::{StructDef, TypeId, Universe, Value};

use remap_testhelpers::IPanic;

use crate::fixtures::{Shop, member, show};

#[test]
fn compiling_twice_returns_the_same_function() -> Result<(), IPanic> {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);
    cx.remap("Sub/Name", "SubName")?;

    let first = cx.compile()?;
    let second = cx.compile()?;
    assert!(Arc::ptr_eq(&first, &second));
    assert!(cx.is_compiled());
    assert_eq!(first.source(), shop.customer);
    assert_eq!(first.destination(), shop.dto);
    Ok(())
}

#[test]
fn compiled_contexts_reject_configuration() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);
    cx.compile().unwrap();

    let err = cx.remap("Sub/Name", "SubName").unwrap_err();
    insta::assert_snapshot!(
        err,
        @"mapping `Customer` to `CustomerDto` is compiled and can no longer be configured"
    );
    let err = cx
        .register_resolver(Arc::new(Resolver::activation(TypeId::I32, TypeId::I64)))
        .unwrap_err();
    assert!(matches!(err, MapError::ContextFrozen { .. }));
    assert!(cx.registry().get(TypeId::I32, TypeId::I64).is_some());
}

#[test]
fn plans_are_rebuilt_after_registration() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);

    let plan = cx.plan().unwrap();
    assert!(Arc::ptr_eq(&plan, &cx.plan().unwrap()));
    assert_eq!(
        plan.direct().iter().map(String::as_str).collect::<Vec<_>>(),
        ["FirstName"]
    );
    assert_eq!(
        plan.needs_resolver()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>(),
        ["Age", "Color"]
    );
    assert!(plan.remapped().is_empty());

    cx.remap("Sub/Name", "SubName").unwrap();
    let replanned = cx.plan().unwrap();
    assert!(!Arc::ptr_eq(&plan, &replanned));
    assert_eq!(
        replanned
            .remapped()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>(),
        ["SubName"]
    );
}

#[test]
fn clearing_unfreezes_and_keeps_remaps() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);
    cx.remap("Sub/Name", "SubName").unwrap();
    let before = cx.compile().unwrap();
    assert!(!cx.registry().is_empty());

    cx.clear();
    assert!(!cx.is_compiled());
    assert!(cx.registry().is_empty());
    cx.remap("FirstName", "SubSubValue").unwrap();

    let after = cx.compile().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    let out = cx.map(&shop.customer("Ann", Some("X"))).unwrap();
    insta::assert_snapshot!(
        show(&shop.u, &out),
        @r#"CustomerDto { FirstName: "Ann", Age: 42, Color: 2, SubName: "X", SubSubValue: "Ann" }"#
    );
}

#[test]
fn the_mapper_owns_one_context_per_pair() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    assert!(mapper.is_empty());

    let cx = mapper.context(shop.customer, shop.dto);
    assert!(Arc::ptr_eq(&cx, &mapper.context(shop.customer, shop.dto)));
    assert!(Arc::ptr_eq(&cx, &mapper.clone().context(shop.customer, shop.dto)));

    let out = mapper.map(&shop.customer("Ann", None), shop.dto).unwrap();
    assert_eq!(member(&shop.u, &out, "FirstName"), Value::from("Ann"));
    assert_eq!(mapper.len(), 1);
    assert!(cx.is_compiled());

    mapper.clear();
    assert!(mapper.is_empty());
    assert!(!cx.is_compiled());
    assert!(!Arc::ptr_eq(&cx, &mapper.context(shop.customer, shop.dto)));
}

#[test]
fn element_contexts_need_their_mapper() {
    remap_testhelpers::setup();
    let mut b = Universe::builder();
    let item = b.structure("Item", StructDef::new().field("Id", TypeId::I32));
    let item_dto = b.structure("ItemDto", StructDef::new().field("Id", TypeId::I32));
    let items = b.list(item);
    let item_dtos = b.list(item_dto);
    let bag = b.structure("Bag", StructDef::new().field("Items", items));
    let bag_dto = b.structure("BagDto", StructDef::new().field("Items", item_dtos));
    let u = b.build().unwrap();

    let mapper = Mapper::new(u.clone(), MapperConfig::default());
    let cx = mapper.context(bag, bag_dto);
    drop(mapper);

    let source = u
        .object(bag, [("Items", u.list(items, [u.construct(item).unwrap()]))])
        .unwrap();
    let err = cx.map(&source).unwrap_err();
    insta::assert_snapshot!(err, @"the mapper owning this context was dropped");
}

#[test]
fn contexts_are_shared_across_threads() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let mapper = Mapper::new(shop.u.clone(), MapperConfig::default());
    let cx = mapper.context(shop.customer, shop.dto);
    cx.remap("Sub/Name", "SubName").unwrap();

    let outputs: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cx = cx.clone();
                let shop = &shop;
                scope.spawn(move || {
                    let out = cx.map(&shop.customer(&format!("c{i}"), Some("X"))).unwrap();
                    show(&shop.u, &member(&shop.u, &out, "FirstName"))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(outputs, [r#""c0""#, r#""c1""#, r#""c2""#, r#""c3""#]);
    assert!(cx.is_compiled());
}
