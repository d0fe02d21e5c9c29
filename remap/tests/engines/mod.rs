use std::sync::Arc;

use remap::{Engine, Mapper, MapperConfig, MappingContext, Resolver, Selector};
use remap_core::{StructDef, TypeId, Universe, Value};

use crate::fixtures::{ENGINES, Shop, map_both, member, orders, show};

struct Homes {
    u: Arc<Universe>,
    address: TypeId,
    address_dto: TypeId,
    person: TypeId,
    person_dto: TypeId,
}

fn homes() -> Homes {
    let mut b = Universe::builder();
    let address = b.structure("Address", StructDef::new().field("City", TypeId::STRING));
    let address_dto = b.structure("AddressDto", StructDef::new().field("City", TypeId::STRING));
    let person = b.structure(
        "Person",
        StructDef::new()
            .field("Name", TypeId::STRING)
            .field("City", TypeId::STRING)
            .field("Home", address),
    );
    let person_dto = b.structure(
        "PersonDto",
        StructDef::new()
            .field("Name", TypeId::STRING)
            .field("Home", address_dto)
            .field("Work", address_dto),
    );
    Homes {
        u: b.build().unwrap(),
        address,
        address_dto,
        person,
        person_dto,
    }
}

impl Homes {
    fn person(&self, home: Option<&str>) -> Value {
        let home = match home {
            Some(city) => self
                .u
                .object(self.address, [("City", Value::from(city))])
                .unwrap(),
            None => Value::Null,
        };
        self.u
            .object(
                self.person,
                [
                    ("Name", Value::from("Ann")),
                    ("City", Value::from("Bergen")),
                    ("Home", home),
                ],
            )
            .unwrap()
    }
}

#[test]
fn null_destinations_are_initialized() {
    remap_testhelpers::setup();
    let h = homes();
    let mapper = Mapper::new(h.u.clone(), MapperConfig::default());
    let cx = mapper.context(h.person, h.person_dto);
    cx.remap("City", "Work/City").unwrap();

    let out = map_both(&cx, &h.person(Some("Oslo"))).unwrap();
    insta::assert_snapshot!(
        show(&h.u, &out),
        @r#"PersonDto { Name: "Ann", Home: AddressDto { City: "Oslo" }, Work: AddressDto { City: "Bergen" } }"#
    );

    // a null source struct clears the destination member
    let out = map_both(&cx, &h.person(None)).unwrap();
    insta::assert_snapshot!(
        show(&h.u, &out),
        @r#"PersonDto { Name: "Ann", Home: null, Work: AddressDto { City: "Bergen" } }"#
    );
}

#[test]
fn without_initialization_null_destinations_are_left_alone() {
    remap_testhelpers::setup();
    let h = homes();
    let mapper = Mapper::new(
        h.u.clone(),
        MapperConfig::default().initialize_null_values(false),
    );
    let cx = mapper.context(h.person, h.person_dto);
    let source = h.person(Some("Oslo"));

    let out = map_both(&cx, &source).unwrap();
    insta::assert_snapshot!(show(&h.u, &out), @r#"PersonDto { Name: "Ann", Home: null, Work: null }"#);

    // an existing nested object is filled in place
    for engine in ENGINES {
        let home = h.u.construct(h.address_dto).unwrap();
        let existing = h.u.object(h.person_dto, [("Home", home.clone())]).unwrap();
        let out = cx.map_with(engine, &source, &existing).unwrap();
        assert!(
            member(&h.u, &out, "Home")
                .as_object()
                .unwrap()
                .ptr_eq(home.as_object().unwrap())
        );
        assert_eq!(member(&h.u, &home, "City"), Value::from("Oslo"), "{engine:?}");
    }
}

#[test]
fn without_initialization_explicit_remaps_report_the_null() {
    remap_testhelpers::setup();
    let h = homes();
    let mapper = Mapper::new(
        h.u.clone(),
        MapperConfig::default().initialize_null_values(false),
    );
    let cx = mapper.context(h.person, h.person_dto);
    cx.remap("City", "Work/City").unwrap();

    for engine in ENGINES {
        let err = cx
            .map_with(engine, &h.person(Some("Oslo")), &Value::Null)
            .unwrap_err();
        insta::allow_duplicates! {
            insta::assert_snapshot!(err, @"`Work` is null while mapping `Person` to `PersonDto`");
        }
    }
}

fn configurations() -> Vec<MapperConfig> {
    let mut configs = Vec::new();
    for ignore in [false, true] {
        for initialize in [false, true] {
            for eager in [false, true] {
                configs.push(
                    MapperConfig::default()
                        .ignore_default_values(ignore)
                        .initialize_null_values(initialize)
                        .compile_inner_maps(eager),
                );
            }
        }
    }
    configs
}

#[test]
fn engines_agree_under_every_configuration() {
    remap_testhelpers::setup();
    let shop = Shop::new();
    let h = homes();
    let sources = [
        shop.customer("Ann", Some("X")),
        shop.customer("", Some("")),
    ];

    for config in configurations() {
        let mapper = Mapper::new(shop.u.clone(), config.clone());
        let cx = mapper.context(shop.customer, shop.dto);
        cx.remap("Sub/Name", "SubName").unwrap();
        cx.remap("Sub/SubSub/Value", "SubSubValue").unwrap();
        for source in &sources {
            map_both(&cx, source).unwrap();
        }

        let mapper = Mapper::new(h.u.clone(), config.clone());
        let cx = mapper.context(h.person, h.person_dto);
        for source in [h.person(Some("Oslo")), h.person(None)] {
            let existing = h
                .u
                .object(
                    h.person_dto,
                    [
                        ("Name", Value::from("old")),
                        ("Home", h.u.construct(h.address_dto).unwrap()),
                    ],
                )
                .unwrap();
            let interpreted = cx
                .map_with(Engine::Interpreted, &source, &existing)
                .unwrap();
            let interpreted = show(&h.u, &interpreted);
            let existing = h
                .u
                .object(
                    h.person_dto,
                    [
                        ("Name", Value::from("old")),
                        ("Home", h.u.construct(h.address_dto).unwrap()),
                    ],
                )
                .unwrap();
            let compiled = cx.map_with(Engine::Compiled, &source, &existing).unwrap();
            assert_eq!(interpreted, show(&h.u, &compiled), "{config:?}");
        }
    }
}

/// Both engines' outcome for `source` into a null destination, rendered.
fn outcomes(cx: &MappingContext, source: &Value) -> [String; 2] {
    ENGINES.map(|engine| {
        match cx.map_with(engine, source, &Value::Null) {
            Ok(value) => cx.universe().display(&value).to_string(),
            Err(err) => format!("error: {err}"),
        }
    })
}

#[test]
fn engines_agree_on_sequences_and_selectors_under_every_configuration() {
    remap_testhelpers::setup();
    let o = orders();
    let h = homes();
    let orders_in = [
        o.order(vec![o.line("a", 1), Value::Null, o.line("", 0)]),
        o.u.object(o.order, [("Lines", Value::Null)]).unwrap(),
    ];
    let lines_in = o.u.list(o.lines, [o.line("b", 0), Value::Null]);

    for config in configurations() {
        let mapper = Mapper::new(o.u.clone(), config.clone());
        let cx = mapper.context(o.order, o.order_dto);
        for source in &orders_in {
            let [interpreted, compiled] = outcomes(&cx, source);
            assert_eq!(interpreted, compiled, "{config:?}");
        }
        let cx = mapper.context(o.lines, o.line_dtos);
        let [interpreted, compiled] = outcomes(&cx, &lines_in);
        assert_eq!(interpreted, compiled, "{config:?}");
        assert!(!interpreted.starts_with("error"), "{interpreted}");

        let mapper = Mapper::new(h.u.clone(), config.clone());
        let cx = mapper.context(h.person, h.person_dto);
        let city = h.u.accessors(h.person).get("City").unwrap().clone();
        cx.remap_from_with(
            Selector::new(move |source| Ok(city.get(source)?)),
            "Work/City",
            Arc::new(Resolver::simple(TypeId::STRING, TypeId::STRING, |value| {
                Ok(match value {
                    Value::String(s) => Value::String(s.to_uppercase()),
                    _ => Value::Null,
                })
            })),
        )
        .unwrap();
        for source in [h.person(Some("Oslo")), h.person(None)] {
            let [interpreted, compiled] = outcomes(&cx, &source);
            assert_eq!(interpreted, compiled, "{config:?}");
        }
    }
}

#[test]
fn null_sources_leave_the_destination_untouched() {
    remap_testhelpers::setup();
    let h = homes();
    let mapper = Mapper::new(h.u.clone(), MapperConfig::default());
    let cx = mapper.context(h.person, h.person_dto);
    let existing = h.u.object(h.person_dto, [("Name", Value::from("old"))]).unwrap();

    for engine in ENGINES {
        assert!(cx.map_with(engine, &Value::Null, &Value::Null).unwrap().is_null());
        let out = cx.map_with(engine, &Value::Null, &existing).unwrap();
        assert!(out.as_object().unwrap().ptr_eq(existing.as_object().unwrap()));
    }
    assert!(mapper.map(&Value::Null, h.person_dto).unwrap().is_null());
}

#[test]
fn write_only_struct_members_are_not_expanded() {
    remap_testhelpers::setup();
    let mut b = Universe::builder();
    let inner = b.structure("Inner", StructDef::new().field("Name", TypeId::STRING));
    let inner_dto = b.structure("InnerDto", StructDef::new().field("Name", TypeId::STRING));
    let outer = b.structure(
        "Outer",
        StructDef::new()
            .field("Name", TypeId::STRING)
            .field("In", inner),
    );
    let outer_dto = b.structure(
        "OuterDto",
        StructDef::new()
            .field("Name", TypeId::STRING)
            .write_only("In", inner_dto),
    );
    let u = b.build().unwrap();

    let mapper = Mapper::new(u.clone(), MapperConfig::default());
    let cx = mapper.context(outer, outer_dto);
    assert!(cx.plan().unwrap().remapped().is_empty());

    let source = u
        .object(
            outer,
            [
                ("Name", Value::from("o")),
                ("In", u.object(inner, [("Name", Value::from("i"))]).unwrap()),
            ],
        )
        .unwrap();
    let out = map_both(&cx, &source).unwrap();
    insta::assert_snapshot!(show(&u, &out), @r#"OuterDto { Name: "o", In: null }"#);
}

#[test]
fn call_stack_mirrors_the_destination_routes() {
    remap_testhelpers::setup();
    let h = homes();
    let mapper = Mapper::new(h.u.clone(), MapperConfig::default());
    let cx = mapper.context(h.person, h.person_dto);
    cx.remap("City", "Work/City").unwrap();

    let call_stack = cx.call_stack().unwrap();
    insta::assert_snapshot!(format!("{call_stack:?}").trim_end(), @r"
    Name
    Work
      Work/City
    Home
      Home/City
    ");
}
