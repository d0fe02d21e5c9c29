use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use remap::{Engine, MapError, MappingContext};
use remap_core::{EnumDef, StructDef, TypeId, Universe, Value};

pub const ENGINES: [Engine; 2] = [Engine::Interpreted, Engine::Compiled];

/// Run `source` through both engines and check they agree.
pub fn map_both(cx: &MappingContext, source: &Value) -> Result<Value, MapError> {
    let interpreted = cx.map_with(Engine::Interpreted, source, &Value::Null)?;
    let compiled = cx.map_with(Engine::Compiled, source, &Value::Null)?;
    assert_eq!(
        cx.universe().display(&interpreted).to_string(),
        cx.universe().display(&compiled).to_string(),
        "engines disagree"
    );
    Ok(compiled)
}

pub fn show(u: &Universe, value: &Value) -> String {
    u.display(value).to_string()
}

pub fn member(u: &Universe, value: &Value, name: &str) -> Value {
    u.accessors(u.type_of(value).unwrap())
        .get(name)
        .unwrap()
        .get(value)
        .unwrap()
}

/// The customer model used across tests.
pub struct Shop {
    pub u: Arc<Universe>,
    pub sub_sub: TypeId,
    pub sub: TypeId,
    pub customer: TypeId,
    pub dto: TypeId,
    /// `CustomerView`, with a nested `SubSub: SubView { Name }`.
    pub view: TypeId,
    pub color: TypeId,
    /// Reads of `Customer.Sub`.
    pub sub_reads: Arc<AtomicUsize>,
    /// Reads of `Sub.Name`.
    pub name_reads: Arc<AtomicUsize>,
}

fn counting(counter: &Arc<AtomicUsize>) -> impl Fn(&Value) -> Value + Send + Sync + 'static {
    let counter = counter.clone();
    move |value: &Value| {
        counter.fetch_add(1, Ordering::SeqCst);
        value.clone()
    }
}

impl Shop {
    pub fn new() -> Self {
        let sub_reads = Arc::new(AtomicUsize::new(0));
        let name_reads = Arc::new(AtomicUsize::new(0));

        let mut b = Universe::builder();
        let color = b.enumeration(
            "Color",
            EnumDef::new()
                .variant("Red", 0)
                .variant("Green", 1)
                .variant("Blue", 2),
        );
        let sub_sub = b.structure("SubSub", StructDef::new().field("Value", TypeId::I32));
        let sub = b.structure(
            "Sub",
            StructDef::new()
                .field_with_getter("Name", TypeId::STRING, counting(&name_reads))
                .field("SubSub", sub_sub),
        );
        let customer = b.structure(
            "Customer",
            StructDef::new()
                .field("FirstName", TypeId::STRING)
                .field("Age", TypeId::I32)
                .field("Color", color)
                .field_with_getter("Sub", sub, counting(&sub_reads)),
        );
        let dto = b.structure(
            "CustomerDto",
            StructDef::new()
                .field("FirstName", TypeId::STRING)
                .field("Age", TypeId::I64)
                .field("Color", TypeId::I32)
                .field("SubName", TypeId::STRING)
                .field("SubSubValue", TypeId::STRING),
        );
        let sub_view = b.structure("SubView", StructDef::new().field("Name", TypeId::STRING));
        let view = b.structure(
            "CustomerView",
            StructDef::new()
                .field("FirstName", TypeId::STRING)
                .field("SubName", TypeId::STRING)
                .field("SubSub", sub_view),
        );
        let u = b.build().unwrap();
        Self {
            u,
            sub_sub,
            sub,
            customer,
            dto,
            view,
            color,
            sub_reads,
            name_reads,
        }
    }

    pub fn customer(&self, first: &str, sub_name: Option<&str>) -> Value {
        let u = &self.u;
        let sub = match sub_name {
            Some(name) => u
                .object(
                    self.sub,
                    [
                        ("Name", Value::from(name)),
                        (
                            "SubSub",
                            u.object(self.sub_sub, [("Value", Value::I32(7))]).unwrap(),
                        ),
                    ],
                )
                .unwrap(),
            None => Value::Null,
        };
        u.object(
            self.customer,
            [
                ("FirstName", Value::from(first)),
                ("Age", Value::I32(42)),
                ("Color", u.variant(self.color, "Blue").unwrap()),
                ("Sub", sub),
            ],
        )
        .unwrap()
    }

    pub fn reset_counters(&self) {
        self.sub_reads.store(0, Ordering::SeqCst);
        self.name_reads.store(0, Ordering::SeqCst);
    }

    pub fn reads(&self) -> (usize, usize) {
        (
            self.sub_reads.load(Ordering::SeqCst),
            self.name_reads.load(Ordering::SeqCst),
        )
    }
}

/// Orders with sequences of structs and scalars, in both shapes.
pub struct Orders {
    pub u: Arc<Universe>,
    pub line: TypeId,
    pub line_dto: TypeId,
    pub order: TypeId,
    pub order_dto: TypeId,
    pub lines: TypeId,
    pub line_dtos: TypeId,
    pub tags: TypeId,
}

pub fn orders() -> Orders {
    let mut b = Universe::builder();
    let line = b.structure(
        "Line",
        StructDef::new()
            .field("Sku", TypeId::STRING)
            .field("Qty", TypeId::I32),
    );
    let line_dto = b.structure(
        "LineDto",
        StructDef::new()
            .field("Sku", TypeId::STRING)
            .field("Qty", TypeId::I64),
    );
    let lines = b.list(line);
    let line_dtos = b.array(line_dto);
    let tags = b.array(TypeId::STRING);
    let tag_list = b.list(TypeId::STRING);
    let order = b.structure(
        "Order",
        StructDef::new()
            .field("Lines", lines)
            .field("Tags", tags)
            .field("Notes", tag_list),
    );
    let order_dto = b.structure(
        "OrderDto",
        StructDef::new()
            .field("Lines", line_dtos)
            .field("Tags", tag_list)
            .field("Notes", tag_list),
    );
    Orders {
        u: b.build().unwrap(),
        line,
        line_dto,
        order,
        order_dto,
        lines,
        line_dtos,
        tags,
    }
}

impl Orders {
    pub fn line(&self, sku: &str, qty: i32) -> Value {
        self.u
            .object(self.line, [("Sku", Value::from(sku)), ("Qty", Value::I32(qty))])
            .unwrap()
    }

    pub fn order(&self, lines: Vec<Value>) -> Value {
        let u = &self.u;
        let notes = u.list(
            u.lookup("List<string>").unwrap(),
            [Value::from("fragile")],
        );
        u.object(
            self.order,
            [
                ("Lines", u.list(self.lines, lines)),
                (
                    "Tags",
                    u.list(self.tags, [Value::from("x"), Value::from("y")]),
                ),
                ("Notes", notes),
            ],
        )
        .unwrap()
    }
}
