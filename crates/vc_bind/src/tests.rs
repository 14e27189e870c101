//! End-to-end tests: registration, model build, marshal and unmarshal.

use alloc::collections::BTreeMap;
use std::thread;

use crate::de::{Attribute, ContentHandler, SourcePosition};
use crate::error::ModelErrorKind;
use crate::meta::{Directive, InlineReader};
use crate::model::build_model;
use crate::nav::{TypeHandle, TypeTable};
use crate::runtime::CollectingHandler;
use crate::ser::{EventRecorder, MarkupEvent};
use crate::{
    AttributeMap, BindError, BindingContext, ConstructionError, ContextOptions, EventSource, Poly,
    QName, Severity, impl_bind_object,
};

fn context(table: &TypeTable, roots: &[TypeHandle]) -> BindingContext {
    context_with(table, roots, ContextOptions::new())
}

fn context_with(table: &TypeTable, roots: &[TypeHandle], options: ContextOptions) -> BindingContext {
    BindingContext::new(table, &mut InlineReader::new(), roots, options).unwrap()
}

fn marshal<T: core::any::Any>(ctx: &BindingContext, value: &T) -> EventRecorder {
    let mut recorder = EventRecorder::new();
    ctx.marshal(value, &mut recorder).unwrap();
    recorder
}

fn start(name: &str, attributes: &[(&str, &str)]) -> MarkupEvent {
    MarkupEvent::Start {
        name: QName::parse_clark(name),
        attributes: attributes
            .iter()
            .map(|&(name, value)| Attribute::new(QName::parse_clark(name), value))
            .collect(),
    }
}

fn text(text: &str) -> MarkupEvent {
    MarkupEvent::Text(text.into())
}

fn end(name: &str) -> MarkupEvent {
    MarkupEvent::End(QName::parse_clark(name))
}

// -----------------------------------------------------------------------------
// Bookstore

#[derive(Clone, Default, Debug, PartialEq)]
struct Book {
    title: String,
    author: String,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Bookstore {
    name: String,
    location: String,
    items: Vec<Book>,
}

impl_bind_object!(Book, Bookstore);

fn bookstore_table() -> TypeTable {
    let mut table = TypeTable::new();
    table
        .class::<Book>()
        .factory(Book::default)
        .field("title", |b| &b.title, |b| &mut b.title)
        .field("author", |b| &b.author, |b| &mut b.author)
        .finish();
    table
        .class::<Bookstore>()
        .factory(Bookstore::default)
        .class_directive(Directive::root("bookstore"))
        .field("name", |s| &s.name, |s| &mut s.name)
        .field("location", |s| &s.location, |s| &mut s.location)
        .field("items", |s| &s.items, |s| &mut s.items)
        .directive(Directive::wrapper("items"))
        .directive(Directive::element("item"))
        .finish();
    table
}

fn bookstore() -> Bookstore {
    Bookstore {
        name: "Lowell".into(),
        location: "Boston".into(),
        items: vec![
            Book {
                title: "Dune".into(),
                author: "Herbert".into(),
            },
            Book {
                title: "Emma".into(),
                author: "Austen".into(),
            },
        ],
    }
}

#[test]
fn bookstore_round_trip() {
    let table = bookstore_table();
    let ctx = context(&table, &[TypeHandle::of::<Bookstore>()]);
    let store = bookstore();

    let mut recorder = marshal(&ctx, &store);
    assert_eq!(
        recorder.to_string(),
        "<bookstore><name>Lowell</name><location>Boston</location>\
         <items><item><title>Dune</title><author>Herbert</author></item>\
         <item><title>Emma</title><author>Austen</author></item></items></bookstore>"
    );

    let value = ctx.unmarshal(&mut recorder).unwrap();
    assert_eq!(value.downcast_ref::<Bookstore>(), Some(&store));
}

#[test]
fn qualified_schema_names_every_element() {
    let mut table = bookstore_table();
    table.package(module_path!(), [Directive::qualified_schema("example.books")]);
    let ctx = context(&table, &[TypeHandle::of::<Bookstore>()]);

    let mut recorder = marshal(&ctx, &bookstore());
    let names: Vec<QName> = recorder
        .events()
        .iter()
        .filter_map(|event| match event {
            MarkupEvent::Start { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(names[0], QName::new("example.books", "bookstore"));
    assert!(names.iter().all(|name| name.namespace() == "example.books"));

    let bean = ctx.bean_for(TypeHandle::of::<Bookstore>()).unwrap();
    assert_eq!(bean.uris(), ["example.books".to_string()]);

    let back: Bookstore = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(back, bookstore());
}

#[test]
fn declared_unmarshal_ignores_the_root_name() {
    let table = bookstore_table();
    let ctx = context(&table, &[TypeHandle::of::<Bookstore>()]);
    let mut recorder = EventRecorder::from(vec![
        start("shop", &[]),
        start("name", &[]),
        text("Corner"),
        end("name"),
        start("items", &[]),
        end("items"),
        end("shop"),
    ]);

    assert!(matches!(
        ctx.unmarshal(&mut recorder),
        Err(BindError::UnexpectedRoot(_))
    ));
    let shop: Bookstore = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(shop.name, "Corner");
    assert!(shop.location.is_empty());
    assert!(shop.items.is_empty());
}

#[test]
fn unknown_content_is_reported_and_skipped() {
    let table = bookstore_table();
    let ctx = context(&table, &[TypeHandle::of::<Bookstore>()]);
    let mut recorder = EventRecorder::from(vec![
        start("bookstore", &[("open", "yes")]),
        start("owner", &[]),
        start("name", &[]),
        text("nested"),
        end("name"),
        end("owner"),
        start("name", &[]),
        text("Lowell"),
        end("name"),
        end("bookstore"),
    ]);

    let mut handler = CollectingHandler::new();
    let outcome = ctx.unmarshal_with(&mut recorder, &mut handler).unwrap();
    let store = outcome.value.downcast_ref::<Bookstore>().unwrap();
    assert_eq!(store.name, "Lowell");

    let events = handler.into_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], BindError::UnexpectedAttribute { .. }));
    assert!(matches!(events[1], BindError::UnexpectedElement { ref name, .. } if name.local_name() == "owner"));
    assert!(events.iter().all(|e| e.severity() == Severity::Warning));
}

#[test]
fn unbound_values_are_refused() {
    let table = bookstore_table();
    let ctx = context(&table, &[TypeHandle::of::<Bookstore>()]);
    let mut recorder = EventRecorder::new();

    assert!(matches!(
        ctx.marshal(&42_i32, &mut recorder),
        Err(BindError::UnboundType(_))
    ));
    // bound, but without a root element name
    assert!(matches!(
        ctx.marshal(&Book::default(), &mut recorder),
        Err(BindError::NoRootElement(_))
    ));
}

// -----------------------------------------------------------------------------
// Type substitution

#[derive(Clone, Default, Debug, PartialEq)]
struct Animal {
    name: String,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Dog {
    base: Animal,
    good: bool,
}

#[derive(Clone, Debug)]
struct Zoo {
    star: Poly<Animal>,
    animals: Vec<Poly<Animal>>,
}

impl Default for Zoo {
    fn default() -> Self {
        Self {
            star: Poly::new(Animal::default()),
            animals: Vec::new(),
        }
    }
}

impl_bind_object!(Animal, Dog, Zoo);

fn zoo_table() -> TypeTable {
    let mut table = TypeTable::new();
    table
        .class::<Animal>()
        .factory(Animal::default)
        .field("name", |a| &a.name, |a| &mut a.name)
        .directive(Directive::attribute("name"))
        .finish();
    table
        .class::<Dog>()
        .factory(Dog::default)
        .extends::<Animal>(|d| &d.base, |d| &mut d.base)
        .field("good", |d| &d.good, |d| &mut d.good)
        .finish();
    table
        .class::<Zoo>()
        .factory(Zoo::default)
        .class_directive(Directive::root("zoo"))
        .class_directive(Directive::see_also(TypeHandle::of::<Dog>()))
        .field("star", |z| &z.star, |z| &mut z.star)
        .field("animals", |z| &z.animals, |z| &mut z.animals)
        .finish();
    table
}

fn dog(name: &str, good: bool) -> Dog {
    Dog {
        base: Animal { name: name.into() },
        good,
    }
}

#[test]
fn subclasses_are_written_with_a_type_override() {
    let table = zoo_table();
    let ctx = context(&table, &[TypeHandle::of::<Zoo>()]);
    let zoo = Zoo {
        star: Poly::new(dog("Rex", true)),
        animals: vec![
            Poly::new(Animal { name: "Tom".into() }),
            Poly::new(dog("Fido", false)),
        ],
    };

    let mut recorder = marshal(&ctx, &zoo);
    assert_eq!(
        recorder.to_string(),
        "<zoo><star {http://www.w3.org/2001/XMLSchema-instance}type=\"dog\" name=\"Rex\">\
         <good>true</good></star><animals name=\"Tom\"></animals>\
         <animals {http://www.w3.org/2001/XMLSchema-instance}type=\"dog\" name=\"Fido\">\
         <good>false</good></animals></zoo>"
    );

    let back: Zoo = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(back.star.downcast_ref::<Dog>(), Some(&dog("Rex", true)));
    assert_eq!(
        back.animals[0].downcast_ref::<Animal>(),
        Some(&Animal { name: "Tom".into() })
    );
    assert!(back.animals[1].is::<Dog>());
}

#[test]
fn type_overrides_can_be_turned_off() {
    let table = zoo_table();
    let options = ContextOptions::new().emit_type_overrides(false);
    let ctx = context_with(&table, &[TypeHandle::of::<Zoo>()], options);
    let zoo = Zoo {
        star: Poly::new(dog("Rex", true)),
        animals: Vec::new(),
    };
    let recorder = marshal(&ctx, &zoo);
    assert!(!recorder.to_string().contains("type="));
}

#[test]
fn bad_type_overrides_fall_back_to_the_declared_class() {
    let table = zoo_table();
    let ctx = context(&table, &[TypeHandle::of::<Zoo>()]);
    let xsi_type = "{http://www.w3.org/2001/XMLSchema-instance}type";
    let mut recorder = EventRecorder::from(vec![
        start("zoo", &[]),
        start("star", &[(xsi_type, "cat"), ("name", "Kit")]),
        end("star"),
        start("animals", &[(xsi_type, "zoo")]),
        end("animals"),
        end("zoo"),
    ]);

    let mut handler = CollectingHandler::new();
    let outcome = ctx.unmarshal_with(&mut recorder, &mut handler).unwrap();
    let zoo = outcome.value.downcast_ref::<Zoo>().unwrap();
    assert_eq!(
        zoo.star.downcast_ref::<Animal>(),
        Some(&Animal { name: "Kit".into() })
    );
    assert!(zoo.animals[0].is::<Animal>());

    let events = handler.events();
    assert!(matches!(events[0], BindError::UnknownTypeOverride(_)));
    assert!(matches!(events[1], BindError::IncompatibleTypeOverride { .. }));
}

#[test]
fn only_classes_with_subclasses_check_overrides() {
    let table = zoo_table();
    let ctx = context(&table, &[TypeHandle::of::<Zoo>()]);
    let types = ctx.types();
    let animal = types.class_of(core::any::TypeId::of::<Animal>()).unwrap();
    let dog = types.class_of(core::any::TypeId::of::<Dog>()).unwrap();
    assert!(types.class(animal).has_subclasses());
    assert!(!types.class(dog).has_subclasses());
    assert!(ctx.bean(animal).has_subclasses());
}

// -----------------------------------------------------------------------------
// Shadowed properties

#[derive(Clone, Default, Debug, PartialEq)]
struct Plain {
    label: String,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Fancy {
    base: Plain,
    label: String,
}

impl_bind_object!(Plain, Fancy);

#[test]
fn redeclared_members_are_written_once() {
    let mut table = TypeTable::new();
    table
        .class::<Plain>()
        .factory(Plain::default)
        .class_directive(Directive::root("plain"))
        .field("label", |p| &p.label, |p| &mut p.label)
        .finish();
    table
        .class::<Fancy>()
        .factory(Fancy::default)
        .class_directive(Directive::root("fancy"))
        .extends::<Plain>(|f| &f.base, |f| &mut f.base)
        .field("label", |f| &f.label, |f| &mut f.label)
        .finish();
    let ctx = context(&table, &[TypeHandle::of::<Plain>(), TypeHandle::of::<Fancy>()]);

    let fancy = Fancy {
        base: Plain {
            label: "hidden".into(),
        },
        label: "shown".into(),
    };
    assert_eq!(
        marshal(&ctx, &fancy).to_string(),
        "<fancy><label>shown</label></fancy>"
    );
    let plain = Plain {
        label: "base".into(),
    };
    assert_eq!(
        marshal(&ctx, &plain).to_string(),
        "<plain><label>base</label></plain>"
    );
}

// -----------------------------------------------------------------------------
// Constructor-only classes

#[derive(Clone, Debug, PartialEq)]
struct Span {
    label: String,
    start: i64,
    end: i64,
}

impl_bind_object!(Span);

fn span_table() -> TypeTable {
    let mut table = TypeTable::new();
    table
        .record::<Span>()
        .class_directive(Directive::root("span"))
        .component("label", |s| &s.label)
        .directive(Directive::attribute("label"))
        .component("start", |s| &s.start)
        .component("end", |s| &s.end)
        .constructor(|args| {
            let span = Span {
                label: args.next()?,
                start: args.next()?,
                end: args.next()?,
            };
            if span.end < span.start {
                return Err(ConstructionError::Custom(format!(
                    "span ends at {} before it starts at {}",
                    span.end, span.start
                )));
            }
            Ok(span)
        })
        .finish();
    table
}

#[test]
fn records_are_built_after_their_content() {
    let table = span_table();
    let ctx = context(&table, &[TypeHandle::of::<Span>()]);
    let span = Span {
        label: "intro".into(),
        start: 3,
        end: 9,
    };
    let mut recorder = marshal(&ctx, &span);
    assert_eq!(
        recorder.to_string(),
        "<span label=\"intro\"><start>3</start><end>9</end></span>"
    );
    let back: Span = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(back, span);

    // content out of order, `label` missing
    let mut shuffled = EventRecorder::from(vec![
        start("span", &[]),
        start("end", &[]),
        text("9"),
        end("end"),
        start("start", &[]),
        text("3"),
        end("start"),
        end("span"),
    ]);
    let back: Span = ctx.unmarshal_as(&mut shuffled).unwrap();
    assert_eq!(
        back,
        Span {
            label: String::new(),
            start: 3,
            end: 9,
        }
    );
}

#[test]
fn construction_failures_end_the_root() {
    let table = span_table();
    let ctx = context(&table, &[TypeHandle::of::<Span>()]);
    let mut backwards = EventRecorder::from(vec![
        start("span", &[]),
        start("start", &[]),
        text("9"),
        end("start"),
        start("end", &[]),
        text("3"),
        end("end"),
        end("span"),
    ]);

    let mut handler = CollectingHandler::new();
    let result = ctx.unmarshal_with(&mut backwards, &mut handler);
    assert!(matches!(
        result,
        Err(BindError::Construction(ConstructionError::Custom(_)))
    ));
    assert_eq!(handler.events().len(), 1);
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Timeline {
    spans: Vec<Span>,
}

impl_bind_object!(Timeline);

#[test]
fn construction_failures_drop_only_their_subtree() {
    let mut table = span_table();
    table
        .class::<Timeline>()
        .factory(Timeline::default)
        .class_directive(Directive::root("timeline"))
        .field("spans", |t| &t.spans, |t| &mut t.spans)
        .directive(Directive::element("span"))
        .finish();
    let ctx = context(&table, &[TypeHandle::of::<Timeline>()]);
    let mut recorder = EventRecorder::from(vec![
        start("timeline", &[]),
        start("span", &[("label", "bad")]),
        start("start", &[]),
        text("5"),
        end("start"),
        start("end", &[]),
        text("4"),
        end("end"),
        end("span"),
        start("span", &[("label", "ok")]),
        start("start", &[]),
        text("1"),
        end("start"),
        start("end", &[]),
        text("2"),
        end("end"),
        end("span"),
        end("timeline"),
    ]);

    let mut handler = CollectingHandler::new();
    let outcome = ctx.unmarshal_with(&mut recorder, &mut handler).unwrap();
    assert_eq!(
        outcome.value.downcast_ref::<Timeline>(),
        Some(&Timeline {
            spans: vec![Span {
                label: "ok".into(),
                start: 1,
                end: 2,
            }],
        })
    );
    assert!(matches!(
        handler.events(),
        [BindError::Construction(ConstructionError::Custom(_))]
    ));
}

#[test]
fn strict_handlers_stop_at_the_first_error() {
    let table = span_table();
    let ctx = context(&table, &[TypeHandle::of::<Span>()]);
    let mut recorder = EventRecorder::from(vec![
        start("span", &[]),
        start("start", &[]),
        text("three"),
        end("start"),
        end("span"),
    ]);

    let mut handler = CollectingHandler::strict();
    let result = ctx.unmarshal_with(&mut recorder, &mut handler);
    assert!(matches!(result, Err(BindError::Accessor { .. })));
    assert_eq!(handler.events().len(), 1);

    // a lenient handler keeps going with the default
    let mut handler = CollectingHandler::new();
    let outcome = ctx.unmarshal_with(&mut recorder, &mut handler).unwrap();
    assert_eq!(outcome.value.downcast_ref::<Span>().map(|s| s.start), Some(0));
    assert_eq!(handler.events().len(), 1);
}

// -----------------------------------------------------------------------------
// Simple content

#[derive(Clone, Default, Debug, PartialEq)]
struct Price {
    amount: i64,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Labeled {
    amount: i64,
    note: String,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Offer {
    price: Price,
    cost: Price,
    tags: Vec<String>,
}

impl_bind_object!(Price, Labeled, Offer);

fn offer_table() -> TypeTable {
    let mut table = TypeTable::new();
    table
        .class::<Price>()
        .factory(Price::default)
        .field("amount", |p| &p.amount, |p| &mut p.amount)
        .directive(Directive::Value)
        .finish();
    table
        .class::<Labeled>()
        .factory(Labeled::default)
        .field("amount", |p| &p.amount, |p| &mut p.amount)
        .directive(Directive::Value)
        .field("note", |p| &p.note, |p| &mut p.note)
        .finish();
    table
        .class::<Offer>()
        .factory(Offer::default)
        .class_directive(Directive::root("offer"))
        .field("price", |o| &o.price, |o| &mut o.price)
        .directive(Directive::attribute("price"))
        .field("cost", |o| &o.cost, |o| &mut o.cost)
        .field("tags", |o| &o.tags, |o| &mut o.tags)
        .directive(Directive::attribute("tags"))
        .finish();
    table
}

#[test]
fn transducers_exist_for_simple_content_only() {
    let table = offer_table();
    let options = ContextOptions::new().lenient(true);
    let ctx = context_with(
        &table,
        &[TypeHandle::of::<Offer>(), TypeHandle::of::<Labeled>()],
        options,
    );
    let types = ctx.types();
    let price = ctx.bean_for(TypeHandle::of::<Price>()).unwrap();
    let labeled = ctx.bean_for(TypeHandle::of::<Labeled>()).unwrap();
    let offer = ctx.bean_for(TypeHandle::of::<Offer>()).unwrap();
    assert!(price.transducer(types).is_some());
    assert!(labeled.transducer(types).is_none());
    assert!(offer.transducer(types).is_none());

    assert!(ctx.model_errors().iter().any(|e| matches!(
        e.kind(),
        ModelErrorKind::ValueWithElements { member, .. } if member == "amount"
    )));
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Memo {
    a: String,
    b: String,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Quote {
    amount: u32,
    meta: Memo,
}

impl_bind_object!(Memo, Quote);

#[test]
fn complex_attributes_do_not_mix_with_text() {
    let mut table = TypeTable::new();
    table
        .class::<Memo>()
        .factory(Memo::default)
        .field("a", |m| &m.a, |m| &mut m.a)
        .field("b", |m| &m.b, |m| &mut m.b)
        .finish();
    table
        .class::<Quote>()
        .factory(Quote::default)
        .class_directive(Directive::root("quote"))
        .field("amount", |q| &q.amount, |q| &mut q.amount)
        .directive(Directive::Value)
        .field("meta", |q| &q.meta, |q| &mut q.meta)
        .directive(Directive::attribute("meta"))
        .finish();
    let options = ContextOptions::new().lenient(true);
    let ctx = context_with(&table, &[TypeHandle::of::<Quote>()], options);

    let kinds: Vec<_> = ctx.model_errors().iter().map(|e| e.kind()).collect();
    assert!(kinds.iter().any(|k| matches!(
        k,
        ModelErrorKind::NonLeafTarget { member, .. } if member == "meta"
    )));
    assert!(kinds.iter().any(|k| matches!(
        k,
        ModelErrorKind::ValueWithElements { member, .. } if member == "amount"
    )));
    let quote = ctx.bean_for(TypeHandle::of::<Quote>()).unwrap();
    assert!(quote.value_property().is_none());
    assert!(quote.attributes().is_empty());

    let value = Quote {
        amount: 12,
        meta: Memo {
            a: "x".into(),
            b: "y".into(),
        },
    };
    let mut recorder = marshal(&ctx, &value);
    assert_eq!(
        recorder.to_string(),
        "<quote><amount>12</amount><meta><a>x</a><b>y</b></meta></quote>"
    );
    let back: Quote = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(back, value);
}

#[test]
fn simple_content_is_written_as_text() {
    let table = offer_table();
    let ctx = context(&table, &[TypeHandle::of::<Offer>()]);
    let offer = Offer {
        price: Price { amount: 42 },
        cost: Price { amount: 30 },
        tags: vec!["new".into(), "hot".into()],
    };
    let mut recorder = marshal(&ctx, &offer);
    assert_eq!(
        recorder.to_string(),
        "<offer price=\"42\" tags=\"new hot\"><cost>30</cost></offer>"
    );
    let back: Offer = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(back, offer);
}

// -----------------------------------------------------------------------------
// Attributes

#[derive(Clone, Default, Debug, PartialEq)]
struct Tag {
    zeta: String,
    alpha: String,
    mid: String,
    rest: AttributeMap,
}

impl_bind_object!(Tag);

fn tag_table() -> TypeTable {
    let mut table = TypeTable::new();
    table
        .class::<Tag>()
        .factory(Tag::default)
        .class_directive(Directive::root("tag"))
        .field("zeta", |t| &t.zeta, |t| &mut t.zeta)
        .directive(Directive::attribute("zeta"))
        .field("alpha", |t| &t.alpha, |t| &mut t.alpha)
        .directive(Directive::attribute("alpha"))
        .field("mid", |t| &t.mid, |t| &mut t.mid)
        .directive(Directive::attribute("mid"))
        .field("rest", |t| &t.rest, |t| &mut t.rest)
        .finish();
    table
}

#[test]
fn attribute_order_is_declared_or_canonical() {
    let table = tag_table();
    let tag = Tag {
        zeta: "z".into(),
        alpha: "a".into(),
        mid: "m".into(),
        rest: AttributeMap::new(),
    };

    let ctx = context(&table, &[TypeHandle::of::<Tag>()]);
    assert_eq!(
        marshal(&ctx, &tag).to_string(),
        "<tag zeta=\"z\" alpha=\"a\" mid=\"m\"></tag>"
    );

    let canonical = ContextOptions::new().canonical_attributes(true);
    let ctx = context_with(&table, &[TypeHandle::of::<Tag>()], canonical);
    let first = marshal(&ctx, &tag).to_string();
    assert_eq!(first, "<tag alpha=\"a\" mid=\"m\" zeta=\"z\"></tag>");
    assert_eq!(first, marshal(&ctx, &tag).to_string());
}

#[test]
fn wildcard_keeps_unmapped_attributes() {
    let table = tag_table();
    let ctx = context(&table, &[TypeHandle::of::<Tag>()]);
    let mut recorder = EventRecorder::from(vec![
        start("tag", &[("alpha", "a"), ("{urn:x}color", "red"), ("size", "2")]),
        end("tag"),
    ]);

    let mut handler = CollectingHandler::new();
    let tag: Tag = {
        let outcome = ctx.unmarshal_with(&mut recorder, &mut handler).unwrap();
        outcome.value.downcast_ref::<Tag>().unwrap().clone()
    };
    assert!(handler.events().is_empty());
    assert_eq!(tag.alpha, "a");
    assert_eq!(tag.rest.len(), 2);
    assert_eq!(
        tag.rest.get(&QName::new("urn:x", "color")).map(String::as_str),
        Some("red")
    );

    let out = marshal(&ctx, &tag).to_string();
    assert!(out.contains("{urn:x}color=\"red\""));
    assert!(out.contains("size=\"2\""));
}

#[test]
fn declared_attributes_win_over_the_wildcard() {
    let table = tag_table();
    let ctx = context(&table, &[TypeHandle::of::<Tag>()]);
    let tag = Tag {
        alpha: "a".into(),
        rest: [
            (QName::local("alpha"), String::from("dup")),
            (QName::local("size"), String::from("2")),
        ]
        .into_iter()
        .collect(),
        ..Tag::default()
    };

    let mut recorder = EventRecorder::new();
    let mut handler = CollectingHandler::new();
    ctx.marshal_with(&tag, &mut recorder, &mut handler).unwrap();
    assert_eq!(
        recorder.to_string(),
        "<tag zeta=\"\" alpha=\"a\" mid=\"\" size=\"2\"></tag>"
    );
    assert!(matches!(
        handler.events(),
        [BindError::DuplicateAttribute { name, .. }] if name.local_name() == "alpha"
    ));
    assert_eq!(handler.events()[0].severity(), Severity::Warning);

    let back: Tag = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(back.alpha, "a");
    assert_eq!(back.rest.len(), 1);
}

// -----------------------------------------------------------------------------
// Maps, references and ids

#[derive(Clone, Default, Debug, PartialEq)]
struct Inventory {
    counts: BTreeMap<String, u32>,
}

impl_bind_object!(Inventory);

#[test]
fn maps_are_written_as_entries() {
    let mut table = TypeTable::new();
    table
        .class::<Inventory>()
        .factory(Inventory::default)
        .class_directive(Directive::root("inventory"))
        .field("counts", |i| &i.counts, |i| &mut i.counts)
        .finish();
    let ctx = context(&table, &[TypeHandle::of::<Inventory>()]);
    let inventory = Inventory {
        counts: BTreeMap::from([("apple".to_string(), 3), ("pear".to_string(), 0)]),
    };

    let mut recorder = marshal(&ctx, &inventory);
    assert_eq!(
        recorder.to_string(),
        "<inventory><counts>\
         <entry><key>apple</key><value>3</value></entry>\
         <entry><key>pear</key><value>0</value></entry>\
         </counts></inventory>"
    );
    let back: Inventory = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(back, inventory);
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Figure;

#[derive(Clone, Default, Debug, PartialEq)]
struct Circle {
    base: Figure,
    radius: i64,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Square {
    base: Figure,
    side: i64,
}

#[derive(Clone, Default, Debug)]
struct Drawing {
    figures: Vec<Poly<Figure>>,
}

impl_bind_object!(Figure, Circle, Square, Drawing);

#[test]
fn references_use_the_element_of_the_value() {
    let mut table = TypeTable::new();
    table.class::<Figure>().factory(Figure::default).finish();
    table
        .class::<Circle>()
        .factory(Circle::default)
        .class_directive(Directive::root("circle"))
        .extends::<Figure>(|c| &c.base, |c| &mut c.base)
        .field("radius", |c| &c.radius, |c| &mut c.radius)
        .finish();
    table
        .class::<Square>()
        .factory(Square::default)
        .class_directive(Directive::root("square"))
        .extends::<Figure>(|s| &s.base, |s| &mut s.base)
        .field("side", |s| &s.side, |s| &mut s.side)
        .finish();
    table
        .class::<Drawing>()
        .factory(Drawing::default)
        .class_directive(Directive::root("drawing"))
        .field("figures", |d| &d.figures, |d| &mut d.figures)
        .directive(Directive::ElementRef)
        .finish();
    let roots = [
        TypeHandle::of::<Drawing>(),
        TypeHandle::of::<Circle>(),
        TypeHandle::of::<Square>(),
    ];
    let ctx = context(&table, &roots);

    let drawing = Drawing {
        figures: vec![
            Poly::new(Circle {
                base: Figure,
                radius: 2,
            }),
            Poly::new(Square {
                base: Figure,
                side: 3,
            }),
        ],
    };
    let mut recorder = marshal(&ctx, &drawing);
    assert_eq!(
        recorder.to_string(),
        "<drawing><circle><radius>2</radius></circle><square><side>3</side></square></drawing>"
    );

    let back: Drawing = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(back.figures.len(), 2);
    assert_eq!(back.figures[0].downcast_ref::<Circle>().map(|c| c.radius), Some(2));
    assert_eq!(back.figures[1].downcast_ref::<Square>().map(|s| s.side), Some(3));
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Member {
    id: String,
    name: String,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Team {
    members: Vec<Member>,
}

impl_bind_object!(Member, Team);

#[test]
fn ids_are_recorded_while_loading() {
    let mut table = TypeTable::new();
    table
        .class::<Member>()
        .factory(Member::default)
        .field("id", |m| &m.id, |m| &mut m.id)
        .directive(Directive::attribute("id"))
        .directive(Directive::Id)
        .field("name", |m| &m.name, |m| &mut m.name)
        .finish();
    table
        .class::<Team>()
        .factory(Team::default)
        .class_directive(Directive::root("team"))
        .field("members", |t| &t.members, |t| &mut t.members)
        .directive(Directive::element("member"))
        .finish();
    let ctx = context(&table, &[TypeHandle::of::<Team>()]);
    let team = Team {
        members: vec![
            Member {
                id: "m1".into(),
                name: "Ada".into(),
            },
            Member {
                id: "m2".into(),
                name: "Alan".into(),
            },
        ],
    };

    let mut recorder = marshal(&ctx, &team);
    let outcome = ctx
        .unmarshal_with(&mut recorder, &mut CollectingHandler::strict())
        .unwrap();
    assert_eq!(outcome.ids.len(), 2);
    let ada = outcome.ids["m1"].downcast_ref::<Member>().unwrap();
    assert_eq!(ada.name, "Ada");

    let bean = ctx.bean_for(TypeHandle::of::<Member>()).unwrap();
    assert_eq!(bean.id_of(&ctx, &team.members[1]).as_deref(), Some("m2"));
}

// -----------------------------------------------------------------------------
// Source positions

/// Announces every start tag of the wrapped source on a line of its own.
struct OneTagPerLine(EventRecorder);

struct Lines<'h> {
    handler: &'h mut dyn ContentHandler,
    line: u32,
}

impl ContentHandler for Lines<'_> {
    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<(), BindError> {
        self.line += 1;
        self.handler.position(SourcePosition::new(self.line, 1));
        self.handler.start_element(name, attributes)
    }

    fn characters(&mut self, text: &str) -> Result<(), BindError> {
        self.handler.characters(text)
    }

    fn end_element(&mut self, name: &QName) -> Result<(), BindError> {
        self.handler.end_element(name)
    }
}

impl EventSource for OneTagPerLine {
    fn drive(&mut self, handler: &mut dyn ContentHandler) -> Result<(), BindError> {
        self.0.drive(&mut Lines { handler, line: 0 })
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Stop {
    at: SourcePosition,
    name: String,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Route {
    base: Stop,
    own_at: SourcePosition,
    kids: Vec<Stop>,
}

#[derive(Clone, Debug, PartialEq)]
struct Mark {
    label: String,
    at: SourcePosition,
}

impl_bind_object!(Stop, Route, Mark);

fn route_table() -> TypeTable {
    let mut table = TypeTable::new();
    table
        .class::<Stop>()
        .factory(Stop::default)
        .class_directive(Directive::root("stop"))
        .field("at", |s| &s.at, |s| &mut s.at)
        .directive(Directive::Location)
        .field("name", |s| &s.name, |s| &mut s.name)
        .directive(Directive::attribute("name"))
        .finish();
    table
        .class::<Route>()
        .factory(Route::default)
        .class_directive(Directive::root("route"))
        .extends::<Stop>(|r| &r.base, |r| &mut r.base)
        .field("own_at", |r| &r.own_at, |r| &mut r.own_at)
        .directive(Directive::Location)
        .field("kids", |r| &r.kids, |r| &mut r.kids)
        .directive(Directive::element("kid"))
        .finish();
    table
        .record::<Mark>()
        .class_directive(Directive::root("mark"))
        .component("label", |m| &m.label)
        .directive(Directive::attribute("label"))
        .component("at", |m| &m.at)
        .directive(Directive::Location)
        .constructor(|args| {
            Ok(Mark {
                label: args.next()?,
                at: args.next()?,
            })
        })
        .finish();
    table
}

fn route_events() -> EventRecorder {
    EventRecorder::from(vec![
        start("route", &[("name", "top")]),
        start("kid", &[("name", "a")]),
        end("kid"),
        start("kid", &[("name", "b")]),
        end("kid"),
        end("route"),
    ])
}

#[test]
fn instances_receive_the_position_of_their_start_tag() {
    let table = route_table();
    let ctx = context(&table, &[TypeHandle::of::<Route>()]);
    assert!(ctx.model_errors().is_empty());
    let stop_class = ctx.types().class_of(TypeHandle::of::<Stop>().id());
    let member = ctx.bean_for(TypeHandle::of::<Route>()).unwrap().position_member();
    assert_eq!(member.map(|m| m.class()), stop_class);
    assert_eq!(member.map(|m| m.member()), Some("at"));

    let route: Route = ctx.unmarshal_as(&mut OneTagPerLine(route_events())).unwrap();
    let stop = |line, name: &str| Stop {
        at: SourcePosition::new(line, 1),
        name: name.into(),
    };
    // the base class declares the member that wins
    assert_eq!(
        route,
        Route {
            base: stop(1, "top"),
            own_at: SourcePosition::default(),
            kids: vec![stop(2, "a"), stop(3, "b")],
        }
    );

    // positions are not part of the markup
    assert_eq!(
        marshal(&ctx, &route).to_string(),
        "<route name=\"top\"><kid name=\"a\"></kid><kid name=\"b\"></kid></route>"
    );
}

#[test]
fn positions_are_staged_for_records() {
    let table = route_table();
    let ctx = context(&table, &[TypeHandle::of::<Mark>(), TypeHandle::of::<Route>()]);

    let events = vec![start("mark", &[("label", "here")]), end("mark")];
    let mark: Mark = ctx
        .unmarshal_as(&mut OneTagPerLine(EventRecorder::from(events.clone())))
        .unwrap();
    assert_eq!(mark.at, SourcePosition::new(1, 1));

    // a source without positions leaves the members untouched
    let mark: Mark = ctx.unmarshal_as(&mut EventRecorder::from(events)).unwrap();
    assert_eq!(mark.at, SourcePosition::default());
    let route: Route = ctx.unmarshal_as(&mut route_events()).unwrap();
    assert!(route.kids.iter().all(|kid| kid.at == SourcePosition::default()));
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Note {
    at: String,
    text: String,
}

impl_bind_object!(Note);

#[test]
fn location_members_hold_a_source_position() {
    let mut table = TypeTable::new();
    table
        .class::<Note>()
        .factory(Note::default)
        .class_directive(Directive::root("note"))
        .field("at", |n| &n.at, |n| &mut n.at)
        .directive(Directive::Location)
        .field("text", |n| &n.text, |n| &mut n.text)
        .finish();
    let options = ContextOptions::new().lenient(true);
    let ctx = context_with(&table, &[TypeHandle::of::<Note>()], options);

    assert!(ctx.model_errors().iter().any(|e| matches!(
        e.kind(),
        ModelErrorKind::InvalidLocation { member, .. } if member == "at"
    )));
    let class = ctx.types().class_of(TypeHandle::of::<Note>().id()).unwrap();
    let note = ctx.types().class(class);
    assert!(note.position_member().is_none());
    assert!(note.declares("text"));
    assert!(!note.declares("at"));
}

// -----------------------------------------------------------------------------
// Model

#[derive(Clone, Default, Debug, PartialEq)]
struct Node {
    name: String,
    children: Vec<Node>,
    owner: Vec<Keeper>,
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Keeper {
    nodes: Vec<Node>,
}

impl_bind_object!(Node, Keeper);

fn node_table() -> TypeTable {
    let mut table = TypeTable::new();
    table
        .class::<Node>()
        .factory(Node::default)
        .class_directive(Directive::root("node"))
        .field("name", |n| &n.name, |n| &mut n.name)
        .directive(Directive::attribute("name"))
        .field("children", |n| &n.children, |n| &mut n.children)
        .directive(Directive::element("node"))
        .field("owner", |n| &n.owner, |n| &mut n.owner)
        .finish();
    table
        .class::<Keeper>()
        .factory(Keeper::default)
        .field("nodes", |k| &k.nodes, |k| &mut k.nodes)
        .finish();
    table
}

#[test]
fn cyclic_types_are_built_once() {
    let table = node_table();
    let roots = [TypeHandle::of::<Node>(), TypeHandle::of::<Node>()];
    let (types, errors) = build_model(&table, &mut InlineReader::new(), &roots);
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(types.classes().len(), 2);

    let ctx = BindingContext::from_model(types, errors, ContextOptions::new());
    let tree = Node {
        name: "root".into(),
        children: vec![
            Node {
                name: "leaf".into(),
                ..Node::default()
            },
            Node {
                name: "inner".into(),
                children: vec![Node {
                    name: "deep".into(),
                    ..Node::default()
                }],
                owner: vec![Keeper::default()],
            },
        ],
        owner: Vec::new(),
    };
    let mut recorder = marshal(&ctx, &tree);
    let back: Node = ctx.unmarshal_as(&mut recorder).unwrap();
    assert_eq!(back, tree);
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Clash {
    both: String,
    second: String,
}

impl_bind_object!(Clash);

#[test]
fn model_errors_are_collected_in_one_pass() {
    let mut table = TypeTable::new();
    table
        .class::<Clash>()
        .factory(Clash::default)
        .class_directive(Directive::root("clash"))
        .field("both", |c| &c.both, |c| &mut c.both)
        .directive(Directive::attribute("both"))
        .directive(Directive::Value)
        .field("second", |c| &c.second, |c| &mut c.second)
        .directive(Directive::Map { name: None })
        .finish();

    let roots = [TypeHandle::of::<Clash>()];
    let Err(errors) = BindingContext::new(
        &table,
        &mut InlineReader::new(),
        &roots,
        ContextOptions::new(),
    ) else {
        panic!("conflicting directives must fail a strict build");
    };
    assert_eq!(errors.len(), 2);
    assert!(matches!(
        errors.0[0].kind(),
        ModelErrorKind::ConflictingDirectives { .. }
    ));
    assert!(matches!(
        errors.0[1].kind(),
        ModelErrorKind::MapShapeRequired { .. }
    ));

    // both fall back to elements
    let ctx = context_with(&table, &roots, ContextOptions::new().lenient(true));
    let clash = Clash {
        both: "b".into(),
        second: "s".into(),
    };
    assert_eq!(
        marshal(&ctx, &clash).to_string(),
        "<clash><both>b</both><second>s</second></clash>"
    );
}

// -----------------------------------------------------------------------------
// Sharing

#[test]
fn one_context_serves_many_threads() {
    let table = bookstore_table();
    let ctx = context(&table, &[TypeHandle::of::<Bookstore>()]);
    let expected = marshal(&ctx, &bookstore()).to_string();

    thread::scope(|scope| {
        for index in 0..4 {
            let ctx = &ctx;
            let expected = &expected;
            scope.spawn(move || {
                let mut store = bookstore();
                store.name = format!("branch {index}");
                let mut recorder = marshal(ctx, &store);
                let back: Bookstore = ctx.unmarshal_as(&mut recorder).unwrap();
                assert_eq!(back, store);
                assert_eq!(&marshal(ctx, &bookstore()).to_string(), expected);
            });
        }
    });
}

#[cfg(feature = "auto_register")]
mod auto_register {
    use crate::meta::{Directive, InlineReader};
    use crate::nav::{Navigator, TypeHandle, TypeTable};
    use crate::{BindingContext, ContextOptions, impl_bind_object};

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Ping {
        seq: u32,
    }
    impl_bind_object!(Ping);

    fn register(table: &mut TypeTable) {
        table
            .class::<Ping>()
            .factory(Ping::default)
            .class_directive(Directive::root("ping"))
            .field("seq", |p| &p.seq, |p| &mut p.seq)
            .finish();
    }

    crate::register_types!(register);

    #[test]
    fn submitted_registrations_are_collected() {
        let mut table = TypeTable::new();
        assert!(table.auto_register());
        assert!(table.class_decl(TypeHandle::of::<Ping>()).is_some());

        let ctx = BindingContext::new(
            &table,
            &mut InlineReader::new(),
            &[TypeHandle::of::<Ping>()],
            ContextOptions::new(),
        )
        .unwrap();
        let mut recorder = crate::ser::EventRecorder::new();
        ctx.marshal(&Ping { seq: 7 }, &mut recorder).unwrap();
        assert_eq!(recorder.to_string(), "<ping><seq>7</seq></ping>");
    }
}
