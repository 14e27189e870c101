use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::QName;
use crate::de::{Attribute, ContentHandler, SourcePosition};
use crate::error::{AccessorError, BindError, ConstructionError, Severity};
use crate::info::{ClassId, PropertyRef, TypeRef};
use crate::model::PropertyKind;
use crate::name::{MAP_ENTRY, MAP_KEY, MAP_VALUE, XSI_NAMESPACE};
use crate::runtime::accessor::view_mut;
use crate::runtime::{
    BindingContext, Child, ConstructionStager, EventHandler, LoadOutcome, PositionMember,
    parse_value, referable,
};
use crate::value::{AttributeMap, BindValue, Instance, Object, Value};

// -----------------------------------------------------------------------------
// Frames

/// Where a finished value goes.
#[derive(Clone, Copy, Debug)]
enum Slot {
    Root,
    /// A property of the enclosing bean; list properties accumulate.
    Property(PropertyRef),
    /// An item of the enclosing wrapper.
    WrapperItem,
    MapKey,
    MapValue,
}

/// The instance of an open bean element.
enum Pending {
    Instance(Instance),
    /// Constructor-only classes collect values until the end tag.
    Staged(ConstructionStager),
}

enum Frame {
    Bean {
        class: ClassId,
        name: QName,
        pending: Pending,
        lists: Vec<(PropertyRef, Vec<Value>)>,
        text: String,
        slot: Slot,
    },
    Text {
        target: TypeRef,
        name: QName,
        buffer: String,
        slot: Slot,
    },
    Wrapper {
        prop: PropertyRef,
        name: QName,
        items: Vec<Value>,
    },
    Map {
        prop: PropertyRef,
        name: QName,
        entries: Vec<(Value, Value)>,
    },
    Entry {
        prop: PropertyRef,
        key: Value,
        value: Value,
    },
    /// An ignored subtree, `depth` elements deep.
    Skip { depth: usize },
}

impl Frame {
    fn name(&self) -> QName {
        match self {
            Self::Bean { name, .. }
            | Self::Text { name, .. }
            | Self::Wrapper { name, .. }
            | Self::Map { name, .. } => name.clone(),
            Self::Entry { .. } => QName::local(MAP_ENTRY),
            Self::Skip { .. } => QName::default(),
        }
    }
}

/// What a start tag leads to, decided before the stack is touched.
enum Step {
    Open { target: TypeRef, slot: Slot },
    Push(Frame),
    Unexpected { parent: QName },
    Done,
}

// -----------------------------------------------------------------------------
// Loader

/// The state machine of one unmarshal call.
///
/// Every open element has a frame on a stack. Bean frames dispatch their
/// children through the bean's child table; a child becomes a nested bean,
/// a text frame for simple content, or a wrapper or map frame collecting
/// items. A frame's value is delivered to its parent at the end tag.
///
/// Mutable instances are created at the start tag and filled as values
/// arrive. Constructor-only instances are staged and built at the end tag,
/// after all their content is known.
pub struct Loader<'a> {
    ctx: &'a BindingContext,
    handler: &'a mut dyn EventHandler,
    declared: Option<TypeRef>,
    stack: Vec<Frame>,
    result: Option<Value>,
    ids: BTreeMap<String, Object>,
    position: Option<SourcePosition>,
}

impl<'a> Loader<'a> {
    /// A loader for one document. With `declared` set, the root element is
    /// read as that type whatever its name.
    #[inline]
    pub fn new(
        ctx: &'a BindingContext,
        declared: Option<TypeRef>,
        handler: &'a mut dyn EventHandler,
    ) -> Self {
        Self {
            ctx,
            handler,
            declared,
            stack: Vec::new(),
            result: None,
            ids: BTreeMap::new(),
            position: None,
        }
    }

    /// The root value and the ids seen, once the root element has ended.
    pub fn finish(self) -> Result<LoadOutcome, BindError> {
        match self.result {
            Some(value) if self.stack.is_empty() => Ok(LoadOutcome {
                value,
                ids: self.ids,
            }),
            _ => Err(BindError::Incomplete),
        }
    }

    fn report(&mut self, error: BindError) -> Result<(), BindError> {
        if error.severity() < Severity::Fatal && self.handler.handle_event(&error) {
            return Ok(());
        }
        Err(error)
    }

    // -------------------------------------------------------------------------
    // Start tags

    fn step(&mut self, name: &QName) -> Result<Step, BindError> {
        let ctx = self.ctx;
        let types = ctx.types();
        let Some(top) = self.stack.last_mut() else {
            if self.result.is_some() {
                return Err(BindError::UnexpectedRoot(name.clone()));
            }
            let target = match self.declared {
                Some(declared) => declared,
                None => types
                    .get_element_info(None, name)
                    .map(|info| info.content())
                    .ok_or_else(|| BindError::UnexpectedRoot(name.clone()))?,
            };
            return Ok(Step::Open {
                target,
                slot: Slot::Root,
            });
        };
        let step = match top {
            Frame::Skip { depth } => {
                *depth += 1;
                Step::Done
            }
            Frame::Bean { class, .. } => match ctx.bean(*class).child(types, name) {
                Some(Child::Property(prop)) => {
                    let property = ctx.property(prop);
                    if property.kind() == PropertyKind::Map {
                        Step::Push(Frame::Map {
                            prop,
                            name: name.clone(),
                            entries: Vec::new(),
                        })
                    } else {
                        Step::Open {
                            target: property.target(),
                            slot: Slot::Property(prop),
                        }
                    }
                }
                Some(Child::Wrapper(prop)) => Step::Push(Frame::Wrapper {
                    prop,
                    name: name.clone(),
                    items: Vec::new(),
                }),
                Some(Child::Reference { prop, class }) => Step::Open {
                    target: TypeRef::Class(class),
                    slot: Slot::Property(prop),
                },
                None => Step::Unexpected { parent: top.name() },
            },
            Frame::Wrapper { prop, .. } => {
                let property = ctx.property(*prop);
                let target = if property.kind() == PropertyKind::Reference {
                    referable(types, *prop)
                        .into_iter()
                        .rev()
                        .find(|(element, _)| element == name)
                        .map(|(_, class)| TypeRef::Class(class))
                } else {
                    property
                        .name()
                        .filter(|&element| element == name)
                        .map(|_| property.target())
                };
                match target {
                    Some(target) => Step::Open {
                        target,
                        slot: Slot::WrapperItem,
                    },
                    None => Step::Unexpected { parent: top.name() },
                }
            }
            Frame::Map { prop, .. } if *name == QName::local(MAP_ENTRY) => {
                Step::Push(Frame::Entry {
                    prop: *prop,
                    key: Value::Nil,
                    value: Value::Nil,
                })
            }
            Frame::Entry { prop, .. } => {
                let property = ctx.property(*prop);
                if *name == QName::local(MAP_KEY) {
                    Step::Open {
                        target: property.key().unwrap_or(TypeRef::Wildcard),
                        slot: Slot::MapKey,
                    }
                } else if *name == QName::local(MAP_VALUE) {
                    Step::Open {
                        target: property.target(),
                        slot: Slot::MapValue,
                    }
                } else {
                    Step::Unexpected { parent: top.name() }
                }
            }
            Frame::Map { .. } | Frame::Text { .. } => Step::Unexpected { parent: top.name() },
        };
        Ok(step)
    }

    fn open(
        &mut self,
        name: &QName,
        target: TypeRef,
        attributes: &[Attribute],
        slot: Slot,
    ) -> Result<(), BindError> {
        let ctx = self.ctx;
        match target {
            TypeRef::Class(class) if ctx.bean(class).transducer(ctx.types()).is_none() => {
                self.open_bean(name, class, attributes, slot)
            }
            TypeRef::Class(_) | TypeRef::Leaf(_) => {
                self.stack.push(Frame::Text {
                    target,
                    name: name.clone(),
                    buffer: String::new(),
                    slot,
                });
                Ok(())
            }
            TypeRef::Pending(_) | TypeRef::Wildcard => {
                let parent = self.stack.last().map(Frame::name).unwrap_or_default();
                self.unexpected(name, parent)
            }
        }
    }

    fn unexpected(&mut self, name: &QName, parent: QName) -> Result<(), BindError> {
        if self.stack.is_empty() {
            return Err(BindError::UnexpectedRoot(name.clone()));
        }
        self.report(BindError::UnexpectedElement {
            name: name.clone(),
            parent,
        })?;
        self.stack.push(Frame::Skip { depth: 1 });
        Ok(())
    }

    /// Applies a type override of `declared`, if it has subclasses and the
    /// start tag carries one.
    fn substitute(&mut self, declared: ClassId, attributes: &[Attribute]) -> Result<ClassId, BindError> {
        let types = self.ctx.types();
        if !types.class(declared).has_subclasses() {
            return Ok(declared);
        }
        let marker = QName::type_override();
        let Some(attribute) = attributes.iter().find(|a| a.name == marker) else {
            return Ok(declared);
        };
        let name = QName::parse_clark(attribute.value.trim());
        match types.type_by_name(&name) {
            Some(TypeRef::Class(class)) if types.is_subclass(class, declared) => {
                log::trace!("type override `{name}` selects `{}`", types.class(class).ty());
                Ok(class)
            }
            Some(_) => {
                self.report(BindError::IncompatibleTypeOverride {
                    name,
                    declared: types.class(declared).ty().path(),
                })?;
                Ok(declared)
            }
            None => {
                self.report(BindError::UnknownTypeOverride(name))?;
                Ok(declared)
            }
        }
    }

    fn open_bean(
        &mut self,
        name: &QName,
        declared: ClassId,
        attributes: &[Attribute],
        slot: Slot,
    ) -> Result<(), BindError> {
        let ctx = self.ctx;
        let class = self.substitute(declared, attributes)?;
        let bean = ctx.bean(class);
        let pending = if bean.is_immutable() {
            Pending::Staged(ConstructionStager::new())
        } else if let Some(factory) = bean.factory() {
            Pending::Instance(factory())
        } else {
            let error = BindError::from(ConstructionError::NoFactory(bean.ty().path()));
            return self.drop_subtree(slot, error, true);
        };
        log::trace!("open `{name}` as `{}`", bean.ty());

        let mut frame_pending = pending;
        if let Some(member) = bean.position_member()
            && let Some(position) = self.position
            && let Err(error) = locate(ctx, class, &mut frame_pending, member, position)
        {
            self.report(error)?;
        }
        let mut wildcard = AttributeMap::new();
        for attribute in attributes {
            if attribute.name.namespace() == XSI_NAMESPACE {
                continue;
            }
            if let Some(prop) = bean.attribute(&attribute.name) {
                let property = ctx.property(prop);
                let result = parse_value(
                    ctx,
                    property.target(),
                    property.is_list(),
                    &attribute.value,
                    property,
                )
                .and_then(|value| assign(ctx, class, &mut frame_pending, prop, value));
                if let Err(error) = result {
                    self.report(error)?;
                }
            } else if bean.attribute_wildcard().is_some() {
                wildcard.insert(attribute.name.clone(), attribute.value.clone());
            } else {
                self.report(BindError::UnexpectedAttribute {
                    name: attribute.name.clone(),
                    element: name.clone(),
                })?;
            }
        }
        if let Some(prop) = bean.attribute_wildcard()
            && !wildcard.is_empty()
            && let Err(error) = assign(ctx, class, &mut frame_pending, prop, Value::Attributes(wildcard))
        {
            self.report(error)?;
        }

        self.stack.push(Frame::Bean {
            class,
            name: name.clone(),
            pending: frame_pending,
            lists: Vec::new(),
            text: String::new(),
            slot,
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // End tags

    fn close_bean(
        &mut self,
        class: ClassId,
        mut pending: Pending,
        lists: Vec<(PropertyRef, Vec<Value>)>,
        text: String,
        slot: Slot,
    ) -> Result<(), BindError> {
        let ctx = self.ctx;
        let bean = ctx.bean(class);
        if let Some(prop) = bean.value_property()
            && !text.is_empty()
        {
            let property = ctx.property(prop);
            let result = parse_value(ctx, property.target(), property.is_list(), &text, property)
                .and_then(|value| assign(ctx, class, &mut pending, prop, value));
            if let Err(error) = result {
                self.report(error)?;
            }
        }
        for (prop, items) in lists {
            if let Err(error) = assign(ctx, class, &mut pending, prop, Value::List(items)) {
                self.report(error)?;
            }
        }

        let built = match pending {
            Pending::Instance(instance) => Ok(Object::from(instance)),
            Pending::Staged(stager) => match bean.constructor() {
                Some(constructor) => stager.build(bean.ty(), bean.param_names(), constructor),
                None => Err(ConstructionError::NoFactory(bean.ty().path())),
            },
        };
        let object = match built {
            Ok(object) => object,
            Err(error) => return self.drop_subtree(slot, error.into(), false),
        };
        if let Some(id) = bean.id_of(ctx, &*object) {
            self.ids.insert(id, Arc::clone(&object));
        }
        log::trace!("close `{}`", bean.ty());
        self.deliver(slot, Value::Object(object))
    }

    /// Drops a subtree whose instance could not be created. The root cannot
    /// be dropped, so there the call ends.
    fn drop_subtree(&mut self, slot: Slot, error: BindError, skip: bool) -> Result<(), BindError> {
        if matches!(slot, Slot::Root) {
            self.handler.handle_event(&error);
            return Err(error);
        }
        self.report(error)?;
        if skip {
            self.stack.push(Frame::Skip { depth: 1 });
        }
        Ok(())
    }

    fn deliver(&mut self, slot: Slot, value: Value) -> Result<(), BindError> {
        let ctx = self.ctx;
        let result = match (slot, self.stack.last_mut()) {
            (Slot::Root, _) => {
                self.result = Some(value);
                Ok(())
            }
            (
                Slot::Property(prop),
                Some(Frame::Bean {
                    class,
                    pending,
                    lists,
                    ..
                }),
            ) => {
                if ctx.property(prop).is_list() {
                    accumulate(lists, prop).push(value);
                    Ok(())
                } else {
                    assign(ctx, *class, pending, prop, value)
                }
            }
            (Slot::WrapperItem, Some(Frame::Wrapper { items, .. })) => {
                items.push(value);
                Ok(())
            }
            (Slot::MapKey, Some(Frame::Entry { key, .. })) => {
                *key = value;
                Ok(())
            }
            (Slot::MapValue, Some(Frame::Entry { value: slot, .. })) => {
                *slot = value;
                Ok(())
            }
            (slot, _) => {
                log::debug!("value for {slot:?} has no receiving frame");
                Ok(())
            }
        };
        match result {
            Err(error) => self.report(error),
            ok => ok,
        }
    }
}

/// The list accumulator of `prop`, created empty on first use.
fn accumulate(lists: &mut Vec<(PropertyRef, Vec<Value>)>, prop: PropertyRef) -> &mut Vec<Value> {
    let index = match lists.iter().position(|(p, _)| *p == prop) {
        Some(index) => index,
        None => {
            lists.push((prop, Vec::new()));
            lists.len() - 1
        }
    };
    &mut lists[index].1
}

/// Sets `prop` on the pending instance of `class`, or stages it.
fn assign(
    ctx: &BindingContext,
    class: ClassId,
    pending: &mut Pending,
    prop: PropertyRef,
    value: Value,
) -> Result<(), BindError> {
    let property = ctx.property(prop);
    match pending {
        Pending::Staged(stager) => match property.accessor().staging_key() {
            Some(key) => {
                stager.stage(key, value);
                Ok(())
            }
            None => Err(BindError::accessor(
                property,
                AccessorError::Unavailable(property.member()),
            )),
        },
        Pending::Instance(instance) => view_mut(ctx.types(), class, prop.class, &mut **instance)
            .and_then(|target| property.accessor().set(target, value))
            .map_err(|source| BindError::accessor(property, source)),
    }
}

/// Sets the position member of the pending instance of `class`, or stages it.
fn locate(
    ctx: &BindingContext,
    class: ClassId,
    pending: &mut Pending,
    member: &PositionMember,
    position: SourcePosition,
) -> Result<(), BindError> {
    let accessor = member.accessor();
    match pending {
        Pending::Staged(stager) => match accessor.staging_key() {
            Some(key) => {
                stager.stage(key, position.to_value());
                Ok(())
            }
            None => Err(BindError::accessor(
                member,
                AccessorError::Unavailable(member.member()),
            )),
        },
        Pending::Instance(instance) => {
            view_mut(ctx.types(), class, member.class(), &mut **instance)
                .and_then(|target| accessor.set(target, position.to_value()))
                .map_err(|source| BindError::accessor(member, source))
        }
    }
}

// -----------------------------------------------------------------------------
// ContentHandler

impl ContentHandler for Loader<'_> {
    fn position(&mut self, position: SourcePosition) {
        self.position = Some(position);
    }

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<(), BindError> {
        let result = self.step(name).and_then(|step| match step {
            Step::Open { target, slot } => self.open(name, target, attributes, slot),
            Step::Push(frame) => {
                self.stack.push(frame);
                Ok(())
            }
            Step::Unexpected { parent } => self.unexpected(name, parent),
            Step::Done => Ok(()),
        });
        // a position belongs to one start tag only
        self.position = None;
        result
    }

    fn characters(&mut self, text: &str) -> Result<(), BindError> {
        let ctx = self.ctx;
        match self.stack.last_mut() {
            Some(Frame::Bean {
                class, text: buffer, ..
            }) if ctx.bean(*class).value_property().is_some() => buffer.push_str(text),
            Some(Frame::Text { buffer, .. }) => buffer.push_str(text),
            _ => {}
        }
        Ok(())
    }

    fn end_element(&mut self, name: &QName) -> Result<(), BindError> {
        let Some(frame) = self.stack.pop() else {
            return Err(BindError::Source(alloc::format!(
                "end tag `{name}` without a start tag"
            )));
        };
        match frame {
            Frame::Skip { depth } => {
                if depth > 1 {
                    self.stack.push(Frame::Skip { depth: depth - 1 });
                }
                Ok(())
            }
            Frame::Text {
                target,
                name,
                buffer,
                slot,
            } => match parse_value(self.ctx, target, false, &buffer, &name) {
                Ok(value) => self.deliver(slot, value),
                Err(error) => self.drop_subtree(slot, error, false),
            },
            Frame::Wrapper { prop, items, .. } => {
                if let Some(Frame::Bean { lists, .. }) = self.stack.last_mut() {
                    accumulate(lists, prop).extend(items);
                }
                Ok(())
            }
            Frame::Map { prop, entries, .. } => {
                self.deliver(Slot::Property(prop), Value::Map(entries))
            }
            Frame::Entry { key, value, .. } => {
                if let Some(Frame::Map { entries, .. }) = self.stack.last_mut() {
                    entries.push((key, value));
                }
                Ok(())
            }
            Frame::Bean {
                class,
                pending,
                lists,
                text,
                slot,
                ..
            } => self.close_bean(class, pending, lists, text, slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::accumulate;
    use crate::info::{ClassId, PropertyRef};
    use crate::value::Value;
    use alloc::vec::Vec;

    #[test]
    fn accumulators_keep_first_seen_order() {
        let a = PropertyRef {
            class: ClassId(0),
            index: 0,
        };
        let b = PropertyRef {
            class: ClassId(0),
            index: 1,
        };
        let mut lists = Vec::new();
        accumulate(&mut lists, b).push(Value::Int(1));
        accumulate(&mut lists, a).push(Value::Int(2));
        accumulate(&mut lists, b).push(Value::Int(3));
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].0, b);
        assert_eq!(lists[0].1.len(), 2);
    }
}
