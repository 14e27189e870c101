use core::any::Any;

use crate::QName;
use crate::error::{AccessorError, BindError, Severity};
use crate::info::{ClassId, TypeRef};
use crate::model::PropertyKind;
use crate::name::{MAP_ENTRY, MAP_KEY, MAP_VALUE};
use crate::runtime::accessor::view;
use crate::runtime::{BindingContext, EventHandler, Property, RuntimeBeanInfo, print_value};
use crate::ser::EventSink;
use crate::value::{Object, Value};

// -----------------------------------------------------------------------------
// Serializer

/// Drives one marshal call: walks an instance through its bean infos and
/// pushes the markup to an [`EventSink`].
///
/// Recoverable problems (a failing accessor, a value without a bound class)
/// go to the [`EventHandler`]; the offending property is skipped when the
/// handler continues. Sink failures always end the call.
pub struct Serializer<'a> {
    ctx: &'a BindingContext,
    sink: &'a mut dyn EventSink,
    handler: &'a mut dyn EventHandler,
}

impl<'a> Serializer<'a> {
    #[inline]
    pub fn new(
        ctx: &'a BindingContext,
        sink: &'a mut dyn EventSink,
        handler: &'a mut dyn EventHandler,
    ) -> Self {
        Self { ctx, sink, handler }
    }

    /// Writes `value` as a document. `value` is an instance of a bound class
    /// or an [`Object`] holding one; `type_name` names it in errors.
    pub fn serialize_root(
        &mut self,
        value: &dyn Any,
        type_name: &'static str,
    ) -> Result<(), BindError> {
        let instance: &dyn Any = match value.downcast_ref::<Object>() {
            Some(object) => &**object,
            None => value,
        };
        match self.ctx.types().class_of((*instance).type_id()) {
            Some(class) => self.serialize_as(class, instance),
            None => self.fail(BindError::UnboundType(type_name)),
        }
    }

    /// Writes `instance` as a document whose root element is the one bound
    /// to `declared`. The instance may belong to a subclass.
    pub fn serialize_as(&mut self, declared: ClassId, instance: &dyn Any) -> Result<(), BindError> {
        let runtime = match self.runtime_class(declared, instance) {
            Ok(runtime) => runtime,
            Err(error) => return self.fail(error),
        };
        let ctx = self.ctx;
        let bean = ctx.bean(declared);
        let Some(name) = bean.element_name() else {
            return self.fail(BindError::NoRootElement(bean.ty().path()));
        };
        log::trace!("marshalling `{}` as `{name}`", bean.ty());
        self.write_object(name, declared, runtime, instance)
    }

    // -------------------------------------------------------------------------
    // Objects

    fn write_object(
        &mut self,
        name: &QName,
        declared: ClassId,
        runtime: ClassId,
        instance: &dyn Any,
    ) -> Result<(), BindError> {
        let ctx = self.ctx;
        let bean = ctx.bean(runtime);
        self.sink.start_element(name)?;
        for uri in bean.uris() {
            self.sink.namespace(uri)?;
        }
        if runtime != declared && ctx.options().emit_type_overrides {
            match bean.type_name() {
                Some(type_name) => self
                    .sink
                    .attribute(&QName::type_override(), &type_name.to_string())?,
                None => self.report(BindError::NoTypeName(bean.ty().path()))?,
            }
        }
        self.write_attributes(name, bean, instance)?;
        self.write_body(bean, instance)?;
        self.sink.end_element(name)?;
        Ok(())
    }

    fn write_attributes(
        &mut self,
        element: &QName,
        bean: &RuntimeBeanInfo,
        instance: &dyn Any,
    ) -> Result<(), BindError> {
        let ctx = self.ctx;
        for (name, prop) in bean.attributes() {
            let property = ctx.property(*prop);
            let Some(value) = self.read(bean, property, instance)? else {
                continue;
            };
            match print_value(ctx, property.target(), property.is_list(), &value, property) {
                Ok(text) => self.sink.attribute(name, &text)?,
                Err(error) => self.report(error)?,
            }
        }
        if let Some(wildcard) = bean.attribute_wildcard() {
            let property = ctx.property(wildcard);
            if let Some(Value::Attributes(map)) = self.read(bean, property, instance)? {
                let marker = QName::type_override();
                for (name, text) in map.iter() {
                    // declared attributes and the type override win over the wildcard
                    let declared = bean.attributes().iter().any(|(declared, _)| declared == name);
                    if declared || *name == marker {
                        self.report(BindError::DuplicateAttribute {
                            name: name.clone(),
                            element: element.clone(),
                        })?;
                        continue;
                    }
                    self.sink.attribute(name, text)?;
                }
            }
        }
        Ok(())
    }

    fn write_body(&mut self, bean: &RuntimeBeanInfo, instance: &dyn Any) -> Result<(), BindError> {
        let ctx = self.ctx;
        for &prop in bean.body() {
            let property = ctx.property(prop);
            let Some(value) = self.read(bean, property, instance)? else {
                continue;
            };
            match property.kind() {
                PropertyKind::Value => {
                    match print_value(ctx, property.target(), property.is_list(), &value, property) {
                        Ok(text) => self.sink.text(&text)?,
                        Err(error) => self.report(error)?,
                    }
                }
                PropertyKind::Element => self.write_element(property, value)?,
                PropertyKind::Reference => self.write_references(property, value)?,
                PropertyKind::Map => self.write_map(property, value)?,
                PropertyKind::Attribute | PropertyKind::AttributeWildcard => {}
            }
        }
        Ok(())
    }

    /// Reads `property` of `instance`; `None` for absent values and for
    /// failures the handler chose to skip.
    fn read(
        &mut self,
        bean: &RuntimeBeanInfo,
        property: &Property,
        instance: &dyn Any,
    ) -> Result<Option<Value>, BindError> {
        let read = view(self.ctx.types(), bean.class(), property.info().class, instance)
            .and_then(|declaring| property.accessor().get(declaring));
        match read {
            Ok(Value::Nil) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(source) => {
                self.report(BindError::accessor(property, source))?;
                Ok(None)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Element-like properties

    fn write_element(&mut self, property: &Property, value: Value) -> Result<(), BindError> {
        let Some(name) = property.name() else {
            return Ok(());
        };
        if !property.is_list() {
            return self.write_item(property, name, property.target(), value);
        }
        if let Some(wrapper) = property.wrapper() {
            self.sink.start_element(wrapper)?;
        }
        for item in value.into_items() {
            self.write_item(property, name, property.target(), item)?;
        }
        if let Some(wrapper) = property.wrapper() {
            self.sink.end_element(wrapper)?;
        }
        Ok(())
    }

    fn write_item(
        &mut self,
        property: &Property,
        name: &QName,
        target: TypeRef,
        item: Value,
    ) -> Result<(), BindError> {
        let ctx = self.ctx;
        match (target, item) {
            (_, Value::Nil) => Ok(()),
            (TypeRef::Class(declared), Value::Object(object))
                if ctx.bean(declared).transducer(ctx.types()).is_none() =>
            {
                match self.runtime_class(declared, &*object) {
                    Ok(runtime) => self.write_object(name, declared, runtime, &*object),
                    Err(error) => self.report(error),
                }
            }
            (target, item) => match print_value(ctx, target, false, &item, property) {
                Ok(text) => {
                    self.sink.start_element(name)?;
                    self.sink.text(&text)?;
                    self.sink.end_element(name)?;
                    Ok(())
                }
                Err(error) => self.report(error),
            },
        }
    }

    /// Every value goes under its own class's root element name.
    fn write_references(&mut self, property: &Property, value: Value) -> Result<(), BindError> {
        let wrapper = property.wrapper().filter(|_| property.is_list());
        if let Some(wrapper) = wrapper {
            self.sink.start_element(wrapper)?;
        }
        for item in value.into_items() {
            self.write_reference(property, item)?;
        }
        if let Some(wrapper) = wrapper {
            self.sink.end_element(wrapper)?;
        }
        Ok(())
    }

    fn write_reference(&mut self, property: &Property, item: Value) -> Result<(), BindError> {
        let ctx = self.ctx;
        let types = ctx.types();
        let declared = property.target().class();
        let object = match item {
            Value::Nil => return Ok(()),
            Value::Object(object) => object,
            _ => {
                return self.report(BindError::UnboundValue {
                    declared: declared.map_or("reference", |id| types.class(id).ty().path()),
                });
            }
        };
        let runtime = match declared {
            Some(declared) => self.runtime_class(declared, &*object),
            None => types
                .class_of((*object).type_id())
                .ok_or(BindError::UnboundValue {
                    declared: "reference",
                }),
        };
        let runtime = match runtime {
            Ok(runtime) => runtime,
            Err(error) => return self.report(error),
        };
        let bean = ctx.bean(runtime);
        match bean.element_name() {
            Some(name) => self.write_object(name, runtime, runtime, &*object),
            None => self.report(BindError::NoRootElement(bean.ty().path())),
        }
    }

    fn write_map(&mut self, property: &Property, value: Value) -> Result<(), BindError> {
        let Some(name) = property.name() else {
            return Ok(());
        };
        let entries = match value {
            Value::Map(entries) => entries,
            other => {
                return self.report(BindError::accessor(
                    property,
                    AccessorError::Conversion {
                        expected: "map",
                        found: other.kind_name(),
                    },
                ));
            }
        };
        let (entry, key, value_name) = (
            QName::local(MAP_ENTRY),
            QName::local(MAP_KEY),
            QName::local(MAP_VALUE),
        );
        let key_target = property.key().unwrap_or(TypeRef::Wildcard);
        self.sink.start_element(name)?;
        for (k, v) in entries {
            self.sink.start_element(&entry)?;
            self.write_item(property, &key, key_target, k)?;
            self.write_item(property, &value_name, property.target(), v)?;
            self.sink.end_element(&entry)?;
        }
        self.sink.end_element(name)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Errors

    fn runtime_class(&self, declared: ClassId, instance: &dyn Any) -> Result<ClassId, BindError> {
        let types = self.ctx.types();
        match types.class_of((*instance).type_id()) {
            Some(runtime) if types.is_subclass(runtime, declared) => Ok(runtime),
            Some(runtime) => Err(BindError::NotSubclass {
                value: types.class(runtime).ty().path(),
                declared: types.class(declared).ty().path(),
            }),
            None => Err(BindError::UnboundValue {
                declared: types.class(declared).ty().path(),
            }),
        }
    }

    /// Passes a recoverable error to the handler; `Err` if the call stops.
    fn report(&mut self, error: BindError) -> Result<(), BindError> {
        if error.severity() < Severity::Fatal && self.handler.handle_event(&error) {
            return Ok(());
        }
        Err(error)
    }

    /// Reports an error the call cannot go on after.
    fn fail(&mut self, error: BindError) -> Result<(), BindError> {
        if error.severity() < Severity::Fatal {
            self.handler.handle_event(&error);
        }
        Err(error)
    }
}
