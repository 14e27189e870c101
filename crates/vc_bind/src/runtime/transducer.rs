use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{AccessorError, BindError, ConstructionError};
use crate::info::{ClassId, LeafCodec, PropertyRef, TypeInfoSet, TypeRef};
use crate::runtime::accessor::{view, view_mut};
use crate::runtime::{BindingContext, ConstructionStager};
use crate::value::{Shape, Value, object_type_id};

// -----------------------------------------------------------------------------
// Transducer

/// Converts a simple-content type to and from text.
///
/// Exists for leaves and for classes whose whole representation is the text
/// of one value property. See [`TypeInfoSet::simple_content`] for the exact
/// condition; a class that fails it simply has no transducer.
#[derive(Clone, Debug)]
pub enum Transducer {
    Leaf(LeafCodec),
    Class {
        class: ClassId,
        value: PropertyRef,
        codec: LeafCodec,
        list: bool,
    },
}

impl Transducer {
    /// The transducer of the class `id`, if it is simple content.
    pub fn for_class(types: &TypeInfoSet, id: ClassId) -> Option<Self> {
        let value = types.simple_content(id)?;
        let property = types.property(value);
        let leaf = property.target().leaf()?;
        Some(Self::Class {
            class: id,
            value,
            codec: types.leaf(leaf).codec().clone(),
            list: property.shape() == Shape::List,
        })
    }

    /// The transducer of whatever `target` points at.
    pub fn for_target(ctx: &BindingContext, target: TypeRef) -> Option<Self> {
        match target {
            TypeRef::Leaf(id) => Some(Self::Leaf(ctx.types().leaf(id).codec().clone())),
            TypeRef::Class(id) => ctx.bean(id).transducer(ctx.types()).cloned(),
            TypeRef::Pending(_) | TypeRef::Wildcard => None,
        }
    }

    pub fn print(&self, ctx: &BindingContext, value: &Value) -> Result<String, BindError> {
        match self {
            Self::Leaf(codec) => codec
                .print(value)
                .map_err(|source| BindError::accessor("text", source)),
            Self::Class {
                class,
                value: prop,
                codec,
                list,
            } => {
                let object = value.as_object().ok_or_else(|| {
                    BindError::accessor(
                        "text",
                        AccessorError::Conversion {
                            expected: "object",
                            found: value.kind_name(),
                        },
                    )
                })?;
                let types = ctx.types();
                let runtime = types
                    .class_of(object_type_id(object))
                    .filter(|&runtime| types.is_subclass(runtime, *class))
                    .ok_or(BindError::UnboundValue {
                        declared: types.class(*class).ty().path(),
                    })?;
                let property = ctx.property(*prop);
                let inner = view(types, runtime, prop.class, &**object)
                    .and_then(|instance| property.accessor().get(instance))
                    .map_err(|source| BindError::accessor(property, source))?;
                print_text(codec, *list, &inner).map_err(|source| BindError::accessor(property, source))
            }
        }
    }

    pub fn parse(&self, ctx: &BindingContext, text: &str) -> Result<Value, BindError> {
        match self {
            Self::Leaf(codec) => codec
                .parse(text)
                .map_err(|source| BindError::accessor("text", source)),
            Self::Class {
                class,
                value: prop,
                codec,
                list,
            } => {
                let property = ctx.property(*prop);
                let inner =
                    parse_text(codec, *list, text).map_err(|source| BindError::accessor(property, source))?;
                let bean = ctx.bean(*class);
                let types = ctx.types();
                if let Some(key) = property.accessor().staging_key() {
                    let constructor = bean
                        .constructor()
                        .ok_or(ConstructionError::NoFactory(bean.ty().path()))?;
                    let mut stager = ConstructionStager::new();
                    stager.stage(key, inner);
                    let object = stager.build(bean.ty(), bean.param_names(), constructor)?;
                    return Ok(Value::Object(object));
                }
                let factory = bean
                    .factory()
                    .ok_or(ConstructionError::NoFactory(bean.ty().path()))?;
                let mut instance = factory();
                view_mut(types, *class, prop.class, &mut *instance)
                    .and_then(|target| property.accessor().set(target, inner))
                    .map_err(|source| BindError::accessor(property, source))?;
                Ok(Value::Object(Arc::from(instance)))
            }
        }
    }
}

fn no_text_form(ctx: &BindingContext, target: TypeRef) -> AccessorError {
    AccessorError::NoTextForm(match target {
        TypeRef::Class(id) => ctx.types().class(id).ty().path(),
        TypeRef::Pending(ty) => ty.path(),
        TypeRef::Leaf(_) | TypeRef::Wildcard => "attribute map",
    })
}

/// Prints `value`, a value of `target`, for an attribute or text content.
///
/// Accessor errors are reported against `owner`.
pub(crate) fn print_value(
    ctx: &BindingContext,
    target: TypeRef,
    list: bool,
    value: &Value,
    owner: &dyn fmt::Display,
) -> Result<String, BindError> {
    let one = |item: &Value| match target {
        TypeRef::Leaf(id) => ctx
            .leaf_codec(id)
            .print(item)
            .map_err(|source| BindError::accessor(owner, source)),
        TypeRef::Class(id) => match ctx.bean(id).transducer(ctx.types()) {
            Some(transducer) => transducer.print(ctx, item),
            None => Err(BindError::accessor(owner, no_text_form(ctx, target))),
        },
        TypeRef::Pending(_) | TypeRef::Wildcard => {
            Err(BindError::accessor(owner, no_text_form(ctx, target)))
        }
    };
    match value {
        Value::List(items) if list => {
            let mut text = String::new();
            for item in items {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&one(item)?);
            }
            Ok(text)
        }
        value => one(value),
    }
}

/// Parses text read for an attribute or text content into a value of `target`.
pub(crate) fn parse_value(
    ctx: &BindingContext,
    target: TypeRef,
    list: bool,
    text: &str,
    owner: &dyn fmt::Display,
) -> Result<Value, BindError> {
    let one = |item: &str| match target {
        TypeRef::Leaf(id) => ctx
            .leaf_codec(id)
            .parse(item)
            .map_err(|source| BindError::accessor(owner, source)),
        TypeRef::Class(id) => match ctx.bean(id).transducer(ctx.types()) {
            Some(transducer) => transducer.parse(ctx, item),
            None => Err(BindError::accessor(owner, no_text_form(ctx, target))),
        },
        TypeRef::Pending(_) | TypeRef::Wildcard => {
            Err(BindError::accessor(owner, no_text_form(ctx, target)))
        }
    };
    if list {
        return text
            .split_whitespace()
            .map(one)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List);
    }
    one(text)
}

/// Prints a leaf value; lists become whitespace separated items.
fn print_text(codec: &LeafCodec, list: bool, value: &Value) -> Result<String, AccessorError> {
    match value {
        Value::List(items) if list => {
            let mut text = String::new();
            for item in items {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&codec.print(item)?);
            }
            Ok(text)
        }
        value => codec.print(value),
    }
}

/// Parses a leaf value; lists are split on whitespace.
fn parse_text(codec: &LeafCodec, list: bool, text: &str) -> Result<Value, AccessorError> {
    if list {
        let items = text
            .split_whitespace()
            .map(|item| codec.parse(item))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::List(items));
    }
    codec.parse(text)
}

#[cfg(test)]
mod tests {
    use super::{parse_text, print_text};
    use crate::info::LeafCodec;
    use crate::value::Value;
    use alloc::vec;

    #[test]
    fn lists_are_whitespace_separated() {
        let value = Value::List(vec![Value::Int(1), Value::Int(-2), Value::Int(30)]);
        assert_eq!(print_text(&LeafCodec::Int, true, &value).unwrap(), "1 -2 30");

        let parsed = parse_text(&LeafCodec::Int, true, " 1\n -2\t30 ").unwrap();
        assert!(matches!(parsed, Value::List(ref items) if items.len() == 3));
        assert!(parse_text(&LeafCodec::Int, true, "1 x").is_err());
    }

    #[test]
    fn single_values_are_left_alone() {
        assert!(matches!(
            parse_text(&LeafCodec::Text, false, "a b"),
            Ok(Value::Text(ref t)) if t == "a b"
        ));
        assert!(print_text(&LeafCodec::Bool, false, &Value::Bool(true)).is_ok());
    }
}
