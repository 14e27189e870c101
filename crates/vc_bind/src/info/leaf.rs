use alloc::string::{String, ToString};
use core::fmt;

use crate::QName;
use crate::error::AccessorError;
use crate::info::LeafId;
use crate::name::XS_NAMESPACE;
use crate::nav::{ParseFn, PrintFn, TypeHandle};
use crate::value::Value;

// -----------------------------------------------------------------------------
// LeafCodec

/// Converts a leaf value to and from text.
#[derive(Clone)]
pub enum LeafCodec {
    Text,
    Bool,
    Int,
    UInt,
    Float,
    Custom { print: PrintFn, parse: ParseFn },
}

impl LeafCodec {
    /// The codec and schema type name of a builtin leaf type.
    pub fn builtin(ty: TypeHandle) -> Option<(Self, &'static str)> {
        macro_rules! table {
            ($($t:ty => $codec:ident, $name:literal;)*) => {
                $(if ty.is::<$t>() {
                    return Some((Self::$codec, $name));
                })*
            };
        }
        table! {
            String => Text, "string";
            bool => Bool, "boolean";
            i8 => Int, "byte";
            i16 => Int, "short";
            i32 => Int, "int";
            i64 => Int, "long";
            isize => Int, "long";
            u8 => UInt, "unsignedByte";
            u16 => UInt, "unsignedShort";
            u32 => UInt, "unsignedInt";
            u64 => UInt, "unsignedLong";
            usize => UInt, "unsignedLong";
            f32 => Float, "float";
            f64 => Float, "double";
        }
        None
    }

    pub fn print(&self, value: &Value) -> Result<String, AccessorError> {
        if let Self::Custom { print, .. } = self {
            return print(value);
        }
        match value {
            Value::Text(text) => Ok(text.clone()),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::UInt(v) => Ok(v.to_string()),
            Value::Float(v) if v.is_nan() => Ok(String::from("NaN")),
            Value::Float(v) if v.is_infinite() => {
                Ok(String::from(if *v > 0.0 { "INF" } else { "-INF" }))
            }
            Value::Float(v) => Ok(v.to_string()),
            other => Err(AccessorError::Conversion {
                expected: "leaf value",
                found: other.kind_name(),
            }),
        }
    }

    pub fn parse(&self, text: &str) -> Result<Value, AccessorError> {
        let parse_error = |target: &'static str| AccessorError::Parse {
            text: text.to_string(),
            target,
        };
        match self {
            Self::Custom { parse, .. } => parse(text),
            Self::Text => Ok(Value::Text(text.to_string())),
            Self::Bool => match text.trim() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(parse_error("boolean")),
            },
            Self::Int => text
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| parse_error("integer")),
            Self::UInt => text
                .trim()
                .parse()
                .map(Value::UInt)
                .map_err(|_| parse_error("unsigned integer")),
            Self::Float => match text.trim() {
                "INF" => Ok(Value::Float(f64::INFINITY)),
                "-INF" => Ok(Value::Float(f64::NEG_INFINITY)),
                "NaN" => Ok(Value::Float(f64::NAN)),
                other => other
                    .parse()
                    .map(Value::Float)
                    .map_err(|_| parse_error("float")),
            },
        }
    }

    /// Returns `true` for the plain string codec.
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

impl fmt::Debug for LeafCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("Text"),
            Self::Bool => f.write_str("Bool"),
            Self::Int => f.write_str("Int"),
            Self::UInt => f.write_str("UInt"),
            Self::Float => f.write_str("Float"),
            Self::Custom { .. } => f.write_str("Custom"),
        }
    }
}

// -----------------------------------------------------------------------------
// LeafInfo

/// A type written as text: a builtin or a registered leaf.
#[derive(Clone, Debug)]
pub struct LeafInfo {
    pub(crate) id: LeafId,
    pub(crate) ty: TypeHandle,
    pub(crate) type_name: QName,
    pub(crate) codec: LeafCodec,
}

impl LeafInfo {
    pub(crate) fn builtin(id: LeafId, ty: TypeHandle) -> Option<Self> {
        let (codec, local) = LeafCodec::builtin(ty)?;
        Some(Self {
            id,
            ty,
            type_name: QName::new(XS_NAMESPACE, local),
            codec,
        })
    }

    #[inline]
    pub fn id(&self) -> LeafId {
        self.id
    }

    #[inline]
    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    #[inline]
    pub fn type_name(&self) -> &QName {
        &self.type_name
    }

    #[inline]
    pub fn codec(&self) -> &LeafCodec {
        &self.codec
    }
}
