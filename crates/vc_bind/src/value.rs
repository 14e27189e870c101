//! Type-erased values moved between bound instances and markup.
//!
//! ## Menu
//!
//! - [`Object`]: a shared, type-erased bound instance.
//! - [`Value`]: what accessors read and write.
//! - [`BindValue`]: conversion between a Rust member type and [`Value`],
//!   plus the [`DeclaredType`] the model builder classifies.
//! - [`Poly`]: a member whose runtime class may be any bound subclass of `B`.
//! - [`AttributeMap`]: the target type of attribute wildcards.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::any::{Any, TypeId, type_name};
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

use crate::QName;
use crate::error::AccessorError;
use crate::nav::TypeHandle;

// -----------------------------------------------------------------------------
// Object

/// A finished, shareable bound instance.
pub type Object = Arc<dyn Any + Send + Sync>;

/// An instance still being populated.
pub type Instance = Box<dyn Any + Send + Sync>;

/// The runtime type of the instance behind `object`.
#[inline]
pub fn object_type_id(object: &Object) -> TypeId {
    // Deref twice: the `Arc` itself is `Any` too.
    (**object).type_id()
}

// -----------------------------------------------------------------------------
// AttributeMap

/// Attributes collected by an attribute wildcard, ordered by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeMap(BTreeMap<QName, String>);

impl AttributeMap {
    #[inline]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }
}

impl Deref for AttributeMap {
    type Target = BTreeMap<QName, String>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for AttributeMap {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(QName, String)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (QName, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// -----------------------------------------------------------------------------
// Value

/// A type-erased property value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absent value, `None` or an unset optional member.
    #[default]
    Nil,
    Text(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Object(Object),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Attributes(AttributeMap),
}

impl Value {
    /// Wraps a bound instance.
    #[inline]
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Text(_) => "text",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "signed integer",
            Self::UInt(_) => "unsigned integer",
            Self::Float(_) => "float",
            Self::Object(_) => "object",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Attributes(_) => "attribute map",
        }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    #[inline]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Borrows the instance if this is an object of type `T`.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_object()?.downcast_ref::<T>()
    }

    /// Takes the instance out of an object value, cloning it if it is shared.
    pub fn into_object<T: Any + Clone + Send + Sync>(self) -> Result<T, AccessorError> {
        match self {
            Self::Object(object) => match object.downcast::<T>() {
                Ok(arc) => Ok(Arc::unwrap_or_clone(arc)),
                Err(_) => Err(AccessorError::Downcast {
                    expected: type_name::<T>(),
                }),
            },
            other => Err(AccessorError::Conversion {
                expected: type_name::<T>(),
                found: other.kind_name(),
            }),
        }
    }

    /// Items of a list; `Nil` is empty and anything else is a single item.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Self::List(items) => items,
            Self::Nil => Vec::new(),
            other => vec![other],
        }
    }

    fn mismatch(&self, expected: &'static str) -> AccessorError {
        AccessorError::Conversion {
            expected,
            found: self.kind_name(),
        }
    }
}

// -----------------------------------------------------------------------------
// DeclaredType

/// Collection shape of a declared member type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Single,
    Optional,
    List,
    Map { key: TypeHandle },
}

/// The declared type of a member: item type, shape and full container type.
///
/// For `Vec<Book>` the item is `Book`, the shape is [`Shape::List`] and the
/// container is `Vec<Book>`.
#[derive(Clone, Copy, Debug)]
pub struct DeclaredType {
    item: TypeHandle,
    shape: Shape,
    container: TypeHandle,
}

impl DeclaredType {
    #[inline]
    pub const fn new(item: TypeHandle, shape: Shape, container: TypeHandle) -> Self {
        Self {
            item,
            shape,
            container,
        }
    }

    /// A plain, non-collection `T`.
    #[inline]
    pub fn single<T: 'static>() -> Self {
        let handle = TypeHandle::of::<T>();
        Self::new(handle, Shape::Single, handle)
    }

    #[inline]
    pub const fn item(&self) -> TypeHandle {
        self.item
    }

    #[inline]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub const fn container(&self) -> TypeHandle {
        self.container
    }

    #[inline]
    pub fn is_list(&self) -> bool {
        self.shape == Shape::List
    }

    #[inline]
    pub fn is_map(&self) -> bool {
        matches!(self.shape, Shape::Map { .. })
    }
}

// -----------------------------------------------------------------------------
// BindValue

/// A Rust type that can be stored in a bound member.
///
/// Object types implement it with [`impl_bind_object!`](crate::impl_bind_object).
pub trait BindValue: Sized + Send + Sync + 'static {
    /// The declared type the model builder sees for a member of this type.
    fn declared_type() -> DeclaredType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, AccessorError>;

    /// Value passed to a constructor parameter nothing was read for.
    #[inline]
    fn default_value() -> Value {
        Value::Nil
    }
}

macro_rules! impl_signed {
    ($($ty:ty),*) => {$(
        impl BindValue for $ty {
            #[inline]
            fn declared_type() -> DeclaredType {
                DeclaredType::single::<$ty>()
            }

            #[inline]
            fn to_value(&self) -> Value {
                Value::Int(*self as i64)
            }

            fn from_value(value: Value) -> Result<Self, AccessorError> {
                let out_of_range = |value: &dyn fmt::Display| AccessorError::OutOfRange {
                    value: value.to_string(),
                    target: stringify!($ty),
                };
                match value {
                    Value::Int(v) => <$ty>::try_from(v).map_err(|_| out_of_range(&v)),
                    Value::UInt(v) => <$ty>::try_from(v).map_err(|_| out_of_range(&v)),
                    Value::Text(text) => text.trim().parse().map_err(|_| AccessorError::Parse {
                        text,
                        target: stringify!($ty),
                    }),
                    other => Err(other.mismatch(stringify!($ty))),
                }
            }

            #[inline]
            fn default_value() -> Value {
                Value::Int(0)
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {$(
        impl BindValue for $ty {
            #[inline]
            fn declared_type() -> DeclaredType {
                DeclaredType::single::<$ty>()
            }

            #[inline]
            fn to_value(&self) -> Value {
                Value::UInt(*self as u64)
            }

            fn from_value(value: Value) -> Result<Self, AccessorError> {
                let out_of_range = |value: &dyn fmt::Display| AccessorError::OutOfRange {
                    value: value.to_string(),
                    target: stringify!($ty),
                };
                match value {
                    Value::UInt(v) => <$ty>::try_from(v).map_err(|_| out_of_range(&v)),
                    Value::Int(v) => <$ty>::try_from(v).map_err(|_| out_of_range(&v)),
                    Value::Text(text) => text.trim().parse().map_err(|_| AccessorError::Parse {
                        text,
                        target: stringify!($ty),
                    }),
                    other => Err(other.mismatch(stringify!($ty))),
                }
            }

            #[inline]
            fn default_value() -> Value {
                Value::UInt(0)
            }
        }
    )*};
}

macro_rules! impl_float {
    ($($ty:ty),*) => {$(
        impl BindValue for $ty {
            #[inline]
            fn declared_type() -> DeclaredType {
                DeclaredType::single::<$ty>()
            }

            #[inline]
            fn to_value(&self) -> Value {
                Value::Float(*self as f64)
            }

            fn from_value(value: Value) -> Result<Self, AccessorError> {
                match value {
                    Value::Float(v) => Ok(v as $ty),
                    Value::Int(v) => Ok(v as $ty),
                    Value::UInt(v) => Ok(v as $ty),
                    Value::Text(text) => text.trim().parse().map_err(|_| AccessorError::Parse {
                        text,
                        target: stringify!($ty),
                    }),
                    other => Err(other.mismatch(stringify!($ty))),
                }
            }

            #[inline]
            fn default_value() -> Value {
                Value::Float(0.0)
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);
impl_float!(f32, f64);

impl BindValue for bool {
    #[inline]
    fn declared_type() -> DeclaredType {
        DeclaredType::single::<bool>()
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, AccessorError> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Text(text) => match text.trim() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(AccessorError::Parse {
                    text,
                    target: "bool",
                }),
            },
            other => Err(other.mismatch("bool")),
        }
    }

    #[inline]
    fn default_value() -> Value {
        Value::Bool(false)
    }
}

impl BindValue for String {
    #[inline]
    fn declared_type() -> DeclaredType {
        DeclaredType::single::<String>()
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, AccessorError> {
        match value {
            Value::Text(text) => Ok(text),
            Value::Nil => Ok(String::new()),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::UInt(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            other => Err(other.mismatch("String")),
        }
    }

    #[inline]
    fn default_value() -> Value {
        Value::Text(String::new())
    }
}

impl<T: BindValue> BindValue for Option<T> {
    fn declared_type() -> DeclaredType {
        let inner = T::declared_type();
        let shape = match inner.shape() {
            Shape::Single | Shape::Optional => Shape::Optional,
            other => other,
        };
        DeclaredType::new(inner.item(), shape, TypeHandle::of::<Self>())
    }

    fn to_value(&self) -> Value {
        match self {
            Some(value) => value.to_value(),
            None => Value::Nil,
        }
    }

    fn from_value(value: Value) -> Result<Self, AccessorError> {
        match value {
            Value::Nil => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }
}

impl<T: BindValue> BindValue for Vec<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::new(
            T::declared_type().item(),
            Shape::List,
            TypeHandle::of::<Self>(),
        )
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(BindValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, AccessorError> {
        value.into_items().into_iter().map(T::from_value).collect()
    }

    #[inline]
    fn default_value() -> Value {
        Value::List(Vec::new())
    }
}

impl<K: BindValue + Ord, V: BindValue> BindValue for BTreeMap<K, V> {
    fn declared_type() -> DeclaredType {
        DeclaredType::new(
            V::declared_type().item(),
            Shape::Map {
                key: K::declared_type().item(),
            },
            TypeHandle::of::<Self>(),
        )
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(key, value)| (key.to_value(), value.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self, AccessorError> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| -> Result<(K, V), AccessorError> {
                    Ok((K::from_value(key)?, V::from_value(value)?))
                })
                .collect(),
            Value::Nil => Ok(BTreeMap::new()),
            other => Err(other.mismatch("map")),
        }
    }

    #[inline]
    fn default_value() -> Value {
        Value::Map(Vec::new())
    }
}

impl BindValue for AttributeMap {
    #[inline]
    fn declared_type() -> DeclaredType {
        DeclaredType::single::<AttributeMap>()
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Attributes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, AccessorError> {
        match value {
            Value::Attributes(map) => Ok(map),
            Value::Nil => Ok(AttributeMap::new()),
            other => Err(other.mismatch("attribute map")),
        }
    }

    #[inline]
    fn default_value() -> Value {
        Value::Attributes(AttributeMap::new())
    }
}

// -----------------------------------------------------------------------------
// Poly

/// A member declared as `B` whose runtime class may be any bound subclass of `B`.
///
/// The instance is shared, cloning a `Poly` does not clone the instance.
///
/// # Examples
///
/// ```
/// use vc_bind::Poly;
///
/// #[derive(Clone)]
/// struct Animal { name: String }
/// #[derive(Clone)]
/// struct Dog { base: Animal, good: bool }
///
/// let pet: Poly<Animal> = Poly::new(Dog {
///     base: Animal { name: "Rex".into() },
///     good: true,
/// });
/// assert!(pet.is::<Dog>());
/// assert!(pet.downcast_ref::<Dog>().unwrap().good);
/// ```
pub struct Poly<B: 'static> {
    object: Object,
    _marker: PhantomData<fn() -> B>,
}

impl<B: 'static> Poly<B> {
    #[inline]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_object(Arc::new(value))
    }

    #[inline]
    pub fn from_object(object: Object) -> Self {
        Self {
            object,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn object(&self) -> &Object {
        &self.object
    }

    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        object_type_id(&self.object) == TypeId::of::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }
}

impl<B: 'static> Clone for Poly<B> {
    #[inline]
    fn clone(&self) -> Self {
        Self::from_object(self.object.clone())
    }
}

impl<B: 'static> fmt::Debug for Poly<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Poly").field(&type_name::<B>()).finish()
    }
}

impl<B: 'static> BindValue for Poly<B> {
    #[inline]
    fn declared_type() -> DeclaredType {
        DeclaredType::new(TypeHandle::of::<B>(), Shape::Single, TypeHandle::of::<Self>())
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Object(self.object.clone())
    }

    fn from_value(value: Value) -> Result<Self, AccessorError> {
        match value {
            Value::Object(object) => Ok(Self::from_object(object)),
            other => Err(other.mismatch("object")),
        }
    }
}

/// Implements [`BindValue`] for `Clone` object types.
///
/// # Examples
///
/// ```
/// use vc_bind::{BindValue, Value, impl_bind_object};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Book { title: String }
///
/// impl_bind_object!(Book);
///
/// let book = Book { title: "Dune".into() };
/// let value = book.to_value();
/// assert_eq!(Book::from_value(value).unwrap(), book);
/// ```
#[macro_export]
macro_rules! impl_bind_object {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::BindValue for $ty {
            #[inline]
            fn declared_type() -> $crate::DeclaredType {
                $crate::DeclaredType::single::<Self>()
            }

            #[inline]
            fn to_value(&self) -> $crate::Value {
                $crate::Value::object(::core::clone::Clone::clone(self))
            }

            #[inline]
            fn from_value(
                value: $crate::Value,
            ) -> ::core::result::Result<Self, $crate::AccessorError> {
                value.into_object::<Self>()
            }
        }
    )+};
}

#[cfg(test)]
mod tests {
    use super::{AttributeMap, BindValue, Shape, Value};
    use crate::QName;
    use crate::error::AccessorError;
    use crate::nav::TypeHandle;
    use alloc::collections::BTreeMap;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn integers_check_range() {
        assert_eq!(u8::from_value(Value::Int(255)), Ok(255));
        assert!(matches!(
            u8::from_value(Value::Int(256)),
            Err(AccessorError::OutOfRange { .. })
        ));
        assert!(matches!(
            u32::from_value(Value::Int(-1)),
            Err(AccessorError::OutOfRange { .. })
        ));
        assert_eq!(i32::from_value(Value::Text(" -12 ".into())), Ok(-12));
    }

    #[test]
    fn text_and_bool() {
        assert_eq!(bool::from_value(Value::Text("1".into())), Ok(true));
        assert!(bool::from_value(Value::Text("yes".into())).is_err());
        assert_eq!(String::from_value(Value::Nil), Ok(String::new()));
        assert_eq!(String::from_value(Value::Int(3)), Ok(String::from("3")));
    }

    #[test]
    fn declared_shapes() {
        let list = <Vec<String>>::declared_type();
        assert_eq!(list.shape(), Shape::List);
        assert_eq!(list.item(), TypeHandle::of::<String>());
        assert_eq!(list.container(), TypeHandle::of::<Vec<String>>());

        let optional = <Option<u32>>::declared_type();
        assert_eq!(optional.shape(), Shape::Optional);
        assert_eq!(optional.item(), TypeHandle::of::<u32>());

        let map = <BTreeMap<String, i64>>::declared_type();
        assert_eq!(
            map.shape(),
            Shape::Map {
                key: TypeHandle::of::<String>()
            }
        );
    }

    #[test]
    fn collections_convert() {
        let value = vec![1_u16, 2, 3].to_value();
        assert_eq!(<Vec<u16>>::from_value(value), Ok(vec![1, 2, 3]));
        // a lone item becomes a one-element list
        assert_eq!(<Vec<u16>>::from_value(Value::UInt(7)), Ok(vec![7]));
        assert_eq!(<Vec<u16>>::from_value(Value::Nil), Ok(Vec::new()));

        let mut attributes = AttributeMap::new();
        attributes.insert(QName::local("lang"), "en".into());
        let back = AttributeMap::from_value(attributes.to_value());
        assert_eq!(back, Ok(attributes));
    }

    #[test]
    fn objects_unwrap_or_clone() {
        #[derive(Clone, Debug, PartialEq)]
        struct Shelf(u8);
        crate::impl_bind_object!(Shelf);

        let value = Shelf(4).to_value();
        let shared = value.clone();
        assert_eq!(Shelf::from_value(value), Ok(Shelf(4)));
        assert_eq!(shared.downcast_ref::<Shelf>(), Some(&Shelf(4)));
        assert!(matches!(
            Shelf::from_value(Value::object(1_u8)),
            Err(AccessorError::Downcast { .. })
        ));
    }
}
