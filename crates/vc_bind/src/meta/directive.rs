use alloc::string::String;
use alloc::vec::Vec;

use crate::nav::TypeHandle;

// -----------------------------------------------------------------------------
// Directive

/// A binding directive attached to a class, member, package or constructor parameter.
///
/// Types are referred to by their full path ([`TypeHandle::path`]) so that
/// directives can also come from an external table.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Directive {
    /// The class can be a document root with this element name.
    RootElement {
        #[cfg_attr(feature = "serde", serde(default))]
        name: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        namespace: Option<String>,
    },
    /// Type name and the order of element properties.
    Type {
        #[cfg_attr(feature = "serde", serde(default))]
        name: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        namespace: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        prop_order: Vec<String>,
    },
    /// Package level: default namespace of the types in a module.
    Schema {
        namespace: String,
        #[cfg_attr(feature = "serde", serde(default))]
        element_qualified: bool,
    },
    /// Package level: a named element bound to `ty`, optionally only inside `scope`.
    ElementDecl {
        name: String,
        #[cfg_attr(feature = "serde", serde(default))]
        namespace: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        scope: Option<String>,
        ty: String,
    },
    /// Classes to bind together with this one.
    SeeAlso(Vec<String>),
    Element {
        #[cfg_attr(feature = "serde", serde(default))]
        name: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        namespace: Option<String>,
    },
    Attribute {
        #[cfg_attr(feature = "serde", serde(default))]
        name: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        namespace: Option<String>,
    },
    /// The member is the text content of the element.
    Value,
    /// The member collects attributes no other property claims.
    AnyAttribute,
    /// The member is written under the root element name of its runtime value.
    ElementRef,
    /// The member is a map written as `entry`/`key`/`value` elements.
    Map {
        #[cfg_attr(feature = "serde", serde(default))]
        name: Option<String>,
    },
    /// A collection member is wrapped in one extra element.
    ElementWrapper {
        #[cfg_attr(feature = "serde", serde(default))]
        name: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        namespace: Option<String>,
    },
    Id,
    /// The member is not bound; it receives the [`SourcePosition`](crate::de::SourcePosition)
    /// of the element an instance was read from.
    Location,
    /// The member is not bound.
    Transient,
    /// Constructor parameter name used when matching staged values.
    Param { name: String },
}

/// Fieldless discriminant of [`Directive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DirectiveKind {
    RootElement,
    Type,
    Schema,
    ElementDecl,
    SeeAlso,
    Element,
    Attribute,
    Value,
    AnyAttribute,
    ElementRef,
    Map,
    ElementWrapper,
    Id,
    Location,
    Transient,
    Param,
}

impl DirectiveKind {
    /// Kinds that decide how a property is mapped, in precedence order.
    pub const PROPERTY_KINDS: [DirectiveKind; 6] = [
        DirectiveKind::Attribute,
        DirectiveKind::AnyAttribute,
        DirectiveKind::Value,
        DirectiveKind::ElementRef,
        DirectiveKind::Map,
        DirectiveKind::Element,
    ];
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Self::RootElement { .. } => DirectiveKind::RootElement,
            Self::Type { .. } => DirectiveKind::Type,
            Self::Schema { .. } => DirectiveKind::Schema,
            Self::ElementDecl { .. } => DirectiveKind::ElementDecl,
            Self::SeeAlso(_) => DirectiveKind::SeeAlso,
            Self::Element { .. } => DirectiveKind::Element,
            Self::Attribute { .. } => DirectiveKind::Attribute,
            Self::Value => DirectiveKind::Value,
            Self::AnyAttribute => DirectiveKind::AnyAttribute,
            Self::ElementRef => DirectiveKind::ElementRef,
            Self::Map { .. } => DirectiveKind::Map,
            Self::ElementWrapper { .. } => DirectiveKind::ElementWrapper,
            Self::Id => DirectiveKind::Id,
            Self::Location => DirectiveKind::Location,
            Self::Transient => DirectiveKind::Transient,
            Self::Param { .. } => DirectiveKind::Param,
        }
    }

    /// `RootElement` with the given local name.
    #[inline]
    pub fn root(name: impl Into<String>) -> Self {
        Self::RootElement {
            name: Some(name.into()),
            namespace: None,
        }
    }

    /// `Element` with the given local name.
    #[inline]
    pub fn element(name: impl Into<String>) -> Self {
        Self::Element {
            name: Some(name.into()),
            namespace: None,
        }
    }

    /// `Attribute` with the given local name.
    #[inline]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute {
            name: Some(name.into()),
            namespace: None,
        }
    }

    /// `ElementWrapper` with the given local name.
    #[inline]
    pub fn wrapper(name: impl Into<String>) -> Self {
        Self::ElementWrapper {
            name: Some(name.into()),
            namespace: None,
        }
    }

    /// `Schema` for a module whose elements are qualified with `namespace`.
    #[inline]
    pub fn qualified_schema(namespace: impl Into<String>) -> Self {
        Self::Schema {
            namespace: namespace.into(),
            element_qualified: true,
        }
    }

    /// `SeeAlso` naming a single class.
    #[inline]
    pub fn see_also(ty: TypeHandle) -> Self {
        Self::SeeAlso(alloc::vec![String::from(ty.path())])
    }

    /// Replaces the namespace of a naming directive, other directives are unchanged.
    pub fn in_namespace(mut self, ns: impl Into<String>) -> Self {
        match &mut self {
            Self::RootElement { namespace, .. }
            | Self::Type { namespace, .. }
            | Self::ElementDecl { namespace, .. }
            | Self::Element { namespace, .. }
            | Self::Attribute { namespace, .. }
            | Self::ElementWrapper { namespace, .. } => *namespace = Some(ns.into()),
            _ => {}
        }
        self
    }
}
