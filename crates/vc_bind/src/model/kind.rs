use core::fmt;

// -----------------------------------------------------------------------------
// PropertyKind

/// How a property is mapped to markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// A named attribute with a leaf value.
    Attribute,
    /// Collects attributes no other property claims.
    AttributeWildcard,
    /// The text content of the element.
    Value,
    /// Child elements named after the runtime value's root element.
    Reference,
    /// A map written as `entry`/`key`/`value` elements.
    Map,
    /// Named child elements.
    Element,
}

impl PropertyKind {
    /// Returns `true` for kinds that produce child elements.
    #[inline]
    pub const fn is_element_like(self) -> bool {
        matches!(self, Self::Element | Self::Reference | Self::Map)
    }

    #[inline]
    pub const fn is_attribute_like(self) -> bool {
        matches!(self, Self::Attribute | Self::AttributeWildcard)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attribute => "attribute",
            Self::AttributeWildcard => "attribute wildcard",
            Self::Value => "value",
            Self::Reference => "element reference",
            Self::Map => "map",
            Self::Element => "element",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
