//! Qualified names.
//!
//! A [`QName`] is a namespace URI plus a local name. Its textual form is the
//! Clark notation `{namespace}local`, or just `local` for the empty namespace.

use alloc::string::{String, ToString};
use core::cmp::Ordering;
use core::fmt;

/// Namespace of the schema-instance vocabulary (`xsi`).
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Namespace of the builtin schema types (`xs`).
pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Local names of the elements a map property is written with.
pub(crate) const MAP_ENTRY: &str = "entry";
pub(crate) const MAP_KEY: &str = "key";
pub(crate) const MAP_VALUE: &str = "value";

// -----------------------------------------------------------------------------
// QName

/// A namespace-qualified name.
///
/// Equality, hashing and the derived ordering use `(namespace, local)`.
/// [`QName::canonical_cmp`] provides the attribute order used when
/// canonical attribute output is requested.
///
/// # Examples
///
/// ```
/// use vc_bind::QName;
///
/// let name = QName::new("example.books", "bookstore");
/// assert_eq!(name.to_string(), "{example.books}bookstore");
/// assert_eq!(QName::parse_clark("{example.books}bookstore"), name);
/// assert_eq!(QName::parse_clark("title"), QName::local("title"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QName {
    namespace: String,
    local: String,
}

impl QName {
    /// Creates a name in `namespace`.
    #[inline]
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// Creates a name in the empty namespace.
    #[inline]
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            local: local.into(),
        }
    }

    /// The `xsi:type` attribute carrying a type override.
    #[inline]
    pub fn type_override() -> Self {
        Self::new(XSI_NAMESPACE, "type")
    }

    /// Parses Clark notation, `{ns}local` or `local`.
    ///
    /// A missing closing brace makes the whole text the local name.
    pub fn parse_clark(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix('{')
            && let Some((namespace, local)) = rest.split_once('}')
        {
            return Self::new(namespace, local);
        }
        Self::local(text)
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn local_name(&self) -> &str {
        &self.local
    }

    /// Returns `true` if the namespace is not empty.
    #[inline]
    pub fn is_qualified(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Orders by local name first, then by namespace.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.local
            .cmp(&other.local)
            .then_with(|| self.namespace.cmp(&other.namespace))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

impl From<&str> for QName {
    /// Same as [`QName::parse_clark`].
    #[inline]
    fn from(value: &str) -> Self {
        Self::parse_clark(value)
    }
}

// -----------------------------------------------------------------------------
// Name defaults

/// Lower-cases the first character unless the first two are both upper case.
///
/// `Bookstore` becomes `bookstore`, `URLHolder` stays as is.
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    if let Some(second) = chars.next()
        && first.is_uppercase()
        && second.is_uppercase()
    {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    out.extend(first.to_lowercase());
    out.push_str(&name[first.len_utf8()..]);
    out
}

#[cfg(test)]
mod tests {
    use super::{QName, decapitalize};
    use core::cmp::Ordering;

    #[test]
    fn clark_notation() {
        let name = QName::parse_clark("{urn:a}item");
        assert_eq!(name.namespace(), "urn:a");
        assert_eq!(name.local_name(), "item");
        assert!(name.is_qualified());

        let broken = QName::parse_clark("{urn:a");
        assert_eq!(broken.local_name(), "{urn:a");
        assert!(!broken.is_qualified());
    }

    #[test]
    fn canonical_order_is_local_first() {
        let a = QName::new("urn:z", "a");
        let b = QName::new("urn:a", "b");
        assert_eq!(a.canonical_cmp(&b), Ordering::Less);
        // derived order compares the namespace first
        assert_eq!(a.cmp(&b), Ordering::Greater);
    }

    #[test]
    fn decapitalize_names() {
        assert_eq!(decapitalize("Bookstore"), "bookstore");
        assert_eq!(decapitalize("URLHolder"), "URLHolder");
        assert_eq!(decapitalize("a"), "a");
        assert_eq!(decapitalize(""), "");
    }
}
