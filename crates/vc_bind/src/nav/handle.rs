use core::any::{TypeId, type_name};
use core::fmt;
use core::hash::{Hash, Hasher};

// -----------------------------------------------------------------------------
// TypeHandle

/// Identity of a Rust type known to the binding layer.
///
/// Equality and hashing only use the [`TypeId`]; the path is kept for
/// diagnostics, default names and external metadata lookups.
///
/// # Examples
///
/// ```
/// use vc_bind::nav::TypeHandle;
///
/// let handle = TypeHandle::of::<Vec<String>>();
/// assert_eq!(handle.ident(), "Vec");
/// assert_eq!(handle.module_path(), "alloc::vec");
/// ```
#[derive(Clone, Copy)]
pub struct TypeHandle {
    id: TypeId,
    path: &'static str,
}

impl TypeHandle {
    /// Returns the handle of `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            path: type_name::<T>(),
        }
    }

    #[inline]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Full type path as reported by [`type_name`], generics included.
    #[inline]
    pub const fn path(&self) -> &'static str {
        self.path
    }

    /// The path without generic arguments.
    pub fn base_path(&self) -> &'static str {
        match self.path.find('<') {
            Some(index) => &self.path[..index],
            None => self.path,
        }
    }

    /// The module part of [`base_path`](Self::base_path), empty for
    /// types declared at a crate root without a module.
    pub fn module_path(&self) -> &'static str {
        let base = self.base_path();
        match base.rfind("::") {
            Some(index) => &base[..index],
            None => "",
        }
    }

    /// The simple type name.
    pub fn ident(&self) -> &'static str {
        let base = self.base_path();
        match base.rfind("::") {
            Some(index) => &base[index + 2..],
            None => base,
        }
    }

    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeHandle {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path)
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path)
    }
}
