use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;
use core::panic;

use crate::QName;
use crate::error::{AccessorError, ConstructionError, Location};
use crate::meta::Directive;
use crate::nav::TypeHandle;
use crate::runtime::Arguments;
use crate::value::{DeclaredType, Instance, Object, Value};

// -----------------------------------------------------------------------------
// Erased functions

/// Reads a member from an instance of its declaring class.
pub type GetFn = Arc<dyn Fn(&dyn Any) -> Result<Value, AccessorError> + Send + Sync>;

/// Writes a member on an instance of its declaring class.
pub type SetFn = Arc<dyn Fn(&mut dyn Any, Value) -> Result<(), AccessorError> + Send + Sync>;

/// Creates an empty instance of a mutable class.
pub type FactoryFn = Arc<dyn Fn() -> Instance + Send + Sync>;

/// Builds an instance of a constructor-only class from its arguments.
pub type BuildFn = Arc<dyn Fn(&mut Arguments) -> Result<Object, ConstructionError> + Send + Sync>;

/// Views an instance as its base class.
pub type UpcastFn = Arc<dyn Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync>;

/// Views an instance as its base class, mutably.
pub type UpcastMutFn = Arc<dyn Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync>;

/// Prints a leaf value.
pub type PrintFn = Arc<dyn Fn(&Value) -> Result<String, AccessorError> + Send + Sync>;

/// Parses a leaf value.
pub type ParseFn = Arc<dyn Fn(&str) -> Result<Value, AccessorError> + Send + Sync>;

pub(crate) fn get_fn<F>(f: F) -> GetFn
where
    F: Fn(&dyn Any) -> Result<Value, AccessorError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn set_fn<F>(f: F) -> SetFn
where
    F: Fn(&mut dyn Any, Value) -> Result<(), AccessorError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn upcast_fn<F>(f: F) -> UpcastFn
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn upcast_mut_fn<F>(f: F) -> UpcastMutFn
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

// -----------------------------------------------------------------------------
// Members

/// A field read and written in place.
#[derive(Clone)]
pub struct FieldDecl {
    pub(crate) name: &'static str,
    pub(crate) declared: DeclaredType,
    pub(crate) get: GetFn,
    pub(crate) set: SetFn,
    pub(crate) directives: Vec<Directive>,
    pub(crate) site: &'static panic::Location<'static>,
}

/// A getter, optionally paired with a setter.
#[derive(Clone)]
pub struct AccessorDecl {
    pub(crate) name: &'static str,
    pub(crate) declared: DeclaredType,
    pub(crate) get: GetFn,
    pub(crate) set: Option<SetFn>,
    pub(crate) directives: Vec<Directive>,
    pub(crate) site: &'static panic::Location<'static>,
}

/// A read-only component of a constructor-only class.
#[derive(Clone)]
pub struct ComponentDecl {
    pub(crate) name: &'static str,
    pub(crate) declared: DeclaredType,
    pub(crate) get: GetFn,
    pub(crate) directives: Vec<Directive>,
    pub(crate) site: &'static panic::Location<'static>,
}

/// A constructor parameter.
#[derive(Clone)]
pub struct ParamDecl {
    pub(crate) name: &'static str,
    pub(crate) declared: DeclaredType,
    pub(crate) default: fn() -> Value,
    pub(crate) directives: Vec<Directive>,
}

/// The only way to create an instance of a constructor-only class.
pub struct ConstructorDecl {
    pub(crate) params: Vec<ParamDecl>,
    pub(crate) build: BuildFn,
}

/// The bound base class and how to view an instance as it.
#[derive(Clone)]
pub struct BaseDecl {
    pub(crate) ty: TypeHandle,
    pub(crate) upcast: UpcastFn,
    pub(crate) upcast_mut: UpcastMutFn,
}

/// A declared member of any kind.
#[derive(Clone, Copy)]
pub enum Member<'a> {
    Field(&'a FieldDecl),
    Accessor(&'a AccessorDecl),
    Component(&'a ComponentDecl),
}

macro_rules! impl_member_common {
    ($($ty:ty),*) => {$(
        impl $ty {
            #[inline]
            pub fn name(&self) -> &'static str {
                self.name
            }

            #[inline]
            pub fn declared_type(&self) -> DeclaredType {
                self.declared
            }

            #[inline]
            pub fn directives(&self) -> &[Directive] {
                &self.directives
            }
        }
    )*};
}

impl_member_common!(FieldDecl, AccessorDecl, ComponentDecl, ParamDecl);

impl FieldDecl {
    #[inline]
    pub fn site(&self) -> &'static panic::Location<'static> {
        self.site
    }
}

impl AccessorDecl {
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.set.is_none()
    }
}

impl ParamDecl {
    #[inline]
    pub fn default_value(&self) -> Value {
        (self.default)()
    }

    pub fn location(&self, owner: &ClassDecl) -> Location {
        Location::new(format!("parameter `{}`", self.name)).with_upstream(Arc::new(owner.location()))
    }
}

impl ConstructorDecl {
    #[inline]
    pub fn params(&self) -> &[ParamDecl] {
        &self.params
    }
}

impl BaseDecl {
    #[inline]
    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    #[inline]
    pub fn upcast<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.upcast)(instance)
    }

    #[inline]
    pub fn upcast_mut<'a>(&self, instance: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        (self.upcast_mut)(instance)
    }
}

impl<'a> Member<'a> {
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Field(m) => m.name,
            Self::Accessor(m) => m.name,
            Self::Component(m) => m.name,
        }
    }

    #[inline]
    pub fn declared_type(self) -> DeclaredType {
        match self {
            Self::Field(m) => m.declared,
            Self::Accessor(m) => m.declared,
            Self::Component(m) => m.declared,
        }
    }

    #[inline]
    pub fn directives(self) -> &'a [Directive] {
        match self {
            Self::Field(m) => &m.directives,
            Self::Accessor(m) => &m.directives,
            Self::Component(m) => &m.directives,
        }
    }

    #[inline]
    pub fn site(self) -> &'static panic::Location<'static> {
        match self {
            Self::Field(m) => m.site,
            Self::Accessor(m) => m.site,
            Self::Component(m) => m.site,
        }
    }

    /// Where the member was registered, inside `owner`.
    pub fn location(self, owner: &ClassDecl) -> Location {
        Location::new(format!("{}::{}", owner.ty.base_path(), self.name()))
            .with_site(self.site())
            .with_upstream(Arc::new(owner.location()))
    }
}

// -----------------------------------------------------------------------------
// ClassDecl

/// Everything declared about one class.
pub struct ClassDecl {
    pub(crate) ty: TypeHandle,
    pub(crate) base: Option<BaseDecl>,
    pub(crate) fields: Vec<FieldDecl>,
    pub(crate) accessors: Vec<AccessorDecl>,
    pub(crate) components: Vec<ComponentDecl>,
    pub(crate) factory: Option<FactoryFn>,
    pub(crate) constructor: Option<Arc<ConstructorDecl>>,
    pub(crate) record: bool,
    pub(crate) directives: Vec<Directive>,
    pub(crate) site: &'static panic::Location<'static>,
}

impl ClassDecl {
    #[inline]
    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    #[inline]
    pub fn base(&self) -> Option<&BaseDecl> {
        self.base.as_ref()
    }

    #[inline]
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    #[inline]
    pub fn accessors(&self) -> &[AccessorDecl] {
        &self.accessors
    }

    #[inline]
    pub fn components(&self) -> &[ComponentDecl] {
        &self.components
    }

    #[inline]
    pub fn factory(&self) -> Option<&FactoryFn> {
        self.factory.as_ref()
    }

    #[inline]
    pub fn constructor(&self) -> Option<&Arc<ConstructorDecl>> {
        self.constructor.as_ref()
    }

    /// Constructor-only classes have components instead of fields and are
    /// created only once all their values are known.
    #[inline]
    pub fn is_record(&self) -> bool {
        self.record
    }

    #[inline]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    #[inline]
    pub fn site(&self) -> &'static panic::Location<'static> {
        self.site
    }

    /// All members in declaration order: fields, accessor pairs, components.
    pub fn members(&self) -> impl Iterator<Item = Member<'_>> {
        self.fields
            .iter()
            .map(Member::Field)
            .chain(self.accessors.iter().map(Member::Accessor))
            .chain(self.components.iter().map(Member::Component))
    }

    /// Finds a member by name.
    pub fn member(&self, name: &str) -> Option<Member<'_>> {
        self.members().find(|m| m.name() == name)
    }

    /// Where the class was registered.
    pub fn location(&self) -> Location {
        Location::new(self.ty.path()).with_site(self.site)
    }
}

impl fmt::Debug for ClassDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDecl")
            .field("ty", &self.ty)
            .field("base", &self.base.as_ref().map(|b| b.ty))
            .field("members", &self.members().map(Member::name).collect::<Vec<_>>())
            .field("record", &self.record)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// LeafDecl

/// A user type written as text.
#[derive(Clone)]
pub struct LeafDecl {
    pub(crate) ty: TypeHandle,
    pub(crate) type_name: Option<QName>,
    pub(crate) print: PrintFn,
    pub(crate) parse: ParseFn,
}

impl LeafDecl {
    #[inline]
    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    #[inline]
    pub fn type_name(&self) -> Option<&QName> {
        self.type_name.as_ref()
    }
}

// -----------------------------------------------------------------------------
// PackageDecl

/// Directives shared by every type of one module.
#[derive(Clone, Debug, Default)]
pub struct PackageDecl {
    pub(crate) path: &'static str,
    pub(crate) directives: Vec<Directive>,
}

impl PackageDecl {
    /// The module path, as in [`TypeHandle::module_path`].
    #[inline]
    pub fn path(&self) -> &'static str {
        self.path
    }

    #[inline]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }
}
