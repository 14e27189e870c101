use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId, type_name};
use core::marker::PhantomData;
use core::panic;

use crate::QName;
use crate::error::{AccessorError, ConstructionError};
use crate::hash::HashMap;
use crate::meta::Directive;
use crate::nav::decl::{get_fn, set_fn, upcast_fn, upcast_mut_fn};
use crate::nav::{
    AccessorDecl, BaseDecl, BuildFn, ClassDecl, ComponentDecl, ConstructorDecl, FieldDecl, LeafDecl,
    Navigator, PackageDecl, ParamDecl, TypeHandle,
};
use crate::runtime::Arguments;
use crate::value::{BindValue, Instance, Object, Value};

// -----------------------------------------------------------------------------
// TypeTable

/// A [`Navigator`] over explicitly registered declarations.
///
/// # Examples
///
/// ```
/// use vc_bind::nav::{Navigator, TypeHandle, TypeTable};
/// use vc_bind::{Directive, impl_bind_object};
///
/// #[derive(Clone, Default)]
/// struct Book {
///     title: String,
///     year: u16,
/// }
/// impl_bind_object!(Book);
///
/// let mut table = TypeTable::new();
/// table
///     .class::<Book>()
///     .factory(Book::default)
///     .directive(Directive::root("book"))
///     .field("title", |b| &b.title, |b| &mut b.title)
///     .field("year", |b| &b.year, |b| &mut b.year)
///     .directive(Directive::attribute("year"))
///     .finish();
///
/// let decl = table.class_decl(TypeHandle::of::<Book>()).unwrap();
/// assert_eq!(decl.fields().len(), 2);
/// assert_eq!(decl.fields()[1].directives().len(), 1);
/// ```
#[derive(Default)]
pub struct TypeTable {
    classes: Vec<ClassDecl>,
    class_index: HashMap<TypeId, usize>,
    leaves: HashMap<TypeId, LeafDecl>,
    packages: HashMap<&'static str, PackageDecl>,
    paths: HashMap<&'static str, TypeHandle>,
}

impl TypeTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered classes.
    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Handles of every registered class, in registration order.
    pub fn class_handles(&self) -> Vec<TypeHandle> {
        self.classes.iter().map(ClassDecl::ty).collect()
    }

    /// Starts the declaration of a mutable class.
    ///
    /// A second registration of the same type replaces the first.
    #[track_caller]
    pub fn class<T: Any + Send + Sync>(&mut self) -> ClassBuilder<'_, T> {
        ClassBuilder {
            decl: empty_class::<T>(panic::Location::caller(), false),
            table: self,
            target: Target::Class,
            _marker: PhantomData,
        }
    }

    /// Starts the declaration of a constructor-only class.
    #[track_caller]
    pub fn record<T: Any + Send + Sync>(&mut self) -> RecordBuilder<'_, T> {
        RecordBuilder {
            decl: empty_class::<T>(panic::Location::caller(), true),
            params: Vec::new(),
            build: None,
            table: self,
            target: Target::Class,
            _marker: PhantomData,
        }
    }

    /// Registers `T` as a leaf written with `print` and read with `parse`.
    pub fn leaf<T: BindValue>(
        &mut self,
        type_name: Option<QName>,
        print: fn(&T) -> String,
        parse: fn(&str) -> Result<T, AccessorError>,
    ) -> &mut Self {
        let ty = TypeHandle::of::<T>();
        let decl = LeafDecl {
            ty,
            type_name,
            print: Arc::new(move |value: &Value| {
                let typed = T::from_value(value.clone())?;
                Ok(print(&typed))
            }),
            parse: Arc::new(move |text: &str| parse(text).map(|v| v.to_value())),
        };
        self.paths.insert(ty.path(), ty);
        self.leaves.insert(ty.id(), decl);
        self
    }

    /// Adds package level directives to the module `path`.
    pub fn package(
        &mut self,
        path: &'static str,
        directives: impl IntoIterator<Item = Directive>,
    ) -> &mut Self {
        let package = self.packages.entry(path).or_insert_with(|| PackageDecl {
            path,
            directives: Vec::new(),
        });
        package.directives.extend(directives);
        self
    }

    /// Runs every registration submitted with [`register_types!`](crate::register_types).
    ///
    /// Returns `false` when the `auto_register` feature is disabled.
    pub fn auto_register(&mut self) -> bool {
        #[cfg(feature = "auto_register")]
        {
            for registration in inventory::iter::<TypeRegistration> {
                (registration.register)(self);
            }
            true
        }
        #[cfg(not(feature = "auto_register"))]
        {
            false
        }
    }

    fn insert_class(&mut self, decl: ClassDecl) {
        let ty = decl.ty;
        self.paths.insert(ty.path(), ty);
        match self.class_index.get(&ty.id()) {
            Some(&index) => {
                log::debug!("type `{ty}` registered again, replacing");
                self.classes[index] = decl;
            }
            None => {
                self.class_index.insert(ty.id(), self.classes.len());
                self.classes.push(decl);
            }
        }
    }
}

impl Navigator for TypeTable {
    #[inline]
    fn class_decl(&self, ty: TypeHandle) -> Option<&ClassDecl> {
        let index = *self.class_index.get(&ty.id())?;
        self.classes.get(index)
    }

    #[inline]
    fn leaf_decl(&self, ty: TypeHandle) -> Option<&LeafDecl> {
        self.leaves.get(&ty.id())
    }

    #[inline]
    fn package_decl(&self, path: &str) -> Option<&PackageDecl> {
        self.packages.get(path)
    }

    #[inline]
    fn resolve_path(&self, path: &str) -> Option<TypeHandle> {
        self.paths.get(path).copied()
    }

    fn class_decls(&self) -> Box<dyn Iterator<Item = &ClassDecl> + '_> {
        Box::new(self.classes.iter())
    }
}

fn empty_class<T: Any>(site: &'static panic::Location<'static>, record: bool) -> ClassDecl {
    ClassDecl {
        ty: TypeHandle::of::<T>(),
        base: None,
        fields: Vec::new(),
        accessors: Vec::new(),
        components: Vec::new(),
        factory: None,
        constructor: None,
        record,
        directives: Vec::new(),
        site,
    }
}

fn downcast_error<T>() -> AccessorError {
    AccessorError::Downcast {
        expected: type_name::<T>(),
    }
}

// Where the next `directive` call goes.
#[derive(Clone, Copy)]
enum Target {
    Class,
    Field(usize),
    Accessor(usize),
    Component(usize),
}

fn push_directive(decl: &mut ClassDecl, target: Target, directive: Directive) {
    match target {
        Target::Class => decl.directives.push(directive),
        Target::Field(i) => decl.fields[i].directives.push(directive),
        Target::Accessor(i) => decl.accessors[i].directives.push(directive),
        Target::Component(i) => decl.components[i].directives.push(directive),
    }
}

fn base_decl<T: Any, B: Any>(upcast: fn(&T) -> &B, upcast_mut: fn(&mut T) -> &mut B) -> BaseDecl {
    BaseDecl {
        ty: TypeHandle::of::<B>(),
        upcast: upcast_fn(move |instance: &dyn Any| {
            instance
                .downcast_ref::<T>()
                .map(|derived| upcast(derived) as &dyn Any)
        }),
        upcast_mut: upcast_mut_fn(move |instance: &mut dyn Any| {
            instance
                .downcast_mut::<T>()
                .map(|derived| upcast_mut(derived) as &mut dyn Any)
        }),
    }
}

// -----------------------------------------------------------------------------
// ClassBuilder

/// Declares a mutable class, see [`TypeTable::class`].
#[must_use = "the class is only registered by `finish`"]
pub struct ClassBuilder<'a, T> {
    table: &'a mut TypeTable,
    decl: ClassDecl,
    target: Target,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Any + Send + Sync> ClassBuilder<'a, T> {
    /// Sets how empty instances are created while reading.
    pub fn factory(mut self, factory: fn() -> T) -> Self {
        self.decl.factory = Some(Arc::new(move || Box::new(factory()) as Instance));
        self
    }

    /// Declares `B` as the base class, reachable through the two projections.
    pub fn extends<B: Any>(mut self, upcast: fn(&T) -> &B, upcast_mut: fn(&mut T) -> &mut B) -> Self {
        self.decl.base = Some(base_decl(upcast, upcast_mut));
        self
    }

    /// Declares a field read and written in place.
    #[track_caller]
    pub fn field<V: BindValue>(
        mut self,
        name: &'static str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        self.target = Target::Field(self.decl.fields.len());
        self.decl.fields.push(FieldDecl {
            name,
            declared: V::declared_type(),
            get: get_fn(move |instance: &dyn Any| {
                let instance = instance.downcast_ref::<T>().ok_or_else(downcast_error::<T>)?;
                Ok(get(instance).to_value())
            }),
            set: set_fn(move |instance: &mut dyn Any, value: Value| {
                let instance = instance.downcast_mut::<T>().ok_or_else(downcast_error::<T>)?;
                *get_mut(instance) = V::from_value(value)?;
                Ok(())
            }),
            directives: Vec::new(),
            site: panic::Location::caller(),
        });
        self
    }

    /// Declares a getter/setter pair.
    #[track_caller]
    pub fn accessor<V: BindValue>(
        self,
        name: &'static str,
        get: fn(&T) -> V,
        set: fn(&mut T, V),
    ) -> Self {
        let set = set_fn(move |instance: &mut dyn Any, value: Value| {
            let instance = instance.downcast_mut::<T>().ok_or_else(downcast_error::<T>)?;
            set(instance, V::from_value(value)?);
            Ok(())
        });
        self.push_accessor(name, get, Some(set), panic::Location::caller())
    }

    /// Declares a getter without a setter.
    #[track_caller]
    pub fn getter<V: BindValue>(self, name: &'static str, get: fn(&T) -> V) -> Self {
        self.push_accessor(name, get, None, panic::Location::caller())
    }

    fn push_accessor<V: BindValue>(
        mut self,
        name: &'static str,
        get: fn(&T) -> V,
        set: Option<crate::nav::SetFn>,
        site: &'static panic::Location<'static>,
    ) -> Self {
        self.target = Target::Accessor(self.decl.accessors.len());
        self.decl.accessors.push(AccessorDecl {
            name,
            declared: V::declared_type(),
            get: get_fn(move |instance: &dyn Any| {
                let instance = instance.downcast_ref::<T>().ok_or_else(downcast_error::<T>)?;
                Ok(get(instance).to_value())
            }),
            set,
            directives: Vec::new(),
            site,
        });
        self
    }

    /// Attaches a directive to the member declared last, or to the class
    /// when no member has been declared yet.
    pub fn directive(mut self, directive: Directive) -> Self {
        push_directive(&mut self.decl, self.target, directive);
        self
    }

    /// Attaches a directive to the class.
    pub fn class_directive(mut self, directive: Directive) -> Self {
        self.decl.directives.push(directive);
        self
    }

    /// Registers the class.
    pub fn finish(self) {
        self.table.insert_class(self.decl);
    }
}

// -----------------------------------------------------------------------------
// RecordBuilder

/// Declares a constructor-only class, see [`TypeTable::record`].
///
/// Every component is also a constructor parameter of the same name and type,
/// in declaration order.
///
/// # Examples
///
/// ```
/// use vc_bind::nav::{Navigator, TypeHandle, TypeTable};
/// use vc_bind::impl_bind_object;
///
/// #[derive(Clone)]
/// struct Point { x: i32, y: i32 }
/// impl_bind_object!(Point);
///
/// let mut table = TypeTable::new();
/// table
///     .record::<Point>()
///     .component("x", |p| &p.x)
///     .component("y", |p| &p.y)
///     .constructor(|args| Ok(Point { x: args.next()?, y: args.next()? }))
///     .finish();
///
/// assert!(table.is_record(TypeHandle::of::<Point>()));
/// ```
#[must_use = "the class is only registered by `finish`"]
pub struct RecordBuilder<'a, T> {
    table: &'a mut TypeTable,
    decl: ClassDecl,
    params: Vec<ParamDecl>,
    build: Option<BuildFn>,
    target: Target,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Any + Send + Sync> RecordBuilder<'a, T> {
    /// Declares a component and the constructor parameter of the same name.
    #[track_caller]
    pub fn component<V: BindValue>(mut self, name: &'static str, get: fn(&T) -> &V) -> Self {
        self.target = Target::Component(self.decl.components.len());
        self.decl.components.push(ComponentDecl {
            name,
            declared: V::declared_type(),
            get: get_fn(move |instance: &dyn Any| {
                let instance = instance.downcast_ref::<T>().ok_or_else(downcast_error::<T>)?;
                Ok(get(instance).to_value())
            }),
            directives: Vec::new(),
            site: panic::Location::caller(),
        });
        self.params.push(ParamDecl {
            name,
            declared: V::declared_type(),
            default: V::default_value,
            directives: Vec::new(),
        });
        self
    }

    /// Sets the constructor. Arguments arrive in component order.
    pub fn constructor(mut self, build: fn(&mut Arguments) -> Result<T, ConstructionError>) -> Self {
        self.build = Some(Arc::new(move |args: &mut Arguments| {
            build(args).map(|v| Arc::new(v) as Object)
        }));
        self
    }

    /// Attaches a directive to the component declared last, or to the class
    /// when no component has been declared yet.
    pub fn directive(mut self, directive: Directive) -> Self {
        push_directive(&mut self.decl, self.target, directive);
        self
    }

    /// Attaches a directive to the constructor parameter of the component declared last.
    pub fn param_directive(mut self, directive: Directive) -> Self {
        if let Some(param) = self.params.last_mut() {
            param.directives.push(directive);
        }
        self
    }

    /// Attaches a directive to the class.
    pub fn class_directive(mut self, directive: Directive) -> Self {
        self.decl.directives.push(directive);
        self
    }

    /// Registers the class.
    pub fn finish(mut self) {
        if let Some(build) = self.build {
            self.decl.constructor = Some(Arc::new(ConstructorDecl {
                params: self.params,
                build,
            }));
        }
        self.table.insert_class(self.decl);
    }
}

// -----------------------------------------------------------------------------
// Static registration

/// A registration function collected by [`TypeTable::auto_register`].
#[cfg(feature = "auto_register")]
pub struct TypeRegistration {
    pub register: fn(&mut TypeTable),
}

#[cfg(feature = "auto_register")]
inventory::collect!(TypeRegistration);

/// Submits a `fn(&mut TypeTable)` to be run by [`TypeTable::auto_register`].
///
/// ```
/// use vc_bind::nav::TypeTable;
///
/// fn register(table: &mut TypeTable) {
///     table.package("demo", []);
/// }
///
/// vc_bind::register_types!(register);
/// ```
#[cfg(feature = "auto_register")]
#[macro_export]
macro_rules! register_types {
    ($register:path) => {
        $crate::__macro_exports::inventory::submit! {
            $crate::nav::TypeRegistration { register: $register }
        }
    };
}

impl core::fmt::Debug for TypeTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeTable")
            .field("classes", &self.classes)
            .field("leaves", &self.leaves.values().map(|l| l.ty).collect::<Vec<_>>())
            .field("packages", &self.packages.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::TypeTable;
    use crate::meta::Directive;
    use crate::nav::{Navigator, TypeHandle};
    use crate::value::Value;
    use alloc::string::String;

    #[derive(Clone, Default)]
    struct Shelf {
        label: String,
        slots: u8,
    }
    crate::impl_bind_object!(Shelf);

    #[derive(Clone, Default)]
    struct Cabinet {
        shelf: Shelf,
        doors: u8,
    }
    crate::impl_bind_object!(Cabinet);

    fn table() -> TypeTable {
        let mut table = TypeTable::new();
        table
            .class::<Shelf>()
            .factory(Shelf::default)
            .field("label", |s| &s.label, |s| &mut s.label)
            .directive(Directive::attribute("label"))
            .accessor("slots", |s| s.slots, |s, v| s.slots = v)
            .finish();
        table
            .class::<Cabinet>()
            .factory(Cabinet::default)
            .extends(|c| &c.shelf, |c| &mut c.shelf)
            .getter("doors", |c| c.doors)
            .finish();
        table
    }

    #[test]
    fn members_and_directives() {
        let table = table();
        let shelf = table.class_decl(TypeHandle::of::<Shelf>()).unwrap();
        assert_eq!(shelf.fields()[0].directives(), &[Directive::attribute("label")]);
        assert!(shelf.directives().is_empty());
        assert_eq!(shelf.member("slots").unwrap().name(), "slots");
        assert!(!shelf.accessors()[0].is_read_only());

        let cabinet = table.class_decl(TypeHandle::of::<Cabinet>()).unwrap();
        assert!(cabinet.accessors()[0].is_read_only());
        assert_eq!(
            table.superclass(TypeHandle::of::<Cabinet>()),
            Some(TypeHandle::of::<Shelf>())
        );
        assert!(table.is_subclass(TypeHandle::of::<Cabinet>(), TypeHandle::of::<Shelf>()));
        assert!(!table.is_subclass(TypeHandle::of::<Shelf>(), TypeHandle::of::<Cabinet>()));
    }

    #[test]
    fn erased_access_through_base() {
        let table = table();
        let shelf = table.class_decl(TypeHandle::of::<Shelf>()).unwrap();
        let mut cabinet = Cabinet::default();

        let base = table
            .upcast_mut(TypeHandle::of::<Cabinet>(), &mut cabinet)
            .unwrap();
        (shelf.fields()[0].set)(base, Value::Text("oak".into())).unwrap();
        assert_eq!(cabinet.shelf.label, "oak");

        let base = table.upcast(TypeHandle::of::<Cabinet>(), &cabinet).unwrap();
        let label = (shelf.fields()[0].get)(base).unwrap();
        assert!(matches!(label, Value::Text(ref t) if t == "oak"));

        // wrong instance type
        assert!((shelf.fields()[0].get)(&cabinet).is_err());
    }

    #[test]
    fn paths_resolve() {
        let table = table();
        let handle = TypeHandle::of::<Shelf>();
        assert_eq!(table.resolve_path(handle.path()), Some(handle));
        assert_eq!(table.resolve_path("missing::Type"), None);
        assert_eq!(table.class_handles().len(), 2);
    }
}
