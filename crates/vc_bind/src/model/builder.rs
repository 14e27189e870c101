use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::QName;
use crate::de::SourcePosition;
use crate::error::{ErrorCollector, ErrorSink, Location, ModelError, ModelErrorKind};
use crate::hash::HashMap;
use crate::info::{
    ArrayInfo, ClassFlags, ClassId, ClassInfo, LeafCodec, LeafId, LeafInfo, PropertyInfo,
    TypeInfoSet, TypeRef,
};
use crate::meta::{Directive, DirectiveKind, MetadataReader};
use crate::model::{MemberAccess, PropertyKind, PropertySeed};
use crate::name::decapitalize;
use crate::nav::{ClassDecl, Member, Navigator, TypeHandle};
use crate::value::{AttributeMap, Shape};

/// Builds and links the model of `roots` and everything reachable from them.
///
/// Same as [`ModelBuilder::new`] followed by [`ModelBuilder::build`].
pub fn build_model(
    nav: &dyn Navigator,
    reader: &mut dyn MetadataReader,
    roots: &[TypeHandle],
) -> (TypeInfoSet, Vec<ModelError>) {
    ModelBuilder::new(nav, reader).build(roots)
}

// -----------------------------------------------------------------------------
// ModelBuilder

/// Module level settings read from package directives.
#[derive(Clone, Default)]
struct PackageMeta {
    namespace: String,
    element_qualified: bool,
}

/// A package level element declaration waiting for the link phase.
pub(super) struct ElementDeclSeed {
    pub(super) name: QName,
    pub(super) scope: Option<String>,
    pub(super) ty: String,
    pub(super) location: Location,
}

/// Classifies declarations into a [`TypeInfoSet`].
///
/// Classes are built on first request and memoized by type. A class gets
/// its id before its base and properties are looked at, so a type that
/// refers to itself, directly or through others, finds the class being
/// built instead of recursing. Property targets that are classes are left
/// [`TypeRef::Pending`] and queued; [`link`](Self::link) resolves them once
/// every queued class exists.
///
/// # Examples
///
/// ```
/// use vc_bind::meta::InlineReader;
/// use vc_bind::model::ModelBuilder;
/// use vc_bind::nav::{TypeHandle, TypeTable};
/// use vc_bind::impl_bind_object;
///
/// #[derive(Clone, Default)]
/// struct Chain { first: Vec<Chain> }
/// impl_bind_object!(Chain);
///
/// let mut table = TypeTable::new();
/// table
///     .class::<Chain>()
///     .factory(Chain::default)
///     .field("first", |c| &c.first, |c| &mut c.first)
///     .finish();
///
/// let mut reader = InlineReader::new();
/// let mut builder = ModelBuilder::new(&table, &mut reader);
/// let id = builder.class_info(TypeHandle::of::<Chain>()).unwrap();
/// assert_eq!(builder.class_info(TypeHandle::of::<Chain>()), Some(id));
///
/// let (types, errors) = builder.link();
/// assert!(errors.is_empty());
/// assert_eq!(types.classes().len(), 1);
/// ```
pub struct ModelBuilder<'a> {
    nav: &'a dyn Navigator,
    reader: &'a dyn MetadataReader,
    errors: Arc<ErrorCollector>,
    pub(super) set: TypeInfoSet,
    queue: VecDeque<TypeHandle>,
    packages: HashMap<&'static str, PackageMeta>,
    pub(super) element_decls: Vec<ElementDeclSeed>,
}

impl<'a> ModelBuilder<'a> {
    /// Creates a builder and registers its error collector with `reader`.
    pub fn new(nav: &'a dyn Navigator, reader: &'a mut dyn MetadataReader) -> Self {
        let errors = Arc::new(ErrorCollector::new());
        reader.set_error_sink(errors.clone());
        Self {
            nav,
            reader,
            errors,
            set: TypeInfoSet::default(),
            queue: VecDeque::new(),
            packages: HashMap::default(),
            element_decls: Vec::new(),
        }
    }

    /// Number of errors reported so far.
    #[inline]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    #[inline]
    pub(super) fn navigator(&self) -> &'a dyn Navigator {
        self.nav
    }

    #[inline]
    pub(super) fn collector(&self) -> &Arc<ErrorCollector> {
        &self.errors
    }

    fn report(&self, kind: ModelErrorKind, location: Location) {
        self.errors.report_error(ModelError::new(kind, location));
    }

    /// Builds `roots` and everything reachable from them, then links.
    pub fn build(mut self, roots: &[TypeHandle]) -> (TypeInfoSet, Vec<ModelError>) {
        for &root in roots {
            if let TypeRef::Pending(ty) = self.type_ref(root)
                && self.nav.class_decl(ty).is_none()
            {
                self.report(
                    ModelErrorKind::UnresolvedType(String::from(ty.path())),
                    Location::new(format!("root type `{ty}`")),
                );
            }
        }
        self.link()
    }

    /// Builds every class queued as a property target.
    pub(super) fn drain(&mut self) {
        while let Some(ty) = self.queue.pop_front() {
            self.class_info(ty);
        }
    }

    /// The class of `ty`, built on first request.
    ///
    /// Returns `None` if `ty` is not a declared class.
    pub fn class_info(&mut self, ty: TypeHandle) -> Option<ClassId> {
        if let Some(existing) = self.set.by_type.get(&ty.id()) {
            return existing.class();
        }
        let nav = self.nav;
        let decl = nav.class_decl(ty)?;

        let id = ClassId(self.set.classes.len() as u32);
        self.set
            .classes
            .push(ClassInfo::placeholder(id, ty, decl.location()));
        self.set.by_type.insert(ty.id(), TypeRef::Class(id));
        log::debug!("building class `{ty}`");

        self.fill(id, decl);
        Some(id)
    }

    /// What a member of type `ty` points at.
    ///
    /// Leaves are registered immediately. Declared classes are queued and
    /// returned as [`TypeRef::Pending`] until they are built.
    pub fn type_ref(&mut self, ty: TypeHandle) -> TypeRef {
        if let Some(&existing) = self.set.by_type.get(&ty.id()) {
            return existing;
        }
        if ty.is::<AttributeMap>() {
            return TypeRef::Wildcard;
        }

        let id = LeafId(self.set.leaves.len() as u32);
        let leaf = match self.nav.leaf_decl(ty) {
            Some(decl) => Some(LeafInfo {
                id,
                ty,
                type_name: decl
                    .type_name()
                    .cloned()
                    .unwrap_or_else(|| QName::local(decapitalize(ty.ident()))),
                codec: LeafCodec::Custom {
                    print: decl.print.clone(),
                    parse: decl.parse.clone(),
                },
            }),
            None => LeafInfo::builtin(id, ty),
        };
        if let Some(leaf) = leaf {
            self.set.leaves.push(leaf);
            self.set.by_type.insert(ty.id(), TypeRef::Leaf(id));
            return TypeRef::Leaf(id);
        }

        if self.nav.class_decl(ty).is_some() {
            self.queue.push_back(ty);
        }
        TypeRef::Pending(ty)
    }

    fn fill(&mut self, id: ClassId, decl: &'a ClassDecl) {
        let reader = self.reader;
        let ty = decl.ty();
        let class_meta = reader.all_class_metadata(decl);
        let package = self.package(ty.module_path());

        if let Some(base) = decl.base() {
            if decl.is_record() {
                self.report(
                    ModelErrorKind::ImmutableWithBase {
                        class: ty.path(),
                        base: base.ty().path(),
                    },
                    decl.location(),
                );
            } else if let Some(base_id) = self.class_info(base.ty()) {
                let class = &mut self.set.classes[id.index()];
                class.base = Some(base_id);
                class.upcast = Some(base.clone());
            } else {
                log::debug!("base `{}` of `{ty}` is not bound", base.ty());
            }
        }

        let mut element_name = None;
        let mut type_name = Some(QName::new(
            package.namespace.clone(),
            decapitalize(ty.ident()),
        ));
        let mut prop_order: &[String] = &[];
        for directive in class_meta.iter() {
            match directive {
                Directive::RootElement { name, namespace } => {
                    element_name = Some(QName::new(
                        namespace.clone().unwrap_or_else(|| package.namespace.clone()),
                        name.clone().unwrap_or_else(|| decapitalize(ty.ident())),
                    ));
                }
                Directive::Type {
                    name,
                    namespace,
                    prop_order: order,
                } => {
                    type_name = match name.as_deref() {
                        // anonymous type
                        Some("") => None,
                        name => Some(QName::new(
                            namespace.clone().unwrap_or_else(|| package.namespace.clone()),
                            name.map_or_else(|| decapitalize(ty.ident()), String::from),
                        )),
                    };
                    prop_order = order;
                }
                Directive::SeeAlso(paths) => {
                    for path in paths {
                        match self.nav.resolve_path(path) {
                            Some(handle) => {
                                self.type_ref(handle);
                            }
                            None => self.report(
                                ModelErrorKind::UnresolvedType(path.clone()),
                                decl.location(),
                            ),
                        }
                    }
                }
                _ => {}
            }
        }

        let mut param_names = Vec::new();
        match decl.constructor() {
            Some(constructor) => {
                for param in constructor.params() {
                    let name = reader
                        .all_parameter_metadata(decl, param)
                        .iter()
                        .find_map(|d| match d {
                            Directive::Param { name } => Some(name.clone()),
                            _ => None,
                        })
                        .unwrap_or_else(|| String::from(param.name()));
                    param_names.push(name);
                }
            }
            None if decl.is_record() => {
                self.report(ModelErrorKind::MissingConstructor(ty.path()), decl.location());
            }
            None => {}
        }

        let mut properties: Vec<PropertyInfo> = Vec::new();
        let mut own_position = None;
        for member in decl.members() {
            let directives = reader.all_member_metadata(decl, member);
            if directives.iter().any(|d| d.kind() == DirectiveKind::Transient) {
                continue;
            }
            if matches!(member, Member::Component(_)) && !decl.is_record() {
                self.report(
                    ModelErrorKind::ComponentOnMutable {
                        class: ty.path(),
                        member: String::from(member.name()),
                    },
                    member.location(decl),
                );
                continue;
            }
            let seed = PropertySeed::new(decl, member, directives.into_owned());
            if seed.has(DirectiveKind::Location) {
                if own_position.is_none() && is_position_member(&seed) {
                    own_position = Some(seed);
                } else {
                    self.report(
                        ModelErrorKind::InvalidLocation {
                            class: ty.path(),
                            member: String::from(seed.name()),
                        },
                        seed.location().clone(),
                    );
                }
                continue;
            }
            if let Some(property) = self.classify(ty, seed, &properties, &package) {
                properties.push(property);
            }
        }
        let properties = self.apply_prop_order(decl, properties, prop_order);

        let class = &mut self.set.classes[id.index()];
        class.properties = properties;
        class.element_name = element_name;
        class.type_name = type_name;
        class.factory = decl.factory().cloned();
        class.constructor = decl.constructor().cloned();
        class.param_names = param_names;
        class.own_position = own_position;
        if decl.is_record() {
            class.flags |= ClassFlags::IMMUTABLE;
        }
    }

    /// Gives `seed` exactly one [`PropertyKind`].
    ///
    /// Returns `None` when the seed cannot be bound at all.
    fn classify(
        &mut self,
        owner: TypeHandle,
        seed: PropertySeed,
        siblings: &[PropertyInfo],
        package: &PackageMeta,
    ) -> Option<PropertyInfo> {
        let declared = seed.declared_type();
        let member = seed.name();

        let explicit: Vec<DirectiveKind> = DirectiveKind::PROPERTY_KINDS
            .into_iter()
            .filter(|&kind| seed.has(kind))
            .collect();
        let mut kind = match explicit.as_slice() {
            [] if declared.item().is::<AttributeMap>() => PropertyKind::AttributeWildcard,
            [] => PropertyKind::Element,
            [only] => property_kind(*only),
            [first, second, ..] => {
                self.report(
                    ModelErrorKind::ConflictingDirectives {
                        first: *first,
                        second: *second,
                    },
                    seed.location().clone(),
                );
                PropertyKind::Element
            }
        };

        if kind == PropertyKind::Element && declared.is_map() {
            kind = PropertyKind::Map;
        }
        if kind == PropertyKind::Map && !declared.is_map() {
            self.report(
                ModelErrorKind::MapShapeRequired {
                    member: String::from(member),
                },
                seed.location().clone(),
            );
            kind = PropertyKind::Element;
        }
        if kind == PropertyKind::Value && siblings.iter().any(|p| p.kind == PropertyKind::Value) {
            self.report(
                ModelErrorKind::MultipleValueProperties {
                    class: owner.path(),
                    member: String::from(member),
                },
                seed.location().clone(),
            );
            kind = PropertyKind::Element;
        }

        if kind == PropertyKind::AttributeWildcard {
            let is_map = declared.item().is::<AttributeMap>()
                && matches!(declared.shape(), Shape::Single | Shape::Optional);
            if !is_map {
                self.report(
                    ModelErrorKind::WildcardNotMap {
                        member: String::from(member),
                    },
                    seed.location().clone(),
                );
                return None;
            }
            if siblings
                .iter()
                .any(|p| p.kind == PropertyKind::AttributeWildcard)
            {
                self.report(
                    ModelErrorKind::MultipleWildcards {
                        class: owner.path(),
                        member: String::from(member),
                    },
                    seed.location().clone(),
                );
                return None;
            }
            return Some(PropertyInfo::new(seed, kind, TypeRef::Wildcard));
        }
        if declared.item().is::<AttributeMap>() {
            self.report(
                ModelErrorKind::NonLeafTarget {
                    kind: kind.as_str(),
                    member: String::from(member),
                    ty: declared.item().path(),
                },
                seed.location().clone(),
            );
            return None;
        }

        let element_ns = |namespace: &Option<String>| match namespace {
            Some(namespace) => namespace.clone(),
            None if package.element_qualified => package.namespace.clone(),
            None => String::new(),
        };
        let element_name = match seed.read(DirectiveKind::Element) {
            Some(Directive::Element {
                name: Some(name),
                namespace,
            }) => QName::new(element_ns(namespace), name.clone()),
            Some(Directive::Element { namespace, .. }) => QName::new(element_ns(namespace), member),
            _ => QName::new(element_ns(&None), member),
        };
        let name = match (kind, seed.read(DirectiveKind::from(kind))) {
            (PropertyKind::Attribute, Some(Directive::Attribute { name, namespace })) => {
                QName::new(
                    namespace.clone().unwrap_or_default(),
                    name.clone().unwrap_or_else(|| String::from(member)),
                )
            }
            (PropertyKind::Map, Some(Directive::Map { name: Some(name) })) => {
                QName::new(element_ns(&None), name.clone())
            }
            _ => element_name,
        };

        let wrapper = match seed.read(DirectiveKind::ElementWrapper) {
            Some(Directive::ElementWrapper { name, namespace })
                if declared.is_list()
                    && matches!(kind, PropertyKind::Element | PropertyKind::Reference) =>
            {
                Some(QName::new(
                    element_ns(namespace),
                    name.clone().unwrap_or_else(|| String::from(member)),
                ))
            }
            Some(_) => {
                self.report(
                    ModelErrorKind::WrapperOnSingle {
                        member: String::from(member),
                    },
                    seed.location().clone(),
                );
                None
            }
            None => None,
        };

        let target = self.type_ref(declared.item());
        let key = match declared.shape() {
            Shape::Map { key } => Some(self.type_ref(key)),
            _ => None,
        };
        if declared.is_list() {
            self.register_array(declared.container(), target);
        }

        let is_id = seed.has(DirectiveKind::Id);
        let mut info = PropertyInfo::new(seed, kind, target);
        info.name = Some(name);
        info.wrapper = wrapper;
        info.key = key;
        info.is_id = is_id;
        Some(info)
    }

    fn register_array(&mut self, container: TypeHandle, item: TypeRef) {
        if self.set.array_index.contains_key(&container.id()) {
            return;
        }
        self.set
            .array_index
            .insert(container.id(), self.set.arrays.len());
        self.set.arrays.push(ArrayInfo {
            ty: container,
            item,
        });
    }

    /// Moves the properties named by `order` to the front, in that order.
    fn apply_prop_order(
        &self,
        decl: &ClassDecl,
        properties: Vec<PropertyInfo>,
        order: &[String],
    ) -> Vec<PropertyInfo> {
        if order.is_empty() {
            return properties;
        }
        let mut rest: Vec<Option<PropertyInfo>> = properties.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(rest.len());
        for name in order {
            let found = rest
                .iter()
                .position(|p| p.as_ref().is_some_and(|p| p.member_name() == name.as_str()));
            match found {
                Some(index) => ordered.extend(rest[index].take()),
                None => self.report(
                    ModelErrorKind::PropOrderUnknown(name.clone()),
                    decl.location(),
                ),
            }
        }
        for property in rest.into_iter().flatten() {
            // attributes do not take part in the element order
            if !property.kind.is_attribute_like() {
                self.report(
                    ModelErrorKind::PropOrderMissing(String::from(property.member_name())),
                    property.seed.location().clone(),
                );
            }
            ordered.push(property);
        }
        ordered
    }

    /// Settings of the module `path`, read once.
    fn package(&mut self, path: &'static str) -> PackageMeta {
        if let Some(meta) = self.packages.get(path) {
            return meta.clone();
        }
        let mut meta = PackageMeta::default();
        let mut decls = Vec::new();
        if let Some(package) = self.nav.package_decl(path) {
            let location = Location::new(format!("package `{path}`"));
            for directive in self.reader.all_package_metadata(package).iter() {
                match directive {
                    Directive::Schema {
                        namespace,
                        element_qualified,
                    } => {
                        meta.namespace = namespace.clone();
                        meta.element_qualified = *element_qualified;
                    }
                    Directive::ElementDecl {
                        name,
                        namespace,
                        scope,
                        ty,
                    } => decls.push((
                        name.clone(),
                        namespace.clone(),
                        scope.clone(),
                        ty.clone(),
                        location.clone(),
                    )),
                    _ => {}
                }
            }
        }
        self.packages.insert(path, meta.clone());

        for (name, namespace, scope, ty, location) in decls {
            if let Some(handle) = self.nav.resolve_path(&ty) {
                self.type_ref(handle);
            }
            if let Some(handle) = scope.as_deref().and_then(|s| self.nav.resolve_path(s)) {
                self.type_ref(handle);
            }
            self.element_decls.push(ElementDeclSeed {
                name: QName::new(namespace.unwrap_or_else(|| meta.namespace.clone()), name),
                scope,
                ty,
                location,
            });
        }
        meta
    }
}

/// A location member holds one [`SourcePosition`] and can be written.
fn is_position_member(seed: &PropertySeed) -> bool {
    let declared = seed.declared_type();
    let writable = !matches!(seed.access(), MemberAccess::Accessor { set: None, .. });
    writable
        && declared.item().is::<SourcePosition>()
        && matches!(declared.shape(), Shape::Single | Shape::Optional)
}

/// The kind an explicit directive asks for.
fn property_kind(kind: DirectiveKind) -> PropertyKind {
    match kind {
        DirectiveKind::Attribute => PropertyKind::Attribute,
        DirectiveKind::AnyAttribute => PropertyKind::AttributeWildcard,
        DirectiveKind::Value => PropertyKind::Value,
        DirectiveKind::ElementRef => PropertyKind::Reference,
        DirectiveKind::Map => PropertyKind::Map,
        _ => PropertyKind::Element,
    }
}

impl From<PropertyKind> for DirectiveKind {
    fn from(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Attribute => DirectiveKind::Attribute,
            PropertyKind::AttributeWildcard => DirectiveKind::AnyAttribute,
            PropertyKind::Value => DirectiveKind::Value,
            PropertyKind::Reference => DirectiveKind::ElementRef,
            PropertyKind::Map => DirectiveKind::Map,
            PropertyKind::Element => DirectiveKind::Element,
        }
    }
}
