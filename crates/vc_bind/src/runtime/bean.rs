use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;
use std::sync::OnceLock;

use crate::QName;
use crate::error::BindError;
use crate::hash::HashMap;
use crate::info::{ClassId, PropertyRef, TypeInfoSet, TypeRef};
use crate::model::PropertyKind;
use crate::nav::{ConstructorDecl, FactoryFn, TypeHandle};
use crate::runtime::accessor::{is_shadowed, view};
use crate::runtime::{Accessor, BindingContext, ContextOptions, Transducer};
use crate::ser::EventSink;
use crate::de::EventSource;
use crate::value::{BindValue, Shape, Value};

// -----------------------------------------------------------------------------
// Property

/// The runtime form of a [`PropertyInfo`](crate::info::PropertyInfo): its
/// mapping facts plus the [`Accessor`] used on instances.
#[derive(Clone, Debug)]
pub struct Property {
    info: PropertyRef,
    owner: &'static str,
    member: &'static str,
    kind: PropertyKind,
    name: Option<QName>,
    wrapper: Option<QName>,
    target: TypeRef,
    key: Option<TypeRef>,
    shape: Shape,
    is_id: bool,
    accessor: Accessor,
}

impl Property {
    fn new(types: &TypeInfoSet, info: PropertyRef) -> Self {
        let property = types.property(info);
        let seed = property.seed();
        Self {
            info,
            owner: types.class(info.class).ty().ident(),
            member: seed.name(),
            kind: property.kind(),
            name: property.name().cloned(),
            wrapper: property.wrapper().cloned(),
            target: property.target(),
            key: property.key(),
            shape: property.shape(),
            is_id: property.is_id(),
            accessor: Accessor::new(seed.access(), seed.name()),
        }
    }

    #[inline]
    pub fn info(&self) -> PropertyRef {
        self.info
    }

    #[inline]
    pub fn member(&self) -> &'static str {
        self.member
    }

    #[inline]
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> Option<&QName> {
        self.name.as_ref()
    }

    #[inline]
    pub fn wrapper(&self) -> Option<&QName> {
        self.wrapper.as_ref()
    }

    #[inline]
    pub fn target(&self) -> TypeRef {
        self.target
    }

    #[inline]
    pub fn key(&self) -> Option<TypeRef> {
        self.key
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn is_list(&self) -> bool {
        self.shape == Shape::List
    }

    #[inline]
    pub fn is_id(&self) -> bool {
        self.is_id
    }

    #[inline]
    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.member)
    }
}

// -----------------------------------------------------------------------------
// PositionMember

/// A member outside the mapping that is set to the
/// [`SourcePosition`](crate::de::SourcePosition) an instance was read from.
#[derive(Clone, Debug)]
pub struct PositionMember {
    class: ClassId,
    owner: &'static str,
    member: &'static str,
    accessor: Accessor,
}

impl PositionMember {
    /// The class declaring the member.
    #[inline]
    pub fn class(&self) -> ClassId {
        self.class
    }

    #[inline]
    pub fn member(&self) -> &'static str {
        self.member
    }

    #[inline]
    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }
}

impl fmt::Display for PositionMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.member)
    }
}

// -----------------------------------------------------------------------------
// Child

/// What a child element of a bean stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Child {
    /// An element, map or list item of the property.
    Property(PropertyRef),
    /// The wrapper element of a list property.
    Wrapper(PropertyRef),
    /// An element whose name selects the class of a reference property's value.
    Reference { prop: PropertyRef, class: ClassId },
}

// -----------------------------------------------------------------------------
// RuntimeBeanInfo

/// Everything needed to marshal and unmarshal instances of one class.
///
/// Created on first use by a [`BindingContext`] and shared for its lifetime.
/// The flattened views ([`attributes`](Self::attributes), [`body`](Self::body))
/// cover the whole base chain, base first, without the properties a subclass
/// shadows. The transducer and the child dispatch table are computed on first
/// request.
pub struct RuntimeBeanInfo {
    class: ClassId,
    ty: TypeHandle,
    base: Option<ClassId>,
    element_name: Option<QName>,
    type_name: Option<QName>,
    immutable: bool,
    has_subclasses: bool,
    properties: Box<[Property]>,
    attributes: Box<[(QName, PropertyRef)]>,
    body: Box<[PropertyRef]>,
    value: Option<PropertyRef>,
    uris: Box<[String]>,
    id: Option<PropertyRef>,
    wildcard: Option<PropertyRef>,
    position: Option<PositionMember>,
    factory: Option<FactoryFn>,
    constructor: Option<Arc<ConstructorDecl>>,
    param_names: Box<[String]>,
    transducer: OnceLock<Option<Transducer>>,
    children: OnceLock<HashMap<QName, Child>>,
}

impl RuntimeBeanInfo {
    pub(crate) fn new(types: &TypeInfoSet, id: ClassId, options: &ContextOptions) -> Self {
        let class = types.class(id);
        let properties = (0..class.properties().len())
            .map(|index| Property::new(types, PropertyRef { class: id, index }))
            .collect();

        let chain: Vec<ClassId> = types.ancestors(id).collect();
        let mut attributes = Vec::new();
        let mut body = Vec::new();
        for &declaring in chain.iter().rev() {
            for (index, info) in types.class(declaring).properties().iter().enumerate() {
                if info.is_hidden_by_override()
                    && is_shadowed(types, id, declaring, info.member_name())
                {
                    continue;
                }
                let prop = PropertyRef {
                    class: declaring,
                    index,
                };
                match info.kind() {
                    PropertyKind::Attribute => {
                        if let Some(name) = info.name() {
                            attributes.push((name.clone(), prop));
                        }
                    }
                    PropertyKind::AttributeWildcard => {}
                    _ => body.push(prop),
                }
            }
        }

        let mut uris: Vec<String> = Vec::new();
        let mut announce = |name: Option<&QName>| {
            if let Some(name) = name
                && name.is_qualified()
                && !uris.iter().any(|uri| uri == name.namespace())
            {
                uris.push(String::from(name.namespace()));
            }
        };
        announce(class.element_name());
        for (name, _) in &attributes {
            announce(Some(name));
        }
        for &prop in &body {
            let info = types.property(prop);
            if info.kind() != PropertyKind::Value {
                announce(info.wrapper());
                announce(info.name());
            }
        }

        if options.canonical_attributes {
            attributes.sort_by(|(a, _), (b, _)| a.canonical_cmp(b));
        }
        let value = body
            .iter()
            .copied()
            .find(|&prop| types.property(prop).kind() == PropertyKind::Value);

        let position = class.position_member().and_then(|declaring| {
            let owner = types.class(declaring);
            let seed = owner.own_position()?;
            Some(PositionMember {
                class: declaring,
                owner: owner.ty().ident(),
                member: seed.name(),
                accessor: Accessor::new(seed.access(), seed.name()),
            })
        });

        log::debug!("bean info of `{}` materialized", class.ty());
        Self {
            class: id,
            ty: class.ty(),
            base: class.base(),
            element_name: class.element_name().cloned(),
            type_name: class.type_name().cloned(),
            immutable: class.is_immutable(),
            has_subclasses: class.has_subclasses(),
            properties,
            attributes: attributes.into_boxed_slice(),
            body: body.into_boxed_slice(),
            value,
            uris: uris.into_boxed_slice(),
            id: class.id_property(),
            wildcard: class.attribute_wildcard(),
            position,
            factory: class.factory().cloned(),
            constructor: class.constructor().cloned(),
            param_names: class.param_names().into(),
            transducer: OnceLock::new(),
            children: OnceLock::new(),
        }
    }

    #[inline]
    pub fn class(&self) -> ClassId {
        self.class
    }

    #[inline]
    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    #[inline]
    pub fn base(&self) -> Option<ClassId> {
        self.base
    }

    #[inline]
    pub fn element_name(&self) -> Option<&QName> {
        self.element_name.as_ref()
    }

    #[inline]
    pub fn type_name(&self) -> Option<&QName> {
        self.type_name.as_ref()
    }

    /// Instances are created by a constructor once all values are read.
    #[inline]
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Some bound class extends this one, so type overrides are honored.
    #[inline]
    pub fn has_subclasses(&self) -> bool {
        self.has_subclasses
    }

    /// The properties this class declares itself.
    #[inline]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Attribute properties of the whole chain with their names, in output order.
    #[inline]
    pub fn attributes(&self) -> &[(QName, PropertyRef)] {
        &self.attributes
    }

    /// Value and element-like properties of the whole chain, base first.
    #[inline]
    pub fn body(&self) -> &[PropertyRef] {
        &self.body
    }

    /// The value property of the chain, if any.
    #[inline]
    pub fn value_property(&self) -> Option<PropertyRef> {
        self.value
    }

    /// Namespaces the properties of this class may write, announced before
    /// the attributes so that a writer can declare them on the start tag.
    #[inline]
    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    #[inline]
    pub fn id_property(&self) -> Option<PropertyRef> {
        self.id
    }

    #[inline]
    pub fn attribute_wildcard(&self) -> Option<PropertyRef> {
        self.wildcard
    }

    /// The member that receives the source position of each instance.
    #[inline]
    pub fn position_member(&self) -> Option<&PositionMember> {
        self.position.as_ref()
    }

    #[inline]
    pub fn factory(&self) -> Option<&FactoryFn> {
        self.factory.as_ref()
    }

    #[inline]
    pub fn constructor(&self) -> Option<&Arc<ConstructorDecl>> {
        self.constructor.as_ref()
    }

    #[inline]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// The text codec of this class, `None` for complex content.
    pub fn transducer(&self, types: &TypeInfoSet) -> Option<&Transducer> {
        self.transducer
            .get_or_init(|| Transducer::for_class(types, self.class))
            .as_ref()
    }

    /// The attribute property named `name`.
    pub fn attribute(&self, name: &QName) -> Option<PropertyRef> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|&(_, prop)| prop)
    }

    pub(crate) fn child(&self, types: &TypeInfoSet, name: &QName) -> Option<Child> {
        self.children
            .get_or_init(|| self.dispatch_table(types))
            .get(name)
            .copied()
    }

    // Later entries win, so a subclass property takes a name from its base.
    fn dispatch_table(&self, types: &TypeInfoSet) -> HashMap<QName, Child> {
        let mut table = HashMap::default();
        for &prop in self.body.iter() {
            let info = types.property(prop);
            if let Some(wrapper) = info.wrapper() {
                table.insert(wrapper.clone(), Child::Wrapper(prop));
                continue;
            }
            match info.kind() {
                PropertyKind::Element | PropertyKind::Map => {
                    if let Some(name) = info.name() {
                        table.insert(name.clone(), Child::Property(prop));
                    }
                }
                PropertyKind::Reference => {
                    for (name, class) in referable(types, prop) {
                        table.insert(name, Child::Reference { prop, class });
                    }
                }
                _ => {}
            }
        }
        log::trace!("dispatch table of `{}`: {} names", self.ty, table.len());
        table
    }

    /// Reads the id of `instance`, an instance of this class or a subclass.
    pub fn id_of(&self, ctx: &BindingContext, instance: &dyn Any) -> Option<String> {
        let id = self.id?;
        let types = ctx.types();
        let runtime = types.class_of((*instance).type_id())?;
        let instance = view(types, runtime, id.class, instance).ok()?;
        let value = ctx.property(id).accessor().get(instance).ok()?;
        match value {
            Value::Nil => None,
            value => String::from_value(value).ok(),
        }
    }

    /// Marshals `instance` as a document whose root is this class.
    pub fn marshal(
        &self,
        ctx: &BindingContext,
        instance: &dyn Any,
        sink: &mut dyn EventSink,
    ) -> Result<(), BindError> {
        ctx.marshal_as(self.class, instance, sink)
    }

    /// Unmarshals a document whose root is this class, whatever its name.
    pub fn unmarshal(
        &self,
        ctx: &BindingContext,
        source: &mut dyn EventSource,
    ) -> Result<Value, BindError> {
        ctx.unmarshal_declared(self.ty, source)
    }
}

/// Element names a reference property accepts, with the class each selects.
///
/// Global elements first, then the ones scoped to the declaring class, so
/// that scoped declarations win.
pub(crate) fn referable(types: &TypeInfoSet, prop: PropertyRef) -> Vec<(QName, ClassId)> {
    let Some(target) = types.property(prop).target().class() else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for scoped in [false, true] {
        for info in types.element_infos() {
            let in_scope = match info.scope() {
                None => !scoped,
                Some(scope) => scoped && scope == prop.class,
            };
            if in_scope
                && let Some(class) = info.content().class()
                && types.is_subclass(class, target)
            {
                names.push((info.name().clone(), class));
            }
        }
    }
    names
}

impl fmt::Debug for RuntimeBeanInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBeanInfo")
            .field("ty", &self.ty)
            .field("element_name", &self.element_name)
            .field("properties", &self.properties)
            .field("immutable", &self.immutable)
            .finish()
    }
}
