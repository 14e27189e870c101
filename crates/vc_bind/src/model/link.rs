use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{ErrorSink, Location, ModelError, ModelErrorKind};
use crate::hash::HashSet;
use crate::info::{
    ClassFlags, ClassId, ElementInfo, LeafInfo, PropertyInfo, PropertyRef, TypeInfoSet, TypeRef,
};
use crate::model::PropertyKind;
use crate::model::builder::{ElementDeclSeed, ModelBuilder};
use crate::nav::Navigator;
use crate::value::Shape;

impl ModelBuilder<'_> {
    /// Resolves forward references, checks everything that needs the whole
    /// model, computes inherited facts and freezes the result.
    ///
    /// Returns the model together with every error reported since the
    /// builder was created.
    pub fn link(mut self) -> (TypeInfoSet, Vec<ModelError>) {
        self.drain();
        let nav = self.navigator();
        let errors = self.collector().clone();
        let element_decls = core::mem::take(&mut self.element_decls);
        let mut linker = Linker {
            set: core::mem::take(&mut self.set),
            sink: &*errors,
            nav,
        };

        linker.resolve_pending();
        linker.cut_cyclic_bases();
        let order = linker.depth_order();
        linker.check_targets();
        linker.check_chains(&order);
        linker.remove_dropped();
        linker.inherit(&order);
        if linker.check_attribute_targets() {
            // demoted attributes are elements now and may meet a value property
            linker.check_chains(&order);
            linker.remove_dropped();
            linker.inherit(&order);
        }
        linker.mark_overrides();
        linker.register_elements(element_decls);
        linker.register_type_names();

        log::debug!(
            "model linked: {} classes, {} leaves, {} elements",
            linker.set.classes.len(),
            linker.set.leaves.len(),
            linker.set.element_infos.len(),
        );
        (linker.set, errors.take())
    }
}

// -----------------------------------------------------------------------------
// Linker

struct Linker<'s> {
    set: TypeInfoSet,
    sink: &'s dyn ErrorSink,
    nav: &'s dyn Navigator,
}

impl Linker<'_> {
    fn report(&self, kind: ModelErrorKind, location: &Location) {
        self.sink.report_error(ModelError::new(kind, location.clone()));
    }

    fn class_ids(&self) -> impl Iterator<Item = ClassId> + use<> {
        (0..self.set.classes.len() as u32).map(ClassId)
    }

    fn resolve_pending(&mut self) {
        let mut unresolved = Vec::new();
        for class in &mut self.set.classes {
            for property in &mut class.properties {
                if let TypeRef::Pending(ty) = property.target {
                    match self.set.by_type.get(&ty.id()) {
                        Some(&resolved) => property.target = resolved,
                        None => {
                            property.dropped = true;
                            unresolved.push((ty, property.seed.location().clone()));
                        }
                    }
                }
                if let Some(TypeRef::Pending(ty)) = property.key {
                    match self.set.by_type.get(&ty.id()) {
                        Some(&resolved) => property.key = Some(resolved),
                        None => {
                            property.dropped = true;
                            unresolved.push((ty, property.seed.location().clone()));
                        }
                    }
                }
            }
        }
        for (ty, location) in unresolved {
            self.report(ModelErrorKind::UnresolvedType(String::from(ty.path())), &location);
        }

        let by_type = &self.set.by_type;
        self.set.arrays.retain_mut(|array| match array.item {
            TypeRef::Pending(ty) => match by_type.get(&ty.id()) {
                Some(&resolved) => {
                    array.item = resolved;
                    true
                }
                None => false,
            },
            _ => true,
        });
        self.set.array_index = self
            .set
            .arrays
            .iter()
            .enumerate()
            .map(|(index, array)| (array.ty.id(), index))
            .collect();
    }

    /// Removes the base link of every class that is its own ancestor.
    fn cut_cyclic_bases(&mut self) {
        for id in self.class_ids() {
            let mut visited = HashSet::default();
            visited.insert(id);
            let mut current = self.set.class(id).base;
            while let Some(ancestor) = current {
                if ancestor == id {
                    let class = &mut self.set.classes[id.index()];
                    class.base = None;
                    class.upcast = None;
                    let path = class.ty.path();
                    let location = class.location.clone();
                    self.report(ModelErrorKind::CyclicBase(path), &location);
                    break;
                }
                if !visited.insert(ancestor) {
                    break;
                }
                current = self.set.class(ancestor).base;
            }
        }
    }

    /// Class ids sorted so that every base comes before its subclasses.
    fn depth_order(&self) -> Vec<ClassId> {
        let mut order: Vec<ClassId> = self.class_ids().collect();
        order.sort_by_key(|&id| self.set.ancestors(id).count());
        order
    }

    /// Per-property checks that only need the resolved targets.
    fn check_targets(&mut self) {
        let mut reports = Vec::new();
        for class in &mut self.set.classes {
            for property in &mut class.properties {
                if property.dropped {
                    continue;
                }
                let member = String::from(property.member_name());
                let declared = property.seed.declared_type();
                match property.kind {
                    PropertyKind::Value | PropertyKind::Attribute
                        if matches!(declared.shape(), Shape::Map { .. }) =>
                    {
                        reports.push((
                            ModelErrorKind::NonLeafTarget {
                                kind: property.kind.as_str(),
                                member,
                                ty: declared.container().path(),
                            },
                            property.seed.location().clone(),
                        ));
                        property.kind = PropertyKind::Map;
                    }
                    PropertyKind::Value if !matches!(property.target, TypeRef::Leaf(_)) => {
                        reports.push((
                            ModelErrorKind::NonLeafTarget {
                                kind: property.kind.as_str(),
                                member,
                                ty: declared.item().path(),
                            },
                            property.seed.location().clone(),
                        ));
                        property.kind = PropertyKind::Element;
                    }
                    PropertyKind::Reference if !matches!(property.target, TypeRef::Class(_)) => {
                        log::warn!(
                            "element reference `{member}` targets a leaf, mapped to an element"
                        );
                        property.kind = PropertyKind::Element;
                    }
                    PropertyKind::Map
                        if property.key.is_some_and(|key| !matches!(key, TypeRef::Leaf(_))) =>
                    {
                        reports.push((
                            ModelErrorKind::NonLeafTarget {
                                kind: "map key",
                                member,
                                ty: declared.container().path(),
                            },
                            property.seed.location().clone(),
                        ));
                        property.dropped = true;
                    }
                    _ => {}
                }
            }
        }
        for (kind, location) in reports {
            self.report(kind, &location);
        }
    }

    /// Checks that need the whole base chain: one value property, no value
    /// next to elements, one wildcard, one id.
    fn check_chains(&mut self, order: &[ClassId]) {
        for &id in order {
            let ancestors: Vec<ClassId> = self.set.ancestors(id).skip(1).collect();
            let inherited = |test: &dyn Fn(&PropertyInfo) -> bool| {
                ancestors.iter().any(|&a| {
                    self.set
                        .class(a)
                        .properties
                        .iter()
                        .any(|p| !p.dropped && test(p))
                })
            };
            let chain_value = inherited(&|p| p.kind == PropertyKind::Value);
            let chain_elements = inherited(&|p| p.kind.is_element_like());
            let chain_wildcard = inherited(&|p| p.kind == PropertyKind::AttributeWildcard);
            let chain_id = inherited(&|p| p.is_id);

            let class = &mut self.set.classes[id.index()];
            let class_path = class.ty.path();
            let own_elements = class
                .properties
                .iter()
                .any(|p| !p.dropped && p.kind.is_element_like());

            let mut reports = Vec::new();
            let (mut seen_value, mut seen_wildcard, mut seen_id) = (false, false, false);
            for property in &mut class.properties {
                if property.dropped {
                    continue;
                }
                let name = property.seed.name();
                let member = || String::from(name);
                if property.kind == PropertyKind::Value {
                    if chain_value || seen_value {
                        reports.push((
                            ModelErrorKind::MultipleValueProperties {
                                class: class_path,
                                member: member(),
                            },
                            property.seed.location().clone(),
                        ));
                        property.kind = PropertyKind::Element;
                    } else if chain_elements || own_elements {
                        reports.push((
                            ModelErrorKind::ValueWithElements {
                                class: class_path,
                                member: member(),
                            },
                            property.seed.location().clone(),
                        ));
                        property.kind = PropertyKind::Element;
                    } else {
                        seen_value = true;
                    }
                }
                if property.kind.is_element_like() && chain_value {
                    reports.push((
                        ModelErrorKind::ValueWithElements {
                            class: class_path,
                            member: member(),
                        },
                        property.seed.location().clone(),
                    ));
                    property.dropped = true;
                    continue;
                }
                if property.kind == PropertyKind::AttributeWildcard {
                    if chain_wildcard || seen_wildcard {
                        reports.push((
                            ModelErrorKind::MultipleWildcards {
                                class: class_path,
                                member: member(),
                            },
                            property.seed.location().clone(),
                        ));
                        property.dropped = true;
                        continue;
                    }
                    seen_wildcard = true;
                }
                if property.is_id {
                    if chain_id || seen_id {
                        reports.push((
                            ModelErrorKind::MultipleIds {
                                class: class_path,
                                member: member(),
                            },
                            property.seed.location().clone(),
                        ));
                        property.is_id = false;
                    } else if !is_text_leaf(&self.set.leaves, property.target) {
                        reports.push((
                            ModelErrorKind::IdNotText { member: member() },
                            property.seed.location().clone(),
                        ));
                        property.is_id = false;
                    } else {
                        seen_id = true;
                    }
                }
            }
            for (kind, location) in reports {
                self.report(kind, &location);
            }
        }
    }

    fn remove_dropped(&mut self) {
        for class in &mut self.set.classes {
            class.properties.retain(|p| !p.dropped);
        }
    }

    /// Computes inherited ids, wildcards and flags, bases first.
    fn inherit(&mut self, order: &[ClassId]) {
        for class in &mut self.set.classes {
            class.flags.remove(ClassFlags::HAS_SUBCLASSES | ClassFlags::ELEMENT_ONLY);
        }
        for &id in order {
            let class = self.set.class(id);
            let own = |test: fn(&PropertyInfo) -> bool| {
                class
                    .properties
                    .iter()
                    .position(test)
                    .map(|index| PropertyRef { class: id, index })
            };
            let own_id = own(|p| p.is_id);
            let own_wildcard = own(|p| p.kind == PropertyKind::AttributeWildcard);
            let has_value = own(|p| p.kind == PropertyKind::Value).is_some();

            let base = class.base.map(|b| self.set.class(b));
            let id_property = own_id.or(base.and_then(|b| b.id_property));
            let wildcard = own_wildcard.or(base.and_then(|b| b.attribute_wildcard));
            let element_only = !has_value && base.is_none_or(|b| b.is_element_only());
            // the topmost declaring ancestor wins
            let position = base
                .and_then(|b| b.position_member)
                .or(class.own_position.is_some().then_some(id));
            let base_id = class.base;

            let class = &mut self.set.classes[id.index()];
            class.id_property = id_property;
            class.attribute_wildcard = wildcard;
            class.position_member = position;
            class.flags.set(ClassFlags::ELEMENT_ONLY, element_only);
            if let Some(base_id) = base_id {
                self.set.classes[base_id.index()].flags |= ClassFlags::HAS_SUBCLASSES;
            }
        }
    }

    /// Attributes may target a leaf, or a class whose content is a single leaf value.
    /// Others become elements; `true` if any did.
    fn check_attribute_targets(&mut self) -> bool {
        let mut demote = Vec::new();
        for class in &self.set.classes {
            for (index, property) in class.properties.iter().enumerate() {
                if property.kind != PropertyKind::Attribute {
                    continue;
                }
                let ok = match property.target {
                    TypeRef::Leaf(_) => true,
                    TypeRef::Class(target) => self.set.simple_content(target).is_some(),
                    _ => false,
                };
                if !ok {
                    demote.push(PropertyRef {
                        class: class.id,
                        index,
                    });
                }
            }
        }
        let demoted = !demote.is_empty();
        for prop in demote {
            let property = &mut self.set.classes[prop.class.index()].properties[prop.index];
            property.kind = PropertyKind::Element;
            let kind = ModelErrorKind::NonLeafTarget {
                kind: PropertyKind::Attribute.as_str(),
                member: String::from(property.member_name()),
                ty: property.seed.declared_type().item().path(),
            };
            let location = property.seed.location().clone();
            self.report(kind, &location);
        }
        demoted
    }

    /// Marks properties some bound subclass declares again.
    fn mark_overrides(&mut self) {
        let mut hidden = Vec::new();
        for class in &self.set.classes {
            for ancestor in self.set.ancestors(class.id).skip(1) {
                for (index, property) in self.set.class(ancestor).properties.iter().enumerate() {
                    if class.declares(property.member_name()) {
                        hidden.push(PropertyRef {
                            class: ancestor,
                            index,
                        });
                    }
                }
            }
        }
        for prop in hidden {
            self.set.classes[prop.class.index()].properties[prop.index].hidden_by_override = true;
        }
    }

    fn register_elements(&mut self, decls: Vec<ElementDeclSeed>) {
        let mut entries = Vec::new();
        for class in &self.set.classes {
            if let Some(name) = &class.element_name {
                entries.push(ElementInfo {
                    name: name.clone(),
                    scope: None,
                    content: TypeRef::Class(class.id),
                    location: class.location.clone(),
                });
            }
        }
        for decl in decls {
            let content = self
                .nav
                .resolve_path(&decl.ty)
                .and_then(|handle| self.set.type_ref(handle));
            let Some(content) = content else {
                self.report(ModelErrorKind::UnresolvedType(decl.ty), &decl.location);
                continue;
            };
            let scope = match &decl.scope {
                None => None,
                Some(path) => {
                    let class = self
                        .nav
                        .resolve_path(path)
                        .and_then(|handle| self.set.class_of(handle.id()));
                    if class.is_none() {
                        self.report(ModelErrorKind::UnresolvedType(path.clone()), &decl.location);
                        continue;
                    }
                    class
                }
            };
            entries.push(ElementInfo {
                name: decl.name,
                scope,
                content,
                location: decl.location,
            });
        }

        for entry in entries {
            let key = (entry.scope, entry.name.clone());
            if self.set.elements.contains_key(&key) {
                self.report(ModelErrorKind::DuplicateElement(entry.name), &entry.location);
                continue;
            }
            self.set
                .elements
                .insert(key, self.set.element_infos.len());
            self.set.element_infos.push(entry);
        }
    }

    fn register_type_names(&mut self) {
        let mut duplicates = Vec::new();
        for class in &self.set.classes {
            let Some(name) = &class.type_name else {
                continue;
            };
            if self.set.by_type_name.contains_key(name) {
                duplicates.push((name.clone(), class.location.clone()));
            } else {
                self.set
                    .by_type_name
                    .insert(name.clone(), TypeRef::Class(class.id));
            }
        }
        // several builtin types share a schema name, the first one wins
        for leaf in &self.set.leaves {
            self.set
                .by_type_name
                .entry(leaf.type_name.clone())
                .or_insert(TypeRef::Leaf(leaf.id));
        }
        for (name, location) in duplicates {
            self.report(ModelErrorKind::DuplicateTypeName(name), &location);
        }
    }
}

fn is_text_leaf(leaves: &[LeafInfo], target: TypeRef) -> bool {
    match target {
        TypeRef::Leaf(id) => leaves[id.index()].codec.is_text(),
        _ => false,
    }
}
