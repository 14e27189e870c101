use alloc::vec::Vec;

use crate::error::Location;
use crate::meta::{Directive, DirectiveKind};
use crate::nav::{ClassDecl, GetFn, Member, SetFn};
use crate::value::DeclaredType;

// -----------------------------------------------------------------------------
// MemberAccess

/// The erased functions of the member a seed was made from.
#[derive(Clone)]
pub enum MemberAccess {
    Field { get: GetFn, set: SetFn },
    Accessor { get: GetFn, set: Option<SetFn> },
    Component { get: GetFn },
}

impl MemberAccess {
    #[inline]
    pub fn getter(&self) -> &GetFn {
        match self {
            Self::Field { get, .. } | Self::Accessor { get, .. } | Self::Component { get } => get,
        }
    }
}

// -----------------------------------------------------------------------------
// PropertySeed

/// One declared member, seen as a property candidate.
///
/// A seed is uniform over fields, accessor pairs and structural components:
/// it knows the member name, its declared type, how to reach it, the
/// directives read for it and where it was declared. The location's
/// upstream is the owning class.
#[derive(Clone)]
pub struct PropertySeed {
    name: &'static str,
    declared: DeclaredType,
    access: MemberAccess,
    directives: Vec<Directive>,
    location: Location,
}

impl PropertySeed {
    /// Makes a seed for `member` of `owner` with the directives read for it.
    pub fn new(owner: &ClassDecl, member: Member<'_>, directives: Vec<Directive>) -> Self {
        let access = match member {
            Member::Field(field) => MemberAccess::Field {
                get: field.get.clone(),
                set: field.set.clone(),
            },
            Member::Accessor(accessor) => MemberAccess::Accessor {
                get: accessor.get.clone(),
                set: accessor.set.clone(),
            },
            Member::Component(component) => MemberAccess::Component {
                get: component.get.clone(),
            },
        };
        Self {
            name: member.name(),
            declared: member.declared_type(),
            access,
            directives,
            location: member.location(owner),
        }
    }

    /// The member name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn declared_type(&self) -> DeclaredType {
        self.declared
    }

    #[inline]
    pub fn access(&self) -> &MemberAccess {
        &self.access
    }

    #[inline]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Location of the owning class.
    #[inline]
    pub fn upstream(&self) -> Option<&Location> {
        self.location.upstream()
    }

    #[inline]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// The first directive of `kind`.
    #[inline]
    pub fn read(&self, kind: DirectiveKind) -> Option<&Directive> {
        self.directives.iter().find(|d| d.kind() == kind)
    }

    #[inline]
    pub fn has(&self, kind: DirectiveKind) -> bool {
        self.read(kind).is_some()
    }
}
