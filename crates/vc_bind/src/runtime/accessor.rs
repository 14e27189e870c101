use core::any::Any;

use crate::error::AccessorError;
use crate::info::{ClassId, TypeInfoSet};
use crate::model::MemberAccess;
use crate::nav::{GetFn, SetFn};
use crate::value::Value;

// -----------------------------------------------------------------------------
// Accessor

/// Reads and writes one property on an instance of its declaring class.
///
/// Members of constructor-only classes are [`Staged`](Self::Staged): they can
/// be read from a finished instance, but values read from markup go to a
/// [`ConstructionStager`](crate::runtime::ConstructionStager) under `key`.
#[derive(Clone)]
pub enum Accessor {
    Field { get: GetFn, set: SetFn },
    Pair {
        get: GetFn,
        set: Option<SetFn>,
        member: &'static str,
    },
    Staged { get: GetFn, key: &'static str },
}

impl Accessor {
    pub(crate) fn new(access: &MemberAccess, member: &'static str) -> Self {
        match access {
            MemberAccess::Field { get, set } => Self::Field {
                get: get.clone(),
                set: set.clone(),
            },
            MemberAccess::Accessor { get, set } => Self::Pair {
                get: get.clone(),
                set: set.clone(),
                member,
            },
            MemberAccess::Component { get } => Self::Staged {
                get: get.clone(),
                key: member,
            },
        }
    }

    /// Reads the property from `instance`, which must already be viewed as
    /// the declaring class.
    #[inline]
    pub fn get(&self, instance: &dyn Any) -> Result<Value, AccessorError> {
        match self {
            Self::Field { get, .. } | Self::Pair { get, .. } | Self::Staged { get, .. } => {
                get(instance)
            }
        }
    }

    /// Writes the property on `instance`.
    ///
    /// Fails for getter-only pairs and for staged members.
    pub fn set(&self, instance: &mut dyn Any, value: Value) -> Result<(), AccessorError> {
        match self {
            Self::Field { set, .. } => set(instance, value),
            Self::Pair { set: Some(set), .. } => set(instance, value),
            Self::Pair {
                set: None, member, ..
            } => Err(AccessorError::ReadOnly(*member)),
            Self::Staged { key, .. } => Err(AccessorError::Unavailable(*key)),
        }
    }

    /// The stager key of a staged member.
    #[inline]
    pub fn staging_key(&self) -> Option<&'static str> {
        match self {
            Self::Staged { key, .. } => Some(*key),
            _ => None,
        }
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Field { .. } | Self::Pair { set: Some(_), .. })
    }
}

impl core::fmt::Debug for Accessor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Field { .. } => f.write_str("Field"),
            Self::Pair { set, .. } => write!(f, "Pair(writable: {})", set.is_some()),
            Self::Staged { key, .. } => write!(f, "Staged({key})"),
        }
    }
}

// -----------------------------------------------------------------------------
// Views

fn upcast_error(types: &TypeInfoSet, runtime: ClassId, declaring: ClassId) -> AccessorError {
    AccessorError::Upcast {
        from: types.class(runtime).ty().path(),
        to: types.class(declaring).ty().path(),
    }
}

/// Views an instance of `runtime` as its ancestor `declaring`.
pub(crate) fn view<'a>(
    types: &TypeInfoSet,
    runtime: ClassId,
    declaring: ClassId,
    instance: &'a dyn Any,
) -> Result<&'a dyn Any, AccessorError> {
    let mut current = runtime;
    let mut view = instance;
    while current != declaring {
        let class = types.class(current);
        let (Some(base), Some(decl)) = (class.base(), class.base_decl()) else {
            return Err(upcast_error(types, runtime, declaring));
        };
        view = decl
            .upcast(view)
            .ok_or_else(|| upcast_error(types, runtime, declaring))?;
        current = base;
    }
    Ok(view)
}

/// Mutable form of [`view`].
pub(crate) fn view_mut<'a>(
    types: &TypeInfoSet,
    runtime: ClassId,
    declaring: ClassId,
    instance: &'a mut dyn Any,
) -> Result<&'a mut dyn Any, AccessorError> {
    let mut current = runtime;
    let mut view = instance;
    while current != declaring {
        let class = types.class(current);
        let (Some(base), Some(decl)) = (class.base(), class.base_decl()) else {
            return Err(upcast_error(types, runtime, declaring));
        };
        view = decl
            .upcast_mut(view)
            .ok_or_else(|| upcast_error(types, runtime, declaring))?;
        current = base;
    }
    Ok(view)
}

/// Returns `true` when a property named `member` declared on `declaring` is
/// redeclared somewhere between `runtime` and `declaring`, excluding the latter.
pub(crate) fn is_shadowed(
    types: &TypeInfoSet,
    runtime: ClassId,
    declaring: ClassId,
    member: &str,
) -> bool {
    types
        .ancestors(runtime)
        .take_while(|&class| class != declaring)
        .any(|class| types.class(class).declares(member))
}

#[cfg(test)]
mod tests {
    use super::Accessor;
    use crate::error::AccessorError;
    use crate::nav::GetFn;
    use crate::value::Value;
    use alloc::string::String;
    use alloc::sync::Arc;

    fn read() -> GetFn {
        Arc::new(|instance: &dyn core::any::Any| {
            instance
                .downcast_ref::<String>()
                .map(|s| Value::Text(s.clone()))
                .ok_or(AccessorError::Downcast { expected: "String" })
        })
    }

    #[test]
    fn only_plain_members_are_written_in_place() {
        let field = Accessor::Field {
            get: read(),
            set: Arc::new(|instance: &mut dyn core::any::Any, value: Value| {
                let target = instance
                    .downcast_mut::<String>()
                    .ok_or(AccessorError::Downcast { expected: "String" })?;
                if let Value::Text(text) = value {
                    *target = text;
                }
                Ok(())
            }),
        };
        let staged = Accessor::Staged {
            get: read(),
            key: "label",
        };
        let getter_only = Accessor::Pair {
            get: read(),
            set: None,
            member: "label",
        };

        let mut label = String::from("old");
        field.set(&mut label, Value::Text("new".into())).unwrap();
        assert!(matches!(staged.get(&label), Ok(Value::Text(text)) if text == "new"));
        assert_eq!(
            staged.set(&mut label, Value::Nil),
            Err(AccessorError::Unavailable("label"))
        );
        assert_eq!(
            getter_only.set(&mut label, Value::Nil),
            Err(AccessorError::ReadOnly("label"))
        );
        assert_eq!(staged.staging_key(), Some("label"));
        assert!(field.is_writable());
        assert!(!staged.is_writable() && !getter_only.is_writable());
    }
}
