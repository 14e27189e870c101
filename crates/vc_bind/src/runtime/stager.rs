use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::ConstructionError;
use crate::nav::{ConstructorDecl, TypeHandle};
use crate::value::{BindValue, Object, Value, object_type_id};

// -----------------------------------------------------------------------------
// ConstructionStager

/// Values read for one constructor-only instance, waiting for its constructor.
///
/// Values are staged under the member name in the order they are read. At
/// [`build`](Self::build) each constructor parameter takes the staged value
/// whose key equals its name; failing that, the first one, in staging order,
/// whose key equals it ignoring case; failing that, the parameter default.
/// A staged value is consumed by at most one parameter.
///
/// # Examples
///
/// ```
/// use vc_bind::nav::{Navigator, TypeHandle, TypeTable};
/// use vc_bind::runtime::ConstructionStager;
/// use vc_bind::{Value, impl_bind_object};
///
/// #[derive(Clone, Debug, PartialEq)]
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
/// let decl = table.class_decl(TypeHandle::of::<Point>()).unwrap();
/// let constructor = decl.constructor().unwrap();
///
/// let mut stager = ConstructionStager::new();
/// stager.stage("y", Value::Int(2));
/// stager.stage("x", Value::Int(1));
/// let names = ["x".to_string(), "y".to_string()];
/// let point = stager.build(TypeHandle::of::<Point>(), &names, constructor).unwrap();
/// assert_eq!(point.downcast_ref::<Point>(), Some(&Point { x: 1, y: 2 }));
/// ```
#[derive(Debug, Default)]
pub struct ConstructionStager {
    pending: Vec<(&'static str, Value)>,
}

impl ConstructionStager {
    #[inline]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Stages `value` under `key`, replacing a value staged earlier under the same key.
    pub fn stage(&mut self, key: &'static str, value: Value) {
        match self.pending.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.pending.push((key, value)),
        }
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.pending.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Matches the staged values to the parameters named `param_names` and
    /// calls the constructor.
    ///
    /// `param_names` holds one name per parameter of `constructor`, in order.
    pub fn build(
        self,
        ty: TypeHandle,
        param_names: &[String],
        constructor: &ConstructorDecl,
    ) -> Result<Object, ConstructionError> {
        let mut staged: Vec<Option<(&'static str, Value)>> =
            self.pending.into_iter().map(Some).collect();

        let mut values = Vec::with_capacity(constructor.params().len());
        for (index, param) in constructor.params().iter().enumerate() {
            let name = param_names.get(index).map_or(param.name(), String::as_str);
            let exact = staged
                .iter()
                .position(|entry| entry.as_ref().is_some_and(|(key, _)| *key == name));
            let found = exact.or_else(|| {
                staged.iter().position(|entry| {
                    entry
                        .as_ref()
                        .is_some_and(|(key, _)| eq_ignore_case(key, name))
                })
            });
            let value = match found.and_then(|index| staged[index].take()) {
                Some((_, value)) => value,
                None => param.default_value(),
            };
            values.push((String::from(name), value));
        }

        for (key, _) in staged.into_iter().flatten() {
            log::debug!("staged value `{key}` of `{ty}` matches no constructor parameter");
        }

        let mut arguments = Arguments {
            class: ty.path(),
            values: values.into_iter(),
        };
        let object = (constructor.build)(&mut arguments)?;
        if object_type_id(&object) != ty.id() {
            return Err(ConstructionError::WrongType(ty.path()));
        }
        Ok(object)
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

// -----------------------------------------------------------------------------
// Arguments

/// Constructor arguments, in parameter order.
pub struct Arguments {
    class: &'static str,
    values: vec::IntoIter<(String, Value)>,
}

impl Arguments {
    /// Converts the next argument to `T`.
    #[allow(clippy::should_implement_trait, reason = "typed and fallible")]
    pub fn next<T: BindValue>(&mut self) -> Result<T, ConstructionError> {
        let (param, value) = self
            .values
            .next()
            .ok_or(ConstructionError::ArgumentsExhausted { class: self.class })?;
        T::from_value(value).map_err(|source| ConstructionError::Argument {
            class: self.class,
            param,
            source,
        })
    }

    /// Takes the next argument without converting it.
    #[inline]
    pub fn next_value(&mut self) -> Option<Value> {
        self.values.next().map(|(_, value)| value)
    }

    /// Name of the next parameter.
    #[inline]
    pub fn peek_name(&self) -> Option<&str> {
        self.values.as_slice().first().map(|(name, _)| name.as_str())
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl core::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arguments")
            .field("class", &self.class)
            .field("remaining", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConstructionStager, eq_ignore_case};
    use crate::error::ConstructionError;
    use crate::meta::Directive;
    use crate::nav::{Navigator, TypeHandle, TypeTable};
    use crate::value::Value;
    use alloc::string::String;

    #[derive(Clone, Debug, PartialEq)]
    struct Span {
        start: u32,
        end: u32,
        label: String,
    }
    crate::impl_bind_object!(Span);

    fn table() -> TypeTable {
        let mut table = TypeTable::new();
        table
            .record::<Span>()
            .component("start", |s| &s.start)
            .component("end", |s| &s.end)
            .component("label", |s| &s.label)
            .constructor(|args| {
                Ok(Span {
                    start: args.next()?,
                    end: args.next()?,
                    label: args.next()?,
                })
            })
            .param_directive(Directive::Param {
                name: String::from("Label"),
            })
            .finish();
        table
    }

    fn names() -> [String; 3] {
        ["start".into(), "end".into(), "Label".into()]
    }

    fn build(stager: ConstructionStager) -> Result<Span, ConstructionError> {
        let table = table();
        let decl = table.class_decl(TypeHandle::of::<Span>()).unwrap();
        let object = stager.build(TypeHandle::of::<Span>(), &names(), decl.constructor().unwrap())?;
        Ok(object.downcast_ref::<Span>().unwrap().clone())
    }

    #[test]
    fn staging_order_does_not_matter() {
        let mut forward = ConstructionStager::new();
        forward.stage("start", Value::UInt(1));
        forward.stage("end", Value::UInt(5));
        forward.stage("label", Value::Text("a".into()));

        let mut backward = ConstructionStager::new();
        backward.stage("label", Value::Text("a".into()));
        backward.stage("end", Value::UInt(5));
        backward.stage("start", Value::UInt(1));

        assert_eq!(build(forward).unwrap(), build(backward).unwrap());
    }

    #[test]
    fn exact_name_wins_over_case_insensitive() {
        let mut stager = ConstructionStager::new();
        stager.stage("label", Value::Text("lower".into()));
        stager.stage("Label", Value::Text("exact".into()));
        stager.stage("start", Value::UInt(0));
        stager.stage("end", Value::UInt(0));
        assert_eq!(build(stager).unwrap().label, "exact");
    }

    #[test]
    fn missing_values_take_defaults_and_restaging_replaces() {
        let mut stager = ConstructionStager::new();
        stager.stage("end", Value::UInt(3));
        stager.stage("end", Value::UInt(9));
        assert_eq!(stager.len(), 1);
        let span = build(stager).unwrap();
        assert_eq!(
            span,
            Span {
                start: 0,
                end: 9,
                label: String::new()
            }
        );
    }

    #[test]
    fn conversion_failure_names_the_parameter() {
        let mut stager = ConstructionStager::new();
        stager.stage("start", Value::Text("soon".into()));
        match build(stager) {
            Err(ConstructionError::Argument { param, .. }) => assert_eq!(param, "start"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn case_folding_is_unicode_aware() {
        assert!(eq_ignore_case("ÉTÉ", "été"));
        assert!(!eq_ignore_case("end", "ends"));
    }
}
