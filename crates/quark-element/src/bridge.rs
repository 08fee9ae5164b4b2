use quark_core::{Dep, Runtime};

use crate::{AttributeStore, PropType, PropertyDeclaration, Value};

/// Keeps one declared property in sync with its attribute.
///
/// The bridge holds no value of its own: reads re-derive from the raw
/// attribute every time and writes only produce the raw form to store. The
/// owned [`Dep`] is notified by the instance when the attribute changes.
pub struct ReflectionBridge {
    decl: PropertyDeclaration,
    dep: Dep,
}

impl ReflectionBridge {
    pub fn new(decl: PropertyDeclaration) -> Self {
        Self {
            decl,
            dep: Dep::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn attribute(&self) -> &str {
        &self.decl.attribute
    }

    pub fn ty(&self) -> PropType {
        self.decl.ty
    }

    pub fn is_observed(&self) -> bool {
        self.decl.observed
    }

    pub fn declaration(&self) -> &PropertyDeclaration {
        &self.decl
    }

    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Tracked read of the current property value.
    pub fn get(&self, rt: &Runtime, store: &dyn AttributeStore) -> Value {
        self.dep.depend(rt);
        self.resolve(store.get_raw(&self.decl.attribute).as_deref())
    }

    /// Read-side conversion of a raw attribute value.
    ///
    /// Empty input yields the declared default when there is one, except for
    /// a boolean attribute that is present with an empty value.
    pub fn resolve(&self, raw: Option<&str>) -> Value {
        let value = Value::from_raw(raw);
        let boolean_presence = self.decl.ty == PropType::Boolean && raw == Some("");
        if value.is_empty() && !boolean_presence && !self.decl.default.is_empty() {
            return self.decl.default.clone();
        }
        match &self.decl.converter {
            Some(convert) => convert(&value, self.decl.ty),
            None => value,
        }
    }

    /// Raw form to write for `value`; `None` means remove the attribute.
    ///
    /// Truthy booleans become an empty, present attribute.
    pub fn serialize(&self, value: &Value) -> Option<String> {
        let value = match &self.decl.converter {
            Some(convert) => convert(value, self.decl.ty),
            None => value.clone(),
        };
        if !value.is_truthy() {
            return None;
        }
        match value {
            Value::Bool(_) => Some(String::new()),
            other => Some(other.to_attribute_string()),
        }
    }
}

impl std::fmt::Debug for ReflectionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionBridge")
            .field("decl", &self.decl)
            .field("dep", &self.dep)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeMap;

    fn bridge(decl: PropertyDeclaration) -> ReflectionBridge {
        ReflectionBridge::new(decl)
    }

    #[test]
    fn numeric_default_on_removal() {
        let b = bridge(PropertyDeclaration::new("count").ty(PropType::Number).default(10));
        assert_eq!(b.resolve(None), Value::from(10));
        assert_eq!(b.resolve(Some("")), Value::from(10));
        assert_eq!(b.resolve(Some("3")), Value::from(3));
    }

    #[test]
    fn boolean_presence_is_not_empty() {
        let b = bridge(
            PropertyDeclaration::new("open")
                .ty(PropType::Boolean)
                .default(Value::Str("yes".into())),
        );
        assert_eq!(b.resolve(Some("")), Value::Bool(true));
        // absence still falls back
        assert_eq!(b.resolve(None), Value::from("yes"));
    }

    #[test]
    fn empty_default_defers_to_converter() {
        let b = bridge(PropertyDeclaration::new("open").ty(PropType::Boolean));
        assert_eq!(b.resolve(None), Value::Bool(false));
        assert_eq!(b.resolve(Some("false")), Value::Bool(false));
    }

    #[test]
    fn missing_converter_passes_raw_through() {
        let b = bridge(
            PropertyDeclaration::new("count")
                .ty(PropType::Number)
                .without_converter(),
        );
        assert_eq!(b.resolve(Some("4")), Value::from("4"));
        assert_eq!(b.serialize(&Value::from(4)), Some("4".into()));
    }

    #[test]
    fn serialization_rules() {
        let flag = bridge(PropertyDeclaration::new("disabled").ty(PropType::Boolean));
        assert_eq!(flag.serialize(&true.into()), Some(String::new()));
        assert_eq!(flag.serialize(&false.into()), None);
        assert_eq!(flag.serialize(&0.into()), None);
        assert_eq!(flag.serialize(&"false".into()), None);

        let num = bridge(PropertyDeclaration::new("count").ty(PropType::Number));
        assert_eq!(num.serialize(&10.into()), Some("10".into()));
        assert_eq!(num.serialize(&0.into()), None);

        let text = bridge(PropertyDeclaration::new("label"));
        assert_eq!(text.serialize(&"hi".into()), Some("hi".into()));
        assert_eq!(text.serialize(&"".into()), None);
    }

    #[test]
    fn get_reads_the_store() {
        let rt = Runtime::new();
        let b = bridge(PropertyDeclaration::new("count").ty(PropType::Number));
        let store = AttributeMap::new().with("count", "7");
        assert_eq!(b.get(&rt, &store), Value::from(7));
        assert_eq!(b.get(&rt, &AttributeMap::new()), Value::Null);
    }
}
