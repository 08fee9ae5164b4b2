//! Per-type declaration tables.
//!
//! A [`ComponentDef`] is built once per component type and shared by all of
//! its instances. It lists the attribute-backed properties, plain state
//! slots, computed properties and watch bindings an instance gets at
//! construction.

use std::collections::HashMap;
use std::rc::Rc;

use quark_core::WatchOptions;

use crate::{Converter, Host, PropType, Value, default_converter_rc};

/// One attribute-backed property.
///
/// ```rust
/// use quark_element::*;
///
/// let decl = PropertyDeclaration::new("maxCount")
///     .attribute("max-count")
///     .ty(PropType::Number)
///     .default(10);
/// assert_eq!(decl.attribute, "max-count");
/// assert!(decl.observed);
/// ```
#[derive(Clone)]
pub struct PropertyDeclaration {
    pub name: String,
    /// Attribute key; the property name unless overridden.
    pub attribute: String,
    pub ty: PropType,
    /// Whether attribute changes are delivered to the instance.
    pub observed: bool,
    pub converter: Option<Converter>,
    /// Returned for empty attribute values, unless itself empty.
    pub default: Value,
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            attribute: name.clone(),
            name,
            ty: PropType::String,
            observed: true,
            converter: Some(default_converter_rc()),
            default: Value::Undefined,
        }
    }

    pub fn attribute(mut self, key: impl Into<String>) -> Self {
        self.attribute = key.into();
        self
    }

    pub fn ty(mut self, ty: PropType) -> Self {
        self.ty = ty;
        self
    }

    pub fn observed(mut self, observed: bool) -> Self {
        self.observed = observed;
        self
    }

    pub fn converter(mut self, f: impl Fn(&Value, PropType) -> Value + 'static) -> Self {
        self.converter = Some(Rc::new(f));
        self
    }

    /// Raw attribute values pass through unconverted.
    pub fn without_converter(mut self) -> Self {
        self.converter = None;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }
}

impl std::fmt::Debug for PropertyDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyDeclaration")
            .field("name", &self.name)
            .field("attribute", &self.attribute)
            .field("ty", &self.ty)
            .field("observed", &self.observed)
            .field("converter", &self.converter.is_some())
            .field("default", &self.default)
            .finish()
    }
}

pub type ComputedGetter = Rc<dyn Fn(&Host) -> anyhow::Result<Value>>;
pub type WatchCallback = Rc<dyn Fn(&Host, &Value, Option<&Value>) -> anyhow::Result<()>>;

#[derive(Clone, Debug)]
pub struct StateDeclaration {
    pub name: String,
    pub initial: Value,
}

#[derive(Clone)]
pub struct ComputedDeclaration {
    pub name: String,
    pub getter: ComputedGetter,
}

/// Watch binding on a property, state slot or computed, by member name.
#[derive(Clone)]
pub struct WatchDeclaration {
    pub path: String,
    pub options: WatchOptions<Value>,
    pub callback: WatchCallback,
}

/// Declaration table of one component type.
///
/// ```rust
/// use quark_element::*;
///
/// let def = ComponentDef::new("x-counter")
///     .prop(PropertyDeclaration::new("count").ty(PropType::Number).default(0))
///     .prop(PropertyDeclaration::new("label").observed(false))
///     .state("clicks", 0)
///     .computed("double", |host| {
///         let n = host.get("count")?.as_f64().unwrap_or_default();
///         Ok(Value::Number(n * 2.0))
///     });
///
/// assert_eq!(def.observed_attributes(), ["count"]);
/// ```
#[derive(Clone)]
pub struct ComponentDef {
    tag: String,
    props: Vec<PropertyDeclaration>,
    states: Vec<StateDeclaration>,
    computeds: Vec<ComputedDeclaration>,
    watches: Vec<WatchDeclaration>,
}

impl ComponentDef {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            props: Vec::new(),
            states: Vec::new(),
            computeds: Vec::new(),
            watches: Vec::new(),
        }
    }

    /// Declares a property. A later declaration on the same attribute key
    /// replaces the earlier one.
    pub fn prop(mut self, decl: PropertyDeclaration) -> Self {
        match self.props.iter_mut().find(|p| p.attribute == decl.attribute) {
            Some(slot) => *slot = decl,
            None => self.props.push(decl),
        }
        self
    }

    pub fn state(mut self, name: impl Into<String>, initial: impl Into<Value>) -> Self {
        let decl = StateDeclaration {
            name: name.into(),
            initial: initial.into(),
        };
        match self.states.iter_mut().find(|s| s.name == decl.name) {
            Some(slot) => *slot = decl,
            None => self.states.push(decl),
        }
        self
    }

    pub fn computed(
        mut self,
        name: impl Into<String>,
        getter: impl Fn(&Host) -> anyhow::Result<Value> + 'static,
    ) -> Self {
        let decl = ComputedDeclaration {
            name: name.into(),
            getter: Rc::new(getter),
        };
        match self.computeds.iter_mut().find(|c| c.name == decl.name) {
            Some(slot) => *slot = decl,
            None => self.computeds.push(decl),
        }
        self
    }

    pub fn watch(
        mut self,
        path: impl Into<String>,
        options: WatchOptions<Value>,
        callback: impl Fn(&Host, &Value, Option<&Value>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.watches.push(WatchDeclaration {
            path: path.into(),
            options,
            callback: Rc::new(callback),
        });
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn props(&self) -> &[PropertyDeclaration] {
        &self.props
    }

    pub fn states(&self) -> &[StateDeclaration] {
        &self.states
    }

    pub fn computeds(&self) -> &[ComputedDeclaration] {
        &self.computeds
    }

    pub fn watches(&self) -> &[WatchDeclaration] {
        &self.watches
    }

    /// Attribute keys whose changes the host platform should deliver.
    pub fn observed_attributes(&self) -> Vec<&str> {
        self.props
            .iter()
            .filter(|p| p.observed)
            .map(|p| p.attribute.as_str())
            .collect()
    }

    pub fn is_boolean_attribute(&self, key: &str) -> bool {
        self.props
            .iter()
            .any(|p| p.attribute == key && p.ty == PropType::Boolean)
    }
}

/// Component definitions by tag.
///
/// Defining a tag twice keeps the first definition.
#[derive(Default)]
pub struct Registry {
    defs: HashMap<String, Rc<ComponentDef>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `def` under its tag. Returns `false`, leaving the registry
    /// untouched, when the tag is already taken.
    pub fn define(&mut self, def: ComponentDef) -> bool {
        if self.defs.contains_key(def.tag()) {
            log::debug!("`<{}>` is already defined", def.tag());
            return false;
        }
        self.defs.insert(def.tag().to_owned(), Rc::new(def));
        true
    }

    pub fn get(&self, tag: &str) -> Option<Rc<ComponentDef>> {
        self.defs.get(tag).cloned()
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.defs.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
