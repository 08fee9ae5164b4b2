//! # Attribute-backed components
//!
//! `quark-element` binds the reactive core to a host component model where a
//! component's public properties live in a string-keyed attribute store.
//!
//! - A [`ComponentDef`] lists what every instance of a type gets: declared
//!   properties, state slots, computed properties and watch bindings.
//! - A [`Host`] is one instance: a [`ReflectionBridge`] per declared
//!   property keeps it in sync with its attribute, with the attribute store
//!   as the single source of truth.
//! - An [`Element`] adds the [`Component`] and its [`TreeRenderer`] and runs
//!   the lifecycle `Constructed -> Connected -> Updated* -> Disconnected`.
//!
//! ```rust
//! use std::rc::Rc;
//! use quark_core::Runtime;
//! use quark_element::*;
//!
//! struct Badge;
//!
//! impl Lifecycle for Badge {}
//!
//! impl Component for Badge {
//!     type Output = String;
//!
//!     fn render(&self, host: &Host) -> anyhow::Result<Option<String>> {
//!         Ok(Some(format!("[{}]", host.get("count")?)))
//!     }
//! }
//!
//! let rt = Runtime::new();
//! let def = Rc::new(
//!     ComponentDef::new("x-badge")
//!         .prop(PropertyDeclaration::new("count").ty(PropType::Number).default(0)),
//! );
//!
//! let renderer = |tree: Option<String>| -> anyhow::Result<()> {
//!     println!("{tree:?}");
//!     Ok(())
//! };
//! let el = Element::new(&rt, def, Badge, renderer, AttributeMap::new()).unwrap();
//! el.connected().unwrap();
//! el.host().set_property("count", 3).unwrap();
//! assert_eq!(el.render_stats().renders, 2);
//! assert_eq!(el.host().attribute("count").as_deref(), Some("3"));
//! ```

pub mod attributes;
pub mod bridge;
pub mod controller;
pub mod converter;
pub mod declaration;
pub mod element;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod listeners;
pub mod render_api;
pub mod value;

pub use attributes::*;
pub use bridge::*;
pub use controller::*;
pub use converter::*;
pub use declaration::*;
pub use element::*;
pub use error::*;
pub use host::*;
pub use lifecycle::*;
pub use listeners::*;
pub use render_api::*;
pub use value::*;
