use std::rc::Rc;

use crate::Value;

/// Declared type of a property. Drives both the default converter and the
/// attribute serialisation of booleans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PropType {
    #[default]
    String,
    Number,
    Boolean,
}

/// Pluggable per-property conversion, applied to raw attribute values on read
/// and to assigned values on write.
pub type Converter = Rc<dyn Fn(&Value, PropType) -> Value>;

/// Numeric coercion for `Number`, boolean coercion for `Boolean`, pass-through
/// for `String`.
///
/// ```rust
/// use quark_element::*;
///
/// assert_eq!(default_converter(&"42".into(), PropType::Number), Value::Number(42.0));
/// assert_eq!(default_converter(&"false".into(), PropType::Boolean), Value::Bool(false));
/// assert_eq!(default_converter(&"".into(), PropType::Boolean), Value::Bool(true));
/// ```
pub fn default_converter(value: &Value, ty: PropType) -> Value {
    match ty {
        PropType::String => value.clone(),
        PropType::Number => {
            if value.is_empty() {
                value.clone()
            } else {
                Value::Number(to_number(value))
            }
        }
        PropType::Boolean => Value::Bool(to_bool(value)),
    }
}

/// The default converter as a [`Converter`].
pub fn default_converter_rc() -> Converter {
    Rc::new(default_converter)
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Str(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                t.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Str(s) => s != "false",
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
    }
}
