use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Expr, Statement};
use crate::environment::ScopeId;
use crate::evaluator::EvalError;

/// Insertion-ordered string-keyed map backing object values.
pub type ValueMap = IndexMap<String, Value>;

/// A runtime value produced during template evaluation.
///
/// The variants form a closed set: scalars, the two absent values (null and
/// undefined, which are distinct), sequences, insertion-ordered objects, and
/// callables.
///
/// # Undefined vs. Null
///
/// Unknown variable lookups resolve to `Undefined`, never to an error.
/// `Undefined` compares unequal to `Null`, renders as the empty string, and
/// has its own `defined`/`undefined` tests.
///
/// # Examples
///
/// ```
/// use sprig_lang::Value;
///
/// let n = Value::Integer(42);
/// assert!(n.is_truthy());
/// assert_eq!(n.to_string(), "42");
///
/// let f = Value::Float(2.0);
/// assert_eq!(f.to_string(), "2.0");
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// The null value (`none`)
    Null,

    /// The undefined value, distinct from null
    Undefined,

    /// Boolean (`true`/`false`)
    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Array of values
    Array(Vec<Value>),

    /// Tuple, an array subtype produced by comma sequences and destructuring
    Tuple(Vec<Value>),

    /// Insertion-ordered object with string keys
    Object(ValueMap),

    /// Object subtype tagging a trailing keyword-argument bundle
    KeywordArguments(ValueMap),

    /// Callable: a built-in global, a macro, or a `{% call %}` body
    Function(Function),
}

/// Host signature for built-in global functions.
pub type NativeFn = fn(&[Value]) -> Result<Value, EvalError>;

#[derive(Debug, Clone)]
pub enum Function {
    /// Built-in global function (`range`, `namespace`, ...)
    Native { name: &'static str, call: NativeFn },

    /// Template macro closing over its defining scope
    Macro(Rc<MacroValue>),

    /// Body of a `{% call %}` block, invocable from the callee as `caller()`
    Caller(Rc<CallerValue>),
}

/// A declared macro: signature, body, and the scope it was defined in.
#[derive(Debug)]
pub struct MacroValue {
    pub name: String,
    pub params: Vec<Expr>,
    pub body: Vec<Statement>,
    pub scope: ScopeId,
}

/// The body of a `{% call %}` block together with its caller parameters.
#[derive(Debug)]
pub struct CallerValue {
    pub params: Vec<Expr>,
    pub body: Vec<Statement>,
    pub scope: ScopeId,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Undefined, Undefined) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Integer(a), Float(b)) | (Float(b), Integer(a)) => *a as f64 == *b,
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) | (Tuple(a), Tuple(b)) => a == b,
            (Object(a), Object(b)) | (KeywordArguments(a), KeywordArguments(b)) => a == b,
            (Function(a), Function(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Function::Native { name: a, .. },
                Function::Native { name: b, .. },
            ) => a == b,
            (Function::Macro(a), Function::Macro(b)) => Rc::ptr_eq(a, b),
            (Function::Caller(a), Function::Caller(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
            Value::Object(_) => "object",
            Value::KeywordArguments(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Truthiness rule used by conditions, `and`/`or`, and `not`.
    ///
    /// Numbers, strings, and booleans follow natural truthiness; arrays and
    /// objects are truthy iff non-empty; null and undefined are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Undefined => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Object(map) | Value::KeywordArguments(map) => !map.is_empty(),
            Value::Function(_) => true,
        }
    }

    /// Numeric coercion for arithmetic and comparison (booleans count as
    /// 0/1).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Convert host JSON data into a runtime value. Total and recursive;
    /// integers and floats stay distinct.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn write_repr(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Render a float with its decimal point kept visible (`2.0`, not `2`).
pub fn format_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        format!("{:.1}", n)
    } else {
        n.to_string()
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "none"),
            Value::Undefined => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", format_float(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.write_repr(f)?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.write_repr(f)?;
                }
                write!(f, ")")
            }
            Value::Object(map) | Value::KeywordArguments(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: ", key)?;
                    value.write_repr(f)?;
                }
                write!(f, "}}")
            }
            Value::Function(Function::Native { name, .. }) => {
                write!(f, "<function {}>", name)
            }
            Value::Function(Function::Macro(m)) => write!(f, "<macro '{}'>", m.name),
            Value::Function(Function::Caller(_)) => write!(f, "<caller>"),
        }
    }
}

/// Ordering rule shared by `sort`, `dictsort`, and the comparison operators.
///
/// Null compares equal only to null and undefined only to undefined; any
/// other pairing with an absent value is an error. Numbers and booleans
/// compare by numeric coercion. Strings compare lexicographically, case
/// insensitively unless `case_sensitive` is requested. Everything else is a
/// type error.
pub fn compare_values(a: &Value, b: &Value, case_sensitive: bool) -> Result<Ordering, EvalError> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(Ordering::Equal),
        (Value::Undefined, Value::Undefined) => Ok(Ordering::Equal),
        (Value::Null | Value::Undefined, _) | (_, Value::Null | Value::Undefined) => {
            Err(EvalError::TypeError(format!(
                "Cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            )))
        }
        (Value::String(x), Value::String(y)) => {
            if case_sensitive {
                Ok(x.cmp(y))
            } else {
                Ok(x.to_lowercase().cmp(&y.to_lowercase()))
            }
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
            _ => Err(EvalError::TypeError(format!(
                "Cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}
