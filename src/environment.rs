use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::Local;

use crate::evaluator::EvalError;
use crate::value::{Function, Value, ValueMap};

/// Index of a scope record in the [`Environment`] arena.
pub type ScopeId = usize;

#[derive(Debug, Default)]
struct Scope {
    variables: HashMap<String, Value>,
    parent: Option<ScopeId>,
}

/// Arena of chained variable scopes.
///
/// Scopes are records indexed by [`ScopeId`]; each holds a parent index, and
/// lookups walk the parent chain. Closures (macros, callers) capture a scope
/// by index, so records are never removed while an evaluation is running.
///
/// The root scope is seeded with the global bindings available to every
/// template: the literal aliases `true`/`false`/`none` (and their
/// capitalized spellings) plus the functions `range`, `namespace`,
/// `strftime_now`, and `raise_exception`.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        let mut env = Environment {
            scopes: vec![Scope::default()],
        };
        env.seed_globals();
        env
    }

    pub fn root(&self) -> ScopeId {
        0
    }

    /// Create a child scope and return its index.
    pub fn push_child(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            variables: HashMap::new(),
            parent: Some(parent),
        });
        self.scopes.len() - 1
    }

    /// Resolve a name by walking the parent chain. Unknown names are `None`;
    /// the evaluator maps that to the undefined value, not an error.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Value> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let record = &self.scopes[id];
            if let Some(value) = record.variables.get(name) {
                return Some(value);
            }
            current = record.parent;
        }
        None
    }

    /// Bind a fresh name in `scope`. Rebinding the same name in the same
    /// scope is an error; shadowing an outer scope is fine.
    pub fn declare(&mut self, scope: ScopeId, name: &str, value: Value) -> Result<(), EvalError> {
        let variables = &mut self.scopes[scope].variables;
        if variables.contains_key(name) {
            return Err(EvalError::AlreadyDeclared(name.to_string()));
        }
        variables.insert(name.to_string(), value);
        Ok(())
    }

    /// Bind or overwrite a name in `scope`.
    pub fn set(&mut self, scope: ScopeId, name: &str, value: Value) {
        self.scopes[scope]
            .variables
            .insert(name.to_string(), value);
    }

    /// The scope along the chain that currently binds `name`.
    pub fn scope_of(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if self.scopes[id].variables.contains_key(name) {
                return Some(id);
            }
            current = self.scopes[id].parent;
        }
        None
    }

    /// Mutable access to a binding in exactly `scope` (no chain walk).
    pub fn get_mut(&mut self, scope: ScopeId, name: &str) -> Option<&mut Value> {
        self.scopes[scope].variables.get_mut(name)
    }

    fn seed_globals(&mut self) {
        for name in ["true", "True"] {
            self.set(0, name, Value::Boolean(true));
        }
        for name in ["false", "False"] {
            self.set(0, name, Value::Boolean(false));
        }
        for name in ["none", "None"] {
            self.set(0, name, Value::Null);
        }

        let globals: [(&'static str, crate::value::NativeFn); 4] = [
            ("range", global_range),
            ("namespace", global_namespace),
            ("strftime_now", global_strftime_now),
            ("raise_exception", global_raise_exception),
        ];
        for (name, call) in globals {
            self.set(0, name, Value::Function(Function::Native { name, call }));
        }
    }
}

/// `range(stop)`, `range(start, stop)`, `range(start, stop, step)` with
/// half-open bounds; negative steps count down.
fn global_range(args: &[Value]) -> Result<Value, EvalError> {
    let mut bounds = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Integer(n) => bounds.push(*n),
            other => {
                return Err(EvalError::ArgumentError(format!(
                    "range() expects integers, got {}",
                    other.type_name()
                )));
            }
        }
    }

    let (start, stop, step) = match bounds[..] {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step] => (start, stop, step),
        _ => {
            return Err(EvalError::ArgumentError(
                "range() expects between 1 and 3 arguments".to_string(),
            ));
        }
    };
    if step == 0 {
        return Err(EvalError::ArgumentError(
            "range() step cannot be zero".to_string(),
        ));
    }

    let mut items = Vec::new();
    let mut n = start;
    while (step > 0 && n < stop) || (step < 0 && n > stop) {
        items.push(Value::Integer(n));
        n += step;
    }
    Ok(Value::Array(items))
}

/// `namespace(...)` builds a mutable object bag. Accepts objects and keyword
/// arguments and merges them in order.
fn global_namespace(args: &[Value]) -> Result<Value, EvalError> {
    let mut map = ValueMap::new();
    for arg in args {
        match arg {
            Value::Object(entries) | Value::KeywordArguments(entries) => {
                for (key, value) in entries {
                    map.insert(key.clone(), value.clone());
                }
            }
            other => {
                return Err(EvalError::ArgumentError(format!(
                    "namespace() expects objects or keyword arguments, got {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Value::Object(map))
}

/// `strftime_now(format)` formats the current local time. The directives
/// `%Y %m %d %b %B %H %M %%` are guaranteed.
fn global_strftime_now(args: &[Value]) -> Result<Value, EvalError> {
    let format = match args.first() {
        Some(Value::String(s)) => s,
        _ => {
            return Err(EvalError::ArgumentError(
                "strftime_now() expects a format string".to_string(),
            ));
        }
    };

    let mut out = String::new();
    if write!(out, "{}", Local::now().format(format)).is_err() {
        return Err(EvalError::ArgumentError(format!(
            "strftime_now(): invalid format string '{}'",
            format
        )));
    }
    Ok(Value::String(out))
}

fn global_raise_exception(args: &[Value]) -> Result<Value, EvalError> {
    let message = match args.first() {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "raise_exception".to_string(),
    };
    Err(EvalError::Raised(message))
}

/// Host signature for test predicates: operand plus extra arguments.
pub type TestFn = fn(&Value, &[Value]) -> Result<bool, EvalError>;

/// Look up a built-in test predicate by name.
///
/// The table is a single static dispatch shared by every environment; it is
/// never copied per scope.
pub fn lookup_test(name: &str) -> Option<TestFn> {
    let test: TestFn = match name {
        "boolean" => test_boolean,
        "callable" => test_callable,
        "odd" => test_odd,
        "even" => test_even,
        "true" => test_true,
        "false" => test_false,
        "none" => test_none,
        "string" => test_string,
        "number" => test_number,
        "integer" => test_integer,
        "iterable" => test_iterable,
        "mapping" => test_mapping,
        "lower" => test_lower,
        "upper" => test_upper,
        "defined" => test_defined,
        "undefined" => test_undefined,
        "equalto" | "eq" => test_equalto,
        _ => return None,
    };
    Some(test)
}

fn test_boolean(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(value, Value::Boolean(_)))
}

fn test_callable(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(value, Value::Function(_)))
}

fn test_odd(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    match value {
        Value::Integer(n) => Ok(n % 2 != 0),
        other => Err(EvalError::TypeError(format!(
            "'odd' test requires an integer, got {}",
            other.type_name()
        ))),
    }
}

fn test_even(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    match value {
        Value::Integer(n) => Ok(n % 2 == 0),
        other => Err(EvalError::TypeError(format!(
            "'even' test requires an integer, got {}",
            other.type_name()
        ))),
    }
}

fn test_true(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(value, Value::Boolean(true)))
}

fn test_false(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(value, Value::Boolean(false)))
}

fn test_none(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(value, Value::Null))
}

fn test_string(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(value, Value::String(_)))
}

fn test_number(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(value, Value::Integer(_) | Value::Float(_)))
}

fn test_integer(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(value, Value::Integer(_)))
}

fn test_iterable(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(
        value,
        Value::Array(_)
            | Value::Tuple(_)
            | Value::String(_)
            | Value::Object(_)
            | Value::KeywordArguments(_)
    ))
}

fn test_mapping(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(
        value,
        Value::Object(_) | Value::KeywordArguments(_)
    ))
}

fn test_lower(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    match value {
        Value::String(s) => Ok(s.chars().all(|c| !c.is_uppercase())),
        _ => Ok(false),
    }
}

fn test_upper(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    match value {
        Value::String(s) => Ok(s.chars().all(|c| !c.is_lowercase())),
        _ => Ok(false),
    }
}

fn test_defined(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(!matches!(value, Value::Undefined))
}

fn test_undefined(value: &Value, _args: &[Value]) -> Result<bool, EvalError> {
    Ok(matches!(value, Value::Undefined))
}

fn test_equalto(value: &Value, args: &[Value]) -> Result<bool, EvalError> {
    match args.first() {
        Some(other) => Ok(value == other),
        None => Err(EvalError::ArgumentError(
            "'equalto' test requires an argument".to_string(),
        )),
    }
}
