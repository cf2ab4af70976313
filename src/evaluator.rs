use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::{BinOp, Expr, Program, Statement, UnaryOp};
use crate::environment::{Environment, ScopeId, lookup_test};
use crate::output::{DumpOptions, dump};
use crate::value::{
    CallerValue, Function, MacroValue, Value, ValueMap, compare_values,
};

/// Errors that can occur during template evaluation.
#[derive(Debug, Clone)]
pub enum EvalError {
    /// Type-mismatched operator, access, or method application
    TypeError(String),

    /// Wrong argument shape for a call, filter, or test
    ArgumentError(String),

    /// Filter name with no implementation
    UnknownFilter(String),

    /// Test name with no implementation
    UnknownTest(String),

    /// Name rebound within a single scope
    AlreadyDeclared(String),

    /// Integer division or modulo with a zero divisor
    DivisionByZero,

    /// `break`/`continue` reached a non-loop boundary
    LoopControl(&'static str),

    /// `raise_exception()` was called from the template
    Raised(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::TypeError(msg) => write!(f, "Type error: {}", msg),
            EvalError::ArgumentError(msg) => write!(f, "Argument error: {}", msg),
            EvalError::UnknownFilter(name) => write!(f, "Unknown filter: '{}'", name),
            EvalError::UnknownTest(name) => write!(f, "Unknown test: '{}'", name),
            EvalError::AlreadyDeclared(name) => {
                write!(f, "Variable '{}' is already declared in this scope", name)
            }
            EvalError::DivisionByZero => write!(f, "Division by zero"),
            EvalError::LoopControl(msg) => write!(f, "{}", msg),
            EvalError::Raised(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

/// Result of evaluating one statement. Break and continue are ordinary
/// values here, not exceptions; they carry any output produced before the
/// signal so the enclosing loop can keep it.
enum Flow {
    Value(Value),
    Break(String),
    Continue(String),
}

/// Result of evaluating a statement block.
enum BlockResult {
    Output(String),
    Break(String),
    Continue(String),
}

fn block_flow(result: BlockResult) -> Flow {
    match result {
        BlockResult::Output(out) => Flow::Value(Value::String(out)),
        BlockResult::Break(out) => Flow::Break(out),
        BlockResult::Continue(out) => Flow::Continue(out),
    }
}

/// A signal reaching a non-loop boundary (program, macro, caller, set- or
/// filter-capture) is a template error.
fn expect_output(result: BlockResult) -> Result<String, EvalError> {
    match result {
        BlockResult::Output(out) => Ok(out),
        BlockResult::Break(_) => Err(EvalError::LoopControl("'break' outside of a for loop")),
        BlockResult::Continue(_) => {
            Err(EvalError::LoopControl("'continue' outside of a for loop"))
        }
    }
}

/// The tree-walking template evaluator.
///
/// Owns the scope arena and maps each AST node to a value. A fresh
/// interpreter per render keeps evaluation pure: rendering the same program
/// with the same context twice yields identical output.
pub struct Interpreter {
    env: Environment,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            env: Environment::new(),
        }
    }

    /// Evaluate a program against top-level context variables and return the
    /// rendered output.
    ///
    /// # Examples
    ///
    /// ```
    /// use sprig_lang::evaluator::Interpreter;
    /// use sprig_lang::lexer::{TokenizeOptions, tokenize};
    /// use sprig_lang::parser::parse;
    /// use sprig_lang::value::{Value, ValueMap};
    ///
    /// let tokens = tokenize("{{ n + 1 }}", &TokenizeOptions::default()).unwrap();
    /// let program = parse(tokens).unwrap();
    ///
    /// let mut context = ValueMap::new();
    /// context.insert("n".to_string(), Value::Integer(41));
    ///
    /// let mut interpreter = Interpreter::new();
    /// assert_eq!(interpreter.evaluate(&program, context).unwrap(), "42");
    /// ```
    pub fn evaluate(
        &mut self,
        program: &Program,
        context: ValueMap,
    ) -> Result<String, EvalError> {
        let scope = self.env.push_child(self.env.root());
        for (name, value) in context {
            self.env.set(scope, &name, value);
        }

        expect_output(self.eval_block(&program.body, scope)?)
    }

    /// Evaluate statements in order, stringifying every non-null,
    /// non-undefined result. This concatenation is the template's output.
    fn eval_block(&mut self, body: &[Statement], scope: ScopeId) -> Result<BlockResult, EvalError> {
        let mut out = String::new();
        for statement in body {
            match self.eval_statement(statement, scope)? {
                Flow::Value(value) => {
                    if !matches!(value, Value::Null | Value::Undefined) {
                        out.push_str(&value.to_string());
                    }
                }
                Flow::Break(partial) => {
                    out.push_str(&partial);
                    return Ok(BlockResult::Break(out));
                }
                Flow::Continue(partial) => {
                    out.push_str(&partial);
                    return Ok(BlockResult::Continue(out));
                }
            }
        }
        Ok(BlockResult::Output(out))
    }

    fn eval_statement(&mut self, statement: &Statement, scope: ScopeId) -> Result<Flow, EvalError> {
        match statement {
            Statement::Text(text) => Ok(Flow::Value(Value::String(text.clone()))),
            Statement::Comment(_) => Ok(Flow::Value(Value::Undefined)),
            Statement::Expression(expr) => Ok(Flow::Value(self.eval_expr(expr, scope)?)),

            Statement::If {
                condition,
                body,
                alternate,
            } => {
                let branch = if self.eval_expr(condition, scope)?.is_truthy() {
                    body
                } else {
                    alternate
                };
                Ok(block_flow(self.eval_block(branch, scope)?))
            }

            Statement::For {
                target,
                iterable,
                body,
                default,
            } => self.eval_for(target, iterable, body, default, scope),

            Statement::Set {
                target,
                value,
                body,
            } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::String(expect_output(self.eval_block(body, scope)?)?),
                };
                self.assign_target(scope, target, value)?;
                Ok(Flow::Value(Value::Undefined))
            }

            Statement::Macro { name, params, body } => {
                let function = Function::Macro(Rc::new(MacroValue {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    scope,
                }));
                self.env.set(scope, name, Value::Function(function));
                Ok(Flow::Value(Value::Undefined))
            }

            Statement::CallBlock {
                caller_params,
                call,
                body,
            } => {
                let caller = Value::Function(Function::Caller(Rc::new(CallerValue {
                    params: caller_params.clone(),
                    body: body.clone(),
                    scope,
                })));

                let Expr::Call { callee, args } = call else {
                    return Err(EvalError::TypeError(
                        "call statement requires a call expression".to_string(),
                    ));
                };
                let (positional, kwargs) = self.eval_call_args(args, scope)?;
                match self.eval_expr(callee, scope)? {
                    Value::Function(Function::Macro(m)) => Ok(Flow::Value(
                        self.invoke_macro(&m, positional, kwargs, Some(caller))?,
                    )),
                    other => Err(EvalError::TypeError(format!(
                        "call statement target must be a macro, got {}",
                        other.type_name()
                    ))),
                }
            }

            Statement::FilterBlock { name, args, body } => {
                let rendered = Value::String(expect_output(self.eval_block(body, scope)?)?);
                let (positional, kwargs) = self.eval_call_args(args, scope)?;
                let result = self.apply_filter(rendered, name, &positional, &kwargs)?;
                Ok(Flow::Value(result))
            }

            Statement::Break => Ok(Flow::Break(String::new())),
            Statement::Continue => Ok(Flow::Continue(String::new())),
        }
    }

    fn eval_for(
        &mut self,
        target: &Expr,
        iterable: &Expr,
        body: &[Statement],
        default: &[Statement],
        scope: ScopeId,
    ) -> Result<Flow, EvalError> {
        // An inline `if` after the iterable arrives as a Select expression
        let (iter_expr, filter) = match iterable {
            Expr::Select { value, condition } => (value.as_ref(), Some(condition.as_ref())),
            other => (other, None),
        };

        let source = self.eval_expr(iter_expr, scope)?;
        let candidates: Vec<Value> = match source {
            Value::Array(items) | Value::Tuple(items) => items,
            Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
            Value::Object(map) | Value::KeywordArguments(map) => {
                map.keys().map(|k| Value::String(k.clone())).collect()
            }
            other => {
                return Err(EvalError::TypeError(format!(
                    "Cannot iterate over {}",
                    other.type_name()
                )));
            }
        };

        // Filtered-out candidates never count as iterations, so the filter
        // runs before any loop metadata exists
        let items = match filter {
            None => candidates,
            Some(condition) => {
                let mut kept = Vec::new();
                for item in candidates {
                    let probe = self.env.push_child(scope);
                    self.declare_target(probe, target, item.clone())?;
                    if self.eval_expr(condition, probe)?.is_truthy() {
                        kept.push(item);
                    }
                }
                kept
            }
        };

        if items.is_empty() {
            return Ok(block_flow(self.eval_block(default, scope)?));
        }

        let mut out = String::new();
        for (index, item) in items.iter().enumerate() {
            let iteration = self.env.push_child(scope);
            self.declare_target(iteration, target, item.clone())?;
            self.env
                .declare(iteration, "loop", Value::Object(loop_metadata(&items, index)))?;

            match self.eval_block(body, iteration)? {
                BlockResult::Output(rendered) => out.push_str(&rendered),
                BlockResult::Break(rendered) => {
                    out.push_str(&rendered);
                    break;
                }
                BlockResult::Continue(rendered) => {
                    out.push_str(&rendered);
                    continue;
                }
            }
        }
        Ok(Flow::Value(Value::String(out)))
    }

    /// Bind a loop target into a fresh scope, destructuring tuples with an
    /// arity check.
    fn declare_target(
        &mut self,
        scope: ScopeId,
        target: &Expr,
        value: Value,
    ) -> Result<(), EvalError> {
        match target {
            Expr::Identifier(name) => self.env.declare(scope, name, value),
            Expr::Tuple(names) => {
                let items = match value {
                    Value::Array(items) | Value::Tuple(items) => items,
                    other => {
                        return Err(EvalError::TypeError(format!(
                            "Cannot unpack {} into {} names",
                            other.type_name(),
                            names.len()
                        )));
                    }
                };
                if items.len() != names.len() {
                    return Err(EvalError::TypeError(format!(
                        "Cannot unpack {} values into {} names",
                        items.len(),
                        names.len()
                    )));
                }
                for (name, item) in names.iter().zip(items) {
                    self.declare_target(scope, name, item)?;
                }
                Ok(())
            }
            _ => Err(EvalError::TypeError("Invalid loop target".to_string())),
        }
    }

    /// `{% set %}` binding: identifier, arity-checked tuple, or member
    /// expression (in-place object mutation).
    fn assign_target(
        &mut self,
        scope: ScopeId,
        target: &Expr,
        value: Value,
    ) -> Result<(), EvalError> {
        match target {
            Expr::Identifier(name) => {
                self.env.set(scope, name, value);
                Ok(())
            }
            Expr::Tuple(names) => {
                let items = match value {
                    Value::Array(items) | Value::Tuple(items) => items,
                    other => {
                        return Err(EvalError::TypeError(format!(
                            "Cannot unpack {} into {} names",
                            other.type_name(),
                            names.len()
                        )));
                    }
                };
                if items.len() != names.len() {
                    return Err(EvalError::TypeError(format!(
                        "Cannot unpack {} values into {} names",
                        items.len(),
                        names.len()
                    )));
                }
                for (name, item) in names.iter().zip(items) {
                    self.assign_target(scope, name, item)?;
                }
                Ok(())
            }
            Expr::Member { .. } => self.assign_member(scope, target, value),
            _ => Err(EvalError::TypeError(
                "Invalid assignment target".to_string(),
            )),
        }
    }

    /// Resolve a member target into its root variable name and key path.
    fn member_path(
        &mut self,
        scope: ScopeId,
        target: &Expr,
        keys: &mut Vec<String>,
    ) -> Result<String, EvalError> {
        match target {
            Expr::Identifier(name) => Ok(name.clone()),
            Expr::Member {
                object,
                property,
                computed,
            } => {
                let root = self.member_path(scope, object, keys)?;
                let key = if *computed {
                    match self.eval_expr(property, scope)? {
                        Value::String(s) => s,
                        other => {
                            return Err(EvalError::TypeError(format!(
                                "Object keys must be strings, got {}",
                                other.type_name()
                            )));
                        }
                    }
                } else {
                    match property.as_ref() {
                        Expr::Identifier(name) => name.clone(),
                        _ => {
                            return Err(EvalError::TypeError(
                                "Invalid property in assignment target".to_string(),
                            ));
                        }
                    }
                };
                keys.push(key);
                Ok(root)
            }
            _ => Err(EvalError::TypeError(
                "Assignment target must be a variable or object member".to_string(),
            )),
        }
    }

    fn assign_member(
        &mut self,
        scope: ScopeId,
        target: &Expr,
        value: Value,
    ) -> Result<(), EvalError> {
        let mut keys = Vec::new();
        let root = self.member_path(scope, target, &mut keys)?;
        let Some((last, path)) = keys.split_last() else {
            return Err(EvalError::TypeError(
                "Invalid assignment target".to_string(),
            ));
        };

        let Some(owner) = self.env.scope_of(scope, &root) else {
            return Err(EvalError::TypeError(format!(
                "Cannot assign to member of undefined variable '{}'",
                root
            )));
        };
        let Some(mut slot) = self.env.get_mut(owner, &root) else {
            return Err(EvalError::TypeError(format!(
                "Cannot assign to member of undefined variable '{}'",
                root
            )));
        };

        for key in path {
            slot = match slot {
                Value::Object(map) | Value::KeywordArguments(map) => {
                    match map.get_mut(key.as_str()) {
                        Some(next) => next,
                        None => {
                            return Err(EvalError::TypeError(format!(
                                "Unknown member '{}' in assignment target",
                                key
                            )));
                        }
                    }
                }
                other => {
                    return Err(EvalError::TypeError(format!(
                        "Cannot assign to member of {}",
                        other.type_name()
                    )));
                }
            };
        }

        match slot {
            Value::Object(map) | Value::KeywordArguments(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            other => Err(EvalError::TypeError(format!(
                "Cannot assign to member of {}",
                other.type_name()
            ))),
        }
    }

    fn eval_expr(&mut self, expr: &Expr, scope: ScopeId) -> Result<Value, EvalError> {
        match expr {
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),

            // Unknown names evaluate to undefined, never an error
            Expr::Identifier(name) => Ok(self
                .env
                .lookup(scope, name)
                .cloned()
                .unwrap_or(Value::Undefined)),

            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Tuple(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::Tuple(values))
            }
            Expr::Object(pairs) => {
                let mut map = ValueMap::new();
                for (key_expr, value_expr) in pairs {
                    let key = match self.eval_expr(key_expr, scope)? {
                        Value::String(s) => s,
                        Value::Integer(n) => n.to_string(),
                        other => {
                            return Err(EvalError::TypeError(format!(
                                "Object keys must be strings, got {}",
                                other.type_name()
                            )));
                        }
                    };
                    let value = self.eval_expr(value_expr, scope)?;
                    map.insert(key, value);
                }
                Ok(Value::Object(map))
            }

            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, scope),

            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Boolean(!value.is_truthy())),
                    UnaryOp::Neg => match value {
                        Value::Integer(n) => Ok(Value::Integer(-n)),
                        Value::Float(n) => Ok(Value::Float(-n)),
                        other => Err(EvalError::TypeError(format!(
                            "Cannot negate {}",
                            other.type_name()
                        ))),
                    },
                }
            }

            Expr::Ternary {
                value,
                condition,
                alternative,
            } => {
                if self.eval_expr(condition, scope)?.is_truthy() {
                    self.eval_expr(value, scope)
                } else {
                    self.eval_expr(alternative, scope)
                }
            }

            Expr::Select { value, condition } => {
                if self.eval_expr(condition, scope)?.is_truthy() {
                    self.eval_expr(value, scope)
                } else {
                    Ok(Value::Undefined)
                }
            }

            Expr::Member {
                object,
                property,
                computed,
            } => self.eval_member(object, property, *computed, scope),

            Expr::Slice { .. } => Err(EvalError::TypeError(
                "Slice is only valid inside an index expression".to_string(),
            )),

            Expr::Call { callee, args } => self.eval_call(callee, args, scope),

            Expr::FilterApply {
                operand,
                name,
                args,
            } => {
                let value = self.eval_expr(operand, scope)?;
                let (positional, kwargs) = self.eval_call_args(args, scope)?;
                self.apply_filter(value, name, &positional, &kwargs)
            }

            Expr::Test {
                operand,
                name,
                args,
                negated,
            } => {
                let value = self.eval_expr(operand, scope)?;
                let test =
                    lookup_test(name).ok_or_else(|| EvalError::UnknownTest(name.clone()))?;
                let (positional, _) = self.eval_call_args(args, scope)?;
                let result = test(&value, &positional)?;
                Ok(Value::Boolean(result != *negated))
            }

            Expr::KeywordArgument { .. } => Err(EvalError::TypeError(
                "Keyword arguments are only valid inside calls".to_string(),
            )),
            Expr::Spread(_) => Err(EvalError::TypeError(
                "Spread arguments are only valid inside calls".to_string(),
            )),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        scope: ScopeId,
    ) -> Result<Value, EvalError> {
        // Short-circuit logical operators
        if op == BinOp::And {
            let left = self.eval_expr(left, scope)?;
            if !left.is_truthy() {
                return Ok(Value::Boolean(false));
            }
            return Ok(Value::Boolean(self.eval_expr(right, scope)?.is_truthy()));
        }
        if op == BinOp::Or {
            let left = self.eval_expr(left, scope)?;
            if left.is_truthy() {
                return Ok(Value::Boolean(true));
            }
            return Ok(Value::Boolean(self.eval_expr(right, scope)?.is_truthy()));
        }

        let left = self.eval_expr(left, scope)?;
        let right = self.eval_expr(right, scope)?;
        apply_binop(op, &left, &right)
    }

    fn eval_member(
        &mut self,
        object: &Expr,
        property: &Expr,
        computed: bool,
        scope: ScopeId,
    ) -> Result<Value, EvalError> {
        let object = self.eval_expr(object, scope)?;

        if computed {
            if let Expr::Slice { start, stop, step } = property {
                return self.eval_slice(&object, start, stop, step, scope);
            }
            let key = self.eval_expr(property, scope)?;
            access(&object, &key)
        } else {
            match property {
                Expr::Identifier(name) => access(&object, &Value::String(name.clone())),
                _ => Err(EvalError::TypeError(
                    "Invalid property access".to_string(),
                )),
            }
        }
    }

    fn eval_slice(
        &mut self,
        object: &Value,
        start: &Option<Box<Expr>>,
        stop: &Option<Box<Expr>>,
        step: &Option<Box<Expr>>,
        scope: ScopeId,
    ) -> Result<Value, EvalError> {
        let start = self.slice_bound(start, scope)?;
        let stop = self.slice_bound(stop, scope)?;
        let step = self.slice_bound(step, scope)?.unwrap_or(1);
        if step == 0 {
            return Err(EvalError::TypeError("Slice step cannot be zero".to_string()));
        }

        match object {
            Value::Array(items) => Ok(Value::Array(slice_of(items, start, stop, step))),
            Value::Tuple(items) => Ok(Value::Tuple(slice_of(items, start, stop, step))),
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let sliced: String = slice_indices(chars.len(), start, stop, step)
                    .into_iter()
                    .map(|i| chars[i])
                    .collect();
                Ok(Value::String(sliced))
            }
            other => Err(EvalError::TypeError(format!(
                "Cannot slice {}",
                other.type_name()
            ))),
        }
    }

    fn slice_bound(
        &mut self,
        bound: &Option<Box<Expr>>,
        scope: ScopeId,
    ) -> Result<Option<i64>, EvalError> {
        match bound {
            None => Ok(None),
            Some(expr) => match self.eval_expr(expr, scope)? {
                Value::Integer(n) => Ok(Some(n)),
                other => Err(EvalError::TypeError(format!(
                    "Slice bounds must be integers, got {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        scope: ScopeId,
    ) -> Result<Value, EvalError> {
        let (positional, kwargs) = self.eval_call_args(args, scope)?;

        // Method-style calls dispatch on the receiver's runtime type
        if let Expr::Member {
            object,
            property,
            computed: false,
        } = callee
        {
            let Expr::Identifier(name) = property.as_ref() else {
                return Err(EvalError::TypeError("Invalid method call".to_string()));
            };
            let receiver = self.eval_expr(object, scope)?;

            // A callable stored as an object member wins over builtins
            if let Value::Object(map) | Value::KeywordArguments(map) = &receiver
                && let Some(member @ Value::Function(_)) = map.get(name.as_str())
            {
                let member = member.clone();
                return self.call_value(member, positional, kwargs);
            }

            return self.call_method(&receiver, name, &positional, &kwargs);
        }

        let callee = self.eval_expr(callee, scope)?;
        self.call_value(callee, positional, kwargs)
    }

    /// Evaluate call arguments into positional values and a keyword map,
    /// expanding `*spread` arguments in place.
    fn eval_call_args(
        &mut self,
        args: &[Expr],
        scope: ScopeId,
    ) -> Result<(Vec<Value>, ValueMap), EvalError> {
        let mut positional = Vec::new();
        let mut kwargs = ValueMap::new();

        for arg in args {
            match arg {
                Expr::KeywordArgument { key, value } => {
                    let value = self.eval_expr(value, scope)?;
                    kwargs.insert(key.clone(), value);
                }
                Expr::Spread(inner) => match self.eval_expr(inner, scope)? {
                    Value::Array(items) | Value::Tuple(items) => positional.extend(items),
                    other => {
                        return Err(EvalError::TypeError(format!(
                            "Cannot spread {}",
                            other.type_name()
                        )));
                    }
                },
                expr => positional.push(self.eval_expr(expr, scope)?),
            }
        }
        Ok((positional, kwargs))
    }

    fn call_value(
        &mut self,
        callee: Value,
        mut positional: Vec<Value>,
        kwargs: ValueMap,
    ) -> Result<Value, EvalError> {
        match callee {
            Value::Function(Function::Native { call, .. }) => {
                // Keyword arguments collapse into a trailing tagged bundle
                if !kwargs.is_empty() {
                    positional.push(Value::KeywordArguments(kwargs));
                }
                call(&positional)
            }
            Value::Function(Function::Macro(m)) => self.invoke_macro(&m, positional, kwargs, None),
            Value::Function(Function::Caller(c)) => self.invoke_caller(&c, positional, kwargs),
            other => Err(EvalError::TypeError(format!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }

    fn invoke_macro(
        &mut self,
        macro_value: &MacroValue,
        positional: Vec<Value>,
        kwargs: ValueMap,
        caller: Option<Value>,
    ) -> Result<Value, EvalError> {
        let scope = self.env.push_child(macro_value.scope);
        if let Some(caller) = caller {
            self.env.set(scope, "caller", caller);
        }
        self.bind_params(
            scope,
            &macro_value.params,
            positional,
            kwargs,
            &macro_value.name,
            true,
        )?;

        Ok(Value::String(expect_output(
            self.eval_block(&macro_value.body, scope)?,
        )?))
    }

    fn invoke_caller(
        &mut self,
        caller: &CallerValue,
        positional: Vec<Value>,
        kwargs: ValueMap,
    ) -> Result<Value, EvalError> {
        let scope = self.env.push_child(caller.scope);
        self.bind_params(scope, &caller.params, positional, kwargs, "caller", false)?;

        Ok(Value::String(expect_output(
            self.eval_block(&caller.body, scope)?,
        )?))
    }

    /// Bind signature parameters against call arguments. A trailing keyword
    /// bundle in positional position supplies fallbacks for unmatched
    /// keyword parameters; missing required parameters error when `strict`.
    fn bind_params(
        &mut self,
        scope: ScopeId,
        params: &[Expr],
        mut positional: Vec<Value>,
        mut kwargs: ValueMap,
        context: &str,
        strict: bool,
    ) -> Result<(), EvalError> {
        if matches!(positional.last(), Some(Value::KeywordArguments(_)))
            && let Some(Value::KeywordArguments(bundle)) = positional.pop()
        {
            for (key, value) in bundle {
                kwargs.entry(key).or_insert(value);
            }
        }

        for (index, param) in params.iter().enumerate() {
            match param {
                Expr::Identifier(name) => {
                    let value = if index < positional.len() {
                        positional[index].clone()
                    } else if let Some(value) = kwargs.get(name.as_str()) {
                        value.clone()
                    } else if strict {
                        return Err(EvalError::ArgumentError(format!(
                            "'{}' missing required argument '{}'",
                            context, name
                        )));
                    } else {
                        Value::Undefined
                    };
                    self.env.set(scope, name, value);
                }
                Expr::KeywordArgument { key, value: default } => {
                    let value = if index < positional.len() {
                        positional[index].clone()
                    } else if let Some(value) = kwargs.get(key.as_str()) {
                        value.clone()
                    } else {
                        self.eval_expr(default, scope)?
                    };
                    self.env.set(scope, key, value);
                }
                _ => {
                    return Err(EvalError::TypeError(format!(
                        "Invalid parameter in '{}'",
                        context
                    )));
                }
            }
        }
        Ok(())
    }

    /// Dispatch member method calls on the receiver's runtime type.
    fn call_method(
        &self,
        receiver: &Value,
        method: &str,
        args: &[Value],
        kwargs: &ValueMap,
    ) -> Result<Value, EvalError> {
        match (receiver, method) {
            // String methods
            (Value::String(s), "upper") => Ok(Value::String(s.to_uppercase())),
            (Value::String(s), "lower") => Ok(Value::String(s.to_lowercase())),
            (Value::String(s), "strip") => Ok(Value::String(s.trim().to_string())),
            (Value::String(s), "title") => Ok(Value::String(string_title(s))),
            (Value::String(s), "capitalize") => Ok(Value::String(string_capitalize(s))),
            (Value::String(s), "startswith") => match args.first() {
                Some(Value::String(prefix)) => Ok(Value::Boolean(s.starts_with(prefix))),
                _ => Err(EvalError::ArgumentError(
                    "startswith() expects a string argument".to_string(),
                )),
            },
            (Value::String(s), "endswith") => match args.first() {
                Some(Value::String(suffix)) => Ok(Value::Boolean(s.ends_with(suffix))),
                _ => Err(EvalError::ArgumentError(
                    "endswith() expects a string argument".to_string(),
                )),
            },
            (Value::String(s), "split") => split_string(s, args),
            (Value::String(s), "replace") => replace_string(s, args),

            // Array methods
            (Value::Array(items) | Value::Tuple(items), "first") => {
                Ok(items.first().cloned().unwrap_or(Value::Undefined))
            }
            (Value::Array(items) | Value::Tuple(items), "last") => {
                Ok(items.last().cloned().unwrap_or(Value::Undefined))
            }
            (Value::Array(items) | Value::Tuple(items), "reverse") => {
                let mut reversed = items.clone();
                reversed.reverse();
                Ok(Value::Array(reversed))
            }
            (Value::Array(items) | Value::Tuple(items), "sort") => {
                Ok(Value::Array(sort_values_with(items, kwargs)?))
            }
            (Value::Array(items) | Value::Tuple(items), "join") => join_values(items, args),
            (Value::Array(items) | Value::Tuple(items), "unique") => {
                Ok(Value::Array(unique_values(items)))
            }

            // Object methods
            (Value::Object(map) | Value::KeywordArguments(map), "get") => {
                match args.first() {
                    Some(Value::String(key)) => Ok(map
                        .get(key)
                        .cloned()
                        .or_else(|| args.get(1).cloned())
                        .unwrap_or(Value::Undefined)),
                    _ => Err(EvalError::ArgumentError(
                        "get() expects a string key".to_string(),
                    )),
                }
            }
            (Value::Object(map) | Value::KeywordArguments(map), "items") => Ok(object_items(map)),
            (Value::Object(map) | Value::KeywordArguments(map), "keys") => Ok(Value::Array(
                map.keys().map(|k| Value::String(k.clone())).collect(),
            )),
            (Value::Object(map) | Value::KeywordArguments(map), "values") => {
                Ok(Value::Array(map.values().cloned().collect()))
            }
            (Value::Object(map) | Value::KeywordArguments(map), "dictsort") => {
                dictsort_entries(map, kwargs)
            }

            _ => Err(EvalError::TypeError(format!(
                "{} has no method '{}'",
                receiver.type_name(),
                method
            ))),
        }
    }

    /// Apply a named filter. Dispatch is keyed by filter name and the
    /// operand's runtime type; a known name on the wrong type is an error.
    fn apply_filter(
        &self,
        value: Value,
        name: &str,
        args: &[Value],
        kwargs: &ValueMap,
    ) -> Result<Value, EvalError> {
        match name {
            "upper" => match value {
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                other => Err(filter_type_error(name, &other)),
            },
            "lower" => match value {
                Value::String(s) => Ok(Value::String(s.to_lowercase())),
                other => Err(filter_type_error(name, &other)),
            },
            "title" => match value {
                Value::String(s) => Ok(Value::String(string_title(&s))),
                other => Err(filter_type_error(name, &other)),
            },
            "capitalize" => match value {
                Value::String(s) => Ok(Value::String(string_capitalize(&s))),
                other => Err(filter_type_error(name, &other)),
            },
            "trim" => match value {
                Value::String(s) => Ok(Value::String(s.trim().to_string())),
                other => Err(filter_type_error(name, &other)),
            },
            "replace" => match value {
                Value::String(s) => replace_string(&s, args),
                other => Err(filter_type_error(name, &other)),
            },
            "indent" => match value {
                Value::String(s) => indent_string(&s, args, kwargs),
                other => Err(filter_type_error(name, &other)),
            },

            "length" | "count" => match &value {
                Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
                Value::Array(items) | Value::Tuple(items) => {
                    Ok(Value::Integer(items.len() as i64))
                }
                Value::Object(map) | Value::KeywordArguments(map) => {
                    Ok(Value::Integer(map.len() as i64))
                }
                other => Err(filter_type_error(name, other)),
            },

            "first" => match &value {
                Value::Array(items) | Value::Tuple(items) => {
                    Ok(items.first().cloned().unwrap_or(Value::Undefined))
                }
                Value::String(s) => Ok(s
                    .chars()
                    .next()
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Undefined)),
                other => Err(filter_type_error(name, other)),
            },
            "last" => match &value {
                Value::Array(items) | Value::Tuple(items) => {
                    Ok(items.last().cloned().unwrap_or(Value::Undefined))
                }
                Value::String(s) => Ok(s
                    .chars()
                    .next_back()
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Undefined)),
                other => Err(filter_type_error(name, other)),
            },
            "reverse" => match &value {
                Value::Array(items) | Value::Tuple(items) => {
                    let mut reversed = items.clone();
                    reversed.reverse();
                    Ok(Value::Array(reversed))
                }
                Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
                other => Err(filter_type_error(name, other)),
            },
            "sort" => match &value {
                Value::Array(items) | Value::Tuple(items) => {
                    Ok(Value::Array(sort_values_with(items, kwargs)?))
                }
                other => Err(filter_type_error(name, other)),
            },
            "join" => match &value {
                Value::Array(items) | Value::Tuple(items) => join_values(items, args),
                other => Err(filter_type_error(name, other)),
            },
            "unique" => match &value {
                Value::Array(items) | Value::Tuple(items) => {
                    Ok(Value::Array(unique_values(items)))
                }
                other => Err(filter_type_error(name, other)),
            },
            "list" => match &value {
                Value::String(s) => Ok(Value::Array(
                    s.chars().map(|c| Value::String(c.to_string())).collect(),
                )),
                Value::Array(items) | Value::Tuple(items) => Ok(Value::Array(items.clone())),
                Value::Object(map) | Value::KeywordArguments(map) => Ok(Value::Array(
                    map.keys().map(|k| Value::String(k.clone())).collect(),
                )),
                other => Err(filter_type_error(name, other)),
            },
            "map" => match &value {
                Value::Array(items) | Value::Tuple(items) => filter_map(items, kwargs),
                other => Err(filter_type_error(name, other)),
            },
            "selectattr" => match &value {
                Value::Array(items) | Value::Tuple(items) => {
                    filter_selectattr(items, args, true)
                }
                other => Err(filter_type_error(name, other)),
            },
            "rejectattr" => match &value {
                Value::Array(items) | Value::Tuple(items) => {
                    filter_selectattr(items, args, false)
                }
                other => Err(filter_type_error(name, other)),
            },

            "items" => match &value {
                Value::Object(map) | Value::KeywordArguments(map) => Ok(object_items(map)),
                other => Err(filter_type_error(name, other)),
            },
            "dictsort" => match &value {
                Value::Object(map) | Value::KeywordArguments(map) => {
                    dictsort_entries(map, kwargs)
                }
                other => Err(filter_type_error(name, other)),
            },

            "abs" => match value {
                Value::Integer(n) => Ok(Value::Integer(n.abs())),
                Value::Float(n) => Ok(Value::Float(n.abs())),
                other => Err(filter_type_error(name, &other)),
            },
            "int" => Ok(filter_int(&value, args, kwargs)),
            "float" => Ok(filter_float(&value, args, kwargs)),
            "string" => Ok(Value::String(value.to_string())),

            "default" => {
                let fallback = kwargs
                    .get("default_value")
                    .or(args.first())
                    .cloned()
                    .unwrap_or(Value::String(String::new()));
                let use_falsy = match (args.get(1), kwargs.get("boolean")) {
                    (Some(Value::Boolean(b)), _) => *b,
                    (_, Some(Value::Boolean(b))) => *b,
                    _ => false,
                };
                let replace = if use_falsy {
                    !value.is_truthy()
                } else {
                    matches!(value, Value::Undefined)
                };
                Ok(if replace { fallback } else { value })
            }

            "tojson" => filter_tojson(&value, kwargs),

            _ => Err(EvalError::UnknownFilter(name.to_string())),
        }
    }
}

fn filter_type_error(name: &str, value: &Value) -> EvalError {
    EvalError::TypeError(format!(
        "Filter '{}' is not defined for {}",
        name,
        value.type_name()
    ))
}

/// The per-iteration `loop` object.
fn loop_metadata(items: &[Value], index: usize) -> ValueMap {
    let length = items.len();
    let mut map = ValueMap::new();
    map.insert("index".to_string(), Value::Integer((index + 1) as i64));
    map.insert("index0".to_string(), Value::Integer(index as i64));
    map.insert(
        "revindex".to_string(),
        Value::Integer((length - index) as i64),
    );
    map.insert(
        "revindex0".to_string(),
        Value::Integer((length - index - 1) as i64),
    );
    map.insert("first".to_string(), Value::Boolean(index == 0));
    map.insert("last".to_string(), Value::Boolean(index == length - 1));
    map.insert("length".to_string(), Value::Integer(length as i64));
    map.insert(
        "previtem".to_string(),
        if index > 0 {
            items[index - 1].clone()
        } else {
            Value::Undefined
        },
    );
    map.insert(
        "nextitem".to_string(),
        items.get(index + 1).cloned().unwrap_or(Value::Undefined),
    );
    map
}

fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Eq => Ok(Value::Boolean(left == right)),
        BinOp::NotEq => Ok(Value::Boolean(left != right)),
        BinOp::Lt => Ok(Value::Boolean(
            compare_values(left, right, false)? == Ordering::Less,
        )),
        BinOp::Gt => Ok(Value::Boolean(
            compare_values(left, right, false)? == Ordering::Greater,
        )),
        BinOp::LtEq => Ok(Value::Boolean(
            compare_values(left, right, false)? != Ordering::Greater,
        )),
        BinOp::GtEq => Ok(Value::Boolean(
            compare_values(left, right, false)? != Ordering::Less,
        )),

        BinOp::Add => match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a + b)),
            (Value::Integer(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
            (Value::Float(a), Value::Integer(b)) => Ok(Value::Float(a + *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::Array(a), Value::Array(b)) => {
                let mut items = a.clone();
                items.extend(b.iter().cloned());
                Ok(Value::Array(items))
            }
            (a, b) => Err(EvalError::TypeError(format!(
                "Cannot add {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
        BinOp::Sub => match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a - b)),
            (Value::Integer(a), Value::Float(b)) => Ok(Value::Float(*a as f64 - b)),
            (Value::Float(a), Value::Integer(b)) => Ok(Value::Float(a - *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
            (a, b) => Err(EvalError::TypeError(format!(
                "Cannot subtract {} from {}",
                b.type_name(),
                a.type_name()
            ))),
        },
        BinOp::Mul => match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a * b)),
            (Value::Integer(a), Value::Float(b)) => Ok(Value::Float(*a as f64 * b)),
            (Value::Float(a), Value::Integer(b)) => Ok(Value::Float(a * *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
            (a, b) => Err(EvalError::TypeError(format!(
                "Cannot multiply {} by {}",
                a.type_name(),
                b.type_name()
            ))),
        },
        // Division always produces a float
        BinOp::Div => match (left.as_f64(), right.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => Err(EvalError::DivisionByZero),
            (Some(a), Some(b)) => Ok(Value::Float(a / b)),
            _ => Err(EvalError::TypeError(format!(
                "Cannot divide {} by {}",
                left.type_name(),
                right.type_name()
            ))),
        },
        BinOp::Mod => match (left, right) {
            (Value::Integer(_), Value::Integer(0)) => Err(EvalError::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a % b)),
            (Value::Integer(a), Value::Float(b)) if *b != 0.0 => {
                Ok(Value::Float(*a as f64 % b))
            }
            (Value::Float(a), Value::Integer(b)) if *b != 0 => {
                Ok(Value::Float(a % *b as f64))
            }
            (Value::Float(a), Value::Float(b)) if *b != 0.0 => Ok(Value::Float(a % b)),
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                Err(EvalError::DivisionByZero)
            }
            (a, b) => Err(EvalError::TypeError(format!(
                "Cannot compute modulo of {} by {}",
                a.type_name(),
                b.type_name()
            ))),
        },

        // String concatenation coerces both sides
        BinOp::Concat => Ok(Value::String(format!("{}{}", left, right))),

        BinOp::In | BinOp::NotIn => {
            let contains = match right {
                Value::Array(items) | Value::Tuple(items) => {
                    items.iter().any(|item| item == left)
                }
                Value::String(s) => match left {
                    Value::String(sub) => s.contains(sub.as_str()),
                    other => {
                        return Err(EvalError::TypeError(format!(
                            "Cannot test {} for membership in a string",
                            other.type_name()
                        )));
                    }
                },
                Value::Object(map) | Value::KeywordArguments(map) => match left {
                    Value::String(key) => map.contains_key(key.as_str()),
                    other => {
                        return Err(EvalError::TypeError(format!(
                            "Cannot test {} for membership in an object",
                            other.type_name()
                        )));
                    }
                },
                // Membership against an absent value degrades instead of
                // erroring: `in` is false, `not in` is true
                Value::Null | Value::Undefined => false,
                other => {
                    return Err(EvalError::TypeError(format!(
                        "Cannot test membership in {}",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Boolean(if op == BinOp::In {
                contains
            } else {
                !contains
            }))
        }

        BinOp::And | BinOp::Or => unreachable!("logical operators are short-circuited"),
    }
}

/// Property and index access on a value.
fn access(object: &Value, key: &Value) -> Result<Value, EvalError> {
    match (object, key) {
        (Value::Object(map) | Value::KeywordArguments(map), Value::String(k)) => {
            Ok(map.get(k).cloned().unwrap_or(Value::Undefined))
        }
        (Value::Array(items) | Value::Tuple(items), Value::Integer(n)) => {
            Ok(seq_index(items, *n).cloned().unwrap_or(Value::Undefined))
        }
        (Value::Array(items) | Value::Tuple(items), Value::String(k)) if k == "length" => {
            Ok(Value::Integer(items.len() as i64))
        }
        (Value::String(s), Value::Integer(n)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(seq_index(&chars, *n)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Undefined))
        }
        (Value::String(s), Value::String(k)) if k == "length" => {
            Ok(Value::Integer(s.chars().count() as i64))
        }
        (Value::Null | Value::Undefined, _) => Err(EvalError::TypeError(format!(
            "Cannot access properties of {}",
            object.type_name()
        ))),
        _ => Err(EvalError::TypeError(format!(
            "Cannot access {} with {} key",
            object.type_name(),
            key.type_name()
        ))),
    }
}

/// Resolve an index with negative-from-the-end semantics.
fn seq_index<T>(items: &[T], index: i64) -> Option<&T> {
    let resolved = if index < 0 {
        let from_end = index.unsigned_abs() as usize;
        if from_end > items.len() {
            return None;
        }
        items.len() - from_end
    } else {
        index as usize
    };
    items.get(resolved)
}

fn slice_of(items: &[Value], start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<Value> {
    slice_indices(items.len(), start, stop, step)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

/// Index sequence for a slice with half-open bounds, negative indices, and
/// negative steps.
fn slice_indices(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let norm = |v: i64| if v < 0 { v + len } else { v };
    let mut result = Vec::new();

    if step > 0 {
        let start = start.map(norm).unwrap_or(0).clamp(0, len);
        let stop = stop.map(norm).unwrap_or(len).clamp(0, len);
        let mut i = start;
        while i < stop {
            result.push(i as usize);
            i += step;
        }
    } else {
        let start = start.map(norm).unwrap_or(len - 1).clamp(-1, len - 1);
        let stop = stop.map(norm).unwrap_or(-1).clamp(-1, len - 1);
        let mut i = start;
        while i > stop {
            result.push(i as usize);
            i += step;
        }
    }
    result
}

fn string_title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut boundary = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if boundary {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(c);
            boundary = true;
        }
    }
    out
}

fn string_capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn split_string(s: &str, args: &[Value]) -> Result<Value, EvalError> {
    let separator = match args.first() {
        None | Some(Value::Null) => None,
        Some(Value::String(sep)) if !sep.is_empty() => Some(sep.as_str()),
        Some(Value::String(_)) => {
            return Err(EvalError::ArgumentError(
                "split() separator cannot be empty".to_string(),
            ));
        }
        Some(other) => {
            return Err(EvalError::ArgumentError(format!(
                "split() separator must be a string, got {}",
                other.type_name()
            )));
        }
    };
    let maxsplit = match args.get(1) {
        None | Some(Value::Integer(-1)) => None,
        Some(Value::Integer(n)) if *n >= 0 => Some(*n as usize),
        Some(other) => {
            return Err(EvalError::ArgumentError(format!(
                "split() maxsplit must be an integer, got {}",
                other.type_name()
            )));
        }
    };

    let parts: Vec<Value> = match (separator, maxsplit) {
        (Some(sep), None) => s.split(sep).map(|p| Value::String(p.to_string())).collect(),
        (Some(sep), Some(max)) => s
            .splitn(max + 1, sep)
            .map(|p| Value::String(p.to_string()))
            .collect(),
        (None, max) => split_whitespace_max(s, max)
            .into_iter()
            .map(Value::String)
            .collect(),
    };
    Ok(Value::Array(parts))
}

fn split_whitespace_max(s: &str, max: Option<usize>) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if max.is_some_and(|m| parts.len() == m) {
            parts.push(rest.to_string());
            return parts;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest.to_string());
                break;
            }
        }
    }
    parts
}

fn replace_string(s: &str, args: &[Value]) -> Result<Value, EvalError> {
    let (Some(Value::String(from)), Some(Value::String(to))) = (args.first(), args.get(1)) else {
        return Err(EvalError::ArgumentError(
            "replace() expects two string arguments".to_string(),
        ));
    };
    match args.get(2) {
        None => Ok(Value::String(s.replace(from, to))),
        Some(Value::Integer(n)) if *n >= 0 => {
            Ok(Value::String(s.replacen(from, to, *n as usize)))
        }
        Some(other) => Err(EvalError::ArgumentError(format!(
            "replace() count must be a non-negative integer, got {}",
            other.type_name()
        ))),
    }
}

fn join_values(items: &[Value], args: &[Value]) -> Result<Value, EvalError> {
    let separator = match args.first() {
        None => "",
        Some(Value::String(sep)) => sep.as_str(),
        Some(other) => {
            return Err(EvalError::ArgumentError(format!(
                "join() separator must be a string, got {}",
                other.type_name()
            )));
        }
    };
    let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    Ok(Value::String(parts.join(separator)))
}

fn unique_values(items: &[Value]) -> Vec<Value> {
    let mut result: Vec<Value> = Vec::new();
    for item in items {
        if !result.contains(item) {
            result.push(item.clone());
        }
    }
    result
}

fn attr_of(item: &Value, attribute: &str) -> Value {
    match item {
        Value::Object(map) | Value::KeywordArguments(map) => {
            map.get(attribute).cloned().unwrap_or(Value::Undefined)
        }
        _ => Value::Undefined,
    }
}

fn kwarg_bool(kwargs: &ValueMap, key: &str, default: bool) -> Result<bool, EvalError> {
    match kwargs.get(key) {
        None => Ok(default),
        Some(Value::Boolean(b)) => Ok(*b),
        Some(other) => Err(EvalError::ArgumentError(format!(
            "'{}' must be a boolean, got {}",
            key,
            other.type_name()
        ))),
    }
}

/// Sort with the shared comparison rule; `reverse`, `case_sensitive`, and
/// `attribute` arrive as keyword arguments.
fn sort_values_with(items: &[Value], kwargs: &ValueMap) -> Result<Vec<Value>, EvalError> {
    let reverse = kwarg_bool(kwargs, "reverse", false)?;
    let case_sensitive = kwarg_bool(kwargs, "case_sensitive", false)?;
    let attribute = match kwargs.get("attribute") {
        None => None,
        Some(Value::String(attr)) => Some(attr.as_str()),
        Some(other) => {
            return Err(EvalError::ArgumentError(format!(
                "'attribute' must be a string, got {}",
                other.type_name()
            )));
        }
    };

    let mut keyed: Vec<(Value, Value)> = items
        .iter()
        .map(|item| {
            let key = match attribute {
                Some(attr) => attr_of(item, attr),
                None => item.clone(),
            };
            (item.clone(), key)
        })
        .collect();

    let mut error = None;
    keyed.sort_by(|(_, a), (_, b)| match compare_values(a, b, case_sensitive) {
        Ok(ordering) => ordering,
        Err(e) => {
            error.get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = error {
        return Err(e);
    }

    let mut sorted: Vec<Value> = keyed.into_iter().map(|(item, _)| item).collect();
    if reverse {
        sorted.reverse();
    }
    Ok(sorted)
}

fn object_items(map: &ValueMap) -> Value {
    Value::Array(
        map.iter()
            .map(|(k, v)| Value::Tuple(vec![Value::String(k.clone()), v.clone()]))
            .collect(),
    )
}

fn dictsort_entries(map: &ValueMap, kwargs: &ValueMap) -> Result<Value, EvalError> {
    let case_sensitive = kwarg_bool(kwargs, "case_sensitive", false)?;
    let reverse = kwarg_bool(kwargs, "reverse", false)?;
    let by_value = match kwargs.get("by") {
        None => false,
        Some(Value::String(by)) if by == "key" => false,
        Some(Value::String(by)) if by == "value" => true,
        Some(_) => {
            return Err(EvalError::ArgumentError(
                "dictsort 'by' must be \"key\" or \"value\"".to_string(),
            ));
        }
    };

    let mut entries: Vec<(String, Value)> =
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

    let mut error = None;
    entries.sort_by(|(ka, va), (kb, vb)| {
        let ordering = if by_value {
            compare_values(va, vb, case_sensitive)
        } else {
            compare_values(
                &Value::String(ka.clone()),
                &Value::String(kb.clone()),
                case_sensitive,
            )
        };
        match ordering {
            Ok(ordering) => ordering,
            Err(e) => {
                error.get_or_insert(e);
                Ordering::Equal
            }
        }
    });
    if let Some(e) = error {
        return Err(e);
    }

    if reverse {
        entries.reverse();
    }
    Ok(Value::Array(
        entries
            .into_iter()
            .map(|(k, v)| Value::Tuple(vec![Value::String(k), v]))
            .collect(),
    ))
}

fn filter_map(items: &[Value], kwargs: &ValueMap) -> Result<Value, EvalError> {
    let Some(Value::String(attribute)) = kwargs.get("attribute") else {
        return Err(EvalError::ArgumentError(
            "map() requires an 'attribute' keyword argument".to_string(),
        ));
    };
    let default = kwargs.get("default");

    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let mut value = attr_of(item, attribute);
        if matches!(value, Value::Undefined)
            && let Some(fallback) = default
        {
            value = fallback.clone();
        }
        result.push(value);
    }
    Ok(Value::Array(result))
}

fn filter_selectattr(items: &[Value], args: &[Value], keep: bool) -> Result<Value, EvalError> {
    let which = if keep { "selectattr" } else { "rejectattr" };
    let Some(Value::String(attribute)) = args.first() else {
        return Err(EvalError::ArgumentError(format!(
            "{}() requires an attribute name",
            which
        )));
    };
    let test = match args.get(1) {
        None => None,
        Some(Value::String(test_name)) => Some(
            lookup_test(test_name).ok_or_else(|| EvalError::UnknownTest(test_name.clone()))?,
        ),
        Some(other) => {
            return Err(EvalError::ArgumentError(format!(
                "{}() test name must be a string, got {}",
                which,
                other.type_name()
            )));
        }
    };
    let test_args = args.get(2..).unwrap_or_default();

    let mut result = Vec::new();
    for item in items {
        let value = attr_of(item, attribute);
        let matched = match test {
            Some(test) => test(&value, test_args)?,
            None => value.is_truthy(),
        };
        if matched == keep {
            result.push(item.clone());
        }
    }
    Ok(Value::Array(result))
}

fn filter_int(value: &Value, args: &[Value], kwargs: &ValueMap) -> Value {
    let default = kwargs
        .get("default")
        .or(args.first())
        .cloned()
        .unwrap_or(Value::Integer(0));
    let converted = match value {
        Value::Integer(n) => Some(*n),
        Value::Float(n) => Some(*n as i64),
        Value::Boolean(b) => Some(*b as i64),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    };
    converted.map(Value::Integer).unwrap_or(default)
}

fn filter_float(value: &Value, args: &[Value], kwargs: &ValueMap) -> Value {
    let default = kwargs
        .get("default")
        .or(args.first())
        .cloned()
        .unwrap_or(Value::Float(0.0));
    let converted = match value {
        Value::Integer(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    converted.map(Value::Float).unwrap_or(default)
}

fn indent_string(s: &str, args: &[Value], kwargs: &ValueMap) -> Result<Value, EvalError> {
    let pad = match kwargs.get("width").or(args.first()) {
        None => "    ".to_string(),
        Some(Value::Integer(n)) if *n >= 0 => " ".repeat(*n as usize),
        Some(Value::String(w)) => w.clone(),
        Some(other) => {
            return Err(EvalError::ArgumentError(format!(
                "indent() width must be an integer or string, got {}",
                other.type_name()
            )));
        }
    };
    let first = match args.get(1) {
        Some(Value::Boolean(b)) => *b,
        _ => kwarg_bool(kwargs, "first", false)?,
    };
    let blank = match args.get(2) {
        Some(Value::Boolean(b)) => *b,
        _ => kwarg_bool(kwargs, "blank", false)?,
    };

    let mut out = String::new();
    for (i, line) in s.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let indent_this = if i == 0 { first } else { blank || !line.is_empty() };
        if indent_this && !(line.is_empty() && !blank) {
            out.push_str(&pad);
        }
        out.push_str(line);
    }
    Ok(Value::String(out))
}

fn filter_tojson(value: &Value, kwargs: &ValueMap) -> Result<Value, EvalError> {
    let indent = match kwargs.get("indent") {
        None | Some(Value::Null) => None,
        Some(Value::Integer(n)) if *n >= 0 => Some(" ".repeat(*n as usize)),
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(EvalError::ArgumentError(format!(
                "tojson 'indent' must be an integer or string, got {}",
                other.type_name()
            )));
        }
    };

    let (mut item_separator, mut key_separator) = if indent.is_some() {
        (",".to_string(), ": ".to_string())
    } else {
        (", ".to_string(), ": ".to_string())
    };
    if let Some(separators) = kwargs.get("separators") {
        match separators {
            Value::Array(parts) | Value::Tuple(parts) if parts.len() == 2 => {
                match (&parts[0], &parts[1]) {
                    (Value::String(item), Value::String(key)) => {
                        item_separator = item.clone();
                        key_separator = key.clone();
                    }
                    _ => {
                        return Err(EvalError::ArgumentError(
                            "tojson 'separators' must be a pair of strings".to_string(),
                        ));
                    }
                }
            }
            _ => {
                return Err(EvalError::ArgumentError(
                    "tojson 'separators' must be a pair of strings".to_string(),
                ));
            }
        }
    }

    let options = DumpOptions {
        indent,
        ensure_ascii: kwarg_bool(kwargs, "ensure_ascii", false)?,
        sort_keys: kwarg_bool(kwargs, "sort_keys", false)?,
        item_separator,
        key_separator,
    };
    Ok(Value::String(dump(value, &options)?))
}
