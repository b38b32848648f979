//! Tree-walking interpreter for dynamic code.
//!
//! Compiled functions close over the global scope only, so a snippet never
//! sees the bindings of whoever invoked it. Globals are read-only.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use hashbrown::HashMap;
use libm::{fabs, fmod, pow};

use super::ast::*;
use super::builtins;
use super::error::{ScriptError, ScriptResult};
use crate::object::{ObjectRef, PlainObject};
use crate::value::{Function, Value};

/// Shared, mutable scope.
pub type ScopeRef = Rc<RefCell<Scope>>;

/// A variable binding.
#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// Lexical scope.
#[derive(Debug, Default)]
pub struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<ScopeRef>,
    /// Receiver for this scope; `None` defers to the parent (arrow functions).
    this: Option<Value>,
}

impl Scope {
    /// Create a child scope.
    pub fn child(parent: &ScopeRef, this: Option<Value>) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(parent.clone()),
            this,
        }))
    }

    fn declare(&mut self, name: &str, value: Value, mutable: bool) {
        self.vars.insert(String::from(name), Binding { value, mutable });
    }
}

fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let mut current = scope.clone();
    loop {
        let next = {
            let s = current.borrow();
            if let Some(binding) = s.vars.get(name) {
                return Some(binding.value.clone());
            }
            s.parent.clone()?
        };
        current = next;
    }
}

fn assign(scope: &ScopeRef, name: &str, value: Value) -> ScriptResult<()> {
    let mut current = scope.clone();
    loop {
        let next = {
            let mut s = current.borrow_mut();
            if let Some(binding) = s.vars.get_mut(name) {
                if !binding.mutable {
                    return Err(ScriptError::type_error(format!(
                        "Assignment to constant variable '{}'",
                        name
                    )));
                }
                binding.value = value;
                return Ok(());
            }
            match s.parent.clone() {
                Some(parent) => parent,
                None => {
                    return Err(ScriptError::reference(format!("{} is not defined", name)));
                }
            }
        };
        current = next;
    }
}

fn this_value(scope: &ScopeRef) -> Value {
    let mut current = scope.clone();
    loop {
        let next = {
            let s = current.borrow();
            if let Some(this) = &s.this {
                return this.clone();
            }
            match s.parent.clone() {
                Some(parent) => parent,
                None => return Value::Undefined,
            }
        };
        current = next;
    }
}

/// A function value created from a literal.
pub struct Closure {
    node: Rc<FunctionNode>,
    env: ScopeRef,
}

impl Closure {
    /// Function name, or empty for anonymous functions.
    pub fn name(&self) -> &str {
        self.node.name.as_deref().unwrap_or("")
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.node.params.len()
    }
}

/// Statement completion.
enum Completion {
    Normal,
    Return(Value),
}

/// Script interpreter.
pub struct Interpreter {
    /// Global scope.
    globals: ScopeRef,
    /// Call stack depth.
    call_depth: usize,
    /// Maximum call stack depth.
    max_call_depth: usize,
    /// Expression depth within the current call.
    eval_depth: usize,
    /// Maximum expression depth within one call.
    max_eval_depth: usize,
}

impl Interpreter {
    /// Create a new interpreter with an empty global scope.
    pub fn new(max_call_depth: usize, max_eval_depth: usize) -> Self {
        let globals = Rc::new(RefCell::new(Scope {
            this: Some(Value::Undefined),
            ..Scope::default()
        }));
        let interp = Interpreter {
            globals,
            call_depth: 0,
            max_call_depth,
            eval_depth: 0,
            max_eval_depth,
        };
        interp.define_global("undefined", Value::Undefined);
        interp.define_global("NaN", Value::Number(f64::NAN));
        interp.define_global("Infinity", Value::Number(f64::INFINITY));
        interp
    }

    /// Define (or replace) a read-only global.
    pub fn define_global(&self, name: &str, value: Value) {
        self.globals.borrow_mut().declare(name, value, false);
    }

    /// Define a native global function.
    pub fn define_native_function<F>(&self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> ScriptResult<Value> + 'static,
    {
        self.define_global(name, Value::Function(Function::native(name, func)));
    }

    /// Read a global.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().vars.get(name).map(|b| b.value.clone())
    }

    /// Turn a compiled literal into a callable bound to the global scope.
    pub fn instantiate(&self, node: Rc<FunctionNode>) -> Function {
        Function::Closure(Rc::new(Closure {
            node,
            env: self.globals.clone(),
        }))
    }

    /// Current call depth.
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Call a function.
    pub fn call_function(&mut self, func: &Function, this: Value, args: &[Value]) -> ScriptResult<Value> {
        if self.call_depth >= self.max_call_depth {
            return Err(ScriptError::range("Maximum call stack size exceeded"));
        }
        self.call_depth += 1;
        let result = match func {
            Function::Native { func, .. } => func(args),
            Function::Closure(closure) => self.call_closure(closure, this, args),
        };
        self.call_depth -= 1;
        result
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, this: Value, args: &[Value]) -> ScriptResult<Value> {
        let node = &closure.node;
        let receiver = if node.is_arrow { None } else { Some(this) };
        let scope = Scope::child(&closure.env, receiver);
        {
            let mut s = scope.borrow_mut();
            if let (false, Some(name)) = (node.is_arrow, &node.name) {
                s.declare(name, Value::Function(Function::Closure(closure.clone())), false);
            }
            for (i, param) in node.params.iter().enumerate() {
                s.declare(param, args.get(i).cloned().unwrap_or_default(), true);
            }
        }

        let outer = core::mem::replace(&mut self.eval_depth, 0);
        let result = match &node.body {
            FunctionBody::Expression(expr) => self.evaluate(expr, &scope),
            FunctionBody::Block(body) => match self.execute_statements(body, &scope) {
                Ok(Completion::Return(value)) => Ok(value),
                Ok(Completion::Normal) => Ok(Value::Undefined),
                Err(err) => Err(err),
            },
        };
        self.eval_depth = outer;
        result
    }

    // ── Statements ─────────────────────────────────────────────────

    fn execute_statements(&mut self, body: &[Statement], scope: &ScopeRef) -> ScriptResult<Completion> {
        // Function declarations are visible throughout their block.
        for stmt in body {
            if let Statement::Function(node) = stmt {
                let func = self.make_closure(node, scope);
                if let Some(name) = &node.name {
                    scope.borrow_mut().declare(name, func, true);
                }
            }
        }
        for stmt in body {
            if let Completion::Return(value) = self.execute(stmt, scope)? {
                return Ok(Completion::Return(value));
            }
        }
        Ok(Completion::Normal)
    }

    fn execute(&mut self, stmt: &Statement, scope: &ScopeRef) -> ScriptResult<Completion> {
        match stmt {
            Statement::Empty | Statement::Function(_) => Ok(Completion::Normal),
            Statement::Expression(expr) => {
                self.evaluate(expr, scope)?;
                Ok(Completion::Normal)
            }
            Statement::Variable { kind, declarations } => {
                for (name, init) in declarations {
                    let value = match init {
                        Some(expr) => self.evaluate(expr, scope)?,
                        None => Value::Undefined,
                    };
                    let mut s = scope.borrow_mut();
                    if *kind != VariableKind::Var && s.vars.contains_key(name.as_str()) {
                        return Err(ScriptError::syntax(format!(
                            "Identifier '{}' has already been declared",
                            name
                        )));
                    }
                    s.declare(name, value, *kind != VariableKind::Const);
                }
                Ok(Completion::Normal)
            }
            Statement::Block(body) => {
                let inner = Scope::child(scope, None);
                self.execute_statements(body, &inner)
            }
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test, scope)?.to_boolean() {
                    self.execute(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.execute(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Statement::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.evaluate(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Throw(expr) => {
                let value = self.evaluate(expr, scope)?;
                Err(ScriptError::Thrown(value.to_js_string()))
            }
        }
    }

    // ── Expressions ────────────────────────────────────────────────

    fn make_closure(&self, node: &Rc<FunctionNode>, scope: &ScopeRef) -> Value {
        Value::Function(Function::Closure(Rc::new(Closure {
            node: node.clone(),
            env: scope.clone(),
        })))
    }

    /// Evaluate an expression.
    pub fn evaluate(&mut self, expr: &Expression, scope: &ScopeRef) -> ScriptResult<Value> {
        if self.eval_depth >= self.max_eval_depth {
            return Err(ScriptError::range("expression nesting too deep"));
        }
        self.eval_depth += 1;
        let result = self.evaluate_inner(expr, scope);
        self.eval_depth -= 1;
        result
    }

    fn evaluate_inner(&mut self, expr: &Expression, scope: &ScopeRef) -> ScriptResult<Value> {
        match expr {
            Expression::Number(n) => Ok(Value::Number(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::BigInt(n) => Ok(Value::BigInt(*n)),
            Expression::Boolean(b) => Ok(Value::Boolean(*b)),
            Expression::Null => Ok(Value::Null),
            Expression::This => Ok(this_value(scope)),
            Expression::Identifier(name) => lookup(scope, name)
                .ok_or_else(|| ScriptError::reference(format!("{} is not defined", name))),
            Expression::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate(element, scope)?);
                }
                Ok(Value::Object(ObjectRef::array(items)))
            }
            Expression::Object(properties) => {
                let obj = PlainObject::new();
                for (key, value) in properties {
                    let value = self.evaluate(value, scope)?;
                    obj.insert(key.clone(), value);
                }
                Ok(Value::Object(ObjectRef::new(obj)))
            }
            Expression::Function(node) => Ok(self.make_closure(node, scope)),
            Expression::Unary { operator, argument } => {
                if let (UnaryOp::Typeof, Expression::Identifier(name)) = (operator, argument.as_ref()) {
                    let value = lookup(scope, name).unwrap_or_default();
                    return Ok(Value::string(value.type_of()));
                }
                let value = self.evaluate(argument, scope)?;
                unary_op(*operator, &value)
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left, scope)?;
                let right = self.evaluate(right, scope)?;
                binary_op(*operator, &left, &right)
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left, scope)?;
                let short_circuit = match operator {
                    LogicalOp::And => !left.to_boolean(),
                    LogicalOp::Or => left.to_boolean(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right, scope)
                }
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test, scope)?.to_boolean() {
                    self.evaluate(consequent, scope)
                } else {
                    self.evaluate(alternate, scope)
                }
            }
            Expression::Assign {
                operator,
                target,
                value,
            } => self.evaluate_assignment(*operator, target, value, scope),
            Expression::Member { object, property } => {
                let object = self.evaluate(object, scope)?;
                let key = self.property_key(property, scope)?;
                get_property(&object, &key)
            }
            Expression::Call { callee, arguments } => {
                let mut args = Vec::with_capacity(arguments.len());
                if let Expression::Member { object, property } = callee.as_ref() {
                    let object = self.evaluate(object, scope)?;
                    let key = self.property_key(property, scope)?;
                    for arg in arguments {
                        args.push(self.evaluate(arg, scope)?);
                    }
                    return self.call_method(&object, &key, &args);
                }
                let func = self.evaluate(callee, scope)?;
                for arg in arguments {
                    args.push(self.evaluate(arg, scope)?);
                }
                match func {
                    Value::Function(f) => self.call_function(&f, Value::Undefined, &args),
                    Value::Object(obj) if obj.is_callable() => obj.call(&args),
                    other => Err(ScriptError::type_error(format!(
                        "{} is not a function",
                        describe_callee(callee, &other)
                    ))),
                }
            }
        }
    }

    fn property_key(&mut self, property: &MemberProperty, scope: &ScopeRef) -> ScriptResult<String> {
        match property {
            MemberProperty::Named(name) => Ok(name.clone()),
            MemberProperty::Computed(expr) => Ok(self.evaluate(expr, scope)?.to_js_string()),
        }
    }

    fn evaluate_assignment(
        &mut self,
        operator: Option<BinaryOp>,
        target: &Expression,
        value: &Expression,
        scope: &ScopeRef,
    ) -> ScriptResult<Value> {
        match target {
            Expression::Identifier(name) => {
                let mut result = self.evaluate(value, scope)?;
                if let Some(op) = operator {
                    let current = lookup(scope, name)
                        .ok_or_else(|| ScriptError::reference(format!("{} is not defined", name)))?;
                    result = binary_op(op, &current, &result)?;
                }
                assign(scope, name, result.clone())?;
                Ok(result)
            }
            Expression::Member { object, property } => {
                let object = self.evaluate(object, scope)?;
                let key = self.property_key(property, scope)?;
                let mut result = self.evaluate(value, scope)?;
                if let Some(op) = operator {
                    let current = get_property(&object, &key)?;
                    result = binary_op(op, &current, &result)?;
                }
                match &object {
                    Value::Object(obj) => obj.set(&key, result.clone())?,
                    other => {
                        return Err(ScriptError::type_error(format!(
                            "Cannot set properties of {} (setting '{}')",
                            other.to_js_string(),
                            key
                        )));
                    }
                }
                Ok(result)
            }
            _ => Err(ScriptError::syntax("invalid assignment target")),
        }
    }

    /// Call `object[key](...args)` with `object` as receiver.
    pub fn call_method(&mut self, object: &Value, key: &str, args: &[Value]) -> ScriptResult<Value> {
        match object {
            Value::Object(obj) => match obj.get(key)? {
                Value::Function(f) => self.call_function(&f, object.clone(), args),
                Value::Object(method) if method.is_callable() => method.call(args),
                Value::Undefined => obj.call_method(key, args),
                other => Err(ScriptError::type_error(format!(
                    "{}.{} is not a function (got {})",
                    obj.class_name(),
                    key,
                    other.type_of()
                ))),
            },
            Value::Function(f) => match key {
                "call" => {
                    let this = args.first().cloned().unwrap_or_default();
                    let rest = args.get(1..).unwrap_or(&[]);
                    self.call_function(f, this, rest)
                }
                "toString" => Ok(Value::String(object.to_js_string())),
                _ => Err(ScriptError::type_error(format!(
                    "{}.{} is not a function",
                    f.name(),
                    key
                ))),
            },
            Value::Undefined | Value::Null => Err(ScriptError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                object.to_js_string(),
                key
            ))),
            primitive => builtins::primitive_method(primitive, key, args),
        }
    }
}

fn describe_callee(callee: &Expression, value: &Value) -> String {
    match callee {
        Expression::Identifier(name) => name.clone(),
        _ => value.to_js_string(),
    }
}

/// Read `object[key]`.
pub fn get_property(object: &Value, key: &str) -> ScriptResult<Value> {
    match object {
        Value::Object(obj) => obj.get(key),
        Value::String(s) => {
            if key == "length" {
                return Ok(Value::Number(s.encode_utf16().count() as f64));
            }
            Ok(key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.into()))
                .unwrap_or_default())
        }
        Value::Bytes(bytes) => {
            if key == "length" {
                return Ok(Value::Number(bytes.len() as f64));
            }
            Ok(key
                .parse::<usize>()
                .ok()
                .and_then(|i| bytes.get(i))
                .map(|b| Value::Number(*b as f64))
                .unwrap_or_default())
        }
        Value::Function(f) => Ok(match (key, f) {
            ("name", _) => Value::string(f.name()),
            ("length", Function::Closure(c)) => Value::Number(c.arity() as f64),
            _ => Value::Undefined,
        }),
        Value::Undefined | Value::Null => Err(ScriptError::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            object.to_js_string(),
            key
        ))),
        _ => Ok(Value::Undefined),
    }
}

/// Apply a unary operator.
pub fn unary_op(op: UnaryOp, value: &Value) -> ScriptResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Boolean(!value.to_boolean())),
        UnaryOp::Typeof => Ok(Value::string(value.type_of())),
        UnaryOp::Plus => Ok(Value::Number(value.to_number()?)),
        UnaryOp::Minus => match value {
            Value::BigInt(n) => n
                .checked_neg()
                .map(Value::BigInt)
                .ok_or_else(|| ScriptError::range("BigInt overflow")),
            other => Ok(Value::Number(-other.to_number()?)),
        },
    }
}

fn is_string_like(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Bytes(_) | Value::Object(_) | Value::Function(_)
    )
}

fn bigint_op(op: BinaryOp, a: i64, b: i64) -> ScriptResult<Value> {
    let overflow = || ScriptError::range("BigInt overflow");
    let result = match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOp::Div | BinaryOp::Mod if b == 0 => {
            return Err(ScriptError::range("Division by zero"));
        }
        BinaryOp::Div => a.checked_div(b).ok_or_else(overflow)?,
        BinaryOp::Mod => a.checked_rem(b).ok_or_else(overflow)?,
        BinaryOp::Exp => {
            let exp = u32::try_from(b)
                .map_err(|_| ScriptError::range("Exponent must be non-negative"))?;
            a.checked_pow(exp).ok_or_else(overflow)?
        }
        _ => return Err(ScriptError::type_error("not an arithmetic operator")),
    };
    Ok(Value::BigInt(result))
}

fn number_op(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => fmod(a, b),
        BinaryOp::Exp => {
            if b.is_nan() || (fabs(a) == 1.0 && b.is_infinite()) {
                f64::NAN
            } else {
                pow(a, b)
            }
        }
        _ => f64::NAN,
    }
}

fn compare(left: &Value, right: &Value) -> ScriptResult<Option<Ordering>> {
    Ok(match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
        (Value::BigInt(a), other) => (*a as f64).partial_cmp(&other.to_number()?),
        (other, Value::BigInt(b)) => other.to_number()?.partial_cmp(&(*b as f64)),
        _ => left.to_number()?.partial_cmp(&right.to_number()?),
    })
}

/// Apply a binary operator.
pub fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    match op {
        BinaryOp::Equal => return Ok(Value::Boolean(left.abstract_equals(right))),
        BinaryOp::NotEqual => return Ok(Value::Boolean(!left.abstract_equals(right))),
        BinaryOp::StrictEqual => return Ok(Value::Boolean(left.strict_equals(right))),
        BinaryOp::StrictNotEqual => return Ok(Value::Boolean(!left.strict_equals(right))),
        BinaryOp::LessThan => {
            return Ok(Value::Boolean(compare(left, right)? == Some(Ordering::Less)));
        }
        BinaryOp::LessEqual => {
            return Ok(Value::Boolean(matches!(
                compare(left, right)?,
                Some(Ordering::Less | Ordering::Equal)
            )));
        }
        BinaryOp::GreaterThan => {
            return Ok(Value::Boolean(compare(left, right)? == Some(Ordering::Greater)));
        }
        BinaryOp::GreaterEqual => {
            return Ok(Value::Boolean(matches!(
                compare(left, right)?,
                Some(Ordering::Greater | Ordering::Equal)
            )));
        }
        _ => {}
    }

    if op == BinaryOp::Add && (is_string_like(left) || is_string_like(right)) {
        let mut text = left.to_js_string();
        text.push_str(&right.to_js_string());
        return Ok(Value::String(text));
    }

    match (left, right) {
        (Value::BigInt(a), Value::BigInt(b)) => bigint_op(op, *a, *b),
        (Value::BigInt(_), _) | (_, Value::BigInt(_)) => Err(ScriptError::type_error(
            "Cannot mix BigInt and other types, use explicit conversions",
        )),
        _ => Ok(Value::Number(number_op(
            op,
            left.to_number()?,
            right.to_number()?,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_function;
    use alloc::boxed::Box;
    use alloc::vec;

    fn run(source: &str, args: &[Value]) -> ScriptResult<Value> {
        let mut interp = Interpreter::new(64, 64);
        let func = interp.instantiate(parse_function(source)?);
        interp.call_function(&func, Value::Object(ObjectRef::plain()), args)
    }

    #[test]
    fn test_add_numbers() {
        let result = run("(a, b) => a + b", &[Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(result.unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_string_concat_and_coercion() {
        assert_eq!(
            run("(a, b) => a + b", &[Value::string("n="), Value::Number(1.5)]).unwrap(),
            Value::string("n=1.5")
        );
        assert_eq!(
            run("() => '3' * '4'", &[]).unwrap(),
            Value::Number(12.0)
        );
    }

    #[test]
    fn test_bigint_arithmetic() {
        assert_eq!(run("(a) => a * 2n + 1n", &[Value::BigInt(20)]).unwrap(), Value::BigInt(41));
        assert!(matches!(
            run("(a) => a + 1", &[Value::BigInt(1)]),
            Err(ScriptError::TypeError(_))
        ));
        assert!(matches!(
            run("() => 1n / 0n", &[]),
            Err(ScriptError::RangeError(_))
        ));
        assert!(matches!(
            run("(a) => a + 1n", &[Value::BigInt(i64::MAX)]),
            Err(ScriptError::RangeError(_))
        ));
    }

    #[test]
    fn test_block_body_with_locals() {
        let source = "function (n) {
            let total = 0;
            const step = 2;
            if (n > 3) { total = n * step; } else total = -1;
            return total;
        }";
        assert_eq!(run(source, &[Value::Number(5.0)]).unwrap(), Value::Number(10.0));
        assert_eq!(run(source, &[Value::Number(1.0)]).unwrap(), Value::Number(-1.0));
    }

    #[test]
    fn test_const_and_globals_are_read_only() {
        assert!(matches!(
            run("() => { const x = 1; x = 2; }", &[]),
            Err(ScriptError::TypeError(_))
        ));
        assert!(matches!(
            run("() => { undefined = 1; }", &[]),
            Err(ScriptError::TypeError(_))
        ));
        assert!(matches!(
            run("() => { y = 1; }", &[]),
            Err(ScriptError::ReferenceError(_))
        ));
    }

    #[test]
    fn test_closures_capture_scope() {
        let source = "(start) => { let n = start; const inc = (by) => { n += by; return n; }; inc(1); return inc(10); }";
        assert_eq!(run(source, &[Value::Number(5.0)]).unwrap(), Value::Number(16.0));
    }

    #[test]
    fn test_receiver_is_fresh_object_for_function_form() {
        assert_eq!(run("function () { return typeof this; }", &[]).unwrap(), Value::string("object"));
        assert_eq!(run("() => this", &[]).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_logical_and_conditional() {
        assert_eq!(run("(a) => a ?? 'd'", &[Value::Null]).unwrap(), Value::string("d"));
        assert_eq!(run("(a) => a || 'd'", &[Value::Number(0.0)]).unwrap(), Value::string("d"));
        assert_eq!(run("(a) => a && 'd'", &[Value::Number(0.0)]).unwrap(), Value::Number(0.0));
        assert_eq!(run("(a) => a ? 1 : 2", &[Value::string("")]).unwrap(), Value::Number(2.0));
        assert_eq!(run("() => typeof missing", &[]).unwrap(), Value::string("undefined"));
    }

    #[test]
    fn test_objects_and_arrays() {
        let arr = run("() => { const a = [1, 2]; a.push(3); a[5] = 9; return a; }", &[]).unwrap();
        let arr = arr.as_object().unwrap().clone();
        assert_eq!(arr.get("length").unwrap(), Value::Number(6.0));

        let value = run("() => { const o = { k: 1 }; o.k += 4; o['z'] = o.k; return o.z; }", &[]).unwrap();
        assert_eq!(value, Value::Number(5.0));

        let value = run("() => { const o = { f(x) { return this.base + x; }, base: 10 }; return o.f(1); }", &[]).unwrap();
        assert_eq!(value, Value::Number(11.0));
    }

    #[test]
    fn test_throw_and_runtime_errors() {
        assert_eq!(
            run("() => { throw 'boom'; }", &[]),
            Err(ScriptError::Thrown("boom".into()))
        );
        assert!(matches!(
            run("(a) => a.b", &[Value::Undefined]),
            Err(ScriptError::TypeError(_))
        ));
        assert!(matches!(
            run("() => nothing()", &[]),
            Err(ScriptError::ReferenceError(_))
        ));
        assert!(matches!(
            run("(a) => a()", &[Value::Number(1.0)]),
            Err(ScriptError::TypeError(_))
        ));
    }

    #[test]
    fn test_recursion_depth_limit() {
        let source = "() => { function f(n) { return f(n + 1); } return f(0); }";
        assert!(matches!(run(source, &[]), Err(ScriptError::RangeError(_))));

        let source = "(n) => { function fact(k) { return k <= 1 ? 1 : k * fact(k - 1); } return fact(n); }";
        assert_eq!(run(source, &[Value::Number(5.0)]).unwrap(), Value::Number(120.0));
    }

    #[test]
    fn test_expression_depth_limit() {
        // Deeper than anything the parser accepts, built by hand.
        let mut expr = Expression::Number(1.0);
        for _ in 0..100 {
            expr = Expression::Unary {
                operator: UnaryOp::Minus,
                argument: Box::new(expr),
            };
        }
        let mut interp = Interpreter::new(64, 32);
        let scope = interp.globals.clone();
        let err = interp.evaluate(&expr, &scope).unwrap_err();
        assert!(matches!(err, ScriptError::RangeError(_)));
        assert_eq!(interp.eval_depth, 0);

        // Each call gets its own budget.
        let source = "(n) => { function f(k) { return k <= 0 ? 0 : 1 + f(k - 1); } return f(n); }";
        let mut interp = Interpreter::new(64, 8);
        let func = interp.instantiate(parse_function(source).unwrap());
        let result = interp.call_function(&func, Value::Undefined, &[Value::Number(20.0)]);
        assert_eq!(result.unwrap(), Value::Number(20.0));
    }

    #[test]
    fn test_string_properties() {
        assert_eq!(run("(s) => s.length", &[Value::string("héllo")]).unwrap(), Value::Number(5.0));
        assert_eq!(run("(s) => s[1]", &[Value::string("abc")]).unwrap(), Value::string("b"));
        assert_eq!(
            run("(b) => b.length + b[1]", &[Value::Bytes(vec![1, 2, 3])]).unwrap(),
            Value::Number(5.0)
        );
    }

    #[test]
    fn test_equality_operators() {
        assert_eq!(run("() => 1 == '1'", &[]).unwrap(), Value::Boolean(true));
        assert_eq!(run("() => 1 === '1'", &[]).unwrap(), Value::Boolean(false));
        assert_eq!(run("() => null == undefined", &[]).unwrap(), Value::Boolean(true));
        assert_eq!(run("() => 'a' < 'b'", &[]).unwrap(), Value::Boolean(true));
        assert_eq!(run("() => NaN >= NaN", &[]).unwrap(), Value::Boolean(false));
        assert_eq!(run("() => 2 ** 10 % 1000", &[]).unwrap(), Value::Number(24.0));
    }
}
