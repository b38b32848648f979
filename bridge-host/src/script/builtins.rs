//! Built-in globals.
//!
//! Which groups are installed is decided by [`Capabilities`]; `Error`,
//! `undefined`, `NaN` and `Infinity` are always present.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use libm::{
    atan2, cbrt, ceil, cos, exp, fabs, floor, hypot, log, log10, log2, pow, sin, sqrt, tan, trunc,
};

use super::error::{ScriptError, ScriptResult};
use super::interpreter::Interpreter;
use crate::config::Capabilities;
use crate::object::{HostObject, ObjectRef};
use crate::value::{number_to_string, Function, Value};

/// Install the globals allowed by `capabilities`.
pub fn install(interp: &Interpreter, capabilities: Capabilities) {
    interp.define_native_function("Error", error_constructor);

    if capabilities.contains(Capabilities::CONSOLE) {
        init_console(interp);
    }
    if capabilities.contains(Capabilities::MATH) {
        init_math(interp);
    }
    if capabilities.contains(Capabilities::CONVERSIONS) {
        init_conversions(interp);
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn num_arg(args: &[Value], i: usize) -> ScriptResult<f64> {
    arg(args, i).to_number()
}

/// A read-only bag of functions and constants, like `Math`.
pub struct Namespace {
    name: &'static str,
    members: Vec<(&'static str, Value)>,
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new(name: &'static str) -> Self {
        Namespace {
            name,
            members: Vec::new(),
        }
    }

    /// Add a constant.
    pub fn constant(mut self, key: &'static str, value: Value) -> Self {
        self.members.push((key, value));
        self
    }

    /// Add a function.
    pub fn function<F>(mut self, key: &'static str, func: F) -> Self
    where
        F: Fn(&[Value]) -> ScriptResult<Value> + 'static,
    {
        self.members
            .push((key, Value::Function(Function::native(key, func))));
        self
    }
}

impl HostObject for Namespace {
    fn class_name(&self) -> &'static str {
        self.name
    }

    fn get(&self, key: &str) -> ScriptResult<Value> {
        Ok(self
            .members
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Error

/// Value produced by `Error(message)` / `new Error(message)`.
pub struct ErrorObject {
    message: String,
}

impl ErrorObject {
    /// Create an error object.
    pub fn new(message: impl Into<String>) -> Self {
        ErrorObject {
            message: message.into(),
        }
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl HostObject for ErrorObject {
    fn class_name(&self) -> &'static str {
        "Error"
    }

    fn get(&self, key: &str) -> ScriptResult<Value> {
        Ok(match key {
            "name" => Value::string("Error"),
            "message" => Value::string(self.message.as_str()),
            _ => Value::Undefined,
        })
    }

    fn to_display_string(&self) -> String {
        if self.message.is_empty() {
            String::from("Error")
        } else {
            format!("Error: {}", self.message)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn error_constructor(args: &[Value]) -> ScriptResult<Value> {
    let message = match arg(args, 0) {
        Value::Undefined => String::new(),
        other => other.to_js_string(),
    };
    Ok(Value::Object(ObjectRef::new(ErrorObject::new(message))))
}

// Console

fn console_text(args: &[Value]) -> String {
    let parts: Vec<String> = args.iter().map(Value::to_js_string).collect();
    parts.join(" ")
}

fn init_console(interp: &Interpreter) {
    let console = Namespace::new("console")
        .function("log", |args| {
            log::info!(target: "bridge::console", "{}", console_text(args));
            Ok(Value::Undefined)
        })
        .function("info", |args| {
            log::info!(target: "bridge::console", "{}", console_text(args));
            Ok(Value::Undefined)
        })
        .function("debug", |args| {
            log::debug!(target: "bridge::console", "{}", console_text(args));
            Ok(Value::Undefined)
        })
        .function("warn", |args| {
            log::warn!(target: "bridge::console", "{}", console_text(args));
            Ok(Value::Undefined)
        })
        .function("error", |args| {
            log::error!(target: "bridge::console", "{}", console_text(args));
            Ok(Value::Undefined)
        });
    interp.define_global("console", Value::Object(ObjectRef::new(console)));
}

// Math

fn unary_math(f: fn(f64) -> f64) -> impl Fn(&[Value]) -> ScriptResult<Value> {
    move |args| Ok(Value::Number(f(num_arg(args, 0)?)))
}

fn math_round(x: f64) -> f64 {
    if x.is_nan() || x.is_infinite() {
        return x;
    }
    floor(x + 0.5)
}

fn math_sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else if x > 0.0 {
        1.0
    } else {
        -1.0
    }
}

fn math_extremum(args: &[Value], want_max: bool) -> ScriptResult<Value> {
    let mut result = if want_max {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    };
    for value in args {
        let n = value.to_number()?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if (want_max && n > result) || (!want_max && n < result) {
            result = n;
        }
    }
    Ok(Value::Number(result))
}

fn init_math(interp: &Interpreter) {
    let math = Namespace::new("Math")
        .constant("PI", Value::Number(core::f64::consts::PI))
        .constant("E", Value::Number(core::f64::consts::E))
        .constant("LN2", Value::Number(core::f64::consts::LN_2))
        .constant("SQRT2", Value::Number(core::f64::consts::SQRT_2))
        .function("abs", unary_math(fabs))
        .function("floor", unary_math(floor))
        .function("ceil", unary_math(ceil))
        .function("round", unary_math(math_round))
        .function("trunc", unary_math(trunc))
        .function("sign", unary_math(math_sign))
        .function("sqrt", unary_math(sqrt))
        .function("cbrt", unary_math(cbrt))
        .function("sin", unary_math(sin))
        .function("cos", unary_math(cos))
        .function("tan", unary_math(tan))
        .function("log", unary_math(log))
        .function("log2", unary_math(log2))
        .function("log10", unary_math(log10))
        .function("exp", unary_math(exp))
        .function("pow", |args| Ok(Value::Number(pow(num_arg(args, 0)?, num_arg(args, 1)?))))
        .function("atan2", |args| {
            Ok(Value::Number(atan2(num_arg(args, 0)?, num_arg(args, 1)?)))
        })
        .function("hypot", |args| {
            Ok(Value::Number(hypot(num_arg(args, 0)?, num_arg(args, 1)?)))
        })
        .function("min", |args| math_extremum(args, false))
        .function("max", |args| math_extremum(args, true));
    interp.define_global("Math", Value::Object(ObjectRef::new(math)));
}

// Conversions

fn to_bigint(value: &Value) -> ScriptResult<Value> {
    match value {
        Value::BigInt(n) => Ok(Value::BigInt(*n)),
        Value::Boolean(b) => Ok(Value::BigInt(*b as i64)),
        Value::Number(n) => {
            if trunc(*n) != *n || fabs(*n) >= 9.223_372_036_854_775_807e18 {
                return Err(ScriptError::range(format!(
                    "The number {} cannot be converted to a BigInt",
                    number_to_string(*n)
                )));
            }
            Ok(Value::BigInt(*n as i64))
        }
        Value::String(s) => {
            let s = s.trim();
            let parsed = if s.is_empty() { Some(0) } else { s.parse::<i64>().ok() };
            parsed
                .map(Value::BigInt)
                .ok_or_else(|| ScriptError::syntax(format!("Cannot convert {} to a BigInt", s)))
        }
        other => Err(ScriptError::type_error(format!(
            "Cannot convert {} to a BigInt",
            other.to_js_string()
        ))),
    }
}

fn parse_int(args: &[Value]) -> ScriptResult<Value> {
    let text = arg(args, 0).to_js_string();
    let mut radix = match arg(args, 1) {
        Value::Undefined => 0,
        other => other.to_integer()?,
    };
    let mut rest = text.trim_start();
    let negative = rest.starts_with('-');
    if let Some(stripped) = rest.strip_prefix('-').or_else(|| rest.strip_prefix('+')) {
        rest = stripped;
    }
    if radix == 0 || radix == 16 {
        if let Some(stripped) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            rest = stripped;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let radix = radix as u32;

    let mut result = 0.0;
    let mut any = false;
    for c in rest.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                result = result * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    if !any {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(if negative { -result } else { result }))
}

fn parse_float(args: &[Value]) -> ScriptResult<Value> {
    let text = arg(args, 0).to_js_string();
    let text = text.trim_start();
    let unsigned = text.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") {
        let negative = text.starts_with('-');
        return Ok(Value::Number(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }));
    }
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .map_or(text.len(), |(i, _)| i);
    let candidate = &text[..end];
    // Longest prefix that parses.
    for len in (1..=candidate.len()).rev() {
        if let Ok(n) = candidate[..len].parse::<f64>() {
            return Ok(Value::Number(n));
        }
    }
    Ok(Value::Number(f64::NAN))
}

fn init_conversions(interp: &Interpreter) {
    interp.define_native_function("String", |args| {
        Ok(Value::String(match args.first() {
            Some(v) => v.to_js_string(),
            None => String::new(),
        }))
    });
    interp.define_native_function("Number", |args| {
        Ok(Value::Number(match args.first() {
            Some(Value::BigInt(n)) => *n as f64,
            Some(v) => v.to_number()?,
            None => 0.0,
        }))
    });
    interp.define_native_function("Boolean", |args| Ok(Value::Boolean(arg(args, 0).to_boolean())));
    interp.define_native_function("BigInt", |args| to_bigint(&arg(args, 0)));
    interp.define_native_function("isNaN", |args| Ok(Value::Boolean(num_arg(args, 0)?.is_nan())));
    interp.define_native_function("isFinite", |args| {
        Ok(Value::Boolean(num_arg(args, 0)?.is_finite()))
    });
    interp.define_native_function("parseInt", parse_int);
    interp.define_native_function("parseFloat", parse_float);
}

// Primitive methods

fn char_slice(s: &str, start: i64, end: i64) -> String {
    let len = s.chars().count() as i64;
    let clamp = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
    let (start, end) = (clamp(start), clamp(end));
    if start >= end {
        return String::new();
    }
    s.chars()
        .skip(start as usize)
        .take((end - start) as usize)
        .collect()
}

fn char_index(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

fn string_method(s: &str, key: &str, args: &[Value]) -> ScriptResult<Value> {
    let text_arg = |i: usize| arg(args, i).to_js_string();
    let value = match key {
        "toString" | "valueOf" => Value::string(s),
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::string(s.trim()),
        "trimStart" => Value::string(s.trim_start()),
        "trimEnd" => Value::string(s.trim_end()),
        "includes" => Value::Boolean(s.contains(text_arg(0).as_str())),
        "startsWith" => Value::Boolean(s.starts_with(text_arg(0).as_str())),
        "endsWith" => Value::Boolean(s.ends_with(text_arg(0).as_str())),
        "indexOf" => Value::Number(
            s.find(text_arg(0).as_str())
                .map_or(-1.0, |b| char_index(s, b) as f64),
        ),
        "charAt" => {
            let i = arg(args, 0).to_integer()?;
            let c = usize::try_from(i).ok().and_then(|i| s.chars().nth(i));
            Value::String(c.map(String::from).unwrap_or_default())
        }
        "slice" => {
            let len = s.chars().count() as i64;
            let start = arg(args, 0).to_integer()?;
            let end = match arg(args, 1) {
                Value::Undefined => len,
                other => other.to_integer()?,
            };
            Value::String(char_slice(s, start, end))
        }
        "split" => {
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => alloc::vec![Value::string(s)],
                sep => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::String(c.into())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::string).collect()
                    }
                }
            };
            Value::Object(ObjectRef::array(parts))
        }
        "concat" => {
            let mut out = String::from(s);
            for value in args {
                out.push_str(&value.to_js_string());
            }
            Value::String(out)
        }
        "repeat" => {
            let count = arg(args, 0).to_integer()?;
            let count = usize::try_from(count)
                .map_err(|_| ScriptError::range(format!("Invalid count value: {}", count)))?;
            Value::String(s.repeat(count))
        }
        _ => {
            return Err(ScriptError::type_error(format!(
                "String.{} is not a function",
                key
            )))
        }
    };
    Ok(value)
}

fn to_radix(n: f64, radix: u32) -> String {
    if n.is_nan() || n.is_infinite() || trunc(n) != n || radix == 10 {
        return number_to_string(n);
    }
    let negative = n < 0.0;
    let mut magnitude = fabs(n) as u128;
    if magnitude == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        let d = (magnitude % radix as u128) as u32;
        digits.push(core::char::from_digit(d, radix).unwrap_or('0'));
        magnitude /= radix as u128;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn number_method(n: f64, key: &str, args: &[Value]) -> ScriptResult<Value> {
    match key {
        "toString" => {
            let radix = match arg(args, 0) {
                Value::Undefined => 10,
                other => other.to_integer()?,
            };
            if !(2..=36).contains(&radix) {
                return Err(ScriptError::range(
                    "toString() radix must be between 2 and 36",
                ));
            }
            Ok(Value::String(to_radix(n, radix as u32)))
        }
        "toFixed" => {
            let digits = arg(args, 0).to_integer()?;
            if !(0..=100).contains(&digits) {
                return Err(ScriptError::range(
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            if !n.is_finite() {
                return Ok(Value::String(number_to_string(n)));
            }
            Ok(Value::String(format!("{:.*}", digits as usize, n)))
        }
        "valueOf" => Ok(Value::Number(n)),
        _ => Err(ScriptError::type_error(format!(
            "Number.{} is not a function",
            key
        ))),
    }
}

/// Methods on primitive receivers (`"abc".toUpperCase()`, `(1.5).toFixed(1)`).
pub fn primitive_method(value: &Value, key: &str, args: &[Value]) -> ScriptResult<Value> {
    match value {
        Value::String(s) => string_method(s, key, args),
        Value::Number(n) => number_method(*n, key, args),
        other if key == "toString" => Ok(Value::String(other.to_js_string())),
        other => Err(ScriptError::type_error(format!(
            "{}.{} is not a function",
            other.type_of(),
            key
        ))),
    }
}
