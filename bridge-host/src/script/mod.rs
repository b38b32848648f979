//! Dynamic code evaluation.
//!
//! Guests send source text for a single function literal, either
//! `(a, b) => a + b` or `function (a) { ... }`. The text is compiled once
//! (and cached), then called with the decoded arguments.
//!
//! # Supported language
//!
//! - `const`/`let`/`var`, `if`/`else`, blocks, `return`, `throw`
//! - number, string, BigInt (`42n`), boolean, `null`, array and object literals
//! - member access, calls, method calls, nested functions and closures
//! - arithmetic, comparison, equality, `!`, `typeof`, `&&`, `||`, `??`, `?:`
//! - assignment and compound assignment (`+=`, `-=`, `*=`, `/=`)
//!
//! Compiled functions see only the host globals, never the caller's state.

pub mod ast;
pub mod builtins;
pub mod cache;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod token;

pub use cache::{CacheStats, ScriptCache};
pub use error::{ScriptError, ScriptResult};
pub use interpreter::{Closure, Interpreter};
pub use parser::{parse_function, parse_function_with_limit};

use crate::config::BridgeConfig;
use crate::value::{Function, Value};

/// Compiler plus interpreter, sharing one set of globals.
pub struct ScriptEngine {
    interpreter: Interpreter,
    cache: ScriptCache,
    max_nesting: usize,
}

impl ScriptEngine {
    /// Create an engine with the globals `config` allows.
    pub fn new(config: &BridgeConfig) -> Self {
        let interpreter = Interpreter::new(config.max_call_depth, config.max_nesting_depth);
        builtins::install(&interpreter, config.capabilities);
        ScriptEngine {
            interpreter,
            cache: ScriptCache::new(config.script_cache_capacity),
            max_nesting: config.max_nesting_depth,
        }
    }

    /// Compile source text into a callable.
    pub fn compile(&mut self, source: &str) -> ScriptResult<Function> {
        let node = match self.cache.get(source) {
            Some(node) => node,
            None => {
                let node = parse_function_with_limit(source, self.max_nesting)?;
                self.cache.insert(source, node.clone());
                node
            }
        };
        Ok(self.interpreter.instantiate(node))
    }

    /// Call a compiled (or native) function.
    pub fn call(&mut self, func: &Function, this: Value, args: &[Value]) -> ScriptResult<Value> {
        self.interpreter.call_function(func, this, args)
    }

    /// Define (or replace) a read-only global.
    pub fn define_global(&self, name: &str, value: Value) {
        self.interpreter.define_global(name, value);
    }

    /// Read a global.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.interpreter.global(name)
    }

    /// Cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Capabilities;
    use crate::object::ObjectRef;

    #[test]
    fn test_compile_is_cached() {
        let mut engine = ScriptEngine::new(&BridgeConfig::default());
        let f = engine.compile("(a) => a * 2").unwrap();
        let g = engine.compile("(a) => a * 2").unwrap();
        let stats = engine.cache_stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(
            engine.call(&f, Value::Undefined, &[Value::Number(4.0)]).unwrap(),
            engine.call(&g, Value::Undefined, &[Value::Number(4.0)]).unwrap()
        );
    }

    #[test]
    fn test_compile_error_is_syntax() {
        let mut engine = ScriptEngine::new(&BridgeConfig::default());
        let err = engine.compile("(a) => {").err().unwrap();
        assert!(err.is_syntax());
        // Nothing cached for bad source.
        assert_eq!(engine.cache_stats().entries, 0);
    }

    #[test]
    fn test_builtins_reachable_from_code() {
        let mut engine = ScriptEngine::new(&BridgeConfig::default());
        let f = engine
            .compile("(x) => Math.max(x, 3) + parseInt('4') + String(1n)")
            .unwrap();
        let this = Value::Object(ObjectRef::plain());
        assert_eq!(
            engine.call(&f, this, &[Value::Number(1.0)]).unwrap(),
            Value::string("71")
        );
    }

    #[test]
    fn test_capabilities_hide_globals() {
        let config = BridgeConfig::default().with_capabilities(Capabilities::empty());
        let mut engine = ScriptEngine::new(&config);
        let f = engine.compile("() => Math.PI").unwrap();
        assert!(matches!(
            engine.call(&f, Value::Undefined, &[]),
            Err(ScriptError::ReferenceError(_))
        ));
    }

    #[test]
    fn test_thrown_error_object() {
        let mut engine = ScriptEngine::new(&BridgeConfig::default());
        let f = engine.compile("() => { throw new Error('bad input'); }").unwrap();
        assert_eq!(
            engine.call(&f, Value::Undefined, &[]),
            Err(ScriptError::Thrown("Error: bad input".into()))
        );
    }
}
