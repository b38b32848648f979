//! Bridge configuration.

use bitflags::bitflags;

bitflags! {
    /// Host globals visible to dynamic code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// `console.log` and friends.
        const CONSOLE = 0b0001;
        /// The `Math` object.
        const MATH = 0b0010;
        /// The `document` element tree.
        const DOCUMENT = 0b0100;
        /// `String`, `Number`, `Boolean`, `BigInt`, `isNaN`, `parseInt`, `parseFloat`.
        const CONVERSIONS = 0b1000;
        /// Everything.
        const ALL = 0b1111;
    }
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Globals exposed to dynamic code.
    pub capabilities: Capabilities,
    /// Maximum nesting of script function calls.
    pub max_call_depth: usize,
    /// Maximum nesting of expressions and statements in dynamic code.
    pub max_nesting_depth: usize,
    /// Compiled snippets kept in the cache (0 disables caching).
    pub script_cache_capacity: usize,
    /// Initial memory of the in-process module (in pages, 64KB each).
    pub initial_memory_pages: u32,
    /// Maximum memory of the in-process module (in pages).
    pub max_memory_pages: Option<u32>,
    /// Import namespace the entry points are registered under.
    pub import_module: &'static str,
    /// Log every call boundary at trace level.
    pub trace_calls: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            capabilities: Capabilities::ALL,
            max_call_depth: 256,
            max_nesting_depth: 64,
            script_cache_capacity: 64,
            initial_memory_pages: 1,
            max_memory_pages: Some(256), // 16 MB
            import_module: "env",
            trace_calls: false,
        }
    }
}

impl BridgeConfig {
    /// Replace the capability set.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the maximum call depth.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the maximum expression and statement nesting.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Set the script cache capacity.
    pub fn with_script_cache_capacity(mut self, capacity: usize) -> Self {
        self.script_cache_capacity = capacity;
        self
    }

    /// Set the in-process module memory limits.
    pub fn with_memory_pages(mut self, initial: u32, max: Option<u32>) -> Self {
        self.initial_memory_pages = initial;
        self.max_memory_pages = max;
        self
    }

    /// Set the import namespace.
    pub fn with_import_module(mut self, module: &'static str) -> Self {
        self.import_module = module;
        self
    }

    /// Enable or disable call tracing.
    pub fn with_trace_calls(mut self, trace: bool) -> Self {
        self.trace_calls = trace;
        self
    }
}
