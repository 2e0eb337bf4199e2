//! Platform abstraction traits.
//!
//! Everything the engine needs from its surroundings (wall clock, local time
//! zone, randomness, console output, regular expressions) goes through these
//! traits so hosts can substitute deterministic or sandboxed versions.

use std::rc::Rc;

mod std_impl;

pub use std_impl::{
    FnRandomProvider, FnTimeProvider, StdConsoleProvider, StdRandomProvider, StdTimeProvider,
    TracingConsoleProvider,
};

#[cfg(feature = "regex")]
pub use std_impl::FancyRegexProvider;

/// Trait for providing time-related functionality.
pub trait TimeProvider {
    /// Get the current time as milliseconds since Unix epoch.
    /// Used for `Date.now()` and `new Date()`.
    fn now_millis(&self) -> f64;

    /// Offset of local time from UTC in minutes at the given UTC instant.
    /// Used by the local-time `Date` methods. UTC unless overridden.
    fn local_offset_minutes(&self, _utc_millis: f64) -> i32 {
        0
    }

    /// Get elapsed milliseconds since a timer was started.
    /// Used for `console.time()` / `console.timeEnd()`.
    fn elapsed_millis(&self, start: u64) -> u64;

    /// Start a timer and return an opaque handle.
    fn start_timer(&self) -> u64;
}

/// Trait for providing random number generation.
pub trait RandomProvider {
    /// Generate a random f64 in the range [0, 1).
    /// Used for `Math.random()`.
    fn random(&mut self) -> f64;
}

/// A time provider frozen at the epoch, for reproducible runs
pub struct NoOpTimeProvider;

impl TimeProvider for NoOpTimeProvider {
    fn now_millis(&self) -> f64 {
        0.0
    }

    fn elapsed_millis(&self, _start: u64) -> u64 {
        0
    }

    fn start_timer(&self) -> u64 {
        0
    }
}

/// A random provider that always returns 0.5
pub struct NoOpRandomProvider;

impl RandomProvider for NoOpRandomProvider {
    fn random(&mut self) -> f64 {
        0.5
    }
}

/// Log level for console output.
///
/// Maps to the different console methods: console.log(), console.warn(), etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    /// console.log() - general output
    Log,
    /// console.info() - informational messages
    Info,
    /// console.debug() - debug messages
    Debug,
    /// console.warn() - warnings
    Warn,
    /// console.error() - errors
    Error,
}

/// Trait for handling console output.
pub trait ConsoleProvider {
    /// Write a message at the specified log level.
    fn write(&self, level: ConsoleLevel, message: &str);

    /// Clear the console (optional operation, may be no-op).
    fn clear(&self) {}
}

/// A console provider that discards all output.
pub struct NoOpConsoleProvider;

impl ConsoleProvider for NoOpConsoleProvider {
    fn write(&self, _level: ConsoleLevel, _message: &str) {}
}

// ═══════════════════════════════════════════════════════════════════════════════
// Regular expressions
// ═══════════════════════════════════════════════════════════════════════════════

/// One successful match. Offsets are byte offsets into the searched `&str`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    pub start: usize,
    pub end: usize,
    /// Group 0 is the whole match; `None` for groups that did not take part
    pub captures: Vec<Option<(usize, usize)>>,
}

/// A compiled pattern
pub trait CompiledRegex {
    /// First match starting at or after byte offset `start`
    fn find(&self, input: &str, start: usize) -> Result<Option<RegexMatch>, String>;

    /// Names of the capture groups, index 0 included
    fn group_names(&self) -> Vec<Option<String>>;
}

/// Compiles `RegExp` patterns. Flags arrive as written in the literal.
pub trait RegExpProvider {
    fn compile(&self, pattern: &str, flags: &str) -> Result<Rc<dyn CompiledRegex>, String>;
}
