//! Machine-stack headroom for the recursive parts of the engine.
//!
//! Parsing, compiling, serializing and native re-entry all recurse on the
//! Rust stack. Each recursive step goes through [`guard`], which switches to
//! a fresh heap-allocated segment once less than `RED_ZONE` bytes remain.
//! The depth limits (parser nesting, native depth, call stack size) then
//! decide when recursion stops, not the size of the host thread's stack.

/// Headroom that must remain before a recursive step runs in place
const RED_ZONE: usize = 256 * 1024;

/// Size of each additional stack segment
const SEGMENT: usize = 2 * 1024 * 1024;

/// Run one recursive step, growing the stack first when it runs low
#[inline]
pub(crate) fn guard<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT, f)
}
