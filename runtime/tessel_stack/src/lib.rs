//! Stack growth guard for recursive descent.
//!
//! The parser and the constant/watch analyzer recurse once per nesting level
//! of an expression. So do the compiled closure trees, both when they are
//! called and when they are released. Input such as `((((((...))))))` or
//! `a.b.c.d...` produced by a template can nest far deeper than the default
//! thread stack allows, so each of those recursions goes through
//! [`ensure_sufficient_stack`] at every level.
//!
//! On native targets the guard uses `stacker` to move onto a freshly
//! allocated segment when less than [`RED_ZONE`] bytes remain. On `wasm32`
//! it is a plain call.

/// Remaining stack below which a new segment is allocated.
const RED_ZONE: usize = 64 * 1024;

/// Size of each newly allocated stack segment.
const SEGMENT_SIZE: usize = 1024 * 1024;

/// Run `f`, growing the stack first when it is nearly exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// Run `f` directly; wasm manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
