//! Native stack growth for the recursive passes.
//!
//! The parser, resolver, printer and interpreter all walk the syntax tree by
//! recursion, so a deeply nested program would otherwise exhaust the thread's
//! stack. Each recursive entry point runs through [`ensure_sufficient_stack`].

/// Minimum native stack to keep free before recursing (100KB red zone).
const RED_ZONE: usize = 100 * 1024;

/// Stack allocated whenever the red zone is reached (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first switching to a fresh stack segment if less than the red
/// zone remains.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
