//! # Stack Safety / 栈安全
//!
//! Deeply nested test bodies recurse through the parser and the evaluator. Both wrap
//! their recursive entry points in [`ensure_sufficient_stack`], which grows the stack
//! on demand instead of overflowing it.
//!
//! 深度嵌套的测试体会在解析器和求值器中递归。两者都用 [`ensure_sufficient_stack`]
//! 包装递归入口，按需扩展栈空间而不是让栈溢出。

/// Free stack space below which a new segment is allocated (100KB).
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated stack segment (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f`, first growing the stack if less than [`RED_ZONE`] bytes remain.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
