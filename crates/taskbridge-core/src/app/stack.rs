//! Current-context stack - 現在の context の管理
//!
//! [`ContextStack`] は明示的に注入できる LIFO です。push はガードを返し、
//! ガードの drop は自分が積んだエントリだけを取り除きます（unwind 時も）。
//!
//! 各スレッドは [`set_current_context`] / [`get_current_context`] の裏に
//! デフォルトの stack を持つため、別スレッドの attempt 同士は干渉しません。
//!
//! # 学習ポイント
//! - `thread_local!` と RAII ガード
//! - `PhantomData<*const ()>` による `!Send` ガード

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::context::Context;
use crate::domain::errors::ExecutionError;
use crate::sync::lock;

#[derive(Debug, Default)]
pub struct ContextStack {
    entries: Mutex<Vec<(u64, Arc<Context>)>>,
    next_token: AtomicU64,
}

impl ContextStack {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
        }
    }

    #[must_use = "the context is popped as soon as the scope is dropped"]
    pub fn push(&self, context: impl Into<Arc<Context>>) -> ContextScope<'_> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut entries = lock(&self.entries);
        entries.push((token, context.into()));
        tracing::trace!(token, depth = entries.len(), "context pushed");
        ContextScope { stack: self, token }
    }

    pub fn current(&self) -> Result<Arc<Context>, ExecutionError> {
        lock(&self.entries)
            .last()
            .map(|(_, context)| context.clone())
            .ok_or(ExecutionError::NoActiveContext)
    }

    pub fn depth(&self) -> usize {
        lock(&self.entries).len()
    }

    fn remove(&self, token: u64) {
        let mut entries = lock(&self.entries);
        if let Some(index) = entries.iter().rposition(|(t, _)| *t == token) {
            entries.remove(index);
        }
        tracing::trace!(token, depth = entries.len(), "context popped");
    }
}

/// Keeps one context on a [`ContextStack`] while alive.
#[derive(Debug)]
pub struct ContextScope<'a> {
    stack: &'a ContextStack,
    token: u64,
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        self.stack.remove(self.token);
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<(u64, Arc<Context>)>> = const { RefCell::new(Vec::new()) };
}

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Makes `context` current on this thread until the guard is dropped.
#[must_use = "the context is popped as soon as the guard is dropped"]
pub fn set_current_context(context: impl Into<Arc<Context>>) -> CurrentContextGuard {
    let token = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
    let context = context.into();
    CURRENT.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push((token, context));
        tracing::trace!(token, depth = stack.len(), "current context set");
    });
    CurrentContextGuard {
        token,
        _not_send: PhantomData,
    }
}

/// The innermost context set on this thread.
pub fn get_current_context() -> Result<Arc<Context>, ExecutionError> {
    CURRENT.with(|stack| {
        stack
            .borrow()
            .last()
            .map(|(_, context)| context.clone())
            .ok_or(ExecutionError::NoActiveContext)
    })
}

/// Pops its context from the thread-local stack on drop.
///
/// Not `Send`: it must be dropped on the thread that created it.
#[derive(Debug)]
pub struct CurrentContextGuard {
    token: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for CurrentContextGuard {
    fn drop(&mut self) {
        let token = self.token;
        // thread-local may already be gone during thread teardown
        let _ = CURRENT.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(index) = stack.iter().rposition(|(t, _)| *t == token) {
                stack.remove(index);
            }
            tracing::trace!(token, depth = stack.len(), "current context restored");
        });
    }
}
