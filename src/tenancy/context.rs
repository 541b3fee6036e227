//! Active tenant slot.
//!
//! The slot lives in Tokio task-local storage while a request future runs
//! inside [`scope`], so the value follows the request across `.await` points
//! and worker threads. Code running outside a scope (CLI commands, plain
//! threads, background jobs) gets a thread-local slot instead.
//!
//! Futures handed to `tokio::spawn` do not inherit the scope; wrap them in
//! [`scope`] and call [`set`] again if they need the tenant.

use std::cell::RefCell;
use std::future::Future;

tokio::task_local! {
    static TASK_TENANT: RefCell<Option<String>>;
}

thread_local! {
    static THREAD_TENANT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Run `f` with its own, initially empty, tenant slot.
pub async fn scope<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    TASK_TENANT.scope(RefCell::new(None), f).await
}

/// Whether the caller is running inside a [`scope`].
pub fn in_scope() -> bool {
    TASK_TENANT.try_with(|_| ()).is_ok()
}

/// Store `tenant_id` for the current execution context.
pub fn set(tenant_id: impl Into<String>) {
    let mut tenant_id = Some(tenant_id.into());
    if try_with_task(|slot| *slot = tenant_id.take()).is_none() {
        THREAD_TENANT.with(|slot| *slot.borrow_mut() = tenant_id.take());
    }
}

/// The tenant for the current execution context, or `default` when none was set.
pub fn get(default: &str) -> String {
    current().unwrap_or_else(|| default.to_string())
}

/// The tenant for the current execution context, if any.
pub fn current() -> Option<String> {
    match try_with_task(|slot| slot.clone()) {
        Some(value) => value,
        None => THREAD_TENANT.with(|slot| slot.borrow().clone()),
    }
}

/// Forget the tenant for the current execution context.
pub fn clear() {
    if try_with_task(|slot| *slot = None).is_none() {
        THREAD_TENANT.with(|slot| *slot.borrow_mut() = None);
    }
}

/// Runs `f` against the task slot, or returns `None` outside a [`scope`].
fn try_with_task<R>(f: impl FnOnce(&mut Option<String>) -> R) -> Option<R> {
    TASK_TENANT.try_with(|cell| f(&mut *cell.borrow_mut())).ok()
}
