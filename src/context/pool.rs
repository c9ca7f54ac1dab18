//! Bounded, lock-free pool of request contexts.

use crossbeam_queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::Context;

/// Free list of reset [`Context`] instances.
#[derive(Debug)]
pub struct ContextPool {
    free: ArrayQueue<Box<Context>>,
    allocated: AtomicUsize,
}

impl ContextPool {
    /// Create a pool keeping at most `capacity` idle contexts.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: ArrayQueue::new(capacity.max(1)),
            allocated: AtomicUsize::new(0),
        }
    }

    /// Take a reset context, allocating one if the pool is empty.
    ///
    /// The context goes back to the pool when the guard is dropped.
    pub fn acquire(&self) -> PooledContext<'_> {
        let ctx = self.free.pop().unwrap_or_else(|| {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            Box::default()
        });
        PooledContext {
            pool: self,
            ctx: Some(ctx),
        }
    }

    /// Reset `ctx` and keep it for reuse. Dropped if the pool is full.
    pub fn release(&self, mut ctx: Box<Context>) {
        ctx.reset();
        if self.free.push(ctx).is_err() {
            tracing::trace!("Context pool full, dropping context");
        }
    }

    /// Contexts allocated over the pool's lifetime.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Contexts currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.len()
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

/// A RAII guard that releases its context to the pool on drop.
#[derive(Debug)]
pub struct PooledContext<'a> {
    pool: &'a ContextPool,
    ctx: Option<Box<Context>>,
}

impl Deref for PooledContext<'_> {
    type Target = Context;
    fn deref(&self) -> &Self::Target {
        // Only `drop` empties the slot.
        self.ctx.as_deref().unwrap_or_else(|| unreachable!("context used after release"))
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
            .as_deref_mut()
            .unwrap_or_else(|| unreachable!("context used after release"))
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}
