use crate::expression::MatchExpression;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

/// Buffers retained per pool once released. Excess buffers are dropped.
const MAX_RETAINED_BUFFERS: usize = 32;

/// Process-wide free list of scratch buffers for the match hot path.
/// Checkout is a short mutex-guarded pop; released buffers are cleared but
/// keep their capacity.
pub(crate) struct BufferPool<T: 'static> {
    free: Mutex<Vec<Vec<T>>>,
}

impl<T> BufferPool<T> {
    pub(crate) const fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn acquire(&'static self) -> PooledBuf<T> {
        let buf = self.free.lock().pop().unwrap_or_default();
        PooledBuf { buf, pool: self }
    }

    fn release(&self, mut buf: Vec<T>) {
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < MAX_RETAINED_BUFFERS {
            free.push(buf);
        }
    }

    #[cfg(test)]
    fn retained(&self) -> usize {
        self.free.lock().len()
    }
}

/// Scratch buffer checked out of a process-wide pool. Hands itself back to
/// the pool on drop, so ownership cannot escape the match call that acquired
/// it.
pub struct PooledBuf<T: 'static> {
    buf: Vec<T>,
    pool: &'static BufferPool<T>,
}

impl<T> Deref for PooledBuf<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.buf
    }
}

impl<T> DerefMut for PooledBuf<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.buf
    }
}

impl<T> Drop for PooledBuf<T> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

pub(crate) static INDEX_POOL: BufferPool<u32> = BufferPool::new();
pub(crate) static EXPR_POOL: BufferPool<MatchExpression> = BufferPool::new();

#[cfg(test)]
mod tests {
    use super::BufferPool;

    #[test]
    fn released_buffers_are_cleared_and_keep_capacity() {
        static POOL: BufferPool<u32> = BufferPool::new();
        let mut buf = POOL.acquire();
        buf.extend([1, 2, 3]);
        let capacity = buf.capacity();
        drop(buf);

        let reused = POOL.acquire();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= capacity.min(3));
    }

    #[test]
    fn retention_is_bounded() {
        static POOL: BufferPool<u32> = BufferPool::new();
        let buffers: Vec<_> = (0..64).map(|_| POOL.acquire()).collect();
        drop(buffers);
        assert!(POOL.retained() <= super::MAX_RETAINED_BUFFERS);
    }
}
