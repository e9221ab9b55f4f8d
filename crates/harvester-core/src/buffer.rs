use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A FIFO queue shared between interception callbacks and the poll loop.
///
/// Producers push one item per lock acquisition; the consumer takes the whole
/// queue in a single acquisition with [`drain`](Self::drain). The lock is
/// never held across an `.await`.
pub struct LockedBuffer<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Clone for LockedBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for LockedBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LockedBuffer<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Acquires the lock, recovering from poison if necessary.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned buffer mutex");
            poisoned.into_inner()
        })
    }

    pub fn push(&self, item: T) {
        self.lock().push_back(item);
    }

    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Takes every buffered item in arrival order, leaving the buffer empty.
    pub fn drain(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
