use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};

/// Token bucket rate limiter for judge requests
///
/// Implements the token bucket algorithm with strict FIFO admission: once any
/// caller is waiting, newer callers queue behind it even if a token happens
/// to be available. Tokens are refilled lazily from elapsed time on every
/// access; while the queue is non-empty a drain task re-checks every
/// `1 / refill_rate` seconds.
///
/// Token count, last-refill time and the wait queue live behind one mutex and
/// are only mutated by this type.
#[derive(Clone)]
pub struct TokenBucketRateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    /// Maximum token capacity (burst size)
    capacity: f64,
    /// Tokens added per second
    refill_rate: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    waiters: VecDeque<oneshot::Sender<()>>,
    draining: bool,
}

/// Snapshot of the limiter for monitoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterStats {
    pub available_tokens: f64,
    pub queue_length: usize,
}

impl TokenBucketRateLimiter {
    /// Create a new rate limiter with a full bucket
    ///
    /// # Arguments
    /// * `max_tokens` - Bucket capacity (burst size)
    /// * `refill_rate` - Tokens added per second
    ///
    /// # Example
    /// ```
    /// use arbiter::infrastructure::judge::TokenBucketRateLimiter;
    ///
    /// let rate_limiter = TokenBucketRateLimiter::new(5.0, 2.0);
    /// ```
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        assert!(
            max_tokens.is_finite() && max_tokens >= 1.0,
            "max_tokens must be at least 1"
        );
        assert!(
            refill_rate.is_finite() && refill_rate > 0.0,
            "refill_rate must be positive"
        );

        Self {
            inner: Arc::new(Inner {
                capacity: max_tokens,
                refill_rate,
                state: Mutex::new(BucketState {
                    tokens: max_tokens,
                    last_refill: Instant::now(),
                    waiters: VecDeque::new(),
                    draining: false,
                }),
            }),
        }
    }

    /// Acquire a token, waiting in FIFO order if none is available
    ///
    /// The caller's place in line is fixed when `acquire` is called, not when
    /// the returned future is first polled. Dropping the future gives up the
    /// place without consuming a token.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    /// ```no_run
    /// # use arbiter::infrastructure::judge::TokenBucketRateLimiter;
    /// # async fn example() {
    /// let rate_limiter = TokenBucketRateLimiter::new(5.0, 2.0);
    /// rate_limiter.acquire().await;
    /// // Make judge request here
    /// # }
    /// ```
    pub fn acquire(&self) -> impl Future<Output = ()> + Send + 'static {
        let receiver = {
            let mut state = self.inner.lock();
            self.inner.refill(&mut state);

            if state.waiters.is_empty() && state.tokens >= 1.0 {
                state.tokens -= 1.0;
                None
            } else {
                let (sender, receiver) = oneshot::channel();
                state.waiters.push_back(sender);
                if !state.draining {
                    state.draining = true;
                    tokio::spawn(Inner::drain(Arc::clone(&self.inner)));
                }
                Some(receiver)
            }
        };

        async move {
            if let Some(receiver) = receiver {
                // An error means the limiter was dropped; nothing left to wait for.
                let _ = receiver.await;
            }
        }
    }

    /// Current token count (after a refill pass) and queue length
    pub fn stats(&self) -> RateLimiterStats {
        let mut state = self.inner.lock();
        self.inner.refill(&mut state);
        RateLimiterStats {
            available_tokens: state.tokens,
            queue_length: state.waiters.len(),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.inner.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.inner.refill_rate
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = elapsed.mul_add(self.refill_rate, state.tokens).min(self.capacity);
        state.last_refill = now;
    }

    /// Admit queued callers oldest-first while tokens are available.
    ///
    /// Returns `true` once the queue is empty.
    fn admit(&self, state: &mut BucketState) -> bool {
        self.refill(state);
        while state.tokens >= 1.0 {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            // A closed receiver means the caller gave up; its token stays in the bucket.
            if waiter.send(()).is_ok() {
                state.tokens -= 1.0;
            }
        }
        // Skip over abandoned waiters at the head so they do not hold the line.
        while state.waiters.front().is_some_and(oneshot::Sender::is_closed) {
            state.waiters.pop_front();
        }
        state.waiters.is_empty()
    }

    fn recheck_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refill_rate)
    }

    async fn drain(inner: Arc<Self>) {
        loop {
            sleep(inner.recheck_interval()).await;
            let mut state = inner.lock();
            if inner.admit(&mut state) {
                state.draining = false;
                return;
            }
        }
    }
}
