//! # Rate-limited calls
//! Wraps one provider operation under an "at most N calls per rolling period"
//! budget and retries it forever whenever the upstream pushes back.
//!
//! The wrapper never surfaces a limit condition: callers only ever see the first
//! successful response. Each wrapper keeps its own call log, so two sources never
//! share (or contend on) a window.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use metrics::counter;
use tokio::time::{sleep, Instant};

/// Budget for one named operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_calls: u32,
    pub period: Duration,
}

impl RateLimit {
    pub const fn new(max_calls: u32, period: Duration) -> Self {
        Self { max_calls, period }
    }

    pub const fn per_minute(max_calls: u32) -> Self {
        Self::new(max_calls, Duration::from_secs(60))
    }
}

/// Outcome of a single attempt of a wrapped operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Ready(T),
    /// The upstream refused or failed the call; the reason is only logged.
    Throttled(String),
}

/// A single-argument async operation that can be put behind a [`RateLimitedCall`].
pub trait Operation<A>: Send + Sync {
    type Output: Send;

    fn invoke(&self, arg: A) -> impl Future<Output = Attempt<Self::Output>> + Send;
}

/// Adapts a closure returning a future into an [`Operation`].
pub struct FromFn<F>(pub F);

impl<A, T, F, Fut> Operation<A> for FromFn<F>
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Attempt<T>> + Send,
    T: Send,
{
    type Output = T;

    fn invoke(&self, arg: A) -> impl Future<Output = Attempt<T>> + Send {
        (self.0)(arg)
    }
}

pub struct RateLimitedCall<O> {
    name: &'static str,
    limit: RateLimit,
    /// Start instants of the calls inside the trailing window, oldest first.
    window: Mutex<VecDeque<Instant>>,
    op: O,
}

impl<O> RateLimitedCall<O> {
    pub fn new(name: &'static str, limit: RateLimit, op: O) -> Self {
        Self {
            name,
            limit,
            window: Mutex::new(VecDeque::with_capacity(limit.max_calls as usize)),
            op,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    pub fn operation(&self) -> &O {
        &self.op
    }

    /// Invoke the wrapped operation, waiting out the budget and retrying the
    /// same argument until it succeeds.
    pub async fn call<A>(&self, arg: A) -> O::Output
    where
        O: Operation<A>,
        A: Clone + Send,
    {
        loop {
            if let Some(wait) = self.reserve_slot() {
                counter!("ingest_rate_limited_total", "operation" => self.name).increment(1);
                tracing::warn!(
                    target: "ingest",
                    operation = self.name,
                    max_calls = self.limit.max_calls,
                    period_secs = self.limit.period.as_secs_f64(),
                    "rate limit reached"
                );
                tracing::debug!(
                    target: "ingest",
                    operation = self.name,
                    sleep_ms = wait.as_millis() as u64,
                    "sleeping until the window frees up"
                );
                sleep(wait).await;
                continue;
            }

            match self.op.invoke(arg.clone()).await {
                Attempt::Ready(out) => return out,
                Attempt::Throttled(reason) => {
                    let wait = self.limit.period;
                    counter!("ingest_rate_limited_total", "operation" => self.name).increment(1);
                    tracing::warn!(
                        target: "ingest",
                        operation = self.name,
                        reason = %reason,
                        sleep_ms = wait.as_millis() as u64,
                        "upstream throttled the call; retrying after the window"
                    );
                    sleep(wait).await;
                    tracing::debug!(target: "ingest", operation = self.name, "done sleeping, retrying");
                }
            }
        }
    }

    /// Record a call start if the window has room, otherwise return how long
    /// until the oldest call leaves it.
    fn reserve_slot(&self) -> Option<Duration> {
        let now = Instant::now();
        let period = self.limit.period;
        let max_calls = self.limit.max_calls.max(1) as usize;

        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) >= period {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < max_calls {
            window.push_back(now);
            return None;
        }
        window
            .front()
            .map(|&oldest| (oldest + period).saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_op(
        calls: Arc<Mutex<Vec<Instant>>>,
    ) -> FromFn<impl Fn(u32) -> std::future::Ready<Attempt<u32>> + Send + Sync> {
        FromFn(move |n: u32| {
            calls.lock().unwrap().push(Instant::now());
            std::future::ready(Attempt::Ready(n * 2))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn calls_within_budget_are_not_delayed() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let limited = RateLimitedCall::new("test", RateLimit::per_minute(3), counting_op(calls.clone()));

        let t0 = Instant::now();
        for n in 0..3 {
            assert_eq!(limited.call(n).await, n * 2);
        }
        assert_eq!(Instant::now(), t0);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn call_over_budget_waits_for_remaining_window() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let limited = RateLimitedCall::new("test", RateLimit::per_minute(2), counting_op(calls.clone()));

        let t0 = Instant::now();
        limited.call(1).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        limited.call(2).await;
        // Third call must wait until the first leaves the window (t0 + 60s).
        limited.call(3).await;

        let starts = calls.lock().unwrap().clone();
        assert_eq!(starts.len(), 3);
        assert!(starts[2] >= t0 + Duration::from_secs(60));
        assert!(starts[2] < t0 + Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn no_window_ever_holds_more_than_max_calls() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let limit = RateLimit::new(5, Duration::from_secs(10));
        let limited = RateLimitedCall::new("test", limit, counting_op(calls.clone()));

        for n in 0..23 {
            limited.call(n).await;
        }

        let starts = calls.lock().unwrap().clone();
        for (i, start) in starts.iter().enumerate() {
            let in_window = starts[i..]
                .iter()
                .take_while(|t| t.duration_since(*start) < limit.period)
                .count();
            assert!(in_window <= 5, "window starting at call {i} holds {in_window} calls");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poisoned_window_still_enforces_the_budget() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let limited = Arc::new(RateLimitedCall::new(
            "test",
            RateLimit::per_minute(1),
            counting_op(calls.clone()),
        ));
        let held = limited.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.window.lock().unwrap();
            panic!("crashed while holding the window");
        })
        .join();
        assert!(limited.window.is_poisoned());

        let t0 = Instant::now();
        limited.call(1).await;
        limited.call(2).await;
        assert!(Instant::now() >= t0 + Duration::from_secs(60));
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_attempts_are_retried_after_the_period() {
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = attempts.clone();
        let op = FromFn(move |url: String| {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < 2 {
                Attempt::Throttled("status 429".to_string())
            } else {
                Attempt::Ready(format!("body of {url}"))
            })
        });
        let limited = RateLimitedCall::new("test", RateLimit::new(10, Duration::from_secs(30)), op);

        let t0 = Instant::now();
        let body = limited.call("https://example.com".to_string()).await;

        assert_eq!(body, "body of https://example.com");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(Instant::now() >= t0 + Duration::from_secs(60));
    }
}
