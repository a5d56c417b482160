//! Request coalescing and retries
//!
//! Concurrent requests for the same (DOI, format) pair share one underlying
//! resolution. The first caller spawns the fetch as its own task and every
//! caller, including the first, waits on a broadcast channel for the result.
//! Dropping a waiting future therefore never cancels the fetch for the
//! others. Results are not cached: once the shared fetch finishes its slot
//! is cleared before the result is published, so the next request starts a
//! fresh resolution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::client::Resolver;
use super::error::ResolveError;
use crate::domain::{Doi, Format, RawMetadata};

type FetchResult = Result<RawMetadata, ResolveError>;
type SlotKey = (Doi, Format);

/// How often and how patiently transient failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub ceiling: u32,
    /// Delay before the first retry; doubled for each further one
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(ceiling: u32, backoff: Duration) -> Self {
        Self { ceiling, backoff }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Snapshot of the coalescer's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Attempts made against the resolver, retries included
    pub resolver_calls: u64,
    /// Attempts that were retries
    pub retries: u64,
    /// Requests served by joining a fetch already in flight
    pub coalesced: u64,
}

#[derive(Default)]
struct Counters {
    resolver_calls: AtomicU64,
    retries: AtomicU64,
    coalesced: AtomicU64,
}

struct Inner {
    resolver: Arc<dyn Resolver>,
    policy: RetryPolicy,
    in_flight: Mutex<HashMap<SlotKey, broadcast::Sender<FetchResult>>>,
    counters: Counters,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<SlotKey, broadcast::Sender<FetchResult>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_with_retries(&self, doi: &Doi, format: Format) -> FetchResult {
        let mut retry = 0;
        loop {
            self.counters.resolver_calls.fetch_add(1, Ordering::Relaxed);
            match self.resolver.fetch(doi, format).await {
                Err(err) if err.is_retryable() && retry < self.policy.ceiling => {
                    let delay = self.policy.delay(retry);
                    retry += 1;
                    warn!(
                        doi = %doi,
                        retry,
                        ceiling = self.policy.ceiling,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying fetch"
                    );
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Clears a fetch's in-flight slot when the fetch ends, even by panic
struct SlotGuard {
    inner: Arc<Inner>,
    key: SlotKey,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.slots().remove(&self.key);
    }
}

/// At-most-one-in-flight front for a [`Resolver`]
#[derive(Clone)]
pub struct FetchCoalescer {
    inner: Arc<Inner>,
}

impl FetchCoalescer {
    pub fn new(resolver: Arc<dyn Resolver>, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                policy,
                in_flight: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Resolves `doi`, joining an identical fetch if one is in flight.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn fetch_once(&self, doi: &Doi, format: Format) -> FetchResult {
        let mut receiver = self.join_or_start(doi, format);

        match receiver.recv().await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::network(doi, "shared fetch ended without a result")),
        }
    }

    /// Validates `input` as a DOI, then behaves like [`Self::fetch_once`]
    pub async fn resolve(&self, input: &str, format: Format) -> FetchResult {
        let doi: Doi = input.parse()?;
        self.fetch_once(&doi, format).await
    }

    pub fn stats(&self) -> FetchStats {
        let counters = &self.inner.counters;
        FetchStats {
            resolver_calls: counters.resolver_calls.load(Ordering::Relaxed),
            retries: counters.retries.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Number of fetches currently in flight
    pub fn in_flight(&self) -> usize {
        self.inner.slots().len()
    }

    fn join_or_start(&self, doi: &Doi, format: Format) -> broadcast::Receiver<FetchResult> {
        let key = (doi.clone(), format);
        let mut slots = self.inner.slots();

        if let Some(sender) = slots.get(&key) {
            self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(doi = %doi, format = %format, "joining in-flight fetch");
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(1);
        slots.insert(key.clone(), sender.clone());
        drop(slots);

        debug!(doi = %doi, format = %format, "starting fetch");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let guard = SlotGuard {
                inner: Arc::clone(&inner),
                key,
            };
            let (doi, format) = &guard.key;
            let result = inner.fetch_with_retries(doi, *format).await;
            drop(guard);
            // No receivers left is fine: everyone gave up waiting
            let _ = sender.send(result);
        });

        receiver
    }
}
