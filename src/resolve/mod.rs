//! DOI resolution
//!
//! [`Resolver`] is the seam to the outside world: [`HttpResolver`] talks to a
//! DOI registry with content negotiation, tests substitute their own. The
//! [`FetchCoalescer`] sits in front of any resolver and adds request
//! coalescing plus bounded retries of transient failures.

pub mod client;
pub mod coalesce;
pub mod csl;
pub mod error;

pub use client::{HttpResolver, Resolver, CSL_JSON};
pub use coalesce::{FetchCoalescer, FetchStats, RetryPolicy};
pub use error::ResolveError;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{ResolveError, Resolver};
    use crate::domain::{Author, Doi, Format, RawMetadata, WorkKind};

    /// Journal article metadata with one author
    pub fn work(doi: &str, family: &str, year: i32, title: &str) -> RawMetadata {
        let mut meta = RawMetadata::new(doi.parse().unwrap(), WorkKind::JournalArticle);
        meta.authors = vec![Author::new(Some("Anna"), family)];
        meta.year = Some(year);
        meta.title = Some(title.to_string());
        meta.container = Some("Physical Review Letters".to_string());
        meta.container_short = Some("Phys. Rev. Lett.".to_string());
        meta.volume = Some("124".to_string());
        meta.pages = Some("1-10".to_string());
        meta
    }

    /// In-memory registry that counts calls and can fail on demand
    #[derive(Default)]
    pub struct ScriptedResolver {
        works: Mutex<HashMap<Doi, RawMetadata>>,
        failures: Mutex<VecDeque<ResolveError>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedResolver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_work(self, meta: RawMetadata) -> Self {
            self.register(meta);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Queues an error returned by the next call, before any lookup
        pub fn fail_next(self, err: ResolveError) -> Self {
            self.failures.lock().unwrap().push_back(err);
            self
        }

        /// Adds or replaces a registered work
        pub fn register(&self, meta: RawMetadata) {
            self.works.lock().unwrap().insert(meta.doi.clone(), meta);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Resolver for ScriptedResolver {
        async fn fetch(&self, doi: &Doi, _format: Format) -> Result<RawMetadata, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }

            self.works
                .lock()
                .unwrap()
                .get(doi)
                .cloned()
                .ok_or_else(|| ResolveError::NotFound(doi.clone()))
        }
    }
}
