//! Reference data, prefetch bindings and the acting user.
//!
//! Steps that offer selectable reference data (candidate medications,
//! assignees, pens) populate their options through the
//! [`OptionsProvider`] boundary. Fetches are never issued from rendering
//! code: an [`OptionsBinding`] declares "when field X changes, and only
//! then, fetch kind Y", and the cache guards each kind with a generation
//! counter so a superseding change discards the stale response.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use drover_core::Signal;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use crate::record::Record;

// ============================================================================
// OptionsProvider boundary
// ============================================================================

/// One selectable option of a lookup kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    /// Identifier of the referenced entity.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Additional attributes the host may want to render (stock counts,
    /// withdrawal periods, ...).
    pub extra: BTreeMap<String, String>,
}

impl ChoiceOption {
    /// Create an option without extra attributes.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Error raised when reference data cannot be fetched.
#[derive(Debug, Clone)]
pub enum LookupError {
    /// The remote authority could not be reached or answered abnormally.
    Unavailable(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "reference data unavailable: {msg}"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Boundary trait for reference-data fetches.
///
/// Implementations must tolerate unknown kinds and empty result sets
/// without failing.
pub trait OptionsProvider: Send + Sync {
    /// Fetch the selectable options of `kind`, filtered by `params`.
    fn fetch_options(
        &self,
        kind: &str,
        params: &[(String, String)],
    ) -> BoxFuture<'static, Result<Vec<ChoiceOption>, LookupError>>;
}

// ============================================================================
// OptionsBinding
// ============================================================================

/// Declarative prefetch subscription: when `trigger` changes, fetch `kind`.
#[derive(Clone)]
pub struct OptionsBinding {
    trigger: String,
    kind: String,
    params: Arc<dyn Fn(&Record) -> Vec<(String, String)> + Send + Sync>,
}

impl OptionsBinding {
    /// Bind a lookup kind to a trigger field, with no request parameters.
    pub fn new(trigger: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            kind: kind.into(),
            params: Arc::new(|_| Vec::new()),
        }
    }

    /// Derive request parameters from the live record at fetch time.
    pub fn with_params<F>(mut self, params: F) -> Self
    where
        F: Fn(&Record) -> Vec<(String, String)> + Send + Sync + 'static,
    {
        self.params = Arc::new(params);
        self
    }

    /// The field whose changes trigger this binding.
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// The lookup kind this binding fetches.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Compute the request parameters for the current record.
    pub fn params(&self, record: &Record) -> Vec<(String, String)> {
        (self.params)(record)
    }
}

impl fmt::Debug for OptionsBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsBinding")
            .field("trigger", &self.trigger)
            .field("kind", &self.kind)
            .finish()
    }
}

// ============================================================================
// OptionsCache
// ============================================================================

#[derive(Default)]
struct CacheSlot {
    generation: u64,
    options: Vec<ChoiceOption>,
}

struct CacheInner {
    provider: Arc<dyn OptionsProvider>,
    handle: tokio::runtime::Handle,
    slots: Mutex<HashMap<String, CacheSlot>>,
    loaded: Signal<(String, Vec<ChoiceOption>)>,
    failed: Signal<(String, String)>,
}

/// Per-kind cache of fetched reference data.
///
/// Cheap to clone; all clones share the same slots and signals.
#[derive(Clone)]
pub struct OptionsCache {
    inner: Arc<CacheInner>,
}

impl OptionsCache {
    /// Create a cache over a provider; fetches are spawned onto `handle`.
    pub fn new(provider: Arc<dyn OptionsProvider>, handle: tokio::runtime::Handle) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                provider,
                handle,
                slots: Mutex::new(HashMap::new()),
                loaded: Signal::new(),
                failed: Signal::new(),
            }),
        }
    }

    /// The cached options of a kind; empty until a fetch lands.
    pub fn options(&self, kind: &str) -> Vec<ChoiceOption> {
        self.inner
            .slots
            .lock()
            .get(kind)
            .map(|s| s.options.clone())
            .unwrap_or_default()
    }

    /// Issue a fetch for a kind.
    ///
    /// A refresh for the same kind started later supersedes this one: the
    /// earlier response is discarded on arrival, whatever order the
    /// responses come back in. Empty result sets are stored as-is.
    pub fn refresh(&self, kind: &str, params: Vec<(String, String)>) {
        let generation = {
            let mut slots = self.inner.slots.lock();
            let slot = slots.entry(kind.to_string()).or_default();
            slot.generation += 1;
            slot.generation
        };

        tracing::debug!(target: "drover::lookup", kind, generation, "refreshing reference data");

        let inner = Arc::clone(&self.inner);
        let kind = kind.to_string();
        self.inner.handle.spawn(async move {
            let result = inner.provider.fetch_options(&kind, &params).await;
            match result {
                Ok(options) => {
                    {
                        let mut slots = inner.slots.lock();
                        let Some(slot) = slots.get_mut(&kind) else {
                            return;
                        };
                        if slot.generation != generation {
                            tracing::trace!(
                                target: "drover::lookup",
                                kind,
                                generation,
                                "discarding superseded reference fetch"
                            );
                            return;
                        }
                        slot.options = options.clone();
                    }
                    inner.loaded.emit((kind, options));
                }
                Err(err) => {
                    tracing::warn!(
                        target: "drover::lookup",
                        kind,
                        error = %err,
                        "reference fetch failed"
                    );
                    inner.failed.emit((kind, err.to_string()));
                }
            }
        });
    }

    /// Signal emitted when a kind's options finish loading.
    pub fn loaded(&self) -> &Signal<(String, Vec<ChoiceOption>)> {
        &self.inner.loaded
    }

    /// Signal emitted when a fetch fails.
    pub fn failed(&self) -> &Signal<(String, String)> {
        &self.inner.failed
    }
}

// ============================================================================
// ActingUser
// ============================================================================

/// Read-only identity of the user driving the wizard.
///
/// Injected by the host's session layer and used to stamp audit fields
/// ("detected by", "responsible"); the wizard never authenticates.
#[derive(Debug, Clone, PartialEq)]
pub struct ActingUser {
    /// Stable user identifier.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Role name as the session layer reports it.
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Provider double with per-kind results and optional slow kinds.
    struct TestProvider {
        calls: AtomicU32,
    }

    impl OptionsProvider for TestProvider {
        fn fetch_options(
            &self,
            kind: &str,
            params: &[(String, String)],
        ) -> BoxFuture<'static, Result<Vec<ChoiceOption>, LookupError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let kind = kind.to_string();
            let slow = params.iter().any(|(k, _)| k == "slow");
            Box::pin(async move {
                tokio::time::sleep(if slow {
                    Duration::from_millis(80)
                } else {
                    Duration::from_millis(5)
                })
                .await;
                match kind.as_str() {
                    "medication" => Ok(vec![
                        ChoiceOption::new("m-1", "Penicillin"),
                        ChoiceOption::new("m-2", "Ivermectin"),
                    ]),
                    "empty" => Ok(Vec::new()),
                    "down" => Err(LookupError::Unavailable("503".to_string())),
                    _ => Ok(Vec::new()),
                }
            })
        }
    }

    fn cache() -> (OptionsCache, Arc<TestProvider>) {
        let provider = Arc::new(TestProvider {
            calls: AtomicU32::new(0),
        });
        (
            OptionsCache::new(provider.clone(), tokio::runtime::Handle::current()),
            provider,
        )
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within 1s");
    }

    #[tokio::test]
    async fn test_refresh_populates_cache() {
        let (cache, _) = cache();
        assert!(cache.options("medication").is_empty());

        cache.refresh("medication", Vec::new());
        wait_until(|| cache.options("medication").len() == 2).await;
    }

    #[tokio::test]
    async fn test_empty_results_tolerated() {
        let (cache, _) = cache();
        let loaded = Arc::new(AtomicU32::new(0));
        let loaded_clone = loaded.clone();
        cache.loaded().connect(move |_| {
            loaded_clone.fetch_add(1, Ordering::SeqCst);
        });

        cache.refresh("empty", Vec::new());
        wait_until(|| loaded.load(Ordering::SeqCst) == 1).await;
        assert!(cache.options("empty").is_empty());
    }

    #[tokio::test]
    async fn test_superseded_fetch_discarded() {
        let (cache, _) = cache();

        // Slow fetch issued first, fast one second; the slow response must
        // not clobber the fast one.
        cache.refresh("medication", vec![("slow".to_string(), "1".to_string())]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.refresh("medication", Vec::new());

        wait_until(|| cache.options("medication").len() == 2).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.options("medication").len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_signals_without_poisoning_cache() {
        let (cache, _) = cache();
        let failed = Arc::new(AtomicU32::new(0));
        let failed_clone = failed.clone();
        cache.failed().connect(move |_| {
            failed_clone.fetch_add(1, Ordering::SeqCst);
        });

        cache.refresh("down", Vec::new());
        wait_until(|| failed.load(Ordering::SeqCst) == 1).await;
        assert!(cache.options("down").is_empty());
    }

    #[test]
    fn test_binding_params_derive_from_record() {
        let binding = OptionsBinding::new("farm", "pen").with_params(|record| {
            vec![(
                "farm_id".to_string(),
                record.get("farm").as_reference_id().unwrap_or("").to_string(),
            )]
        });

        let mut record = Record::new();
        record.set("farm", crate::value::Value::reference("f-3", "North farm"));
        assert_eq!(
            binding.params(&record),
            vec![("farm_id".to_string(), "f-3".to_string())]
        );
        assert_eq!(binding.trigger(), "farm");
        assert_eq!(binding.kind(), "pen");
    }
}
