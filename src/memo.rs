use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use fieldx::fxstruct;
use moka::future::Cache;
use moka::ops::compute::CompResult;
use moka::ops::compute::Op;

use crate::clock::Clock;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Life cycle of a memo key: `Absent -> Fresh` on the first call, `Fresh -> Stale` once the TTL is over, and
/// `Stale -> Fresh` again when the next call regenerates the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Fresh,
    Stale,
}

/// A memoized value with the instant it stops being fresh.
#[derive(Debug)]
pub struct Memo<V> {
    value:      Arc<V>,
    expires_at: Instant,
}

impl<V> Memo<V> {
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    #[inline]
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

impl<V> Clone for Memo<V> {
    fn clone(&self) -> Self {
        Self {
            value:      Arc::clone(&self.value),
            expires_at: self.expires_at,
        }
    }
}

/// Time-bounded memoization on top of a [moka](https://crates.io/crates/moka) cache.
///
/// Freshness is decided by the injected [`Clock`], not by moka's own expiration, which makes time travel possible in
/// tests. Populating a key runs under moka's per-key compute lock: concurrent callers missing the same key wait for a
/// single computation instead of repeating it.
///
/// ```ignore
/// let memo = MemoCache::<String, Vec<u32>>::builder()
///     .clock(Arc::new(SystemClock))
///     .ttl(Duration::from_secs(60))
///     .build()?;
///
/// let values = memo.get_or_try_compute(&key, || Ok::<_, VizError>(vec![1, 2, 3])).await?;
/// ```
#[fxstruct(sync, no_new, default(off), builder, get(copy))]
pub struct MemoCache<K, V>
where
    K: Debug + Display + Hash + Clone + Eq + Send + Sync + 'static,
    V: Debug + Send + Sync + 'static,
{
    #[fieldx(get(clone))]
    clock: Arc<dyn Clock>,

    #[fieldx(default(DEFAULT_TTL))]
    ttl: Duration,

    #[fieldx(default(1_000))]
    max_capacity: u64,

    /// Cache name. Most useful for debugging and logging.
    #[fieldx(default("memo"))]
    name: &'static str,

    #[fieldx(private, lazy, get(clone), builder(off))]
    cache: Arc<Cache<K, Memo<V>>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Debug + Display + Hash + Clone + Eq + Send + Sync + 'static,
    V: Debug + Send + Sync + 'static,
{
    fn build_cache(&self) -> Arc<Cache<K, Memo<V>>> {
        Arc::new(
            Cache::builder()
                .max_capacity(self.max_capacity())
                .name(self.name())
                .build(),
        )
    }

    /// Return the memoized value for `key`, computing it with `init` when the key is absent or stale.
    ///
    /// A failing `init` leaves the cache as it was.
    pub async fn get_or_try_compute<F, E>(&self, key: &K, init: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
        E: Send + Sync + 'static,
    {
        let clock = self.clock();
        let ttl = self.ttl();
        let name = self.name();

        let outcome = self
            .cache()
            .entry(key.clone())
            .and_try_compute_with(|entry| async move {
                let now = clock.now();
                let op = match entry {
                    Some(entry) if entry.value().is_fresh(now) => {
                        log::debug!("[{name}] HIT({key})");
                        Op::Nop
                    }
                    stale_or_absent => {
                        if stale_or_absent.is_some() {
                            log::debug!("[{name}] STALE({key})");
                        }
                        else {
                            log::debug!("[{name}] MISS({key})");
                        }
                        Op::Put(Memo {
                            value:      Arc::new(init()?),
                            expires_at: now + ttl,
                        })
                    }
                };

                Result::<Op<Memo<V>>, E>::Ok(op)
            })
            .await?;

        Ok(match outcome {
            CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) | CompResult::Unchanged(entry) => {
                entry.into_value().value
            }
            CompResult::Removed(_) | CompResult::StillNone(_) => {
                unreachable!("[{name}] memo computation for '{key}' neither kept nor stored a value")
            }
        })
    }

    pub async fn entry_state(&self, key: &K) -> EntryState {
        match self.cache().get(key).await {
            None => EntryState::Absent,
            Some(memo) if memo.is_fresh(self.clock().now()) => EntryState::Fresh,
            Some(_) => EntryState::Stale,
        }
    }

    pub async fn invalidate(&self, key: &K) {
        log::debug!("[{}] INVALIDATE({key})", self.name());
        self.cache().invalidate(key).await;
    }

    /// Drop every memo.
    pub fn invalidate_all(&self) {
        log::debug!("[{}] INVALIDATE(*)", self.name());
        self.cache().invalidate_all();
    }
}

impl<K, V> Debug for MemoCache<K, V>
where
    K: Debug + Display + Hash + Clone + Eq + Send + Sync + 'static,
    V: Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCache")
            .field("name", &self.name())
            .field("ttl", &self.ttl())
            .field("clock", &self.clock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use chrono::NaiveDate;

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::VizError;

    fn memo(clock: Arc<ManualClock>) -> MemoCache<String, Vec<u32>> {
        MemoCache::builder()
            .clock(clock)
            .ttl(Duration::from_secs(60))
            .name("test")
            .build()
            .unwrap()
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()))
    }

    #[tokio::test]
    async fn state_transitions() {
        let clock = clock();
        let memo = memo(clock.clone());
        let key = "Beef".to_string();
        let calls = AtomicUsize::new(0);
        let compute = || {
            let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
            Ok::<_, VizError>(vec![n])
        };

        assert_eq!(memo.entry_state(&key).await, EntryState::Absent);

        let first = memo.get_or_try_compute(&key, compute).await.unwrap();
        assert_eq!(memo.entry_state(&key).await, EntryState::Fresh);

        clock.advance(Duration::from_secs(59));
        let again = memo.get_or_try_compute(&key, compute).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(1));
        assert_eq!(memo.entry_state(&key).await, EntryState::Stale);

        let third = memo.get_or_try_compute(&key, compute).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*third, vec![1]);
        assert_eq!(memo.entry_state(&key).await, EntryState::Fresh);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let memo = memo(clock());
        let a = memo
            .get_or_try_compute(&"a".to_string(), || Ok::<_, VizError>(vec![1]))
            .await
            .unwrap();
        let b = memo
            .get_or_try_compute(&"b".to_string(), || Ok::<_, VizError>(vec![2]))
            .await
            .unwrap();
        assert_eq!((*a).clone(), vec![1]);
        assert_eq!((*b).clone(), vec![2]);
    }

    #[tokio::test]
    async fn failure_stores_nothing() {
        let memo = memo(clock());
        let key = "Nope".to_string();

        let outcome = memo
            .get_or_try_compute(&key, || Err::<Vec<u32>, _>(VizError::UnknownCategory(key.clone())))
            .await;
        assert!(matches!(outcome, Err(VizError::UnknownCategory(_))));
        assert_eq!(memo.entry_state(&key).await, EntryState::Absent);
    }

    #[tokio::test]
    async fn invalidation() {
        let memo = memo(clock());
        let key = "k".to_string();

        memo.get_or_try_compute(&key, || Ok::<_, VizError>(vec![])).await.unwrap();
        memo.invalidate(&key).await;
        assert_eq!(memo.entry_state(&key).await, EntryState::Absent);

        let other = "other".to_string();
        memo.get_or_try_compute(&key, || Ok::<_, VizError>(vec![])).await.unwrap();
        memo.get_or_try_compute(&other, || Ok::<_, VizError>(vec![])).await.unwrap();
        memo.invalidate_all();
        assert_eq!(memo.entry_state(&key).await, EntryState::Absent);
        assert_eq!(memo.entry_state(&other).await, EntryState::Absent);

        // The cache stays usable afterwards.
        let again = memo
            .get_or_try_compute(&key, || Ok::<_, VizError>(vec![3]))
            .await
            .unwrap();
        assert_eq!(*again, vec![3]);
        assert_eq!(memo.entry_state(&key).await, EntryState::Fresh);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_compute_once() {
        let memo = Arc::new(memo(clock()));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..16 {
            let memo = memo.clone();
            let calls = calls.clone();
            tasks.spawn(async move {
                memo.get_or_try_compute(&"shared".to_string(), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    Ok::<_, VizError>(vec![7])
                })
                .await
                .unwrap()
            });
        }

        while let Some(res) = tasks.join_next().await {
            assert_eq!(*res.unwrap(), vec![7]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
