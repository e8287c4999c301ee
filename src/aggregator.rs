use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use fieldx::fxstruct;
use tracing::instrument;

use crate::catalogue::Catalogue;
use crate::clock::Clock;
use crate::deriver::derive;
use crate::error::Result;
use crate::error::VizError;
use crate::generator::RecordGenerator;
use crate::memo::EntryState;
use crate::memo::MemoCache;
use crate::memo::DEFAULT_TTL;
use crate::types::InventoryRecord;

pub type Records = Arc<Vec<InventoryRecord>>;

/// Memo key: the operation plus its argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoKey {
    Category(String),
    All,
}

impl Display for MemoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category(name) => write!(f, "category:{name}"),
            Self::All => write!(f, "all"),
        }
    }
}

/// The read façade the dashboard consumes.
///
/// Both operations run the record generator and the field deriver and keep the result for [`ttl`](Self::ttl). Within
/// that window the very same collection is handed out again; once it is over, the next call regenerates against the
/// clock's current date.
#[fxstruct(sync, no_new, default(off), fallible(off, error(VizError)), builder, get)]
pub struct Aggregator {
    generator: RecordGenerator,

    #[fieldx(get(clone))]
    clock: Arc<dyn Clock>,

    #[fieldx(get(copy), default(DEFAULT_TTL))]
    ttl: Duration,

    #[fieldx(private, lazy, fallible, get(clone), builder(off))]
    memo: Arc<MemoCache<MemoKey, Vec<InventoryRecord>>>,
}

impl Aggregator {
    /// Default seed and a 60 second memo window.
    pub fn with_catalogue(catalogue: Arc<Catalogue>, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::builder()
            .generator(RecordGenerator::builder().catalogue(catalogue).build()?)
            .clock(clock)
            .build()?)
    }

    fn build_memo(&self) -> Result<Arc<MemoCache<MemoKey, Vec<InventoryRecord>>>> {
        Ok(Arc::new(
            MemoCache::builder()
                .clock(self.clock())
                .ttl(self.ttl())
                .name("inventory")
                .build()?,
        ))
    }

    pub fn catalogue(&self) -> Arc<Catalogue> {
        self.generator().catalogue()
    }

    fn records_for(&self, category: &str, today: NaiveDate) -> Result<Vec<InventoryRecord>> {
        Ok(self
            .generator()
            .generate_seeded(category, today)?
            .into_iter()
            .map(|draw| derive(draw, today))
            .collect())
    }

    /// Records of one category, in catalogue product order.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_category(&self, category: &str) -> Result<Records> {
        // Unknown names must not reach the cache.
        self.catalogue().products(category)?;

        self.memo()?
            .get_or_try_compute(&MemoKey::Category(category.to_string()), || {
                self.records_for(category, self.clock().today())
            })
            .await
    }

    /// Records of every category, concatenated in catalogue category order.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_all(&self) -> Result<Records> {
        self.memo()?
            .get_or_try_compute(&MemoKey::All, || {
                let today = self.clock().today();
                let catalogue = self.catalogue();
                let mut records = Vec::with_capacity(catalogue.product_count());
                for category in catalogue.category_names() {
                    records.extend(self.records_for(category, today)?);
                }
                Ok(records)
            })
            .await
    }

    pub async fn entry_state(&self, key: &MemoKey) -> Result<EntryState> {
        Ok(self.memo()?.entry_state(key).await)
    }

    pub async fn invalidate(&self, key: &MemoKey) -> Result<()> {
        self.memo()?.invalidate(key).await;
        Ok(())
    }

    /// Forget every memoized collection.
    pub fn invalidate_all(&self) -> Result<()> {
        self.memo()?.invalidate_all();
        Ok(())
    }
}

impl Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("generator", self.generator())
            .field("clock", &self.clock())
            .field("ttl", &self.ttl())
            .finish()
    }
}
