use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono::TimeDelta;
use fieldx::fxstruct;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;

use crate::catalogue::Catalogue;
use crate::error::Result;
use crate::error::VizError;
use crate::types::StockDraw;

pub const DEFAULT_SEED: u64 = 42;
pub const COOLER_RANGE: RangeInclusive<u32> = 8..=80;
pub const FLOOR_RANGE: RangeInclusive<u32> = 2..=25;

/// Produces one mock stock draw per catalogued product.
///
/// Per product the draws come in a fixed order: the expiry offset, then the cooler count, then the floor count.
///
/// [`generate_seeded`](Self::generate_seeded) resets the random source to the configured seed on every call, whatever
/// the category. Two categories therefore start from the very same random sequence, and a given seed yields the same
/// mock data in every run.
#[derive(Debug, Clone)]
#[fxstruct(no_new, default(off), builder, get(copy))]
pub struct RecordGenerator {
    #[fieldx(get(clone))]
    catalogue: Arc<Catalogue>,

    #[fieldx(default(DEFAULT_SEED))]
    seed: u64,
}

impl RecordGenerator {
    /// Draw an expiry offset, cooler and floor counts for every product of `category`, in catalogue order.
    pub fn generate<R: Rng>(&self, category: &str, today: NaiveDate, rng: &mut R) -> Result<Vec<StockDraw>> {
        let products = self.catalogue.products(category)?;
        let offsets = self.catalogue.expiry_offsets();

        products
            .iter()
            .map(|product| -> Result<StockDraw> {
                let offset = *offsets
                    .choose(rng)
                    .ok_or_else(|| VizError::InvalidCatalogue("no expiry offsets to draw from".to_string()))?;
                let cooler_count = rng.random_range(COOLER_RANGE);
                let floor_count = rng.random_range(FLOOR_RANGE);
                let expiry_date = TimeDelta::try_days(offset)
                    .and_then(|delta| today.checked_add_signed(delta))
                    .ok_or_else(|| {
                        VizError::InvalidCatalogue(format!("expiry offset {offset} from {today} is out of range"))
                    })?;

                Ok(StockDraw {
                    product: product.clone(),
                    cooler_count,
                    floor_count,
                    expiry_date,
                })
            })
            .collect()
    }

    pub fn generate_seeded(&self, category: &str, today: NaiveDate) -> Result<Vec<StockDraw>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.generate(category, today, &mut rng)
    }
}
