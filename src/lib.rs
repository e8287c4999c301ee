//! # vizcount
//!
//! Inventory aggregation core of the VizCount meat-department dashboard.
//!
//! The crate turns a product catalogue into per-product inventory records: cooler and sales-floor counts, an expiry
//! date, the days left until it and the combined count. Records are mock data drawn from a seeded random source, so
//! the same seed and the same calendar date always produce the same dashboard.
//!
//! The pieces, bottom-up:
//!
//! - [`catalogue`]: the ordered `category -> products` mapping and the expiry offsets to draw from.
//! - [`generator`]: one random draw per product.
//! - [`deriver`]: completes a draw with `days_to_expiry` and `total_count`.
//! - [`memo`]: time-bounded memoization over a [moka](https://crates.io/crates/moka) cache.
//! - [`aggregator`]: the façade the dashboard reads, per category or for all of them.
//! - [`summary`] and [`report`]: KPI figures, alerts, the expiry timeline and their terminal rendering.
//! - [`ingest`]: the mobile sync endpoint writing scans into the warehouse.
//! - [`app`]: the `vizcount` command line front end.
//!
//! ```ignore
//! let aggregator = Aggregator::with_catalogue(Arc::new(Catalogue::default()), Arc::new(SystemClock))?;
//! let beef = aggregator.get_category("Beef").await?;
//! let kpis = Kpis::from_records(&beef);
//! ```

pub mod aggregator;
pub mod app;
pub mod catalogue;
pub mod clock;
pub mod deriver;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod memo;
pub mod report;
pub mod summary;
pub mod types;

#[doc(inline)]
pub use aggregator::Aggregator;
#[doc(inline)]
pub use error::VizError;

pub mod prelude {
    pub use crate::aggregator::Aggregator;
    pub use crate::aggregator::MemoKey;
    pub use crate::aggregator::Records;
    pub use crate::catalogue::Catalogue;
    pub use crate::catalogue::Category;
    pub use crate::clock::Clock;
    pub use crate::clock::ManualClock;
    pub use crate::clock::SystemClock;
    pub use crate::error::Result;
    pub use crate::error::VizError;
    pub use crate::generator::RecordGenerator;
    pub use crate::memo::EntryState;
    pub use crate::summary::*;
    pub use crate::types::*;
}
