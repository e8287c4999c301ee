use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

/// Raw per-product draw as it leaves the record generator, before any field is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDraw {
    pub product:      String,
    pub cooler_count: u32,
    pub floor_count:  u32,
    pub expiry_date:  NaiveDate,
}

/// One inventory row per product and category, as consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product:        String,
    pub cooler_count:   u32,
    pub floor_count:    u32,
    pub expiry_date:    NaiveDate,
    pub days_to_expiry: i64,
    pub total_count:    u32,
}

impl InventoryRecord {
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.days_to_expiry < 0
    }
}
