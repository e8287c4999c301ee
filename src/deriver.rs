use chrono::NaiveDate;

use crate::types::InventoryRecord;
use crate::types::StockDraw;

/// Complete a raw draw with its derived fields relative to `today`.
pub fn derive(draw: StockDraw, today: NaiveDate) -> InventoryRecord {
    InventoryRecord {
        days_to_expiry: days_between(today, draw.expiry_date),
        total_count:    draw.cooler_count + draw.floor_count,
        product:        draw.product,
        cooler_count:   draw.cooler_count,
        floor_count:    draw.floor_count,
        expiry_date:    draw.expiry_date,
    }
}

/// Re-derive an existing record against another date. Only `days_to_expiry` may change.
pub fn rederive(record: &InventoryRecord, today: NaiveDate) -> InventoryRecord {
    InventoryRecord {
        days_to_expiry: days_between(today, record.expiry_date),
        total_count: record.cooler_count + record.floor_count,
        ..record.clone()
    }
}

#[inline]
fn days_between(today: NaiveDate, expiry_date: NaiveDate) -> i64 {
    (expiry_date - today).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draw(expiry_date: NaiveDate) -> StockDraw {
        StockDraw {
            product: "Short Rib".into(),
            cooler_count: 30,
            floor_count: 12,
            expiry_date,
        }
    }

    #[test]
    fn derives_totals_and_days() {
        let today = date(2025, 12, 30);

        let future = derive(draw(date(2026, 1, 4)), today);
        assert_eq!(future.total_count, 42);
        assert_eq!(future.days_to_expiry, 5);

        assert_eq!(derive(draw(today), today).days_to_expiry, 0);

        let past = derive(draw(date(2025, 12, 28)), today);
        assert_eq!(past.days_to_expiry, -2);
        assert!(past.is_expired());
    }

    #[test]
    fn leap_day_is_counted() {
        assert_eq!(derive(draw(date(2024, 3, 1)), date(2024, 2, 28)).days_to_expiry, 2);
    }

    #[test]
    fn a_day_later_reports_one_day_less() {
        let record = derive(draw(date(2025, 5, 10)), date(2025, 5, 8));
        assert_eq!(record.days_to_expiry, 2);

        let next_day = rederive(&record, date(2025, 5, 9));
        assert_eq!(next_day.days_to_expiry, 1);
        assert_eq!(next_day.expiry_date, record.expiry_date);
        assert_eq!(next_day.total_count, record.total_count);
    }
}
