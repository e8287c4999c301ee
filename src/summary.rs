//! Figures the dashboard renders: KPI cards, expiry alerts, the expiry timeline, row highlighting and the sidebar
//! quick stats. Everything here is a pure function of a record slice.

use serde::Serialize;
use strum::IntoEnumIterator;

use crate::types::InventoryRecord;

/// Expiry timeline groups, declared in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumIter)]
pub enum ExpiryBucket {
    Expired,
    Today,
    #[strum(serialize = "1 Day")]
    #[serde(rename = "1 Day")]
    OneDay,
    #[strum(serialize = "2 Days")]
    #[serde(rename = "2 Days")]
    TwoDays,
    #[strum(serialize = "5+ Days")]
    #[serde(rename = "5+ Days")]
    Later,
}

impl ExpiryBucket {
    pub fn for_days(days_to_expiry: i64) -> Self {
        match days_to_expiry {
            d if d < 0 => Self::Expired,
            0 => Self::Today,
            1 => Self::OneDay,
            2 => Self::TwoDays,
            _ => Self::Later,
        }
    }

    pub fn colour(&self) -> &'static str {
        match self {
            Self::Expired => "#ef4444",
            Self::Today | Self::OneDay => "#f59e0b",
            Self::TwoDays => "#3b82f6",
            Self::Later => "#22c55e",
        }
    }
}

/// Row highlighting of the inventory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum Severity {
    Expired,
    Today,
    Soon,
    Normal,
}

impl Severity {
    pub fn for_days(days_to_expiry: i64) -> Self {
        match days_to_expiry {
            d if d < 0 => Self::Expired,
            0 => Self::Today,
            1..=2 => Self::Soon,
            _ => Self::Normal,
        }
    }
}

/// Human readable expiry status of a table row.
pub fn status_label(days_to_expiry: i64) -> String {
    match days_to_expiry {
        d if d < 0 => format!("Expired {}d ago", d.unsigned_abs()),
        0 => "Expires Today".to_string(),
        1 => "Tomorrow".to_string(),
        d => format!("In {d} days"),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Kpis {
    pub total_cooler:         u64,
    pub total_floor:          u64,
    pub unique_products:      usize,
    /// Rows expiring within the next two days, today included.
    pub expiring_soon:        usize,
    /// Rows expiring tomorrow or the day after.
    pub more_within_two_days: usize,
}

impl Kpis {
    pub fn from_records(records: &[InventoryRecord]) -> Self {
        records.iter().fold(
            Self {
                unique_products: records.len(),
                ..Self::default()
            },
            |mut kpis, record| {
                kpis.total_cooler += u64::from(record.cooler_count);
                kpis.total_floor += u64::from(record.floor_count);
                if (0..=2).contains(&record.days_to_expiry) {
                    kpis.expiring_soon += 1;
                }
                if (1..=2).contains(&record.days_to_expiry) {
                    kpis.more_within_two_days += 1;
                }
                kpis
            },
        )
    }
}

/// Product names needing action, in record order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryAlerts {
    pub expired:  Vec<String>,
    pub today:    Vec<String>,
    pub tomorrow: Vec<String>,
}

impl ExpiryAlerts {
    pub fn from_records(records: &[InventoryRecord]) -> Self {
        let mut alerts = Self::default();
        for record in records {
            let bucket = match record.days_to_expiry {
                d if d < 0 => &mut alerts.expired,
                0 => &mut alerts.today,
                1 => &mut alerts.tomorrow,
                _ => continue,
            };
            bucket.push(record.product.clone());
        }
        alerts
    }

    /// Nothing to alert about; the dashboard hides the alert panel.
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.today.is_empty() && self.tomorrow.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineBar {
    pub bucket: ExpiryBucket,
    pub count:  u64,
}

/// Sum of `total_count` per expiry bucket. Every bucket is present, in display order, empty ones with zero.
pub fn expiry_timeline(records: &[InventoryRecord]) -> Vec<TimelineBar> {
    ExpiryBucket::iter()
        .map(|bucket| TimelineBar {
            bucket,
            count: records
                .iter()
                .filter(|r| ExpiryBucket::for_days(r.days_to_expiry) == bucket)
                .map(|r| u64::from(r.total_count))
                .sum(),
        })
        .collect()
}

/// Sidebar badge of a category: rows expiring by tomorrow, already expired ones included.
pub fn category_badge(records: &[InventoryRecord]) -> usize {
    records.iter().filter(|r| r.days_to_expiry <= 1).count()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuickStats {
    pub expiring_today:  usize,
    pub already_expired: usize,
}

impl QuickStats {
    pub fn from_records(records: &[InventoryRecord]) -> Self {
        Self {
            expiring_today:  records.iter().filter(|r| r.days_to_expiry == 0).count(),
            already_expired: records.iter().filter(|r| r.is_expired()).count(),
        }
    }
}
