//! Plain-text rendering of the dashboard for the terminal.

use comfy_table::presets::ASCII_FULL_CONDENSED;
use comfy_table::CellAlignment;
use comfy_table::Table;
use serde::Serialize;

use crate::summary::category_badge;
use crate::summary::expiry_timeline;
use crate::summary::status_label;
use crate::summary::ExpiryAlerts;
use crate::summary::Kpis;
use crate::summary::QuickStats;
use crate::summary::Severity;
use crate::summary::TimelineBar;
use crate::types::InventoryRecord;

fn table_with_header<const N: usize>(header: [&str; N]) -> Table {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL_CONDENSED).set_header(header);
    table
}

fn align_right(table: &mut Table, columns: impl IntoIterator<Item = usize>) {
    for col in columns {
        if let Some(column) = table.column_mut(col) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
}

pub fn kpi_table(kpis: &Kpis) -> Table {
    let mut table = table_with_header(["Total Cooler", "Total Floor", "Products", "Expiring Soon"]);
    table.add_row([
        kpis.total_cooler.to_string(),
        kpis.total_floor.to_string(),
        kpis.unique_products.to_string(),
        format!("{} (+{} within 2 days)", kpis.expiring_soon, kpis.more_within_two_days),
    ]);
    align_right(&mut table, 0..4);
    table
}

/// `None` when there is nothing to alert about.
pub fn alerts_text(alerts: &ExpiryAlerts) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }

    let mut lines = vec!["Expiry Alerts".to_string()];
    for (label, products) in [
        ("Expired", &alerts.expired),
        ("Expires today", &alerts.today),
        ("Expires tomorrow", &alerts.tomorrow),
    ] {
        if !products.is_empty() {
            lines.push(format!("  {label}: {}", products.join(", ")));
        }
    }
    Some(lines.join("\n"))
}

pub fn timeline_table(timeline: &[TimelineBar]) -> Table {
    let mut table = table_with_header(["Expiry", "Units", "Colour"]);
    for bar in timeline {
        table.add_row([bar.bucket.to_string(), bar.count.to_string(), bar.bucket.colour().to_string()]);
    }
    align_right(&mut table, [1]);
    table
}

pub fn inventory_table(records: &[InventoryRecord]) -> Table {
    let mut table = table_with_header(["Product", "Cooler", "Floor", "Total", "Expiry Date", "Status", "Severity"]);
    for record in records {
        table.add_row([
            record.product.clone(),
            record.cooler_count.to_string(),
            record.floor_count.to_string(),
            record.total_count.to_string(),
            record.expiry_date.format("%Y-%m-%d").to_string(),
            status_label(record.days_to_expiry),
            Severity::for_days(record.days_to_expiry).to_string(),
        ]);
    }
    align_right(&mut table, 1..=3);
    table
}

/// Category list with alert badges plus the global quick stats.
pub fn sidebar_table<'a, I>(categories: I, quick_stats: &QuickStats) -> Table
where
    I: IntoIterator<Item = (&'a str, &'a [InventoryRecord])>,
{
    let mut table = table_with_header(["Category", "Alerts"]);
    for (name, records) in categories {
        table.add_row([name.to_string(), category_badge(records).to_string()]);
    }
    table
        .add_row(["Expiring today".to_string(), quick_stats.expiring_today.to_string()])
        .add_row(["Already expired".to_string(), quick_stats.already_expired.to_string()]);
    align_right(&mut table, [1]);
    table
}

/// A full dashboard view over one selection of records.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView<'a> {
    pub title:    String,
    pub kpis:     Kpis,
    pub alerts:   ExpiryAlerts,
    pub timeline: Vec<TimelineBar>,
    pub records:  &'a [InventoryRecord],
}

impl<'a> DashboardView<'a> {
    pub fn new<S: Into<String>>(title: S, records: &'a [InventoryRecord]) -> Self {
        Self {
            title: title.into(),
            kpis: Kpis::from_records(records),
            alerts: ExpiryAlerts::from_records(records),
            timeline: expiry_timeline(records),
            records,
        }
    }

    pub fn render(&self) -> String {
        let mut sections = vec![format!("*** {} ***", self.title), kpi_table(&self.kpis).to_string()];
        if let Some(alerts) = alerts_text(&self.alerts) {
            sections.push(alerts);
        }
        sections.push(timeline_table(&self.timeline).to_string());
        sections.push(inventory_table(self.records).to_string());
        sections.join("\n")
    }
}
