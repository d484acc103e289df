//! Calculation results of the pricing engine

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::metering::MeterReading;

/// Sub-window of a billing period during which one assignment applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EffectiveWindow {
    /// Clip an assignment's interval to the billing period.
    /// `None` when the clipped window is empty.
    pub fn clip(
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        effective_from: DateTime<Utc>,
        effective_to: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        let start = period_start.max(effective_from);
        let end = effective_to.map_or(period_end, |to| period_end.min(to));
        (start < end).then_some(Self { start, end })
    }

    /// A reading belongs to the window whose end it falls on: `start < t <= end`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant > self.start && instant <= self.end
    }

    /// Readings of this window from a slice sorted ascending by `read_at`
    pub fn select<'a>(&self, readings: &'a [MeterReading]) -> &'a [MeterReading] {
        let lo = readings.partition_point(|r| r.read_at <= self.start);
        let hi = readings.partition_point(|r| r.read_at <= self.end);
        &readings[lo..hi.max(lo)]
    }

    /// e.g. "Jan 01 - Jan 15" in the site's local time
    pub fn label(&self, timezone: Tz) -> String {
        format!(
            "{} - {}",
            self.start.with_timezone(&timezone).format("%b %d"),
            self.end.with_timezone(&timezone).format("%b %d"),
        )
    }
}

/// One priced line produced by a rate strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculationLineItem {
    pub description: String,
    /// kWh
    pub quantity: Decimal,
    /// Unit price; absent when the rate is blended (time-of-use)
    pub rate: Option<Decimal>,
    pub amount: Decimal,
}

/// Ephemeral pricing outcome for one site over one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculationResult {
    pub total_amount: Decimal,
    /// Assignment order first, then rate order within a plan
    pub line_items: Vec<CalculationLineItem>,
}

impl CalculationResult {
    /// Zero-charge outcome, e.g. no tariff assigned in the period
    pub fn empty() -> Self {
        Self {
            total_amount: Decimal::ZERO,
            line_items: Vec::new(),
        }
    }

    pub fn from_line_items(line_items: Vec<CalculationLineItem>) -> Self {
        let total_amount = line_items.iter().map(|item| item.amount).sum();
        Self {
            total_amount,
            line_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn clip_uses_latest_start_and_earliest_end() {
        let w = EffectiveWindow::clip(at(1, 0), at(31, 0), at(10, 0), None).unwrap();
        assert_eq!(w.start, at(10, 0));
        assert_eq!(w.end, at(31, 0));

        let w = EffectiveWindow::clip(at(5, 0), at(31, 0), at(1, 0), Some(at(15, 0))).unwrap();
        assert_eq!(w.start, at(5, 0));
        assert_eq!(w.end, at(15, 0));
    }

    #[test]
    fn clip_discards_empty_windows() {
        assert!(EffectiveWindow::clip(at(10, 0), at(20, 0), at(1, 0), Some(at(10, 0))).is_none());
        assert!(EffectiveWindow::clip(at(10, 0), at(20, 0), at(20, 0), None).is_none());
    }

    #[test]
    fn back_to_back_windows_cover_period_without_double_counting() {
        let (a, m, b) = (at(1, 0), at(15, 0), at(31, 0));
        let first = EffectiveWindow::clip(a, b, a, Some(m)).unwrap();
        let second = EffectiveWindow::clip(a, b, m, None).unwrap();
        assert_eq!(first.start, a);
        assert_eq!(first.end, second.start);
        assert_eq!(second.end, b);

        assert!(first.contains(m));
        assert!(!second.contains(m));
    }

    #[test]
    fn select_slices_sorted_readings_by_end_boundary() {
        let site = Uuid::new_v4();
        let readings: Vec<MeterReading> = [1, 5, 15, 20]
            .iter()
            .map(|&day| MeterReading::new(site, at(day, 0), Decimal::ONE))
            .collect();

        let window = EffectiveWindow { start: at(1, 0), end: at(15, 0) };
        let slice = window.select(&readings);
        let days: Vec<DateTime<Utc>> = slice.iter().map(|r| r.read_at).collect();
        assert_eq!(days, vec![at(5, 0), at(15, 0)]);
    }

    #[test]
    fn label_uses_site_timezone() {
        let window = EffectiveWindow { start: at(1, 0), end: at(15, 0) };
        assert_eq!(window.label(chrono_tz::Etc::UTC), "Jan 01 - Jan 15");
        // 2026-01-14T20:00Z is already Jan 15 in Singapore
        let window = EffectiveWindow { start: at(1, 0), end: at(14, 20) };
        assert_eq!(window.label(chrono_tz::Asia::Singapore), "Jan 01 - Jan 15");
    }

    #[test]
    fn result_total_is_sum_of_amounts() {
        let item = |amount: i64| CalculationLineItem {
            description: "x".into(),
            quantity: Decimal::ONE,
            rate: None,
            amount: Decimal::new(amount, 2),
        };
        let result = CalculationResult::from_line_items(vec![item(2000), item(3000)]);
        assert_eq!(result.total_amount, Decimal::new(5000, 2));
        assert_eq!(CalculationResult::empty().total_amount, Decimal::ZERO);
    }
}
