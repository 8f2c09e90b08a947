//! Trading-calendar collaborators.
//!
//! `latest_trade_day` and `trade_days_between` are the only calendar queries
//! the dataset manager needs. `TushareCalendar` answers them from the
//! provider's `trade_cal` table; `FixedCalendar` answers them from an explicit
//! day list for tests and offline use.

use std::sync::Arc;

use chrono::NaiveDate;

use super::provider::DataError;
use super::tushare::TuShareClient;

pub trait TradeCalendar: Send + Sync {
    /// Most recent exchange trading day on or before today.
    fn latest_trade_day(&self) -> Result<NaiveDate, DataError>;

    /// Trading days in `[from, to]`, ascending. Empty when `from > to`.
    fn trade_days_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, DataError>;
}

/// Calendar backed by the provider's `trade_cal` table.
pub struct TushareCalendar {
    client: Arc<TuShareClient>,
    exchange: String,
}

impl TushareCalendar {
    /// Mainland exchanges share one trading calendar; SSE is the reference.
    pub fn new(client: Arc<TuShareClient>) -> Self {
        Self {
            client,
            exchange: "SSE".into(),
        }
    }

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

impl TradeCalendar for TushareCalendar {
    fn latest_trade_day(&self) -> Result<NaiveDate, DataError> {
        let today = Self::today();
        // A month of lookback always contains at least one open day.
        let from = today - chrono::Duration::days(31);
        let days = self.client.trade_cal(&self.exchange, from, today)?;
        latest_open_day(&days, today).ok_or(DataError::NoTradeDay)
    }

    fn trade_days_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, DataError> {
        if from > to {
            return Ok(Vec::new());
        }
        let days = self.client.trade_cal(&self.exchange, from, to)?;
        Ok(open_days_in(&days, from, to))
    }
}

/// Most recent open day on or before `today`.
fn latest_open_day(days: &[(NaiveDate, bool)], today: NaiveDate) -> Option<NaiveDate> {
    days.iter()
        .filter(|(d, open)| *open && *d <= today)
        .map(|(d, _)| *d)
        .max()
}

/// Open days within `[from, to]`, ascending.
fn open_days_in(days: &[(NaiveDate, bool)], from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut out: Vec<NaiveDate> = days
        .iter()
        .filter(|(d, open)| *open && *d >= from && *d <= to)
        .map(|(d, _)| *d)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Calendar over an explicit list of open days.
///
/// `latest_trade_day` is the last day in the list, which makes scripted update
/// cycles deterministic regardless of the wall clock.
pub struct FixedCalendar {
    open_days: Vec<NaiveDate>,
}

impl FixedCalendar {
    pub fn new(mut open_days: Vec<NaiveDate>) -> Self {
        open_days.sort_unstable();
        open_days.dedup();
        Self { open_days }
    }
}

impl TradeCalendar for FixedCalendar {
    fn latest_trade_day(&self) -> Result<NaiveDate, DataError> {
        self.open_days.last().copied().ok_or(DataError::NoTradeDay)
    }

    fn trade_days_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, DataError> {
        Ok(self
            .open_days
            .iter()
            .filter(|d| **d >= from && **d <= to)
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn latest_open_day_skips_closed_and_future_days() {
        let days = vec![
            (d(2024, 1, 5), true),
            (d(2024, 1, 6), false),
            (d(2024, 1, 7), false),
            (d(2024, 1, 8), true),
        ];

        // The 8th is open but in the future relative to "today" = the 7th.
        assert_eq!(latest_open_day(&days, d(2024, 1, 7)), Some(d(2024, 1, 5)));
        assert_eq!(latest_open_day(&days, d(2024, 1, 8)), Some(d(2024, 1, 8)));
    }

    #[test]
    fn latest_open_day_on_empty_window_is_none() {
        assert_eq!(latest_open_day(&[], d(2024, 1, 7)), None);

        let all_closed = vec![(d(2024, 1, 6), false), (d(2024, 1, 7), false)];
        assert_eq!(latest_open_day(&all_closed, d(2024, 1, 7)), None);
    }

    #[test]
    fn open_days_in_filters_and_sorts() {
        // Provider returns the calendar newest-first for some exchanges.
        let days = vec![
            (d(2024, 1, 8), true),
            (d(2024, 1, 7), false),
            (d(2024, 1, 5), true),
            (d(2024, 1, 4), true),
        ];

        assert_eq!(
            open_days_in(&days, d(2024, 1, 5), d(2024, 1, 8)),
            vec![d(2024, 1, 5), d(2024, 1, 8)]
        );
    }

    #[test]
    fn fixed_calendar_range_is_inclusive() {
        let cal = FixedCalendar::new(vec![d(2024, 1, 4), d(2024, 1, 5), d(2024, 1, 8)]);

        assert_eq!(
            cal.trade_days_between(d(2024, 1, 4), d(2024, 1, 8)).unwrap(),
            vec![d(2024, 1, 4), d(2024, 1, 5), d(2024, 1, 8)]
        );
        assert_eq!(
            cal.trade_days_between(d(2024, 1, 6), d(2024, 1, 7)).unwrap(),
            Vec::<NaiveDate>::new()
        );
        assert_eq!(cal.latest_trade_day().unwrap(), d(2024, 1, 8));
    }

    #[test]
    fn empty_fixed_calendar_has_no_latest_day() {
        let cal = FixedCalendar::new(Vec::new());
        assert!(matches!(
            cal.latest_trade_day(),
            Err(DataError::NoTradeDay)
        ));
    }
}
