//! Dataset manager for the margin-trading detail table.
//!
//! Owns the incremental-update cycle: decide the missing date range, fetch it
//! one trading day at a time, merge with the cached table, persist. A fetch
//! failure aborts the remaining days but still persists whatever was fetched
//! before the error propagates.

use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use super::calendar::TradeCalendar;
use super::provider::{DataError, MarginDataProvider, MarginRecord};
use super::store::CsvStore;

/// First date the provider carries margin detail data.
pub fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2014, 9, 22).unwrap()
}

/// Outcome of one update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Trading days the cycle set out to fetch.
    pub days_requested: usize,
    /// Trading days fetched successfully.
    pub days_fetched: usize,
    /// Net new rows in the cached table.
    pub rows_added: usize,
    /// Max trade date in the cache after the cycle, if any rows exist.
    pub latest_cached: Option<NaiveDate>,
}

impl UpdateSummary {
    /// True when the cycle had nothing to fetch.
    pub fn up_to_date(&self) -> bool {
        self.days_requested == 0
    }
}

/// Manager for the locally cached margin detail table.
///
/// Provider and calendar are injected per call, so tests drive the cycle with
/// a scripted provider and a fixed calendar.
pub struct MarginDetail {
    store: CsvStore,
    records: Option<Vec<MarginRecord>>,
}

impl MarginDetail {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: CsvStore::new(data_dir),
            records: None,
        }
    }

    /// Path of the cached table.
    pub fn file_path(&self) -> PathBuf {
        self.store.file_path()
    }

    /// Load the cached table once; later calls reuse the in-memory copy.
    pub fn load(&mut self) -> Result<&[MarginRecord], DataError> {
        if self.records.is_none() {
            self.records = Some(self.store.load()?);
        }
        Ok(self.records.as_deref().expect("records loaded above"))
    }

    /// Day this cycle starts fetching from: the day after the cached max
    /// trade date, or the base date when the cache is empty.
    pub fn start_date(&mut self) -> Result<NaiveDate, DataError> {
        let records = self.load()?;
        Ok(match records.last() {
            Some(last) => last.trade_date + Duration::days(1),
            None => base_date(),
        })
    }

    /// True when no cache file exists, or the cached max trade date is older
    /// than the latest exchange trading day.
    pub fn should_update(&mut self, calendar: &dyn TradeCalendar) -> Result<bool, DataError> {
        if !self.store.exists() {
            return Ok(true);
        }
        let latest = calendar.latest_trade_day()?;
        let records = self.load()?;
        Ok(match records.last() {
            Some(last) => last.trade_date < latest,
            None => true,
        })
    }

    /// Run one incremental update cycle.
    ///
    /// Fetches every missing trading day up to the latest one and merges the
    /// slices into the cached table. On a fetch error the remaining days are
    /// skipped, the slices fetched so far are still persisted, and the error
    /// is returned.
    pub fn update(
        &mut self,
        provider: &dyn MarginDataProvider,
        calendar: &dyn TradeCalendar,
    ) -> Result<UpdateSummary, DataError> {
        if !self.should_update(calendar)? {
            info!(path = %self.file_path().display(), "margin detail table is up to date");
            return Ok(UpdateSummary {
                days_requested: 0,
                days_fetched: 0,
                rows_added: 0,
                latest_cached: self.load()?.last().map(|r| r.trade_date),
            });
        }

        let last_trade_day = calendar.latest_trade_day()?;
        let days = calendar.trade_days_between(self.start_date()?, last_trade_day)?;

        let mut fetched: Vec<MarginRecord> = Vec::new();
        let mut days_fetched = 0;
        let mut fetch_err: Option<DataError> = None;

        for day in &days {
            match provider.margin_detail(*day) {
                Ok(mut slice) => {
                    fetched.append(&mut slice);
                    days_fetched += 1;
                }
                Err(e) => {
                    fetch_err = Some(e);
                    break;
                }
            }
        }

        let mut rows_added = 0;
        if !fetched.is_empty() {
            let existing = self.load()?.to_vec();
            let before = existing.len();
            let merged = merge_records(existing, fetched);
            // A legacy file with duplicate pairs can shrink on merge.
            rows_added = merged.len().saturating_sub(before);
            self.store.write(&merged)?;
            info!(
                path = %self.file_path().display(),
                latest = %last_trade_day,
                rows_added,
                "margin detail table updated"
            );
            self.records = Some(merged);
        }

        let latest_cached = self.load()?.last().map(|r| r.trade_date);

        match fetch_err {
            Some(e) => {
                warn!(error = %e, "margin detail update aborted; partial progress persisted");
                Err(e)
            }
            None => Ok(UpdateSummary {
                days_requested: days.len(),
                days_fetched,
                rows_added,
                latest_cached,
            }),
        }
    }
}

/// Merge fetched slices into the cached table: drop duplicate
/// (trade_date, ts_code) pairs — the existing cached row wins — and sort
/// ascending by (trade_date, ts_code).
pub fn merge_records(existing: Vec<MarginRecord>, fetched: Vec<MarginRecord>) -> Vec<MarginRecord> {
    let mut merged = existing;
    merged.extend(fetched);
    // Stable sort keeps the existing row ahead of a re-fetched duplicate.
    merged.sort_by(|a, b| a.key().cmp(&b.key()));
    merged.dedup_by(|b, a| a.key() == b.key());
    merged
}
