//! Margin-trading detail download and caching.

pub mod calendar;
pub mod dataset;
pub mod limiter;
pub mod provider;
pub mod store;
pub mod tushare;

pub use calendar::{FixedCalendar, TradeCalendar, TushareCalendar};
pub use dataset::{base_date, merge_records, MarginDetail, UpdateSummary};
pub use limiter::RateLimiter;
pub use provider::{DataError, MarginDataProvider, MarginRecord};
pub use store::CsvStore;
pub use tushare::TuShareClient;
