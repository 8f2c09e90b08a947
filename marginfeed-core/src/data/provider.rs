//! Provider seam and record/error types for margin detail data.
//!
//! The MarginDataProvider trait abstracts over the concrete data source so the
//! dataset manager can be driven by a scripted provider in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One margin-trading detail row: a single security on a single trading day.
///
/// Field names follow the provider's own column names so the cached CSV and
/// the wire format stay aligned. Numeric fields are nullable on the wire, so
/// absent cells round-trip as empty CSV cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginRecord {
    pub trade_date: NaiveDate,
    /// Security code, e.g. `600000.SH`.
    pub ts_code: String,
    /// Security short name.
    pub name: String,
    /// Financing balance (CNY).
    pub rzye: Option<f64>,
    /// Short-selling balance (CNY).
    pub rqye: Option<f64>,
    /// Financing bought during the day (CNY).
    pub rzmre: Option<f64>,
    /// Short-selling volume outstanding (shares).
    pub rqyl: Option<f64>,
    /// Financing repaid during the day (CNY).
    pub rzche: Option<f64>,
    /// Short-selling volume covered during the day (shares).
    pub rqchl: Option<f64>,
    /// Short-selling volume sold during the day (shares).
    pub rqmcl: Option<f64>,
    /// Combined financing and short-selling balance (CNY).
    pub rzrqye: Option<f64>,
}

impl MarginRecord {
    /// Identity of a row in the cached table. The table holds at most one row
    /// per key after a merge.
    pub fn key(&self) -> (NaiveDate, &str) {
        (self.trade_date, self.ts_code.as_str())
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("provider error {code}: {message}")]
    ApiError { code: i64, message: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("calendar window contains no trading days")]
    NoTradeDay,
}

/// Trait for margin detail providers.
///
/// One call fetches one trading day: the provider caps a response at roughly
/// 2000 rows, and a single day's detail stays under that cap.
pub trait MarginDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch all margin detail rows for one trading day, sorted ascending by
    /// (trade_date, ts_code). A day the provider has not published yet is an
    /// empty slice, not an error.
    fn margin_detail(&self, trade_date: NaiveDate) -> Result<Vec<MarginRecord>, DataError>;
}
