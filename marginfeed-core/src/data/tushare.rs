//! TuShare Pro data API client.
//!
//! The provider exposes every table through a single JSON endpoint:
//! `POST https://api.tushare.pro` with `{api_name, token, params, fields}`,
//! answered by `{code, msg, data: {fields, items}}` where `items` holds rows
//! in `fields` order.
//!
//! Each call is a single attempt. Classified errors go back to the caller;
//! the update cycle persists partial progress instead of retrying.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::limiter::RateLimiter;
use super::provider::{DataError, MarginDataProvider, MarginRecord};

/// Date format the provider uses in request params and response cells.
const TS_DATE_FMT: &str = "%Y%m%d";

/// Columns requested for `margin_detail`, pinned so a provider-side schema
/// addition cannot shift the cached table.
const MARGIN_DETAIL_FIELDS: &str =
    "trade_date,ts_code,name,rzye,rqye,rzmre,rqyl,rzche,rqchl,rqmcl,rzrqye";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    msg: Option<String>,
    data: Option<TableData>,
}

#[derive(Debug, Deserialize)]
struct TableData {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

/// A decoded table response: rows addressable by column name.
pub struct Table {
    index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn new(data: TableData) -> Self {
        let index = data
            .fields
            .into_iter()
            .enumerate()
            .map(|(i, f)| (f, i))
            .collect();
        Self {
            index,
            rows: data.items,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn cell(&self, row: usize, field: &str) -> Result<&Value, DataError> {
        let col = *self
            .index
            .get(field)
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("missing field '{field}'")))?;
        self.rows[row].get(col).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("row {row} is short of field '{field}'"))
        })
    }

    /// String cell; null decodes to an empty string.
    pub fn str_cell(&self, row: usize, field: &str) -> Result<String, DataError> {
        match self.cell(row, field)? {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s.clone()),
            other => Err(DataError::ResponseFormatChanged(format!(
                "field '{field}' is not a string: {other}"
            ))),
        }
    }

    /// Numeric cell; null decodes to `None`. Accepts numeric strings, which
    /// the provider emits for some tables.
    pub fn f64_cell(&self, row: usize, field: &str) -> Result<Option<f64>, DataError> {
        match self.cell(row, field)? {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(n.as_f64()),
            Value::String(s) => s.parse::<f64>().map(Some).map_err(|_| {
                DataError::ResponseFormatChanged(format!("field '{field}' is not numeric: '{s}'"))
            }),
            other => Err(DataError::ResponseFormatChanged(format!(
                "field '{field}' is not numeric: {other}"
            ))),
        }
    }

    /// `YYYYMMDD` date cell.
    pub fn date_cell(&self, row: usize, field: &str) -> Result<NaiveDate, DataError> {
        let raw = self.str_cell(row, field)?;
        NaiveDate::parse_from_str(&raw, TS_DATE_FMT).map_err(|_| {
            DataError::ResponseFormatChanged(format!("field '{field}' is not a date: '{raw}'"))
        })
    }
}

/// Map a non-zero provider response code to a structured error.
fn classify_api_error(code: i64, msg: Option<String>) -> DataError {
    let message = msg.unwrap_or_default();
    if message.to_lowercase().contains("token") {
        DataError::AuthenticationRequired(message)
    } else {
        DataError::ApiError { code, message }
    }
}

/// Decode `margin_detail` rows from a table response.
fn decode_margin_rows(table: &Table) -> Result<Vec<MarginRecord>, DataError> {
    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        records.push(MarginRecord {
            trade_date: table.date_cell(row, "trade_date")?,
            ts_code: table.str_cell(row, "ts_code")?,
            name: table.str_cell(row, "name")?,
            rzye: table.f64_cell(row, "rzye")?,
            rqye: table.f64_cell(row, "rqye")?,
            rzmre: table.f64_cell(row, "rzmre")?,
            rqyl: table.f64_cell(row, "rqyl")?,
            rzche: table.f64_cell(row, "rzche")?,
            rqchl: table.f64_cell(row, "rqchl")?,
            rqmcl: table.f64_cell(row, "rqmcl")?,
            rzrqye: table.f64_cell(row, "rzrqye")?,
        });
    }
    records.sort_by(|a, b| a.key().cmp(&b.key()));
    Ok(records)
}

/// Blocking client for the TuShare Pro table API.
pub struct TuShareClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: String,
    limiter: Arc<RateLimiter>,
}

impl TuShareClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
            limiter,
        }
    }

    /// Execute one table query. Every call passes through the rate limiter.
    pub fn query(&self, api_name: &str, params: Value, fields: &str) -> Result<Table, DataError> {
        self.limiter.acquire();

        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields,
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::NetworkUnreachable(format!(
                "HTTP {status} from {api_name}"
            )));
        }

        let api: ApiResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse {api_name} response: {e}"))
        })?;

        if api.code != 0 {
            return Err(classify_api_error(api.code, api.msg));
        }

        let data = api.data.ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("{api_name}: ok response with no data"))
        })?;
        Ok(Table::new(data))
    }

    /// `(cal_date, is_open)` pairs for an exchange over an inclusive range.
    pub fn trade_cal(
        &self,
        exchange: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, bool)>, DataError> {
        let table = self.query(
            "trade_cal",
            json!({
                "exchange": exchange,
                "start_date": from.format(TS_DATE_FMT).to_string(),
                "end_date": to.format(TS_DATE_FMT).to_string(),
            }),
            "cal_date,is_open",
        )?;

        let mut days = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let date = table.date_cell(row, "cal_date")?;
            let open = table.f64_cell(row, "is_open")?.map_or(false, |v| v != 0.0);
            days.push((date, open));
        }
        Ok(days)
    }
}

impl MarginDataProvider for TuShareClient {
    fn name(&self) -> &str {
        "tushare_pro"
    }

    fn margin_detail(&self, trade_date: NaiveDate) -> Result<Vec<MarginRecord>, DataError> {
        let day = trade_date.format(TS_DATE_FMT).to_string();
        let table = self.query(
            "margin_detail",
            json!({ "start_date": day, "end_date": day }),
            MARGIN_DETAIL_FIELDS,
        )?;

        let records = decode_margin_rows(&table)?;
        info!(%trade_date, rows = records.len(), "downloaded margin detail slice");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_from(fields: &[&str], items: Value) -> Table {
        let data = TableData {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            items: serde_json::from_value(items).unwrap(),
        };
        Table::new(data)
    }

    fn margin_fields() -> Vec<&'static str> {
        MARGIN_DETAIL_FIELDS.split(',').collect()
    }

    #[test]
    fn decodes_margin_rows_with_nulls() {
        let table = table_from(
            &margin_fields(),
            json!([
                ["20240102", "600000.SH", "浦发银行", 1.5e9, 2.0e7, 3.0e6, 150000.0, 2.5e6, null, 40000.0, 1.52e9],
                ["20240102", "000001.SZ", "平安银行", 2.5e9, null, 4.0e6, 90000.0, 3.5e6, 12000.0, 30000.0, 2.52e9]
            ]),
        );

        let records = decode_margin_rows(&table).unwrap();
        assert_eq!(records.len(), 2);

        // Sorted by (trade_date, ts_code): the SZ code sorts first.
        assert_eq!(records[0].ts_code, "000001.SZ");
        assert_eq!(records[0].rqye, None);
        assert_eq!(records[1].ts_code, "600000.SH");
        assert_eq!(records[1].rzye, Some(1.5e9));
        assert_eq!(records[1].rqchl, None);
        assert_eq!(
            records[1].trade_date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn numeric_strings_decode() {
        let table = table_from(&["is_open"], json!([["1"], ["0"]]));
        assert_eq!(table.f64_cell(0, "is_open").unwrap(), Some(1.0));
        assert_eq!(table.f64_cell(1, "is_open").unwrap(), Some(0.0));
    }

    #[test]
    fn bad_date_cell_is_a_format_error() {
        let mut items = vec![json!("2024-01-02")];
        items.extend(std::iter::repeat(json!(null)).take(10));
        let table = table_from(&margin_fields(), json!([items]));

        let err = decode_margin_rows(&table).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn missing_field_is_a_format_error() {
        let table = table_from(&["trade_date"], json!([["20240102"]]));
        let err = decode_margin_rows(&table).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn token_message_classifies_as_authentication() {
        let err = classify_api_error(2002, Some("token不对，请确认".into()));
        assert!(matches!(err, DataError::AuthenticationRequired(_)));

        let err = classify_api_error(40203, Some("抱歉，您每分钟最多访问该接口500次".into()));
        match err {
            DataError::ApiError { code, .. } => assert_eq!(code, 40203),
            other => panic!("expected ApiError, got: {other:?}"),
        }
    }
}
