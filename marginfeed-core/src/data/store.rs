//! CSV store for the margin detail table.
//!
//! Layout: `{data_dir}/market/margin_trading_detail.csv`, one row per
//! (trade_date, ts_code). Writes go to a `.tmp` sibling and rename into
//! place, so a failed write never corrupts the existing table.

use std::fs;
use std::path::PathBuf;

use super::provider::{DataError, MarginRecord};

/// The flat CSV table on disk.
pub struct CsvStore {
    data_dir: PathBuf,
}

impl CsvStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Path of the cached table.
    pub fn file_path(&self) -> PathBuf {
        self.data_dir.join("market").join("margin_trading_detail.csv")
    }

    pub fn exists(&self) -> bool {
        self.file_path().exists()
    }

    /// Load the cached table, sorted ascending by (trade_date, ts_code).
    /// A missing file is an empty table, not an error.
    pub fn load(&self) -> Result<Vec<MarginRecord>, DataError> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::StoreError(format!("open {}: {e}", path.display())))?;

        let mut records = Vec::new();
        for row in reader.deserialize() {
            let record: MarginRecord = row
                .map_err(|e| DataError::StoreError(format!("parse {}: {e}", path.display())))?;
            records.push(record);
        }

        records.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(records)
    }

    /// Replace the table atomically: serialize to a `.tmp` sibling, then
    /// rename into place. The temp file is removed on rename failure.
    pub fn write(&self, records: &[MarginRecord]) -> Result<(), DataError> {
        let path = self.file_path();
        let parent = path.parent().expect("table path always has a parent");
        fs::create_dir_all(parent)
            .map_err(|e| DataError::StoreError(format!("create {}: {e}", parent.display())))?;

        let tmp_path = path.with_extension("csv.tmp");
        let mut writer = csv::Writer::from_path(&tmp_path)
            .map_err(|e| DataError::StoreError(format!("create {}: {e}", tmp_path.display())))?;
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| DataError::StoreError(format!("serialize row: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| DataError::StoreError(format!("flush {}: {e}", tmp_path.display())))?;
        drop(writer);

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::StoreError(format!("atomic rename failed: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_data_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir =
            std::env::temp_dir().join(format!("marginfeed_store_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn record(date: NaiveDate, ts_code: &str, rzye: Option<f64>) -> MarginRecord {
        MarginRecord {
            trade_date: date,
            ts_code: ts_code.into(),
            name: "浦发银行".into(),
            rzye,
            rqye: Some(2.0e7),
            rzmre: Some(3.0e6),
            rqyl: Some(150_000.0),
            rzche: Some(2.5e6),
            rqchl: None,
            rqmcl: Some(40_000.0),
            rzrqye: Some(1.52e9),
        }
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = temp_data_dir();
        let store = CsvStore::new(&dir);

        let records = vec![
            record(d(2024, 1, 2), "600000.SH", Some(1.5e9)),
            record(d(2024, 1, 3), "600000.SH", None),
        ];
        store.write(&records).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, records);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_loads_as_empty_table() {
        let dir = temp_data_dir();
        let store = CsvStore::new(&dir);

        assert!(!store.exists());
        assert!(store.load().unwrap().is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_creates_the_market_directory() {
        let dir = temp_data_dir();
        let store = CsvStore::new(dir.join("nested"));

        store
            .write(&[record(d(2024, 1, 2), "600000.SH", Some(1.0))])
            .unwrap();
        assert!(store.exists());
        assert!(store.file_path().ends_with("market/margin_trading_detail.csv"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_sorts_an_unsorted_file() {
        let dir = temp_data_dir();
        let store = CsvStore::new(&dir);

        // Out of order on disk, both by date and by code within a date.
        let records = vec![
            record(d(2024, 1, 3), "600000.SH", Some(3.0)),
            record(d(2024, 1, 2), "600000.SH", Some(2.0)),
            record(d(2024, 1, 2), "000001.SZ", Some(1.0)),
        ];
        store.write(&records).unwrap();

        let loaded = store.load().unwrap();
        let keys: Vec<_> = loaded
            .iter()
            .map(|r| (r.trade_date, r.ts_code.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (d(2024, 1, 2), "000001.SZ".to_string()),
                (d(2024, 1, 2), "600000.SH".to_string()),
                (d(2024, 1, 3), "600000.SH".to_string()),
            ]
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_leaves_no_temp_file_behind() {
        let dir = temp_data_dir();
        let store = CsvStore::new(&dir);

        store
            .write(&[record(d(2024, 1, 2), "600000.SH", Some(1.0))])
            .unwrap();

        let tmp = store.file_path().with_extension("csv.tmp");
        assert!(!tmp.exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
