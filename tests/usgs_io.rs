//! Integration tests for reading and requesting USGS NWIS data
//!
//! The file tests read saved responses from tests/data/ for the Rio Grande
//! at Otowi Bridge (08313000), January 2019.
//!
//! The request tests make real calls to waterservices.usgs.gov for the
//! Tanana River at Nenana (15515500) and are ignored by default.
//!
//! Run with: cargo test --test usgs_io -- --include-ignored

use std::path::PathBuf;

use chrono::{Duration, TimeZone, Utc};
use river_energy::config::UsgsConfig;
use river_energy::io::usgs::{self, UsgsDataType, UsgsRequest};

const DISCHARGE: &str = "Discharge, cubic feet per second";

fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data").join(name)
}

// ---------------------------------------------------------------------------
// Saved responses
// ---------------------------------------------------------------------------

#[test]
fn test_load_usgs_data_instantaneous() {
    let data = usgs::read_usgs_file(data_file("USGS_08313000_Jan2019_instantaneous.json"))
        .expect("saved IV response should parse");

    assert_eq!(data.columns(), vec![DISCHARGE]);
    // The saved response is trimmed to 1 January of the month-long request,
    // so the full month's row count does not apply here.
    // 96 quarter-hour slots, 3 never reported and 1 sentinel
    assert_eq!(data.shape(), (92, 1));

    // Mountain standard time offset is removed
    assert_eq!(data.index[0], Utc.with_ymd_and_hms(2019, 1, 1, 7, 0, 0).unwrap());
    assert!(data.index.windows(2).all(|w| w[0] < w[1]));
    assert!(data.cells(DISCHARGE).unwrap().iter().all(|c| c.is_some_and(|v| v > 0.0)));
}

#[test]
fn test_load_usgs_data_daily() {
    let data = usgs::read_usgs_file(data_file("USGS_08313000_Jan2019_daily.json"))
        .expect("saved DV response should parse");

    assert_eq!(data.columns(), vec![DISCHARGE]);
    assert_eq!(data.shape(), (31, 1));

    let start = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
    let expected: Vec<_> = (0..31).map(|d| start + Duration::days(d)).collect();
    assert_eq!(data.index, expected);
}

#[test]
fn test_daily_column_as_series() {
    let data = usgs::read_usgs_file(data_file("USGS_08313000_Jan2019_daily.json")).unwrap();
    let q = data.column(DISCHARGE).expect("discharge column");
    assert_eq!(q.len(), 31);
    assert_eq!(q.name, DISCHARGE);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = usgs::read_usgs_file(data_file("does_not_exist.json")).unwrap_err();
    assert!(matches!(err, usgs::UsgsError::Io(_)), "got {:?}", err);
}

// ---------------------------------------------------------------------------
// Live requests
// ---------------------------------------------------------------------------

fn live_request(data_type: UsgsDataType) -> usgs::UsgsTable {
    let config = UsgsConfig::default();
    let client = usgs::build_client(&config).expect("Failed to create HTTP client");
    let request = UsgsRequest::new("15515500", "00060", "2009-08-01", "2009-08-10", data_type)
        .expect("request should validate");

    usgs::request_usgs_data(&client, &config, &request, None)
        .expect("USGS API request failed - check network connectivity")
}

#[test]
#[ignore = "requires network access to waterservices.usgs.gov"]
fn test_request_usgs_data_daily() {
    let data = live_request(UsgsDataType::Daily);
    assert_eq!(data.columns(), vec![DISCHARGE]);
    assert_eq!(data.shape(), (10, 1));
}

#[test]
#[ignore = "requires network access to waterservices.usgs.gov"]
fn test_request_usgs_data_instant() {
    let data = live_request(UsgsDataType::Instantaneous);
    assert_eq!(data.columns(), vec![DISCHARGE]);
    // Every 15 minutes, 4 times per hour
    assert_eq!(data.shape(), (10 * 24 * 4, 1));
}

#[test]
#[ignore = "requires network access to waterservices.usgs.gov"]
fn test_request_writes_raw_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tanana_daily.json");

    let config = UsgsConfig::default();
    let client = usgs::build_client(&config).unwrap();
    let request =
        UsgsRequest::new("15515500", "00060", "2009-08-01", "2009-08-10", UsgsDataType::Daily).unwrap();
    let fetched = usgs::request_usgs_data(&client, &config, &request, Some(&path)).unwrap();

    let reread = usgs::read_usgs_file(&path).unwrap();
    assert_eq!(reread, fetched);
}
