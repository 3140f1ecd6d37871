//! USGS NWIS Water Services client and JSON reader.
//!
//! Reads daily values (DV) and instantaneous values (IV) either from a
//! saved JSON response or directly from the web service.
//!
//! API Documentation: https://waterservices.usgs.gov/docs/
//! Daily values:         https://waterservices.usgs.gov/nwis/dv/
//! Instantaneous values: https://waterservices.usgs.gov/nwis/iv/

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::config::UsgsConfig;
use crate::logging::{self, DataSource};
use crate::model::TimeSeries;

/// Statistic code for the daily mean.
pub const STAT_DAILY_MEAN: &str = "00003";

/// Sentinel NWIS uses for missing values.
pub const NO_DATA_SENTINEL: f64 = -999999.0;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can arise when fetching or reading NWIS data.
#[derive(Debug, Clone, PartialEq)]
pub enum UsgsError {
    /// Non-2xx HTTP response from the USGS API.
    HttpError(u16),
    /// The request could not be sent or the body could not be read.
    RequestFailed(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The response parsed but held no usable series.
    NoDataAvailable(String),
    InvalidStation(String),
    InvalidParameter(String),
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    Io(String),
}

impl std::fmt::Display for UsgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsgsError::HttpError(code) => write!(f, "HTTP error: {}", code),
            UsgsError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            UsgsError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            UsgsError::NoDataAvailable(msg) => write!(f, "No data available: {}", msg),
            UsgsError::InvalidStation(code) => write!(f, "Invalid station code: {:?}", code),
            UsgsError::InvalidParameter(code) => write!(f, "Invalid parameter code: {:?}", code),
            UsgsError::InvalidDateRange { start, end } => {
                write!(f, "Start date {} is after end date {}", start, end)
            }
            UsgsError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for UsgsError {}

impl From<reqwest::Error> for UsgsError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => UsgsError::HttpError(status.as_u16()),
            None => UsgsError::RequestFailed(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for UsgsError {
    fn from(e: serde_json::Error) -> Self {
        UsgsError::ParseError(e.to_string())
    }
}

impl From<std::io::Error> for UsgsError {
    fn from(e: std::io::Error) -> Self {
        UsgsError::Io(e.to_string())
    }
}

// ============================================================================
// NWIS JSON Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct NwisResponse {
    value: NwisValue,
}

#[derive(Debug, Deserialize)]
struct NwisValue {
    #[serde(rename = "timeSeries", default)]
    time_series: Vec<NwisTimeSeries>,
}

#[derive(Debug, Deserialize)]
struct NwisTimeSeries {
    #[serde(rename = "sourceInfo")]
    source_info: Option<NwisSourceInfo>,
    variable: NwisVariable,
    #[serde(default)]
    values: Vec<NwisValueSet>,
}

#[derive(Debug, Deserialize)]
struct NwisSourceInfo {
    #[serde(rename = "siteCode", default)]
    site_code: Vec<NwisCode>,
}

#[derive(Debug, Deserialize)]
struct NwisCode {
    value: String,
}

#[derive(Debug, Deserialize)]
struct NwisVariable {
    #[serde(rename = "variableDescription")]
    variable_description: String,
    #[serde(rename = "noDataValue")]
    no_data_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NwisValueSet {
    #[serde(default)]
    value: Vec<NwisPoint>,
}

#[derive(Debug, Deserialize)]
struct NwisPoint {
    value: String,
    #[serde(rename = "dateTime")]
    date_time: String,
}

// ============================================================================
// Table of readings
// ============================================================================

/// Named columns of readings joined on a shared UTC index. A cell is
/// `None` where a column has no reading at that timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct UsgsTable {
    pub index: Vec<DateTime<Utc>>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl UsgsTable {
    /// Outer-joins per-variable readings. Series sharing a name (several
    /// sensors or methods for one parameter) are merged into one column:
    /// timestamps are unioned and the earlier series wins where both report.
    fn from_columns(raw: Vec<(String, BTreeMap<DateTime<Utc>, f64>)>) -> Self {
        let mut merged: Vec<(String, BTreeMap<DateTime<Utc>, f64>)> = Vec::new();
        for (name, readings) in raw {
            match merged.iter_mut().find(|(n, _)| *n == name) {
                Some((_, existing)) => {
                    for (t, value) in readings {
                        existing.entry(t).or_insert(value);
                    }
                }
                None => merged.push((name, readings)),
            }
        }

        let index: Vec<DateTime<Utc>> = merged
            .iter()
            .flat_map(|(_, readings)| readings.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns = merged
            .into_iter()
            .map(|(name, readings)| {
                let cells = index.iter().map(|t| readings.get(t).copied()).collect();
                (name, cells)
            })
            .collect();

        Self { index, columns }
    }

    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    /// Raw cells of one column, aligned with `index`.
    pub fn cells(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cells)| cells.as_slice())
    }

    /// One column as a series, dropping timestamps with no reading.
    pub fn column(&self, name: &str) -> Option<TimeSeries> {
        let cells = self.cells(name)?;
        let (index, values): (Vec<_>, Vec<_>) = self
            .index
            .iter()
            .zip(cells)
            .filter_map(|(t, cell)| cell.map(|v| (*t, v)))
            .unzip();
        TimeSeries::new(name, index, values).ok()
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Reads a saved NWIS JSON response (as written by `request_usgs_data`
/// or downloaded from the web service).
pub fn read_usgs_file(path: impl AsRef<Path>) -> Result<UsgsTable, UsgsError> {
    let text = std::fs::read_to_string(path)?;
    parse_usgs_json(&text)
}

/// Parses an NWIS JSON body. Series that cannot be read are skipped with a
/// warning; the body is only an error if nothing usable remains.
pub fn parse_usgs_json(text: &str) -> Result<UsgsTable, UsgsError> {
    let response: NwisResponse = serde_json::from_str(text)?;
    if response.value.time_series.is_empty() {
        return Err(UsgsError::NoDataAvailable("No timeSeries entries in response".to_string()));
    }

    let total = response.value.time_series.len();
    let mut site = None;
    let mut raw = Vec::new();
    for series in response.value.time_series {
        let code = series
            .source_info
            .as_ref()
            .and_then(|s| s.site_code.first())
            .map(|c| c.value.clone())
            .unwrap_or_default();
        let name = series.variable.variable_description.clone();

        match parse_series(&series) {
            Ok(readings) => raw.push((name, readings)),
            Err(e) => logging::warn(
                DataSource::Usgs,
                Some(&code),
                &format!("skipping series {:?}: {}", name, e),
            ),
        }
        site.get_or_insert(code);
    }
    logging::log_parse_summary(DataSource::Usgs, site.as_deref(), total, raw.len());

    if raw.is_empty() {
        return Err(UsgsError::NoDataAvailable("no readable timeSeries in response".to_string()));
    }
    Ok(UsgsTable::from_columns(raw))
}

fn parse_series(series: &NwisTimeSeries) -> Result<BTreeMap<DateTime<Utc>, f64>, UsgsError> {
    let set = series
        .values
        .first()
        .ok_or_else(|| UsgsError::ParseError("series has no values block".to_string()))?;
    let sentinel = series.variable.no_data_value.unwrap_or(NO_DATA_SENTINEL);

    let mut readings = BTreeMap::new();
    for point in &set.value {
        let value: f64 = point
            .value
            .trim()
            .parse()
            .map_err(|_| UsgsError::ParseError(format!("bad value {:?}", point.value)))?;
        if value == sentinel {
            continue;
        }
        readings.insert(parse_timestamp(&point.date_time)?, value);
    }
    Ok(readings)
}

/// NWIS timestamps carry a UTC offset for instantaneous values and none for
/// daily values; the latter are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, UsgsError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| UsgsError::ParseError(format!("bad timestamp {:?}", raw)))
}

// ============================================================================
// Requesting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsgsDataType {
    Daily,
    Instantaneous,
}

impl FromStr for UsgsDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "dv" => Ok(UsgsDataType::Daily),
            "instantaneous" | "iv" => Ok(UsgsDataType::Instantaneous),
            other => Err(format!("unknown USGS data type {:?}", other)),
        }
    }
}

/// A validated NWIS request.
#[derive(Debug, Clone, PartialEq)]
pub struct UsgsRequest {
    pub station: String,
    pub parameter: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_type: UsgsDataType,
}

impl UsgsRequest {
    /// Station codes are 8 to 15 digits, parameter codes 5 digits, dates
    /// `YYYY-MM-DD` with start not after end.
    pub fn new(
        station: &str,
        parameter: &str,
        start_date: &str,
        end_date: &str,
        data_type: UsgsDataType,
    ) -> Result<Self, UsgsError> {
        if !is_valid_station_code(station) {
            return Err(UsgsError::InvalidStation(station.to_string()));
        }
        if !(parameter.len() == 5 && parameter.chars().all(|c| c.is_ascii_digit())) {
            return Err(UsgsError::InvalidParameter(parameter.to_string()));
        }
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| UsgsError::ParseError(format!("bad date {:?}, expected YYYY-MM-DD", s)))
        };
        let start = parse(start_date)?;
        let end = parse(end_date)?;
        if start > end {
            return Err(UsgsError::InvalidDateRange { start, end });
        }

        Ok(Self {
            station: station.to_string(),
            parameter: parameter.to_string(),
            start_date: start,
            end_date: end,
            data_type,
        })
    }
}

pub fn is_valid_station_code(code: &str) -> bool {
    (8..=15).contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit())
}

/// Builds the NWIS URL for a request against the configured services.
pub fn build_nwis_url(config: &UsgsConfig, request: &UsgsRequest) -> String {
    let (base, stat) = match request.data_type {
        UsgsDataType::Daily => (&config.dv_url, format!("&statCd={}", STAT_DAILY_MEAN)),
        UsgsDataType::Instantaneous => (&config.iv_url, String::new()),
    };
    format!(
        "{}?format=json&sites={}&startDT={}&endDT={}{}&parameterCd={}&siteStatus=all",
        base,
        request.station,
        request.start_date.format("%Y-%m-%d"),
        request.end_date.format("%Y-%m-%d"),
        stat,
        request.parameter
    )
}

/// Builds a blocking HTTP client with the configured timeout and proxy.
pub fn build_client(config: &UsgsConfig) -> Result<reqwest::blocking::Client, UsgsError> {
    let mut builder = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs));
    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
    }
    Ok(builder.build()?)
}

/// Fetches a request from NWIS and parses it.
///
/// # Parameters
/// - `client`: HTTP client, see `build_client`
/// - `config`: service URLs
/// - `request`: station, parameter, date window and data type
/// - `write_json`: if set, the raw response body is saved there first
pub fn request_usgs_data(
    client: &reqwest::blocking::Client,
    config: &UsgsConfig,
    request: &UsgsRequest,
    write_json: Option<&Path>,
) -> Result<UsgsTable, UsgsError> {
    let url = build_nwis_url(config, request);
    logging::debug(DataSource::Usgs, Some(&request.station), &format!("GET {}", url));

    let result = fetch_body(client, &url).and_then(|body| {
        if let Some(path) = write_json {
            std::fs::write(path, &body)?;
        }
        parse_usgs_json(&body)
    });

    match result {
        Ok(table) => {
            let (rows, cols) = table.shape();
            logging::info(
                DataSource::Usgs,
                Some(&request.station),
                &format!("received {} rows x {} columns", rows, cols),
            );
            Ok(table)
        }
        Err(e) => {
            logging::log_usgs_failure(&request.station, "request_usgs_data", &e);
            Err(e)
        }
    }
}

fn fetch_body(client: &reqwest::blocking::Client, url: &str) -> Result<String, UsgsError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()?;

    if !response.status().is_success() {
        return Err(UsgsError::HttpError(response.status().as_u16()));
    }
    Ok(response.text()?)
}

// ============================================================================
// Tests
// ============================================================================
