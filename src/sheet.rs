//! Signal sheet loading
//!
//! Rows come from the Google Sheets values API (or a saved copy of its
//! response on disk) and are mapped onto [`RowRecord`]s by fixed column
//! position.

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::allocation::{normalize_symbol, RowRecord};
use crate::config::{SheetAuth, SheetSettings, Spreadsheet};
use crate::error::SetupError;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// OAuth scopes requested for service account tokens.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

// Column indices (0-based)
pub const COL_TICKER: usize = 0; // A
pub const COL_PRICE: usize = 1; // B
pub const COL_PCT_DOWN: usize = 2; // C
pub const COL_LONG_MA: usize = 9; // J
pub const COL_ICON: usize = 15; // P
pub const COL_SENTIMENT: usize = 16; // Q

/// Body of a `spreadsheets.values.get` response. `values` is omitted by
/// the API when the range is empty.
#[derive(Debug, Deserialize)]
pub struct ValueRange {
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl ValueRange {
    pub fn into_grid(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect()
    }
}

fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Body of a Drive `files.list` response.
#[derive(Debug, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Drive search expression matching a spreadsheet by exact title.
pub fn drive_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escaped, SPREADSHEET_MIME
    )
}

/// Pick the spreadsheet id out of a name search. Drive titles are not
/// unique; the first match is used.
pub fn pick_spreadsheet(name: &str, list: FileList) -> Result<String, SetupError> {
    if list.files.len() > 1 {
        warn!(
            "{} spreadsheets are named '{}', using the first",
            list.files.len(),
            name
        );
    }
    list.files
        .into_iter()
        .next()
        .map(|f| f.id)
        .ok_or_else(|| SetupError::SpreadsheetNotFound(name.to_string()))
}

/// A parsed data row plus its 1-based row number in the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub row_number: usize,
    pub record: RowRecord,
}

/// Turn the raw grid into records. The first row is the header; rows with
/// no ticker are dropped.
pub fn parse_rows(grid: &[Vec<String>]) -> Vec<SheetRow> {
    let Some((header, data)) = grid.split_first() else {
        info!("Sheet is empty");
        return Vec::new();
    };
    info!("Header row: {:?}", header);

    let mut rows = Vec::with_capacity(data.len());
    // start at 2 to match the sheet's own row numbers
    for (row_number, raw) in (2..).zip(data) {
        let cell = |idx: usize| raw.get(idx).map(String::as_str).unwrap_or("");

        let symbol = normalize_symbol(cell(COL_TICKER));
        if symbol.is_empty() {
            info!("Row {}: no symbol in column A, skipping", row_number);
            continue;
        }

        let sentiment = cell(COL_SENTIMENT);
        rows.push(SheetRow {
            row_number,
            record: RowRecord {
                symbol,
                price: cell(COL_PRICE).to_string(),
                percent_down_from_ath: cell(COL_PCT_DOWN).to_string(),
                long_moving_average: cell(COL_LONG_MA).to_string(),
                icon: cell(COL_ICON).to_string(),
                sentiment: (!sentiment.trim().is_empty()).then(|| sentiment.to_string()),
            },
        });
    }

    if rows.is_empty() {
        info!("No data rows found (only header or empty sheet)");
    }
    rows
}

/// Read a saved `ValueRange` JSON document.
pub fn load_grid_file(path: &Path) -> Result<Vec<Vec<String>>, SetupError> {
    info!("Reading sheet values from {}", path.display());
    let contents = std::fs::read_to_string(path)?;
    let range: ValueRange = serde_json::from_str(&contents)?;
    Ok(range.into_grid())
}

pub fn values_url(spreadsheet_id: &str, worksheet: &str) -> Result<Url, SetupError> {
    let invalid = |message: String| SetupError::InvalidSetting {
        name: "SHEET_ID",
        message,
    };
    let mut url = Url::parse(SHEETS_API).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot build values URL".to_string()))?
        .extend([spreadsheet_id, "values", worksheet]);
    Ok(url)
}

enum Credentials {
    ServiceAccount(CustomServiceAccount),
    ApiKey(String),
    Bearer(String),
}

pub struct SheetClient {
    http: reqwest::Client,
    spreadsheet: Spreadsheet,
    worksheet: String,
    credentials: Credentials,
}

impl SheetClient {
    /// Fails on unreadable service account JSON, before any request is made.
    pub fn new(settings: SheetSettings) -> Result<Self, SetupError> {
        let credentials = match settings.auth {
            SheetAuth::ServiceAccount(json) => {
                Credentials::ServiceAccount(CustomServiceAccount::from_json(&json)?)
            }
            SheetAuth::ApiKey(key) => Credentials::ApiKey(key),
            SheetAuth::Bearer(token) => Credentials::Bearer(token),
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(SheetClient {
            http,
            spreadsheet: settings.spreadsheet,
            worksheet: settings.worksheet,
            credentials,
        })
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, SetupError> {
        Ok(match &self.credentials {
            Credentials::ApiKey(key) => request.query(&[("key", key.as_str())]),
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::ServiceAccount(account) => {
                let token = account.token(SCOPES).await?;
                request.bearer_auth(token.as_str())
            }
        })
    }

    async fn send(
        &self,
        request: RequestBuilder,
        service: &'static str,
    ) -> Result<String, SetupError> {
        let resp: Response = self.authorize(request).await?.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(SetupError::Upstream {
                service,
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn spreadsheet_id(&self) -> Result<String, SetupError> {
        let name = match &self.spreadsheet {
            Spreadsheet::Id(id) => return Ok(id.clone()),
            Spreadsheet::Name(name) => name,
        };

        info!("Looking up spreadsheet '{}' in Drive", name);
        let request = self.http.get(DRIVE_FILES_API).query(&[
            ("q", drive_query(name).as_str()),
            ("fields", "files(id,name)"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        let text = self.send(request, "google drive").await?;
        pick_spreadsheet(name, serde_json::from_str(&text)?)
    }

    /// Fetch every populated cell of the configured worksheet.
    pub async fn fetch_grid(&self) -> Result<Vec<Vec<String>>, SetupError> {
        let id = self.spreadsheet_id().await?;
        info!("Opening spreadsheet '{}', worksheet '{}'", id, self.worksheet);

        let request = self.http.get(values_url(&id, &self.worksheet)?);
        let text = self.send(request, "google sheets").await?;
        let range: ValueRange = serde_json::from_str(&text)?;
        Ok(range.into_grid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn full_row(
        ticker: &str,
        price: &str,
        pct: &str,
        ma: &str,
        icon: &str,
        sentiment: &str,
    ) -> Vec<String> {
        let mut row = vec![String::new(); 17];
        row[COL_TICKER] = ticker.to_string();
        row[COL_PRICE] = price.to_string();
        row[COL_PCT_DOWN] = pct.to_string();
        row[COL_LONG_MA] = ma.to_string();
        row[COL_ICON] = icon.to_string();
        row[COL_SENTIMENT] = sentiment.to_string();
        row
    }

    #[test]
    fn header_only_sheet_has_no_rows() {
        assert!(parse_rows(&grid(&[&["Ticker", "Price"]])).is_empty());
        assert!(parse_rows(&[]).is_empty());
    }

    #[test]
    fn columns_map_by_position() {
        let sheet = vec![
            vec!["Ticker".to_string()],
            full_row(" aapl ", "187.20", "12%", "190.5", "💎", "1.5"),
        ];
        let rows = parse_rows(&sheet);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_number, 2);
        let r = &rows[0].record;
        assert_eq!(r.symbol, "AAPL");
        assert_eq!(r.price, "187.20");
        assert_eq!(r.percent_down_from_ath, "12%");
        assert_eq!(r.long_moving_average, "190.5");
        assert_eq!(r.icon, "💎");
        assert_eq!(r.sentiment.as_deref(), Some("1.5"));
    }

    #[test]
    fn short_rows_and_blank_symbols() {
        let sheet = grid(&[&["Ticker"], &["", "10"], &["msft", "300", "40"]]);
        let rows = parse_rows(&sheet);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_number, 3);
        assert_eq!(rows[0].record.symbol, "MSFT");
        assert_eq!(rows[0].record.long_moving_average, "");
        assert_eq!(rows[0].record.icon, "");
        assert_eq!(rows[0].record.sentiment, None);
    }

    #[test]
    fn value_range_cells_become_text() {
        let range: ValueRange = serde_json::from_str(
            r#"{"range":"A1:Q2","values":[["Ticker"],["TSLA", 250.5, null, true]]}"#,
        )
        .unwrap();
        assert_eq!(range.into_grid()[1], vec!["TSLA", "250.5", "", "true"]);
    }

    #[test]
    fn empty_value_range_has_no_values_key() {
        let range: ValueRange =
            serde_json::from_str(r#"{"range":"A1:Q1","majorDimension":"ROWS"}"#).unwrap();
        assert!(range.into_grid().is_empty());
    }

    #[test]
    fn values_url_escapes_worksheet() {
        assert_eq!(
            values_url("abc123", "My Sheet").unwrap().as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/My%20Sheet"
        );
    }

    #[test]
    fn drive_query_quotes_the_name() {
        assert_eq!(
            drive_query("Active-Investing"),
            "name = 'Active-Investing' and \
             mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false"
        );
        assert!(drive_query("Bob's Picks").starts_with(r"name = 'Bob\'s Picks'"));
    }

    #[test]
    fn first_drive_match_wins() {
        let list: FileList = serde_json::from_str(
            r#"{"files":[{"id":"one","name":"Active-Investing"},{"id":"two"}]}"#,
        )
        .unwrap();
        assert_eq!(pick_spreadsheet("Active-Investing", list).unwrap(), "one");
    }

    #[test]
    fn missing_spreadsheet_name_is_fatal() {
        let list: FileList = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            pick_spreadsheet("Active-Investing", list),
            Err(SetupError::SpreadsheetNotFound(name)) if name == "Active-Investing"
        ));
    }

    #[test]
    fn unreadable_service_account_fails_construction() {
        let settings = SheetSettings {
            spreadsheet: Spreadsheet::Name("Active-Investing".to_string()),
            worksheet: "Alpaca-Screener".to_string(),
            auth: SheetAuth::ServiceAccount("not json".to_string()),
        };
        assert!(matches!(SheetClient::new(settings), Err(SetupError::Auth(_))));
    }
}
