//! Runtime settings, read from the environment.

use std::fmt;

use crate::error::SetupError;

pub const LIVE_BASE_URL: &str = "https://api.alpaca.markets";
pub const PAPER_BASE_URL: &str = "https://paper-api.alpaca.markets";
pub const DEFAULT_SPREADSHEET: &str = "Active-Investing";
pub const DEFAULT_WORKSHEET: &str = "Alpaca-Screener";

#[derive(Debug, Clone, PartialEq)]
pub struct AlpacaSettings {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
}

#[derive(Clone, PartialEq)]
pub enum SheetAuth {
    /// Service account key file contents (`GOOGLE_CREDS_JSON`).
    ServiceAccount(String),
    ApiKey(String),
    Bearer(String),
}

// Credentials never reach the logs.
impl fmt::Debug for SheetAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetAuth::ServiceAccount(_) => f.write_str("ServiceAccount(..)"),
            SheetAuth::ApiKey(_) => f.write_str("ApiKey(..)"),
            SheetAuth::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

impl SheetAuth {
    /// API keys only reach public sheets and cannot search Drive by name.
    pub fn can_search_drive(&self) -> bool {
        !matches!(self, SheetAuth::ApiKey(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Spreadsheet {
    Id(String),
    /// Resolved to an id through the Drive API at startup.
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetSettings {
    pub spreadsheet: Spreadsheet,
    pub worksheet: String,
    pub auth: SheetAuth,
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, SetupError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).ok_or(SetupError::MissingEnv(name))
}

// Blank values count as unset.
fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag<F>(lookup: &F, name: &'static str) -> Result<bool, SetupError>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, name)
        .map(|v| v.to_ascii_lowercase())
        .as_deref()
    {
        None | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(SetupError::InvalidSetting {
            name,
            message: format!("expected true/false, got '{}'", other),
        }),
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl AlpacaSettings {
    pub fn from_env() -> Result<Self, SetupError> {
        Self::from_lookup(env_lookup)
    }

    /// `ALPACA_BASE_URL` wins over `ALPACA_PAPER`; with neither set the live
    /// endpoint is used.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SetupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required(&lookup, "ALPACA_API_KEY")?;
        let api_secret = required(&lookup, "ALPACA_API_SECRET")?;
        let paper = flag(&lookup, "ALPACA_PAPER")?;
        let base_url = match optional(&lookup, "ALPACA_BASE_URL") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if paper => PAPER_BASE_URL.to_string(),
            None => LIVE_BASE_URL.to_string(),
        };

        Ok(AlpacaSettings {
            api_key,
            api_secret,
            base_url,
        })
    }

    pub fn is_live(&self) -> bool {
        self.base_url == LIVE_BASE_URL
    }
}

impl SheetSettings {
    pub fn from_env() -> Result<Self, SetupError> {
        Self::from_lookup(env_lookup)
    }

    /// Credentials are taken from `GOOGLE_CREDS_JSON`, `GOOGLE_ACCESS_TOKEN`
    /// or `GOOGLE_SHEETS_API_KEY`, in that order. The spreadsheet is
    /// `SHEET_ID` if set, otherwise looked up by `SHEET_NAME`
    /// (default "Active-Investing").
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SetupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth = if let Some(json) = optional(&lookup, "GOOGLE_CREDS_JSON") {
            SheetAuth::ServiceAccount(json)
        } else if let Some(token) = optional(&lookup, "GOOGLE_ACCESS_TOKEN") {
            SheetAuth::Bearer(token)
        } else if let Some(key) = optional(&lookup, "GOOGLE_SHEETS_API_KEY") {
            SheetAuth::ApiKey(key)
        } else {
            return Err(SetupError::MissingEnv("GOOGLE_CREDS_JSON"));
        };

        let spreadsheet = match optional(&lookup, "SHEET_ID") {
            Some(id) => Spreadsheet::Id(id),
            None if !auth.can_search_drive() => return Err(SetupError::MissingEnv("SHEET_ID")),
            None => Spreadsheet::Name(
                optional(&lookup, "SHEET_NAME")
                    .unwrap_or_else(|| DEFAULT_SPREADSHEET.to_string()),
            ),
        };
        let worksheet = optional(&lookup, "SHEET_WORKSHEET")
            .unwrap_or_else(|| DEFAULT_WORKSHEET.to_string());

        Ok(SheetSettings {
            spreadsheet,
            worksheet,
            auth,
        })
    }
}
