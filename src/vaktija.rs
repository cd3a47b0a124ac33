//! Client for the vaktija.ba prayer-times API.
//!
//! `GET {api}/{location}/{year}/{month}/{day}` answers with one day's six
//! times under `vakat`, `GET {api}/{location}/{year}/{month}` with one list
//! per day of the month. A missing or empty `vakat` means no times are
//! published for the period.

use chrono::{Datelike, NaiveDate};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tokio::time::Duration;

use crate::Config;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream responded with status {0}")]
    Status(StatusCode),
    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
pub struct DayResponse {
    pub vakat: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct MonthResponse {
    pub vakat: Option<Vec<Vec<String>>>,
}

#[derive(Debug, Clone)]
pub struct VaktijaClient {
    http: Client,
    base: String,
    location_id: u32,
}

impl VaktijaClient {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base: config.api_base.trim_end_matches('/').to_string(),
            location_id: config.location_id,
        })
    }

    pub fn day_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.base,
            self.location_id,
            date.year(),
            date.month(),
            date.day()
        )
    }

    pub fn month_url(&self, year: i32, month: u32) -> String {
        format!("{}/{}/{}/{}", self.base, self.location_id, year, month)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        debug!("Sending HTTP request to {url}");
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// The six times for `date`, or `None` when none are published.
    pub async fn fetch_day(&self, date: NaiveDate) -> Result<Option<Vec<String>>, FetchError> {
        let response: DayResponse = self.get(&self.day_url(date)).await?;
        Ok(response.vakat.filter(|times| !times.is_empty()))
    }

    /// One entry per day of the month, starting with the 1st.
    pub async fn fetch_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Option<Vec<Vec<String>>>, FetchError> {
        let response: MonthResponse = self.get(&self.month_url(year, month)).await?;
        Ok(response.vakat.filter(|days| !days.is_empty()))
    }
}
