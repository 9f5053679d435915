//! HTTP client for the Forecast REST API
//!
//! All requests carry the `X-FORECAST-API-KEY` header. Read endpoints retry
//! transient failures (5xx, timeouts) with exponential backoff; the timer
//! mutations do not retry, so a user action maps to at most one remote call.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::ForecastConfig;
use crate::error::{Error, Result};
use crate::types::{PaginatedResponse, Person, Task, TimerEntry};

use super::routes;
use super::{TaskSource, TimerApi};

const API_KEY_HEADER: &str = "X-FORECAST-API-KEY";

/// HTTP client for the Forecast API
pub struct ForecastClient {
    http_client: reqwest::Client,
    base_url: String,
    max_retries: usize,
}

impl ForecastClient {
    /// Create a new client from configuration
    ///
    /// Returns a configuration error if the API key or user email is missing;
    /// no network call is attempted in that case.
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        config.validate()?;

        let api_key = config
            .api_key()
            .ok_or_else(|| Error::Config("forecast.api_key is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&api_key)
                .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// Fetch the full person roster
    pub async fn persons(&self) -> Result<Vec<Person>> {
        self.get_json_with_retry(&routes::persons(&self.base_url))
            .await
    }

    /// Resolve the configured user by email (case-insensitive)
    ///
    /// A roster without a matching email is the ambiguous-identity error;
    /// callers must withhold dependent operations until it is resolved.
    pub async fn find_person(&self, email: &str) -> Result<Person> {
        let wanted = email.trim().to_lowercase();
        let persons = self.persons().await?;

        persons
            .into_iter()
            .find(|p| {
                p.email
                    .as_deref()
                    .map(|e| e.to_lowercase() == wanted)
                    .unwrap_or(false)
            })
            .ok_or_else(|| Error::UserNotFound(email.to_string()))
    }

    /// Fetch all tasks updated within the lookback window, walking every page
    pub async fn recent_tasks(&self, hours_back: i64) -> Result<Vec<Task>> {
        // One timestamp for the whole walk keeps the page cursor stable.
        let now = Utc::now();
        let mut tasks = Vec::new();
        let mut page = 1;

        loop {
            let url = routes::recent_tasks(
                &self.base_url,
                now,
                hours_back,
                page,
                routes::TASK_PAGE_SIZE,
            );
            let response: PaginatedResponse<Task> = self.get_json_with_retry(&url).await?;
            tasks.extend(response.page_contents);

            if page >= response.total_pages.max(1) {
                break;
            }
            page += 1;
        }

        tracing::debug!(count = tasks.len(), hours_back, "Fetched recent tasks");
        Ok(tasks)
    }

    /// Start the remote timer for a person on a task
    pub async fn start_timer(&self, person_id: i64, task_id: i64) -> Result<()> {
        let url = routes::timer_start(&self.base_url, person_id);
        let response = self
            .http_client
            .put(&url)
            .json(&json!({ "task": task_id }))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Stop the remote timer for a person
    pub async fn stop_timer(&self, person_id: i64) -> Result<()> {
        let url = routes::timer_stop(&self.base_url, person_id);
        let response = self.http_client.put(&url).send().await?;

        Self::check_status(response).await
    }

    /// Fetch the person's current remote timer status records
    pub async fn timer_status(&self, person_id: i64) -> Result<Vec<TimerEntry>> {
        self.get_json_with_retry(&routes::timer_status(&self.base_url, person_id))
            .await
    }

    /// GET a JSON payload, retrying transient failures with backoff
    async fn get_json_with_retry<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    url,
                    attempt,
                    max = self.max_retries,
                    "Retrying request after {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match self.get_json(url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(url, error = %e, "Transient API failure");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Api {
            status: 0,
            message: "max retries exceeded".to_string(),
        }))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Map a mutation response to success or an API error; the timer
    /// endpoints may echo the timer or return an empty body, so the body is
    /// never parsed.
    async fn check_status(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl TaskSource for ForecastClient {
    fn fetch_tasks(&self, hours_back: i64) -> impl Future<Output = Result<Vec<Task>>> {
        self.recent_tasks(hours_back)
    }
}

impl TimerApi for ForecastClient {
    fn start_timer(&self, person_id: i64, task_id: i64) -> impl Future<Output = Result<()>> {
        ForecastClient::start_timer(self, person_id, task_id)
    }

    fn stop_timer(&self, person_id: i64) -> impl Future<Output = Result<()>> {
        ForecastClient::stop_timer(self, person_id)
    }

    fn timer_status(&self, person_id: i64) -> impl Future<Output = Result<Vec<TimerEntry>>> {
        ForecastClient::timer_status(self, person_id)
    }
}
