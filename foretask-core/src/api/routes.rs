//! URL builders for the Forecast API endpoints.
//!
//! The `updated_after` path segment takes a basic-format UTC timestamp
//! (`YYYYMMDDTHHMMSS`) derived by subtracting the lookback window from "now".

use chrono::{DateTime, Duration, Utc};

/// Page size used when walking the paginated task endpoint.
pub const TASK_PAGE_SIZE: i64 = 100;

/// `GET /v2/persons`
pub fn persons(base_url: &str) -> String {
    format!("{}/v2/persons", base_url)
}

/// `GET /v4/tasks/updated_after/<timestamp>?pageNumber=&pageSize=`
pub fn recent_tasks(
    base_url: &str,
    now: DateTime<Utc>,
    hours_back: i64,
    page: i64,
    page_size: i64,
) -> String {
    format!(
        "{}/v4/tasks/updated_after/{}?pageNumber={}&pageSize={}",
        base_url,
        updated_after_timestamp(now, hours_back),
        page,
        page_size
    )
}

/// `PUT /v1/persons/{id}/timer/start`
pub fn timer_start(base_url: &str, person_id: i64) -> String {
    format!("{}/v1/persons/{}/timer/start", base_url, person_id)
}

/// `PUT /v1/persons/{id}/timer/stop`
pub fn timer_stop(base_url: &str, person_id: i64) -> String {
    format!("{}/v1/persons/{}/timer/stop", base_url, person_id)
}

/// `GET /v1/persons/{id}/timer`
pub fn timer_status(base_url: &str, person_id: i64) -> String {
    format!("{}/v1/persons/{}/timer", base_url, person_id)
}

/// `now - hours_back` as `YYYYMMDDTHHMMSS` in UTC.
pub fn updated_after_timestamp(now: DateTime<Utc>, hours_back: i64) -> String {
    (now - Duration::hours(hours_back))
        .format("%Y%m%dT%H%M%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_updated_after_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 10, 30, 45).unwrap();
        assert_eq!(updated_after_timestamp(now, 72), "20240503T103045");
        assert_eq!(updated_after_timestamp(now, 0), "20240506T103045");
    }

    #[test]
    fn test_urls() {
        let base = "https://api.forecast.it/api";
        assert_eq!(persons(base), "https://api.forecast.it/api/v2/persons");
        assert_eq!(
            timer_start(base, 7),
            "https://api.forecast.it/api/v1/persons/7/timer/start"
        );
        assert_eq!(
            timer_stop(base, 7),
            "https://api.forecast.it/api/v1/persons/7/timer/stop"
        );
        assert_eq!(
            timer_status(base, 7),
            "https://api.forecast.it/api/v1/persons/7/timer"
        );

        let now = Utc.with_ymd_and_hms(2024, 5, 6, 10, 30, 45).unwrap();
        assert_eq!(
            recent_tasks(base, now, 72, 2, 100),
            "https://api.forecast.it/api/v4/tasks/updated_after/20240503T103045?pageNumber=2&pageSize=100"
        );
    }
}
