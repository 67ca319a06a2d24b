use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use uuid::Uuid;

use crate::error::AppError;
use crate::grid::EntryFilter;
use crate::models::{DayOfWeek, EntryPosition, PositionOperation, Timetable, TimetableEntry};
use crate::persistence::{TimetableBackend, dto};

#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn new_from_env() -> Result<Self, AppError> {
        let base_url = env::var("TIMETABLE_API_URL")
            .map_err(|_| AppError::BadRequest("TIMETABLE_API_URL is not set".to_string()))?;
        let mut config = Self::new(base_url);
        config.api_token = env::var("TIMETABLE_API_TOKEN").ok().filter(|t| !t.is_empty());
        Ok(config)
    }
}

pub struct HttpTimetableBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpTimetableBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        let request = match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Backend {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }
}

/// Drops entries that fail to decode, logging each one.
fn parse_entries(values: Vec<serde_json::Value>) -> Vec<TimetableEntry> {
    let mut entries = Vec::with_capacity(values.len());
    for value in values {
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("<no id>")
            .to_string();
        match serde_json::from_value::<TimetableEntry>(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!("Skipping timetable entry {}: {}", id, e),
        }
    }
    entries
}

#[async_trait]
impl TimetableBackend for HttpTimetableBackend {
    async fn fetch_timetable_by_uuid(&self, uuid: Uuid) -> Result<Timetable, AppError> {
        let url = self.url(&format!("timetables/{}", uuid));
        let response = self.send(self.client.get(&url)).await?;
        let body: dto::TimetableResponse = response.json().await?;

        Ok(Timetable {
            uuid: body.uuid,
            plan_settings: body.plan_settings,
            generated_date: body.generated_date,
            modified_date: body.modified_date,
            entries: parse_entries(body.entries),
        })
    }

    async fn filter_timetable_entries(
        &self,
        uuid: Uuid,
        filter: &EntryFilter,
    ) -> Result<Vec<TimetableEntry>, AppError> {
        let url = self.url(&format!("timetables/{}/entries/filter", uuid));
        let response = self.send(self.client.post(&url).json(filter)).await?;
        let values: Vec<serde_json::Value> = response.json().await?;
        Ok(parse_entries(values))
    }

    async fn update_timetable_entry_positions(
        &self,
        uuid: Uuid,
        positions: &[EntryPosition],
        operation: PositionOperation,
    ) -> Result<(), AppError> {
        let url = self.url(&format!("timetables/{}/entries/positions", uuid));
        let body = dto::UpdatePositionsRequest {
            entry_positions: positions,
            operation,
        };

        self.send(self.client.put(&url).json(&body)).await?;
        tracing::info!(
            "Updated {} entry positions of timetable {} ({})",
            positions.len(),
            uuid,
            operation.as_str()
        );
        Ok(())
    }

    async fn restore_timetable_entry(
        &self,
        uuid: Uuid,
        day_of_week: DayOfWeek,
        period: u32,
    ) -> Result<(), AppError> {
        let url = self.url(&format!("timetables/{}/entries/restore", uuid));
        let body = dto::RestoreEntryRequest {
            day_of_week,
            period,
        };

        self.send(self.client.post(&url).json(&body)).await?;
        tracing::info!(
            "Restored entry of timetable {} at {} period {}",
            uuid,
            day_of_week,
            period
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries_skips_bad_ones() {
        let values = vec![
            serde_json::json!({ "id": "e1", "dayOfWeek": 1, "period": 1 }),
            serde_json::json!({ "id": "e2", "dayOfWeek": 9, "period": 1 }),
            serde_json::json!({ "id": "e3", "dayOfWeek": "Friday", "period": 2, "periodType": "Break" }),
        ];

        let entries = parse_entries(values);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e3"]);
    }

    #[test]
    fn test_url_joining() {
        let backend = HttpTimetableBackend::new(HttpBackendConfig::new("http://localhost:8080/api/"))
            .expect("client");
        assert_eq!(
            backend.url("timetables/abc"),
            "http://localhost:8080/api/timetables/abc"
        );
    }
}
