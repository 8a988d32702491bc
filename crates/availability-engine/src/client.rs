//! External collaborators: the slot-availability service and the
//! declarations/appointments service, plus their HTTP implementation.

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::config::EngineConfig;
use crate::dto::{
    normalize_appointments, normalize_declarations, AppointmentDto, AvailabilityRequest,
    ConsultantSlotsDto, DeclarationDto,
};
use crate::error::{EngineError, Result};
use crate::model::{Appointment, AvailabilityDeclaration, DateWindow};

/// Answers "which slots are free" for a center or organization.
#[async_trait]
pub trait AvailabilityService: Send + Sync {
    async fn query_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Vec<ConsultantSlotsDto>>;
}

/// What to load from the scheduling service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleQuery {
    pub center_ids: Vec<String>,
    pub consultant_id: Option<String>,
    pub window: DateWindow,
}

impl ScheduleQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("centerIds", self.center_ids.join(",")),
            ("startDate", self.window.start().to_string()),
            ("endDate", self.window.end().to_string()),
        ];
        if let Some(id) = &self.consultant_id {
            params.push(("consultantId", id.clone()));
        }
        params
    }
}

/// Source of declarations and live appointments, normalized.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn declarations(&self, query: &ScheduleQuery) -> Result<Vec<AvailabilityDeclaration>>;

    /// Non-cancelled appointments only.
    async fn appointments(&self, query: &ScheduleQuery) -> Result<Vec<Appointment>>;
}

pub struct HttpScheduleClient {
    client: Client,
    availability_url: String,
    schedule_url: String,
    api_key: Option<String>,
}

impl HttpScheduleClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            availability_url: config.availability_api_url.clone(),
            schedule_url: config.schedule_api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| EngineError::Network(format!("invalid API key header: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn request<T, B>(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!("Making request to {}", url);

        let mut req = self
            .client
            .request(method, url)
            .headers(self.headers()?)
            .query(params);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Scheduling API error ({}): {}", status, error_text);
            return Err(EngineError::Network(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl AvailabilityService for HttpScheduleClient {
    async fn query_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Vec<ConsultantSlotsDto>> {
        self.request(Method::POST, &self.availability_url, &[], Some(request))
            .await
    }
}

#[async_trait]
impl ScheduleSource for HttpScheduleClient {
    async fn declarations(&self, query: &ScheduleQuery) -> Result<Vec<AvailabilityDeclaration>> {
        let url = format!("{}/declarations", self.schedule_url);
        let dtos: Vec<DeclarationDto> = self
            .request(Method::GET, &url, &query.params(), None::<&()>)
            .await?;
        Ok(normalize_declarations(dtos))
    }

    async fn appointments(&self, query: &ScheduleQuery) -> Result<Vec<Appointment>> {
        let url = format!("{}/appointments", self.schedule_url);
        let dtos: Vec<AppointmentDto> = self
            .request(Method::GET, &url, &query.params(), None::<&()>)
            .await?;
        Ok(normalize_appointments(dtos))
    }
}
