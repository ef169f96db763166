//! REST data provider.
//!
//! Every endpoint answers with an [`ApiEnvelope`]. Transport errors, non-2xx
//! statuses, undecodable bodies and `success != true` all come back as a
//! [`ProviderError`]; nothing is retried.

use crate::models::{Deal, DealDraft, DealMove, Pipeline, PipelineDraft, Stage, StageDraft, StageUpdate};
use crate::provider::{ApiEnvelope, DataProvider, ProviderError};
use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub(crate) const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
pub(crate) const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Credentials for one backend session
///
/// Passed explicitly to the provider instead of being read from ambient
/// state on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: &str) -> Self {
        Self { token: Some(token.to_string()) }
    }
}

/// Data provider backed by the CRM REST API
pub struct HttpProvider {
    client: Client,
    base_url: String,
    session: Session,
}

impl HttpProvider {
    pub fn new(base_url: &str, session: Session) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("pipeboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<ApiEnvelope<T>, ProviderError> {
        let request = match &self.session.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        log::debug!("{}", what);
        let response = request.send()?;
        Self::read_envelope(response, what)
    }

    fn read_envelope<T: DeserializeOwned>(response: Response, what: &str) -> Result<ApiEnvelope<T>, ProviderError> {
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            // Prefer the backend's own message when the error body is an envelope
            if let Ok(ApiEnvelope { message: Some(message), .. }) =
                serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
            {
                log::warn!("{} rejected with HTTP {}: {}", what, status.as_u16(), message);
                return Err(ProviderError::Rejected { message });
            }
            log::warn!("{} failed with HTTP {}", what, status.as_u16());
            return Err(ProviderError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown error").to_string(),
            });
        }

        if body.trim().is_empty() {
            log::debug!("{} answered HTTP {} with no body", what, status.as_u16());
            return Ok(ApiEnvelope { success: true, data: None, message: None });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl DataProvider for HttpProvider {
    fn list_pipelines(&self) -> Result<Vec<Pipeline>, ProviderError> {
        let request = self.client.get(self.url("/pipelines"));
        let mut pipelines: Vec<Pipeline> = self.send(request, "GET /pipelines")?.into_data()?;
        for pipeline in &mut pipelines {
            pipeline.sort_stages();
            pipeline.adopt_children();
        }
        Ok(pipelines)
    }

    fn create_pipeline(&self, name: &str) -> Result<Pipeline, ProviderError> {
        let request = self.client
            .post(self.url("/pipelines"))
            .json(&PipelineDraft { name: name.to_string() });
        self.send(request, "POST /pipelines")?.into_data()
    }

    fn create_stage(&self, pipeline_id: i64, draft: &StageDraft) -> Result<Stage, ProviderError> {
        let path = format!("/pipelines/{}/stages", pipeline_id);
        let request = self.client.post(self.url(&path)).json(draft);
        self.send(request, &format!("POST {}", path))?.into_data()
    }

    fn update_stage(&self, stage_id: i64, update: &StageUpdate) -> Result<Stage, ProviderError> {
        let path = format!("/pipelines/stages/{}", stage_id);
        let request = self.client.put(self.url(&path)).json(update);
        self.send(request, &format!("PUT {}", path))?.into_data()
    }

    fn delete_stage(&self, stage_id: i64) -> Result<(), ProviderError> {
        let path = format!("/pipelines/stages/{}", stage_id);
        let request = self.client.delete(self.url(&path));
        self.send::<serde_json::Value>(request, &format!("DELETE {}", path))?.into_result()?;
        Ok(())
    }

    fn move_deal(&self, deal_id: i64, new_stage_id: i64) -> Result<Deal, ProviderError> {
        let path = format!("/deals/{}/stage", deal_id);
        let request = self.client.put(self.url(&path)).json(&DealMove { new_stage_id });
        self.send(request, &format!("PUT {}", path))?.into_data()
    }

    fn create_deal(&self, draft: &DealDraft) -> Result<Deal, ProviderError> {
        let request = self.client.post(self.url("/deals")).json(draft);
        self.send(request, "POST /deals")?.into_data()
    }
}
