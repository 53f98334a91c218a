// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane (Panel) API client.
//!
//! The Panel holds the authoritative configuration for every server on
//! this node; no local file is. The daemon pulls configuration by uuid
//! and pushes container status reports, authenticating with a bearer
//! token.

use roost_core::{ProcessConfiguration, ServerConfiguration, ServerState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from Panel API calls. API-shaped failures carry the error body
/// the Panel returned; everything else is a transport failure.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("panel rejected the request ({code}): {detail}")]
    Api {
        code: String,
        status: String,
        detail: String,
    },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Error body the Panel returns: `{code, status, detail}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    detail: String,
}

/// Full configuration payload for one server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfigurationResponse {
    pub settings: ServerConfiguration,
    pub process_configuration: ProcessConfiguration,
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    data: &'a str,
}

/// HTTP client for the Panel remote API.
#[derive(Clone)]
pub struct PanelClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl PanelClient {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Fetch the authoritative configuration for `uuid`.
    pub async fn server_configuration(
        &self,
        uuid: &Uuid,
    ) -> Result<ServerConfigurationResponse, RemoteError> {
        let response = self
            .http
            .get(format!("{}/api/remote/servers/{uuid}", self.base))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Report the server's new container state to the Panel.
    pub async fn report_status(&self, uuid: &Uuid, state: ServerState) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(format!(
                "{}/api/remote/servers/{uuid}/container/status",
                self.base
            ))
            .bearer_auth(&self.token)
            .json(&StatusReport {
                data: &state.to_string(),
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body: ApiErrorBody = response.json().await.unwrap_or(ApiErrorBody {
            code: String::new(),
            status: status.as_str().to_string(),
            detail: String::new(),
        });
        Err(RemoteError::Api {
            code: body.code,
            status: if body.status.is_empty() {
                status.as_str().to_string()
            } else {
                body.status
            },
            detail: body.detail,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
