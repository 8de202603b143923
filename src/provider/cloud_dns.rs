// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Google Cloud DNS v1 REST client.
//!
//! Endpoints used, all relative to the configured base URL:
//!
//! | Operation | Request |
//! |---|---|
//! | list zones | `GET projects/{project}/managedZones` |
//! | submit change | `POST projects/{project}/managedZones/{zone}/changes` |
//! | change status | `GET projects/{project}/managedZones/{zone}/changes/{id}` |
//! | list records | `GET projects/{project}/managedZones/{zone}/rrsets?name=&type=` |
//!
//! Listing calls follow `nextPageToken` and are retried on transient errors.
//! Change submission and status calls are single-shot.

use super::{ChangeDescriptor, ChangeStatus, DnsProvider, ManagedZone};
use crate::auth::TokenSource;
use crate::errors::ProviderError;
use crate::record::{Change, ResourceRecordSet};
use crate::retry::{is_retryable_http_status, retry_provider_call};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZonesPage {
    #[serde(default)]
    managed_zones: Vec<ManagedZone>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordSetsPage {
    #[serde(default)]
    rrsets: Vec<ResourceRecordSet>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangeResponse {
    id: String,
    status: String,
}

impl From<ChangeResponse> for ChangeDescriptor {
    fn from(response: ChangeResponse) -> Self {
        Self {
            id: response.id,
            status: ChangeStatus::parse(&response.status),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Cloud DNS client bound to one project.
#[derive(Debug)]
pub struct CloudDnsClient {
    http: HttpClient,
    base: Url,
    project: String,
    tokens: TokenSource,
}

impl CloudDnsClient {
    /// Create a client for `project` against the API rooted at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] if `endpoint` is not an absolute
    /// hierarchical URL.
    pub fn new(
        http: HttpClient,
        endpoint: &str,
        project: impl Into<String>,
        tokens: TokenSource,
    ) -> Result<Self, ProviderError> {
        let base = Url::parse(endpoint)
            .map_err(|e| ProviderError::Transport(format!("invalid endpoint '{endpoint}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ProviderError::Transport(format!(
                "invalid endpoint '{endpoint}': not a base URL"
            )));
        }

        Ok(Self {
            http,
            base,
            project: project.into(),
            tokens,
        })
    }

    /// The project this client is bound to.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ProviderError::Transport(format!("invalid endpoint '{}'", self.base)))?
            .pop_if_empty()
            .extend(["projects", self.project.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let token = self.tokens.token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        if status == StatusCode::UNAUTHORIZED {
            // Revoked or expired early; fetch a new token on the next request.
            self.tokens.invalidate().await;
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);

        if is_retryable_http_status(status) {
            Err(ProviderError::Unavailable {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn managed_zones_page(
        &self,
        page_token: Option<&str>,
    ) -> Result<ManagedZonesPage, ProviderError> {
        let mut url = self.url(&["managedZones"])?;
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }
        self.send(self.http.get(url)).await
    }

    async fn record_sets_page(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
        page_token: Option<&str>,
    ) -> Result<RecordSetsPage, ProviderError> {
        let mut url = self.url(&["managedZones", zone, "rrsets"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("name", name).append_pair("type", record_type);
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        self.send(self.http.get(url)).await
    }
}

#[async_trait]
impl DnsProvider for CloudDnsClient {
    async fn list_managed_zones(&self) -> Result<Vec<ManagedZone>, ProviderError> {
        let mut zones = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0;

        loop {
            page_count += 1;
            let page = retry_provider_call(
                || self.managed_zones_page(page_token.as_deref()),
                "list managed zones",
            )
            .await?;

            zones.extend(page.managed_zones);
            debug!(
                page = page_count,
                total_zones = zones.len(),
                "Fetched managed zones page"
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(zones)
    }

    async fn create_change(
        &self,
        zone: &str,
        change: &Change,
    ) -> Result<ChangeDescriptor, ProviderError> {
        let url = self.url(&["managedZones", zone, "changes"])?;
        let response: ChangeResponse = self.send(self.http.post(url).json(change)).await?;
        Ok(response.into())
    }

    async fn get_change(&self, zone: &str, id: &str) -> Result<ChangeDescriptor, ProviderError> {
        let url = self.url(&["managedZones", zone, "changes", id])?;
        let response: ChangeResponse = self.send(self.http.get(url)).await?;
        Ok(response.into())
    }

    async fn list_records(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<ResourceRecordSet>, ProviderError> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = retry_provider_call(
                || self.record_sets_page(zone, name, record_type, page_token.as_deref()),
                "list record sets",
            )
            .await?;

            records.extend(page.rrsets);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(records)
    }

    fn provider_name(&self) -> &'static str {
        "cloud-dns"
    }
}

#[cfg(test)]
#[path = "cloud_dns_tests.rs"]
mod cloud_dns_tests;
