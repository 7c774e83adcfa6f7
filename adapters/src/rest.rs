//! REST adapter implementations for the deployed ToolHub services.
//!
//! This file contains the HTTP clients for the catalog API, the identity
//! provider and the sponsored-listings endpoint, including the request
//! plumbing and the mapping of HTTP statuses onto `AdapterError`.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::errors::{AdapterError, Result};
use crate::models::{decode_listings, CatalogEntity, Metadata, SponsoredWrapper, UserProfile, VoteAction, VoteResponse};
use crate::{CatalogAdapter, IdentityProvider, SponsoredListings};

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| AdapterError::ConnectionError(format!("Cannot build HTTP client: {}", err)))
}

fn trim_base(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Turns a non-2xx response into `RequestFailed`, keeping the body as message.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    warn!("{} answered {}", status, message);
    Err(AdapterError::RequestFailed {
        status: status.as_u16(),
        message,
    })
}

async fn fetch_optional<T: DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>> {
    let response = request.send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let response = ensure_success(response).await?;
    Ok(Some(response.json::<T>().await?))
}

pub struct RestCatalog {
    client: Client,
    base_url: String,
}

impl RestCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base(base_url),
        })
    }
}

#[async_trait]
impl CatalogAdapter for RestCatalog {
    async fn entity_by_slug(&self, slug: &str) -> Result<Option<CatalogEntity>> {
        debug!("catalog lookup by slug {slug}");
        fetch_optional(self.client.get(format!("{}/tools/slug/{}", self.base_url, slug))).await
    }

    async fn entity_by_id(&self, id: &str) -> Result<Option<CatalogEntity>> {
        debug!("catalog lookup by id {id}");
        fetch_optional(self.client.get(format!("{}/tools/{}", self.base_url, id))).await
    }

    async fn vote(&self, id: &str, action: VoteAction) -> Result<VoteResponse> {
        let response = self
            .client
            .post(format!("{}/tools/{}/vote", self.base_url, id))
            .json(&json!({ "action": action }))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<VoteResponse>().await?)
    }
}

pub struct RestIdentity {
    client: Client,
    base_url: String,
    secret: Option<String>,
}

impl RestIdentity {
    pub fn new(base_url: impl Into<String>, secret: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base(base_url),
            secret,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.secret {
            Some(secret) => request.bearer_auth(secret),
            None => request,
        }
    }
}

#[async_trait]
impl IdentityProvider for RestIdentity {
    async fn session_user(&self, token: &str) -> Result<Option<UserProfile>> {
        let request = self.client.get(format!("{}/sessions/{}", self.base_url, token));
        fetch_optional(self.authorized(request)).await
    }

    async fn user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let request = self.client.get(format!("{}/users/{}", self.base_url, user_id));
        fetch_optional(self.authorized(request)).await
    }

    async fn update_profile(&self, user_id: &str, patch: Metadata) -> Result<UserProfile> {
        let request = self
            .client
            .patch(format!("{}/users/{}/metadata", self.base_url, user_id))
            .json(&json!({ "metadata": patch }));
        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AdapterError::UnknownUser(user_id.to_string()));
        }
        let response = ensure_success(response).await?;
        Ok(response.json::<UserProfile>().await?)
    }
}

pub struct RestSponsored {
    client: Client,
    base_url: String,
}

impl RestSponsored {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: trim_base(base_url),
        })
    }
}

#[async_trait]
impl SponsoredListings for RestSponsored {
    async fn listings(&self) -> Result<Vec<SponsoredWrapper>> {
        let response = self
            .client
            .get(format!("{}/sponsored", self.base_url))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let records = response.json::<Vec<Value>>().await?;
        Ok(decode_listings(records))
    }
}
