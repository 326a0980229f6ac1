//! HTTP client for named collections

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Request, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::{ApiKeyAuth, Error, Query, Result};

const REST_PREFIX: &str = "rest/v1";

#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: Url,
    auth: ApiKeyAuth,
}

impl RestClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: &str, auth: ApiKeyAuth) -> Result<Self> {
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| Error::Url(format!("{}: {}", base_url, e)))?;

        let http = Client::builder().timeout(Self::REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    fn collection_url(&self, collection: &str) -> Result<Url> {
        self.base_url
            .join(&format!("{}/{}", REST_PREFIX, collection))
            .map_err(|e| Error::Url(format!("{}: {}", collection, e)))
    }

    pub fn build_select(&self, collection: &str, query: &Query) -> Result<Request> {
        let request = self
            .http
            .request(Method::GET, self.collection_url(collection)?)
            .headers(self.auth.headers()?)
            .header(ACCEPT, "application/json")
            .query(&query.to_pairs())
            .build()?;
        Ok(request)
    }

    /// `POST` request that asks for the created row back.
    pub fn build_insert<T: Serialize>(&self, collection: &str, row: &T) -> Result<Request> {
        let request = self
            .http
            .request(Method::POST, self.collection_url(collection)?)
            .headers(self.auth.headers()?)
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", HeaderValue::from_static("return=representation"))
            .body(serde_json::to_vec(row)?)
            .build()?;
        Ok(request)
    }

    /// `GET` rows matching `query`.
    pub async fn select<R: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<R>> {
        let request = self.build_select(collection, query)?;
        let body = self.execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// `POST` one row and return the created representation.
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        collection: &str,
        row: &T,
    ) -> Result<R> {
        let request = self.build_insert(collection, row)?;
        let body = self.execute(request).await?;
        let mut rows: Vec<R> = serde_json::from_str(&body)?;
        if rows.is_empty() {
            return Err(Error::EmptyResponse(collection.to_string()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn execute(&self, request: Request) -> Result<String> {
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!("{} {}", method, url);

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!("{} {} failed with {}", method, url.path(), status);
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
