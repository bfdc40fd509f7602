//! HTTP client for the `car` resource.

use serde::de::DeserializeOwned;

use super::resource::{self, Resource};
use crate::types::Car;

/// Wraps the five remote CRUD calls for the catalog resource.
///
/// Each operation performs exactly one remote call: no retry, no caching, and
/// no mutation of any locally held collection. The injected `reqwest::Client`
/// carries connection pooling and timeouts.
pub struct RecordClient {
    http: reqwest::Client,
    base_url: String,
}

impl RecordClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn list(&self) -> Resource<Vec<Car>> {
        self.execute(self.http.get(self.url("car"))).await
    }

    pub async fn create(&self, car: &Car) -> Resource<Car> {
        self.execute(self.http.post(self.url("car")).json(car)).await
    }

    pub async fn fetch(&self, id: &str) -> Resource<Car> {
        self.execute(self.http.get(self.url(&format!("car/{id}"))))
            .await
    }

    /// Update a persisted record.
    ///
    /// Requires a non-empty `id`: callers must have already branched on
    /// whether the record was persisted before. An empty id is a caller bug,
    /// not a network condition, so it panics instead of issuing a request.
    pub async fn update(&self, id: &str, car: &Car) -> Resource<Car> {
        assert!(!id.is_empty(), "update requires a persisted record id");
        self.execute(self.http.patch(self.url(&format!("car/{id}"))).json(car))
            .await
    }

    pub async fn delete(&self, id: &str) -> Resource<()> {
        match self.send(self.http.delete(self.url(&format!("car/{id}")))).await {
            // The delete response body carries nothing useful.
            Ok(_) => Resource::Success(()),
            Err(message) => Resource::Error(message),
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Resource<T> {
        match self.send(request).await {
            Ok(response) => match response.json::<T>().await {
                Ok(body) => Resource::Success(body),
                Err(e) => Resource::Error(resource::unknown_error(e)),
            },
            Err(message) => Resource::Error(message),
        }
    }

    /// Single classification point: every call site routes its outcome
    /// through here before anything reaches a caller.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, String> {
        match request.send().await {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => Err(resource::request_error(response.status().as_u16())),
            Err(e) => Err(resource::classify_send_error(&e)),
        }
    }
}
