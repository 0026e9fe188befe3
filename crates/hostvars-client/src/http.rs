//! HTTP client for the hostvars daemon

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use hostvars_api::{
    requests::{CreateHostRequest, CreateHostgroupRequest, SetFactsRequest},
    responses::InventoryListing,
};

use crate::error::{ClientError, Result};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for communicating with the hostvars daemon
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a new HTTP client
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    ///
    /// # Example
    /// ```no_run
    /// use hostvars_client::HttpClient;
    ///
    /// let client = HttpClient::new("http://localhost:8250")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Self::with_client(base_url, client)
    }

    /// Create a new HTTP client with custom `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self { client, base_url })
    }

    /// Build a full URL from a path
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(ClientError::Url)
    }

    async fn check(response: Response) -> Result<Response> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }
        Ok(response)
    }

    /// Perform a GET request and deserialize the response
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = Self::check(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Perform a POST request with JSON body, expecting no response body
    async fn post(&self, path: &str, body: impl serde::Serialize) -> Result<()> {
        let url = self.url(path)?;
        debug!(%url, "POST");
        Self::check(self.client.post(url).json(&body).send().await?).await?;
        Ok(())
    }

    /// Check that the daemon is alive
    ///
    /// # Errors
    /// Returns an error if the request fails or the daemon returns an error.
    pub async fn ping(&self) -> Result<String> {
        let url = self.url("/ping")?;
        let response = Self::check(self.client.get(url).send().await?).await?;
        Ok(response.text().await?)
    }

    /// Create a hostgroup (no-op if it exists)
    ///
    /// # Errors
    /// Returns an error if the request fails or the daemon returns an error.
    pub async fn create_hostgroup(&self, hostgroup: &str) -> Result<()> {
        self.post("/create/hostgroup", CreateHostgroupRequest::new(hostgroup))
            .await
    }

    /// Create a host, creating its hostgroup if needed
    ///
    /// # Errors
    /// Returns an error if the request fails or the daemon returns an error.
    pub async fn create_host(&self, hostgroup: &str, hostname: &str) -> Result<()> {
        self.post("/create/host", CreateHostRequest::new(hostgroup, hostname))
            .await
    }

    /// Set a single fact on a host
    ///
    /// # Errors
    /// Returns an error if the request fails or the host does not exist.
    pub async fn set_fact(
        &self,
        hostgroup: &str,
        hostname: &str,
        name: &str,
        value: &str,
    ) -> Result<()> {
        self.set_facts(SetFactsRequest::new(hostgroup, hostname).fact(name, value))
            .await
    }

    /// Set several facts on a host
    ///
    /// # Example
    /// ```no_run
    /// # use hostvars_client::HttpClient;
    /// # use hostvars_api::requests::SetFactsRequest;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = HttpClient::new("http://localhost:8250")?;
    /// let facts = SetFactsRequest::new("web", "w1")
    ///     .fact("env", "prod")
    ///     .fact("dc", "fra1");
    /// client.set_facts(facts).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns an error if the request fails or the host does not exist.
    pub async fn set_facts(&self, request: SetFactsRequest) -> Result<()> {
        self.post("/create/fact", request).await
    }

    /// Fetch the full inventory in Ansible layout
    ///
    /// # Errors
    /// Returns an error if the request fails or the daemon returns an error.
    pub async fn inventory(&self) -> Result<InventoryListing> {
        self.get("/get/inventory").await
    }
}
