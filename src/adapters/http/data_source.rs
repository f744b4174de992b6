//! JSON data source over HTTP GET.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::read_json;
use crate::ports::{DataRequest, DataSource};
use crate::resilience::CallError;

/// `DataSource` backed by plain GET requests (CoinGecko, CryptoPanic).
#[derive(Debug, Clone)]
pub struct HttpDataSource {
  http: Client,
}

impl HttpDataSource {
  pub fn new(http: Client) -> Self {
    Self { http }
  }
}

#[async_trait]
impl DataSource for HttpDataSource {
  #[instrument(skip(self, request), fields(dependency = request.dependency, url = %request.url))]
  async fn fetch(&self, request: &DataRequest) -> Result<Value, CallError> {
    let sent = self
      .http
      .get(&request.url)
      .query(&request.query)
      .header("Accept", "application/json")
      .send()
      .await;

    let body = read_json(request.dependency, sent).await?;
    debug!("Fetched JSON payload");
    Ok(body)
  }
}
