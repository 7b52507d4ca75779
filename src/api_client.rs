use crate::config::Config;
use crate::error::Error;
use reqwest::{header::AUTHORIZATION, Client, Url};
use serde_json::Value;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CampaignApi: Send + Sync + 'static {
    /// Fetches the current campaign performance snapshot.
    /// # Returns
    /// A Result containing either the raw records exactly as the API
    /// returned them or an Error. Records are landed verbatim; all cleaning
    /// happens in the transformation step.
    async fn fetch_campaign_records(&self) -> Result<Vec<Value>, Error>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        ApiClient {
            client: Client::new(),
            base_url: config.api_url.to_string(),
            token: config.api_token.clone(),
        }
    }
}

#[async_trait::async_trait]
impl CampaignApi for ApiClient {
    async fn fetch_campaign_records(&self) -> Result<Vec<Value>, Error> {
        // Construct the URL safely
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .extend(&["campaign-data"]);

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, token);
        }

        let resp = request.send().await?.error_for_status()?;
        let records = resp.json::<Vec<Value>>().await?;

        Ok(records)
    }
}
