use async_trait::async_trait;
use ember_core::entities::NewsItem;
use ember_core::ports::NewsRepository;
use ember_core::Error;
use reqwest::Client;
use tracing::instrument;

use crate::network::{join_url, read_json, send_error};

pub const NEWS_PATH: &str = "launcher/news-launcher/news.json";

pub struct HttpNewsRepository {
    client: Client,
    api_url: String,
}

impl HttpNewsRepository {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl NewsRepository for HttpNewsRepository {
    #[instrument(skip(self))]
    async fn latest_news(&self) -> Result<Vec<NewsItem>, Error> {
        let url = join_url(&self.api_url, NEWS_PATH);
        let response = self.client.get(&url).send().await.map_err(send_error)?;
        read_json(response, "news").await
    }
}
