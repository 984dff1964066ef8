//! HTTP implementation of [`NewsSource`] against the personalization backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::feed::source::{FetchError, NewsSource};
use crate::feed::types::Article;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire representation of one article as served by the backend.
#[derive(Debug, Deserialize)]
struct ArticleDto {
    article_id: i64,
    title: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    published: Option<DateTime<Utc>>,
}

impl ArticleDto {
    fn into_article(self) -> Article {
        Article {
            id: self.article_id,
            title: Arc::from(self.title),
            summary: self.summary.map(Arc::from),
            url: self.url.map(Arc::from),
            image_url: self.image_url.map(Arc::from),
            published: self.published,
        }
    }
}

/// Both endpoints wrap their articles in a `news` envelope.
#[derive(Debug, Deserialize)]
struct NewsEnvelope {
    news: Vec<ArticleDto>,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    user_id: &'a str,
    offset: usize,
    limit: usize,
}

/// Reqwest-backed news source.
///
/// Personalized pages come from `POST {base}/predict` with a JSON body
/// identifying the user; the catalog comes from `GET {base}/news` with
/// offset/limit query parameters. Both return `{ "news": [...] }`.
#[derive(Debug, Clone)]
pub struct HttpNewsSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpNewsSource {
    pub fn new(base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|e| FetchError::Malformed(format!("invalid endpoint {path}: {e}")))
    }

    async fn decode(response: reqwest::Response) -> Result<Vec<Article>, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Server(status.as_u16()));
        }
        let envelope: NewsEnvelope = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        Ok(envelope
            .news
            .into_iter()
            .map(ArticleDto::into_article)
            .collect())
    }
}

#[async_trait]
impl NewsSource for HttpNewsSource {
    async fn fetch_personalized(
        &self,
        user_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Article>, FetchError> {
        let url = self.endpoint("predict")?;
        tracing::debug!(%url, offset, limit, "Fetching personalized page");

        let request = self.client.post(url).json(&PredictRequest {
            user_id,
            offset,
            limit,
        });
        let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        Self::decode(response).await
    }

    async fn fetch_all(&self, offset: usize, limit: usize) -> Result<Vec<Article>, FetchError> {
        let mut url = self.endpoint("news")?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());
        tracing::debug!(%url, "Fetching catalog page");

        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        Self::decode(response).await
    }
}
