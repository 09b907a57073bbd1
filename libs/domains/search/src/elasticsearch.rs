//! [`SearchIndex`] over the Elasticsearch REST API.

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_first, env_parse};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::index::{IndexError, SearchIndex};
use crate::models::{DocumentPatch, SearchDocument, SearchRequest};
use crate::query::build_query;

pub const DEFAULT_INDEX: &str = "products";

#[derive(Clone, Debug)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index: DEFAULT_INDEX.to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl FromEnv for ElasticsearchConfig {
    /// - `ELASTICSEARCH_URL` (or `ELASTIC_URL`), required
    /// - `ELASTICSEARCH_INDEX`, default `products`
    /// - `ELASTICSEARCH_USERNAME` / `ELASTICSEARCH_PASSWORD`, optional basic auth
    /// - `ELASTICSEARCH_TIMEOUT_SECS`, default 10
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_first(&["ELASTICSEARCH_URL", "ELASTIC_URL"])
            .ok_or_else(|| ConfigError::MissingEnvVar("ELASTICSEARCH_URL".to_string()))?;
        let index =
            env_first(&["ELASTICSEARCH_INDEX"]).unwrap_or_else(|| DEFAULT_INDEX.to_string());
        let timeout = env_parse("ELASTICSEARCH_TIMEOUT_SECS", 10u64)?;

        Ok(Self {
            username: env_first(&["ELASTICSEARCH_USERNAME"]),
            password: env_first(&["ELASTICSEARCH_PASSWORD"]),
            timeout: Duration::from_secs(timeout),
            ..ElasticsearchConfig::new(url).with_index(index)
        })
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: SearchDocument,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<SearchDocument>,
}

#[derive(Clone)]
pub struct ElasticsearchIndex {
    client: reqwest::Client,
    config: ElasticsearchConfig,
}

impl ElasticsearchIndex {
    pub fn new(config: ElasticsearchConfig) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn index_name(&self) -> &str {
        &self.config.index
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.url.trim_end_matches('/');
        if path.is_empty() {
            format!("{}/{}", base, self.config.index)
        } else {
            format!("{}/{}/{}", base, self.config.index, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.config.username {
            Some(username) => builder.basic_auth(username, self.config.password.as_ref()),
            None => builder,
        }
    }

    /// Creates the index with an explicit mapping when it does not exist yet.
    #[instrument(skip(self), fields(index = %self.config.index))]
    pub async fn ensure_index(&self) -> Result<(), IndexError> {
        let response = self.request(Method::HEAD, "").send().await?;
        if response.status().is_success() {
            debug!("Index already exists");
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(status_error(response).await);
        }

        let response = self
            .request(Method::PUT, "")
            .json(&index_definition())
            .send()
            .await?;

        // Another instance may have created it between HEAD and PUT.
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(IndexError::Status { status: 400, body });
        }

        check(response).await?;
        info!("Created search index");
        Ok(())
    }
}

fn index_definition() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "long" },
                "name": { "type": "text" },
                "category": { "type": "text" },
                "price": { "type": "double" },
                "description": { "type": "text" },
                "images": { "type": "keyword", "index": false },
                "attributes": { "type": "object", "dynamic": true }
            }
        }
    })
}

async fn status_error(response: Response) -> IndexError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    IndexError::Status { status, body }
}

async fn check(response: Response) -> Result<Response, IndexError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(status_error(response).await)
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    #[instrument(skip(self, doc), fields(id = doc.id))]
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), IndexError> {
        let response = self
            .request(Method::PUT, &format!("_doc/{}", doc.id))
            .json(doc)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, patch), fields(id = patch.id))]
    async fn patch(&self, patch: &DocumentPatch) -> Result<(), IndexError> {
        let fields = patch
            .fields()
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        let response = self
            .request(Method::POST, &format!("_update/{}", patch.id))
            .json(&json!({ "doc": fields }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(IndexError::DocumentMissing(patch.id));
        }
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<(), IndexError> {
        let response = self
            .request(Method::DELETE, &format!("_doc/{id}"))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Document already absent");
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i64) -> Result<Option<SearchDocument>, IndexError> {
        let response = self
            .request(Method::GET, &format!("_doc/{id}"))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let found: GetResponse = check(response).await?.json().await?;
        Ok(found.source.filter(|_| found.found))
    }

    #[instrument(skip(self, request))]
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchDocument>, IndexError> {
        let response = self
            .request(Method::POST, "_search")
            .json(&build_query(request))
            .send()
            .await?;

        let results: SearchResponse = check(response).await?.json().await?;
        Ok(results.hits.hits.into_iter().map(|hit| hit.source).collect())
    }
}
