use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use lang_token::{
    TokenGroup,
    store::{PICTURES_DOCUMENT, language_documents},
};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Reconciliation report computed by the file service for one target file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub reference: String,
    pub target: String,
    pub missing: Vec<String>,
    pub groups: Vec<TokenGroup>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Async client for a running `lang-token serve` instance.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: ReqwestClient,
    base: Url,
}

impl RemoteStore {
    pub fn new(base: &str, auth_token: Option<&str>) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid server URL '{base}'"))?;
        if base.cannot_be_a_base() {
            bail!("server URL '{base}' cannot carry paths");
        }
        let client = ReqwestClient::builder()
            .default_headers(build_header_map(auth_token)?)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn health(&self) -> Result<()> {
        let response = self.client.get(self.endpoint(&["api", "health"])?).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Every file the service stores, pictures included.
    pub async fn list_files(&self) -> Result<Vec<String>> {
        let response = self.client.get(self.endpoint(&["files"])?).send().await?;
        let files = check_status(response).await?.json().await.context("invalid file list")?;
        Ok(files)
    }

    pub async fn language_files(&self) -> Result<Vec<String>> {
        Ok(language_documents(self.list_files().await?))
    }

    pub async fn fetch(&self, name: &str) -> Result<Value> {
        let response = self.client.get(self.endpoint(&["file", name])?).send().await?;
        let document = check_status(response)
            .await?
            .json()
            .await
            .with_context(|| format!("{name} is not a JSON document"))?;
        debug!(file = name, "fetched document");
        Ok(document)
    }

    pub async fn save(&self, name: &str, document: &Value) -> Result<()> {
        let response =
            self.client.post(self.endpoint(&["save", name])?).json(document).send().await?;
        check_status(response).await?;
        debug!(file = name, "saved document");
        Ok(())
    }

    /// Upload raw bytes and return the stored file name.
    pub async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
        let response = self.client.post(self.endpoint(&["upload", name])?).body(bytes).send().await?;
        let uploaded: UploadResponse =
            check_status(response).await?.json().await.context("invalid upload response")?;
        Ok(uploaded.filename)
    }

    /// URL under which the service serves a stored file.
    pub fn file_url(&self, name: &str) -> Result<Url> {
        self.endpoint(&["file", name])
    }

    pub async fn load_pictures(&self) -> Result<BTreeMap<String, String>> {
        let response = self.client.get(self.endpoint(&["file", PICTURES_DOCUMENT])?).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(BTreeMap::new());
        }
        let pictures = check_status(response).await?.json().await.context("invalid images.json")?;
        Ok(pictures)
    }

    pub async fn report(&self, name: &str, missing_only: bool) -> Result<Report> {
        let mut url = self.endpoint(&["api", "report", name])?;
        url.query_pairs_mut().append_pair("missing_only", if missing_only { "true" } else { "false" });
        let response = self.client.get(url).send().await?;
        let report = check_status(response).await?.json().await.context("invalid report")?;
        Ok(report)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("server URL '{}' cannot carry paths", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    Err(anyhow!("{url} returned {status}: {message}"))
}

fn build_header_map(auth_token: Option<&str>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    if let Some(token) = auth_token.map(str::trim).filter(|token| !token.is_empty()) {
        let header_value =
            HeaderValue::from_str(&format!("Bearer {token}")).context("invalid auth token")?;
        map.insert(AUTHORIZATION, header_value);
    }
    Ok(map)
}
