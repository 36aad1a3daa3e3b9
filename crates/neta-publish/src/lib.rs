//! Publishes member rows: photo upload, then one entity submission per row.
//!
//! Session cookies are copied from a logged-in browser and handed in through
//! [`SessionConfig`]; nothing here keeps process-wide state.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, ORIGIN, REFERER};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "neta-publish";

pub const DEFAULT_UPLOAD_URL: &str =
    "https://gemsofindia.org/api/uploadthing?actionType=upload&slug=entityLogo";
pub const DEFAULT_SUBMIT_URL: &str = "https://gemsofindia.org/submit";
pub const DEFAULT_NEXT_ACTION: &str = "40c099e912187d2946439ebe43cc7e37e681f48caf";
pub const DEFAULT_ROUTER_STATE_TREE: &str = "%5B%22%22%2C%7B%22children%22%3A%5B%22(entities)%22%2C%7B%22children%22%3A%5B%22submit%22%2C%7B%22children%22%3A%5B%22__PAGE__%22%2C%7B%7D%2Cnull%2Cnull%5D%7D%2Cnull%2Cnull%5D%7D%2Cnull%2Cnull%5D%7D%2Cnull%2Cnull%2Ctrue%5D";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";
const UPLOADTHING_PACKAGE: &str = "@uploadthing/react";
const UPLOADTHING_VERSION: &str = "7.7.4";

/// Columns appended to each row in the results file.
pub const RESULT_COLUMNS: [&str; 3] = ["uploaded_key", "entity_id", "slug"];

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("missing setting {0}")]
    MissingSetting(&'static str),
    #[error("invalid cookie: {0}")]
    InvalidCookie(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("invalid keyword list: {0}")]
    Keywords(String),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PublishError + '_ {
    move |source| PublishError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Browser session replayed on the authenticated endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub cookies: Vec<(String, String)>,
    pub user_agent: String,
}

impl SessionConfig {
    /// Parses a raw `Cookie` header value (`a=1; b=2`).
    pub fn from_cookie_header(header: &str, user_agent: impl Into<String>) -> Result<Self, PublishError> {
        let mut cookies = Vec::new();
        for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| PublishError::InvalidCookie(pair.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(PublishError::InvalidCookie(pair.to_string()));
            }
            cookies.push((name.to_string(), value.trim().to_string()));
        }
        if cookies.is_empty() {
            return Err(PublishError::MissingSetting("NETA_PUBLISH_COOKIES"));
        }
        Ok(Self {
            cookies,
            user_agent: user_agent.into(),
        })
    }

    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "entityType")]
    pub entity_type: String,
}

impl Default for ParentEntity {
    fn default() -> Self {
        Self {
            id: "be12e7d3-4f09-43cd-a387-5148aa9c6fb8".to_string(),
            name: "Government of India".to_string(),
            entity_type: "organization".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub csv_path: PathBuf,
    pub photo_dir: PathBuf,
    pub output_path: PathBuf,
    pub upload_url: String,
    pub submit_url: String,
    pub origin: String,
    pub next_action: String,
    pub router_state_tree: String,
    pub categories: Vec<String>,
    pub parent_entity: ParentEntity,
    pub country: String,
    pub job_responsibilities: String,
    pub session: SessionConfig,
}

impl PublishConfig {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            csv_path: PathBuf::from("test-file.csv"),
            photo_dir: PathBuf::from("mp_photos_sansad"),
            output_path: PathBuf::from("upload_results.csv"),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            submit_url: DEFAULT_SUBMIT_URL.to_string(),
            origin: "https://gemsofindia.org".to_string(),
            next_action: DEFAULT_NEXT_ACTION.to_string(),
            router_state_tree: DEFAULT_ROUTER_STATE_TREE.to_string(),
            categories: vec!["central-government".to_string(), "state-government".to_string()],
            parent_entity: ParentEntity::default(),
            country: "India".to_string(),
            job_responsibilities: "Serve People!".to_string(),
            session,
        }
    }

    pub fn from_env() -> Result<Self, PublishError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PublishError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let cookies =
            non_empty("NETA_PUBLISH_COOKIES").ok_or(PublishError::MissingSetting("NETA_PUBLISH_COOKIES"))?;
        let user_agent =
            non_empty("NETA_PUBLISH_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut config = Self::new(SessionConfig::from_cookie_header(&cookies, user_agent)?);

        if let Some(v) = non_empty("NETA_PUBLISH_CSV") {
            config.csv_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("NETA_PUBLISH_PHOTO_DIR") {
            config.photo_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("NETA_PUBLISH_OUTPUT") {
            config.output_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("NETA_PUBLISH_UPLOAD_URL") {
            config.upload_url = v;
        }
        if let Some(v) = non_empty("NETA_PUBLISH_SUBMIT_URL") {
            config.submit_url = v;
        }
        if let Some(v) = non_empty("NETA_PUBLISH_NEXT_ACTION") {
            config.next_action = v;
        }
        Ok(config)
    }
}

/// A CSV file kept as header + positional rows so it can be written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn read(path: &Path) -> Result<Self, PublishError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Self { headers, rows })
    }

    /// Writes headers even when there are no rows left.
    pub fn write(&self, path: &Path) -> Result<(), PublishError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(
                (0..self.headers.len()).map(|i| row.get(i).map(String::as_str).unwrap_or_default()),
            )?;
        }
        writer.flush().map_err(io_error(path))?;
        Ok(())
    }

    pub fn get<'a>(&self, row: &'a [String], column: &str) -> &'a str {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSlot {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub entity_id: String,
    pub slug: String,
}

fn json_string(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Upload-init answers with either `[{url, key}]` or `{url, key}`.
pub fn parse_init_response(body: &str) -> Result<UploadSlot, PublishError> {
    let value: JsonValue = serde_json::from_str(body)?;
    let slot = match &value {
        JsonValue::Array(items) => items.first(),
        JsonValue::Object(map) if map.contains_key("url") => Some(&value),
        _ => None,
    }
    .filter(|slot| slot.get("url").and_then(JsonValue::as_str).is_some())
    .ok_or_else(|| PublishError::UnexpectedResponse(body.to_string()))?;

    Ok(UploadSlot {
        url: json_string(slot.get("url")),
        key: json_string(slot.get("key")),
    })
}

/// Merges every `n:{json}` line of a server action response; other lines are ignored.
pub fn parse_submit_response(text: &str) -> SubmitOutcome {
    let mut merged = JsonMap::new();
    for line in text.trim().lines() {
        let Some((_, payload)) = line.split_once(':') else {
            continue;
        };
        if let Ok(JsonValue::Object(object)) = serde_json::from_str::<JsonValue>(payload) {
            merged.extend(object);
        }
    }
    SubmitOutcome {
        entity_id: json_string(merged.get("entityId")),
        slug: json_string(merged.get("slug")),
    }
}

fn parse_quoted_list(inner: &str) -> Result<Vec<String>, PublishError> {
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let Some(quote) = chars.next() else {
            return Ok(items);
        };
        if quote != '\'' && quote != '"' {
            return Err(PublishError::Keywords(format!("unexpected {quote:?}")));
        }
        let mut item = String::new();
        loop {
            match chars.next() {
                Some('\\') => {
                    if let Some(escaped) = chars.next() {
                        item.push(escaped);
                    }
                }
                Some(c) if c == quote => break,
                Some(c) => item.push(c),
                None => return Err(PublishError::Keywords("unterminated string".to_string())),
            }
        }
        items.push(item);
    }
}

/// Keywords as stored in the CSV: a JSON array or a Python list literal. Blank is empty.
pub fn parse_keyword_list(raw: &str) -> Result<Vec<String>, PublishError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return Ok(list);
    }
    let inner = raw
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| PublishError::Keywords(raw.to_string()))?;
    parse_quoted_list(inner)
}

pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "image/jpeg",
    }
}

/// The single-element submission body for one CSV row.
pub fn entity_payload(
    config: &PublishConfig,
    table: &CsvTable,
    row: &[String],
    logo_url: &str,
) -> Result<JsonValue, PublishError> {
    let col = |name: &str| table.get(row, name).to_string();
    let net_worth = match table.get(row, "networth") {
        "" => "0".to_string(),
        value => value.to_string(),
    };
    Ok(json!([{
        "name": col("name"),
        "description": col("description"),
        "websiteUrl": "",
        "logoUrl": logo_url,
        "imageUrl": null,
        "categories": config.categories,
        "keywords": parse_keyword_list(table.get(row, "keywords"))?,
        "parentEntities": [config.parent_entity],
        "streetAddress": "",
        "city": col("city"),
        "state": col("state"),
        "country": config.country,
        "email": col("email"),
        "twitterUrl": col("twitter"),
        "facebookUrl": col("facebook"),
        "netWorth": net_worth,
        "entityType": "person",
        "jobTitle": col("title"),
        "jobResponsibilities": config.job_responsibilities,
        "featuredOnHomepage": false,
        "dailyRanking": 0,
    }]))
}

#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub file_name: String,
    pub mime: &'static str,
    pub last_modified_ms: u64,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub async fn load(path: &Path) -> Result<Self, PublishError> {
        let metadata = fs::metadata(path).await.map_err(io_error(path))?;
        let last_modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let bytes = fs::read(path).await.map_err(io_error(path))?;
        Ok(Self {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            mime: guess_mime(path),
            last_modified_ms,
            bytes,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub published: usize,
    pub skipped_missing_photo: usize,
    pub failed: usize,
    pub remaining: usize,
    pub results_file: Option<String>,
}

pub struct Publisher {
    config: PublishConfig,
    client: reqwest::Client,
    cookie: HeaderValue,
}

impl Publisher {
    pub fn new(config: PublishConfig) -> Result<Self, PublishError> {
        let cookie = HeaderValue::from_str(&config.session.cookie_header())
            .map_err(|e| PublishError::InvalidCookie(e.to_string()))?;
        let client = reqwest::Client::builder()
            .user_agent(config.session.user_agent.clone())
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            config,
            client,
            cookie,
        })
    }

    async fn checked_text(response: reqwest::Response) -> Result<String, PublishError> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PublishError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }
        Ok(body)
    }

    pub async fn init_upload(&self, photo: &PhotoFile) -> Result<UploadSlot, PublishError> {
        let payload = json!({
            "files": [{
                "name": photo.file_name,
                "size": photo.bytes.len(),
                "type": photo.mime,
                "lastModified": photo.last_modified_ms,
            }]
        });
        let response = self
            .client
            .post(&self.config.upload_url)
            .header(ACCEPT, "*/*")
            .header(ORIGIN, &self.config.origin)
            .header(REFERER, &self.config.submit_url)
            .header(COOKIE, self.cookie.clone())
            .header("x-uploadthing-package", UPLOADTHING_PACKAGE)
            .header("x-uploadthing-version", UPLOADTHING_VERSION)
            .json(&payload)
            .send()
            .await?;
        parse_init_response(&Self::checked_text(response).await?)
    }

    /// Sends the photo to the presigned slot and returns its public `ufsUrl`.
    pub async fn upload_file(&self, slot: &UploadSlot, photo: &PhotoFile) -> Result<String, PublishError> {
        let part = Part::bytes(photo.bytes.clone())
            .file_name(photo.file_name.clone())
            .mime_str(photo.mime)?;
        let response = self
            .client
            .put(&slot.url)
            .header(ACCEPT, "*/*")
            .header(ORIGIN, &self.config.origin)
            .header(REFERER, &self.config.submit_url)
            .header("x-uploadthing-version", UPLOADTHING_VERSION)
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        let body = Self::checked_text(response).await?;
        let value: JsonValue = serde_json::from_str(&body)?;
        value
            .get("ufsUrl")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or(PublishError::UnexpectedResponse(body))
    }

    pub async fn submit_entity(&self, payload: &JsonValue) -> Result<SubmitOutcome, PublishError> {
        let response = self
            .client
            .post(&self.config.submit_url)
            .header(ACCEPT, "text/x-component")
            .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
            .header(ORIGIN, &self.config.origin)
            .header(REFERER, &self.config.submit_url)
            .header(COOKIE, self.cookie.clone())
            .header("Next-Action", &self.config.next_action)
            .header("Next-Router-State-Tree", &self.config.router_state_tree)
            .body(serde_json::to_string(payload)?)
            .send()
            .await?;
        Ok(parse_submit_response(&Self::checked_text(response).await?))
    }

    async fn publish_row(
        &self,
        table: &CsvTable,
        row: &[String],
        photo_path: &Path,
    ) -> Result<(UploadSlot, SubmitOutcome), PublishError> {
        let photo = PhotoFile::load(photo_path).await?;
        info!(file = %photo.file_name, bytes = photo.bytes.len(), "uploading photo");
        let slot = self.init_upload(&photo).await?;
        let logo_url = self.upload_file(&slot, &photo).await?;
        let payload = entity_payload(&self.config, table, row, &logo_url)?;
        let outcome = self.submit_entity(&payload).await?;
        Ok((slot, outcome))
    }

    /// Publishes every row with a photo on disk. Published rows go to the results
    /// file; everything else is written back to the input CSV.
    pub async fn run(&self) -> Result<PublishSummary, PublishError> {
        let table = CsvTable::read(&self.config.csv_path)?;
        let mut summary = PublishSummary::default();
        let mut published = Vec::new();
        let mut remaining = Vec::new();

        for row in &table.rows {
            let name = table.get(row, "name");
            let photo_name = table.get(row, "photo_file").trim();
            let photo_path = self.config.photo_dir.join(photo_name);
            let photo_present = !photo_name.is_empty()
                && fs::metadata(&photo_path)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false);
            if !photo_present {
                warn!(name, photo = photo_name, "missing photo, row kept");
                summary.skipped_missing_photo += 1;
                remaining.push(row.clone());
                continue;
            }

            match self.publish_row(&table, row, &photo_path).await {
                Ok((slot, outcome)) => {
                    info!(name, entity_id = %outcome.entity_id, slug = %outcome.slug, "entity submitted");
                    let mut result = row.clone();
                    result.resize(table.headers.len(), String::new());
                    result.extend([slot.key, outcome.entity_id, outcome.slug]);
                    published.push(result);
                }
                Err(err) => {
                    warn!(name, error = %err, "publish failed, row kept");
                    summary.failed += 1;
                    remaining.push(row.clone());
                }
            }
        }

        summary.published = published.len();
        summary.remaining = remaining.len();
        if !published.is_empty() {
            let mut headers = table.headers.clone();
            headers.extend(RESULT_COLUMNS.iter().map(|c| c.to_string()));
            CsvTable {
                headers,
                rows: published,
            }
            .write(&self.config.output_path)?;
            summary.results_file = Some(self.config.output_path.display().to_string());
        }
        CsvTable {
            headers: table.headers.clone(),
            rows: remaining,
        }
        .write(&self.config.csv_path)?;

        Ok(summary)
    }
}
