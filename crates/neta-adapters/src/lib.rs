//! Source adapters for MyNeta, Sansad and Empowered Indian.
//!
//! Parsers are plain functions over fetched text so they can run against fixtures;
//! the adapters only sequence fetches through a [`PageFetcher`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use neta_core::{
    clean_email, format_crore, normalize_constituency, parse_amount, social_url, RawRecord,
    RowFilter, SocialPlatform, Source,
};
use neta_storage::{FetchError, PageFetcher};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

pub const CRATE_NAME: &str = "neta-adapters";

pub const MYNETA_WINNERS_URL: &str =
    "https://www.myneta.info/LokSabha2024/index.php?action=show_winners&sort=default";
pub const MYNETA_ELECTION_BASE: &str = "https://www.myneta.info/LokSabha2024/";

pub const SANSAD_MEMBERS_URL: &str = "https://sansad.in/api_ls/member";
pub const SANSAD_DETAIL_URL: &str = "https://sansad.in/api_ls/member/{id}?locale=en";
pub const SANSAD_PROFILE_URL: &str = "https://sansad.in/ls/members/biographyM/{id}?from=members";
pub const SANSAD_MINISTERS_URL: &str = "https://sansad.in/ls/members/in-council-of-ministers";
pub const SANSAD_POSITION_URL: &str =
    "https://sansad.in/api_ls/member/positionHeld?mpCode={id}&locale=en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crawlability {
    PublicHtml,
    Api,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterContext {
    pub run_id: Uuid,
    /// Caps how many MyNeta profile pages are visited.
    pub profile_limit: Option<usize>,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;
    fn crawlability(&self) -> Crawlability;

    async fn collect(
        &self,
        fetcher: &dyn PageFetcher,
        ctx: &AdapterContext,
    ) -> Result<Vec<RawRecord>, AdapterError>;
}

fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Message(e.to_string()))
}

/// Text of an element with whitespace runs collapsed and text nodes space separated.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn child_cells<'a>(row: ElementRef<'a>, tag: &str) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == tag)
        .collect()
}

fn resolve_link(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    base.join(href).map(String::from).unwrap_or_default()
}

fn fill_template(template: &str, id: &str) -> String {
    template.replace("{id}", id)
}

/// Scalar JSON as trimmed text. Arrays are joined with `", "`, null is empty.
fn json_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Array(items) => items
            .iter()
            .map(json_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn json_field(value: &JsonValue, key: &str) -> String {
    value.get(key).map(json_text).unwrap_or_default()
}

// MyNeta

#[derive(Debug, Clone)]
pub struct MynetaConfig {
    pub winners_url: String,
    /// Relative links on MyNeta pages resolve against this.
    pub election_base: String,
}

impl Default for MynetaConfig {
    fn default() -> Self {
        Self {
            winners_url: MYNETA_WINNERS_URL.to_string(),
            election_base: MYNETA_ELECTION_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinnerRow {
    pub candidate: String,
    pub profile_url: String,
    pub constituency_raw: String,
    pub party: String,
    pub criminal_cases: String,
    pub education_summary: String,
    pub total_assets: String,
    pub liabilities: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDetails {
    pub photo_url: String,
    pub education_detail: String,
    pub compare_url: Option<String>,
}

/// One row of a candidate's affidavit comparison table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastElection {
    #[serde(rename = "Election Name")]
    pub election_name: String,
    #[serde(rename = "Constituency")]
    pub constituency: String,
    #[serde(rename = "Party Code")]
    pub party_code: String,
    #[serde(rename = "Criminal Cases")]
    pub criminal_cases: String,
    #[serde(rename = "Number of Cases")]
    pub number_of_cases: String,
    #[serde(rename = "Education Level")]
    pub education_level: String,
    #[serde(rename = "Total Assets")]
    pub total_assets: String,
    #[serde(rename = "Total Liabilities")]
    pub total_liabilities: String,
}

/// Rows of the winners listing. The first row of the page is the header; rows with
/// fewer than 8 cells are layout rows and skipped.
pub fn parse_winners(html: &str, base: &Url) -> Result<Vec<WinnerRow>, AdapterError> {
    let document = Html::parse_document(html);
    let rows = selector("table tr")?;
    let links = selector("a")?;

    let mut winners = Vec::new();
    for row in document.select(&rows).skip(1) {
        let cells = child_cells(row, "td");
        if cells.len() < 8 {
            continue;
        }
        let profile_url = cells[1]
            .select(&links)
            .nth(1)
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_link(base, href))
            .unwrap_or_default();

        winners.push(WinnerRow {
            candidate: element_text(cells[1]),
            profile_url,
            constituency_raw: element_text(cells[2]),
            party: element_text(cells[3]),
            criminal_cases: element_text(cells[4]),
            education_summary: element_text(cells[5]),
            total_assets: element_text(cells[6]),
            liabilities: element_text(cells[7]),
        });
    }
    Ok(winners)
}

pub fn parse_profile(html: &str, base: &Url) -> Result<ProfileDetails, AdapterError> {
    let document = Html::parse_document(html);

    let photo_url = document
        .select(&selector("div.w3-third img")?)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(|src| resolve_link(base, src))
        .unwrap_or_default();

    // First "Education" label that sits in a table cell with a value cell next to it.
    let education_detail = document
        .root_element()
        .descendants()
        .filter(|node| {
            node.value()
                .as_text()
                .is_some_and(|text| text.to_lowercase().contains("education"))
        })
        .find_map(|node| {
            let label = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "td")?;
            label
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "td")
                .map(element_text)
        })
        .unwrap_or_default();

    let compare_url = document
        .select(&selector("a")?)
        .find(|a| {
            element_text(*a)
                .to_lowercase()
                .contains("click here for more details")
        })
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve_link(base, href))
        .filter(|url| !url.is_empty());

    Ok(ProfileDetails {
        photo_url,
        education_detail,
        compare_url,
    })
}

/// Past elections from the comparison page. The table whose headers mention a
/// declaration or assets is preferred, otherwise the table with the most rows.
pub fn parse_compare(html: &str, filter: &RowFilter) -> Result<Vec<PastElection>, AdapterError> {
    let document = Html::parse_document(html);
    let header_cells = selector("th")?;
    let rows = selector("tr")?;

    let tables = document.select(&selector("table")?).collect::<Vec<_>>();
    let declared = tables.iter().copied().find(|table| {
        let headers = table
            .select(&header_cells)
            .map(|th| element_text(th).to_uppercase())
            .collect::<Vec<_>>()
            .join(" ");
        ["DECLARATION", "ASSETS", "DECLARED"]
            .iter()
            .any(|keyword| headers.contains(keyword))
    });
    let target = declared.or_else(|| {
        tables
            .iter()
            .copied()
            .rev()
            .max_by_key(|table| table.select(&rows).count())
    });
    let Some(table) = target else {
        return Ok(Vec::new());
    };

    let mut elections = Vec::new();
    for row in table.select(&rows).skip(1) {
        let cells = child_cells(row, "td")
            .into_iter()
            .map(element_text)
            .collect::<Vec<_>>();
        if !filter.accepts_cells(&cells) || cells.len() < 8 {
            continue;
        }
        elections.push(PastElection {
            election_name: cells[0].clone(),
            constituency: normalize_constituency(&cells[1]).to_string(),
            party_code: cells[2].clone(),
            criminal_cases: cells[3].clone(),
            number_of_cases: cells[4].clone(),
            education_level: cells[5].clone(),
            total_assets: cells[6].clone(),
            total_liabilities: cells[7].clone(),
        });
    }
    Ok(elections)
}

#[derive(Debug, Clone, Default)]
struct MynetaProfile {
    photo_url: String,
    education_detail: String,
    other_elections: Vec<PastElection>,
}

fn winner_record(winner: WinnerRow, profile: MynetaProfile) -> Result<RawRecord, AdapterError> {
    let other_elections = serde_json::to_string(&profile.other_elections)?;
    let constituency = normalize_constituency(&winner.constituency_raw);
    Ok(RawRecord::new(Source::Myneta)
        .with("candidate", winner.candidate)
        .with("profile_url", winner.profile_url)
        .with("constituency", constituency.as_str())
        .with("constituency_raw", winner.constituency_raw)
        .with("party", winner.party)
        .with("criminal_cases", winner.criminal_cases)
        .with("education_summary", winner.education_summary)
        .with("education_detail", profile.education_detail)
        .with("total_assets_crore", format_crore(parse_amount(&winner.total_assets)))
        .with("liabilities_crore", format_crore(parse_amount(&winner.liabilities)))
        .with("total_assets", winner.total_assets)
        .with("liabilities", winner.liabilities)
        .with("other_elections", other_elections)
        .with("photo_url", profile.photo_url))
}

pub struct MynetaAdapter {
    config: MynetaConfig,
    row_filter: RowFilter,
}

impl MynetaAdapter {
    pub fn new(config: MynetaConfig, row_filter: RowFilter) -> Self {
        Self { config, row_filter }
    }

    async fn profile(
        &self,
        fetcher: &dyn PageFetcher,
        profile_url: &str,
        base: &Url,
    ) -> Result<MynetaProfile, AdapterError> {
        let html = fetcher.fetch_text(profile_url).await?;
        let details = parse_profile(&html, base)?;
        let other_elections = match &details.compare_url {
            Some(compare_url) => {
                let html = fetcher.fetch_text(compare_url).await?;
                parse_compare(&html, &self.row_filter)?
            }
            None => Vec::new(),
        };
        Ok(MynetaProfile {
            photo_url: details.photo_url,
            education_detail: details.education_detail,
            other_elections,
        })
    }
}

#[async_trait]
impl SourceAdapter for MynetaAdapter {
    fn source(&self) -> Source {
        Source::Myneta
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::PublicHtml
    }

    async fn collect(
        &self,
        fetcher: &dyn PageFetcher,
        ctx: &AdapterContext,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let base = Url::parse(&self.config.election_base)?;
        let html = fetcher.fetch_text(&self.config.winners_url).await?;
        let winners = parse_winners(&html, &base)?;
        info!(count = winners.len(), run_id = %ctx.run_id, "parsed myneta winners");

        let mut visited = 0usize;
        let mut records = Vec::with_capacity(winners.len());
        for winner in winners {
            let within_limit = ctx.profile_limit.map_or(true, |limit| visited < limit);
            let profile = if within_limit && !winner.profile_url.is_empty() {
                visited += 1;
                match self.profile(fetcher, &winner.profile_url, &base).await {
                    Ok(profile) => profile,
                    Err(err) => {
                        warn!(candidate = %winner.candidate, error = %err, "myneta profile failed");
                        MynetaProfile::default()
                    }
                }
            } else {
                MynetaProfile::default()
            };
            debug!(candidate = %winner.candidate, constituency = %winner.constituency_raw, "myneta winner");
            records.push(winner_record(winner, profile)?);
        }
        Ok(records)
    }
}

// Sansad

#[derive(Debug, Clone)]
pub struct SansadConfig {
    pub members_url: String,
    pub detail_url: String,
    pub profile_url: String,
    pub ministers_url: String,
    pub position_url: String,
    pub loksabha: u32,
    pub page_size: u32,
    /// Keep only members of this state (case-insensitive).
    pub state: Option<String>,
    pub fetch_details: bool,
}

impl Default for SansadConfig {
    fn default() -> Self {
        Self {
            members_url: SANSAD_MEMBERS_URL.to_string(),
            detail_url: SANSAD_DETAIL_URL.to_string(),
            profile_url: SANSAD_PROFILE_URL.to_string(),
            ministers_url: SANSAD_MINISTERS_URL.to_string(),
            position_url: SANSAD_POSITION_URL.to_string(),
            loksabha: 18,
            page_size: 10,
            state: None,
            fetch_details: true,
        }
    }
}

impl SansadConfig {
    pub fn members_page_url(&self, page: u32) -> Result<Url, AdapterError> {
        let loksabha = self.loksabha.to_string();
        let page = page.to_string();
        let size = self.page_size.max(1).to_string();
        Ok(Url::parse_with_params(
            &self.members_url,
            &[
                ("loksabha", loksabha.as_str()),
                ("page", page.as_str()),
                ("size", size.as_str()),
                ("sitting", "1"),
                ("locale", "en"),
                ("memberStatus", "s"),
            ],
        )?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MembersPage {
    pub members: Vec<JsonValue>,
    pub total_pages: u64,
}

pub fn parse_members_page(body: &str) -> Result<MembersPage, AdapterError> {
    let value: JsonValue = serde_json::from_str(body)?;
    let members = value
        .get("membersDtoList")
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default();
    let total_pages = value
        .pointer("/metaDatasDto/totalPages")
        .and_then(JsonValue::as_u64)
        .unwrap_or(1);
    Ok(MembersPage {
        members,
        total_pages,
    })
}

/// Lok Sabha ministers from the council page's `__NEXT_DATA__`, member id to position.
pub fn parse_ministers(html: &str) -> Result<HashMap<String, String>, AdapterError> {
    let document = Html::parse_document(html);
    let script = document
        .select(&selector("script#__NEXT_DATA__")?)
        .next()
        .ok_or_else(|| AdapterError::Message("ministers page has no __NEXT_DATA__".to_string()))?;
    let value: JsonValue = serde_json::from_str(&script.text().collect::<String>())?;
    let council = value
        .pointer("/props/pageProps/councilMinister")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| AdapterError::Message("councilMinister list missing".to_string()))?;

    Ok(council
        .iter()
        .filter(|minister| json_field(minister, "house") == "LS")
        .map(|minister| (json_field(minister, "mpsno"), json_field(minister, "position")))
        .filter(|(id, _)| !id.is_empty())
        .collect())
}

/// Most recent `positionHeld`, empty when the list is empty.
pub fn parse_position_held(body: &str) -> Result<String, AdapterError> {
    let value: JsonValue = serde_json::from_str(body)?;
    Ok(value
        .as_array()
        .and_then(|entries| entries.first())
        .map(|entry| json_field(entry, "positionHeld"))
        .unwrap_or_default())
}

fn strip_line_breaks(text: &str) -> String {
    ["<br>", "<br/>", "<br />"]
        .iter()
        .fold(text.to_string(), |acc, tag| acc.replace(tag, " "))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn joined_address(details: &JsonValue, first: &str, second: &str) -> String {
    format!("{} {}", json_field(details, first), json_field(details, second))
        .trim()
        .to_string()
}

/// Builds one Sansad record from a member list entry and its (possibly null) detail.
pub fn sansad_record(
    member: &JsonValue,
    details: &JsonValue,
    profile_url: &str,
    position: &str,
    position_detail: &str,
) -> RawRecord {
    let constituency_raw = json_field(member, "constName");
    let constituency = normalize_constituency(&constituency_raw);
    RawRecord::new(Source::Sansad)
        .with("id", json_field(member, "mpsno"))
        .with("name", json_field(member, "mpFirstLastName"))
        .with("profile_url", profile_url)
        .with("constituency", constituency.as_str())
        .with("constituency_raw", constituency_raw)
        .with("party", json_field(member, "partyFname"))
        .with("gender", json_field(member, "gender"))
        .with("state", json_field(member, "stateName"))
        .with("email", clean_email(&json_field(member, "email")))
        .with("dob", json_field(details, "dateOfBirth"))
        .with("education", strip_line_breaks(&json_field(details, "education")))
        .with(
            "present_address",
            joined_address(details, "presentFaddr", "presentLaddr"),
        )
        .with(
            "permanent_address",
            joined_address(details, "permanentFaddr", "permanentLaddr"),
        )
        .with(
            "facebook",
            social_url(SocialPlatform::Facebook, &json_field(details, "facebook")),
        )
        .with(
            "twitter",
            social_url(SocialPlatform::Twitter, &json_field(details, "twitter")),
        )
        .with(
            "instagram",
            social_url(SocialPlatform::Instagram, &json_field(details, "instagram")),
        )
        .with(
            "linkedin",
            social_url(SocialPlatform::LinkedIn, &json_field(details, "linkedIn")),
        )
        .with("photo_url", json_field(member, "imageUrl"))
        .with("loksabha_terms", json_field(member, "lsExpr"))
        .with("position", position)
        .with("position_detail", position_detail)
}

pub struct SansadAdapter {
    config: SansadConfig,
}

impl SansadAdapter {
    pub fn new(config: SansadConfig) -> Self {
        Self { config }
    }

    async fn ministers(&self, fetcher: &dyn PageFetcher) -> HashMap<String, String> {
        let parsed = match fetcher.fetch_text(&self.config.ministers_url).await {
            Ok(html) => parse_ministers(&html),
            Err(err) => Err(err.into()),
        };
        match parsed {
            Ok(ministers) => {
                info!(count = ministers.len(), "loaded lok sabha ministers");
                ministers
            }
            Err(err) => {
                warn!(error = %err, "council of ministers unavailable");
                HashMap::new()
            }
        }
    }

    async fn details(&self, fetcher: &dyn PageFetcher, id: &str) -> JsonValue {
        let url = fill_template(&self.config.detail_url, id);
        let parsed = match fetcher.fetch_text(&url).await {
            Ok(body) => serde_json::from_str::<JsonValue>(&body).map_err(AdapterError::from),
            Err(err) => Err(err.into()),
        };
        parsed.unwrap_or_else(|err| {
            warn!(member_id = id, error = %err, "sansad member detail failed");
            JsonValue::Null
        })
    }

    async fn position_detail(&self, fetcher: &dyn PageFetcher, id: &str) -> String {
        let url = fill_template(&self.config.position_url, id);
        let parsed = match fetcher.fetch_text(&url).await {
            Ok(body) => parse_position_held(&body),
            Err(err) => Err(err.into()),
        };
        parsed.unwrap_or_else(|err| {
            warn!(member_id = id, error = %err, "sansad position lookup failed");
            String::new()
        })
    }
}

#[async_trait]
impl SourceAdapter for SansadAdapter {
    fn source(&self) -> Source {
        Source::Sansad
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::Api
    }

    async fn collect(
        &self,
        fetcher: &dyn PageFetcher,
        ctx: &AdapterContext,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let ministers = self.ministers(fetcher).await;
        let state = self
            .config
            .state
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut records = Vec::new();
        let mut page = 1u32;
        loop {
            let url = self.config.members_page_url(page)?;
            let body = fetcher.fetch_text(url.as_str()).await?;
            let listing = parse_members_page(&body)?;
            if listing.members.is_empty() {
                break;
            }

            for member in &listing.members {
                if let Some(state) = state {
                    if !json_field(member, "stateName").eq_ignore_ascii_case(state) {
                        continue;
                    }
                }
                let id = json_field(member, "mpsno");
                let details = if self.config.fetch_details && !id.is_empty() {
                    self.details(fetcher, &id).await
                } else {
                    JsonValue::Null
                };
                let (position, position_detail) = match ministers.get(&id) {
                    Some(position) => (position.clone(), self.position_detail(fetcher, &id).await),
                    None => (String::new(), String::new()),
                };
                let profile_url = fill_template(&self.config.profile_url, &id);
                let record = sansad_record(member, &details, &profile_url, &position, &position_detail);
                debug!(
                    member = record.field("name"),
                    constituency = record.field("constituency_raw"),
                    "sansad member"
                );
                records.push(record);
            }

            if u64::from(page) >= listing.total_pages {
                break;
            }
            page += 1;
        }

        info!(count = records.len(), run_id = %ctx.run_id, "collected sansad members");
        Ok(records)
    }
}

// Empowered Indian

#[derive(Debug, Clone)]
pub struct EmpoweredIndianConfig {
    /// Per-member statistics endpoint with an `{id}` placeholder.
    pub member_url: String,
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut after_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if after_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            after_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            after_lower = true;
        } else {
            if !out.ends_with('_') {
                out.push('_');
            }
            after_lower = false;
        }
    }
    out.trim_matches('_').to_string()
}

fn flatten_json(path: &str, value: &JsonValue, out: &mut BTreeMap<String, String>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                let key = snake_case(key);
                let child_path = match (path.is_empty(), key.is_empty()) {
                    (true, _) => key,
                    (false, true) => path.to_string(),
                    (false, false) => format!("{path}_{key}"),
                };
                flatten_json(&child_path, child, out);
            }
        }
        _ if path.is_empty() => {}
        JsonValue::Array(_) => {
            out.insert(path.to_string(), value.to_string());
        }
        other => {
            out.insert(path.to_string(), json_text(other));
        }
    }
}

/// Flattens one member's statistics into `ei_` fields keyed by snake_case path.
pub fn parse_member_stats(member_id: &str, body: &str) -> Result<RawRecord, AdapterError> {
    let value: JsonValue = serde_json::from_str(body)?;
    let root = match value.get("data") {
        Some(data) if data.is_object() => data,
        _ => &value,
    };
    if !root.is_object() {
        return Err(AdapterError::Message(format!(
            "statistics for member {member_id} are not an object"
        )));
    }

    let mut flat = BTreeMap::new();
    flatten_json("", root, &mut flat);
    let source = Source::EmpoweredIndian;
    Ok(RawRecord::from_prefixed(
        source,
        flat.into_iter().map(|(k, v)| (source.field(&k), v)),
    )
    .with("mp_id", member_id.trim()))
}

pub struct EmpoweredIndianAdapter {
    config: EmpoweredIndianConfig,
    member_ids: Vec<String>,
}

impl EmpoweredIndianAdapter {
    pub fn new(config: EmpoweredIndianConfig, member_ids: Vec<String>) -> Self {
        Self { config, member_ids }
    }
}

#[async_trait]
impl SourceAdapter for EmpoweredIndianAdapter {
    fn source(&self) -> Source {
        Source::EmpoweredIndian
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::Api
    }

    async fn collect(
        &self,
        fetcher: &dyn PageFetcher,
        ctx: &AdapterContext,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let mut records = Vec::new();
        for id in self.member_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            let url = fill_template(&self.config.member_url, id);
            let parsed = match fetcher.fetch_text(&url).await {
                Ok(body) => parse_member_stats(id, &body),
                Err(err) => Err(err.into()),
            };
            match parsed {
                Ok(record) => records.push(record),
                Err(err) => warn!(member_id = id, error = %err, "member statistics skipped"),
            }
        }
        info!(
            count = records.len(),
            requested = self.member_ids.len(),
            run_id = %ctx.run_id,
            "collected member statistics"
        );
        Ok(records)
    }
}
