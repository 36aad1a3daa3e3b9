//! Core record model, field normalizers and the constituency join for neta.
//!
//! Everything in this crate is pure: no I/O, no clocks, no shared state. Malformed
//! input degrades to empty strings, zero, or an unmatched provenance flag.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "neta-core";

/// Rupees in one crore (10^7).
pub const RUPEES_PER_CRORE: f64 = 10_000_000.0;

pub const DEFAULT_JUNK_TOKENS: &[&str] = &[
    "DONATE",
    "DONATE NOW",
    "DOWNLOAD",
    "FOLLOW US",
    "SHARE ON",
    "DOWNLOAD APP",
    "CLICK HERE",
    "ADVERTISEMENT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Myneta,
    Sansad,
    EmpoweredIndian,
}

impl Source {
    pub fn id(self) -> &'static str {
        match self {
            Source::Myneta => "myneta",
            Source::Sansad => "sansad",
            Source::EmpoweredIndian => "empowered-indian",
        }
    }

    /// Column prefix used for every field this source contributes.
    pub fn prefix(self) -> &'static str {
        match self {
            Source::Myneta => "myneta",
            Source::Sansad => "sansad",
            Source::EmpoweredIndian => "ei",
        }
    }

    pub fn field(self, name: &str) -> String {
        format!("{}_{}", self.prefix(), name)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One row of string fields produced by a single source adapter.
///
/// Field names are stored with the source prefix (`sansad_email`); the accessors
/// take the bare name. A record is never edited in place: [`RawRecord::with`]
/// consumes it and hands back the extended record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    source: Source,
    fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            fields: BTreeMap::new(),
        }
    }

    /// Builds a record from already-prefixed field names.
    pub fn from_prefixed<I, K, V>(source: Source, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            source,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(self.source.field(name), value.into());
        self
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Value of the bare field `name`, empty when absent.
    pub fn field(&self, name: &str) -> &str {
        self.fields
            .get(&self.source.field(name))
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

}

/// Canonical constituency name used as the join key. Empty means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_parenthetical(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// `"Amethi (S.C)"` and `"AMETHI"` both become `AMETHI`; `"Chandni-Chowk"` becomes
/// `CHANDNI CHOWK`. Idempotent.
pub fn normalize_constituency(raw: &str) -> NormalizedKey {
    let spaced = strip_parenthetical(raw)
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() {
                c.to_ascii_uppercase()
            } else {
                ' '
            }
        })
        .collect::<String>();
    NormalizedKey(spaced.split_whitespace().collect::<Vec<_>>().join(" "))
}

const EMAIL_OBFUSCATIONS: &[(&str, &str)] = &[
    ("[at]", "@"),
    ("[dot]", "."),
    ("(at)", "@"),
    ("(dot)", "."),
    ("{at}", "@"),
    ("{dot}", "."),
];

static COMMA_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").expect("static regex"));
static AT_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*@\s*").expect("static regex"));
static DOT_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\.\s*").expect("static regex"));

/// De-obfuscates `name [at] example [dot] in` style addresses. Multiple addresses
/// stay comma separated.
pub fn clean_email(raw: &str) -> String {
    let mut cleaned = raw.to_string();
    for (from, to) in EMAIL_OBFUSCATIONS {
        cleaned = cleaned.replace(from, to);
    }
    let cleaned = cleaned.replace('\n', " ");
    let cleaned = COMMA_SPACING.replace_all(cleaned.trim(), ", ");
    let cleaned = AT_SPACING.replace_all(&cleaned, "@");
    let cleaned = DOT_SPACING.replace_all(&cleaned, ".");
    cleaned
        .trim_matches(|c: char| c == ',' || c == ' ')
        .to_string()
}

/// Parses a disclosure amount into crore.
///
/// The first number in the text wins. A `crore`/`cr` unit right after it is taken
/// as-is, `lakh`/`lac` is divided by 100, anything else is read as rupees. Returns
/// `0.0` when no number can be read.
pub fn parse_amount(raw: &str) -> f64 {
    let Some(start) = raw.find(|c: char| c.is_ascii_digit()) else {
        return 0.0;
    };
    let tail = &raw[start..];
    let end = tail
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
        .unwrap_or(tail.len());
    let digits = tail[..end].replace(',', "");
    let mut parts = digits.trim_end_matches('.').splitn(3, '.');
    let whole = parts.next().unwrap_or_default();
    let number = match parts.next() {
        Some(frac) => format!("{whole}.{frac}"),
        None => whole.to_string(),
    };
    let Ok(value) = number.parse::<f64>() else {
        return 0.0;
    };

    let unit = tail[end..].trim_start().to_ascii_lowercase();
    let crore = if unit.starts_with("cr") {
        value
    } else if unit.starts_with("lakh") || unit.starts_with("lac") {
        value / 100.0
    } else {
        value / RUPEES_PER_CRORE
    };
    if crore.is_finite() {
        crore
    } else {
        0.0
    }
}

pub fn format_crore(value: f64) -> String {
    format!("{value:.2}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocialPlatform {
    Twitter,
    Facebook,
    Instagram,
    LinkedIn,
}

impl SocialPlatform {
    fn canonical_base(self) -> &'static str {
        match self {
            SocialPlatform::Twitter => "x.com/",
            SocialPlatform::Facebook => "facebook.com/",
            SocialPlatform::Instagram => "instagram.com/",
            SocialPlatform::LinkedIn => "linkedin.com/in/",
        }
    }

    fn known_hosts(self) -> &'static [&'static str] {
        match self {
            SocialPlatform::Twitter => &["x.com/", "twitter.com/", "mobile.twitter.com/"],
            SocialPlatform::Facebook => &["facebook.com/", "m.facebook.com/", "fb.com/"],
            SocialPlatform::Instagram => &["instagram.com/"],
            SocialPlatform::LinkedIn => &["linkedin.com/", "in.linkedin.com/"],
        }
    }
}

/// Turns a handle or partial URL into an absolute profile URL.
pub fn social_url(platform: SocialPlatform, raw: &str) -> String {
    let trimmed = raw.trim();
    let value = if platform == SocialPlatform::Twitter {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    };
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return value;
    }

    let without_www = lower.strip_prefix("www.").unwrap_or(&lower);
    if platform
        .known_hosts()
        .iter()
        .any(|host| without_www.starts_with(host))
    {
        return format!("https://{value}");
    }

    let handle = value.trim_start_matches('@').trim_matches('/');
    if handle.is_empty() {
        return String::new();
    }
    format!("https://{}{}", platform.canonical_base(), handle)
}

/// File name a downloaded photo is stored under.
pub fn photo_file_name(name: &str) -> String {
    let stem = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(120)
        .collect::<String>();
    format!("{stem}.jpg")
}

/// Predicate stage that drops navigation, advertisement and other junk rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowFilter {
    pub junk_tokens: Vec<String>,
    pub min_cells: usize,
    pub require_digit: bool,
}

impl Default for RowFilter {
    fn default() -> Self {
        Self {
            junk_tokens: DEFAULT_JUNK_TOKENS.iter().map(|t| t.to_string()).collect(),
            min_cells: 3,
            require_digit: true,
        }
    }
}

impl RowFilter {
    fn contains_junk(&self, upper_text: &str) -> bool {
        self.junk_tokens
            .iter()
            .any(|token| upper_text.contains(&token.to_uppercase()))
    }

    /// Applies every rule to one table row's cell texts.
    pub fn accepts_cells<S: AsRef<str>>(&self, cells: &[S]) -> bool {
        if cells.is_empty() {
            return false;
        }
        let joined = cells
            .iter()
            .map(|c| c.as_ref().trim().to_uppercase())
            .collect::<Vec<_>>()
            .join(" ");
        if self.contains_junk(&joined) {
            return false;
        }
        if self.require_digit && !joined.chars().any(|c| c.is_ascii_digit()) {
            return false;
        }
        cells.len() >= self.min_cells
    }

    /// Whole records only get the junk-token rule. URLs and JSON payloads are skipped.
    pub fn accepts(&self, record: &RawRecord) -> bool {
        let text = record
            .fields()
            .values()
            .map(|v| v.trim())
            .filter(|v| !(v.starts_with("http") || v.starts_with('[') || v.starts_with('{')))
            .map(str::to_uppercase)
            .collect::<Vec<_>>()
            .join(" ");
        !self.contains_junk(&text)
    }
}

pub fn filter_records(records: Vec<RawRecord>, filter: &RowFilter) -> Vec<RawRecord> {
    records.into_iter().filter(|r| filter.accepts(r)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Matched,
    Unmatched,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Matched => "matched",
            Provenance::Unmatched => "unmatched",
        }
    }
}

/// Primary record joined with its secondary (and optionally supplementary) match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    key: NormalizedKey,
    fields: BTreeMap<String, String>,
    secondary: Provenance,
    supplementary: Option<Provenance>,
}

impl MergedRecord {
    pub fn key(&self) -> &NormalizedKey {
        &self.key
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Value of a prefixed column, empty when absent.
    pub fn field(&self, column: &str) -> &str {
        self.fields
            .get(column)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn secondary(&self) -> Provenance {
        self.secondary
    }

    /// `None` until [`attach_by_id`] has run over the record.
    pub fn supplementary(&self) -> Option<Provenance> {
        self.supplementary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub total: usize,
    pub matched: usize,
    pub unmatched_keys: Vec<NormalizedKey>,
    /// Secondary keys seen more than once; the later record won.
    pub duplicate_keys: Vec<NormalizedKey>,
    /// Secondary keys no primary row matched. These rows are not in the output.
    pub orphaned_keys: Vec<NormalizedKey>,
}

/// Join key shared by every source: `<prefix>_constituency_raw`, falling back to
/// `<prefix>_constituency`.
pub fn constituency_key(record: &RawRecord) -> NormalizedKey {
    let raw = record.field("constituency_raw");
    if raw.trim().is_empty() {
        normalize_constituency(record.field("constituency"))
    } else {
        normalize_constituency(raw)
    }
}

/// Column a secondary field lands in: its own name, or re-prefixed with its
/// source when the primary record already has that name.
fn secondary_column(primary: &BTreeMap<String, String>, source: Source, name: &str) -> String {
    if primary.contains_key(name) {
        source.field(name)
    } else {
        name.to_string()
    }
}

fn union_fields(combined: &mut BTreeMap<String, String>, other: &RawRecord) {
    let primary = combined.clone();
    for (name, value) in other.fields() {
        combined.insert(secondary_column(&primary, other.source(), name), value.clone());
    }
}

fn fill_defaults(combined: &mut BTreeMap<String, String>, columns: &BTreeSet<(Source, String)>) {
    let primary = combined.clone();
    for (source, name) in columns {
        combined
            .entry(secondary_column(&primary, *source, name))
            .or_default();
    }
}

fn columns_of(records: &[RawRecord]) -> BTreeSet<(Source, String)> {
    records
        .iter()
        .flat_map(|r| r.fields().keys().map(move |k| (r.source(), k.clone())))
        .collect()
}

/// Left join of `primary` against `secondary` on `key_fn`.
///
/// Output order is `primary` order. Secondary rows nobody matched are dropped.
pub fn merge<F>(primary: &[RawRecord], secondary: &[RawRecord], key_fn: F) -> Vec<MergedRecord>
where
    F: Fn(&RawRecord) -> NormalizedKey,
{
    merge_with_report(primary, secondary, key_fn).0
}

pub fn merge_with_report<F>(
    primary: &[RawRecord],
    secondary: &[RawRecord],
    key_fn: F,
) -> (Vec<MergedRecord>, MergeReport)
where
    F: Fn(&RawRecord) -> NormalizedKey,
{
    let mut report = MergeReport {
        total: primary.len(),
        ..Default::default()
    };

    let mut lookup: HashMap<NormalizedKey, &RawRecord> = HashMap::new();
    for record in secondary {
        let key = key_fn(record);
        if key.is_unknown() {
            continue;
        }
        if lookup.insert(key.clone(), record).is_some() && !report.duplicate_keys.contains(&key) {
            report.duplicate_keys.push(key);
        }
    }
    let secondary_columns = columns_of(secondary);

    let mut used: BTreeSet<NormalizedKey> = BTreeSet::new();
    let mut merged = Vec::with_capacity(primary.len());
    for record in primary {
        let key = key_fn(record);
        let mut combined = record.fields().clone();
        let hit = if key.is_unknown() { None } else { lookup.get(&key) };
        let secondary = match hit {
            Some(other) => {
                union_fields(&mut combined, other);
                used.insert(key.clone());
                report.matched += 1;
                Provenance::Matched
            }
            None => {
                fill_defaults(&mut combined, &secondary_columns);
                report.unmatched_keys.push(key.clone());
                Provenance::Unmatched
            }
        };
        merged.push(MergedRecord {
            key,
            fields: combined,
            secondary,
            supplementary: None,
        });
    }

    let mut orphaned = lookup
        .into_keys()
        .filter(|k| !used.contains(k))
        .collect::<Vec<_>>();
    orphaned.sort();
    report.orphaned_keys = orphaned;

    (merged, report)
}

/// Second-stage join on an identifier column, e.g. `sansad_id` against `ei_mp_id`.
pub fn attach_by_id(
    records: Vec<MergedRecord>,
    supplementary: &[RawRecord],
    record_id_column: &str,
    supplementary_id_column: &str,
) -> Vec<MergedRecord> {
    attach_by_id_with_duplicates(records, supplementary, record_id_column, supplementary_id_column).0
}

/// Like [`attach_by_id`], also returning the supplementary ids seen more than
/// once (the later record won), in first-collision order.
pub fn attach_by_id_with_duplicates(
    records: Vec<MergedRecord>,
    supplementary: &[RawRecord],
    record_id_column: &str,
    supplementary_id_column: &str,
) -> (Vec<MergedRecord>, Vec<String>) {
    let mut lookup: HashMap<&str, &RawRecord> = HashMap::new();
    let mut duplicates: Vec<String> = Vec::new();
    for record in supplementary {
        let id = record
            .fields()
            .get(supplementary_id_column)
            .map(|v| v.trim())
            .unwrap_or_default();
        if id.is_empty() {
            continue;
        }
        if lookup.insert(id, record).is_some() && !duplicates.iter().any(|d| d == id) {
            duplicates.push(id.to_string());
        }
    }
    let columns = columns_of(supplementary);

    let attached = records
        .into_iter()
        .map(|record| {
            let id = record.field(record_id_column).trim().to_string();
            let mut fields = record.fields;
            let hit = if id.is_empty() { None } else { lookup.get(id.as_str()) };
            let supplementary = match hit {
                Some(other) => {
                    union_fields(&mut fields, other);
                    Provenance::Matched
                }
                None => {
                    fill_defaults(&mut fields, &columns);
                    Provenance::Unmatched
                }
            };
            MergedRecord {
                key: record.key,
                fields,
                secondary: record.secondary,
                supplementary: Some(supplementary),
            }
        })
        .collect();
    (attached, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn myneta(candidate: &str, constituency: &str) -> RawRecord {
        RawRecord::new(Source::Myneta)
            .with("candidate", candidate)
            .with("constituency_raw", constituency)
            .with("constituency", normalize_constituency(constituency).as_str())
    }

    fn sansad(name: &str, constituency: &str) -> RawRecord {
        RawRecord::new(Source::Sansad)
            .with("name", name)
            .with("constituency_raw", constituency)
            .with("constituency", normalize_constituency(constituency).as_str())
    }

    #[test]
    fn constituency_normalization_examples() {
        assert_eq!(normalize_constituency("Amethi (S.C)").as_str(), "AMETHI");
        assert_eq!(normalize_constituency("AMETHI").as_str(), "AMETHI");
        assert_eq!(normalize_constituency("Wayanad").as_str(), "WAYANAD");
        assert_eq!(normalize_constituency("  Chandni-Chowk ").as_str(), "CHANDNI CHOWK");
        assert_eq!(normalize_constituency("Ladakh 1").as_str(), "LADAKH");
        assert!(normalize_constituency("").is_unknown());
        assert!(normalize_constituency("(SC) 123 --").is_unknown());
    }

    #[test]
    fn unclosed_parenthesis_is_punctuation() {
        assert_eq!(normalize_constituency("Bastar (ST").as_str(), "BASTAR ST");
        assert_eq!(normalize_constituency("A (x) B (y)").as_str(), "A B");
    }

    #[test]
    fn constituency_normalization_is_idempotent() {
        let samples = [
            "",
            "((",
            "a(b",
            "Amethi (S.C)",
            "Mumbai North-West",
            "Dadra And Nagar Haveli (ST)",
            "नई दिल्ली",
            "  spaced\t\tout\nname ",
            "x)y(z",
        ];
        for s in samples {
            let once = normalize_constituency(s);
            let twice = normalize_constituency(once.as_str());
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn emails_are_deobfuscated() {
        assert_eq!(clean_email("abc[at]gmail[dot]com"), "abc@gmail.com");
        assert_eq!(
            clean_email("a (at) b (dot) in ,\n c{at}d{dot}in,"),
            "a@b.in, c@d.in"
        );
        assert_eq!(clean_email("   "), "");
    }

    #[test]
    fn amounts_parse_into_crore() {
        assert!((parse_amount("₹20.55 crore") - 20.55).abs() < 1e-9);
        assert!((parse_amount("Rs 5,42,17,455 ~ 5 Crore+") - 5.4217455).abs() < 1e-9);
        assert!((parse_amount("35 Lakh") - 0.35).abs() < 1e-9);
        assert!((parse_amount("Rs 1.5 Cr") - 1.5).abs() < 1e-9);
        assert_eq!(parse_amount("garbage"), 0.0);
        assert_eq!(parse_amount("Nil"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(format_crore(parse_amount("₹20.55 crore")), "20.55");
    }

    #[test]
    fn social_handles_become_urls() {
        assert_eq!(social_url(SocialPlatform::Twitter, "@RahulGandhi"), "https://x.com/rahulgandhi");
        assert_eq!(
            social_url(SocialPlatform::Twitter, "twitter.com/someone"),
            "https://twitter.com/someone"
        );
        assert_eq!(
            social_url(SocialPlatform::Facebook, "https://www.facebook.com/Page"),
            "https://www.facebook.com/Page"
        );
        assert_eq!(social_url(SocialPlatform::LinkedIn, "jdoe"), "https://linkedin.com/in/jdoe");
        assert_eq!(social_url(SocialPlatform::Instagram, "  "), "");
    }

    #[test]
    fn photo_names_are_sanitized() {
        assert_eq!(photo_file_name("Shri A. B. Singh"), "Shri_A._B._Singh.jpg");
        let long = "x".repeat(300);
        assert_eq!(photo_file_name(&long).len(), 124);
    }

    #[test]
    fn row_filter_rejects_junk_and_short_rows() {
        let filter = RowFilter::default();
        assert!(filter.accepts_cells(&["Lok Sabha 2019", "AMETHI", "INC", "0", "0", "Graduate", "Rs 1", "Rs 0"]));
        assert!(!filter.accepts_cells(&["Donate now", "2019", "x"]));
        assert!(!filter.accepts_cells(&["Lok Sabha", "AMETHI", "INC"]));
        assert!(!filter.accepts_cells(&["2019", "AMETHI"]));
        assert!(!filter.accepts_cells::<&str>(&[]));

        let ad = myneta("Download App", "Amethi");
        let real = myneta("Rahul Gandhi", "Raebareli").with("profile_url", "https://x/download");
        let kept = filter_records(vec![ad, real.clone()], &filter);
        assert_eq!(kept, vec![real]);
    }

    #[test]
    fn matched_rows_carry_both_sides() {
        let a = vec![myneta("Rahul Gandhi", "Wayanad")];
        let b = vec![sansad("Shri Rahul Gandhi", "WAYANAD ")];
        let merged = merge(&a, &b, constituency_key);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].secondary(), Provenance::Matched);
        assert_eq!(merged[0].field("myneta_candidate"), "Rahul Gandhi");
        assert_eq!(merged[0].field("sansad_name"), "Shri Rahul Gandhi");
        assert_eq!(merged[0].key().as_str(), "WAYANAD");
    }

    #[test]
    fn unmatched_rows_get_empty_secondary_fields() {
        let a = vec![myneta("Someone", "Nowhere")];
        let b = vec![sansad("Other", "Elsewhere").with("email", "x@y.in")];
        let (merged, report) = merge_with_report(&a, &b, constituency_key);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].secondary(), Provenance::Unmatched);
        assert_eq!(merged[0].field("sansad_name"), "");
        assert!(merged[0].fields().contains_key("sansad_email"));
        assert_eq!(report.matched, 0);
        assert_eq!(report.orphaned_keys, vec![normalize_constituency("ELSEWHERE")]);
    }

    #[test]
    fn duplicate_secondary_keys_keep_the_later_record() {
        let a = vec![myneta("Candidate", "Amethi")];
        let b = vec![sansad("First", "Amethi"), sansad("Second", "AMETHI (SC)")];
        let (merged, report) = merge_with_report(&a, &b, constituency_key);
        assert_eq!(merged[0].field("sansad_name"), "Second");
        assert_eq!(report.duplicate_keys, vec![normalize_constituency("Amethi")]);
    }

    #[test]
    fn unknown_keys_never_match_and_order_is_stable() {
        let a = vec![myneta("One", "B"), myneta("Blank", ""), myneta("Two", "A")];
        let b = vec![sansad("Empty", ""), sansad("A-side", "a"), sansad("B-side", "b")];
        let merged = merge(&a, &b, constituency_key);
        let names = merged
            .iter()
            .map(|m| m.field("myneta_candidate"))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["One", "Blank", "Two"]);
        assert_eq!(merged[1].secondary(), Provenance::Unmatched);
        assert_eq!(merged[1].field("sansad_name"), "");
        assert_eq!(merged[2].field("sansad_name"), "A-side");
    }

    #[test]
    fn colliding_field_names_are_reprefixed() {
        let a = vec![RawRecord::from_prefixed(
            Source::Myneta,
            [("constituency", "AMETHI"), ("shared", "primary")],
        )];
        let b = vec![RawRecord::from_prefixed(
            Source::Sansad,
            [("constituency", "AMETHI"), ("shared", "secondary")],
        )];
        let merged = merge(&a, &b, |r| normalize_constituency(&r.fields()["constituency"]));
        assert_eq!(merged[0].field("shared"), "primary");
        assert_eq!(merged[0].field("sansad_shared"), "secondary");
    }

    #[test]
    fn colliding_names_give_matched_and_unmatched_rows_the_same_columns() {
        let a = vec![
            RawRecord::from_prefixed(Source::Myneta, [("constituency", "AMETHI"), ("shared", "p1")]),
            RawRecord::from_prefixed(Source::Myneta, [("constituency", "NOWHERE"), ("shared", "p2")]),
        ];
        let b = vec![RawRecord::from_prefixed(
            Source::Sansad,
            [("constituency", "AMETHI"), ("shared", "s")],
        )];
        let merged = merge(&a, &b, |r| normalize_constituency(&r.fields()["constituency"]));
        let keys = |m: &MergedRecord| m.fields().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys(&merged[0]), keys(&merged[1]));
        assert_eq!(merged[1].secondary(), Provenance::Unmatched);
        assert_eq!(merged[1].field("shared"), "p2");
        assert_eq!(merged[1].field("sansad_shared"), "");
        assert_eq!(merged[1].field("sansad_constituency"), "");
    }

    #[test]
    fn duplicate_statistics_ids_keep_the_later_record_and_are_reported() {
        let a = vec![myneta("One", "Amethi")];
        let b = vec![sansad("One", "Amethi").with("id", "101")];
        let stats = vec![
            RawRecord::new(Source::EmpoweredIndian).with("mp_id", "101").with("attendance", "50"),
            RawRecord::new(Source::EmpoweredIndian).with("mp_id", " 101").with("attendance", "75"),
            RawRecord::new(Source::EmpoweredIndian).with("mp_id", "202").with("attendance", "90"),
        ];
        let (merged, duplicates) =
            attach_by_id_with_duplicates(merge(&a, &b, constituency_key), &stats, "sansad_id", "ei_mp_id");
        assert_eq!(merged[0].field("ei_attendance"), "75");
        assert_eq!(duplicates, vec!["101".to_string()]);
    }

    #[test]
    fn statistics_attach_on_member_id() {
        let a = vec![myneta("One", "Amethi"), myneta("Two", "Wayanad")];
        let b = vec![
            sansad("One", "Amethi").with("id", "101"),
            sansad("Two", "Wayanad").with("id", "202"),
        ];
        let stats = vec![RawRecord::new(Source::EmpoweredIndian)
            .with("mp_id", " 202 ")
            .with("attendance", "88")];
        let merged = attach_by_id(merge(&a, &b, constituency_key), &stats, "sansad_id", "ei_mp_id");
        assert_eq!(merged[0].supplementary(), Some(Provenance::Unmatched));
        assert_eq!(merged[0].field("ei_attendance"), "");
        assert_eq!(merged[1].supplementary(), Some(Provenance::Matched));
        assert_eq!(merged[1].field("ei_attendance"), "88");
        assert_eq!(merged[1].secondary(), Provenance::Matched);
    }
}
