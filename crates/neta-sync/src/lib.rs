//! Merge pipeline: collect the three sources, join them, write CSV + photos + reports.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use chrono::{DateTime, Utc};
use neta_adapters::{
    AdapterContext, EmpoweredIndianAdapter, EmpoweredIndianConfig, MynetaAdapter, MynetaConfig,
    SansadAdapter, SansadConfig, SourceAdapter, MYNETA_WINNERS_URL, SANSAD_MEMBERS_URL,
};
use neta_core::{
    attach_by_id_with_duplicates, constituency_key, filter_records, merge_with_report, photo_file_name,
    MergeReport, MergedRecord, NormalizedKey, RawRecord, RowFilter,
};
use neta_storage::{HttpClientConfig, HttpFetcher, PageFetcher, PhotoStore, TokenBucketConfig};
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use sha2::{Digest, Sha256};
use strsim::jaro_winkler;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "neta-sync";

/// Unmatched/orphan key pairs at or above this similarity are reported as near misses.
pub const NEAR_MISS_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub output_csv: PathBuf,
    pub photo_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub rules_file: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub request_interval_ms: u64,
    pub page_size: u32,
    pub state: Option<String>,
    pub profile_limit: Option<usize>,
    pub download_photos: bool,
    pub loksabha: u32,
    pub myneta_winners_url: String,
    pub sansad_members_url: String,
    /// Statistics endpoint with `{id}`; the third source is skipped when unset.
    pub empowered_indian_url: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            output_csv: non_empty("NETA_OUTPUT_CSV")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("combined_myneta_sansad.csv")),
            photo_dir: non_empty("NETA_PHOTO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("mp_photos_sansad")),
            reports_dir: non_empty("NETA_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("reports")),
            rules_file: non_empty("NETA_RULES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("rules/row_filter.yaml")),
            user_agent: non_empty("NETA_USER_AGENT").unwrap_or_else(|| "neta-bot/0.1".to_string()),
            http_timeout_secs: non_empty("NETA_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            request_interval_ms: non_empty("NETA_REQUEST_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
            page_size: non_empty("NETA_PAGE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            state: non_empty("NETA_STATE"),
            profile_limit: non_empty("NETA_PROFILE_LIMIT").and_then(|v| v.parse().ok()),
            download_photos: non_empty("NETA_DOWNLOAD_PHOTOS")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            loksabha: non_empty("NETA_LOKSABHA")
                .and_then(|v| v.parse().ok())
                .unwrap_or(18),
            myneta_winners_url: non_empty("NETA_MYNETA_WINNERS_URL")
                .unwrap_or_else(|| MYNETA_WINNERS_URL.to_string()),
            sansad_members_url: non_empty("NETA_SANSAD_MEMBERS_URL")
                .unwrap_or_else(|| SANSAD_MEMBERS_URL.to_string()),
            empowered_indian_url: non_empty("NETA_EMPOWERED_INDIAN_URL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearMiss {
    pub unmatched: NormalizedKey,
    pub orphan: NormalizedKey,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub myneta_records: usize,
    pub filtered_out: usize,
    pub sansad_records: usize,
    pub statistics_records: Option<usize>,
    pub photos_downloaded: usize,
    pub photo_failures: usize,
    pub report: MergeReport,
    /// Statistics ids returned more than once; the later record was joined.
    pub duplicate_statistics_ids: Vec<String>,
    pub near_misses: Vec<NearMiss>,
    pub output_csv: String,
    pub reports_dir: String,
    pub parquet_manifest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParquetManifest {
    pub schema_version: u32,
    pub files: Vec<ParquetManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParquetManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
    pub rows: usize,
}

/// Row filter rules from YAML. A missing file means the built-in defaults.
pub fn load_row_filter(path: &Path) -> Result<RowFilter> {
    if !path.exists() {
        return Ok(RowFilter::default());
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Output row: record fields plus `sansad_match` and, after the statistics join, `ei_match`.
pub fn merged_row(record: &MergedRecord) -> BTreeMap<String, String> {
    let mut row = record.fields().clone();
    row.insert("sansad_match".to_string(), record.secondary().as_str().to_string());
    if let Some(supplementary) = record.supplementary() {
        row.insert("ei_match".to_string(), supplementary.as_str().to_string());
    }
    row
}

pub fn csv_headers(rows: &[BTreeMap<String, String>]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Writes rows under the sorted union of their columns; missing cells are empty.
pub fn write_merged_csv(path: &Path, rows: &[BTreeMap<String, String>]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let headers = csv_headers(rows);
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(&headers)
        .with_context(|| format!("writing header to {}", path.display()))?;
    for row in rows {
        writer
            .write_record(
                headers
                    .iter()
                    .map(|h| row.get(h).map(String::as_str).unwrap_or_default()),
            )
            .with_context(|| format!("writing row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

/// Pairs each unmatched primary key with its closest orphaned secondary key.
pub fn near_misses(
    unmatched: &[NormalizedKey],
    orphaned: &[NormalizedKey],
    threshold: f64,
) -> Vec<NearMiss> {
    unmatched
        .iter()
        .filter(|key| !key.is_unknown())
        .filter_map(|key| {
            orphaned
                .iter()
                .map(|orphan| (orphan, jaro_winkler(key.as_str(), orphan.as_str())))
                .filter(|(_, score)| *score >= threshold)
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(orphan, score)| NearMiss {
                    unmatched: key.clone(),
                    orphan: orphan.clone(),
                    score,
                })
        })
        .collect()
}

pub struct MergePipeline {
    config: SyncConfig,
    fetcher: Arc<dyn PageFetcher>,
    photo_store: PhotoStore,
    row_filter: Option<RowFilter>,
}

impl MergePipeline {
    pub fn new(config: SyncConfig) -> Result<Self> {
        let token_bucket = (config.request_interval_ms > 0).then(|| TokenBucketConfig {
            capacity: 1,
            refill_every: Duration::from_millis(config.request_interval_ms),
        });
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
            token_bucket,
            ..Default::default()
        })?;
        Ok(Self::with_fetcher(config, Arc::new(http)))
    }

    pub fn with_fetcher(config: SyncConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        let photo_store = PhotoStore::new(config.photo_dir.clone());
        Self {
            config,
            fetcher,
            photo_store,
            row_filter: None,
        }
    }

    /// Uses `filter` instead of the rules file.
    pub fn with_row_filter(mut self, filter: RowFilter) -> Self {
        self.row_filter = Some(filter);
        self
    }

    pub async fn run_once(&self) -> Result<MergeRunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let ctx = AdapterContext {
            run_id,
            profile_limit: self.config.profile_limit,
        };
        let fetcher = self.fetcher.as_ref();

        let row_filter = match &self.row_filter {
            Some(filter) => filter.clone(),
            None => load_row_filter(&self.config.rules_file)?,
        };

        let myneta = MynetaAdapter::new(
            MynetaConfig {
                winners_url: self.config.myneta_winners_url.clone(),
                ..MynetaConfig::default()
            },
            row_filter.clone(),
        )
        .collect(fetcher, &ctx)
        .await
        .context("collecting myneta winners")?;
        let myneta_records = myneta.len();
        let myneta = filter_records(myneta, &row_filter);
        let filtered_out = myneta_records - myneta.len();

        let sansad = SansadAdapter::new(SansadConfig {
            members_url: self.config.sansad_members_url.clone(),
            loksabha: self.config.loksabha,
            page_size: self.config.page_size,
            state: self.config.state.clone(),
            ..SansadConfig::default()
        })
        .collect(fetcher, &ctx)
        .await
        .context("collecting sansad members")?;
        let sansad_records = sansad.len();

        let (sansad, photos_downloaded, photo_failures) = self.attach_photos(sansad).await;

        let statistics = match &self.config.empowered_indian_url {
            Some(member_url) => {
                let member_ids = sansad
                    .iter()
                    .map(|r| r.field("id").to_string())
                    .collect::<Vec<_>>();
                let records = EmpoweredIndianAdapter::new(
                    EmpoweredIndianConfig {
                        member_url: member_url.clone(),
                    },
                    member_ids,
                )
                .collect(fetcher, &ctx)
                .await
                .context("collecting member statistics")?;
                Some(records)
            }
            None => None,
        };

        let (merged, report) = merge_with_report(&myneta, &sansad, constituency_key);
        let (merged, duplicate_statistics_ids) = match &statistics {
            Some(stats) => attach_by_id_with_duplicates(merged, stats, "sansad_id", "ei_mp_id"),
            None => (merged, Vec::new()),
        };
        for id in &duplicate_statistics_ids {
            warn!(%run_id, mp_id = %id, "duplicate statistics record, later one kept");
        }
        info!(
            %run_id,
            matched = report.matched,
            total = report.total,
            orphans = report.orphaned_keys.len(),
            duplicates = report.duplicate_keys.len(),
            "constituency join finished"
        );

        let rows = merged.iter().map(merged_row).collect::<Vec<_>>();
        write_merged_csv(&self.config.output_csv, &rows)?;
        info!(path = %self.config.output_csv.display(), rows = rows.len(), "merged csv written");

        let near_misses = near_misses(&report.unmatched_keys, &report.orphaned_keys, NEAR_MISS_THRESHOLD);

        let reports_dir = self.config.reports_dir.join(run_id.to_string());
        fs::create_dir_all(&reports_dir)
            .await
            .with_context(|| format!("creating {}", reports_dir.display()))?;
        let manifest_path = self.export_parquet_snapshot(&reports_dir, &merged, &rows).await?;

        let summary = MergeRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            myneta_records,
            filtered_out,
            sansad_records,
            statistics_records: statistics.as_ref().map(Vec::len),
            photos_downloaded,
            photo_failures,
            report,
            duplicate_statistics_ids,
            near_misses,
            output_csv: self.config.output_csv.display().to_string(),
            reports_dir: reports_dir.display().to_string(),
            parquet_manifest: manifest_path.display().to_string(),
        };
        let summary_json = serde_json::to_vec_pretty(&summary).context("serializing run summary")?;
        fs::write(reports_dir.join("summary.json"), summary_json)
            .await
            .context("writing summary.json")?;

        Ok(summary)
    }

    /// Sets `photo_file` on every Sansad record. Failed downloads leave it empty.
    async fn attach_photos(&self, records: Vec<RawRecord>) -> (Vec<RawRecord>, usize, usize) {
        let mut downloaded = 0usize;
        let mut failures = 0usize;
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let photo_url = record.field("photo_url").to_string();
            if !self.config.download_photos || photo_url.is_empty() {
                out.push(record.with("photo_file", ""));
                continue;
            }
            let file_name = photo_file_name(record.field("name"));
            match self
                .photo_store
                .download(self.fetcher.as_ref(), &photo_url, &file_name)
                .await
            {
                Ok(stored) => {
                    downloaded += 1;
                    out.push(record.with("photo_file", stored.file_name));
                }
                Err(err) => {
                    failures += 1;
                    warn!(member = record.field("name"), error = %err, "could not download photo");
                    out.push(record.with("photo_file", ""));
                }
            }
        }
        (out, downloaded, failures)
    }

    async fn export_parquet_snapshot(
        &self,
        reports_dir: &Path,
        merged: &[MergedRecord],
        rows: &[BTreeMap<String, String>],
    ) -> Result<PathBuf> {
        let snapshot_dir = reports_dir.join("snapshots");
        fs::create_dir_all(&snapshot_dir)
            .await
            .with_context(|| format!("creating {}", snapshot_dir.display()))?;

        let merged_path = snapshot_dir.join("merged.parquet");
        write_merged_parquet(&merged_path, merged, rows)?;

        let manifest = ParquetManifest {
            schema_version: 1,
            files: vec![manifest_entry("merged", reports_dir, &merged_path, rows.len())?],
        };
        let manifest_path = snapshot_dir.join("manifest.json");
        let bytes = serde_json::to_vec_pretty(&manifest).context("serializing parquet manifest")?;
        fs::write(&manifest_path, bytes)
            .await
            .with_context(|| format!("writing {}", manifest_path.display()))?;
        Ok(manifest_path)
    }
}

pub async fn run_merge_once_from_env() -> Result<MergeRunSummary> {
    let pipeline = MergePipeline::new(SyncConfig::from_env())?;
    pipeline.run_once().await
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

/// One utf8 column per CSV column, led by the normalized join key.
fn write_merged_parquet(
    path: &Path,
    merged: &[MergedRecord],
    rows: &[BTreeMap<String, String>],
) -> Result<()> {
    let headers = csv_headers(rows);
    let mut fields = vec![ArrowField::new("join_key", DataType::Utf8, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
        merged.iter().map(|m| m.key().as_str()).collect::<Vec<_>>(),
    ))];
    for header in &headers {
        fields.push(ArrowField::new(header.as_str(), DataType::Utf8, false));
        columns.push(Arc::new(StringArray::from(
            rows.iter()
                .map(|row| row.get(header).map(String::as_str).unwrap_or_default())
                .collect::<Vec<_>>(),
        )));
    }
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building merged record batch")?;
    write_parquet(path, batch)
}

fn manifest_entry(name: &str, reports_dir: &Path, path: &Path, rows: usize) -> Result<ParquetManifestFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = hex::encode(hasher.finalize());
    let rel = path
        .strip_prefix(reports_dir)
        .unwrap_or(path)
        .display()
        .to_string();
    Ok(ParquetManifestFile {
        name: name.to_string(),
        path: rel,
        sha256,
        bytes: bytes.len() as u64,
        rows,
    })
}
