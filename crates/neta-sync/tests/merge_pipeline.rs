use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use neta_adapters::{SansadConfig, MYNETA_WINNERS_URL, SANSAD_MINISTERS_URL};
use neta_core::{normalize_constituency, RowFilter};
use neta_storage::FixtureFetcher;
use neta_sync::{MergePipeline, SyncConfig};
use tempfile::tempdir;

fn fixture(rel: &str) -> Vec<u8> {
    let path: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures").join(rel);
    fs::read(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

fn fixture_fetcher(page_size: u32) -> FixtureFetcher {
    let sansad = SansadConfig {
        page_size,
        ..SansadConfig::default()
    };
    FixtureFetcher::new()
        .with_page(MYNETA_WINNERS_URL, fixture("myneta/winners.html"))
        .with_page(
            "https://www.myneta.info/LokSabha2024/candidate.php?candidate_id=101",
            fixture("myneta/profile_101.html"),
        )
        .with_page(
            "https://www.myneta.info/compare_profile.php?group_id=rahul-gandhi-101",
            fixture("myneta/compare_101.html"),
        )
        .with_page(SANSAD_MINISTERS_URL, fixture("sansad/ministers.html"))
        .with_page(
            sansad.members_page_url(1).unwrap().to_string(),
            fixture("sansad/members_page1.json"),
        )
        .with_page(
            sansad.members_page_url(2).unwrap().to_string(),
            fixture("sansad/members_page2.json"),
        )
        .with_page(
            "https://sansad.in/api_ls/member/5001?locale=en",
            fixture("sansad/member_5001.json"),
        )
        .with_page(
            "https://sansad.in/api_ls/member/positionHeld?mpCode=5002&locale=en",
            fixture("sansad/position_5002.json"),
        )
        .with_page(
            "https://sansad.in/getFile/photo/5001.jpg",
            b"\xff\xd8\xff\xe0fake-jpeg".to_vec(),
        )
        .with_page(
            "https://stats.test/mps/5001",
            fixture("empowered-indian/member_5001.json"),
        )
}

fn config_in(root: &Path) -> SyncConfig {
    SyncConfig {
        output_csv: root.join("combined.csv"),
        photo_dir: root.join("photos"),
        reports_dir: root.join("reports"),
        rules_file: root.join("missing-rules.yaml"),
        page_size: 2,
        request_interval_ms: 0,
        empowered_indian_url: Some("https://stats.test/mps/{id}".to_string()),
        ..SyncConfig::default()
    }
}

fn read_rows(path: &Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).expect("open merged csv");
    let headers = reader.headers().expect("headers").clone();
    reader
        .records()
        .map(|r| {
            let record = r.expect("row");
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn full_run_writes_csv_photos_and_reports() {
    let dir = tempdir().expect("tempdir");
    let config = config_in(dir.path());
    let pipeline = MergePipeline::with_fetcher(config.clone(), Arc::new(fixture_fetcher(2)));

    let summary = pipeline.run_once().await.expect("run");

    assert_eq!(summary.myneta_records, 5);
    assert_eq!(summary.filtered_out, 1);
    assert_eq!(summary.sansad_records, 4);
    assert_eq!(summary.statistics_records, Some(1));
    assert_eq!(summary.photos_downloaded, 1);
    assert_eq!(summary.photo_failures, 1);
    assert_eq!(summary.report.total, 4);
    assert_eq!(summary.report.matched, 3);
    assert_eq!(
        summary.report.unmatched_keys,
        vec![normalize_constituency("Chandani Chowk")]
    );
    assert_eq!(
        summary.report.orphaned_keys,
        vec![normalize_constituency("Chandni Chowk")]
    );
    assert_eq!(summary.near_misses.len(), 1);
    assert!(summary.duplicate_statistics_ids.is_empty());

    let rows = read_rows(&config.output_csv);
    assert_eq!(rows.len(), 4);
    let candidates = rows
        .iter()
        .map(|r| r["myneta_candidate"].as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        candidates,
        vec!["Rahul Gandhi", "Shashi Tharoor", "Kishori Lal", "Praveen Khandelwal"]
    );

    let rahul = &rows[0];
    assert_eq!(rahul["sansad_match"], "matched");
    assert_eq!(rahul["sansad_id"], "5001");
    assert_eq!(rahul["sansad_photo_file"], "Shri_Rahul_Gandhi.jpg");
    assert_eq!(rahul["ei_match"], "matched");
    assert_eq!(rahul["ei_questions_asked"], "97");
    assert_eq!(rahul["myneta_total_assets_crore"], "20.40");

    let tharoor = &rows[1];
    assert_eq!(tharoor["sansad_position"], "Minister of State");
    assert_eq!(tharoor["ei_match"], "unmatched");
    assert_eq!(tharoor["ei_questions_asked"], "");

    assert_eq!(rows[2]["sansad_photo_file"], "");
    assert_eq!(rows[3]["sansad_match"], "unmatched");
    assert_eq!(rows[3]["sansad_name"], "");

    let photo = config.photo_dir.join("Shri_Rahul_Gandhi.jpg");
    assert_eq!(fs::read(photo).expect("photo"), b"\xff\xd8\xff\xe0fake-jpeg");

    let reports_dir = PathBuf::from(&summary.reports_dir);
    let written: serde_json::Value =
        serde_json::from_slice(&fs::read(reports_dir.join("summary.json")).expect("summary"))
            .expect("summary json");
    assert_eq!(written["report"]["matched"], 3);
    assert_eq!(written["near_misses"][0]["orphan"], "CHANDNI CHOWK");

    let manifest: serde_json::Value =
        serde_json::from_slice(&fs::read(&summary.parquet_manifest).expect("manifest"))
            .expect("manifest json");
    assert_eq!(manifest["files"][0]["rows"], 4);
    assert!(reports_dir.join("snapshots/merged.parquet").exists());
}

#[tokio::test]
async fn photos_and_statistics_can_be_switched_off() {
    let dir = tempdir().expect("tempdir");
    let config = SyncConfig {
        download_photos: false,
        empowered_indian_url: None,
        ..config_in(dir.path())
    };
    let pipeline = MergePipeline::with_fetcher(config.clone(), Arc::new(fixture_fetcher(2)))
        .with_row_filter(RowFilter {
            junk_tokens: Vec::new(),
            ..RowFilter::default()
        });

    let summary = pipeline.run_once().await.expect("run");
    assert_eq!(summary.filtered_out, 0);
    assert_eq!(summary.report.total, 5);
    assert_eq!(summary.photos_downloaded, 0);
    assert_eq!(summary.statistics_records, None);

    let rows = read_rows(&config.output_csv);
    assert!(rows.iter().all(|r| !r.contains_key("ei_match")));
    assert!(rows.iter().all(|r| r["sansad_photo_file"].is_empty()));
    assert!(!config.photo_dir.exists());
}

#[tokio::test]
async fn unreachable_winners_page_fails_the_run() {
    let dir = tempdir().expect("tempdir");
    let pipeline = MergePipeline::with_fetcher(config_in(dir.path()), Arc::new(FixtureFetcher::new()));
    let err = pipeline.run_once().await.unwrap_err();
    assert!(format!("{err:#}").contains("myneta"));
    assert!(!dir.path().join("combined.csv").exists());
}
