use std::fs;
use std::path::{Path, PathBuf};

use neta_adapters::{
    AdapterContext, Crawlability, EmpoweredIndianAdapter, EmpoweredIndianConfig, MynetaAdapter,
    MynetaConfig, SansadAdapter, SansadConfig, SourceAdapter, SANSAD_MINISTERS_URL,
};
use neta_core::{RowFilter, Source};
use neta_storage::FixtureFetcher;
use uuid::Uuid;

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
}

fn fixture(rel: &str) -> Vec<u8> {
    fs::read(fixtures_dir().join(rel)).expect("read fixture")
}

fn ctx(profile_limit: Option<usize>) -> AdapterContext {
    AdapterContext {
        run_id: Uuid::nil(),
        profile_limit,
    }
}

fn myneta_fetcher(config: &MynetaConfig) -> FixtureFetcher {
    FixtureFetcher::new()
        .with_page(config.winners_url.clone(), fixture("myneta/winners.html"))
        .with_page(
            "https://www.myneta.info/LokSabha2024/candidate.php?candidate_id=101",
            fixture("myneta/profile_101.html"),
        )
        .with_page(
            "https://www.myneta.info/compare_profile.php?group_id=rahul-gandhi-101",
            fixture("myneta/compare_101.html"),
        )
}

#[tokio::test]
async fn myneta_collect_follows_profiles_and_tolerates_failures() {
    let config = MynetaConfig::default();
    let fetcher = myneta_fetcher(&config);
    let adapter = MynetaAdapter::new(config, RowFilter::default());
    assert_eq!(adapter.crawlability(), Crawlability::PublicHtml);

    let records = adapter.collect(&fetcher, &ctx(None)).await.expect("collect");
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.source() == Source::Myneta));

    let rahul = &records[0];
    assert_eq!(rahul.field("constituency"), "RAE BARELI");
    assert_eq!(rahul.field("total_assets_crore"), "20.40");
    assert_eq!(rahul.field("liabilities_crore"), "0.50");
    assert!(rahul.field("photo_url").ends_with("/LokSabha2024/images_candidate/mynetai_ews/101.jpg"));
    let elections: serde_json::Value =
        serde_json::from_str(rahul.field("other_elections")).expect("elections json");
    assert_eq!(elections.as_array().map(Vec::len), Some(2));

    // 102 has no fixture: the profile fails and the row survives with empty details.
    let tharoor = &records[1];
    assert_eq!(tharoor.field("candidate"), "Shashi Tharoor");
    assert_eq!(tharoor.field("photo_url"), "");
    assert_eq!(tharoor.field("other_elections"), "[]");
    assert_eq!(tharoor.field("liabilities_crore"), "0.00");
}

#[tokio::test]
async fn profile_limit_caps_profile_visits() {
    let config = MynetaConfig::default();
    let fetcher = myneta_fetcher(&config);
    let winners_url = config.winners_url.clone();
    let adapter = MynetaAdapter::new(config, RowFilter::default());

    let records = adapter.collect(&fetcher, &ctx(Some(0))).await.expect("collect");
    assert_eq!(records.len(), 5);
    assert_eq!(fetcher.requested_urls(), vec![winners_url]);
}

fn sansad_fetcher(config: &SansadConfig) -> FixtureFetcher {
    FixtureFetcher::new()
        .with_page(SANSAD_MINISTERS_URL, fixture("sansad/ministers.html"))
        .with_page(
            config.members_page_url(1).unwrap().to_string(),
            fixture("sansad/members_page1.json"),
        )
        .with_page(
            config.members_page_url(2).unwrap().to_string(),
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
}

#[tokio::test]
async fn sansad_collect_pages_through_members() {
    let config = SansadConfig {
        page_size: 2,
        ..SansadConfig::default()
    };
    let fetcher = sansad_fetcher(&config);
    let adapter = SansadAdapter::new(config);

    let records = adapter.collect(&fetcher, &ctx(None)).await.expect("collect");
    let ids = records.iter().map(|r| r.field("id")).collect::<Vec<_>>();
    assert_eq!(ids, vec!["5001", "5002", "5003", "5004"]);

    assert_eq!(records[0].field("dob"), "19/06/1970");
    assert_eq!(
        records[0].field("profile_url"),
        "https://sansad.in/ls/members/biographyM/5001?from=members"
    );
    assert_eq!(records[1].field("position"), "Minister of State");
    assert_eq!(
        records[1].field("position_detail"),
        "Chairperson, Committee on External Affairs"
    );
    assert_eq!(records[2].field("email"), "");
    assert_eq!(records[3].field("email"), "praveen.khandelwal@sansad.nic.in");
    assert_eq!(records[3].field("constituency"), "CHANDNI CHOWK");
}

#[tokio::test]
async fn sansad_state_filter_skips_other_states() {
    let config = SansadConfig {
        page_size: 2,
        state: Some("uttar pradesh".to_string()),
        fetch_details: false,
        ..SansadConfig::default()
    };
    let fetcher = sansad_fetcher(&config);
    let adapter = SansadAdapter::new(config);

    let records = adapter.collect(&fetcher, &ctx(None)).await.expect("collect");
    let names = records.iter().map(|r| r.field("name")).collect::<Vec<_>>();
    assert_eq!(names, vec!["Shri Rahul Gandhi", "Shri Kishori Lal"]);
    assert!(!fetcher
        .requested_urls()
        .iter()
        .any(|url| url.contains("/member/5001?")));
}

#[tokio::test]
async fn missing_members_page_is_fatal() {
    let adapter = SansadAdapter::new(SansadConfig::default());
    let fetcher = FixtureFetcher::new();
    assert!(adapter.collect(&fetcher, &ctx(None)).await.is_err());
}

#[tokio::test]
async fn statistics_skip_members_without_data() {
    let fetcher = FixtureFetcher::new().with_page(
        "https://stats.test/mps/5001",
        fixture("empowered-indian/member_5001.json"),
    );
    let adapter = EmpoweredIndianAdapter::new(
        EmpoweredIndianConfig {
            member_url: "https://stats.test/mps/{id}".to_string(),
        },
        vec!["5001".to_string(), "5002".to_string(), " ".to_string()],
    );

    let records = adapter.collect(&fetcher, &ctx(None)).await.expect("collect");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].field("mp_id"), "5001");
    assert_eq!(records[0].field("questions_asked"), "97");
    assert_eq!(fetcher.requested_urls().len(), 2);
}
