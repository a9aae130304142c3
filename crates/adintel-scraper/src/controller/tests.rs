use std::time::Duration;

use adintel_core::{DemographicSample, RegionShare};
use serde_json::json;

use super::*;
use crate::testing::{response, test_config, FakeSession, ScriptedFactory};

const DETAIL_TEXT: &str = "Reach\n900\nLocation\nAge Range\nGender\nReach\nSweden\n25-34\nWomen\n600\nSweden\n35-44\nMen\n300\n";

fn ad_json(id: u32, impressions: &str) -> serde_json::Value {
    json!({
        "ad_archive_id": id.to_string(),
        "page_id": "42",
        "page_name": "Acme Spirits",
        "start_date": 1_717_200_000,
        "is_active": true,
        "impressions_with_index": { "impressions_text": impressions },
        "snapshot": {
            "title": format!("Gin {id}"),
            "display_format": "IMAGE",
            "link_url": "https://acme.example/gin"
        }
    })
}

fn listing(ads: &[(u32, &str)]) -> String {
    let edges: Vec<serde_json::Value> = ads
        .iter()
        .map(|(id, imp)| json!({ "node": { "collated_results": [ad_json(*id, imp)] } }))
        .collect();
    json!({ "data": { "ad_library_main": { "search_results_connection": { "edges": edges } } } })
        .to_string()
}

fn pool_with(session: FakeSession) -> Arc<SessionPool<ScriptedFactory>> {
    Arc::new(SessionPool::new(ScriptedFactory::with(session)))
}

fn browser_acquisition(pool: &Arc<SessionPool<ScriptedFactory>>) -> Acquisition<ScriptedFactory> {
    Acquisition::browser(Arc::clone(pool), &test_config()).with_scraper(
        DemographicScraper::new("https://library.test/").with_settle(Duration::ZERO),
    )
}

/// Hands a fixed creative list to the harvest.
struct StaticStrategy {
    creatives: Vec<Creative>,
}

#[async_trait]
impl AcquisitionStrategy for StaticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Api
    }

    async fn discover(
        &self,
        _page: &PageRef,
        _options: &AcquireOptions,
        harvest: &mut Harvest,
    ) -> Result<(), ScraperError> {
        for creative in &self.creatives {
            harvest.accumulator.record_creative(creative.clone());
        }
        Ok(())
    }

    async fn teardown(&self) {}
}

#[tokio::test]
async fn invalid_reference_fails_before_any_io() {
    let pool = pool_with(FakeSession::default());
    let acquisition = browser_acquisition(&pool);

    let err = acquisition
        .acquire("https://example.com/not-a-page", &AcquireOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::InvalidReference(_)));
    assert!(!pool.is_open().await);
}

#[tokio::test]
async fn browser_discovery_merges_listener_and_document_links() {
    let mut session = FakeSession::with_batches(vec![vec![response(&listing(&[
        (1, "1K-5K"),
        (2, "10K-50K"),
    ]))]]);
    session.dom_links = vec![
        json!({ "url": "https://l.facebook.com/l.php?u=https%3A%2F%2Facme.example%2Fgin", "id": "1" }),
        json!({ "url": "https://acme.example/tonic", "id": null }),
        json!({ "url": "https://www.facebook.com/help", "id": null }),
    ];
    let pool = pool_with(session);
    let acquisition = browser_acquisition(&pool);

    let result = acquisition
        .acquire("42", &AcquireOptions::default())
        .await
        .unwrap();

    assert_eq!(result.page_id, "42");
    assert_eq!(result.page_name.as_deref(), Some("Acme Spirits"));
    assert_eq!(result.strategy, StrategyKind::Browser);
    assert!(result.complete);
    assert_eq!(result.total_found, 2);
    let ids: Vec<&str> = result.creatives.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);

    assert_eq!(result.landing_pages[0].url, "https://acme.example/gin");
    assert_eq!(result.landing_pages[0].occurrences, 3);
    assert_eq!(result.landing_pages[0].creative_ids, vec!["1", "2"]);
    assert_eq!(result.landing_pages.len(), 2);
    assert!(result.creatives.iter().all(|c| !c.demographics.was_attempted()));

    let session = pool.lease().await.unwrap();
    assert!(session.navigations[0].contains("view_all_page_id=42"));
}

#[tokio::test]
async fn results_are_truncated_to_the_limit() {
    let ads: Vec<(u32, &str)> = (1..=5).map(|i| (i, "1K-5K")).collect();
    let pool = pool_with(FakeSession::with_batches(vec![vec![response(&listing(&ads))]]));
    let options = AcquireOptions {
        limit: 2,
        ..AcquireOptions::default()
    };

    let result = browser_acquisition(&pool).acquire("42", &options).await.unwrap();

    assert_eq!(result.creatives.len(), 2);
    assert_eq!(result.total_found, 5);
}

#[tokio::test]
async fn enrichment_targets_the_top_performer_only() {
    let mut session = FakeSession::with_batches(vec![vec![response(&listing(&[
        (1, "1K-5K"),
        (2, "10K-50K"),
        (3, "<1K"),
    ]))]]);
    session.text_by_url.insert("id=2".to_owned(), DETAIL_TEXT.to_owned());
    session.clickable = vec!["See ad details".to_owned()];
    let pool = pool_with(session);
    let options = AcquireOptions {
        enrich: true,
        enrich_max: 1,
        ..AcquireOptions::default()
    };

    let result = browser_acquisition(&pool).acquire("42", &options).await.unwrap();

    assert_eq!(result.enrichment.selected, 1);
    assert_eq!(result.enrichment.enriched, 1);
    let top = result.creatives.iter().find(|c| c.id == "2").unwrap();
    let sample = top.sample().unwrap();
    assert_eq!(sample.regions[0].region, "SE");
    assert_eq!(sample.total_reach, Some(900));
    for other in result.creatives.iter().filter(|c| c.id != "2") {
        assert_eq!(other.demographics, Enrichment::NotAttempted);
    }
    assert!(pool
        .lease()
        .await
        .unwrap()
        .navigations
        .iter()
        .any(|u| u == "https://library.test/?id=2"));
}

#[tokio::test]
async fn empty_detail_view_marks_creative_unavailable() {
    let pool = pool_with(FakeSession::with_batches(vec![vec![response(&listing(&[(
        7, "1K-5K",
    )]))]]));
    let options = AcquireOptions {
        enrich: true,
        ..AcquireOptions::default()
    };

    let result = browser_acquisition(&pool).acquire("42", &options).await.unwrap();

    assert_eq!(result.enrichment.unavailable, 1);
    assert_eq!(result.creatives[0].demographics, Enrichment::Unavailable);
    assert!(result.complete);
}

#[tokio::test]
async fn failed_detail_navigation_does_not_fail_the_run() {
    let mut session = FakeSession::with_batches(vec![vec![response(&listing(&[
        (1, "1K-5K"),
        (2, "5K-10K"),
    ]))]]);
    session.fail_navigation_for = Some("?id=2".to_owned());
    session.text_by_url.insert("id=1".to_owned(), DETAIL_TEXT.to_owned());
    let pool = pool_with(session);
    let options = AcquireOptions {
        enrich: true,
        ..AcquireOptions::default()
    };

    let result = browser_acquisition(&pool).acquire("42", &options).await.unwrap();

    assert_eq!(result.enrichment.selected, 2);
    assert_eq!(result.enrichment.failed, 1);
    assert_eq!(result.enrichment.enriched, 1);
    let failed = result.creatives.iter().find(|c| c.id == "2").unwrap();
    assert_eq!(failed.demographics, Enrichment::Unavailable);
}

#[tokio::test]
async fn listing_navigation_failure_is_an_io_error() {
    let mut session = FakeSession::default();
    session.fail_navigation_for = Some("view_all_page_id".to_owned());
    let pool = pool_with(session);

    let err = browser_acquisition(&pool)
        .acquire("42", &AcquireOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "io");
}

#[tokio::test]
async fn deadline_returns_partial_result_and_tears_down() {
    let mut session = FakeSession::with_batches(vec![vec![response(&listing(&[(1, "1K-5K")]))]]);
    session.scroll_delay = Some(Duration::from_secs(5));
    let pool = pool_with(session);
    let acquisition =
        browser_acquisition(&pool).with_deadline(Some(Duration::from_millis(100)));

    let result = acquisition
        .acquire("42", &AcquireOptions::default())
        .await
        .unwrap();

    assert!(!result.complete);
    assert_eq!(result.creatives.len(), 1);
    assert!(!pool.is_open().await);
}

#[tokio::test]
async fn deadline_with_nothing_collected_is_an_error() {
    let mut session = FakeSession::default();
    session.scroll_delay = Some(Duration::from_secs(5));
    let pool = pool_with(session);
    let acquisition =
        browser_acquisition(&pool).with_deadline(Some(Duration::from_millis(50)));

    let outcome = acquisition.run("42", &AcquireOptions::default()).await;

    let AcquisitionOutcome::Failure(report) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(report.kind, "deadline_exceeded");
    assert!(!pool.is_open().await);
}

#[tokio::test]
async fn deadline_is_an_error_when_completeness_is_required() {
    let mut session = FakeSession::default();
    session.scroll_delay = Some(Duration::from_secs(5));
    let pool = pool_with(session);
    let acquisition = browser_acquisition(&pool)
        .with_deadline(Some(Duration::from_millis(50)))
        .require_complete(true);

    let err = acquisition
        .acquire("42", &AcquireOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::DeadlineExceeded { .. }));
}

#[tokio::test]
async fn creatives_with_api_samples_are_not_rescraped() {
    let mut with_sample = Creative::new("api", "42");
    with_sample.archive_id = Some("100".to_owned());
    with_sample.reach = 10_000;
    let mut sample = DemographicSample::new("100");
    sample.regions = vec![RegionShare {
        region: "DE".to_owned(),
        percentage: 100.0,
    }];
    with_sample.demographics = Enrichment::Sample(sample);

    let mut plain = Creative::new("plain", "42");
    plain.archive_id = Some("200".to_owned());

    let acquisition = Acquisition::<ScriptedFactory>::with_strategy(
        Box::new(StaticStrategy {
            creatives: vec![with_sample, plain],
        }),
        None,
        &test_config(),
    );
    let options = AcquireOptions {
        enrich: true,
        ..AcquireOptions::default()
    };

    let result = acquisition.acquire("42", &options).await.unwrap();

    assert_eq!(result.enrichment.from_api, 1);
    assert_eq!(result.enrichment.selected, 1);
    // No session pool: enrichment is skipped, not failed.
    assert_eq!(result.enrichment.enriched + result.enrichment.failed, 0);
    assert!(result.creatives[0].sample().is_some());
    assert_eq!(result.creatives[1].demographics, Enrichment::NotAttempted);
}

#[tokio::test]
async fn analytics_are_attached_when_requested() {
    let mut creative = Creative::new("1", "42");
    creative.reach = 1000;
    let acquisition = Acquisition::<ScriptedFactory>::with_strategy(
        Box::new(StaticStrategy {
            creatives: vec![creative],
        }),
        None,
        &test_config(),
    )
    .with_analysis(Some(AnalysisOptions::default()));

    let result = acquisition
        .acquire("42", &AcquireOptions::default())
        .await
        .unwrap();

    let analytics = result.analytics.unwrap();
    assert_eq!(analytics.demographics.contributing_creatives, 0);
    assert!(analytics.spend.creatives.is_empty());
}

#[tokio::test]
async fn outcome_serializes_as_tagged_failure() {
    let pool = pool_with(FakeSession::default());
    let outcome = browser_acquisition(&pool)
        .run("   ", &AcquireOptions::default())
        .await;

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "failure");
    assert_eq!(json["kind"], "invalid_reference");
}

#[test]
fn strategy_kind_parses() {
    assert_eq!("API".parse::<StrategyKind>().unwrap(), StrategyKind::Api);
    assert_eq!(StrategyKind::Browser.to_string(), "browser");
    assert!("scrape".parse::<StrategyKind>().is_err());
}
