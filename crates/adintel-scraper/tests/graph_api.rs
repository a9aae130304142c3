//! Integration tests for the Graph `ads_archive` client and the API
//! acquisition strategy.
//!
//! Every test stands up a local `wiremock` server; no real network traffic
//! is made.

use adintel_analytics::AnalysisOptions;
use adintel_core::{load_app_config_from_env, CpmTable};
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use adintel_scraper::{
    Acquisition, AcquisitionOutcome, AcquireOptions, ActiveStatus, ArchiveQuery, CdpFactory,
    CountryScope, GraphClient, Harvest, ScraperError,
};

const ARCHIVE_PATH: &str = "/v19.0/ads_archive";

fn test_client(server: &MockServer) -> GraphClient {
    GraphClient::with_base_url(
        "test-token",
        5,
        "adintel-test/0.1",
        &format!("{}/v19.0", server.uri()),
    )
    .expect("failed to build test GraphClient")
    .with_page_size(2)
}

fn query(countries: &[&str]) -> ArchiveQuery {
    ArchiveQuery {
        page_id: "42".to_owned(),
        countries: countries.iter().map(|c| (*c).to_owned()).collect(),
        status: ActiveStatus::Active,
    }
}

fn ad(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "page_id": "42",
        "page_name": "Acme Spirits",
        "ad_delivery_start_time": "2024-05-01T00:00:00+0000",
        "ad_creative_link_titles": [format!("Gin {id}")],
    })
}

fn page(ids: &[&str], after: Option<&str>) -> serde_json::Value {
    let data: Vec<serde_json::Value> = ids.iter().map(|id| ad(id)).collect();
    match after {
        Some(cursor) => json!({
            "data": data,
            "paging": { "cursors": { "after": cursor }, "next": "https://graph.test/next" }
        }),
        None => json!({ "data": data }),
    }
}

fn error_envelope(code: i64, subcode: Option<i64>, message: &str) -> serde_json::Value {
    json!({
        "error": {
            "message": message,
            "type": "OAuthException",
            "code": code,
            "error_subcode": subcode,
            "fbtrace_id": "Axyz"
        }
    })
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn follows_cursors_until_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .and(query_param_is_missing("after"))
        .and(query_param("search_page_ids", "[\"42\"]"))
        .and(query_param("access_token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["1", "2"], Some("c1"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .and(query_param("after", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["3"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let ads = test_client(&server)
        .fetch_archive(&query(&["DE"]), 10)
        .await
        .unwrap();

    let ids: Vec<&str> = ads.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn stops_at_the_cap() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["1", "2"], Some("c1"))))
        .expect(1)
        .mount(&server)
        .await;

    let ads = test_client(&server)
        .fetch_archive(&query(&["DE"]), 2)
        .await
        .unwrap();

    assert_eq!(ads.len(), 2);
}

#[tokio::test]
async fn later_page_failure_keeps_earlier_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["1", "2"], Some("c1"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .and(query_param("after", "c1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ads = test_client(&server)
        .fetch_archive(&query(&["DE"]), 10)
        .await
        .unwrap();

    assert_eq!(ads.len(), 2);
}

#[tokio::test]
async fn first_page_failure_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_archive(&query(&["DE"]), 10)
        .await
        .unwrap_err();

    match err {
        ScraperError::UnexpectedStatus { status, url } => {
            assert_eq!(status, 503);
            assert!(!url.contains("test-token"), "token leaked into {url}");
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Error envelopes and retries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn error_envelope_surfaces_code_and_subcode_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(error_envelope(
                190,
                Some(460),
                "Error validating access token",
            )),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server)
        .with_retry_policy(3, 0)
        .fetch_archive_page(&query(&["DE"]), 2, None)
        .await
        .unwrap_err();

    match err {
        ScraperError::Api {
            message,
            code,
            subcode,
            trace_id,
            ..
        } => {
            assert_eq!(message, "Error validating access token");
            assert_eq!(code, Some(190));
            assert_eq!(subcode, Some(460));
            assert_eq!(trace_id.as_deref(), Some("Axyz"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn throttling_code_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(error_envelope(613, None, "Calls limited")),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["9"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let page = test_client(&server)
        .with_retry_policy(3, 0)
        .fetch_archive_page(&query(&["DE"]), 2, None)
        .await
        .unwrap();

    assert_eq!(page.data.len(), 1);
}

#[tokio::test]
async fn http_429_without_envelope_is_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_archive_page(&query(&["DE"]), 2, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScraperError::RateLimited {
            retry_after_secs: 7,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

async fn mount_market(server: &MockServer, market: &str, body: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .and(query_param("ad_reached_countries", format!("[\"{market}\"]")))
        .respond_with(body)
        .expect(1)
        .mount(server)
        .await;
}

fn ok(ids: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(page(ids, None))
}

#[tokio::test]
async fn fanout_dedups_across_markets_and_skips_failures() {
    let server = MockServer::start().await;
    mount_market(&server, "DE", ok(&["1", "2"])).await;
    mount_market(&server, "FR", ok(&["2", "3"])).await;
    mount_market(&server, "IT", ResponseTemplate::new(500)).await;
    mount_market(&server, "ES", ok(&["3", "4"])).await;

    let scope = CountryScope::from_codes(&["de", "fr", "it", "es"]);
    let mut harvest = Harvest::new("42");
    let report = test_client(&server)
        .discover_into("42", &scope, ActiveStatus::Active, 100, 3, &mut harvest)
        .await
        .unwrap();

    let ids: Vec<&str> = harvest
        .accumulator
        .creatives()
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert_eq!(report.markets_queried.len(), 4);
    assert_eq!(report.markets_failed, vec!["IT"]);
}

#[tokio::test]
async fn fanout_fails_only_when_every_market_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(error_envelope(
            10,
            None,
            "Application does not have permission",
        )))
        .mount(&server)
        .await;

    let scope = CountryScope::from_codes(&["DE", "FR", "IT", "ES"]);
    let err = test_client(&server)
        .discover_into("42", &scope, ActiveStatus::Active, 100, 2, &mut Harvest::new("42"))
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::Api { code: Some(10), .. }));
}

#[tokio::test]
async fn narrow_scope_sends_one_query_with_all_codes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .and(query_param("ad_reached_countries", "[\"DE\",\"FR\"]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["1"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let scope = CountryScope::from_codes(&["DE", "FR"]);
    let mut harvest = Harvest::new("42");
    let report = test_client(&server)
        .discover_into("42", &scope, ActiveStatus::Active, 100, 3, &mut harvest)
        .await
        .unwrap();

    assert_eq!(harvest.accumulator.creative_count(), 1);
    assert!(report.markets_failed.is_empty());
}

// ---------------------------------------------------------------------------
// API acquisition end to end
// ---------------------------------------------------------------------------

fn api_acquisition(server: &MockServer) -> Acquisition<CdpFactory> {
    let config = load_app_config_from_env().expect("default config");
    Acquisition::api(test_client(server), None, &config).with_deadline(None)
}

#[tokio::test]
async fn api_acquisition_maps_breakdowns_into_samples() {
    let server = MockServer::start().await;
    let mut enriched = ad("1");
    enriched["eu_total_reach"] = json!(1000);
    enriched["age_country_gender_reach_breakdown"] = json!([
        {
            "country": "DE",
            "age_gender_breakdowns": [{ "age_range": "25-34", "female": 420, "male": 280 }]
        },
        {
            "country": "FR",
            "age_gender_breakdowns": [{ "age_range": "25-34", "female": 180, "male": 120 }]
        }
    ]);

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [enriched, ad("2")] })),
        )
        .mount(&server)
        .await;

    let options = AcquireOptions {
        countries: CountryScope::from_codes(&["DE", "FR"]),
        ..AcquireOptions::default()
    };
    let acquisition = api_acquisition(&server).with_analysis(Some(AnalysisOptions {
        cpm: CpmTable::from_pairs(5.0, &[("DE", 10.0), ("FR", 8.0)]),
        ..AnalysisOptions::default()
    }));

    let result = acquisition
        .acquire("https://www.facebook.com/ads/library/?view_all_page_id=42", &options)
        .await
        .unwrap();

    assert_eq!(result.page_name.as_deref(), Some("Acme Spirits"));
    assert_eq!(result.total_found, 2);
    assert!(result.complete);

    let sample = result.creatives[0].sample().expect("API sample");
    assert_eq!(sample.total_reach, Some(1000));
    let de = sample.regions.iter().find(|r| r.region == "DE").unwrap();
    assert!((de.percentage - 70.0).abs() < 0.01);
    assert!(result.creatives[1].sample().is_none());

    let analytics = result.analytics.expect("analytics requested");
    assert_eq!(analytics.demographics.contributing_creatives, 1);
    assert!((analytics.spend.total_spend - 9.4).abs() < 0.01);
}

#[tokio::test]
async fn api_rejection_becomes_a_failure_outcome_with_codes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(error_envelope(
            2332,
            Some(2_332_002),
            "Ad archive access requires identity confirmation",
        )))
        .mount(&server)
        .await;

    let options = AcquireOptions {
        countries: CountryScope::from_codes(&["US"]),
        ..AcquireOptions::default()
    };
    let outcome = api_acquisition(&server).run("42", &options).await;

    match &outcome {
        AcquisitionOutcome::Failure(report) => {
            assert_eq!(report.kind, "upstream");
            assert_eq!(report.code, Some(2332));
            assert_eq!(report.subcode, Some(2_332_002));
        }
        AcquisitionOutcome::Success(_) => panic!("expected failure"),
    }
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "failure");
}
