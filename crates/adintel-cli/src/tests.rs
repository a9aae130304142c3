use adintel_analytics::Granularity;
use adintel_scraper::{ActiveStatus, CountryScope, StrategyKind};

use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["adintel"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn acquire_defaults() {
    let cli = Cli::try_parse_from(["adintel", "acquire", "12345"]).unwrap();
    let Some(Commands::Acquire(args)) = cli.command else {
        panic!("expected acquire");
    };
    assert_eq!(args.page, "12345");
    assert_eq!(args.strategy, StrategyKind::Browser);
    assert_eq!(args.status, ActiveStatus::Active);
    assert_eq!(args.limit, 200);
    assert_eq!(args.enrich_max, 5);
    assert!(!args.enrich);
    assert_eq!(args.granularity, Granularity::Week);
    assert!(args.deadline_secs.is_none());

    let options = args.options();
    assert_eq!(options.countries, CountryScope::All);
    assert!(!options.enrich);
}

#[test]
fn acquire_with_every_flag() {
    let cli = Cli::try_parse_from([
        "adintel",
        "acquire",
        "https://www.facebook.com/ads/library/?view_all_page_id=99",
        "--country",
        "de,fr",
        "--country",
        "it",
        "--status",
        "all",
        "--limit",
        "50",
        "--strategy",
        "api",
        "--enrich",
        "--enrich-max",
        "3",
        "--granularity",
        "month",
        "--top-regions",
        "8",
        "--deadline-secs",
        "120",
        "--require-complete",
        "--pretty",
    ])
    .unwrap();
    let Some(Commands::Acquire(args)) = cli.command else {
        panic!("expected acquire");
    };
    assert_eq!(args.strategy, StrategyKind::Api);
    assert_eq!(args.status, ActiveStatus::All);
    assert_eq!(args.granularity, Granularity::Month);
    assert_eq!(args.deadline_secs, Some(120));
    assert!(args.require_complete && args.pretty);

    let options = args.options();
    assert_eq!(
        options.countries,
        CountryScope::Countries(vec!["DE".to_owned(), "FR".to_owned(), "IT".to_owned()])
    );
    assert_eq!(options.limit, 50);
    assert_eq!(options.enrich_max, 3);
    assert!(options.enrich);
}

#[test]
fn acquire_rejects_unknown_strategy() {
    let result = Cli::try_parse_from(["adintel", "acquire", "1", "--strategy", "scrape"]);
    assert!(result.is_err());
}

#[test]
fn acquire_requires_a_page_ref() {
    assert!(Cli::try_parse_from(["adintel", "acquire"]).is_err());
}

#[test]
fn analyze_parses_input_path() {
    let cli = Cli::try_parse_from(["adintel", "analyze", "--input", "snap.json"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Analyze(ref args)) if args.input.to_str() == Some("snap.json")
    ));
}

#[test]
fn snapshot_accepts_a_creative_array() {
    let raw = r#"[{"id":"1","page_id":"42","reach":10},{"id":"2","page_id":"42"}]"#;
    let creatives = analyze::read_snapshot(raw).unwrap();
    assert_eq!(creatives.len(), 2);
    assert_eq!(creatives[0].reach, 10);
}

#[test]
fn snapshot_accepts_a_stored_success_outcome() {
    let raw = r#"{
        "status": "success",
        "page_id": "42",
        "page_name": null,
        "strategy": "api",
        "creatives": [{"id": "1", "page_id": "42"}],
        "total_found": 1,
        "complete": true,
        "landing_pages": [],
        "enrichment": {"selected": 0, "enriched": 0, "unavailable": 0, "failed": 0, "from_api": 0},
        "collected_at": "2024-06-01T00:00:00Z"
    }"#;
    let creatives = analyze::read_snapshot(raw).unwrap();
    assert_eq!(creatives.len(), 1);
}

#[test]
fn snapshot_rejects_other_json() {
    assert!(analyze::read_snapshot(r#"{"products": []}"#).is_err());
    assert!(analyze::read_snapshot("not json").is_err());
}
