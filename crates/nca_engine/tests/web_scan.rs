use std::sync::Arc;
use std::time::Duration;

use nca_core::{SearchKey, WorkflowStep};
use nca_engine::{
    find_web_batches, CacheClient, CacheSettings, MemoryStore, ScanContext, ScanError, Scanner,
    ScannerSettings, TitleCatalog,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Two list pages, three batches (one with a bad name), one shared title,
/// and two issues whose editions can't be used.
async fn live_site() -> MockServer {
    let server = MockServer::start().await;
    let uri = server.uri();
    let title = json!({"url": format!("{uri}/lccn/sn12345678.json"), "name": "Daily Blah"});

    mount_json(
        &server,
        "/batches.json",
        json!({
            "batches": [
                {"name": "batch_oru_fluffythedog_ver01", "url": format!("{uri}/batches/batch_oru_fluffythedog_ver01.json")},
                {"name": "not-a-batch", "url": format!("{uri}/batches/not-a-batch.json")},
            ],
            "next": format!("{uri}/batches/2.json"),
        }),
    )
    .await;
    mount_json(
        &server,
        "/batches/2.json",
        json!({
            "Batches": [
                {"Name": "batch_oru_courage_3_ver02", "URL": format!("{uri}/batches/batch_oru_courage_3_ver02.json")},
            ],
            "Next": "",
        }),
    )
    .await;
    mount_json(
        &server,
        "/batches/batch_oru_fluffythedog_ver01.json",
        json!({
            "name": "batch_oru_fluffythedog_ver01",
            "issues": [
                {"url": format!("{uri}/lccn/sn12345678/1999-12-31/ed-1.json"), "date_issued": "1999-12-31", "title": title},
                {"url": format!("{uri}/lccn/sn12345678/2000-01-01/ed-2.json"), "date_issued": "2000-01-01", "title": title},
                {"url": format!("{uri}/lccn/sn12345678/2000-01-02/ed-x.json"), "date_issued": "2000-01-02", "title": title},
                {"url": format!("{uri}/lccn/sn12345678/2000-01-03/ed-4.json"), "date_issued": "2000-01-03", "title": title},
            ],
            "lccns": ["sn12345678"],
        }),
    )
    .await;
    mount_json(
        &server,
        "/batches/batch_oru_courage_3_ver02.json",
        json!({
            "name": "batch_oru_courage_3_ver02",
            "issues": [
                {"url": format!("{uri}/lccn/sn12345678/2001-02-03/ed-1.json"), "date_issued": "2001-02-03", "title": title},
            ],
            "lccns": ["sn12345678"],
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/lccn/sn12345678.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lccn": "sn12345678",
            "name": "Daily Blah",
            "place_of_publication": "Eugene, Or.",
        })))
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn client(cache: &TempDir) -> CacheClient {
    CacheClient::new(CacheSettings {
        cache_path: cache.path().to_path_buf(),
        ..CacheSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn web_scan_indexes_batches_issues_and_titles() {
    nca_logging::initialize_for_tests();
    let server = live_site().await;
    let cache = TempDir::new().unwrap();
    let mut ctx = ScanContext::new(TitleCatalog::default());

    find_web_batches(&mut ctx, &client(&cache), &server.uri(), Duration::ZERO)
        .await
        .unwrap();
    let finder = ctx.into_finder();

    let names: Vec<String> = finder.batches.iter().map(|b| b.fullname()).collect();
    assert_eq!(names, vec!["batch_oru_fluffythedog_ver01", "batch_oru_courage_3_ver02"]);
    assert_eq!(finder.batches[1].keyword, "courage_3");
    assert_eq!(finder.batches[1].version, 2);

    assert_eq!(finder.titles.len(), 1);
    assert_eq!(finder.titles[0].lccn, "sn12345678");
    assert_eq!(finder.titles[0].place_of_publication, "Eugene, Or.");

    let keys: Vec<String> = finder
        .issue_ids()
        .map(|id| finder.issue_key(id).unwrap().to_string())
        .collect();
    assert_eq!(
        keys,
        vec!["sn12345678/1999123101", "sn12345678/2000010102", "sn12345678/2001020301"]
    );
    for issue in &finder.issues {
        assert_eq!(issue.workflow_step, WorkflowStep::InProduction);
        assert_eq!(issue.marc_org_code, "oru");
        assert!(issue.batch.is_some());
    }
    assert_eq!(finder.batches[0].issues.len(), 2);

    let top_level: Vec<_> = finder.top_level_errors().collect();
    assert_eq!(top_level.len(), 1);
    assert!(top_level[0].error.error.contains("not-a-batch"));

    let bad_edition = finder
        .errors
        .iter()
        .find(|e| e.error.error.contains("invalid edition"))
        .expect("edition error recorded");
    assert_eq!(bad_edition.batch.map(|b| b.0), Some(0));

    let bad_editions: Vec<&str> = finder
        .errors
        .iter()
        .map(|e| e.error.error.as_str())
        .filter(|e| e.contains("invalid edition"))
        .collect();
    assert_eq!(bad_editions.len(), 2);
    assert!(bad_editions.iter().any(|e| e.ends_with("/2000-01-03/ed-4.json")));
}

#[tokio::test]
async fn failed_batch_list_aborts_the_web_scan() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/batches.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let mut ctx = ScanContext::new(TitleCatalog::default());

    let err = find_web_batches(&mut ctx, &client(&cache), &server.uri(), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::Http { .. }));
}

#[tokio::test]
async fn invalid_webroot_is_reported() {
    let cache = TempDir::new().unwrap();
    let mut ctx = ScanContext::new(TitleCatalog::default());
    let err = find_web_batches(&mut ctx, &client(&cache), "not a url", Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::InvalidWebRoot(_)));
}

#[tokio::test]
async fn scanner_publishes_lookup_and_round_trips_through_cache_file() {
    let server = live_site().await;
    let cache = TempDir::new().unwrap();
    let settings = ScannerSettings {
        webroot: Some(server.uri()),
        cache_path: cache.path().to_path_buf(),
        batch_throttle: Duration::ZERO,
        scan_sftp: false,
        scan_scans: false,
        scan_disk_batches: false,
        ..ScannerSettings::default()
    };
    let store = Arc::new(MemoryStore::new(Vec::new(), Vec::new()));
    let scanner = Scanner::new(settings, store, client(&cache));
    assert!(scanner.snapshot().finder().issues.is_empty());

    let snapshot = scanner.refresh().await.unwrap();
    let key = SearchKey::parse("sn12345678/2000").unwrap();
    assert_eq!(snapshot.issues(&key).count(), 1);
    let key = SearchKey::parse("sn12345678").unwrap();
    assert_eq!(snapshot.issues(&key).count(), 3);
    assert!(snapshot
        .live_issue("sn12345678", chrono::NaiveDate::from_ymd_opt(2001, 2, 3).unwrap(), 1)
        .is_some());

    scanner.save_cache().unwrap();
    assert!(cache.path().join("finder.cache").is_file());

    let restarted = scanner.duplicate();
    assert!(restarted.snapshot().finder().issues.is_empty());
    assert!(restarted.load_cache().unwrap());
    let restored = restarted.snapshot();
    assert_eq!(restored.finder().issues, snapshot.finder().issues);
    assert_eq!(restored.issues(&key).count(), 3);
}
