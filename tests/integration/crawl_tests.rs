//! Integration tests for the crawler
//!
//! These tests use wiremock as a fake FIPE API (and Anthropic API) and an
//! on-disk SQLite database to exercise full crawl runs end-to-end.

use fipe_sync::classifier::{Segment, SegmentClassifier};
use fipe_sync::config::{ClassifierConfig, ClientConfig, CrawlConfig};
use fipe_sync::crawler::{Coordinator, CrawlOptions, RecordingProgress};
use fipe_sync::fipe::FipeClient;
use fipe_sync::storage::{SegmentSource, SqliteStorage, Storage, UnclassifiedModel};
use fipe_sync::{FetchError, SyncError};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PERIOD: i64 = 327;

fn client_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        vehicle_type: 1,
        base_interval_ms: 1,
        max_interval_ms: 8,
        max_retries: 0,
        rate_limit_backoff_ms: 1,
        error_backoff_ms: 1,
        timeout_secs: 5,
    }
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("fipe.db")
}

/// Builds a coordinator against `server` writing to the database at `db`
fn coordinator(
    server: &MockServer,
    db: &Path,
    crawl_config: CrawlConfig,
) -> (Coordinator<SqliteStorage>, Arc<RecordingProgress>) {
    let client = FipeClient::new(&client_config(&server.uri())).unwrap();
    let storage = SqliteStorage::new(db).unwrap();
    let progress = Arc::new(RecordingProgress::default());
    let coordinator =
        Coordinator::new(client, storage, crawl_config).with_progress(progress.clone());
    (coordinator, progress)
}

fn period_options() -> CrawlOptions {
    CrawlOptions {
        reference_code: Some(PERIOD),
        ..CrawlOptions::default()
    }
}

fn price_body(model: &str, year: i32, amount: &str, fipe_code: &str) -> Value {
    json!({
        "Valor": amount,
        "Marca": "Marca",
        "Modelo": model,
        "AnoModelo": year,
        "Combustivel": "Gasolina",
        "CodigoFipe": fipe_code,
        "MesReferencia": "dezembro de 2025 ",
        "SiglaCombustivel": "G"
    })
}

async fn mount_periods(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/ConsultarTabelaDeReferencia"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Codigo": PERIOD, "Mes": "dezembro/2025 "},
            {"Codigo": 326, "Mes": "novembro/2025 "}
        ])))
        .mount(server)
        .await;
}

async fn mount_brands(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .and(body_partial_json(json!({"codigoTabelaReferencia": PERIOD})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Label": "Fiat", "Value": "21"},
            {"Label": "Ford", "Value": "22"}
        ])))
        .mount(server)
        .await;
}

/// Mounts the models endpoint of one brand, expecting `calls` requests
async fn mount_models(server: &MockServer, brand: &str, models: Value, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/ConsultarModelos"))
        .and(body_partial_json(json!({"codigoMarca": brand})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Modelos": models })))
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_models_failure(server: &MockServer, brand: &str) {
    Mock::given(method("POST"))
        .and(path("/ConsultarModelos"))
        .and(body_partial_json(json!({"codigoMarca": brand})))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

async fn mount_years(server: &MockServer, model: &str, years: Value) {
    Mock::given(method("POST"))
        .and(path("/ConsultarAnoModelo"))
        .and(body_partial_json(json!({"codigoModelo": model})))
        .respond_with(ResponseTemplate::new(200).set_body_json(years))
        .mount(server)
        .await;
}

async fn mount_price(server: &MockServer, model: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path("/ConsultarValorComTodosParametros"))
        .and(body_partial_json(json!({"codigoModelo": model})))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Seeds 1 period, 2 brands, 1 model each and 1 model-year each
async fn mount_full_upstream(server: &MockServer, fiat_amount: &str) {
    mount_periods(server).await;
    mount_brands(server).await;
    mount_models(server, "21", json!([{"Label": "147 C/ CL", "Value": 437}]), 1).await;
    mount_models(server, "22", json!([{"Label": "Ka 1.0", "Value": 5000}]), 1).await;
    mount_fiat_rest(server, fiat_amount).await;
    mount_ford_rest(server).await;
}

async fn mount_fiat_rest(server: &MockServer, amount: &str) {
    mount_years(
        server,
        "437",
        json!([{"Label": "1985 Gasolina", "Value": "1985-1"}]),
    )
    .await;
    mount_price(server, "437", price_body("147 C/ CL", 1985, amount, "001004-9")).await;
}

async fn mount_ford_rest(server: &MockServer) {
    mount_years(server, "5000", json!([{"Label": "2020 Flex", "Value": "2020-5"}])).await;
    mount_price(
        server,
        "5000",
        price_body("Ka 1.0", 2020, "R$ 45.321,00", "003281-6"),
    )
    .await;
}

fn period_id(storage: &SqliteStorage) -> i64 {
    storage
        .get_reference_period(PERIOD)
        .unwrap()
        .expect("period stored")
        .id
}

/// Every crawled-at timestamp and price row of the period, for comparisons
fn snapshot(storage: &SqliteStorage) -> Vec<String> {
    let id = period_id(storage);
    let mut out = Vec::new();
    for b in storage.list_reference_brands(id).unwrap() {
        out.push(format!("b{}:{:?}", b.brand_id, b.models_crawled_at));
    }
    for m in storage.list_reference_models(id).unwrap() {
        out.push(format!("m{}:{:?}", m.model_id, m.years_crawled_at));
    }
    for my in storage.list_reference_model_years(id).unwrap() {
        out.push(format!("y{}:{:?}", my.model_year_id, my.price_crawled_at));
        let price = storage.get_price(my.model_year_id, id).unwrap();
        out.push(format!("p{:?}", price));
    }
    out
}

#[tokio::test]
async fn test_end_to_end_sync() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_full_upstream(&server, "R$ 4.147,00").await;

    let (mut coordinator, progress) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let report = coordinator.run(&period_options()).await.unwrap();

    let storage = coordinator.storage();
    let stats = storage.get_stats().unwrap();
    assert_eq!(stats.reference_periods, 1);
    assert_eq!(stats.brands, 2);
    assert_eq!(stats.models, 2);
    assert_eq!(stats.model_years, 2);
    assert_eq!(stats.prices, 2);

    let period = storage.get_reference_period(PERIOD).unwrap().unwrap();
    assert_eq!((period.month, period.year), (12, 2025));
    assert!(period.crawled_at.is_some());
    assert!(storage
        .count_pending_checkpoints(period.id)
        .unwrap()
        .is_complete());

    let model_years = storage.list_reference_model_years(period.id).unwrap();
    let mut amounts: Vec<String> = model_years
        .iter()
        .map(|my| {
            storage
                .get_price(my.model_year_id, period.id)
                .unwrap()
                .unwrap()
                .amount
        })
        .collect();
    amounts.sort();
    assert_eq!(amounts, vec!["4147.00", "45321.00"]);

    assert_eq!(report.prices_fetched, 2);
    assert_eq!(report.failed_items(), 0);
    assert!(report.periods[0].marked_crawled);
    assert!(progress.contains("Phase 4: Fetching 2 prices..."));
    assert!(progress.contains("Crawl complete: 2 prices"));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    // Each models endpoint is expected exactly once across both runs
    mount_full_upstream(&server, "R$ 4.147,00").await;

    let (mut coordinator, _) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    coordinator.run(&period_options()).await.unwrap();
    let before = snapshot(coordinator.storage());
    let stats_before = coordinator.storage().get_stats().unwrap();

    let report = coordinator.run(&period_options()).await.unwrap();

    assert_eq!(snapshot(coordinator.storage()), before);
    assert_eq!(coordinator.storage().get_stats().unwrap(), stats_before);
    let period = &report.periods[0];
    assert_eq!(period.brands_linked, 2);
    assert_eq!(period.models.attempted, 0);
    assert_eq!(period.model_years.attempted, 0);
    assert_eq!(period.prices.attempted, 0);
}

#[tokio::test]
async fn test_failed_brand_is_retried_on_next_run() {
    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    // First run: Ford's models fail
    let first = MockServer::start().await;
    mount_periods(&first).await;
    mount_brands(&first).await;
    mount_models(&first, "21", json!([{"Label": "147 C/ CL", "Value": 437}]), 1).await;
    mount_models_failure(&first, "22").await;
    mount_fiat_rest(&first, "R$ 4.147,00").await;

    let (mut coordinator, progress) = coordinator(&first, &db, CrawlConfig::default());
    let report = coordinator.run(&period_options()).await.unwrap();

    assert_eq!(report.periods[0].models.attempted, 2);
    assert_eq!(report.periods[0].models.failed, 1);
    assert!(progress.contains("Error crawling models for Ford"));

    let storage = coordinator.into_storage();
    let id = period_id(&storage);
    let pending = storage.get_uncrawled_reference_brands(id).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].fipe_code, "22");
    assert_eq!(storage.get_stats().unwrap().prices, 1);
    drop(storage);

    // Second run: Fiat's models must not be fetched again
    let second = MockServer::start().await;
    mount_periods(&second).await;
    mount_brands(&second).await;
    mount_models(&second, "21", json!([{"Label": "147 C/ CL", "Value": 437}]), 0).await;
    mount_models(&second, "22", json!([{"Label": "Ka 1.0", "Value": 5000}]), 1).await;
    mount_ford_rest(&second).await;

    let (mut coordinator, _) = self::coordinator(&second, &db, CrawlConfig::default());
    let report = coordinator.run(&period_options()).await.unwrap();

    assert_eq!(report.periods[0].models.attempted, 1);
    assert_eq!(report.periods[0].prices.succeeded, 1);
    let storage = coordinator.storage();
    assert_eq!(storage.get_stats().unwrap().prices, 2);
    assert!(storage
        .count_pending_checkpoints(period_id(storage))
        .unwrap()
        .is_complete());
}

#[tokio::test]
async fn test_filtered_model_fetch_leaves_brand_pending() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_periods(&server).await;
    mount_brands(&server).await;
    mount_models(
        &server,
        "21",
        json!([
            {"Label": "147 C/ CL", "Value": 437},
            {"Label": "Uno Mille", "Value": 438}
        ]),
        1,
    )
    .await;
    mount_fiat_rest(&server, "R$ 4.147,00").await;

    let options = CrawlOptions {
        brand_code: Some("21".to_string()),
        model_codes: Some(vec!["437".to_string()]),
        ..period_options()
    };

    let (mut coordinator, _) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let report = coordinator.run(&options).await.unwrap();

    assert_eq!(report.periods[0].brands_linked, 1);
    assert_eq!(report.periods[0].models.succeeded, 1);

    let storage = coordinator.storage();
    let id = period_id(storage);
    let brands = storage.list_reference_brands(id).unwrap();
    assert_eq!(brands.len(), 1);
    assert!(brands[0].models_crawled_at.is_none());

    let stats = storage.get_stats().unwrap();
    assert_eq!(stats.brands, 1);
    assert_eq!(stats.models, 1);
    assert_eq!(stats.prices, 1);
}

#[tokio::test]
async fn test_model_filter_without_brand_is_rejected() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let options = CrawlOptions {
        model_codes: Some(vec!["437".to_string()]),
        ..period_options()
    };

    let (mut coordinator, _) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let result = coordinator.run(&options).await;

    assert!(matches!(result, Err(SyncError::Options(_))));
}

#[tokio::test]
async fn test_force_mode_recrawls_without_touching_entities() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_periods(&server).await;
    mount_brands(&server).await;
    mount_models(&server, "21", json!([{"Label": "147 C/ CL", "Value": 437}]), 2).await;
    mount_models(&server, "22", json!([{"Label": "Ka 1.0", "Value": 5000}]), 2).await;
    mount_fiat_rest(&server, "R$ 4.147,00").await;
    mount_ford_rest(&server).await;

    let (mut coordinator, progress) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    coordinator.run(&period_options()).await.unwrap();
    let stats_before = coordinator.storage().get_stats().unwrap();

    let options = CrawlOptions {
        force: true,
        ..period_options()
    };
    let report = coordinator.run(&options).await.unwrap();

    assert!(progress.contains("Force mode: clearing crawl status..."));
    assert_eq!(report.periods[0].models.attempted, 2);
    assert_eq!(report.periods[0].prices.attempted, 2);
    assert_eq!(coordinator.storage().get_stats().unwrap(), stats_before);
}

#[tokio::test]
async fn test_changed_price_is_updated_in_place() {
    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    let first = MockServer::start().await;
    mount_full_upstream(&first, "R$ 4.147,00").await;
    let (mut coordinator, _) = coordinator(&first, &db, CrawlConfig::default());
    coordinator.run(&period_options()).await.unwrap();

    let storage = coordinator.into_storage();
    let id = period_id(&storage);
    let prices_before: Vec<_> = storage
        .list_reference_model_years(id)
        .unwrap()
        .iter()
        .map(|my| storage.get_price(my.model_year_id, id).unwrap().unwrap())
        .collect();
    drop(storage);

    // Fiat's price moved, Ford's did not
    let second = MockServer::start().await;
    mount_full_upstream(&second, "R$ 4.200,50").await;
    let (mut coordinator, _) = self::coordinator(&second, &db, CrawlConfig::default());
    let options = CrawlOptions {
        force: true,
        ..period_options()
    };
    coordinator.run(&options).await.unwrap();

    let storage = coordinator.storage();
    assert_eq!(storage.get_stats().unwrap().prices, 2);
    for before in prices_before {
        let after = storage
            .get_price(before.model_year_id, id)
            .unwrap()
            .unwrap();
        assert_eq!(after.id, before.id);
        if before.fipe_code == "001004-9" {
            assert_eq!(after.amount, "4200.50");
            assert_ne!(after.crawled_at, before.crawled_at);
        } else {
            assert_eq!(after.amount, before.amount);
            assert_eq!(after.crawled_at, before.crawled_at);
        }
    }
}

#[tokio::test]
async fn test_period_marked_crawled_despite_failures_by_default() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_periods(&server).await;
    mount_brands(&server).await;
    mount_models(&server, "21", json!([{"Label": "147 C/ CL", "Value": 437}]), 1).await;
    mount_models_failure(&server, "22").await;
    mount_fiat_rest(&server, "R$ 4.147,00").await;

    let (mut coordinator, _) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let report = coordinator.run(&period_options()).await.unwrap();

    assert!(report.periods[0].marked_crawled);
    let storage = coordinator.storage();
    let period = storage.get_reference_period(PERIOD).unwrap().unwrap();
    assert!(period.crawled_at.is_some());
    assert_eq!(storage.count_pending_checkpoints(period.id).unwrap().brands, 1);
}

#[tokio::test]
async fn test_complete_period_policy_waits_for_pending_checkpoints() {
    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);
    let crawl_config = CrawlConfig {
        require_complete_period: true,
        ..CrawlConfig::default()
    };

    let first = MockServer::start().await;
    mount_periods(&first).await;
    mount_brands(&first).await;
    mount_models(&first, "21", json!([{"Label": "147 C/ CL", "Value": 437}]), 1).await;
    mount_models_failure(&first, "22").await;
    mount_fiat_rest(&first, "R$ 4.147,00").await;

    let (mut coordinator, progress) = coordinator(&first, &db, crawl_config.clone());
    let report = coordinator.run(&period_options()).await.unwrap();

    assert!(!report.periods[0].marked_crawled);
    assert!(progress.contains("left incomplete: 1 brands, 0 models, 0 model-years pending"));
    let storage = coordinator.into_storage();
    assert!(storage
        .get_reference_period(PERIOD)
        .unwrap()
        .unwrap()
        .crawled_at
        .is_none());
    drop(storage);

    let second = MockServer::start().await;
    mount_periods(&second).await;
    mount_brands(&second).await;
    mount_models(&second, "22", json!([{"Label": "Ka 1.0", "Value": 5000}]), 1).await;
    mount_ford_rest(&second).await;

    let (mut coordinator, _) = self::coordinator(&second, &db, crawl_config);
    let report = coordinator.run(&period_options()).await.unwrap();

    assert!(report.periods[0].marked_crawled);
    assert!(coordinator
        .storage()
        .get_reference_period(PERIOD)
        .unwrap()
        .unwrap()
        .crawled_at
        .is_some());
}

#[tokio::test]
async fn test_brand_allow_list() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_periods(&server).await;
    mount_brands(&server).await;
    mount_models(&server, "21", json!([{"Label": "147 C/ CL", "Value": 437}]), 0).await;
    mount_models(&server, "22", json!([{"Label": "Ka 1.0", "Value": 5000}]), 1).await;
    mount_ford_rest(&server).await;

    let crawl_config = CrawlConfig {
        allowed_brands: vec!["22".to_string()],
        ..CrawlConfig::default()
    };
    let (mut coordinator, _) = coordinator(&server, &db_path(&dir), crawl_config);
    let report = coordinator.run(&period_options()).await.unwrap();

    assert_eq!(report.periods[0].brands_linked, 1);
    let stats = coordinator.storage().get_stats().unwrap();
    assert_eq!(stats.brands, 1);
    assert_eq!(stats.prices, 1);
}

#[tokio::test]
async fn test_invalid_model_year_value_leaves_model_pending() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_periods(&server).await;
    mount_brands(&server).await;
    mount_models(&server, "21", json!([{"Label": "147 C/ CL", "Value": 437}]), 1).await;
    mount_models(&server, "22", json!([{"Label": "Ka 1.0", "Value": 5000}]), 1).await;
    mount_years(
        &server,
        "437",
        json!([
            {"Label": "1985 Gasolina", "Value": "1985-1"},
            {"Label": "???", "Value": "garbage"}
        ]),
    )
    .await;
    mount_ford_rest(&server).await;

    let (mut coordinator, _) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let report = coordinator.run(&period_options()).await.unwrap();

    assert_eq!(report.periods[0].model_years.failed, 1);
    let storage = coordinator.storage();
    let pending = storage
        .get_uncrawled_reference_models(period_id(storage))
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].fipe_code, "437");
    // Nothing of the failed model was written
    assert_eq!(storage.get_stats().unwrap().model_years, 1);
}

#[tokio::test]
async fn test_no_matching_period_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_periods(&server).await;
    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        reference_code: Some(1),
        ..CrawlOptions::default()
    };
    let (mut coordinator, progress) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let report = coordinator.run(&options).await.unwrap();

    assert!(report.periods.is_empty());
    assert!(progress.contains("No reference tables found to process"));
    assert_eq!(
        coordinator.storage().get_stats().unwrap().reference_periods,
        0
    );
}

#[tokio::test]
async fn test_year_and_month_selection() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_periods(&server).await;
    mount_brands(&server).await;
    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .and(body_partial_json(json!({"codigoTabelaReferencia": 326})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    mount_models(&server, "21", json!([]), 1).await;
    mount_models(&server, "22", json!([]), 1).await;

    let options = CrawlOptions {
        years: Some(vec![2025]),
        months: Some(vec![12]),
        ..CrawlOptions::default()
    };
    let (mut coordinator, _) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let report = coordinator.run(&options).await.unwrap();

    assert_eq!(report.periods.len(), 1);
    assert_eq!(report.periods[0].code, PERIOD);
    assert_eq!(report.periods[0].label, "dezembro/2025");
}

#[tokio::test]
async fn test_period_list_failure_ends_run() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ConsultarTabelaDeReferencia"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let (mut coordinator, _) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let result = coordinator.run(&period_options()).await;

    assert!(matches!(
        result,
        Err(SyncError::Fetch(FetchError::Transport { .. }))
    ));
}

#[tokio::test]
async fn test_brand_list_failure_skips_period() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_periods(&server).await;
    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (mut coordinator, _) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let report = coordinator.run(&period_options()).await.unwrap();

    assert!(report.periods[0].brands_failed);
    assert!(!report.periods[0].marked_crawled);
    let period = coordinator
        .storage()
        .get_reference_period(PERIOD)
        .unwrap()
        .unwrap();
    assert!(period.crawled_at.is_none());
}

async fn mount_anthropic(server: &MockServer, status: u16, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "content": [{"type": "text", "text": answer}]
        })))
        .mount(server)
        .await;
}

fn classifier(server: &MockServer, batch_size: usize) -> SegmentClassifier {
    let config = ClassifierConfig {
        base_url: server.uri(),
        batch_size,
        batch_delay_ms: 1,
        ..ClassifierConfig::default()
    };
    SegmentClassifier::with_api_key(&config, "test-key".to_string()).unwrap()
}

#[tokio::test]
async fn test_new_models_are_classified_during_discovery() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_full_upstream(&server, "R$ 4.147,00").await;
    let anthropic = MockServer::start().await;
    mount_anthropic(&anthropic, 200, "Hatch").await;

    let (coordinator, progress) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let mut coordinator = coordinator.with_classifier(classifier(&anthropic, 20));
    let options = CrawlOptions {
        classify: true,
        ..period_options()
    };
    coordinator.run(&options).await.unwrap();

    let storage = coordinator.storage();
    for checkpoint in storage.list_reference_models(period_id(storage)).unwrap() {
        let model = storage.get_model(checkpoint.model_id).unwrap();
        assert_eq!(model.segment, Some(Segment::Hatch));
        assert_eq!(model.segment_source, Some(SegmentSource::Ai));
    }
    assert!(progress.contains("Classified Ka 1.0 as Hatch"));
}

#[tokio::test]
async fn test_classifier_failure_does_not_block_discovery() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_full_upstream(&server, "R$ 4.147,00").await;
    let anthropic = MockServer::start().await;
    mount_anthropic(&anthropic, 500, "overloaded").await;

    let (coordinator, _) = coordinator(&server, &db_path(&dir), CrawlConfig::default());
    let mut coordinator = coordinator.with_classifier(classifier(&anthropic, 20));
    let options = CrawlOptions {
        classify: true,
        ..period_options()
    };
    let report = coordinator.run(&options).await.unwrap();

    assert_eq!(report.failed_items(), 0);
    let storage = coordinator.storage();
    assert_eq!(storage.get_stats().unwrap().prices, 2);
    assert_eq!(storage.get_models_without_segment().unwrap().len(), 2);
}

#[tokio::test]
async fn test_batch_classification_tolerates_partial_failure() {
    let anthropic = MockServer::start().await;

    // The second batch fails outright
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_string_contains("Model: Model C"))
        .respond_with(ResponseTemplate::new(529))
        .expect(1)
        .mount(&anthropic)
        .await;
    mount_anthropic(&anthropic, 200, "1. SUV\n2. Minivan").await;

    let models: Vec<UnclassifiedModel> = ["A", "B", "C"]
        .iter()
        .enumerate()
        .map(|(i, name)| UnclassifiedModel {
            id: i as i64 + 1,
            brand_name: "Marca".to_string(),
            model_name: format!("Model {}", name),
        })
        .collect();

    let results = classifier(&anthropic, 2).classify_batch(&models).await;

    assert_eq!(
        results,
        vec![(1, Some(Segment::Suv)), (2, None), (3, None)]
    );
}

#[tokio::test]
async fn test_single_classification_parses_answer() {
    let anthropic = MockServer::start().await;
    mount_anthropic(&anthropic, 200, " sedã\n").await;

    let classifier = classifier(&anthropic, 20);
    let segment = classifier.classify("Honda", "Civic").await.unwrap();
    assert_eq!(segment, Segment::Seda);
}
