//! Integration tests for the adaptive FIPE client
//!
//! These tests use wiremock as the upstream API and millisecond-scale
//! throttle and backoff settings so retries run quickly.

use fipe_sync::config::ClientConfig;
use fipe_sync::fipe::{FipeClient, PriceQuery};
use fipe_sync::FetchError;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client configuration with tiny intervals pointing at the mock server
fn test_config(base_url: &str, max_retries: u32) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        vehicle_type: 1,
        base_interval_ms: 1,
        max_interval_ms: 64,
        max_retries,
        rate_limit_backoff_ms: 1,
        error_backoff_ms: 1,
        timeout_secs: 5,
    }
}

fn brands_body() -> serde_json::Value {
    json!([
        {"Label": "Fiat", "Value": "21"},
        {"Label": "Ford", "Value": "22"}
    ])
}

#[tokio::test]
async fn test_rate_limit_increases_interval_then_relaxes_after_ten_successes() {
    let mock_server = MockServer::start().await;

    // First three requests are rate limited
    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(brands_body()))
        .mount(&mock_server)
        .await;

    let client = FipeClient::new(&test_config(&mock_server.uri(), 5)).unwrap();

    let brands = client.brands(327).await.unwrap();
    assert_eq!(brands.len(), 2);

    // 1ms doubled three times
    let throttle = client.throttle_snapshot().await;
    assert_eq!(throttle.current_interval(), Duration::from_millis(8));
    assert_eq!(throttle.consecutive_successes(), 1);

    // Nine successes in a row: no decrease yet
    for _ in 0..8 {
        client.brands(327).await.unwrap();
    }
    assert_eq!(client.current_interval().await, Duration::from_millis(8));

    // The tenth consecutive success shrinks the interval by a quarter
    client.brands(327).await.unwrap();
    let throttle = client.throttle_snapshot().await;
    assert_eq!(throttle.current_interval(), Duration::from_millis(6));
    assert_eq!(throttle.consecutive_successes(), 0);
}

#[tokio::test]
async fn test_rate_limit_interval_is_capped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(8)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(brands_body()))
        .mount(&mock_server)
        .await;

    let client = FipeClient::new(&test_config(&mock_server.uri(), 8)).unwrap();
    client.brands(327).await.unwrap();

    assert_eq!(client.current_interval().await, Duration::from_millis(64));
}

#[tokio::test]
async fn test_rate_limit_exhaustion_is_transport_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = FipeClient::new(&test_config(&mock_server.uri(), 1)).unwrap();
    let result = client.brands(327).await;

    match result {
        Err(FetchError::Transport { endpoint, reason }) => {
            assert_eq!(endpoint, "ConsultarMarcas");
            assert!(reason.contains("429"), "unexpected reason: {}", reason);
        }
        other => panic!("expected transport failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exhausted_budget_cooldown_only_after_rate_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ConsultarModelos"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig {
        rate_limit_backoff_ms: 400,
        error_backoff_ms: 400,
        ..test_config(&mock_server.uri(), 0)
    };
    let client = FipeClient::new(&config).unwrap();

    // A rate-limited call still cools down once before giving up
    let start = Instant::now();
    assert!(matches!(
        client.brands(327).await,
        Err(FetchError::Transport { .. })
    ));
    assert!(start.elapsed() >= Duration::from_millis(400));

    // Any other failure is reported without waiting for the backoff
    let start = Instant::now();
    assert!(matches!(
        client.models(327, "21").await,
        Err(FetchError::Transport { .. })
    ));
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn test_retry_after_header_is_honoured() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarTabelaDeReferencia"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ConsultarTabelaDeReferencia"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"Codigo": 327, "Mes": "dezembro/2025 "}])),
        )
        .mount(&mock_server)
        .await;

    let client = FipeClient::new(&test_config(&mock_server.uri(), 2)).unwrap();
    let start = Instant::now();
    let periods = client.reference_periods().await.unwrap();

    assert_eq!(periods[0].code, 327);
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(brands_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = FipeClient::new(&test_config(&mock_server.uri(), 3)).unwrap();
    let brands = client.brands(327).await.unwrap();

    assert_eq!(brands[1].code, "22");
    // Plain failures never move the throttle
    assert_eq!(client.current_interval().await, Duration::from_millis(1));
}

#[tokio::test]
async fn test_server_error_exhaustion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = FipeClient::new(&test_config(&mock_server.uri(), 2)).unwrap();
    let result = client.brands(327).await;

    assert!(matches!(result, Err(FetchError::Transport { .. })));
}

#[tokio::test]
async fn test_domain_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarModelos"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"codigo": "0", "erro": "Parâmetros inválidos"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = FipeClient::new(&test_config(&mock_server.uri(), 3)).unwrap();
    let result = client.models(327, "21").await;

    match result {
        Err(FetchError::Domain { code, message, .. }) => {
            assert_eq!(code, "0");
            assert_eq!(message, "Parâmetros inválidos");
        }
        other => panic!("expected domain error, got {:?}", other),
    }
    assert_eq!(client.throttle_snapshot().await.consecutive_successes(), 0);
}

#[tokio::test]
async fn test_unexpected_shape_is_validation_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ConsultarAnoModelo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = FipeClient::new(&test_config(&mock_server.uri(), 3)).unwrap();

    assert!(matches!(
        client.brands(327).await,
        Err(FetchError::Validation { .. })
    ));
    assert!(matches!(
        client.model_years(327, "21", "437").await,
        Err(FetchError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_request_bodies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarModelos"))
        .and(body_partial_json(json!({
            "codigoTipoVeiculo": 1,
            "codigoTabelaReferencia": 327,
            "codigoMarca": "21"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Modelos": [{"Label": "147 C/ CL", "Value": 437}],
            "Anos": [{"Label": "1985 Gasolina", "Value": "1985-1"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ConsultarValorComTodosParametros"))
        .and(body_partial_json(json!({
            "codigoTabelaReferencia": 327,
            "codigoMarca": "21",
            "codigoModelo": "437",
            "anoModelo": "1985",
            "codigoTipoCombustivel": 1,
            "tipoConsulta": "tradicional"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Valor": "R$ 4.147,00",
            "Marca": "Fiat",
            "Modelo": "147 C/ CL",
            "AnoModelo": 1985,
            "Combustivel": "Gasolina",
            "CodigoFipe": "001004-9",
            "MesReferencia": "dezembro de 2025 ",
            "Autenticacao": "abc123",
            "TipoVeiculo": 1,
            "SiglaCombustivel": "G",
            "DataConsulta": "sexta-feira, 5 de dezembro de 2025 10:00"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = FipeClient::new(&test_config(&mock_server.uri(), 0)).unwrap();

    let models = client.models(327, "21").await.unwrap();
    assert_eq!(models.models[0].code, 437);

    let price = client
        .price(&PriceQuery {
            period_code: 327,
            brand_code: "21",
            model_code: "437",
            year: 1985,
            fuel_code: 1,
        })
        .await
        .unwrap();
    assert_eq!(price.amount, "R$ 4.147,00");
    assert_eq!(price.fipe_code, "001004-9");
}

#[tokio::test]
async fn test_requests_are_spaced_by_interval() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ConsultarMarcas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(brands_body()))
        .mount(&mock_server)
        .await;

    let config = ClientConfig {
        base_interval_ms: 100,
        max_interval_ms: 400,
        ..test_config(&mock_server.uri(), 0)
    };
    let client = FipeClient::new(&config).unwrap();

    let start = Instant::now();
    client.brands(327).await.unwrap();
    client.brands(327).await.unwrap();
    client.brands(327).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(200));
}
