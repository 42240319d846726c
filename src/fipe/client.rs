//! Adaptive rate-limited client for the FIPE API
//!
//! This module handles every request sent upstream, including:
//! - Building the HTTP client with proper user agent and timeouts
//! - Pacing requests through a shared `ThrottleController`
//! - Retrying transient failures with separate backoff for HTTP 429
//! - Detecting the `{codigo, erro}` error payloads the API returns with 2xx
//! - Deserializing each endpoint's payload

use crate::config::ClientConfig;
use crate::fipe::throttle::{backoff, parse_retry_after, ThrottleController};
use crate::fipe::types::{
    BrandEntry, DomainErrorPayload, ModelYearEntry, ModelsResponse, PriceEntry, PriceQuery,
    ReferencePeriodEntry,
};
use crate::{FetchError, FetchResult};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const REFERENCE_PERIODS: &str = "ConsultarTabelaDeReferencia";
const BRANDS: &str = "ConsultarMarcas";
const MODELS: &str = "ConsultarModelos";
const MODEL_YEARS: &str = "ConsultarAnoModelo";
const PRICE: &str = "ConsultarValorComTodosParametros";

/// Classification of a single request/response cycle
#[derive(Debug)]
enum Attempt {
    /// 2xx with a non-error JSON payload
    Success(Value),

    /// HTTP 429, with the server's retry hint if any
    RateLimited { retry_after: Option<Duration> },

    /// Network error or non-2xx status; retried
    Failed(String),

    /// Domain error or malformed payload; surfaced without retrying
    Fatal(FetchError),
}

/// Builds the HTTP client used for upstream requests
///
/// # Arguments
///
/// * `config` - The client configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ClientConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("fipe-sync/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Client for the FIPE vehicle price API
///
/// The throttle state lives inside the client and is shared by every request
/// issued through it, so one client should be used per process.
pub struct FipeClient {
    client: Client,
    base_url: String,
    vehicle_type: u8,
    max_retries: u32,
    rate_limit_backoff: Duration,
    error_backoff: Duration,
    throttle: Mutex<ThrottleController>,
}

impl FipeClient {
    /// Creates a client from configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fipe_sync::config::ClientConfig;
    /// use fipe_sync::fipe::FipeClient;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = FipeClient::new(&ClientConfig::default())?;
    /// let periods = client.reference_periods().await?;
    /// println!("{} reference tables", periods.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: &ClientConfig) -> FetchResult<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            vehicle_type: config.vehicle_type,
            max_retries: config.max_retries,
            rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
            error_backoff: Duration::from_millis(config.error_backoff_ms),
            throttle: Mutex::new(ThrottleController::from_config(config)),
        })
    }

    /// Returns the interval currently enforced between requests
    pub async fn current_interval(&self) -> Duration {
        self.throttle.lock().await.current_interval()
    }

    /// Returns a copy of the throttle state
    pub async fn throttle_snapshot(&self) -> ThrottleController {
        self.throttle.lock().await.clone()
    }

    /// Lists every reference table (monthly snapshot) the API knows about
    pub async fn reference_periods(&self) -> FetchResult<Vec<ReferencePeriodEntry>> {
        self.request(REFERENCE_PERIODS, json!({})).await
    }

    /// Lists the brands of a reference period
    pub async fn brands(&self, period_code: i64) -> FetchResult<Vec<BrandEntry>> {
        self.request(
            BRANDS,
            json!({
                "codigoTipoVeiculo": self.vehicle_type,
                "codigoTabelaReferencia": period_code,
            }),
        )
        .await
    }

    /// Lists the models of a brand in a reference period
    pub async fn models(&self, period_code: i64, brand_code: &str) -> FetchResult<ModelsResponse> {
        self.request(
            MODELS,
            json!({
                "codigoTipoVeiculo": self.vehicle_type,
                "codigoTabelaReferencia": period_code,
                "codigoMarca": brand_code,
            }),
        )
        .await
    }

    /// Lists the model-years of a model in a reference period
    pub async fn model_years(
        &self,
        period_code: i64,
        brand_code: &str,
        model_code: &str,
    ) -> FetchResult<Vec<ModelYearEntry>> {
        self.request(
            MODEL_YEARS,
            json!({
                "codigoTipoVeiculo": self.vehicle_type,
                "codigoTabelaReferencia": period_code,
                "codigoMarca": brand_code,
                "codigoModelo": model_code,
            }),
        )
        .await
    }

    /// Fetches the quoted price of one model-year in a reference period
    pub async fn price(&self, query: &PriceQuery<'_>) -> FetchResult<PriceEntry> {
        self.request(
            PRICE,
            json!({
                "codigoTipoVeiculo": self.vehicle_type,
                "codigoTabelaReferencia": query.period_code,
                "codigoMarca": query.brand_code,
                "codigoModelo": query.model_code,
                "anoModelo": query.year.to_string(),
                "codigoTipoCombustivel": query.fuel_code,
                "tipoConsulta": "tradicional",
            }),
        )
        .await
    }

    /// Sends a request and deserializes the payload into `T`
    async fn request<T>(&self, endpoint: &str, body: Value) -> FetchResult<T>
    where
        T: DeserializeOwned,
    {
        let value = self.request_with_retry(endpoint, &body).await?;
        serde_json::from_value(value).map_err(|e| FetchError::validation(endpoint, e.to_string()))
    }

    /// Runs the throttle/send/classify loop for one logical call
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx, valid payload | Count success, return payload |
    /// | 2xx, `{codigo, erro}` payload | Return `Domain` error, no retry |
    /// | 2xx, invalid JSON | Return `Validation` error, no retry |
    /// | HTTP 429 | Double interval, wait `Retry-After` or `rate_limit_backoff * 2^attempt`, retry; wait once more when exhausted |
    /// | Other non-2xx / network | Wait `error_backoff * 2^attempt`, retry; fail immediately when exhausted |
    async fn request_with_retry(&self, endpoint: &str, body: &Value) -> FetchResult<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut attempt = 0u32;

        loop {
            self.wait_for_slot().await;

            debug!("POST {} (attempt {}/{})", url, attempt + 1, self.max_retries + 1);
            let outcome = self.send_once(&url, endpoint, body).await;

            let interval = {
                let mut throttle = self.throttle.lock().await;
                throttle.record_completion(Instant::now());
                match &outcome {
                    Attempt::Success(_) => {
                        if throttle.on_success() {
                            debug!("Throttle relaxed to {:?}", throttle.current_interval());
                        }
                    }
                    Attempt::RateLimited { .. } => throttle.on_rate_limited(),
                    Attempt::Failed(_) | Attempt::Fatal(_) => {}
                }
                throttle.current_interval()
            };

            match outcome {
                Attempt::Success(value) => return Ok(value),

                Attempt::Fatal(error) => return Err(error),

                Attempt::RateLimited { retry_after } => {
                    let wait = retry_after.unwrap_or_else(|| backoff(self.rate_limit_backoff, attempt));
                    warn!(
                        "Rate limited on {} (attempt {}/{}), interval now {:?}, waiting {:?}",
                        endpoint,
                        attempt + 1,
                        self.max_retries + 1,
                        interval,
                        wait
                    );
                    tokio::time::sleep(wait).await;

                    if attempt < self.max_retries {
                        attempt += 1;
                        continue;
                    }
                    return Err(FetchError::Transport {
                        endpoint: endpoint.to_string(),
                        reason: format!("rate limited (HTTP 429) after {} attempts", attempt + 1),
                    });
                }

                Attempt::Failed(reason) => {
                    if attempt < self.max_retries {
                        let wait = backoff(self.error_backoff, attempt);
                        warn!(
                            "{} failed on attempt {}/{}: {}; retrying in {:?}",
                            endpoint,
                            attempt + 1,
                            self.max_retries + 1,
                            reason,
                            wait
                        );
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(FetchError::Transport {
                        endpoint: endpoint.to_string(),
                        reason: format!("{} after {} attempts", reason, attempt + 1),
                    });
                }
            }
        }
    }

    /// Sleeps until the throttle allows the next request
    async fn wait_for_slot(&self) {
        let wait = self.throttle.lock().await.wait_time(Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Issues one request and classifies the outcome
    async fn send_once(&self, url: &str, endpoint: &str, body: &Value) -> Attempt {
        let response = match self.client.post(url).json(body).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Failed("request timeout".to_string()),
            Err(e) if e.is_connect() => return Attempt::Failed("connection refused".to_string()),
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Attempt::RateLimited { retry_after };
        }

        if !status.is_success() {
            return Attempt::Failed(format!("HTTP {}", status.as_u16()));
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                return Attempt::Fatal(FetchError::validation(
                    endpoint,
                    format!("response is not JSON: {}", e),
                ))
            }
        };

        if let Some(error) = domain_error(&value) {
            return Attempt::Fatal(FetchError::Domain {
                endpoint: endpoint.to_string(),
                code: error.codigo,
                message: error.erro,
            });
        }

        Attempt::Success(value)
    }
}

/// Recognizes the `{codigo, erro}` payload the API uses for domain errors
fn domain_error(value: &Value) -> Option<DomainErrorPayload> {
    let object = value.as_object()?;
    let message = object.get("erro")?.as_str()?;
    let code = match object.get("codigo")? {
        Value::String(code) => code.clone(),
        other => other.to_string(),
    };

    Some(DomainErrorPayload {
        codigo: code,
        erro: message.to_string(),
    })
}
