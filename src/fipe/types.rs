//! Payload types returned by the FIPE API
//!
//! Field names follow the upstream JSON; the Rust names are translated.

use serde::{Deserialize, Serialize};

/// One entry of `ConsultarTabelaDeReferencia`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePeriodEntry {
    #[serde(rename = "Codigo")]
    pub code: i64,

    /// Free-text label such as `"dezembro/2025 "`
    #[serde(rename = "Mes")]
    pub label: String,
}

/// One entry of `ConsultarMarcas`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandEntry {
    #[serde(rename = "Label")]
    pub label: String,

    #[serde(rename = "Value")]
    pub code: String,
}

/// One model inside a `ConsultarModelos` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(rename = "Label")]
    pub label: String,

    #[serde(rename = "Value")]
    pub code: i64,
}

/// One entry of `ConsultarAnoModelo`
///
/// `value` encodes year and fuel code, e.g. `"2020-1"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelYearEntry {
    #[serde(rename = "Label")]
    pub label: String,

    #[serde(rename = "Value")]
    pub value: String,
}

/// Response of `ConsultarModelos`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(rename = "Modelos")]
    pub models: Vec<ModelEntry>,

    #[serde(rename = "Anos", default)]
    pub years: Option<Vec<ModelYearEntry>>,
}

/// Response of `ConsultarValorComTodosParametros`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// Localized currency text, e.g. `"R$ 4.147,00"`
    #[serde(rename = "Valor")]
    pub amount: String,

    #[serde(rename = "Marca")]
    pub brand: String,

    #[serde(rename = "Modelo")]
    pub model: String,

    #[serde(rename = "AnoModelo")]
    pub model_year: i32,

    #[serde(rename = "Combustivel")]
    pub fuel: String,

    #[serde(rename = "CodigoFipe")]
    pub fipe_code: String,

    #[serde(rename = "MesReferencia")]
    pub reference_month: String,

    #[serde(rename = "Autenticacao", default)]
    pub authentication: Option<String>,

    #[serde(rename = "TipoVeiculo", default)]
    pub vehicle_type: Option<i32>,

    #[serde(rename = "SiglaCombustivel", default)]
    pub fuel_acronym: Option<String>,

    #[serde(rename = "DataConsulta", default)]
    pub queried_at: Option<String>,
}

/// Error payload the API returns with a 2xx status, e.g.
/// `{"codigo": "0", "erro": "Parâmetros inválidos"}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DomainErrorPayload {
    pub codigo: String,
    pub erro: String,
}

/// Parameters identifying a single price lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuery<'a> {
    pub period_code: i64,
    pub brand_code: &'a str,
    pub model_code: &'a str,
    pub year: i32,
    pub fuel_code: i32,
}
