use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Result count requested by the second, dashboard-facing fetch.
pub const EXTENDED_TOP_N: u32 = 200;

pub const DEFAULT_MAX_NET_PRICE: u32 = 25_000;
pub const DEFAULT_MIN_GRAD_RATE: u32 = 40;
pub const DEFAULT_MIN_RETENTION: u32 = 70;
pub const DEFAULT_TOP_N: u32 = 10;

pub const MSI_CATEGORIES: [&str; 7] = ["HSI", "PBI", "AANAPII", "ANNHI", "HBCU", "TRIBAL", "NANTI"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    pub max_net_price: u32,
    pub min_grad_rate: u32,
    pub min_retention: u32,
    pub top_n: u32,
    pub msi_preferences: Vec<String>,
    pub preferred_state: Option<String>,
    pub focus_pell: bool,
}

impl Default for RecommendRequest {
    fn default() -> Self {
        Self {
            max_net_price: DEFAULT_MAX_NET_PRICE,
            min_grad_rate: DEFAULT_MIN_GRAD_RATE,
            min_retention: DEFAULT_MIN_RETENTION,
            top_n: DEFAULT_TOP_N,
            msi_preferences: Vec::new(),
            preferred_state: None,
            focus_pell: false,
        }
    }
}

impl RecommendRequest {
    pub fn with_top_n(&self, top_n: u32) -> Self {
        Self {
            top_n,
            ..self.clone()
        }
    }
}

/// The backend fills missing cells with `0`, so text columns accept numbers
/// and treat `0` as absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntity {
    #[serde(rename = "Institution Name")]
    pub name: String,
    #[serde(rename = "HybridScore", default, deserialize_with = "lossy_number")]
    pub score: f64,
    #[serde(rename = "City", default, deserialize_with = "lossy_text")]
    pub city: Option<String>,
    #[serde(rename = "State Abbreviation", default, deserialize_with = "lossy_text")]
    pub state: Option<String>,
    #[serde(rename = "Region", default, deserialize_with = "lossy_text")]
    pub region: Option<String>,
    #[serde(rename = "MSI Status", default, deserialize_with = "lossy_text")]
    pub msi_status: Option<String>,
    #[serde(rename = "Net Price", default, deserialize_with = "lossy_number")]
    pub net_price: f64,
    #[serde(
        rename = "Affordability Gap (net price minus income earned working 10 hrs at min wage)",
        default,
        deserialize_with = "lossy_number"
    )]
    pub affordability_gap: f64,
    #[serde(
        rename = "Bachelor's Degree Graduation Rate Bachelor Degree Within 6 Years - Total",
        default,
        deserialize_with = "lossy_number"
    )]
    pub grad_rate: f64,
    #[serde(
        rename = "Percent Full-time, First-time, Pell Grant Recipients Receiving an Award - 6 Years",
        default,
        deserialize_with = "lossy_number"
    )]
    pub pell_grad_rate: f64,
    #[serde(
        rename = "First-Time, Full-Time Retention Rate",
        default,
        deserialize_with = "lossy_number"
    )]
    pub retention_rate: f64,
    #[serde(
        rename = "Percent of First-Time, Full-Time Undergraduates Awarded Pell Grants",
        default,
        deserialize_with = "lossy_number"
    )]
    pub pell_share: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RecommendResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<ScoredEntity>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

fn lossy_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) if n.as_f64().unwrap_or(0.0) != 0.0 => {
            Some(n.to_string())
        }
        _ => None,
    })
}

fn lossy_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Timeout,
    Server,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base URL: {url}")]
    InvalidBaseUrl { url: String },

    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {endpoint} timed out after {after_ms} ms")]
    Timeout { endpoint: String, after_ms: u64 },

    #[error("{endpoint} returned HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },

    #[error("{endpoint} rejected the request: {message}")]
    Rejected { endpoint: String, message: String },

    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::InvalidBaseUrl { .. }
            | ApiError::ClientBuild { .. }
            | ApiError::Network { .. } => FailureKind::Network,
            ApiError::Timeout { .. } => FailureKind::Timeout,
            ApiError::Status { .. } | ApiError::Rejected { .. } | ApiError::Decode { .. } => {
                FailureKind::Server
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base: reqwest::Url,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let trimmed = base_url.trim();
        let with_slash = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        let base = reqwest::Url::parse(&with_slash).map_err(|_| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
            });
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(concat!(
                "collegerec/",
                env!("CARGO_PKG_VERSION")
            )),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| ApiError::ClientBuild { source })?;

        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        self.base
            .join(path)
            .map_err(|_| ApiError::InvalidBaseUrl {
                url: self.base.to_string(),
            })
    }

    async fn with_deadline<T, F>(&self, endpoint: &reqwest::Url, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let started = Instant::now();
        let out = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout {
                endpoint: endpoint.to_string(),
                after_ms: self.timeout.as_millis() as u64,
            }),
        };
        debug!(
            endpoint = %endpoint,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = out.is_ok(),
            "request finished"
        );
        out
    }

    fn transport_error(endpoint: &reqwest::Url, source: reqwest::Error) -> ApiError {
        ApiError::Network {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    pub async fn states(&self) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint("api/states")?;
        self.with_deadline(&url, async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| Self::transport_error(&url, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::Status {
                    endpoint: url.to_string(),
                    status: status.as_u16(),
                    message: None,
                });
            }
            response
                .json::<Vec<String>>()
                .await
                .map_err(|source| ApiError::Decode {
                    endpoint: url.to_string(),
                    source,
                })
        })
        .await
    }

    pub async fn health(&self) -> Result<String, ApiError> {
        let url = self.endpoint("api/health")?;
        self.with_deadline(&url, async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| Self::transport_error(&url, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::Status {
                    endpoint: url.to_string(),
                    status: status.as_u16(),
                    message: None,
                });
            }
            let body = response
                .json::<HealthResponse>()
                .await
                .map_err(|source| ApiError::Decode {
                    endpoint: url.to_string(),
                    source,
                })?;
            Ok(body.status)
        })
        .await
    }

    /// `POST /api/recommend`: the ranked result set for `request`.
    pub async fn recommend(
        &self,
        request: &RecommendRequest,
    ) -> Result<Vec<ScoredEntity>, ApiError> {
        let url = self.endpoint("api/recommend")?;
        self.with_deadline(&url, async {
            let response = self
                .client
                .post(url.clone())
                .json(request)
                .send()
                .await
                .map_err(|e| Self::transport_error(&url, e))?;
            let status = response.status();
            if !status.is_success() {
                let message = response
                    .json::<RecommendResponse>()
                    .await
                    .ok()
                    .and_then(|body| body.error);
                return Err(ApiError::Status {
                    endpoint: url.to_string(),
                    status: status.as_u16(),
                    message,
                });
            }
            let body = response
                .json::<RecommendResponse>()
                .await
                .map_err(|source| ApiError::Decode {
                    endpoint: url.to_string(),
                    source,
                })?;
            if !body.success {
                return Err(ApiError::Rejected {
                    endpoint: url.to_string(),
                    message: body
                        .error
                        .unwrap_or_else(|| "unknown error".to_string()),
                });
            }
            debug!(top_n = request.top_n, returned = body.results.len(), "recommendations received");
            Ok(body.results)
        })
        .await
    }
}
