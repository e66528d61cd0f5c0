use itertools::Itertools;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::ScoredEntity;

pub const DEFAULT_DASHBOARD_1: &str = "https://public.tableau.com/views/ProccessedBook/Dashboard1";
pub const DEFAULT_DASHBOARD_2: &str = "https://public.tableau.com/views/ProccessedBook/Dashboard2";
pub const DEFAULT_FILTER_PARAM: &str = "Institution Name";

pub const MAX_URL_LEN: usize = 2000;
pub const MAX_FILTERED_ENTITIES: usize = 20;

const EMBED_PARAMS: &str = ":language=en-US&:embed=y&:display_count=n&:showVizHome=no";
const REFRESH_PARAM: &str = ":refresh=yes";

/// Characters left untouched by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("dashboard endpoint {slot} is empty")]
    MissingEndpoint { slot: usize },

    #[error("dashboard endpoint {slot} is not an absolute http(s) URL: {url}")]
    InvalidEndpoint { slot: usize, url: String },

    #[error("dashboard filter parameter name is empty")]
    EmptyFilterParam,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardEndpoints {
    pub primary: String,
    pub secondary: String,
    pub filter_param: String,
}

impl Default for DashboardEndpoints {
    fn default() -> Self {
        Self {
            primary: DEFAULT_DASHBOARD_1.to_string(),
            secondary: DEFAULT_DASHBOARD_2.to_string(),
            filter_param: DEFAULT_FILTER_PARAM.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum FilterDecision {
    Applied { entities: usize },
    NoResults,
    TooMany { entities: usize },
    TooLong { length: usize },
    ConstructionFailed { reason: String },
}

impl FilterDecision {
    pub fn is_filtered(&self) -> bool {
        matches!(self, FilterDecision::Applied { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            FilterDecision::Applied { entities } => {
                format!("filtered to {entities} colleges")
            }
            FilterDecision::NoResults => "unfiltered (no results to filter on)".to_string(),
            FilterDecision::TooMany { entities } => {
                format!("unfiltered ({entities} colleges is too many for URL filtering)")
            }
            FilterDecision::TooLong { length } => {
                format!("unfiltered (filtered URL would be {length} chars)")
            }
            FilterDecision::ConstructionFailed { .. } => {
                "unfiltered (filter could not be built)".to_string()
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardUrls {
    pub primary: String,
    pub secondary: String,
    #[serde(flatten)]
    pub decision: FilterDecision,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardFrame {
    pub label: &'static str,
    src: String,
}

impl DashboardFrame {
    pub fn src(&self) -> &str {
        &self.src
    }
}

#[derive(Clone, Debug)]
pub struct DashboardSyncer {
    endpoints: DashboardEndpoints,
    frames: [DashboardFrame; 2],
    last: Option<FilterDecision>,
}

fn validate_endpoint(slot: usize, raw: &str) -> Result<String, DashboardError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DashboardError::MissingEndpoint { slot });
    }
    let parsed = reqwest::Url::parse(trimmed).map_err(|_| DashboardError::InvalidEndpoint {
        slot,
        url: trimmed.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
        return Err(DashboardError::InvalidEndpoint {
            slot,
            url: trimmed.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn query_separator(base: &str) -> char {
    if base.contains('?') {
        '&'
    } else {
        '?'
    }
}

fn unfiltered_url(base: &str) -> String {
    format!(
        "{base}{}{EMBED_PARAMS}&{REFRESH_PARAM}",
        query_separator(base)
    )
}

fn filtered_url(base: &str, param: &str, value: &str) -> String {
    format!(
        "{base}{}{param}={value}&{EMBED_PARAMS}",
        query_separator(base)
    )
}

impl DashboardSyncer {
    pub fn new(endpoints: DashboardEndpoints) -> Result<Self, DashboardError> {
        let primary = validate_endpoint(1, &endpoints.primary)?;
        let secondary = validate_endpoint(2, &endpoints.secondary)?;
        let filter_param = endpoints.filter_param.trim().to_string();
        if filter_param.is_empty() {
            return Err(DashboardError::EmptyFilterParam);
        }
        let frames = [
            DashboardFrame {
                label: "Dashboard 1",
                src: unfiltered_url(&primary),
            },
            DashboardFrame {
                label: "Dashboard 2",
                src: unfiltered_url(&secondary),
            },
        ];
        Ok(Self {
            endpoints: DashboardEndpoints {
                primary,
                secondary,
                filter_param,
            },
            frames,
            last: None,
        })
    }

    pub fn endpoints(&self) -> &DashboardEndpoints {
        &self.endpoints
    }

    pub fn frames(&self) -> &[DashboardFrame; 2] {
        &self.frames
    }

    pub fn last_decision(&self) -> Option<&FilterDecision> {
        self.last.as_ref()
    }

    fn unfiltered(&self, decision: FilterDecision) -> DashboardUrls {
        DashboardUrls {
            primary: unfiltered_url(&self.endpoints.primary),
            secondary: unfiltered_url(&self.endpoints.secondary),
            decision,
        }
    }

    // Endpoints are validated in `new`, so this only fails for a syncer
    // built around an unchecked base.
    fn try_filtered(&self, shown: &[ScoredEntity]) -> Result<(String, String), String> {
        let joined = shown.iter().map(|e| e.name.as_str()).join(",");
        let value = encode_component(&joined);
        let param = encode_component(&self.endpoints.filter_param);
        let primary = filtered_url(&self.endpoints.primary, &param, &value);
        let secondary = filtered_url(&self.endpoints.secondary, &param, &value);
        for url in [&primary, &secondary] {
            reqwest::Url::parse(url).map_err(|e| format!("{e}"))?;
        }
        Ok((primary, secondary))
    }

    /// `extended` only feeds the size report in the logs.
    pub fn build_dashboard_urls(
        &self,
        shown: &[ScoredEntity],
        extended: &[ScoredEntity],
    ) -> DashboardUrls {
        info!(
            shown = shown.len(),
            extended = extended.len(),
            "refreshing dashboards"
        );

        if shown.is_empty() {
            info!("no results to filter on, loading base dashboards");
            return self.unfiltered(FilterDecision::NoResults);
        }

        if shown.len() > MAX_FILTERED_ENTITIES {
            info!(
                entities = shown.len(),
                limit = MAX_FILTERED_ENTITIES,
                "too many colleges for URL filtering, loading base dashboards"
            );
            return self.unfiltered(FilterDecision::TooMany {
                entities: shown.len(),
            });
        }

        let (primary, secondary) = match self.try_filtered(shown) {
            Ok(urls) => urls,
            Err(reason) => {
                warn!(%reason, "error building dashboard URLs, loading base dashboards");
                return self.unfiltered(FilterDecision::ConstructionFailed { reason });
            }
        };

        let longest = primary.len().max(secondary.len());
        if longest >= MAX_URL_LEN {
            info!(
                length = longest,
                limit = MAX_URL_LEN,
                "filtered URL too long, loading base dashboards"
            );
            return self.unfiltered(FilterDecision::TooLong { length: longest });
        }

        info!(
            entities = shown.len(),
            "applying URL filter to both dashboards"
        );
        DashboardUrls {
            primary,
            secondary,
            decision: FilterDecision::Applied {
                entities: shown.len(),
            },
        }
    }

    pub fn sync(&mut self, shown: &[ScoredEntity], extended: &[ScoredEntity]) -> DashboardUrls {
        let urls = self.build_dashboard_urls(shown, extended);
        self.frames[0].src = urls.primary.clone();
        self.frames[1].src = urls.secondary.clone();
        self.last = Some(urls.decision.clone());
        urls
    }
}
