use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{
    self, ApiClient, ApiError, FailureKind, RecommendRequest, ScoredEntity, EXTENDED_TOP_N,
};
use crate::dashboard::{DashboardEndpoints, DashboardError, DashboardSyncer, DashboardUrls};

#[derive(Clone, Debug)]
pub struct Options {
    pub api_url: String,
    pub timeout_ms: u64,
    pub extended_top_n: u32,
    pub dashboards: DashboardEndpoints,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            api_url: api::DEFAULT_API_URL.to_string(),
            timeout_ms: api::DEFAULT_TIMEOUT_MS,
            extended_top_n: EXTENDED_TOP_N,
            dashboards: DashboardEndpoints::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid timeout {value} ms, expected a positive value")]
    InvalidTimeout { value: u64 },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Dashboard(#[from] DashboardError),
}

const TROUBLESHOOTING_TIPS: [&str; 4] = [
    "Make sure the recommendation service is running",
    "Check the --api URL (or api_url in the config file)",
    "Try reducing the number of results (--top-n)",
    "Re-run with -v or -vv for detailed request logs",
];

#[derive(Debug, Error)]
#[error("recommendation request failed: {source}")]
pub struct SubmitError {
    api_url: String,
    #[source]
    source: ApiError,
}

impl SubmitError {
    pub fn new(api_url: &str, source: ApiError) -> Self {
        Self {
            api_url: api_url.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.source.kind()
    }

    pub fn api_error(&self) -> &ApiError {
        &self.source
    }

    pub fn user_message(&self) -> String {
        match self.kind() {
            FailureKind::Timeout => "Request timed out. The server is taking too long to respond. Try reducing the number of results or simplifying your search.".to_string(),
            FailureKind::Network => format!(
                "Cannot reach the server. Make sure the recommendation service is running at {}.",
                self.api_url
            ),
            FailureKind::Server => match &self.source {
                ApiError::Rejected { message, .. } => format!("Server error: {message}."),
                other => format!("Server error: {other}."),
            },
        }
    }

    pub fn troubleshooting_tips() -> &'static [&'static str] {
        &TROUBLESHOOTING_TIPS
    }
}

#[derive(Debug)]
pub struct Fetched {
    pub results: Vec<ScoredEntity>,
    pub extended: Result<Vec<ScoredEntity>, ApiError>,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubmissionToken(u64);

/// Orders completions of overlapping submissions. A completion older than
/// the last committed one is dropped.
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    issued: u64,
    committed: Option<u64>,
}

impl ViewState {
    pub fn begin(&mut self) -> SubmissionToken {
        self.issued += 1;
        SubmissionToken(self.issued)
    }

    pub fn commit(&mut self, token: SubmissionToken) -> bool {
        if self.committed.map_or(false, |c| token.0 < c) {
            return false;
        }
        self.committed = Some(token.0);
        true
    }

    pub fn latest_committed(&self) -> Option<SubmissionToken> {
        self.committed.map(SubmissionToken)
    }
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Completed(Box<Submission>),
    Superseded { token: SubmissionToken },
}

#[derive(Debug)]
pub struct Submission {
    pub token: SubmissionToken,
    pub results: Vec<ScoredEntity>,
    pub dashboards: Option<DashboardUrls>,
    pub extended_count: Option<usize>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct Runner {
    client: ApiClient,
    syncer: DashboardSyncer,
    view: ViewState,
    extended_top_n: u32,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        if options.timeout_ms == 0 {
            return Err(RunnerError::InvalidTimeout {
                value: options.timeout_ms,
            });
        }
        let client = ApiClient::new(&options.api_url, Duration::from_millis(options.timeout_ms))?;
        let syncer = DashboardSyncer::new(options.dashboards)?;
        Ok(Self {
            client,
            syncer,
            view: ViewState::default(),
            extended_top_n: options.extended_top_n,
        })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn syncer(&self) -> &DashboardSyncer {
        &self.syncer
    }

    /// Only a primary failure fails the fetch.
    pub async fn fetch(&self, request: &RecommendRequest) -> Result<Fetched, SubmitError> {
        let started = Instant::now();
        let extended_request = request.with_top_n(self.extended_top_n);
        info!(
            top_n = request.top_n,
            extended_top_n = extended_request.top_n,
            "fetching recommendations"
        );

        let (primary, extended) = futures::future::join(
            self.client.recommend(request),
            self.client.recommend(&extended_request),
        )
        .await;

        let results = primary.map_err(|source| {
            warn!(error = %source, "primary recommendation request failed");
            SubmitError::new(self.client.base_url(), source)
        })?;
        if let Err(e) = &extended {
            warn!(error = %e, "extended fetch failed, recommendations are still shown");
        }

        let elapsed = started.elapsed();
        debug!(elapsed_ms = elapsed.as_millis() as u64, "fetch finished");
        Ok(Fetched {
            results,
            extended,
            elapsed,
        })
    }

    pub fn begin(&mut self) -> SubmissionToken {
        self.view.begin()
    }

    /// Stale completions are dropped, including failed ones.
    pub fn apply(
        &mut self,
        token: SubmissionToken,
        fetched: Result<Fetched, SubmitError>,
    ) -> Result<SubmitOutcome, SubmitError> {
        if !self.view.commit(token) {
            info!(?token, "dropping superseded submission");
            return Ok(SubmitOutcome::Superseded { token });
        }
        let fetched = fetched?;

        let (dashboards, extended_count) = match &fetched.extended {
            Ok(extended) => (
                Some(self.syncer.sync(&fetched.results, extended)),
                Some(extended.len()),
            ),
            Err(_) => {
                warn!("skipping dashboard sync");
                (None, None)
            }
        };

        Ok(SubmitOutcome::Completed(Box::new(Submission {
            token,
            results: fetched.results,
            dashboards,
            extended_count,
            elapsed: fetched.elapsed,
        })))
    }

    pub async fn submit(&mut self, request: &RecommendRequest) -> Result<SubmitOutcome, SubmitError> {
        let token = self.begin();
        let fetched = self.fetch(request).await;
        self.apply(token, fetched)
    }
}
