use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Barrier;

use crate::api::{ApiClient, ApiError, FailureKind, RecommendRequest};
use crate::dashboard::FilterDecision;
use crate::runner::{Options, Runner, SubmitOutcome, Submission};

#[derive(Clone, Debug)]
struct StubRequest {
    method: String,
    path: String,
    body: String,
}

impl StubRequest {
    fn top_n(&self) -> Option<u64> {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()?
            .get("topN")?
            .as_u64()
    }
}

#[derive(Clone, Debug)]
struct StubReply {
    status: u16,
    body: String,
    delay: Duration,
}

impl StubReply {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<StubRequest>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = end + 4;
        if buf.len() < body_start + content_length {
            continue;
        }
        let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
        let method = request_line.next().unwrap_or_default().to_string();
        let path = request_line.next().unwrap_or_default().to_string();
        let body =
            String::from_utf8_lossy(&buf[body_start..body_start + content_length]).to_string();
        return Ok(Some(StubRequest { method, path, body }));
    }
}

/// Serves canned JSON replies on 127.0.0.1. With a gate, every connection
/// waits at the barrier before replying.
async fn spawn_stub_with<F>(handler: F, gate: Option<Arc<Barrier>>) -> String
where
    F: Fn(&StubRequest) -> StubReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            let gate = gate.clone();
            tokio::spawn(async move {
                let Ok(Some(request)) = read_request(&mut stream).await else {
                    return;
                };
                let reply = handler(&request);
                if let Some(gate) = gate {
                    gate.wait().await;
                }
                tokio::time::sleep(reply.delay).await;
                let head = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    reply.status,
                    reply.body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(reply.body.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    format!("http://{addr}/")
}

async fn spawn_stub<F>(handler: F) -> String
where
    F: Fn(&StubRequest) -> StubReply + Send + Sync + 'static,
{
    spawn_stub_with(handler, None).await
}

fn college(name: &str, score: f64) -> serde_json::Value {
    json!({
        "Institution Name": name,
        "State Abbreviation": "TX",
        "Net Price": 14500.0,
        "MSI Status": "HSI",
        "First-Time, Full-Time Retention Rate": 78.0,
        "Bachelor's Degree Graduation Rate Bachelor Degree Within 6 Years - Total": 61.5,
        "Region": "Southwest",
        "HybridScore": score,
        "City": "Austin",
        "Affordability Gap (net price minus income earned working 10 hrs at min wage)": -350.0,
        "Percent of First-Time, Full-Time Undergraduates Awarded Pell Grants": 44.0,
        "Percent Full-time, First-time, Pell Grant Recipients Receiving an Award - 6 Years": 55.0
    })
}

fn colleges(n: usize) -> Vec<serde_json::Value> {
    (0..n)
        .map(|i| college(&format!("College {i}"), 1.0 - i as f64 * 0.01))
        .collect()
}

fn ok_results(results: Vec<serde_json::Value>) -> StubReply {
    StubReply::json(200, json!({ "success": true, "results": results }))
}

fn runner_for(api_url: String, timeout_ms: u64) -> Runner {
    Runner::new(Options {
        api_url,
        timeout_ms,
        ..Options::default()
    })
    .unwrap()
}

fn completed(outcome: SubmitOutcome) -> Box<Submission> {
    match outcome {
        SubmitOutcome::Completed(submission) => submission,
        SubmitOutcome::Superseded { .. } => panic!("unexpected superseded outcome"),
    }
}

#[tokio::test]
async fn recommend_posts_criteria_and_parses_results() {
    let seen: Arc<Mutex<Vec<StubRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_by_stub = Arc::clone(&seen);
    let url = spawn_stub(move |req| {
        seen_by_stub.lock().unwrap().push(req.clone());
        ok_results(vec![college("Alpha U", 1.5), college("Beta College", 0.5)])
    })
    .await;

    let client = ApiClient::new(&url, Duration::from_secs(5)).unwrap();
    let request = RecommendRequest {
        preferred_state: Some("TX".to_string()),
        ..RecommendRequest::default()
    };
    let results = client.recommend(&request).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "Alpha U");
    assert_eq!(results[0].city.as_deref(), Some("Austin"));
    assert_eq!(results[1].score, 0.5);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/api/recommend");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["preferredState"], "TX");
    assert_eq!(body["topN"], 10);
}

#[tokio::test]
async fn states_and_health_endpoints() {
    let url = spawn_stub(|req| match req.path.as_str() {
        "/api/states" => StubReply::json(200, json!(["CA", "NY", "TX"])),
        "/api/health" => StubReply::json(200, json!({ "status": "healthy" })),
        _ => StubReply::json(404, json!({})),
    })
    .await;

    let client = ApiClient::new(&url, Duration::from_secs(5)).unwrap();
    assert_eq!(client.states().await.unwrap(), vec!["CA", "NY", "TX"]);
    assert_eq!(client.health().await.unwrap(), "healthy");
}

#[tokio::test]
async fn error_status_keeps_backend_message() {
    let url = spawn_stub(|_| {
        StubReply::json(400, json!({ "success": false, "error": "bad criteria" }))
    })
    .await;
    let client = ApiClient::new(&url, Duration::from_secs(5)).unwrap();
    let err = client
        .recommend(&RecommendRequest::default())
        .await
        .unwrap_err();
    match &err {
        ApiError::Status {
            status, message, ..
        } => {
            assert_eq!(*status, 400);
            assert_eq!(message.as_deref(), Some("bad criteria"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), FailureKind::Server);
}

#[tokio::test]
async fn unsuccessful_payload_is_a_server_error() {
    let url = spawn_stub(|_| {
        StubReply::json(200, json!({ "success": false, "error": "model not loaded" }))
    })
    .await;
    let client = ApiClient::new(&url, Duration::from_secs(5)).unwrap();
    let err = client
        .recommend(&RecommendRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(&err, ApiError::Rejected { message, .. } if message == "model not loaded"));
    assert_eq!(err.kind(), FailureKind::Server);
}

#[tokio::test]
async fn slow_backend_times_out() {
    let url =
        spawn_stub(|_| ok_results(colleges(1)).delayed(Duration::from_secs(5))).await;
    let client = ApiClient::new(&url, Duration::from_millis(150)).unwrap();
    let err = client
        .recommend(&RecommendRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Timeout { after_ms: 150, .. }));
    assert_eq!(err.kind(), FailureKind::Timeout);
}

#[tokio::test]
async fn closed_port_is_a_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    let err = client
        .recommend(&RecommendRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Network { .. }));
    assert_eq!(err.kind(), FailureKind::Network);
}

#[tokio::test]
async fn submit_fans_out_and_filters_dashboards() {
    let top_ns: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&top_ns);
    let gate = Arc::new(Barrier::new(2));
    let url = spawn_stub_with(
        move |req| {
            let top_n = req.top_n().unwrap_or(0);
            recorded.lock().unwrap().push(top_n);
            if top_n == 200 {
                ok_results(colleges(200))
            } else {
                ok_results(vec![
                    college("Alpha U", 10.0),
                    college("Beta College", 10.0),
                    college("Gamma Inst", 10.0),
                ])
            }
        },
        Some(gate),
    )
    .await;

    let mut runner = runner_for(url, 5_000);
    let submission = completed(runner.submit(&RecommendRequest::default()).await.unwrap());

    let mut top_ns = top_ns.lock().unwrap().clone();
    top_ns.sort_unstable();
    assert_eq!(top_ns, vec![10, 200]);

    assert_eq!(submission.results.len(), 3);
    assert_eq!(submission.extended_count, Some(200));
    let percents: Vec<u8> = crate::presenter::normalize(&submission.results)
        .into_iter()
        .map(|s| s.percent)
        .collect();
    assert_eq!(percents, vec![100, 100, 100]);

    let urls = submission.dashboards.unwrap();
    assert_eq!(urls.decision, FilterDecision::Applied { entities: 3 });
    let filter = "Institution%20Name=Alpha%20U%2CBeta%20College%2CGamma%20Inst";
    assert!(urls.primary.contains(filter));
    assert!(urls.secondary.contains(filter));
    assert_eq!(runner.syncer().frames()[1].src(), urls.secondary);
}

#[tokio::test]
async fn single_result_with_empty_extended_set() {
    let url = spawn_stub(|req| {
        if req.top_n() == Some(200) {
            ok_results(Vec::new())
        } else {
            ok_results(vec![college("Solo College", 50.0)])
        }
    })
    .await;

    let mut runner = runner_for(url, 5_000);
    let submission = completed(runner.submit(&RecommendRequest::default()).await.unwrap());
    let normalized = crate::presenter::normalize(&submission.results);
    assert_eq!(normalized[0].percent, 100);
    assert_eq!(submission.extended_count, Some(0));
    let urls = submission.dashboards.unwrap();
    assert!(urls.primary.contains("Institution%20Name=Solo%20College&"));
}

#[tokio::test]
async fn extended_failure_still_shows_results() {
    let url = spawn_stub(|req| {
        if req.top_n() == Some(200) {
            StubReply::json(500, json!({ "success": false, "error": "overloaded" }))
        } else {
            ok_results(colleges(4))
        }
    })
    .await;

    let mut runner = runner_for(url, 5_000);
    let submission = completed(runner.submit(&RecommendRequest::default()).await.unwrap());
    assert_eq!(submission.results.len(), 4);
    assert!(submission.dashboards.is_none());
    assert!(submission.extended_count.is_none());
    assert!(runner.syncer().frames()[0].src().ends_with(":refresh=yes"));
}

#[tokio::test]
async fn large_display_set_loads_unfiltered_dashboards() {
    let url = spawn_stub(|req| {
        if req.top_n() == Some(200) {
            ok_results(colleges(200))
        } else {
            ok_results(colleges(25))
        }
    })
    .await;

    let mut runner = runner_for(url, 5_000);
    let request = RecommendRequest {
        top_n: 25,
        ..RecommendRequest::default()
    };
    let submission = completed(runner.submit(&request).await.unwrap());
    let urls = submission.dashboards.unwrap();
    assert_eq!(urls.decision, FilterDecision::TooMany { entities: 25 });
    assert!(!urls.primary.contains("Institution%20Name"));
    assert!(!urls.secondary.contains("Institution%20Name"));
}

#[tokio::test]
async fn primary_timeout_fails_submission_with_timeout_message() {
    let url = spawn_stub(|req| {
        if req.top_n() == Some(200) {
            ok_results(colleges(200))
        } else {
            ok_results(colleges(3)).delayed(Duration::from_secs(5))
        }
    })
    .await;

    let mut runner = runner_for(url, 200);
    let err = runner
        .submit(&RecommendRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Timeout);
    assert!(err.user_message().starts_with("Request timed out."));
    assert!(runner.syncer().last_decision().is_none());
}

#[tokio::test]
async fn connection_failure_message_differs_from_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut runner = runner_for(format!("http://{addr}/"), 200);
    let err = runner
        .submit(&RecommendRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Network);
    assert!(err.user_message().starts_with("Cannot reach the server."));
    assert!(err.user_message().contains(&addr.to_string()));
}

#[tokio::test]
async fn primary_server_error_fails_submission() {
    let url = spawn_stub(|req| {
        if req.top_n() == Some(200) {
            ok_results(colleges(200))
        } else {
            StubReply::json(200, json!({ "success": false, "error": "bad criteria" }))
        }
    })
    .await;

    let mut runner = runner_for(url, 5_000);
    let err = runner
        .submit(&RecommendRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Server);
    assert_eq!(err.user_message(), "Server error: bad criteria.");
}
