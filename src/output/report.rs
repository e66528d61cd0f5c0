use super::Report;
use crate::presenter;
use crate::utils::{format_currency, format_rate};

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn render_cards(report: &Report) -> String {
    if report.records.is_empty() {
        return format!("<p>{}</p>", escape_html(presenter::EMPTY_MESSAGE));
    }
    let mut out = String::new();
    if report.records.len() > presenter::SCROLL_HINT_MIN {
        out.push_str(&format!(
            "<div class=\"hint\">Showing {} recommendations</div>\n",
            report.records.len()
        ));
    }
    for r in &report.records {
        let gap_class = if r.affordability_gap < 0.0 {
            "good"
        } else {
            "bad"
        };
        out.push_str(&format!(
            r#"<div class="college-card">
  <h3>#{rank} - {name}</h3>
  <p class="college-info">{city}, {state} - {region}</p>
  <div class="stats">
    <div class="stat"><div class="stat-label">Net Price</div><div class="stat-value">{price}</div></div>
    <div class="stat"><div class="stat-label">Affordability Gap</div><div class="stat-value {gap_class}">{gap}</div></div>
    <div class="stat"><div class="stat-label">Graduation Rate</div><div class="stat-value">{grad}</div></div>
    <div class="stat"><div class="stat-label">Pell Grad Rate (6yr)</div><div class="stat-value">{pell_grad}</div></div>
    <div class="stat"><div class="stat-label">Retention Rate</div><div class="stat-value">{retention}</div></div>
    <div class="stat"><div class="stat-label">% Pell Students</div><div class="stat-value">{pell}</div></div>
    <div class="stat"><div class="stat-label">Match Score</div><div class="stat-value match">{score}%</div></div>
  </div>
</div>
"#,
            rank = r.rank,
            name = escape_html(&r.name),
            city = escape_html(r.city.as_deref().unwrap_or("N/A")),
            state = escape_html(r.state.as_deref().unwrap_or_default()),
            region = escape_html(r.region.as_deref().unwrap_or_default()),
            price = format_currency(r.net_price),
            gap = format_currency(r.affordability_gap),
            grad = format_rate(r.grad_rate),
            pell_grad = format_rate(r.pell_grad_rate),
            retention = format_rate(r.retention_rate),
            pell = format_rate(r.pell_share),
            score = r.match_percent,
        ));
    }
    out
}

fn render_dashboards(report: &Report) -> String {
    match &report.dashboards {
        Some(d) => format!(
            r#"<section class="dashboard-section">
  <h2>Dashboards</h2>
  <p class="decision">{decision}</p>
  <iframe id="dashboard-1" src="{primary}" width="100%" height="720"></iframe>
  <iframe id="dashboard-2" src="{secondary}" width="100%" height="720"></iframe>
</section>"#,
            decision = escape_html(&d.decision.describe()),
            primary = escape_html(&d.primary),
            secondary = escape_html(&d.secondary),
        ),
        None => r#"<section class="dashboard-section"><p>Dashboard data was unavailable for this search.</p></section>"#
            .to_string(),
    }
}

pub fn render_html(report: &Report) -> Vec<u8> {
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title>College Recommendations</title>
  <style>
    body {{ font-family: -apple-system, "Segoe UI", sans-serif; margin: 2rem auto; max-width: 1100px; color: #1d1d1f; }}
    .hint {{ background: #f0f7ff; border: 1px solid #007aff33; border-radius: 6px; padding: .75rem 1rem; margin-bottom: 1rem; text-align: center; color: #007aff; }}
    .college-card {{ border: 1px solid #e5e5ea; border-radius: 8px; padding: 1rem 1.25rem; margin-bottom: 1rem; }}
    .college-info {{ color: #6e6e73; margin-top: 0; }}
    .stats {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(140px, 1fr)); gap: .75rem; }}
    .stat-label {{ font-size: .8rem; color: #6e6e73; }}
    .stat-value {{ font-weight: 600; }}
    .good {{ color: #28a745; }}
    .bad {{ color: #dc3545; }}
    .match {{ color: #007aff; }}
    iframe {{ border: 0; margin-bottom: 1.5rem; }}
  </style>
</head>
<body>
  <h1>College Recommendations</h1>
  <section id="results">
{cards}
  </section>
{dashboards}
</body>
</html>
"#,
        cards = render_cards(report),
        dashboards = render_dashboards(report),
    );
    html.into_bytes()
}
