pub mod report;

use serde::Serialize;

use crate::api::ScoredEntity;
use crate::dashboard::DashboardUrls;
use crate::presenter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

#[derive(Clone, Debug, Serialize)]
pub struct OutputRecord {
    pub rank: usize,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub region: Option<String>,
    pub msi_status: Option<String>,
    pub match_percent: u8,
    pub hybrid_score: f64,
    pub net_price: f64,
    pub affordability_gap: f64,
    pub grad_rate: f64,
    pub pell_grad_rate: f64,
    pub retention_rate: f64,
    pub pell_share: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub records: Vec<OutputRecord>,
    pub dashboards: Option<DashboardUrls>,
}

pub fn build_report(results: &[ScoredEntity], dashboards: Option<&DashboardUrls>) -> Report {
    let records = results
        .iter()
        .zip(presenter::normalize(results))
        .enumerate()
        .map(|(i, (r, score))| OutputRecord {
            rank: i + 1,
            name: r.name.clone(),
            city: r.city.clone(),
            state: r.state.clone(),
            region: r.region.clone(),
            msi_status: r.msi_status.clone(),
            match_percent: score.percent,
            hybrid_score: r.score,
            net_price: r.net_price,
            affordability_gap: r.affordability_gap,
            grad_rate: r.grad_rate,
            pell_grad_rate: r.pell_grad_rate,
            retention_rate: r.retention_rate,
            pell_share: r.pell_share,
        })
        .collect();
    Report {
        records,
        dashboards: dashboards.cloned(),
    }
}

pub fn render_text(report: &Report) -> Vec<u8> {
    let mut out = String::new();
    if report.records.is_empty() {
        out.push_str(presenter::EMPTY_MESSAGE);
        out.push('\n');
    }
    for r in &report.records {
        out.push_str(&format!("{}\t{}\t{}%\n", r.rank, r.name, r.match_percent));
    }
    if let Some(d) = &report.dashboards {
        out.push('\n');
        out.push_str(&d.primary);
        out.push('\n');
        out.push_str(&d.secondary);
        out.push('\n');
    }
    out.into_bytes()
}

pub fn render_json(report: &Report) -> Vec<u8> {
    serde_json::to_vec_pretty(report).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render_html(report: &Report) -> Vec<u8> {
    report::render_html(report)
}

pub fn render(report: &Report, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_text(report),
        OutputFormat::Json => render_json(report),
        OutputFormat::Html => render_html(report),
    }
}
