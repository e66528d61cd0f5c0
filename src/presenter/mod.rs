use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use thiserror::Error;

use crate::api::ScoredEntity;
use crate::dashboard::{DashboardFrame, FilterDecision};
use crate::runner::SubmitError;
use crate::utils::{format_currency, format_rate};

pub const EMPTY_MESSAGE: &str = "No colleges found matching your criteria.";

pub const SCROLL_HINT_MIN: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NormalizedScore {
    pub name: String,
    pub percent: u8,
}

fn score_bounds(results: &[ScoredEntity]) -> Option<(f64, f64)> {
    results
        .iter()
        .map(|e| e.score)
        .filter(|s| s.is_finite())
        .fold(None, |acc, s| match acc {
            None => Some((s, s)),
            Some((lo, hi)) => Some((f64::min(lo, s), f64::max(hi, s))),
        })
}

fn to_percentage(score: f64, bounds: Option<(f64, f64)>) -> u8 {
    if !score.is_finite() {
        return 1;
    }
    let Some((min, max)) = bounds else {
        return 100;
    };
    // Halved so that a span wider than f64::MAX stays finite.
    let range = max / 2.0 - min / 2.0;
    if range <= 0.0 {
        return 100;
    }
    let scaled = ((score / 2.0 - min / 2.0) / range * 99.0 + 1.0).round();
    scaled.clamp(1.0, 100.0) as u8
}

/// Min-max scales each score into 1..=100, keeping input order.
pub fn normalize(results: &[ScoredEntity]) -> Vec<NormalizedScore> {
    let bounds = score_bounds(results);
    results
        .iter()
        .map(|e| NormalizedScore {
            name: e.name.clone(),
            percent: to_percentage(e.score, bounds),
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CollegeCard {
    pub rank: usize,
    pub name: String,
    pub location: String,
    pub net_price: String,
    pub affordability_gap: String,
    pub gap_favourable: bool,
    pub grad_rate: String,
    pub pell_grad_rate: String,
    pub retention_rate: String,
    pub pell_share: String,
    pub match_percent: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultsView {
    Empty,
    Cards {
        hint: Option<String>,
        cards: Vec<CollegeCard>,
    },
}

pub fn build_view(results: &[ScoredEntity]) -> ResultsView {
    if results.is_empty() {
        return ResultsView::Empty;
    }
    let hint = (results.len() > SCROLL_HINT_MIN)
        .then(|| format!("Showing {} recommendations", results.len()));
    let cards = results
        .iter()
        .zip(normalize(results))
        .enumerate()
        .map(|(i, (college, score))| CollegeCard {
            rank: i + 1,
            name: college.name.clone(),
            location: format!(
                "{}, {} - {}",
                college.city.as_deref().unwrap_or("N/A"),
                college.state.as_deref().unwrap_or_default(),
                college.region.as_deref().unwrap_or_default()
            ),
            net_price: format_currency(college.net_price),
            affordability_gap: format_currency(college.affordability_gap),
            gap_favourable: college.affordability_gap < 0.0,
            grad_rate: format_rate(college.grad_rate),
            pell_grad_rate: format_rate(college.pell_grad_rate),
            retention_rate: format_rate(college.retention_rate),
            pell_share: format_rate(college.pell_share),
            match_percent: score.percent,
        })
        .collect();
    ResultsView::Cards { hint, cards }
}

#[derive(Debug, Error)]
pub enum PresenterError {
    #[error("render surface '{name}' was not provided")]
    MissingSurface { name: &'static str },

    #[error("failed to write to render surface: {source}")]
    Write {
        #[from]
        source: std::io::Error,
    },
}

pub struct PresenterBuilder<W> {
    results: Option<W>,
    color: bool,
}

impl<W: Write> PresenterBuilder<W> {
    pub fn results_surface(mut self, surface: W) -> Self {
        self.results = Some(surface);
        self
    }

    pub fn color(mut self, enabled: bool) -> Self {
        self.color = enabled;
        self
    }

    pub fn build(self) -> Result<ResultPresenter<W>, PresenterError> {
        let surface = self
            .results
            .ok_or(PresenterError::MissingSurface { name: "results" })?;
        Ok(ResultPresenter {
            surface,
            color: self.color,
        })
    }
}

pub struct ResultPresenter<W> {
    surface: W,
    color: bool,
}

impl<W: Write> ResultPresenter<W> {
    pub fn builder() -> PresenterBuilder<W> {
        PresenterBuilder {
            results: None,
            color: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.surface
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn accent(&self, text: &str) -> String {
        if self.color {
            text.cyan().to_string()
        } else {
            text.to_string()
        }
    }

    fn gap(&self, text: &str, favourable: bool) -> String {
        match (self.color, favourable) {
            (false, _) => text.to_string(),
            (true, true) => text.green().to_string(),
            (true, false) => text.red().to_string(),
        }
    }

    fn warning(&self, text: &str) -> String {
        if self.color {
            text.yellow().bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn render(&mut self, results: &[ScoredEntity]) -> Result<ResultsView, PresenterError> {
        let view = build_view(results);
        match &view {
            ResultsView::Empty => {
                writeln!(self.surface, "{EMPTY_MESSAGE}")?;
            }
            ResultsView::Cards { hint, cards } => {
                if let Some(hint) = hint {
                    writeln!(self.surface, ":: {}", self.accent(hint))?;
                    writeln!(self.surface)?;
                }
                for card in cards {
                    self.write_card(card)?;
                }
            }
        }
        self.surface.flush()?;
        Ok(view)
    }

    fn write_card(&mut self, card: &CollegeCard) -> Result<(), PresenterError> {
        let title = self.heading(&format!("#{} - {}", card.rank, card.name));
        let gap = self.gap(&card.affordability_gap, card.gap_favourable);
        let score = self.accent(&format!("{}%", card.match_percent));
        writeln!(self.surface, "{title}")?;
        writeln!(self.surface, "   {}", card.location)?;
        writeln!(
            self.surface,
            "   Net Price {:<10} Affordability Gap {}",
            card.net_price, gap
        )?;
        writeln!(
            self.surface,
            "   Graduation {:<7} Pell Grad (6yr) {:<7} Retention {:<7} Pell Students {}",
            card.grad_rate, card.pell_grad_rate, card.retention_rate, card.pell_share
        )?;
        writeln!(self.surface, "   Match Score {score}")?;
        writeln!(self.surface)?;
        Ok(())
    }

    pub fn render_dashboards(
        &mut self,
        frames: &[DashboardFrame; 2],
        decision: Option<&FilterDecision>,
    ) -> Result<(), PresenterError> {
        let status = decision
            .map(|d| d.describe())
            .unwrap_or_else(|| "unfiltered".to_string());
        writeln!(self.surface, "{}", self.heading(&format!("Dashboards: {status}")))?;
        for frame in frames {
            writeln!(self.surface, ":: {:<11}: {}", frame.label, frame.src())?;
        }
        self.surface.flush()?;
        Ok(())
    }

    pub fn render_notice(&mut self, text: &str) -> Result<(), PresenterError> {
        writeln!(self.surface, "{}", self.warning(text))?;
        Ok(())
    }

    pub fn render_failure(&mut self, err: &SubmitError) -> Result<(), PresenterError> {
        writeln!(self.surface, "{}", self.warning(&err.user_message()))?;
        writeln!(self.surface, "Troubleshooting tips:")?;
        for tip in SubmitError::troubleshooting_tips() {
            writeln!(self.surface, "  - {tip}")?;
        }
        self.surface.flush()?;
        Ok(())
    }
}
