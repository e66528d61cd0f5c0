use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::{self, RecommendRequest};
use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::dashboard::{self, DashboardEndpoints};
use crate::output::{self, OutputFormat};
use crate::presenter::ResultPresenter;
use crate::runner::{Options, Runner, SubmitError, SubmitOutcome};
use crate::utils;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,collegerec={level}")));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn summarize_request(request: &RecommendRequest) -> String {
    let mut parts = vec![
        format!("max price {}", utils::format_currency(request.max_net_price as f64)),
        format!("grad >= {}%", request.min_grad_rate),
        format!("retention >= {}%", request.min_retention),
        format!("top {}", request.top_n),
    ];
    if !request.msi_preferences.is_empty() {
        parts.push(format!("msi {}", request.msi_preferences.join(",")));
    }
    if let Some(state) = request.preferred_state.as_deref() {
        parts.push(format!("state {state}"));
    }
    parts.push(format!("pell focus {}", format_bool(request.focus_pell)));
    parts.join(" | ")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Recommend,
    ListStates,
    Health,
}

#[derive(Clone, Debug)]
struct RunConfig {
    action: Action,
    request: RecommendRequest,
    options: Options,
    output: Option<String>,
    output_format: OutputFormat,
    no_color: bool,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let action = if args.list_states {
        Action::ListStates
    } else if args.health {
        Action::Health
    } else {
        Action::Recommend
    };

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    let max_net_price = args
        .max_price
        .or(cfg.max_net_price)
        .unwrap_or(api::DEFAULT_MAX_NET_PRICE);
    if max_net_price == 0 {
        return Err("invalid max_net_price, expected positive integer".to_string());
    }
    let min_grad_rate = args
        .min_grad
        .or(cfg.min_grad_rate)
        .unwrap_or(api::DEFAULT_MIN_GRAD_RATE);
    validation::validate_percent("min_grad_rate", min_grad_rate)?;
    let min_retention = args
        .min_retention
        .or(cfg.min_retention)
        .unwrap_or(api::DEFAULT_MIN_RETENTION);
    validation::validate_percent("min_retention", min_retention)?;
    let top_n = args.top_n.or(cfg.top_n).unwrap_or(api::DEFAULT_TOP_N);
    validation::validate_top_n(top_n)?;

    let msi_raw = if args.msi.is_empty() {
        cfg.msi_preferences.unwrap_or_default()
    } else {
        args.msi
    };
    let msi_preferences = utils::parse_msi_list(&msi_raw)?;

    let preferred_state = match args.state.or(cfg.preferred_state) {
        Some(raw) => utils::parse_state_code(&raw)?,
        None => None,
    };
    let focus_pell = args.focus_pell || cfg.focus_pell.unwrap_or(false);

    let timeout_ms = args
        .timeout
        .or(cfg.timeout_ms)
        .unwrap_or(api::DEFAULT_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err("invalid timeout_ms, expected positive milliseconds".to_string());
    }

    let options = Options {
        api_url: args
            .api
            .or(cfg.api_url)
            .unwrap_or_else(|| api::DEFAULT_API_URL.to_string()),
        timeout_ms,
        extended_top_n: api::EXTENDED_TOP_N,
        dashboards: DashboardEndpoints {
            primary: args
                .dashboard_1
                .or(cfg.dashboard_1)
                .unwrap_or_else(|| dashboard::DEFAULT_DASHBOARD_1.to_string()),
            secondary: args
                .dashboard_2
                .or(cfg.dashboard_2)
                .unwrap_or_else(|| dashboard::DEFAULT_DASHBOARD_2.to_string()),
            filter_param: args
                .filter_param
                .or(cfg.filter_param)
                .unwrap_or_else(|| dashboard::DEFAULT_FILTER_PARAM.to_string()),
        },
    };

    let output = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde_string(&p));
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => OutputFormat::parse(&raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected text, json or html"))?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    Ok(RunConfig {
        action,
        request: RecommendRequest {
            max_net_price,
            min_grad_rate,
            min_retention,
            top_n,
            msi_preferences,
            preferred_state,
            focus_pell,
        },
        options,
        output,
        output_format,
        no_color,
    })
}

fn loading_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Updating dashboards with your recommendations...");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

async fn write_output(path: &str, rendered: &[u8]) -> Result<(), String> {
    let mut outfile = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| format!("failed to open output file: {e}"))?;
    outfile
        .write_all(rendered)
        .await
        .map_err(|e| format!("failed to write output file: {e}"))?;
    Ok(())
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    let mut runner = Runner::new(run.options.clone()).map_err(|e| e.to_string())?;
    let api_url = runner.client().base_url().to_string();

    match run.action {
        Action::Health => {
            let status = runner
                .client()
                .health()
                .await
                .map_err(|e| SubmitError::new(&api_url, e).user_message())?;
            format_kv_line("Service", &api_url);
            format_kv_line("Status", &status);
            return Ok(());
        }
        Action::ListStates => {
            let states = runner
                .client()
                .states()
                .await
                .map_err(|e| SubmitError::new(&api_url, e).user_message())?;
            for state in states {
                println!("{state}");
            }
            return Ok(());
        }
        Action::Recommend => {}
    }

    format_kv_line("Service", &api_url);
    format_kv_line("Criteria", &summarize_request(&run.request));
    println!();

    let mut presenter = ResultPresenter::builder()
        .results_surface(std::io::stdout())
        .color(!run.no_color)
        .build()
        .map_err(|e| e.to_string())?;

    let spinner = loading_spinner();
    let outcome = runner.submit(&run.request).await;
    spinner.finish_and_clear();

    let submission = match outcome {
        Ok(SubmitOutcome::Completed(submission)) => submission,
        Ok(SubmitOutcome::Superseded { token }) => {
            info!(?token, "submission superseded, nothing to render");
            return Ok(());
        }
        Err(e) => {
            error!(error = %e, "submission failed");
            presenter.render_failure(&e).map_err(|e| e.to_string())?;
            return Err(e.to_string());
        }
    };

    presenter
        .render(&submission.results)
        .map_err(|e| e.to_string())?;
    match &submission.dashboards {
        Some(urls) => presenter
            .render_dashboards(runner.syncer().frames(), Some(&urls.decision))
            .map_err(|e| e.to_string())?,
        None => presenter
            .render_notice("Dashboard data could not be fetched; dashboards were not updated.")
            .map_err(|e| e.to_string())?,
    }

    if let Some(path) = run.output.as_deref() {
        let report = output::build_report(&submission.results, submission.dashboards.as_ref());
        write_output(path, &output::render(&report, run.output_format)).await?;
        format_kv_line("Output", path);
    }

    println!();
    println!(
        ":: Completed :: search took {}ms ::",
        submission.elapsed.as_millis()
    );
    Ok(())
}

fn config_path(args: &CliArgs) -> Option<PathBuf> {
    args.config
        .as_deref()
        .map(config::expand_tilde)
        .or_else(config::default_config_path)
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_tracing(args.verbose);

    if args.init_config {
        let path = config_path(&args).ok_or("could not determine a config path")?;
        if config::ensure_default_config_file(&path)? {
            println!("wrote default config to {}", path.display());
        } else {
            println!("config already exists at {}", path.display());
        }
        return Ok(());
    }

    let cfg = match (args.config.as_deref(), config_path(&args)) {
        (Some(_), Some(path)) => config::load_config(&path, false)?,
        (None, Some(path)) => config::load_config(&path, true)?,
        (_, None) => ConfigFile::default(),
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
