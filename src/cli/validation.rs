use crate::cli::args::CliArgs;

pub const MAX_TOP_N: u32 = 200;

pub fn validate_percent(name: &str, value: u32) -> Result<(), String> {
    if value > 100 {
        return Err(format!("invalid {name} {value}, expected 0-100"));
    }
    Ok(())
}

pub fn validate_top_n(value: u32) -> Result<(), String> {
    if value == 0 || value > MAX_TOP_N {
        return Err(format!("invalid top-n {value}, expected 1-{MAX_TOP_N}"));
    }
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if args.list_states && args.health {
        return Err("use either --list-states or --health, not both".to_string());
    }
    if let Some(price) = args.max_price {
        if price == 0 {
            return Err("invalid max-price, expected positive integer".to_string());
        }
    }
    if let Some(grad) = args.min_grad {
        validate_percent("min-grad", grad)?;
    }
    if let Some(retention) = args.min_retention {
        validate_percent("min-retention", retention)?;
    }
    if let Some(top_n) = args.top_n {
        validate_top_n(top_n)?;
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive milliseconds".to_string());
        }
    }
    if !args.msi.is_empty() {
        crate::utils::parse_msi_list(&args.msi).map_err(|e| format!("invalid --msi: {e}"))?;
    }
    if let Some(raw) = args.state.as_deref() {
        crate::utils::parse_state_code(raw).map_err(|e| format!("invalid --state: {e}"))?;
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected text, json or html"
            ));
        }
    }
    Ok(())
}
