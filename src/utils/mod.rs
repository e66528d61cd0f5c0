use std::collections::HashSet;

use regex::Regex;

use crate::api::MSI_CATEGORIES;

/// Groups the integer part with commas, e.g. `-1234567` -> `-1,234,567`.
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Whole dollars with a leading `$`: `12000.4` -> `$12,000`, `-950` -> `$-950`.
pub fn format_currency(value: f64) -> String {
    let rounded = if value.is_finite() {
        value.round() as i64
    } else {
        0
    };
    format!("${}", format_thousands(rounded))
}

pub fn format_rate(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{value:.1}%")
}

pub fn parse_msi_list(values: &[String]) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for raw in values {
        for part in raw.split(',') {
            let item = part.trim();
            if item.is_empty() {
                continue;
            }
            let canonical = item.to_ascii_uppercase();
            if !MSI_CATEGORIES.contains(&canonical.as_str()) {
                return Err(format!(
                    "unknown MSI category '{item}' (expected one of {})",
                    MSI_CATEGORIES.join(", ")
                ));
            }
            if seen.insert(canonical.clone()) {
                out.push(canonical);
            }
        }
    }
    Ok(out)
}

pub fn parse_state_code(value: &str) -> Result<Option<String>, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let code = trimmed.to_ascii_uppercase();
    let re = Regex::new(r"^[A-Z]{2}$").map_err(|e| e.to_string())?;
    if !re.is_match(&code) {
        return Err(format!("invalid state code '{trimmed}', expected two letters"));
    }
    Ok(Some(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
        assert_eq!(format_thousands(-45210), "-45,210");
    }

    #[test]
    fn currency_rounds_to_whole_dollars() {
        assert_eq!(format_currency(12000.4), "$12,000");
        assert_eq!(format_currency(12000.5), "$12,001");
        assert_eq!(format_currency(-950.2), "$-950");
        assert_eq!(format_currency(f64::NAN), "$0");
    }

    #[test]
    fn rate_has_one_decimal() {
        assert_eq!(format_rate(65.0), "65.0%");
        assert_eq!(format_rate(71.26), "71.3%");
        assert_eq!(format_rate(f64::INFINITY), "0.0%");
    }

    #[test]
    fn msi_list_accepts_mixed_forms() {
        let parsed =
            parse_msi_list(&["hsi,HBCU".to_string(), " tribal ".to_string(), "HSI".to_string()])
                .unwrap();
        assert_eq!(parsed, vec!["HSI", "HBCU", "TRIBAL"]);
    }

    #[test]
    fn msi_list_rejects_unknown() {
        assert!(parse_msi_list(&["XYZ".to_string()]).is_err());
    }

    #[test]
    fn state_code_parsing() {
        assert_eq!(parse_state_code("").unwrap(), None);
        assert_eq!(parse_state_code(" ca ").unwrap(), Some("CA".to_string()));
        assert!(parse_state_code("Cal").is_err());
        assert!(parse_state_code("C1").is_err());
    }
}
