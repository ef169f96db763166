// Error handling utilities for consistent error messages and exit codes

use crate::models::StageType;
use std::process;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, rejected mutations, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exit with an internal error (exit code >1)
/// Internal errors are for unexpected system failures, unreadable config, etc.
pub fn internal_error(message: &str) -> ! {
    eprintln!("Internal error: {}", message);
    process::exit(2);
}

/// Validate that an entity ID is valid (positive integer)
pub fn validate_id(id_str: &str, kind: &str) -> Result<i64, String> {
    id_str.trim().parse::<i64>()
        .map_err(|_| format!("Invalid {} ID: '{}'. {} ID must be a number.", kind, id_str, capitalize(kind)))
        .and_then(|id| {
            if id > 0 {
                Ok(id)
            } else {
                Err(format!("Invalid {} ID: {}. {} ID must be positive.", kind, id, capitalize(kind)))
            }
        })
}

/// Parse a stage position (1-based)
pub fn parse_stage_order(order_str: &str) -> Result<i64, String> {
    order_str.trim().parse::<i64>()
        .map_err(|_| format!("Invalid stage order: '{}'. Order must be a number.", order_str))
        .and_then(|order| {
            if order >= 1 {
                Ok(order)
            } else {
                Err(format!("Invalid stage order: {}. Order starts at 1.", order))
            }
        })
}

/// Parse a stage type (`open`, `won`, `lost`; any case)
pub fn parse_stage_type(type_str: &str) -> Result<StageType, String> {
    StageType::from_str(type_str.trim())
        .ok_or_else(|| format!("Invalid stage type: '{}'. Valid types: open, won, lost", type_str))
}

/// Parse a win probability percentage (0-100, optional trailing `%`)
pub fn parse_probability(prob_str: &str) -> Result<u8, String> {
    let trimmed = prob_str.trim().trim_end_matches('%');
    trimmed.parse::<u8>()
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| format!("Invalid win probability: '{}'. Must be a whole number from 0 to 100.", prob_str))
}

/// Parse a deal amount (`5000`, `5,000.50`, `$1200`)
pub fn parse_amount(amount_str: &str) -> Result<f64, String> {
    let cleaned: String = amount_str.trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(amount),
        _ => Err(format!("Invalid amount: '{}'. Amount must be a number, zero or more.", amount_str)),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
