// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input validators shared by the intake conversation and the order-creation entry point.

use entoforce_config::model::IntakeConfig;
use entoforce_core::EntoforceError;

const MAX_NAME_LEN: usize = 100;

/// Strip every non-digit and check the digit count.
pub fn normalize_phone(input: &str, config: &IntakeConfig) -> Result<String, EntoforceError> {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < config.min_phone_digits || digits.len() > config.max_phone_digits {
        return Err(EntoforceError::validation(
            "phone",
            "Please enter a valid phone number.",
        ));
    }
    Ok(digits)
}

pub fn validate_address(input: &str, config: &IntakeConfig) -> Result<String, EntoforceError> {
    let address = input.trim();
    if address.chars().count() < config.min_address_len {
        return Err(EntoforceError::validation(
            "address",
            "Please enter your home address.",
        ));
    }
    Ok(address.to_string())
}

pub fn validate_name(input: &str) -> Result<String, EntoforceError> {
    let name = input.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(EntoforceError::validation(
            "name",
            "Please tell us how we should address you.",
        ));
    }
    Ok(name.to_string())
}

/// Treated area in square metres; must be a positive number.
pub fn parse_area(input: &str) -> Result<String, EntoforceError> {
    match parse_number(input) {
        Some(value) if value > 0.0 => Ok(input.trim().to_string()),
        _ => Err(EntoforceError::validation(
            "area",
            "Please enter the area in square metres as a positive number.",
        )),
    }
}

/// Estimated cost; zero is allowed.
pub fn parse_cost(input: &str) -> Result<String, EntoforceError> {
    match parse_number(input) {
        Some(value) if value >= 0.0 => Ok(input.trim().to_string()),
        _ => Err(EntoforceError::validation(
            "estimated_cost",
            "Please enter the estimated cost as a number.",
        )),
    }
}

fn parse_number(input: &str) -> Option<f64> {
    let value: f64 = input.trim().replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_is_reduced_to_digits() {
        let config = IntakeConfig::default();
        assert_eq!(
            normalize_phone("+1 (555) 123-4567", &config).unwrap(),
            "15551234567"
        );
        assert_eq!(normalize_phone("5551234567", &config).unwrap(), "5551234567");
    }

    #[test]
    fn phone_digit_bounds_are_inclusive() {
        let config = IntakeConfig::default();
        assert!(normalize_phone("123456789", &config).is_err());
        assert!(normalize_phone("1234567890", &config).is_ok());
        assert!(normalize_phone("123456789012345", &config).is_ok());
        assert!(normalize_phone("1234567890123456", &config).is_err());
        let err = normalize_phone("not a phone", &config).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn address_needs_minimum_length_after_trim() {
        let config = IntakeConfig::default();
        assert!(validate_address("   abc   ", &config).is_err());
        assert_eq!(validate_address(" 12 Elm St ", &config).unwrap(), "12 Elm St");
    }

    #[test]
    fn name_must_not_be_blank() {
        assert!(validate_name("   ").is_err());
        assert_eq!(validate_name(" Anna ").unwrap(), "Anna");
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn area_and_cost_are_numbers() {
        assert_eq!(parse_area("42,5").unwrap(), "42,5");
        assert!(parse_area("0").is_err());
        assert!(parse_area("big").is_err());
        assert!(parse_cost("0").is_ok());
        assert!(parse_cost("-5").is_err());
        assert!(parse_cost("inf").is_err());
    }
}
