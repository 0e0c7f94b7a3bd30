//! Shape checks applied to endpoints before they enter the catalog.

use super::types::{NewEndpoint, RegistryError, ResponseVariant};

/// Methods an endpoint may be registered under.
pub const SUPPORTED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Validate a sanitized endpoint payload.
pub fn validate_endpoint(endpoint: &NewEndpoint) -> Result<(), RegistryError> {
    if !SUPPORTED_METHODS.contains(&endpoint.method.as_str()) {
        return Err(RegistryError::Validation(format!(
            "unsupported method '{}' (expected one of {})",
            endpoint.method,
            SUPPORTED_METHODS.join(", ")
        )));
    }

    if endpoint.path.is_empty() || !endpoint.path.starts_with('/') {
        return Err(RegistryError::Validation(format!(
            "path '{}' must be non-empty and start with '/'",
            endpoint.path
        )));
    }

    if endpoint.responses.is_empty() {
        return Err(RegistryError::Validation(
            "at least one response is required".to_string(),
        ));
    }

    for (index, variant) in endpoint.responses.iter().enumerate() {
        validate_variant(variant).map_err(|e| prefix_index(e, index))?;
    }

    let fallbacks = endpoint
        .responses
        .iter()
        .filter(|v| v.is_fallback())
        .count();
    if fallbacks > 1 {
        return Err(RegistryError::Validation(format!(
            "{fallbacks} responses have no 'request' matcher; at most one default response is allowed"
        )));
    }

    Ok(())
}

/// Validate a single response variant.
pub fn validate_variant(variant: &ResponseVariant) -> Result<(), RegistryError> {
    if !(100..=599).contains(&variant.status_code) {
        return Err(RegistryError::Validation(format!(
            "statusCode {} is not a valid HTTP status",
            variant.status_code
        )));
    }

    if let Some(matcher) = &variant.request_matcher {
        if !matcher.is_object() {
            return Err(RegistryError::Validation(
                "'request' matcher must be a JSON object".to_string(),
            ));
        }
    }

    Ok(())
}

fn prefix_index(err: RegistryError, index: usize) -> RegistryError {
    match err {
        RegistryError::Validation(msg) => RegistryError::Validation(format!("responses[{index}]: {msg}")),
        other => other,
    }
}
