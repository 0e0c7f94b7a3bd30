//! Request matching against the endpoint catalog.
//!
//! Matching is a pure function of the catalog snapshot and the request: no clock,
//! no randomness, no I/O.
//!
//! 1. Find the endpoint whose (method, path, project) equals the request's. Paths are
//!    compared exactly; there is no templating.
//! 2. Among its variants, the first one whose `request` matcher structurally equals the
//!    request body wins.
//! 3. Otherwise the first variant without a matcher is the fallback.

use crate::registry::{Endpoint, ResponseVariant};
use crate::request::NormalizedRequest;
use serde_json::{Number, Value};

/// A selected variant, borrowed from the catalog snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub endpoint: &'a Endpoint,
    pub variant_index: usize,
    pub variant: &'a ResponseVariant,
}

/// Find the response variant that applies to `request`.
pub fn find_match<'a>(endpoints: &'a [Endpoint], request: &NormalizedRequest) -> Option<Match<'a>> {
    // The registry keeps identities unique; if that ever breaks, the first one wins.
    let endpoint = endpoints
        .iter()
        .find(|e| e.has_identity(&request.method, &request.path, &request.project))?;

    let variant_index = select_variant(&endpoint.responses, &request.body)?;
    Some(Match {
        endpoint,
        variant_index,
        variant: &endpoint.responses[variant_index],
    })
}

/// Pick a variant index for `body`: first structural match, else first fallback.
pub fn select_variant(variants: &[ResponseVariant], body: &Value) -> Option<usize> {
    variants
        .iter()
        .position(|v| {
            v.request_matcher
                .as_ref()
                .is_some_and(|expected| structurally_equal(body, expected))
        })
        .or_else(|| variants.iter().position(ResponseVariant::is_fallback))
}

/// Deep JSON equality where object key order is irrelevant and numbers compare by
/// value (`7` equals `7.0`). Arrays stay order-sensitive.
pub fn structurally_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| structurally_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && b.iter().all(|(key, expected_val)| {
                    a.get(key)
                        .is_some_and(|actual_val| structurally_equal(actual_val, expected_val))
                })
        }
        _ => false,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
