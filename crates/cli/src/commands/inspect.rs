use gateway_core::{
    cache::{cache_key, irreversible_ttl, CacheTtl},
    config::AppConfig,
    limits::RequestLimiter,
    types::JsonRpcRequest,
    validation::{
        check_get_block_response, is_get_block_request, is_valid_non_error_response,
        is_valid_response, validate_request, BlockCheck,
    },
};
use serde_json::Value;

use super::utils::{print_info, print_success, read_json, CliError, CliResult};

pub fn key_command(file: &str) -> CliResult<()> {
    let request = validate_request(&read_json(file)?)?;
    for single in request.requests() {
        println!("{}", cache_key(single));
    }
    Ok(())
}

pub fn limits_command(file: &str, config: &AppConfig) -> CliResult<()> {
    let request = validate_request(&read_json(file)?)?;
    let limiter = RequestLimiter::from_config(config.limits.as_ref());
    limiter.check(&request)?;
    print_success(&format!("{} call(s) within limits", request.len()));
    Ok(())
}

/// Verdict on an upstream response.
#[derive(Debug, PartialEq, Eq)]
pub struct CheckReport {
    /// Whether the gateway would write the response to cache.
    pub cacheable: bool,
    /// Block check outcome for each `get_block` call, by position.
    pub blocks: Vec<(usize, BlockCheck)>,
    /// Irreversible TTL per call, when a last irreversible block was supplied.
    pub ttls: Vec<CacheTtl>,
}

pub fn check_response(
    request: &JsonRpcRequest,
    response: &Value,
    last_irreversible_block: Option<u64>,
) -> CliResult<CheckReport> {
    let responses: Vec<&Value> = match (request, response) {
        (JsonRpcRequest::Single(_), _) => vec![response],
        (JsonRpcRequest::Batch(_), Value::Array(items)) => items.iter().collect(),
        (JsonRpcRequest::Batch(_), _) => {
            return Err(CliError::Rejected("batch request needs an array response".to_string()))
        }
    };
    if responses.len() != request.len() {
        return Err(CliError::Rejected(format!(
            "{} requests answered with {} responses",
            request.len(),
            responses.len()
        )));
    }

    let mut blocks = Vec::new();
    for (index, (single, item)) in request.requests().iter().zip(&responses).enumerate() {
        if is_get_block_request(single) {
            let check = check_get_block_response(single, item)
                .map_err(|e| CliError::Rejected(format!("call {index}: {e}")))?;
            blocks.push((index, check));
        }
    }

    let not_ready = blocks.iter().any(|(_, check)| matches!(check, BlockCheck::NotReady { .. }));
    if !not_ready && !is_valid_response(request, response) {
        return Err(CliError::Rejected("response does not match request".to_string()));
    }

    let ttls = match last_irreversible_block {
        Some(lib) => responses.iter().map(|item| irreversible_ttl(item, Some(lib))).collect(),
        None => Vec::new(),
    };

    let cacheable = !not_ready && is_valid_non_error_response(request, response);
    Ok(CheckReport { cacheable, blocks, ttls })
}

pub fn check_command(
    request_file: &str,
    response_file: &str,
    last_irreversible_block: Option<u64>,
) -> CliResult<()> {
    let request = validate_request(&read_json(request_file)?)?;
    let response = read_json(response_file)?;
    let report = check_response(&request, &response, last_irreversible_block)?;

    for (index, check) in &report.blocks {
        match check {
            BlockCheck::Valid => print_info(&format!("call {index}: block matches request")),
            BlockCheck::NotReady { requested } => {
                print_info(&format!("call {index}: block {requested} does not exist yet"));
            }
        }
    }
    for (index, ttl) in report.ttls.iter().enumerate() {
        print_info(&format!("call {index}: irreversible ttl {ttl}"));
    }
    if report.cacheable {
        print_success("response is valid and cacheable");
    } else {
        print_success("response is valid but will not be cached");
    }
    Ok(())
}
