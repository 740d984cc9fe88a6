//! Shared HTTP plumbing for source fetchers

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;

/// Browser-like agent; several pages refuse requests without one
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

pub fn map_reqwest_error(source_id: SourceId, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { source_id }
    } else if let Some(status) = err.status() {
        FetchError::HttpStatus {
            source_id,
            status: status.as_u16(),
        }
    } else if err.is_decode() {
        FetchError::Parse {
            source_id,
            message: err.to_string(),
        }
    } else {
        FetchError::Transport {
            source_id,
            message: err.to_string(),
        }
    }
}

async fn get(client: &Client, source_id: SourceId, url: &str) -> Result<reqwest::Response, FetchError> {
    debug!(source = %source_id, url = %url, "GET");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| map_reqwest_error(source_id, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            source_id,
            status: status.as_u16(),
        });
    }
    Ok(response)
}

pub async fn get_text(client: &Client, source_id: SourceId, url: &str) -> Result<String, FetchError> {
    get(client, source_id, url)
        .await?
        .text()
        .await
        .map_err(|e| map_reqwest_error(source_id, e))
}

/// Body plus the URL it was finally served from, after redirects
pub async fn get_page(
    client: &Client,
    source_id: SourceId,
    url: &str,
) -> Result<(String, String), FetchError> {
    let response = get(client, source_id, url).await?;
    let final_url = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| map_reqwest_error(source_id, e))?;
    Ok((body, final_url))
}

pub async fn get_json(client: &Client, source_id: SourceId, url: &str) -> Result<Value, FetchError> {
    let body = get_text(client, source_id, url).await?;
    serde_json::from_str(&body).map_err(|e| FetchError::Parse {
        source_id,
        message: e.to_string(),
    })
}

/// Numeric value of a JSON field. Accepts numbers, numeric strings
/// (`"1234.5"`) and Yahoo-style `{"raw": 1234.5, "fmt": "1.23k"}` objects.
pub fn json_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => map.get("raw").and_then(json_number),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

pub fn json_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse display numbers such as `$1,234.5`, `2.5B`, `450.5 M` or `1.5 Trillion`
pub fn parse_scaled_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    let start = cleaned.find(|c: char| c.is_ascii_digit())?;
    let negative = cleaned[..start].ends_with('-');
    let rest = &cleaned[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());

    let number: f64 = rest[..end].parse().ok()?;
    let multiplier = match rest[end..].chars().next() {
        Some('T') => 1e12,
        Some('B') => 1e9,
        Some('M') => 1e6,
        Some('K') => 1e3,
        _ => 1.0,
    };

    let value = number * multiplier;
    Some(if negative { -value } else { value })
}
