// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::FetchConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &FetchConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page body as text, retrying up to `retries` extra times.
pub async fn fetch_text(client: &reqwest::Client, url: &str, retries: u32) -> Result<String> {
    let mut attempt = 0;
    loop {
        let result = async {
            let response = client.get(url).send().await?.error_for_status()?;
            response.text().await
        }
        .await;

        match result {
            Ok(text) => return Ok(text),
            Err(e) if attempt < retries => {
                attempt += 1;
                log::debug!("Retrying {} ({}/{}): {}", url, attempt, retries, e);
                tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
            }
            Err(e) => return Err(AppError::fetch(url, e)),
        }
    }
}
