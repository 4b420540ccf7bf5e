//! Connectivity checks for Sonarr/Radarr instances.

use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ArrInstanceConfig;
use crate::models::ArrStatus;

const CHECK_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct SystemStatus {
    version: Option<String>,
}

/// Check connectivity to one Sonarr/Radarr instance.
///
/// Expects `config.url` to point at the API root (e.g.
/// `http://host:8989/api/v3`) and authenticates with the `X-Api-Key` header.
pub async fn check_arr_instance(config: &ArrInstanceConfig) -> ArrStatus {
    let status = ArrStatus {
        name: config.name.clone(),
        kind: config.kind.clone(),
        url: config.url.clone(),
        reachable: false,
        version: None,
        error: None,
    };

    let client = match Client::builder()
        .timeout(Duration::from_secs(CHECK_TIMEOUT_SECS))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            return ArrStatus {
                error: Some(e.to_string()),
                ..status
            }
        }
    };

    let url = format!("{}/system/status", config.url.trim_end_matches('/'));
    let response = match client
        .get(&url)
        .header("X-Api-Key", &config.api_key)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            return ArrStatus {
                error: Some(e.to_string()),
                ..status
            }
        }
    };

    if !response.status().is_success() {
        return ArrStatus {
            error: Some(format!("HTTP {}", response.status())),
            ..status
        };
    }

    match response.json::<SystemStatus>().await {
        Ok(body) => ArrStatus {
            reachable: true,
            version: body.version,
            ..status
        },
        Err(e) => ArrStatus {
            error: Some(e.to_string()),
            ..status
        },
    }
}

/// Check all configured instances concurrently, preserving input order.
pub async fn check_all(instances: &[ArrInstanceConfig]) -> Vec<ArrStatus> {
    join_all(instances.iter().map(check_arr_instance)).await
}
