//! HEALTH command - Check that the public endpoints respond.

use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::{HumanReadable, output};

/// Endpoints checked when none are given.
pub const DEFAULT_ENDPOINTS: &[&str] = &["/", "/api/data", "/api/profile"];

/// Arguments for the health command.
#[derive(Args)]
pub struct HealthArgs {
    /// Endpoint path to check; repeatable
    #[arg(long = "endpoint", value_name = "PATH")]
    pub endpoints: Vec<String>,
}

/// Outcome of one endpoint check.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCheck {
    pub endpoint: String,
    pub url: String,
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
    pub response_time_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report over all checked endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub base_url: String,
    pub checks: Vec<EndpointCheck>,
    pub successful: usize,
    pub total: usize,
    /// Mean response time of the successful checks.
    pub average_response_time_ms: u64,
}

impl HealthReport {
    fn new(base_url: &str, checks: Vec<EndpointCheck>) -> Self {
        let successful: Vec<u64> = checks
            .iter()
            .filter(|c| c.success)
            .map(|c| c.response_time_ms)
            .collect();
        let average_response_time_ms = if successful.is_empty() {
            0
        } else {
            successful.iter().sum::<u64>() / successful.len() as u64
        };
        Self {
            base_url: base_url.to_string(),
            successful: successful.len(),
            total: checks.len(),
            checks,
            average_response_time_ms,
        }
    }

    pub fn healthy(&self) -> bool {
        self.successful == self.total
    }
}

impl HumanReadable for HealthReport {
    fn print_human(&self) {
        println!("{}", "Health Check".green().bold());
        println!("{}", "=".repeat(50));
        println!("  {} {}", "Base URL:".cyan(), self.base_url);
        println!();

        for check in &self.checks {
            if check.success {
                println!(
                    "  {} {} {} - {}ms",
                    "OK".green(),
                    check.endpoint,
                    check.status,
                    check.response_time_ms
                );
            } else {
                println!(
                    "  {} {} {} - {}",
                    "FAIL".red(),
                    check.endpoint,
                    check.status,
                    check.error.as_deref().unwrap_or("request failed")
                );
            }
        }

        println!();
        println!("  {} {}/{}", "Successful:".cyan(), self.successful, self.total);
        println!(
            "  {} {}ms",
            "Avg Response Time:".cyan(),
            self.average_response_time_ms
        );
        if self.healthy() {
            println!("  {}", "All endpoints are healthy".green());
        } else {
            println!("  {}", "Some endpoints are failing".yellow());
        }
    }
}

async fn check_endpoint(client: &reqwest::Client, base_url: &str, endpoint: &str) -> EndpointCheck {
    let url = format!("{}{}", base_url, endpoint);
    let started = Instant::now();
    let result = client.get(&url).send().await;
    let response_time_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(response) => {
            let status = response.status();
            EndpointCheck {
                endpoint: endpoint.to_string(),
                url,
                status: status.as_u16(),
                response_time_ms,
                success: status.is_success(),
                error: (!status.is_success())
                    .then(|| status.canonical_reason().unwrap_or("request failed").to_string()),
            }
        }
        Err(e) => EndpointCheck {
            endpoint: endpoint.to_string(),
            url,
            status: 0,
            response_time_ms,
            success: false,
            error: Some(e.to_string()),
        },
    }
}

/// Execute the health command. Fails when any endpoint fails.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: HealthArgs,
) -> Result<()> {
    let endpoints: Vec<String> = if args.endpoints.is_empty() {
        DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()
    } else {
        args.endpoints
    };

    let mut checks = Vec::with_capacity(endpoints.len());
    for endpoint in &endpoints {
        checks.push(check_endpoint(client, base_url, endpoint).await);
    }

    let report = HealthReport::new(base_url, checks);
    output(&report, human)?;

    if !report.healthy() {
        anyhow::bail!(
            "{} of {} endpoints failing",
            report.total - report.successful,
            report.total
        );
    }
    Ok(())
}
