//! STATS command - Record counts.

use anyhow::Result;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, make_request, output, require_admin};

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub email_count: u64,
    pub contact_count: u64,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl HumanReadable for StatsResponse {
    fn print_human(&self) {
        println!("{}", "Statistics".green().bold());
        println!("{}", "=".repeat(40));
        println!("  {} {}", "Emails:".cyan(), self.email_count);
        println!("  {} {}", "Contact messages:".cyan(), self.contact_count);
        if let Some(updated) = &self.last_updated {
            println!("  {} {}", "As of:".cyan(), updated.dimmed());
        }
    }
}

/// Execute the stats command.
pub async fn execute(client: &reqwest::Client, base_url: &str, human: bool, admin: bool) -> Result<()> {
    require_admin(admin)?;
    let url = format!("{}/api/admin/stats", base_url);
    let stats: StatsResponse = make_request(client.get(&url)).await?;
    output(&stats, human)
}
