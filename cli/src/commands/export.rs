//! EXPORT command - Download every record as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use super::{CliError, HumanReadable, error_message, output, require_admin};

/// Arguments for the export command.
#[derive(Args)]
pub struct ExportArgs {
    /// Write the export to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Summary printed after writing an export to a file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub path: PathBuf,
    pub bytes: usize,
    pub emails: usize,
    pub contacts: usize,
}

impl ExportSummary {
    fn new(path: PathBuf, document: &str) -> Self {
        let parsed: Value = serde_json::from_str(document).unwrap_or(Value::Null);
        let count = |name: &str| {
            parsed
                .pointer(&format!("/data/{}", name))
                .and_then(Value::as_array)
                .map_or(0, Vec::len)
        };
        Self {
            emails: count("emails"),
            contacts: count("contacts"),
            bytes: document.len(),
            path,
        }
    }
}

impl HumanReadable for ExportSummary {
    fn print_human(&self) {
        println!("{}", "Export written".green().bold());
        println!("  {} {}", "File:".cyan(), self.path.display());
        println!("  {} {}", "Size:".cyan(), self.bytes);
        println!("  {} {}", "Emails:".cyan(), self.emails);
        println!("  {} {}", "Contact messages:".cyan(), self.contacts);
    }
}

/// Execute the export command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    admin: bool,
    args: ExportArgs,
) -> Result<()> {
    require_admin(admin)?;
    let url = format!("{}/api/admin/export", base_url);

    let response = client.get(&url).send().await.map_err(CliError::from)?;
    let status = response.status();
    let body = response.text().await.map_err(CliError::from)?;
    if !status.is_success() {
        return Err(CliError::Server {
            status: status.as_u16(),
            message: error_message(&body),
        }
        .into());
    }

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &body)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            output(&ExportSummary::new(path, &body), human)
        }
        None => {
            println!("{}", body);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_records() {
        let document = r#"{"version":"1.0","data":{"emails":[{},{}],"contacts":[{}]}}"#;
        let summary = ExportSummary::new(PathBuf::from("out.json"), document);
        assert_eq!(summary.emails, 2);
        assert_eq!(summary.contacts, 1);
        assert_eq!(summary.bytes, document.len());
    }

    #[test]
    fn test_summary_of_unparseable_document() {
        let summary = ExportSummary::new(PathBuf::from("out.json"), "not json");
        assert_eq!(summary.emails, 0);
        assert_eq!(summary.contacts, 0);
    }
}
