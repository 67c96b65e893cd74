//! EMAILS / CONTACTS commands - List or search stored records.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use portfolio_core::{ContactMessage, EmailMessage};
use serde::{Deserialize, Serialize};

use super::{HumanReadable, format_timestamp, make_request, output, require_admin, truncate};

/// Arguments shared by the listing commands.
#[derive(Args)]
pub struct ListArgs {
    /// Maximum number of records
    #[arg(long)]
    pub limit: Option<usize>,

    /// Cursor from a previous page
    #[arg(long)]
    pub cursor: Option<String>,

    /// Case-insensitive substring search over recent records
    #[arg(long)]
    pub search: Option<String>,
}

impl ListArgs {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = &self.cursor {
            query.push(("cursor", cursor.clone()));
        }
        if let Some(search) = &self.search {
            query.push(("search", search.clone()));
        }
        query
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EmailList {
    pub emails: Vec<EmailMessage>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ContactList {
    pub contacts: Vec<ContactMessage>,
    #[serde(default)]
    pub cursor: Option<String>,
}

fn print_cursor(cursor: Option<&str>) {
    if let Some(cursor) = cursor {
        println!("  {} --cursor {}", "More:".cyan(), cursor);
    }
}

impl HumanReadable for EmailList {
    fn print_human(&self) {
        println!("{}", "Emails".green().bold());
        println!("{}", "=".repeat(80));

        if self.emails.is_empty() {
            println!("  {}", "(No emails)".dimmed());
            return;
        }

        for email in &self.emails {
            println!();
            println!("  {}", email.subject.bold());
            println!("    {} {}", "ID:".cyan(), email.id);
            println!("    {} {} -> {}", "From:".cyan(), email.from, email.to);
            println!("    {} {}", "Received:".cyan(), format_timestamp(email.timestamp));
            if !email.body.is_empty() {
                println!("    {}", truncate(&email.body, 120).dimmed());
            }
        }

        println!();
        println!("  {} {}", "Shown:".cyan(), self.emails.len());
        print_cursor(self.cursor.as_deref());
    }
}

impl HumanReadable for ContactList {
    fn print_human(&self) {
        println!("{}", "Contact Messages".green().bold());
        println!("{}", "=".repeat(80));

        if self.contacts.is_empty() {
            println!("  {}", "(No contact messages)".dimmed());
            return;
        }

        for contact in &self.contacts {
            println!();
            println!("  {} <{}>", contact.fullname.bold(), contact.email);
            println!("    {} {}", "ID:".cyan(), contact.id);
            println!("    {} {}", "Sent:".cyan(), format_timestamp(contact.timestamp));
            println!("    {}", truncate(&contact.message, 120).dimmed());
        }

        println!();
        println!("  {} {}", "Shown:".cyan(), self.contacts.len());
        print_cursor(self.cursor.as_deref());
    }
}

/// Execute the emails command.
pub async fn emails(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    admin: bool,
    args: ListArgs,
) -> Result<()> {
    require_admin(admin)?;
    let url = format!("{}/api/admin/emails", base_url);
    let list: EmailList = make_request(client.get(&url).query(&args.query())).await?;
    output(&list, human)
}

/// Execute the contacts command.
pub async fn contacts(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    admin: bool,
    args: ListArgs,
) -> Result<()> {
    require_admin(admin)?;
    let url = format!("{}/api/admin/contacts", base_url);
    let list: ContactList = make_request(client.get(&url).query(&args.query())).await?;
    output(&list, human)
}
