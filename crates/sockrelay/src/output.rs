use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use sockrelay_frame::ClientProfile;
use sockrelay_peer::ServerSummary;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    profile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    bytes: usize,
    reply: &'a str,
    timestamp: String,
}

#[derive(Serialize)]
struct SummaryOutput {
    accepted: u64,
    peak_live: usize,
    timestamp: String,
}

pub fn print_reply(profile: ClientProfile, command: Option<&str>, reply: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                profile: profile.to_string(),
                command,
                bytes: reply.len(),
                reply,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PROFILE", "COMMAND", "BYTES", "REPLY"])
                .add_row(vec![
                    profile.to_string(),
                    command.unwrap_or("-").to_string(),
                    reply.len().to_string(),
                    reply.trim_end().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            match command {
                Some(command) => println!("[{profile}] {command} ({} bytes)", reply.len()),
                None => println!("[{profile}] reply ({} bytes)", reply.len()),
            }
            println!("{}", reply.trim_end());
        }
        OutputFormat::Raw => print_raw(reply.as_bytes()),
    }
}

pub fn print_summary(summary: &ServerSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SummaryOutput {
                accepted: summary.accepted,
                peak_live: summary.peak_live,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ACCEPTED", "PEAK LIVE"])
                .add_row(vec![
                    summary.accepted.to_string(),
                    summary.peak_live.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "server stopped: accepted={} peak_live={}",
                summary.accepted, summary.peak_live
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
