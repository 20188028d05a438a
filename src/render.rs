//! Terminal rendering for the three flows.

use colored::*;

use crate::geo::GeoRecord;
use crate::latency::{LatencyResult, LatencySample, ProbeStatus};
use crate::transcript::{ChatTurn, Role};

const RULE_WIDTH: usize = 50;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH).bright_blue().to_string()
}

pub fn print_header(title: &str) {
    println!("{}", title.bright_cyan().bold());
    println!("{}", rule());
}

pub fn print_geo(record: &GeoRecord) {
    print_header("PUBLIC IP");
    println!("{}: {}", "IP".bright_yellow(), record.ip.bright_white());
    println!("{}: {}", "Country".bright_yellow(), record.country);
    println!("{}: {}", "Region".bright_yellow(), record.region);
    println!("{}: {}", "City".bright_yellow(), record.city);
    println!("{}: {}", "Organization".bright_yellow(), record.organization);
}

/// Error line with the manual retry hint.
pub fn print_failure(flow: &str, detail: &str, retry: &str) {
    eprintln!("{} {}", format!("[{flow}] failed:").bright_red(), detail);
    eprintln!("{} {}", "retry with:".dimmed(), retry.bright_white());
}

pub fn format_sample(sample: LatencySample) -> String {
    match sample {
        Some(ms) => format!("{ms} ms"),
        None => "failed".to_string(),
    }
}

pub fn print_progress(index: usize, count: usize, sample: LatencySample) {
    let label = format!("Probe {index}/{count}");
    match sample {
        Some(_) => eprintln!("{}: {}", label.bright_yellow(), format_sample(sample)),
        None => eprintln!("{}: {}", label.bright_yellow(), format_sample(sample).bright_red()),
    }
}

/// Colour a latency figure by how usable the connection feels.
pub fn latency_color(ms: u64) -> ColoredString {
    let text = format!("{ms} ms");
    match ms {
        0..=80 => text.bright_green(),
        81..=200 => text.bright_yellow(),
        _ => text.bright_red(),
    }
}

pub fn print_latency(result: &LatencyResult, requested: usize) {
    print_header("LATENCY");
    println!("{}: {}", "Target".bright_yellow(), result.target);
    match result.status {
        ProbeStatus::Success => {
            let (Some(mean), Some(min), Some(max), Some(n)) =
                (result.mean, result.min, result.max, result.sample_count)
            else {
                return;
            };
            if requested == 1 {
                println!("{}: {}", "Latency".bright_yellow(), latency_color(mean));
            } else {
                println!("{}: {}", "Average".bright_yellow(), latency_color(mean));
                println!("{}: {} / {}", "Min / Max".bright_yellow(), latency_color(min), latency_color(max));
                println!("{}: {}/{}", "Samples".bright_yellow(), n, requested);
            }
        }
        ProbeStatus::Error => println!("{}", "All probes failed".bright_red()),
        ProbeStatus::Pending => println!("{}", "Testing...".dimmed()),
    }
}

pub fn role_label(role: Role) -> ColoredString {
    match role {
        Role::User => "you".bright_green().bold(),
        Role::Assistant => "assistant".bright_cyan().bold(),
    }
}

pub fn print_turn(turn: &ChatTurn) {
    if turn.content.starts_with("Error: ") {
        println!("{}: {}", role_label(turn.role), turn.content.bright_red());
    } else {
        println!("{}: {}", role_label(turn.role), turn.content);
    }
}
