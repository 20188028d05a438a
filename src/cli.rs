use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "netpeek")]
#[command(version)]
#[command(about = "Check your public IP, measure latency, and chat with a hosted LLM")]
pub struct Args {
    /// TOML config file (endpoints, model, probe settings)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Look up the apparent public IP and its location
    Geo {
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Measure round-trip latency to the probe endpoint
    Ping {
        /// Number of sequential probes
        #[arg(long, short = 'n')]
        samples: Option<usize>,

        /// Delay between probes in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Send exactly one probe
        #[arg(long, conflicts_with = "samples")]
        single: bool,

        /// Override the probe endpoint
        #[arg(long)]
        target: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Chat with the LLM; starts an interactive session without a prompt
    Chat {
        /// One-shot prompt
        prompt: Option<String>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// Sampling temperature (0.0-2.0)
        #[arg(long)]
        temperature: Option<f32>,
    },
}

impl Args {
    /// Load the config file (if any) and fold in command-line overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let config = Config::load_or_default(self.config.as_deref())?;
        apply_overrides(config, &self.command)
    }
}

/// Command-line values win over file values.
pub fn apply_overrides(mut config: Config, command: &Command) -> Result<Config> {
    match command {
        Command::Geo { .. } => {}
        Command::Ping {
            samples,
            delay_ms,
            single,
            target,
            ..
        } => {
            if *single {
                config.probe_count = 1;
            } else if let Some(n) = samples {
                config.probe_count = *n;
            }
            if let Some(ms) = delay_ms {
                config.probe_delay_ms = *ms;
            }
            if let Some(url) = target {
                config.probe_url = url.clone();
            }
        }
        Command::Chat {
            model, temperature, ..
        } => {
            if let Some(m) = model {
                config.model = m.clone();
            }
            if let Some(t) = temperature {
                config.temperature = *t;
            }
        }
    }
    config.validate()?;
    Ok(config)
}
