use clap::Parser;
use colored::*;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

use netpeek::cli::{Args, Command};
use netpeek::render;
use netpeek::{
    fetch_geo, init_logging, probe_average, ChatClient, ChatSession, Config, GeoStatus,
    HttpProber, ProbeStatus,
};

// ---------------------------------------------------------------------------
// Geo
// ---------------------------------------------------------------------------

async fn run_geo(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let client = config.http_client()?;
    if !json {
        eprintln!("{}", "Looking up public IP...".dimmed());
    }
    match GeoStatus::from_result(fetch_geo(&client, &config.geo_url).await) {
        GeoStatus::Success(record) if json => println!("{}", serde_json::to_string_pretty(&record)?),
        GeoStatus::Success(record) => render::print_geo(&record),
        GeoStatus::Error(detail) => render::print_failure("geo", &detail, "netpeek geo"),
        GeoStatus::Idle | GeoStatus::Pending => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Latency
// ---------------------------------------------------------------------------

async fn run_ping(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let prober = HttpProber::new(config.http_client()?);
    let count = config.probe_count;

    if !json {
        eprintln!("{} {}", "Testing".dimmed(), config.probe_url.dimmed());
    }
    let result = probe_average(
        &prober,
        &config.probe_url,
        count,
        config.probe_delay(),
        |index, sample| {
            if !json {
                render::print_progress(index, count, sample);
            }
        },
    )
    .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        render::print_latency(&result, count);
        if result.status == ProbeStatus::Error {
            render::print_failure("ping", "no probe succeeded", "netpeek ping");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Stream one exchange to stdout. Failures are already in the transcript.
async fn chat_once(client: &ChatClient, session: &mut ChatSession, prompt: &str) {
    print!("{}: ", render::role_label(netpeek::Role::Assistant));
    let _ = io::stdout().flush();

    let outcome = client
        .send(session, prompt, |fragment| {
            print!("{fragment}");
            let _ = io::stdout().flush();
        })
        .await;

    match outcome {
        Ok(()) => println!(),
        Err(netpeek::NetpeekError::ExchangeInFlight) => {
            println!("{}", "busy, wait for the current reply".bright_red());
        }
        Err(_) => {
            println!();
            if let Some(turn) = session.transcript().turns().last() {
                render::print_turn(turn);
            }
        }
    }
}

async fn run_chat(config: &Config, prompt: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let client = ChatClient::new(config);
    let mut session = ChatSession::new();

    if let Some(prompt) = prompt {
        chat_once(&client, &mut session, prompt).await;
        return Ok(());
    }

    render::print_header("NETPEEK CHAT");
    println!("{}: {}", "Model".bright_yellow(), client.model);
    println!("{}", "Commands: /clear, /history, /quit".dimmed());
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}: ", render::role_label(netpeek::Role::User));
        let _ = io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear()?;
                println!("{}", "transcript cleared".dimmed());
            }
            "/history" => {
                for turn in session.transcript().turns() {
                    render::print_turn(turn);
                }
            }
            prompt => chat_once(&client, &mut session, prompt).await,
        }
    }

    println!("\n{}", render::rule());
    println!("Session ended after {} turns.", session.transcript().len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.resolve_config()?;
    tracing::debug!(target: "netpeek", ?config, "configuration resolved");

    match &args.command {
        Command::Geo { json } => run_geo(&config, *json).await?,
        Command::Ping { json, .. } => run_ping(&config, *json).await?,
        Command::Chat { prompt, .. } => run_chat(&config, prompt.as_deref()).await?,
    }

    Ok(())
}
