use std::{
    fs,
    io::{self, Read},
    path::Path,
    process,
};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::LevelFilter;
use transmission_send::{
    actions::Actions,
    config::{build_config, AppConfig, Cli, Command},
    ports::{ConsoleNotifier, PrintLauncher},
    reference::{looks_interesting, parse_one, scan, segments, Segment},
    rpc::TransmissionClient,
};

fn main() {
    match try_main() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(2);
        }
    }
}

/// Returns whether the requested action succeeded.
fn try_main() -> Result<bool> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    init_logging(config.log_level);
    if let Command::Scan { add, annotate, .. } = &cli.command {
        if (*add || *annotate) && !config.inline_button {
            anyhow::bail!("inline adding is switched off (inline_button = false)");
        }
    }
    match &cli.command {
        Command::Parse { text } => parse(text),
        Command::Scan {
            file,
            add: false,
            annotate,
        } => list_matches(file.as_deref(), *annotate),
        Command::Scan { file, add: true, .. } => with_actions(&config, |actions| {
            let text = read_input(file.as_deref())?;
            let results = actions.submit_scanned(&text);
            for (found, result) in &results {
                println!("{}\t{}", found.text, result.summary());
            }
            Ok(results.iter().all(|(_, result)| result.success))
        }),
        Command::Add { text, selection } => with_actions(&config, |actions| {
            let result = if *selection {
                actions.submit_selection(text)
            } else {
                actions.submit_link(text)
            };
            print_json(&result)?;
            Ok(result.success)
        }),
        Command::Test => with_actions(&config, |actions| {
            let report = actions.check_connection();
            print_json(&report)?;
            Ok(report.success)
        }),
    }
}

fn init_logging(level: LevelFilter) {
    let env = Env::default().default_filter_or(level.to_string());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

fn with_actions<F>(config: &AppConfig, run: F) -> Result<bool>
where
    F: FnOnce(&Actions<'_, ConsoleNotifier, PrintLauncher>) -> Result<bool>,
{
    let client = TransmissionClient::new(&config.client)
        .context("failed to construct Transmission RPC client")?;
    let notifier = ConsoleNotifier::new(config.notifications.clone());
    let launcher = PrintLauncher;
    let actions = Actions::new(&client, &config.server, &notifier, &launcher);
    run(&actions)
}

fn parse(text: &str) -> Result<bool> {
    match parse_one(text) {
        Some(reference) => {
            print_json(&reference)?;
            Ok(true)
        }
        None => {
            println!("null");
            Ok(false)
        }
    }
}

fn list_matches(file: Option<&Path>, annotate: bool) -> Result<bool> {
    let text = read_input(file)?;
    let mut found = 0;
    for (number, line) in text.lines().enumerate() {
        if !looks_interesting(line) {
            if annotate {
                println!("{line}");
            }
            continue;
        }
        if annotate {
            let rendered: String = segments(line)
                .into_iter()
                .map(|segment| match segment {
                    Segment::Text(text) => text.to_string(),
                    Segment::Match(m) => {
                        found += 1;
                        format!("[{}]", m.text)
                    }
                })
                .collect();
            println!("{rendered}");
            continue;
        }
        for m in scan(line) {
            found += 1;
            let kind = m
                .reference()
                .map(|reference| reference.kind().label())
                .unwrap_or("unparsed");
            println!("{}:{}-{}\t{kind}\t{}", number + 1, m.start, m.end, m.text);
        }
    }
    Ok(found > 0)
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
