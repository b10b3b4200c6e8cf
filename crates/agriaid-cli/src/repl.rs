//! Interactive chat loop.
//!
//! Line editing is `rustyline`. Ctrl-C at the prompt clears the line; Ctrl-C
//! while a reply is being generated raises the session's interrupt flag and
//! abandons only that reply.

use anyhow::{anyhow, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};

use agriaid_chat::{ConversationSession, Dispatch, GenerationBackend as _, GenerationError};
use agriaid_providers::{Location, Region};

const EXIT_WORDS: [&str; 4] = ["quit", "exit", "bye", "q"];

enum Control {
    Continue,
    Exit,
}

fn banner(session: &ConversationSession) {
    println!("{}", "AgriAid".green().bold());
    println!("Farming help with live PAGASA weather, soil, pest and market data.");
    println!(
        "{} {}",
        "backend:".dimmed(),
        session.backend().describe().dimmed()
    );
    println!("Type `reset` to start over, `quit` to leave.\n");
}

/// Ask for a city and an optional region. `None` when input ended.
fn ask_location(rl: &mut DefaultEditor) -> Result<Option<Location>> {
    let city = match rl.readline("Your city or municipality [Manila]: ") {
        Ok(l) => l.trim().to_string(),
        Err(ReadlineError::Eof | ReadlineError::Interrupted) => return Ok(None),
        Err(e) => return Err(anyhow!("readline error: {e}")),
    };
    let mut location = if city.is_empty() {
        Location::default()
    } else {
        Location::named(city)
    };

    loop {
        let line = match rl.readline("Region code (NCR, CAR, I .. XIII, BARMM; blank to skip): ") {
            Ok(l) => l,
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => return Ok(None),
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        match line.parse::<Region>() {
            Ok(region) => {
                location = location.with_region(region);
                break;
            }
            Err(e) => {
                let codes: Vec<_> = Region::ALL.iter().map(|r| r.code()).collect();
                eprintln!("{} {e}; expected one of {}", "error:".red().bold(), codes.join(", "));
            }
        }
    }
    Ok(Some(location))
}

fn turn(session: &mut ConversationSession, line: &str, location: &Location, stream: bool) -> Result<Control> {
    if EXIT_WORDS.contains(&line.to_lowercase().as_str()) {
        return Ok(Control::Exit);
    }
    if line.eq_ignore_ascii_case("reset") {
        session.reset();
        println!("{}", "Conversation cleared.".yellow());
        return Ok(Control::Continue);
    }

    print!("{} ", "AgriAid:".green().bold());
    io::stdout().flush()?;

    let result = if stream {
        let mut sink = |fragment: &str| {
            print!("{fragment}");
            let _ = io::stdout().flush();
        };
        session.chat(line, location, Dispatch::Streaming(&mut sink))
    } else {
        session
            .chat(line, location, Dispatch::SingleShot)
            .map(|reply| {
                print!("{}", reply.text);
                reply
            })
    };

    match result {
        Ok(reply) => {
            if stream && reply.fallback {
                print!("{}", reply.text);
            }
            println!("\n");
            for (source, reason) in reply.report.failures() {
                tracing::info!(%source, %reason, "context source unavailable this turn");
            }
        }
        Err(GenerationError::Interrupted) => println!("\n{}\n", "(interrupted)".yellow()),
        Err(e) => {
            println!();
            return Err(e.into());
        }
    }
    Ok(Control::Continue)
}

pub(crate) fn run(mut session: ConversationSession, location: Option<Location>, stream: bool) -> Result<()> {
    signal_hook::flag::register(signal_hook::consts::SIGINT, session.interrupt_flag())
        .map_err(|e| anyhow!("failed to install Ctrl-C handler: {e}"))?;

    let mut rl = DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
    banner(&session);

    let location = match location {
        Some(l) => l,
        None => match ask_location(&mut rl)? {
            Some(l) => l,
            None => return Ok(()),
        },
    };
    let region = location
        .region
        .map(|r| format!(" ({} - {})", r.code(), r.display_name()))
        .unwrap_or_default();
    println!("Location: {}{region}\n", location.name.cyan());

    loop {
        let line = match rl.readline("you> ") {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        rl.add_history_entry(line)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        match turn(&mut session, line, &location, stream) {
            Ok(Control::Continue) => {}
            Ok(Control::Exit) => break,
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
    }

    println!("{}", "Salamat! Happy farming.".green());
    Ok(())
}
