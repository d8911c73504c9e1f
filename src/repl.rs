use anyhow::{Context, Result};
use std::io::{self, Write};
use tracing::debug;

use crate::client::{GenerativeContentClient, Sleeper, Transport};
use crate::config::Config;
use crate::content::{ContentCreation, create_content};
use crate::response::ApiResponse;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand<'a> {
    Skip,
    Quit,
    ShowPersona,
    Create(&'a str),
    Query(&'a str),
}

fn parse_command(input: &str) -> ReplCommand<'_> {
    let line = input.trim();
    if line.is_empty() {
        return ReplCommand::Skip;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return ReplCommand::Quit;
    }
    if line.eq_ignore_ascii_case("/persona") {
        return ReplCommand::ShowPersona;
    }
    if let Some(topic) = strip_command(line, "/create") {
        return if topic.is_empty() {
            ReplCommand::Skip
        } else {
            ReplCommand::Create(topic)
        };
    }
    ReplCommand::Query(line)
}

fn strip_command<'a>(line: &'a str, command: &str) -> Option<&'a str> {
    let head = line.get(..command.len())?;
    let rest = &line[command.len()..];
    if !head.eq_ignore_ascii_case(command) {
        return None;
    }
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

pub async fn run_repl<T, S>(client: &GenerativeContentClient<T, S>, cfg: &Config) -> Result<()>
where
    T: Transport,
    S: Sleeper,
{
    println!("persona content client");
    println!("persona: {}", cfg.persona_name);
    println!("model: {}", client.model());
    println!(
        "type a query, '/create <topic>' for a story and image prompt, '/persona' to show the \
         system instruction, or 'exit' to quit"
    );

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        let read = io::stdin()
            .read_line(&mut input)
            .context("Failed to read stdin")?;
        if read == 0 {
            break;
        }

        match parse_command(&input) {
            ReplCommand::Skip => continue,
            ReplCommand::Quit => break,
            ReplCommand::ShowPersona => println!("{}\n", client.system_instruction()),
            ReplCommand::Create(topic) => match create_content(client, topic).await {
                Ok(created) => print_content(&created),
                Err(err) => println!("error: {err}\n"),
            },
            ReplCommand::Query(query) => match client.generate(query).await {
                ApiResponse::Success { text } => println!("{}\n", text.trim()),
                ApiResponse::Failure { kind, detail } => {
                    debug!(kind = %kind, "query failed");
                    println!("error: {detail}\n");
                }
            },
        }
    }

    Ok(())
}

pub fn print_content(created: &ContentCreation) {
    println!("== story ==");
    println!("{}\n", created.persona_story.trim());
    println!("== image prompt ==");
    println!("{}\n", created.image_prompt.trim());
}
