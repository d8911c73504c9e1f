pub mod client;
pub mod config;
pub mod content;
pub mod logging;
pub mod providers;
pub mod repl;
pub mod response;
pub mod retry;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use std::env;
use tracing::info;

use client::GenerativeContentClient;
use config::Config;
use content::create_content;
use repl::{print_content, run_repl};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Invocation {
    Repl,
    Query(String),
    Create(String),
}

fn parse_invocation(args: Vec<String>) -> Invocation {
    match args.split_first() {
        None => Invocation::Repl,
        Some((flag, rest)) if flag == "--create" => Invocation::Create(rest.join(" ")),
        Some(_) => Invocation::Query(args.join(" ")),
    }
}

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cfg = Config::from_env();
    info!(
        model = %cfg.model,
        persona = %cfg.persona_name,
        google_search = cfg.google_search,
        max_attempts = cfg.retry_policy.max_attempts(),
        credential_present = cfg.api_key.is_some(),
        "loaded runtime configuration"
    );

    let http = Client::builder()
        .build()
        .context("Failed to initialize HTTP client")?;
    let client = GenerativeContentClient::new(http, &cfg);

    match parse_invocation(env::args().skip(1).collect()) {
        Invocation::Repl => run_repl(&client, &cfg).await,
        Invocation::Query(query) => {
            if query.trim().is_empty() {
                bail!("query must not be empty");
            }
            let answer = client.generate(query.trim()).await.into_result()?;
            println!("{}", answer.trim());
            Ok(())
        }
        Invocation::Create(topic) => {
            if topic.trim().is_empty() {
                bail!("--create needs a topic");
            }
            let created = create_content(&client, topic.trim()).await?;
            print_content(&created);
            Ok(())
        }
    }
}
