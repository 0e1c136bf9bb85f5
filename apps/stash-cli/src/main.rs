//! # Stash CLI
//!
//! Operator entry point for inspecting and invalidating cache keys.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;

use stash_infra::{Cache, CacheConfig};

mod cli;
mod telemetry;

use cli::{Cli, Command};
use telemetry::TelemetryConfig;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cache = build_cache(&cli).await?;
    let result = execute(&cache, cli.command).await;
    cache.disconnect().await;
    result
}

async fn build_cache(cli: &Cli) -> anyhow::Result<Cache> {
    let mut config = CacheConfig::from_env();
    if let Some(url) = &cli.url {
        config.redis.url = Some(url.clone());
    }
    if let Some(batch_size) = cli.batch_size {
        config.scan_batch_size = batch_size;
    }

    if cli.memory {
        config.validate()?;
        return Ok(Cache::in_memory().with_batch_size(config.scan_batch_size));
    }

    let endpoint = config.redis.endpoint();
    Cache::connect(config)
        .await
        .with_context(|| format!("could not connect to {endpoint}"))
}

async fn execute(cache: &Cache, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get { key } => match cache.get::<Value>(&key).await {
            Some(value) => println!("{value}"),
            None => println!("(nil)"),
        },
        Command::Set { key, value, ttl } => {
            let value = parse_value(&value);
            cache.set(&key, &value, ttl.map(Duration::from_secs)).await;
            println!("OK");
        }
        Command::Del { key } => {
            cache.del(&key).await;
            println!("OK");
        }
        Command::DelPattern { pattern } => {
            let deleted = cache
                .del_pattern(&pattern)
                .await
                .with_context(|| format!("pattern delete for '{pattern}' did not complete"))?;
            println!("{deleted}");
        }
        Command::Clear { yes } => {
            anyhow::ensure!(yes, "refusing to flush the store without --yes");
            cache.clear().await;
            println!("OK");
        }
    }
    Ok(())
}

/// Interpret a command-line value as JSON, falling back to a JSON string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("{\"id\":1}"), serde_json::json!({"id": 1}));
        assert_eq!(parse_value("42"), serde_json::json!(42));
        assert_eq!(parse_value("plain text"), Value::String("plain text".to_string()));
    }

    #[tokio::test]
    async fn test_execute_against_memory_store() {
        let cache = Cache::in_memory();
        for key in ["user:1", "user:2", "post:1"] {
            execute(
                &cache,
                Command::Set {
                    key: key.to_string(),
                    value: "{\"id\":1}".to_string(),
                    ttl: None,
                },
            )
            .await
            .unwrap();
        }

        execute(&cache, Command::DelPattern { pattern: "user:*".to_string() })
            .await
            .unwrap();
        assert!(!cache.exists("user:1").await);
        assert!(cache.exists("post:1").await);

        assert!(execute(&cache, Command::Clear { yes: false }).await.is_err());
        assert!(cache.exists("post:1").await);
    }
}
