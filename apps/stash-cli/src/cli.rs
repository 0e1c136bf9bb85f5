//! Command-line definition.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "stash", version, about = "Inspect and invalidate cache keys")]
pub struct Cli {
    /// Redis URL; overrides REDIS_HOST / REDIS_PORT / REDIS_DB
    #[arg(long, global = true, env = "REDIS_URL")]
    pub url: Option<String>,

    /// Keys per scan step during pattern deletion
    #[arg(long, global = true, env = "CACHE_SCAN_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Use a process-local in-memory store instead of Redis
    #[arg(long, global = true)]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the JSON value stored under KEY
    Get { key: String },

    /// Store VALUE (JSON, or a plain string) under KEY
    Set {
        key: String,
        value: String,
        /// Expire after this many seconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete KEY
    Del { key: String },

    /// Delete every key matching a glob PATTERN and print the count
    DelPattern { pattern: String },

    /// Flush the whole keyspace
    Clear {
        /// Confirm the store-wide flush
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_del_pattern_with_batch_size() {
        let cli = Cli::parse_from(["stash", "--batch-size", "50", "del-pattern", "user:*"]);
        assert_eq!(cli.batch_size, Some(50));
        assert!(matches!(cli.command, Command::DelPattern { ref pattern } if pattern == "user:*"));
    }

    #[test]
    fn test_parse_set_with_ttl() {
        let cli = Cli::parse_from(["stash", "set", "greeting", "\"hi\"", "--ttl", "30", "--memory"]);
        assert!(cli.memory);
        match cli.command {
            Command::Set { key, value, ttl } => {
                assert_eq!(key, "greeting");
                assert_eq!(value, "\"hi\"");
                assert_eq!(ttl, Some(30));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
