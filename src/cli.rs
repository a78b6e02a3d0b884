use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Translate a local subtitle file, charging a user's credits
    Translate {
        /// Input subtitle file (.srt or .vtt)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to <name>.<lang>.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target language code
        #[arg(short, long)]
        target_lang: String,

        /// Source language code
        #[arg(short, long)]
        source_lang: Option<String>,

        /// Account to charge
        #[arg(short, long)]
        user: String,
    },

    /// Manage accounts and balances
    Credits {
        #[command(subcommand)]
        action: CreditsAction,
    },

    /// Settle refunds that are still pending
    Reconcile,

    /// Write a default configuration file
    InitConfig {
        /// Where to write the configuration
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum CreditsAction {
    /// Open a new account
    Open {
        user: String,

        /// Opening balance
        #[arg(long, default_value = "0")]
        initial: Decimal,
    },

    /// Grant credits to an account
    Grant {
        user: String,

        amount: Decimal,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Remove credits from an account (never below zero)
    Remove {
        user: String,

        amount: Decimal,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Show the balance of an account
    Balance { user: String },

    /// Show recent transactions of an account
    History {
        user: String,

        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_translate_command() {
        let args = Args::try_parse_from([
            "submeter", "translate", "-i", "movie.srt", "-t", "cs", "-u", "alice",
        ])
        .unwrap();

        match args.command {
            Commands::Translate { input, target_lang, user, output, source_lang } => {
                assert_eq!(input, PathBuf::from("movie.srt"));
                assert_eq!(target_lang, "cs");
                assert_eq!(user, "alice");
                assert!(output.is_none());
                assert!(source_lang.is_none());
            }
            _ => panic!("expected translate command"),
        }
    }

    #[test]
    fn test_parse_credit_amounts_as_decimals() {
        let args = Args::try_parse_from(["submeter", "credits", "grant", "alice", "2.1"]).unwrap();

        match args.command {
            Commands::Credits {
                action: CreditsAction::Grant { user, amount, reason },
            } => {
                assert_eq!(user, "alice");
                assert_eq!(amount, Decimal::new(21, 1));
                assert!(reason.is_none());
            }
            _ => panic!("expected credits grant command"),
        }

        assert!(Args::try_parse_from(["submeter", "credits", "grant", "alice", "lots"]).is_err());
    }
}
