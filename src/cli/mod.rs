pub mod keys;
pub mod ops;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stake-ledger")]
#[command(about = "Stake ledger account tool", long_about = None)]
pub struct Cli {
    /// Path to the TOML config
    #[arg(long, default_value = "ledger.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file
    InitConfig {
        #[arg(long)]
        force: bool,
    },
    /// Generate a four-tier key set
    Keygen {
        /// Output file (JSON, contains secret keys)
        #[arg(long)]
        out: Option<String>,
    },
    /// Register an account with a key set produced by `keygen`
    CreateAccount {
        #[arg(long)]
        username: String,
        #[arg(long)]
        keys: String,
        /// Initial deposit in base units
        #[arg(long, default_value_t = 0)]
        deposit: i64,
    },
    /// Move coin between two accounts
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Amount in base units
        #[arg(long)]
        amount: i64,
        #[arg(long, default_value = "")]
        memo: String,
    },
    /// Read-only query, e.g. `bank/alice` or `history/alice/0`
    Query {
        path: String,
        /// Evaluate at this unix time instead of now
        #[arg(long)]
        at: Option<i64>,
    },
}
