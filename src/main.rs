use clap::Parser;
use tracing_subscriber::EnvFilter;

use stake_ledger::cli::{keys, ops, Cli, Commands};
use stake_ledger::config::LedgerConfig;

fn main() {
    let cli = Cli::parse();

    // the subscriber goes in first so config warnings are not lost
    let level = LedgerConfig::load(&cli.config)
        .ok()
        .flatten()
        .map(|c| c.log.level)
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // init-config must not create the file as a side effect of loading it
    let config = match &cli.command {
        Commands::InitConfig { .. } | Commands::Keygen { .. } => LedgerConfig::default(),
        _ => match LedgerConfig::load(&cli.config) {
            Ok(Some(config)) => config,
            Ok(None) => LedgerConfig::load_or_default(&cli.config),
            Err(e) => {
                eprintln!("Error [{}]: {}", e.code(), e);
                std::process::exit(1);
            }
        },
    };

    let result = match cli.command {
        Commands::InitConfig { force } => ops::handle_init_config(&cli.config, force),
        Commands::Keygen { out } => keys::handle_keygen(out),
        Commands::CreateAccount { username, keys, deposit } => {
            ops::handle_create_account(&config, &username, &keys, deposit)
        }
        Commands::Transfer { from, to, amount, memo } => ops::handle_transfer(&config, &from, &to, amount, &memo),
        Commands::Query { path, at } => ops::handle_query(&config, &path, at),
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.code(), e);
        std::process::exit(1);
    }
}
