//! OPM Wallet: create, import and restore a non-custodial wallet from the terminal
//!
//! # Usage
//!
//! ```bash
//! opm-wallet create
//! opm-wallet import-seed --config wallet.toml
//! opm-wallet restore opm-wallet-0xf39Fd6-backup.json
//! opm-wallet check-address 0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed
//! ```

mod config;
mod sinks;
mod terminal;
mod wizard;

use anyhow::{Context, Result};
use opm_wallet_core::is_valid_address;
use opm_wallet_onboard::OnboardingSession;
use std::path::PathBuf;

use crate::sinks::{FileBackupSink, SessionFile};
use crate::terminal::LineTerminal;
use crate::wizard::Flow;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Onboard(Flow),
    Restore(PathBuf),
    CheckAddress(String),
    Status,
    Help,
    Version,
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    command: Command,
    config_path: Option<PathBuf>,
}

// Minimal hand-rolled parsing; the surface is six commands and one flag
fn parse_args(args: &[String]) -> Result<Cli> {
    let mut command = None;
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--help" | "-h" => return Ok(Cli { command: Command::Help, config_path }),
            "--version" | "-V" => return Ok(Cli { command: Command::Version, config_path }),
            other if command.is_some() => anyhow::bail!("Unexpected argument: {}", other),
            "create" => command = Some(Command::Onboard(Flow::Create)),
            "import-seed" => command = Some(Command::Onboard(Flow::ImportSeed)),
            "import-key" => command = Some(Command::Onboard(Flow::ImportKey)),
            "status" => command = Some(Command::Status),
            "restore" | "check-address" => {
                let name = args[i].clone();
                i += 1;
                let Some(value) = args.get(i) else {
                    anyhow::bail!("{} requires an argument", name);
                };
                command = Some(if name == "restore" {
                    Command::Restore(PathBuf::from(value))
                } else {
                    Command::CheckAddress(value.clone())
                });
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
        i += 1;
    }

    Ok(Cli {
        command: command.unwrap_or(Command::Help),
        config_path,
    })
}

fn main() -> Result<()> {
    // Security hardening: a crash must not write key material to disk
    opm_wallet_core::memory::disable_core_dumps();

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args)?;

    match &cli.command {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Version => {
            println!("opm-wallet {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::CheckAddress(address) => {
            if is_valid_address(address) {
                println!("valid");
                return Ok(());
            }
            anyhow::bail!("{} is not a valid address", address);
        }
        _ => {}
    }

    // Load config
    let mut wallet_config = config::WalletConfig::load(cli.config_path.as_deref())
        .context("Failed to load configuration")?;

    // Apply env overrides
    wallet_config.apply_env_overrides();

    // Validate
    wallet_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    env_logger::Builder::new()
        .parse_filters(&wallet_config.wallet.log_level)
        .init();

    let mut term = LineTerminal::stdio();
    let mut connector = SessionFile::new(wallet_config.session_file());

    match cli.command {
        Command::Onboard(flow) => {
            let kdf = wallet_config.kdf_params()?;
            log::info!("new backups use {}", kdf.describe());

            let mut session = OnboardingSession::new(kdf);
            let mut sink = FileBackupSink::new(&wallet_config.wallet.backup_dir);
            wizard::run(&mut term, &mut session, flow, &mut sink, &mut connector)?;
            if let Some(path) = sink.written() {
                println!("Backup file: {}", path.display());
            }
        }
        Command::Restore(path) => {
            wizard::restore_backup(&mut term, &path, &mut connector)?;
        }
        Command::Status => match connector.load()? {
            Some(record) => println!("Connected: {} (chain {})", record.address, record.chain_id),
            None => println!("No wallet connected"),
        },
        Command::Help | Command::Version | Command::CheckAddress(_) => {}
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"OPM Wallet: non-custodial wallet setup

USAGE:
    opm-wallet <COMMAND> [OPTIONS]

COMMANDS:
    create                  Generate a new wallet and encrypted backup
    import-seed             Import a 12 or 24 word seed phrase
    import-key              Import a raw private key
    restore <FILE>          Unlock a backup file and connect its wallet
    check-address <ADDR>    Check an address for format and checksum
    status                  Show the connected wallet

OPTIONS:
    -c, --config <PATH>   Config file path (defaults apply if omitted)
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    OPM_WALLET_BACKUP_DIR       Directory backups are written to
    OPM_WALLET_DATA_DIR         Directory holding session.json
    OPM_WALLET_LOG_LEVEL        Log level (error/warn/info/debug/trace)
    OPM_WALLET_KDF              pbkdf2-sha256 or argon2id
    OPM_WALLET_KDF_ITERATIONS   KDF iterations (PBKDF2) or passes (Argon2id)
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("opm-wallet")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_args(&args(&["create"])).unwrap().command,
            Command::Onboard(Flow::Create)
        );
        assert_eq!(
            parse_args(&args(&["import-seed"])).unwrap().command,
            Command::Onboard(Flow::ImportSeed)
        );
        assert_eq!(
            parse_args(&args(&["restore", "backup.json"])).unwrap().command,
            Command::Restore(PathBuf::from("backup.json"))
        );
        assert_eq!(
            parse_args(&args(&["check-address", "0xabc"])).unwrap().command,
            Command::CheckAddress("0xabc".into())
        );
        assert_eq!(parse_args(&args(&["status"])).unwrap().command, Command::Status);
        assert_eq!(parse_args(&args(&[])).unwrap().command, Command::Help);
    }

    #[test]
    fn test_parse_config_flag() {
        let cli = parse_args(&args(&["-c", "wallet.toml", "import-key"])).unwrap();
        assert_eq!(cli.command, Command::Onboard(Flow::ImportKey));
        assert_eq!(cli.config_path, Some(PathBuf::from("wallet.toml")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["--config"])).is_err());
        assert!(parse_args(&args(&["restore"])).is_err());
        assert!(parse_args(&args(&["create", "import-key"])).is_err());
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
    }
}
