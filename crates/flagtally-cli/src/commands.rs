use anyhow::Context;
use colored::Colorize;
use flagtally_flag::{FlagError, FlagResult, FlagService, FlagStatus};
use flagtally_ledger::{open_ledger, LedgerConfig};
use flagtally_types::{ItemId, UserId};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let ledger = open_ledger(&config)
        .with_context(|| format!("opening {} ledger at {}", config.backend, config.path.display()))?;
    let service = FlagService::with_ledger(ledger);

    match cli.command {
        Command::Flag(args) => cmd_flag(&service, args, &cli.format),
        Command::Count(args) => cmd_count(&service, args, &cli.format),
        Command::Status(args) => cmd_status(&service, args, &cli.format),
        Command::List(args) => cmd_list(&service, args, &cli.format),
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(cli: &Cli) -> anyhow::Result<LedgerConfig> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    if let Some(path) = &cli.ledger {
        config.path = path.clone();
    }
    Ok(config)
}

fn item_id(raw: u64) -> Result<ItemId, FlagError> {
    Ok(ItemId::new(raw)?)
}

fn cmd_flag(service: &FlagService, args: FlagArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let result = service.flag_ids(args.item, args.user)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&result)?),
        OutputFormat::Text => print_flag_result(args.item, &result),
    }
    Ok(())
}

fn print_flag_result(item: u64, result: &FlagResult) {
    if result.success {
        println!("{} Flagged item {}", "✓".green().bold(), item.to_string().yellow());
    } else {
        println!("{} Item {} already flagged by this user", "•".dimmed(), item.to_string().yellow());
    }
    println!("  Flags: {}", result.count.to_string().bold());
}

fn cmd_count(service: &FlagService, args: ItemArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let count = service.count(item_id(args.item)?)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "item": args.item, "count": count })),
        OutputFormat::Text => println!("{}", count),
    }
    Ok(())
}

fn cmd_status(service: &FlagService, args: StatusArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let viewer = args
        .user
        .map(UserId::new)
        .transpose()
        .map_err(FlagError::from)?;
    let status = service.status(item_id(args.item)?, viewer)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&status)?),
        OutputFormat::Text => print_status(&status),
    }
    Ok(())
}

fn print_status(status: &FlagStatus) {
    let state = if status.flagged {
        "flagged by you".red().bold()
    } else {
        "not flagged by you".green()
    };
    println!("Item {}: {} flags, {}", status.item.to_string().yellow(), status.count.to_string().bold(), state);
}

fn cmd_list(service: &FlagService, args: ItemArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let records = service.records(item_id(args.item)?)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No flags on item {}.", args.item.to_string().yellow());
            }
            for record in &records {
                println!(
                    "{}  user {}  {}",
                    record.id.to_string().yellow(),
                    record.user.to_string().bold(),
                    record.created_at.to_rfc3339().dimmed()
                );
            }
        }
    }
    Ok(())
}
