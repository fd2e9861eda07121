mod cli;
mod error;
mod fmt;
mod ledger;
mod lifecycle;
mod models;
mod promotions;
mod rebate;
mod settings;
mod store;
mod wallet;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::promo::EditFlags;
use cli::{
    CardsCommands, CategoriesCommands, Cli, Commands, OneTimeCommands, PromoCommands, TxCommands,
    WalletCommands,
};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("KAKEIBO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init {
            data_dir,
            backend,
            name,
        } => cli::init::run(data_dir, backend, name),
        Commands::Status => cli::status::run(),
        Commands::Cards { command } => match command {
            CardsCommands::Add {
                name,
                starting,
                basic,
                rates,
            } => cli::cards::add(&name, starting, &basic, rates),
            CardsCommands::Edit {
                id,
                name,
                starting,
                basic,
                rates,
                clear_rates,
            } => cli::cards::edit(&id, name, starting, basic.as_deref(), rates, clear_rates),
            CardsCommands::Remove { id, yes } => cli::cards::remove(&id, yes),
            CardsCommands::List => cli::cards::list(),
        },
        Commands::Categories { command } => match command {
            CategoriesCommands::Add { name } => cli::categories::add(&name),
            CategoriesCommands::Remove { name, yes } => cli::categories::remove(&name, yes),
            CategoriesCommands::List => cli::categories::list(),
        },
        Commands::Tx { command } => match command {
            TxCommands::Add { fields } => cli::transactions::add(fields),
            TxCommands::Edit { id, fields } => cli::transactions::edit(&id, fields),
            TxCommands::Remove { id } => cli::transactions::remove(&id),
            TxCommands::List { card, status } => cli::transactions::list(card.as_deref(), status),
            TxCommands::Suggest { card, categories } => cli::transactions::suggest(&card, &categories),
        },
        Commands::Wallet { today, command } => match command {
            None => cli::wallet::show(today),
            Some(WalletCommands::Override { card, amount }) => cli::wallet::set_override(&card, amount),
            Some(WalletCommands::Clear { card }) => cli::wallet::clear_override(&card),
        },
        Commands::Promo { command } => match command {
            PromoCommands::Add { title, fields } => cli::promo::add(&title, fields),
            PromoCommands::Edit {
                id,
                title,
                fields,
                no_target,
                no_cap,
                no_rebate_by,
            } => cli::promo::edit(
                &id,
                title,
                fields,
                EditFlags {
                    no_target,
                    no_cap,
                    no_rebate_by,
                },
            ),
            PromoCommands::Remove { id } => cli::promo::remove(&id),
            PromoCommands::List { today } => cli::promo::list(today),
            PromoCommands::Pay { id, yes } => cli::promo::pay(&id, yes),
        },
        Commands::OneTime { command } => match command {
            OneTimeCommands::Add {
                title,
                amount,
                card,
                start,
                end,
            } => cli::one_time::add(&title, amount, card, start, end),
            OneTimeCommands::List => cli::one_time::list(),
            OneTimeCommands::Pay { id, yes } => cli::one_time::pay(&id, yes),
            OneTimeCommands::Remove { id } => cli::one_time::remove(&id),
        },
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "kakeibo", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
