use std::io;
use std::process::ExitCode;

use cart_agg::Cart;
use cart_agg::config::{Config, USAGE};
use cart_agg::csv::{read_commands, read_stock, write_cart};
use cart_agg::discount::{DiscountPolicy, NoDiscount};
use cart_agg::storage::FileSlot;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    if !config.actions_path.to_string_lossy().ends_with(".csv") {
        warn!(path = %config.actions_path.display(), "actions file seems to not be a csv file");
    }

    let stock = match read_stock(&config.stock_path) {
        Ok(stock) => stock,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let slot = match FileSlot::new(&config.storage_dir) {
        Ok(slot) => slot,
        Err(e) => {
            error!(dir = %config.storage_dir.display(), "cannot create storage directory: {e}");
            return ExitCode::FAILURE;
        }
    };
    let commands = match read_commands(config.actions_path.clone()) {
        Ok(commands) => commands,
        Err(e) => {
            error!("{e}; {USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let discount: Box<dyn DiscountPolicy> = match config.discount {
        Some(policy) => Box::new(policy),
        None => Box::new(NoDiscount),
    };
    let mut cart = Cart::open_with(config.namespace, config.identity, stock, slot, discount);
    info!(key = %cart.slot_key(), lines = cart.len(), "cart opened");

    let (command_sender, command_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if command_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    cart.run(ReceiverStream::new(command_receiver)).await;

    if let Err(e) = write_cart(io::stdout().lock(), cart.items(), &cart.totals()) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
