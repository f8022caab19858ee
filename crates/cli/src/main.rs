//! Pocket Shop CLI - cart and order management from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Create an account (prints a token to export as POCKET_SHOP_TOKEN)
//! pocket-shop signup -n "Ada" -e ada@example.com -p hunter2hunter2
//!
//! # Work with the cart
//! pocket-shop cart add 7
//! pocket-shop cart remove 7
//! pocket-shop cart show
//!
//! # Place and progress orders
//! pocket-shop orders checkout
//! pocket-shop orders pay 12
//! pocket-shop orders receive 12
//! pocket-shop orders show 12
//! ```
//!
//! # Commands
//!
//! - `signup` - Create an account
//! - `cart` - Show, add to, remove from, or clear the cart
//! - `orders` - List, place, pay, receive, or inspect orders
//! - `products` - Browse the catalog, optionally by category

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use pocket_shop_client::{AppState, ClientConfig, ClientError};
use pocket_shop_core::{OrderId, ProductId};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "pocket-shop")]
#[command(author, version, about = "Pocket Shop command-line client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Browse the catalog
    Products {
        /// Show a single product
        #[arg(long, conflicts_with_all = ["category", "categories"])]
        id: Option<ProductId>,

        /// Only list products in this category
        #[arg(long, conflicts_with = "categories")]
        category: Option<String>,

        /// List the catalog's categories
        #[arg(long)]
        categories: bool,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart as stored on the backend
    Show,
    /// Add one unit of a product
    Add {
        /// Product id
        product_id: ProductId,

        /// Unit price (looked up in the catalog if omitted)
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// Remove one unit of a product
    Remove {
        /// Product id
        product_id: ProductId,
    },
    /// Remove everything
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders grouped by stage
    List,
    /// Turn the cart into an order
    Checkout,
    /// Mark an order paid
    Pay {
        /// Order id
        order_id: OrderId,
    },
    /// Mark an order delivered
    Receive {
        /// Order id
        order_id: OrderId,
    },
    /// Show an order's items
    Show {
        /// Order id
        order_id: OrderId,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO | tracing::Level::DEBUG => {
            sentry_tracing::EventFilter::Breadcrumb
        }
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            fail(&ClientError::from(e).report());
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = init_sentry(&config);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pocket_shop_client=info,pocket_shop_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let state = AppState::new(config);

    if let Err(e) = run(cli, &state).await {
        let message = e.report();
        // Flush Sentry before exiting
        drop(sentry_guard);
        fail(&message);
        std::process::exit(1);
    }
}

#[allow(clippy::print_stderr)]
fn fail(message: &str) {
    eprintln!("error: {message}");
}

async fn run(cli: Cli, state: &AppState) -> Result<(), ClientError> {
    match cli.command {
        Commands::Signup {
            name,
            email,
            password,
        } => commands::account::signup(state, &name, &email, password).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(state).await?,
            CartAction::Add { product_id, price } => {
                commands::cart::add(state, product_id, price).await?;
            }
            CartAction::Remove { product_id } => commands::cart::remove(state, product_id).await?,
            CartAction::Clear => commands::cart::clear(state).await?,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List => commands::orders::list(state).await?,
            OrdersAction::Checkout => commands::orders::checkout(state).await?,
            OrdersAction::Pay { order_id } => commands::orders::pay(state, order_id).await?,
            OrdersAction::Receive { order_id } => {
                commands::orders::receive(state, order_id).await?;
            }
            OrdersAction::Show { order_id } => commands::orders::show(state, order_id).await?,
        },
        Commands::Products {
            id,
            category,
            categories,
        } => {
            if categories {
                commands::products::categories(state).await?;
            } else if let Some(id) = id {
                commands::products::show(state, id).await?;
            } else {
                commands::products::list(state, category.as_deref()).await?;
            }
        }
    }
    Ok(())
}
