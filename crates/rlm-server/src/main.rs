use clap::Parser;
use rlm_server::{
    AppState, AuditLogger, Config, MemoryDirectory, MemoryLedger, PostgresDirectory,
    PostgresLedger, SessionLedger, SubscriberDirectory,
};
use sqlx::postgres::PgPoolOptions;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RLM Backend - RADIUS-over-REST access decision server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "rlm_backend")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "config.json")]
    config_path: String,

    /// Validate configuration and exit (doesn't start server)
    #[arg(short, long)]
    validate: bool,

    /// Print version information and exit
    #[arg(short = 'V', long)]
    version: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Handle --version flag
    if cli.version {
        println!("RLM Backend v{}", env!("CARGO_PKG_VERSION"));
        println!("RADIUS-over-REST access decision server");
        println!();
        println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
        println!("License: {}", env!("CARGO_PKG_LICENSE"));
        process::exit(0);
    }

    // Load or create configuration (without logging first)
    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Initialize basic logging to show config creation messages
            tracing_subscriber::registry()
                .with(EnvFilter::new("info"))
                .with(tracing_subscriber::fmt::layer())
                .init();

            // If validation mode, just report error
            if cli.validate {
                eprintln!("❌ Configuration validation failed!");
                eprintln!("   Error: {}", e);
                process::exit(1);
            }

            warn!("Could not load config file from: {}", cli.config_path);
            info!("Creating example configuration at: {}", cli.config_path);

            let example_config = Config::example();
            if let Err(e) = example_config.to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(1);
            }

            info!("Please edit {} and restart the server", cli.config_path);
            process::exit(0);
        }
    };

    // If validate-only mode, validate and exit
    if cli.validate {
        println!("✓ Configuration validated successfully!");
        println!();
        println!("Configuration summary:");
        println!("  Listen: {}:{}", config.listen_address, config.listen_port);
        if config.database_url.is_some() {
            println!("  Backend: PostgreSQL");
        } else {
            println!("  Backend: in-memory");
            println!("  Customers: {}", config.customers.len());
            println!("  Vouchers: {}", config.vouchers.len());
        }
        println!(
            "  Log level: {}",
            config.log_level.as_deref().unwrap_or("info")
        );
        if let Some(ref path) = config.audit_log_path {
            println!("  Audit log: {}", path);
        }
        println!();

        if config.database_url.is_none() && config.customers.is_empty() && config.vouchers.is_empty()
        {
            println!("⚠️  WARNING: No subscribers configured!");
            println!("   Every authorize request will be rejected.");
        }

        process::exit(0);
    }

    // Initialize tracing with configured log level
    let log_level = config.log_level.as_deref().unwrap_or("info");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("RLM Backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config_path);

    // Pick the storage backend
    let (directory, ledger): (Arc<dyn SubscriberDirectory>, Arc<dyn SessionLedger>) =
        match config.database_url {
            Some(ref url) => {
                if !config.customers.is_empty() || !config.vouchers.is_empty() {
                    warn!("Configured customers/vouchers are ignored when database_url is set");
                }

                let pool = match PgPoolOptions::new().max_connections(10).connect(url).await {
                    Ok(pool) => pool,
                    Err(e) => {
                        error!("Failed to connect to database: {}", e);
                        process::exit(1);
                    }
                };
                info!("Connected to PostgreSQL backend");

                let directory = PostgresDirectory::new(pool.clone());
                let ledger = PostgresLedger::new(pool);

                if config.migrate_on_startup {
                    if let Err(e) = directory.migrate().await {
                        error!("Directory schema migration failed: {}", e);
                        process::exit(1);
                    }
                    if let Err(e) = ledger.migrate().await {
                        error!("Ledger schema migration failed: {}", e);
                        process::exit(1);
                    }
                    info!("Database schema up to date");
                }

                (Arc::new(directory), Arc::new(ledger))
            }
            None => {
                let directory = MemoryDirectory::new();
                for customer in &config.customers {
                    directory.add_customer(customer.clone()).await;
                }
                for voucher in &config.vouchers {
                    directory.add_voucher(voucher.clone()).await;
                }
                info!(
                    "In-memory backend: {} customers, {} vouchers",
                    config.customers.len(),
                    config.vouchers.len()
                );
                if config.customers.is_empty() && config.vouchers.is_empty() {
                    warn!("No subscribers configured; every authorize request will be rejected");
                }

                (Arc::new(directory), Arc::new(MemoryLedger::new()))
            }
        };

    // Audit logging
    let audit = match AuditLogger::new(config.audit_log_path.clone()) {
        Ok(logger) => logger,
        Err(e) => {
            error!("Failed to open audit log: {}", e);
            process::exit(1);
        }
    };
    if let Some(path) = audit.file_path() {
        info!("Audit logging enabled: {}", path);
    }

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid listen address: {}", e);
            process::exit(1);
        }
    };

    let state = AppState::new(directory, ledger, Arc::new(audit));

    info!("Server started successfully!");
    info!("Press Ctrl+C to stop");

    if let Err(e) = rlm_server::serve(state, addr).await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}
