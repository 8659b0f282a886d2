#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use rowstore::config::StoreConfig;
use rowstore::repl::Repl;
use rowstore::storage::Pager;
use rowstore::table::Table;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    // Logs go to stderr so the REPL owns stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rowstore=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment variables
    let mut config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(path) = std::env::args_os().nth(1) {
        config = config.with_database_path(path);
    }

    tracing::info!(
        "Loaded configuration: database_path={}, max_pages={}",
        config.database_path.display(),
        config.max_pages
    );

    let pager = match Pager::open(&config.database_path, config.max_pages) {
        Ok(pager) => pager,
        Err(e) => {
            tracing::error!(
                "Failed to open database {}: {e}",
                config.database_path.display()
            );
            std::process::exit(1);
        }
    };
    let table = match Table::open(pager) {
        Ok(table) => table,
        Err(e) => {
            tracing::error!("Failed to open table: {e}");
            std::process::exit(1);
        }
    };

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    if let Err(e) = Repl::new(table).run(stdin.lock(), &mut stdout) {
        tracing::error!("Session ended with error: {e}");
        std::process::exit(1);
    }
}
