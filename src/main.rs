//! mongo-console binary
//!
//! Runs shell-style commands against MongoDB (or an in-process store) and
//! prints JSON results.
//!
//! # Usage
//!
//! ```bash
//! # One-shot commands
//! mongo-console mongodb://localhost:27017 --database shop -e 'db.products.countDocuments()'
//!
//! # One command per stdin line
//! printf 'show dbs\nuse shop\ndb.getCollectionNames()\n' | mongo-console
//! ```

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use mongo_console::cli::CliInterface;
use mongo_console::error::Result;
use mongo_console::executor::{CommandRouter, ReadOnlyFlag, ResultData};
use mongo_console::formatter::Formatter;
use mongo_console::store::{DocumentStore, MemoryStore, MongoStore};

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// Returns whether every command succeeded.
async fn run() -> Result<bool> {
    let cli = CliInterface::new()?;
    cli.init_logging();

    let store = create_store(&cli).await?;
    let read_only = ReadOnlyFlag::new(cli.config().console.read_only);
    let router = CommandRouter::new(store, Arc::new(read_only));

    let display = &cli.config().display;
    let formatter = Formatter::new(display.format, display.color_output);

    let mut session = Session {
        router,
        formatter,
        current_database: cli.initial_database(),
        failures: 0,
    };

    if cli.args().execute.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            session.run_command(&line).await;
        }
    } else {
        for command in &cli.args().execute {
            session.run_command(command).await;
        }
    }

    debug!("Finished with {} failed command(s)", session.failures);
    Ok(session.failures == 0)
}

/// Connect to MongoDB, or create an empty in-process store
async fn create_store(cli: &CliInterface) -> Result<Arc<dyn DocumentStore>> {
    if cli.args().in_memory {
        info!("Using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = MongoStore::connect(&cli.config().connection).await?;
    Ok(Arc::new(store))
}

/// Per-process interpreter state
struct Session {
    router: CommandRouter,
    formatter: Formatter,
    /// Updated after a successful `use <db>`
    current_database: Option<String>,
    failures: usize,
}

impl Session {
    /// Execute one command and print its result or error
    async fn run_command(&mut self, input: &str) {
        match self
            .router
            .execute(input, self.current_database.as_deref())
            .await
        {
            Ok(result) => {
                if let ResultData::Switched { database, .. } = &result.data {
                    self.current_database = Some(database.clone());
                }

                match self.formatter.format(&result) {
                    Ok(output) => println!("{}", output),
                    Err(e) => {
                        self.failures += 1;
                        eprintln!("{}", self.formatter.format_error(&e));
                    }
                }
            }
            Err(e) => {
                self.failures += 1;
                eprintln!("{}", self.formatter.format_error(&e));
            }
        }
    }
}
