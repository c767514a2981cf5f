use anyhow::Result;
use clap::{Parser, Subcommand};
use portal::config::ServerConfig;
use portal::database::maintenance::{self, PurgeTarget};
use portal::database::seed_data;
use portal::server;
use portal::services::ordering;
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Serve {
        #[clap(short, long, default_value = "3000")]
        port: u16,
        #[clap(short, long, default_value = "portal.db")]
        database: String,
        #[clap(long)]
        cors_origin: Option<String>,
        /// Materials per page in the catalog table
        #[clap(long, default_value = "20")]
        page_size: u64,
        /// Username that owns the shared material catalog
        #[clap(long, default_value = "public")]
        public_owner: String,
        /// Request header carrying the authenticated username
        #[clap(long, default_value = "x-remote-user")]
        identity_header: String,
        /// Act as this user when the identity header is missing (development only)
        #[clap(long)]
        dev_user: Option<String>,
    },
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init {
        #[clap(short, long, default_value = "portal.db")]
        database: String,
        #[clap(long, default_value = "public")]
        public_owner: String,
    },
    Migrate {
        #[clap(subcommand)]
        direction: server::MigrateDirection,
        #[clap(short, long, default_value = "portal.db")]
        database: String,
    },
    /// Repair order lists that drifted from the child rows
    Reconcile {
        #[clap(short, long, default_value = "portal.db")]
        database: String,
    },
    /// Add the reference set of public materials
    SeedMaterials {
        #[clap(short, long, default_value = "portal.db")]
        database: String,
        #[clap(long, default_value = "public")]
        public_owner: String,
    },
    /// Delete every row of one kind
    Purge {
        #[clap(value_enum)]
        target: PurgeTarget,
        #[clap(short, long, default_value = "portal.db")]
        database: String,
        #[clap(long, default_value = "public")]
        public_owner: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Serve {
            port,
            database,
            cors_origin,
            page_size,
            public_owner,
            identity_header,
            dev_user,
        } => {
            info!("Starting server on port {}", port);
            let config = ServerConfig {
                page_size,
                public_owner,
                identity_header: identity_header.to_lowercase(),
                dev_user,
                cors_origin,
            };
            server::start_server(port, &database, config).await?;
        }
        Commands::Db { command } => match command {
            DbCommands::Init {
                database,
                public_owner,
            } => {
                info!("Initializing database: {}", database);
                let db = server::open_database(&database).await?;
                seed_data::seed_defaults(&db, &public_owner).await?;
            }
            DbCommands::Migrate {
                direction,
                database,
            } => {
                info!("Running database migration: {:?}", direction);
                server::migrate_database(&database, direction).await?;
            }
            DbCommands::Reconcile { database } => {
                let db = server::open_database(&database).await?;
                let repaired = ordering::reconcile_all(&db).await?;
                info!("Reconciled {} containers", repaired);
            }
            DbCommands::SeedMaterials {
                database,
                public_owner,
            } => {
                let db = server::open_database(&database).await?;
                let added = seed_data::seed_sample_materials(&db, &public_owner).await?;
                info!("Added {} sample materials", added);
            }
            DbCommands::Purge {
                target,
                database,
                public_owner,
            } => {
                let db = server::open_database(&database).await?;
                let removed = maintenance::purge(&db, target, &public_owner).await?;
                info!("Purged {} rows ({:?})", removed, target);
            }
        },
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("handlebars=off,{}", log_level)))
        .without_time()
        .init();
}
