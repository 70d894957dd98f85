use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "adm")]
#[command(about = "Admin order glue CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        /// Layered config paths; `database.url_env` names the URL variable
        #[arg(long = "config", global = true)]
        config_paths: Vec<String>,

        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env overrides ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Order store commands
    Orders {
        #[command(subcommand)]
        cmd: OrdersCmd,
    },

    /// Request gateway utilities
    Gateway {
        #[command(subcommand)]
        cmd: GatewayCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum OrdersCmd {
    /// Insert an order row. Existing ids are left untouched.
    Insert {
        #[arg(long)]
        id: String,

        /// createdAt as stored: ISO string, epoch millis, or a JSON object.
        /// Defaults to now.
        #[arg(long)]
        created_at: Option<String>,

        #[arg(long, default_value = "pending")]
        status: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Print one order as JSON
    Show {
        #[arg(long)]
        id: String,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Run one sweep: move every due pending order to processing
    Sweep {
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum GatewayCmd {
    /// Print the resource class and strategy for a URL (no I/O)
    Classify {
        url: String,

        /// HTTP method; non-GET requests are never intercepted
        #[arg(long, default_value = "GET")]
        method: String,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { config_paths, cmd } => {
            let (loaded, cfg) = commands::load_config(&config_paths)?;
            let pool = commands::connect(&loaded, &cfg).await?;
            match cmd {
                DbCmd::Status => {
                    let s = adm_db::status(&pool).await?;
                    println!("db_ok={} has_orders_table={}", s.ok, s.has_orders_table);
                    if s.has_orders_table {
                        for (status, n) in adm_db::count_by_status(&pool).await? {
                            println!("orders_{status}={n}");
                        }
                    }
                }
                DbCmd::Migrate => {
                    adm_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = adm_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Orders { cmd } => match cmd {
            OrdersCmd::Insert {
                id,
                created_at,
                status,
                config_paths,
            } => commands::orders::insert(&config_paths, &id, created_at.as_deref(), &status).await?,
            OrdersCmd::Show { id, config_paths } => {
                commands::orders::show(&config_paths, &id).await?
            }
            OrdersCmd::Sweep { config_paths } => commands::orders::sweep(&config_paths).await?,
        },

        Commands::Gateway { cmd } => match cmd {
            GatewayCmd::Classify {
                url,
                method,
                config_paths,
            } => commands::gateway::classify(&config_paths, &url, &method)?,
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays parseable `key=value` output.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
