use clap::Parser;
use nutria_core::inference::{ModelClient, ModelConfig};
use nutria_core::NutriaConfig;
use nutria_server::http::HttpState;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "nutria.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match NutriaConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG overrides the configured level
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    // Connect to DB
    let pool = match nutria_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match nutria_core::db::server_version(&pool).await {
            Ok(v) => println!("PostgreSQL connected: {}", v),
            Err(e) => {
                println!("PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match nutria_core::db::pgvector_version(&pool).await {
            Ok(v) => println!("pgvector version: {}", v),
            Err(e) => {
                println!("pgvector check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("Nutria DB health check passed");
        return Ok(());
    }

    // Model client — a missing OPENAI_API_KEY is fatal at startup
    let mut model_config = ModelConfig::new(None);
    model_config.chat_model = config.inference.chat_model.clone();
    model_config.embedding_model = config.inference.embedding_model.clone();
    model_config.embedding_dimensions = config.inference.embedding_dimensions as usize;
    model_config.retries = config.inference.retries as usize;
    model_config.base_delay_ms = config.inference.retry_base_delay_ms;

    let model = match ModelClient::new(model_config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Failed to create model client: {}", e);
            std::process::exit(1);
        }
    };

    // Shutdown signal
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = HttpState {
        pool,
        config,
        model,
    };

    nutria_server::http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
