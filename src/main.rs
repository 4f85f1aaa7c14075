use anyhow::{Context, Result};
use cairn::audit::AuditLog;
use cairn::cli::inspect::{print_audit, print_config};
use cairn::cli::output::Output;
use cairn::cli::refresh::Refresher;
use cairn::cli::{Cli, Commands};
use cairn::utils::toml_config::{CairnConfig, ServerConfig};
use cairn::{build_state, create_app, CairnConfigManager};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(err) = run(&cli, &output).await {
        output.error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn init_tracing(server: &ServerConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        server.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cairn={0},cairn_server={0},tower_http={0}",
            default_level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if server.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: &Cli, output: &Output) -> Result<()> {
    if let Commands::Config { validate: true } = cli.command() {
        // No fallback to defaults here: a missing file is not a valid one.
        CairnConfig::load(&cli.config)
            .with_context(|| format!("Invalid configuration in {}", cli.config.display()))?;
        output.success(&format!("{} is valid", cli.config.display()));
        return Ok(());
    }

    let mut config_manager = CairnConfigManager::new(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let config = config_manager.config();
    init_tracing(&config.server, cli.verbose);

    match cli.command() {
        Commands::Serve => {
            output.banner();
            if let Err(e) = config_manager.start_watching() {
                tracing::warn!(error = %e, "Config hot reload disabled");
            }
            serve(Arc::new(config_manager)).await
        }
        Commands::Refresh { backend_url } => {
            let backend_url = backend_url
                .clone()
                .unwrap_or_else(|| format!("http://localhost:{}", config.server.port));

            if config.sources.is_empty() {
                output.warning("No [[sources]] configured");
                output.hint(&format!("Add sources to {}", cli.config.display()));
                return Ok(());
            }

            output.header(&format!(
                "Refreshing {} sources via {}",
                config.sources.len(),
                backend_url
            ));
            let report = Refresher::new(&backend_url)?
                .run(&config.sources, output)
                .await;

            output.newline();
            output.kv("ingested", &report.succeeded().to_string());
            output.kv("failed", &report.failed().to_string());
            output.kv("chunks", &report.total_chunks().to_string());
            Ok(())
        }
        Commands::Config { .. } => {
            print_config(&config, output);
            Ok(())
        }
        Commands::Audit { tail } => {
            let entries = AuditLog::from_config(&config.audit)
                .tail(*tail)
                .await
                .context("Failed to read audit log")?;
            print_audit(&entries, output);
            Ok(())
        }
    }
}

async fn serve(config_manager: Arc<CairnConfigManager>) -> Result<()> {
    let addr = config_manager.config().bind_address();

    let state = build_state(config_manager)
        .await
        .context("Failed to initialize backends")?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Cairn listening on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
