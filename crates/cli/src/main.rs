//! `proptalk` binary: configuration loading, component wiring, and the
//! webhook server lifecycle.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    clap::{Parser, Subcommand},
    sqlx::SqlitePool,
    tokio_util::{sync::CancellationToken, task::TaskTracker},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    proptalk_channels::{Agent, ConversationLog},
    proptalk_common::Platform,
    proptalk_config::{Config, Severity},
    proptalk_delivery::{DeliveryService, RetryPolicy},
    proptalk_gateway::{AppState, OpenAiProvider, builtin_catalog, serve, spawn_maintenance},
    proptalk_limits::{FixedWindowLimiter, RateLimit},
    proptalk_registration::Registrar,
    proptalk_router::IntentRouter,
    proptalk_sessions::{SessionManager, SessionStore, TemplateCatalog},
    proptalk_storage::{
        SqliteAgentDirectory, SqliteConversationLog, SqliteForwardLog, SqliteSessionStore,
        SqliteUpdateDedup, SqliteUserStore, init_all,
    },
    proptalk_telegram::TelegramSender,
    proptalk_whatsapp::WhatsAppSender,
};

/// Hard ceiling for one platform API call; retries handle the rest.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "proptalk", about = "PropTalk — conversational front-end for real-estate agents")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server (default when no subcommand is provided).
    Serve,
    /// Check the configuration and report every problem found.
    Doctor,
    /// Agent directory management.
    Agents {
        #[command(subcommand)]
        action: AgentAction,
    },
}

#[derive(Subcommand)]
enum AgentAction {
    /// Add an agent (or reactivate/rename an existing one by email).
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .init();
    }
}

/// Report config diagnostics; error out when any is fatal.
fn check_config(config: &Config) -> anyhow::Result<()> {
    let diagnostics = proptalk_config::validate(config);
    let mut fatal = 0;
    for d in &diagnostics {
        match d.severity {
            Severity::Error => {
                fatal += 1;
                tracing::error!(field = d.field, "{}", d.message);
            },
            Severity::Warning => warn!(field = d.field, "{}", d.message),
        }
    }
    if fatal > 0 {
        anyhow::bail!("{fatal} configuration error(s); fix them and restart");
    }
    Ok(())
}

async fn connect_storage(config: &Config) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePool::connect(&config.storage.database_url).await?;
    init_all(&pool).await?;
    Ok(pool)
}

/// Wire every component together from the loaded configuration.
fn build_state(config: &Config, pool: &SqlitePool) -> anyhow::Result<AppState> {
    let minute = Duration::from_secs(60);

    let telegram = TelegramSender::new(
        config.telegram.bot_token.clone(),
        config.telegram.api_base.clone(),
        HTTP_TIMEOUT,
    )?;
    let whatsapp = WhatsAppSender::new(
        config.whatsapp.account_sid.clone(),
        config.whatsapp.auth_token.clone(),
        config.whatsapp.from_number.clone(),
        config.whatsapp.api_base.clone(),
        HTTP_TIMEOUT,
    )?;
    let delivery = Arc::new(
        DeliveryService::new(
            FixedWindowLimiter::new(RateLimit {
                max_requests: config.limits.outbound_per_minute,
                window: minute,
            }),
            RetryPolicy {
                max_attempts: config.limits.max_delivery_attempts,
                backoff_base: Duration::from_millis(config.limits.backoff_base_ms),
            },
        )
        .with_adapter(Platform::Telegram, Arc::new(telegram))
        .with_adapter(Platform::Whatsapp, Arc::new(whatsapp)),
    );

    let conversation: Arc<dyn ConversationLog> = Arc::new(SqliteConversationLog::new(pool.clone()));
    let catalog: Arc<dyn TemplateCatalog> = Arc::new(builtin_catalog());
    let sessions = Arc::new(SessionManager::new(
        Arc::new(SqliteSessionStore::new(pool.clone())) as Arc<dyn SessionStore>,
        Arc::clone(&catalog),
        Duration::from_secs(config.sessions.idle_timeout_secs),
    ));

    let provider = OpenAiProvider::new(
        config.ai.api_key.clone(),
        config.ai.model.clone(),
        config.ai.api_base.clone(),
        Duration::from_secs(config.ai.timeout_secs),
    )?;
    let intents = Arc::new(IntentRouter::new(
        Arc::clone(&sessions),
        Arc::clone(&catalog),
        Arc::clone(&delivery),
        Arc::new(SqliteForwardLog::new(pool.clone())),
        Arc::clone(&conversation),
        proptalk_router::CalculatorRegistry::with_builtin(),
        Arc::new(provider),
        config.ai.history_limit,
    ));
    let registrar = Arc::new(Registrar::new(
        Arc::new(SqliteUserStore::new(pool.clone())),
        Arc::new(SqliteAgentDirectory::new(pool.clone())),
    ));

    Ok(AppState {
        registrar,
        intents,
        delivery,
        dedup: Arc::new(SqliteUpdateDedup::new(pool.clone())),
        conversation,
        sessions,
        telegram_limiter: FixedWindowLimiter::new(RateLimit {
            max_requests: config.limits.telegram_per_minute,
            window: minute,
        }),
        whatsapp_limiter: FixedWindowLimiter::new(RateLimit {
            max_requests: config.limits.whatsapp_per_minute,
            window: minute,
        }),
        webhook_secret: config.telegram.webhook_secret.clone(),
        tracker: TaskTracker::new(),
    })
}

async fn run_server(cli: Cli, config: Config) -> anyhow::Result<()> {
    check_config(&config)?;

    let pool = connect_storage(&config).await?;
    let state = build_state(&config, &pool)?;

    let bind = cli.bind.unwrap_or(config.server.bind);
    let port = cli.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    spawn_maintenance(
        state.clone(),
        cancel.clone(),
        Duration::from_secs(config.sessions.sweep_interval_secs),
    );
    serve(addr, state, cancel).await
}

async fn add_agent(config: &Config, name: String, email: String) -> anyhow::Result<()> {
    let pool = connect_storage(config).await?;
    let directory = SqliteAgentDirectory::new(pool);
    directory
        .upsert(&Agent {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.clone(),
            email: email.clone(),
            active: true,
        })
        .await?;
    println!("Agent '{name}' <{email}> is active.");
    Ok(())
}

fn doctor(config: &Config) {
    let diagnostics = proptalk_config::validate(config);
    if diagnostics.is_empty() {
        println!("Configuration looks good.");
        return;
    }
    for d in &diagnostics {
        let tag = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        println!("{tag:>7}  {}: {}", d.field, d.message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mut cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "proptalk starting");
    let config = proptalk_config::from_env();

    match cli.command.take() {
        None | Some(Commands::Serve) => run_server(cli, config).await,
        Some(Commands::Doctor) => {
            doctor(&config);
            Ok(())
        },
        Some(Commands::Agents {
            action: AgentAction::Add { name, email },
        }) => add_agent(&config, name, email).await,
    }
}
