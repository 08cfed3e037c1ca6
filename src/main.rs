use dotenvy::dotenv;
use log::{info, warn};
use std::sync::Arc;

use helpdesk::core::shared::storage::{HelpdeskStore, MemoryStore, PgStore};
use helpdesk::core::shared::{create_conn, run_migrations};
use helpdesk::email::sender_from_config;
use helpdesk::llm::LLMProvider;
use helpdesk::security::Caller;
use helpdesk::tickets::DeliveryMode;
use helpdesk::{run_axum_server, AppConfig, AppState};

const USAGE: &str = "Usage: helpdesk [serve | bootstrap-admin <email> <name> | token <email>] [--memory]

  serve              Run the HTTP API (default)
  bootstrap-admin    Create the first administrator; password is read from ADMIN_PASSWORD
  token              Print a bearer token for an existing user
  --memory           Use the in-process store instead of PostgreSQL";

fn open_store(config: &AppConfig, in_memory: bool) -> anyhow::Result<Arc<dyn HelpdeskStore>> {
    if in_memory {
        warn!("Using in-memory store; data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let pool = create_conn(&config.database_url)?;
    run_migrations(&pool).map_err(|e| anyhow::anyhow!("Migration failed: {e}"))?;
    info!("Database migrations applied");
    Ok(Arc::new(PgStore::new(pool)))
}

#[cfg(feature = "llm")]
fn llm_provider(config: &AppConfig) -> Option<Arc<dyn LLMProvider>> {
    match helpdesk::llm::OpenAIClient::from_config(&config.llm) {
        Some(client) => {
            info!("AI assistant enabled (model {})", config.llm.model);
            Some(Arc::new(client) as Arc<dyn LLMProvider>)
        }
        None => {
            info!("OPENAI_API_KEY not set, AI assistant disabled");
            None
        }
    }
}

#[cfg(not(feature = "llm"))]
fn llm_provider(_config: &AppConfig) -> Option<Arc<dyn LLMProvider>> {
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return Ok(());
    }
    let in_memory = args.iter().any(|a| a == "--memory");
    let positional: Vec<&str> = args
        .iter()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .collect();

    let config = AppConfig::from_env()?;
    let store = open_store(&config, in_memory)?;
    let email = sender_from_config(&config.email);
    let llm = llm_provider(&config);
    let state = Arc::new(AppState::new(
        config,
        store,
        email,
        llm,
        DeliveryMode::Background,
    ));

    match positional.as_slice() {
        [] | ["serve"] => {
            info!("Starting helpdesk v{}", env!("CARGO_PKG_VERSION"));
            run_axum_server(state).await?;
        }
        ["bootstrap-admin", email, name] => {
            let password = std::env::var("ADMIN_PASSWORD")
                .map_err(|_| anyhow::anyhow!("ADMIN_PASSWORD must be set"))?;
            let admin = state.directory.bootstrap_admin(name, email, &password).await?;
            println!("Created administrator {} ({})", admin.email, admin.id);
        }
        ["token", email] => {
            let user = state
                .store
                .find_user_by_email(&email.to_lowercase())
                .await?
                .ok_or_else(|| anyhow::anyhow!("No user with email {email}"))?;
            let caller = Caller::new(user.id, user.email, user.role);
            println!("{}", state.auth.issue_token(&caller)?);
        }
        _ => anyhow::bail!("{USAGE}"),
    }

    Ok(())
}
