use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::categories::CategoryRegistry;
use crate::core::config::AppConfig;
use crate::core::shared::models::{NewTicket, Ticket, User};
use crate::core::shared::state::AppState;
use crate::core::shared::storage::{HelpdeskStore, MemoryStore};
use crate::directory::DirectoryService;
use crate::email::{EmailSender, SendOutcome};
use crate::llm::LLMProvider;
use crate::security::{Caller, Role};
use crate::tickets::messages::MessageThread;
use crate::tickets::notifications::DeliveryMode;
use crate::tickets::service::TicketService;

#[derive(Debug)]
pub struct MockLLMProvider {
    response: Result<String, String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLLMProvider {
    pub fn new() -> Self {
        Self::with_response("Mock LLM response")
    }

    pub fn with_response(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            prompts: Arc::default(),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            response: Err(error.to_string()),
            prompts: Arc::default(),
        }
    }

    /// Every prompt the provider has been asked, in order.
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

impl Default for MockLLMProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn generate(
        &self,
        prompt: &str,
        _config: &Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        self.prompts.lock().await.push(prompt.to_string());
        self.response.clone().map_err(Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Keeps every email handed to it; optionally reports each send as failed.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    failure: Option<String>,
}

impl RecordingEmailSender {
    pub fn failing(error: &str) -> Self {
        Self {
            sent: Mutex::default(),
            failure: Some(error.to_string()),
        }
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> SendOutcome {
        self.sent.lock().await.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        match &self.failure {
            Some(error) => SendOutcome::failed(error.clone()),
            None => SendOutcome::sent(),
        }
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt_secret = "test-secret".to_string();
    config.helpdesk.public_url = "http://helpdesk.test".to_string();
    config
}

/// Services wired against an in-memory store, a recording email sender and
/// inline notification delivery.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub email: Arc<RecordingEmailSender>,
    pub state: AppState,
    pub tickets: TicketService,
    pub messages: MessageThread,
    pub categories: CategoryRegistry,
    pub directory: DirectoryService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::build(MemoryStore::new(), test_config())
    }

    pub fn with_last_ticket_number(last: i64) -> Self {
        Self::build(MemoryStore::with_last_ticket_number(last), test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(MemoryStore::new(), config)
    }

    /// Harness whose email transport records every send and reports it failed.
    pub fn with_failing_email(error: &str) -> Self {
        Self::build_with_email(
            MemoryStore::new(),
            test_config(),
            RecordingEmailSender::failing(error),
        )
    }

    fn build(store: MemoryStore, config: AppConfig) -> Self {
        Self::build_with_email(store, config, RecordingEmailSender::default())
    }

    fn build_with_email(store: MemoryStore, config: AppConfig, email: RecordingEmailSender) -> Self {
        let store = Arc::new(store);
        let email = Arc::new(email);
        let state = AppState::new(
            config,
            store.clone(),
            email.clone(),
            Some(Arc::new(MockLLMProvider::default()) as Arc<dyn LLMProvider>),
            DeliveryMode::Inline,
        );
        Self {
            tickets: state.tickets.clone(),
            messages: state.messages.clone(),
            categories: state.categories.clone(),
            directory: state.directory.clone(),
            store,
            email,
            state,
        }
    }
}

pub async fn seed_user(store: &MemoryStore, email: &str, role: Role) -> User {
    let name = email.split('@').next().map(str::to_string);
    store
        .insert_user(User::new(email, name, role))
        .await
        .expect("seed user")
}

pub async fn seed_ticket(store: &MemoryStore, customer: &User, subject: &str) -> Ticket {
    store
        .insert_ticket(NewTicket {
            subject: subject.to_string(),
            customer_id: customer.id,
            ..Default::default()
        })
        .await
        .expect("seed ticket")
}

pub fn caller_for(user: &User) -> Caller {
    Caller::new(user.id, user.email.clone(), user.role)
}
