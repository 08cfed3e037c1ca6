use std::sync::Arc;

use crate::categories::CategoryRegistry;
use crate::core::config::AppConfig;
use crate::core::shared::storage::HelpdeskStore;
use crate::directory::DirectoryService;
use crate::email::EmailSender;
use crate::llm::LLMProvider;
use crate::security::AuthConfig;
use crate::tickets::assistant::TicketAssistant;
use crate::tickets::messages::MessageThread;
use crate::tickets::notifications::{DeliveryMode, NotificationDispatcher};
use crate::tickets::service::TicketService;

/// Everything a request handler needs. Built once at startup and shared
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth: AuthConfig,
    pub store: Arc<dyn HelpdeskStore>,
    pub tickets: TicketService,
    pub messages: MessageThread,
    pub categories: CategoryRegistry,
    pub directory: DirectoryService,
    /// Present only when an LLM provider is configured.
    pub assistant: Option<TicketAssistant>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn HelpdeskStore>,
        email: Arc<dyn EmailSender>,
        llm: Option<Arc<dyn LLMProvider>>,
        delivery: DeliveryMode,
    ) -> Self {
        let notifier = NotificationDispatcher::new(email, delivery);
        let messages = MessageThread::new(Arc::clone(&store), notifier.clone());
        let directory = DirectoryService::new(Arc::clone(&store), &config.helpdesk);
        let tickets = TicketService::new(
            Arc::clone(&store),
            messages.clone(),
            notifier,
            directory.clone(),
            config.helpdesk.tickets_per_page,
        );
        let assistant = llm.map(|provider| {
            TicketAssistant::new(
                provider,
                Arc::clone(&store),
                messages.clone(),
                config.llm.trigger.clone(),
            )
        });

        Self {
            auth: AuthConfig::new(config.jwt_secret.clone()),
            categories: CategoryRegistry::new(Arc::clone(&store)),
            config,
            store,
            tickets,
            messages,
            directory,
            assistant,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("server", &self.config.server)
            .field("database_url", &"[REDACTED]")
            .field("auth", &self.auth)
            .field("store", &"Arc<dyn HelpdeskStore>")
            .field("tickets", &self.tickets)
            .field("directory", &self.directory)
            .field("assistant", &self.assistant.is_some())
            .finish()
    }
}
