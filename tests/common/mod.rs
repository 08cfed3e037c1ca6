#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

use helpdesk::core::shared::models::User;
use helpdesk::core::shared::storage::{HelpdeskStore, MemoryStore};
use helpdesk::email::{EmailSender, SendOutcome};
use helpdesk::llm::LLMProvider;
use helpdesk::security::{Caller, Role};
use helpdesk::tickets::DeliveryMode;
use helpdesk::{build_router, AppConfig, AppState};

#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => panic!("Expected Ok, got Err: {:?}", err),
        }
    };
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
}

#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> SendOutcome {
        self.sent.lock().await.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
        });
        SendOutcome::sent()
    }
}

pub struct CannedLLM(pub &'static str);

#[async_trait]
impl LLMProvider for CannedLLM {
    async fn generate(
        &self,
        _prompt: &str,
        _config: &Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.0.to_string())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub email: Arc<RecordingEmailSender>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt_secret = "integration-secret".to_string();
    config.helpdesk.public_url = "http://helpdesk.test".to_string();
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(test_config(), None)
    }

    pub fn with(config: AppConfig, llm: Option<Arc<dyn LLMProvider>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let email = Arc::new(RecordingEmailSender::default());
        let state = Arc::new(AppState::new(
            config,
            store.clone(),
            email.clone(),
            llm,
            DeliveryMode::Inline,
        ));
        Self {
            router: build_router(Arc::clone(&state)),
            state,
            store,
            email,
        }
    }

    /// Stores a user and returns it with a valid bearer token.
    pub async fn user(&self, email: &str, name: &str, role: Role) -> (User, String) {
        let user = assert_ok!(
            self.store
                .insert_user(User::new(email, Some(name.to_string()), role))
                .await
        );
        let caller = Caller::new(user.id, user.email.clone(), user.role);
        let token = assert_ok!(self.state.auth.issue_token(&caller));
        (user, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        };
        let request = assert_ok!(request);

        let response = assert_ok!(self.router.clone().oneshot(request).await);
        let status = response.status();
        let bytes = assert_ok!(response.into_body().collect().await).to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            assert_ok!(serde_json::from_slice(&bytes))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }
}
