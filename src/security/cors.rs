use axum::http::{header, HeaderValue, Method};
use log::info;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allow_credentials: true,
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    pub fn with_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    pub fn build(self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        let allow_origin = if origins.is_empty() {
            AllowOrigin::predicate(|origin: &HeaderValue, _| {
                origin.to_str().map(is_localhost_origin).unwrap_or(false)
            })
        } else {
            AllowOrigin::list(origins)
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(self.allowed_methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .allow_credentials(self.allow_credentials)
            .max_age(Duration::from_secs(self.max_age_secs))
    }
}

fn is_localhost_origin(origin: &str) -> bool {
    [
        "http://localhost",
        "https://localhost",
        "http://127.0.0.1",
        "https://127.0.0.1",
    ]
    .iter()
    .any(|prefix| {
        origin
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
    })
}

/// Configured origins, or localhost-only for development when none are set.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        info!("Creating CORS layer with development defaults (no origins configured)");
    } else {
        info!("CORS configured with {} allowed origins", origins.len());
    }
    CorsConfig::default().with_origins(origins.to_vec()).build()
}
