use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::Category;
use crate::core::shared::state::AppState;
use crate::core::shared::storage::HelpdeskStore;
use crate::core::shared::utils::normalize_email;
use crate::security::{require_caller, require_permission, Caller, OptionalCaller, Permission};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CategoryRequest {
    fn validated(self) -> Result<(String, Option<String>), HelpdeskError> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| HelpdeskError::validation("name is required"))?;
        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                normalize_email(raw)
                    .ok_or_else(|| HelpdeskError::validation(format!("Invalid email: {raw}")))?,
            ),
        };
        Ok((name, email))
    }
}

/// Named buckets tickets can be filed under.
#[derive(Clone)]
pub struct CategoryRegistry {
    store: Arc<dyn HelpdeskStore>,
}

impl std::fmt::Debug for CategoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryRegistry").finish_non_exhaustive()
    }
}

impl CategoryRegistry {
    pub fn new(store: Arc<dyn HelpdeskStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, caller: Option<&Caller>) -> Result<Vec<Category>, HelpdeskError> {
        require_caller(caller)?;
        self.store.list_categories().await
    }

    pub async fn get(&self, caller: Option<&Caller>, id: Uuid) -> Result<Category, HelpdeskError> {
        require_caller(caller)?;
        self.store
            .find_category(id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("Category not found"))
    }

    pub async fn create(
        &self,
        caller: Option<&Caller>,
        req: CategoryRequest,
    ) -> Result<Category, HelpdeskError> {
        let caller = require_permission(caller, Permission::ManageCategories)?;
        let (name, email) = req.validated()?;
        let now = Utc::now();
        let category = self
            .store
            .insert_category(Category {
                id: Uuid::new_v4(),
                name,
                email,
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!("Category '{}' created by {}", category.name, caller.email);
        Ok(category)
    }

    pub async fn update(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
        req: CategoryRequest,
    ) -> Result<Category, HelpdeskError> {
        require_permission(caller, Permission::ManageCategories)?;
        let (name, email) = req.validated()?;
        let mut category = self.get(caller, id).await?;
        category.name = name;
        category.email = email;
        category.updated_at = Utc::now();
        self.store.update_category(category).await
    }

    /// Tickets filed under the category keep existing, uncategorised.
    pub async fn delete(&self, caller: Option<&Caller>, id: Uuid) -> Result<(), HelpdeskError> {
        let caller = require_permission(caller, Permission::ManageCategories)?;
        self.get(Some(caller), id).await?;
        self.store.delete_category(id).await?;
        info!("Category {id} deleted by {}", caller.email);
        Ok(())
    }
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
) -> Result<Json<Vec<Category>>, HelpdeskError> {
    Ok(Json(state.categories.list(caller.caller()).await?))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Json(req): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), HelpdeskError> {
    let category = state.categories.create(caller.caller(), req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, HelpdeskError> {
    Ok(Json(state.categories.get(caller.caller(), id).await?))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
    Json(req): Json<CategoryRequest>,
) -> Result<Json<Category>, HelpdeskError> {
    Ok(Json(state.categories.update(caller.caller(), id, req).await?))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    caller: OptionalCaller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HelpdeskError> {
    state.categories.delete(caller.caller(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_categories_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}
