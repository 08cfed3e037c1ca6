use chrono::Utc;
use log::info;
use rand::RngCore;
use std::sync::Arc;
use uuid::Uuid;

use super::types::{
    CreateCustomerRequest, CreateUserRequest, CustomerView, PublicTokenView, UpdateProfileRequest,
};
use crate::core::config::HelpdeskConfig;
use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::{CustomerDeletePolicy, User};
use crate::core::shared::storage::HelpdeskStore;
use crate::core::shared::utils::normalize_email;
use crate::security::{hash_password, require_caller, require_permission, Caller, Permission, Role};

const PUBLIC_TOKEN_BYTES: usize = 32;

fn generate_public_token() -> String {
    let mut bytes = [0u8; PUBLIC_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn required(value: Option<String>, field: &str) -> Result<String, HelpdeskError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HelpdeskError::validation(format!("{field} is required")))
}

/// Users, customers and the customer public submission tokens.
#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn HelpdeskStore>,
    public_url: String,
    delete_policy: CustomerDeletePolicy,
    single_use_tokens: bool,
}

impl std::fmt::Debug for DirectoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryService")
            .field("public_url", &self.public_url)
            .field("delete_policy", &self.delete_policy)
            .field("single_use_tokens", &self.single_use_tokens)
            .finish_non_exhaustive()
    }
}

impl DirectoryService {
    pub fn new(store: Arc<dyn HelpdeskStore>, config: &HelpdeskConfig) -> Self {
        Self {
            store,
            public_url: config.public_url.trim_end_matches('/').to_string(),
            delete_policy: config.customer_delete_policy,
            single_use_tokens: config.public_token_single_use,
        }
    }

    pub fn delete_policy(&self) -> CustomerDeletePolicy {
        self.delete_policy
    }

    /// Builds and stores a new user with a hashed password.
    async fn register(
        &self,
        name: Option<String>,
        email: Option<String>,
        password: Option<String>,
        role: Role,
    ) -> Result<User, HelpdeskError> {
        let name = required(name, "name")?;
        let email = required(email, "email")?;
        let email = normalize_email(&email)
            .ok_or_else(|| HelpdeskError::validation(format!("Invalid email: {email}")))?;
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| HelpdeskError::validation("password is required"))?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(HelpdeskError::Conflict(format!(
                "Email {email} is already registered"
            )));
        }

        let mut user = User::new(email, Some(name), role);
        user.password_hash = hash_password(&password)?;
        let user = self.store.insert_user(user).await?;
        info!("Registered {} {} ({})", user.role, user.email, user.id);
        Ok(user)
    }

    async fn customer(&self, id: Uuid) -> Result<User, HelpdeskError> {
        self.store
            .find_user(id)
            .await?
            .filter(|u| u.role == Role::Customer)
            .ok_or_else(|| HelpdeskError::not_found("Customer not found"))
    }

    async fn with_ticket_count(&self, user: User) -> Result<CustomerView, HelpdeskError> {
        let counts = self.store.ticket_counts_by_customer(&[user.id]).await?;
        let ticket_count = counts.get(&user.id).copied().unwrap_or(0);
        Ok(CustomerView { user, ticket_count })
    }

    pub async fn create_customer(
        &self,
        caller: Option<&Caller>,
        req: CreateCustomerRequest,
    ) -> Result<CustomerView, HelpdeskError> {
        require_permission(caller, Permission::ManageCustomers)?;
        let mut user = self
            .register(req.name, req.email, req.password, Role::Customer)
            .await?;

        if req.phone.is_some() || req.location.is_some() || req.address.is_some() {
            user.phone = req.phone;
            user.location = req.location;
            user.address = req.address;
            user = self.store.update_user(user).await?;
        }

        Ok(CustomerView {
            user,
            ticket_count: 0,
        })
    }

    /// Newest first, each with the number of tickets the customer owns.
    pub async fn list_customers(
        &self,
        caller: Option<&Caller>,
    ) -> Result<Vec<CustomerView>, HelpdeskError> {
        require_permission(caller, Permission::ManageCustomers)?;
        let customers = self.store.list_users(&[Role::Customer]).await?;
        let ids: Vec<Uuid> = customers.iter().map(|c| c.id).collect();
        let counts = self.store.ticket_counts_by_customer(&ids).await?;
        Ok(customers
            .into_iter()
            .map(|user| {
                let ticket_count = counts.get(&user.id).copied().unwrap_or(0);
                CustomerView { user, ticket_count }
            })
            .collect())
    }

    pub async fn get_customer(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
    ) -> Result<CustomerView, HelpdeskError> {
        require_permission(caller, Permission::ManageCustomers)?;
        let customer = self.customer(id).await?;
        self.with_ticket_count(customer).await
    }

    pub async fn update_customer(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<CustomerView, HelpdeskError> {
        require_permission(caller, Permission::ManageCustomers)?;
        let mut customer = self.customer(id).await?;
        req.apply_to(&mut customer);
        customer.updated_at = Utc::now();
        let customer = self.store.update_user(customer).await?;
        self.with_ticket_count(customer).await
    }

    pub async fn delete_customer(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
    ) -> Result<(), HelpdeskError> {
        let caller = require_permission(caller, Permission::ManageCustomers)?;
        self.store.delete_customer(id, self.delete_policy).await?;
        info!(
            "Customer {id} deleted by {} ({:?} policy)",
            caller.email, self.delete_policy
        );
        Ok(())
    }

    fn token_view(&self, token: Option<String>) -> PublicTokenView {
        let url = token
            .as_ref()
            .map(|t| format!("{}/public/ticket/{t}", self.public_url));
        PublicTokenView { token, url }
    }

    /// Replaces the customer's public submission token with a fresh one.
    pub async fn issue_public_token(
        &self,
        caller: Option<&Caller>,
        customer_id: Uuid,
    ) -> Result<PublicTokenView, HelpdeskError> {
        require_permission(caller, Permission::ManageCustomers)?;
        let mut customer = self.customer(customer_id).await?;
        customer.public_token = Some(generate_public_token());
        customer.updated_at = Utc::now();
        let customer = self.store.update_user(customer).await?;
        info!("Issued public ticket token for customer {customer_id}");
        Ok(self.token_view(customer.public_token))
    }

    pub async fn get_public_token(
        &self,
        caller: Option<&Caller>,
        customer_id: Uuid,
    ) -> Result<PublicTokenView, HelpdeskError> {
        require_permission(caller, Permission::ManageCustomers)?;
        let customer = self.customer(customer_id).await?;
        Ok(self.token_view(customer.public_token))
    }

    pub async fn resolve_public_token(&self, token: &str) -> Result<User, HelpdeskError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(HelpdeskError::not_found("Invalid or expired token"));
        }
        self.store
            .find_customer_by_token(token)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("Invalid or expired token"))
    }

    /// Takes the token out of circulation when tokens are single-use. Only
    /// one submission can win a given token; a token that was reissued or
    /// already claimed is reported as expired.
    pub async fn claim_public_token(&self, customer: &User, token: &str) -> Result<(), HelpdeskError> {
        if !self.single_use_tokens {
            return Ok(());
        }
        if self.store.claim_public_token(customer.id, token.trim()).await? {
            Ok(())
        } else {
            Err(HelpdeskError::not_found("Invalid or expired token"))
        }
    }

    /// Admin listing, optionally narrowed to a comma-separated set of roles.
    pub async fn list_users(
        &self,
        caller: Option<&Caller>,
        roles: Option<&str>,
    ) -> Result<Vec<User>, HelpdeskError> {
        require_permission(caller, Permission::ManageUsers)?;
        let roles = roles
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::parse::<Role>)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.list_users(&roles).await
    }

    pub async fn create_user(
        &self,
        caller: Option<&Caller>,
        req: CreateUserRequest,
    ) -> Result<User, HelpdeskError> {
        require_permission(caller, Permission::ManageUsers)?;
        let role = match req.role.as_deref() {
            Some(raw) => raw.parse()?,
            None => Role::Agent,
        };
        self.register(req.name, req.email, req.password, role).await
    }

    /// Creates the first account of a fresh installation as an admin.
    /// Refused once any user exists.
    pub async fn bootstrap_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, HelpdeskError> {
        if !self.store.list_users(&[]).await?.is_empty() {
            return Err(HelpdeskError::Conflict(
                "An administrator can only be bootstrapped on an empty directory".to_string(),
            ));
        }
        self.register(
            Some(name.to_string()),
            Some(email.to_string()),
            Some(password.to_string()),
            Role::Admin,
        )
        .await
    }

    pub async fn profile(&self, caller: Option<&Caller>) -> Result<User, HelpdeskError> {
        let caller = require_caller(caller)?;
        self.store
            .find_user(caller.user_id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("User not found"))
    }

    pub async fn update_profile(
        &self,
        caller: Option<&Caller>,
        req: UpdateProfileRequest,
    ) -> Result<User, HelpdeskError> {
        let mut user = self.profile(caller).await?;
        req.apply_to(&mut user);
        user.updated_at = Utc::now();
        self.store.update_user(user).await
    }
}
