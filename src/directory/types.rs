use serde::{Deserialize, Serialize};

use crate::core::shared::models::{deserialize_some, User};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
}

/// Shared by customer edits and self-service profile edits. An explicit
/// `null` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub avatar: Option<Option<String>>,
    pub email_notifications: Option<bool>,
}

impl UpdateProfileRequest {
    pub fn apply_to(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        if let Some(location) = self.location {
            user.location = location;
        }
        if let Some(address) = self.address {
            user.address = address;
        }
        if let Some(avatar) = self.avatar {
            user.avatar = avatar;
        }
        if let Some(enabled) = self.email_notifications {
            user.email_notifications = enabled;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListUsersQuery {
    /// Comma-separated roles, e.g. `AGENT,ADMIN`.
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    #[serde(flatten)]
    pub user: User,
    pub ticket_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTokenView {
    pub token: Option<String>,
    pub url: Option<String>,
}
