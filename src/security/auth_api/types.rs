use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::core::shared::error::HelpdeskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    CreateTickets,
    PostMessages,
    ViewAllTickets,
    ManageTickets,
    PostInternalNotes,
    ManageCategories,
    ManageCustomers,
    ManageUsers,
    UseAssistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Agent,
    Admin,
}

impl Role {
    pub fn permissions(&self) -> HashSet<Permission> {
        match self {
            Self::Customer => {
                let mut perms = HashSet::new();
                perms.insert(Permission::CreateTickets);
                perms.insert(Permission::PostMessages);
                perms
            }
            Self::Agent => {
                let mut perms = Self::Customer.permissions();
                perms.insert(Permission::ViewAllTickets);
                perms.insert(Permission::ManageTickets);
                perms.insert(Permission::PostInternalNotes);
                perms.insert(Permission::ManageCategories);
                perms.insert(Permission::ManageCustomers);
                perms.insert(Permission::UseAssistant);
                perms
            }
            Self::Admin => {
                let mut perms = Self::Agent.permissions();
                perms.insert(Permission::ManageUsers);
                perms
            }
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn is_staff(&self) -> bool {
        match self {
            Self::Customer => false,
            Self::Agent | Self::Admin => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Agent => "AGENT",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Self::Customer),
            "AGENT" => Ok(Self::Agent),
            "ADMIN" => Ok(Self::Admin),
            other => Err(HelpdeskError::validation(format!("Unknown role: {other}"))),
        }
    }
}

/// Identity handed over by the auth collaborator for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: Uuid, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn ticket_visibility(&self) -> TicketVisibility {
        match self.role {
            Role::Customer => TicketVisibility::OwnedBy(self.user_id),
            Role::Agent | Role::Admin => TicketVisibility::All,
        }
    }
}

/// Predicate applied to every ticket read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketVisibility {
    All,
    OwnedBy(Uuid),
}

impl TicketVisibility {
    pub fn permits(&self, customer_id: Uuid) -> bool {
        match self {
            Self::All => true,
            Self::OwnedBy(owner) => *owner == customer_id,
        }
    }

    pub fn customer_scope(&self) -> Option<Uuid> {
        match self {
            Self::All => None,
            Self::OwnedBy(owner) => Some(*owner),
        }
    }
}

pub fn require_caller(caller: Option<&Caller>) -> Result<&Caller, HelpdeskError> {
    caller.ok_or_else(|| HelpdeskError::Unauthorized("Authentication required".to_string()))
}

pub fn require_permission(
    caller: Option<&Caller>,
    permission: Permission,
) -> Result<&Caller, HelpdeskError> {
    let caller = require_caller(caller)?;
    if caller.has_permission(permission) {
        Ok(caller)
    } else {
        Err(HelpdeskError::forbidden("Access denied"))
    }
}
