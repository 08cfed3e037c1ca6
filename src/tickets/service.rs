use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::messages::MessageThread;
use super::notifications::{NotificationDispatcher, TicketEvent};
use super::types::{
    CreateTicketRequest, ListTicketsQuery, TicketDetail, TicketListItem, TicketPage,
    UpdateTicketRequest,
};
use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::{
    Category, NewTicket, Ticket, TicketChanges, TicketFilter, TicketPriority, TicketStats,
    TicketType, User, UserSummary,
};
use crate::core::shared::storage::HelpdeskStore;
use crate::directory::DirectoryService;
use crate::security::{require_caller, require_permission, Caller, Permission, Role};

pub const MAX_PER_PAGE: i64 = 100;

/// Trims, drops blanks and removes repeats while keeping first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

fn validate_hours(hours: f64) -> Result<f64, HelpdeskError> {
    if hours.is_finite() && hours >= 0.0 {
        Ok(hours)
    } else {
        Err(HelpdeskError::validation("hours must be a non-negative number"))
    }
}

fn parse_opt<T: std::str::FromStr<Err = HelpdeskError>>(
    raw: Option<&str>,
) -> Result<Option<T>, HelpdeskError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .transpose()
}

#[derive(Clone)]
pub struct TicketService {
    store: Arc<dyn HelpdeskStore>,
    messages: MessageThread,
    notifier: NotificationDispatcher,
    directory: DirectoryService,
    default_per_page: i64,
}

impl std::fmt::Debug for TicketService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketService")
            .field("default_per_page", &self.default_per_page)
            .finish_non_exhaustive()
    }
}

impl TicketService {
    pub fn new(
        store: Arc<dyn HelpdeskStore>,
        messages: MessageThread,
        notifier: NotificationDispatcher,
        directory: DirectoryService,
        default_per_page: i64,
    ) -> Self {
        Self {
            store,
            messages,
            notifier,
            directory,
            default_per_page: default_per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    async fn require_category(&self, id: Uuid) -> Result<Category, HelpdeskError> {
        self.store
            .find_category(id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("Category not found"))
    }

    async fn build_new_ticket(
        &self,
        req: CreateTicketRequest,
        customer_id: Uuid,
    ) -> Result<NewTicket, HelpdeskError> {
        let subject = req
            .subject
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HelpdeskError::validation("subject is required"))?;

        let priority = parse_opt::<TicketPriority>(req.priority.as_deref())?.unwrap_or_default();
        // Unrecognised types are dropped rather than refused on creation.
        let ticket_type = parse_opt::<TicketType>(req.ticket_type.as_deref())
            .ok()
            .flatten();

        if let Some(category_id) = req.category_id {
            self.require_category(category_id).await?;
        }
        let hours = req.hours.map(validate_hours).transpose()?;

        Ok(NewTicket {
            subject,
            description: req.description.filter(|d| !d.trim().is_empty()),
            priority,
            ticket_type,
            category_id: req.category_id,
            hours,
            tags: normalize_tags(req.tags.unwrap_or_default()),
            attachments: req.attachments.unwrap_or_default(),
            customer_id,
        })
    }

    async fn open_ticket(
        &self,
        customer: User,
        new_ticket: NewTicket,
    ) -> Result<TicketDetail, HelpdeskError> {
        let ticket = self.store.insert_ticket(new_ticket).await?;
        info!(
            "Ticket #{} created for {} ({})",
            ticket.number, customer.email, ticket.id
        );

        self.notifier
            .dispatch(TicketEvent::Created {
                ticket: ticket.clone(),
                customer: customer.clone(),
            })
            .await;

        let category = match ticket.category_id {
            Some(id) => self.store.find_category(id).await?,
            None => None,
        };
        Ok(TicketDetail::new(
            ticket,
            Some(customer.summary()),
            None,
            category,
            Vec::new(),
        ))
    }

    /// Creates a ticket owned by the caller (customers) or by the customer
    /// named in the request (staff).
    pub async fn create(
        &self,
        caller: Option<&Caller>,
        req: CreateTicketRequest,
    ) -> Result<TicketDetail, HelpdeskError> {
        let caller = require_permission(caller, Permission::CreateTickets)?;

        let customer_id = match caller.role {
            Role::Customer => match req.customer_id {
                Some(id) if id != caller.user_id => {
                    return Err(HelpdeskError::forbidden(
                        "Customers can only create tickets for themselves",
                    ))
                }
                _ => caller.user_id,
            },
            Role::Agent | Role::Admin => req
                .customer_id
                .ok_or_else(|| HelpdeskError::validation("customerId is required"))?,
        };

        let customer = self
            .store
            .find_user(customer_id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("Customer not found"))?;
        if customer.role != Role::Customer {
            return Err(HelpdeskError::validation(
                "Tickets must be owned by a customer",
            ));
        }

        let new_ticket = self.build_new_ticket(req, customer.id).await?;
        self.open_ticket(customer, new_ticket).await
    }

    /// Anonymous submission through a customer's public token. A single-use
    /// token is claimed after validation and before the ticket is written,
    /// so a rejected request leaves it usable.
    pub async fn submit_public(
        &self,
        token: &str,
        req: CreateTicketRequest,
    ) -> Result<TicketDetail, HelpdeskError> {
        let customer = self.directory.resolve_public_token(token).await?;
        if req.customer_id.is_some_and(|id| id != customer.id) {
            return Err(HelpdeskError::forbidden("Token does not match customer"));
        }
        let new_ticket = self.build_new_ticket(req, customer.id).await?;
        self.directory.claim_public_token(&customer, token).await?;
        self.open_ticket(customer, new_ticket).await
    }

    async fn visible_ticket(&self, caller: &Caller, id: Uuid) -> Result<Ticket, HelpdeskError> {
        let ticket = self
            .store
            .find_ticket(id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("Ticket not found"))?;
        if !caller.ticket_visibility().permits(ticket.customer_id) {
            return Err(HelpdeskError::forbidden("Access denied"));
        }
        Ok(ticket)
    }

    async fn detail(&self, caller: &Caller, ticket: Ticket) -> Result<TicketDetail, HelpdeskError> {
        let mut ids = vec![ticket.customer_id];
        ids.extend(ticket.assignee_id);
        let users: HashMap<Uuid, UserSummary> = self
            .store
            .find_users(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.summary()))
            .collect();

        let category = match ticket.category_id {
            Some(id) => self.store.find_category(id).await?,
            None => None,
        };
        let messages = self.messages.thread_for(caller, ticket.id).await?;

        let customer = users.get(&ticket.customer_id).cloned();
        let assignee = ticket.assignee_id.and_then(|id| users.get(&id).cloned());
        Ok(TicketDetail::new(ticket, customer, assignee, category, messages))
    }

    pub async fn get(&self, caller: Option<&Caller>, id: Uuid) -> Result<TicketDetail, HelpdeskError> {
        let caller = require_caller(caller)?;
        let ticket = self.visible_ticket(caller, id).await?;
        self.detail(caller, ticket).await
    }

    fn filter_from(&self, caller: &Caller, query: ListTicketsQuery) -> Result<TicketFilter, HelpdeskError> {
        Ok(TicketFilter {
            status: parse_opt(query.status.as_deref())?,
            priority: parse_opt(query.priority.as_deref())?,
            assignee: parse_opt(query.assignee.as_deref())?,
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            customer_id: caller.ticket_visibility().customer_scope(),
            page: query.page.unwrap_or(1).max(1),
            per_page: query
                .per_page
                .unwrap_or(self.default_per_page)
                .clamp(1, MAX_PER_PAGE),
        })
    }

    /// Tickets ordered by last update, newest first. Customers only ever
    /// see their own.
    pub async fn list(
        &self,
        caller: Option<&Caller>,
        query: ListTicketsQuery,
    ) -> Result<TicketPage, HelpdeskError> {
        let caller = require_caller(caller)?;
        let filter = self.filter_from(caller, query)?;
        let (tickets, total) = self.store.list_tickets(&filter).await?;

        let mut user_ids: Vec<Uuid> = tickets
            .iter()
            .flat_map(|t| std::iter::once(t.customer_id).chain(t.assignee_id))
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let users: HashMap<Uuid, UserSummary> = self
            .store
            .find_users(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.summary()))
            .collect();

        let categories: HashMap<Uuid, Category> = if tickets.iter().any(|t| t.category_id.is_some()) {
            self.store
                .list_categories()
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        } else {
            HashMap::new()
        };

        let ticket_ids: Vec<Uuid> = tickets.iter().map(|t| t.id).collect();
        let counts = self
            .store
            .message_counts(&ticket_ids, caller.has_permission(Permission::PostInternalNotes))
            .await?;

        let items = tickets
            .into_iter()
            .map(|ticket| TicketListItem {
                customer: users.get(&ticket.customer_id).cloned(),
                assignee: ticket.assignee_id.and_then(|id| users.get(&id).cloned()),
                category: ticket.category_id.and_then(|id| categories.get(&id).cloned()),
                message_count: counts.get(&ticket.id).copied().unwrap_or(0),
                ticket,
            })
            .collect();

        Ok(TicketPage {
            tickets: items,
            total,
            page: filter.page,
            per_page: filter.per_page,
            total_pages: (total + filter.per_page - 1) / filter.per_page,
        })
    }

    async fn changes_from(&self, req: UpdateTicketRequest) -> Result<TicketChanges, HelpdeskError> {
        if req.customer_id.is_some() || req.number.is_some() {
            return Err(HelpdeskError::validation(
                "customerId and number cannot be changed",
            ));
        }

        if let Some(Some(assignee_id)) = req.assignee_id {
            let assignee = self
                .store
                .find_user(assignee_id)
                .await?
                .ok_or_else(|| HelpdeskError::not_found("Assignee not found"))?;
            if !assignee.role.is_staff() {
                return Err(HelpdeskError::validation(
                    "Tickets can only be assigned to agents or admins",
                ));
            }
        }
        if let Some(Some(category_id)) = req.category_id {
            self.require_category(category_id).await?;
        }

        let subject = match req.subject {
            Some(s) if s.trim().is_empty() => {
                return Err(HelpdeskError::validation("subject cannot be empty"))
            }
            Some(s) => Some(s.trim().to_string()),
            None => None,
        };

        let ticket_type = match req.ticket_type {
            Some(Some(raw)) => Some(Some(raw.parse::<TicketType>()?)),
            Some(None) => Some(None),
            None => None,
        };

        let hours = match req.hours {
            Some(Some(h)) => Some(Some(validate_hours(h)?)),
            other => other,
        };

        Ok(TicketChanges {
            status: parse_opt(req.status.as_deref())?,
            priority: parse_opt(req.priority.as_deref())?,
            assignee_id: req.assignee_id,
            category_id: req.category_id,
            ticket_type,
            hours,
            subject,
            description: req.description,
            tags: req.tags.map(normalize_tags),
            attachments: req.attachments,
        })
    }

    /// Staff-only partial update. A status change appends its audit
    /// message atomically with the write.
    pub async fn update(
        &self,
        caller: Option<&Caller>,
        id: Uuid,
        req: UpdateTicketRequest,
    ) -> Result<TicketDetail, HelpdeskError> {
        let caller = require_caller(caller)?;
        self.visible_ticket(caller, id).await?;
        if !caller.has_permission(Permission::ManageTickets) {
            return Err(HelpdeskError::forbidden("Access denied"));
        }

        let changes = self.changes_from(req).await?;
        let outcome = self
            .store
            .apply_ticket_update(id, changes, caller.user_id)
            .await?;
        if let Some(audit) = &outcome.audit_message {
            info!(
                "Ticket #{} by {}: {}",
                outcome.ticket.number, caller.email, audit.content
            );
        }

        self.detail(caller, outcome.ticket).await
    }

    pub async fn stats(&self, caller: Option<&Caller>) -> Result<TicketStats, HelpdeskError> {
        let caller = require_caller(caller)?;
        self.store
            .ticket_stats(caller.ticket_visibility().customer_scope())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::models::{MessageType, TicketStatus};
    use crate::core::shared::test_utils::{
        caller_for, seed_ticket, seed_user, test_config, TestHarness,
    };

    fn subject(s: &str) -> CreateTicketRequest {
        CreateTicketRequest {
            subject: Some(s.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_agent_creates_for_customer() {
        let h = TestHarness::with_last_ticket_number(1006);
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;

        let detail = h
            .tickets
            .create(
                Some(&caller_for(&agent)),
                CreateTicketRequest {
                    customer_id: Some(ana.id),
                    tags: Some(vec![" vpn ".into(), "vpn".into(), "".into()]),
                    ticket_type: Some("BOGUS".into()),
                    ..subject("Login fails")
                },
            )
            .await
            .expect("create");

        assert_eq!(detail.number, 1007);
        assert_eq!(detail.status, TicketStatus::Open);
        assert_eq!(detail.priority, TicketPriority::Normal);
        assert_eq!(detail.ticket_type, None);
        assert_eq!(detail.tags, vec!["vpn".to_string()]);

        let sent = h.email.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@x.com");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        let as_ana = caller_for(&ana);
        let as_agent = caller_for(&agent);

        let missing_subject = h.tickets.create(Some(&as_ana), subject("  ")).await;
        assert!(matches!(missing_subject, Err(HelpdeskError::Validation(_))));

        let no_owner = h.tickets.create(Some(&as_agent), subject("x")).await;
        assert!(matches!(no_owner, Err(HelpdeskError::Validation(_))));

        let unknown_owner = h
            .tickets
            .create(
                Some(&as_agent),
                CreateTicketRequest {
                    customer_id: Some(Uuid::new_v4()),
                    ..subject("x")
                },
            )
            .await;
        assert!(matches!(unknown_owner, Err(HelpdeskError::NotFound(_))));

        let negative_hours = h
            .tickets
            .create(
                Some(&as_ana),
                CreateTicketRequest {
                    hours: Some(-1.0),
                    ..subject("x")
                },
            )
            .await;
        assert!(matches!(negative_hours, Err(HelpdeskError::Validation(_))));

        let anonymous = h.tickets.create(None, subject("x")).await;
        assert!(matches!(anonymous, Err(HelpdeskError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_customer_cannot_create_for_someone_else() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let eve = seed_user(&h.store, "eve@x.com", Role::Customer).await;

        let result = h
            .tickets
            .create(
                Some(&caller_for(&eve)),
                CreateTicketRequest {
                    customer_id: Some(ana.id),
                    ..subject("x")
                },
            )
            .await;
        assert!(matches!(result, Err(HelpdeskError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_opted_out_customer_gets_no_email() {
        let h = TestHarness::new();
        let mut ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        ana.email_notifications = false;
        let ana = h.store.update_user(ana).await.expect("update");

        h.tickets
            .create(Some(&caller_for(&ana)), subject("Quiet please"))
            .await
            .expect("create");
        assert!(h.email.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_status_change_appends_system_message_last() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        let ticket = seed_ticket(&h.store, &ana, "Login fails").await;
        let as_agent = caller_for(&agent);

        h.tickets
            .update(
                Some(&as_agent),
                ticket.id,
                UpdateTicketRequest {
                    status: Some("PENDING".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("to pending");

        let detail = h
            .tickets
            .update(
                Some(&as_agent),
                ticket.id,
                UpdateTicketRequest {
                    status: Some("solved".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("to solved");

        assert_eq!(detail.status, TicketStatus::Solved);
        let last = detail.messages.last().expect("audit message");
        assert_eq!(last.message_type, MessageType::System);
        assert_eq!(last.content, "Estado cambiado de **Pendiente** a **Resuelto**");
        assert_eq!(last.author.as_ref().map(|a| a.id), Some(agent.id));
        assert_eq!(detail.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_update_without_status_adds_no_message() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        let ticket = seed_ticket(&h.store, &ana, "Login fails").await;

        let detail = h
            .tickets
            .update(
                Some(&caller_for(&agent)),
                ticket.id,
                UpdateTicketRequest {
                    priority: Some("urgent".into()),
                    assignee_id: Some(Some(agent.id)),
                    hours: Some(Some(1.5)),
                    ..Default::default()
                },
            )
            .await
            .expect("update");

        assert_eq!(detail.priority, TicketPriority::Urgent);
        assert_eq!(detail.assignee.map(|a| a.id), Some(agent.id));
        assert!(detail.messages.is_empty());
        assert!(detail.updated_at >= ticket.updated_at);
    }

    #[tokio::test]
    async fn test_update_rules() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        let ticket = seed_ticket(&h.store, &ana, "Login fails").await;
        let as_agent = caller_for(&agent);

        let by_customer = h
            .tickets
            .update(
                Some(&caller_for(&ana)),
                ticket.id,
                UpdateTicketRequest {
                    status: Some("CLOSED".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(by_customer, Err(HelpdeskError::Forbidden(_))));

        let to_customer = h
            .tickets
            .update(
                Some(&as_agent),
                ticket.id,
                UpdateTicketRequest {
                    assignee_id: Some(Some(ana.id)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(to_customer, Err(HelpdeskError::Validation(_))));

        let owner_change = h
            .tickets
            .update(
                Some(&as_agent),
                ticket.id,
                UpdateTicketRequest {
                    customer_id: Some(serde_json::json!(agent.id)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(owner_change, Err(HelpdeskError::Validation(_))));

        let bad_status = h
            .tickets
            .update(
                Some(&as_agent),
                ticket.id,
                UpdateTicketRequest {
                    status: Some("IN_PROGRESS".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(bad_status, Err(HelpdeskError::Validation(_))));

        let missing = h
            .tickets
            .update(Some(&as_agent), Uuid::new_v4(), UpdateTicketRequest::default())
            .await;
        assert!(matches!(missing, Err(HelpdeskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_enforces_ownership() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let eve = seed_user(&h.store, "eve@x.com", Role::Customer).await;
        let ticket = seed_ticket(&h.store, &ana, "Login fails").await;

        let own = h.tickets.get(Some(&caller_for(&ana)), ticket.id).await;
        assert!(own.is_ok());

        let other = h.tickets.get(Some(&caller_for(&eve)), ticket.id).await;
        assert!(matches!(other, Err(HelpdeskError::Forbidden(_))));

        let missing = h.tickets.get(Some(&caller_for(&ana)), Uuid::new_v4()).await;
        assert!(matches!(missing, Err(HelpdeskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_scopes_and_filters() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let eve = seed_user(&h.store, "eve@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        seed_ticket(&h.store, &ana, "Login fails").await;
        seed_ticket(&h.store, &ana, "Printer jam").await;
        seed_ticket(&h.store, &eve, "VPN login").await;

        let for_ana = h
            .tickets
            .list(Some(&caller_for(&ana)), ListTicketsQuery::default())
            .await
            .expect("list");
        assert_eq!(for_ana.total, 2);
        assert!(for_ana
            .tickets
            .iter()
            .all(|t| t.ticket.customer_id == ana.id));

        let search = h
            .tickets
            .list(
                Some(&caller_for(&agent)),
                ListTicketsQuery {
                    search: Some("LOGIN".into()),
                    assignee: Some("unassigned".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("list");
        assert_eq!(search.total, 2);

        let paged = h
            .tickets
            .list(
                Some(&caller_for(&agent)),
                ListTicketsQuery {
                    per_page: Some(2),
                    page: Some(2),
                    ..Default::default()
                },
            )
            .await
            .expect("list");
        assert_eq!(paged.total, 3);
        assert_eq!(paged.tickets.len(), 1);
        assert_eq!(paged.total_pages, 2);
    }

    #[tokio::test]
    async fn test_stats_scoped_for_customer() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let eve = seed_user(&h.store, "eve@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        seed_ticket(&h.store, &ana, "a").await;
        seed_ticket(&h.store, &eve, "b").await;

        let mine = h.tickets.stats(Some(&caller_for(&ana))).await.expect("stats");
        assert_eq!(mine.total, 1);
        assert_eq!(mine.open, 1);

        let all = h.tickets.stats(Some(&caller_for(&agent))).await.expect("stats");
        assert_eq!(all.total, 2);
    }

    #[tokio::test]
    async fn test_public_submission() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        let token = h
            .directory
            .issue_public_token(Some(&caller_for(&agent)), ana.id)
            .await
            .expect("issue")
            .token
            .expect("token");

        let detail = h
            .tickets
            .submit_public(&token, subject("From the portal"))
            .await
            .expect("submit");
        assert_eq!(detail.customer.map(|c| c.id), Some(ana.id));

        let invalid = h.tickets.submit_public("expired", subject("x")).await;
        assert!(matches!(invalid, Err(HelpdeskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_single_use_public_token() {
        let mut config = test_config();
        config.helpdesk.public_token_single_use = true;
        let h = TestHarness::with_config(config);
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        let token = h
            .directory
            .issue_public_token(Some(&caller_for(&agent)), ana.id)
            .await
            .expect("issue")
            .token
            .expect("token");

        h.tickets
            .submit_public(&token, subject("First"))
            .await
            .expect("submit");
        let reused = h.tickets.submit_public(&token, subject("Second")).await;
        assert!(matches!(reused, Err(HelpdeskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_single_use_token_survives_rejected_submission() {
        let mut config = test_config();
        config.helpdesk.public_token_single_use = true;
        let h = TestHarness::with_config(config);
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        let token = h
            .directory
            .issue_public_token(Some(&caller_for(&agent)), ana.id)
            .await
            .expect("issue")
            .token
            .expect("token");

        let blank = h.tickets.submit_public(&token, subject("   ")).await;
        assert!(matches!(blank, Err(HelpdeskError::Validation(_))));

        h.tickets
            .submit_public(&token, subject("Second try"))
            .await
            .expect("token still valid");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_use_token_accepts_one_of_concurrent_submissions() {
        let mut config = test_config();
        config.helpdesk.public_token_single_use = true;
        let h = TestHarness::with_config(config);
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        let token = h
            .directory
            .issue_public_token(Some(&caller_for(&agent)), ana.id)
            .await
            .expect("issue")
            .token
            .expect("token");

        let mut handles = Vec::new();
        for i in 0..16 {
            let tickets = h.tickets.clone();
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                tickets
                    .submit_public(&token, subject(&format!("Portal {i}")))
                    .await
                    .is_ok()
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.expect("join") {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        let stats = h.tickets.stats(Some(&caller_for(&agent))).await.expect("stats");
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        seed_ticket(&h.store, &ana, "Only one").await;

        let page = h
            .tickets
            .list(
                Some(&caller_for(&ana)),
                ListTicketsQuery {
                    page: Some(i64::MAX),
                    per_page: Some(MAX_PER_PAGE),
                    ..Default::default()
                },
            )
            .await
            .expect("list");
        assert!(page.tickets.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_reply_moves_ticket_to_front_of_list() {
        let h = TestHarness::new();
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let agent = seed_user(&h.store, "bob@x.com", Role::Agent).await;
        let older = seed_ticket(&h.store, &ana, "Older").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = seed_ticket(&h.store, &ana, "Newer").await;

        let as_agent = caller_for(&agent);
        let before = h
            .tickets
            .list(Some(&as_agent), ListTicketsQuery::default())
            .await
            .expect("list");
        let order: Vec<Uuid> = before.tickets.iter().map(|t| t.ticket.id).collect();
        assert_eq!(order, vec![newer.id, older.id]);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        h.messages
            .post(
                Some(&as_agent),
                crate::tickets::messages::PostMessage::comment(older.id, "Looking into it"),
            )
            .await
            .expect("reply");

        let after = h
            .tickets
            .list(Some(&as_agent), ListTicketsQuery::default())
            .await
            .expect("list");
        let order: Vec<Uuid> = after.tickets.iter().map(|t| t.ticket.id).collect();
        assert_eq!(order, vec![older.id, newer.id]);
    }

    #[tokio::test]
    async fn test_create_succeeds_when_email_fails() {
        let h = TestHarness::with_failing_email("SMTP relay unreachable");
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;

        let detail = h
            .tickets
            .create(Some(&caller_for(&ana)), subject("Mail is down"))
            .await
            .expect("create despite email failure");

        assert_eq!(h.email.sent().await.len(), 1);
        let stored = h
            .store
            .find_ticket(detail.id)
            .await
            .expect("find")
            .expect("persisted");
        assert_eq!(stored.subject, "Mail is down");
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_numbers() {
        let h = TestHarness::with_last_ticket_number(100);
        let ana = seed_user(&h.store, "ana@x.com", Role::Customer).await;
        let as_ana = caller_for(&ana);

        let mut handles = Vec::new();
        for i in 0..20 {
            let tickets = h.tickets.clone();
            let caller = as_ana.clone();
            handles.push(tokio::spawn(async move {
                tickets
                    .create(Some(&caller), subject(&format!("Ticket {i}")))
                    .await
                    .map(|t| t.number)
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.expect("join").expect("create"));
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (101..=120).collect::<Vec<i64>>());
    }
}
