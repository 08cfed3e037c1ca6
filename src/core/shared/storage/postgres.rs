use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::pg::Pg;
use diesel::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

use super::{HelpdeskStore, TicketUpdateOutcome};
use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::{
    AssigneeFilter, Category, CustomerDeletePolicy, Message, NewMessage, NewTicket, Ticket,
    TicketChanges, TicketFilter, TicketStats, TicketStatus, TicketType, User,
};
use crate::core::shared::schema::{categories, messages, tickets, users};
use crate::core::shared::utils::DbPool;
use crate::security::Role;
use crate::tickets::status::StatusTransition;

fn corrupt(column: &str, value: &str) -> HelpdeskError {
    HelpdeskError::Database(format!("Unexpected value {value:?} in column {column}"))
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = users, check_for_backend(Pg), treat_none_as_null = true)]
struct DbUser {
    id: Uuid,
    email: String,
    name: Option<String>,
    password_hash: String,
    role: String,
    avatar: Option<String>,
    phone: Option<String>,
    location: Option<String>,
    address: Option<String>,
    email_notifications: bool,
    public_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<User> for DbUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role.as_str().to_string(),
            avatar: user.avatar,
            phone: user.phone,
            location: user.location,
            address: user.address,
            email_notifications: user.email_notifications,
            public_token: user.public_token,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl TryFrom<DbUser> for User {
    type Error = HelpdeskError;

    fn try_from(row: DbUser) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse().map_err(|_| corrupt("users.role", &row.role))?;
        Ok(Self {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role,
            avatar: row.avatar,
            phone: row.phone,
            location: row.location,
            address: row.address,
            email_notifications: row.email_notifications,
            public_token: row.public_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = categories, check_for_backend(Pg), treat_none_as_null = true)]
struct DbCategory {
    id: Uuid,
    name: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Category> for DbCategory {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            email: c.email,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl From<DbCategory> for Category {
    fn from(row: DbCategory) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tickets, check_for_backend(Pg))]
struct DbTicket {
    id: Uuid,
    number: i64,
    subject: String,
    description: Option<String>,
    status: String,
    priority: String,
    ticket_type: Option<String>,
    category_id: Option<Uuid>,
    hours: Option<f64>,
    tags: Vec<String>,
    attachments: Vec<String>,
    customer_id: Uuid,
    assignee_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbTicket> for Ticket {
    type Error = HelpdeskError;

    fn try_from(row: DbTicket) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| corrupt("tickets.status", &row.status))?;
        let priority = row
            .priority
            .parse()
            .map_err(|_| corrupt("tickets.priority", &row.priority))?;
        let ticket_type = row
            .ticket_type
            .as_deref()
            .map(|t| t.parse::<TicketType>().map_err(|_| corrupt("tickets.ticket_type", t)))
            .transpose()?;
        Ok(Self {
            id: row.id,
            number: row.number,
            subject: row.subject,
            description: row.description,
            status,
            priority,
            ticket_type,
            category_id: row.category_id,
            hours: row.hours,
            tags: row.tags,
            attachments: row.attachments,
            customer_id: row.customer_id,
            assignee_id: row.assignee_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insert row for a ticket. `number` is left to the column default so the
/// sequence allocates it.
#[derive(Debug, Insertable)]
#[diesel(table_name = tickets)]
struct NewDbTicket {
    id: Uuid,
    subject: String,
    description: Option<String>,
    status: String,
    priority: String,
    ticket_type: Option<String>,
    category_id: Option<Uuid>,
    hours: Option<f64>,
    tags: Vec<String>,
    attachments: Vec<String>,
    customer_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Every mutable ticket column. Identity, number and owner are absent.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = tickets, treat_none_as_null = true)]
struct DbTicketChangeset {
    subject: String,
    description: Option<String>,
    status: String,
    priority: String,
    ticket_type: Option<String>,
    category_id: Option<Uuid>,
    hours: Option<f64>,
    tags: Vec<String>,
    attachments: Vec<String>,
    assignee_id: Option<Uuid>,
    updated_at: DateTime<Utc>,
}

impl From<&Ticket> for DbTicketChangeset {
    fn from(t: &Ticket) -> Self {
        Self {
            subject: t.subject.clone(),
            description: t.description.clone(),
            status: t.status.as_str().to_string(),
            priority: t.priority.as_str().to_string(),
            ticket_type: t.ticket_type.map(|tt| tt.as_str().to_string()),
            category_id: t.category_id,
            hours: t.hours,
            tags: t.tags.clone(),
            attachments: t.attachments.clone(),
            assignee_id: t.assignee_id,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = messages, check_for_backend(Pg))]
struct DbMessage {
    id: Uuid,
    seq: i64,
    ticket_id: Uuid,
    author_id: Uuid,
    content: String,
    message_type: String,
    is_internal: bool,
    attachments: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbMessage> for Message {
    type Error = HelpdeskError;

    fn try_from(row: DbMessage) -> Result<Self, Self::Error> {
        let message_type = row
            .message_type
            .parse()
            .map_err(|_| corrupt("messages.message_type", &row.message_type))?;
        Ok(Self {
            id: row.id,
            ticket_id: row.ticket_id,
            author_id: row.author_id,
            content: row.content,
            message_type,
            is_internal: row.is_internal,
            attachments: row.attachments,
            created_at: row.created_at,
            seq: row.seq,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
struct NewDbMessage {
    id: Uuid,
    ticket_id: Uuid,
    author_id: Uuid,
    content: String,
    message_type: String,
    is_internal: bool,
    attachments: Vec<String>,
    created_at: DateTime<Utc>,
}

impl NewDbMessage {
    fn stamped(new_message: NewMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id: new_message.ticket_id,
            author_id: new_message.author_id,
            content: new_message.content,
            message_type: new_message.message_type.as_str().to_string(),
            is_internal: new_message.is_internal,
            attachments: new_message.attachments,
            created_at,
        }
    }
}

fn insert_message_row(
    conn: &mut PgConnection,
    new_message: NewMessage,
    created_at: DateTime<Utc>,
) -> Result<Message, HelpdeskError> {
    diesel::insert_into(messages::table)
        .values(NewDbMessage::stamped(new_message, created_at))
        .returning(DbMessage::as_returning())
        .get_result(conn)?
        .try_into()
}

/// ILIKE pattern matching `search` as a literal substring.
fn contains_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn filtered_tickets(filter: &TicketFilter) -> tickets::BoxedQuery<'static, Pg> {
    let mut q = tickets::table.into_boxed();

    if let Some(status) = filter.status {
        q = q.filter(tickets::status.eq(status.as_str()));
    }
    if let Some(priority) = filter.priority {
        q = q.filter(tickets::priority.eq(priority.as_str()));
    }
    if let Some(customer_id) = filter.customer_id {
        q = q.filter(tickets::customer_id.eq(customer_id));
    }
    match filter.assignee {
        Some(AssigneeFilter::Unassigned) => q = q.filter(tickets::assignee_id.is_null()),
        Some(AssigneeFilter::User(id)) => q = q.filter(tickets::assignee_id.eq(id)),
        None => {}
    }
    if let Some(search) = filter.search.as_deref() {
        q = q.filter(tickets::subject.ilike(contains_pattern(search)));
    }
    q
}

fn load_users(rows: Vec<DbUser>) -> Result<Vec<User>, HelpdeskError> {
    rows.into_iter().map(User::try_from).collect()
}

/// Diesel-backed store. Queries run on the blocking pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("pool_state", &self.pool.state())
            .finish()
    }
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, HelpdeskError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, HelpdeskError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl HelpdeskStore for PgStore {
    async fn insert_user(&self, user: User) -> Result<User, HelpdeskError> {
        self.run(move |conn| {
            diesel::insert_into(users::table)
                .values(DbUser::from(user))
                .returning(DbUser::as_returning())
                .get_result(conn)?
                .try_into()
        })
        .await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, HelpdeskError> {
        self.run(move |conn| {
            users::table
                .find(id)
                .select(DbUser::as_select())
                .first(conn)
                .optional()?
                .map(User::try_from)
                .transpose()
        })
        .await
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, HelpdeskError> {
        let ids = ids.to_vec();
        self.run(move |conn| {
            let rows = users::table
                .filter(users::id.eq_any(ids))
                .select(DbUser::as_select())
                .load(conn)?;
            load_users(rows)
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, HelpdeskError> {
        let email = email.trim().to_lowercase();
        self.run(move |conn| {
            users::table
                .filter(users::email.eq(email))
                .select(DbUser::as_select())
                .first(conn)
                .optional()?
                .map(User::try_from)
                .transpose()
        })
        .await
    }

    async fn find_customer_by_token(&self, token: &str) -> Result<Option<User>, HelpdeskError> {
        let token = token.to_string();
        self.run(move |conn| {
            users::table
                .filter(users::public_token.eq(token))
                .filter(users::role.eq(Role::Customer.as_str()))
                .select(DbUser::as_select())
                .first(conn)
                .optional()?
                .map(User::try_from)
                .transpose()
        })
        .await
    }

    async fn list_users(&self, roles: &[Role]) -> Result<Vec<User>, HelpdeskError> {
        let roles: Vec<&'static str> = roles.iter().map(Role::as_str).collect();
        self.run(move |conn| {
            let mut q = users::table.into_boxed();
            if !roles.is_empty() {
                q = q.filter(users::role.eq_any(roles));
            }
            let rows = q
                .order(users::created_at.desc())
                .select(DbUser::as_select())
                .load(conn)?;
            load_users(rows)
        })
        .await
    }

    async fn update_user(&self, user: User) -> Result<User, HelpdeskError> {
        self.run(move |conn| {
            let id = user.id;
            diesel::update(users::table.find(id))
                .set(DbUser::from(user))
                .returning(DbUser::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| HelpdeskError::not_found("User not found"))?
                .try_into()
        })
        .await
    }

    async fn claim_public_token(
        &self,
        customer_id: Uuid,
        token: &str,
    ) -> Result<bool, HelpdeskError> {
        let token = token.to_string();
        self.run(move |conn| {
            let cleared = diesel::update(
                users::table
                    .filter(users::id.eq(customer_id))
                    .filter(users::public_token.eq(token)),
            )
            .set((
                users::public_token.eq(None::<String>),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
            Ok(cleared == 1)
        })
        .await
    }

    async fn delete_customer(
        &self,
        id: Uuid,
        policy: CustomerDeletePolicy,
    ) -> Result<(), HelpdeskError> {
        self.run(move |conn| {
            conn.transaction(|conn| {
                let role: Option<String> = users::table
                    .find(id)
                    .select(users::role)
                    .for_update()
                    .first(conn)
                    .optional()?;
                if role.as_deref() != Some(Role::Customer.as_str()) {
                    return Err(HelpdeskError::not_found("Customer not found"));
                }

                let owned: i64 = tickets::table
                    .filter(tickets::customer_id.eq(id))
                    .count()
                    .get_result(conn)?;
                if policy == CustomerDeletePolicy::Restrict && owned > 0 {
                    return Err(HelpdeskError::Conflict(format!(
                        "Customer still owns {owned} ticket(s)"
                    )));
                }

                // Messages go with their tickets through ON DELETE CASCADE.
                diesel::delete(tickets::table.filter(tickets::customer_id.eq(id))).execute(conn)?;
                diesel::delete(users::table.find(id)).execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn ticket_counts_by_customer(
        &self,
        customer_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, HelpdeskError> {
        let ids = customer_ids.to_vec();
        self.run(move |conn| {
            let rows: Vec<(Uuid, i64)> = tickets::table
                .filter(tickets::customer_id.eq_any(ids))
                .group_by(tickets::customer_id)
                .select((tickets::customer_id, count_star()))
                .load(conn)?;
            Ok(rows.into_iter().collect())
        })
        .await
    }

    async fn insert_category(&self, category: Category) -> Result<Category, HelpdeskError> {
        self.run(move |conn| {
            let row = diesel::insert_into(categories::table)
                .values(DbCategory::from(category))
                .returning(DbCategory::as_returning())
                .get_result(conn)?;
            Ok(row.into())
        })
        .await
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, HelpdeskError> {
        self.run(move |conn| {
            let row = categories::table
                .find(id)
                .select(DbCategory::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Category::from))
        })
        .await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, HelpdeskError> {
        self.run(|conn| {
            let rows = categories::table
                .order(categories::created_at.desc())
                .select(DbCategory::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(Category::from).collect())
        })
        .await
    }

    async fn update_category(&self, category: Category) -> Result<Category, HelpdeskError> {
        self.run(move |conn| {
            let id = category.id;
            let row = diesel::update(categories::table.find(id))
                .set(DbCategory::from(category))
                .returning(DbCategory::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| HelpdeskError::not_found("Category not found"))?;
            Ok(row.into())
        })
        .await
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), HelpdeskError> {
        self.run(move |conn| {
            // tickets.category_id is ON DELETE SET NULL.
            let deleted = diesel::delete(categories::table.find(id)).execute(conn)?;
            if deleted == 0 {
                return Err(HelpdeskError::not_found("Category not found"));
            }
            Ok(())
        })
        .await
    }

    async fn insert_ticket(&self, new_ticket: NewTicket) -> Result<Ticket, HelpdeskError> {
        self.run(move |conn| {
            let now = Utc::now();
            let row = NewDbTicket {
                id: Uuid::new_v4(),
                subject: new_ticket.subject,
                description: new_ticket.description,
                status: TicketStatus::Open.as_str().to_string(),
                priority: new_ticket.priority.as_str().to_string(),
                ticket_type: new_ticket.ticket_type.map(|t| t.as_str().to_string()),
                category_id: new_ticket.category_id,
                hours: new_ticket.hours,
                tags: new_ticket.tags,
                attachments: new_ticket.attachments,
                customer_id: new_ticket.customer_id,
                created_at: now,
                updated_at: now,
            };
            diesel::insert_into(tickets::table)
                .values(row)
                .returning(DbTicket::as_returning())
                .get_result(conn)?
                .try_into()
        })
        .await
    }

    async fn find_ticket(&self, id: Uuid) -> Result<Option<Ticket>, HelpdeskError> {
        self.run(move |conn| {
            tickets::table
                .find(id)
                .select(DbTicket::as_select())
                .first(conn)
                .optional()?
                .map(Ticket::try_from)
                .transpose()
        })
        .await
    }

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
    ) -> Result<(Vec<Ticket>, i64), HelpdeskError> {
        let filter = filter.clone();
        self.run(move |conn| {
            let total: i64 = filtered_tickets(&filter).count().get_result(conn)?;
            let rows = filtered_tickets(&filter)
                .order((tickets::updated_at.desc(), tickets::number.desc()))
                .limit(filter.per_page)
                .offset(filter.offset())
                .select(DbTicket::as_select())
                .load(conn)?;
            let page = rows
                .into_iter()
                .map(Ticket::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok((page, total))
        })
        .await
    }

    async fn apply_ticket_update(
        &self,
        id: Uuid,
        changes: TicketChanges,
        actor_id: Uuid,
    ) -> Result<TicketUpdateOutcome, HelpdeskError> {
        self.run(move |conn| {
            conn.transaction(|conn| {
                let current: Ticket = tickets::table
                    .find(id)
                    .select(DbTicket::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| HelpdeskError::not_found("Ticket not found"))?
                    .try_into()?;

                let mut next = current.clone();
                let now = Utc::now();
                changes.apply_to(&mut next, now);

                let ticket: Ticket = diesel::update(tickets::table.find(id))
                    .set(DbTicketChangeset::from(&next))
                    .returning(DbTicket::as_returning())
                    .get_result(conn)?
                    .try_into()?;

                let audit_message = StatusTransition::between(current.status, ticket.status)
                    .map(|t| insert_message_row(conn, t.audit_message(id, actor_id), now))
                    .transpose()?;

                Ok(TicketUpdateOutcome {
                    ticket,
                    audit_message,
                })
            })
        })
        .await
    }

    async fn ticket_stats(&self, customer_id: Option<Uuid>) -> Result<TicketStats, HelpdeskError> {
        self.run(move |conn| {
            let mut q = tickets::table.into_boxed();
            if let Some(customer_id) = customer_id {
                q = q.filter(tickets::customer_id.eq(customer_id));
            }
            let statuses: Vec<String> = q.select(tickets::status).load(conn)?;

            let mut stats = TicketStats::default();
            for raw in statuses {
                let status: TicketStatus =
                    raw.parse().map_err(|_| corrupt("tickets.status", &raw))?;
                stats.total += 1;
                match status {
                    TicketStatus::Open => stats.open += 1,
                    TicketStatus::Pending => stats.pending += 1,
                    TicketStatus::Solved => stats.solved += 1,
                    TicketStatus::Closed => stats.closed += 1,
                }
            }
            Ok(stats)
        })
        .await
    }

    async fn insert_message(&self, new_message: NewMessage) -> Result<Message, HelpdeskError> {
        self.run(move |conn| {
            conn.transaction(|conn| {
                let now = Utc::now();
                let touched = diesel::update(tickets::table.find(new_message.ticket_id))
                    .set(tickets::updated_at.eq(now))
                    .execute(conn)?;
                if touched == 0 {
                    return Err(HelpdeskError::not_found("Ticket not found"));
                }
                insert_message_row(conn, new_message, now)
            })
        })
        .await
    }

    async fn list_messages(&self, ticket_id: Uuid) -> Result<Vec<Message>, HelpdeskError> {
        self.run(move |conn| {
            let rows = messages::table
                .filter(messages::ticket_id.eq(ticket_id))
                .order((messages::created_at.asc(), messages::seq.asc()))
                .select(DbMessage::as_select())
                .load(conn)?;
            rows.into_iter().map(Message::try_from).collect()
        })
        .await
    }

    async fn message_counts(
        &self,
        ticket_ids: &[Uuid],
        include_internal: bool,
    ) -> Result<HashMap<Uuid, i64>, HelpdeskError> {
        let ids = ticket_ids.to_vec();
        self.run(move |conn| {
            // With include_internal set the second arm admits internal notes.
            let rows: Vec<(Uuid, i64)> = messages::table
                .filter(messages::ticket_id.eq_any(ids))
                .filter(
                    messages::is_internal
                        .eq(false)
                        .or(messages::is_internal.eq(include_internal)),
                )
                .group_by(messages::ticket_id)
                .select((messages::ticket_id, count_star()))
                .load(conn)?;
            Ok(rows.into_iter().collect())
        })
        .await
    }
}
