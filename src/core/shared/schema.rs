diesel::table! {
    users (id) {
        id -> Uuid,
        email -> Varchar,
        name -> Nullable<Varchar>,
        password_hash -> Text,
        role -> Varchar,
        avatar -> Nullable<Text>,
        phone -> Nullable<Varchar>,
        location -> Nullable<Varchar>,
        address -> Nullable<Text>,
        email_notifications -> Bool,
        public_token -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    categories (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tickets (id) {
        id -> Uuid,
        number -> Int8,
        subject -> Varchar,
        description -> Nullable<Text>,
        status -> Varchar,
        priority -> Varchar,
        ticket_type -> Nullable<Varchar>,
        category_id -> Nullable<Uuid>,
        hours -> Nullable<Float8>,
        tags -> Array<Text>,
        attachments -> Array<Text>,
        customer_id -> Uuid,
        assignee_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    messages (id) {
        id -> Uuid,
        seq -> Int8,
        ticket_id -> Uuid,
        author_id -> Uuid,
        content -> Text,
        message_type -> Varchar,
        is_internal -> Bool,
        attachments -> Array<Text>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(tickets -> categories (category_id));
diesel::joinable!(messages -> tickets (ticket_id));
diesel::joinable!(messages -> users (author_id));

diesel::allow_tables_to_appear_in_same_query!(users, categories, tickets, messages);
