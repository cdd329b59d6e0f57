// @generated manually to match the auth/session core's persisted entities.

diesel::table! {
    use diesel::sql_types::*;

    users (id) {
        id -> Uuid,
        #[max_length = 320]
        email -> Varchar,
        password_hash -> Nullable<Text>,
        #[max_length = 255]
        full_name -> Varchar,
        #[max_length = 255]
        company_name -> Nullable<Varchar>,
        is_active -> Bool,
        email_verified -> Bool,
        email_verified_at -> Nullable<Timestamptz>,
        failed_login_attempts -> Int4,
        account_locked_until -> Nullable<Timestamptz>,
        last_login_at -> Nullable<Timestamptz>,
        #[max_length = 64]
        last_login_ip -> Nullable<Varchar>,
        min_token_version -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    refresh_tokens (id) {
        id -> Uuid,
        user_id -> Uuid,
        #[max_length = 255]
        token_hash -> Varchar,
        expires_at -> Timestamptz,
        is_revoked -> Bool,
        revoked_at -> Nullable<Timestamptz>,
        #[max_length = 255]
        device_info -> Nullable<Varchar>,
        ip_address -> Nullable<Text>,
        user_agent -> Nullable<Text>,
        #[max_length = 255]
        location -> Nullable<Varchar>,
        #[max_length = 255]
        fingerprint -> Nullable<Varchar>,
        is_trusted_device -> Bool,
        last_used_at -> Nullable<Timestamptz>,
        token_version -> Int4,
        global_version_at_issuance -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    email_verification_tokens (id) {
        id -> Uuid,
        user_id -> Uuid,
        #[max_length = 255]
        token_hash -> Varchar,
        expires_at -> Timestamptz,
        used_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        ip_address -> Nullable<Text>,
        user_agent -> Nullable<Text>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    password_reset_tokens (id) {
        id -> Uuid,
        user_id -> Uuid,
        #[max_length = 255]
        token_hash -> Varchar,
        expires_at -> Timestamptz,
        used_at -> Nullable<Timestamptz>,
        created_at -> Nullable<Timestamptz>,
        ip_address -> Nullable<Text>,
        user_agent -> Nullable<Text>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    security_config (id) {
        id -> Int4,
        global_min_token_version -> Int4,
        updated_at -> Timestamptz,
        #[max_length = 255]
        updated_by -> Nullable<Varchar>,
        reason -> Nullable<Text>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    session_audit_log (id) {
        id -> Uuid,
        session_id -> Uuid,
        user_id -> Uuid,
        #[max_length = 32]
        event_type -> Varchar,
        context -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(refresh_tokens -> users (user_id));
diesel::joinable!(email_verification_tokens -> users (user_id));
diesel::joinable!(password_reset_tokens -> users (user_id));
diesel::joinable!(session_audit_log -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    refresh_tokens,
    email_verification_tokens,
    password_reset_tokens,
    security_config,
    session_audit_log,
);
