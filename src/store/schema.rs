//! Session store schema and key layout

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

pub const CREDENTIAL_TOKEN_KEY: &str = "credential:token";
pub const CREDENTIAL_EXPIRES_KEY: &str = "credential:expires_at";

pub fn session_key(conversation_id: crate::state_machine::ConversationId) -> String {
    format!("session:{conversation_id}")
}
