use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::UserRole;

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) parent_id: Option<String>,
    pub(crate) telegram_linked: bool,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
            parent_id: user.parent_id,
            telegram_linked: user.telegram_chat_id.is_some_and(|chat_id| !chat_id.is_empty()),
            is_active: user.is_active,
            created_at: format_primitive(user.created_at),
        }
    }
}
