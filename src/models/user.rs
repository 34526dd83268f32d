use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform role, owned by the identity subsystem
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Mentor,
    Mentee,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Mentor => "mentor",
            UserRole::Mentee => "mentee",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(UserRole::Admin),
            "mentor" => Some(UserRole::Mentor),
            "mentee" => Some(UserRole::Mentee),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// Public profile fields surfaced to counterparts in conversation views.
/// Read-only from this service's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: UserRole,
    pub is_online: bool,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_db_mapping_round_trips() {
        for role in [UserRole::Admin, UserRole::Mentor, UserRole::Mentee] {
            assert_eq!(UserRole::from_db(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::from_db("moderator"), None);
    }
}
