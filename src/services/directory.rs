use crate::db::SERVICE_NAME;
use crate::error::{AppError, AppResult};
use crate::models::{PublicUser, UserRole};
use async_trait::async_trait;
use db_pool::{acquire_with_metrics, PgPool};
use tokio_postgres::Row;
use uuid::Uuid;

/// Read-only view of the platform's identity data: profiles, contact edges,
/// group membership and mentor assignments. The messaging core never writes
/// through this trait.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<PublicUser>>;

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<PublicUser>>;

    /// Whether an accepted contact edge exists between the two users,
    /// in either direction.
    async fn has_contact(&self, a: Uuid, b: Uuid) -> AppResult<bool>;

    /// Whether the two users are members of at least one common group.
    async fn shared_group(&self, a: Uuid, b: Uuid) -> AppResult<bool>;

    /// Whether the two users are participants (mentor or mentee) of at
    /// least one common mentor-led group.
    async fn shared_mentor_group(&self, a: Uuid, b: Uuid) -> AppResult<bool>;
}

const PUBLIC_USER_COLUMNS: &str =
    "id, first_name, last_name, email, avatar, role, is_active";

fn row_to_public_user(row: &Row) -> AppResult<PublicUser> {
    let role_str: String = row.get("role");
    let role = UserRole::from_db(&role_str)
        .ok_or_else(|| AppError::Database(format!("unknown user role: {role_str}")))?;
    Ok(PublicUser {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        avatar: row.get("avatar"),
        role,
        // presence is layered on at the edge, not stored with the profile
        is_online: false,
        is_active: row.get("is_active"),
    })
}

/// Directory backed by the platform's relational schema.
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<PublicUser>> {
        let client = acquire_with_metrics(&self.pool, SERVICE_NAME).await?;
        let row = client
            .query_opt(
                &format!("SELECT {PUBLIC_USER_COLUMNS} FROM users WHERE id = $1"),
                &[&id],
            )
            .await?;
        row.map(|r| row_to_public_user(&r)).transpose()
    }

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<PublicUser>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = acquire_with_metrics(&self.pool, SERVICE_NAME).await?;
        let rows = client
            .query(
                &format!("SELECT {PUBLIC_USER_COLUMNS} FROM users WHERE id = ANY($1)"),
                &[&ids],
            )
            .await?;
        rows.iter().map(row_to_public_user).collect()
    }

    async fn has_contact(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let client = acquire_with_metrics(&self.pool, SERVICE_NAME).await?;
        let row = client
            .query_one(
                "SELECT EXISTS(
                     SELECT 1 FROM contacts
                     WHERE (user_id = $1 AND contact_id = $2)
                        OR (user_id = $2 AND contact_id = $1)
                 )",
                &[&a, &b],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn shared_group(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let client = acquire_with_metrics(&self.pool, SERVICE_NAME).await?;
        let row = client
            .query_one(
                "SELECT EXISTS(
                     SELECT 1 FROM group_members ga
                     JOIN group_members gb ON ga.group_id = gb.group_id
                     WHERE ga.user_id = $1 AND gb.user_id = $2
                 )",
                &[&a, &b],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn shared_mentor_group(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let client = acquire_with_metrics(&self.pool, SERVICE_NAME).await?;
        // a participant of a mentor group is its mentor or any member
        let row = client
            .query_one(
                "SELECT EXISTS(
                     SELECT 1 FROM groups g
                     WHERE g.mentor_id IS NOT NULL
                       AND (g.mentor_id = $1 OR EXISTS(
                             SELECT 1 FROM group_members m
                             WHERE m.group_id = g.id AND m.user_id = $1))
                       AND (g.mentor_id = $2 OR EXISTS(
                             SELECT 1 FROM group_members m
                             WHERE m.group_id = g.id AND m.user_id = $2))
                 )",
                &[&a, &b],
            )
            .await?;
        Ok(row.get(0))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// In-memory directory for exercising authorization rules without a
    /// database.
    #[derive(Default)]
    pub struct InMemoryDirectory {
        users: Mutex<HashMap<Uuid, PublicUser>>,
        contacts: Mutex<HashSet<(Uuid, Uuid)>>,
        // group id -> (mentor, members)
        groups: Mutex<HashMap<Uuid, (Option<Uuid>, HashSet<Uuid>)>>,
    }

    impl InMemoryDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_user(&self, role: UserRole, is_active: bool) -> Uuid {
            let id = Uuid::new_v4();
            self.users.lock().unwrap().insert(
                id,
                PublicUser {
                    id,
                    first_name: "Test".into(),
                    last_name: "User".into(),
                    email: format!("{id}@example.com"),
                    avatar: None,
                    role,
                    is_online: false,
                    is_active,
                },
            );
            id
        }

        pub fn link_contacts(&self, a: Uuid, b: Uuid) {
            self.contacts.lock().unwrap().insert((a, b));
        }

        pub fn add_group(&self, mentor: Option<Uuid>, members: &[Uuid]) -> Uuid {
            let id = Uuid::new_v4();
            self.groups
                .lock()
                .unwrap()
                .insert(id, (mentor, members.iter().copied().collect()));
            id
        }
    }

    #[async_trait]
    impl UserDirectory for InMemoryDirectory {
        async fn get_user(&self, id: Uuid) -> AppResult<Option<PublicUser>> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn find_users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<PublicUser>> {
            let users = self.users.lock().unwrap();
            Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
        }

        async fn has_contact(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
            let contacts = self.contacts.lock().unwrap();
            Ok(contacts.contains(&(a, b)) || contacts.contains(&(b, a)))
        }

        async fn shared_group(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
            Ok(self
                .groups
                .lock()
                .unwrap()
                .values()
                .any(|(_, members)| members.contains(&a) && members.contains(&b)))
        }

        async fn shared_mentor_group(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
            let participates = |mentor: &Option<Uuid>, members: &HashSet<Uuid>, user: Uuid| {
                *mentor == Some(user) || members.contains(&user)
            };
            Ok(self.groups.lock().unwrap().values().any(|(mentor, members)| {
                mentor.is_some()
                    && participates(mentor, members, a)
                    && participates(mentor, members, b)
            }))
        }
    }
}
