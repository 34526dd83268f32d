use crate::error::AppResult;
use crate::models::UserRole;
use crate::services::directory::UserDirectory;
use std::sync::Arc;
use uuid::Uuid;

/// Decides whether one user may open a conversation with another.
///
/// Pure read-only check: "not allowed" is a `false` return, never an error.
/// Errors surface only when a relationship lookup itself fails.
pub struct AuthorizationGate {
    directory: Arc<dyn UserDirectory>,
}

impl AuthorizationGate {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Rules in evaluation order, short-circuiting on the first match:
    /// admin override, self-message rejection, contact edge, shared group,
    /// shared mentor group.
    pub async fn can_message(
        &self,
        requester_id: Uuid,
        target_id: Uuid,
        requester_role: UserRole,
    ) -> AppResult<bool> {
        if requester_role.is_admin() {
            return Ok(true);
        }
        if requester_id == target_id {
            return Ok(false);
        }
        if self.directory.has_contact(requester_id, target_id).await? {
            return Ok(true);
        }
        if self.directory.shared_group(requester_id, target_id).await? {
            return Ok(true);
        }
        if self
            .directory
            .shared_mentor_group(requester_id, target_id)
            .await?
        {
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::directory::testing::InMemoryDirectory;

    fn gate(directory: Arc<InMemoryDirectory>) -> AuthorizationGate {
        AuthorizationGate::new(directory)
    }

    #[tokio::test]
    async fn admin_may_message_anyone() {
        let dir = Arc::new(InMemoryDirectory::new());
        let admin = dir.add_user(UserRole::Admin, true);
        let stranger = dir.add_user(UserRole::Mentee, true);
        let gate = gate(dir);
        assert!(gate
            .can_message(admin, stranger, UserRole::Admin)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn self_message_is_denied_even_for_admin_target() {
        let dir = Arc::new(InMemoryDirectory::new());
        let user = dir.add_user(UserRole::Mentor, true);
        let gate = gate(dir);
        assert!(!gate.can_message(user, user, UserRole::Mentor).await.unwrap());
    }

    #[tokio::test]
    async fn contact_edge_allows_both_directions() {
        let dir = Arc::new(InMemoryDirectory::new());
        let alice = dir.add_user(UserRole::Mentee, true);
        let bob = dir.add_user(UserRole::Mentee, true);
        dir.link_contacts(alice, bob);
        let gate = gate(dir);
        assert!(gate.can_message(alice, bob, UserRole::Mentee).await.unwrap());
        assert!(gate.can_message(bob, alice, UserRole::Mentee).await.unwrap());
    }

    #[tokio::test]
    async fn shared_group_membership_is_symmetric() {
        let dir = Arc::new(InMemoryDirectory::new());
        let alice = dir.add_user(UserRole::Mentee, true);
        let bob = dir.add_user(UserRole::Mentee, true);
        dir.add_group(None, &[alice, bob]);
        let gate = gate(dir);
        assert!(gate.can_message(alice, bob, UserRole::Mentee).await.unwrap());
        assert!(gate.can_message(bob, alice, UserRole::Mentee).await.unwrap());
    }

    #[tokio::test]
    async fn mentor_group_links_mentor_and_mentee() {
        let dir = Arc::new(InMemoryDirectory::new());
        let mentor = dir.add_user(UserRole::Mentor, true);
        let mentee = dir.add_user(UserRole::Mentee, true);
        dir.add_group(Some(mentor), &[mentee]);
        let gate = gate(dir);
        assert!(gate
            .can_message(mentor, mentee, UserRole::Mentor)
            .await
            .unwrap());
        assert!(gate
            .can_message(mentee, mentor, UserRole::Mentee)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn mentees_of_the_same_mentor_group_may_message() {
        let dir = Arc::new(InMemoryDirectory::new());
        let mentor = dir.add_user(UserRole::Mentor, true);
        let first = dir.add_user(UserRole::Mentee, true);
        let second = dir.add_user(UserRole::Mentee, true);
        dir.add_group(Some(mentor), &[first, second]);
        let gate = gate(dir);
        assert!(gate
            .can_message(first, second, UserRole::Mentee)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unrelated_users_are_denied() {
        let dir = Arc::new(InMemoryDirectory::new());
        let alice = dir.add_user(UserRole::Mentee, true);
        let bob = dir.add_user(UserRole::Mentee, true);
        // membership in different groups does not connect them
        dir.add_group(None, &[alice]);
        dir.add_group(None, &[bob]);
        let gate = gate(dir);
        assert!(!gate.can_message(alice, bob, UserRole::Mentee).await.unwrap());
    }
}
