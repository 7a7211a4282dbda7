//! # Access Control
//!
//! Every authorization decision in the board goes through [`authorize`].
//! It is a pure function of the acting identity, a snapshot of the target
//! resource (carried inside [`Action`]) and the requested action, so the
//! services only have to load the resource and ask.
//!
//! Three gates exist:
//! - **role**: the actor's role must be in the action's allowed set;
//! - **department scope**: content creation is confined to the actor's own
//!   department, and an actor without one cannot create content at all;
//! - **ownership**: update/delete of posts and comments is open to the owner
//!   or to an elevated role (TEACHER/ADMIN); notices are open to the owner or
//!   to an ADMIN.

use std::fmt;

use domains::{DepartmentId, DomainError, Identity, Role, UserId};

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const STAFF: &[Role] = &[Role::Teacher, Role::Admin];

/// A requested action together with the facts about its target that the
/// decision needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateDepartment,
    UpdateDepartment,
    DeleteDepartment,
    CreatePost { department_id: DepartmentId },
    UpdatePost { owner_id: UserId },
    DeletePost { owner_id: UserId },
    CreateComment { post_department_id: DepartmentId },
    UpdateComment { owner_id: UserId },
    DeleteComment { owner_id: UserId },
    CreateNotice,
    UpdateNotice { owner_id: UserId },
    DeleteNotice { owner_id: UserId },
    ReadNoticeAttachment { owner_id: UserId, department_id: DepartmentId },
}

impl Action {
    /// Stable label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateDepartment => "department.create",
            Action::UpdateDepartment => "department.update",
            Action::DeleteDepartment => "department.delete",
            Action::CreatePost { .. } => "post.create",
            Action::UpdatePost { .. } => "post.update",
            Action::DeletePost { .. } => "post.delete",
            Action::CreateComment { .. } => "comment.create",
            Action::UpdateComment { .. } => "comment.update",
            Action::DeleteComment { .. } => "comment.delete",
            Action::CreateNotice => "notice.create",
            Action::UpdateNotice { .. } => "notice.update",
            Action::DeleteNotice { .. } => "notice.delete",
            Action::ReadNoticeAttachment { .. } => "notice.attachment",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Converts a denial into `DomainError::Forbidden`.
    pub fn into_result(self) -> Result<(), DomainError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(DomainError::Forbidden(reason)),
        }
    }
}

/// Decides whether `actor` may perform `action`.
pub fn authorize(actor: &Identity, action: Action) -> Decision {
    match action {
        Action::CreateDepartment | Action::UpdateDepartment | Action::DeleteDepartment => {
            role_gate(actor, ADMIN_ONLY)
        }
        Action::CreatePost { department_id } => department_gate(actor, department_id, "post"),
        Action::CreateComment { post_department_id } => {
            department_gate(actor, post_department_id, "comment")
        }
        // Delete uses the same owner-or-elevated rule as update.
        Action::UpdatePost { owner_id }
        | Action::DeletePost { owner_id }
        | Action::UpdateComment { owner_id }
        | Action::DeleteComment { owner_id } => owner_or(actor, owner_id, STAFF),
        Action::CreateNotice => role_gate(actor, STAFF),
        Action::UpdateNotice { owner_id } | Action::DeleteNotice { owner_id } => {
            match role_gate(actor, STAFF) {
                Decision::Allow => owner_or(actor, owner_id, ADMIN_ONLY),
                deny => deny,
            }
        }
        Action::ReadNoticeAttachment {
            owner_id,
            department_id,
        } => {
            if actor.user_id == owner_id
                || actor.role == Role::Admin
                || actor.department_id == Some(department_id)
            {
                Decision::Allow
            } else {
                Decision::Deny("notice belongs to another department".into())
            }
        }
    }
}

/// Like [`authorize`], but logs denials and returns a `Forbidden` error.
pub fn ensure(actor: &Identity, action: Action) -> Result<(), DomainError> {
    let decision = authorize(actor, action);
    if let Decision::Deny(reason) = &decision {
        tracing::warn!(
            user_id = actor.user_id,
            role = %actor.role,
            action = %action,
            reason = %reason,
            "access denied"
        );
    }
    decision.into_result()
}

fn role_gate(actor: &Identity, allowed: &[Role]) -> Decision {
    if allowed.contains(&actor.role) {
        Decision::Allow
    } else {
        let names: Vec<&str> = allowed.iter().map(Role::as_str).collect();
        Decision::Deny(format!("requires role {}", names.join(" or ")))
    }
}

fn department_gate(actor: &Identity, target: DepartmentId, what: &str) -> Decision {
    match actor.department_id {
        None => Decision::Deny(format!(
            "accounts without a department cannot create a {what}"
        )),
        Some(own) if own != target => Decision::Deny(format!(
            "cannot create a {what} outside your own department"
        )),
        Some(_) => Decision::Allow,
    }
}

fn owner_or(actor: &Identity, owner_id: UserId, override_roles: &[Role]) -> Decision {
    if actor.user_id == owner_id || override_roles.contains(&actor.role) {
        Decision::Allow
    } else {
        Decision::Deny("only the author may modify this resource".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(user_id: UserId, role: Role, department_id: Option<DepartmentId>) -> Identity {
        Identity {
            user_id,
            username: format!("user{user_id}"),
            role,
            department_id,
        }
    }

    #[test]
    fn department_management_is_admin_only() {
        let admin = actor(1, Role::Admin, None);
        let teacher = actor(2, Role::Teacher, Some(10));
        for action in [
            Action::CreateDepartment,
            Action::UpdateDepartment,
            Action::DeleteDepartment,
        ] {
            assert!(authorize(&admin, action).is_allowed());
            assert_eq!(
                authorize(&teacher, action),
                Decision::Deny("requires role ADMIN".into())
            );
        }
    }

    #[test]
    fn posts_are_scoped_to_the_authors_department() {
        let student = actor(3, Role::Student, Some(10));
        assert!(authorize(&student, Action::CreatePost { department_id: 10 }).is_allowed());
        assert!(!authorize(&student, Action::CreatePost { department_id: 11 }).is_allowed());
    }

    #[test]
    fn admin_without_department_cannot_post_or_comment() {
        let admin = actor(1, Role::Admin, None);
        assert!(!authorize(&admin, Action::CreatePost { department_id: 10 }).is_allowed());
        assert!(!authorize(
            &admin,
            Action::CreateComment {
                post_department_id: 10
            }
        )
        .is_allowed());
    }

    #[test]
    fn student_non_owner_is_rejected_but_owner_passes() {
        let student = actor(3, Role::Student, Some(10));
        assert!(authorize(&student, Action::UpdatePost { owner_id: 3 }).is_allowed());
        assert!(authorize(&student, Action::DeletePost { owner_id: 3 }).is_allowed());
        assert!(!authorize(&student, Action::UpdatePost { owner_id: 4 }).is_allowed());
        assert!(!authorize(&student, Action::DeletePost { owner_id: 4 }).is_allowed());
        assert!(!authorize(&student, Action::DeleteComment { owner_id: 4 }).is_allowed());
    }

    #[test]
    fn elevated_roles_moderate_any_post_or_comment() {
        for elevated in [actor(5, Role::Teacher, Some(10)), actor(6, Role::Admin, None)] {
            assert!(authorize(&elevated, Action::UpdatePost { owner_id: 3 }).is_allowed());
            assert!(authorize(&elevated, Action::DeletePost { owner_id: 3 }).is_allowed());
            assert!(authorize(&elevated, Action::UpdateComment { owner_id: 3 }).is_allowed());
            assert!(authorize(&elevated, Action::DeleteComment { owner_id: 3 }).is_allowed());
        }
    }

    #[test]
    fn notices_need_staff_and_ownership_unless_admin() {
        let student = actor(3, Role::Student, Some(10));
        let author = actor(5, Role::Teacher, Some(10));
        let colleague = actor(7, Role::Teacher, Some(10));
        let admin = actor(1, Role::Admin, None);

        assert!(!authorize(&student, Action::CreateNotice).is_allowed());
        assert!(authorize(&author, Action::CreateNotice).is_allowed());

        assert!(!authorize(&student, Action::UpdateNotice { owner_id: 3 }).is_allowed());
        assert!(authorize(&author, Action::UpdateNotice { owner_id: 5 }).is_allowed());
        assert!(!authorize(&colleague, Action::DeleteNotice { owner_id: 5 }).is_allowed());
        assert!(authorize(&admin, Action::DeleteNotice { owner_id: 5 }).is_allowed());
    }

    #[test]
    fn attachments_are_readable_within_the_department() {
        let reader = actor(3, Role::Student, Some(10));
        let outsider = actor(4, Role::Student, Some(11));
        let action = Action::ReadNoticeAttachment {
            owner_id: 5,
            department_id: 10,
        };
        assert!(authorize(&reader, action).is_allowed());
        assert!(!authorize(&outsider, action).is_allowed());
        assert!(authorize(&actor(1, Role::Admin, None), action).is_allowed());
    }

    #[test]
    fn denial_converts_to_forbidden() {
        let student = actor(3, Role::Student, Some(10));
        let err = ensure(&student, Action::CreateNotice).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }
}
