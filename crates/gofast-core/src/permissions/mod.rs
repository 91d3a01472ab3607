// ABOUTME: Run crew authorization rules evaluated over a crew's membership list
// ABOUTME: Membership lookup, role allow-lists, and last-admin / self-target guards
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! # Crew Permissions
//!
//! Every crew-mutating request loads the crew's full membership list once and
//! asks [`CrewAccess`] whether the caller may proceed:
//!
//! 1. the caller must hold a membership (403 otherwise);
//! 2. the caller's role must be in the endpoint's allow-list (403);
//! 3. destructive membership changes may not target the caller themself (400).
//!    Only admins demote or remove admins, so this keeps an admin in the crew;
//!    leaving is the one path that needs an explicit last-admin check.
//!
//! The checks are pure: they read the slice they were given and never touch
//! the database, so a stale list yields a stale answer. Two admins demoting
//! each other concurrently can therefore both succeed.

use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{CrewMembership, CrewRole};

/// Only crew admins
pub const ADMINS: &[CrewRole] = &[CrewRole::Admin];

/// Crew admins and managers
pub const STAFF: &[CrewRole] = &[CrewRole::Admin, CrewRole::Manager];

/// The caller's standing inside one crew
#[derive(Debug, Clone, Copy)]
pub struct CrewAccess<'a> {
    memberships: &'a [CrewMembership],
    caller: &'a CrewMembership,
}

impl<'a> CrewAccess<'a> {
    /// Find the caller in the crew's membership list
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if the caller is not a member
    pub fn resolve(memberships: &'a [CrewMembership], caller_id: Uuid) -> AppResult<Self> {
        let caller = memberships
            .iter()
            .find(|m| m.athlete_id == caller_id)
            .ok_or_else(|| AppError::forbidden("You are not a member of this run crew"))?;

        Ok(Self {
            memberships,
            caller,
        })
    }

    /// The caller's membership
    #[must_use]
    pub const fn caller(&self) -> &'a CrewMembership {
        self.caller
    }

    /// The caller's role
    #[must_use]
    pub const fn role(&self) -> CrewRole {
        self.caller.role
    }

    /// Number of admins currently in the crew
    #[must_use]
    pub fn admin_count(&self) -> usize {
        self.memberships
            .iter()
            .filter(|m| m.role == CrewRole::Admin)
            .count()
    }

    /// Require the caller's role to be in `allowed`
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if the role is not allowed
    pub fn require_any(&self, allowed: &[CrewRole]) -> AppResult<()> {
        if allowed.contains(&self.caller.role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "This action requires one of the roles: {}",
                allowed
                    .iter()
                    .map(CrewRole::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    /// Whether the caller authored the content or may moderate it
    #[must_use]
    pub fn can_modify_authored(&self, author_id: Uuid) -> bool {
        self.caller.athlete_id == author_id || self.caller.role.is_staff()
    }

    /// Require the caller to be the author or crew staff
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` otherwise
    pub fn require_author_or_staff(&self, author_id: Uuid) -> AppResult<()> {
        if self.can_modify_authored(author_id) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "Only the author or a crew admin/manager can modify this",
            ))
        }
    }

    /// Look up another member of the crew
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the athlete is not a member
    pub fn member(&self, athlete_id: Uuid) -> AppResult<&'a CrewMembership> {
        self.memberships
            .iter()
            .find(|m| m.athlete_id == athlete_id)
            .ok_or_else(|| AppError::not_found("Crew member"))
    }

    /// Validate an admin changing `target`'s role to `new_role`
    ///
    /// The caller is an admin and may not target themself, so demoting another
    /// admin always leaves the caller as an admin.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if the caller is not an admin
    /// - `ResourceNotFound` if the target is not a member
    /// - `InvalidOperation` for self-demotion
    pub fn check_role_change(
        &self,
        target_id: Uuid,
        new_role: CrewRole,
    ) -> AppResult<&'a CrewMembership> {
        self.require_any(ADMINS)?;
        let target = self.member(target_id)?;

        if target.athlete_id == self.caller.athlete_id {
            return Err(AppError::invalid_operation(
                "You cannot change your own role; transfer ownership first",
            ));
        }

        Ok(target)
    }

    /// Validate removing `target` from the crew
    ///
    /// Admins may remove anyone but themselves; managers may remove plain members.
    /// Only an admin can remove an admin, so the crew keeps the caller as admin.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if the caller is not staff, or a manager targets staff
    /// - `ResourceNotFound` if the target is not a member
    /// - `InvalidOperation` for self-removal
    pub fn check_removal(&self, target_id: Uuid) -> AppResult<&'a CrewMembership> {
        self.require_any(STAFF)?;
        let target = self.member(target_id)?;

        if target.athlete_id == self.caller.athlete_id {
            return Err(AppError::invalid_operation(
                "You cannot remove yourself; leave the crew or transfer ownership first",
            ));
        }
        if self.caller.role == CrewRole::Manager && target.role != CrewRole::Member {
            return Err(AppError::forbidden(
                "Managers can only remove regular members",
            ));
        }

        Ok(target)
    }

    /// Validate the caller leaving the crew
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the caller is the last admin
    pub fn check_leave(&self) -> AppResult<()> {
        if self.caller.role == CrewRole::Admin {
            self.ensure_not_last_admin()?;
        }
        Ok(())
    }

    /// Validate an admin handing ownership to `target` and stepping down to `demote_to`
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if the caller is not an admin
    /// - `ResourceNotFound` if the target is not a member
    /// - `InvalidOperation` if the target is the caller
    /// - `InvalidInput` if `demote_to` is admin
    pub fn check_transfer(
        &self,
        target_id: Uuid,
        demote_to: CrewRole,
    ) -> AppResult<&'a CrewMembership> {
        self.require_any(ADMINS)?;
        let target = self.member(target_id)?;

        if target.athlete_id == self.caller.athlete_id {
            return Err(AppError::invalid_operation(
                "You cannot transfer ownership to yourself",
            ));
        }
        if demote_to == CrewRole::Admin {
            return Err(AppError::invalid_input(
                "The previous admin must step down to member or manager",
            ));
        }

        Ok(target)
    }

    fn ensure_not_last_admin(&self) -> AppResult<()> {
        if self.admin_count() <= 1 {
            return Err(AppError::invalid_operation(
                "A run crew must keep at least one admin",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    struct Crew {
        members: Vec<CrewMembership>,
    }

    impl Crew {
        fn new(roles: &[CrewRole]) -> Self {
            let crew_id = Uuid::new_v4();
            Self {
                members: roles
                    .iter()
                    .map(|role| CrewMembership::new(crew_id, Uuid::new_v4(), *role))
                    .collect(),
            }
        }

        fn id(&self, index: usize) -> Uuid {
            self.members[index].athlete_id
        }

        fn access(&self, index: usize) -> CrewAccess<'_> {
            CrewAccess::resolve(&self.members, self.id(index)).unwrap()
        }
    }

    #[test]
    fn test_non_member_is_forbidden() {
        let crew = Crew::new(&[CrewRole::Admin]);
        let err = CrewAccess::resolve(&crew.members, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn test_role_allow_list() {
        let crew = Crew::new(&[CrewRole::Admin, CrewRole::Manager, CrewRole::Member]);
        assert!(crew.access(0).require_any(ADMINS).is_ok());
        assert!(crew.access(1).require_any(STAFF).is_ok());
        assert_eq!(
            crew.access(1).require_any(ADMINS).unwrap_err().code,
            ErrorCode::PermissionDenied
        );
        assert!(crew.access(2).require_any(STAFF).is_err());
    }

    #[test]
    fn test_self_demotion_rejected() {
        let crew = Crew::new(&[CrewRole::Admin, CrewRole::Admin]);
        let err = crew
            .access(0)
            .check_role_change(crew.id(0), CrewRole::Member)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
    }

    #[test]
    fn test_demoting_another_admin_allowed_when_two_admins() {
        let crew = Crew::new(&[CrewRole::Admin, CrewRole::Admin]);
        let target = crew
            .access(0)
            .check_role_change(crew.id(1), CrewRole::Member)
            .unwrap();
        assert_eq!(target.athlete_id, crew.id(1));
    }

    #[test]
    fn test_last_admin_cannot_leave() {
        let crew = Crew::new(&[CrewRole::Admin, CrewRole::Member]);
        let err = crew.access(0).check_leave().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert!(crew.access(1).check_leave().is_ok());
    }

    #[test]
    fn test_admin_removes_other_admin_but_not_self() {
        let crew = Crew::new(&[CrewRole::Admin, CrewRole::Admin]);
        assert_eq!(crew.access(0).admin_count(), 2);
        assert!(crew.access(0).check_removal(crew.id(1)).is_ok());

        // a sole admin removing themself is the only way to empty the admin set
        let single = Crew::new(&[CrewRole::Admin, CrewRole::Manager]);
        assert_eq!(single.access(0).admin_count(), 1);
        assert_eq!(
            single.access(0).check_removal(single.id(0)).unwrap_err().code,
            ErrorCode::InvalidOperation
        );
        assert_eq!(
            single.access(1).check_removal(single.id(0)).unwrap_err().code,
            ErrorCode::PermissionDenied
        );
    }

    #[test]
    fn test_manager_removal_limits() {
        let crew = Crew::new(&[CrewRole::Admin, CrewRole::Manager, CrewRole::Member]);
        assert!(crew.access(1).check_removal(crew.id(2)).is_ok());
        assert_eq!(
            crew.access(1).check_removal(crew.id(0)).unwrap_err().code,
            ErrorCode::PermissionDenied
        );
        assert_eq!(
            crew.access(2).check_removal(crew.id(2)).unwrap_err().code,
            ErrorCode::PermissionDenied
        );
    }

    #[test]
    fn test_unknown_target_not_found() {
        let crew = Crew::new(&[CrewRole::Admin]);
        let err = crew
            .access(0)
            .check_removal(Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
    }

    #[test]
    fn test_transfer_rules() {
        let crew = Crew::new(&[CrewRole::Admin, CrewRole::Member]);
        assert!(crew.access(0).check_transfer(crew.id(1), CrewRole::Member).is_ok());
        assert_eq!(
            crew.access(0)
                .check_transfer(crew.id(0), CrewRole::Member)
                .unwrap_err()
                .code,
            ErrorCode::InvalidOperation
        );
        assert_eq!(
            crew.access(0)
                .check_transfer(crew.id(1), CrewRole::Admin)
                .unwrap_err()
                .code,
            ErrorCode::InvalidInput
        );
        assert!(crew.access(1).check_transfer(crew.id(0), CrewRole::Member).is_err());
    }

    #[test]
    fn test_author_or_staff() {
        let crew = Crew::new(&[CrewRole::Admin, CrewRole::Member, CrewRole::Member]);
        assert!(crew.access(0).can_modify_authored(crew.id(1)));
        assert!(crew.access(1).can_modify_authored(crew.id(1)));
        assert!(crew.access(2).require_author_or_staff(crew.id(1)).is_err());
    }
}
