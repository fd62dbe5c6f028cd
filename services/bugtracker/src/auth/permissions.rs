//! Permission rules for every endpoint.
//!
//! Each rule is a pure predicate over the caller and, where relevant, the
//! target's ownership. Handlers resolve existence first (404), then ask the
//! rule (403). Nothing here touches the store or caches a decision.
use crate::model::{Bug, Project, User};

/// Staff, managers, and team leads: register users and browse the user list.
pub fn can_manage_accounts(caller: &User) -> bool {
    caller.is_staff || caller.is_manager() || caller.is_team_lead()
}

pub fn can_view_users(caller: &User) -> bool {
    can_manage_accounts(caller)
}

/// `/users/{id}/` writes are reserved to staff.
pub fn can_modify_users(caller: &User) -> bool {
    caller.is_staff
}

pub fn can_view_profile(caller: &User, target_id: i64) -> bool {
    caller.id == target_id || can_manage_accounts(caller)
}

/// Managers may edit other profiles, but never a staff account.
pub fn can_modify_profile(caller: &User, target: &User) -> bool {
    caller.id == target.id || caller.is_staff || (caller.is_manager() && !target.is_staff)
}

/// `role` and `dept` drive every other rule, so nobody changes their own.
pub fn can_change_role(caller: &User, target: &User) -> bool {
    caller.is_staff || (caller.is_manager() && caller.id != target.id && !target.is_staff)
}

/// Only staff may grant or revoke the staff flag.
pub fn can_set_staff(caller: &User) -> bool {
    caller.is_staff
}

pub fn can_manage_departments(caller: &User) -> bool {
    caller.is_staff || caller.is_manager()
}

/// Staff and managers see every project; others only their own or assigned ones.
pub fn sees_all_projects(caller: &User) -> bool {
    caller.is_staff || caller.is_manager()
}

pub fn can_manage_projects(caller: &User) -> bool {
    caller.is_staff || caller.is_manager()
}

/// Read access, assignment listing, and status updates share this rule.
pub fn can_access_project(caller: &User, project: &Project, is_member: bool) -> bool {
    sees_all_projects(caller) || project.user == caller.id || is_member
}

pub fn sees_all_bugs(caller: &User) -> bool {
    caller.is_staff
}

pub fn can_view_bug(caller: &User, bug: &Bug) -> bool {
    caller.is_staff || bug.is_visible_to(caller.id)
}

/// Full updates and status changes.
pub fn can_modify_bug(caller: &User, bug: &Bug) -> bool {
    caller.is_staff || bug.created_by_id == caller.id
}

pub fn can_delete_bug(caller: &User) -> bool {
    caller.is_staff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BugPriority, BugSeverity, BugStatus, BugType, Dept, ProjectStatus, Role,
    };
    use chrono::{NaiveDate, Utc};

    fn user(id: i64, role: Role, is_staff: bool) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password_hash: String::new(),
            name: None,
            phone_number: None,
            role,
            dept: Dept::Python,
            is_staff,
            date_joined: Utc::now(),
        }
    }

    fn project(owner: i64) -> Project {
        Project {
            id: 1,
            project_name: "Tracker".to_string(),
            project_description: String::new(),
            project_duration: 10,
            client_name: "Acme".to_string(),
            department: None,
            submission_date: NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"),
            status: ProjectStatus::Open,
            user: owner,
            updated_date: Utc::now(),
        }
    }

    fn bug(created_by: i64, assigned_to: Option<i64>) -> Bug {
        Bug {
            id: 1,
            bug_type: BugType::Bug,
            bug_description: "broken".to_string(),
            url_bug: None,
            image: None,
            bug_priority: BugPriority::Low,
            bug_severity: BugSeverity::Minor,
            status: BugStatus::Open,
            is_current_project: true,
            project: 1,
            department: 1,
            created_by_id: created_by,
            created_by: format!("user{created_by}"),
            assigned_to_id: assigned_to,
            assigned_to: assigned_to.map(|id| format!("user{id}")),
            report_date: Utc::now(),
            updated_date: Utc::now(),
        }
    }

    #[test]
    fn account_management_roles() {
        assert!(can_view_users(&user(1, Role::Developer, true)));
        assert!(can_view_users(&user(1, Role::Manager, false)));
        assert!(can_view_users(&user(1, Role::TeamLead, false)));
        assert!(!can_view_users(&user(1, Role::Developer, false)));
        assert!(!can_view_users(&user(1, Role::Customer, false)));
        assert!(!can_modify_users(&user(1, Role::Manager, false)));
        assert!(can_modify_users(&user(1, Role::Tester, true)));
    }

    #[test]
    fn profile_rules() {
        let dev = user(5, Role::Developer, false);
        let other = user(6, Role::Tester, false);
        assert!(can_view_profile(&dev, 5));
        assert!(can_modify_profile(&dev, &dev));
        assert!(!can_view_profile(&dev, 6));
        assert!(!can_modify_profile(&dev, &other));

        let lead = user(7, Role::TeamLead, false);
        assert!(can_view_profile(&lead, 6));
        assert!(!can_modify_profile(&lead, &other));
        let manager = user(8, Role::Manager, false);
        assert!(can_modify_profile(&manager, &other));
        assert!(!can_set_staff(&manager));
    }

    #[test]
    fn staff_accounts_are_out_of_manager_reach() {
        let manager = user(8, Role::Manager, false);
        let admin = user(1, Role::Manager, true);
        assert!(!can_modify_profile(&manager, &admin));
        assert!(!can_change_role(&manager, &admin));
        assert!(can_modify_profile(&admin, &manager));
        assert!(can_change_role(&admin, &manager));
        assert!(can_change_role(&admin, &admin));
    }

    #[test]
    fn nobody_but_staff_changes_their_own_role() {
        let dev = user(5, Role::Developer, false);
        let manager = user(8, Role::Manager, false);
        assert!(!can_change_role(&dev, &dev));
        assert!(!can_change_role(&manager, &manager));
        assert!(can_change_role(&manager, &dev));
        assert!(!can_change_role(&user(7, Role::TeamLead, false), &dev));
    }

    #[test]
    fn project_access() {
        let owner = user(2, Role::Developer, false);
        let member = user(3, Role::Tester, false);
        let outsider = user(4, Role::Developer, false);
        let project = project(2);
        assert!(can_access_project(&owner, &project, false));
        assert!(can_access_project(&member, &project, true));
        assert!(!can_access_project(&outsider, &project, false));
        assert!(can_access_project(&user(9, Role::Manager, false), &project, false));
        assert!(!can_manage_projects(&owner));
        assert!(can_manage_departments(&user(9, Role::Manager, false)));
    }

    #[test]
    fn bug_access() {
        let creator = user(1, Role::Tester, false);
        let assignee = user(2, Role::Developer, false);
        let outsider = user(3, Role::Manager, false);
        let admin = user(4, Role::Customer, true);
        let bug = bug(1, Some(2));

        assert!(can_view_bug(&creator, &bug));
        assert!(can_view_bug(&assignee, &bug));
        assert!(!can_view_bug(&outsider, &bug));
        assert!(can_view_bug(&admin, &bug));

        assert!(can_modify_bug(&creator, &bug));
        assert!(!can_modify_bug(&assignee, &bug));
        assert!(can_modify_bug(&admin, &bug));

        assert!(!can_delete_bug(&creator));
        assert!(can_delete_bug(&admin));
        assert!(!sees_all_bugs(&outsider));
    }
}
