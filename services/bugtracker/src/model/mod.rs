//! Bug tracker data model module.
//!
//! # Purpose
//! Re-exports the user, department, project, and bug records plus the choice
//! enums shared by the API and store layers.

/// Declares a closed set of string choices.
///
/// Each variant maps to its wire value for serde, SQL columns, and error
/// messages. Parsing an unknown value yields the message clients see in
/// field-level validation errors.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
            utoipa::ToSchema,
        )]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!("\"{other}\" is not a valid choice.")),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

mod bug;
mod department;
mod project;
mod user;

pub use bug::{Bug, BugPatch, BugPriority, BugSeverity, BugStatus, BugType, NewBug};
pub use department::{Department, DepartmentPatch, NewDepartment};
pub use project::{
    NewProject, NewProjectUser, Project, ProjectPatch, ProjectStatus, ProjectUser,
};
pub use user::{BlacklistedToken, Dept, NewUser, Role, User, UserPatch};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn choices_round_trip_through_wire_values() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()), Ok(*role));
        }
        assert_eq!(Dept::from_str("mobile_app"), Ok(Dept::MobileApp));
        assert_eq!(BugStatus::from_str("in_progress"), Ok(BugStatus::InProgress));
    }

    #[test]
    fn unknown_choice_reports_value() {
        let err = BugType::from_str("invalid_type").unwrap_err();
        assert_eq!(err, "\"invalid_type\" is not a valid choice.");
    }

    #[test]
    fn choices_serialize_as_wire_values() {
        let value = serde_json::to_value(Role::TeamLead).expect("serialize");
        assert_eq!(value, serde_json::json!("team_lead"));
        let parsed: BugSeverity = serde_json::from_value(serde_json::json!("enhancements"))
            .expect("deserialize");
        assert_eq!(parsed, BugSeverity::Enhancements);
    }
}
