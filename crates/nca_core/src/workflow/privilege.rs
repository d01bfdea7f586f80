use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named grouping of privileges. The string forms are what the user
/// database stores and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Unrestricted.
    Admin,
    SiteManager,
    TitleManager,
    IssueCurator,
    IssueReviewer,
    IssueManager,
    UserManager,
    MocManager,
    WorkflowManager,
    BatchBuilder,
    BatchReviewer,
    BatchLoader,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 12] = [
        Role::Admin,
        Role::SiteManager,
        Role::TitleManager,
        Role::IssueCurator,
        Role::IssueReviewer,
        Role::IssueManager,
        Role::UserManager,
        Role::MocManager,
        Role::WorkflowManager,
        Role::BatchBuilder,
        Role::BatchReviewer,
        Role::BatchLoader,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "sysop",
            Role::SiteManager => "site manager",
            Role::TitleManager => "title manager",
            Role::IssueCurator => "issue curator",
            Role::IssueReviewer => "issue reviewer",
            Role::IssueManager => "issue manager",
            Role::UserManager => "user manager",
            Role::MocManager => "marc org code manager",
            Role::WorkflowManager => "workflow manager",
            Role::BatchBuilder => "batch builder",
            Role::BatchReviewer => "batch reviewer",
            Role::BatchLoader => "batch loader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    EnterIssueMetadata,
    ReviewIssueMetadata,
    ReviewOwnMetadata,
    ReviewUnfixableIssues,
    ModifyUploadedIssues,
    GenerateBatches,
    FlagLiveIssues,
}

impl Privilege {
    /// Roles granting this privilege, besides `Admin` and `SiteManager`
    /// which hold every privilege.
    pub fn roles(self) -> &'static [Role] {
        match self {
            Privilege::EnterIssueMetadata => &[Role::IssueCurator, Role::IssueManager],
            Privilege::ReviewIssueMetadata => &[Role::IssueReviewer, Role::IssueManager],
            Privilege::ReviewOwnMetadata | Privilege::ReviewUnfixableIssues => {
                &[Role::IssueManager]
            }
            Privilege::ModifyUploadedIssues => &[Role::WorkflowManager],
            Privilege::GenerateBatches => &[Role::BatchBuilder],
            Privilege::FlagLiveIssues => &[Role::BatchReviewer, Role::BatchLoader],
        }
    }

    pub fn allowed_by(self, role: Role) -> bool {
        matches!(role, Role::Admin | Role::SiteManager) || self.roles().contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub roles: Vec<Role>,
}

impl User {
    pub fn new(id: i64, login: impl Into<String>, roles: Vec<Role>) -> Self {
        User {
            id,
            login: login.into(),
            roles,
        }
    }

    pub fn permitted_to(&self, privilege: Privilege) -> bool {
        self.roles.iter().any(|role| privilege.allowed_by(*role))
    }
}
