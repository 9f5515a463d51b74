//! Permission names used by the core (§4.5). The Oracle does not model
//! inheritance — that lives entirely in the external relation store — it
//! only needs to pass the right name and resource id.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // Project-scoped
    CreateResources,
    ViewProject,
    ManageProject,
    ManageEnvironments,
    ManageQuotas,
    // VM-scoped
    Read,
    Update,
    Delete,
    Start,
    Stop,
    Restart,
    Pause,
    Resume,
    ViewConsole,
    // Organization/OU-scoped
    ManageOrganization,
    ViewOrganization,
    CreateOu,
    ManageMembers,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreateResources => "create_resources",
            Permission::ViewProject => "view_project",
            Permission::ManageProject => "manage_project",
            Permission::ManageEnvironments => "manage_environments",
            Permission::ManageQuotas => "manage_quotas",
            Permission::Read => "read",
            Permission::Update => "update",
            Permission::Delete => "delete",
            Permission::Start => "start",
            Permission::Stop => "stop",
            Permission::Restart => "restart",
            Permission::Pause => "pause",
            Permission::Resume => "resume",
            Permission::ViewConsole => "view_console",
            Permission::ManageOrganization => "manage_organization",
            Permission::ViewOrganization => "view_organization",
            Permission::CreateOu => "create_ou",
            Permission::ManageMembers => "manage_members",
        }
    }
}
