//! # Permission Resolver
//!
//! Maps a user (type name + admin flag) to a [`PermissionSet`]. The mapping
//! is a policy table keyed by [`UserType`], so the grants for each type can
//! be read, replaced and tested in one place.
//!
//! Resolution never fails: an unrecognised type yields only the baseline
//! (`view_profile`, `edit_profile`). The admin flag adds the administrative
//! grants on top of whatever the type provides.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

// ── Permission ──────────────────────────────────────────────────────────────

/// A single capability token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    /// See one's own profile.
    ViewProfile,
    /// Change one's own profile.
    EditProfile,
    /// Administrative console access.
    AdminAccess,
    /// Create and manage users.
    ManageUsers,
    /// Read the audit trail.
    ViewAuditLogs,
    /// Read and change system settings.
    ManageSystemSettings,
    /// See every taxpayer account.
    ViewAllAccounts,
    /// File returns for individual accounts.
    FileIndividualReturns,
    /// See individual accounts.
    ViewIndividualAccounts,
    /// File returns for business accounts.
    FileBusinessReturns,
    /// See business accounts.
    ViewBusinessAccounts,
    /// Act on behalf of client accounts.
    ManageClientAccounts,
    /// Process filed returns and payments.
    ProcessReturns,
    /// Manage tax accounts.
    ManageTaxAccounts,
    /// Decide refund requests.
    ProcessRefunds,
    /// Decide objections.
    HandleObjections,
    /// Generate reports.
    ViewReports,
    /// See aggregate statistics.
    ViewStatistics,
}

impl Permission {
    /// Every permission.
    pub const ALL: &'static [Permission] = &[
        Self::ViewProfile,
        Self::EditProfile,
        Self::AdminAccess,
        Self::ManageUsers,
        Self::ViewAuditLogs,
        Self::ManageSystemSettings,
        Self::ViewAllAccounts,
        Self::FileIndividualReturns,
        Self::ViewIndividualAccounts,
        Self::FileBusinessReturns,
        Self::ViewBusinessAccounts,
        Self::ManageClientAccounts,
        Self::ProcessReturns,
        Self::ManageTaxAccounts,
        Self::ProcessRefunds,
        Self::HandleObjections,
        Self::ViewReports,
        Self::ViewStatistics,
    ];

    /// The token string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewProfile => "view_profile",
            Self::EditProfile => "edit_profile",
            Self::AdminAccess => "admin_access",
            Self::ManageUsers => "manage_users",
            Self::ViewAuditLogs => "view_audit_logs",
            Self::ManageSystemSettings => "manage_system_settings",
            Self::ViewAllAccounts => "view_all_accounts",
            Self::FileIndividualReturns => "file_individual_returns",
            Self::ViewIndividualAccounts => "view_individual_accounts",
            Self::FileBusinessReturns => "file_business_returns",
            Self::ViewBusinessAccounts => "view_business_accounts",
            Self::ManageClientAccounts => "manage_client_accounts",
            Self::ProcessReturns => "process_returns",
            Self::ManageTaxAccounts => "manage_tax_accounts",
            Self::ProcessRefunds => "process_refunds",
            Self::HandleObjections => "handle_objections",
            Self::ViewReports => "view_reports",
            Self::ViewStatistics => "view_statistics",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownLabel {
                kind: "permission",
                value: s.to_string(),
            })
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Granted to every user.
pub const BASELINE: &[Permission] = &[Permission::ViewProfile, Permission::EditProfile];

/// Added for users with the admin flag.
pub const ADMINISTRATIVE: &[Permission] = &[
    Permission::AdminAccess,
    Permission::ManageUsers,
    Permission::ViewAuditLogs,
    Permission::ManageSystemSettings,
    Permission::ViewAllAccounts,
];

// ── PermissionSet ───────────────────────────────────────────────────────────

/// An ordered set of permissions. Serializes as a sorted list of tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// The empty set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Whether the permission is granted.
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Whether any of the given permissions is granted.
    pub fn contains_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.0.contains(p))
    }

    /// Grant one permission.
    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    /// Number of distinct permissions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in token order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Permission> for PermissionSet {
    fn extend<I: IntoIterator<Item = Permission>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

// ── UserType ────────────────────────────────────────────────────────────────

/// The named user types known to the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserType {
    /// Individual taxpayer.
    Individual,
    /// Business or organization.
    NonIndividual,
    /// Tax agent or representative.
    Agent,
    /// System administrator.
    Administrator,
    /// Revenue authority staff.
    Internal,
    /// Other government bodies.
    Government,
}

impl UserType {
    /// Every user type, in seeding order.
    pub const ALL: &'static [UserType] = &[
        Self::Individual,
        Self::NonIndividual,
        Self::Agent,
        Self::Administrator,
        Self::Internal,
        Self::Government,
    ];

    /// The stored type name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Individual => "Individual",
            Self::NonIndividual => "Non-Individual",
            Self::Agent => "Agent",
            Self::Administrator => "Administrator",
            Self::Internal => "Internal",
            Self::Government => "Government",
        }
    }

    /// Seeded description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Individual => "Individual taxpayer",
            Self::NonIndividual => "Business or organization",
            Self::Agent => "Tax agent or representative",
            Self::Administrator => "System administrator",
            Self::Internal => "Revenue authority staff",
            Self::Government => "Government agency",
        }
    }

    /// Look a type up by its stored name. Exact match.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Policy ──────────────────────────────────────────────────────────────────

/// Lookup table from user type to the permissions that type grants.
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    by_type: HashMap<UserType, Vec<Permission>>,
}

impl PermissionPolicy {
    /// The standard grants of the back office.
    pub fn standard() -> Self {
        use Permission::*;
        let mut by_type = HashMap::new();
        by_type.insert(
            UserType::Individual,
            vec![FileIndividualReturns, ViewIndividualAccounts],
        );
        by_type.insert(
            UserType::NonIndividual,
            vec![FileBusinessReturns, ViewBusinessAccounts],
        );
        by_type.insert(
            UserType::Agent,
            vec![
                FileIndividualReturns,
                FileBusinessReturns,
                ViewIndividualAccounts,
                ViewBusinessAccounts,
                ManageClientAccounts,
            ],
        );
        by_type.insert(
            UserType::Internal,
            vec![
                ProcessReturns,
                ViewAllAccounts,
                ManageTaxAccounts,
                ProcessRefunds,
                HandleObjections,
            ],
        );
        by_type.insert(UserType::Government, vec![ViewReports, ViewStatistics]);
        Self { by_type }
    }

    /// An empty table: every user gets the baseline (plus admin grants).
    pub fn empty() -> Self {
        Self {
            by_type: HashMap::new(),
        }
    }

    /// Replace the grants for one type.
    pub fn with_grants(mut self, user_type: UserType, grants: Vec<Permission>) -> Self {
        self.by_type.insert(user_type, grants);
        self
    }

    /// The grants configured for a type, without baseline or admin grants.
    pub fn grants_for(&self, user_type: UserType) -> &[Permission] {
        self.by_type
            .get(&user_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve the full permission set of a user.
    ///
    /// `type_name` is the stored user-type name; unknown or absent names
    /// contribute nothing beyond the baseline.
    pub fn resolve(&self, type_name: Option<&str>, is_admin: bool) -> PermissionSet {
        let mut set: PermissionSet = BASELINE.iter().copied().collect();
        if is_admin {
            set.extend(ADMINISTRATIVE.iter().copied());
        }
        if let Some(user_type) = type_name.and_then(UserType::from_name) {
            set.extend(self.grants_for(user_type).iter().copied());
        }
        set
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::standard()
    }
}
