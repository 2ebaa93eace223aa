//! Registry of the external SaaS platforms the console can connect to.
//!
//! Every platform is described by a static [`PlatformSpec`]: display data, the
//! backend route prefix, the auth methods it offers (each with its credential
//! field schema), its OAuth scope catalogue and the resources a disconnect has
//! to clean up when the backend has no comprehensive disconnect endpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validate::FieldKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformId {
    Aws,
    Github,
    Slack,
    Zoom,
    GoogleWorkspace,
    Office365,
}

impl PlatformId {
    pub const ALL: [PlatformId; 6] = [
        PlatformId::Aws,
        PlatformId::Github,
        PlatformId::Slack,
        PlatformId::Zoom,
        PlatformId::GoogleWorkspace,
        PlatformId::Office365,
    ];

    pub const fn slug(self) -> &'static str {
        match self {
            PlatformId::Aws => "aws",
            PlatformId::Github => "github",
            PlatformId::Slack => "slack",
            PlatformId::Zoom => "zoom",
            PlatformId::GoogleWorkspace => "google-workspace",
            PlatformId::Office365 => "office365",
        }
    }

    pub fn spec(self) -> &'static PlatformSpec {
        match self {
            PlatformId::Aws => &AWS,
            PlatformId::Github => &GITHUB,
            PlatformId::Slack => &SLACK,
            PlatformId::Zoom => &ZOOM,
            PlatformId::GoogleWorkspace => &GOOGLE_WORKSPACE,
            PlatformId::Office365 => &OFFICE_365,
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for PlatformId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" | "amazon" => Ok(PlatformId::Aws),
            "github" | "gh" => Ok(PlatformId::Github),
            "slack" => Ok(PlatformId::Slack),
            "zoom" => Ok(PlatformId::Zoom),
            "google-workspace" | "google_workspace" | "google" | "gws" => {
                Ok(PlatformId::GoogleWorkspace)
            }
            "office365" | "office-365" | "o365" | "microsoft365" => Ok(PlatformId::Office365),
            other => Err(format!(
                "unknown platform: {other} (expected aws|github|slack|zoom|google-workspace|office365)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    OAuth,
    AccessKeys,
    CrossAccountRole,
    Sso,
    PersonalAccessToken,
    BotToken,
    ServerToServer,
    ServiceAccount,
}

impl AuthMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            AuthMethod::OAuth => "oauth",
            AuthMethod::AccessKeys => "access_keys",
            AuthMethod::CrossAccountRole => "cross_account_role",
            AuthMethod::Sso => "sso",
            AuthMethod::PersonalAccessToken => "personal_access_token",
            AuthMethod::BotToken => "bot_token",
            AuthMethod::ServerToServer => "server_to_server",
            AuthMethod::ServiceAccount => "service_account",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            AuthMethod::OAuth => "OAuth",
            AuthMethod::AccessKeys => "Access keys",
            AuthMethod::CrossAccountRole => "Cross-account role",
            AuthMethod::Sso => "SSO (IAM Identity Center)",
            AuthMethod::PersonalAccessToken => "Personal access token",
            AuthMethod::BotToken => "Bot token",
            AuthMethod::ServerToServer => "Server-to-server OAuth app",
            AuthMethod::ServiceAccount => "Service account",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "oauth" => Ok(AuthMethod::OAuth),
            "access_keys" | "keys" => Ok(AuthMethod::AccessKeys),
            "cross_account_role" | "role" => Ok(AuthMethod::CrossAccountRole),
            "sso" => Ok(AuthMethod::Sso),
            "personal_access_token" | "pat" | "token" => Ok(AuthMethod::PersonalAccessToken),
            "bot_token" | "bot" => Ok(AuthMethod::BotToken),
            "server_to_server" | "s2s" => Ok(AuthMethod::ServerToServer),
            "service_account" => Ok(AuthMethod::ServiceAccount),
            other => Err(format!("unknown auth method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    ComingSoon,
}

#[derive(Debug, Clone, Copy)]
pub struct CredentialField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub secret: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct AuthOption {
    pub method: AuthMethod,
    pub fields: &'static [CredentialField],
}

#[derive(Debug, Clone, Copy)]
pub struct OAuthScope {
    pub name: &'static str,
    pub description: &'static str,
    pub default: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum ResourceCleanup {
    /// A single DELETE on a fixed path.
    Single { path: &'static str },
    /// GET `list_path`, then DELETE `item_path` with `{id}` replaced for every record.
    Each {
        list_path: &'static str,
        item_path: &'static str,
    },
}

/// Something a connection owns on the backend and that must be removed when
/// the comprehensive disconnect endpoint is missing.
#[derive(Debug, Clone, Copy)]
pub struct OwnedResource {
    pub name: &'static str,
    pub cleanup: ResourceCleanup,
    pub optional: bool,
}

#[derive(Debug)]
pub struct PlatformSpec {
    pub id: PlatformId,
    pub display_name: &'static str,
    pub icon: &'static str,
    pub availability: Availability,
    pub route_prefix: &'static str,
    /// Noun used for the connection collection route (`accounts`, `connections`).
    pub collection: &'static str,
    /// Singular noun for prompts ("account", "workspace", ...).
    pub noun: &'static str,
    pub auth_options: &'static [AuthOption],
    pub oauth_scopes: &'static [OAuthScope],
    pub owned_resources: &'static [OwnedResource],
}

impl PlatformSpec {
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }

    pub fn auth_option(&self, method: AuthMethod) -> Option<&'static AuthOption> {
        self.auth_options.iter().find(|o| o.method == method)
    }

    pub fn supports(&self, method: AuthMethod) -> bool {
        self.auth_option(method).is_some()
    }

    pub fn default_scopes(&self) -> Vec<&'static str> {
        self.oauth_scopes
            .iter()
            .filter(|s| s.default)
            .map(|s| s.name)
            .collect()
    }

    pub fn overview_path(&self) -> String {
        format!("{}/overview", self.route_prefix)
    }

    pub fn collection_path(&self) -> String {
        format!("{}/{}", self.route_prefix, self.collection)
    }

    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}/{}", self.route_prefix, self.collection, id)
    }

    pub fn test_path(&self, id: &str) -> String {
        format!("{}/test", self.item_path(id))
    }

    pub fn sync_path(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/sync", self.item_path(id)),
            None => format!("{}/sync", self.route_prefix),
        }
    }

    pub fn oauth_initiate_path(&self) -> String {
        format!("{}/oauth/initiate", self.route_prefix)
    }

    pub fn disconnect_path(&self) -> String {
        format!("{}/disconnect", self.route_prefix)
    }
}

pub fn all() -> impl Iterator<Item = &'static PlatformSpec> {
    PlatformId::ALL.into_iter().map(PlatformId::spec)
}

const fn field(
    key: &'static str,
    label: &'static str,
    kind: FieldKind,
    required: bool,
    secret: bool,
) -> CredentialField {
    CredentialField {
        key,
        label,
        kind,
        required,
        secret,
    }
}

const fn scope(name: &'static str, description: &'static str, default: bool) -> OAuthScope {
    OAuthScope {
        name,
        description,
        default,
    }
}

static AWS: PlatformSpec = PlatformSpec {
    id: PlatformId::Aws,
    display_name: "AWS",
    icon: "☁",
    availability: Availability::Available,
    route_prefix: "/aws",
    collection: "accounts",
    noun: "account",
    auth_options: &[
        AuthOption {
            method: AuthMethod::AccessKeys,
            fields: &[
                field("account_id", "Account ID", FieldKind::AwsAccountId, true, false),
                field("access_key_id", "Access Key ID", FieldKind::AwsAccessKeyId, true, false),
                field(
                    "secret_access_key",
                    "Secret Access Key",
                    FieldKind::AwsSecretAccessKey,
                    true,
                    true,
                ),
                field("region", "Region", FieldKind::AwsRegion, false, false),
            ],
        },
        AuthOption {
            method: AuthMethod::CrossAccountRole,
            fields: &[
                field("account_id", "Account ID", FieldKind::AwsAccountId, true, false),
                field("role_arn", "Role ARN", FieldKind::AwsRoleArn, true, false),
                field("external_id", "External ID", FieldKind::AwsExternalId, false, true),
                field("region", "Region", FieldKind::AwsRegion, false, false),
            ],
        },
        AuthOption {
            method: AuthMethod::Sso,
            fields: &[
                field("account_id", "Account ID", FieldKind::AwsAccountId, true, false),
                field("sso_start_url", "SSO start URL", FieldKind::HttpsUrl, true, false),
                field("sso_region", "SSO region", FieldKind::AwsRegion, true, false),
                field("role_name", "Permission set role", FieldKind::Text, true, false),
            ],
        },
    ],
    oauth_scopes: &[],
    owned_resources: &[
        OwnedResource {
            name: "credentials",
            cleanup: ResourceCleanup::Single {
                path: "/aws/credentials",
            },
            optional: true,
        },
        OwnedResource {
            name: "accounts",
            cleanup: ResourceCleanup::Each {
                list_path: "/aws/accounts",
                item_path: "/aws/accounts/{id}",
            },
            optional: false,
        },
    ],
};

static GITHUB: PlatformSpec = PlatformSpec {
    id: PlatformId::Github,
    display_name: "GitHub",
    icon: "⎇",
    availability: Availability::Available,
    route_prefix: "/github",
    collection: "connections",
    noun: "organization",
    auth_options: &[
        AuthOption {
            method: AuthMethod::OAuth,
            fields: &[],
        },
        AuthOption {
            method: AuthMethod::PersonalAccessToken,
            fields: &[
                field("token", "Personal access token", FieldKind::GithubToken, true, true),
                field("organization", "Organization", FieldKind::GithubOrg, true, false),
            ],
        },
    ],
    oauth_scopes: &[
        scope("read:org", "Read organization membership and teams", true),
        scope("read:user", "Read user profile data", true),
        scope("user:email", "Read user email addresses", true),
        scope("repo", "Full access to private repositories", false),
        scope("admin:org", "Manage organization members and settings", false),
        scope("security_events", "Read code scanning and security alerts", false),
    ],
    owned_resources: &[
        OwnedResource {
            name: "credentials",
            cleanup: ResourceCleanup::Single {
                path: "/github/credentials",
            },
            optional: true,
        },
        OwnedResource {
            name: "oauth token",
            cleanup: ResourceCleanup::Single {
                path: "/github/oauth/token",
            },
            optional: true,
        },
        OwnedResource {
            name: "connections",
            cleanup: ResourceCleanup::Each {
                list_path: "/github/connections",
                item_path: "/github/connections/{id}",
            },
            optional: false,
        },
    ],
};

static SLACK: PlatformSpec = PlatformSpec {
    id: PlatformId::Slack,
    display_name: "Slack",
    icon: "#",
    availability: Availability::Available,
    route_prefix: "/slack",
    collection: "connections",
    noun: "workspace",
    auth_options: &[
        AuthOption {
            method: AuthMethod::OAuth,
            fields: &[],
        },
        AuthOption {
            method: AuthMethod::BotToken,
            fields: &[field("bot_token", "Bot token", FieldKind::SlackBotToken, true, true)],
        },
    ],
    oauth_scopes: &[
        scope("users:read", "View people in the workspace", true),
        scope("users:read.email", "View email addresses of people", true),
        scope("team:read", "View workspace name and domain", true),
        scope("channels:read", "View basic channel information", false),
        scope("admin", "Administer the workspace (Enterprise Grid)", false),
    ],
    owned_resources: &[
        OwnedResource {
            name: "credentials",
            cleanup: ResourceCleanup::Single {
                path: "/slack/credentials",
            },
            optional: true,
        },
        OwnedResource {
            name: "connections",
            cleanup: ResourceCleanup::Each {
                list_path: "/slack/connections",
                item_path: "/slack/connections/{id}",
            },
            optional: false,
        },
    ],
};

static ZOOM: PlatformSpec = PlatformSpec {
    id: PlatformId::Zoom,
    display_name: "Zoom",
    icon: "▶",
    availability: Availability::Available,
    route_prefix: "/zoom",
    collection: "accounts",
    noun: "account",
    auth_options: &[
        AuthOption {
            method: AuthMethod::OAuth,
            fields: &[],
        },
        AuthOption {
            method: AuthMethod::ServerToServer,
            fields: &[
                field("account_id", "Zoom account ID", FieldKind::Text, true, false),
                field("client_id", "Client ID", FieldKind::Text, true, false),
                field("client_secret", "Client secret", FieldKind::Text, true, true),
            ],
        },
    ],
    oauth_scopes: &[
        scope("user:read:admin", "View all users", true),
        scope("account:read:admin", "View account settings", true),
        scope("report:read:admin", "View usage reports", false),
        scope("billing:read:admin", "View billing information", false),
    ],
    owned_resources: &[
        OwnedResource {
            name: "credentials",
            cleanup: ResourceCleanup::Single {
                path: "/zoom/credentials",
            },
            optional: true,
        },
        OwnedResource {
            name: "accounts",
            cleanup: ResourceCleanup::Each {
                list_path: "/zoom/accounts",
                item_path: "/zoom/accounts/{id}",
            },
            optional: false,
        },
    ],
};

static GOOGLE_WORKSPACE: PlatformSpec = PlatformSpec {
    id: PlatformId::GoogleWorkspace,
    display_name: "Google Workspace",
    icon: "G",
    availability: Availability::Available,
    route_prefix: "/google-workspace",
    collection: "connections",
    noun: "domain",
    auth_options: &[
        AuthOption {
            method: AuthMethod::OAuth,
            fields: &[],
        },
        AuthOption {
            method: AuthMethod::ServiceAccount,
            fields: &[
                field(
                    "service_account_json",
                    "Service account key (JSON)",
                    FieldKind::ServiceAccountJson,
                    true,
                    true,
                ),
                field("admin_email", "Delegated admin email", FieldKind::Email, true, false),
                field("domain", "Primary domain", FieldKind::Domain, true, false),
            ],
        },
    ],
    oauth_scopes: &[
        scope(
            "https://www.googleapis.com/auth/admin.directory.user.readonly",
            "Read directory users",
            true,
        ),
        scope(
            "https://www.googleapis.com/auth/admin.directory.group.readonly",
            "Read directory groups",
            true,
        ),
        scope(
            "https://www.googleapis.com/auth/admin.reports.audit.readonly",
            "Read audit reports",
            false,
        ),
        scope(
            "https://www.googleapis.com/auth/apps.licensing",
            "Read license assignments",
            false,
        ),
    ],
    owned_resources: &[
        OwnedResource {
            name: "credentials",
            cleanup: ResourceCleanup::Single {
                path: "/google-workspace/credentials",
            },
            optional: true,
        },
        OwnedResource {
            name: "connections",
            cleanup: ResourceCleanup::Each {
                list_path: "/google-workspace/connections",
                item_path: "/google-workspace/connections/{id}",
            },
            optional: false,
        },
    ],
};

static OFFICE_365: PlatformSpec = PlatformSpec {
    id: PlatformId::Office365,
    display_name: "Office 365",
    icon: "O",
    availability: Availability::ComingSoon,
    route_prefix: "/office365",
    collection: "connections",
    noun: "tenant",
    auth_options: &[],
    oauth_scopes: &[],
    owned_resources: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_round_trip_through_from_str() {
        for id in PlatformId::ALL {
            assert_eq!(id.slug().parse::<PlatformId>().unwrap(), id);
            assert_eq!(id.spec().id, id);
        }
    }

    #[test]
    fn routes_follow_prefix_and_collection() {
        let aws = PlatformId::Aws.spec();
        assert_eq!(aws.collection_path(), "/aws/accounts");
        assert_eq!(aws.test_path("7"), "/aws/accounts/7/test");
        assert_eq!(aws.sync_path(None), "/aws/sync");
        assert_eq!(aws.sync_path(Some("7")), "/aws/accounts/7/sync");
        assert_eq!(
            PlatformId::GoogleWorkspace.spec().disconnect_path(),
            "/google-workspace/disconnect"
        );
    }

    #[test]
    fn every_available_platform_offers_an_auth_method_and_cleanup() {
        for spec in all() {
            if spec.is_available() {
                assert!(!spec.auth_options.is_empty(), "{}", spec.display_name);
                assert!(
                    spec.owned_resources.iter().any(|r| !r.optional),
                    "{}",
                    spec.display_name
                );
            } else {
                assert!(spec.auth_options.is_empty());
            }
        }
    }

    #[test]
    fn oauth_platforms_have_default_scopes() {
        for spec in all().filter(|s| s.supports(AuthMethod::OAuth)) {
            assert!(!spec.default_scopes().is_empty(), "{}", spec.display_name);
        }
    }
}
