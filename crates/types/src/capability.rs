use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::{AgentId, GrantId, TypesError};

/// What an agent may do
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityType {
    FileRead,
    FileWrite,
    NetworkAccess,
    CodeExecution,
    DatabaseQuery,
    DatabaseWrite,
    BrowserAutomation,
    CredentialAccess,
}

impl CapabilityType {
    pub const ALL: [CapabilityType; 8] = [
        Self::FileRead,
        Self::FileWrite,
        Self::NetworkAccess,
        Self::CodeExecution,
        Self::DatabaseQuery,
        Self::DatabaseWrite,
        Self::BrowserAutomation,
        Self::CredentialAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileRead => "file_read",
            Self::FileWrite => "file_write",
            Self::NetworkAccess => "network_access",
            Self::CodeExecution => "code_execution",
            Self::DatabaseQuery => "database_query",
            Self::DatabaseWrite => "database_write",
            Self::BrowserAutomation => "browser_automation",
            Self::CredentialAccess => "credential_access",
        }
    }

    /// The only scope kind a grant of this type may carry
    pub fn scope_kind(&self) -> ScopeKind {
        match self {
            Self::FileRead | Self::FileWrite => ScopeKind::FileSystem,
            Self::NetworkAccess => ScopeKind::Network,
            Self::CodeExecution => ScopeKind::CodeExecution,
            Self::DatabaseQuery | Self::DatabaseWrite => ScopeKind::Database,
            Self::BrowserAutomation => ScopeKind::Browser,
            Self::CredentialAccess => ScopeKind::Credential,
        }
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityType {
    type Err = TypesError;

    fn from_str(s: &str) -> crate::Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace([':', '-', '.'], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| TypesError::UnknownCapabilityType(s.to_string()))
    }
}

/// Discriminant of [`CapabilityScope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    FileSystem,
    Network,
    CodeExecution,
    Database,
    Browser,
    Credential,
}

/// Scope constraints of a grant, one strongly typed variant per kind.
///
/// An empty allow-list leaves that dimension unrestricted. Forbidden
/// entries always win over allowed entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapabilityScope {
    FileSystem(FileSystemScope),
    Network(NetworkScope),
    CodeExecution(CodeExecutionScope),
    Database(DatabaseScope),
    Browser(BrowserScope),
    Credential(CredentialScope),
}

impl CapabilityScope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::FileSystem(_) => ScopeKind::FileSystem,
            Self::Network(_) => ScopeKind::Network,
            Self::CodeExecution(_) => ScopeKind::CodeExecution,
            Self::Database(_) => ScopeKind::Database,
            Self::Browser(_) => ScopeKind::Browser,
            Self::Credential(_) => ScopeKind::Credential,
        }
    }

    /// A scope of the given kind with no restrictions
    pub fn unrestricted(kind: ScopeKind) -> Self {
        match kind {
            ScopeKind::FileSystem => Self::FileSystem(FileSystemScope::default()),
            ScopeKind::Network => Self::Network(NetworkScope::default()),
            ScopeKind::CodeExecution => Self::CodeExecution(CodeExecutionScope::default()),
            ScopeKind::Database => Self::Database(DatabaseScope::default()),
            ScopeKind::Browser => Self::Browser(BrowserScope::default()),
            ScopeKind::Credential => Self::Credential(CredentialScope::default()),
        }
    }

    /// Every allow/deny pattern of the scope, for validation
    pub fn patterns(&self) -> impl Iterator<Item = &String> {
        let (allowed, forbidden) = match self {
            Self::FileSystem(s) => (&s.allowed_paths, &s.forbidden_paths),
            Self::Network(s) => (&s.allowed_domains, &s.forbidden_domains),
            Self::CodeExecution(s) => (&s.allowed_languages, &s.forbidden_languages),
            Self::Database(s) => (&s.allowed_tables, &s.forbidden_tables),
            Self::Browser(s) => (&s.allowed_domains, &s.forbidden_domains),
            Self::Credential(s) => (&s.allowed_secrets, &s.forbidden_secrets),
        };
        allowed.iter().chain(forbidden.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemScope {
    /// Glob patterns, e.g. `/tmp/*`
    #[serde(default, alias = "allowedPaths")]
    pub allowed_paths: Vec<String>,
    #[serde(default, alias = "forbiddenPaths")]
    pub forbidden_paths: Vec<String>,
    /// Bytes
    #[serde(default, alias = "maxFileSize", skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkScope {
    /// Host patterns, e.g. `api.example.com` or `*.example.com`
    #[serde(default, alias = "allowedDomains")]
    pub allowed_domains: Vec<String>,
    #[serde(default, alias = "forbiddenDomains")]
    pub forbidden_domains: Vec<String>,
    #[serde(default, alias = "allowedPorts")]
    pub allowed_ports: Vec<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExecutionScope {
    #[serde(default, alias = "allowedLanguages")]
    pub allowed_languages: Vec<String>,
    #[serde(default, alias = "forbiddenLanguages")]
    pub forbidden_languages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseScope {
    #[serde(default, alias = "allowedTables")]
    pub allowed_tables: Vec<String>,
    #[serde(default, alias = "forbiddenTables")]
    pub forbidden_tables: Vec<String>,
    #[serde(default, alias = "maxResultRows", skip_serializing_if = "Option::is_none")]
    pub max_result_rows: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserScope {
    #[serde(default, alias = "allowedDomains")]
    pub allowed_domains: Vec<String>,
    #[serde(default, alias = "forbiddenDomains")]
    pub forbidden_domains: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialScope {
    /// Secret name patterns
    #[serde(default, alias = "allowedSecrets")]
    pub allowed_secrets: Vec<String>,
    #[serde(default, alias = "forbiddenSecrets")]
    pub forbidden_secrets: Vec<String>,
}

/// Sliding-window rate limits. `None` means no limit for that window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    #[serde(default, alias = "maxPerMinute", skip_serializing_if = "Option::is_none")]
    pub max_per_minute: Option<u32>,
    #[serde(default, alias = "maxPerHour", skip_serializing_if = "Option::is_none")]
    pub max_per_hour: Option<u32>,
}

impl RateLimits {
    pub fn per_minute(max: u32) -> Self {
        Self {
            max_per_minute: Some(max),
            max_per_hour: None,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_per_minute.is_none() && self.max_per_hour.is_none()
    }
}

/// Hours of the day, `start` inclusive and `end` exclusive.
/// `start > end` wraps past midnight (22..6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: u8,
    pub end: u8,
}

impl HourRange {
    pub fn contains(&self, hour: u32) -> bool {
        let (start, end) = (u32::from(self.start), u32::from(self.end));
        if start <= end {
            (start..end).contains(&hour)
        } else {
            hour >= start || hour < end
        }
    }
}

/// Temporal constraints of a grant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, alias = "allowedHours", skip_serializing_if = "Option::is_none")]
    pub allowed_hours: Option<HourRange>,
    /// Empty means every day
    #[serde(default, alias = "allowedDays")]
    pub allowed_days: Vec<Weekday>,
    /// Offset of the wall clock the hours and days refer to
    #[serde(default, alias = "utcOffsetMinutes")]
    pub utc_offset_minutes: i32,
}

impl Schedule {
    /// Whether the schedule admits the instant `at`
    pub fn admits(&self, at: DateTime<Utc>) -> bool {
        let local = FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .map(|offset| at.with_timezone(&offset).naive_local())
            .unwrap_or_else(|| at.naive_utc());

        let hour_ok = self
            .allowed_hours
            .map_or(true, |range| range.contains(local.hour()));
        let day_ok = self.allowed_days.is_empty() || self.allowed_days.contains(&local.weekday());

        hour_ok && day_ok
    }
}

/// Everything needed to grant a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    #[serde(rename = "type", alias = "capability_type")]
    pub capability_type: CapabilityType,
    /// `None` grants the capability type without scope restrictions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<CapabilityScope>,
    #[serde(default)]
    pub limits: RateLimits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    /// Minimum trust score (0-100) the agent must hold for this grant to apply
    #[serde(default, alias = "minTrustScore", skip_serializing_if = "Option::is_none")]
    pub min_trust_score: Option<f64>,
}

impl CapabilitySpec {
    pub fn new(capability_type: CapabilityType) -> Self {
        Self {
            capability_type,
            scope: None,
            limits: RateLimits::default(),
            schedule: None,
            min_trust_score: None,
        }
    }

    pub fn with_scope(mut self, scope: CapabilityScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_limits(mut self, limits: RateLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_min_trust_score(mut self, score: f64) -> Self {
        self.min_trust_score = Some(score);
        self
    }

    /// The effective scope, unrestricted when none was given
    pub fn effective_scope(&self) -> CapabilityScope {
        self.scope
            .clone()
            .unwrap_or_else(|| CapabilityScope::unrestricted(self.capability_type.scope_kind()))
    }
}

/// A capability granted to one agent. Revocation is logical only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityGrant {
    pub id: GrantId,
    pub agent_id: AgentId,
    #[serde(flatten)]
    pub spec: CapabilitySpec,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl CapabilityGrant {
    pub fn capability_type(&self) -> CapabilityType {
        self.spec.capability_type
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Whether the schedule (if any) admits `at`
    pub fn in_window(&self, at: DateTime<Utc>) -> bool {
        self.spec.schedule.as_ref().map_or(true, |s| s.admits(at))
    }

    /// Active means not revoked and inside the temporal constraints
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        !self.is_revoked() && self.in_window(at)
    }
}
