use std::sync::Arc;

use agentid_types::{
    ActionContext, BrowserScope, CapabilityGrant, CapabilityScope, CapabilitySpec,
    CodeExecutionScope, GrantId, NetworkScope,
};
use dashmap::DashMap;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::warn;
use url::Url;

/// Outcome of checking one grant's scope against a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeMatch {
    /// The grant covers the resource
    Allowed,
    /// The grant does not cover the resource; another grant still might
    NotAllowed(String),
    /// The grant explicitly forbids the resource; no other grant can allow it
    Forbidden(String),
}

impl ScopeMatch {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Evaluate a grant's scope for a resource, compiling its patterns on the
/// spot. The verification path goes through [`ScopeCache`] instead.
pub fn evaluate_scope(
    spec: &CapabilitySpec,
    resource: &str,
    context: &ActionContext,
    trust_score: Option<f64>,
) -> ScopeMatch {
    ScopeMatcher::compile(spec).evaluate(resource, context, trust_score)
}

/// A grant's scope with its glob patterns compiled once.
///
/// Forbidden entries are checked before anything else, so a resource on
/// both lists is always forbidden. A minimum trust score is treated as part
/// of the scope: an unknown or lower score is a forbid. Paths are lexically
/// normalized before either list sees them.
#[derive(Debug, Clone)]
pub struct ScopeMatcher {
    scope: CapabilityScope,
    min_trust_score: Option<f64>,
    allowed: PatternSet,
    forbidden: PatternSet,
}

impl ScopeMatcher {
    pub fn compile(spec: &CapabilitySpec) -> Self {
        let scope = spec.effective_scope();
        let (allowed, forbidden) = match &scope {
            CapabilityScope::FileSystem(s) => (
                PatternSet::compile(&s.allowed_paths, false),
                PatternSet::compile(&s.forbidden_paths, false),
            ),
            CapabilityScope::Database(s) => (
                PatternSet::compile(&s.allowed_tables, true),
                PatternSet::compile(&s.forbidden_tables, true),
            ),
            CapabilityScope::Credential(s) => (
                PatternSet::compile(&s.allowed_secrets, false),
                PatternSet::compile(&s.forbidden_secrets, false),
            ),
            _ => (PatternSet::default(), PatternSet::default()),
        };
        Self {
            scope,
            min_trust_score: spec.min_trust_score,
            allowed,
            forbidden,
        }
    }

    pub fn evaluate(
        &self,
        resource: &str,
        context: &ActionContext,
        trust_score: Option<f64>,
    ) -> ScopeMatch {
        let resource = match self.scope {
            CapabilityScope::FileSystem(_) => normalize_path(resource),
            _ => resource.to_string(),
        };

        if let Some(reason) = self.forbidden(&resource, context) {
            return ScopeMatch::Forbidden(reason);
        }

        if let Some(min) = self.min_trust_score {
            match trust_score {
                None => {
                    return ScopeMatch::Forbidden(format!(
                        "trust score unknown, grant requires at least {min:.2}"
                    ))
                }
                Some(score) if score < min => {
                    return ScopeMatch::Forbidden(format!(
                        "trust score {score:.2} is below required minimum {min:.2}"
                    ))
                }
                Some(_) => {}
            }
        }

        match self.not_allowed(&resource, context) {
            Some(reason) => ScopeMatch::NotAllowed(reason),
            None => ScopeMatch::Allowed,
        }
    }

    fn forbidden(&self, resource: &str, context: &ActionContext) -> Option<String> {
        match &self.scope {
            CapabilityScope::FileSystem(_) => {
                if !self.forbidden.patterns.is_empty() && has_parent_dir(resource) {
                    return Some(format!(
                        "path '{resource}' climbs out of its base and may reach a forbidden path"
                    ));
                }
                self.forbidden
                    .first_forbidding(resource)
                    .map(|p| format!("path '{resource}' matches forbidden pattern '{p}'"))
            }
            CapabilityScope::Network(NetworkScope {
                forbidden_domains, ..
            })
            | CapabilityScope::Browser(BrowserScope {
                forbidden_domains, ..
            }) => {
                let host = Target::parse(resource).host;
                first_domain(forbidden_domains, &host)
                    .map(|p| format!("domain '{host}' matches forbidden domain '{p}'"))
            }
            CapabilityScope::CodeExecution(CodeExecutionScope {
                forbidden_languages,
                ..
            }) => {
                let language = language_of(resource, context);
                first_word(forbidden_languages, &language)
                    .map(|_| format!("language '{language}' is forbidden"))
            }
            CapabilityScope::Database(_) => self
                .forbidden
                .first_forbidding(resource)
                .map(|p| format!("table '{resource}' matches forbidden pattern '{p}'")),
            CapabilityScope::Credential(_) => self
                .forbidden
                .first_forbidding(resource)
                .map(|p| format!("secret '{resource}' matches forbidden pattern '{p}'")),
        }
    }

    fn not_allowed(&self, resource: &str, context: &ActionContext) -> Option<String> {
        match &self.scope {
            CapabilityScope::FileSystem(s) => {
                if !s.allowed_paths.is_empty()
                    && (has_parent_dir(resource) || self.allowed.first_match(resource).is_none())
                {
                    return Some(format!("path '{resource}' is not within allowed paths"));
                }
                match (s.max_file_size, context.file_size) {
                    (Some(max), Some(size)) if size > max => Some(format!(
                        "file size {size} exceeds maximum of {max} bytes"
                    )),
                    _ => None,
                }
            }
            CapabilityScope::Network(s) => {
                let target = Target::parse(resource);
                if !s.allowed_domains.is_empty()
                    && first_domain(&s.allowed_domains, &target.host).is_none()
                {
                    return Some(format!(
                        "domain '{}' is not within allowed domains",
                        target.host
                    ));
                }
                if s.allowed_ports.is_empty() {
                    return None;
                }
                match target.port.or(context.port) {
                    Some(port) if s.allowed_ports.contains(&port) => None,
                    Some(port) => Some(format!("port {port} is not within allowed ports")),
                    None => Some("port unknown and grant restricts ports".to_string()),
                }
            }
            CapabilityScope::Browser(s) => {
                let host = Target::parse(resource).host;
                if !s.allowed_domains.is_empty()
                    && first_domain(&s.allowed_domains, &host).is_none()
                {
                    return Some(format!("domain '{host}' is not within allowed domains"));
                }
                None
            }
            CapabilityScope::CodeExecution(s) => {
                let language = language_of(resource, context);
                if !s.allowed_languages.is_empty()
                    && first_word(&s.allowed_languages, &language).is_none()
                {
                    return Some(format!(
                        "language '{language}' is not within allowed languages"
                    ));
                }
                None
            }
            CapabilityScope::Database(s) => {
                if !s.allowed_tables.is_empty() && self.allowed.first_match(resource).is_none() {
                    return Some(format!("table '{resource}' is not within allowed tables"));
                }
                match (s.max_result_rows, context.result_rows) {
                    (Some(max), Some(rows)) if rows > max => {
                        Some(format!("result rows {rows} exceed maximum of {max}"))
                    }
                    _ => None,
                }
            }
            CapabilityScope::Credential(s) => {
                if !s.allowed_secrets.is_empty() && self.allowed.first_match(resource).is_none() {
                    return Some(format!("secret '{resource}' is not within allowed secrets"));
                }
                None
            }
        }
    }
}

/// Compiled matchers keyed by grant.
///
/// A grant's spec never changes after it is made, so an entry stays valid
/// for the grant's lifetime.
#[derive(Debug, Default)]
pub struct ScopeCache {
    compiled: DashMap<GrantId, Arc<ScopeMatcher>>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matcher(&self, grant: &CapabilityGrant) -> Arc<ScopeMatcher> {
        if let Some(matcher) = self.compiled.get(&grant.id) {
            return matcher.clone();
        }
        self.compiled
            .entry(grant.id)
            .or_insert_with(|| Arc::new(ScopeMatcher::compile(&grant.spec)))
            .clone()
    }

    pub fn evaluate(
        &self,
        grant: &CapabilityGrant,
        resource: &str,
        context: &ActionContext,
        trust_score: Option<f64>,
    ) -> ScopeMatch {
        self.matcher(grant).evaluate(resource, context, trust_score)
    }

    /// Drop the compiled matcher of a revoked grant
    pub fn evict(&self, grant_id: &GrantId) {
        self.compiled.remove(grant_id);
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Glob patterns compiled into one set, remembering which source pattern
/// each index came from so denials can name it.
#[derive(Debug, Clone)]
struct PatternSet {
    patterns: Vec<String>,
    set: GlobSet,
    /// A pattern failed to compile. Deny-lists treat this as match-all.
    broken: bool,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
            broken: false,
        }
    }
}

impl PatternSet {
    fn compile(patterns: &[String], case_insensitive: bool) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());
        let mut broken = false;
        for pattern in patterns {
            match GlobBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
            {
                Ok(glob) => {
                    builder.add(glob);
                    kept.push(pattern.clone());
                }
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "failed to compile scope pattern");
                    broken = true;
                }
            }
        }

        match builder.build() {
            Ok(set) => Self {
                patterns: kept,
                set,
                broken,
            },
            Err(e) => {
                warn!(error = %e, "failed to build scope pattern set");
                Self {
                    patterns: patterns.to_vec(),
                    set: GlobSet::empty(),
                    broken: true,
                }
            }
        }
    }

    /// The lowest-indexed pattern matching `value`
    fn first_match(&self, value: &str) -> Option<&str> {
        self.set
            .matches(value)
            .into_iter()
            .min()
            .and_then(|index| self.patterns.get(index))
            .map(String::as_str)
    }

    /// Like [`Self::first_match`], but a broken set forbids everything
    fn first_forbidding(&self, value: &str) -> Option<&str> {
        if self.broken {
            return Some("<invalid pattern>");
        }
        self.first_match(value)
    }
}

/// Lexically normalize a path: backslashes become `/`, empty and `.`
/// segments are dropped, `..` pops its parent. An absolute path cannot
/// climb above `/`; a relative one keeps its leading `..` segments.
fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let is_absolute = path.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last().copied() {
                Some(last) if last != ".." => {
                    segments.pop();
                }
                _ if is_absolute => {}
                _ => segments.push(segment),
            },
            _ => segments.push(segment),
        }
    }

    match (is_absolute, segments.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", segments.join("/")),
        (false, true) => ".".to_string(),
        (false, false) => segments.join("/"),
    }
}

/// Only a normalized relative path can still contain `..`
fn has_parent_dir(normalized: &str) -> bool {
    normalized.split('/').any(|segment| segment == "..")
}

fn first_domain<'a>(patterns: &'a [String], host: &str) -> Option<&'a str> {
    patterns
        .iter()
        .find(|pattern| domain_matches(pattern, host))
        .map(String::as_str)
}

/// `*` matches any host, `*.example.com` matches strict subdomains only
fn domain_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim().trim_end_matches('.').to_ascii_lowercase();
    if pattern == "*" {
        return true;
    }
    match pattern.strip_prefix("*.") {
        Some(suffix) => host
            .strip_suffix(suffix)
            .is_some_and(|head| head.len() > 1 && head.ends_with('.')),
        None => host == pattern,
    }
}

fn first_word<'a>(words: &'a [String], value: &str) -> Option<&'a str> {
    words
        .iter()
        .find(|word| word.as_str() == "*" || word.eq_ignore_ascii_case(value))
        .map(String::as_str)
}

fn language_of(resource: &str, context: &ActionContext) -> String {
    context
        .language
        .clone()
        .unwrap_or_else(|| resource.to_string())
        .trim()
        .to_ascii_lowercase()
}

/// Host and port of a network resource: a URL, `host:port` or a bare host
struct Target {
    host: String,
    port: Option<u16>,
}

impl Target {
    fn parse(resource: &str) -> Self {
        let resource = resource.trim();
        if resource.contains("://") {
            if let Ok(url) = Url::parse(resource) {
                return Self {
                    host: normalize_host(url.host_str().unwrap_or_default()),
                    port: url.port_or_known_default(),
                };
            }
        }

        match resource.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => match port.parse() {
                Ok(port) => Self {
                    host: normalize_host(host),
                    port: Some(port),
                },
                Err(_) => Self {
                    host: normalize_host(resource),
                    port: None,
                },
            },
            _ => Self {
                host: normalize_host(resource),
                port: None,
            },
        }
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}
