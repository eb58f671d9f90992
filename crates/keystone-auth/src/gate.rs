// Route-level authorization
// Decision: Ordered rule table, first match wins; unmatched routes require authentication
// Decision: The policy is data (YAML), the gate never computes it
// Decision: Role -> authority string mapping lives here and nowhere else

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::path::Path;

use crate::error::AuthError;
use crate::identity::Role;
use crate::middleware::{AuthState, RequestIdentity};

/// Built-in access policy (embedded in binary)
const DEFAULT_POLICY: &str = include_str!("../config/policy.yaml");

/// Prefix of role authorities
pub const AUTHORITY_PREFIX: &str = "ROLE_";

/// Canonical authority for a role, e.g. `ROLE_ADMIN`
pub fn authority(role: Role) -> String {
    format!("{}{}", AUTHORITY_PREFIX, role.as_str())
}

/// What a route requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// No identity needed
    Public,
    /// Any authenticated identity
    Authenticated,
    /// An identity holding one of these roles
    Roles(Vec<Role>),
}

static DEFAULT_ACCESS: Access = Access::Authenticated;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("route pattern must start with '/': {0:?}")]
    NotAbsolute(String),

    #[error("'**' is only allowed as the last segment: {0:?}")]
    MisplacedWildcard(String),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("rule for {0:?} must set exactly one of `access` or `roles`")]
    AmbiguousAccess(String),

    #[error("rule for {0:?} lists no roles")]
    EmptyRoles(String),

    #[error("invalid policy file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*` or `{name}`: exactly one segment
    Single,
    /// `**`: zero or more trailing segments
    Rest,
}

/// Path pattern such as `/api/users/{id}/status` or `/api/admin/**`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        if !raw.starts_with('/') {
            return Err(PolicyError::NotAbsolute(raw.to_string()));
        }

        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = match *part {
                "**" if i + 1 == parts.len() => Segment::Rest,
                "**" => return Err(PolicyError::MisplacedWildcard(raw.to_string())),
                "*" => Segment::Single,
                p if p.starts_with('{') && p.ends_with('}') => Segment::Single,
                p => Segment::Literal(p.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Empty segments in `path` are ignored, so `/a//b/` is `/a/b`
    pub fn matches(&self, path: &str) -> bool {
        let mut parts = path.split('/').filter(|s| !s.is_empty());

        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Single => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(literal) => match parts.next() {
                    Some(part) if part == literal => {}
                    _ => return false,
                },
            }
        }

        parts.next().is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// One row of the access table
#[derive(Debug, Clone)]
pub struct AccessRule {
    /// `None` matches every method
    pub method: Option<Method>,
    pub pattern: RoutePattern,
    pub access: Access,
}

impl AccessRule {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().map_or(true, |m| m == method) && self.pattern.matches(path)
    }
}

/// Ordered route-to-access table
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn builder() -> AccessPolicyBuilder {
        AccessPolicyBuilder::default()
    }

    /// Built-in policy for the application routes
    pub fn builtin() -> Result<Self, PolicyError> {
        Self::from_yaml(DEFAULT_POLICY)
    }

    /// Load the policy from a YAML file, or the built-in one when no path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        match path {
            Some(path) => {
                tracing::info!("Loading access policy from: {}", path.display());
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read policy file: {}", path.display()))?;
                Self::from_yaml(&content)
                    .with_context(|| format!("Invalid policy file: {}", path.display()))
            }
            None => {
                tracing::info!("No policy path specified, using built-in access policy");
                Ok(Self::builtin()?)
            }
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_yaml::from_str(content)?;
        let mut builder = Self::builder();

        for spec in file.rules {
            let method = match spec.method.as_deref().map(str::trim) {
                None | Some("*") | Some("ANY") => None,
                Some(m) => Some(
                    Method::from_bytes(m.to_uppercase().as_bytes())
                        .map_err(|_| PolicyError::InvalidMethod(m.to_string()))?,
                ),
            };
            let access = match (spec.access, spec.roles) {
                (Some(AccessKind::Public), None) => Access::Public,
                (Some(AccessKind::Authenticated), None) => Access::Authenticated,
                (None, Some(roles)) => Access::Roles(roles),
                _ => return Err(PolicyError::AmbiguousAccess(spec.pattern)),
            };
            builder = builder.rule(method, &spec.pattern, access);
        }

        builder.build()
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// First matching rule's access, or `Authenticated` when nothing matches
    pub fn resolve(&self, method: &Method, path: &str) -> &Access {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map(|rule| &rule.access)
            .unwrap_or(&DEFAULT_ACCESS)
    }

    pub fn check(
        &self,
        method: &Method,
        path: &str,
        identity: Option<&RequestIdentity>,
    ) -> Result<(), AuthError> {
        match self.resolve(method, path) {
            Access::Public => Ok(()),
            Access::Authenticated => identity.map(|_| ()).ok_or(AuthError::Unauthenticated),
            Access::Roles(roles) => {
                let identity = identity.ok_or(AuthError::Unauthenticated)?;
                if roles
                    .iter()
                    .any(|role| identity.has_authority(&authority(*role)))
                {
                    Ok(())
                } else {
                    Err(AuthError::Forbidden)
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct AccessPolicyBuilder {
    rules: Vec<(Option<Method>, String, Access)>,
}

impl AccessPolicyBuilder {
    pub fn rule(mut self, method: Option<Method>, pattern: &str, access: Access) -> Self {
        self.rules.push((method, pattern.to_string(), access));
        self
    }

    pub fn public(self, pattern: &str) -> Self {
        self.rule(None, pattern, Access::Public)
    }

    pub fn authenticated(self, pattern: &str) -> Self {
        self.rule(None, pattern, Access::Authenticated)
    }

    pub fn roles(self, pattern: &str, roles: &[Role]) -> Self {
        self.rule(None, pattern, Access::Roles(roles.to_vec()))
    }

    pub fn build(self) -> Result<AccessPolicy, PolicyError> {
        let rules = self
            .rules
            .into_iter()
            .map(|(method, pattern, access)| {
                if matches!(&access, Access::Roles(roles) if roles.is_empty()) {
                    return Err(PolicyError::EmptyRoles(pattern));
                }
                Ok(AccessRule {
                    method,
                    pattern: RoutePattern::parse(&pattern)?,
                    access,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AccessPolicy { rules })
    }
}

/// Policy file structure
#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
struct RuleSpec {
    pattern: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    access: Option<AccessKind>,
    #[serde(default)]
    roles: Option<Vec<Role>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AccessKind {
    Public,
    Authenticated,
}

/// Enforce the access policy on the identity established by `authenticate`
pub async fn authorize(State(state): State<AuthState>, req: Request, next: Next) -> Response {
    let identity = req.extensions().get::<RequestIdentity>();

    if let Err(err) = state.policy.check(req.method(), req.uri().path(), identity) {
        tracing::debug!(
            method = %req.method(),
            path = %req.uri().path(),
            username = identity.map(|i| i.username.as_str()).unwrap_or("-"),
            "Access denied: {}",
            err
        );
        return err.into_response();
    }

    next.run(req).await
}
