//! Display-name resolution.
//!
//! A fixed chain of [`NameSource`]s is consulted strictly in order; the first
//! one returning a usable name wins. When none does, the name is derived from
//! the email address, and as a last resort the raw email is used.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::claims::UnverifiedClaims;
use super::dto::{Role, User};
use crate::api::IdentityApi;

/// Where a resolved name came from, in priority order: earlier variants
/// compare lower and outrank later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameOrigin {
    Claims,
    CurrentIdentity,
    CustomerRecord,
    EmployeeRecord,
    EmailDerived,
    RawEmail,
}

impl NameOrigin {
    /// Fallback origins never displace a name that already looks real.
    pub fn is_fallback(self) -> bool {
        matches!(self, NameOrigin::EmailDerived | NameOrigin::RawEmail)
    }
}

/// What one source found. Attributes are kept even if the name is unusable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub name: Option<String>,
    pub customer_id: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

impl Enrichment {
    fn absorb(&mut self, other: &Enrichment) {
        if self.customer_id.is_none() {
            self.customer_id = other.customer_id.clone();
        }
        if self.department.is_none() {
            self.department = other.department.clone();
        }
        if self.position.is_none() {
            self.position = other.position.clone();
        }
    }
}

/// A proposed update to the cached user, applied by the session owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub name: String,
    pub origin: NameOrigin,
    pub customer_id: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

impl Resolution {
    /// Applies this resolution to `user`, whose current name came from
    /// `held` (`None` when unknown). Returns whether the user or `held` changed.
    ///
    /// A name that is not usable yields to anything. A usable one is only
    /// replaced by another usable name from a source of the same or higher
    /// priority, so a lookup that failed further up the chain never
    /// downgrades it.
    pub fn apply_to(&self, user: &mut User, held: &mut Option<NameOrigin>) -> bool {
        let mut changed = false;

        if self.may_replace(user, *held) {
            if user.name != self.name {
                user.name = self.name.clone();
                changed = true;
            }
            if *held != Some(self.origin) {
                *held = Some(self.origin);
                changed = true;
            }
        }

        for (slot, found) in [
            (&mut user.customer_id, &self.customer_id),
            (&mut user.department, &self.department),
            (&mut user.position, &self.position),
        ] {
            if slot.is_none() && found.is_some() {
                *slot = found.clone();
                changed = true;
            }
        }
        changed
    }

    fn may_replace(&self, user: &User, held: Option<NameOrigin>) -> bool {
        if !is_usable_name(&user.name, &user.email) {
            return true;
        }
        if self.origin.is_fallback() || !is_usable_name(&self.name, &user.email) {
            return false;
        }
        held.map_or(true, |held| self.origin <= held)
    }
}

/// Everything a source may look at.
pub struct ResolveContext<'a> {
    pub user: &'a User,
    pub token: &'a str,
    pub claims: Option<&'a UnverifiedClaims>,
}

#[async_trait]
pub trait NameSource: Send + Sync {
    fn origin(&self, user: &User) -> NameOrigin;
    async fn lookup(&self, ctx: &ResolveContext<'_>) -> Option<Enrichment>;
}

/// Step 1: `name` + last-name hint from the unverified token payload.
pub struct TokenClaims;

#[async_trait]
impl NameSource for TokenClaims {
    fn origin(&self, _user: &User) -> NameOrigin {
        NameOrigin::Claims
    }

    async fn lookup(&self, ctx: &ResolveContext<'_>) -> Option<Enrichment> {
        let name = ctx.claims?.display_name()?;
        Some(Enrichment {
            name: Some(name),
            ..Enrichment::default()
        })
    }
}

/// Step 2: the backend's view of the token owner.
pub struct CurrentIdentity {
    api: Arc<dyn IdentityApi>,
}

impl CurrentIdentity {
    pub fn new(api: Arc<dyn IdentityApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl NameSource for CurrentIdentity {
    fn origin(&self, _user: &User) -> NameOrigin {
        NameOrigin::CurrentIdentity
    }

    async fn lookup(&self, ctx: &ResolveContext<'_>) -> Option<Enrichment> {
        let me = match self.api.current_identity(ctx.token).await {
            Ok(me) => me,
            Err(e) => {
                debug!(user_id = %ctx.user.id, error = %e, "current identity lookup failed");
                return None;
            }
        };
        Some(Enrichment {
            name: non_empty(join_name(me.name.as_deref(), me.last_name.as_deref())),
            customer_id: me.customer_id,
            ..Enrichment::default()
        })
    }
}

/// Step 3: the customer or employee record behind the account.
pub struct RoleRecord {
    api: Arc<dyn IdentityApi>,
}

impl RoleRecord {
    pub fn new(api: Arc<dyn IdentityApi>) -> Self {
        Self { api }
    }

    async fn customer(&self, user: &User) -> Option<Enrichment> {
        let customers = match self.api.customers_by_user_id(&user.id).await {
            Ok(c) => c,
            Err(e) => {
                debug!(user_id = %user.id, error = %e, "customer lookup failed");
                return None;
            }
        };
        let first = customers.into_iter().next()?;
        Some(Enrichment {
            name: non_empty(join_name(
                first.name.as_deref(),
                first.second_name.as_deref(),
            )),
            customer_id: Some(first.id),
            ..Enrichment::default()
        })
    }

    async fn employee(&self, user: &User) -> Option<Enrichment> {
        let employees = match self.api.employees().await {
            Ok(e) => e,
            Err(e) => {
                debug!(user_id = %user.id, error = %e, "employee roster lookup failed");
                return None;
            }
        };
        let by_reference = employees
            .iter()
            .find(|e| e.user_id.as_deref() == Some(user.id.as_str()));
        let matched = by_reference.or_else(|| {
            employees.iter().find(|e| {
                e.email
                    .as_deref()
                    .is_some_and(|mail| mail.trim().eq_ignore_ascii_case(user.email.trim()))
            })
        })?;
        Some(Enrichment {
            name: non_empty(join_name(
                matched.name.as_deref(),
                matched.last_name.as_deref(),
            )),
            department: matched.department.clone(),
            position: matched.position.clone(),
            ..Enrichment::default()
        })
    }
}

#[async_trait]
impl NameSource for RoleRecord {
    fn origin(&self, user: &User) -> NameOrigin {
        match user.role {
            Role::Customer => NameOrigin::CustomerRecord,
            _ => NameOrigin::EmployeeRecord,
        }
    }

    async fn lookup(&self, ctx: &ResolveContext<'_>) -> Option<Enrichment> {
        match ctx.user.role {
            Role::Customer => self.customer(ctx.user).await,
            _ => self.employee(ctx.user).await,
        }
    }
}

pub struct IdentityResolver {
    sources: Vec<Box<dyn NameSource>>,
}

impl IdentityResolver {
    /// Claims, then the current-identity lookup, then the role record.
    pub fn new(api: Arc<dyn IdentityApi>) -> Self {
        Self::with_sources(vec![
            Box::new(TokenClaims),
            Box::new(CurrentIdentity::new(api.clone())),
            Box::new(RoleRecord::new(api)),
        ])
    }

    pub fn with_sources(sources: Vec<Box<dyn NameSource>>) -> Self {
        Self { sources }
    }

    pub async fn resolve(&self, user: &User, token: &str) -> Resolution {
        let claims = UnverifiedClaims::decode(token);
        let ctx = ResolveContext {
            user,
            token,
            claims: claims.as_ref(),
        };

        let mut seen = Enrichment::default();
        for source in &self.sources {
            let origin = source.origin(user);
            let Some(found) = source.lookup(&ctx).await else {
                continue;
            };
            seen.absorb(&found);
            match found.name {
                Some(name) if is_usable_name(&name, &user.email) => {
                    debug!(user_id = %user.id, origin = ?origin, "display name resolved");
                    return finish(name, origin, seen);
                }
                Some(name) => {
                    debug!(user_id = %user.id, origin = ?origin, candidate = %name, "ignoring email-like name");
                }
                None => {}
            }
        }

        let derived = derive_name_from_email(&user.email);
        if derived.is_empty() {
            finish(user.email.clone(), NameOrigin::RawEmail, seen)
        } else {
            finish(derived, NameOrigin::EmailDerived, seen)
        }
    }
}

fn finish(name: String, origin: NameOrigin, seen: Enrichment) -> Resolution {
    Resolution {
        name,
        origin,
        customer_id: seen.customer_id,
        department: seen.department,
        position: seen.position,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// First and last name separated by one space, trimmed.
pub fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    let first = first.map(str::trim).unwrap_or_default();
    let last = last.map(str::trim).unwrap_or_default();
    format!("{first} {last}").trim().to_string()
}

pub fn email_local_part(email: &str) -> &str {
    let email = email.trim();
    email.split('@').next().unwrap_or(email)
}

/// `juan.perez@acme.com` becomes `Juan Perez`.
pub fn derive_name_from_email(email: &str) -> String {
    email_local_part(email)
        .split(['.', '_', '-'])
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Heuristic: rejects empty names and names the backend filled in from the email.
pub fn is_usable_name(candidate: &str, email: &str) -> bool {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return false;
    }
    let lowered = candidate.to_lowercase();
    let email = email.trim();
    lowered != email.to_lowercase()
        && lowered != email_local_part(email).to_lowercase()
        && lowered != derive_name_from_email(email).to_lowercase()
}
