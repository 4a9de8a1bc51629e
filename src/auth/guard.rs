use super::dto::Role;

pub const SIGN_IN_PATH: &str = "login";
pub const ADMIN_HOME: &str = "admin/dashboard";
pub const CLIENT_HOME: &str = "client/projects";

const ADMIN_NAMESPACE: &str = "admin";
const CLIENT_NAMESPACE: &str = "client";
const CLIENT_DASHBOARD: &str = "client/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

struct Rule {
    applies: fn(Option<Role>, &str) -> bool,
    redirect_to: &'static str,
}

/// Evaluated top to bottom; later rules are narrower exceptions of earlier ones.
const RULES: &[Rule] = &[
    Rule {
        applies: |role, path| {
            role.is_none() && (in_namespace(path, ADMIN_NAMESPACE) || in_namespace(path, CLIENT_NAMESPACE))
        },
        redirect_to: SIGN_IN_PATH,
    },
    Rule {
        applies: |role, path| role == Some(Role::Admin) && in_namespace(path, CLIENT_NAMESPACE),
        redirect_to: ADMIN_HOME,
    },
    Rule {
        applies: |role, path| role == Some(Role::Employee) && in_namespace(path, CLIENT_NAMESPACE),
        redirect_to: ADMIN_HOME,
    },
    Rule {
        applies: |role, path| role != Some(Role::Admin) && path.starts_with(CLIENT_DASHBOARD),
        redirect_to: CLIENT_HOME,
    },
    Rule {
        applies: |role, path| {
            matches!(role, Some(Role::Client | Role::Customer)) && in_namespace(path, ADMIN_NAMESPACE)
        },
        redirect_to: CLIENT_HOME,
    },
];

fn normalize(path: &str) -> &str {
    path.trim().trim_start_matches('/')
}

fn in_namespace(path: &str, namespace: &str) -> bool {
    path.strip_prefix(namespace)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Decides whether `role` (or nobody) may open `path`.
pub fn evaluate(role: Option<Role>, path: &str) -> GuardDecision {
    let path = normalize(path);
    RULES
        .iter()
        .find(|rule| (rule.applies)(role, path))
        .map_or(GuardDecision::Allow, |rule| GuardDecision::Redirect(rule.redirect_to))
}

/// Landing page after a successful login.
pub fn home_path(role: Role) -> &'static str {
    if role.is_staff() {
        ADMIN_HOME
    } else {
        CLIENT_HOME
    }
}
