//! Local credential table
//!
//! Used only when the remote service cannot authenticate the user. Keys are
//! lower-cased usernames; passwords must match exactly. Tokens issued here
//! carry the [`LOCAL_TOKEN_PREFIX`] tag.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::session::{Role, User, LOCAL_TOKEN_PREFIX};

struct LocalCredential {
    id: &'static str,
    password: &'static str,
    role: Role,
    display_name: &'static str,
    permissions: &'static [&'static str],
}

static LOCAL_CREDENTIALS: Lazy<HashMap<&'static str, LocalCredential>> = Lazy::new(|| {
    HashMap::from([
        (
            "operador",
            LocalCredential {
                id: "local-operator",
                password: "op123",
                role: Role::Operator,
                display_name: "Operador",
                permissions: &["view_dashboard", "view_alerts", "acknowledge_alerts"],
            },
        ),
        (
            "supervisor",
            LocalCredential {
                id: "local-supervisor",
                password: "sup123",
                role: Role::Supervisor,
                display_name: "Supervisor",
                permissions: &[
                    "view_dashboard",
                    "view_alerts",
                    "acknowledge_alerts",
                    "view_reports",
                    "edit_config",
                ],
            },
        ),
    ])
});

/// Look up `username` (case-insensitive) and check `password`
pub fn verify(username: &str, password: &str) -> Option<User> {
    let key = username.trim().to_lowercase();
    let entry = LOCAL_CREDENTIALS.get(key.as_str())?;
    if entry.password != password {
        return None;
    }

    Some(User {
        id: entry.id.to_string(),
        username: key,
        role: entry.role,
        display_name: entry.display_name.to_string(),
        permissions: entry.permissions.iter().map(|p| p.to_string()).collect(),
    })
}

/// Opaque token distinguishable from remote ones
pub fn issue_token() -> String {
    format!("{}{}", LOCAL_TOKEN_PREFIX, uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_users() {
        let operator = verify("operador", "op123").unwrap();
        assert_eq!(operator.role, Role::Operator);

        let supervisor = verify("Supervisor", "sup123").unwrap();
        assert_eq!(supervisor.role, Role::Supervisor);
        assert_eq!(supervisor.username, "supervisor");
    }

    #[test]
    fn test_password_is_case_sensitive() {
        assert!(verify("operador", "OP123").is_none());
        assert!(verify("operador", "").is_none());
        assert!(verify("nobody", "op123").is_none());
    }

    #[test]
    fn test_tokens_are_tagged_and_unique() {
        let a = issue_token();
        let b = issue_token();
        assert_ne!(a, b);
        assert!(a.starts_with(LOCAL_TOKEN_PREFIX));
    }
}
