//! Pure authorization matching rules.
//!
//! These functions know nothing about HTTP or storage. The guards in
//! `http::guards` load the caller's role/permission/scope sets and defer
//! to the matchers here, which keeps every rule unit-testable in isolation.

/// Role that bypasses role and permission checks (but never scope checks).
pub const ROLE_SUPER_ADMIN: &str = "super_admin";
/// Default role assigned to self-registered users.
pub const ROLE_END_USER: &str = "end_user";

/// Scope for customer-facing surfaces.
pub const SCOPE_APP: &str = "app";
/// Scope for the back-office dashboard.
pub const SCOPE_DASHBOARD: &str = "dashboard";

/// A caller passes a role gate when they hold any required role, or hold
/// `super_admin`.
pub fn role_allowed(held: &[String], required: &[&str]) -> bool {
    if held.iter().any(|r| r == ROLE_SUPER_ADMIN) {
        return true;
    }
    held.iter().any(|r| required.iter().any(|req| r == req))
}

/// A caller passes a permission gate when they hold any required permission,
/// directly or via a module wildcard, or hold `super_admin`.
///
/// Permission names are `module.action`. Holding `module.*` satisfies any
/// requirement within that module and nothing outside it. A held wildcard
/// never satisfies a required wildcard for a different module, and plain
/// names only match exactly.
pub fn permission_allowed(roles: &[String], held: &[String], required: &[&str]) -> bool {
    if roles.iter().any(|r| r == ROLE_SUPER_ADMIN) {
        return true;
    }
    required
        .iter()
        .any(|req| held.iter().any(|h| permission_matches(h, req)))
}

fn permission_matches(held: &str, required: &str) -> bool {
    if held == required {
        return true;
    }
    match held.strip_suffix(".*") {
        Some(module) => match required.split_once('.') {
            Some((req_module, _)) => module == req_module,
            None => false,
        },
        None => false,
    }
}

/// A caller passes a scope gate only when one of their roles carries the
/// required scope. There is no override: a dashboard-only `super_admin`
/// still cannot use app-scoped surfaces.
pub fn scope_allowed(held_scopes: &[String], required: &str) -> bool {
    held_scopes.iter().any(|s| s == required)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn role_gate_matches_any_required() {
        assert!(role_allowed(&v(&["admin"]), &["admin", "editor"]));
        assert!(!role_allowed(&v(&["viewer"]), &["admin", "editor"]));
        assert!(!role_allowed(&[], &["admin"]));
    }

    #[test]
    fn super_admin_bypasses_role_gate() {
        assert!(role_allowed(&v(&["super_admin"]), &["anything"]));
    }

    #[test]
    fn exact_permission_match() {
        assert!(permission_allowed(&[], &v(&["user.invite"]), &["user.invite"]));
        assert!(!permission_allowed(&[], &v(&["user.invite"]), &["user.delete"]));
    }

    #[test]
    fn module_wildcard_covers_its_module_only() {
        let held = v(&["user.*"]);
        assert!(permission_allowed(&[], &held, &["user.invite"]));
        assert!(permission_allowed(&[], &held, &["user.delete"]));
        assert!(!permission_allowed(&[], &held, &["order.read"]));
    }

    #[test]
    fn plain_permission_never_matches_a_wildcard_requirement() {
        assert!(!permission_allowed(&[], &v(&["user.invite"]), &["user.*"]));
        // Holding the wildcard satisfies requiring it.
        assert!(permission_allowed(&[], &v(&["user.*"]), &["user.*"]));
    }

    #[test]
    fn undotted_requirement_only_matches_exactly() {
        assert!(!permission_allowed(&[], &v(&["user.*"]), &["user"]));
        assert!(permission_allowed(&[], &v(&["user"]), &["user"]));
    }

    #[test]
    fn super_admin_bypasses_permission_gate() {
        assert!(permission_allowed(&v(&["super_admin"]), &[], &["order.refund"]));
    }

    #[test]
    fn scope_gate_has_no_override() {
        assert!(scope_allowed(&v(&["dashboard"]), "dashboard"));
        assert!(!scope_allowed(&v(&["dashboard"]), "app"));
        // super_admin's roles do not help here; only scopes count.
        assert!(!scope_allowed(&[], "app"));
    }
}
