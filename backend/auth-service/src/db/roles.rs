/// Role and permission repository
///
/// Assignments live in `user_roles` and `role_permissions` join tables.
/// Every effective-set query filters soft-deleted roles and permissions so
/// revoking a role takes effect without touching its assignments.
use crate::error::Result;
use crate::models::Role;
use sqlx::PgPool;

pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>> {
    let role = sqlx::query_as::<_, Role>(
        "SELECT id, uuid, name, description, scope, is_system, deleted_at, created_at, updated_at \
         FROM roles WHERE name = $1 AND deleted_at IS NULL",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(role)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Role>> {
    let role = sqlx::query_as::<_, Role>(
        "SELECT id, uuid, name, description, scope, is_system, deleted_at, created_at, updated_at \
         FROM roles WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(role)
}

pub async fn assign_to_user(pool: &PgPool, user_id: i64, role_id: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Names of the user's non-deleted roles, for token claims and role gates.
pub async fn user_role_names(pool: &PgPool, user_id: i64) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT r.name FROM roles r \
         JOIN user_roles ur ON ur.role_id = r.id \
         WHERE ur.user_id = $1 AND r.deleted_at IS NULL \
         ORDER BY r.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(names)
}

/// Distinct scopes carried by the user's roles, for scope gates.
pub async fn user_role_scopes(pool: &PgPool, user_id: i64) -> Result<Vec<String>> {
    let scopes = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT r.scope FROM roles r \
         JOIN user_roles ur ON ur.role_id = r.id \
         WHERE ur.user_id = $1 AND r.deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(scopes)
}

/// Permission names reachable through the user's roles, for permission gates.
pub async fn user_permission_names(pool: &PgPool, user_id: i64) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT p.name FROM permissions p \
         JOIN role_permissions rp ON rp.permission_id = p.id \
         JOIN roles r ON r.id = rp.role_id \
         JOIN user_roles ur ON ur.role_id = r.id \
         WHERE ur.user_id = $1 AND r.deleted_at IS NULL AND p.deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(names)
}
