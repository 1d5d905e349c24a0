//! User profile repository.

use crate::model::user::{Role, UserId, UserProfile};
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, like_contains, map_unique_violation,
    parse_uuid, push_pagination, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    username,
    email,
    role,
    department,
    position,
    phone,
    is_active,
    last_login,
    created_at,
    updated_at
FROM user_profiles";

/// Query options for listing user profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    /// Case-insensitive username substring.
    pub username: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

pub trait UserRepository {
    fn create_user(&self, user: &UserProfile) -> RepoResult<UserId>;
    fn update_user(&self, user: &UserProfile) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<UserProfile>>;
    fn find_user_by_username(&self, username: &str) -> RepoResult<Option<UserProfile>>;
    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<UserProfile>>;
    fn set_user_active(&self, id: UserId, is_active: bool) -> RepoResult<()>;
    fn record_login(&self, id: UserId) -> RepoResult<()>;
}

/// SQLite-backed user profile repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["user_profiles"])?;
        Ok(Self::new(conn))
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &UserProfile) -> RepoResult<UserId> {
        let mut user = user.clone();
        user.validate()?;

        self.conn
            .execute(
                "INSERT INTO user_profiles (
                    id,
                    username,
                    email,
                    role,
                    department,
                    position,
                    phone,
                    is_active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    user.id.to_string(),
                    user.username.as_str(),
                    user.email.as_deref(),
                    user.role.as_str(),
                    user.department.as_deref(),
                    user.position.as_deref(),
                    user.phone.as_deref(),
                    bool_to_int(user.is_active),
                ],
            )
            .map_err(|err| map_unique_violation(err, "user", &user.username))?;

        Ok(user.id)
    }

    fn update_user(&self, user: &UserProfile) -> RepoResult<()> {
        let mut user = user.clone();
        user.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE user_profiles
                 SET
                    username = ?2,
                    email = ?3,
                    role = ?4,
                    department = ?5,
                    position = ?6,
                    phone = ?7,
                    is_active = ?8,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![
                    user.id.to_string(),
                    user.username.as_str(),
                    user.email.as_deref(),
                    user.role.as_str(),
                    user.department.as_deref(),
                    user.position.as_deref(),
                    user.phone.as_deref(),
                    bool_to_int(user.is_active),
                ],
            )
            .map_err(|err| map_unique_violation(err, "user", &user.username))?;

        if changed == 0 {
            return Err(RepoError::not_found("user", user.id));
        }
        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<UserProfile>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_user_by_username(&self, username: &str) -> RepoResult<Option<UserProfile>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE username = ?1;"),
                [username.trim()],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<UserProfile>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(role) = query.role {
            sql.push_str(" AND role = ?");
            bind_values.push(Value::Text(role.as_str().to_string()));
        }
        if let Some(is_active) = query.is_active {
            sql.push_str(" AND is_active = ?");
            bind_values.push(Value::Integer(bool_to_int(is_active)));
        }
        if let Some(username) = query
            .username
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            sql.push_str(" AND username LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(like_contains(username)));
        }

        sql.push_str(" ORDER BY username ASC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn set_user_active(&self, id: UserId, is_active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE user_profiles
             SET is_active = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_active)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }

    fn record_login(&self, id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE user_profiles
             SET last_login = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<UserProfile> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in user_profiles.role"))
    })?;

    Ok(UserProfile {
        id: parse_uuid(&id_text, "user_profiles.id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        role,
        department: row.get("department")?,
        position: row.get("position")?,
        phone: row.get("phone")?,
        is_active: int_to_bool(row.get("is_active")?, "user_profiles.is_active")?,
        last_login: row.get("last_login")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
