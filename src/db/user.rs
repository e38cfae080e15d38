use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }

    /// Parse a stored role. Anything unrecognised gets the least privilege.
    pub fn from_db(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::Customer,
        }
    }

    /// Parse a role supplied by a client (query strings, filters).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    name: String,
    password_hash: String,
    role: String,
    created_at: String,
    updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role: Role::from_db(&row.role),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Member summary for the admin dashboard. Never carries the password hash.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemberSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub total_transactions: i64,
    /// Sum of approved transaction amounts.
    pub total_spent: i64,
}

#[derive(sqlx::FromRow)]
struct MemberSummaryRow {
    id: i64,
    name: String,
    email: String,
    role: String,
    created_at: String,
    total_transactions: i64,
    total_spent: i64,
}

impl From<MemberSummaryRow> for MemberSummary {
    fn from(row: MemberSummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: Role::from_db(&row.role),
            created_at: row.created_at,
            total_transactions: row.total_transactions,
            total_spent: row.total_spent,
        }
    }
}

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at, updated_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Returns the user ID.
    /// Fails if the email is already registered (case-insensitive).
    pub async fn create(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO users (email, name, password_hash, role) VALUES (?, ?, ?, ?)")
                .bind(email)
                .bind(name)
                .bind(password_hash)
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        )))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(sqlx::AssertSqlSafe(format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS)))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Check whether an email is free to register.
    pub async fn is_email_available(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 == 0)
    }

    /// Replace a user's password hash.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Promote or demote a user.
    pub async fn set_role(&self, id: i64, role: Role) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET role = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(role.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// IDs of every admin, for addressing admin notifications.
    pub async fn list_admin_ids(&self) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE role = 'admin'")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// List members with their transaction totals, newest first.
    pub async fn list_members(
        &self,
        search: Option<&str>,
        role: Option<Role>,
    ) -> Result<Vec<MemberSummary>, sqlx::Error> {
        let pattern = search.map(|s| format!("%{}%", s));
        let rows: Vec<MemberSummaryRow> = sqlx::query_as(
            "SELECT
                u.id, u.name, u.email, u.role, u.created_at,
                COUNT(t.id) AS total_transactions,
                COALESCE(SUM(CASE WHEN t.status = 'approved' THEN t.amount ELSE 0 END), 0) AS total_spent
             FROM users u
             LEFT JOIN transactions t ON t.user_id = u.id
             WHERE (?1 IS NULL OR u.name LIKE ?1 OR u.email LIKE ?1)
               AND (?2 IS NULL OR u.role = ?2)
             GROUP BY u.id
             ORDER BY u.created_at DESC, u.id DESC",
        )
        .bind(pattern)
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MemberSummary::from).collect())
    }

    /// Number of transactions owned by a user.
    pub async fn count_transactions(&self, id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE user_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Delete a user by ID. Callers must check transaction ownership first.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
