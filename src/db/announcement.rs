//! Admin announcements shown to signed-in users.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct AnnouncementStore {
    pool: SqlitePool,
}

/// How an announcement is displayed: on the board, or as a dismissible alert banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementType {
    #[default]
    Board,
    Alert,
}

impl AnnouncementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementType::Board => "board",
            AnnouncementType::Alert => "alert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "board" => Some(AnnouncementType::Board),
            "alert" => Some(AnnouncementType::Alert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: AnnouncementType,
    pub created_by: i64,
    pub created_by_name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct AnnouncementRow {
    id: i64,
    title: String,
    content: String,
    #[sqlx(rename = "type")]
    kind: String,
    created_by: i64,
    created_by_name: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AnnouncementRow> for Announcement {
    type Error = sqlx::Error;

    fn try_from(row: AnnouncementRow) -> Result<Self, Self::Error> {
        let kind = AnnouncementType::parse(&row.kind).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown announcement type: {}", row.kind).into())
        })?;
        Ok(Self {
            id: row.id,
            title: row.title,
            content: row.content,
            kind,
            created_by: row.created_by,
            created_by_name: row.created_by_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ANNOUNCEMENT_SELECT: &str = "SELECT
        a.id, a.title, a.content, a.type, a.created_by, u.name AS created_by_name,
        a.created_at, a.updated_at
     FROM announcements a
     JOIN users u ON a.created_by = u.id";

impl AnnouncementStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Publish an announcement. Returns the new ID.
    pub async fn create(
        &self,
        title: &str,
        content: &str,
        kind: AnnouncementType,
        created_by: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO announcements (title, content, type, created_by) VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(kind.as_str())
        .bind(created_by)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Announcement>, sqlx::Error> {
        let row: Option<AnnouncementRow> =
            sqlx::query_as(sqlx::AssertSqlSafe(format!("{} WHERE a.id = ?", ANNOUNCEMENT_SELECT)))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Announcement::try_from).transpose()
    }

    /// Latest announcements with their author's name, newest first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Announcement>, sqlx::Error> {
        let rows: Vec<AnnouncementRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "{} ORDER BY a.created_at DESC, a.id DESC LIMIT ?",
            ANNOUNCEMENT_SELECT
        )))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Announcement::try_from).collect()
    }

    /// Delete an announcement. Returns false when it does not exist.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
