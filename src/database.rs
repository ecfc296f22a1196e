use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn verify_password(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify(password, &self.password_hash)
    }
}

#[derive(Debug, Clone)]
pub struct TournamentRow {
    pub id: i64,
    pub name: String,
    pub sheets_link: String,
    pub form_link: String,
    pub sign_up_deadline: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// True when the error is the store rejecting a duplicate row. The unique
/// constraints are the authoritative duplicate check, not a pre-read.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // In-memory SQLite databases exist per connection, so keep a single one
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tournaments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                sheets_link TEXT NOT NULL,
                form_link TEXT NOT NULL,
                sign_up_deadline DATETIME NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tournament_organizers (
                user_id INTEGER NOT NULL,
                tournament_id INTEGER NOT NULL,
                PRIMARY KEY (user_id, tournament_id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (tournament_id) REFERENCES tournaments(id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Database { pool })
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<i64, sqlx::Error> {
        let password_hash =
            hash(password, DEFAULT_COST).map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;

        let result = sqlx::query("INSERT INTO users (username, password, email) VALUES (?, ?, ?)")
            .bind(username)
            .bind(&password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthUser>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, username, password, email, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| AuthUser {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password"),
            created_at: row.get("created_at"),
        }))
    }

    /// Authorization Guard: a membership row is what makes someone an organizer.
    pub async fn is_organizer(&self, user_id: i64, tournament_id: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT 1 FROM tournament_organizers WHERE user_id = ? AND tournament_id = ?",
        )
        .bind(user_id)
        .bind(tournament_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Persists the tournament and seeds the creator as its first organizer in
    /// one transaction, so a tournament is never visible without an organizer.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_tournament(
        &self,
        name: &str,
        sheets_link: &str,
        form_link: &str,
        sign_up_deadline: DateTime<Utc>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        creator_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO tournaments (name, sheets_link, form_link, sign_up_deadline, start_date, end_date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(sheets_link)
        .bind(form_link)
        .bind(sign_up_deadline)
        .bind(start_date)
        .bind(end_date)
        .execute(&mut *tx)
        .await?;

        let tournament_id = result.last_insert_rowid();

        sqlx::query("INSERT INTO tournament_organizers (user_id, tournament_id) VALUES (?, ?)")
            .bind(creator_id)
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(tournament_id)
    }

    pub async fn get_tournament(&self, id: i64) -> Result<Option<TournamentRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, sheets_link, form_link, sign_up_deadline, start_date, end_date
            FROM tournaments WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(tournament_from_row))
    }

    pub async fn organizer_usernames(&self, tournament_id: i64) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT u.username FROM users u
            JOIN tournament_organizers t ON t.user_id = u.id
            WHERE t.tournament_id = ?
            ORDER BY u.username
            "#,
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("username")).collect())
    }

    pub async fn tournaments_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<TournamentRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.sheets_link, t.form_link, t.sign_up_deadline, t.start_date, t.end_date
            FROM tournaments t
            JOIN tournament_organizers o ON o.tournament_id = t.id
            WHERE o.user_id = ?
            ORDER BY t.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(tournament_from_row).collect())
    }
}

/// Inserts a membership row inside the caller's transaction. A unique
/// violation here is the `Conflict` signal for "already an organizer".
pub async fn insert_organizer(
    tx: &mut Transaction<'static, Sqlite>,
    user_id: i64,
    tournament_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO tournament_organizers (user_id, tournament_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(tournament_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

fn tournament_from_row(row: sqlx::sqlite::SqliteRow) -> TournamentRow {
    TournamentRow {
        id: row.get("id"),
        name: row.get("name"),
        sheets_link: row.get("sheets_link"),
        form_link: row.get("form_link"),
        sign_up_deadline: row.get("sign_up_deadline"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_username_is_a_unique_violation() {
        let db = test_db().await;
        db.create_user("alice", "pw1", "a@x.com").await.unwrap();

        let err = db.create_user("alice", "pw2", "b@x.com").await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn creator_is_seeded_as_organizer() {
        let db = test_db().await;
        let alice = db.create_user("alice", "pw1", "a@x.com").await.unwrap();
        let bob = db.create_user("bob", "pw2", "b@x.com").await.unwrap();

        let id = db
            .create_tournament(
                "Cup",
                "https://docs.google.com/spreadsheets/d/sheet1/edit",
                "https://docs.google.com/forms/d/form1/edit",
                Utc::now(),
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
                alice,
            )
            .await
            .unwrap();

        assert!(db.is_organizer(alice, id).await.unwrap());
        assert!(!db.is_organizer(bob, id).await.unwrap());
    }

    #[tokio::test]
    async fn membership_pair_is_unique() {
        let db = test_db().await;
        let alice = db.create_user("alice", "pw1", "a@x.com").await.unwrap();
        let bob = db.create_user("bob", "pw2", "b@x.com").await.unwrap();
        let id = db
            .create_tournament(
                "Cup",
                "sheets",
                "form",
                Utc::now(),
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
                alice,
            )
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        insert_organizer(&mut tx, bob, id).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let err = insert_organizer(&mut tx, bob, id).await.unwrap_err();
        assert!(is_unique_violation(&err));
        tx.rollback().await.unwrap();

        assert_eq!(db.organizer_usernames(id).await.unwrap(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn password_hash_round_trip() {
        let db = test_db().await;
        db.create_user("alice", "pw1", "a@x.com").await.unwrap();

        let user = db.get_user_by_username("alice").await.unwrap().unwrap();
        assert!(user.verify_password("pw1").unwrap());
        assert!(!user.verify_password("pw2").unwrap());
    }
}
