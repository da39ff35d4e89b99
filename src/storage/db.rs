//! SQLite persistence for users, currencies, categories and spendings.
//!
//! Connections come from an r2d2 pool; the schema is applied by refinery
//! migrations at pool creation. All row types derive `Serialize` because
//! the Mini App API returns them as-is (snake_case, like the original
//! table rows).

use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Result, Row};
use serde::Serialize;

use crate::storage::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// A registered user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Internal row id, the foreign key target for spendings
    pub id: i64,
    /// Telegram user id
    pub telegram_id: i64,
    /// Telegram username, if set
    pub username: Option<String>,
    /// Telegram first name
    pub first_name: Option<String>,
    /// Preferred display currency
    pub default_currency_id: Option<i64>,
    /// Whether the insights endpoint is allowed for this user
    pub ai_features_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Currency {
    pub id: i64,
    pub code: String,
    pub symbol: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub emoji: Option<String>,
    pub color: Option<String>,
}

/// One recorded spending.
#[derive(Debug, Clone, Serialize)]
pub struct Spending {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub name: String,
    pub category_id: Option<i64>,
    /// Day the spending belongs to, "YYYY-MM-DD"
    pub date_of_log: String,
    pub created_at: String,
}

/// A spending joined with its category, as fed to the insights model.
#[derive(Debug, Clone, Serialize)]
pub struct SpendingWithCategory {
    #[serde(flatten)]
    pub spending: Spending,
    pub category_name: Option<String>,
    pub category_emoji: Option<String>,
}

/// Create a connection pool and bring the schema up to date.
///
/// # Errors
/// Fails when the pool cannot be built or migrations cannot be applied.
pub fn create_pool(database_path: &str) -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool; returned to the pool on drop.
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn map_user(row: &Row<'_>) -> Result<User> {
    Ok(User {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        default_currency_id: row.get(4)?,
        ai_features_enabled: row.get::<_, i64>(5)? != 0,
    })
}

fn map_spending(row: &Row<'_>) -> Result<Spending> {
    Ok(Spending {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        name: row.get(3)?,
        category_id: row.get(4)?,
        date_of_log: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const USER_COLUMNS: &str =
    "id, telegram_id, username, first_name, default_currency_id, ai_features_enabled";
const SPENDING_COLUMNS: &str =
    "id, user_id, amount, name, category_id, date_of_log, created_at";

/// Look up a user by their Telegram id.
pub fn get_user_by_telegram_id(conn: &DbConnection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?1"),
        params![telegram_id],
        map_user,
    )
    .optional()
}

/// Create the user on first contact, refresh their name fields after.
///
/// `username` and `first_name` only overwrite existing values when the
/// new payload actually carries them.
pub fn upsert_user(
    conn: &DbConnection,
    telegram_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
) -> Result<User> {
    conn.execute(
        "INSERT INTO users (telegram_id, username, first_name) VALUES (?1, ?2, ?3)
         ON CONFLICT(telegram_id) DO UPDATE SET
             username = COALESCE(excluded.username, users.username),
             first_name = COALESCE(excluded.first_name, users.first_name)",
        params![telegram_id, username, first_name],
    )?;

    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?1"),
        params![telegram_id],
        map_user,
    )
}

/// Set the user's default display currency.
pub fn set_default_currency(conn: &DbConnection, user_id: i64, currency_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET default_currency_id = ?2 WHERE id = ?1",
        params![user_id, currency_id],
    )?;
    Ok(())
}

/// Toggle the insights endpoint for a user.
pub fn set_ai_features(conn: &DbConnection, user_id: i64, enabled: bool) -> Result<()> {
    conn.execute(
        "UPDATE users SET ai_features_enabled = ?2 WHERE id = ?1",
        params![user_id, i64::from(enabled)],
    )?;
    Ok(())
}

/// All currencies, ordered by code.
pub fn list_currencies(conn: &DbConnection) -> Result<Vec<Currency>> {
    let mut stmt = conn.prepare("SELECT id, code, symbol, name FROM currencies ORDER BY code")?;
    let rows = stmt.query_map([], |row| {
        Ok(Currency {
            id: row.get(0)?,
            code: row.get(1)?,
            symbol: row.get(2)?,
            name: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub fn get_currency(conn: &DbConnection, currency_id: i64) -> Result<Option<Currency>> {
    conn.query_row(
        "SELECT id, code, symbol, name FROM currencies WHERE id = ?1",
        params![currency_id],
        |row| {
            Ok(Currency {
                id: row.get(0)?,
                code: row.get(1)?,
                symbol: row.get(2)?,
                name: row.get(3)?,
            })
        },
    )
    .optional()
}

/// All user-facing categories (the `undefined` sentinel is internal).
pub fn list_categories(conn: &DbConnection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, emoji, color FROM categories WHERE name != 'undefined' ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            emoji: row.get(2)?,
            color: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// Id of the `undefined` sentinel category, if seeded.
pub fn undefined_category_id(conn: &DbConnection) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM categories WHERE name = 'undefined'",
        [],
        |row| row.get(0),
    )
    .optional()
}

/// Record a spending for today.
pub fn insert_spending(
    conn: &DbConnection,
    user_id: i64,
    amount: f64,
    name: &str,
    category_id: Option<i64>,
) -> Result<Spending> {
    conn.query_row(
        &format!(
            "INSERT INTO spendings (user_id, amount, name, category_id) VALUES (?1, ?2, ?3, ?4)
             RETURNING {SPENDING_COLUMNS}"
        ),
        params![user_id, amount, name, category_id],
        map_spending,
    )
}

/// Spendings in `[start, end_exclusive)`, newest first.
pub fn spendings_for_range(
    conn: &DbConnection,
    user_id: i64,
    start: NaiveDate,
    end_exclusive: NaiveDate,
) -> Result<Vec<Spending>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SPENDING_COLUMNS} FROM spendings
         WHERE user_id = ?1 AND date_of_log >= ?2 AND date_of_log < ?3
         ORDER BY date_of_log DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![
            user_id,
            start.format("%Y-%m-%d").to_string(),
            end_exclusive.format("%Y-%m-%d").to_string()
        ],
        map_spending,
    )?;
    rows.collect()
}

/// Spendings in `[start, end]` joined with their categories, newest first.
pub fn spendings_with_categories_for_range(
    conn: &DbConnection,
    user_id: i64,
    start: NaiveDate,
    end_inclusive: NaiveDate,
) -> Result<Vec<SpendingWithCategory>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.user_id, s.amount, s.name, s.category_id, s.date_of_log, s.created_at,
                c.name, c.emoji
         FROM spendings s
         LEFT JOIN categories c ON c.id = s.category_id
         WHERE s.user_id = ?1 AND s.date_of_log >= ?2 AND s.date_of_log <= ?3
         ORDER BY s.date_of_log DESC, s.created_at DESC",
    )?;
    let rows = stmt.query_map(
        params![
            user_id,
            start.format("%Y-%m-%d").to_string(),
            end_inclusive.format("%Y-%m-%d").to_string()
        ],
        |row| {
            Ok(SpendingWithCategory {
                spending: map_spending(row)?,
                category_name: row.get(7)?,
                category_emoji: row.get(8)?,
            })
        },
    )?;
    rows.collect()
}

/// Spendings awaiting categorization: no category, or the sentinel one.
pub fn uncategorized_spendings(conn: &DbConnection, user_id: i64) -> Result<Vec<Spending>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SPENDING_COLUMNS} FROM spendings
         WHERE user_id = ?1
           AND (category_id IS NULL
                OR category_id = (SELECT id FROM categories WHERE name = 'undefined'))
         ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map(params![user_id], map_spending)?;
    rows.collect()
}

/// Fetch a spending only if it belongs to the user. Ownership checks for
/// the update endpoints go through here.
pub fn get_spending_for_user(
    conn: &DbConnection,
    spending_id: i64,
    user_id: i64,
) -> Result<Option<Spending>> {
    conn.query_row(
        &format!("SELECT {SPENDING_COLUMNS} FROM spendings WHERE id = ?1 AND user_id = ?2"),
        params![spending_id, user_id],
        map_spending,
    )
    .optional()
}

/// Rewrite a spending's amount and name. The `user_id` predicate makes
/// cross-user updates a no-op even if the ownership check was skipped.
pub fn update_spending(
    conn: &DbConnection,
    spending_id: i64,
    user_id: i64,
    amount: f64,
    name: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE spendings SET amount = ?3, name = ?4 WHERE id = ?1 AND user_id = ?2",
        params![spending_id, user_id, amount, name],
    )?;
    Ok(())
}

/// Assign (or clear) a spending's category.
pub fn set_spending_category(
    conn: &DbConnection,
    spending_id: i64,
    user_id: i64,
    category_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE spendings SET category_id = ?3 WHERE id = ?1 AND user_id = ?2",
        params![spending_id, user_id, category_id],
    )?;
    Ok(())
}
