use rusqlite::{Connection, Result};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

mod schema;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(database_url: &str) -> Result<Self> {
        if database_url != ":memory:" {
            if let Some(parent) = Path::new(database_url).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    let _ = std::fs::create_dir_all(parent);
                }
            }
        }

        let conn = Connection::open(database_url)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        self.conn().execute_batch(schema::SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs a synchronous database call on the blocking pool.
    pub async fn run_blocking<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    // --- Prefixes ---

    pub fn get_guild_prefixes(&self, guild_id: u64) -> anyhow::Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT guild_prefix FROM prefix_assignment WHERE guild_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map([guild_id as i64], |row| row.get(0))?;

        let mut prefixes = Vec::new();
        for row in rows {
            prefixes.push(row?);
        }
        Ok(prefixes)
    }

    /// Replaces every prefix of the guild in a single transaction.
    pub fn set_guild_prefixes(&self, guild_id: u64, prefixes: &[String]) -> anyhow::Result<()> {
        debug!("Database: Setting {} prefixes for guild {}", prefixes.len(), guild_id);
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM prefix_assignment WHERE guild_id = ?1",
            [guild_id as i64],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO prefix_assignment (guild_id, guild_prefix) VALUES (?1, ?2)",
            )?;
            for prefix in prefixes {
                insert.execute((guild_id as i64, prefix))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn reset_guild_prefixes(&self, guild_id: u64) -> anyhow::Result<usize> {
        let count = self.conn().execute(
            "DELETE FROM prefix_assignment WHERE guild_id = ?1",
            [guild_id as i64],
        )?;
        Ok(count)
    }

    // --- Message counter ---

    pub fn increment_message_count(&self, guild_id: u64, user_id: u64) -> anyhow::Result<()> {
        self.conn().execute(
            "INSERT INTO message_counter (guild_id, user_id) VALUES (?1, ?2)
             ON CONFLICT(guild_id, user_id) DO UPDATE SET message_count = message_count + 1",
            (guild_id as i64, user_id as i64),
        )?;
        Ok(())
    }

    pub fn get_message_count(&self, guild_id: u64, user_id: u64) -> anyhow::Result<u64> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT message_count FROM message_counter WHERE guild_id = ?1 AND user_id = ?2",
        )?;
        let mut rows = stmt.query((guild_id as i64, user_id as i64))?;

        if let Some(row) = rows.next()? {
            let count: i64 = row.get(0)?;
            Ok(count.max(0) as u64)
        } else {
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::new(":memory:").unwrap();
        db.execute_init().unwrap();
        db
    }

    #[test]
    fn test_db_init_is_idempotent() {
        let db = test_db();
        db.execute_init().unwrap();

        let conn = db.conn();
        assert!(conn.prepare("SELECT 1 FROM prefix_assignment").is_ok());
        assert!(conn.prepare("SELECT 1 FROM message_counter").is_ok());
    }

    #[test]
    fn test_guild_prefixes() {
        let db = test_db();

        assert!(db.get_guild_prefixes(123).unwrap().is_empty());

        db.set_guild_prefixes(123, &["!".to_string(), "?".to_string()]).unwrap();
        assert_eq!(db.get_guild_prefixes(123).unwrap(), vec!["!", "?"]);

        // Replacing drops the old rows entirely
        db.set_guild_prefixes(123, &["$".to_string()]).unwrap();
        assert_eq!(db.get_guild_prefixes(123).unwrap(), vec!["$"]);

        // Other guilds are untouched
        db.set_guild_prefixes(456, &["%".to_string()]).unwrap();
        assert_eq!(db.reset_guild_prefixes(123).unwrap(), 1);
        assert!(db.get_guild_prefixes(123).unwrap().is_empty());
        assert_eq!(db.get_guild_prefixes(456).unwrap(), vec!["%"]);
    }

    #[test]
    fn test_prefix_with_quotes_is_stored_verbatim() {
        let db = test_db();
        let tricky = "\"); DROP TABLE prefix_assignment; --".to_string();
        db.set_guild_prefixes(1, &[tricky.clone()]).unwrap();
        assert_eq!(db.get_guild_prefixes(1).unwrap(), vec![tricky]);
    }

    #[test]
    fn test_message_counter() {
        let db = test_db();

        assert_eq!(db.get_message_count(1, 10).unwrap(), 0);

        db.increment_message_count(1, 10).unwrap();
        db.increment_message_count(1, 10).unwrap();
        db.increment_message_count(1, 10).unwrap();
        db.increment_message_count(2, 10).unwrap();

        assert_eq!(db.get_message_count(1, 10).unwrap(), 3);
        assert_eq!(db.get_message_count(2, 10).unwrap(), 1);
        assert_eq!(db.get_message_count(1, 11).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_blocking() {
        let db = test_db();
        db.run_blocking(|db| db.increment_message_count(5, 6)).await.unwrap();
        let count = db.run_blocking(|db| db.get_message_count(5, 6)).await.unwrap();
        assert_eq!(count, 1);
    }
}
