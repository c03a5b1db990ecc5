//! SQLite-backed message store.
//!
//! Every write runs inside a transaction, and validation happens before the
//! first statement, so a failed write never leaves a partial change behind.

use std::cmp;

use chrono::{NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::config::DatabaseConfig;
use crate::models::{validate_body, Message, NewMessage};
use crate::schema::messages;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Message not found")]
    NotFound,

    #[error(transparent)]
    Query(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::PoolError),

    #[error("migration failed: {0}")]
    Migration(Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid database url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug)]
struct BusyTimeout(u64);

impl CustomizeConnection<SqliteConnection, r2d2::Error> for BusyTimeout {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", self.0))
            .map_err(r2d2::Error::QueryError)
    }
}

/// Cloneable handle to the message table, one per request handler.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    pub fn open(config: &DatabaseConfig) -> Result<Store, StoreError> {
        let path = config.database_path()?;
        let builder = Pool::builder()
            .connection_customizer(Box::new(BusyTimeout(config.busy_timeout_ms)));
        // Every in-memory connection is its own database: keep exactly one alive.
        let builder = if path == ":memory:" {
            builder.max_size(1).idle_timeout(None).max_lifetime(None)
        } else {
            builder.max_size(config.pool_size.max(1))
        };
        let pool = builder.build(ConnectionManager::<SqliteConnection>::new(path.as_str()))?;
        info!("Opened message store at {} (pool size {})", path, pool.max_size());
        let store = Store { pool };
        store.migrate()?;
        Ok(store)
    }

    /// Fresh private database, used by tests and throwaway runs.
    pub fn in_memory() -> Result<Store, StoreError> {
        Store::open(&DatabaseConfig {
            url: "sqlite://".to_string(),
            ..DatabaseConfig::default()
        })
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let mut pooled = self.connection()?;
        let conn: &mut SqliteConnection = &mut pooled;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(StoreError::Migration)?;
        for version in applied {
            info!("Applied migration {}", version);
        }
        Ok(())
    }

    fn connection(
        &self,
    ) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Every message, oldest first; equal timestamps keep insertion order.
    pub fn list_all(&self) -> Result<Vec<Message>, StoreError> {
        let mut conn = self.connection()?;
        let messages = messages::table
            .order((messages::created_at.asc(), messages::id.asc()))
            .select(Message::as_select())
            .load(&mut conn)?;
        Ok(messages)
    }

    pub fn find(&self, id: i32) -> Result<Message, StoreError> {
        let mut conn = self.connection()?;
        find_message(&mut conn, id)
    }

    pub fn create(&self, body: &str, username: &str) -> Result<Message, StoreError> {
        let new_message = NewMessage::new(body, username, now())?;
        let mut conn = self.connection()?;
        conn.transaction(|conn| insert_message(conn, &new_message))
    }

    /// Replaces the body. `username` and `created_at` never change.
    pub fn update(&self, id: i32, body: &str) -> Result<Message, StoreError> {
        let mut conn = self.connection()?;
        conn.transaction(|conn| {
            let existing = find_message(conn, id)?;
            let body = validate_body(body)?;
            let updated_at = cmp::max(now(), existing.updated_at);

            let message = diesel::update(messages::table.find(id))
                .set((messages::body.eq(body), messages::updated_at.eq(updated_at)))
                .returning(Message::as_returning())
                .get_result(conn)?;
            Ok(message)
        })
    }

    pub fn delete(&self, id: i32) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        conn.transaction(|conn| {
            let deleted = diesel::delete(messages::table.find(id)).execute(conn)?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Removes every message and returns how many were removed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut conn = self.connection()?;
        clear_messages(&mut conn)
    }

    /// Runs `f` in one transaction; any error rolls back everything it did.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError>,
    {
        let mut conn = self.connection()?;
        conn.transaction(|conn| f(conn))
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn find_message(conn: &mut SqliteConnection, id: i32) -> Result<Message, StoreError> {
    messages::table
        .find(id)
        .select(Message::as_select())
        .first(conn)
        .optional()?
        .ok_or(StoreError::NotFound)
}

pub(crate) fn insert_message(
    conn: &mut SqliteConnection,
    new_message: &NewMessage<'_>,
) -> Result<Message, StoreError> {
    let message = diesel::insert_into(messages::table)
        .values(new_message)
        .returning(Message::as_returning())
        .get_result(conn)?;
    Ok(message)
}

pub(crate) fn clear_messages(conn: &mut SqliteConnection) -> Result<usize, StoreError> {
    Ok(diesel::delete(messages::table).execute(conn)?)
}

pub(crate) fn new_message<'a>(body: &'a str, username: &'a str) -> Result<NewMessage<'a>, StoreError> {
    NewMessage::new(body, username, now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EMPTY_BODY, EMPTY_USERNAME};
    use std::collections::HashSet;

    fn store() -> Store {
        Store::in_memory().unwrap()
    }

    #[test]
    fn empty_store_lists_nothing() {
        assert!(store().list_all().unwrap().is_empty());
    }

    #[test]
    fn create_assigns_unique_ids_and_equal_timestamps() {
        let store = store();
        let mut ids = HashSet::new();
        for i in 0..20 {
            let message = store.create(&format!("message {}", i), "alice").unwrap();
            assert!(ids.insert(message.id));
            assert_eq!(message.created_at, message.updated_at);
            assert_eq!(message.username, "alice");
        }
        assert_eq!(store.list_all().unwrap().len(), 20);
    }

    #[test]
    fn invalid_fields_never_persist() {
        let store = store();
        for (body, username, expected) in [
            ("", "alice", EMPTY_BODY),
            ("   ", "alice", EMPTY_BODY),
            ("hi", "", EMPTY_USERNAME),
            ("hi", " \t ", EMPTY_USERNAME),
            (" ", " ", EMPTY_BODY),
        ] {
            match store.create(body, username) {
                Err(StoreError::Validation(message)) => assert_eq!(message, expected),
                other => panic!("expected validation error, got {:?}", other),
            }
        }
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn list_is_ordered_by_creation() {
        let store = store();
        let created: Vec<i32> = ["a", "b", "c", "d"]
            .iter()
            .map(|body| store.create(body, "bob").unwrap().id)
            .collect();

        let listed = store.list_all().unwrap();
        let ids: Vec<i32> = listed.iter().map(|message| message.id).collect();
        assert_eq!(ids, created);
        assert!(listed.windows(2).all(|pair| pair[0].created_at <= pair[1].created_at));
    }

    #[test]
    fn update_changes_only_body_and_updated_at() {
        let store = store();
        let original = store.create("first", "carol").unwrap();
        let updated = store.update(original.id, "second").unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.body, "second");
        assert_eq!(updated.username, original.username);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(store.find(original.id).unwrap(), updated);
    }

    #[test]
    fn failed_update_leaves_record_untouched() {
        let store = store();
        let original = store.create("keep me", "dana").unwrap();

        match store.update(original.id, "  ") {
            Err(StoreError::Validation(message)) => assert_eq!(message, EMPTY_BODY),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(store.find(original.id).unwrap(), original);
        assert!(matches!(store.update(original.id + 1, "x"), Err(StoreError::NotFound)));
    }

    #[test]
    fn delete_is_not_idempotent() {
        let store = store();
        let message = store.create("bye", "eve").unwrap();

        store.delete(message.id).unwrap();
        assert!(matches!(store.delete(message.id), Err(StoreError::NotFound)));
        assert!(matches!(store.find(message.id), Err(StoreError::NotFound)));
        assert!(matches!(store.update(message.id, "back"), Err(StoreError::NotFound)));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let store = store();
        let last = store.create("last", "frank").unwrap();
        store.delete(last.id).unwrap();

        let next = store.create("next", "frank").unwrap();
        assert!(next.id > last.id);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let store = store();
        let result: Result<(), StoreError> = store.transaction(|conn| {
            insert_message(conn, &new_message("partial", "grace")?)?;
            Err(StoreError::NotFound)
        });
        assert!(result.is_err());
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn clear_reports_removed_rows() {
        let store = store();
        store.create("one", "admin").unwrap();
        store.create("two", "admin").unwrap();
        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: dir.path().join("messages.db").to_string_lossy().into_owned(),
            ..DatabaseConfig::default()
        };

        let id = {
            let store = Store::open(&config).unwrap();
            let message = store.create("persisted", "alice").unwrap();
            store.delete(store.create("dropped", "alice").unwrap().id).unwrap();
            message.id
        };

        let store = Store::open(&config).unwrap();
        let messages = store.list_all().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, id);
        assert!(store.create("again", "alice").unwrap().id > id + 1);
    }
}
