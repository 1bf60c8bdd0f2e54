mod hash;

use log::{info, warn};
use rusqlite::{Connection, OptionalExtension, params};
use std::fmt;
use std::path::Path;

pub use hash::DEFAULT_ITERATIONS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration
{
    Created,
    AlreadyExists,
}

#[derive(Debug)]
pub enum StoreError
{
    InvalidUsername,
    EmptyPassword,
    Database(rusqlite::Error),
}

impl fmt::Display for StoreError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            StoreError::InvalidUsername => write!(f, "Username must not be empty"),
            StoreError::EmptyPassword => write!(f, "Password must not be empty"),
            StoreError::Database(err) => write!(f, "Credential database error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError
{
    fn from(err: rusqlite::Error) -> Self
    {
        StoreError::Database(err)
    }
}

/// Username -> password hash table backed by SQLite.
pub struct CredentialStore
{
    conn: Connection,
    iterations: u32,
}

impl CredentialStore
{
    pub fn open(path: &Path) -> Result<Self, StoreError>
    {
        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        info!(
            "Opened credential store at {} ({} users)",
            path.display(),
            store.count()?
        );
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError>
    {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError>
    {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn,
            iterations: DEFAULT_ITERATIONS,
        })
    }

    /// Work factor used for hashes created from now on. Existing rows keep
    /// the count they were stored with.
    pub fn with_iterations(mut self, iterations: u32) -> Self
    {
        self.iterations = iterations.max(1);
        self
    }

    pub fn create(&self, username: &str, password: &str) -> Result<Registration, StoreError>
    {
        let username = normalize_username(username)?;
        if password.is_empty() {
            return Err(StoreError::EmptyPassword);
        }

        let password_hash = hash::hash_password(password, self.iterations);
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        )?;

        if inserted == 0 {
            Ok(Registration::AlreadyExists)
        } else {
            Ok(Registration::Created)
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError>
    {
        let username = match normalize_username(username) {
            Ok(name) => name,
            Err(_) => return Ok(false),
        };

        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        let Some(stored) = stored else {
            return Ok(false);
        };

        match hash::verify_password(password, &stored) {
            Ok(matches) => Ok(matches),
            Err(err) => {
                warn!("Stored hash for a user is unreadable: {err}");
                Ok(false)
            }
        }
    }

    pub fn contains(&self, username: &str) -> Result<bool, StoreError>
    {
        let username = match normalize_username(username) {
            Ok(name) => name,
            Err(_) => return Ok(false),
        };
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count(&self) -> Result<usize, StoreError>
    {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn normalize_username(username: &str) -> Result<&str, StoreError>
{
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidUsername);
    }
    Ok(trimmed)
}
