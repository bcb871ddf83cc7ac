//! SQLite storage for Crier user profiles

mod sqlite;

pub use sqlite::SqliteProfileStore;
