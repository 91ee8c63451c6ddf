// Storage module: SQLite-backed offer store.

pub mod sqlite;

pub use sqlite::SqliteStorage;
