// Infrastructure - storage backends and the request viewer context
pub mod database;              // Storage traits and backend selection
pub mod middleware;            // ViewerContext middleware and extractor
pub mod postgres_database;     // PostgreSQL backend
pub mod sqlite_database;       // SQLite backend (tests and local development)
pub mod viewer;                // Viewer context

pub use database::{connect, MembershipRepository, Storage, StoreTransaction, VolunteerStore};
pub use postgres_database::PostgresDatabase;
pub use sqlite_database::SqliteDatabase;
pub use viewer::ViewerContext;
