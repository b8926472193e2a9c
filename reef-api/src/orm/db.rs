use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use rocket::fairing::AdHoc;
use rocket::tokio::time::timeout;
use rocket_sync_db_pools::{database, diesel};

use crate::error::{ReadingError, StoreTimeout};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../migrations");

#[database("sqlite_db")]
pub struct DbConn(diesel::SqliteConnection);

/// Enables foreign key support for SQLite connections.
///
/// This executes the `PRAGMA foreign_keys = ON` command on the provided
/// connection. Foreign keys are disabled by default in SQLite for backwards
/// compatibility.
///
/// # Panics
/// Panics if the PRAGMA command fails to execute
pub fn set_foreign_keys(conn: &mut diesel::SqliteConnection) {
    conn.batch_execute("PRAGMA foreign_keys = ON")
        .expect("Failed to enable foreign keys");
}

/// Creates a Rocket fairing that enables foreign key support for SQLite
/// connections.
pub fn set_foreign_keys_fairing() -> AdHoc {
    AdHoc::on_ignite("Set Foreign Keys", |rocket| async {
        let conn = DbConn::get_one(&rocket).await.expect("database connection for foreign keys");
        conn.run(|c| {
            set_foreign_keys(c);
        })
        .await;
        rocket
    })
}

/// Runs all pending database migrations on the provided connection.
///
/// # Panics
/// Panics if any migration fails to run
pub fn run_pending_migrations(conn: &mut diesel::SqliteConnection) {
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run pending migrations");
}

/// Creates a Rocket fairing that runs database migrations on ignition.
pub fn run_migrations_fairing() -> AdHoc {
    AdHoc::on_ignite("Diesel Migrations", |rocket| async {
        let conn = DbConn::get_one(&rocket).await.expect("database connection for migration");
        conn.run(|c| {
            run_pending_migrations(c);
        })
        .await;
        rocket
    })
}

/// Runs `f` on a pooled connection, giving up after `limit`.
///
/// The blocking work itself is not cancelled; a late result is discarded.
pub async fn run_bounded<F, R>(db: &DbConn, limit: Duration, f: F) -> Result<R, StoreTimeout>
where
    F: FnOnce(&mut diesel::SqliteConnection) -> R + Send + 'static,
    R: Send + 'static,
{
    timeout(limit, db.run(f)).await.map_err(|_| {
        error!("Store call exceeded {:?}", limit);
        StoreTimeout(limit)
    })
}

/// [`run_bounded`] for reading-store closures: a timeout is reported as
/// [`ReadingError::StorageUnavailable`].
pub async fn run_with_timeout<F, R>(db: &DbConn, limit: Duration, f: F) -> Result<R, ReadingError>
where
    F: FnOnce(&mut diesel::SqliteConnection) -> Result<R, ReadingError> + Send + 'static,
    R: Send + 'static,
{
    run_bounded(db, limit, f).await?
}
