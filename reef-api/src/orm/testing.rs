//! Test fixtures: in-memory connections for unit tests and a fully wired
//! Rocket instance for integration tests.

use std::cell::RefCell;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rocket::figment::{
    util::map,
    value::{Map, Value},
};
use rocket::{Build, Rocket, fairing::AdHoc};

use super::db::{DbConn, run_pending_migrations, set_foreign_keys};
use crate::admin_init_fairing::admin_init_fairing;
use crate::config::config_fairing;
use crate::models::UserInput;
use crate::orm::login::hash_password;
use crate::orm::user::{get_user_by_email, insert_user};
use crate::orm::user_role::assign_user_role_by_name;

/// Known accounts seeded into every `test_rocket()` database:
/// `(email, password, roles)`.
pub const TEST_USERS: &[(&str, &str, &[&str])] = &[
    ("keeper@reef.example", "keeperpass", &["admin", "viewer"]),
    ("viewer@reef.example", "viewerpass", &["viewer"]),
];

fn test_data_init_fairing() -> AdHoc {
    AdHoc::on_ignite("Test Data Initialization", |rocket| async {
        let conn = DbConn::get_one(&rocket)
            .await
            .expect("database connection for test data initialization");

        conn.run(|c| {
            if let Err(e) = create_test_data(c) {
                eprintln!("[test-data-init] ERROR: Failed to create test data: {:?}", e);
            }
        })
        .await;

        rocket
    })
}

fn create_test_data(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    for (user_email, password, role_names) in TEST_USERS {
        if get_user_by_email(conn, user_email)?.is_some() {
            continue;
        }

        let user = insert_user(
            conn,
            UserInput {
                email: user_email.to_string(),
                password_hash: hash_password(password),
            },
        )?;

        for role_name in role_names.iter() {
            assign_user_role_by_name(conn, user.id, role_name)?;
        }
    }
    Ok(())
}

/// Builds a Rocket instance backed by a fresh shared-cache in-memory
/// database.
///
/// Every pooled connection opens the same uniquely named in-memory
/// database, which disappears with the pool. Migrations, the default
/// admin, the `TEST_USERS` accounts and all API routes are in place.
pub fn test_rocket() -> Rocket<Build> {
    use uuid::Uuid;

    let db_url = format!("file:reef_test_{}?mode=memory&cache=shared", Uuid::new_v4());

    let db_config: Map<_, Value> = map! {
        "url" => db_url.into(),
        "pool_size" => 5.into(),
        "timeout" => 5.into(),
    };

    let figment = rocket::Config::figment().merge(("databases", map!["sqlite_db" => db_config]));

    let rocket = rocket::custom(figment)
        .attach(DbConn::fairing())
        .attach(super::db::set_foreign_keys_fairing())
        .attach(super::db::run_migrations_fairing())
        .attach(config_fairing())
        .attach(admin_init_fairing())
        .attach(test_data_init_fairing());

    crate::mount_api_routes(rocket)
}

/// Returns a fresh in-memory SQLite connection with foreign keys enabled
/// and all migrations applied. Every call is an independent database.
pub fn setup_test_db() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:")
        .expect("Failed to create in-memory SQLite database");
    set_foreign_keys(&mut conn);
    run_pending_migrations(&mut conn);
    conn
}

/// Wraps a plain connection so code written against the async `.run()`
/// interface can be exercised in unit tests.
pub struct FakeDbConn<'a>(RefCell<&'a mut diesel::SqliteConnection>);

impl<'a> FakeDbConn<'a> {
    pub async fn run<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut diesel::SqliteConnection) -> R + Send + 'static,
        R: Send + 'static,
    {
        // Closures run to completion, so the borrow never spans an await.
        let mut conn = self.0.borrow_mut();
        f(&mut **conn)
    }
}

pub fn setup_test_dbconn<'a>(conn: &'a mut diesel::SqliteConnection) -> FakeDbConn<'a> {
    FakeDbConn(RefCell::new(conn))
}
