use diesel::prelude::*;
use dotenvy::dotenv;
use rocket::Rocket;
use rocket::fairing::AdHoc;

use crate::models::{User, UserInput};
use crate::orm::DbConn;
use crate::orm::login::hash_password;
use crate::orm::user::{get_user_by_email, insert_user};
use crate::orm::user_role::{assign_user_role_by_name, user_has_role};

const ADMIN_ROLES: [&str; 2] = ["admin", "viewer"];

/// Adds the default admin user if needed.
///
/// The email and password come from `REEF_DEFAULT_EMAIL` and
/// `REEF_DEFAULT_PASSWORD`.
pub fn admin_init_fairing() -> AdHoc {
    AdHoc::try_on_ignite("Admin User Initialization", |rocket| async {
        dotenv().ok();

        let conn = match get_db_connection(&rocket).await {
            Some(conn) => conn,
            None => return Err(rocket),
        };

        let admin_email = get_admin_email();
        let result = conn
            .run(move |c| create_admin_user_if_needed(c, &admin_email))
            .await;

        match result {
            Ok(()) => Ok(rocket),
            Err(e) => {
                error!("[admin-init] FATAL: Admin user creation failed: {:?}", e);
                Err(rocket)
            }
        }
    })
}

async fn get_db_connection(rocket: &Rocket<rocket::Build>) -> Option<DbConn> {
    match DbConn::get_one(rocket).await {
        Some(conn) => Some(conn),
        None => {
            error!("[admin-init] ERROR: Could not get DB connection.");
            None
        }
    }
}

fn get_admin_email() -> String {
    std::env::var("REEF_DEFAULT_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string())
}

fn get_admin_password() -> String {
    std::env::var("REEF_DEFAULT_PASSWORD").unwrap_or_else(|_| "admin".to_string())
}

fn create_admin_user_if_needed(
    c: &mut SqliteConnection,
    admin_email: &str,
) -> Result<(), diesel::result::Error> {
    let user = match get_user_by_email(c, admin_email)? {
        Some(existing) => {
            info!("[admin-init] Admin user '{}' already exists", admin_email);
            existing
        }
        None => create_admin_user(c, admin_email)?,
    };

    for role_name in ADMIN_ROLES {
        if !user_has_role(c, user.id, role_name)? {
            assign_user_role_by_name(c, user.id, role_name)?;
            info!("[admin-init] Assigned role '{}' to user '{}'", role_name, admin_email);
        }
    }

    Ok(())
}

fn create_admin_user(
    c: &mut SqliteConnection,
    admin_email: &str,
) -> Result<User, diesel::result::Error> {
    let admin_user = UserInput {
        email: admin_email.to_string(),
        password_hash: hash_password(&get_admin_password()),
    };

    match insert_user(c, admin_user) {
        Ok(user) => {
            info!("[admin-init] Created admin user: '{}'", admin_email);
            Ok(user)
        }
        Err(e) => {
            error!("[admin-init] ERROR creating admin user: {:?}", e);
            Err(e)
        }
    }
}
