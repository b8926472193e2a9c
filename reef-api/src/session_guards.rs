//! Session-based authentication and role guards for Rocket routes.
//!
//! ```rust,ignore
//! #[get("/1/readings/names")]
//! async fn names(db: DbConn, _user: AuthenticatedUser) -> ... { ... }
//!
//! #[post("/1/readings", data = "<reading>")]
//! async fn create(db: DbConn, _admin: AdminUser, reading: LoggedJson<ReadingInput>) -> ... { ... }
//! ```
//!
//! A request without a valid `session` cookie fails with 401. A valid
//! session that lacks the required role fails with 403.

use chrono::Utc;
use diesel::prelude::*;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};

use crate::DbConn;
use crate::config::ReefConfig;
use crate::models::{Role, Session, User};
use crate::orm::run_bounded;
use crate::orm::user_role::get_user_roles;
use crate::schema::{sessions, users};

/// A logged-in user together with all of their roles.
///
/// Validation steps: read the `session` cookie, find a non-revoked,
/// unexpired session row, load its user, load the user's roles. A user
/// with no roles is treated as unauthenticated.
#[derive(Debug)]
pub struct AuthenticatedUser {
    pub user: User,
    pub roles: Vec<Role>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let session_id = match request.cookies().get("session") {
            Some(cookie) => cookie.value().to_string(),
            None => return Outcome::Error((Status::Unauthorized, ())),
        };

        let db = match request.guard::<DbConn>().await {
            Outcome::Success(db) => db,
            _ => return Outcome::Error((Status::ServiceUnavailable, ())),
        };

        let limit = request
            .rocket()
            .state::<ReefConfig>()
            .map(ReefConfig::store_timeout)
            .unwrap_or_else(|| ReefConfig::default().store_timeout());

        let lookup = run_bounded(
            &db,
            limit,
            move |conn| -> Result<Option<(User, Vec<Role>)>, diesel::result::Error> {
                let session = sessions::table
                    .filter(sessions::id.eq(&session_id))
                    .filter(sessions::revoked.eq(false))
                    .filter(
                        sessions::expires_at
                            .is_null()
                            .or(sessions::expires_at.gt(Utc::now().naive_utc())),
                    )
                    .first::<Session>(conn)
                    .optional()?;

                let Some(session) = session else {
                    return Ok(None);
                };

                let user = users::table
                    .filter(users::id.eq(session.user_id))
                    .select(User::as_select())
                    .first(conn)
                    .optional()?;

                match user {
                    Some(user) => {
                        let roles = get_user_roles(conn, user.id)?;
                        Ok(Some((user, roles)))
                    }
                    None => Ok(None),
                }
            },
        )
        .await;

        match lookup {
            Ok(Ok(Some((user, roles)))) if !roles.is_empty() => {
                Outcome::Success(AuthenticatedUser { user, roles })
            }
            Ok(Ok(_)) => Outcome::Error((Status::Unauthorized, ())),
            Ok(Err(e)) => {
                error!("Database error validating session: {:?}", e);
                Outcome::Error((Status::ServiceUnavailable, ()))
            }
            Err(e) => {
                error!("Session lookup failed: {}", e);
                Outcome::Error((Status::ServiceUnavailable, ()))
            }
        }
    }
}

impl AuthenticatedUser {
    pub fn has_role(&self, role_name: &str) -> bool {
        self.roles.iter().any(|r| r.name == role_name)
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }
}

/// Creates a request guard that additionally requires one named role.
macro_rules! create_role_guard {
    ($name:ident, $role:expr) => {
        #[derive(Debug)]
        pub struct $name {
            pub user: User,
            pub roles: Vec<Role>,
        }

        #[rocket::async_trait]
        impl<'r> FromRequest<'r> for $name {
            type Error = ();

            async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
                let auth_user = match AuthenticatedUser::from_request(request).await {
                    Outcome::Success(user) => user,
                    Outcome::Error(e) => return Outcome::Error(e),
                    Outcome::Forward(f) => return Outcome::Forward(f),
                };

                if auth_user.has_role($role) {
                    Outcome::Success($name {
                        user: auth_user.user,
                        roles: auth_user.roles,
                    })
                } else {
                    Outcome::Error((Status::Forbidden, ()))
                }
            }
        }
    };
}

// May create, edit and soft-delete readings and manage users.
create_role_guard!(AdminUser, "admin");
