#[macro_use]
extern crate rocket;

use rocket::figment::providers::{Env, Format, Toml};
use rocket::figment::{Figment, value::Map};
use rocket::request::Request;
use rocket::serde::json::{Json, Value, json};
use rocket::{Build, Rocket};

pub mod admin_init_fairing;
pub mod api;
pub mod config;
pub mod error;
pub mod logged_json;
pub mod models;
pub mod orm;
pub use orm::DbConn;
pub mod schema;
pub mod session_guards;
pub mod stats;

#[cfg(test)]
pub mod generate_types;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

fn error_body(reason: &str, status: u16, req: &Request) -> Json<Value> {
    Json(json!({
        "error": reason,
        "path": req.uri().path().to_string(),
        "status": status
    }))
}

#[catch(401)]
fn unauthorized(req: &Request) -> Json<Value> {
    error_body("Unauthorized", 401, req)
}

#[catch(403)]
fn forbidden(req: &Request) -> Json<Value> {
    error_body("Forbidden", 403, req)
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Value> {
    error_body("Not Found", 404, req)
}

#[catch(422)]
fn unprocessable_entity(req: &Request) -> Json<Value> {
    error_body("Unprocessable Entity", 422, req)
}

#[catch(500)]
fn internal_server_error(req: &Request) -> Json<Value> {
    error_body("Internal Server Error", 500, req)
}

#[catch(503)]
fn service_unavailable(req: &Request) -> Json<Value> {
    error_body("Service Unavailable", 503, req)
}

#[catch(default)]
fn default_catcher(status: rocket::http::Status, req: &Request) -> Json<Value> {
    error_body(status.reason().unwrap_or("Unknown Error"), status.code, req)
}

/// Mounts the JSON API under `/api` and registers the JSON catchers.
pub fn mount_api_routes(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/api", api::routes()).register(
        "/",
        catchers![
            unauthorized,
            forbidden,
            not_found,
            unprocessable_entity,
            internal_server_error,
            service_unavailable,
            default_catcher
        ],
    )
}

fn log_rocket_info(rocket: &Rocket<Build>) {
    let figment = rocket.figment();

    if let Ok(address) = figment.extract_inner::<String>("address") {
        info!("Rocket is running at: {}", address);
    }

    if let Ok(port) = figment.extract_inner::<u16>("port") {
        info!("Rocket is listening on port: {}", port);
    }

    match figment.extract_inner::<Map<String, Value>>("databases.sqlite_db") {
        Ok(db_config) => {
            if let Some(Value::String(url)) = db_config.get("url") {
                info!("Database URL: {}", url);
            } else {
                warn!("Database URL not found in configuration");
            }
        }
        Err(e) => {
            warn!("Failed to extract database configuration: {}", e);
        }
    }
}

/// Builds the production server.
///
/// `DATABASE_URL` (from the environment or `.env`) overrides any URL in
/// `Rocket.toml`. Tests use `orm::testing::test_rocket` instead.
pub fn rocket() -> Rocket<Build> {
    dotenvy::dotenv().ok();

    let mut figment = Figment::from(rocket::Config::default())
        .merge(Toml::file("Rocket.toml").nested())
        .merge(Env::prefixed("ROCKET_").global());

    match std::env::var("DATABASE_URL") {
        Ok(database_url) => figment = figment.merge(("databases.sqlite_db.url", database_url)),
        Err(_) => warn!("DATABASE_URL is not set; relying on Rocket.toml"),
    }

    let rocket = rocket::custom(figment)
        .attach(DbConn::fairing())
        .attach(orm::set_foreign_keys_fairing())
        .attach(orm::run_migrations_fairing())
        .attach(config::config_fairing())
        .attach(admin_init_fairing::admin_init_fairing());

    log_rocket_info(&rocket);

    mount_api_routes(rocket)
}
