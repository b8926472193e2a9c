use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher};
use clap::Subcommand;
use diesel::Connection;
use diesel::sqlite::SqliteConnection;
use reef_api::models::{User, UserInput};
use reef_api::orm::role::get_role_by_name;
use reef_api::orm::user::{get_user_by_email, insert_user, list_all_users, update_password_hash};
use reef_api::orm::user_role::{assign_user_role_by_name, get_user_roles};
use rpassword::read_password;
use std::io::{self, Write};

use crate::admin_cli::utils::filter_by_term;

#[derive(Subcommand)]
pub enum UserAction {
    #[command(about = "List users, optionally filtered by search term")]
    Ls {
        #[arg(help = "Search term (regex by default, use -F for fixed string)")]
        search_term: Option<String>,
        #[arg(
            short = 'F',
            long = "fixed-string",
            help = "Treat search term as fixed string instead of regex"
        )]
        fixed_string: bool,
    },
    #[command(about = "Add a new user")]
    Add {
        #[arg(short, long, help = "Email address")]
        email: String,
        #[arg(short, long, help = "Password (will be prompted securely if not provided)")]
        password: Option<String>,
        #[arg(
            short,
            long = "role",
            default_value = "viewer",
            help = "Role to grant; repeat for several"
        )]
        roles: Vec<String>,
    },
    #[command(about = "Change user password")]
    Passwd {
        #[arg(short, long, help = "Email address")]
        email: String,
        #[arg(short, long, help = "New password (will be prompted securely if not provided)")]
        password: Option<String>,
    },
}

pub fn handle_user_command_with_conn(
    conn: &mut SqliteConnection,
    action: UserAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        UserAction::Ls {
            search_term,
            fixed_string,
        } => {
            list_users_impl(conn, search_term.as_deref(), fixed_string)?;
        }
        UserAction::Add {
            email,
            password,
            roles,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_for_password()?,
            };
            add_user_impl(conn, &email, &password, &roles)?;
        }
        UserAction::Passwd { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_for_password()?,
            };
            change_password_impl(conn, &email, &password)?;
        }
    }
    Ok(())
}

pub fn list_users_impl(
    conn: &mut SqliteConnection,
    search_term: Option<&str>,
    fixed_string: bool,
) -> Result<Vec<User>, Box<dyn std::error::Error>> {
    let users = filter_by_term(list_all_users(conn)?, search_term, fixed_string, |u| {
        u.email.as_str()
    })?;

    if users.is_empty() {
        println!("No users found.");
    } else {
        println!("Users:");
        for user in &users {
            let roles = get_user_roles(conn, user.id)?
                .into_iter()
                .map(|r| r.name)
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "  ID: {}, Email: {}, Roles: {}, Created: {}",
                user.id, user.email, roles, user.created_at
            );
        }
    }

    Ok(users)
}

/// Creates a user holding `role_names`. Unknown roles abort before
/// anything is written.
pub fn add_user_impl(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
    role_names: &[String],
) -> Result<User, Box<dyn std::error::Error>> {
    if email.trim().is_empty() || password.is_empty() {
        return Err("Email and password are required".into());
    }
    if role_names.is_empty() {
        return Err("A user needs at least one role".into());
    }
    for role_name in role_names {
        get_role_by_name(conn, role_name)?
            .ok_or_else(|| format!("Role '{}' not found", role_name))?;
    }
    if get_user_by_email(conn, email)?.is_some() {
        return Err(format!("User with email '{}' already exists", email).into());
    }

    let password_hash =
        hash_password(password).map_err(|e| format!("Failed to hash password: {}", e))?;

    let created_user = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let user = insert_user(
            conn,
            UserInput {
                email: email.trim().to_string(),
                password_hash,
            },
        )?;
        let mut granted: Vec<&String> = Vec::new();
        for role_name in role_names {
            if !granted.contains(&role_name) {
                assign_user_role_by_name(conn, user.id, role_name)?;
                granted.push(role_name);
            }
        }
        Ok(user)
    })?;

    println!("User created successfully!");
    println!("ID: {}", created_user.id);
    println!("Email: {}", created_user.email);

    Ok(created_user)
}

pub fn change_password_impl(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if password.is_empty() {
        return Err("Password cannot be empty".into());
    }

    let user = get_user_by_email(conn, email)?
        .ok_or_else(|| format!("User with email '{}' not found", email))?;
    let password_hash =
        hash_password(password).map_err(|e| format!("Failed to hash password: {}", e))?;
    update_password_hash(conn, user.id, password_hash)?;

    println!("Password changed successfully for user: {}", email);
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(password_hash.to_string())
}

pub fn prompt_for_password() -> Result<String, Box<dyn std::error::Error>> {
    print!("Enter new password: ");
    io::stdout().flush()?;
    let password = read_password()?;

    if password.is_empty() {
        return Err("Password cannot be empty".into());
    }

    print!("Confirm new password: ");
    io::stdout().flush()?;
    let confirm_password = read_password()?;

    if password != confirm_password {
        return Err("Passwords do not match".into());
    }

    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reef_api::orm::login::verify_password;
    use reef_api::orm::testing::setup_test_db;

    #[test]
    fn test_add_user_with_roles() {
        let mut conn = setup_test_db();
        let roles = vec!["admin".to_string(), "viewer".to_string(), "admin".to_string()];

        let user = add_user_impl(&mut conn, "diver@reef.example", "coral", &roles).unwrap();
        let granted: Vec<String> = get_user_roles(&mut conn, user.id)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(granted, vec!["admin", "viewer"]);
        assert!(verify_password("coral", &user.password_hash));
    }

    #[test]
    fn test_add_user_rejects_unknown_role_and_duplicates() {
        let mut conn = setup_test_db();

        let result = add_user_impl(&mut conn, "a@reef.example", "pw", &["janitor".to_string()]);
        assert!(result.is_err());
        assert!(get_user_by_email(&mut conn, "a@reef.example").unwrap().is_none());

        add_user_impl(&mut conn, "a@reef.example", "pw", &["viewer".to_string()]).unwrap();
        let again = add_user_impl(&mut conn, "A@reef.example", "pw", &["viewer".to_string()]);
        assert!(again.is_err());

        assert!(add_user_impl(&mut conn, "b@reef.example", "pw", &[]).is_err());
    }

    #[test]
    fn test_change_password() {
        let mut conn = setup_test_db();
        add_user_impl(&mut conn, "diver@reef.example", "old", &["viewer".to_string()]).unwrap();

        change_password_impl(&mut conn, "diver@reef.example", "new").unwrap();
        let user = get_user_by_email(&mut conn, "diver@reef.example").unwrap().unwrap();
        assert!(verify_password("new", &user.password_hash));
        assert!(!verify_password("old", &user.password_hash));

        assert!(change_password_impl(&mut conn, "nobody@reef.example", "x").is_err());
    }

    #[test]
    fn test_list_users_filter() {
        let mut conn = setup_test_db();
        add_user_impl(&mut conn, "diver@reef.example", "pw", &["viewer".to_string()]).unwrap();
        add_user_impl(&mut conn, "keeper@lagoon.example", "pw", &["admin".to_string()]).unwrap();

        let found = list_users_impl(&mut conn, Some("reef"), true).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "diver@reef.example");

        let found = list_users_impl(&mut conn, Some("^keeper@"), false).unwrap();
        assert_eq!(found.len(), 1);
    }
}
