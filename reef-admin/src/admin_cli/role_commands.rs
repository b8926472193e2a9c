use clap::Subcommand;
use diesel::sqlite::SqliteConnection;
use reef_api::models::Role;
use reef_api::orm::role::{get_all_roles, get_role_by_name};
use reef_api::orm::user::get_user_by_email;
use reef_api::orm::user_role::{assign_user_role_by_name, get_user_roles, remove_user_role_by_name};

use crate::admin_cli::utils::filter_by_term;

#[derive(Subcommand)]
pub enum RoleAction {
    #[command(about = "List roles, optionally filtered by search term")]
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
    #[command(about = "Grant a role to a user")]
    Assign {
        #[arg(short, long, help = "User email address")]
        email: String,
        #[arg(short, long, help = "Role name to grant")]
        role: String,
    },
    #[command(about = "Take a role away from a user")]
    Remove {
        #[arg(short, long, help = "User email address")]
        email: String,
        #[arg(short, long, help = "Role name to remove")]
        role: String,
    },
}

pub fn handle_role_command_with_conn(
    conn: &mut SqliteConnection,
    action: RoleAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RoleAction::Ls {
            search_term,
            fixed_string,
        } => {
            role_ls_impl(conn, search_term.as_deref(), fixed_string)?;
        }
        RoleAction::Assign { email, role } => {
            role_assign_impl(conn, &email, &role)?;
        }
        RoleAction::Remove { email, role } => {
            role_remove_impl(conn, &email, &role)?;
        }
    }
    Ok(())
}

pub fn role_ls_impl(
    conn: &mut SqliteConnection,
    search_term: Option<&str>,
    fixed_string: bool,
) -> Result<Vec<Role>, Box<dyn std::error::Error>> {
    let roles = filter_by_term(get_all_roles(conn)?, search_term, fixed_string, |r| {
        r.name.as_str()
    })?;

    if roles.is_empty() {
        println!("No roles found.");
    } else {
        println!("Roles:");
        for role in &roles {
            let desc = role.description.as_deref().unwrap_or("(no description)");
            println!(
                "  ID: {}, Name: {}, Description: {}",
                role.id, role.name, desc
            );
        }
    }

    Ok(roles)
}

pub fn role_assign_impl(
    conn: &mut SqliteConnection,
    email: &str,
    role_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = get_user_by_email(conn, email)?
        .ok_or_else(|| format!("User with email '{}' not found", email))?;
    get_role_by_name(conn, role_name)?
        .ok_or_else(|| format!("Role '{}' not found", role_name))?;

    let current_roles = get_user_roles(conn, user.id)?;
    if current_roles.iter().any(|r| r.name == role_name) {
        println!("User '{}' already has role '{}'", email, role_name);
        return Ok(());
    }

    assign_user_role_by_name(conn, user.id, role_name)?;
    println!("Successfully added role '{}' to user '{}'", role_name, email);

    Ok(())
}

pub fn role_remove_impl(
    conn: &mut SqliteConnection,
    email: &str,
    role_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = get_user_by_email(conn, email)?
        .ok_or_else(|| format!("User with email '{}' not found", email))?;
    get_role_by_name(conn, role_name)?
        .ok_or_else(|| format!("Role '{}' not found", role_name))?;

    let current_roles = get_user_roles(conn, user.id)?;
    if !current_roles.iter().any(|r| r.name == role_name) {
        println!("User '{}' does not have role '{}'", email, role_name);
        return Ok(());
    }

    if current_roles.len() <= 1 {
        return Err(format!(
            "Cannot remove role '{}' from user '{}': users must have at least one role",
            role_name, email
        )
        .into());
    }

    remove_user_role_by_name(conn, user.id, role_name)?;
    println!("Successfully removed role '{}' from user '{}'", role_name, email);

    Ok(())
}
