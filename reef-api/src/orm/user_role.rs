use diesel::prelude::*;

use crate::models::{NewUserRole, Role};

/// Assigns a role to a user
pub fn assign_user_role(
    conn: &mut SqliteConnection,
    user_id_param: i32,
    role_id_param: i32,
) -> Result<(), diesel::result::Error> {
    use crate::schema::user_roles::dsl::*;

    let new_user_role = NewUserRole {
        user_id: user_id_param,
        role_id: role_id_param,
    };

    diesel::insert_into(user_roles)
        .values(&new_user_role)
        .execute(conn)?;

    Ok(())
}

/// Removes a role from a user.
///
/// The database refuses to remove a user's last role, which surfaces here
/// as a `DatabaseError`.
pub fn remove_user_role(
    conn: &mut SqliteConnection,
    user_id_param: i32,
    role_id_param: i32,
) -> Result<usize, diesel::result::Error> {
    use crate::schema::user_roles::dsl::*;

    diesel::delete(
        user_roles
            .filter(user_id.eq(user_id_param))
            .filter(role_id.eq(role_id_param)),
    )
    .execute(conn)
}

/// Gets all roles for a specific user
pub fn get_user_roles(
    conn: &mut SqliteConnection,
    user_id_param: i32,
) -> Result<Vec<Role>, diesel::result::Error> {
    use crate::schema::roles::dsl::*;
    use crate::schema::user_roles;

    roles
        .inner_join(user_roles::table.on(id.eq(user_roles::role_id)))
        .filter(user_roles::user_id.eq(user_id_param))
        .order(id.asc())
        .select((id, name, description))
        .load::<Role>(conn)
}

/// Checks if a user has a specific role by role name
pub fn user_has_role(
    conn: &mut SqliteConnection,
    user_id_param: i32,
    role_name: &str,
) -> Result<bool, diesel::result::Error> {
    use crate::schema::roles::dsl::*;
    use crate::schema::user_roles;

    let count: i64 = roles
        .inner_join(user_roles::table.on(id.eq(user_roles::role_id)))
        .filter(user_roles::user_id.eq(user_id_param))
        .filter(name.eq(role_name))
        .count()
        .get_result(conn)?;

    Ok(count > 0)
}

/// Assigns a role to a user by role name
pub fn assign_user_role_by_name(
    conn: &mut SqliteConnection,
    user_id_param: i32,
    role_name: &str,
) -> Result<(), diesel::result::Error> {
    use crate::schema::roles::dsl::*;

    let role = roles.filter(name.eq(role_name)).first::<Role>(conn)?;

    assign_user_role(conn, user_id_param, role.id)
}

/// Removes a role from a user by role name
pub fn remove_user_role_by_name(
    conn: &mut SqliteConnection,
    user_id_param: i32,
    role_name: &str,
) -> Result<usize, diesel::result::Error> {
    use crate::schema::roles::dsl::*;

    let role = roles.filter(name.eq(role_name)).first::<Role>(conn)?;

    remove_user_role(conn, user_id_param, role.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserInput;
    use crate::orm::login::hash_password;
    use crate::orm::user::insert_user;
    use crate::orm::testing::setup_test_db;

    fn insert_plain_user(conn: &mut SqliteConnection, email: &str) -> i32 {
        insert_user(
            conn,
            UserInput {
                email: email.to_string(),
                password_hash: hash_password("pw"),
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_assign_and_get_user_roles() {
        let mut conn = setup_test_db();
        let user_id = insert_plain_user(&mut conn, "reefer@example.com");

        assign_user_role_by_name(&mut conn, user_id, "viewer").unwrap();
        assign_user_role_by_name(&mut conn, user_id, "admin").unwrap();

        let roles = get_user_roles(&mut conn, user_id).unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "viewer"]);

        assert!(user_has_role(&mut conn, user_id, "admin").unwrap());
    }

    #[test]
    fn test_remove_user_role() {
        let mut conn = setup_test_db();
        let user_id = insert_plain_user(&mut conn, "reefer@example.com");

        assign_user_role_by_name(&mut conn, user_id, "viewer").unwrap();
        assign_user_role_by_name(&mut conn, user_id, "admin").unwrap();

        let removed = remove_user_role_by_name(&mut conn, user_id, "admin").unwrap();
        assert_eq!(removed, 1);
        assert!(!user_has_role(&mut conn, user_id, "admin").unwrap());
    }

    #[test]
    fn test_cannot_remove_last_role() {
        let mut conn = setup_test_db();
        let user_id = insert_plain_user(&mut conn, "reefer@example.com");

        assign_user_role_by_name(&mut conn, user_id, "viewer").unwrap();

        let result = remove_user_role_by_name(&mut conn, user_id, "viewer");
        assert!(result.is_err());
        assert!(user_has_role(&mut conn, user_id, "viewer").unwrap());
    }

    #[test]
    fn test_assign_unknown_role_fails() {
        let mut conn = setup_test_db();
        let user_id = insert_plain_user(&mut conn, "reefer@example.com");

        let result = assign_user_role_by_name(&mut conn, user_id, "janitor");
        assert!(matches!(result, Err(diesel::result::Error::NotFound)));
    }
}
