use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::BigInt;

use crate::models::{NewUser, User, UserInput, UserWithRoles};
use crate::orm::user_role::get_user_roles;

#[derive(QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = BigInt)]
    last_insert_rowid: i64,
}

/// Inserts a new user (timestamps handled by column defaults)
pub fn insert_user(
    conn: &mut SqliteConnection,
    new_user: UserInput,
) -> Result<User, diesel::result::Error> {
    use crate::schema::users::dsl::*;

    let insertable_user = NewUser {
        email: new_user.email,
        password_hash: new_user.password_hash,
    };

    diesel::insert_into(users)
        .values(&insertable_user)
        .execute(conn)?;

    let last_id = diesel::sql_query("SELECT last_insert_rowid() as last_insert_rowid")
        .get_result::<LastInsertRowId>(conn)?
        .last_insert_rowid;

    let last_id = i32::try_from(last_id)
        .map_err(|e| diesel::result::Error::DeserializationError(Box::new(e)))?;
    users
        .filter(id.eq(last_id))
        .select(User::as_select())
        .first(conn)
}

/// Returns all users in ascending order by id.
pub fn list_all_users(conn: &mut SqliteConnection) -> Result<Vec<User>, diesel::result::Error> {
    use crate::schema::users::dsl::*;
    users.order(id.asc()).select(User::as_select()).load(conn)
}

/// Returns every user together with their roles, ordered by id.
pub fn list_users_with_roles(
    conn: &mut SqliteConnection,
) -> Result<Vec<UserWithRoles>, diesel::result::Error> {
    list_all_users(conn)?
        .into_iter()
        .map(|user| {
            let roles = get_user_roles(conn, user.id)?;
            Ok(UserWithRoles::new(user, roles))
        })
        .collect()
}

/// Gets a single user by ID.
pub fn get_user(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> Result<Option<User>, diesel::result::Error> {
    use crate::schema::users::dsl::*;
    users
        .filter(id.eq(user_id))
        .select(User::as_select())
        .first(conn)
        .optional()
}

/// Gets a single user with roles by ID.
pub fn get_user_with_roles(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> Result<Option<UserWithRoles>, diesel::result::Error> {
    match get_user(conn, user_id)? {
        Some(user) => {
            let roles = get_user_roles(conn, user.id)?;
            Ok(Some(UserWithRoles::new(user, roles)))
        }
        None => Ok(None),
    }
}

/// Gets a single user by email (case-insensitive).
pub fn get_user_by_email(
    conn: &mut SqliteConnection,
    user_email: &str,
) -> Result<Option<User>, diesel::result::Error> {
    diesel::sql_query("SELECT * FROM users WHERE LOWER(email) = LOWER(?)")
        .bind::<diesel::sql_types::Text, _>(user_email)
        .get_result::<UserRow>(conn)
        .optional()
        .map(|row| row.map(User::from))
}

/// Replaces a user's password hash.
pub fn update_password_hash(
    conn: &mut SqliteConnection,
    user_id: i32,
    new_password_hash: String,
) -> Result<User, diesel::result::Error> {
    use crate::schema::users::dsl::*;

    diesel::update(users.filter(id.eq(user_id)))
        .set(password_hash.eq(new_password_hash))
        .execute(conn)?;

    users
        .filter(id.eq(user_id))
        .select(User::as_select())
        .first(conn)
}

// Row shape for the raw case-insensitive email lookup
#[derive(QueryableByName)]
#[diesel(table_name = crate::schema::users)]
struct UserRow {
    id: i32,
    email: String,
    password_hash: String,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::testing::setup_test_db;
    use crate::orm::user_role::assign_user_role_by_name;

    fn input(email: &str) -> UserInput {
        UserInput {
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
        }
    }

    #[test]
    fn test_insert_user() {
        let mut conn = setup_test_db();

        let user = insert_user(&mut conn, input("coral@example.com")).unwrap();
        assert!(user.id > 0);
        assert_eq!(user.email, "coral@example.com");
        assert_eq!(user.password_hash, "not-a-real-hash");
        assert!(user.updated_at >= user.created_at);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let mut conn = setup_test_db();

        insert_user(&mut conn, input("coral@example.com")).unwrap();
        assert!(insert_user(&mut conn, input("coral@example.com")).is_err());
    }

    #[test]
    fn test_get_user_by_email_is_case_insensitive() {
        let mut conn = setup_test_db();
        let user = insert_user(&mut conn, input("Coral@Example.com")).unwrap();

        let found = get_user_by_email(&mut conn, "coral@example.COM").unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(get_user_by_email(&mut conn, "nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_list_users_with_roles() {
        let mut conn = setup_test_db();
        let a = insert_user(&mut conn, input("a@example.com")).unwrap();
        let b = insert_user(&mut conn, input("b@example.com")).unwrap();
        assign_user_role_by_name(&mut conn, a.id, "admin").unwrap();
        assign_user_role_by_name(&mut conn, b.id, "viewer").unwrap();

        let listed = list_users_with_roles(&mut conn).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].email, "a@example.com");
        assert_eq!(listed[0].roles[0].name, "admin");
        assert_eq!(listed[1].roles[0].name, "viewer");

        let single = get_user_with_roles(&mut conn, b.id).unwrap().unwrap();
        assert_eq!(single.roles.len(), 1);
        assert!(get_user_with_roles(&mut conn, 4242).unwrap().is_none());
    }

    #[test]
    fn test_update_password_hash() {
        let mut conn = setup_test_db();
        let user = insert_user(&mut conn, input("coral@example.com")).unwrap();

        let updated = update_password_hash(&mut conn, user.id, "fresh".to_string()).unwrap();
        assert_eq!(updated.password_hash, "fresh");
        assert_eq!(updated.email, user.email);
    }
}
