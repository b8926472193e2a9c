use diesel::prelude::*;
use diesel::sql_types::BigInt;

use crate::models::{NewRole, Role};

#[derive(QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = BigInt)]
    last_insert_rowid: i64,
}

pub fn insert_role(
    conn: &mut SqliteConnection,
    new_role: NewRole,
) -> Result<Role, diesel::result::Error> {
    use crate::schema::roles::dsl::*;

    diesel::insert_into(roles).values(&new_role).execute(conn)?;

    let last_id = diesel::sql_query("SELECT last_insert_rowid() as last_insert_rowid")
        .get_result::<LastInsertRowId>(conn)?
        .last_insert_rowid;

    let last_id = i32::try_from(last_id)
        .map_err(|e| diesel::result::Error::DeserializationError(Box::new(e)))?;
    roles.filter(id.eq(last_id)).first::<Role>(conn)
}

/// Returns all roles in ascending order by id.
pub fn get_all_roles(conn: &mut SqliteConnection) -> Result<Vec<Role>, diesel::result::Error> {
    use crate::schema::roles::dsl::*;
    roles.order(id.asc()).load::<Role>(conn)
}

pub fn get_role_by_name(
    conn: &mut SqliteConnection,
    role_name: &str,
) -> Result<Option<Role>, diesel::result::Error> {
    use crate::schema::roles::dsl::*;
    roles.filter(name.eq(role_name)).first::<Role>(conn).optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::testing::setup_test_db;

    #[test]
    fn test_insert_role() {
        let mut conn = setup_test_db();
        let new_role = NewRole {
            name: "aquarist".to_string(),
            description: Some("Logs water tests".to_string()),
        };

        let role = insert_role(&mut conn, new_role).unwrap();
        assert_eq!(role.name, "aquarist");
        assert_eq!(role.description, Some("Logs water tests".to_string()));
        assert!(role.id > 0);
    }

    #[test]
    fn test_seeded_roles() {
        let mut conn = setup_test_db();

        let roles = get_all_roles(&mut conn).unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].name, "admin");
        assert_eq!(roles[1].name, "viewer");
        assert!(roles[0].id < roles[1].id);

        assert!(get_role_by_name(&mut conn, "viewer").unwrap().is_some());
        assert!(get_role_by_name(&mut conn, "janitor").unwrap().is_none());
    }
}
