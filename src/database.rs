use rusqlite::{ffi, Connection};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{
    LinkDetail, LinkRow, MediaType, NewLink, NewUser, User, ValidLink,
};
use crate::{schema, Error, Result};

const SQLITE_CONSTRAINT_FOREIGNKEY : i64 = 787;
const SQLITE_CONSTRAINT_PRIMARYKEY : i64 = 1555;
const SQLITE_CONSTRAINT_UNIQUE : i64 = 2067;

fn error_code_match(
    err : &rusqlite::Error,
    code : ffi::ErrorCode,
    ext : i64,
) -> bool {
    matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == code
                && i64::from(e.extended_code) == ext)
}

fn is_constraint(err : &rusqlite::Error, ext : i64) -> bool {
    error_code_match(err, ffi::ErrorCode::ConstraintViolation, ext)
}

fn is_duplicate(err : &rusqlite::Error) -> bool {
    is_constraint(err, SQLITE_CONSTRAINT_UNIQUE)
        || is_constraint(err, SQLITE_CONSTRAINT_PRIMARYKEY)
}

/// Whether a constraint failure message names `column` (`table.column`).
fn names_column(err : &rusqlite::Error, column : &str) -> bool {
    matches!(
            err,
            rusqlite::Error::SqliteFailure(_, Some(msg))
                if msg.ends_with(column))
}

fn duplicate_user(err : rusqlite::Error, user : &NewUser) -> Error {
    match &user.email {
        Some(email) if names_column(&err, "users.email") => {
            Error::DuplicateEmail(email.clone())
        },
        _ => Error::DuplicateUser(user.id.clone()),
    }
}

fn is_foreign_key(err : &rusqlite::Error) -> bool {
    is_constraint(err, SQLITE_CONSTRAINT_FOREIGNKEY)
}

macro_rules! db_method {
        ($name:ident (
            &$self:ident,
            $conn:ident
            $(, $pname:ident : $ptype:ty)* $(,)?
        ) -> $ret:ty $body:block ) => {
            pub async fn $name (&$self, $( $pname : $ptype, )* ) -> $ret {
                let $conn = $self.conn.lock().await;
                tokio::task::block_in_place(|| $body)
            }
        }
    }

/// The single storage connection of the application. Every statement runs
/// with foreign keys enforced and commits on its own.
pub struct Db {
    conn : Mutex<Connection>,
}

impl Db {
    pub fn open<P : AsRef<std::path::Path>>(p : P) -> Result<Self> {
        let conn = Connection::open(p.as_ref()).map_err(Error::Connection)?;
        debug!(path = %p.as_ref().display(), "opened database");

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Connection)?;

        Self::from_connection(conn)
    }

    fn from_connection(conn : Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", &"ON")
            .map_err(Error::Connection)?;

        // opening is lazy, an unusable file only shows up here
        schema::initialize(&conn).map_err(|err| {
            match err {
                Error::Sqlite(err) => Error::Connection(err),
                err => err,
            }
        })?;

        Ok(Self {
            conn : Mutex::new(conn),
        })
    }

    db_method! {insert_user(&self, conn, user : &NewUser) -> Result<()> {
        let user = user.validate()?;

        conn
            .prepare_cached(
                "INSERT INTO users (id, first_name, last_name, email)
                 VALUES (?, ?, ?, ?)"
            )?
            .execute(rusqlite::params![
                user.id,
                user.first_name,
                user.last_name,
                user.email
            ])
            .map_err(|err| {
                if is_duplicate(&err) {
                    duplicate_user(err, &user)
                } else {
                    err.into()
                }
            })?;

        info!(id = %user.id, "user created");
        Ok(())
    }}

    db_method! {update_user(&self, conn, user : &NewUser) -> Result<()> {
        let user = user.validate()?;

        let n = conn
            .prepare_cached(
                "UPDATE users SET first_name = ?, last_name = ?, email = ?
                 WHERE id = ?"
            )?
            .execute(rusqlite::params![
                user.first_name,
                user.last_name,
                user.email,
                user.id
            ])
            .map_err(|err| {
                if is_duplicate(&err) {
                    duplicate_user(err, &user)
                } else {
                    err.into()
                }
            })?;

        if n == 0 {
            return Err(Error::UserNotFound(user.id))
        }

        info!(id = %user.id, "user updated");
        Ok(())
    }}

    db_method! {delete_user(&self, conn, user_id : &str) -> Result<()> {
        let n = conn
            .prepare_cached("DELETE FROM users WHERE id = ?")?
            .execute(rusqlite::params![user_id])
            .map_err(|err| {
                if is_foreign_key(&err) {
                    Error::UserHasLinks(user_id.to_string())
                } else {
                    err.into()
                }
            })?;

        if n == 0 {
            return Err(Error::UserNotFound(user_id.to_string()))
        }

        info!(id = %user_id, "user deleted");
        Ok(())
    }}

    db_method! {delete_user_cascade(
        &self,
        conn,
        user_id : &str
    ) -> Result<usize> {
        let tx = conn.unchecked_transaction()?;

        let links = tx
            .prepare_cached("DELETE FROM links WHERE user_id = ?")?
            .execute(rusqlite::params![user_id])?;

        let n = tx
            .prepare_cached("DELETE FROM users WHERE id = ?")?
            .execute(rusqlite::params![user_id])?;

        if n == 0 {
            return Err(Error::UserNotFound(user_id.to_string()))
        }

        tx.commit()?;

        info!(id = %user_id, links, "user deleted with links");
        Ok(links)
    }}

    db_method! {get_user(&self, conn, user_id : &str) -> Result<Option<User>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, first_name, last_name, email FROM users WHERE id = ?"
        )?;

        let mut rows = stmt.query(rusqlite::params![user_id])?;

        let user = match rows.next()? {
            Some(row) => Some(User::from_row(row)?),
            None => None,
        };

        Ok(user)
    }}

    db_method! {list_users(&self, conn) -> Result<Vec<User>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, first_name, last_name, email FROM users
             ORDER BY rowid"
        )?;

        let rows = stmt.query(rusqlite::params![])?;
        let users = collect(rows)?;

        Ok(users)
    }}

    db_method! {insert_link(&self, conn, link : &NewLink) -> Result<i64> {
        let link = link.validate()?;

        conn
            .prepare_cached(
                "INSERT INTO links
                 (user_id, url, media_type_id, date, author, description, topic)
                 VALUES (?, ?, ?, ?, ?, ?, ?)"
            )?
            .execute(&link_params(&link)[..])
            .map_err(map_link_error)?;

        let id = conn.last_insert_rowid();

        info!(id, user = %link.user_id, "link created");
        Ok(id)
    }}

    db_method! {update_link(
        &self,
        conn,
        link_id : i64,
        link : &NewLink
    ) -> Result<()> {
        let link = link.validate()?;

        let mut params = link_params(&link);
        params.push(&link_id);

        let n = conn
            .prepare_cached(
                "UPDATE links SET user_id = ?, url = ?, media_type_id = ?,
                 date = ?, author = ?, description = ?, topic = ?
                 WHERE id = ?"
            )?
            .execute(&params[..])
            .map_err(map_link_error)?;

        if n == 0 {
            return Err(Error::LinkNotFound(link_id))
        }

        info!(id = link_id, "link updated");
        Ok(())
    }}

    db_method! {delete_link(&self, conn, link_id : i64) -> Result<()> {
        let n = conn
            .prepare_cached("DELETE FROM links WHERE id = ?")?
            .execute(rusqlite::params![link_id])?;

        if n == 0 {
            return Err(Error::LinkNotFound(link_id))
        }

        info!(id = link_id, "link deleted");
        Ok(())
    }}

    db_method! {list_links(&self, conn) -> Result<Vec<LinkRow>> {
        let mut stmt = conn.prepare_cached(
            "SELECT l.id AS id,
                    u.first_name || ' ' || u.last_name AS user_name,
                    l.url AS url,
                    m.label AS media_type_label,
                    l.date AS date,
                    l.author AS author,
                    l.topic AS topic
             FROM links l
             JOIN users u ON l.user_id = u.id
             JOIN media_types m ON l.media_type_id = m.id
             ORDER BY l.id"
        )?;

        let rows = stmt.query(rusqlite::params![])?;
        let links = collect(rows)?;

        Ok(links)
    }}

    db_method! {get_link(
        &self,
        conn,
        link_id : i64
    ) -> Result<Option<LinkDetail>> {
        let mut stmt = conn.prepare_cached(
            "SELECT l.id AS id,
                    l.user_id AS user_id,
                    u.first_name AS first_name,
                    u.last_name AS last_name,
                    l.url AS url,
                    l.media_type_id AS media_type_id,
                    m.label AS media_type_label,
                    l.date AS date,
                    l.author AS author,
                    l.description AS description,
                    l.topic AS topic
             FROM links l
             JOIN users u ON l.user_id = u.id
             JOIN media_types m ON l.media_type_id = m.id
             WHERE l.id = ?"
        )?;

        let mut rows = stmt.query(rusqlite::params![link_id])?;

        let link = match rows.next()? {
            Some(row) => Some(LinkDetail::from_row(row)?),
            None => None,
        };

        Ok(link)
    }}

    db_method! {list_media_types(&self, conn) -> Result<Vec<MediaType>> {
        let mut stmt = conn
            .prepare_cached("SELECT id, label FROM media_types ORDER BY id")?;

        let rows = stmt.query(rusqlite::params![])?;
        let types = collect(rows)?;

        Ok(types)
    }}
}

fn link_params(link : &ValidLink) -> Vec<&dyn rusqlite::ToSql> {
    vec![
        &link.user_id,
        &link.url,
        &link.media_type_id,
        &link.date,
        &link.author,
        &link.description,
        &link.topic,
    ]
}

fn map_link_error(err : rusqlite::Error) -> Error {
    if is_foreign_key(&err) {
        Error::UnknownReference
    } else {
        err.into()
    }
}

fn collect<T : FromRow>(mut rows : rusqlite::Rows<'_>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(T::from_row(row)?);
    }

    Ok(out)
}

trait FromRow: Sized {
    fn from_row(row : &rusqlite::Row) -> Result<Self>;
}

/// Columns are looked up by name, so queries alias every selected column
/// to the field it fills.
macro_rules! impl_from_row {
        ($ty:ty { $($field:ident),* }) => {
            impl FromRow for $ty {
                fn from_row(row : &rusqlite::Row) -> Result<$ty> {
                    Ok(Self{
                    $(
                        $field : row.get(stringify!($field))?,
                    )*
                    })
                }
            }
        }
    }

impl_from_row! {User {
    id, first_name, last_name, email
}}

impl_from_row! {MediaType {
    id, label
}}

impl_from_row! {LinkRow {
    id, user_name, url, media_type_label, date, author, topic
}}

impl_from_row! {LinkDetail {
    id, user_id, first_name, last_name, url, media_type_id,
    media_type_label, date, author, description, topic
}}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Date;
    use crate::ErrorKind;

    fn ana() -> NewUser {
        NewUser::new("U1", "Ana", "Ruiz").email("ana@x.com")
    }

    fn date(s : &str) -> Date {
        s.parse().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn created_user_is_listed() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();

        let users = db.list_users().await.unwrap();
        assert_eq!(users, vec![User {
            id :         "U1".into(),
            first_name : "Ana".into(),
            last_name :  "Ruiz".into(),
            email :      Some("ana@x.com".into()),
        }]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn users_are_listed_in_insertion_order() {
        let db = Db::open_in_memory().unwrap();
        for id in &["Z9", "A1", "M5"] {
            db.insert_user(&NewUser::new(id, "N", "L")).await.unwrap();
        }

        let ids : Vec<String> = db
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec!["Z9", "A1", "M5"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_id_or_email_is_rejected() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();

        let err = db
            .insert_user(&NewUser::new("U1", "Other", "Person"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert!(matches!(err, Error::DuplicateUser(ref id) if id == "U1"));

        let err = db
            .insert_user(&NewUser::new("U2", "Other", "Person").email("ana@x.com"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert!(
            matches!(err, Error::DuplicateEmail(ref email) if email == "ana@x.com")
        );

        assert_eq!(db.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn users_without_email_do_not_collide() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&NewUser::new("U1", "A", "B").email(""))
            .await
            .unwrap();
        db.insert_user(&NewUser::new("U2", "C", "D")).await.unwrap();

        assert_eq!(db.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_user_is_not_written() {
        let db = Db::open_in_memory().unwrap();

        let err = db
            .insert_user(&NewUser::new("U1", "", "Ruiz"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(db.list_users().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_user_overwrites_fields() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();

        db.update_user(&NewUser::new("U1", "Ana María", "Ruiz"))
            .await
            .unwrap();

        let user = db.get_user("U1").await.unwrap().unwrap();
        assert_eq!(user.first_name, "Ana María");
        assert_eq!(user.email, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_missing_user_is_not_found() {
        let db = Db::open_in_memory().unwrap();

        let err = db.update_user(&ana()).await.unwrap_err();
        assert!(matches!(err, Error::UserNotFound(ref id) if id == "U1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_to_taken_email_is_duplicate() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();
        db.insert_user(&NewUser::new("U2", "Luis", "Paz")).await.unwrap();

        let err = db
            .update_user(&NewUser::new("U2", "Luis", "Paz").email("ana@x.com"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert_eq!(
            err.to_string(),
            "the email ana@x.com is already used by another user"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_user_blocks_on_links() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();
        db.insert_link(&NewLink::new("U1", "http://ex.com", 1))
            .await
            .unwrap();

        let err = db.delete_user("U1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialConstraint);
        assert_eq!(db.list_users().await.unwrap().len(), 1);

        let err = db.delete_user("nobody").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cascade_removes_links_with_the_user() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();
        db.insert_user(&NewUser::new("U2", "Luis", "Paz")).await.unwrap();
        db.insert_link(&NewLink::new("U1", "a", 1)).await.unwrap();
        db.insert_link(&NewLink::new("U1", "b", 2)).await.unwrap();
        db.insert_link(&NewLink::new("U2", "c", 3)).await.unwrap();

        assert_eq!(db.delete_user_cascade("U1").await.unwrap(), 2);

        let links = db.list_links().await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].user_name, "Luis Paz");
        assert!(db.get_user("U1").await.unwrap().is_none());

        let err = db.delete_user_cascade("U1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn link_references_must_exist() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();

        let err = db
            .insert_link(&NewLink::new("ghost", "http://ex.com", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialConstraint);

        let err = db
            .insert_link(&NewLink::new("U1", "http://ex.com", 99))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialConstraint);

        assert!(db.list_links().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn link_detail_matches_input() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();

        let id = db
            .insert_link(
                &NewLink::new("U1", "http://ex.com", 4)
                    .date(date("2024-01-01"))
                    .author("Knuth")
                    .description("long read")
                    .topic("algorithms"),
            )
            .await
            .unwrap();

        let detail = db.get_link(id).await.unwrap().unwrap();
        assert_eq!(detail, LinkDetail {
            id,
            user_id : "U1".into(),
            first_name : "Ana".into(),
            last_name : "Ruiz".into(),
            url : "http://ex.com".into(),
            media_type_id : 4,
            media_type_label : "Document".into(),
            date : date("2024-01-01"),
            author : Some("Knuth".into()),
            description : Some("long read".into()),
            topic : Some("algorithms".into()),
        });

        assert!(db.get_link(id + 1).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn link_without_date_gets_today() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();

        let id = db
            .insert_link(&NewLink::new("U1", "http://ex.com", 1))
            .await
            .unwrap();

        let detail = db.get_link(id).await.unwrap().unwrap();
        assert_eq!(detail.date, Date::today());
        assert_eq!(detail.author, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_link_checks_target_and_references() {
        let db = Db::open_in_memory().unwrap();
        db.insert_user(&ana()).await.unwrap();
        let id = db
            .insert_link(&NewLink::new("U1", "http://ex.com", 1))
            .await
            .unwrap();

        let err = db
            .update_link(id + 10, &NewLink::new("U1", "http://ex.com", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LinkNotFound(n) if n == id + 10));

        let err = db
            .update_link(id, &NewLink::new("U1", "http://ex.com", 42))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialConstraint);

        let err = db
            .update_link(id, &NewLink::new("U1", "", 2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        db.update_link(id, &NewLink::new("U1", "http://other.org", 2).topic("x"))
            .await
            .unwrap();

        let detail = db.get_link(id).await.unwrap().unwrap();
        assert_eq!(detail.url, "http://other.org");
        assert_eq!(detail.media_type_label, "Video");
        assert_eq!(detail.topic.as_deref(), Some("x"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_missing_link_is_not_found() {
        let db = Db::open_in_memory().unwrap();

        let err = db.delete_link(1).await.unwrap_err();
        assert!(matches!(err, Error::LinkNotFound(1)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn media_types_are_seeded() {
        let db = Db::open_in_memory().unwrap();

        let labels : Vec<String> = db
            .list_media_types()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.label)
            .collect();
        assert_eq!(labels, schema::MEDIA_TYPES.to_vec());
    }

    #[test]
    fn unreachable_storage_is_a_connection_error() {
        let err = Db::open("/nonexistent-dir/for/sure/links.sqlite3")
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn junk_file_is_a_connection_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("links.sqlite3");
        std::fs::write(&path, vec![0x42; 8192]).unwrap();

        let err = Db::open(&path).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.to_string().starts_with("could not connect"));
    }
}
