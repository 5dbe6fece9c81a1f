use std::fmt;

use quick_from::QuickFrom;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(QuickFrom, Debug)]
pub enum Error {
    MissingField(&'static str),
    InvalidDate(String),
    NoUserSelected,
    NoLinkSelected,
    DuplicateUser(String),
    DuplicateEmail(String),
    UserNotFound(String),
    LinkNotFound(i64),
    UserHasLinks(String),
    UnknownReference,
    Connection(rusqlite::Error),

    #[quick_from]
    Sqlite(rusqlite::Error),

    #[quick_from]
    Io(std::io::Error),

    #[quick_from]
    Json(serde_json::Error),

    #[quick_from]
    Template(handlebars::TemplateError),

    #[quick_from]
    Render(handlebars::RenderError),
}

/// Coarse classification shown to whoever has to react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DuplicateKey,
    NotFound,
    ReferentialConstraint,
    Connection,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use Error::*;

        match self {
            MissingField(_) | InvalidDate(_) | NoUserSelected
            | NoLinkSelected => ErrorKind::Validation,
            DuplicateUser(_) | DuplicateEmail(_) => ErrorKind::DuplicateKey,
            UserNotFound(_) | LinkNotFound(_) => ErrorKind::NotFound,
            UserHasLinks(_) | UnknownReference => {
                ErrorKind::ReferentialConstraint
            },
            Connection(_) => ErrorKind::Connection,
            _ => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;

        match self {
            MissingField(name) => write!(f, "the field {} is required", name),
            InvalidDate(s) => {
                write!(f, "invalid date {:?}, expected YYYY-MM-DD", s)
            },
            NoUserSelected => write!(f, "select a user first"),
            NoLinkSelected => write!(f, "select a link first"),
            DuplicateUser(id) => {
                write!(f, "a user with id {} already exists", id)
            },
            DuplicateEmail(email) => {
                write!(f, "the email {} is already used by another user", email)
            },
            UserNotFound(id) => write!(f, "user {} not found", id),
            LinkNotFound(id) => write!(f, "link {} not found", id),
            UserHasLinks(id) => {
                write!(f, "user {} still has links and cannot be deleted", id)
            },
            UnknownReference => {
                write!(f, "the selected user or media type does not exist")
            },
            Connection(err) => {
                write!(f, "could not connect to the database: {}", err)
            },
            Sqlite(err) => write!(f, "database error: {}", err),
            Io(err) => write!(f, "io error: {}", err),
            Json(err) => write!(f, "json error: {}", err),
            Template(err) => write!(f, "template error: {}", err),
            Render(err) => write!(f, "render error: {}", err),
        }
    }
}

impl std::error::Error for Error {}
