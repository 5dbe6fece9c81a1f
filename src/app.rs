//! Every user gesture is one `Command`: a single database call followed by
//! the refresh that keeps the views consistent with it.

use tracing::{info, warn};

use crate::database::Db;
use crate::view::{LinkForm, UserForm, Views};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load,
    SaveUser(UserForm),
    UpdateUser(UserForm),
    DeleteUser { id : String, cascade : bool },
    SelectUser(String),
    ClearUserForm,
    SaveLink(LinkForm),
    UpdateLink(LinkForm),
    DeleteLink(Option<i64>),
    SelectLink(i64),
    ClearLinkForm,
}

/// What to tell the user after a command went through.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Loaded,
    UserSaved,
    UserUpdated,
    UserDeleted { links : usize },
    UserShown,
    LinkSaved(i64),
    LinkUpdated,
    LinkDeleted,
    LinkShown,
    Cleared,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f : &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Notice::*;

        match self {
            Loaded => write!(f, "data loaded"),
            UserSaved => write!(f, "user saved"),
            UserUpdated => write!(f, "user updated"),
            UserDeleted { links : 0 } => write!(f, "user deleted"),
            UserDeleted { links } => {
                write!(f, "user deleted along with {} link(s)", links)
            },
            UserShown => write!(f, "user loaded into the form"),
            LinkSaved(id) => write!(f, "link {} saved", id),
            LinkUpdated => write!(f, "link updated"),
            LinkDeleted => write!(f, "link deleted"),
            LinkShown => write!(f, "link loaded into the form"),
            Cleared => write!(f, "form cleared"),
        }
    }
}

pub struct App {
    pub db :    Db,
    pub views : Views,
}

impl App {
    /// Takes an opened database and loads all views from it.
    pub async fn new(db : Db) -> Result<Self> {
        let mut app = App {
            db,
            views : Views::default(),
        };
        app.views.load(&app.db).await?;

        Ok(app)
    }

    /// Runs one command. When the database call fails the views are left as
    /// they were. When it succeeds but a refresh fails, the change is already
    /// committed and the form keeps its input, while lists refreshed before
    /// the failure show the new state.
    pub async fn dispatch(&mut self, cmd : Command) -> Result<Notice> {
        let res = self.run(cmd).await;

        match &res {
            Ok(notice) => info!(%notice, "command done"),
            Err(err) => warn!(kind = ?err.kind(), %err, "command rejected"),
        }

        res
    }

    async fn run(&mut self, cmd : Command) -> Result<Notice> {
        use Command::*;

        let db = &self.db;
        let views = &mut self.views;

        match cmd {
            Load => {
                views.load(db).await?;
                Ok(Notice::Loaded)
            },
            SaveUser(form) => {
                db.insert_user(&form.to_new_user()).await?;
                views.refresh_users(db).await?;
                views.clear_user_form();
                Ok(Notice::UserSaved)
            },
            UpdateUser(form) => {
                db.update_user(&form.to_new_user()).await?;
                views.refresh_users(db).await?;
                views.refresh_links(db).await?;
                views.clear_user_form();
                Ok(Notice::UserUpdated)
            },
            DeleteUser { id, cascade } => {
                let id = id.trim();
                if id.is_empty() {
                    return Err(Error::NoUserSelected)
                }

                let links = if cascade {
                    db.delete_user_cascade(id).await?
                } else {
                    db.delete_user(id).await?;
                    0
                };

                views.refresh_users(db).await?;
                views.refresh_links(db).await?;
                views.clear_user_form();
                Ok(Notice::UserDeleted { links })
            },
            SelectUser(id) => {
                let user = db
                    .get_user(&id)
                    .await?
                    .ok_or(Error::UserNotFound(id))?;
                views.show_user(&user);
                Ok(Notice::UserShown)
            },
            ClearUserForm => {
                views.clear_user_form();
                Ok(Notice::Cleared)
            },
            SaveLink(form) => {
                let id = db.insert_link(&form.to_new_link()?).await?;
                views.refresh_links(db).await?;
                views.clear_link_form();
                Ok(Notice::LinkSaved(id))
            },
            UpdateLink(form) => {
                let id = form.editing_id.ok_or(Error::NoLinkSelected)?;
                db.update_link(id, &form.to_new_link()?).await?;
                views.refresh_links(db).await?;
                views.clear_link_form();
                Ok(Notice::LinkUpdated)
            },
            DeleteLink(id) => {
                let id = id.ok_or(Error::NoLinkSelected)?;
                db.delete_link(id).await?;
                views.refresh_links(db).await?;
                views.clear_link_form();
                Ok(Notice::LinkDeleted)
            },
            SelectLink(id) => {
                let link =
                    db.get_link(id).await?.ok_or(Error::LinkNotFound(id))?;
                views.show_link(&link);
                Ok(Notice::LinkShown)
            },
            ClearLinkForm => {
                views.clear_link_form();
                Ok(Notice::Cleared)
            },
        }
    }
}
