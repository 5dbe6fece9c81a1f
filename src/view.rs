//! Screen state kept in step with the database: the two list views, the two
//! selectors and the two forms.

use serde::Serialize;
use tracing::debug;

use crate::database::Db;
use crate::models::{Date, LinkDetail, LinkRow, NewLink, NewUser, User};
use crate::Result;

/// One entry of a selector. The id travels with the label so a choice never
/// has to be parsed back out of display text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption<Id> {
    pub id :    Id,
    pub label : String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserForm {
    pub id :         String,
    pub first_name : String,
    pub last_name :  String,
    pub email :      String,
}

impl UserForm {
    pub fn to_new_user(&self) -> NewUser {
        NewUser {
            id :         self.id.clone(),
            first_name : self.first_name.clone(),
            last_name :  self.last_name.clone(),
            email :      Some(self.email.clone()),
        }
    }
}

impl From<&User> for UserForm {
    fn from(u : &User) -> Self {
        UserForm {
            id :         u.id.clone(),
            first_name : u.first_name.clone(),
            last_name :  u.last_name.clone(),
            email :      u.email.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkForm {
    /// Hidden marker of the link being edited.
    pub editing_id :  Option<i64>,
    pub user :        Option<String>,
    pub url :         String,
    pub media_type :  Option<i64>,
    pub date :        String,
    pub author :      String,
    pub description : String,
    pub topic :       String,
}

impl Default for LinkForm {
    fn default() -> Self {
        LinkForm {
            editing_id :  None,
            user :        None,
            url :         String::new(),
            media_type :  None,
            date :        Date::today().to_string(),
            author :      String::new(),
            description : String::new(),
            topic :       String::new(),
        }
    }
}

impl LinkForm {
    /// Parses the date field; an empty date means today.
    pub fn to_new_link(&self) -> Result<NewLink> {
        let date = match self.date.trim() {
            "" => None,
            s => Some(s.parse::<Date>()?),
        };

        Ok(NewLink {
            user_id : self.user.clone(),
            url : self.url.clone(),
            media_type_id : self.media_type,
            date,
            author : Some(self.author.clone()),
            description : Some(self.description.clone()),
            topic : Some(self.topic.clone()),
        })
    }
}

impl From<&LinkDetail> for LinkForm {
    fn from(l : &LinkDetail) -> Self {
        LinkForm {
            editing_id :  Some(l.id),
            user :        Some(l.user_id.clone()),
            url :         l.url.clone(),
            media_type :  Some(l.media_type_id),
            date :        l.date.to_string(),
            author :      l.author.clone().unwrap_or_default(),
            description : l.description.clone().unwrap_or_default(),
            topic :       l.topic.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Views {
    pub users :          Vec<User>,
    pub links :          Vec<LinkRow>,
    pub user_options :   Vec<SelectOption<String>>,
    pub media_options :  Vec<SelectOption<i64>>,
    pub user_form :      UserForm,
    pub link_form :      LinkForm,
    pub selected_user :  Option<String>,
    pub selected_link :  Option<i64>,
}

impl Views {
    /// Everything, as on startup.
    pub async fn load(&mut self, db : &Db) -> Result<()> {
        self.refresh_users(db).await?;
        self.refresh_media_types(db).await?;
        self.refresh_links(db).await?;

        Ok(())
    }

    /// The user list and the user selector derived from it.
    pub async fn refresh_users(&mut self, db : &Db) -> Result<()> {
        let users = db.list_users().await?;

        self.user_options = users
            .iter()
            .map(|u| SelectOption {
                id :    u.id.clone(),
                label : u.full_name(),
            })
            .collect();
        self.users = users;

        debug!(count = self.users.len(), "users refreshed");
        Ok(())
    }

    pub async fn refresh_media_types(&mut self, db : &Db) -> Result<()> {
        self.media_options = db
            .list_media_types()
            .await?
            .into_iter()
            .map(|m| SelectOption {
                id :    m.id,
                label : m.label,
            })
            .collect();

        Ok(())
    }

    pub async fn refresh_links(&mut self, db : &Db) -> Result<()> {
        self.links = db.list_links().await?;

        debug!(count = self.links.len(), "links refreshed");
        Ok(())
    }

    pub fn show_user(&mut self, user : &User) {
        self.user_form = user.into();
        self.selected_user = Some(user.id.clone());
    }

    pub fn show_link(&mut self, link : &LinkDetail) {
        self.link_form = link.into();
        self.selected_link = Some(link.id);
    }

    pub fn clear_user_form(&mut self) {
        self.user_form = UserForm::default();
        self.selected_user = None;
    }

    pub fn clear_link_form(&mut self) {
        self.link_form = LinkForm::default();
        self.selected_link = None;
    }

    pub fn user_option(&self, id : &str) -> Option<&SelectOption<String>> {
        self.user_options.iter().find(|o| o.id == id)
    }

    pub fn media_option(&self, id : i64) -> Option<&SelectOption<i64>> {
        self.media_options.iter().find(|o| o.id == id)
    }
}
