use serde::Serialize;

pub type Date = crate::time_utils::Date;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id :         String,
    pub first_name : String,
    pub last_name :  String,
    pub email :      Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaType {
    pub id :    i64,
    pub label : String,
}

/// One line of the joined link listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRow {
    pub id :               i64,
    pub user_name :        String,
    pub url :              String,
    pub media_type_label : String,
    pub date :             Date,
    pub author :           Option<String>,
    pub topic :            Option<String>,
}

/// Everything needed to put a link back into the edit form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkDetail {
    pub id :               i64,
    pub user_id :          String,
    pub first_name :       String,
    pub last_name :        String,
    pub url :              String,
    pub media_type_id :    i64,
    pub media_type_label : String,
    pub date :             Date,
    pub author :           Option<String>,
    pub description :      Option<String>,
    pub topic :            Option<String>,
}

/// User fields as typed into the form. `validate` trims them and turns an
/// empty email into `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUser {
    pub id :         String,
    pub first_name : String,
    pub last_name :  String,
    pub email :      Option<String>,
}

impl NewUser {
    pub fn new(id : &str, first_name : &str, last_name : &str) -> Self {
        Self {
            id :         id.to_string(),
            first_name : first_name.to_string(),
            last_name :  last_name.to_string(),
            email :      None,
        }
    }

    pub fn email(mut self, email : &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub(crate) fn validate(&self) -> Result<NewUser> {
        Ok(NewUser {
            id :         required("id", &self.id)?,
            first_name : required("first name", &self.first_name)?,
            last_name :  required("last name", &self.last_name)?,
            email :      optional(self.email.as_deref()),
        })
    }
}

/// Link fields as typed into the form. A missing date means today.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewLink {
    pub user_id :       Option<String>,
    pub url :           String,
    pub media_type_id : Option<i64>,
    pub date :          Option<Date>,
    pub author :        Option<String>,
    pub description :   Option<String>,
    pub topic :         Option<String>,
}

/// A `NewLink` that passed validation, ready to be bound to a statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidLink {
    pub user_id :       String,
    pub url :           String,
    pub media_type_id : i64,
    pub date :          Date,
    pub author :        Option<String>,
    pub description :   Option<String>,
    pub topic :         Option<String>,
}

impl NewLink {
    pub fn new(user_id : &str, url : &str, media_type_id : i64) -> Self {
        Self {
            user_id : Some(user_id.to_string()),
            url : url.to_string(),
            media_type_id : Some(media_type_id),
            ..Default::default()
        }
    }

    pub fn date(mut self, date : Date) -> Self {
        self.date = Some(date);
        self
    }

    pub fn author(mut self, author : &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn description(mut self, description : &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn topic(mut self, topic : &str) -> Self {
        self.topic = Some(topic.to_string());
        self
    }

    pub(crate) fn validate(&self) -> Result<ValidLink> {
        let user_id = optional(self.user_id.as_deref())
            .ok_or(Error::MissingField("user"))?;
        let media_type_id =
            self.media_type_id.ok_or(Error::MissingField("media type"))?;

        Ok(ValidLink {
            user_id,
            url : required("link", &self.url)?,
            media_type_id,
            date : self.date.unwrap_or_else(Date::today),
            author : optional(self.author.as_deref()),
            description : optional(self.description.as_deref()),
            topic : optional(self.topic.as_deref()),
        })
    }
}

fn required(name : &'static str, value : &str) -> Result<String> {
    let value = value.trim();

    if value.is_empty() {
        Err(Error::MissingField(name))
    } else {
        Ok(value.to_string())
    }
}

fn optional(value : Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_fields_are_trimmed() {
        let user = NewUser::new(" U1 ", "Ana", " Ruiz").email("  ");
        let valid = user.validate().unwrap();

        assert_eq!(valid.id, "U1");
        assert_eq!(valid.last_name, "Ruiz");
        assert_eq!(valid.email, None);
    }

    #[test]
    fn user_requires_id_and_names() {
        let err = NewUser::new("", "Ana", "Ruiz").validate().unwrap_err();
        assert!(matches!(err, Error::MissingField("id")));

        let err = NewUser::new("U1", "Ana", "  ").validate().unwrap_err();
        assert!(matches!(err, Error::MissingField("last name")));
    }

    #[test]
    fn link_requires_user_media_type_and_url() {
        let mut link = NewLink::new("U1", "http://ex.com", 1);
        link.user_id = None;
        assert!(matches!(
            link.validate().unwrap_err(),
            Error::MissingField("user")
        ));

        let mut link = NewLink::new("U1", "http://ex.com", 1);
        link.media_type_id = None;
        assert!(matches!(
            link.validate().unwrap_err(),
            Error::MissingField("media type")
        ));

        let link = NewLink::new("U1", " ", 1);
        assert!(matches!(
            link.validate().unwrap_err(),
            Error::MissingField("link")
        ));
    }

    #[test]
    fn link_date_defaults_to_today() {
        let valid = NewLink::new("U1", "http://ex.com", 1)
            .author("")
            .topic(" rust ")
            .validate()
            .unwrap();

        assert_eq!(valid.date, Date::today());
        assert_eq!(valid.author, None);
        assert_eq!(valid.topic.as_deref(), Some("rust"));
    }
}
