use handlebars::Handlebars;
use serde::Serialize;

use super::*;
use crate::view::Views;

/// Which part of the screen to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Users,
    UserForm,
    Links,
    LinkForm,
    MediaTypes,
}

pub struct Renderer(Handlebars<'static>);

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut t = Handlebars::new();
        t.set_strict_mode(true);
        t.register_escape_fn(handlebars::no_escape);

        macro_rules! register {
            ($(($name:literal, $path:literal))*) => {
                $(
                    t.register_template_string(
                        $name,
                        include_str!($path),
                    )?;
                )*
            };
        }

        register! {
            ("users", "../ui/users.hbs")
            ("user-form", "../ui/user-form.hbs")
            ("links", "../ui/links.hbs")
            ("link-form", "../ui/link-form.hbs")
            ("media-types", "../ui/media-types.hbs")
        }

        Ok(Self(t))
    }

    pub fn render(&self, views : &Views, section : Section) -> Result<String> {
        match section {
            Section::Users => Ok(self.0.render("users", views)?),
            Section::UserForm => Ok(self.0.render("user-form", views)?),
            Section::Links => Ok(self.0.render("links", views)?),
            Section::MediaTypes => Ok(self.0.render("media-types", views)?),
            Section::LinkForm => self.link_form(views),
        }
    }

    fn link_form(&self, views : &Views) -> Result<String> {
        #[derive(Serialize)]
        struct Ctx<'a> {
            link_form :   &'a view::LinkForm,
            user_label :  Option<&'a str>,
            media_label : Option<&'a str>,
        }

        let form = &views.link_form;

        let user_label = form
            .user
            .as_deref()
            .and_then(|id| views.user_option(id))
            .map(|o| o.label.as_str());

        let media_label = form
            .media_type
            .and_then(|id| views.media_option(id))
            .map(|o| o.label.as_str());

        Ok(self.0.render("link-form", &Ctx {
            link_form : form,
            user_label,
            media_label,
        })?)
    }

    pub fn json(&self, views : &Views) -> Result<String> {
        Ok(serde_json::to_string_pretty(views)?)
    }
}
