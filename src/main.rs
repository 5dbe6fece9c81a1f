use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use link_registry::app::{App, Command};
use link_registry::config::Config;
use link_registry::database::Db;
use link_registry::ui::{Renderer, Section};
use link_registry::view::{LinkForm, UserForm};
use link_registry::ErrorKind;

/// Keep track of users and the links they share.
#[derive(Parser)]
#[command(name = "link-registry", version)]
struct Cli {
    /// SQLite database file (default: $LINK_REGISTRY_DB or links.sqlite3)
    #[arg(long, global = true)]
    db : Option<PathBuf>,

    /// Print the resulting views as JSON
    #[arg(long, global = true)]
    json : bool,

    /// Debug logging unless RUST_LOG is set
    #[arg(long, global = true)]
    debug : bool,

    #[command(subcommand)]
    command : Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Manage users
    User {
        #[command(subcommand)]
        cmd : UserCmd,
    },
    /// Manage links
    Link {
        #[command(subcommand)]
        cmd : LinkCmd,
    },
    /// List the available media types
    MediaTypes,
}

#[derive(Subcommand)]
enum UserCmd {
    Add(UserArgs),
    Update(UserArgs),
    Delete {
        id :      String,
        /// Also delete the user's links
        #[arg(long)]
        cascade : bool,
    },
    Show {
        id : String,
    },
    List,
}

#[derive(Args)]
struct UserArgs {
    id :         String,
    first_name : String,
    last_name :  String,
    #[arg(long, default_value = "")]
    email :      String,
}

#[derive(Subcommand)]
enum LinkCmd {
    Add(LinkArgs),
    Update {
        id :   i64,
        #[command(flatten)]
        link : LinkArgs,
    },
    Delete {
        id : i64,
    },
    Show {
        id : i64,
    },
    List,
}

#[derive(Args)]
struct LinkArgs {
    url :         String,
    #[arg(long)]
    user :        Option<String>,
    /// Media type id, see `media-types`
    #[arg(long)]
    media_type :  Option<i64>,
    /// YYYY-MM-DD, today when omitted
    #[arg(long, default_value = "")]
    date :        String,
    #[arg(long, default_value = "")]
    author :      String,
    #[arg(long, default_value = "")]
    description : String,
    #[arg(long, default_value = "")]
    topic :       String,
}

impl From<UserArgs> for UserForm {
    fn from(a : UserArgs) -> Self {
        UserForm {
            id :         a.id,
            first_name : a.first_name,
            last_name :  a.last_name,
            email :      a.email,
        }
    }
}

impl LinkArgs {
    fn into_form(self, editing_id : Option<i64>) -> LinkForm {
        LinkForm {
            editing_id,
            user : self.user,
            url : self.url,
            media_type : self.media_type,
            date : self.date,
            author : self.author,
            description : self.description,
            topic : self.topic,
        }
    }
}

fn init_tracing(debug : bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// The command to run and the sections to print afterwards.
fn plan(cmd : Cmd) -> (Command, Vec<Section>) {
    match cmd {
        Cmd::User { cmd } => match cmd {
            UserCmd::Add(a) => {
                (Command::SaveUser(a.into()), vec![Section::Users])
            },
            UserCmd::Update(a) => (
                Command::UpdateUser(a.into()),
                vec![Section::Users, Section::Links],
            ),
            UserCmd::Delete { id, cascade } => (
                Command::DeleteUser { id, cascade },
                vec![Section::Users, Section::Links],
            ),
            UserCmd::Show { id } => {
                (Command::SelectUser(id), vec![Section::UserForm])
            },
            UserCmd::List => (Command::Load, vec![Section::Users]),
        },
        Cmd::Link { cmd } => match cmd {
            LinkCmd::Add(a) => {
                (Command::SaveLink(a.into_form(None)), vec![Section::Links])
            },
            LinkCmd::Update { id, link } => (
                Command::UpdateLink(link.into_form(Some(id))),
                vec![Section::Links],
            ),
            LinkCmd::Delete { id } => {
                (Command::DeleteLink(Some(id)), vec![Section::Links])
            },
            LinkCmd::Show { id } => {
                (Command::SelectLink(id), vec![Section::LinkForm])
            },
            LinkCmd::List => (Command::Load, vec![Section::Links]),
        },
        Cmd::MediaTypes => (Command::Load, vec![Section::MediaTypes]),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = Config::from_env().with_database_path(cli.db);

    let db = match Db::open(&config.database_path) {
        Ok(db) => db,
        Err(err) => {
            error!(path = %config.database_path.display(), %err, "startup failed");
            eprintln!("{}", err);
            return ExitCode::from(2)
        },
    };

    let renderer = match Renderer::new() {
        Ok(r) => r,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE
        },
    };

    let mut app = match App::new(db).await {
        Ok(app) => app,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE
        },
    };

    let (cmd, sections) = plan(cli.command);

    match app.dispatch(cmd).await {
        Ok(notice) => eprintln!("{}", notice),
        Err(err) => {
            eprintln!("error: {}", err);
            return match err.kind() {
                ErrorKind::Connection => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        },
    }

    let out = if cli.json {
        renderer.json(&app.views)
    } else {
        sections
            .into_iter()
            .map(|s| renderer.render(&app.views, s))
            .collect::<Result<Vec<_>, _>>()
            .map(|parts| parts.join("\n"))
    };

    match out {
        Ok(out) => {
            print!("{}", out);
            ExitCode::SUCCESS
        },
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        },
    }
}
