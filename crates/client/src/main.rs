//! `stockdesk` command-line front end.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use stockdesk_auth::{
    PasswordChange, RegisterData, Role, Section, UserIdentity, UserUpdate, can_assign_roles,
    can_delete_user, can_edit_user,
};
use stockdesk_client::{ClientConfig, SessionStore, TransportEvent};
use stockdesk_core::UserId;

#[derive(Parser)]
#[command(name = "stockdesk", about = "Admin console for the StockDesk inventory API", version)]
struct Cli {
    /// Override STOCKDESK_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the token pair.
    Login {
        username: String,
        /// Falls back to STOCKDESK_PASSWORD.
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long, default_value = "admin")]
        role: Role,
    },
    /// Invalidate the stored tokens and forget them.
    Logout,
    /// Show the current user and the sections their role opens.
    Whoami,
    /// Update your own profile.
    Profile {
        #[command(flatten)]
        fields: ProfileFields,
    },
    /// Change your password.
    Passwd {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Manage accounts (super admins).
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Stock records at or below their reorder level.
    LowStock,
}

#[derive(clap::Args)]
struct ProfileFields {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
}

impl From<ProfileFields> for UserUpdate {
    fn from(fields: ProfileFields) -> Self {
        UserUpdate {
            email: fields.email,
            first_name: fields.first_name,
            last_name: fields.last_name,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum UsersCommand {
    List,
    Update {
        id: UserId,
        #[command(flatten)]
        fields: ProfileFields,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long, action = clap::ArgAction::Set)]
        active: Option<bool>,
    },
    Delete {
        id: UserId,
    },
}

#[derive(Serialize)]
struct WhoAmI<'a> {
    user: &'a UserIdentity,
    sections: Vec<Section>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require_user(store: &SessionStore) -> Result<UserIdentity> {
    match store.snapshot().user {
        Some(user) => Ok(user),
        None => bail!("not logged in; run `stockdesk login <username>` first"),
    }
}

async fn find_user(store: &SessionStore, id: UserId) -> Result<UserIdentity> {
    store
        .users()
        .list()
        .await?
        .into_iter()
        .find(|u| u.id == id)
        .with_context(|| format!("no user with id {id}"))
}

async fn run(store: &SessionStore, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let password = match password.or_else(|| std::env::var("STOCKDESK_PASSWORD").ok()) {
                Some(p) => p,
                None => bail!("password required (--password or STOCKDESK_PASSWORD)"),
            };
            let user = store.login(&username, &password).await?;
            println!("Logged in as {} ({})", user.display_name(), user.role);
        }
        Command::Register {
            username,
            email,
            password,
            confirm_password,
            role,
        } => {
            let data = RegisterData::new(username, email, password, confirm_password).with_role(role);
            store.register(&data).await?;
            match store.snapshot().user {
                Some(user) => println!("Registered and logged in as {}", user.username),
                None => println!("Registered {}; you can now log in", data.username),
            }
        }
        Command::Logout => {
            store.logout().await;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = require_user(store)?;
            print_json(&WhoAmI {
                sections: Section::visible_to(user.role),
                user: &user,
            })?;
        }
        Command::Profile { fields } => {
            let user = store.update_profile(&fields.into()).await?;
            print_json(&user)?;
        }
        Command::Passwd { old, new } => {
            require_user(store)?;
            store
                .users()
                .change_password(&PasswordChange {
                    old_password: old,
                    new_password: new,
                })
                .await?;
            println!("Password changed");
        }
        Command::Users { command } => {
            store.authorize(Section::Users)?;
            let actor = require_user(store)?;
            match command {
                UsersCommand::List => print_json(&store.users().list().await?)?,
                UsersCommand::Update {
                    id,
                    fields,
                    role,
                    active,
                } => {
                    let target = find_user(store, id).await?;
                    if !can_edit_user(&actor, &target) {
                        bail!("you cannot edit {}", target.username);
                    }
                    if role.is_some() && !can_assign_roles(&actor) {
                        bail!("only super admins can change roles");
                    }
                    let update = UserUpdate {
                        role,
                        is_active: active,
                        ..fields.into()
                    };
                    print_json(&store.users().update(id, &update).await?)?;
                }
                UsersCommand::Delete { id } => {
                    let target = find_user(store, id).await?;
                    if !can_delete_user(&actor, &target) {
                        bail!("you cannot delete {}", target.username);
                    }
                    store.users().delete(id).await?;
                    println!("Deleted {}", target.username);
                }
            }
        }
        Command::LowStock => {
            store.authorize(Section::Dashboard)?;
            print_json(&store.catalog().low_stock().await?)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    stockdesk_observability::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }

    let store = SessionStore::from_config(&config)?;
    let mut events = store.transport().subscribe();

    store.initialize().await;
    let result = run(&store, cli.command).await;

    if let Ok(TransportEvent::LoginRequired) = events.try_recv() {
        eprintln!("Session expired. Run `stockdesk login <username>` again.");
    }
    result
}
