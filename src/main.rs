use anyhow::Result;
use dialoguer::{Input, Password};
use std::sync::Arc;
use std::time::Duration;

use journal_gateway::api;
use journal_gateway::api::auth::LoginRequest;
use journal_gateway::auth::store::CredentialStore;
use journal_gateway::config::{Command, Config, PostsCommand};
use journal_gateway::error::ApiError;
use journal_gateway::gateway::RequestGateway;
use journal_gateway::transport::HttpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let transport = Arc::new(HttpTransport::new(
        &config.api_url,
        config.connect_timeout,
        config.request_timeout,
    )?);

    // A broken credential file degrades to a session-only store
    let store = match &config.credentials_db {
        Some(path) => match CredentialStore::open(path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!("Credential persistence disabled: {:#}", e);
                Arc::new(CredentialStore::in_memory())
            }
        },
        None => Arc::new(CredentialStore::in_memory()),
    };

    let gateway = RequestGateway::new(
        transport,
        store,
        Duration::from_secs(config.refresh_timeout),
    );

    match command {
        Command::Login { username } => {
            let username = match username {
                Some(name) => name,
                None => Input::new().with_prompt("Username").interact_text()?,
            };
            let password = Password::new().with_prompt("Password").interact()?;

            match api::auth::login(&gateway, &LoginRequest { username, password }).await {
                Ok(Some(user)) => println!("Logged in as {}", user.username),
                Ok(None) => println!("Logged in"),
                Err(e) => anyhow::bail!("Login failed: {}", e),
            }
        }

        Command::Logout => {
            api::auth::logout(&gateway).await;
            println!("Logged out");
        }

        Command::Whoami => {
            let user = api::auth::current_user(&gateway)
                .await
                .map_err(relogin_hint)?;
            match user.email {
                Some(email) => println!("{} <{}>", user.username, email),
                None => println!("{}", user.username),
            }
        }

        Command::Posts(PostsCommand::List { page }) => {
            let listing = api::posts::list_posts(&gateway, page, 20)
                .await
                .map_err(relogin_hint)?;
            for post in &listing.items {
                println!("#{:<6} {}", post.id, post.title);
            }
            println!(
                "page {} of {} ({} posts)",
                listing.page,
                listing.total.div_ceil(listing.page_size.max(1)),
                listing.total
            );
        }

        Command::Posts(PostsCommand::Show { id }) => {
            let post = api::posts::get_post(&gateway, id).await.map_err(relogin_hint)?;
            println!("# {}", post.title);
            if let Some(category) = &post.category {
                println!("category: {}", category.name);
            }
            if !post.tags.is_empty() {
                let names: Vec<&str> = post.tags.iter().map(|t| t.name.as_str()).collect();
                println!("tags: {}", names.join(", "));
            }
            println!();
            println!("{}", post.content);
        }
    }

    Ok(())
}

/// Suggest a re-login when the gateway had to clear credentials
fn relogin_hint(err: ApiError) -> anyhow::Error {
    if err.cleared_credentials() {
        anyhow::anyhow!("{}\n\nYour session is no longer valid. Run `journal-cli login`.", err)
    } else {
        anyhow::Error::new(err)
    }
}
