//! todosync terminal client
//!
//! Thin driver for trying the client against a running todo service.
//!
//! # Usage
//!
//! ```bash
//! # Service at TODOSYNC_SERVICE_URL (default http://localhost:2000)
//! cargo run --bin todosync -- ada
//! ```
//!
//! Commands are read from stdin, one per line:
//!
//! ```text
//! new <name>                 create a list
//! drop <list>                delete a list
//! add <list>                 append a blank item
//! edit <list> <item> <text>  change an item's text
//! rm <list> <item>           delete an item
//! show                       print all lists
//! quit                       leave
//! ```

use todosync_client::{
    ClientConfig, ItemId, ListId, SessionAction, TodoCollection, TodoItem, TodoSession,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "commands: new <name> | drop <list> | add <list> | edit <list> <item> <text> | rm <list> <item> | show | quit";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Action(SessionAction),
    Edit {
        list: ListId,
        item: ItemId,
        text: String,
    },
    Show,
    Quit,
    Nothing,
}

fn parse(line: &str) -> Result<Input, &'static str> {
    let line = line.trim();
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    match command {
        "" => Ok(Input::Nothing),
        "new" if !rest.is_empty() => Ok(Input::Action(SessionAction::CreateList {
            name: rest.to_string(),
        })),
        "drop" => match args.next() {
            Some(list) => Ok(Input::Action(SessionAction::DeleteList { list: list.into() })),
            None => Err("usage: drop <list>"),
        },
        "add" => match args.next() {
            Some(list) => Ok(Input::Action(SessionAction::AddItem { list: list.into() })),
            None => Err("usage: add <list>"),
        },
        "edit" => {
            let mut parts = rest.splitn(3, ' ');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(list), Some(item), text) if !list.is_empty() && !item.is_empty() => {
                    Ok(Input::Edit {
                        list: list.into(),
                        item: item.into(),
                        text: text.unwrap_or_default().to_string(),
                    })
                },
                _ => Err("usage: edit <list> <item> <text>"),
            }
        },
        "rm" => match (args.next(), args.next()) {
            (Some(list), Some(item)) => Ok(Input::Action(SessionAction::DeleteItem {
                list: list.into(),
                item: item.into(),
            })),
            _ => Err("usage: rm <list> <item>"),
        },
        "new" => Err("usage: new <name>"),
        "show" => Ok(Input::Show),
        "quit" | "exit" => Ok(Input::Quit),
        _ => Err(USAGE),
    }
}

fn print_lists(lists: &TodoCollection) {
    if lists.is_empty() {
        println!("(no lists)");
        return;
    }
    for list in lists.lists() {
        println!("[{}] {} (owner: {})", list.id, list.name, list.owner);
        for item in &list.items {
            let mark = if item.marked { 'x' } else { ' ' };
            println!("    [{mark}] {} {}", item.id, item.text);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,todosync_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env();
    let user = std::env::args()
        .nth(1)
        .or_else(|| config.user.clone())
        .ok_or("usage: todosync <name> (or set TODOSYNC_USER)")?;

    tracing::info!(service = %config.service_url, "Starting todosync");
    let mut session = TodoSession::connect(&user, &config)?;
    let mut actions = session.subscribe_actions();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut revision = 0;
    let mut last_error = None;

    println!("{USAGE}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse(&line) {
                    Ok(Input::Action(action)) => {
                        session.send(action).await?;
                    },
                    Ok(Input::Edit { list, item, text }) => {
                        let current = session.read(|s| s.lists.item(&list, &item).cloned()).await;
                        let item = current.map_or_else(
                            || TodoItem::new(item.clone(), list.clone(), text.clone()),
                            |current| current.with_text(text.clone()),
                        );
                        session.send(SessionAction::UpdateItemText { item }).await?;
                    },
                    Ok(Input::Show) => print_lists(&session.lists().await),
                    Ok(Input::Quit) => break,
                    Ok(Input::Nothing) => {},
                    Err(usage) => eprintln!("{usage}"),
                }
            },
            action = actions.recv() => {
                match action {
                    Ok(_) => {},
                    Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "Display fell behind"),
                    Err(RecvError::Closed) => break,
                }

                let (current, lists, error) = session
                    .read(|s| {
                        let lists = (s.revision != revision).then(|| s.lists.clone());
                        (s.revision, lists, s.last_error.clone())
                    })
                    .await;

                if let Some(lists) = lists {
                    revision = current;
                    print_lists(&lists);
                }
                match &error {
                    Some(message) if error != last_error => eprintln!("error: {message}"),
                    _ => {},
                }
                last_error = error;
            },
        }
    }

    if let Err(error) = session.close().await {
        tracing::warn!(%error, "Commands still running at exit");
    }
    tracing::info!("Bye");
    Ok(())
}
