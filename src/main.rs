use anyhow::Result;
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use std::env;
use std::path::PathBuf;

mod credentials;
mod utils;

use crate::credentials::{load_credentials, save_credentials, set_config_path_override, Credentials};
use careline::api::{ClientEvent, CrmClient, HistoryQueryOptions};
use careline::models::{DeliveryStatus, Direction, Message, MessageState, MessageTemplate};

/// Command line arguments for Careline
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Careline: a CLI WhatsApp Business messaging client for healthcare CRM backends.",
    long_about = "Careline is a command-line messaging client for CRM backends with a WhatsApp\n\
    Business channel.\n\n\
    Optional parameters:\n\
    --base-url <URL>       Override the backend base URL\n\
    --config-dir <PATH>    Override the directory for credentials and the log file\n\
    Use -h or --help to see all options."
)]
struct Args {
    /// Backend base URL, e.g. https://crm.example.com
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Directory for credentials and the log file
    #[arg(long, value_name = "PATH")]
    config_dir: Option<PathBuf>,
}

/// Prompts the user for login details or uses environment variables
fn prompt_credentials(base_url_override: Option<&str>) -> (String, String, String) {
    let base_url = match base_url_override {
        Some(url) => url.to_string(),
        None => env::var("CARELINE_BASE_URL").unwrap_or_else(|_| {
            eprintln!("Enter backend base URL (e.g., https://crm.example.com):");
            utils::read_line().unwrap_or_default()
        }),
    };

    let tenant_id = env::var("CARELINE_TENANT").unwrap_or_else(|_| {
        eprintln!("Enter tenant id:");
        utils::read_line().unwrap_or_default()
    });

    let api_token = env::var("CARELINE_TOKEN").unwrap_or_else(|_| {
        eprintln!("Enter API token:");
        utils::read_line().unwrap_or_default()
    });

    (base_url, tenant_id, api_token)
}

/// One printable line per message for the terminal view
fn format_message(message: &Message) -> String {
    let arrow = match message.direction {
        Direction::Incoming => "<-",
        Direction::Outgoing => "->",
    };
    let status = match (message.state, message.status) {
        (MessageState::Pending, _) => " (sending)",
        (MessageState::Failed, _) => " (FAILED)",
        (_, DeliveryStatus::Read) => " (read)",
        _ => "",
    };
    let body = if message.text.is_empty() {
        match &message.metadata.media {
            Some(media) => format!("[{}]", media.filename.as_deref().unwrap_or("media")),
            None => String::from("[no text]"),
        }
    } else {
        message.text.clone()
    };
    let mut line = format!(
        "[{}] {} {}{}",
        message.timestamp.format("%H:%M:%S"),
        arrow,
        body,
        status
    );
    if let Some(err) = &message.metadata.error {
        line.push_str(&format!(" - {}", err));
    }
    line
}

async fn read_command() -> Result<String> {
    tokio::task::spawn_blocking(utils::read_line).await?
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments FIRST
    let args = Args::parse();

    // Determine log and credential paths based on --config-dir
    let log_file_path = match &args.config_dir {
        Some(dir) => {
            if !dir.exists() {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    eprintln!(
                        "Warning: Failed to create config directory {}: {}. Log file might not be created.",
                        dir.display(),
                        e
                    );
                    PathBuf::from("careline.log")
                } else {
                    dir.join("careline.log")
                }
            } else {
                dir.join("careline.log")
            }
        }
        None => PathBuf::from("careline.log"),
    };

    utils::setup_logging(log_file_path.to_str(), LevelFilter::Debug)?;

    if let Some(dir) = &args.config_dir {
        set_config_path_override(dir.join("credentials.json"));
    }

    // Load saved credentials or prompt for new ones
    let saved = load_credentials().unwrap_or_else(|e| {
        warn!("Failed to load saved credentials: {}", e);
        None
    });

    let (base_url, tenant_id, api_token) = match (&saved, &args.base_url) {
        (Some(creds), None) => (
            creds.base_url.clone(),
            creds.tenant_id.clone(),
            creds.get_api_token().unwrap_or_default(),
        ),
        _ => prompt_credentials(args.base_url.as_deref()),
    };

    let (client, mut event_rx) = CrmClient::new(&base_url, &tenant_id, &api_token)?;

    info!("Connecting to {} as tenant {}", base_url, tenant_id);
    if let Err(e) = client.connect().await {
        error!("Failed to connect: {}", e);
        eprintln!("Failed to connect: {}", e);
        return Err(e.into());
    }
    println!("Connected to {} (tenant {})", base_url, tenant_id);

    // Persist working credentials for the next session
    if saved.is_none() {
        if let Err(e) = save_credentials(&Credentials::new(&base_url, &tenant_id, &api_token)) {
            warn!("Failed to save credentials: {}", e);
        }
    }

    // Drain client events onto the terminal in the background
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ClientEvent::MessageUpserted { message, .. } => {
                    println!("{}", format_message(&message));
                }
                ClientEvent::ConversationUpdated { contact_id, messages } => {
                    if let Some(last) = messages.last() {
                        println!("({}) {}", contact_id, format_message(last));
                    }
                }
                ClientEvent::ContactUpdated(contact) => {
                    println!("* contact updated: {} ({})", contact.name, contact.phone);
                }
                ClientEvent::RealtimeDown { reason } => {
                    println!("* real-time channel down: {} (reconnecting)", reason);
                }
            }
        }
    });

    println!("Commands: /contacts /open <id> /send <text> /media <path> [caption] /template <name> [params..] /templates /quit");

    let mut current_contact: Option<String> = None;
    let mut templates: Vec<MessageTemplate> = Vec::new();

    loop {
        let line = read_command().await?;
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(' ') {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line.as_str(), ""),
        };

        match command {
            "/quit" => break,
            "/contacts" => match client.list_contacts().await {
                Ok(contacts) => {
                    for contact in &contacts {
                        let window = match &contact.window_expires_at {
                            Some(ts) => format!("window until {}", ts.format("%Y-%m-%d %H:%M")),
                            None => "window closed".to_string(),
                        };
                        println!("{}  {}  {}  ({})", contact.id, contact.name, contact.phone, window);
                    }
                }
                Err(e) => eprintln!("Failed to list contacts: {}", e),
            },
            "/templates" => match client.list_templates().await {
                Ok(list) => {
                    for template in &list {
                        println!("{}  {}  [{}] {}", template.id, template.name, template.language, template.body);
                    }
                    templates = list;
                }
                Err(e) => eprintln!("Failed to list templates: {}", e),
            },
            "/open" => {
                if rest.is_empty() {
                    eprintln!("Usage: /open <contact-id>");
                    continue;
                }
                let contact_id = rest.to_string();
                match client
                    .fetch_conversation_history(&contact_id, HistoryQueryOptions::new())
                    .await
                {
                    Ok(result) => {
                        for message in client.conversation(&contact_id).await {
                            println!("{}", format_message(&message));
                        }
                        if !result.complete {
                            // Keep filling in older pages while the user reads
                            let background = client.clone();
                            let id = contact_id.clone();
                            tokio::spawn(async move {
                                if let Err(e) =
                                    background.load_complete_history_in_background(&id, result, 20).await
                                {
                                    warn!("Background history load for {} stopped: {}", id, e);
                                }
                            });
                        }
                        current_contact = Some(contact_id);
                    }
                    Err(e) => eprintln!("Failed to open conversation: {}", e),
                }
            }
            "/send" => {
                let Some(contact_id) = current_contact.clone() else {
                    eprintln!("Open a conversation first with /open <contact-id>");
                    continue;
                };
                if let Err(e) = client.send_text_message(&contact_id, rest).await {
                    eprintln!("Send failed: {}", e);
                }
            }
            "/media" => {
                let Some(contact_id) = current_contact.clone() else {
                    eprintln!("Open a conversation first with /open <contact-id>");
                    continue;
                };
                let (path, caption) = match rest.split_once(' ') {
                    Some((path, caption)) => (path, caption.trim()),
                    None => (rest, ""),
                };
                if path.is_empty() {
                    eprintln!("Usage: /media <path> [caption]");
                    continue;
                }
                if let Err(e) = client
                    .send_media_message(&contact_id, std::path::Path::new(path), caption)
                    .await
                {
                    eprintln!("Media send failed: {}", e);
                }
            }
            "/template" => {
                let Some(contact_id) = current_contact.clone() else {
                    eprintln!("Open a conversation first with /open <contact-id>");
                    continue;
                };
                let mut parts = rest.split_whitespace();
                let Some(name) = parts.next() else {
                    eprintln!("Usage: /template <name> [params..]");
                    continue;
                };
                if templates.is_empty() {
                    templates = client.list_templates().await.unwrap_or_default();
                }
                let Some(template) = templates.iter().find(|t| t.name == name).cloned() else {
                    eprintln!("Unknown template '{}'; run /templates to refresh", name);
                    continue;
                };
                let parameters: Vec<String> = parts.map(str::to_string).collect();
                if let Err(e) = client
                    .send_template_message(&contact_id, &template, &parameters)
                    .await
                {
                    eprintln!("Template send failed: {}", e);
                }
            }
            _ => eprintln!("Unknown command '{}'", command),
        }
    }

    client.disconnect().await;
    info!("Shutting down");
    Ok(())
}
