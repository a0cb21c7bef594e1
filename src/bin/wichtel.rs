//! Wichtel command-line tool.
//!
//! # Usage
//!
//! ```bash
//! wichtel init                      # prints a fresh service key once
//! export WICHTEL_SERVICE_KEY=...   # at least 16 characters
//!
//! wichtel new-session --name "Familie 2026" --organizer olga --exclusion
//! wichtel add --session <SESSION> --name Anna --phone "079 123 45 67"
//! wichtel pair <PARTICIPANT_A> <PARTICIPANT_B>
//! wichtel draw <SESSION>
//! wichtel links <SESSION>
//! wichtel reveal <TOKEN>
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wichtel_core::delivery::format_phone_number;
use wichtel_core::draw::ParticipantId;
use wichtel_core::session::{NewParticipant, ServiceCredential, SessionId, SessionManager};
use wichtel_core::WichtelConfig;

/// Environment variable holding the service credential.
const SERVICE_KEY_ENV: &str = "WICHTEL_SERVICE_KEY";

/// Anonymous Secret Santa draws
#[derive(Parser, Debug)]
#[command(name = "wichtel")]
#[command(about = "Anonymous Secret Santa draws with private reveal links")]
#[command(version)]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set up a data directory with a freshly generated service key
    Init,

    /// Create a session
    NewSession {
        /// Session name
        #[arg(short, long)]
        name: String,
        /// Organizer id
        #[arg(short, long, default_value = "organizer")]
        organizer: String,
        /// Partners must not draw each other
        #[arg(long)]
        exclusion: bool,
    },

    /// Add a participant to a planning session
    Add {
        /// Session id
        #[arg(short, long)]
        session: String,
        /// Participant name
        #[arg(short, long)]
        name: String,
        /// Phone number for WhatsApp delivery
        #[arg(short, long)]
        phone: String,
        /// This participant is the organizer
        #[arg(long)]
        organizer: bool,
    },

    /// Make two participants exclusion partners
    Pair {
        /// First participant id
        a: String,
        /// Second participant id
        b: String,
    },

    /// List sessions, or the participants of one session
    List {
        /// Session id
        #[arg(short, long)]
        session: Option<String>,
        /// Organizer whose sessions to list
        #[arg(short, long, default_value = "organizer")]
        organizer: String,
    },

    /// Draw assignments for a session
    Draw {
        /// Session id
        session: String,
    },

    /// Discard the current draw and draw again
    Redraw {
        /// Session id
        session: String,
    },

    /// Print reveal and WhatsApp links
    Links {
        /// Session id
        session: String,
        /// Public base URL (overrides the config)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Reveal the assignment behind a token
    Reveal {
        /// Reveal token
        token: String,
    },

    /// Mark a participant's link as sent
    Sent {
        /// Participant id
        participant: String,
    },

    /// Mark a drawn session as completed
    Complete {
        /// Session id
        session: String,
    },
}

fn load_config(args: &Args) -> Result<WichtelConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => WichtelConfig::from_json_file(path)?,
        None => WichtelConfig::default(),
    };
    if let Some(data_dir) = &args.data_dir {
        config.data_dir.clone_from(data_dir);
    }
    Ok(config)
}

fn load_credential() -> Result<ServiceCredential, Box<dyn std::error::Error>> {
    let key = std::env::var(SERVICE_KEY_ENV)
        .map_err(|_| format!("{SERVICE_KEY_ENV} must be set"))?;
    Ok(ServiceCredential::new(key)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = load_config(&args)?;
    let data_dir = config.data_dir.clone();

    if matches!(args.command, Command::Init) {
        let credential = ServiceCredential::generate();
        SessionManager::open(&data_dir, &credential, config)?;
        println!("{}", credential.expose_secret());
        eprintln!("Set {SERVICE_KEY_ENV} to this key; it is not stored and cannot be shown again.");
        return Ok(());
    }

    let credential = load_credential()?;
    let manager = SessionManager::open(&data_dir, &credential, config)?;

    run(&manager, args.command)
}

fn run(manager: &SessionManager, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let storage = manager.storage();

    match command {
        // Handled in `main` before a credential is required.
        Command::Init => {}

        Command::NewSession {
            name,
            organizer,
            exclusion,
        } => {
            let session = manager.create_session(&name, &organizer)?;
            if exclusion && !session.exclusion_enabled {
                storage.set_exclusion_enabled(&session.id, true)?;
            }
            println!("{}", session.id);
        }

        Command::Add {
            session,
            name,
            phone,
            organizer,
        } => {
            let mut participant = NewParticipant::new(name, phone);
            if organizer {
                participant = participant.organizer();
            }
            let record = storage.add_participant(&SessionId::new(session), &participant)?;
            println!("{}", record.id);
        }

        Command::Pair { a, b } => {
            storage.set_partners(&ParticipantId::new(a), &ParticipantId::new(b))?;
        }

        Command::List {
            session: Some(session),
            ..
        } => {
            let session_id = SessionId::new(session);
            let session = storage
                .get_session(&session_id)?
                .ok_or_else(|| format!("Session {session_id} not found"))?;
            println!(
                "{} [{}] exclusion={}",
                session.name, session.status, session.exclusion_enabled
            );

            let participants = storage.list_participants(&session_id)?;
            for p in &participants {
                let partner = p
                    .partner_id
                    .as_ref()
                    .and_then(|id| participants.iter().find(|q| &q.id == id))
                    .map_or("-", |q| q.name.as_str());
                println!(
                    "{}  {}{}  {}  partner={}  sent={}  viewed={}",
                    p.id,
                    p.name,
                    if p.is_organizer { " (organizer)" } else { "" },
                    format_phone_number(&p.phone_number),
                    partner,
                    p.whatsapp_sent_at.is_some(),
                    p.reveal_viewed_at.is_some(),
                );
            }

            if session.status.is_drawn() {
                let progress = manager.progress(&session_id)?;
                println!(
                    "sent {}/{}  viewed {}/{}",
                    progress.sent, progress.total, progress.viewed, progress.total
                );
            }
        }

        Command::List {
            session: None,
            organizer,
        } => {
            for session in storage.list_sessions(&organizer)? {
                println!("{}  {}  [{}]", session.id, session.name, session.status);
            }
        }

        Command::Draw { session } => {
            let receipt = manager.draw(&SessionId::new(session))?;
            println!("drawn: {} assignments", receipt.pairs_written);
        }

        Command::Redraw { session } => {
            let receipt = manager.redraw(&SessionId::new(session))?;
            println!(
                "redrawn: {} assignments; previous links no longer work",
                receipt.pairs_written
            );
        }

        Command::Links { session, base_url } => {
            let base_url = base_url.unwrap_or_else(|| manager.config().base_url.clone());
            for link in manager.delivery_links(&SessionId::new(session), &base_url)? {
                println!("{} ({})", link.name, link.participant_id);
                println!("  reveal:   {}", link.reveal_url);
                if let Some(whatsapp) = &link.whatsapp_url {
                    println!("  whatsapp: {whatsapp}");
                }
                if link.sent {
                    println!("  already sent");
                }
            }
        }

        Command::Reveal { token } => {
            let revealed = manager.reveal(&token)?;
            manager.track_view(&token)?;
            println!("{}", serde_json::to_string_pretty(&revealed)?);
        }

        Command::Sent { participant } => {
            storage.mark_whatsapp_sent(&ParticipantId::new(participant))?;
        }

        Command::Complete { session } => {
            storage.complete_session(&SessionId::new(session))?;
        }
    }

    Ok(())
}
