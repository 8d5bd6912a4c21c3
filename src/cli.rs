use clap::{Args, Parser, Subcommand};
use pushwire::config::{
    ApiToken, AppConfig, DEFAULT_CONCURRENCY, DEFAULT_SEND_TIMEOUT, DEFAULT_SUBJECT, DEFAULT_TTL,
    DeliverySettings, NotificationDefaults, VapidConfig,
};
use pushwire::types::push::NotificationRequest;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve {
        addr: SocketAddr,
        config: AppConfig,
    },
    Send {
        config: AppConfig,
        request: NotificationRequest,
    },
    Exit(u8),
}

pub(crate) fn parse() -> Cli {
    Cli::parse()
}

pub(crate) fn run(cli: Cli) -> RunOutcome {
    let command = match cli.command {
        Some(Command::Init(ref args)) => return RunOutcome::Exit(run_init(args)),
        Some(Command::Send(ref args)) => Some(notification_request(args)),
        None => None,
    };

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    match command {
        Some(request) => RunOutcome::Send { config, request },
        None => RunOutcome::Serve {
            addr: cli.bind,
            config,
        },
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pushwire",
    version,
    about = "Web Push fan-out service with VAPID and aes128gcm payload encryption"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Address the HTTP server listens on.
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
    #[arg(long, global = true, env = "VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, global = true, env = "VAPID_PRIVATE_KEY", hide_env_values = true)]
    vapid_private_key: Option<String>,
    #[arg(long, global = true, env = "VAPID_SUBJECT", default_value = DEFAULT_SUBJECT)]
    vapid_subject: String,
    /// JSON file holding the subscription list.
    #[arg(long, global = true, env = "PUSHWIRE_SUBSCRIPTIONS")]
    subscriptions: Option<PathBuf>,
    /// Maximum number of push requests in flight.
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
    /// Per-request timeout, e.g. 500ms, 10s or 1m.
    #[arg(long, global = true)]
    send_timeout: Option<String>,
    /// Seconds the push service keeps an undelivered message.
    #[arg(long, global = true, default_value_t = DEFAULT_TTL)]
    ttl: u32,
    #[arg(long, global = true)]
    icon: Option<String>,
    #[arg(long, global = true)]
    badge: Option<String>,
    /// Bearer token required by `POST /api/notify`.
    #[arg(long, env = "PUSHWIRE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a VAPID key pair.
    Init(InitArgs),
    /// Send one notification and print the delivery report.
    Send(SendArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct SendArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    message: String,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    tag: Option<String>,
    /// Only notify these users. Repeatable; omit to notify everyone.
    #[arg(long = "user")]
    users: Vec<String>,
}

fn run_init(args: &InitArgs) -> u8 {
    let credentials = pushwire::generate_vapid_credentials();
    let (subject, show_subject_note) = match args.subject.as_deref() {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com", true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace VAPID_SUBJECT with a contact URI you control.");
    }
    println!();
    println!(
        "--vapid-private-key \"{}\" --vapid-public-key \"{}\" --vapid-subject \"{subject}\"",
        credentials.private_key, credentials.public_key
    );
    0
}

fn notification_request(args: &SendArgs) -> NotificationRequest {
    NotificationRequest {
        title: args.title.clone(),
        message: args.message.clone(),
        url: args.url.clone(),
        tag: args.tag.clone(),
        user_ids: (!args.users.is_empty()).then(|| args.users.clone()),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, String> {
    if cli.concurrency == 0 {
        return Err("concurrency must be greater than 0".to_string());
    }
    if cli.ttl == 0 {
        return Err("ttl must be greater than 0".to_string());
    }
    let send_timeout = match cli.send_timeout.as_deref() {
        Some(raw) => parse_send_timeout(raw)?,
        None => DEFAULT_SEND_TIMEOUT,
    };

    Ok(AppConfig {
        vapid: VapidConfig {
            public_key: cli.vapid_public_key.clone(),
            private_key: cli.vapid_private_key.clone(),
            subject: cli.vapid_subject.trim().to_string(),
        },
        delivery: DeliverySettings {
            concurrency: cli.concurrency,
            send_timeout,
            ttl: cli.ttl,
        },
        notification: NotificationDefaults {
            icon: cli.icon.clone(),
            badge: cli.badge.clone(),
        },
        subscriptions: cli.subscriptions.clone(),
        api_token: cli.api_token.as_deref().and_then(ApiToken::new),
    })
}

fn parse_send_timeout(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("send timeout cannot be empty".to_string());
    }

    let (amount, unit) = if let Some(amount) = value.strip_suffix("ms") {
        (amount, "ms")
    } else {
        match value.chars().last() {
            Some(ch) if ch.is_ascii_alphabetic() => value.split_at(value.len() - 1),
            _ => (value, "s"),
        }
    };

    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid send timeout '{value}'; expected <number>[ms|s|m]"))?;

    if amount == 0 {
        return Err("send timeout must be greater than 0".to_string());
    }

    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "s" | "S" => Ok(Duration::from_secs(amount)),
        "m" | "M" => Ok(Duration::from_secs(amount.saturating_mul(60))),
        _ => Err(format!(
            "invalid send timeout '{value}'; expected <number>[ms|s|m]"
        )),
    }
}
