use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(SocketAddr, proof_push::config::AppConfig),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    run_with(Cli::parse())
}

fn run_with(cli: Cli) -> RunOutcome {
    if let Some(Command::VapidInit(args)) = cli.command {
        let code = run_vapid_init(args);
        return RunOutcome::Exit(code);
    }

    let Some(datastore_url) = cli.datastore_url else {
        eprintln!("error: --datastore-url is required unless using a subcommand");
        return RunOutcome::Exit(2);
    };
    let Some(service_key) = cli.service_key else {
        eprintln!("error: --service-key is required unless using a subcommand");
        return RunOutcome::Exit(2);
    };
    if service_key.trim().is_empty() {
        eprintln!("error: service key cannot be empty");
        return RunOutcome::Exit(2);
    }

    RunOutcome::Serve(
        cli.listen,
        proof_push::config::AppConfig {
            datastore_url,
            service_key,
            vapid_private_key: cli.vapid_private_key,
            vapid_public_key: cli.vapid_public_key,
            vapid_subject: cli.vapid_subject,
            apns_key_id: cli.apns_key_id,
            apns_team_id: cli.apns_team_id,
            apns_private_key: cli.apns_private_key,
            apns_topic: cli.apns_topic,
            apns_endpoint: cli.apns_endpoint,
        },
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "proof-push",
    version,
    about = "Push notification dispatch service"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    #[arg(long, env = "PROOF_DATASTORE_URL")]
    datastore_url: Option<String>,
    #[arg(long, env = "PROOF_SERVICE_KEY")]
    service_key: Option<String>,
    #[arg(long, env = "PROOF_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "PROOF_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "PROOF_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, env = "PROOF_APNS_KEY_ID")]
    apns_key_id: Option<String>,
    #[arg(long, env = "PROOF_APNS_TEAM_ID")]
    apns_team_id: Option<String>,
    #[arg(long, env = "PROOF_APNS_PRIVATE_KEY")]
    apns_private_key: Option<String>,
    #[arg(long, env = "PROOF_APNS_TOPIC", default_value = "app.getproof.mobile")]
    apns_topic: String,
    #[arg(
        long,
        env = "PROOF_APNS_ENDPOINT",
        default_value = "https://api.push.apple.com"
    )]
    apns_endpoint: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh VAPID keypair and print it as environment lines.
    VapidInit(VapidInitArgs),
}

#[derive(Args, Debug)]
struct VapidInitArgs {
    #[arg(long)]
    subject: Option<String>,
}

fn run_vapid_init(args: VapidInitArgs) -> i32 {
    let credentials = proof_push::generate_vapid_credentials();
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("PROOF_VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("PROOF_VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("PROOF_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace PROOF_VAPID_SUBJECT with a contact URI you control.");
    }
    0
}
