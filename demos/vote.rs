use mcprobe::{Conf, ProbeErr, Vote, VOTIFIER_PORT};
use tracing_subscriber::EnvFilter;

/// Usage: `vote <host> <token> <username>`
fn main() -> Result<(), ProbeErr> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".into());
    let token = args.next().unwrap_or_default();
    let username = args.next().unwrap_or_else(|| "Notch".into());

    let server = Conf::create_with_port(&host, VOTIFIER_PORT);

    server.send_vote(&Vote::new("mcprobe", &username, &token))?;

    println!("vote for {} delivered to {}", username, server);

    Ok(())
}
