use mcprobe::{Conf, ProbeErr, RCON_PORT};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Usage: `rcon <host> <password> <command>...`
fn main() -> Result<(), ProbeErr> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".into());
    let password = args.next().unwrap_or_default();
    let commands = args.collect::<Vec<_>>();

    let mut rcon = Conf::create_with_port(&host, RCON_PORT).rcon()?;

    rcon.login(&password)?;

    for command in &commands {
        rcon.run(command)?;
    }

    for _ in &commands {
        let message = rcon.recv_timeout(Duration::from_secs(5))?;

        println!("[{}] {}", message.request_id, message.body);
    }

    rcon.close()
}
