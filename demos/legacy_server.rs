use mcprobe::{Conf, ProbeErr};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), ProbeErr> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "www.example.com".into());
    let server = Conf::create_from_str(&addr)?;

    println!("{}", server.get_legacy_server_status()?);

    Ok(())
}
