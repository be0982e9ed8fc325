use mcprobe::{Conf, ProbeErr, BEDROCK_PORT};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), ProbeErr> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = std::env::args().nth(1).unwrap_or_else(|| "www.example.com".into());
    let server = Conf::create_with_port(&host, BEDROCK_PORT);
    let info = server.get_bedrock_server_status()?;

    println!("{}", info);

    Ok(())
}
