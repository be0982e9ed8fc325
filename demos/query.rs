use mcprobe::{Conf, ProbeErr};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), ProbeErr> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "www.example.com".into());
    let server = Conf::create_from_str(&addr)?;
    let full = server.query_full()?;

    println!("{}", full);

    for plugin in full.plugins() {
        println!("{}", plugin);
    }

    Ok(())
}
