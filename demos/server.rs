use mcprobe::{Conf, ProbeErr, Server};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), ProbeErr> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "www.example.com".into());
    let server = Conf::create_from_str(&addr)?;
    let info: Server = server.get_server_status()?;

    println!("{}", info);
    println!("{}", info.motd.to_html());

    if let Some(favicon) = &info.favicon {
        let (width, height) = favicon.dimensions()?;

        println!("favicon: {}x{}", width, height);
    }

    Ok(())
}
