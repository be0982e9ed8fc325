use mcprobe::{Conf, ProbeErr, SocketConf, BEDROCK_PORT, JAVA_PORT};
use std::time::Duration;

fn main() -> Result<(), ProbeErr> {
    let conf = Conf::create("www.example.com");

    assert_eq!(conf.host, "www.example.com");
    assert_eq!(conf.port, JAVA_PORT);
    assert!(conf.enable_srv);
    assert_eq!(conf.socket_conf, SocketConf::default());

    let conf = Conf::create_with_port("www.example.com", BEDROCK_PORT);
    assert_eq!(conf.port, 19132);

    let conf = Conf::create_from_str("192.168.1.10:25566")?;

    assert_eq!(conf.host, "192.168.1.10");
    assert_eq!(conf.port, 25566);

    let conf = Conf::create_from_str("[::1]:25565")?
        .with_srv(false)
        .with_timeout(Duration::from_secs(2));

    assert_eq!(conf.host, "::1");
    assert!(!conf.enable_srv);
    assert_eq!(conf.socket_conf.read_time_out, Some(Duration::from_secs(2)));

    println!("{}", conf);

    Ok(())
}
