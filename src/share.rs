use crate::{
    srv::{DnsSrvResolver, SrvRecord, SrvResolver},
    Conf, ProbeErr, SocketConf,
};
use std::{
    io::{self, ErrorKind, Read, Write},
    net::{IpAddr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::debug;

/// Where a request is actually sent after the optional SRV rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub host: String,
    pub port: u16,
    pub srv: Option<SrvRecord>,
}

pub(crate) fn get_server_current_time() -> Result<u64, ProbeErr> {
    let tm = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();

    u64::try_from(tm).map_err(|_| {
        ProbeErr::InternalErr(format!(
            "Failed to obtain current time. It should not exceed u64::MAX, but got: {}",
            tm
        ))
    })
}

/// Apply the SRV record for `conf.host`, if enabled and one exists.
pub(crate) fn resolve_target(conf: &Conf) -> Target {
    let timeout = conf
        .socket_conf
        .connect_timeout
        .unwrap_or(Duration::from_secs(5));

    resolve_target_with(conf, &DnsSrvResolver::new(timeout))
}

pub(crate) fn resolve_target_with<S: SrvResolver + ?Sized>(conf: &Conf, resolver: &S) -> Target {
    let srv = if conf.enable_srv {
        resolver.lookup(&conf.host)
    } else {
        None
    };

    match srv {
        Some(record) => {
            debug!("{}:{} redirected to {} by SRV", conf.host, conf.port, record);

            Target {
                host: record.host.clone(),
                port: record.port,
                srv: Some(record),
            }
        }
        None => Target {
            host: conf.host.clone(),
            port: conf.port,
            srv: None,
        },
    }
}

fn lookup_addrs(host: &str, port: u16) -> Result<Vec<SocketAddr>, ProbeErr> {
    let mut addrs = (host, port).to_socket_addrs()?.collect::<Vec<_>>();

    // IPv4 first; the UDP bind address is IPv4 by default.
    addrs.sort_by_key(|addr| addr.is_ipv6());

    if addrs.is_empty() {
        return Err(ProbeErr::IoErr(std::io::Error::new(
            ErrorKind::NotFound,
            format!("no address found for {}:{}", host, port),
        )));
    }

    Ok(addrs)
}

/// Open a TCP stream to `host:port`, trying each resolved address in turn.
pub(crate) fn create_tcp_socket(
    host: &str,
    port: u16,
    socket_conf: &SocketConf,
) -> Result<TcpStream, ProbeErr> {
    let mut last_err = None;

    for addr in lookup_addrs(host, port)? {
        debug!("connecting to {} over TCP", addr);

        let connected = match socket_conf.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };

        match connected {
            Ok(socket) => {
                socket.set_read_timeout(socket_conf.read_time_out)?;
                socket.set_write_timeout(socket_conf.write_timeout)?;
                socket.set_nodelay(true)?;

                return Ok(socket);
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err
        .map(ProbeErr::from)
        .unwrap_or_else(|| ProbeErr::InternalErr("no address to connect to".into())))
}

/// Point in time an exchange must finish by. `None` never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    /// Start counting `timeout` from now.
    pub fn after(timeout: Option<Duration>) -> Self {
        Self(timeout.and_then(|timeout| Instant::now().checked_add(timeout)))
    }

    /// Time left, ready for `set_read_timeout` / `set_write_timeout`.
    /// Fails with [ProbeErr::Timeout] once the deadline has passed.
    pub fn remaining(&self) -> Result<Option<Duration>, ProbeErr> {
        match self.0 {
            None => Ok(None),
            Some(at) => at
                .checked_duration_since(Instant::now())
                .filter(|left| !left.is_zero())
                .map(Some)
                .ok_or(ProbeErr::Timeout),
        }
    }
}

fn remaining_io(deadline: &Deadline) -> io::Result<Option<Duration>> {
    deadline
        .remaining()
        .map_err(|_| io::Error::new(ErrorKind::TimedOut, "exchange deadline passed"))
}

/// A TCP stream whose reads and writes share one deadline per direction,
/// counted from when the wrapper is created.
///
/// Each call only gets the time still left, so a peer trickling bytes cannot
/// stretch the exchange past the configured timeout.
#[derive(Debug)]
pub(crate) struct DeadlineStream<'a> {
    stream: &'a TcpStream,
    read_deadline: Deadline,
    write_deadline: Deadline,
}

impl<'a> DeadlineStream<'a> {
    pub fn new(stream: &'a TcpStream, socket_conf: &SocketConf) -> Self {
        Self {
            stream,
            read_deadline: Deadline::after(socket_conf.read_time_out),
            write_deadline: Deadline::after(socket_conf.write_timeout),
        }
    }
}

impl Read for DeadlineStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream
            .set_read_timeout(remaining_io(&self.read_deadline)?)?;

        let mut stream = self.stream;
        stream.read(buf)
    }
}

impl Write for DeadlineStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream
            .set_write_timeout(remaining_io(&self.write_deadline)?)?;

        let mut stream = self.stream;
        stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut stream = self.stream;
        stream.flush()
    }
}

/// Receive one datagram before `deadline`.
pub(crate) fn recv_before(
    socket: &UdpSocket,
    bufs: &mut [u8],
    deadline: &Deadline,
) -> Result<usize, ProbeErr> {
    socket.set_read_timeout(deadline.remaining()?)?;

    Ok(socket.recv(bufs)?)
}

/// Bind a UDP socket per [`SocketConf`] and connect it to `host:port`, so
/// datagrams from any other peer are filtered out by the OS.
pub(crate) fn create_udp_socket(
    host: &str,
    port: u16,
    socket_conf: &SocketConf,
) -> Result<UdpSocket, ProbeErr> {
    let addrs = lookup_addrs(host, port)?;
    let addr = addrs[0];

    let local: SocketAddr = match addr.ip() {
        IpAddr::V4(_) => (socket_conf.rep_udp_ipv4, socket_conf.rep_udp_port).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, socket_conf.rep_udp_port).into(),
    };

    let socket = UdpSocket::bind(local)?;

    socket.set_read_timeout(socket_conf.read_time_out)?;
    socket.set_write_timeout(socket_conf.write_timeout)?;
    socket.connect(addr)?;

    debug!("UDP socket {} connected to {}", socket.local_addr()?, addr);

    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Option<SrvRecord>);

    impl SrvResolver for FixedResolver {
        fn lookup(&self, _host: &str) -> Option<SrvRecord> {
            self.0.clone()
        }
    }

    fn record() -> SrvRecord {
        SrvRecord {
            host: "node-3.example.com".into(),
            port: 25570,
        }
    }

    #[test]
    fn srv_rewrites_target() {
        let conf = Conf::create("play.example.com");
        let target = resolve_target_with(&conf, &FixedResolver(Some(record())));

        assert_eq!(target.host, "node-3.example.com");
        assert_eq!(target.port, 25570);
        assert_eq!(target.srv, Some(record()));
    }

    #[test]
    fn srv_disabled_or_missing_keeps_target() {
        let conf = Conf::create_with_port("play.example.com", 25600).with_srv(false);
        let target = resolve_target_with(&conf, &FixedResolver(Some(record())));

        assert_eq!(target.host, "play.example.com");
        assert_eq!(target.port, 25600);
        assert_eq!(target.srv, None);

        let conf = Conf::create("play.example.com");
        let target = resolve_target_with(&conf, &FixedResolver(None));

        assert_eq!(target.port, 25565);
        assert_eq!(target.srv, None);
    }

    #[test]
    fn udp_socket_is_connected() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = peer.local_addr().unwrap().port();
        let socket = create_udp_socket("127.0.0.1", port, &SocketConf::default()).unwrap();

        assert_eq!(socket.peer_addr().unwrap(), peer.local_addr().unwrap());
    }

    #[test]
    fn deadline_runs_out() {
        let deadline = Deadline::after(Some(Duration::from_millis(30)));

        assert!(deadline.remaining().unwrap().unwrap() <= Duration::from_millis(30));

        std::thread::sleep(Duration::from_millis(40));
        assert!(matches!(deadline.remaining(), Err(ProbeErr::Timeout)));

        assert_eq!(Deadline::after(None).remaining().unwrap(), None);
    }

    #[test]
    fn trickling_peer_cannot_outlast_deadline() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            // One byte every 50 ms, well inside a per-read timeout of 200 ms.
            for _ in 0..30 {
                if stream.write_all(b"x").is_err() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        });

        let socket_conf = SocketConf {
            read_time_out: Some(Duration::from_millis(200)),
            ..SocketConf::default()
        };
        let socket = create_tcp_socket("127.0.0.1", port, &socket_conf).unwrap();
        let mut stream = DeadlineStream::new(&socket, &socket_conf);
        let started = Instant::now();

        let err = crate::packet::PacketReader::new(&mut stream)
            .read_line()
            .unwrap_err();

        assert!(matches!(err, ProbeErr::Timeout), "{:?}", err);
        assert!(started.elapsed() < Duration::from_millis(1000));

        drop(stream);
        drop(socket);
        peer.join().unwrap();
    }

    #[test]
    fn clock_is_after_epoch() {
        assert!(get_server_current_time().unwrap() > 0);
    }
}
