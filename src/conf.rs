use crate::{
    query, rcon::Rcon, server, vote, BedrockServer, LegacyServer, ProbeErr, QueryBasic, QueryFull,
    Server, Vote,
};
use std::{net::Ipv4Addr, time::Duration};

/// Default port of a Java Edition server.
pub const JAVA_PORT: u16 = 25565;
/// Default port of a Bedrock Edition server.
pub const BEDROCK_PORT: u16 = 19132;
/// Default RCON port.
pub const RCON_PORT: u16 = 25575;
/// Default Votifier port.
pub const VOTIFIER_PORT: u16 = 8192;
/// Protocol version sent in the handshake unless configured otherwise.
pub const DEFAULT_PROTOCOL_VERSION: i32 = 47;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Main struct used for configuring the connection.
///
/// By default, the port number for Java Edition is 25565,
/// and for Bedrock Edition (including Pocket Edition), it is 19132.
/// RCON and Votifier listen on 25575 and 8192 respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conf {
    /// Server IP address or a domain name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Look up the `_minecraft._tcp` SRV record before connecting.
    /// Only the Java, legacy and Bedrock status pings honour it.
    pub enable_srv: bool,
    /// See [SocketConf].
    pub socket_conf: SocketConf,
    /// Protocol version sent in the Java handshake.
    pub protocol_version: i32,
    /// Query session ID. A process-wide counter is used when unset.
    pub session_id: Option<i32>,
    /// Client GUID sent in the Bedrock ping. Random when unset.
    pub client_guid: Option<i64>,
}

/// Additional socket configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConf {
    /// Set the timeout for establishing a TCP connection.
    pub connect_timeout: Option<Duration>,
    /// Set the read timeout for socket.
    pub read_time_out: Option<Duration>,
    /// Set the write timeout for socket.
    pub write_timeout: Option<Duration>,
    /// Specify the address for creating a UDP connection.
    /// The default value is [Ipv4Addr::UNSPECIFIED].
    pub rep_udp_ipv4: Ipv4Addr,
    /// Specify the port for creating a UDP connection.
    /// The default value is 0, letting the OS pick a free port.
    pub rep_udp_port: u16,
}

impl Default for SocketConf {
    fn default() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_TIMEOUT),
            read_time_out: Some(DEFAULT_TIMEOUT),
            write_timeout: Some(DEFAULT_TIMEOUT),
            rep_udp_ipv4: Ipv4Addr::UNSPECIFIED,
            rep_udp_port: 0,
        }
    }
}

impl Conf {
    /// Create a connection configuration using the default port.
    ///
    /// Default port is based on Java Edition(25565), to create a default port based on
    /// Bedrock Edition(19132), use [Conf::create_with_port] to manually specify it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use mcprobe::{Conf, SocketConf};
    /// #
    /// let conf = Conf::create("www.example.com");
    /// #
    /// # assert_eq!(conf.host, "www.example.com");
    /// # assert_eq!(conf.port, 25565);
    /// # assert!(conf.enable_srv);
    /// # assert_eq!(conf.socket_conf, SocketConf::default());
    /// ```
    pub fn create(host: &str) -> Self {
        Self::create_with_port(host, JAVA_PORT)
    }

    /// Create a connection configuration using the specified port.
    ///
    /// # Example
    ///
    /// ```
    /// # use mcprobe::Conf;
    /// #
    /// let conf = Conf::create_with_port("www.example.com", 19132);
    /// #
    /// # assert_eq!(conf.port, 19132);
    /// ```
    pub fn create_with_port(host: &str, port: u16) -> Self {
        Self {
            host: host.trim().into(),
            port,
            enable_srv: true,
            socket_conf: SocketConf::default(),
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            session_id: None,
            client_guid: None,
        }
    }

    /// Create a connection configuration by parsing an address string.
    ///
    /// Accepts `host`, `host:port` and `[ipv6]:port`. A bare IPv6 address
    /// is taken as a host. When the port is omitted, the Java Edition
    /// default is used. An empty host or a port that does not fit in [u16]
    /// is a [ProbeErr::MalformedField].
    ///
    /// # Example
    ///
    /// ```
    /// # use mcprobe::{Conf, ProbeErr};
    /// #
    /// # fn main() -> Result<(), ProbeErr> {
    ///     let conf = Conf::create_from_str("www.example.com:25566")?;
    /// #
    /// #   assert_eq!(conf.host, "www.example.com");
    /// #   assert_eq!(conf.port, 25566);
    /// #
    /// #   let conf = Conf::create_from_str("[::1]:19132")?;
    /// #   assert_eq!(conf.host, "::1");
    /// #   assert_eq!(conf.port, 19132);
    /// #
    /// #   assert!(Conf::create_from_str(":25565").is_err());
    /// #   assert!(Conf::create_from_str("www.example.com:-1").is_err());
    /// #   Ok(())
    /// # }
    /// ```
    pub fn create_from_str(addr: &str) -> Result<Self, ProbeErr> {
        let (host, port) = split_host_port(addr.trim())?;

        if host.is_empty() {
            return Err(ProbeErr::MalformedField(format!(
                "Missing host in address: {}",
                addr
            )));
        }

        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| ProbeErr::MalformedField(format!("Invalid port: {}", port)))?,
            None => JAVA_PORT,
        };

        Ok(Self::create_with_port(host, port))
    }

    /// Enable or disable the SRV lookup.
    pub fn with_srv(mut self, enable: bool) -> Self {
        self.enable_srv = enable;
        self
    }

    /// Apply the same deadline to connecting, reading and writing.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.socket_conf.connect_timeout = Some(timeout);
        self.socket_conf.read_time_out = Some(timeout);
        self.socket_conf.write_timeout = Some(timeout);
        self
    }

    pub fn with_socket_conf(mut self, socket_conf: SocketConf) -> Self {
        self.socket_conf = socket_conf;
        self
    }

    pub fn with_protocol_version(mut self, protocol_version: i32) -> Self {
        self.protocol_version = protocol_version;
        self
    }

    pub fn with_session_id(mut self, session_id: i32) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_client_guid(mut self, client_guid: i64) -> Self {
        self.client_guid = Some(client_guid);
        self
    }

    /// Get info from a modern Java Edition server.
    ///
    /// Using the [Server List Ping](https://wiki.vg/Server_List_Ping#Current_.281.7.2B.29) protocol.
    /// Suitable for Java Edition servers version 1.7 and above. Return type is [Server].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcprobe::{Conf, ProbeErr};
    ///
    /// fn main() -> Result<(), ProbeErr> {
    ///     let server = Conf::create("www.example.com");
    ///     let info = server.get_server_status()?;
    ///
    ///     println!("{}", info.motd.to_plain());
    ///     Ok(())
    /// }
    /// ```
    pub fn get_server_status(&self) -> Result<Server, ProbeErr> {
        server::get_server_status(self)
    }

    /// Get info from a legacy Java Edition server.
    ///
    /// Sends `0xFE 0x01`, which servers from beta 1.8 to 1.6 answer.
    /// Servers 1.4 and newer also report their version. Return type is [LegacyServer].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcprobe::{Conf, ProbeErr};
    ///
    /// fn main() -> Result<(), ProbeErr> {
    ///     let server = Conf::create("www.example.com");
    ///     let info = server.get_legacy_server_status()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn get_legacy_server_status(&self) -> Result<LegacyServer, ProbeErr> {
        server::get_legacy_server_status(self)
    }

    /// Get **basic** info from a modern Java Edition server using the [Query](https://wiki.vg/Query) protocol.
    ///
    /// To use this protocol, you need to enable the enable-query option on the server side.
    /// See [Server Config](https://wiki.vg/Query#Server_Config). Return type is [QueryBasic].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcprobe::{Conf, ProbeErr};
    ///
    /// fn main() -> Result<(), ProbeErr> {
    ///     let server = Conf::create_with_port("www.example.com", 25565);
    ///     let info = server.query()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn query(&self) -> Result<QueryBasic, ProbeErr> {
        query::query_basic_status(self)
    }

    /// Get **full** info from a modern Java Edition server using the [Query](https://wiki.vg/Query) protocol.
    ///
    /// To use this protocol, you need to enable the enable-query option on the server side.
    /// See [Server Config](https://wiki.vg/Query#Server_Config). Return type is [QueryFull].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcprobe::{Conf, ProbeErr};
    ///
    /// fn main() -> Result<(), ProbeErr> {
    ///     let server = Conf::create_with_port("www.example.com", 25565);
    ///     let info = server.query_full()?;
    ///
    ///     for player in &info.players {
    ///         println!("{}", player);
    ///     }
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn query_full(&self) -> Result<QueryFull, ProbeErr> {
        query::query_full_status(self)
    }

    /// Get info from a modern Bedrock Edition servers using the [RakNet](https://wiki.vg/Raknet_Protocol) protocol
    ///
    /// Suitable for Bedrock Edition servers version 1.16.220(protocol 431) and above.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcprobe::{Conf, ProbeErr};
    ///
    /// fn main() -> Result<(), ProbeErr> {
    ///     let server = Conf::create_with_port("www.example.com", 19132);
    ///     let info = server.get_bedrock_server_status()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn get_bedrock_server_status(&self) -> Result<BedrockServer, ProbeErr> {
        server::get_bedrock_server_status(self)
    }

    /// Send a vote to a [Votifier](https://github.com/NuVotifier/NuVotifier) v2 listener.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcprobe::{Conf, ProbeErr, Vote};
    ///
    /// fn main() -> Result<(), ProbeErr> {
    ///     let server = Conf::create_with_port("www.example.com", 8192);
    ///     let vote = Vote::new("my-list", "Notch", "shared-token");
    ///
    ///     server.send_vote(&vote)?;
    ///     Ok(())
    /// }
    /// ```
    pub fn send_vote(&self, vote: &Vote) -> Result<(), ProbeErr> {
        vote::send_vote(self, vote)
    }

    /// Open an [RCON](https://wiki.vg/RCON) connection. Call [Rcon::login] before running commands.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcprobe::{Conf, ProbeErr};
    ///
    /// fn main() -> Result<(), ProbeErr> {
    ///     let mut rcon = Conf::create_with_port("www.example.com", 25575).rcon()?;
    ///
    ///     rcon.login("password")?;
    ///     rcon.run("list")?;
    ///     println!("{}", rcon.recv()?.body);
    ///     Ok(())
    /// }
    /// ```
    pub fn rcon(&self) -> Result<Rcon, ProbeErr> {
        Rcon::dial(self)
    }
}

impl std::fmt::Display for Conf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Split `addr` into host and optional port text.
fn split_host_port(addr: &str) -> Result<(&str, Option<&str>), ProbeErr> {
    if let Some(rest) = addr.strip_prefix('[') {
        let Some((host, tail)) = rest.split_once(']') else {
            return Err(ProbeErr::MalformedField(format!(
                "Unclosed '[' in address: {}",
                addr
            )));
        };

        return match tail {
            "" => Ok((host, None)),
            _ => match tail.strip_prefix(':') {
                Some(port) => Ok((host, Some(port))),
                None => Err(ProbeErr::MalformedField(format!(
                    "Unexpected characters after ']' in address: {}",
                    addr
                ))),
            },
        };
    }

    match addr.matches(':').count() {
        1 => match addr.split_once(':') {
            Some((host, port)) => Ok((host.trim(), Some(port.trim()))),
            None => Ok((addr, None)),
        },
        // No port, or a bare IPv6 literal.
        _ => Ok((addr, None)),
    }
}
