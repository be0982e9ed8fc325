use crate::{
    motd::Motd,
    packet::{PacketReader, PacketWriter},
    share::{create_udp_socket, recv_before, Deadline},
    Conf, ProbeErr,
};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicI32, Ordering},
};
use tracing::debug;

/// Only the low 4 bits of each session ID byte are used by the server.
pub const SESSION_ID_MASK: i32 = 0x0F0F0F0F;

const MAGIC: [u8; 2] = [0xFE, 0xFD];
const TYPE_HANDSHAKE: u8 = 0x09;
const TYPE_STAT: u8 = 0x00;
const FULL_STAT_PADDING: [u8; 4] = [0x00; 4];
const MAX_DATAGRAM: usize = 65_535;

static SESSION_COUNTER: AtomicI32 = AtomicI32::new(0);

/// Next value of the process-wide session counter, used when
/// [Conf::session_id] is unset.
pub fn next_session_id() -> i32 {
    SESSION_COUNTER.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}

#[derive(Serialize, Debug, Clone)]
pub struct QueryBasic {
    pub motd: Motd,
    pub game_type: String,
    pub map: String,
    pub num_players: u32,
    pub max_players: u32,
    pub host_port: u16,
    pub host_ip: String,
}

impl std::fmt::Display for QueryBasic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

/// Full stat: every key/value pair the server reports plus the names of
/// online players.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFull {
    pub data: HashMap<String, String>,
    pub players: Vec<String>,
}

impl std::fmt::Display for QueryFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

impl QueryFull {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn hostname(&self) -> Option<&str> {
        self.get("hostname")
    }

    /// The `hostname` value decoded as a MOTD.
    pub fn motd(&self) -> Option<Motd> {
        self.hostname().map(Motd::parse)
    }

    pub fn game_type(&self) -> Option<&str> {
        self.get("gametype")
    }

    pub fn game_id(&self) -> Option<&str> {
        self.get("game_id")
    }

    pub fn version(&self) -> Option<&str> {
        self.get("version")
    }

    pub fn map(&self) -> Option<&str> {
        self.get("map")
    }

    pub fn num_players(&self) -> Option<u32> {
        self.get("numplayers")?.trim().parse().ok()
    }

    pub fn max_players(&self) -> Option<u32> {
        self.get("maxplayers")?.trim().parse().ok()
    }

    pub fn host_port(&self) -> Option<u16> {
        self.get("hostport")?.trim().parse().ok()
    }

    pub fn host_ip(&self) -> Option<&str> {
        self.get("hostip")
    }

    /// Server software and plugins, from a `plugins` value shaped like
    /// `SERVER_MOD_NAME[: PLUGIN_NAME(; PLUGIN_NAME...)]`.
    pub fn plugins(&self) -> Vec<ModPlugin> {
        self.get("plugins").map(resolve_plugin).unwrap_or_default()
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModPlugin {
    pub mod_name: String,
    pub plugins: Vec<String>,
}

impl std::fmt::Display for ModPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

fn resolve_plugin(plugin_str: &str) -> Vec<ModPlugin> {
    let plugin_str = plugin_str.trim();

    if plugin_str.is_empty() {
        return vec![];
    }

    let (mod_name, plugins) = match plugin_str.split_once(':') {
        Some((mod_name, plugins)) => (
            mod_name.trim(),
            plugins
                .split(';')
                .map(str::trim)
                .filter(|plugin| !plugin.is_empty())
                .map(String::from)
                .collect(),
        ),
        None => (plugin_str, vec![]),
    };

    vec![ModPlugin {
        mod_name: mod_name.into(),
        plugins,
    }]
}

/// Get basic [status](https://wiki.vg/Query#Basic_stat)
pub fn query_basic_status(conf: &Conf) -> Result<QueryBasic, ProbeErr> {
    let (session_id, datagram) = send_query_request(conf, false)?;

    parse_basic_response(&datagram, session_id)
}

/// Get full [status](https://wiki.vg/Query#Full_stat)
pub fn query_full_status(conf: &Conf) -> Result<QueryFull, ProbeErr> {
    let (session_id, datagram) = send_query_request(conf, true)?;

    parse_full_response(&datagram, session_id)
}

/// Run the handshake and send the stat request, returning the masked
/// session ID and the raw stat datagram.
fn send_query_request(conf: &Conf, full_query: bool) -> Result<(i32, Vec<u8>), ProbeErr> {
    let session_id = conf.session_id.unwrap_or_else(next_session_id) & SESSION_ID_MASK;
    let socket = create_udp_socket(&conf.host, conf.port, &conf.socket_conf)?;
    let deadline = Deadline::after(conf.socket_conf.read_time_out);

    socket.send(&build_handshake_packet(session_id))?;

    let mut bufs = vec![0u8; MAX_DATAGRAM];
    let len = recv_before(&socket, &mut bufs, &deadline)?;
    let token = parse_handshake_response(&bufs[..len], session_id)?;

    debug!("query session {} got challenge token {}", session_id, token);

    socket.send(&build_stat_packet(session_id, token, full_query))?;

    let len = recv_before(&socket, &mut bufs, &deadline)?;
    bufs.truncate(len);

    Ok((session_id, bufs))
}

/// Construct [handshake](https://wiki.vg/Query#Handshake) packet.
fn build_handshake_packet(session_id: i32) -> Vec<u8> {
    let mut packet = PacketWriter::new();

    packet
        .write_bytes(&MAGIC)
        .write_u8(TYPE_HANDSHAKE)
        .write_i32_be(session_id);

    packet.into_inner()
}

/// Construct stat [request](https://wiki.vg/Query#Request_2).
///
/// Full query payload must be padded to 8 bytes; trailing zeros work.
fn build_stat_packet(session_id: i32, token: i32, full_query: bool) -> Vec<u8> {
    let mut packet = PacketWriter::new();

    packet
        .write_bytes(&MAGIC)
        .write_u8(TYPE_STAT)
        .write_i32_be(session_id)
        .write_i32_be(token);

    if full_query {
        packet.write_bytes(&FULL_STAT_PADDING);
    }

    packet.into_inner()
}

/// Check the type byte and echoed session ID common to every response.
fn read_response_header(
    reader: &mut PacketReader<&[u8]>,
    expected_type: u8,
    session_id: i32,
) -> Result<(), ProbeErr> {
    let packet_type = reader.read_u8()?;

    if packet_type != expected_type {
        return Err(ProbeErr::UnexpectedResponse(format!(
            "Query response type should be 0x{:02X}, but got: 0x{:02X}",
            expected_type, packet_type
        )));
    }

    let received = reader.read_i32_be()?;

    if received != session_id {
        return Err(ProbeErr::UnexpectedResponse(format!(
            "Query session ID mismatch, expected: {}, but got: {}",
            session_id, received
        )));
    }

    Ok(())
}

/// Process handshake [response](https://wiki.vg/Query#Response) and get
/// the challenge token.
pub fn parse_handshake_response(datagram: &[u8], session_id: i32) -> Result<i32, ProbeErr> {
    let mut reader = PacketReader::from_slice(datagram);

    read_response_header(&mut reader, TYPE_HANDSHAKE, session_id)?;

    let token = reader.read_nt_str()?;

    // Tokens above i32::MAX are sent as their unsigned value.
    token
        .trim()
        .parse::<i64>()
        .map(|token| token as i32)
        .map_err(|err| ProbeErr::MalformedField(format!("challenge token {:?}: {}", token, err)))
}

pub fn parse_basic_response(datagram: &[u8], session_id: i32) -> Result<QueryBasic, ProbeErr> {
    let mut reader = PacketReader::from_slice(datagram);

    read_response_header(&mut reader, TYPE_STAT, session_id)?;

    Ok(QueryBasic {
        motd: Motd::parse(&reader.read_nt_str()?),
        game_type: reader.read_nt_str()?,
        map: reader.read_nt_str()?,
        num_players: parse_count("numplayers", &reader.read_nt_str()?)?,
        max_players: parse_count("maxplayers", &reader.read_nt_str()?)?,
        // The only little-endian field in the protocol.
        host_port: reader.read_u16_le()?,
        host_ip: reader.read_nt_str()?,
    })
}

pub fn parse_full_response(datagram: &[u8], session_id: i32) -> Result<QueryFull, ProbeErr> {
    let mut reader = PacketReader::from_slice(datagram);
    let mut response = QueryFull::default();

    read_response_header(&mut reader, TYPE_STAT, session_id)?;

    // Drop meaningless byte padding: "splitnum\0\x80\0"
    reader.skip(11)?;

    loop {
        let key = reader.read_nt_str()?;

        if key.is_empty() {
            break;
        }

        let value = reader.read_nt_str()?;

        response.data.insert(key, value);
    }

    // "\x01player_\0\0"
    reader.skip(10)?;

    loop {
        let player = reader.read_nt_str()?;

        if player.is_empty() {
            break;
        }

        response.players.push(player);
    }

    Ok(response)
}

fn parse_count(field: &str, value: &str) -> Result<u32, ProbeErr> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|err| ProbeErr::MalformedField(format!("{} {:?}: {}", field, value, err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat_header(session_id: i32) -> Vec<u8> {
        let mut packet = vec![TYPE_STAT];
        packet.extend_from_slice(&session_id.to_be_bytes());
        packet
    }

    fn full_response(session_id: i32, body: &[u8]) -> Vec<u8> {
        let mut packet = stat_header(session_id);

        packet.extend_from_slice(b"splitnum\x00\x80\x00");
        packet.extend_from_slice(body);
        packet
    }

    #[test]
    fn request_layout() {
        assert_eq!(
            build_handshake_packet(0x01020304),
            [0xFE, 0xFD, 0x09, 0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(
            build_stat_packet(1, 9513307, false),
            [0xFE, 0xFD, 0x00, 0, 0, 0, 1, 0x00, 0x91, 0x29, 0x5B]
        );
        assert_eq!(build_stat_packet(1, 9513307, true).len(), 15);
    }

    #[test]
    fn handshake_token() {
        let response = b"\x09\x00\x00\x00\x01\x39\x35\x31\x33\x33\x30\x37\x00";

        assert_eq!(parse_handshake_response(response, 1).unwrap(), 9513307);
        assert!(matches!(
            parse_handshake_response(response, 2),
            Err(ProbeErr::UnexpectedResponse(_))
        ));
        assert!(matches!(
            parse_handshake_response(b"\x09\x00\x00\x00\x01-x\x00", 1),
            Err(ProbeErr::MalformedField(_))
        ));
    }

    #[test]
    fn basic_stat() {
        let mut packet = stat_header(1);
        packet.extend_from_slice(b"A \xA7aMinecraft Server\x00SMP\x00world\x002\x0020\x00");
        packet.extend_from_slice(&25565u16.to_le_bytes());
        packet.extend_from_slice(b"127.0.0.1\x00");

        let basic = parse_basic_response(&packet, 1).unwrap();

        assert_eq!(basic.motd.to_plain(), "A Minecraft Server");
        assert_eq!(basic.game_type, "SMP");
        assert_eq!(basic.map, "world");
        assert_eq!(basic.num_players, 2);
        assert_eq!(basic.max_players, 20);
        assert_eq!(basic.host_port, 25565);
        assert_eq!(basic.host_ip, "127.0.0.1");
    }

    #[test]
    fn full_stat_single_pair() {
        let packet = full_response(3, b"motd\x00bar\x00\x00\x01player_\x00\x00\x00");
        let full = parse_full_response(&packet, 3).unwrap();

        assert_eq!(full.data, HashMap::from([("motd".into(), "bar".into())]));
        assert!(full.players.is_empty());
    }

    #[test]
    fn full_stat_accessors_and_players() {
        let packet = full_response(
            3,
            b"hostname\x00A Server\x00gametype\x00SMP\x00game_id\x00MINECRAFT\x00\
              version\x001.20.4\x00plugins\x00Paper on 1.20.4: WorldEdit 7.2; Essentials\x00\
              map\x00world\x00numplayers\x002\x00maxplayers\x0020\x00hostport\x0025565\x00\
              hostip\x00127.0.0.1\x00map\x00nether\x00\x00\
              \x01player_\x00\x00Notch\x00jeb_\x00\x00",
        );
        let full = parse_full_response(&packet, 3).unwrap();

        assert_eq!(full.hostname(), Some("A Server"));
        assert_eq!(full.game_type(), Some("SMP"));
        assert_eq!(full.version(), Some("1.20.4"));
        // duplicate keys overwrite
        assert_eq!(full.map(), Some("nether"));
        assert_eq!(full.num_players(), Some(2));
        assert_eq!(full.max_players(), Some(20));
        assert_eq!(full.host_port(), Some(25565));
        assert_eq!(full.host_ip(), Some("127.0.0.1"));
        assert_eq!(full.players, ["Notch", "jeb_"]);
        assert_eq!(
            full.plugins(),
            vec![ModPlugin {
                mod_name: "Paper on 1.20.4".into(),
                plugins: vec!["WorldEdit 7.2".into(), "Essentials".into()],
            }]
        );
    }

    #[test]
    fn vanilla_has_no_plugins() {
        let full = QueryFull {
            data: HashMap::from([("plugins".into(), "".into())]),
            players: vec![],
        };

        assert!(full.plugins().is_empty());
        assert!(QueryFull::default().plugins().is_empty());
    }

    #[test]
    fn truncated_and_wrong_type() {
        let packet = full_response(3, b"motd\x00bar");
        assert!(matches!(
            parse_full_response(&packet, 3),
            Err(ProbeErr::TruncatedInput)
        ));

        let mut packet = full_response(3, b"\x00");
        packet[0] = 0x09;
        assert!(matches!(
            parse_full_response(&packet, 3),
            Err(ProbeErr::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn session_counter_increments() {
        let first = next_session_id();
        let second = next_session_id();

        assert!(second > first || first == i32::MAX);
    }
}
