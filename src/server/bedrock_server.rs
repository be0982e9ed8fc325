use serde::Serialize;
use tracing::debug;

use crate::{
    motd::Motd,
    packet::{PacketReader, PacketWriter},
    share::{
        create_udp_socket, get_server_current_time, recv_before, resolve_target, Deadline,
    },
    srv::SrvRecord,
    Conf, ProbeErr,
};

/// Offline message ID shared by every RakNet unconnected packet.
pub const MAGIC_BYTES: [u8; 16] = [
    0x00, 0xFF, 0xFF, 0x00, 0xFE, 0xFE, 0xFE, 0xFE, 0xFD, 0xFD, 0xFD, 0xFD, 0x12, 0x34, 0x56, 0x78,
];

const UNCONNECTED_PING: u8 = 0x01;
const UNCONNECTED_PONG: u8 = 0x1C;

/// Bedrock server info type.
///
/// Servers commonly omit trailing fields of the ID string, so everything
/// after the edition is optional.
///
/// For the meaning of `motd_line_1` and `motd_line_2` refer to the following examples and images:
///
/// ```text
/// motd_line_1 = "Dedicated Server"
/// motd_line_2 = "Bedrock level"
/// ```
/// Result:
///
/// <img src="https://wiki.vg/images/b/bb/Server_ID_String_Example.png" alt="Server ID String Example.png" />
#[derive(Serialize, Debug, Clone)]
pub struct BedrockServer {
    pub server_guid: i64,
    /// MCPE or MCEE(Education Edition) for Education Edition
    pub edition: String,
    /// Both MOTD lines joined with a newline.
    pub motd: Motd,
    /// MOTD line 1 for upstream display.
    pub motd_line_1: Option<String>,
    /// MOTD line 2 for downstream display.
    pub motd_line_2: Option<String>,
    pub protocol_version: Option<i32>,
    pub version_name: Option<String>,
    pub online_players: Option<i32>,
    pub max_players: Option<i32>,
    /// Server unique id.
    pub server_id: Option<String>,
    pub game_mode: Option<String>,
    pub game_mode_id: Option<u8>,
    /// Ports required to connect to the server using IPv4.
    pub port_ipv4: Option<u16>,
    /// Ports required to connect to the server using IPv6.
    pub port_ipv6: Option<u16>,
    pub srv_result: Option<SrvRecord>,
}

impl std::fmt::Display for BedrockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

pub fn get_bedrock_server_status(conf: &Conf) -> Result<BedrockServer, ProbeErr> {
    let target = resolve_target(conf);
    let socket = create_udp_socket(&target.host, target.port, &conf.socket_conf)?;
    let client_guid = conf.client_guid.unwrap_or_else(rand::random::<i64>);
    let deadline = Deadline::after(conf.socket_conf.read_time_out);

    socket.send(&build_ping_packet(get_server_current_time()?, client_guid))?;

    let mut bufs = [0u8; 4096];
    let len = recv_before(&socket, &mut bufs, &deadline)?;

    debug!("unconnected pong of {} bytes from {}", len, socket.peer_addr()?);

    let mut server = parse_pong_packet(&bufs[..len])?;

    server.srv_result = target.srv;
    Ok(server)
}

/// Build [unconnected ping](https://wiki.vg/Raknet_Protocol#Unconnected_Ping) packet.
fn build_ping_packet(time: u64, client_guid: i64) -> Vec<u8> {
    let mut packet = PacketWriter::new();

    packet
        .write_u8(UNCONNECTED_PING)
        .write_u64_be(time)
        .write_bytes(&MAGIC_BYTES)
        .write_i64_be(client_guid);

    packet.into_inner()
}

/// Parse an [unconnected pong](https://wiki.vg/Raknet_Protocol#Unconnected_Pong) datagram.
pub fn parse_pong_packet(datagram: &[u8]) -> Result<BedrockServer, ProbeErr> {
    let mut reader = PacketReader::from_slice(datagram);
    let packet_id = reader.read_u8()?;

    if packet_id != UNCONNECTED_PONG {
        return Err(ProbeErr::UnexpectedResponse(format!(
            "Packet response excepted start with: 0x1C, but got: 0x{:02X}",
            packet_id
        )));
    }

    // Echoed time.
    reader.skip(8)?;

    let server_guid = reader.read_i64_be()?;

    reader.skip(MAGIC_BYTES.len())?;

    let len = reader.read_u16_be()? as usize;
    let server_info = String::from_utf8_lossy(&reader.read_bytes(len)?).into_owned();

    parse_server_id(server_guid, &server_info)
}

/// Split the `;`-separated server ID string.
///
/// Missing or empty fields become `None`; a present numeric field that does
/// not parse is a [ProbeErr::MalformedField].
pub fn parse_server_id(server_guid: i64, server_info: &str) -> Result<BedrockServer, ProbeErr> {
    let fields = server_info.split(';').collect::<Vec<_>>();
    let text = |idx: usize| {
        fields
            .get(idx)
            .filter(|field| !field.is_empty())
            .map(|field| field.to_string())
    };

    let motd_line_1 = text(1);
    let motd_line_2 = text(7);
    let motd = match (&motd_line_1, &motd_line_2) {
        (Some(line_1), Some(line_2)) => Motd::parse(&format!("{}\n{}", line_1, line_2)),
        (Some(line), None) | (None, Some(line)) => Motd::parse(line),
        (None, None) => Motd::default(),
    };

    Ok(BedrockServer {
        server_guid,
        edition: fields[0].to_string(),
        motd,
        motd_line_1,
        motd_line_2,
        protocol_version: parse_field(&fields, 2, "protocol version")?,
        version_name: text(3),
        online_players: parse_field(&fields, 4, "online players")?,
        max_players: parse_field(&fields, 5, "max players")?,
        server_id: text(6),
        game_mode: text(8),
        game_mode_id: parse_field(&fields, 9, "game mode id")?,
        port_ipv4: parse_field(&fields, 10, "IPv4 port")?,
        port_ipv6: parse_field(&fields, 11, "IPv6 port")?,
        srv_result: None,
    })
}

fn parse_field<T: std::str::FromStr>(
    fields: &[&str],
    idx: usize,
    name: &str,
) -> Result<Option<T>, ProbeErr>
where
    T::Err: std::fmt::Display,
{
    match fields.get(idx).map(|field| field.trim()) {
        None | Some("") => Ok(None),
        Some(field) => field.parse::<T>().map(Some).map_err(|err| {
            ProbeErr::MalformedField(format!("{} {:?} is invalid: {}", name, field, err))
        }),
    }
}
