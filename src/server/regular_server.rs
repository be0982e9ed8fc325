use crate::{
    motd::{Description, Motd},
    packet::{read_frame, PacketWriter},
    share::{create_tcp_socket, resolve_target, DeadlineStream},
    srv::SrvRecord,
    Conf, Favicon, ProbeErr,
};
use serde::{Deserialize, Serialize, Serializer};
use std::{
    io::{Read, Write},
    time::{Duration, Instant},
};
use tracing::{debug, trace};

/// Regular Server info type.
#[derive(Serialize, Debug, Clone)]
pub struct Server {
    /// Server version. Includes version name and protocol number.
    pub version: Version,
    /// Server Player info.
    pub players: Players,
    /// Server description, decoded into styled runs.
    pub motd: Motd,
    /// Server icon, base64 PNG data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<Favicon>,
    /// FML mod list sent by Forge servers before 1.13.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_info: Option<ModInfo>,
    /// Forge server unique information, including mod and channel info.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forge_data: Option<ForgeData>,
    /// Whether the server enforces secure chat.
    pub enforces_secure_chat: bool,
    /// Whether the server previews chat messages.
    pub previews_chat: bool,
    /// The SRV record the host was redirected by, if any.
    pub srv_result: Option<SrvRecord>,
    /// Round trip of the ping/pong exchange, serialized in milliseconds.
    #[serde(serialize_with = "serialize_millis")]
    pub latency: Duration,
}

impl std::fmt::Display for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Version {
    pub name: String,
    pub protocol: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Players {
    pub max: i32,
    pub online: i32,
    pub sample: Vec<Player>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Player {
    pub name: String,
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ModInfo {
    #[serde(rename = "type")]
    pub mod_type: String,
    #[serde(rename = "modList")]
    pub mod_list: Vec<ModEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ModEntry {
    #[serde(rename = "modid")]
    pub mod_id: String,
    pub version: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ForgeData {
    pub mods: Vec<ForgeMod>,
    pub channels: Vec<ForgeChannel>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ForgeMod {
    #[serde(rename = "modId")]
    pub mod_id: String,
    pub modmarker: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ForgeChannel {
    pub res: String,
    pub version: String,
    pub required: bool,
}

/// The status JSON as sent by the server.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawStatus {
    version: Version,
    players: Players,
    description: Description,
    favicon: Option<Favicon>,
    modinfo: Option<ModInfo>,
    #[serde(rename = "forgeData")]
    forge_data: Option<ForgeData>,
    #[serde(rename = "enforcesSecureChat")]
    enforces_secure_chat: bool,
    #[serde(rename = "previewsChat")]
    previews_chat: bool,
}

impl Server {
    fn from_raw(raw: RawStatus, latency: Duration) -> Self {
        Self {
            version: raw.version,
            players: raw.players,
            motd: Motd::from_description(&raw.description),
            favicon: raw.favicon.filter(|favicon| !favicon.raw().is_empty()),
            mod_info: raw.modinfo,
            forge_data: raw.forge_data,
            enforces_secure_chat: raw.enforces_secure_chat,
            previews_chat: raw.previews_chat,
            srv_result: None,
            latency,
        }
    }
}

/// Get info from a modern Java Edition server, following its SRV record
/// when [Conf::enable_srv] is set.
pub fn get_server_status(conf: &Conf) -> Result<Server, ProbeErr> {
    let target = resolve_target(conf);
    let socket = create_tcp_socket(&target.host, target.port, &conf.socket_conf)?;
    let mut stream = DeadlineStream::new(&socket, &conf.socket_conf);

    let mut server =
        get_server_status_from_stream(&mut stream, &target.host, target.port, conf.protocol_version)?;

    server.srv_result = target.srv;
    Ok(server)
}

/// Run the status exchange over an already connected stream.
///
/// `host` and `port` are only echoed in the handshake.
pub fn get_server_status_from_stream<S: Read + Write>(
    stream: &mut S,
    host: &str,
    port: u16,
    protocol_version: i32,
) -> Result<Server, ProbeErr> {
    stream.write_all(&build_handshake_packet(host, port, protocol_version))?;
    stream.write_all(&build_status_request_packet())?;
    stream.flush()?;

    let raw = read_status_response(stream)?;
    let latency = get_server_ping(stream)?;

    debug!("{}:{} answered status in {:?}", host, port, latency);

    Ok(Server::from_raw(raw, latency))
}

/// Build handshake packet buffer.
fn build_handshake_packet(host: &str, port: u16, protocol_version: i32) -> Vec<u8> {
    let mut packet = PacketWriter::with_packet_id(0x00);

    // See protocol version [numbers](https://wiki.vg/Protocol_version_numbers).
    packet
        .write_varint(protocol_version)
        // UTF-8 string prefixed with its size in bytes as a VarInt.
        .write_string(host)
        .write_u16_be(port)
        // Next state, should be 1 for status, but could also be 2 for login.
        .write_varint(1);

    packet.into_frame()
}

/// Build status request packet buffer.
fn build_status_request_packet() -> Vec<u8> {
    PacketWriter::with_packet_id(0x00).into_frame()
}

/// Read the [response](https://wiki.vg/Server_List_Ping#Status_Response) frame.
fn read_status_response<R: Read>(stream: &mut R) -> Result<RawStatus, ProbeErr> {
    let mut frame = read_frame(stream)?;
    let packet_id = frame.read_varint()?;

    if packet_id != 0x00 {
        return Err(ProbeErr::UnexpectedResponse(format!(
            "status response packet ID should be 0x00, but got: 0x{:02X}",
            packet_id
        )));
    }

    let json = frame.read_string()?;

    debug!("status response carries {} bytes of JSON", json.len());
    trace!("{}", json);

    Ok(serde_json::from_str::<RawStatus>(&json)?)
}

/// [Ping](https://wiki.vg/Server_List_Ping#Ping_Request) the server with a
/// random payload and time the matching pong.
fn get_server_ping<S: Read + Write>(stream: &mut S) -> Result<Duration, ProbeErr> {
    let payload = rand::random::<i64>();
    let mut packet = PacketWriter::with_packet_id(0x01);

    packet.write_i64_be(payload);

    let sent_at = Instant::now();

    stream.write_all(&packet.into_frame())?;
    stream.flush()?;

    let mut frame = read_frame(stream)?;
    let latency = sent_at.elapsed();
    let packet_id = frame.read_varint()?;

    if packet_id != 0x01 {
        return Err(ProbeErr::UnexpectedResponse(format!(
            "pong packet ID should be 0x01, but got: 0x{:02X}",
            packet_id
        )));
    }

    // Server should response the same payload as sent by the client.
    let received = frame.read_i64_be()?;

    if received != payload {
        return Err(ProbeErr::UnexpectedResponse(format!(
            "pong payload does not match (send: {}, receive: {})",
            payload, received
        )));
    }

    Ok(latency)
}

fn serialize_millis<S: Serializer>(latency: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(latency.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{motd::Color, packet::PacketReader};
    use std::io::Cursor;

    /// Replays canned server bytes and records what the client wrote.
    struct Scripted {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn status_frame(json: &str) -> Vec<u8> {
        let mut packet = PacketWriter::with_packet_id(0x00);
        packet.write_string(json);
        packet.into_frame()
    }

    #[test]
    fn handshake_layout() {
        let frame = build_handshake_packet("localhost", 25565, 47);

        assert_eq!(
            frame,
            [
                &[0x0F, 0x00, 0x2F, 0x09][..],
                b"localhost",
                &[0x63, 0xDD, 0x01]
            ]
            .concat()
        );
        assert_eq!(build_status_request_packet(), [0x01, 0x00]);
    }

    #[test]
    fn decodes_status_json() {
        let json = r#"{
            "version": {"name": "1.20.4", "protocol": 765},
            "players": {"max": 20, "online": 2, "sample": [{"name": "Notch", "id": "069a79f4-44e9-4726-a5be-fca90e38aaf5"}]},
            "description": {"text": "Hello ", "color": "gold", "extra": [{"text": "world", "bold": true}]},
            "favicon": "data:image/png;base64,AAAA",
            "enforcesSecureChat": true,
            "modinfo": {"type": "FML", "modList": [{"modid": "forge", "version": "14.23.5.2859"}]},
            "someUnknownField": 1
        }"#;

        let raw = read_status_response(&mut Cursor::new(status_frame(json))).unwrap();
        let server = Server::from_raw(raw, Duration::from_millis(3));

        assert_eq!(server.version.protocol, 765);
        assert_eq!(server.players.sample[0].name, "Notch");
        assert_eq!(server.motd.to_plain(), "Hello world");
        assert_eq!(server.motd.runs()[0].color, Color::Gold);
        assert!(server.motd.runs()[1].bold);
        assert!(server.enforces_secure_chat);
        assert!(!server.previews_chat);
        assert_eq!(server.mod_info.unwrap().mod_list[0].mod_id, "forge");
        assert!(server.favicon.is_some());
    }

    #[test]
    fn rejects_wrong_packet_id() {
        let mut packet = PacketWriter::with_packet_id(0x05);
        packet.write_string("{}");

        let result = read_status_response(&mut Cursor::new(packet.into_frame()));

        assert!(matches!(result, Err(ProbeErr::UnexpectedResponse(_))));
    }

    #[test]
    fn truncated_status_frame() {
        let mut frame = status_frame(r#"{"players":{}}"#);
        frame.truncate(frame.len() - 3);

        let result = read_status_response(&mut Cursor::new(frame));

        assert!(matches!(result, Err(ProbeErr::TruncatedInput)));
    }

    #[test]
    fn pong_must_echo_payload() {
        let mut pong = PacketWriter::with_packet_id(0x01);
        // The client payload is random, so a fixed echo never matches
        // except with negligible probability.
        pong.write_i64_be(0x0123_4567_89AB_CDEF);

        let mut stream = Scripted {
            input: Cursor::new([status_frame("{}"), pong.into_frame()].concat()),
            output: Vec::new(),
        };

        let result = get_server_status_from_stream(&mut stream, "localhost", 25565, 47);

        assert!(matches!(result, Err(ProbeErr::UnexpectedResponse(_))));

        // handshake, request and ping frames were all written
        let mut written = PacketReader::from_slice(&stream.output);
        let handshake_len = written.read_varint().unwrap() as usize;
        written.skip(handshake_len).unwrap();
        assert_eq!(written.read_bytes(2).unwrap(), [0x01, 0x00]);
        assert_eq!(written.read_bytes(2).unwrap(), [0x09, 0x01]);
    }
}
