use crate::{
    motd::Motd,
    packet::{decode_utf16_be, PacketReader},
    share::{create_tcp_socket, resolve_target, DeadlineStream},
    srv::SrvRecord,
    Conf, ProbeErr,
};
use serde::Serialize;
use std::io::{Read, Write};
use tracing::debug;

/// Legacy server info type.
///
/// `version` is only reported by servers 1.4 and newer.
#[derive(Serialize, Debug, Clone)]
pub struct LegacyServer {
    pub version: Option<LegacyVersion>,
    pub players: LegacyPlayers,
    pub motd: Motd,
    pub srv_result: Option<SrvRecord>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LegacyVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyPlayers {
    pub online: i32,
    pub max: i32,
}

impl std::fmt::Display for LegacyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

/// Server [before 1.6](https://wiki.vg/Server_List_Ping#1.4_to_1.5)
pub fn get_legacy_server_status(conf: &Conf) -> Result<LegacyServer, ProbeErr> {
    let target = resolve_target(conf);
    let socket = create_tcp_socket(&target.host, target.port, &conf.socket_conf)?;
    let mut stream = DeadlineStream::new(&socket, &conf.socket_conf);

    stream.write_all(&[0xFE, 0x01])?;
    stream.flush()?;

    let mut server = read_legacy_response(&mut stream)?;

    server.srv_result = target.srv;
    Ok(server)
}

/// Read the kick packet: `0xFF`, a u16 BE character count, then that many
/// UTF-16BE code units.
pub fn read_legacy_response<R: Read>(reader: R) -> Result<LegacyServer, ProbeErr> {
    let mut reader = PacketReader::new(reader);
    let packet_id = reader.read_u8()?;

    if packet_id != 0xFF {
        return Err(ProbeErr::UnexpectedResponse(format!(
            "Server response data is invalid, it should start with: 0xFF, but got: 0x{:02X}",
            packet_id
        )));
    }

    let length = reader.read_u16_be()? as usize;
    let response = decode_utf16_be(&reader.read_bytes(length * 2)?)?;

    debug!("legacy kick message has {} characters", length);

    parse_legacy_message(&response)
}

/// Split the decoded kick message into its fields.
///
/// Servers 1.4 and newer start with `§1` and separate fields with NUL:
/// `§1 \0 protocol \0 version \0 motd \0 online \0 max`. Older servers send
/// `motd § online § max`.
pub fn parse_legacy_message(response: &str) -> Result<LegacyServer, ProbeErr> {
    if response.starts_with("\u{00A7}1") {
        let fields = response.split('\0').collect::<Vec<_>>();

        if fields.len() != 6 {
            return Err(ProbeErr::MalformedField(format!(
                "Server response info len is invalid, it must be 6, but got {}",
                fields.len()
            )));
        }

        return Ok(LegacyServer {
            version: Some(LegacyVersion {
                name: fields[2].into(),
                protocol: parse_number("protocol version", fields[1])?,
            }),
            players: LegacyPlayers {
                online: parse_number("online players", fields[4])?,
                max: parse_number("max players", fields[5])?,
            },
            motd: Motd::parse(fields[3]),
            srv_result: None,
        });
    }

    // Split from the right so that a MOTD carrying `§` codes stays intact.
    let mut fields = response.rsplitn(3, '\u{00A7}');
    let (Some(max), Some(online), Some(motd)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(ProbeErr::MalformedField(format!(
            "Expected 3 '§'-separated fields in legacy response: {:?}",
            response
        )));
    };

    Ok(LegacyServer {
        version: None,
        players: LegacyPlayers {
            online: parse_number("online players", online)?,
            max: parse_number("max players", max)?,
        },
        motd: Motd::parse(motd),
        srv_result: None,
    })
}

fn parse_number(field: &str, value: &str) -> Result<i32, ProbeErr> {
    value.trim().parse::<i32>().map_err(|err| {
        ProbeErr::MalformedField(format!("{} {:?} is not a number: {}", field, value, err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motd::Color;

    fn kick_packet(message: &str) -> Vec<u8> {
        let units = message.encode_utf16().collect::<Vec<_>>();
        let mut packet = vec![0xFF];

        packet.extend_from_slice(&(units.len() as u16).to_be_bytes());
        for unit in units {
            packet.extend_from_slice(&unit.to_be_bytes());
        }

        packet
    }

    #[test]
    fn modern_legacy_server() {
        let packet = kick_packet("§1\u{0}127\u{0}1.5.2\u{0}§aA Minecraft Server\u{0}3\u{0}20");
        let server = read_legacy_response(packet.as_slice()).unwrap();

        assert_eq!(
            server.version,
            Some(LegacyVersion {
                name: "1.5.2".into(),
                protocol: 127
            })
        );
        assert_eq!(server.players, LegacyPlayers { online: 3, max: 20 });
        assert_eq!(server.motd.to_plain(), "A Minecraft Server");
        assert_eq!(server.motd.runs()[0].color, Color::Green);
    }

    #[test]
    fn beta_server_keeps_formatted_motd() {
        let server = read_legacy_response(kick_packet("§cRed MOTD§5§12").as_slice()).unwrap();

        assert!(server.version.is_none());
        assert_eq!(server.players, LegacyPlayers { online: 5, max: 12 });
        assert_eq!(server.motd.to_plain(), "Red MOTD");
    }

    #[test]
    fn malformed_fields() {
        assert!(matches!(
            parse_legacy_message("only motd"),
            Err(ProbeErr::MalformedField(_))
        ));
        assert!(matches!(
            parse_legacy_message("motd§x§20"),
            Err(ProbeErr::MalformedField(_))
        ));
        assert!(matches!(
            parse_legacy_message("§1\u{0}47\u{0}1.4"),
            Err(ProbeErr::MalformedField(_))
        ));
        assert!(matches!(
            parse_legacy_message("§1\u{0}47\u{0}1.4.2\u{0}motd\u{0}1\u{0}20\u{0}extra"),
            Err(ProbeErr::MalformedField(_))
        ));
    }

    #[test]
    fn wrong_packet_id_and_truncation() {
        let mut packet = kick_packet("motd§1§2");

        packet[0] = 0xFE;
        assert!(matches!(
            read_legacy_response(packet.as_slice()),
            Err(ProbeErr::UnexpectedResponse(_))
        ));

        let mut packet = kick_packet("motd§1§2");

        packet.truncate(packet.len() - 1);
        assert!(matches!(
            read_legacy_response(packet.as_slice()),
            Err(ProbeErr::TruncatedInput)
        ));
    }
}
