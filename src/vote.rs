use crate::{
    packet::{PacketReader, PacketWriter},
    share::{create_tcp_socket, DeadlineStream},
    Conf, ProbeErr,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{
    io::{Read, Write},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Frame magic of a Votifier v2 message.
const VOTIFIER_MAGIC: u16 = 0x733A;

/// A vote to deliver to a Votifier listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// Name of the server list casting the vote.
    pub service_name: String,
    pub username: String,
    /// Token shared with the server; keys the HMAC signature.
    pub token: String,
    pub uuid: Option<String>,
    /// Defaults to the time the vote is sent.
    pub timestamp: Option<SystemTime>,
}

impl Vote {
    pub fn new(service_name: &str, username: &str, token: &str) -> Self {
        Self {
            service_name: service_name.into(),
            username: username.into(),
            token: token.into(),
            uuid: None,
            timestamp: None,
        }
    }

    pub fn with_uuid(mut self, uuid: &str) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Signed content. Field order is part of the signed bytes.
#[derive(Serialize, Debug)]
struct VotePayload<'a> {
    #[serde(rename = "serviceName")]
    service_name: &'a str,
    username: &'a str,
    address: &'a str,
    timestamp: i64,
    challenge: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<&'a str>,
}

#[derive(Serialize, Debug)]
struct VoteMessage {
    payload: String,
    signature: String,
}

#[derive(Deserialize, Debug)]
struct VoteResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Send a vote using [protocol v2](https://github.com/NuVotifier/NuVotifier/wiki/Technical-QA#protocol-v2).
pub fn send_vote(conf: &Conf, vote: &Vote) -> Result<(), ProbeErr> {
    let socket = create_tcp_socket(&conf.host, conf.port, &conf.socket_conf)?;
    let mut stream = DeadlineStream::new(&socket, &conf.socket_conf);
    let address = format!("{}:{}", conf.host, conf.port);

    send_vote_over(&mut stream, &address, vote)
}

/// Run the vote exchange over an already connected stream. `address` is
/// reported in the payload.
pub fn send_vote_over<S: Read + Write>(
    stream: &mut S,
    address: &str,
    vote: &Vote,
) -> Result<(), ProbeErr> {
    // Lines are read byte by byte, so nothing past the newline is consumed.
    let greeting = PacketReader::new(&mut *stream).read_line()?;
    let challenge = parse_greeting(&greeting)?;

    debug!("Votifier v2 greeting from {}", address);

    let timestamp = vote
        .timestamp
        .unwrap_or_else(SystemTime::now)
        .duration_since(UNIX_EPOCH)?
        .as_millis() as i64;

    stream.write_all(&build_vote_packet(vote, address, timestamp, challenge)?)?;
    stream.flush()?;

    let line = PacketReader::new(&mut *stream).read_line()?;
    let response = serde_json::from_str::<VoteResponse>(&line)?;

    match response.status.as_str() {
        "ok" => Ok(()),
        "error" => Err(ProbeErr::VoteRejected(response.error.unwrap_or_default())),
        other => Err(ProbeErr::UnexpectedResponse(format!(
            "Votifier status should be \"ok\" or \"error\", but got: {:?}",
            other
        ))),
    }
}

/// [Handshake](https://github.com/NuVotifier/NuVotifier/wiki/Technical-QA#handshake):
/// `VOTIFIER <version> <challenge>`. Returns the challenge.
fn parse_greeting(greeting: &str) -> Result<&str, ProbeErr> {
    let parts = greeting.split_whitespace().collect::<Vec<_>>();

    let Some(&version) = parts.get(1) else {
        return Err(ProbeErr::MalformedField(format!(
            "Votifier greeting is malformed: {:?}",
            greeting
        )));
    };

    if version != "2" {
        return Err(ProbeErr::UnknownVotifierVersion(version.into()));
    }

    parts.get(2).copied().ok_or_else(|| {
        ProbeErr::MalformedField(format!("Votifier greeting has no challenge: {:?}", greeting))
    })
}

fn build_vote_packet(
    vote: &Vote,
    address: &str,
    timestamp: i64,
    challenge: &str,
) -> Result<Vec<u8>, ProbeErr> {
    let payload = serde_json::to_string(&VotePayload {
        service_name: &vote.service_name,
        username: &vote.username,
        address,
        timestamp,
        challenge,
        uuid: vote.uuid.as_deref(),
    })?;

    let signature = sign(&vote.token, &payload)?;
    let message = serde_json::to_vec(&VoteMessage { payload, signature })?;

    let len = u16::try_from(message.len()).map_err(|_| {
        ProbeErr::MalformedField(format!("vote message is too long: {} bytes", message.len()))
    })?;

    let mut packet = PacketWriter::new();

    packet
        .write_u16_be(VOTIFIER_MAGIC)
        .write_u16_be(len)
        .write_bytes(&message);

    Ok(packet.into_inner())
}

/// Base64 HMAC-SHA256 of `payload` keyed by `token`.
fn sign(token: &str, payload: &str) -> Result<String, ProbeErr> {
    let mut mac = HmacSha256::new_from_slice(token.as_bytes())
        .map_err(|err| ProbeErr::InternalErr(err.to_string()))?;

    mac.update(payload.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
