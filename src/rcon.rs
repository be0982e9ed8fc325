//! [RCON](https://wiki.vg/RCON) remote console session.
//!
//! Responses are not paired with commands: after [Rcon::login] a background
//! thread reads every command response off the socket and queues it, and
//! callers drain that queue with [Rcon::recv] and friends. The queue holds
//! at most 64 messages; once full the reader stops pulling from the socket
//! until the caller catches up.

use crate::{
    packet::{PacketReader, PacketWriter},
    share::{create_tcp_socket, DeadlineStream},
    Conf, ProbeErr, SocketConf,
};
use serde::Serialize;
use std::{
    io::{BufReader, ErrorKind, Read, Write},
    net::{Shutdown, TcpStream},
    sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TryRecvError},
    thread::JoinHandle,
    time::Duration,
};
use tracing::{debug, warn};

/// Longest command the server accepts in one packet.
pub const MAX_COMMAND_LEN: usize = 1446;
/// Longest payload the server puts in one response packet.
const MAX_RESPONSE_LEN: usize = 4096;
const MESSAGE_BACKLOG: usize = 64;

const TYPE_RESPONSE: i32 = 0;
const TYPE_COMMAND: i32 = 2;
const TYPE_AUTH_RESPONSE: i32 = 2;
const TYPE_LOGIN: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RconState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Closed,
}

/// A command response published by the background reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RconMessage {
    /// Request ID echoed by the server.
    pub request_id: i32,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RconPacket {
    request_id: i32,
    packet_type: i32,
    payload: Vec<u8>,
}

pub struct Rcon {
    stream: Option<TcpStream>,
    socket_conf: SocketConf,
    state: RconState,
    request_id: i32,
    messages: Option<Receiver<RconMessage>>,
    reader: Option<JoinHandle<()>>,
}

impl Rcon {
    /// Connect to the RCON port. No SRV lookup is done.
    pub fn dial(conf: &Conf) -> Result<Self, ProbeErr> {
        let stream = create_tcp_socket(&conf.host, conf.port, &conf.socket_conf)?;

        debug!("RCON connected to {}", conf);

        Ok(Self {
            stream: Some(stream),
            socket_conf: conf.socket_conf.clone(),
            state: RconState::Unauthenticated,
            request_id: 0,
            messages: None,
            reader: None,
        })
    }

    pub fn state(&self) -> RconState {
        self.state
    }

    /// Authenticate, then start the background reader.
    pub fn login(&mut self, password: &str) -> Result<(), ProbeErr> {
        match self.state {
            RconState::Authenticated => return Err(ProbeErr::AlreadyLoggedIn),
            RconState::Closed => return Err(ProbeErr::NotConnected),
            RconState::Unauthenticated | RconState::Authenticating => {}
        }

        let stream = self.stream.as_ref().ok_or(ProbeErr::NotConnected)?;

        self.state = RconState::Authenticating;

        let result = authenticate(&mut DeadlineStream::new(stream, &self.socket_conf), password);

        if let Err(err) = result {
            self.state = RconState::Unauthenticated;
            return Err(err);
        }

        // Responses may arrive at any time from now on.
        stream.set_read_timeout(None)?;

        let (sender, receiver) = sync_channel(MESSAGE_BACKLOG);
        let reader_stream = stream.try_clone()?;
        let reader = std::thread::Builder::new()
            .name("rcon-reader".into())
            .spawn(move || read_messages(reader_stream, sender))?;

        self.messages = Some(receiver);
        self.reader = Some(reader);
        self.state = RconState::Authenticated;

        debug!("RCON login succeeded");

        Ok(())
    }

    /// Send a command and return the request ID it was sent with.
    ///
    /// The response arrives on the message queue.
    pub fn run(&mut self, command: &str) -> Result<i32, ProbeErr> {
        match self.state {
            RconState::Authenticated => {}
            RconState::Closed => return Err(ProbeErr::NotConnected),
            RconState::Unauthenticated | RconState::Authenticating => {
                return Err(ProbeErr::NotLoggedIn)
            }
        }

        if command.len() > MAX_COMMAND_LEN {
            return Err(ProbeErr::MalformedField(format!(
                "RCON command is {} bytes, the limit is {}",
                command.len(),
                MAX_COMMAND_LEN
            )));
        }

        let stream = self.stream.as_ref().ok_or(ProbeErr::NotConnected)?;

        // Stays within 1..=i32::MAX; -1 is reserved for auth failure.
        self.request_id = self.request_id % i32::MAX + 1;

        let mut writer = DeadlineStream::new(stream, &self.socket_conf);

        writer.write_all(&encode_packet(self.request_id, TYPE_COMMAND, command.as_bytes()))?;
        writer.flush()?;

        debug!("RCON command sent with request ID {}", self.request_id);

        Ok(self.request_id)
    }

    /// Block until the next response arrives.
    pub fn recv(&self) -> Result<RconMessage, ProbeErr> {
        self.receiver()?.recv().map_err(|_| ProbeErr::NotConnected)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<RconMessage, ProbeErr> {
        self.receiver()?
            .recv_timeout(timeout)
            .map_err(|err| match err {
                RecvTimeoutError::Timeout => ProbeErr::Timeout,
                RecvTimeoutError::Disconnected => ProbeErr::NotConnected,
            })
    }

    /// Next queued response, if one is already waiting.
    pub fn try_recv(&self) -> Result<Option<RconMessage>, ProbeErr> {
        match self.receiver()?.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ProbeErr::NotConnected),
        }
    }

    /// Blocking iterator over responses; ends when the connection closes.
    pub fn messages(&self) -> impl Iterator<Item = RconMessage> + '_ {
        self.messages.iter().flat_map(|receiver| receiver.iter())
    }

    fn receiver(&self) -> Result<&Receiver<RconMessage>, ProbeErr> {
        match (&self.messages, self.state) {
            (Some(receiver), _) => Ok(receiver),
            (None, RconState::Closed) => Err(ProbeErr::NotConnected),
            (None, _) => Err(ProbeErr::NotLoggedIn),
        }
    }

    /// Close the connection and wait for the reader to stop. Calling it
    /// again is a no-op.
    pub fn close(&mut self) -> Result<(), ProbeErr> {
        if self.state == RconState::Closed {
            return Ok(());
        }

        self.state = RconState::Closed;
        // Unblocks a reader waiting on a full queue.
        self.messages = None;

        let mut result = Ok(());

        if let Some(stream) = self.stream.take() {
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotConnected => {}
                Err(err) => result = Err(err.into()),
            }
        }

        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("RCON reader thread panicked");
            }
        }

        debug!("RCON session closed");

        result
    }
}

impl Drop for Rcon {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!("error while closing RCON session: {}", err);
        }
    }
}

impl std::fmt::Debug for Rcon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rcon")
            .field("state", &self.state)
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// Send the [login](https://wiki.vg/RCON#3:_Login) packet and check the answer.
fn authenticate<S: Read + Write>(stream: &mut S, password: &str) -> Result<(), ProbeErr> {
    stream.write_all(&encode_packet(0, TYPE_LOGIN, password.as_bytes()))?;
    stream.flush()?;

    let response = read_packet(&mut PacketReader::new(&mut *stream))?;

    if response.request_id == -1 {
        return Err(ProbeErr::InvalidPassword);
    }

    if response.packet_type != TYPE_AUTH_RESPONSE || response.request_id != 0 {
        return Err(ProbeErr::UnexpectedResponse(format!(
            "RCON auth response should have type 2 and request ID 0, but got type {} and request ID {}",
            response.packet_type, response.request_id
        )));
    }

    Ok(())
}

/// `length || request ID || type || payload || 0x00 0x00`, little-endian.
/// `length` counts everything after itself.
fn encode_packet(request_id: i32, packet_type: i32, payload: &[u8]) -> Vec<u8> {
    let mut packet = PacketWriter::new();

    packet
        .write_i32_le(payload.len() as i32 + 10)
        .write_i32_le(request_id)
        .write_i32_le(packet_type)
        .write_bytes(payload)
        .write_bytes(&[0x00, 0x00]);

    packet.into_inner()
}

fn read_packet<R: Read>(reader: &mut PacketReader<R>) -> Result<RconPacket, ProbeErr> {
    let length = reader.read_i32_le()?;

    if length < 10 || length as usize > MAX_RESPONSE_LEN + 10 {
        return Err(ProbeErr::MalformedField(format!(
            "RCON packet length out of range: {}",
            length
        )));
    }

    let request_id = reader.read_i32_le()?;
    let packet_type = reader.read_i32_le()?;
    let mut payload = reader.read_bytes(length as usize - 8)?;

    // NUL terminator and padding byte
    while payload.last() == Some(&0x00) {
        payload.pop();
    }

    Ok(RconPacket {
        request_id,
        packet_type,
        payload,
    })
}

/// Body of the background reader thread.
fn read_messages(stream: TcpStream, sender: SyncSender<RconMessage>) {
    let mut reader = PacketReader::new(BufReader::new(stream));

    loop {
        match read_packet(&mut reader) {
            Ok(packet) if packet.packet_type == TYPE_RESPONSE => {
                let message = RconMessage {
                    request_id: packet.request_id,
                    body: String::from_utf8_lossy(&packet.payload).into_owned(),
                };

                if sender.send(message).is_err() {
                    debug!("RCON message queue dropped, reader stopping");
                    break;
                }
            }
            Ok(packet) => warn!("skipping RCON packet of type {}", packet.packet_type),
            // EOF: the server hung up or the session was closed.
            Err(ProbeErr::TruncatedInput) => {
                debug!("RCON connection closed, reader stopping");
                break;
            }
            Err(ProbeErr::IoErr(err))
                if matches!(
                    err.kind(),
                    ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::NotConnected
                        | ErrorKind::BrokenPipe
                ) =>
            {
                debug!("RCON connection closed ({}), reader stopping", err);
                break;
            }
            Err(err) => {
                warn!("RCON reader stopped: {}", err);
                break;
            }
        }
    }
}
