//! Client side of the Minecraft server protocols: Java status (modern and
//! legacy), Bedrock ping, UDP Query, RCON and Votifier.
//!
//! Everything starts from a [Conf]:
//!
//! ```no_run
//! use mcprobe::{Conf, ProbeErr};
//!
//! fn main() -> Result<(), ProbeErr> {
//!     let server = Conf::create("www.example.com").get_server_status()?;
//!
//!     println!("{} ({} online)", server.motd, server.players.online);
//!     Ok(())
//! }
//! ```

mod conf;
mod error;
mod favicon;
mod query;
mod rcon;
mod server;
mod share;
mod vote;

pub mod motd;
pub mod packet;
pub mod srv;
pub mod varint;

pub use conf::{
    Conf, SocketConf, BEDROCK_PORT, DEFAULT_PROTOCOL_VERSION, JAVA_PORT, RCON_PORT, VOTIFIER_PORT,
};
pub use error::ProbeErr;
pub use favicon::Favicon;
pub use motd::{Color, FormatRun, Motd};
pub use query::*;
pub use rcon::{Rcon, RconMessage, RconState, MAX_COMMAND_LEN};
pub use server::*;
pub use srv::{DnsSrvResolver, SrvRecord, SrvResolver};
pub use vote::{send_vote, send_vote_over, Vote};
