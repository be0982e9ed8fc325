use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::ProbeErr;

const DATA_URI_PREFIX: &str = "data:image/png;base64,";
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Server icon as sent in the status response: a base64 PNG data URI.
///
/// The string is kept as-is; decoding only happens on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Favicon(String);

impl Favicon {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The data URI exactly as the server sent it.
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Decode the base64 payload into PNG bytes.
    pub fn data(&self) -> Result<Vec<u8>, ProbeErr> {
        let encoded = self.0.strip_prefix(DATA_URI_PREFIX).unwrap_or(&self.0);
        // Some servers wrap the base64 body in newlines.
        let encoded: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();

        let data = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|err| ProbeErr::InvalidFavicon(err.to_string()))?;

        if !data.starts_with(&PNG_SIGNATURE) {
            return Err(ProbeErr::InvalidFavicon("missing PNG signature".into()));
        }

        Ok(data)
    }

    /// Width and height from the PNG `IHDR` chunk.
    pub fn dimensions(&self) -> Result<(u32, u32), ProbeErr> {
        let data = self.data()?;

        // signature(8) + chunk length(4) + "IHDR"(4) + width(4) + height(4)
        if data.len() < 24 || &data[12..16] != b"IHDR" {
            return Err(ProbeErr::InvalidFavicon("missing IHDR chunk".into()));
        }

        let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
        let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);

        Ok((width, height))
    }

    /// Write the decoded PNG to `path`.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProbeErr> {
        std::fs::write(path, self.data()?)?;

        Ok(())
    }
}

impl std::fmt::Display for Favicon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
