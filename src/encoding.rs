//! Text encodings used to turn plaintext lines into the bytes that get
//! encrypted, and back.

use crate::error::{DiffCryptError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
}

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Utf16Le => "utf16le",
        }
    }

    /// Encode a plaintext line into bytes.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Ascii => text
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u8)
                    } else {
                        Err(unrepresentable(c, self))
                    }
                })
                .collect(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| unrepresentable(c, self)))
                .collect(),
            TextEncoding::Utf16Le => Ok(text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect()),
        }
    }

    /// Decode bytes produced by [`TextEncoding::encode`].
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| DiffCryptError::Decryption(format!("invalid utf-8: {e}"))),
            TextEncoding::Ascii => {
                if let Some(b) = bytes.iter().find(|b| !b.is_ascii()) {
                    return Err(DiffCryptError::Decryption(format!(
                        "byte 0x{b:02x} is not ascii"
                    )));
                }
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            TextEncoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(DiffCryptError::Decryption(
                        "utf-16 data has an odd number of bytes".into(),
                    ));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units)
                    .map_err(|e| DiffCryptError::Decryption(format!("invalid utf-16: {e}")))
            }
        }
    }
}

fn unrepresentable(c: char, encoding: TextEncoding) -> DiffCryptError {
    DiffCryptError::Crypto(format!(
        "character {c:?} cannot be represented in {}",
        encoding.name()
    ))
}

impl FromStr for TextEncoding {
    type Err = DiffCryptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            "latin1" | "binary" | "iso-8859-1" | "iso88591" => Ok(TextEncoding::Latin1),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(TextEncoding::Utf16Le),
            _ => Err(DiffCryptError::UnsupportedEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
