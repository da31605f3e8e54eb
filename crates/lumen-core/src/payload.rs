//! Client payload decoding.
//!
//! Clients send images as base64 text, either bare or as a data URI
//! (`data:image/png;base64,....`). Browsers and some HTTP clients also strip
//! trailing `=` padding, so padding is restored before decoding.

use base64::Engine;

use crate::error::PayloadError;

/// Decode a client-supplied image string into raw bytes.
///
/// If the string contains a comma, everything before the first comma is a
/// header that must mention `base64` (case-insensitive). The data portion is
/// padded to a multiple of four and decoded with the standard alphabet.
pub fn decode_payload(image_str: &str) -> Result<Vec<u8>, PayloadError> {
    let data = match image_str.split_once(',') {
        Some((header, data)) => {
            if !header.to_ascii_lowercase().contains("base64") {
                return Err(PayloadError::InvalidHeader);
            }
            data
        }
        None => image_str,
    };

    let padding = (4 - data.len() % 4) % 4;
    let mut padded = String::with_capacity(data.len() + padding);
    padded.push_str(data);
    padded.extend(std::iter::repeat('=').take(padding));

    base64::engine::general_purpose::STANDARD
        .decode(padded.as_bytes())
        .map_err(|e| PayloadError::Decode(e.to_string()))
}
