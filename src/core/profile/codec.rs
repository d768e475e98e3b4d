// ─── Profile Share Codec ───
// Deep links carry a whole profile: zlib-compressed UTF-8 JSON wrapped
// in base64 under `vanguard://import-profile/<payload>`. Both base64
// alphabets are accepted since links travel through browsers and chat
// clients that re-encode them.

use std::io::{Read, Write};

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};

pub const DEEP_LINK_SCHEME: &str = "vanguard";

const IMPORT_PROFILE_PATH: &str = "import-profile";

/// The typed import document the profile store receives. No
/// property-name strings: the payload deserializes into this or it is
/// rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShareableProfile {
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Extract the base64 payload from an `import-profile` deep link.
///
/// Tolerates angle-bracket wrapping (links are shared as `<...>`) and a
/// trailing slash. Returns `None` for anything that is not an
/// import-profile link; malformed payloads surface later, at decode.
pub fn parse_import_link(arg: &str) -> Option<&str> {
    let arg = arg
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/');

    let rest = arg.strip_prefix(DEEP_LINK_SCHEME)?.strip_prefix("://")?;
    let payload = rest.strip_prefix(IMPORT_PROFILE_PATH)?.strip_prefix('/')?;

    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Decode a deep-link payload back into the profile document.
pub fn decode_shared_profile(payload: &str) -> LauncherResult<ShareableProfile> {
    let bytes = decode_payload(payload)?;
    let profile = serde_json::from_slice(&bytes)
        .map_err(|e| LauncherError::DeepLink(format!("payload is not a profile: {e}")))?;
    Ok(profile)
}

/// Produce the deep-link payload for a profile document.
pub fn encode_shared_profile(profile: &ShareableProfile) -> LauncherResult<String> {
    let json = serde_json::to_vec(profile)?;
    Ok(encode_payload(&json))
}

/// base64 → zlib-inflate. Exposed at byte level so round-trip tests can
/// check the serialized document survives byte-for-byte.
pub fn decode_payload(payload: &str) -> LauncherResult<Vec<u8>> {
    let compressed = decode_base64(payload)
        .ok_or_else(|| LauncherError::DeepLink("payload is not valid base64".into()))?;

    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut bytes = Vec::new();
    decoder
        .read_to_end(&mut bytes)
        .map_err(|e| LauncherError::DeepLink(format!("payload does not inflate: {e}")))?;

    Ok(bytes)
}

/// zlib-deflate → base64 (standard alphabet, padded).
pub fn encode_payload(bytes: &[u8]) -> String {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    encoder.write_all(bytes).expect("in-memory deflate");
    let compressed = encoder.finish().expect("in-memory deflate");
    STANDARD.encode(compressed)
}

fn decode_base64(payload: &str) -> Option<Vec<u8>> {
    for engine in [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD] {
        if let Ok(bytes) = engine.decode(payload) {
            return Some(bytes);
        }
    }
    None
}
