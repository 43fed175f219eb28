//! Canonical content fingerprints derived from magnet-style locators.

use std::fmt::{self, Display, Formatter};

use data_encoding::BASE32;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::LocatorError;

const V1_HEX_LEN: usize = 40;
const V1_BASE32_LEN: usize = 32;
const V1_BYTES: usize = 20;
const SHA256_BYTES: usize = 32;
/// Multihash prefix for a 32-byte sha2-256 digest (`0x12`, `0x20`).
const SHA256_MULTIHASH_PREFIX: &str = "1220";

/// Lowercase hex info-hash identifying a piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint from a locator.
    ///
    /// Accepts `magnet:` URIs carrying `xt=urn:btih:` (hex or base32) or
    /// `xt=urn:btmh:` (sha2-256 multihash), as well as bare v1 info-hashes.
    /// Hex and base32 spellings of the same hash produce the same value.
    ///
    /// # Errors
    ///
    /// Returns a [`LocatorError`] when no well-formed identifier is present.
    pub fn from_locator(locator: &str) -> Result<Self, LocatorError> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(LocatorError::Empty);
        }
        if let Some(fingerprint) = parse_v1(trimmed) {
            return Ok(fingerprint);
        }

        let uri = Url::parse(trimmed).map_err(|_| LocatorError::NotMagnet)?;
        if uri.scheme() != "magnet" {
            return Err(LocatorError::NotMagnet);
        }

        let mut v2 = None;
        let mut malformed = None;
        for (key, value) in uri.query_pairs() {
            if key != "xt" {
                continue;
            }
            let lower = value.to_ascii_lowercase();
            if let Some(hash) = lower.strip_prefix("urn:btih:") {
                match parse_v1(hash) {
                    Some(fingerprint) => return Ok(fingerprint),
                    None => malformed = Some(value.into_owned()),
                }
            } else if let Some(hash) = lower.strip_prefix("urn:btmh:") {
                match parse_v2(hash) {
                    Some(fingerprint) => {
                        v2.get_or_insert(fingerprint);
                    }
                    None => malformed = Some(value.into_owned()),
                }
            }
        }

        v2.ok_or_else(|| {
            malformed.map_or(LocatorError::MissingInfoHash, |value| {
                LocatorError::MalformedInfoHash { value }
            })
        })
    }

    /// Hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Friendly name (`dn`) carried by a magnet URI, if any.
#[must_use]
pub fn display_name(locator: &str) -> Option<String> {
    let uri = Url::parse(locator.trim()).ok()?;
    if uri.scheme() != "magnet" {
        return None;
    }
    uri.query_pairs()
        .find(|(key, value)| key == "dn" && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

fn parse_v1(value: &str) -> Option<Fingerprint> {
    let bytes = match value.len() {
        V1_HEX_LEN => hex::decode(value).ok()?,
        V1_BASE32_LEN => BASE32.decode(value.to_ascii_uppercase().as_bytes()).ok()?,
        _ => return None,
    };
    (bytes.len() == V1_BYTES).then(|| Fingerprint(hex::encode(bytes)))
}

fn parse_v2(value: &str) -> Option<Fingerprint> {
    let digest = hex::decode(value.strip_prefix(SHA256_MULTIHASH_PREFIX)?).ok()?;
    if digest.len() != SHA256_BYTES {
        return None;
    }
    // v2 content is keyed by the truncated digest, matching hybrid v1 swarms.
    Some(Fingerprint(hex::encode(&digest[..V1_BYTES])))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn hex_btih_is_lowercased() {
        let locator = format!("magnet:?xt=urn:btih:{}&dn=demo", HEX.to_ascii_uppercase());
        let fingerprint = Fingerprint::from_locator(&locator).expect("valid locator");
        assert_eq!(fingerprint.as_str(), HEX);
    }

    #[test]
    fn base32_and_hex_spellings_agree() {
        // base32 of 0x0123456789abcdef0123456789abcdef01234567
        let base32 = "AERUKZ4JVPG66AJDIVTYTK6N54ASGRLH";
        let from_base32 = Fingerprint::from_locator(&format!("magnet:?xt=urn:btih:{base32}"))
            .expect("base32 locator");
        let from_hex =
            Fingerprint::from_locator(&format!("magnet:?xt=urn:btih:{HEX}")).expect("hex locator");
        assert_eq!(from_base32, from_hex);

        let lower = Fingerprint::from_locator(&format!(
            "magnet:?xt=urn:btih:{}",
            base32.to_ascii_lowercase()
        ))
        .expect("lowercase base32");
        assert_eq!(lower, from_hex);
    }

    #[test]
    fn base32_outside_the_alphabet_is_malformed() {
        // `1` and `8` are not base32 digits; `=` padding cannot fill a 32-char v1 hash.
        for hash in [
            "AERUKZ4JVPG66AJDIVTYTK6N54ASGRL1",
            "AERUKZ4JVPG66AJDIVTYTK6N54ASGRL8",
            "AERUKZ4JVPG66AJDIVTYTK6N54ASGR==",
        ] {
            assert!(matches!(
                Fingerprint::from_locator(&format!("magnet:?xt=urn:btih:{hash}")),
                Err(LocatorError::MalformedInfoHash { .. })
            ));
        }
    }

    #[test]
    fn non_hex_digits_are_malformed() {
        let hash = format!("{}zz", &HEX[..38]);
        assert!(matches!(
            Fingerprint::from_locator(&format!("magnet:?xt=urn:btih:{hash}")),
            Err(LocatorError::MalformedInfoHash { .. })
        ));
        let digest = format!("{}zz", "aa".repeat(31));
        assert!(matches!(
            Fingerprint::from_locator(&format!("magnet:?xt=urn:btmh:1220{digest}")),
            Err(LocatorError::MalformedInfoHash { .. })
        ));
    }

    #[test]
    fn bare_info_hash_is_accepted() {
        let fingerprint = Fingerprint::from_locator(&format!("  {HEX}  ")).expect("bare hash");
        assert_eq!(fingerprint.as_str(), HEX);
    }

    #[test]
    fn v2_multihash_is_truncated() {
        let digest = "aa".repeat(32);
        let locator = format!("magnet:?xt=urn:btmh:1220{digest}");
        let fingerprint = Fingerprint::from_locator(&locator).expect("v2 locator");
        assert_eq!(fingerprint.as_str(), &digest[..40]);
    }

    #[test]
    fn v1_wins_over_v2_in_hybrid_links() {
        let digest = "bb".repeat(32);
        let locator = format!("magnet:?xt=urn:btmh:1220{digest}&xt=urn:btih:{HEX}");
        let fingerprint = Fingerprint::from_locator(&locator).expect("hybrid locator");
        assert_eq!(fingerprint.as_str(), HEX);
    }

    #[test]
    fn rejects_unusable_locators() {
        assert_eq!(Fingerprint::from_locator("   "), Err(LocatorError::Empty));
        assert_eq!(
            Fingerprint::from_locator("https://example.com/file.torrent"),
            Err(LocatorError::NotMagnet)
        );
        assert_eq!(
            Fingerprint::from_locator("not a locator"),
            Err(LocatorError::NotMagnet)
        );
        assert_eq!(
            Fingerprint::from_locator("magnet:?dn=nothing"),
            Err(LocatorError::MissingInfoHash)
        );
        assert!(matches!(
            Fingerprint::from_locator("magnet:?xt=urn:btih:demo"),
            Err(LocatorError::MalformedInfoHash { value }) if value == "urn:btih:demo"
        ));
    }

    #[test]
    fn display_name_reads_dn() {
        assert_eq!(
            display_name(&format!("magnet:?xt=urn:btih:{HEX}&dn=Big+Buck%20Bunny")),
            Some("Big Buck Bunny".to_string())
        );
        assert_eq!(display_name(HEX), None);
        assert_eq!(display_name(&format!("magnet:?xt=urn:btih:{HEX}&dn=")), None);
    }
}
