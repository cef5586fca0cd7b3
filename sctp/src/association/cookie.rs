//! State Cookie carried in INIT-ACK and echoed back in COOKIE-ECHO
//!
//! The responder keeps no state between INIT and COOKIE-ECHO: everything it
//! needs to build the association travels inside the cookie, signed with a
//! secret only the responder knows.
//!
//! ```text
//! +-------------------------------+-------------------------------+
//! |                        Responder Tag                          |
//! |                        Initiator Tag                          |
//! |                    Responder Initial TSN                      |
//! |                    Initiator Initial TSN                      |
//! |                       Initiator a_rwnd                        |
//! |       Outbound Streams        |        Inbound Streams        |
//! |                    Creation Time (ms, u64)                    |
//! |                         Lifetime (ms)                         |
//! |                 HMAC-SHA1 over the above (20)                 |
//! +-------------------------------+-------------------------------+
//! ```

use crate::codec::primitives::{ByteReader, ByteWriter};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_SIZE: usize = 20;
const SIGNED_FIELDS_SIZE: usize = 36;

/// Fixed size of every cookie this endpoint mints
pub const COOKIE_SIZE: usize = SIGNED_FIELDS_SIZE + SIGNATURE_SIZE;

/// Why a well-formed COOKIE-ECHO was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieError {
    /// Signature does not match; the cookie was not minted here or was altered
    BadSignature,
    /// Packet verification tag differs from the tag the cookie was minted for
    TagMismatch { expected: u32, actual: u32 },
    /// Lifetime elapsed before the cookie came back
    Expired { staleness_us: u32 },
}

impl fmt::Display for CookieError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookieError::BadSignature => write!(f, "cookie signature mismatch"),
            CookieError::TagMismatch { expected, actual } => write!(
                f,
                "cookie verification tag mismatch: expected {:#010x}, got {:#010x}",
                expected, actual
            ),
            CookieError::Expired { staleness_us } => {
                write!(f, "cookie expired {} us ago", staleness_us)
            }
        }
    }
}

impl std::error::Error for CookieError {}

/// Per-endpoint key used to sign cookies
#[derive(Clone)]
pub struct CookieSecret([u8; 32]);

impl CookieSecret {
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self(key)
    }

    fn sign(&self, fields: &[u8]) -> Option<Vec<u8>> {
        let mut mac = HmacSha1::new_from_slice(&self.0).ok()?;
        mac.update(fields);
        Some(mac.finalize().into_bytes().to_vec())
    }

    fn verify(&self, fields: &[u8], signature: &[u8]) -> bool {
        match HmacSha1::new_from_slice(&self.0) {
            Ok(mut mac) => {
                mac.update(fields);
                mac.verify_slice(signature).is_ok()
            }
            Err(_) => false,
        }
    }
}

impl fmt::Debug for CookieSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CookieSecret(..)")
    }
}

/// Association parameters committed to by the responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCookie {
    pub responder_tag: u32,
    pub initiator_tag: u32,
    pub responder_initial_tsn: u32,
    pub initiator_initial_tsn: u32,
    pub initiator_a_rwnd: u32,
    /// Streams from the responder towards the initiator
    pub outbound_streams: u16,
    /// Streams from the initiator towards the responder
    pub inbound_streams: u16,
    pub created_ms: u64,
    pub lifetime_ms: u32,
}

impl StateCookie {
    /// Serialize and sign. `None` when the signer cannot be keyed.
    pub fn mint(&self, secret: &CookieSecret) -> Option<Vec<u8>> {
        let mut writer = ByteWriter::with_capacity(COOKIE_SIZE);
        writer.put_u32(self.responder_tag);
        writer.put_u32(self.initiator_tag);
        writer.put_u32(self.responder_initial_tsn);
        writer.put_u32(self.initiator_initial_tsn);
        writer.put_u32(self.initiator_a_rwnd);
        writer.put_u16(self.outbound_streams);
        writer.put_u16(self.inbound_streams);
        writer.put_u64(self.created_ms);
        writer.put_u32(self.lifetime_ms);

        let signature = secret.sign(writer.as_slice())?;
        writer.put_bytes(&signature);
        Some(writer.into_inner())
    }

    /// Check the signature and decode the fields. Says nothing about the
    /// packet it arrived in or the time; see [`StateCookie::check_at`].
    pub fn verify(bytes: &[u8], secret: &CookieSecret) -> Result<Self, CookieError> {
        if bytes.len() != COOKIE_SIZE {
            return Err(CookieError::BadSignature);
        }
        let (fields, signature) = bytes.split_at(SIGNED_FIELDS_SIZE);
        if !secret.verify(fields, signature) {
            return Err(CookieError::BadSignature);
        }

        let mut reader = ByteReader::new(fields, "state cookie");
        let parse = |reader: &mut ByteReader<'_>| -> Result<Self, crate::error::FormatError> {
            Ok(Self {
                responder_tag: reader.read_u32()?,
                initiator_tag: reader.read_u32()?,
                responder_initial_tsn: reader.read_u32()?,
                initiator_initial_tsn: reader.read_u32()?,
                initiator_a_rwnd: reader.read_u32()?,
                outbound_streams: reader.read_u16()?,
                inbound_streams: reader.read_u16()?,
                created_ms: reader.read_u64()?,
                lifetime_ms: reader.read_u32()?,
            })
        };
        parse(&mut reader).map_err(|_| CookieError::BadSignature)
    }

    /// Check the packet verification tag and the lifetime at `now_ms`
    pub fn check_at(&self, verification_tag: u32, now_ms: u64) -> Result<(), CookieError> {
        if verification_tag != self.responder_tag {
            return Err(CookieError::TagMismatch {
                expected: self.responder_tag,
                actual: verification_tag,
            });
        }

        let expires_ms = self.created_ms.saturating_add(self.lifetime_ms as u64);
        if now_ms > expires_ms {
            let staleness_us = (now_ms - expires_ms).saturating_mul(1000);
            return Err(CookieError::Expired {
                staleness_us: staleness_us.min(u32::MAX as u64) as u32,
            });
        }

        Ok(())
    }

    /// Signature, tag and lifetime in one step
    pub fn open_at(
        bytes: &[u8],
        secret: &CookieSecret,
        verification_tag: u32,
        now_ms: u64,
    ) -> Result<Self, CookieError> {
        let cookie = Self::verify(bytes, secret)?;
        cookie.check_at(verification_tag, now_ms)?;
        Ok(cookie)
    }
}

/// Milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
