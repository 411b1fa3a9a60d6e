use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Md5;

use crate::{Dictionary, Error};

type HmacMd5Mac = Hmac<Md5>;

/// The algorithm name advertised for HMAC-MD5 authenticators, per the
/// `auth_object` exchanged during the handshake.
pub const ALGORITHM_HMAC_MD5: &str = "hmac-md5.SIG-ALG.REG.INT.";

/// A signing capability: `{authid, sign, authlen, algorithm, auth_object}`.
///
/// The set of supported algorithms is closed - a null authenticator for
/// bootstrap, and HMAC-MD5 for authenticated connections - so this is
/// modelled as a sum type rather than a trait object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authenticator {
    /// The bootstrap authenticator. Always occupies id `0`, produces a
    /// zero-length signature, and is always present in a
    /// [`Client`](crate::Client)'s authenticator registry.
    Null,

    /// An HMAC-MD5 authenticator. `authid` is `0` until assigned by the
    /// server during the handshake, after which it is immutable.
    HmacMd5 {
        /// The server-assigned id, or `0` before the handshake completes.
        authid: u32,
        /// The user name presented to the server.
        user: String,
        /// The decoded (not base64) shared secret.
        key: Vec<u8>,
    },
}

impl Authenticator {
    /// The null authenticator, fixed at id `0`.
    pub fn null() -> Self {
        Authenticator::Null
    }

    /// Construct an HMAC-MD5 authenticator for `user`, with `key_base64`
    /// decoded as the shared secret.
    ///
    /// The authenticator's `authid` is `0` until it is registered with a
    /// [`Client`] by completing the handshake.
    pub fn hmac_md5(user: impl Into<String>, key_base64: &str) -> Result<Self, Error> {
        let key = base64::engine::general_purpose::STANDARD.decode(key_base64)?;
        Ok(Authenticator::HmacMd5 {
            authid: 0,
            user: user.into(),
            key,
        })
    }

    /// The id this authenticator is registered under.
    pub fn authid(&self) -> u32 {
        match self {
            Authenticator::Null => 0,
            Authenticator::HmacMd5 { authid, .. } => *authid,
        }
    }

    /// Assign the server-issued id to an HMAC-MD5 authenticator. A no-op
    /// for the null authenticator, whose id is fixed.
    pub(crate) fn set_authid(&mut self, id: u32) {
        if let Authenticator::HmacMd5 { authid, .. } = self {
            *authid = id;
        }
    }

    /// The exact byte length of every signature this authenticator
    /// produces.
    pub fn authlen(&self) -> usize {
        match self {
            Authenticator::Null => 0,
            Authenticator::HmacMd5 { .. } => 16,
        }
    }

    /// The algorithm name, or `None` for the null authenticator.
    pub fn algorithm(&self) -> Option<&str> {
        match self {
            Authenticator::Null => None,
            Authenticator::HmacMd5 { .. } => Some(ALGORITHM_HMAC_MD5),
        }
    }

    /// The object attributes presented to the server to establish this
    /// authenticator during the handshake.
    pub fn auth_object(&self) -> Dictionary {
        match self {
            Authenticator::Null => Dictionary::new(),
            Authenticator::HmacMd5 { user, .. } => {
                let mut d = Dictionary::new();
                d.push(*b"name", user.as_bytes().to_vec());
                d.push(*b"algorithm", ALGORITHM_HMAC_MD5.as_bytes().to_vec());
                d
            }
        }
    }

    /// Sign `bytes`, returning a signature of exactly [`authlen`](Authenticator::authlen) bytes.
    pub fn sign(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Authenticator::Null => Vec::new(),
            Authenticator::HmacMd5 { key, .. } => {
                let mut mac =
                    HmacMd5Mac::new_from_slice(key).expect("HMAC accepts a key of any length");
                mac.update(bytes);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }
}
