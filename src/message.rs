use rand::RngCore;

use crate::{auth::Authenticator, Dictionary, Error, OutBuffer};

/// The OMAPI operation an outgoing message performs, or an incoming
/// message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    /// Open (or create) an object.
    Open = 1,
    /// Refresh the local view of an open object.
    Refresh = 2,
    /// The server's response carrying updated object state.
    Update = 3,
    /// An asynchronous notification of object state change.
    Notify = 4,
    /// The server's response to a request with no data to return.
    Status = 5,
    /// Delete an open object.
    Delete = 6,
}

impl TryFrom<u32> for Opcode {
    type Error = Error;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        Ok(match v {
            1 => Opcode::Open,
            2 => Opcode::Refresh,
            3 => Opcode::Update,
            4 => Opcode::Notify,
            5 => Opcode::Status,
            6 => Opcode::Delete,
            v => return Err(Error::Omapi(format!("invalid omapi opcode {v}"))),
        })
    }
}

impl From<Opcode> for u32 {
    fn from(v: Opcode) -> Self {
        v as u32
    }
}

/// The in-memory representation of one OMAPI PDU.
///
/// Built by one of the [`Message::open`], [`Message::update`] or
/// [`Message::delete`] constructors, mutated via field assignment and
/// [`Dictionary::update`], signed exactly once with [`Message::sign`], then
/// serialised and sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The authenticator id this message is signed with; `0` (the null
    /// authenticator) until [`sign`](Message::sign) is called with another.
    pub authid: u32,
    /// The operation this message performs or reports.
    pub opcode: Opcode,
    /// The server-assigned handle of the object this message concerns, or
    /// `0` if none.
    pub handle: u32,
    /// The transaction id chosen by the sender.
    pub tid: u32,
    /// The response id; `0` on requests, equal to the request's `tid` on
    /// responses.
    pub rid: u32,
    /// Message-level parameters (e.g. `type`, `create`, `exclusive`).
    pub message: Dictionary,
    /// Object attributes (e.g. `hardware-address`, `ip-address`).
    pub obj: Dictionary,
    /// The signature bytes, of length equal to the issuing authenticator's
    /// `authlen`.
    pub signature: Vec<u8>,
}

impl Message {
    fn new(opcode: Opcode) -> Self {
        Message {
            authid: 0,
            opcode,
            handle: 0,
            tid: 0,
            rid: 0,
            message: Dictionary::new(),
            obj: Dictionary::new(),
            signature: Vec::new(),
        }
    }

    /// Reconstruct a [`Message`] from the fields produced by parsing the
    /// wire format. `authlen` itself is not retained; it is recoverable as
    /// `signature.len()`.
    pub(crate) fn from_wire_fields(
        authid: u32,
        opcode: u32,
        handle: u32,
        tid: u32,
        rid: u32,
        message: Dictionary,
        obj: Dictionary,
        signature: Vec<u8>,
    ) -> Result<Self, Error> {
        Ok(Message {
            authid,
            opcode: Opcode::try_from(opcode)?,
            handle,
            tid,
            rid,
            message,
            obj,
            signature,
        })
    }

    /// Build an OPEN message for the named object type, with a fresh
    /// random transaction id.
    pub fn open(typename: &str) -> Self {
        let mut m = Message::new(Opcode::Open);
        m.message.push(*b"type", typename.as_bytes().to_vec());
        m.generate_tid();
        m
    }

    /// Build a DELETE message for `handle`, with a fresh random
    /// transaction id.
    pub fn delete(handle: u32) -> Self {
        let mut m = Message::new(Opcode::Delete);
        m.handle = handle;
        m.generate_tid();
        m
    }

    /// Build an UPDATE message for `handle`, with a fresh random
    /// transaction id.
    pub fn update(handle: u32) -> Self {
        let mut m = Message::new(Opcode::Update);
        m.handle = handle;
        m.generate_tid();
        m
    }

    /// Assign a new transaction id, drawn uniformly from `[0, 2^32)` using
    /// a cryptographic-strength source. Collisions are acceptable but must
    /// be statistically negligible.
    pub fn generate_tid(&mut self) {
        self.tid = rand::rngs::OsRng.next_u32();
    }

    /// Remove any existing entry in `obj` whose key appears in `updates`,
    /// then append all of `updates` in insertion order.
    pub fn update_object<K, V>(&mut self, updates: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        self.obj.update(updates);
    }

    /// Whether `self` is the response to `request` (its `rid` matches the
    /// request's `tid`).
    pub fn is_response(&self, request: &Message) -> bool {
        self.rid == request.tid
    }

    /// Serialise this message.
    ///
    /// When `forsigning` is `true`, the leading `authid` and the trailing
    /// `signature` bytes are omitted - this is the exact byte sequence an
    /// [`Authenticator`] signs over. When `false`, the full wire form
    /// (including both) is produced.
    pub fn as_string(&self, forsigning: bool) -> Result<Vec<u8>, Error> {
        let mut buf = OutBuffer::new();

        if !forsigning {
            buf.add_net32int(self.authid)?;
        }

        buf.add_net32int(self.signature.len() as u32)?;
        buf.add_net32int(self.opcode.into())?;
        buf.add_net32int(self.handle)?;
        buf.add_net32int(self.tid)?;
        buf.add_net32int(self.rid)?;
        buf.add_bindict(&self.message)?;
        buf.add_bindict(&self.obj)?;

        if !forsigning {
            buf.add(&self.signature)?;
        }

        Ok(buf.getvalue().to_vec())
    }

    /// Sign this message with `auth`, setting [`Message::authid`] and
    /// [`Message::signature`].
    ///
    /// The zero-filled placeholder signature is written first so the
    /// length prefix in the signing form is correct, then replaced with
    /// the real signature computed over that form.
    pub fn sign(&mut self, auth: &Authenticator) -> Result<(), Error> {
        self.authid = auth.authid();
        self.signature = vec![0u8; auth.authlen()];
        self.signature = auth.sign(&self.as_string(true)?);
        debug_assert_eq!(self.signature.len(), auth.authlen());
        Ok(())
    }

    /// Verify this message's signature against the authenticator selected
    /// by its `authid`, returning `false` if `authid` is unknown or the
    /// signature does not match.
    pub fn verify(&self, authenticators: &std::collections::BTreeMap<u32, Authenticator>) -> Result<bool, Error> {
        let auth = match authenticators.get(&self.authid) {
            Some(a) => a,
            None => return Ok(false),
        };
        Ok(auth.sign(&self.as_string(true)?) == self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;

    #[test]
    fn test_signing_form_omits_authid_and_signature() {
        let mut m = Message::open("host");
        m.tid = 42;
        m.authid = 7;
        m.signature = vec![1, 2, 3, 4];

        let signed_form = m.as_string(true).unwrap();
        let full_form = m.as_string(false).unwrap();

        // The signing form is shorter by exactly the authid (4 bytes) plus
        // the signature bytes (4 bytes).
        assert_eq!(full_form.len(), signed_form.len() + 4 + 4);
    }

    #[test]
    fn test_sign_then_verify() {
        let auth = Authenticator::null();
        let mut authenticators = std::collections::BTreeMap::new();
        authenticators.insert(auth.authid(), auth.clone());

        let mut m = Message::open("host");
        m.sign(&auth).unwrap();

        assert!(m.verify(&authenticators).unwrap());
    }

    #[test]
    fn test_signing_idempotent() {
        let auth = Authenticator::null();
        let mut m = Message::open("host");
        m.tid = 9;

        m.sign(&auth).unwrap();
        let first = m.as_string(false).unwrap();
        m.sign(&auth).unwrap();
        let second = m.as_string(false).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_mutating_signed_field_after_signing_invalidates() {
        let auth = Authenticator::null();
        let mut authenticators = std::collections::BTreeMap::new();
        authenticators.insert(auth.authid(), auth.clone());

        let mut m = Message::open("host");
        m.sign(&auth).unwrap();

        // tid is part of the signing form, so mutating it after signing
        // must break verification.
        m.tid = m.tid.wrapping_add(1);
        assert!(!m.verify(&authenticators).unwrap());
    }

    #[test]
    fn test_mutating_authid_after_signing_does_not_invalidate() {
        let auth = Authenticator::hmac_md5("alice", "a2V5").unwrap();

        // Register the same authenticator under two different ids, so
        // repointing `authid` at the other entry still resolves to an
        // authenticator whose key matches the one the message was signed
        // with.
        let mut authenticators = std::collections::BTreeMap::new();
        authenticators.insert(5, auth.clone());
        authenticators.insert(7, auth.clone());

        let mut m = Message::open("host");
        m.sign(&auth).unwrap();
        assert_eq!(m.authid, auth.authid());

        // authid is excluded from the signing form, so pointing the
        // message at a different registry entry for the same key must not
        // invalidate the signature.
        m.authid = 7;
        assert!(m.verify(&authenticators).unwrap());
    }

    #[test]
    fn test_is_response_correlates_by_tid() {
        let request = Message::open("host");
        let mut response = Message::update(1);
        response.rid = request.tid;

        assert!(response.is_response(&request));
    }

    #[test]
    fn test_update_object_replace_or_append() {
        let mut m = Message::open("host");
        m.obj.push(*b"a", *b"1");
        m.update_object([(b"a".to_vec(), b"2".to_vec()), (b"b".to_vec(), b"3".to_vec())]);

        assert_eq!(m.obj.get(b"a"), Some(b"2".as_slice()));
        assert_eq!(m.obj.get(b"b"), Some(b"3".as_slice()));
        assert_eq!(m.obj.len(), 2);
    }
}
