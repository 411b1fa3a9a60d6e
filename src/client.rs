use std::any::Any;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

use tracing::{debug, trace};

use crate::{
    addr::{pack_ip, pack_mac, unpack_ip, unpack_mac},
    auth::Authenticator,
    Error, InBuffer, Message, Opcode, OutBuffer,
};

const PROTOCOL_VERSION: u32 = 100;
const HEADER_SIZE: u32 = 24; // 6 u32 header fields.
const FILL_CHUNK: usize = 2048;

/// A synchronous OMAPI client, generic over its transport.
///
/// One `Client` owns one connection. Requests are serviced one at a time -
/// there is no pipelining and no connection pooling. On any transport or
/// protocol error the connection is closed and subsequent calls fail with
/// [`Error::NotConnected`].
#[derive(Debug)]
pub struct Client<S> {
    stream: S,
    inbuffer: InBuffer,
    authenticators: BTreeMap<u32, Authenticator>,
    defauth: u32,
    closed: bool,
}

impl Client<TcpStream> {
    /// Connect to an OMAPI server over TCP at `host:port`, optionally
    /// establishing an HMAC-MD5 authenticator if both `user` and
    /// `key_base64` are given.
    pub fn connect(
        host: &str,
        port: u16,
        user: Option<&str>,
        key_base64: Option<&str>,
    ) -> Result<Self, Error> {
        let stream = TcpStream::connect((host, port))?;
        Self::new(stream, user, key_base64)
    }
}

impl<S> Client<S>
where
    S: Read + Write + 'static,
{
    /// Wrap an already-connected transport, performing the startup
    /// handshake and, if `user` and `key_base64` are both given, the
    /// HMAC-MD5 authenticator handshake.
    pub fn new(stream: S, user: Option<&str>, key_base64: Option<&str>) -> Result<Self, Error> {
        let mut authenticators = BTreeMap::new();
        authenticators.insert(0, Authenticator::null());

        let mut client = Client {
            stream,
            inbuffer: InBuffer::new(),
            authenticators,
            defauth: 0,
            closed: false,
        };

        client.send_startup()?;
        client.recv_startup()?;

        if let (Some(user), Some(key)) = (user, key_base64) {
            let auth = Authenticator::hmac_md5(user, key)?;
            client.initialize_authenticator(auth)?;
        }

        Ok(client)
    }

    fn check_connected(&self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    fn send_conn(&mut self, data: &[u8]) -> Result<(), Error> {
        self.check_connected()?;
        if let Err(e) = self.stream.write_all(data) {
            self.closed = true;
            return Err(e.into());
        }
        Ok(())
    }

    /// Read up to [`FILL_CHUNK`] bytes from the transport into the input
    /// buffer. A zero-length read means the peer closed the connection.
    fn fill_inbuffer(&mut self) -> Result<(), Error> {
        self.check_connected()?;
        let mut chunk = [0u8; FILL_CHUNK];
        let n = match self.stream.read(&mut chunk) {
            Ok(n) => n,
            Err(e) => {
                self.closed = true;
                return Err(e.into());
            }
        };
        if n == 0 {
            self.closed = true;
            return Err(Error::ConnectionClosed);
        }
        if let Err(e) = self.inbuffer.feed(&chunk[..n]) {
            self.closed = true;
            return Err(e);
        }
        Ok(())
    }

    fn send_startup(&mut self) -> Result<(), Error> {
        let mut buf = OutBuffer::new();
        buf.add_net32int(PROTOCOL_VERSION)?;
        buf.add_net32int(HEADER_SIZE)?;
        trace!("sending omapi startup frame");
        self.send_conn(buf.getvalue())
    }

    fn recv_startup(&mut self) -> Result<(), Error> {
        loop {
            if let Some((version, header_size)) = self.inbuffer.parse_startup_message()? {
                self.inbuffer.resetsize();
                if version != PROTOCOL_VERSION {
                    self.close();
                    return Err(Error::ProtocolMismatch {
                        got: version,
                        want: PROTOCOL_VERSION,
                    });
                }
                if header_size != HEADER_SIZE {
                    self.close();
                    return Err(Error::HeaderSizeMismatch {
                        got: header_size,
                        want: HEADER_SIZE,
                    });
                }
                debug!("omapi startup handshake complete");
                return Ok(());
            }
            self.fill_inbuffer()?;
        }
    }

    fn receive_message(&mut self) -> Result<Message, Error> {
        loop {
            if let Some(msg) = self.inbuffer.parse_message()? {
                self.inbuffer.resetsize();
                if !msg.verify(&self.authenticators)? {
                    self.close();
                    return Err(Error::BadSignature);
                }
                return Ok(msg);
            }
            self.fill_inbuffer()?;
        }
    }

    /// Read the response to `request`, rejecting responses signed by an
    /// authenticator other than the connection default unless
    /// `allow_insecure` is set. This flag is internal only - the public
    /// surface always rejects a wrongly-signed response.
    fn receive_response(&mut self, request: &Message, allow_insecure: bool) -> Result<Message, Error> {
        let response = self.receive_message()?;
        if !response.is_response(request) {
            self.close();
            return Err(Error::UnexpectedResponse);
        }
        if response.authid != self.defauth && !allow_insecure {
            return Err(Error::WrongAuthenticator);
        }
        Ok(response)
    }

    fn send_message(&mut self, message: &mut Message, sign: bool) -> Result<(), Error> {
        self.check_connected()?;
        if sign {
            let auth = self
                .authenticators
                .get(&self.defauth)
                .expect("default authenticator is always registered");
            message.sign(auth)?;
        }
        trace!(tid = message.tid, opcode = ?message.opcode, "sending omapi message");
        self.send_conn(&message.as_string(false)?)
    }

    /// Send `message`, signed with the default authenticator, and return
    /// its response.
    pub fn query_server(&mut self, mut message: Message) -> Result<Message, Error> {
        self.send_message(&mut message, true)?;
        self.receive_response(&message, false)
    }

    fn initialize_authenticator(&mut self, mut auth: Authenticator) -> Result<(), Error> {
        let mut msg = Message::open("authenticator");
        let fields: Vec<(Vec<u8>, Vec<u8>)> = auth
            .auth_object()
            .iter()
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect();
        msg.update_object(fields);

        let response = self.query_server(msg)?;
        if response.opcode != Opcode::Update {
            return Err(Error::Omapi("received non-update response for open".into()));
        }

        let authid = response.handle;
        if authid == 0 {
            return Err(Error::Omapi("received invalid authid from server".into()));
        }

        auth.set_authid(authid);
        self.authenticators.insert(authid, auth);
        self.defauth = authid;
        debug!(authid, "omapi authenticator handshake complete");
        Ok(())
    }

    /// Close the connection. Idempotent.
    ///
    /// Stable Rust has no inherent-impl specialization, so a `TcpStream`
    /// can't get its own `close` override without conflicting with this
    /// generic one; a downcast stands in for that override and shuts the
    /// socket down with `Shutdown::Both` when the transport actually is one.
    pub fn close(&mut self) {
        if !self.closed {
            let _ = self.stream.flush();
            if let Some(tcp) = (&mut self.stream as &mut dyn Any).downcast_mut::<TcpStream>() {
                let _ = tcp.shutdown(Shutdown::Both);
            }
            self.closed = true;
        }
    }

    /// Create a "host" object bound to `ip` and `mac`, with atomic
    /// creation semantics (`create=1`, `exclusive=1`).
    pub fn add_host(&mut self, ip: &str, mac: &str) -> Result<(), Error> {
        let mac6 = pack_mac(mac)?;
        let ip4 = pack_ip(ip)?;

        let mut msg = Message::open("host");
        msg.message.push(*b"create", 1u32.to_be_bytes().to_vec());
        msg.message.push(*b"exclusive", 1u32.to_be_bytes().to_vec());
        msg.obj.push(*b"hardware-address", mac6.to_vec());
        msg.obj.push(*b"hardware-type", 1u32.to_be_bytes().to_vec());
        msg.obj.push(*b"ip-address", ip4.to_vec());

        let response = self.query_server(msg)?;
        if response.opcode != Opcode::Update {
            return Err(Error::Omapi("add failed".into()));
        }
        Ok(())
    }

    /// Update the `ip-address` of the host identified by `mac`, falling
    /// back to [`add_host`](Client::add_host) if no such host exists.
    pub fn update_host(&mut self, mac: &str, ip: &str) -> Result<(), Error> {
        let mac6 = pack_mac(mac)?;

        let mut msg = Message::open("host");
        msg.obj.push(*b"hardware-address", mac6.to_vec());

        let response = self.query_server(msg)?;
        if response.opcode != Opcode::Update {
            return self.add_host(ip, mac);
        }

        let ip4 = pack_ip(ip)?;
        let mut update = Message::update(response.handle);
        update.obj.push(*b"ip-address", ip4.to_vec());

        let response = self.query_server(update)?;
        if response.opcode != Opcode::Status {
            return Err(Error::Omapi(format!("could not update host with mac {mac}")));
        }
        Ok(())
    }

    /// Delete the host identified by `mac`.
    pub fn del_host(&mut self, mac: &str) -> Result<(), Error> {
        let mac6 = pack_mac(mac)?;

        let mut msg = Message::open("host");
        msg.obj.push(*b"hardware-address", mac6.to_vec());
        msg.obj.push(*b"hardware-type", 1u32.to_be_bytes().to_vec());

        let response = self.query_server(msg)?;
        if response.opcode != Opcode::Update {
            return Err(Error::NotFound);
        }
        if response.handle == 0 {
            return Err(Error::Omapi("received invalid handle from server".into()));
        }

        let response = self.query_server(Message::delete(response.handle))?;
        if response.opcode != Opcode::Status {
            return Err(Error::Omapi("delete failed".into()));
        }
        Ok(())
    }

    /// Look up the `ip-address` of the host identified by `mac`.
    pub fn lookup_ip(&mut self, mac: &str) -> Result<String, Error> {
        let mac6 = pack_mac(mac)?;

        let mut msg = Message::open("host");
        msg.obj.push(*b"hardware-address", mac6.to_vec());

        let response = self.query_server(msg)?;
        if response.opcode != Opcode::Update {
            return Err(Error::NotFound);
        }

        let ip = response.obj.get(b"ip-address").ok_or(Error::NotFound)?;
        unpack_ip(ip)
    }

    /// Look up the `hardware-address` of the host identified by `ip`.
    pub fn lookup_mac(&mut self, ip: &str) -> Result<String, Error> {
        let ip4 = pack_ip(ip)?;

        let mut msg = Message::open("host");
        msg.obj.push(*b"ip-address", ip4.to_vec());

        let response = self.query_server(msg)?;
        if response.opcode != Opcode::Update {
            return Err(Error::NotFound);
        }

        let mac = response.obj.get(b"hardware-address").ok_or(Error::NotFound)?;
        unpack_mac(mac)
    }
}

impl<S> Drop for Client<S> {
    fn drop(&mut self) {
        self.closed = true;
    }
}
