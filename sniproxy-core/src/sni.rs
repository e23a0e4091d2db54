/// Lenient ClientHello parser for hellos that rustls decodes but refuses.
///
/// rustls' `Acceptor` runs its capability checks before it hands back the
/// hello, so a TLS 1.0/1.1 client that sends no `signature_algorithms`
/// extension is rejected with `PeerIncompatible` even though its SNI is
/// perfectly readable. This parser reads the same teed bytes without any of
/// those checks.
///
/// TLS record format:
///   ContentType(1) | Version(2) | Length(2) | Fragment...
///
/// Handshake (may span several records):
///   HandshakeType(1) | Length(3) | ClientHello...
///
/// ClientHello:
///   Version(2) | Random(32) | SessionID(var) | CipherSuites(var) |
///   CompressionMethods(var) | Extensions(var)
///
/// SNI extension (type 0x0000):
///   ServerNameList length(2) | NameType(1) | HostName length(2) | HostName...
///
/// ALPN extension (type 0x0010):
///   ProtocolNameList length(2) | (Length(1) | Name...)*
use crate::hello::ClientHello;
use std::net::IpAddr;

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const EXT_SERVER_NAME: u16 = 0x0000;
const EXT_ALPN: u16 = 0x0010;
const NAME_TYPE_HOST: u8 = 0x00;

/// Parse a ClientHello from the start of `buf`.
///
/// Returns None unless `buf` holds a complete, well-formed ClientHello
/// handshake message carried in handshake records.
pub(crate) fn parse_client_hello(buf: &[u8]) -> Option<ClientHello> {
    let body = reassemble_handshake(buf)?;
    parse_body(&body)
}

/// Concatenate handshake record fragments until one full ClientHello
/// message is present, and return its body.
fn reassemble_handshake(buf: &[u8]) -> Option<Vec<u8>> {
    let mut handshake = Vec::new();
    let mut pos = 0;

    loop {
        let header = buf.get(pos..pos + 5)?;
        if header[0] != CONTENT_TYPE_HANDSHAKE || header[1] != 0x03 {
            return None;
        }
        let record_len = u16::from_be_bytes([header[3], header[4]]) as usize;
        handshake.extend_from_slice(buf.get(pos + 5..pos + 5 + record_len)?);
        pos += 5 + record_len;

        if handshake.len() < 4 {
            continue;
        }
        if handshake[0] != HANDSHAKE_CLIENT_HELLO {
            return None;
        }
        let hs_len = ((handshake[1] as usize) << 16)
            | ((handshake[2] as usize) << 8)
            | (handshake[3] as usize);
        if handshake.len() >= 4 + hs_len {
            handshake.truncate(4 + hs_len);
            return Some(handshake.split_off(4));
        }
    }
}

fn parse_body(ch: &[u8]) -> Option<ClientHello> {
    let mut reader = Reader::new(ch);

    reader.skip(2)?; // legacy version
    reader.skip(32)?; // random
    let session_id_len = reader.u8()? as usize;
    reader.skip(session_id_len)?;
    let cs_len = reader.u16()? as usize;
    reader.skip(cs_len)?;
    let cm_len = reader.u8()? as usize;
    reader.skip(cm_len)?;

    let mut hello = ClientHello::default();

    // SSLv3-era hellos may stop before the extensions block
    if reader.is_empty() {
        return Some(hello);
    }

    let ext_len = reader.u16()? as usize;
    let mut extensions = Reader::new(reader.take(ext_len)?);
    while !extensions.is_empty() {
        let ext_type = extensions.u16()?;
        let len = extensions.u16()? as usize;
        let data = extensions.take(len)?;

        match ext_type {
            EXT_SERVER_NAME => hello.server_name = parse_server_name(data)?,
            EXT_ALPN => hello.alpn = parse_alpn(data)?,
            _ => {}
        }
    }

    Some(hello)
}

/// The first host_name entry, lowercased. IP literals are not valid SNI
/// names and are reported as no name at all, matching rustls.
fn parse_server_name(data: &[u8]) -> Option<Option<String>> {
    let mut reader = Reader::new(data);
    let list_len = reader.u16()? as usize;
    let mut list = Reader::new(reader.take(list_len)?);

    while !list.is_empty() {
        let name_type = list.u8()?;
        let len = list.u16()? as usize;
        let name = list.take(len)?;
        if name_type != NAME_TYPE_HOST {
            continue;
        }

        let Ok(name) = std::str::from_utf8(name) else {
            return Some(None);
        };
        if name.is_empty() || name.parse::<IpAddr>().is_ok() {
            return Some(None);
        }
        return Some(Some(name.to_ascii_lowercase()));
    }

    Some(None)
}

fn parse_alpn(data: &[u8]) -> Option<Vec<String>> {
    let mut reader = Reader::new(data);
    let list_len = reader.u16()? as usize;
    let mut list = Reader::new(reader.take(list_len)?);

    let mut protocols = Vec::new();
    while !list.is_empty() {
        let len = list.u8()? as usize;
        protocols.push(String::from_utf8_lossy(list.take(len)?).into_owned());
    }
    Some(protocols)
}

/// Bounds-checked cursor over a byte slice; every read returns None past the end.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.buf.len() {
            return None;
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Some(head)
    }

    fn skip(&mut self, n: usize) -> Option<()> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }
}
