//! Test fixtures shared by the unit tests.

/// Build a minimal TLS 1.2/1.3 ClientHello record with `signature_algorithms`.
pub(crate) fn build_client_hello(server_name: Option<&str>, alpn: &[&str]) -> Vec<u8> {
    hello_record([0x03, 0x03], server_name, alpn, true)
}

/// A TLS 1.0 ClientHello as older clients send it: SNI only, no
/// `signature_algorithms`.
pub(crate) fn build_legacy_client_hello(server_name: Option<&str>) -> Vec<u8> {
    hello_record([0x03, 0x01], server_name, &[], false)
}

/// Re-frame the handshake payload of a single record into records carrying
/// at most `chunk` bytes each.
pub(crate) fn split_into_records(record: &[u8], chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for fragment in record[5..].chunks(chunk) {
        out.extend_from_slice(&record[..3]);
        out.extend_from_slice(&(fragment.len() as u16).to_be_bytes());
        out.extend_from_slice(fragment);
    }
    out
}

fn hello_record(
    client_version: [u8; 2],
    server_name: Option<&str>,
    alpn: &[&str],
    signature_algorithms: bool,
) -> Vec<u8> {
    let mut extensions = Vec::new();

    if let Some(host) = server_name {
        let host_bytes = host.as_bytes();
        let mut sni_ext = Vec::new();
        sni_ext.extend_from_slice(&((3 + host_bytes.len()) as u16).to_be_bytes()); // list len
        sni_ext.push(0x00); // host name type
        sni_ext.extend_from_slice(&(host_bytes.len() as u16).to_be_bytes());
        sni_ext.extend_from_slice(host_bytes);
        push_extension(&mut extensions, 0x0000, &sni_ext);
    }

    if signature_algorithms {
        // ecdsa_secp256r1_sha256, rsa_pss_rsae_sha256, rsa_pkcs1_sha256
        let schemes: [u16; 3] = [0x0403, 0x0804, 0x0401];
        let mut sig_ext = Vec::new();
        sig_ext.extend_from_slice(&((schemes.len() * 2) as u16).to_be_bytes());
        for scheme in schemes {
            sig_ext.extend_from_slice(&scheme.to_be_bytes());
        }
        push_extension(&mut extensions, 0x000d, &sig_ext);
    }

    if !alpn.is_empty() {
        let mut list = Vec::new();
        for proto in alpn {
            list.push(proto.len() as u8);
            list.extend_from_slice(proto.as_bytes());
        }
        let mut alpn_ext = Vec::new();
        alpn_ext.extend_from_slice(&(list.len() as u16).to_be_bytes());
        alpn_ext.extend_from_slice(&list);
        push_extension(&mut extensions, 0x0010, &alpn_ext);
    }

    // ClientHello body
    let mut ch_body = Vec::new();
    ch_body.extend_from_slice(&client_version);
    ch_body.extend_from_slice(&[0x5a; 32]); // random
    ch_body.push(0); // session id length
    ch_body.extend_from_slice(&6u16.to_be_bytes()); // cipher suites length
    ch_body.extend_from_slice(&[0x13, 0x01, 0xc0, 0x2f, 0x00, 0x2f]);
    ch_body.push(1); // compression methods length
    ch_body.push(0); // null compression
    ch_body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    ch_body.extend_from_slice(&extensions);

    // Handshake header
    let mut handshake = vec![0x01]; // ClientHello
    let hs_len = ch_body.len();
    handshake.push((hs_len >> 16) as u8);
    handshake.push((hs_len >> 8) as u8);
    handshake.push(hs_len as u8);
    handshake.extend_from_slice(&ch_body);

    // TLS record header
    let mut record = vec![0x16]; // Handshake
    record.extend_from_slice(&[0x03, 0x01]);
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);

    record
}

fn push_extension(extensions: &mut Vec<u8>, ext_type: u16, data: &[u8]) {
    extensions.extend_from_slice(&ext_type.to_be_bytes());
    extensions.extend_from_slice(&(data.len() as u16).to_be_bytes());
    extensions.extend_from_slice(data);
}
