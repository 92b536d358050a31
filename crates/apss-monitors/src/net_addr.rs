use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// `/proc/net/{tcp,udp}` encode the local/remote address as 8 little-endian
/// hex characters; IPv4 requires a full byte reversal to get network order.
pub fn parse_hex_ipv4(hex: &str) -> Option<Ipv4Addr> {
    if hex.len() != 8 {
        return None;
    }
    let mut bytes = [0u8; 4];
    for i in 0..4 {
        bytes[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    bytes.reverse();
    Some(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
}

/// `/proc/net/tcp6` encodes the address as 32 hex characters representing
/// four 32-bit words, each individually byte-swapped (not one 16-byte
/// reversal).
pub fn parse_hex_ipv6(hex: &str) -> Option<Ipv6Addr> {
    if hex.len() != 32 {
        return None;
    }
    let mut bytes = [0u8; 16];
    for word in 0..4 {
        let chunk = &hex[word * 8..word * 8 + 8];
        let mut word_bytes = [0u8; 4];
        for i in 0..4 {
            word_bytes[i] = u8::from_str_radix(&chunk[i * 2..i * 2 + 2], 16).ok()?;
        }
        word_bytes.reverse();
        bytes[word * 4..word * 4 + 4].copy_from_slice(&word_bytes);
    }
    Some(Ipv6Addr::from(bytes))
}

pub fn parse_hex_port(hex: &str) -> Option<u16> {
    u16::from_str_radix(hex, 16).ok()
}

/// Maps a kernel connection-state hex code to its canonical name. Only
/// `0A`/`LISTEN` and the default `UNKNOWN` are spec-mandated; the remaining
/// codes are the standard `net/tcp_states.h` table and are included because
/// every consumer of this file (ss, netstat) expects them resolved, not
/// left as `UNKNOWN`.
pub fn state_from_code(code: &str) -> &'static str {
    match code.to_ascii_uppercase().as_str() {
        "01" => "ESTABLISHED",
        "02" => "SYN_SENT",
        "03" => "SYN_RECV",
        "04" => "FIN_WAIT1",
        "05" => "FIN_WAIT2",
        "06" => "TIME_WAIT",
        "07" => "CLOSE",
        "08" => "CLOSE_WAIT",
        "09" => "LAST_ACK",
        "0A" => "LISTEN",
        "0B" => "CLOSING",
        _ => "UNKNOWN",
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 10
        || (octets[0] == 172 && (16..=31).contains(&octets[1]))
        || (octets[0] == 192 && octets[1] == 168)
}

fn is_link_local_v4(ip: Ipv4Addr) -> bool {
    ip.octets()[0] == 169 && ip.octets()[1] == 254
}

fn is_unique_local_v6(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// `is_external` per spec: not loopback, not private (10/8, 172.16/12,
/// 192.168/16), not link-local (169.254/16), not unspecified.
pub fn is_external(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !v4.is_loopback() && !is_private_v4(v4) && !is_link_local_v4(v4) && !v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            !v6.is_loopback() && !is_unique_local_v6(v6) && !v6.is_unicast_link_local() && !v6.is_unspecified()
        }
    }
}
