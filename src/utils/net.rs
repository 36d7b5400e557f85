use std::net::Ipv4Addr;

/// "192.0.2.1" -> 3221225985
pub fn dotted_quad_to_num(ip: &str) -> Option<u32> {
    ip.trim().parse::<Ipv4Addr>().ok().map(u32::from)
}

pub fn num_to_dotted_quad(n: u32) -> String {
    Ipv4Addr::from(n).to_string()
}

/// Network address of `ip` under a `/bits` mask, e.g. ("10.1.2.3", 8) -> "10.0.0.0".
pub fn network_address(
    ip: &str,
    bits: u8,
) -> Option<String> {
    if bits > 32 {
        return None;
    }
    let addr = dotted_quad_to_num(ip)?;
    let mask = if bits == 0 { 0 } else { u32::MAX << (32 - u32::from(bits)) };
    Some(num_to_dotted_quad(addr & mask))
}
