//! Serial number arithmetic for TSNs (RFC 1982)

/// Compare TSNs accounting for wraparound (a > b in serial number arithmetic)
/// Per RFC 1982, a > b if (a - b) mod 2^32 is in range (0, 2^31)
pub fn tsn_gt(a: u32, b: u32) -> bool {
    let diff = a.wrapping_sub(b);
    diff > 0 && diff < 0x8000_0000
}

pub fn tsn_ge(a: u32, b: u32) -> bool {
    a == b || tsn_gt(a, b)
}

pub fn tsn_lt(a: u32, b: u32) -> bool {
    tsn_gt(b, a)
}
