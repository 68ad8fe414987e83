//! Input Validators
//!
//! Strict syntactic validation for untrusted login signals. The IP
//! validators are deliberately stricter than `str::parse` into the std
//! address types: no leading zeros, no whitespace, no zone identifiers.

/// Validate a strict dotted-quad IPv4 address.
///
/// Exactly four decimal octets in `0..=255`, digits only, no leading zeros
/// (`"1.2.3.04"` is rejected, `"0.0.0.0"` is accepted).
pub fn is_valid_ipv4(s: &str) -> bool {
    let mut octets = 0u8;
    for part in s.split('.') {
        octets += 1;
        if octets > 4 || part.is_empty() || part.len() > 3 {
            return false;
        }
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if part.len() > 1 && part.starts_with('0') {
            return false;
        }
        match part.parse::<u16>() {
            Ok(value) if value <= 255 => {}
            _ => return false,
        }
    }
    octets == 4
}

/// Validate a strict IPv6 address.
///
/// Groups of one to four hex digits, at most one `::` compression, exactly
/// eight groups when uncompressed, strictly fewer when compressed. An
/// embedded IPv4 tail is accepted in the final position and counts as two
/// groups.
pub fn is_valid_ipv6(s: &str) -> bool {
    if s == "::" {
        return true;
    }
    match s.find("::") {
        Some(idx) => {
            let head = &s[..idx];
            let tail = &s[idx + 2..];
            if tail.contains("::") {
                return false;
            }
            match (group_count(head, false), group_count(tail, true)) {
                (Some(h), Some(t)) => h + t < 8,
                _ => false,
            }
        }
        None => matches!(group_count(s, true), Some(8)),
    }
}

/// Count the groups in one side of an IPv6 address, rejecting malformed
/// groups. An embedded IPv4 tail counts as two groups.
fn group_count(text: &str, allow_embedded_v4: bool) -> Option<usize> {
    if text.is_empty() {
        return Some(0);
    }
    let parts: Vec<&str> = text.split(':').collect();
    let mut groups = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            return None;
        }
        if part.contains('.') {
            if !allow_embedded_v4 || i != parts.len() - 1 || !is_valid_ipv4(part) {
                return None;
            }
            groups += 2;
        } else if part.len() <= 4 && part.bytes().all(|b| b.is_ascii_hexdigit()) {
            groups += 1;
        } else {
            return None;
        }
    }
    Some(groups)
}

/// Whether `s` is a strictly valid IPv4 or IPv6 address.
pub fn is_valid_ip(s: &str) -> bool {
    is_valid_ipv4(s) || is_valid_ipv6(s)
}

/// Normalize a raw factor output: non-finite values become `0.0`, finite
/// values clamp into `[0, 100]`.
pub fn normalize_factor_score(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    raw.clamp(0.0, 100.0)
}

/// Whether a settled factor result lies inside its declared output range.
pub fn score_in_declared_range(value: f64, min: f64, max: f64) -> bool {
    value.is_finite() && value >= min && value <= max
}

/// Collapse a weighted sum into the final integer score in `0..=100`.
pub fn finalize_score(weighted: f64) -> u8 {
    if !weighted.is_finite() {
        return 0;
    }
    weighted.clamp(0.0, 100.0).round() as u8
}

/// Validate a latitude in decimal degrees.
pub fn is_valid_latitude(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

/// Validate a longitude in decimal degrees.
pub fn is_valid_longitude(lng: f64) -> bool {
    lng.is_finite() && (-180.0..=180.0).contains(&lng)
}
