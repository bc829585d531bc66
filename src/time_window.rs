//! Aggregate window parameters: `""`, `300`, `5m`, `1h`, `2d`, `1w`

/// Window length in seconds.
///
/// An empty parameter is a zero-length window. Returns `None` for anything
/// the functional macro grammar would not have accepted.
pub fn parse_time_window(parameter: &str) -> Option<u64> {
    if parameter.is_empty() {
        return Some(0);
    }

    let (digits, multiplier) = match parameter.chars().last()? {
        's' => (&parameter[..parameter.len() - 1], 1),
        'm' => (&parameter[..parameter.len() - 1], 60),
        'h' => (&parameter[..parameter.len() - 1], 3_600),
        'd' => (&parameter[..parameter.len() - 1], 86_400),
        'w' => (&parameter[..parameter.len() - 1], 604_800),
        _ => (parameter, 1),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}
