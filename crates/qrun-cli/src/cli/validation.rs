/// Parses a duration into milliseconds.
///
/// A bare number is milliseconds; `ms`, `s`, `m` and `h` suffixes are
/// accepted. `0` disables the corresponding timeout.
pub fn parse_duration_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    if digits.is_empty() {
        return Err(format!("'{s}' is not a duration (expected e.g. 500, 30s, 10m)"));
    }

    let value: u64 = digits
        .parse()
        .map_err(|e| format!("'{digits}' is not a number: {e}"))?;

    let factor = match unit.trim() {
        "" | "ms" => 1,
        "s" => 1_000,
        "m" | "min" => 60_000,
        "h" => 3_600_000,
        other => return Err(format!("unknown duration unit '{other}' (use ms, s, m or h)")),
    };

    value
        .checked_mul(factor)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
