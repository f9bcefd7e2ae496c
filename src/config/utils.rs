/// Parse a boolean the way operators tend to write one in an env file
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`, case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Treat empty strings as absent
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
