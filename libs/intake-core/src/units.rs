const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Renders a byte count in base-1024 units with one decimal place.
///
/// Non-positive and NaN inputs render as `0.0 B`.
pub fn convert_bytes(bytes: f64) -> String {
    if bytes.is_nan() || bytes <= 0.0 {
        return format!("{:.1} {}", 0.0, UNITS[0]);
    }

    let mut size = bytes;
    let mut index = 0usize;
    while size >= 1024.0 && index < UNITS.len() - 1 {
        size /= 1024.0;
        index += 1;
    }

    format!("{:.1} {}", size, UNITS[index])
}
