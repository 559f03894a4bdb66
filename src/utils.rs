/// Formats a duration (in seconds) into a string H:mm:ss
pub fn duration_to_hms<T: Into<i64>>(duration: T) -> String {
    let duration: i64 = duration.into().max(0);
    let h = duration / 3600;
    let m = (duration / 60) - (h * 60);
    let s = duration % 60;
    format!("{}:{:02}:{:02}", h, m, s)
}

/// Compares two byte slices, visiting every byte regardless of where they differ
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b.iter()).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
