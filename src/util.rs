/// Shifts a MIDI note by `semitones`, pinning the result to the valid 0..=127 range.
pub fn transpose_pitch(key: u8, semitones: i32) -> u8 {
    (key as i32).saturating_add(semitones).clamp(0, 127) as u8
}

/// Formats milliseconds as `M:SS.s` for log output.
pub fn format_duration(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) as f64 / 1000.0;
    format!("{}:{:04.1}", minutes, seconds)
}
