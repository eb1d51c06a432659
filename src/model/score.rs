use log::warn;

/// General MIDI reserves channel 10 (zero-indexed 9) for percussion.
pub const DRUM_CHANNEL: u8 = 9;

/// The message payloads the converter cares about. Everything else is kept as `Other`
/// so delta times still accumulate correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8, velocity: u8 },
    Tempo(u32),
    Other,
}

/// One delta-timed message. Channel messages carry their channel, meta messages don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackMessage {
    pub delta: u32,
    pub channel: Option<u8>,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Default)]
pub struct Track {
    pub name: Option<String>,
    pub messages: Vec<TrackMessage>,
}

impl Track {
    /// Walks the track yielding each message with its absolute tick.
    pub fn absolute(&self) -> impl Iterator<Item = (u64, &TrackMessage)> {
        self.messages.iter().scan(0u64, |tick, msg| {
            *tick = tick.saturating_add(msg.delta as u64);
            Some((*tick, msg))
        })
    }
}

#[derive(Debug, Clone)]
pub struct Score {
    pub ticks_per_beat: u16,
    pub tracks: Vec<Track>,
}

impl Score {
    /// Resolves a track selection, where `None` means every track in file order.
    ///
    /// An index past the end selects nothing.
    pub fn select(&self, track: Option<usize>) -> &[Track] {
        match track {
            None => &self.tracks,
            Some(idx) if idx < self.tracks.len() => &self.tracks[idx..=idx],
            Some(idx) => {
                warn!(
                    "Track {} requested but the score only has {} track(s)..!",
                    idx,
                    self.tracks.len()
                );
                &[]
            }
        }
    }
}
