use serde::{Deserialize, Serialize};
use std::fmt;

/// The four lock-stepped output voices, in emission order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Voice {
    Melody,
    Bass,
    Chords,
    Drums,
}

impl Voice {
    pub const ALL: [Voice; 4] = [Voice::Melody, Voice::Bass, Voice::Chords, Voice::Drums];
    pub const TONAL: [Voice; 3] = [Voice::Melody, Voice::Bass, Voice::Chords];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_tonal(self) -> bool {
        !matches!(self, Voice::Drums)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Voice::Melody => "melody",
            Voice::Bass => "bass",
            Voice::Chords => "chords",
            Voice::Drums => "drums",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A half-open tick interval `[start, end)` during which a voice holds one pitch.
/// For the drum voice `pitch` is the GM percussion instrument.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteSpan {
    pub start: u64,
    pub end: u64,
    pub pitch: u8,
    pub velocity: u8,
}

impl NoteSpan {
    pub const fn covers(&self, tick: u64) -> bool {
        self.start <= tick && tick < self.end
    }
}

/// Semitone offsets of the 2nd and 3rd chord notes above the base note.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpInterval {
    pub start: u64,
    pub end: u64,
    pub offset1: u8,
    pub offset2: u8,
}

impl ArpInterval {
    pub const fn covers(&self, tick: u64) -> bool {
        self.start <= tick && tick < self.end
    }
}

/// The packed state of every voice during one slice, used to decide run boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    pub words: [u16; 4],
    pub arp: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub melody: u16,
    pub bass: u16,
    pub chords: u16,
    pub drums: u16,
    pub duration_ms: u16,
    pub arp: u8,
}

impl Step {
    pub const fn new(frame: Frame, duration_ms: u16) -> Self {
        Self {
            melody: frame.words[0],
            bass: frame.words[1],
            chords: frame.words[2],
            drums: frame.words[3],
            duration_ms,
            arp: frame.arp,
        }
    }

    pub const fn frame(&self) -> Frame {
        Frame {
            words: [self.melody, self.bass, self.chords, self.drums],
            arp: self.arp,
        }
    }

    pub const fn word(&self, voice: Voice) -> u16 {
        match voice {
            Voice::Melody => self.melody,
            Voice::Bass => self.bass,
            Voice::Chords => self.chords,
            Voice::Drums => self.drums,
        }
    }
}

/// The merged, run-length-compressed step sequence shared by all four voices.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Timeline {
    steps: Vec<Step>,
}

impl Timeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms as u64).sum()
    }

    pub fn has_arp(&self) -> bool {
        self.steps.iter().any(|s| s.arp != 0)
    }

    pub fn words(&self, voice: Voice) -> Vec<u16> {
        self.steps.iter().map(|s| s.word(voice)).collect()
    }

    pub fn timing(&self) -> Vec<u16> {
        self.steps.iter().map(|s| s.duration_ms).collect()
    }

    pub fn arp(&self) -> Vec<u8> {
        self.steps.iter().map(|s| s.arp).collect()
    }

    /// Cuts the timeline at the first step where the running total reaches `max_ms`.
    /// That step is kept, so the result may run slightly past `max_ms`.
    pub fn truncate(self, max_ms: u64) -> Timeline {
        let mut total: u64 = 0;
        let mut steps = self.steps;
        if let Some(i) = steps.iter().position(|step| {
            total += step.duration_ms as u64;
            total >= max_ms
        }) {
            steps.truncate(i + 1);
        }
        Timeline { steps }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub prefix: String,
    pub tempo_bpm: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Song {
    pub metadata: Metadata,
    pub timeline: Timeline,
}

#[cfg(test)]
mod test {
    use super::*;

    fn timed(durations: &[u16]) -> Timeline {
        Timeline::new(
            durations
                .iter()
                .enumerate()
                .map(|(i, &d)| {
                    Step::new(
                        Frame {
                            words: [i as u16, 0, 0, 0],
                            arp: 0,
                        },
                        d,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn truncate_keeps_overshooting_step() {
        let out = timed(&[400, 400, 400]).truncate(1000);

        assert_eq!(out.len(), 3);
        assert_eq!(out.total_ms(), 1200);
    }

    #[test]
    fn truncate_stops_at_exact_total() {
        let out = timed(&[500, 500, 500, 500]).truncate(1000);

        assert_eq!(out.len(), 2);
        assert_eq!(out.total_ms(), 1000);
    }

    #[test]
    fn truncate_shorter_than_limit_is_untouched() {
        let input = timed(&[100, 200]);
        let out = input.clone().truncate(10_000);

        assert_eq!(out, input);
    }

    #[test]
    fn step_frame_roundtrip() {
        let frame = Frame {
            words: [0xC3C0, 0x8240, 0, 0x7030],
            arp: 0x47,
        };
        let step = Step::new(frame, 250);

        assert_eq!(step.frame(), frame);
        assert_eq!(step.word(Voice::Drums), 0x7030);
        assert_eq!(step.word(Voice::Bass), 0x8240);
    }

    #[test]
    fn voice_arrays_are_lockstep() {
        let tl = timed(&[10, 20, 30]);

        for voice in Voice::ALL {
            assert_eq!(tl.words(voice).len(), tl.len());
        }
        assert_eq!(tl.timing(), vec![10, 20, 30]);
        assert_eq!(tl.arp().len(), tl.len());
        assert!(!tl.has_arp());
    }
}
