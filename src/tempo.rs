use crate::model::score::{MessageKind, Score};
use log::{debug, warn};

/// 500,000 us per beat, i.e. 120bpm.
pub const DEFAULT_MPQN: u32 = 500_000;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoChange {
    pub tick: u64,
    pub micros_per_beat: u32,
}

/// Every tempo change in the score, sorted by tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempoMap {
    changes: Vec<TempoChange>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self {
            changes: vec![TempoChange {
                tick: 0,
                micros_per_beat: DEFAULT_MPQN,
            }],
        }
    }
}

impl TempoMap {
    /// Collects tempo metas from every track. A score without any gets a single 120bpm entry.
    pub fn build(score: &Score) -> Self {
        let mut changes: Vec<TempoChange> = Vec::new();

        for (track_idx, track) in score.tracks.iter().enumerate() {
            for (tick, msg) in track.absolute() {
                if let MessageKind::Tempo(mpqn) = msg.kind {
                    debug!(
                        "Tempo change at tick {} -> {} us/qn (track {})",
                        tick, mpqn, track_idx
                    );
                    changes.push(TempoChange {
                        tick,
                        micros_per_beat: mpqn,
                    });
                }
            }
        }

        Self::from_changes(changes)
    }

    pub fn from_changes(mut changes: Vec<TempoChange>) -> Self {
        changes.retain(|c| {
            if c.micros_per_beat == 0 {
                warn!("Ignoring zero tempo at tick {}..!", c.tick);
                return false;
            }
            true
        });

        if changes.is_empty() {
            debug!("No tempo events found, defaulting to 120bpm..!");
            return Self::default();
        }

        changes.sort_by_key(|c| c.tick);
        Self { changes }
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// The tempo active at `tick`, or 120bpm before the first change.
    pub fn rate_at(&self, tick: u64) -> u32 {
        let idx = self.changes.partition_point(|c| c.tick <= tick);
        if idx == 0 {
            DEFAULT_MPQN
        } else {
            self.changes[idx - 1].micros_per_beat
        }
    }

    /// A forward-only reader for sweeps that query in non-decreasing tick order.
    pub fn cursor(&self) -> TempoCursor<'_> {
        TempoCursor {
            changes: &self.changes,
            next: 0,
            current: DEFAULT_MPQN,
        }
    }

    /// Tempo of the first real change, used for display only.
    pub fn initial_bpm(&self) -> f64 {
        let mpqn = self
            .changes
            .first()
            .map(|c| c.micros_per_beat)
            .unwrap_or(DEFAULT_MPQN);
        MICROSECONDS_PER_MINUTE / mpqn as f64
    }
}

#[derive(Debug, Clone)]
pub struct TempoCursor<'a> {
    changes: &'a [TempoChange],
    next: usize,
    current: u32,
}

impl TempoCursor<'_> {
    /// Same answer as [`TempoMap::rate_at`], amortised O(1) as long as `tick` never goes backwards.
    pub fn rate_at(&mut self, tick: u64) -> u32 {
        while let Some(change) = self.changes.get(self.next)
            && change.tick <= tick
        {
            self.current = change.micros_per_beat;
            self.next += 1;
        }
        self.current
    }
}

/// Converts a tick delta to whole milliseconds. Any positive delta is at least 1ms.
pub fn ticks_to_ms(delta_ticks: u64, ticks_per_beat: u16, micros_per_beat: u32) -> u32 {
    if delta_ticks == 0 {
        return 0;
    }

    let tpb = ticks_per_beat.max(1) as f64;
    let ms = (delta_ticks as f64) * (micros_per_beat as f64) / (tpb * 1000.0);
    (ms.round() as u32).max(1)
}
