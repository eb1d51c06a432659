use crate::encoding::drum_priority;
use crate::model::score::{DRUM_CHANNEL, MessageKind, Score};
use crate::model::song::NoteSpan;
use crate::util::transpose_pitch;
use log::debug;
use std::collections::BTreeSet;

/// Fallback length of the final drum hit, roughly one beat at 120bpm with 480 ticks/beat.
pub const DEFAULT_DRUM_TAIL_TICKS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    // `Off` sorts first so a note ending on the same tick another starts doesn't overlap it.
    NoteOff,
    NoteOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub tick: u64,
    pub kind: EventKind,
    pub pitch: u8,
    pub velocity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumOptions {
    /// Keep only the highest-priority instrument when hits share a tick.
    pub priority: bool,
    pub tail_ticks: u64,
}

impl Default for DrumOptions {
    fn default() -> Self {
        Self {
            priority: false,
            tail_ticks: DEFAULT_DRUM_TAIL_TICKS,
        }
    }
}

/// Gathers note events from the selected track(s) on the given channels, in tick order.
/// NoteOn with velocity 0 is treated as NoteOff.
pub fn collect_events(
    score: &Score,
    track: Option<usize>,
    channels: &BTreeSet<u8>,
    transpose: i32,
) -> Vec<Event> {
    let mut events: Vec<Event> = Vec::new();

    for t in score.select(track) {
        for (tick, msg) in t.absolute() {
            let Some(ch) = msg.channel else {
                continue;
            };
            if !channels.contains(&ch) {
                continue;
            }

            match msg.kind {
                MessageKind::NoteOn { key, velocity } if velocity > 0 => events.push(Event {
                    tick,
                    kind: EventKind::NoteOn,
                    pitch: transpose_pitch(key, transpose),
                    velocity,
                }),
                MessageKind::NoteOn { key, .. } | MessageKind::NoteOff { key, .. } => {
                    events.push(Event {
                        tick,
                        kind: EventKind::NoteOff,
                        pitch: transpose_pitch(key, transpose),
                        velocity: 0,
                    })
                }
                _ => {}
            }
        }
    }

    events.sort_by_key(|e| (e.tick, e.kind));
    events
}

/// Reduces a sorted event stream to non-overlapping spans. A NoteOn always cuts whatever
/// is sounding; a NoteOff only ends the note if it matches the sounding pitch.
pub fn events_to_spans(events: &[Event]) -> Vec<NoteSpan> {
    let mut spans: Vec<NoteSpan> = Vec::new();
    let mut open: Option<(u64, u8, u8)> = None;

    for ev in events {
        match ev.kind {
            EventKind::NoteOn => {
                if let Some((start, pitch, velocity)) = open
                    && ev.tick > start
                {
                    spans.push(NoteSpan {
                        start,
                        end: ev.tick,
                        pitch,
                        velocity,
                    });
                }
                open = Some((ev.tick, ev.pitch, ev.velocity));
            }
            EventKind::NoteOff => {
                if let Some((start, pitch, velocity)) = open
                    && pitch == ev.pitch
                {
                    if ev.tick > start {
                        spans.push(NoteSpan {
                            start,
                            end: ev.tick,
                            pitch,
                            velocity,
                        });
                    }
                    open = None;
                }
            }
        }
    }

    if let Some((start, pitch, _)) = open {
        debug!(
            "Dropping unterminated note {} starting at tick {}..!",
            pitch, start
        );
    }

    spans
}

/// Monophonic spans for one tonal voice.
pub fn extract_spans(
    score: &Score,
    track: Option<usize>,
    channels: &BTreeSet<u8>,
    transpose: i32,
) -> Vec<NoteSpan> {
    events_to_spans(&collect_events(score, track, channels, transpose))
}

/// A single percussion strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumHit {
    pub tick: u64,
    pub instrument: u8,
    pub velocity: u8,
}

pub fn collect_drum_hits(score: &Score, track: Option<usize>) -> Vec<DrumHit> {
    let mut hits: Vec<DrumHit> = Vec::new();

    for t in score.select(track) {
        for (tick, msg) in t.absolute() {
            if msg.channel != Some(DRUM_CHANNEL) {
                continue;
            }
            if let MessageKind::NoteOn { key, velocity } = msg.kind
                && velocity > 0
            {
                hits.push(DrumHit {
                    tick,
                    instrument: key,
                    velocity,
                });
            }
        }
    }

    // stable, so hits on one tick keep their track/file order
    hits.sort_by_key(|h| h.tick);
    hits
}

/// Collapses each group of same-tick hits to the most important one.
/// Equal ranks go to the lowest instrument number, then to the first encountered.
pub fn filter_by_priority(hits: &[DrumHit]) -> Vec<DrumHit> {
    hits.chunk_by(|a, b| a.tick == b.tick)
        .filter_map(|group| {
            group
                .iter()
                .min_by_key(|h| (drum_priority(h.instrument), h.instrument))
                .copied()
        })
        .collect()
}

/// Each hit rings until the next one starts, the last one for `tail_ticks`.
pub fn hits_to_spans(hits: &[DrumHit], tail_ticks: u64) -> Vec<NoteSpan> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let end = match hits.get(i + 1) {
                Some(next) if next.tick == hit.tick => hit.tick + 1,
                Some(next) => next.tick,
                None => hit.tick.saturating_add(tail_ticks.max(1)),
            };
            NoteSpan {
                start: hit.tick,
                end,
                pitch: hit.instrument,
                velocity: hit.velocity,
            }
        })
        .collect()
}

/// Percussion spans from the GM drum channel.
pub fn extract_drum_spans(score: &Score, track: Option<usize>, options: DrumOptions) -> Vec<NoteSpan> {
    let mut hits = collect_drum_hits(score, track);

    if options.priority {
        let before = hits.len();
        hits = filter_by_priority(&hits);
        if hits.len() < before {
            debug!(
                "Priority filtering dropped {} simultaneous drum hit(s)..!",
                before - hits.len()
            );
        }
    }

    hits_to_spans(&hits, options.tail_ticks)
}
