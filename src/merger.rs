use crate::encoding::{REST, is_audible, pack_arp, pack_drum, pack_tonal, scale_velocity4, velocity_to_4bit};
use crate::model::song::{ArpInterval, Frame, NoteSpan, Step, Timeline, Voice};
use crate::tempo::{TempoMap, ticks_to_ms};
use log::debug;
use std::collections::BTreeSet;

/// Longest run a single step can describe.
pub const MAX_STEP_MS: u32 = u16::MAX as u32;

/// Span lists for all four voices, indexed by [`Voice::index`].
pub type VoiceSpans = [Vec<NoteSpan>; 4];

/// Arpeggio offsets and the tonal voice whose base notes they decorate.
#[derive(Debug, Clone, Copy)]
pub struct ArpLayer<'a> {
    pub voice: Voice,
    pub intervals: &'a [ArpInterval],
}

/// Forward-only lookup into a sorted interval list.
struct Cursor<'a, T> {
    items: &'a [T],
    pos: usize,
}

impl<'a, T> Cursor<'a, T> {
    fn new(items: &'a [T]) -> Self {
        Self { items, pos: 0 }
    }

    /// Skips everything ending at or before `tick` and returns the next item if it covers `tick`.
    fn at(&mut self, tick: u64, bounds: impl Fn(&T) -> (u64, u64)) -> Option<&'a T> {
        while let Some(item) = self.items.get(self.pos)
            && bounds(item).1 <= tick
        {
            self.pos += 1;
        }

        self.items.get(self.pos).filter(|item| {
            let (start, end) = bounds(*item);
            start <= tick && tick < end
        })
    }
}

fn encode(voice: Voice, span: &NoteSpan, scales: &[f32; 3]) -> u16 {
    if !voice.is_tonal() {
        return pack_drum(span.pitch);
    }

    if !is_audible(span.pitch) {
        return REST;
    }

    let vel4 = scale_velocity4(velocity_to_4bit(span.velocity), scales[voice.index()]);
    pack_tonal(span.pitch, vel4)
}

/// Sweeps all voices over the union of their span boundaries and packs each slice.
/// Slices where nothing plays still produce a step, as rests.
pub fn merge(
    voices: &VoiceSpans,
    ticks_per_beat: u16,
    tempo_map: &TempoMap,
    velocity_scales: [f32; 3],
    arp: Option<ArpLayer<'_>>,
) -> Timeline {
    let arp = arp.filter(|layer| !layer.intervals.is_empty());
    if let Some(layer) = &arp {
        debug!(
            "Merging with {} arpeggio interval(s) on the {} voice..!",
            layer.intervals.len(),
            layer.voice
        );
    }

    let mut boundaries: BTreeSet<u64> = voices
        .iter()
        .flatten()
        .flat_map(|s| [s.start, s.end])
        .collect();
    if let Some(layer) = &arp {
        boundaries.extend(layer.intervals.iter().flat_map(|i| [i.start, i.end]));
    }
    let boundaries: Vec<u64> = boundaries.into_iter().collect();

    let mut cursors = voices.each_ref().map(|spans| Cursor::new(spans.as_slice()));
    let mut arp_cursor = Cursor::new(arp.map(|layer| layer.intervals).unwrap_or(&[]));
    let mut tempo = tempo_map.cursor();

    let mut raw: Vec<(Frame, u32)> = Vec::with_capacity(boundaries.len());
    for window in boundaries.windows(2) {
        let (t_start, t_end) = (window[0], window[1]);

        let duration_ms = ticks_to_ms(t_end - t_start, ticks_per_beat, tempo.rate_at(t_start));
        if duration_ms == 0 {
            continue;
        }

        let mut frame = Frame::default();
        for voice in Voice::ALL {
            frame.words[voice.index()] = cursors[voice.index()]
                .at(t_start, |s: &NoteSpan| (s.start, s.end))
                .map(|span| encode(voice, span, &velocity_scales))
                .unwrap_or(REST);
        }
        frame.arp = arp_cursor
            .at(t_start, |i: &ArpInterval| (i.start, i.end))
            .map(|i| pack_arp(i.offset1, i.offset2))
            .unwrap_or(0);

        raw.push((frame, duration_ms));
    }

    let timeline = compress(raw);
    debug!(
        "Merged {} slice(s) into {} step(s)..!",
        boundaries.len().saturating_sub(1),
        timeline.len()
    );
    timeline
}

/// Run-length compresses consecutive identical frames, summing their durations.
/// Runs longer than [`MAX_STEP_MS`] are split, filling each step to the cap first.
pub fn compress<I>(slices: I) -> Timeline
where
    I: IntoIterator<Item = (Frame, u32)>,
{
    let mut steps: Vec<Step> = Vec::new();

    for (frame, mut remaining) in slices {
        if let Some(last) = steps.last_mut()
            && last.frame() == frame
        {
            let room = MAX_STEP_MS - last.duration_ms as u32;
            let take = room.min(remaining);
            last.duration_ms += take as u16;
            remaining -= take;
        }

        while remaining > 0 {
            let take = remaining.min(MAX_STEP_MS);
            steps.push(Step::new(frame, take as u16));
            remaining -= take;
        }
    }

    Timeline::new(steps)
}

/// Re-runs compression over an existing timeline.
pub fn recompress(timeline: &Timeline) -> Timeline {
    compress(
        timeline
            .steps()
            .iter()
            .map(|s| (s.frame(), s.duration_ms as u32)),
    )
}
