use crate::model::config::TrackSelection;
use crate::model::score::Score;
use crate::model::song::{ArpInterval, NoteSpan};
use crate::spans::extract_spans;
use log::{debug, warn};
use std::collections::BTreeSet;

/// Largest semitone offset the arp byte can hold per nibble.
pub const MAX_ARP_OFFSET: u8 = 15;

/// Output of [`build_arpeggio_merge`]: the lowest sounding note per slice plus the
/// tracker-style offsets for the 2nd and 3rd notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArpeggioMerge {
    pub base: Vec<NoteSpan>,
    pub intervals: Vec<ArpInterval>,
}

/// Folds several monophonic tracks into one voice. Time is not subdivided; the player
/// cycles through the offsets at runtime.
pub fn build_arpeggio_merge(score: &Score, selections: &[TrackSelection]) -> ArpeggioMerge {
    if selections.len() > 3 {
        warn!(
            "Arpeggio group has {} tracks but only the lowest three notes can be voiced..!",
            selections.len()
        );
    }

    let per_track: Vec<Vec<NoteSpan>> = selections
        .iter()
        .map(|sel| extract_spans(score, sel.track, &sel.channels, sel.transpose))
        .collect();

    merge_span_lists(&per_track)
}

pub fn merge_span_lists(per_track: &[Vec<NoteSpan>]) -> ArpeggioMerge {
    let boundaries: BTreeSet<u64> = per_track
        .iter()
        .flatten()
        .flat_map(|s| [s.start, s.end])
        .collect();
    let boundaries: Vec<u64> = boundaries.into_iter().collect();

    let mut merged = ArpeggioMerge::default();
    let mut cursors = vec![0usize; per_track.len()];
    let mut active: Vec<(u8, u8)> = Vec::with_capacity(per_track.len());

    for window in boundaries.windows(2) {
        let (t_start, t_end) = (window[0], window[1]);

        active.clear();
        for (spans, cursor) in per_track.iter().zip(cursors.iter_mut()) {
            while *cursor < spans.len() && spans[*cursor].end <= t_start {
                *cursor += 1;
            }
            if let Some(span) = spans.get(*cursor)
                && span.covers(t_start)
            {
                active.push((span.pitch, span.velocity));
            }
        }

        if active.is_empty() {
            continue;
        }

        active.sort_by_key(|(pitch, _)| *pitch);
        let (base_pitch, base_velocity) = active[0];

        merged.base.push(NoteSpan {
            start: t_start,
            end: t_end,
            pitch: base_pitch,
            velocity: base_velocity,
        });

        let offset = |idx: usize| {
            active
                .get(idx)
                .map(|(pitch, _)| (pitch - base_pitch).min(MAX_ARP_OFFSET))
                .unwrap_or(0)
        };
        let (offset1, offset2) = (offset(1), offset(2));

        if offset1 > 0 || offset2 > 0 {
            merged.intervals.push(ArpInterval {
                start: t_start,
                end: t_end,
                offset1,
                offset2,
            });
        }
    }

    debug!(
        "Arpeggio merge: {} base span(s), {} arp interval(s)..!",
        merged.base.len(),
        merged.intervals.len()
    );

    merged
}
