use crate::model::score::{DRUM_CHANNEL, MessageKind, Score};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

/// Channels assigned to each tonal voice by [`detect_channels`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedChannels {
    pub melody: BTreeSet<u8>,
    pub bass: BTreeSet<u8>,
    pub chords: BTreeSet<u8>,
}

/// Mean pitch of every non-percussion channel that plays at least one note, lowest first.
/// Equal averages keep ascending channel order.
pub fn rank_channels_by_pitch(score: &Score) -> Vec<(u8, f64, usize)> {
    let mut pitches: BTreeMap<u8, (u64, usize)> = BTreeMap::new();

    for track in &score.tracks {
        for (_, msg) in track.absolute() {
            let Some(ch) = msg.channel else {
                continue;
            };
            if ch == DRUM_CHANNEL {
                continue;
            }
            if let MessageKind::NoteOn { key, velocity } = msg.kind
                && velocity > 0
            {
                let entry = pitches.entry(ch).or_default();
                entry.0 += key as u64;
                entry.1 += 1;
            }
        }
    }

    let mut ranked: Vec<(u8, f64, usize)> = pitches
        .into_iter()
        .map(|(ch, (sum, count))| (ch, sum as f64 / count as f64, count))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

/// Lowest channel becomes bass, highest melody, anything in between chords.
/// A lone channel is melody; two channels split into melody and bass.
pub fn detect_channels(score: &Score) -> DetectedChannels {
    let ranked = rank_channels_by_pitch(score);

    for (ch, avg, count) in &ranked {
        debug!("Channel {} avg pitch {:.1} over {} note(s)", ch, avg, count);
    }

    let detected = match ranked.as_slice() {
        [] => DetectedChannels::default(),
        [(only, ..)] => DetectedChannels {
            melody: [*only].into(),
            ..Default::default()
        },
        [(low, ..), (high, ..)] => DetectedChannels {
            melody: [*high].into(),
            bass: [*low].into(),
            chords: BTreeSet::new(),
        },
        [(low, ..), middle @ .., (high, ..)] => DetectedChannels {
            melody: [*high].into(),
            bass: [*low].into(),
            chords: middle.iter().map(|(ch, ..)| *ch).collect(),
        },
    };

    info!(
        "Auto-assigned channels: melody={:?} bass={:?} chords={:?}",
        detected.melody, detected.bass, detected.chords
    );
    detected
}
