use crate::arpeggio::build_arpeggio_merge;
use crate::detect::detect_channels;
use crate::merger::{ArpLayer, VoiceSpans, merge};
use crate::midi_importer::import_midi_file;
use crate::model::config::{DrumSource, SongConfig, VoiceSource};
use crate::model::score::Score;
use crate::model::song::{ArpInterval, Metadata, NoteSpan, Song, Voice};
use crate::spans::{DrumOptions, extract_drum_spans, extract_spans};
use crate::tempo::TempoMap;
use crate::util::format_duration;
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;

/// Loads and converts one song. Returns `Ok(None)` when the MIDI file is missing or
/// nothing could be extracted, so a batch can carry on with the next song.
pub fn convert_song(config: &SongConfig, base_dir: &Path) -> Result<Option<Song>> {
    let midi_path = base_dir.join(&config.midi);
    if !midi_path.is_file() {
        warn!("{} not found, skipping..!", midi_path.display());
        return Ok(None);
    }

    info!("Converting '{}'...", midi_path.display());
    let score = import_midi_file(&midi_path)
        .with_context(|| format!("Failed to import {}", midi_path.display()))?;

    let title = config
        .midi
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string());

    Ok(convert_score(&score, config, title))
}

/// Runs the full pipeline over an already-loaded score.
pub fn convert_score(score: &Score, config: &SongConfig, title: Option<String>) -> Option<Song> {
    let tempo_map = TempoMap::build(score);
    info!(
        "{} track(s), {} ticks/beat, {:.1}bpm",
        score.tracks.len(),
        score.ticks_per_beat,
        tempo_map.initial_bpm()
    );

    let mut voices: VoiceSpans = Default::default();
    let mut arp: Option<(Voice, Vec<ArpInterval>)> = None;

    match &config.voices {
        Some(layout) => {
            for (voice, source) in Voice::TONAL.into_iter().zip(layout.sources()) {
                let spans = match source {
                    VoiceSource::Single(sel) => {
                        extract_spans(score, sel.track, &sel.channels, sel.transpose)
                    }
                    VoiceSource::Arpeggio { arpeggio } => {
                        let merged = build_arpeggio_merge(score, arpeggio);
                        info!(
                            "{}: arpeggio over {} track(s), {} arp interval(s)",
                            voice,
                            arpeggio.len(),
                            merged.intervals.len()
                        );
                        arp = Some((voice, merged.intervals));
                        merged.base
                    }
                };
                voices[voice.index()] = spans;
            }
        }
        None => {
            let detected = detect_channels(score);
            for (voice, channels) in Voice::TONAL
                .into_iter()
                .zip([&detected.melody, &detected.bass, &detected.chords])
            {
                if !channels.is_empty() {
                    voices[voice.index()] = extract_spans(score, None, channels, 0);
                }
            }
        }
    }

    voices[Voice::Drums.index()] = drum_spans(score, config);

    for voice in Voice::ALL {
        info!("{}: {} span(s)", voice, voices[voice.index()].len());
    }

    let layer = arp.as_ref().map(|(voice, intervals)| ArpLayer {
        voice: *voice,
        intervals,
    });
    let timeline = merge(
        &voices,
        score.ticks_per_beat,
        &tempo_map,
        config.velocity_scales,
        layer,
    );

    let total_ms = timeline.total_ms();
    info!(
        "Merged: {} step(s), {} total",
        timeline.len(),
        format_duration(total_ms)
    );

    let max_ms = config.max_ms();
    let timeline = if total_ms > max_ms {
        let cut = timeline.truncate(max_ms);
        info!(
            "Truncated to {} ({} step(s))",
            format_duration(cut.total_ms()),
            cut.len()
        );
        cut
    } else {
        timeline
    };

    if timeline.is_empty() {
        warn!("No data extracted for '{}', skipping..!", config.prefix);
        return None;
    }

    Some(Song {
        metadata: Metadata {
            title,
            prefix: config.prefix.clone(),
            tempo_bpm: Some(tempo_map.initial_bpm()),
        },
        timeline,
    })
}

fn drum_spans(score: &Score, config: &SongConfig) -> Vec<NoteSpan> {
    let (track, priority) = match config.drums {
        DrumSource::None => return Vec::new(),
        DrumSource::Auto => (None, false),
        DrumSource::Track { track, priority } => (track, priority),
    };

    extract_drum_spans(
        score,
        track,
        DrumOptions {
            priority,
            tail_ticks: config.drum_tail_ticks,
        },
    )
}
