use crate::model::score::{MessageKind, Score, Track, TrackMessage};
use anyhow::{Result, anyhow};
use log::debug;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs;
use std::path::Path;

pub fn import_midi_file<P: AsRef<Path>>(path: P) -> Result<Score> {
    let bytes = fs::read(path.as_ref()).map_err(|e| {
        anyhow!(
            "Failed to read MIDI file {}: {}",
            path.as_ref().display(),
            e
        )
    })?;

    midi_bytes_to_score(&bytes)
}

pub fn midi_bytes_to_score(bytes: &[u8]) -> Result<Score> {
    let smf = Smf::parse(bytes).map_err(|e| anyhow!("Failed to parse MIDI: {:?}", e))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(t) => t.as_int(),
        Timing::Timecode(_fps, _subframe) => {
            return Err(anyhow!(
                "SMPTE timecode midi timing is not currently supported..!"
            ));
        }
    };

    debug!("Ticks per quarter note: {}", ticks_per_beat);
    debug!(
        "MIDI format: {:?}, tracks: {}",
        smf.header.format,
        smf.tracks.len()
    );

    let tracks = smf
        .tracks
        .iter()
        .enumerate()
        .map(|(idx, events)| {
            let track = convert_track(events);
            debug!(
                "Track {} '{}': {} message(s)",
                idx,
                track.name.as_deref().unwrap_or("unnamed"),
                track.messages.len()
            );
            track
        })
        .collect();

    Ok(Score {
        ticks_per_beat,
        tracks,
    })
}

fn convert_track(events: &[TrackEvent<'_>]) -> Track {
    let mut name: Option<String> = None;
    let mut messages: Vec<TrackMessage> = Vec::with_capacity(events.len());

    for event in events {
        let delta = event.delta.as_int();

        let (channel, kind) = match &event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(micro)) => (None, MessageKind::Tempo(micro.as_int())),
            TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                if name.is_none() {
                    name = Some(String::from_utf8_lossy(bytes).into_owned());
                }
                (None, MessageKind::Other)
            }
            TrackEventKind::Midi { channel, message } => {
                let kind = match message {
                    MidiMessage::NoteOn { key, vel } => MessageKind::NoteOn {
                        key: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    MidiMessage::NoteOff { key, vel } => MessageKind::NoteOff {
                        key: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    _ => MessageKind::Other,
                };
                (Some(channel.as_int()), kind)
            }
            _ => (None, MessageKind::Other),
        };

        messages.push(TrackMessage {
            delta,
            channel,
            kind,
        });
    }

    Track { name, messages }
}

#[cfg(test)]
mod test {
    use super::*;
    use midly::num::{u4, u7, u15, u24, u28};
    use midly::{Format, Header};

    fn ev(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind,
        }
    }

    fn note_on(delta: u32, channel: u8, key: u8, vel: u8) -> TrackEvent<'static> {
        ev(
            delta,
            TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        )
    }

    fn write_smf(timing: Timing, tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let smf = Smf {
            header: Header::new(Format::Parallel, timing),
            tracks,
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn smf_to_score() {
        env_logger::try_init().unwrap_or(());

        let bytes = write_smf(
            Timing::Metrical(u15::new(192)),
            vec![
                vec![
                    ev(0, TrackEventKind::Meta(MetaMessage::TrackName(b"conductor"))),
                    ev(0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(428_571)))),
                    ev(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
                ],
                vec![
                    note_on(0, 1, 60, 100),
                    note_on(192, 1, 60, 0),
                    ev(
                        0,
                        TrackEventKind::Midi {
                            channel: u4::new(1),
                            message: MidiMessage::NoteOff {
                                key: u7::new(62),
                                vel: u7::new(64),
                            },
                        },
                    ),
                    ev(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
                ],
            ],
        );

        let score = midi_bytes_to_score(&bytes).unwrap();
        assert_eq!(score.ticks_per_beat, 192);
        assert_eq!(score.tracks.len(), 2);
        assert_eq!(score.tracks[0].name.as_deref(), Some("conductor"));
        assert_eq!(score.tracks[0].messages[1].kind, MessageKind::Tempo(428_571));
        assert_eq!(score.tracks[0].messages[1].channel, None);

        let notes = &score.tracks[1].messages;
        assert_eq!(
            notes[0],
            TrackMessage {
                delta: 0,
                channel: Some(1),
                kind: MessageKind::NoteOn {
                    key: 60,
                    velocity: 100
                }
            }
        );
        assert_eq!(notes[1].delta, 192);
        assert_eq!(
            notes[2].kind,
            MessageKind::NoteOff {
                key: 62,
                velocity: 64
            }
        );
    }

    #[test]
    fn smpte_is_rejected() {
        let bytes = write_smf(
            Timing::Timecode(midly::Fps::Fps25, 40),
            vec![vec![ev(0, TrackEventKind::Meta(MetaMessage::EndOfTrack))]],
        );

        assert!(midi_bytes_to_score(&bytes).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(midi_bytes_to_score(b"not a midi file").is_err());
        assert!(import_midi_file("./does/not/exist.mid").is_err());
    }
}
