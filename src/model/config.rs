use crate::spans::DEFAULT_DRUM_TAIL_TICKS;
use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "VB_TRACKS",
    about = "Compile MIDI songs into 4-voice Virtual Boy music headers!"
)]
pub struct Args {
    /// Path to the JSON song manifest.
    pub manifest: PathBuf,

    /// Directory to write the generated headers into. Defaults to the manifest's directory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Only convert songs with this prefix. May be given more than once.
    #[arg(short, long = "song")]
    pub songs: Vec<String>,

    /// Dry run (print the first dry_run_max steps of each song instead of writing headers).
    #[arg(short, long, default_value_t = false)]
    pub dry_run: bool,

    /// Maximum steps to print per song in dry run.
    #[arg(long, default_value_t = 40)]
    pub dry_run_max: usize,

    /// Prints extra information to the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Where one voice (or one arpeggio member) takes its notes from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrackSelection {
    /// Track index, or every track when absent.
    #[serde(default)]
    pub track: Option<usize>,
    pub channels: BTreeSet<u8>,
    /// Semitones, applied before clamping to the MIDI range.
    #[serde(default)]
    pub transpose: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum VoiceSource {
    /// 2-3 tracks folded into one voice with tracker arpeggios.
    Arpeggio { arpeggio: Vec<TrackSelection> },
    Single(TrackSelection),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoiceLayout {
    pub melody: VoiceSource,
    pub bass: VoiceSource,
    pub chords: VoiceSource,
}

impl VoiceLayout {
    pub fn sources(&self) -> [&VoiceSource; 3] {
        [&self.melody, &self.bass, &self.chords]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DrumSource {
    /// Every track's channel 9, no priority filtering.
    #[default]
    Auto,
    None,
    Track {
        #[serde(default)]
        track: Option<usize>,
        #[serde(default)]
        priority: bool,
    },
}

const fn default_scales() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

const fn default_max_seconds() -> u32 {
    120
}

const fn default_tail_ticks() -> u64 {
    DEFAULT_DRUM_TAIL_TICKS
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SongConfig {
    /// MIDI file, relative to the manifest.
    pub midi: PathBuf,
    /// C identifier prefix for the emitted arrays.
    pub prefix: String,
    /// Header file name; `<prefix>.h` when absent.
    #[serde(default)]
    pub header: Option<String>,
    /// Explicit voice assignment. Absent means detect channels by pitch.
    #[serde(default)]
    pub voices: Option<VoiceLayout>,
    #[serde(default)]
    pub drums: DrumSource,
    #[serde(default = "default_scales")]
    pub velocity_scales: [f32; 3],
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u32,
    #[serde(default = "default_tail_ticks")]
    pub drum_tail_ticks: u64,
}

impl SongConfig {
    pub fn header_name(&self) -> String {
        self.header
            .clone()
            .unwrap_or_else(|| format!("{}.h", self.prefix))
    }

    pub fn max_ms(&self) -> u64 {
        self.max_seconds as u64 * 1000
    }

    pub fn validate(&self) -> Result<()> {
        let valid_ident = !self.prefix.is_empty()
            && !self.prefix.starts_with(|c: char| c.is_ascii_digit())
            && self
                .prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_ident {
            bail!("Prefix '{}' is not a valid C identifier..!", self.prefix);
        }

        if let Some((i, scale)) = self
            .velocity_scales
            .iter()
            .enumerate()
            .find(|(_, s)| !s.is_finite() || **s <= 0.0)
        {
            bail!(
                "Velocity scale {} for voice {} must be positive..!",
                scale,
                i
            );
        }

        if let Some(layout) = &self.voices {
            let mut arp_voices = 0;
            for source in layout.sources() {
                if let VoiceSource::Arpeggio { arpeggio } = source {
                    arp_voices += 1;
                    if arpeggio.len() < 2 {
                        bail!(
                            "Song '{}': an arpeggio voice needs at least two tracks..!",
                            self.prefix
                        );
                    }
                }
            }
            if arp_voices > 1 {
                bail!(
                    "Song '{}': only one voice can use arpeggios..!",
                    self.prefix
                );
            }
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Manifest {
    pub songs: Vec<SongConfig>,
}

impl Manifest {
    pub fn parse(json: &str) -> Result<Self> {
        let manifest: Manifest =
            serde_json::from_str(json).map_err(|e| anyhow!("Failed to parse manifest: {}", e))?;
        for song in &manifest.songs {
            song.validate()?;
        }
        Ok(manifest)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read manifest {}", path.as_ref().display()))?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_in() {
        let manifest = Manifest::parse(r#"{ "songs": [ { "midi": "e1m2.mid", "prefix": "music_e1m2" } ] }"#)
            .unwrap();
        let song = &manifest.songs[0];

        assert_eq!(song.header_name(), "music_e1m2.h");
        assert_eq!(song.voices, None);
        assert_eq!(song.drums, DrumSource::Auto);
        assert_eq!(song.velocity_scales, [1.0, 1.0, 1.0]);
        assert_eq!(song.max_ms(), 120_000);
        assert_eq!(song.drum_tail_ticks, 120);
    }

    #[test]
    fn explicit_layout_with_arpeggio() {
        let json = r#"{
            "songs": [{
                "midi": "e1m1.mid",
                "prefix": "music_e1m1",
                "voices": {
                    "melody": { "arpeggio": [
                        { "track": 3, "channels": [2] },
                        { "track": 4, "channels": [3] },
                        { "track": 5, "channels": [4] }
                    ] },
                    "bass": { "track": 1, "channels": [0], "transpose": 24 },
                    "chords": { "track": 8, "channels": [7] }
                },
                "drums": { "mode": "track", "track": 9, "priority": true },
                "velocity_scales": [1.0, 1.0, 1.8],
                "max_seconds": 180
            }]
        }"#;

        let song = Manifest::parse(json).unwrap().songs.remove(0);
        let layout = song.voices.unwrap();

        match &layout.melody {
            VoiceSource::Arpeggio { arpeggio } => assert_eq!(arpeggio.len(), 3),
            other => panic!("expected arpeggio, got {:?}", other),
        }
        assert_eq!(
            layout.bass,
            VoiceSource::Single(TrackSelection {
                track: Some(1),
                channels: [0].into(),
                transpose: 24
            })
        );
        assert_eq!(
            song.drums,
            DrumSource::Track {
                track: Some(9),
                priority: true
            }
        );
    }

    #[test]
    fn demo_manifest_parses() {
        let manifest = Manifest::parse(include_str!("../../demos/songs.json")).unwrap();
        let prefixes: Vec<&str> = manifest.songs.iter().map(|s| s.prefix.as_str()).collect();

        assert_eq!(prefixes, ["music_title", "music_e1m1", "music_e1m2", "music_e1m3"]);

        let e1m3 = manifest.songs[3].voices.as_ref().unwrap();
        assert_eq!(
            e1m3.melody,
            VoiceSource::Single(TrackSelection {
                track: Some(2),
                channels: [1].into(),
                transpose: 0
            })
        );
    }

    #[test]
    fn rejects_two_arpeggio_voices() {
        let json = r#"{
            "songs": [{
                "midi": "x.mid",
                "prefix": "x",
                "voices": {
                    "melody": { "arpeggio": [ { "channels": [1] }, { "channels": [2] } ] },
                    "bass": { "channels": [3] },
                    "chords": { "arpeggio": [ { "channels": [4] }, { "channels": [5] } ] }
                }
            }]
        }"#;

        assert!(Manifest::parse(json).is_err());
    }

    #[test]
    fn rejects_bad_prefix_and_scale() {
        assert!(Manifest::parse(r#"{ "songs": [ { "midi": "a.mid", "prefix": "1abc" } ] }"#).is_err());
        assert!(
            Manifest::parse(
                r#"{ "songs": [ { "midi": "a.mid", "prefix": "a", "velocity_scales": [1.0, 0.0, 1.0] } ] }"#
            )
            .is_err()
        );
    }

    #[test]
    fn drums_none() {
        let song = Manifest::parse(r#"{ "songs": [ { "midi": "a.mid", "prefix": "a", "drums": { "mode": "none" } } ] }"#)
            .unwrap()
            .songs
            .remove(0);
        assert_eq!(song.drums, DrumSource::None);
    }
}
