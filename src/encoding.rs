//! Bit-packing for the words the VB player consumes.
//!
//! Tonal voices: `(vel4 << 12) | (midi << 4)`, a zero word is a rest.
//! Noise voice: `(tap << 12) | (decay << 10) | freq`, a zero word is silence.
//! Arpeggio: `(offset1 << 4) | offset2`.

/// Packed silence for any voice.
pub const REST: u16 = 0x0000;

/// VSU frequency register values for MIDI notes 0..=127. Zero marks notes the
/// hardware can't reproduce; those are emitted as rests.
pub const MIDI_TO_VB_FREQ: [u16; 128] = [
    // 0..=39: C-1 .. D#2
    0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000,
    0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000,
    0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000,
    0x000, 0x000, 0x000, 0x000,
    // 40..=47: E2 .. B2
    0x02C, 0x09C, 0x106, 0x16B, 0x1C9, 0x223, 0x277, 0x2C6,
    // 48..=55: C3 .. G3
    0x312, 0x356, 0x39B, 0x3DA, 0x416, 0x44E, 0x483, 0x4B5,
    // 56..=63: G#3 .. D#4
    0x4E5, 0x511, 0x53B, 0x563, 0x589, 0x5AC, 0x5CE, 0x5ED,
    // 64..=71: E4 .. B4
    0x60A, 0x627, 0x642, 0x65B, 0x672, 0x689, 0x69E, 0x6B2,
    // 72..=79: C5 .. G5
    0x6C4, 0x6D6, 0x6E7, 0x6F7, 0x706, 0x714, 0x721, 0x72D,
    // 80..=87: G#5 .. D#6
    0x739, 0x744, 0x74F, 0x759, 0x762, 0x76B, 0x773, 0x77B,
    // 88..=95: E6 .. B6
    0x783, 0x78A, 0x790, 0x797, 0x79D, 0x7A2, 0x7A7, 0x7AC,
    // 96..=103: C7 .. G7
    0x7B1, 0x7B6, 0x7BA, 0x7BE, 0x7C1, 0x7C4, 0x7C8, 0x7CB,
    // 104..=111: G#7 .. D#8
    0x7CE, 0x7D1, 0x7D4, 0x7D6, 0x7D9, 0x7DB, 0x7DD, 0x7DF,
    // 112..=127: above the VSU's range
    0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000,
    0x000, 0x000, 0x000, 0x000,
];

pub fn note_to_freq(midi: u8) -> u16 {
    MIDI_TO_VB_FREQ.get(midi as usize).copied().unwrap_or(0)
}

pub fn is_audible(midi: u8) -> bool {
    note_to_freq(midi) != 0
}

/// Maps a MIDI velocity onto the VSU's 4-bit envelope level. Zero stays a rest.
pub const fn velocity_to_4bit(velocity: u8) -> u8 {
    if velocity == 0 {
        return 0;
    }

    let v = (velocity as u32 * 15 + 63) / 127;
    if v < 1 {
        1
    } else if v > 15 {
        15
    } else {
        v as u8
    }
}

/// Applies a per-voice boost to an already-mapped 4-bit level, keeping it audible.
pub fn scale_velocity4(vel4: u8, scale: f32) -> u8 {
    let scaled = (vel4 as f32 * scale).round();
    scaled.clamp(1.0, 15.0) as u8
}

pub const fn pack_tonal(midi: u8, vel4: u8) -> u16 {
    (((vel4 & 0x0F) as u16) << 12) | (((midi & 0x7F) as u16) << 4)
}

/// Returns `(midi, vel4)`.
pub const fn unpack_tonal(word: u16) -> (u8, u8) {
    (((word >> 4) & 0x7F) as u8, ((word >> 12) & 0x0F) as u8)
}

/// Noise channel settings for one percussion instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseVoice {
    /// LFSR feedback tap (0..=7), shorter sequences sound more pitched.
    pub tap: u8,
    /// Envelope speed, 0 = very fast .. 3 = slow.
    pub decay: u8,
    /// 10-bit noise frequency register.
    pub freq: u16,
}

impl NoiseVoice {
    const fn new(tap: u8, decay: u8, freq: u16) -> Self {
        Self { tap, decay, freq }
    }

    pub const fn pack(self) -> u16 {
        (((self.tap & 0x07) as u16) << 12) | (((self.decay & 0x03) as u16) << 10) | (self.freq & 0x3FF)
    }
}

/// Snare-like timbre used for any instrument missing from the GM table.
pub const GM_DRUM_DEFAULT: NoiseVoice = NoiseVoice::new(1, 1, 0x100);

/// Looks up the noise settings for a GM percussion note.
pub const fn gm_drum(instrument: u8) -> Option<NoiseVoice> {
    let voice = match instrument {
        // kicks
        35 => NoiseVoice::new(7, 1, 0x020),
        36 => NoiseVoice::new(7, 1, 0x030),
        // snares & claps
        37 => NoiseVoice::new(2, 0, 0x180),
        38 => NoiseVoice::new(1, 1, 0x100),
        39 => NoiseVoice::new(1, 0, 0x0C0),
        40 => NoiseVoice::new(1, 1, 0x120),
        // toms
        41 => NoiseVoice::new(6, 1, 0x040),
        43 => NoiseVoice::new(6, 1, 0x060),
        45 => NoiseVoice::new(6, 1, 0x080),
        47 => NoiseVoice::new(7, 1, 0x060),
        48 => NoiseVoice::new(7, 1, 0x080),
        50 => NoiseVoice::new(7, 1, 0x0A0),
        // hi-hats
        42 | 44 => NoiseVoice::new(0, 0, 0x300),
        46 => NoiseVoice::new(0, 2, 0x300),
        // cymbals
        49 => NoiseVoice::new(0, 3, 0x380),
        51 => NoiseVoice::new(0, 2, 0x340),
        52 => NoiseVoice::new(0, 3, 0x3A0),
        55 => NoiseVoice::new(0, 2, 0x360),
        57 => NoiseVoice::new(0, 3, 0x390),
        59 => NoiseVoice::new(0, 2, 0x350),
        // misc percussion
        53 => NoiseVoice::new(0, 1, 0x320),
        54 => NoiseVoice::new(2, 0, 0x200),
        56 => NoiseVoice::new(3, 0, 0x180),
        _ => return None,
    };
    Some(voice)
}

pub const fn pack_drum(instrument: u8) -> u16 {
    match gm_drum(instrument) {
        Some(voice) => voice.pack(),
        None => GM_DRUM_DEFAULT.pack(),
    }
}

/// Rank used when several hits land on the same tick; lower wins.
pub const HIHAT_PRIORITY: u8 = 6;

pub const fn drum_priority(instrument: u8) -> u8 {
    match instrument {
        35 | 36 => 1,
        37..=40 => 2,
        41 | 43 | 45 | 47 | 48 | 50 => 3,
        53 | 54 | 56 => 4,
        49 | 51 | 52 | 55 | 57 | 59 => 5,
        42 | 44 | 46 => HIHAT_PRIORITY,
        _ => HIHAT_PRIORITY,
    }
}

pub const fn pack_arp(offset1: u8, offset2: u8) -> u8 {
    ((offset1 & 0x0F) << 4) | (offset2 & 0x0F)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tonal_pack_roundtrip() {
        for midi in 0..=127u8 {
            for vel4 in 0..=15u8 {
                assert_eq!(unpack_tonal(pack_tonal(midi, vel4)), (midi, vel4));
            }
        }
    }

    #[test]
    fn tonal_layout_leaves_unused_bits_clear() {
        let word = pack_tonal(127, 15);
        assert_eq!(word & 0x080F, 0);
        assert_eq!(pack_tonal(60, 12), (12 << 12) | (60 << 4));
    }

    #[test]
    fn velocity_mapping() {
        assert_eq!(velocity_to_4bit(0), 0);
        assert_eq!(velocity_to_4bit(1), 1);
        assert_eq!(velocity_to_4bit(100), 12);
        assert_eq!(velocity_to_4bit(127), 15);
        assert!((1..=127u8).all(|v| (1..=15).contains(&velocity_to_4bit(v))));
    }

    #[test]
    fn velocity_scaling_clamps() {
        assert_eq!(scale_velocity4(12, 1.0), 12);
        assert_eq!(scale_velocity4(6, 1.8), 11);
        assert_eq!(scale_velocity4(12, 2.0), 15);
        assert_eq!(scale_velocity4(1, 0.1), 1);
    }

    #[test]
    fn drum_words() {
        assert_eq!(pack_drum(36), (7 << 12) | (1 << 10) | 0x030);
        assert_eq!(pack_drum(42), 0x0300);
        assert_eq!(pack_drum(49), (3 << 10) | 0x380);
        // unmapped falls back to the snare-like timbre
        assert_eq!(pack_drum(81), pack_drum(38));
        assert_ne!(pack_drum(81), REST);
    }

    #[test]
    fn drum_priority_buckets() {
        assert_eq!(drum_priority(36), 1);
        assert_eq!(drum_priority(38), 2);
        assert_eq!(drum_priority(45), 3);
        assert_eq!(drum_priority(56), 4);
        assert_eq!(drum_priority(57), 5);
        assert_eq!(drum_priority(42), 6);
        assert_eq!(drum_priority(81), HIHAT_PRIORITY);
    }

    #[test]
    fn audible_range() {
        assert!(!is_audible(39));
        assert!(is_audible(40));
        assert!(is_audible(111));
        assert!(!is_audible(112));
        assert_eq!(note_to_freq(60), 0x589);
    }

    #[test]
    fn arp_byte() {
        assert_eq!(pack_arp(4, 7), 0x47);
        assert_eq!(pack_arp(4, 0), 0x40);
        assert_eq!(pack_arp(0, 0), 0);
    }
}
