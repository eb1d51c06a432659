use crate::model::song::{Song, Voice};
use anyhow::{Result, anyhow};
use log::info;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

const WORDS_PER_LINE: usize = 12;
const ARP_PER_LINE: usize = 16;

fn write_array<T>(
    out: &mut String,
    c_type: &str,
    name: &str,
    values: &[T],
    per_line: usize,
    fmt_value: impl Fn(&T) -> String,
) -> fmt::Result {
    writeln!(out, "static const {} {}[{}] = {{", c_type, name, values.len())?;
    let lines: Vec<String> = values
        .chunks(per_line)
        .map(|chunk| {
            let cells: Vec<String> = chunk.iter().map(&fmt_value).collect();
            format!("\t{}", cells.join(","))
        })
        .collect();
    writeln!(out, "{}", lines.join(",\n"))?;
    writeln!(out, "}};\n")
}

/// Renders the C header consumed by the VB player. All arrays share `<PREFIX>_NOTE_COUNT` entries;
/// the arp array is only emitted when at least one step uses it.
pub fn render_header(song: &Song, file_name: &str) -> Result<String> {
    let prefix = &song.metadata.prefix;
    let upper = prefix.to_uppercase();
    let timeline = &song.timeline;
    let n = timeline.len();
    let has_arp = timeline.has_arp();

    let mut out = String::new();
    let render = |out: &mut String| -> fmt::Result {
        writeln!(out, "/* {} -- auto-generated by VB_TRACKS */", file_name)?;
        writeln!(out, "#ifndef __{}_H__", upper)?;
        writeln!(out, "#define __{}_H__\n", upper)?;
        writeln!(out, "#define {}_NOTE_COUNT  {}", upper, n)?;
        writeln!(out, "#define {}_HAS_ARP     {}\n", upper, has_arp as u8)?;

        for voice in Voice::ALL {
            write_array(
                out,
                "int",
                &format!("{}_{}", prefix, voice.name()),
                &timeline.words(voice),
                WORDS_PER_LINE,
                |w| format!("0x{:04X}", w),
            )?;
        }

        write_array(
            out,
            "unsigned short",
            &format!("{}_timing", prefix),
            &timeline.timing(),
            WORDS_PER_LINE,
            |ms| format!("{:5}", ms),
        )?;

        if has_arp {
            write_array(
                out,
                "unsigned char",
                &format!("{}_arp", prefix),
                &timeline.arp(),
                ARP_PER_LINE,
                |b| format!("0x{:02X}", b),
            )?;
        }

        writeln!(out, "#endif")
    };

    render(&mut out).map_err(|e| anyhow!("Failed to render header for {}: {}", prefix, e))?;
    Ok(out)
}

pub fn write_header<P: AsRef<Path>>(song: &Song, path: P) -> Result<()> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("music.h");

    let text = render_header(song, file_name)?;
    fs::write(path, text).map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;

    let n = song.timeline.len();
    let data_bytes = n * 4 * 4 + n * 2 + if song.timeline.has_arp() { n } else { 0 };
    info!(
        "Written: {} ({} steps, {} bytes data)",
        path.display(),
        n,
        data_bytes
    );

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::song::{Frame, Metadata, Step, Timeline};

    fn song(steps: Vec<Step>) -> Song {
        Song {
            metadata: Metadata {
                title: None,
                prefix: "music_test".into(),
                tempo_bpm: None,
            },
            timeline: Timeline::new(steps),
        }
    }

    fn step(melody: u16, duration_ms: u16, arp: u8) -> Step {
        Step::new(
            Frame {
                words: [melody, 0, 0, 0x7430],
                arp,
            },
            duration_ms,
        )
    }

    #[test]
    fn header_layout() {
        let text = render_header(&song(vec![step(0xC3C0, 500, 0), step(0, 250, 0)]), "music_test.h").unwrap();

        let expected = "\
/* music_test.h -- auto-generated by VB_TRACKS */
#ifndef __MUSIC_TEST_H__
#define __MUSIC_TEST_H__

#define MUSIC_TEST_NOTE_COUNT  2
#define MUSIC_TEST_HAS_ARP     0

static const int music_test_melody[2] = {
\t0xC3C0,0x0000
};

static const int music_test_bass[2] = {
\t0x0000,0x0000
};

static const int music_test_chords[2] = {
\t0x0000,0x0000
};

static const int music_test_drums[2] = {
\t0x7430,0x7430
};

static const unsigned short music_test_timing[2] = {
\t  500,  250
};

#endif
";
        assert_eq!(text, expected);
    }

    #[test]
    fn arrays_wrap_and_arp_is_emitted() {
        let steps: Vec<Step> = (0..13u16).map(|i| step(i, 10, if i == 3 { 0x47 } else { 0 })).collect();
        let text = render_header(&song(steps), "x.h").unwrap();

        assert!(text.contains("#define MUSIC_TEST_HAS_ARP     1"));
        assert!(text.contains("static const unsigned char music_test_arp[13] = {"));
        assert!(text.contains("\t0x0000,0x0001,0x0002,0x0003,0x0004,0x0005,0x0006,0x0007,0x0008,0x0009,0x000A,0x000B,\n\t0x000C\n};"));
        assert!(text.contains("0x00,0x00,0x00,0x47,"));
    }

    #[test]
    fn write_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("music_test.h");

        write_header(&song(vec![step(0xC3C0, 500, 0)]), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();

        assert!(text.starts_with("/* music_test.h -- auto-generated by VB_TRACKS */"));
        assert!(text.trim_end().ends_with("#endif"));
    }
}
