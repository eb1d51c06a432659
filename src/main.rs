use VB_TRACKS::{Args, Manifest, Song, Voice, convert_song, format_duration, unpack_tonal, write_header};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

fn preview(song: &Song, max: usize) {
    info!(
        "Previewing at most {} of {} steps for '{}'..!",
        max,
        song.timeline.len(),
        song.metadata.prefix
    );

    let mut elapsed: u64 = 0;
    for (i, step) in song.timeline.steps().iter().enumerate() {
        if i >= max {
            break;
        }

        let tonal: Vec<String> = Voice::TONAL
            .iter()
            .map(|&voice| match unpack_tonal(step.word(voice)) {
                (_, 0) => "---".to_string(),
                (midi, vel4) => format!("{}@{}", midi, vel4),
            })
            .collect();

        info!(
            "Step {}: t={} dur_ms={} tonal=[{}] drums=0x{:04X} arp=0x{:02X}",
            i,
            format_duration(elapsed),
            step.duration_ms,
            tonal.join(" "),
            step.drums,
            step.arp
        );
        elapsed += step.duration_ms as u64;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    info!("Loading manifest: '{}'...", args.manifest.display());
    let manifest = Manifest::load(&args.manifest)?;
    let base_dir = args
        .manifest
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let output_dir = args.output_dir.clone().unwrap_or_else(|| base_dir.clone());

    if !args.dry_run {
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    }

    let mut written = 0;
    for config in &manifest.songs {
        if !args.songs.is_empty() && !args.songs.contains(&config.prefix) {
            debug!("Skipping '{}' (not selected)", config.prefix);
            continue;
        }

        let Some(song) = convert_song(config, &base_dir)? else {
            continue;
        };

        if args.dry_run {
            preview(&song, args.dry_run_max);
            continue;
        }

        write_header(&song, output_dir.join(config.header_name()))?;
        written += 1;
    }

    if written == 0 && !args.dry_run {
        warn!("No headers were written..!");
    }

    info!("Done..!");
    Ok(())
}
