//! Rhyme Board entry point
//!
//! Headless practice driver: simulates a session for a number of beats and
//! logs the board as rows rotate in.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;
    use std::sync::Arc;

    use clap::Parser;

    use rhyme_board::progress::JsonProgressFile;
    use rhyme_board::songs::builtin_songs;
    use rhyme_board::{
        RhymeCatalog, RhymeError, SchemePattern, SessionController, SessionEvent,
        SessionSettings, Song,
    };

    /// Beat-synchronized rhyme board, run headless.
    #[derive(Parser, Debug)]
    #[command(version, about, long_about = None)]
    pub struct Cli {
        /// Settings JSON file (defaults when missing)
        #[arg(short, long)]
        pub config: Option<PathBuf>,

        /// Progress JSON file for family play counts
        #[arg(long)]
        pub progress: Option<PathBuf>,

        /// Alternative catalog JSON file
        #[arg(long)]
        pub catalog: Option<PathBuf>,

        /// Built-in song id (e.g. "bop_squad")
        #[arg(long, conflicts_with = "song_file")]
        pub song: Option<String>,

        /// Song filename carrying "(BPM - MM;SS.s - MM;SS.s)" metadata
        #[arg(long)]
        pub song_file: Option<String>,

        /// Tempo when no song is selected
        #[arg(long)]
        pub bpm: Option<f64>,

        /// Number of beats to simulate
        #[arg(short, long, default_value_t = 32)]
        pub beats: usize,

        /// Rhyme scheme: AABB, AAAA, ABAB, AXBX, XAXB
        #[arg(long)]
        pub scheme: Option<String>,

        /// Target family ids (repeatable)
        #[arg(long = "target")]
        pub targets: Vec<String>,

        /// Chance (0-100) that a pool refresh uses a target family
        #[arg(long)]
        pub mastery: Option<u8>,

        /// Include slant words in pools
        #[arg(long, default_value_t = false)]
        pub slant: bool,

        /// Practice the least-played families (needs --progress to matter)
        #[arg(long, default_value_t = false)]
        pub weakest: bool,

        /// RNG seed for a reproducible board
        #[arg(long)]
        pub seed: Option<u64>,

        /// List built-in songs and exit
        #[arg(long, default_value_t = false)]
        pub list_songs: bool,
    }

    fn find_song(id: &str) -> rhyme_board::Result<Song> {
        builtin_songs()
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| RhymeError::UnknownSong(id.to_string()))
    }

    fn log_board(ctl: &SessionController) {
        let snap = ctl.snapshot(ctl.state().now_ms);
        for (row, view) in snap.rows.iter().enumerate() {
            let cells: String = snap.broken[row]
                .iter()
                .map(|b| if *b { 'x' } else { '.' })
                .collect();
            let word = if view.word.is_empty() { "-" } else { view.word.as_str() };
            log::info!("  {} {:?} {:<12} {}", row, view.tag, word, cells);
        }
    }

    pub fn run(cli: Cli) -> rhyme_board::Result<()> {
        if cli.list_songs {
            for song in builtin_songs() {
                println!(
                    "{:<18} {:<20} {:>6.1} BPM  drop {:>5.1}s  end {:>6.1}s",
                    song.id, song.title, song.bpm, song.beat_drop_time, song.duration
                );
            }
            return Ok(());
        }

        let mut settings = match &cli.config {
            Some(path) => SessionSettings::load_or_default(path),
            None => SessionSettings::default(),
        };
        if let Some(name) = &cli.scheme {
            settings.scheme = name.parse::<SchemePattern>()?;
        }
        if let Some(bpm) = cli.bpm {
            settings.default_bpm = bpm;
        }
        if let Some(mastery) = cli.mastery {
            settings.mastery_percentage = mastery;
        }
        if !cli.targets.is_empty() {
            settings.target_family_ids = cli.targets.clone();
        }
        settings.include_slant_words |= cli.slant;
        if cli.seed.is_some() {
            settings.seed = cli.seed;
        }

        let catalog = match &cli.catalog {
            Some(path) => RhymeCatalog::from_json_str(&std::fs::read_to_string(path)?)?,
            None => RhymeCatalog::builtin()?,
        };
        let catalog = Arc::new(catalog);

        let mut ctl = match &cli.progress {
            Some(path) => SessionController::with_progress(
                Arc::clone(&catalog),
                settings,
                Box::new(JsonProgressFile::open(path)?),
            ),
            None => SessionController::new(Arc::clone(&catalog), settings),
        };
        if cli.weakest {
            ctl.practice_weakest_family();
        }

        let song = match (&cli.song, &cli.song_file) {
            (Some(id), _) => Some(find_song(id)?),
            (None, Some(file)) => Some(Song::from_filename_or_default(file)),
            (None, None) => None,
        };
        if let Some(cue) = ctl.select_song(song) {
            log::info!(
                "Seek audio to {:.2}s, drop on beat {}",
                cue.seek_seconds,
                cue.drop_beat
            );
        }

        log_board(&ctl);
        let mut now_ms = 0.0;
        ctl.play(now_ms);
        let mut beats_run = 0;
        while beats_run < cli.beats && ctl.is_playing() {
            let beat = ctl.state().playhead.current_beat();
            now_ms += ctl.state().clock.duration_ms(beat);
            ctl.tick(now_ms);

            for event in ctl.drain_events() {
                match event {
                    SessionEvent::BoardShifted { beat } => {
                        log::info!("Shift on beat {beat}");
                        log_board(&ctl);
                    }
                    SessionEvent::Countdown { beats_remaining } => {
                        log::info!("{beats_remaining}...");
                    }
                    SessionEvent::Drop { beat } => log::info!("DROP (beat {beat})"),
                    SessionEvent::Ended { beat } => log::info!("Song ended on beat {beat}"),
                    other => log::debug!("{other:?}"),
                }
            }
            beats_run += 1;
        }
        ctl.stop();

        let stats = ctl.progress_stats();
        log::info!(
            "Done after {} beats: {}/{} families practiced, {} total plays",
            beats_run,
            stats.families_seen,
            stats.total_families,
            stats.total_plays
        );
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use clap::Parser;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Rhyme Board (headless) starting...");

    if let Err(e) = native::run(native::Cli::parse()) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page on wasm
}
