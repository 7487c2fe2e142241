//! Session controller
//!
//! Sequences commands into the clock, tap estimator, sequencer and playhead
//! in the right order. Board-changing commands reload before anything else
//! can shift; timing-changing commands resync the playhead from the stored
//! beat.

use std::sync::Arc;

use crate::board::SchemePattern;
use crate::catalog::RhymeCatalog;
use crate::consts::BOARD_COLS;
use crate::error::RhymeError;
use crate::playhead::{BeatTimer, column_from_drag};
use crate::progress::{
    MemoryProgress, ProgressStats, ProgressStore, pick_unplayed_family, pick_weakest_family,
    progress_stats,
};
use crate::settings::SessionSettings;
use crate::songs::{Song, SongCue};
use crate::timing::BeatClock;

use super::state::{SessionEvent, SessionSnapshot, SessionState};

pub struct SessionController {
    catalog: Arc<RhymeCatalog>,
    state: SessionState,
    progress: Box<dyn ProgressStore>,
}

impl SessionController {
    /// New session with in-memory progress
    pub fn new(catalog: Arc<RhymeCatalog>, settings: SessionSettings) -> Self {
        Self::with_progress(catalog, settings, Box::new(MemoryProgress::new()))
    }

    pub fn with_progress(
        catalog: Arc<RhymeCatalog>,
        settings: SessionSettings,
        progress: Box<dyn ProgressStore>,
    ) -> Self {
        let state = SessionState::new(Arc::clone(&catalog), settings);
        let mut controller = Self {
            catalog,
            state,
            progress,
        };
        controller.record_refreshed_families();
        controller
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn catalog(&self) -> &RhymeCatalog {
        &self.catalog
    }

    pub fn progress(&self) -> &dyn ProgressStore {
        self.progress.as_ref()
    }

    pub fn progress_stats(&self) -> ProgressStats {
        progress_stats(&self.catalog, self.progress.as_ref())
    }

    pub fn is_playing(&self) -> bool {
        self.state.playhead.is_running()
    }

    /// Take all pending events
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.state.events)
    }

    pub fn snapshot(&self, now_ms: f64) -> SessionSnapshot {
        self.state.snapshot(now_ms)
    }

    /// Report pool-refresh draws to the progress store; failures are logged
    fn record_refreshed_families(&mut self) {
        let now_ms = self.state.now_ms;
        for family_id in self.state.sequencer.take_refreshed_families() {
            match self.progress.increment_family_play_count(&family_id, now_ms) {
                Ok(p) => log::debug!("Family '{}' played {} times", family_id, p.times_played),
                Err(e) => log::warn!("Could not record play of '{}': {e}", family_id),
            }
        }
    }

    fn resync_playhead(&mut self, now_ms: f64) {
        let s = &mut self.state;
        s.playhead
            .resync(now_ms, &s.clock, &mut s.sequencer, &mut s.events);
        self.record_refreshed_families();
    }

    /// A board-regenerating change happened
    fn board_reloaded(&mut self) {
        self.state.events.push(SessionEvent::BoardReloaded);
        self.record_refreshed_families();
    }

    // === Transport ===

    pub fn play(&mut self, now_ms: f64) {
        self.state.observe_time(now_ms);
        let s = &mut self.state;
        s.playhead
            .play(now_ms, &s.clock, &mut s.sequencer, &mut s.events);
        self.record_refreshed_families();
    }

    pub fn stop(&mut self) {
        self.state.playhead.stop();
    }

    /// Play/pause toggle; both directions leave the cycle cleanly restartable
    pub fn toggle_play(&mut self, now_ms: f64) {
        if self.is_playing() {
            self.stop();
        } else {
            self.play(now_ms);
        }
    }

    /// Advance to `now_ms`, firing every beat that elapsed
    pub fn tick(&mut self, now_ms: f64) {
        self.state.observe_time(now_ms);
        let s = &mut self.state;
        s.playhead
            .advance(now_ms, &s.clock, &mut s.sequencer, &mut s.events);
        self.record_refreshed_families();
    }

    /// A host timer fired with the handle it was armed with; stale handles
    /// from before a restart are dropped.
    pub fn beat_timer_fired(&mut self, handle: &BeatTimer, now_ms: f64) -> bool {
        self.state.observe_time(now_ms);
        let s = &mut self.state;
        let accepted = s
            .playhead
            .fire_timer(handle, now_ms, &s.clock, &mut s.sequencer, &mut s.events);
        self.record_refreshed_families();
        accepted
    }

    /// Explicit resync trigger
    pub fn resync(&mut self, now_ms: f64) {
        self.state.observe_time(now_ms);
        self.resync_playhead(now_ms);
    }

    /// Viewport/layout changed: positions are fractional, only the cycle
    /// restarts.
    pub fn on_layout_changed(&mut self, now_ms: f64) {
        self.resync(now_ms);
    }

    /// The audio layer reported a failure: stop and surface it
    pub fn playback_failed(&mut self, reason: impl Into<String>) -> RhymeError {
        let reason = reason.into();
        log::warn!("Playback failed: {reason}");
        self.state.playhead.stop();
        self.state.events.push(SessionEvent::PlaybackFailed {
            reason: reason.clone(),
        });
        RhymeError::Playback(reason)
    }

    /// The audio track finished on its own
    pub fn song_finished(&mut self) {
        if self.is_playing() {
            self.state.playhead.stop();
            let beat = self.state.playhead.current_beat();
            log::info!("Song finished at beat {beat}");
            self.state.events.push(SessionEvent::Ended { beat });
        }
    }

    // === Songs and tempo ===

    /// Switch tracks. `None` is externally sourced audio: tempo mode at the
    /// current BPM with no drop. Returns where the audio should seek.
    pub fn select_song(&mut self, song: Option<Song>) -> Option<SongCue> {
        self.state.playhead.stop();
        self.state.tap.reset();

        let Some(song) = song else {
            let bpm = self.state.clock.bpm();
            self.state.clock = BeatClock::from_bpm(bpm);
            self.state.song = None;
            self.state.cue = None;
            self.state.playhead.set_current_beat(0);
            self.state.sequencer.clear_bricks();
            log::info!("Streaming mode at {bpm} BPM");
            return None;
        };

        let mut clock = BeatClock::from_song(&song);
        let cue = clock.cue_drop(song.beat_drop_time, self.state.settings.countdown_beats);
        log::info!(
            "Selected '{}' ({} BPM, {} beats), start beat {}",
            song.title,
            clock.bpm(),
            song.beats.len(),
            cue.start_beat
        );

        self.state.clock = clock;
        self.state.song = Some(song);
        self.state.cue = Some(cue);
        self.state.playhead.set_current_beat(cue.start_beat);
        self.state.sequencer.clear_bricks();
        self.state.events.push(SessionEvent::SongCued { cue });
        Some(cue)
    }

    pub fn set_bpm(&mut self, bpm: f64, now_ms: f64) {
        self.state.observe_time(now_ms);
        self.state.clock.set_bpm(bpm);
        let bpm = self.state.clock.bpm();
        log::info!("Tempo set to {bpm} BPM");
        self.state.events.push(SessionEvent::TempoChanged { bpm });
        self.resync_playhead(now_ms);
    }

    /// Accept a tap unless it arrives inside the debounce window
    fn accept_tap(&mut self, now_ms: f64) -> bool {
        if let Some(last) = self.state.last_tap_ms {
            if now_ms - last < self.state.settings.tap_debounce_ms {
                log::debug!("Tap debounced ({:.0}ms after last)", now_ms - last);
                return false;
            }
        }
        self.state.last_tap_ms = Some(now_ms);
        self.state.observe_time(now_ms);
        true
    }

    /// Tap-tempo button. A full tap window sets the tempo and resyncs.
    pub fn tap(&mut self, now_ms: f64) -> Option<f64> {
        if !self.accept_tap(now_ms) {
            return None;
        }
        let bpm = self.state.tap.add_tap(now_ms)?;
        self.set_bpm(bpm, now_ms);
        Some(bpm)
    }

    /// Tap on a brick: records a tap sample and syncs the playhead onto
    /// that brick's column.
    pub fn tap_brick(&mut self, index: usize, now_ms: f64) {
        if !self.accept_tap(now_ms) {
            return;
        }
        self.state.tap.add_tap(now_ms);
        let s = &mut self.state;
        s.playhead
            .sync_to_beat(index, now_ms, &s.clock, &mut s.sequencer, &mut s.events);
        self.record_refreshed_families();
    }

    // === Layout ===

    pub fn set_active_column(&mut self, column: usize, now_ms: f64) {
        let column = column.min(BOARD_COLS - 1);
        if column == self.state.layout.active_column {
            return;
        }
        self.state.layout.active_column = column;
        self.state.settings.active_column = column;
        self.resync(now_ms);
    }

    /// Column drag gesture at `x` across a board `width` wide
    pub fn drag_column(&mut self, x: f32, width: f32, now_ms: f64) {
        self.set_active_column(column_from_drag(x, width), now_ms);
    }

    // === Board configuration (each reloads before any further shift) ===

    pub fn set_scheme(&mut self, scheme: SchemePattern) {
        self.state.settings.scheme = scheme;
        self.state.sequencer.set_scheme(scheme);
        self.board_reloaded();
    }

    /// Parse a scheme name, then apply it
    pub fn set_scheme_name(&mut self, name: &str) -> crate::Result<()> {
        let scheme: SchemePattern = name.parse()?;
        self.set_scheme(scheme);
        Ok(())
    }

    /// Practice exactly one family, or none
    pub fn select_target_family(&mut self, family_id: Option<&str>) {
        let ids: Vec<String> = family_id.into_iter().map(str::to_string).collect();
        self.state.settings.target_family_ids = ids.clone();
        self.state.sequencer.set_target_families(ids);
        self.board_reloaded();
    }

    pub fn toggle_target_family(&mut self, family_id: &str) {
        self.state.sequencer.toggle_target_family(family_id);
        self.state.settings.target_family_ids = self.state.sequencer.policy().target_ids.clone();
        self.board_reloaded();
    }

    pub fn clear_target_families(&mut self) {
        self.select_target_family(None);
    }

    pub fn set_mastery_percentage(&mut self, percentage: u8) {
        self.state.sequencer.set_mastery(percentage);
        self.state.settings.mastery_percentage = self.state.sequencer.policy().mastery_percentage;
        self.board_reloaded();
    }

    pub fn set_include_slant(&mut self, include: bool) {
        self.state.settings.include_slant_words = include;
        self.state.sequencer.set_include_slant(include);
        self.board_reloaded();
    }

    /// Target a never-played family (random one once all are played)
    pub fn practice_new_family(&mut self) -> String {
        let family_id = pick_unplayed_family(
            &self.catalog,
            self.progress.as_ref(),
            self.state.sequencer.rng_mut(),
        )
        .family_id
        .clone();
        log::info!("Practicing new family '{family_id}'");
        self.select_target_family(Some(&family_id));
        family_id
    }

    /// Target one of the least-played families
    pub fn practice_weakest_family(&mut self) -> String {
        let family_id = pick_weakest_family(
            &self.catalog,
            self.progress.as_ref(),
            self.state.sequencer.rng_mut(),
        )
        .family_id
        .clone();
        log::info!("Practicing weakest family '{family_id}'");
        self.select_target_family(Some(&family_id));
        family_id
    }

    // === Board resets ===

    pub fn reset_row(&mut self, row: usize) {
        self.state.sequencer.reset_row(row);
    }

    pub fn reset_bricks(&mut self) {
        self.state.sequencer.reset_bricks();
        self.board_reloaded();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RhymeFamily;
    use crate::error::Result;
    use crate::progress::FamilyProgress;
    use crate::songs::builtin_songs;
    use std::collections::BTreeMap;

    fn catalog() -> Arc<RhymeCatalog> {
        Arc::new(
            RhymeCatalog::from_families(vec![
                RhymeFamily::new("at", "-AT", &["cat", "hat", "bat", "mat", "rat"]),
                RhymeFamily::new("ack", "-ACK", &["back", "pack", "track", "stack"]),
                RhymeFamily::new("op", "-OP", &["top", "hop", "drop", "stop"]),
            ])
            .unwrap(),
        )
    }

    fn controller() -> SessionController {
        let settings = SessionSettings {
            seed: Some(11),
            default_bpm: 120.0,
            ..Default::default()
        };
        SessionController::new(catalog(), settings)
    }

    /// Drive `beats` full beats at 120 BPM starting from `start`
    fn run_beats(ctl: &mut SessionController, start: f64, beats: usize) -> f64 {
        let mut now = start;
        for _ in 0..beats {
            now += 500.0;
            ctl.tick(now);
        }
        now
    }

    #[test]
    fn test_play_tick_stop() {
        let mut ctl = controller();
        ctl.play(0.0);
        assert!(ctl.is_playing());
        let now = run_beats(&mut ctl, 0.0, 5);
        assert_eq!(ctl.snapshot(now).current_beat, 5);

        let events = ctl.drain_events();
        let shifts = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::BoardShifted { .. }))
            .count();
        assert_eq!(shifts, 1);
        assert!(ctl.drain_events().is_empty());

        ctl.stop();
        let parked = ctl.snapshot(now + 10_000.0);
        ctl.tick(now + 10_000.0);
        assert_eq!(ctl.snapshot(now + 10_000.0), parked);
        assert!(!parked.is_playing);
    }

    #[test]
    fn test_timer_armed_before_tempo_change_is_dropped() {
        let mut ctl = controller();
        ctl.play(0.0);
        let armed = *ctl.state().playhead.timer().unwrap();
        ctl.set_bpm(60.0, 100.0);

        assert!(!ctl.beat_timer_fired(&armed, 500.0));
        assert_eq!(ctl.state().playhead.current_beat(), 0);

        let rearmed = *ctl.state().playhead.timer().unwrap();
        assert!(ctl.beat_timer_fired(&rearmed, 1100.0));
        assert_eq!(ctl.state().playhead.current_beat(), 1);
    }

    #[test]
    fn test_full_mastery_only_uses_target() {
        let mut ctl = controller();
        ctl.set_mastery_percentage(100);
        ctl.select_target_family(Some("ack"));
        ctl.play(0.0);
        run_beats(&mut ctl, 0.0, 64);

        let pools = ctl.state().sequencer.pools();
        assert_eq!(pools.a.family_id.as_deref(), Some("ack"));
        assert_eq!(pools.b.family_id.as_deref(), Some("ack"));
        let ack_words = ["back", "pack", "track", "stack"];
        assert!(
            ctl.state()
                .sequencer
                .rows()
                .iter()
                .all(|r| ack_words.contains(&r.word.as_str()))
        );
    }

    #[test]
    fn test_zero_mastery_ignores_target() {
        let mut ctl = controller();
        ctl.select_target_family(Some("ack"));
        assert_eq!(ctl.state().sequencer.policy().mastery_percentage, 0);
        ctl.play(0.0);
        run_beats(&mut ctl, 0.0, 400);

        // 25 cycle refreshes of two pools: random draws reach the other families
        let progress = ctl.progress();
        assert!(progress.times_played("at") > 0);
        assert!(progress.times_played("op") > 0);
    }

    #[test]
    fn test_scheme_change_reloads_before_next_shift() {
        let mut ctl = controller();
        ctl.play(0.0);
        run_beats(&mut ctl, 0.0, 2);
        ctl.set_scheme(SchemePattern::Axbx);
        let snap = ctl.snapshot(1000.0);
        assert_eq!(snap.scheme, SchemePattern::Axbx);
        assert!(snap.broken.iter().flatten().all(|b| !b));
        assert!(snap.rows[1].word.is_empty());
        assert!(
            ctl.drain_events()
                .iter()
                .any(|e| matches!(e, SessionEvent::BoardReloaded))
        );
        assert!(ctl.set_scheme_name("abab").is_ok());
        assert!(ctl.set_scheme_name("zzzz").is_err());
        assert_eq!(ctl.state().sequencer.scheme(), SchemePattern::Abab);
    }

    #[test]
    fn test_resync_twice_matches_once() {
        let mut ctl = controller();
        ctl.play(0.0);
        let now = run_beats(&mut ctl, 0.0, 3);

        ctl.resync(now + 100.0);
        let once = ctl.snapshot(now + 300.0);
        ctl.resync(now + 100.0);
        let twice = ctl.snapshot(now + 300.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_tap_tempo_sets_bpm_and_resyncs() {
        let mut ctl = controller();
        ctl.play(0.0);
        assert_eq!(ctl.tap(1000.0), None);
        assert_eq!(ctl.tap(1750.0), None);
        assert_eq!(ctl.tap(2500.0), None);
        assert_eq!(ctl.tap(3250.0), Some(80.0));
        assert_eq!(ctl.snapshot(3250.0).bpm, 80.0);

        let events = ctl.drain_events();
        assert!(events.contains(&SessionEvent::TempoChanged { bpm: 80.0 }));
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Resynced { .. })));
        assert_eq!(ctl.state().playhead.timer().unwrap().started_at_ms, 3250.0);
    }

    #[test]
    fn test_taps_inside_debounce_are_dropped() {
        let mut ctl = controller();
        for t in [0.0, 100.0, 150.0, 199.0] {
            ctl.tap(t);
        }
        assert_eq!(ctl.state().tap.len(), 1);
        ctl.tap(200.0);
        assert_eq!(ctl.state().tap.len(), 2);

        // Brick taps share the window
        ctl.tap_brick(2, 250.0);
        assert_eq!(ctl.state().tap.len(), 2);
    }

    #[test]
    fn test_tap_brick_syncs_column() {
        let mut ctl = controller();
        ctl.play(0.0);
        run_beats(&mut ctl, 0.0, 1);
        ctl.tap_brick(3, 600.0);
        assert_eq!(ctl.state().playhead.current_column(), 3);
        // Column 3 is the shift column
        assert!(
            ctl.drain_events()
                .iter()
                .any(|e| matches!(e, SessionEvent::BoardShifted { beat: 3 }))
        );
    }

    #[test]
    fn test_playback_failure_stops() {
        let mut ctl = controller();
        ctl.play(0.0);
        let err = ctl.playback_failed("device lost");
        assert!(matches!(err, RhymeError::Playback(ref r) if r == "device lost"));
        assert!(!ctl.is_playing());
        assert!(ctl.drain_events().contains(&SessionEvent::PlaybackFailed {
            reason: "device lost".into()
        }));

        // No further beats fire
        let before = ctl.snapshot(5000.0);
        ctl.tick(5000.0);
        assert_eq!(ctl.snapshot(5000.0), before);
    }

    #[test]
    fn test_select_song_cues_countdown() {
        let mut ctl = controller();
        let song = builtin_songs()
            .into_iter()
            .find(|s| s.id == "bop_squad")
            .unwrap();
        let cue = ctl.select_song(Some(song)).unwrap();
        assert_eq!(cue.drop_beat % BOARD_COLS, 0);
        assert_eq!(cue.drop_beat - cue.start_beat, 4);
        assert_eq!(ctl.snapshot(0.0).bpm, 87.5);
        assert_eq!(ctl.snapshot(0.0).current_beat, cue.start_beat);

        ctl.play(0.0);
        let beat_ms = 60_000.0 / 87.5;
        let mut now = 0.0;
        for _ in 0..4 {
            now += beat_ms;
            ctl.tick(now);
        }
        let events = ctl.drain_events();
        assert!(events.contains(&SessionEvent::Countdown { beats_remaining: 4 }));
        assert!(events.contains(&SessionEvent::Countdown { beats_remaining: 1 }));
        assert!(events.contains(&SessionEvent::Drop {
            beat: cue.drop_beat
        }));
    }

    #[test]
    fn test_streaming_mode_keeps_bpm() {
        let mut ctl = controller();
        ctl.set_bpm(101.0, 0.0);
        assert_eq!(ctl.select_song(None), None);
        let snap = ctl.snapshot(0.0);
        assert_eq!(snap.bpm, 101.0);
        assert_eq!(snap.current_beat, 0);
        assert!(snap.countdown.is_none());
    }

    #[test]
    fn test_timeline_song_ends() {
        let mut ctl = controller();
        let song = Song::with_bpm("t", "Timeline", 120.0, 0.0, 2.0)
            .with_beats(vec![0.0, 0.5, 1.0, 1.5, 2.0], vec![0.0, 2.0]);
        ctl.select_song(Some(song));
        ctl.play(0.0);
        run_beats(&mut ctl, 0.0, 4);
        assert!(!ctl.is_playing());
        assert!(
            ctl.drain_events()
                .iter()
                .any(|e| matches!(e, SessionEvent::Ended { beat: 3 }))
        );
    }

    #[test]
    fn test_active_column_drag_resyncs() {
        let mut ctl = controller();
        ctl.play(0.0);
        ctl.drain_events();
        ctl.drag_column(10.0, 400.0, 200.0);
        assert_eq!(ctl.snapshot(200.0).active_column, 0);
        assert!(matches!(
            ctl.drain_events().as_slice(),
            [SessionEvent::Resynced { beat: 0 }]
        ));
        // Same column again is a no-op
        ctl.set_active_column(0, 300.0);
        assert!(ctl.drain_events().is_empty());
    }

    #[test]
    fn test_pool_refreshes_count_plays() {
        let mut ctl = controller();
        // Initial load refreshed A and B
        let initial: u32 = ["at", "ack", "op"]
            .iter()
            .map(|id| ctl.progress().times_played(id))
            .sum();
        assert_eq!(initial, 2);

        // One shift per four beats, one refresh per four shifts
        ctl.play(0.0);
        run_beats(&mut ctl, 0.0, 32);
        let total: u32 = ["at", "ack", "op"]
            .iter()
            .map(|id| ctl.progress().times_played(id))
            .sum();
        assert_eq!(total, 6);
        assert_eq!(ctl.progress_stats().total_plays, 6);
    }

    struct FailingStore(BTreeMap<String, FamilyProgress>);

    impl ProgressStore for FailingStore {
        fn increment_family_play_count(&mut self, _: &str, _: f64) -> Result<FamilyProgress> {
            Err(RhymeError::Io(std::io::Error::other("disk full")))
        }

        fn family_progress(&self, _: &str) -> Option<FamilyProgress> {
            None
        }

        fn all_progress(&self) -> &BTreeMap<String, FamilyProgress> {
            &self.0
        }
    }

    #[test]
    fn test_progress_failures_are_absorbed() {
        let mut ctl = SessionController::with_progress(
            catalog(),
            SessionSettings {
                seed: Some(1),
                ..Default::default()
            },
            Box::new(FailingStore(BTreeMap::new())),
        );
        ctl.play(0.0);
        for i in 1..=8 {
            ctl.tick(i as f64 * 700.0);
        }
        assert_eq!(ctl.snapshot(5600.0).rows.len(), 4);
    }

    #[test]
    fn test_practice_pickers_set_target() {
        let mut ctl = controller();
        let id = ctl.practice_new_family();
        assert_eq!(ctl.state().sequencer.policy().target_ids, vec![id.clone()]);
        assert_eq!(ctl.state().settings.target_family_ids, vec![id]);

        let weakest = ctl.practice_weakest_family();
        assert!(ctl.catalog().find_family(&weakest).is_some());
        ctl.clear_target_families();
        assert!(ctl.state().sequencer.policy().target_ids.is_empty());
    }

    #[test]
    fn test_reset_row_and_bricks() {
        let mut ctl = controller();
        ctl.play(0.0);
        run_beats(&mut ctl, 0.0, 2);
        assert_eq!(ctl.state().sequencer.bricks().indices(), vec![0, 1, 2]);
        ctl.reset_row(0);
        assert!(ctl.state().sequencer.bricks().indices().is_empty());

        ctl.tick(1500.0);
        ctl.reset_bricks();
        assert!(ctl.state().sequencer.bricks().indices().is_empty());
        assert_eq!(ctl.snapshot(1500.0).rows.len(), 4);
    }
}
