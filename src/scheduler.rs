//! Realtime scheduler: plays the mixed, effected project against a clock.
//!
//! The playhead is always `now - start_clock + offset`. Nothing else counts
//! elapsed time: seeking resets both terms, pausing folds the current
//! position into `offset`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::buffer::SampleBuffer;
use crate::config::EngineConfig;
use crate::dsp::resample::resample;
use crate::effect::Effect;
use crate::error::{CoreError, ValidationError};
use crate::graph::{self, AudioNode};
use crate::mixer::{ControlHandle, MixNode, Track, TrackControls, TrackUpdate, mix_extent};

// ── Clocks ──────────────────────────────────────────────────

/// Monotonic time source in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

impl<F: Fn() -> f64> Clock for F {
    fn now(&self) -> f64 {
        self()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            seconds: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.seconds.store(seconds.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::SeqCst))
    }
}

/// Wall-clock time since construction.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

// ── Sources ─────────────────────────────────────────────────

/// Playable material: tracks, the effects over their mix, and a master volume.
#[derive(Debug, Clone)]
pub struct PlaybackSource {
    tracks: Vec<(Track, Arc<SampleBuffer>)>,
    effects: Vec<Effect>,
    volume: f64,
    sample_rate: u32,
}

impl PlaybackSource {
    /// Buffers not already at `sample_rate` are resampled once, here.
    pub fn new(
        tracks: Vec<(Track, Arc<SampleBuffer>)>,
        effects: Vec<Effect>,
        volume: f64,
        sample_rate: u32,
    ) -> Result<Self, CoreError> {
        if sample_rate == 0 {
            return Err(ValidationError::InvalidBuffer("sample rate must be positive").into());
        }
        let tracks = tracks
            .into_iter()
            .map(|(track, buffer)| -> Result<_, CoreError> {
                if buffer.sample_rate() == sample_rate {
                    Ok((track, buffer))
                } else {
                    Ok((track, Arc::new(resample(&buffer, sample_rate)?)))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            tracks,
            effects,
            volume,
            sample_rate,
        })
    }

    /// One buffer played as is, at its own rate.
    pub fn single(
        buffer: Arc<SampleBuffer>,
        effects: Vec<Effect>,
        volume: f64,
    ) -> Result<Self, CoreError> {
        let track = Track::from_buffer("main", "main", &buffer);
        let sample_rate = buffer.sample_rate();
        Self::new(vec![(track, buffer)], effects, volume, sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().map(|(t, _)| t)
    }

    /// Length in seconds of the mix under the tracks' own solo and mute
    /// settings.
    pub fn duration(&self) -> f64 {
        mix_extent(
            self.tracks
                .iter()
                .map(|(t, b)| (b.duration(), t.is_muted, t.is_solo)),
        )
    }

    /// Copy a session's live control values into the track records.
    fn absorb(&mut self, controls: &SessionControls) {
        for (track, _) in &mut self.tracks {
            if let Some(c) = controls.tracks.get(&track.id) {
                track.volume = c.volume();
                track.pan = c.pan();
                track.is_muted = c.is_muted();
                track.is_solo = c.is_solo();
            }
        }
        self.volume = controls.master.volume();
    }

    /// Like [`duration`](Self::duration), but with solo and mute read from a
    /// playing session's controls.
    fn live_duration(&self, controls: &SessionControls) -> f64 {
        mix_extent(self.tracks.iter().map(|(t, b)| match controls.tracks.get(&t.id) {
            Some(c) => (b.duration(), c.is_muted(), c.is_solo()),
            None => (b.duration(), t.is_muted, t.is_solo),
        }))
    }
}

/// Live controls for one playing source; they outlive seeks.
#[derive(Debug, Clone)]
struct SessionControls {
    master: Arc<TrackControls>,
    tracks: HashMap<String, Arc<TrackControls>>,
}

impl SessionControls {
    fn new(source: &PlaybackSource) -> Self {
        Self {
            master: Arc::new(TrackControls::master(source.volume)),
            tracks: source
                .tracks
                .iter()
                .map(|(t, _)| (t.id.clone(), Arc::new(TrackControls::new(t))))
                .collect(),
        }
    }
}

/// A running graph: live track mix, effect chain, then master gain.
pub struct RealtimeSource {
    node: Box<dyn AudioNode>,
    controls: SessionControls,
}

impl RealtimeSource {
    fn with_controls(
        source: &PlaybackSource,
        controls: SessionControls,
        start_time: f64,
        config: &EngineConfig,
    ) -> Self {
        let start_frame = (start_time.max(0.0) * source.sample_rate as f64).round() as u64;
        let inputs = source
            .tracks
            .iter()
            .filter_map(|(t, b)| controls.tracks.get(&t.id).map(|c| (b.clone(), c.clone())))
            .collect();
        let mix = MixNode::new(inputs, source.sample_rate, start_frame);
        let node = graph::build(Box::new(mix), &source.effects, config);
        Self { node, controls }
    }

    /// Handle on the master volume, valid while this source exists.
    pub fn master_handle(&self) -> ControlHandle {
        ControlHandle::new(&self.controls.master)
    }

    pub fn track_handle(&self, id: &str) -> Option<ControlHandle> {
        self.controls.tracks.get(id).map(ControlHandle::new)
    }

    /// Position of the next frame to be pulled, in seconds.
    pub fn position(&self) -> f64 {
        self.node.frame() as f64 / self.node.sample_rate() as f64
    }
}

impl AudioNode for RealtimeSource {
    fn sample_rate(&self) -> u32 {
        self.node.sample_rate()
    }

    fn frame(&self) -> u64 {
        self.node.frame()
    }

    fn pull(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
        let n = self.node.pull(left, right);
        let (gl, gr) = self.controls.master.gains(false);
        for s in &mut left[..n] {
            *s *= gl;
        }
        for s in &mut right[..n] {
            *s *= gr;
        }
        n
    }
}

/// Build a controllable source that plays `buffer` through `effects` from
/// `start_time` at `volume` (0..=100).
pub fn create_realtime_source(
    buffer: Arc<SampleBuffer>,
    effects: &[Effect],
    start_time: f64,
    volume: f64,
    config: &EngineConfig,
) -> Result<RealtimeSource, CoreError> {
    let source = PlaybackSource::single(buffer, effects.to_vec(), volume)?;
    let controls = SessionControls::new(&source);
    Ok(RealtimeSource::with_controls(&source, controls, start_time, config))
}

/// Everything that exists only while playing. Dropping it ends playback and
/// turns every handle it gave out inert.
pub struct PlaybackSession {
    source: RealtimeSource,
}

impl PlaybackSession {
    fn start(playback: &PlaybackSource, at: f64, config: &EngineConfig) -> Self {
        let controls = SessionControls::new(playback);
        Self {
            source: RealtimeSource::with_controls(playback, controls, at, config),
        }
    }

    /// Replace the running graph with a fresh one at `at`, keeping controls.
    fn restart(&mut self, playback: &PlaybackSource, at: f64, config: &EngineConfig) {
        let controls = self.source.controls.clone();
        self.source = RealtimeSource::with_controls(playback, controls, at, config);
    }

    pub fn source(&self) -> &RealtimeSource {
        &self.source
    }
}

// ── Scheduler ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Not playing. A paused transport is stopped at a retained position.
    Stopped,
    Playing,
}

/// Transport over a [`PlaybackSource`]: start, seek, pause, stop.
pub struct RealtimeScheduler<C: Clock> {
    clock: C,
    config: EngineConfig,
    loaded: Option<PlaybackSource>,
    session: Option<PlaybackSession>,
    state: TransportState,
    start_clock: f64,
    offset: f64,
}

impl<C: Clock> RealtimeScheduler<C> {
    pub fn new(clock: C, config: EngineConfig) -> Self {
        Self {
            clock,
            config,
            loaded: None,
            session: None,
            state: TransportState::Stopped,
            start_clock: 0.0,
            offset: 0.0,
        }
    }

    /// Replace what will be played. Stops playback first.
    pub fn load(&mut self, source: PlaybackSource) {
        self.stop();
        self.loaded = Some(source);
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Length of what is loaded, following live solo and mute while playing.
    pub fn duration(&self) -> f64 {
        match (&self.loaded, &self.session) {
            (Some(playback), Some(session)) => playback.live_duration(&session.source.controls),
            (Some(playback), None) => playback.duration(),
            (None, _) => 0.0,
        }
    }

    /// Begin playing at `at` seconds. Without a loaded source this does
    /// nothing; while already playing it behaves like [`seek`](Self::seek).
    pub fn start(&mut self, at: f64) {
        if self.state == TransportState::Playing {
            self.seek(at);
            return;
        }
        let Some(playback) = &self.loaded else {
            log::debug!("start ignored: nothing loaded");
            return;
        };
        let at = at.clamp(0.0, playback.duration());
        self.session = Some(PlaybackSession::start(playback, at, &self.config));
        self.start_clock = self.clock.now();
        self.offset = at;
        self.state = TransportState::Playing;
        log::debug!("transport: playing from {at:.3}s");
    }

    /// Move the playhead. While playing, the old graph is dropped and a new
    /// one starts at `at` in the same call.
    pub fn seek(&mut self, at: f64) {
        let at = at.clamp(0.0, self.duration());
        if let (Some(session), Some(playback)) = (&mut self.session, &self.loaded) {
            session.restart(playback, at, &self.config);
            self.start_clock = self.clock.now();
        }
        self.offset = at;
        log::debug!("transport: seek to {at:.3}s");
    }

    /// Stop and keep the current position.
    pub fn pause(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        self.offset = self.current_position();
        self.halt();
        log::debug!("transport: paused at {:.3}s", self.offset);
    }

    /// Stop and rewind to the start.
    pub fn stop(&mut self) {
        self.halt();
        self.offset = 0.0;
        log::debug!("transport: stopped");
    }

    /// End the session. Whatever was written through its handles stays on
    /// the loaded tracks.
    fn halt(&mut self) {
        if let (Some(session), Some(playback)) = (self.session.take(), &mut self.loaded) {
            playback.absorb(&session.source.controls);
        }
        self.state = TransportState::Stopped;
    }

    /// Playhead in seconds, never past the end.
    pub fn current_position(&self) -> f64 {
        let position = match self.state {
            TransportState::Playing => self.clock.now() - self.start_clock + self.offset,
            TransportState::Stopped => self.offset,
        };
        position.min(self.duration())
    }

    /// Stop at the end once the playhead reaches it. Returns the state after
    /// the check.
    pub fn tick(&mut self) -> TransportState {
        if self.state == TransportState::Playing {
            let duration = self.duration();
            if self.clock.now() - self.start_clock + self.offset >= duration {
                self.halt();
                self.offset = duration;
                log::debug!("transport: reached end at {duration:.3}s");
            }
        }
        self.state
    }

    /// Fill the host's output block. Silence when stopped; returns the number
    /// of frames that came from the graph.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
        self.tick();
        let n = match &mut self.session {
            Some(session) => session.source.pull(left, right),
            None => 0,
        };
        left[n..].fill(0.0);
        right[n..].fill(0.0);
        n
    }

    /// Change a track's mixer settings. The loaded record keeps the change
    /// for later starts, and a playing graph picks it up on its next block.
    pub fn update_track(&mut self, id: &str, update: &TrackUpdate) -> Result<(), ValidationError> {
        update.validate()?;
        let playback = self
            .loaded
            .as_mut()
            .ok_or_else(|| ValidationError::UnknownTrack(id.to_string()))?;
        let (track, _) = playback
            .tracks
            .iter_mut()
            .find(|(t, _)| t.id == id)
            .ok_or_else(|| ValidationError::UnknownTrack(id.to_string()))?;
        if let Some(v) = update.volume {
            track.volume = v;
        }
        if let Some(p) = update.pan {
            track.pan = p;
        }
        if let Some(m) = update.is_muted {
            track.is_muted = m;
        }
        if let Some(s) = update.is_solo {
            track.is_solo = s;
        }
        if let Some(controls) = self.session.as_ref().and_then(|s| s.source.controls.tracks.get(id)) {
            controls.apply(update);
        }
        Ok(())
    }

    /// Set the master volume (0..=100).
    pub fn set_volume(&mut self, volume: f64) -> Result<(), ValidationError> {
        let update = TrackUpdate {
            volume: Some(volume),
            ..TrackUpdate::default()
        };
        update.validate()?;
        if let Some(playback) = &mut self.loaded {
            playback.volume = volume;
        }
        if let Some(session) = &self.session {
            session.source.controls.master.apply(&update);
        }
        Ok(())
    }

    /// A handle on a playing track's controls; inert after stop.
    pub fn track_handle(&self, id: &str) -> Option<ControlHandle> {
        self.session.as_ref()?.source.track_handle(id)
    }

    pub fn master_handle(&self) -> Option<ControlHandle> {
        self.session.as_ref().map(|s| s.source.master_handle())
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(seconds: f64, value: f32) -> Arc<SampleBuffer> {
        let frames = (seconds * 100.0) as usize;
        Arc::new(SampleBuffer::new(vec![vec![value; frames]], 100).unwrap())
    }

    fn scheduler(seconds: f64) -> (ManualClock, RealtimeScheduler<ManualClock>) {
        let clock = ManualClock::new(100.0);
        let mut s = RealtimeScheduler::new(clock.clone(), EngineConfig::default());
        s.load(PlaybackSource::single(constant(seconds, 0.5), vec![], 100.0).unwrap());
        (clock, s)
    }

    #[test]
    fn position_is_clock_delta_plus_offset() {
        let (clock, mut s) = scheduler(20.0);
        s.start(3.0);
        clock.advance(2.0);
        assert_eq!(s.current_position(), 5.0);
        // Repeated queries do not accumulate anything.
        assert_eq!(s.current_position(), 5.0);

        s.seek(7.0);
        clock.advance(1.0);
        assert_eq!(s.current_position(), 8.0);
    }

    #[test]
    fn start_without_source_is_a_no_op() {
        let clock = ManualClock::default();
        let mut s = RealtimeScheduler::new(clock, EngineConfig::default());
        s.start(1.0);
        assert_eq!(s.state(), TransportState::Stopped);
        assert_eq!(s.current_position(), 0.0);
    }

    #[test]
    fn pause_freezes_and_stop_rewinds() {
        let (clock, mut s) = scheduler(20.0);
        s.start(1.0);
        clock.advance(2.5);
        s.pause();
        assert_eq!(s.state(), TransportState::Stopped);
        clock.advance(10.0);
        assert_eq!(s.current_position(), 3.5);

        s.start(s.current_position());
        clock.advance(1.0);
        assert_eq!(s.current_position(), 4.5);

        s.stop();
        assert_eq!(s.current_position(), 0.0);
    }

    #[test]
    fn natural_end_stops_and_clamps() {
        let (clock, mut s) = scheduler(4.0);
        s.start(3.0);
        clock.advance(5.0);
        assert_eq!(s.current_position(), 4.0);
        assert_eq!(s.tick(), TransportState::Stopped);
        assert_eq!(s.current_position(), 4.0);
    }

    #[test]
    fn seek_while_stopped_moves_retained_position() {
        let (_clock, mut s) = scheduler(10.0);
        s.seek(6.0);
        assert_eq!(s.state(), TransportState::Stopped);
        assert_eq!(s.current_position(), 6.0);
    }

    #[test]
    fn render_reads_from_seek_point() {
        let clock = ManualClock::default();
        let data: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let buf = Arc::new(SampleBuffer::new(vec![data], 100).unwrap());
        let mut s = RealtimeScheduler::new(clock, EngineConfig::default());
        s.load(PlaybackSource::single(buf, vec![], 100.0).unwrap());

        let mut l = [0.0; 4];
        let mut r = [0.0; 4];
        assert_eq!(s.render(&mut l, &mut r), 0, "stopped renders silence");

        s.start(2.0);
        s.render(&mut l, &mut r);
        assert_eq!(l[0], 0.2);
        s.seek(5.0);
        s.render(&mut l, &mut r);
        assert_eq!(l[0], 0.5);
    }

    #[test]
    fn live_updates_apply_without_restart() {
        let (_clock, mut s) = scheduler(10.0);
        s.start(0.0);
        let mut l = [0.0; 4];
        let mut r = [0.0; 4];
        s.render(&mut l, &mut r);
        assert_eq!(l[0], 0.5);

        s.update_track("main", &TrackUpdate {
            volume: Some(50.0),
            ..TrackUpdate::default()
        })
        .unwrap();
        s.render(&mut l, &mut r);
        assert_eq!(l[0], 0.25);
        assert_eq!(s.session().unwrap().source().frame(), 8, "graph kept running");

        s.set_volume(50.0).unwrap();
        s.render(&mut l, &mut r);
        assert_eq!(l[0], 0.125);
    }

    #[test]
    fn handles_go_inert_after_stop() {
        let (_clock, mut s) = scheduler(10.0);
        s.start(0.0);
        let handle = s.track_handle("main").unwrap();
        assert_eq!(handle.set_pan(50.0), Ok(true));
        s.stop();
        assert_eq!(handle.set_pan(-50.0), Ok(false));
        assert!(s.track_handle("main").is_none());
    }

    #[test]
    fn handles_survive_seek() {
        let (_clock, mut s) = scheduler(10.0);
        s.start(0.0);
        let handle = s.track_handle("main").unwrap();
        s.seek(4.0);
        assert_eq!(handle.set_muted(true), Ok(true));
        let mut l = [1.0; 4];
        let mut r = [1.0; 4];
        s.render(&mut l, &mut r);
        assert_eq!(l, [0.0; 4]);
    }

    #[test]
    fn realtime_source_applies_master_volume() {
        let mut src =
            create_realtime_source(constant(1.0, 0.8), &[], 0.5, 50.0, &EngineConfig::default())
                .unwrap();
        assert_eq!(src.position(), 0.5);
        let mut l = [0.0; 2];
        let mut r = [0.0; 2];
        assert_eq!(src.pull(&mut l, &mut r), 2);
        assert!((l[0] - 0.4).abs() < 1e-7);
        src.master_handle().set_volume(0.0).unwrap();
        src.pull(&mut l, &mut r);
        assert_eq!(r[0], 0.0);
    }

    fn two_tracks(solo_short: bool) -> PlaybackSource {
        let short = constant(1.0, 0.5);
        let long = constant(4.0, 0.25);
        let mut a = Track::from_buffer("short", "short", &short);
        a.is_solo = solo_short;
        let b = Track::from_buffer("long", "long", &long);
        PlaybackSource::new(vec![(a, short), (b, long)], vec![], 100.0, 100).unwrap()
    }

    #[test]
    fn soloed_short_track_sets_the_end() {
        let clock = ManualClock::default();
        let mut s = RealtimeScheduler::new(clock.clone(), EngineConfig::default());
        s.load(two_tracks(true));
        assert_eq!(s.duration(), 1.0);

        s.start(0.0);
        let mut l = [0.0; 64];
        let mut r = [0.0; 64];
        let mut rendered = 0;
        loop {
            let n = s.render(&mut l, &mut r);
            if n == 0 {
                break;
            }
            rendered += n;
        }
        assert_eq!(rendered, 100);

        clock.advance(1.0);
        assert_eq!(s.tick(), TransportState::Stopped);
        assert_eq!(s.current_position(), 1.0);
    }

    #[test]
    fn releasing_solo_while_playing_extends_the_end() {
        let clock = ManualClock::default();
        let mut s = RealtimeScheduler::new(clock.clone(), EngineConfig::default());
        s.load(two_tracks(true));
        s.start(0.0);
        s.track_handle("short").unwrap().set_solo(false).unwrap();
        assert_eq!(s.duration(), 4.0);

        clock.advance(2.0);
        assert_eq!(s.tick(), TransportState::Playing);
        clock.advance(2.0);
        assert_eq!(s.tick(), TransportState::Stopped);
        // The released solo outlives the session.
        assert_eq!(s.current_position(), 4.0);
        assert!(s.session().is_none());
    }

    #[test]
    fn muted_tracks_do_not_count() {
        let short = constant(1.0, 0.5);
        let long = constant(4.0, 0.25);
        let mut b = Track::from_buffer("long", "long", &long);
        b.is_muted = true;
        let a = Track::from_buffer("short", "short", &short);
        let source = PlaybackSource::new(vec![(a, short), (b, long)], vec![], 100.0, 100).unwrap();
        assert_eq!(source.duration(), 1.0);
        assert_eq!(two_tracks(false).duration(), 4.0);
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let buf = constant(1.0, 0.5);
        let track = Track::from_buffer("a", "a", &buf);
        let err = PlaybackSource::new(vec![(track, buf)], vec![], 100.0, 0).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidBuffer(_))));
    }

    #[test]
    fn sources_are_resampled_to_the_playback_rate() {
        let buf = constant(1.0, 0.5);
        let track = Track::from_buffer("a", "a", &buf);
        let source = PlaybackSource::new(vec![(track, buf)], vec![], 100.0, 200).unwrap();
        assert_eq!(source.sample_rate(), 200);
        assert_eq!(source.duration(), 1.0);
    }

    #[test]
    fn closures_are_clocks() {
        let fixed = || 42.0;
        assert_eq!(fixed.now(), 42.0);
    }
}
