//! Project: the editor state the UI talks to.
//!
//! Holds the imported tracks, the project-level effects and the current
//! selection, and runs the mix → render → export pipeline over them.

use crate::buffer::{SampleBuffer, Selection};
use crate::config::EngineConfig;
use crate::effect::{Effect, EffectList};
use crate::error::{CoreError, ValidationError};
use crate::export::{self, ExportSettings};
use crate::mixer::{Track, TrackRegistry, TrackUpdate};
use crate::renderer::{self, RenderQueue, RenderTicket};
use crate::scheduler::PlaybackSource;

pub struct Project {
    config: EngineConfig,
    sample_rate: u32,
    tracks: TrackRegistry,
    effects: EffectList,
    selection: Option<Selection>,
    renders: RenderQueue,
}

impl Project {
    /// An empty project mixing at `sample_rate`.
    pub fn new(sample_rate: u32) -> Result<Self, CoreError> {
        Self::with_config(sample_rate, EngineConfig::default())
    }

    pub fn with_config(sample_rate: u32, config: EngineConfig) -> Result<Self, CoreError> {
        if sample_rate == 0 {
            return Err(ValidationError::InvalidBuffer("sample rate must be positive").into());
        }
        config.validate()?;
        Ok(Self {
            config,
            sample_rate,
            tracks: TrackRegistry::new(),
            effects: EffectList::new(),
            selection: None,
            renders: RenderQueue::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Longest track, in seconds.
    pub fn duration(&self) -> f64 {
        self.tracks.duration()
    }

    // ── Tracks ──

    pub fn add_track(&mut self, track: Track, buffer: SampleBuffer) -> Result<(), ValidationError> {
        let id = track.id.clone();
        self.tracks.insert(track, buffer)?;
        log::debug!("track '{id}' added ({} tracks)", self.tracks.len());
        Ok(())
    }

    pub fn remove_track(&mut self, id: &str) -> Option<Track> {
        let (track, _) = self.tracks.remove(id)?;
        if self.selection.is_some_and(|s| s.end_time() > self.duration()) {
            self.selection = None;
        }
        Some(track)
    }

    pub fn update_track(&mut self, id: &str, update: &TrackUpdate) -> Result<&Track, ValidationError> {
        self.tracks.update(id, update)
    }

    pub fn tracks(&self) -> &TrackRegistry {
        &self.tracks
    }

    // ── Effects ──

    pub fn add_effect(&mut self, effect: Effect) -> Result<(), ValidationError> {
        self.effects.add(effect)
    }

    pub fn remove_effect(&mut self, id: &str) -> Option<Effect> {
        self.effects.remove(id)
    }

    /// Effects in chain order.
    pub fn effects(&self) -> &[Effect] {
        self.effects.sorted()
    }

    // ── Selection ──

    pub fn select(&mut self, start_time: f64, end_time: f64) -> Result<Selection, ValidationError> {
        let selection = Selection::new(start_time, end_time, self.duration())?;
        self.selection = Some(selection);
        Ok(selection)
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Remove the selected range from every track. Returns false when there
    /// was no selection.
    pub fn cut_selection(&mut self) -> Result<bool, ValidationError> {
        self.edit_selection(SampleBuffer::cut)
    }

    /// Keep only the selected range on every track.
    pub fn trim_to_selection(&mut self) -> Result<bool, ValidationError> {
        self.edit_selection(SampleBuffer::trim)
    }

    fn edit_selection(
        &mut self,
        edit: fn(&SampleBuffer, &Selection) -> SampleBuffer,
    ) -> Result<bool, ValidationError> {
        let Some(selection) = self.selection else {
            return Ok(false);
        };
        let edited: Vec<(String, SampleBuffer)> = self
            .tracks
            .iter()
            .map(|(t, b)| (t.id.clone(), edit(b, &selection)))
            .collect();
        for (id, buffer) in edited {
            self.tracks.replace_buffer(&id, buffer)?;
        }
        // The buffers the selection pointed into are gone.
        self.selection = None;
        Ok(true)
    }

    // ── Pipeline ──

    /// Mix all tracks at the project rate.
    pub fn mix(&self) -> Result<SampleBuffer, CoreError> {
        self.tracks.mix(self.sample_rate)
    }

    /// Mix, then render the project effects over the mix.
    pub fn render_offline(&self) -> Result<SampleBuffer, CoreError> {
        let mixed = self.mix()?;
        Ok(renderer::render_with_config(
            &mixed,
            self.effects.sorted(),
            &self.config,
        )?)
    }

    /// Render and encode the project.
    pub fn export(&self, settings: &ExportSettings) -> Result<Vec<u8>, CoreError> {
        settings.validate()?;
        let rendered = self.render_offline()?;
        export::export(&rendered, settings)
    }

    /// Open a render request. Any request still in flight becomes stale.
    pub fn request_render(&self) -> RenderTicket {
        self.renders.begin()
    }

    /// Render for `ticket`. `Ok(None)` when a newer request has superseded it,
    /// before or during the render.
    pub fn complete_render(&self, ticket: RenderTicket) -> Result<Option<SampleBuffer>, CoreError> {
        if !self.renders.is_current(ticket) {
            return Ok(None);
        }
        let rendered = self.render_offline()?;
        Ok(self.renders.finish(ticket, rendered))
    }

    /// Material for the realtime scheduler, at master `volume` (0..=100).
    pub fn playback_source(&self, volume: f64) -> Result<PlaybackSource, CoreError> {
        let tracks = self
            .tracks
            .iter()
            .map(|(t, b)| (t.clone(), b.clone()))
            .collect();
        PlaybackSource::new(tracks, self.effects.sorted().to_vec(), volume, self.sample_rate)
    }
}
