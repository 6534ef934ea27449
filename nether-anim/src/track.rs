//! Animation track references

/// How positions outside `[0, duration]` are mapped onto the clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackMode {
    /// Hold the first/last frame
    #[default]
    Clamp,
    /// Loop
    Wrap,
    /// Ping-pong
    Mirror,
}

/// A named clip plus how to play it
///
/// The clip is looked up by name on the skeleton bound to each instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletalAnimationTrack {
    animation: String,
    mode: PlaybackMode,
    quantizer: f32,
}

impl SkeletalAnimationTrack {
    pub fn new(animation: impl Into<String>) -> Self {
        Self {
            animation: animation.into(),
            mode: PlaybackMode::Clamp,
            quantizer: 0.0,
        }
    }

    pub fn with_mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = mode;
        self
    }

    /// Steps per frame interval for the interpolation factor (0 = smooth)
    pub fn with_quantizer(mut self, quantizer: f32) -> Self {
        self.quantizer = quantizer;
        self
    }

    pub fn animation(&self) -> &str {
        &self.animation
    }

    pub fn set_animation(&mut self, animation: impl Into<String>) {
        self.animation = animation.into();
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlaybackMode) {
        self.mode = mode;
    }

    pub fn quantizer(&self) -> f32 {
        self.quantizer
    }

    pub fn set_quantizer(&mut self, quantizer: f32) {
        self.quantizer = quantizer;
    }
}
