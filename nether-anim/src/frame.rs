//! Mapping a playback position onto a pair of frames

use crate::track::PlaybackMode;

/// The two frames to interpolate between and the factor from `frame` to `next_frame`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameLocation {
    pub frame: usize,
    pub next_frame: usize,
    pub blend: f32,
}

impl FrameLocation {
    const FIRST: Self = Self {
        frame: 0,
        next_frame: 0,
        blend: 0.0,
    };

    fn hold(frame: usize) -> Self {
        Self {
            frame,
            next_frame: frame,
            blend: 0.0,
        }
    }
}

/// Step `blend` down to multiples of `1 / quantizer` (no-op when `quantizer <= 0`)
#[inline]
pub fn quantize(blend: f32, quantizer: f32) -> f32 {
    if quantizer > 0.0 {
        (blend * quantizer).floor() / quantizer
    } else {
        blend
    }
}

/// Locate `position` (seconds, any sign) in a clip of `frame_count` evenly
/// spaced frames spanning `duration`
pub fn locate_frame(
    frame_count: usize,
    duration: f32,
    mode: PlaybackMode,
    quantizer: f32,
    position: f32,
) -> FrameLocation {
    if frame_count <= 1 || duration <= 0.0 {
        return FrameLocation::FIRST;
    }
    let last = frame_count - 1;

    let mut location = match mode {
        PlaybackMode::Clamp => {
            if position <= 0.0 {
                return FrameLocation::FIRST;
            }
            if position >= duration {
                return FrameLocation::hold(last);
            }
            forward(position / duration, last)
        }
        PlaybackMode::Wrap => wrapped(position, duration, last),
        PlaybackMode::Mirror => {
            let mut location = wrapped(position, duration, last);
            let cycle = (position / duration).abs().floor() as u64;
            if cycle % 2 == 1 {
                location.frame = last - location.frame;
                location.next_frame = last - location.next_frame;
            }
            location
        }
    };

    location.blend = quantize(location.blend, quantizer);
    location
}

/// `t` in `[0, 1)` mapped onto frames `0..=last`
fn forward(t: f32, last: usize) -> FrameLocation {
    let f = t * last as f32;
    let frame = (f.floor() as usize).min(last - 1);
    FrameLocation {
        frame,
        next_frame: frame + 1,
        blend: (f - frame as f32).clamp(0.0, 1.0),
    }
}

/// Wrap `position` into one cycle
///
/// Negative positions count back from the end of the clip, walking frames in
/// reverse with the blend measured from the later frame.
fn wrapped(position: f32, duration: f32, last: usize) -> FrameLocation {
    let t = (position.abs() / duration).fract();
    if position >= 0.0 {
        return forward(t, last);
    }

    let reversed = forward(t, last);
    FrameLocation {
        frame: last - reversed.frame,
        next_frame: last - reversed.next_frame,
        blend: reversed.blend,
    }
}
