//! Playback position arithmetic.
//!
//! Pure functions so the display loop stays a thin driver and the frame
//! stepping rules can be tested without threads.

use reel_ipc::{ClipRange, StopReason};

/// What the display loop does after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Show the frame at this index next.
    Show(usize),

    /// Stop playback.
    Stop(StopReason),
}

/// Frames covered by a skip of `seconds` at `fps`, rounded to nearest.
pub fn skip_frames(seconds: f64, fps: f64) -> usize {
    let frames = (seconds * fps).round();
    if frames.is_finite() && frames > 0.0 {
        frames as usize
    } else {
        0
    }
}

/// Position playback starts from. A player parked on the last frame (or
/// outside its clip) rewinds to the start.
pub fn start_position(position: usize, last_index: Option<usize>, clip: Option<ClipRange>) -> usize {
    match clip {
        Some(clip) if position < clip.start || position >= clip.last() => clip.start,
        Some(_) => position,
        None if last_index == Some(position) => 0,
        None => position,
    }
}

/// Step from `position` after one tick.
///
/// A pending skip replaces the normal one-frame advance and is clamped to
/// `[0, frontier]`. Without one, playback holds on the frontier while frames
/// are still loading and stops after the last frame once loading is
/// complete. With a clip, playback stops instead of showing `clip.end`.
pub fn next_position(
    position: usize,
    pending_skip: Option<isize>,
    frontier: usize,
    complete: bool,
    clip: Option<ClipRange>,
) -> Advance {
    let target = match pending_skip {
        Some(delta) => position.saturating_add_signed(delta).min(frontier),
        None if position >= frontier => {
            if complete {
                return Advance::Stop(StopReason::EndOfVideo);
            }
            frontier
        }
        None => position + 1,
    };

    match clip {
        Some(clip) if target >= clip.end => Advance::Stop(StopReason::ClipEnd),
        _ => Advance::Show(target),
    }
}

/// Audio chunk matching video frame `position`: the chunk at the same
/// fraction of the track as the frame is of the video.
pub fn resync_chunk_index(chunk_count: usize, position: usize, total_frames: usize) -> usize {
    if total_frames == 0 {
        return 0;
    }
    let index = chunk_count as u128 * position as u128 / total_frames as u128;
    index as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_frames_rounds() {
        assert_eq!(skip_frames(2.0, 10.0), 20);
        assert_eq!(skip_frames(1.0, 29.97), 30);
        assert_eq!(skip_frames(0.04, 10.0), 0);
        assert_eq!(skip_frames(0.05, 10.0), 1);
        assert_eq!(skip_frames(0.0, 30.0), 0);
    }

    #[test]
    fn test_start_position_rewinds_at_end() {
        assert_eq!(start_position(99, Some(99), None), 0);
        assert_eq!(start_position(42, Some(99), None), 42);
        // Length not known yet.
        assert_eq!(start_position(42, None, None), 42);
    }

    #[test]
    fn test_start_position_with_clip() {
        let clip = ClipRange::new(10, 20).unwrap();
        assert_eq!(start_position(19, Some(99), Some(clip)), 10);
        assert_eq!(start_position(3, Some(99), Some(clip)), 10);
        assert_eq!(start_position(50, Some(99), Some(clip)), 10);
        assert_eq!(start_position(12, Some(99), Some(clip)), 12);
    }

    #[test]
    fn test_next_position_advances() {
        assert_eq!(next_position(4, None, 10, false, None), Advance::Show(5));
        assert_eq!(next_position(4, None, 10, true, None), Advance::Show(5));
    }

    #[test]
    fn test_next_position_holds_on_frontier_while_loading() {
        assert_eq!(next_position(10, None, 10, false, None), Advance::Show(10));
    }

    #[test]
    fn test_next_position_stops_at_end() {
        assert_eq!(
            next_position(10, None, 10, true, None),
            Advance::Stop(StopReason::EndOfVideo)
        );
    }

    #[test]
    fn test_pending_skip_is_clamped() {
        assert_eq!(next_position(5, Some(20), 99, true, None), Advance::Show(25));
        assert_eq!(next_position(95, Some(20), 99, true, None), Advance::Show(99));
        assert_eq!(next_position(5, Some(-20), 99, true, None), Advance::Show(0));
        // Clamped to what is loaded, not to the video length.
        assert_eq!(next_position(5, Some(20), 12, false, None), Advance::Show(12));
    }

    #[test]
    fn test_clip_stops_before_end() {
        let clip = ClipRange::new(10, 15).unwrap();
        assert_eq!(next_position(13, None, 99, true, Some(clip)), Advance::Show(14));
        assert_eq!(
            next_position(14, None, 99, true, Some(clip)),
            Advance::Stop(StopReason::ClipEnd)
        );
        assert_eq!(
            next_position(11, Some(10), 99, true, Some(clip)),
            Advance::Stop(StopReason::ClipEnd)
        );
    }

    #[test]
    fn test_resync_chunk_index() {
        assert_eq!(resync_chunk_index(10, 50, 100), 5);
        assert_eq!(resync_chunk_index(10, 99, 100), 9);
        assert_eq!(resync_chunk_index(431, 0, 300), 0);
        assert_eq!(resync_chunk_index(431, 150, 300), 215);
        assert_eq!(resync_chunk_index(10, 5, 0), 0);
    }
}
