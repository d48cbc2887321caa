use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::config::Thresholds;
use crate::pose::Pose;
use crate::segments::{Segment, SegmentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    JoinedHands,
    WaveRight,
    WaveLeft,
    Menu,
    SwipeLeft,
    SwipeRight,
    SwipeUp,
    SwipeDown,
    ZoomIn,
    ZoomOut,
}

impl GestureKind {
    pub const ALL: [GestureKind; 10] = [
        GestureKind::JoinedHands,
        GestureKind::WaveRight,
        GestureKind::WaveLeft,
        GestureKind::Menu,
        GestureKind::SwipeLeft,
        GestureKind::SwipeRight,
        GestureKind::SwipeUp,
        GestureKind::SwipeDown,
        GestureKind::ZoomIn,
        GestureKind::ZoomOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GestureKind::JoinedHands => "joined_hands",
            GestureKind::WaveRight => "wave_right",
            GestureKind::WaveLeft => "wave_left",
            GestureKind::Menu => "menu",
            GestureKind::SwipeLeft => "swipe_left",
            GestureKind::SwipeRight => "swipe_right",
            GestureKind::SwipeUp => "swipe_up",
            GestureKind::SwipeDown => "swipe_down",
            GestureKind::ZoomIn => "zoom_in",
            GestureKind::ZoomOut => "zoom_out",
        }
    }

    /// Key under `[bindings]` in a profile.
    pub fn binding_key(&self) -> &'static str {
        match self {
            GestureKind::JoinedHands => "joined_hands",
            GestureKind::WaveRight => "wave.right",
            GestureKind::WaveLeft => "wave.left",
            GestureKind::Menu => "menu",
            GestureKind::SwipeLeft => "swipe.left",
            GestureKind::SwipeRight => "swipe.right",
            GestureKind::SwipeUp => "swipe.up",
            GestureKind::SwipeDown => "swipe.down",
            GestureKind::ZoomIn => "zoom.in",
            GestureKind::ZoomOut => "zoom.out",
        }
    }

    /// The ordered segments a body has to pass through.
    pub fn segments(&self, th: &Thresholds) -> Vec<Segment> {
        use Segment::*;
        match self {
            GestureKind::JoinedHands => vec![JoinedHands; th.hold_repeats],
            GestureKind::Menu => vec![Menu; th.hold_repeats],
            GestureKind::WaveRight => [WaveRight1, WaveRight2].repeat(th.wave_repeats),
            GestureKind::WaveLeft => [WaveLeft1, WaveLeft2].repeat(th.wave_repeats),
            GestureKind::SwipeLeft => vec![SwipeLeft1, SwipeLeft2, SwipeLeft3],
            GestureKind::SwipeRight => vec![SwipeRight1, SwipeRight2, SwipeRight3],
            GestureKind::SwipeUp => vec![SwipeUp1, SwipeUp2, SwipeUp3],
            GestureKind::SwipeDown => vec![SwipeDown1, SwipeDown2, SwipeDown3],
            GestureKind::ZoomIn => vec![Zoom1, Zoom2, Zoom3],
            GestureKind::ZoomOut => vec![Zoom3, Zoom2, Zoom1],
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GestureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', '.'], "_");
        GestureKind::ALL
            .into_iter()
            .find(|k| k.as_str() == norm)
            .ok_or_else(|| format!("unknown gesture: {s}"))
    }
}

/// A completed gesture, attributed to the body that performed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GestureEvent {
    #[serde(rename = "gesture")]
    pub kind: GestureKind,
    pub tracking_id: u64,
}

/// Where a gesture currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GestureProgress {
    pub kind: GestureKind,
    pub segment: usize,
    pub segment_count: usize,
    pub frame_count: u32,
    pub paused: bool,
}

/// Steps through one gesture's segments, frame by frame.
#[derive(Debug, Clone)]
pub struct Gesture {
    kind: GestureKind,
    segments: Vec<Segment>,
    current: usize,
    // frames since the last transition
    frame_count: u32,
    paused_for: u32,
    window_frames: u32,
    pause_frames: u32,
    undetermined_pause_frames: u32,
}

impl Gesture {
    pub fn new(kind: GestureKind, th: &Thresholds) -> Self {
        Self {
            kind,
            segments: kind.segments(th),
            current: 0,
            frame_count: 0,
            paused_for: 0,
            window_frames: th.window_frames,
            pause_frames: th.pause_frames,
            undetermined_pause_frames: th.undetermined_pause(),
        }
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn progress(&self) -> GestureProgress {
        GestureProgress {
            kind: self.kind,
            segment: self.current,
            segment_count: self.segments.len(),
            frame_count: self.frame_count,
            paused: self.paused_for > 0,
        }
    }

    /// Feed one frame. Returns the event when the last segment succeeds.
    ///
    /// The current segment is evaluated on every frame. The pause only
    /// records how long the gesture has been settling since its last
    /// transition; it never holds back evaluation.
    pub fn update(&mut self, pose: &Pose) -> Option<GestureEvent> {
        self.paused_for = self.paused_for.saturating_sub(1);

        match self.segments[self.current].evaluate(pose) {
            SegmentResult::Succeeded if self.current + 1 < self.segments.len() => {
                self.current += 1;
                self.frame_count = 0;
                self.paused_for = self.pause_frames;
                debug!(
                    "{}: segment {}/{} reached (body {})",
                    self.kind,
                    self.current,
                    self.segments.len(),
                    pose.tracking_id
                );
                None
            }
            SegmentResult::Succeeded => {
                self.reset();
                Some(GestureEvent {
                    kind: self.kind,
                    tracking_id: pose.tracking_id,
                })
            }
            SegmentResult::Failed => {
                if self.current > 0 {
                    trace!("{}: failed at segment {}", self.kind, self.current);
                }
                self.reset();
                None
            }
            SegmentResult::Undetermined => {
                self.frame_count += 1;
                if self.frame_count >= self.window_frames {
                    trace!("{}: window elapsed at segment {}", self.kind, self.current);
                    self.reset();
                } else {
                    self.paused_for = self.paused_for.max(self.undetermined_pause_frames);
                }
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.frame_count = 0;
        self.paused_for = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::JointType::*;
    use crate::synth::{self, standing};

    fn feed(g: &mut Gesture, pose: &Pose, frames: usize) -> Vec<GestureEvent> {
        (0..frames).filter_map(|_| g.update(pose)).collect()
    }

    #[test]
    fn catalog_lengths() {
        let th = Thresholds::default();
        assert_eq!(GestureKind::SwipeLeft.segments(&th).len(), 3);
        assert_eq!(GestureKind::ZoomOut.segments(&th).len(), 3);
        assert_eq!(GestureKind::WaveRight.segments(&th).len(), 6);
        assert_eq!(GestureKind::JoinedHands.segments(&th).len(), 20);
        assert_eq!(GestureKind::Menu.segments(&th).len(), 20);

        let wave = GestureKind::WaveLeft.segments(&th);
        assert_eq!(wave[0], Segment::WaveLeft1);
        assert_eq!(wave[1], Segment::WaveLeft2);
        assert_eq!(wave[4], Segment::WaveLeft1);
        assert_eq!(GestureKind::ZoomOut.segments(&th)[0], Segment::Zoom3);
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for k in GestureKind::ALL {
            assert_eq!(k.as_str().parse::<GestureKind>().unwrap(), k);
        }
        assert_eq!("Swipe-Right".parse::<GestureKind>().unwrap(), GestureKind::SwipeRight);
        assert!("jump".parse::<GestureKind>().is_err());
    }

    #[test]
    fn swipe_right_scenario() {
        let th = Thresholds::default();
        let mut g = Gesture::new(GestureKind::SwipeRight, &th);

        let left_of_shoulder = standing(7).with(HandLeft, -0.35, 0.2, 1.7);
        let between = standing(7).with(HandLeft, 0.0, 0.2, 1.7);
        let right_of_shoulder = standing(7).with(HandLeft, 0.35, 0.2, 1.7);

        assert!(g.update(&left_of_shoulder).is_none());
        assert_eq!(g.progress().segment, 1);
        // lingering on a reached phase just waits
        assert!(feed(&mut g, &left_of_shoulder, 5).is_empty());
        assert_eq!(g.progress().segment, 1);
        assert!(g.update(&between).is_none());
        assert_eq!(g.progress().segment, 2);
        assert_eq!(
            g.update(&right_of_shoulder),
            Some(GestureEvent {
                kind: GestureKind::SwipeRight,
                tracking_id: 7
            })
        );
        assert_eq!(g.progress().segment, 0);
    }

    #[test]
    fn fast_swipe_completes_in_three_frames() {
        let th = Thresholds::default();
        let mut g = Gesture::new(GestureKind::SwipeRight, &th);
        let events: Vec<_> = synth::keyframes(GestureKind::SwipeRight, 2)
            .iter()
            .filter_map(|p| g.update(p))
            .collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn pause_does_not_gate_evaluation() {
        let th = Thresholds::default();
        let mut g = Gesture::new(GestureKind::SwipeRight, &th);
        g.update(&standing(1).with(HandLeft, -0.35, 0.2, 1.7));
        assert!(g.progress().paused);

        // a violating pose right after the transition still resets
        g.update(&standing(1));
        let p = g.progress();
        assert_eq!(p.segment, 0);
        assert!(!p.paused);

        // the rest of the swipe no longer completes
        let events: Vec<_> = [
            standing(1).with(HandLeft, 0.0, 0.2, 1.7),
            standing(1).with(HandLeft, 0.35, 0.2, 1.7),
        ]
        .iter()
        .filter_map(|p| g.update(p))
        .collect();
        assert!(events.is_empty());
    }

    #[test]
    fn next_phase_is_taken_during_pause() {
        let th = Thresholds::default();
        let mut g = Gesture::new(GestureKind::SwipeUp, &th);
        g.update(&synth::keyframes(GestureKind::SwipeUp, 1)[0]);
        assert!(g.progress().paused);
        // the next phase reached straight away restarts the pause
        g.update(&synth::keyframes(GestureKind::SwipeUp, 1)[1]);
        assert_eq!(g.progress().segment, 2);
        assert!(g.progress().paused);
    }

    // A violating pose for the second segment of every gesture. Standing
    // satisfies the menu's "hands low" guard, so the menu gets raised hands.
    fn breaks_second_segment(kind: GestureKind) -> Pose {
        match kind {
            GestureKind::Menu => synth::keyframes(GestureKind::WaveRight, 1)[0].clone(),
            _ => standing(1),
        }
    }

    // A pose the second segment of every gesture neither accepts nor rejects.
    fn stalls_second_segment(kind: GestureKind) -> Pose {
        match kind {
            GestureKind::SwipeUp => standing(1).with(HandRight, 0.1, 0.5, 1.7),
            GestureKind::SwipeDown => standing(1).with(HandRight, 0.05, 0.0, 1.7),
            GestureKind::Menu => standing(1),
            GestureKind::JoinedHands | GestureKind::ZoomIn | GestureKind::ZoomOut => {
                synth::both_hands(1, 0.1)
            }
            _ => synth::keyframes(kind, 1)[0].clone(),
        }
    }

    #[test]
    fn violation_after_first_segment_resets_every_gesture() {
        let th = Thresholds::default();
        for kind in GestureKind::ALL {
            let keys = synth::keyframes(kind, 1);
            let mut g = Gesture::new(kind, &th);

            assert!(g.update(&keys[0]).is_none());
            assert_eq!(g.progress().segment, 1, "{kind}");
            assert!(g.update(&breaks_second_segment(kind)).is_none());
            let p = g.progress();
            assert_eq!((p.segment, p.frame_count, p.paused), (0, 0, false), "{kind}");

            let late: Vec<_> = keys[1..].iter().filter_map(|p| g.update(p)).collect();
            assert!(late.is_empty(), "{kind}");
        }
    }

    #[test]
    fn undetermined_past_window_resets_every_gesture() {
        let th = Thresholds::default();
        for kind in GestureKind::ALL {
            let mut g = Gesture::new(kind, &th);
            g.update(&synth::keyframes(kind, 1)[0]);
            assert_eq!(g.progress().segment, 1, "{kind}");

            let stuck = stalls_second_segment(kind);
            assert!(feed(&mut g, &stuck, th.window_frames as usize - 1).is_empty());
            let p = g.progress();
            assert_eq!(p.segment, 1, "{kind}");
            assert_eq!(p.frame_count, th.window_frames - 1, "{kind}");

            assert!(g.update(&stuck).is_none());
            let p = g.progress();
            assert_eq!((p.segment, p.frame_count), (0, 0), "{kind}");
        }
    }

    #[test]
    fn wave_needs_alternation() {
        let th = Thresholds::default();
        let out = standing(3).with(HandRight, 0.4, 0.3, 1.9);
        let inner = standing(3).with(HandRight, 0.1, 0.3, 1.9);

        // staying on one side never completes
        let mut g = Gesture::new(GestureKind::WaveRight, &th);
        assert!(feed(&mut g, &out, 200).is_empty());

        // a dropped hand mid-wave fails the sequence
        let mut g = Gesture::new(GestureKind::WaveRight, &th);
        feed(&mut g, &out, 3);
        feed(&mut g, &inner, 3);
        assert_eq!(g.progress().segment, 2);
        feed(&mut g, &standing(3), 1);
        assert_eq!(g.progress().segment, 0);

        // proper alternation, with each side held a few frames
        let mut g = Gesture::new(GestureKind::WaveRight, &th);
        let mut events = vec![];
        for _ in 0..th.wave_repeats {
            events.extend(feed(&mut g, &out, 4));
            events.extend(feed(&mut g, &inner, 4));
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GestureKind::WaveRight);
    }

    #[test]
    fn every_script_completes_its_own_gesture() {
        let th = Thresholds::default();
        for kind in GestureKind::ALL {
            let mut g = Gesture::new(kind, &th);
            let events: Vec<_> = synth::script(kind, &th, 11)
                .iter()
                .filter_map(|p| g.update(p))
                .collect();
            assert_eq!(
                events,
                vec![GestureEvent {
                    kind,
                    tracking_id: 11
                }],
                "{kind}"
            );
        }
    }

    #[test]
    fn event_serialises_with_gesture_name() {
        let ev = GestureEvent {
            kind: GestureKind::ZoomIn,
            tracking_id: 5,
        };
        assert_eq!(
            serde_json::to_string(&ev).unwrap(),
            r#"{"gesture":"zoom_in","tracking_id":5}"#
        );
    }
}
