//! Scripted pose streams that perform each gesture.
//!
//! Every script plays each keyframe for a single frame, the fastest a person
//! could perform the gesture. Holds repeat their keyframe once per required
//! success. Useful for exercising a running daemon without a sensor (`bodyctl synth swipe_left > ~/.local/run/bodyctl.poses`).

use crate::config::Thresholds;
use crate::gestures::GestureKind;
use crate::pose::{JointType::*, Pose};

/// A person standing about two meters from the sensor, arms at their sides.
pub fn standing(tracking_id: u64) -> Pose {
    let mut p = Pose::new(tracking_id);
    p.set(SpineBase, 0.0, -0.1, 2.0)
        .set(SpineMid, 0.0, 0.15, 2.0)
        .set(SpineShoulder, 0.0, 0.4, 2.0)
        .set(Neck, 0.0, 0.45, 2.0)
        .set(Head, 0.0, 0.6, 2.0)
        .set(ShoulderLeft, -0.2, 0.38, 2.0)
        .set(ElbowLeft, -0.25, 0.12, 2.0)
        .set(WristLeft, -0.27, -0.08, 2.0)
        .set(HandLeft, -0.27, -0.15, 2.0)
        .set(HandTipLeft, -0.27, -0.22, 2.0)
        .set(ThumbLeft, -0.24, -0.15, 2.0)
        .set(ShoulderRight, 0.2, 0.38, 2.0)
        .set(ElbowRight, 0.25, 0.12, 2.0)
        .set(WristRight, 0.27, -0.08, 2.0)
        .set(HandRight, 0.27, -0.15, 2.0)
        .set(HandTipRight, 0.27, -0.22, 2.0)
        .set(ThumbRight, 0.24, -0.15, 2.0)
        .set(HipLeft, -0.1, -0.12, 2.0)
        .set(KneeLeft, -0.1, -0.5, 2.0)
        .set(AnkleLeft, -0.1, -0.9, 2.0)
        .set(FootLeft, -0.1, -0.95, 1.95)
        .set(HipRight, 0.1, -0.12, 2.0)
        .set(KneeRight, 0.1, -0.5, 2.0)
        .set(AnkleRight, 0.1, -0.9, 2.0)
        .set(FootRight, 0.1, -0.95, 1.95);
    p
}

fn left_hand(id: u64, x: f32, y: f32, z: f32) -> Pose {
    standing(id).with(HandLeft, x, y, z)
}

fn right_hand(id: u64, x: f32, y: f32, z: f32) -> Pose {
    standing(id).with(HandRight, x, y, z)
}

pub fn both_hands(id: u64, half_spread: f32) -> Pose {
    standing(id)
        .with(HandLeft, -half_spread, 0.1, 1.7)
        .with(HandRight, half_spread, 0.1, 1.7)
}

/// Distinct body positions a gesture passes through, in order.
pub fn keyframes(kind: GestureKind, id: u64) -> Vec<Pose> {
    match kind {
        GestureKind::SwipeRight => vec![
            left_hand(id, -0.35, 0.2, 1.7),
            left_hand(id, 0.0, 0.2, 1.7),
            left_hand(id, 0.35, 0.2, 1.7),
        ],
        GestureKind::SwipeLeft => vec![
            right_hand(id, 0.35, 0.2, 1.7),
            right_hand(id, 0.0, 0.2, 1.7),
            right_hand(id, -0.35, 0.2, 1.7),
        ],
        GestureKind::SwipeUp => vec![
            right_hand(id, 0.35, 0.0, 1.7),
            right_hand(id, 0.35, 0.5, 1.7),
            right_hand(id, 0.35, 0.75, 1.7),
        ],
        GestureKind::SwipeDown => vec![
            right_hand(id, 0.35, 0.3, 1.7),
            right_hand(id, 0.35, 0.0, 1.7),
            right_hand(id, 0.35, -0.2, 1.7),
        ],
        GestureKind::WaveRight => vec![
            right_hand(id, 0.4, 0.3, 1.9),
            right_hand(id, 0.1, 0.3, 1.9),
        ],
        GestureKind::WaveLeft => vec![
            left_hand(id, -0.1, 0.3, 1.9),
            left_hand(id, -0.4, 0.3, 1.9),
        ],
        GestureKind::JoinedHands => vec![
            standing(id)
                .with(HandLeft, 0.02, 0.1, 1.7)
                .with(HandRight, -0.02, 0.1, 1.7),
        ],
        GestureKind::Menu => vec![left_hand(id, -0.6, -0.2, 2.0)],
        GestureKind::ZoomIn => vec![both_hands(id, 0.1), both_hands(id, 0.22), both_hands(id, 0.4)],
        GestureKind::ZoomOut => vec![both_hands(id, 0.4), both_hands(id, 0.22), both_hands(id, 0.1)],
    }
}

/// Frame-by-frame stream that completes `kind` exactly once.
pub fn script(kind: GestureKind, th: &Thresholds, id: u64) -> Vec<Pose> {
    let keys = keyframes(kind, id);
    match kind {
        GestureKind::WaveRight | GestureKind::WaveLeft => keys
            .iter()
            .cycle()
            .take(keys.len() * th.wave_repeats)
            .cloned()
            .collect(),
        GestureKind::JoinedHands | GestureKind::Menu => vec![keys[0].clone(); th.hold_repeats],
        _ => keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standing_is_symmetric() {
        let p = standing(1);
        let pairs = [
            (ShoulderLeft, ShoulderRight),
            (ElbowLeft, ElbowRight),
            (HandLeft, HandRight),
            (HipLeft, HipRight),
        ];
        for (l, r) in pairs {
            assert_eq!(p.pos(l).x, -p.pos(r).x);
            assert_eq!(p.pos(l).y, p.pos(r).y);
        }
    }

    #[test]
    fn script_lengths_follow_thresholds() {
        let th = Thresholds::default();
        assert_eq!(script(GestureKind::SwipeUp, &th, 1).len(), 3);
        assert_eq!(script(GestureKind::WaveLeft, &th, 1).len(), 2 * th.wave_repeats);
        assert_eq!(script(GestureKind::Menu, &th, 1).len(), th.hold_repeats);

        let wave = script(GestureKind::WaveRight, &th, 1);
        let keys = keyframes(GestureKind::WaveRight, 1);
        assert_eq!(wave[2], keys[0]);
        assert_eq!(wave[3], keys[1]);
    }
}
