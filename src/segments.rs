//! Single-frame predicates that make up a gesture.
//!
//! Each segment looks at one pose and answers whether the body is in the
//! phase the segment describes. Segments carry no state, so one value can
//! appear many times in a gesture (waves, holds) and be shared freely.

use crate::pose::{JointType::*, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentResult {
    Succeeded,
    Failed,
    /// Not disqualified yet; stay on this segment.
    Undetermined,
}

use SegmentResult::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    SwipeRight1,
    SwipeRight2,
    SwipeRight3,
    SwipeLeft1,
    SwipeLeft2,
    SwipeLeft3,
    SwipeUp1,
    SwipeUp2,
    SwipeUp3,
    SwipeDown1,
    SwipeDown2,
    SwipeDown3,
    WaveRight1,
    WaveRight2,
    WaveLeft1,
    WaveLeft2,
    JoinedHands,
    Menu,
    Zoom1,
    Zoom2,
    Zoom3,
}

/// `Succeeded` when `hit`, otherwise keep waiting.
fn hit_or_wait(hit: bool) -> SegmentResult {
    if hit { Succeeded } else { Undetermined }
}

impl Segment {
    pub fn evaluate(self, pose: &Pose) -> SegmentResult {
        match self {
            Segment::SwipeRight1 => swipe_right(pose, |hand, sl, _| hand < sl),
            Segment::SwipeRight2 => swipe_right(pose, |hand, sl, sr| hand > sl && hand < sr),
            Segment::SwipeRight3 => swipe_right(pose, |hand, _, sr| hand > sr),
            Segment::SwipeLeft1 => swipe_left(pose, false, |hand, _, sr| hand > sr),
            Segment::SwipeLeft2 => swipe_left(pose, false, |hand, sl, sr| hand > sl && hand < sr),
            Segment::SwipeLeft3 => swipe_left(pose, true, |hand, sl, _| hand < sl),
            Segment::SwipeUp1 => swipe_up_start(pose),
            Segment::SwipeUp2 => swipe_up_raised(pose, false),
            Segment::SwipeUp3 => swipe_up_raised(pose, true),
            Segment::SwipeDown1 => swipe_down(pose, 1),
            Segment::SwipeDown2 => swipe_down(pose, 2),
            Segment::SwipeDown3 => swipe_down(pose, 3),
            Segment::WaveRight1 => wave(pose, true, true),
            Segment::WaveRight2 => wave(pose, true, false),
            Segment::WaveLeft1 => wave(pose, false, true),
            Segment::WaveLeft2 => wave(pose, false, false),
            Segment::JoinedHands => joined_hands(pose),
            Segment::Menu => menu(pose),
            Segment::Zoom1 => zoom(pose, 1),
            Segment::Zoom2 => zoom(pose, 2),
            Segment::Zoom3 => zoom(pose, 3),
        }
    }
}

// Left hand sweeps from outside the left shoulder to past the right one.
// `phase` gets (hand x, left shoulder x, right shoulder x).
fn swipe_right(pose: &Pose, phase: impl Fn(f32, f32, f32) -> bool) -> SegmentResult {
    let hand = pose.pos(HandLeft);
    // left hand in front of the elbow, right hand resting low
    if !(hand.z < pose.pos(ElbowLeft).z && pose.pos(HandRight).y < pose.pos(SpineBase).y) {
        return Failed;
    }
    // between hip and head height
    if !(hand.y < pose.pos(Head).y && hand.y > pose.pos(SpineBase).y) {
        return Failed;
    }
    hit_or_wait(phase(hand.x, pose.pos(ShoulderLeft).x, pose.pos(ShoulderRight).x))
}

// Mirror of `swipe_right` for the right hand. The last phase must stay
// below shoulder level.
fn swipe_left(
    pose: &Pose,
    below_shoulders: bool,
    phase: impl Fn(f32, f32, f32) -> bool,
) -> SegmentResult {
    let hand = pose.pos(HandRight);
    if !(hand.z < pose.pos(ElbowRight).z && pose.pos(HandLeft).y < pose.pos(SpineShoulder).y) {
        return Failed;
    }
    let ceiling = if below_shoulders {
        pose.pos(SpineShoulder).y
    } else {
        pose.pos(Head).y
    };
    if !(hand.y < ceiling && hand.y > pose.pos(SpineBase).y) {
        return Failed;
    }
    hit_or_wait(phase(hand.x, pose.pos(ShoulderLeft).x, pose.pos(ShoulderRight).x))
}

// Right hand at chest height, out to the side of the hip.
fn swipe_up_start(pose: &Pose) -> SegmentResult {
    let hand = pose.pos(HandRight);
    if !(hand.z < pose.pos(ElbowRight).z && pose.pos(HandLeft).y < pose.pos(SpineShoulder).y) {
        return Failed;
    }
    if !(hand.y > pose.pos(SpineBase).y && hand.y < pose.pos(SpineShoulder).y) {
        return Failed;
    }
    hit_or_wait(hand.x > pose.pos(HipRight).x)
}

// Right hand above the shoulder; the final phase needs it above the head.
fn swipe_up_raised(pose: &Pose, above_head: bool) -> SegmentResult {
    let hand = pose.pos(HandRight);
    let shoulder = pose.pos(ShoulderRight);
    if hand.z >= shoulder.z {
        return Failed;
    }
    if hand.y <= shoulder.y {
        return Failed;
    }
    if above_head {
        hit_or_wait(hand.y > pose.pos(Head).y)
    } else {
        hit_or_wait(hand.x > shoulder.x)
    }
}

fn swipe_down(pose: &Pose, phase: u8) -> SegmentResult {
    let hand = pose.pos(HandRight);
    let elbow = pose.pos(ElbowRight);
    let hip = pose.pos(HipRight);
    if !(hand.z < elbow.z && hand.y < pose.pos(SpineShoulder).y) {
        return Failed;
    }
    match phase {
        1 => {
            if !(hand.y < pose.pos(Head).y && hand.y > elbow.y) {
                return Failed;
            }
            hit_or_wait(hand.x > pose.pos(ShoulderRight).x)
        }
        2 => {
            if hand.y >= elbow.y {
                return Failed;
            }
            hit_or_wait(hand.x > hip.x)
        }
        _ => {
            if hand.y >= hip.y {
                return Failed;
            }
            hit_or_wait(hand.x > hip.x)
        }
    }
}

// Hand raised above the elbow, past it toward the person's right
// (`toward_right`, larger x) or left.
fn wave(pose: &Pose, right: bool, toward_right: bool) -> SegmentResult {
    let (hand, elbow) = if right {
        (pose.pos(HandRight), pose.pos(ElbowRight))
    } else {
        (pose.pos(HandLeft), pose.pos(ElbowLeft))
    };
    // hand dropped
    if hand.y <= elbow.y {
        return Failed;
    }
    hit_or_wait(if toward_right { hand.x > elbow.x } else { hand.x < elbow.x })
}

// Both hands in front, at torso height.
fn hands_forward_at_torso(pose: &Pose) -> bool {
    let (l, r) = (pose.pos(HandLeft), pose.pos(HandRight));
    let top = pose.pos(SpineShoulder).y;
    let bottom = pose.pos(SpineBase).y;
    l.z < pose.pos(ElbowLeft).z
        && r.z < pose.pos(ElbowRight).z
        && r.y < top
        && r.y > bottom
        && l.y < top
        && l.y > bottom
}

fn hands_between_shoulders(pose: &Pose) -> bool {
    let (l, r) = (pose.pos(HandLeft), pose.pos(HandRight));
    let (sl, sr) = (pose.pos(ShoulderLeft).x, pose.pos(ShoulderRight).x);
    r.x < sr && r.x > sl && l.x > sl && l.x < sr
}

fn joined_hands(pose: &Pose) -> SegmentResult {
    if !hands_forward_at_torso(pose) || !hands_between_shoulders(pose) {
        return Failed;
    }
    // touching or crossed
    hit_or_wait(pose.pos(HandRight).x - pose.pos(HandLeft).x < 0.0)
}

fn menu(pose: &Pose) -> SegmentResult {
    let (l, r) = (pose.pos(HandLeft), pose.pos(HandRight));
    let hip = pose.pos(SpineBase);
    if !(l.y < hip.y && r.y < hip.y) {
        return Failed;
    }
    // left hand held out, away from the hip and past the elbow
    hit_or_wait(l.x < hip.x - 0.3 && l.x < pose.pos(ElbowLeft).x - 0.2)
}

fn zoom(pose: &Pose, phase: u8) -> SegmentResult {
    if !hands_forward_at_torso(pose) {
        return Failed;
    }
    let (l, r) = (pose.pos(HandLeft), pose.pos(HandRight));
    match phase {
        1 => hit_or_wait(hands_between_shoulders(pose)),
        2 => hit_or_wait(r.x > pose.pos(ShoulderRight).x && l.x < pose.pos(ShoulderLeft).x),
        _ => hit_or_wait(r.x > pose.pos(ElbowRight).x && l.x < pose.pos(ElbowLeft).x),
    }
}
