//! Per-frame body snapshots and their JSON-lines wire format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Index;
use thiserror::Error;

pub const JOINT_COUNT: usize = 25;

/// Joints of the Kinect v2 body model. Declaration order is the array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JointType {
    SpineBase,
    SpineMid,
    Neck,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    SpineShoulder,
    HandTipLeft,
    ThumbLeft,
    HandTipRight,
    ThumbRight,
}

impl JointType {
    pub const ALL: [JointType; JOINT_COUNT] = [
        JointType::SpineBase,
        JointType::SpineMid,
        JointType::Neck,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
        JointType::SpineShoulder,
        JointType::HandTipLeft,
        JointType::ThumbLeft,
        JointType::HandTipRight,
        JointType::ThumbRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    #[default]
    Tracked,
    NotTracked,
    Inferred,
}

/// Sensor-space position in meters: +Y up, +Z away from the sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Joint {
    pub position: Position,
    pub state: TrackingState,
}

/// One body in one frame. Every joint is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub tracking_id: u64,
    pub tracked: bool,
    joints: [Joint; JOINT_COUNT],
}

impl Pose {
    /// All joints at the origin, tracked.
    pub fn new(tracking_id: u64) -> Self {
        Self {
            tracking_id,
            tracked: true,
            joints: [Joint::default(); JOINT_COUNT],
        }
    }

    pub fn pos(&self, joint: JointType) -> Position {
        self.joints[joint.index()].position
    }

    pub fn set(&mut self, joint: JointType, x: f32, y: f32, z: f32) -> &mut Self {
        self.joints[joint.index()].position = Position::new(x, y, z);
        self
    }

    pub fn set_state(&mut self, joint: JointType, state: TrackingState) -> &mut Self {
        self.joints[joint.index()].state = state;
        self
    }

    pub fn with(mut self, joint: JointType, x: f32, y: f32, z: f32) -> Self {
        self.set(joint, x, y, z);
        self
    }

    pub fn distance(&self, a: JointType, b: JointType) -> f32 {
        self.pos(a).distance(&self.pos(b))
    }

    pub fn tracked_joints(&self) -> usize {
        self.joints
            .iter()
            .filter(|j| j.state == TrackingState::Tracked)
            .count()
    }
}

impl Index<JointType> for Pose {
    type Output = Joint;

    fn index(&self, joint: JointType) -> &Joint {
        &self.joints[joint.index()]
    }
}

/// All bodies the sensor reported for one frame.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub bodies: Vec<Pose>,
}

impl Frame {
    /// First tracked body in sensor order.
    pub fn first_tracked(&self) -> Option<&Pose> {
        self.bodies.iter().find(|b| b.tracked)
    }

    /// Tracked body whose spine base is nearest to the sensor.
    pub fn closest(&self) -> Option<&Pose> {
        self.bodies
            .iter()
            .filter(|b| b.tracked)
            .min_by(|a, b| {
                a.pos(JointType::SpineBase)
                    .z
                    .total_cmp(&b.pos(JointType::SpineBase).z)
            })
    }
}

#[derive(Debug, Error)]
pub enum PoseError {
    #[error("malformed pose json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("body {tracking_id} is missing joint {joint:?}")]
    MissingJoint { tracking_id: u64, joint: JointType },
}

// ---------------- wire format ----------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JointWire {
    x: f32,
    y: f32,
    z: f32,
    #[serde(default)]
    state: TrackingState,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BodyWire {
    tracking_id: u64,
    #[serde(default = "default_true")]
    is_tracked: bool,
    joints: BTreeMap<JointType, JointWire>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FrameWire {
    Multi { bodies: Vec<BodyWire> },
    Single(BodyWire),
}

impl TryFrom<BodyWire> for Pose {
    type Error = PoseError;

    fn try_from(w: BodyWire) -> Result<Self, PoseError> {
        let mut pose = Pose::new(w.tracking_id);
        pose.tracked = w.is_tracked;
        for joint in JointType::ALL {
            let j = w.joints.get(&joint).ok_or(PoseError::MissingJoint {
                tracking_id: w.tracking_id,
                joint,
            })?;
            pose.joints[joint.index()] = Joint {
                position: Position::new(j.x, j.y, j.z),
                state: j.state,
            };
        }
        Ok(pose)
    }
}

impl From<&Pose> for BodyWire {
    fn from(p: &Pose) -> Self {
        let joints = JointType::ALL
            .iter()
            .map(|&jt| {
                let j = p[jt];
                (
                    jt,
                    JointWire {
                        x: j.position.x,
                        y: j.position.y,
                        z: j.position.z,
                        state: j.state,
                    },
                )
            })
            .collect();
        Self {
            tracking_id: p.tracking_id,
            is_tracked: p.tracked,
            joints,
        }
    }
}

/// Decode one JSON line: either a single body or `{"bodies": [...]}`.
pub fn decode_frame(line: &str) -> Result<Frame, PoseError> {
    let wire: FrameWire = serde_json::from_str(line)?;
    let bodies = match wire {
        FrameWire::Multi { bodies } => bodies,
        FrameWire::Single(b) => vec![b],
    };
    let bodies = bodies
        .into_iter()
        .map(Pose::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Frame { bodies })
}

/// Encode one body as a single JSON line (no trailing newline).
pub fn encode_pose(pose: &Pose) -> Result<String, PoseError> {
    Ok(serde_json::to_string(&BodyWire::from(pose))?)
}
