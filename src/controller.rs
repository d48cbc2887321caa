//! Owns the active gestures and fans each frame out to them.

use anyhow::Result;
use log::{debug, info};

use crate::config::{Profile, Thresholds};
use crate::gestures::{Gesture, GestureEvent, GestureKind, GestureProgress};
use crate::pose::Pose;

type Listener = Box<dyn FnMut(&GestureEvent)>;

pub struct GestureController {
    th: Thresholds,
    gestures: Vec<Gesture>,
    listeners: Vec<Listener>,
    reset_all_on_recognition: bool,
    // tracking id of the body fed last
    body: Option<u64>,
}

impl GestureController {
    pub fn new(th: Thresholds) -> Self {
        Self {
            th,
            gestures: vec![],
            listeners: vec![],
            reset_all_on_recognition: true,
            body: None,
        }
    }

    /// A controller with every known gesture registered.
    pub fn with_all(th: Thresholds) -> Self {
        let mut c = Self::new(th);
        for kind in GestureKind::ALL {
            c.add_gesture(kind);
        }
        c
    }

    /// Controller for the gestures and reset policy a profile enables.
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let mut c = Self::new(profile.thresholds.clone());
        c.set_reset_all_on_recognition(profile.recognition.reset_all_on_recognition);
        for kind in profile.gestures()? {
            c.add_gesture(kind);
        }
        Ok(c)
    }

    /// When on (the default), any recognition resets every gesture, not only
    /// the one that fired.
    pub fn set_reset_all_on_recognition(&mut self, on: bool) {
        self.reset_all_on_recognition = on;
    }

    /// Registers `kind`. Returns false if it was already registered.
    pub fn add_gesture(&mut self, kind: GestureKind) -> bool {
        if self.gestures.iter().any(|g| g.kind() == kind) {
            return false;
        }
        self.gestures.push(Gesture::new(kind, &self.th));
        true
    }

    pub fn remove_gesture(&mut self, kind: GestureKind) -> bool {
        let before = self.gestures.len();
        self.gestures.retain(|g| g.kind() != kind);
        self.gestures.len() != before
    }

    pub fn gestures(&self) -> Vec<GestureKind> {
        self.gestures.iter().map(|g| g.kind()).collect()
    }

    pub fn progress(&self, kind: GestureKind) -> Option<GestureProgress> {
        self.gestures
            .iter()
            .find(|g| g.kind() == kind)
            .map(|g| g.progress())
    }

    /// Listeners run synchronously, in subscription order, inside `update`.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&GestureEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn reset(&mut self) {
        for g in &mut self.gestures {
            g.reset();
        }
    }

    /// Feed one frame to every gesture, in registration order.
    ///
    /// Progress belongs to one body: a pose from a different tracking id
    /// restarts every gesture before it is evaluated.
    pub fn update(&mut self, pose: &Pose) -> Vec<GestureEvent> {
        let prev = self.body.replace(pose.tracking_id);
        if let Some(prev) = prev.filter(|&id| id != pose.tracking_id) {
            debug!("body {prev} replaced by {}; gestures restarted", pose.tracking_id);
            self.reset();
        }

        let mut events = vec![];
        for i in 0..self.gestures.len() {
            let Some(ev) = self.gestures[i].update(pose) else {
                continue;
            };
            info!("recognized {} (body {})", ev.kind, ev.tracking_id);
            for l in &mut self.listeners {
                l(&ev);
            }
            if self.reset_all_on_recognition {
                self.reset();
            }
            events.push(ev);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{self, standing};
    use std::{cell::RefCell, rc::Rc};

    fn run(c: &mut GestureController, poses: &[Pose]) -> Vec<GestureEvent> {
        poses.iter().flat_map(|p| c.update(p)).collect()
    }

    #[test]
    fn add_gesture_is_idempotent() {
        let mut c = GestureController::new(Thresholds::default());
        assert!(c.add_gesture(GestureKind::Menu));
        assert!(!c.add_gesture(GestureKind::Menu));
        assert_eq!(c.gestures(), vec![GestureKind::Menu]);

        let mut all = GestureController::with_all(Thresholds::default());
        assert_eq!(all.gestures().len(), GestureKind::ALL.len());
        assert!(!all.add_gesture(GestureKind::SwipeUp));
        assert_eq!(all.gestures().len(), GestureKind::ALL.len());
    }

    #[test]
    fn remove_gesture() {
        let mut c = GestureController::with_all(Thresholds::default());
        assert!(c.remove_gesture(GestureKind::ZoomIn));
        assert!(!c.remove_gesture(GestureKind::ZoomIn));
        assert!(c.progress(GestureKind::ZoomIn).is_none());
        assert!(c.progress(GestureKind::ZoomOut).is_some());
    }

    #[test]
    fn each_script_fires_once_among_all_gestures() {
        let th = Thresholds::default();
        for kind in GestureKind::ALL {
            let mut c = GestureController::with_all(th.clone());
            let mut poses = vec![standing(4); 3];
            poses.extend(synth::script(kind, &th, 4));
            poses.extend(vec![standing(4); 3]);
            let events = run(&mut c, &poses);
            assert_eq!(
                events,
                vec![GestureEvent {
                    kind,
                    tracking_id: 4
                }],
                "{kind}"
            );
        }
    }

    #[test]
    fn listeners_hear_events_in_order() {
        let th = Thresholds::default();
        let mut c = GestureController::new(th.clone());
        c.add_gesture(GestureKind::SwipeLeft);

        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        let a = log.clone();
        c.subscribe(move |ev| a.borrow_mut().push(format!("a:{}", ev.kind)));
        let b = log.clone();
        c.subscribe(move |ev| b.borrow_mut().push(format!("b:{}", ev.tracking_id)));

        let events = run(&mut c, &synth::script(GestureKind::SwipeLeft, &th, 9));
        assert_eq!(events.len(), 1);
        assert_eq!(*log.borrow(), vec!["a:swipe_left", "b:9"]);
    }

    // JoinedHands cut down to one segment fires on its first frame, while
    // ZoomIn (registered first) is one segment in and waits on that frame.
    fn joined_hands_during_zoom(reset_all: bool) -> (Vec<GestureEvent>, GestureProgress) {
        let mut th = Thresholds::default();
        th.hold_repeats = 1;
        let mut c = GestureController::new(th);
        c.set_reset_all_on_recognition(reset_all);
        c.add_gesture(GestureKind::ZoomIn);
        c.add_gesture(GestureKind::JoinedHands);

        c.update(&synth::keyframes(GestureKind::ZoomIn, 1)[0]);
        assert_eq!(c.progress(GestureKind::ZoomIn).unwrap().segment, 1);

        let events = c.update(&synth::keyframes(GestureKind::JoinedHands, 1)[0]);
        (events, c.progress(GestureKind::ZoomIn).unwrap())
    }

    #[test]
    fn recognition_resets_every_gesture() {
        let (events, zoom) = joined_hands_during_zoom(true);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GestureKind::JoinedHands);
        assert_eq!(zoom.segment, 0);
    }

    #[test]
    fn reset_all_policy_can_be_disabled() {
        let (events, zoom) = joined_hands_during_zoom(false);
        assert_eq!(events.len(), 1);
        assert_eq!(zoom.segment, 1);
    }

    #[test]
    fn another_body_restarts_progress() {
        let th = Thresholds::default();
        let mut c = GestureController::new(th);
        c.add_gesture(GestureKind::SwipeRight);

        let first = synth::keyframes(GestureKind::SwipeRight, 1);
        let second = synth::keyframes(GestureKind::SwipeRight, 2);
        assert!(run(&mut c, &first[..2]).is_empty());
        assert_eq!(c.progress(GestureKind::SwipeRight).unwrap().segment, 2);

        // the last phase performed by someone else does not complete it
        assert!(c.update(&second[2]).is_empty());
        assert_eq!(c.progress(GestureKind::SwipeRight).unwrap().segment, 0);

        // the same body carries on as usual
        assert_eq!(run(&mut c, &second).len(), 1);
    }

    #[test]
    fn built_from_profile() {
        let mut p = Profile::builtin().unwrap();
        p.recognition.gestures = vec!["zoom_out".into(), "menu".into()];
        p.recognition.reset_all_on_recognition = false;
        let c = GestureController::from_profile(&p).unwrap();
        assert_eq!(c.gestures(), vec![GestureKind::ZoomOut, GestureKind::Menu]);
        assert!(!c.reset_all_on_recognition);

        p.recognition.gestures = vec!["somersault".into()];
        assert!(GestureController::from_profile(&p).is_err());
    }

    #[test]
    fn explicit_reset() {
        let th = Thresholds::default();
        let mut c = GestureController::new(th);
        c.add_gesture(GestureKind::ZoomIn);
        c.update(&synth::keyframes(GestureKind::ZoomIn, 2)[0]);
        assert_eq!(c.progress(GestureKind::ZoomIn).unwrap().segment, 1);
        c.reset();
        let p = c.progress(GestureKind::ZoomIn).unwrap();
        assert_eq!(p.segment, 0);
        assert!(!p.paused);
    }
}
