use anyhow::Result;
use log::{error, info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    thread,
    time::{Duration, SystemTime},
};

use super::dispatch::{Outcome, dispatch_event};
use super::server::DaemonEvent;
use crate::actions::UinputSink;
use crate::config::{self, Profile, Recognition, Thresholds};
use crate::controller::GestureController;
use crate::input;

const IDLE: Duration = Duration::from_millis(500);

fn snapshot(profile: &Mutex<Profile>) -> Profile {
    match profile.lock() {
        Ok(p) => p.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// The controller plus the settings it was built from.
struct Recognizer {
    controller: GestureController,
    thresholds: Thresholds,
    recognition: Recognition,
}

impl Recognizer {
    fn build(profile: &Profile, tx_evt: &Sender<DaemonEvent>) -> Result<Self> {
        let mut controller = GestureController::from_profile(profile)?;
        let tx = tx_evt.clone();
        controller.subscribe(move |ev| {
            let _ = tx.send(DaemonEvent::Recognized(*ev));
        });
        info!("pipeline: {} gestures enabled", controller.gestures().len());
        Ok(Self {
            controller,
            thresholds: profile.thresholds.clone(),
            recognition: profile.recognition.clone(),
        })
    }

    fn is_current(&self, profile: &Profile) -> bool {
        self.thresholds == profile.thresholds && self.recognition == profile.recognition
    }
}

pub fn run_pipeline(
    profile: Arc<Mutex<Profile>>,
    enabled: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    tx_evt: Sender<DaemonEvent>,
) -> Result<()> {
    let mut recognizer = Recognizer::build(&snapshot(&profile), &tx_evt)?;
    let mut sink = UinputSink::new().unwrap_or_else(|e| {
        warn!("uinput unavailable ({e}); gestures will only be logged");
        UinputSink::noop()
    });

    let mut waiting_for: Option<PathBuf> = None;
    let mut last_read: Option<(PathBuf, Option<SystemTime>)> = None;

    while !stop.load(Ordering::SeqCst) {
        let path = snapshot(&profile).source_path();
        if !path.exists() {
            if waiting_for.as_ref() != Some(&path) {
                warn!("pose source {} missing; pipeline idle", path.display());
                waiting_for = Some(path);
            }
            thread::sleep(IDLE);
            continue;
        }
        waiting_for = None;

        // a regular file is read once per modification, a FIFO per writer
        let fifo = config::is_fifo(&path);
        let stamp = modified(&path);
        if !fifo && last_read.as_ref() == Some(&(path.clone(), stamp)) {
            thread::sleep(IDLE);
            continue;
        }

        let res = read_source(
            &path,
            &profile,
            &enabled,
            &stop,
            &tx_evt,
            &mut recognizer,
            &mut sink,
        );
        if let Err(e) = res {
            error!("pose source {}: {e}", path.display());
            thread::sleep(IDLE);
        }
        last_read = Some((path, stamp));
    }
    info!("pipeline: stopped");
    Ok(())
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn read_source(
    path: &Path,
    profile: &Mutex<Profile>,
    enabled: &AtomicBool,
    stop: &AtomicBool,
    tx_evt: &Sender<DaemonEvent>,
    recognizer: &mut Recognizer,
    sink: &mut UinputSink,
) -> Result<()> {
    // opening a FIFO blocks until a writer shows up
    let reader = input::open_path(path)?;
    info!("pipeline: reading poses from {}", path.display());

    for frame in reader {
        let frame = frame?;
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let prof = snapshot(profile);
        if !recognizer.is_current(&prof) {
            match Recognizer::build(&prof, tx_evt) {
                Ok(r) => *recognizer = r,
                Err(e) => error!("pipeline: keeping previous gestures: {e}"),
            }
        }

        let Some(pose) = prof.recognition.body.pick(&frame) else {
            continue;
        };
        for ev in recognizer.controller.update(pose) {
            match dispatch_event(&ev, &prof, enabled, sink) {
                Ok(Outcome::Toggled(on)) => {
                    let _ = tx_evt.send(DaemonEvent::Log(format!(
                        "output {} by {}",
                        if on { "enabled" } else { "disabled" },
                        ev.kind
                    )));
                }
                Ok(_) => {}
                Err(e) => error!("dispatch failed: {e}"),
            }
        }
    }
    Ok(())
}
