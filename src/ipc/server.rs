use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    collections::BTreeMap,
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::run_pipeline;
use super::runtime::socket_path;
use crate::config::{DaemonConfigState, Profile};
use crate::gestures::GestureEvent;

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path();
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut state = DaemonState::new()?;
    info!("daemon: active profile '{}'", state.cfg.active_name);

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let (tx_evt, rx_evt) = mpsc::channel::<DaemonEvent>();

    watch_signals(tx_req.clone())?;
    let _watcher = watch_profiles(&state.cfg.profiles_dir, tx_req.clone());

    // gesture thread
    let mut gesture_thread = GestureThread::start(
        state.cfg.profile.clone(),
        state.enabled.clone(),
        tx_evt,
    );

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        if let Ok((stream, _)) = listener.accept() {
            let tx = tx_req.clone();
            let st_snapshot = state.clone_shallow();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, st_snapshot, tx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(evt) = rx_evt.try_recv() {
            match evt {
                DaemonEvent::Recognized(ev) => {
                    if let Ok(mut stats) = state.stats.lock() {
                        stats.record(ev);
                    }
                }
                DaemonEvent::Log(s) => info!("[gesture] {s}"),
            }
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => state.reload(&mut gesture_thread),
                IpcMsg::ProfileChanged(paths) => {
                    let active = state.cfg.active_path();
                    if paths.iter().any(|p| p.file_name() == active.file_name()) {
                        info!("daemon: {} changed on disk", active.display());
                        state.reload(&mut gesture_thread);
                    }
                }
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = state.cfg.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        let new_prof = state.cfg.profile.clone();
                        gesture_thread.update_profile(new_prof);
                        info!("switched active profile to {}", state.cfg.active_name);
                    }
                }
                IpcMsg::Shutdown => {
                    gesture_thread.stop();
                    let _ = std::fs::remove_file(&sock);
                    info!("daemon: shut down");
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn watch_signals(tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("daemon: caught signal {sig}");
            let _ = tx_req.send(IpcMsg::Shutdown);
        }
    });
    Ok(())
}

/// Profile edits on disk become reload requests. Without a watcher the
/// daemon still reloads on `bodyctl reload`.
fn watch_profiles(dir: &Path, tx_req: Sender<IpcMsg>) -> Option<RecommendedWatcher> {
    let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(ev) if matches!(ev.kind, EventKind::Create(_) | EventKind::Modify(_)) => {
            let _ = tx_req.send(IpcMsg::ProfileChanged(ev.paths));
        }
        Ok(_) => {}
        Err(e) => warn!("profile watcher: {e}"),
    });
    let mut watcher = match watcher {
        Ok(w) => w,
        Err(e) => {
            warn!("profile hot-reload disabled: {e}");
            return None;
        }
    };
    if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        warn!("cannot watch {}: {e}", dir.display());
        return None;
    }
    Some(watcher)
}

fn handle_client(mut stream: UnixStream, st: DaemonState, tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => {
            let stats = match st.stats.lock() {
                Ok(s) => serde_json::to_value(&*s)?,
                Err(_) => serde_json::Value::Null,
            };
            let gestures: Vec<&str> = st
                .cfg
                .profile
                .gestures()
                .unwrap_or_default()
                .iter()
                .map(|g| g.as_str())
                .collect();
            serde_json::json!({"ok": true, "data": {
                "enabled": st.enabled.load(Ordering::SeqCst),
                "active_profile": st.cfg.active_name,
                "socket": socket_path(),
                "source": st.cfg.profile.source_path(),
                "gestures": gestures,
                "stats": stats,
            }})
        }
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": st.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            if st.cfg.list_profiles().iter().any(|p| p == name) {
                let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
                serde_json::json!({"ok": true, "data": {"active_profile": name}})
            } else {
                serde_json::json!({"ok": false, "error": format!("profile not found: {name}")})
            }
        }
        "list" => {
            let list = st.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.cfg.active_name}})
        }
        "doctor" => {
            let report = st.cfg.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "toggle" => {
            let now = !st.enabled.fetch_xor(true, Ordering::SeqCst);
            info!("output {} over ipc", if now { "enabled" } else { "disabled" });
            serde_json::json!({"ok": true, "data": {"enabled": now}})
        }
        "shutdown" => {
            // reply before the daemon starts tearing down
            writeln!(stream, "{}", serde_json::json!({"ok": true, "data": "shutting down"}))?;
            let _ = tx_req.send(IpcMsg::Shutdown);
            return Ok(());
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct Stats {
    recognized: BTreeMap<&'static str, u64>,
    last: Option<GestureEvent>,
}

impl Stats {
    fn record(&mut self, ev: GestureEvent) {
        *self.recognized.entry(ev.kind.as_str()).or_default() += 1;
        self.last = Some(ev);
    }
}

struct DaemonState {
    enabled: Arc<AtomicBool>,
    stats: Arc<Mutex<Stats>>,
    cfg: DaemonConfigState,
}

impl DaemonState {
    fn new() -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        Ok(Self {
            enabled: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(Mutex::new(Stats::default())),
            cfg,
        })
    }
    fn clone_shallow(&self) -> Self {
        Self {
            enabled: self.enabled.clone(),
            stats: self.stats.clone(),
            cfg: self.cfg.clone(),
        }
    }
    fn reload(&mut self, gesture_thread: &mut GestureThread) {
        if let Err(e) = self.cfg.reload() {
            error!("reload failed: {e}");
        } else {
            gesture_thread.update_profile(self.cfg.profile.clone());
            info!("profile reloaded");
        }
    }
}

enum IpcMsg {
    Reload,
    ProfileChanged(Vec<PathBuf>),
    UseProfile(String),
    Shutdown,
}

pub enum DaemonEvent {
    Recognized(GestureEvent),
    Log(String),
}

struct GestureThread {
    profile: Arc<Mutex<Profile>>,
    stop: Arc<AtomicBool>,
}

impl GestureThread {
    fn start(profile: Profile, enabled: Arc<AtomicBool>, tx_evt: Sender<DaemonEvent>) -> Self {
        let profile_arc = Arc::new(Mutex::new(profile));
        let stop = Arc::new(AtomicBool::new(false));
        let prof_clone = profile_arc.clone();
        let stop_clone = stop.clone();
        // detached: a reader blocked on an idle FIFO must not hold up shutdown
        thread::spawn(move || {
            if let Err(e) = run_pipeline(prof_clone, enabled, stop_clone, tx_evt) {
                error!("gesture pipeline failed: {e}");
            }
        });
        Self {
            profile: profile_arc,
            stop,
        }
    }
    fn update_profile(&mut self, new_profile: Profile) {
        if let Ok(mut p) = self.profile.lock() {
            *p = new_profile;
        }
    }
    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path();
    if !sock.exists() {
        return Err(anyhow!(
            "bodyctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
