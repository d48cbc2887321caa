use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::gestures::GestureKind;
use crate::ipc::dispatch::{Action, parse_action};
use crate::pose::{Frame, Pose};

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    #[serde(default)]
    pub allow_commands: bool,
}

/// Frame-count timing and catalog sizes shared by every gesture.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub window_frames: u32,
    pub pause_frames: u32,
    pub undetermined_pause_frames: Option<u32>,
    pub hold_repeats: usize,
    pub wave_repeats: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            window_frames: 50,
            pause_frames: 10,
            undetermined_pause_frames: None,
            hold_repeats: 20,
            wave_repeats: 3,
        }
    }
}

impl Thresholds {
    pub fn undetermined_pause(&self) -> u32 {
        self.undetermined_pause_frames
            .unwrap_or(self.pause_frames / 2)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySelection {
    #[default]
    Closest,
    FirstTracked,
}

impl BodySelection {
    pub fn pick(self, frame: &Frame) -> Option<&Pose> {
        match self {
            BodySelection::Closest => frame.closest(),
            BodySelection::FirstTracked => frame.first_tracked(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Recognition {
    /// Gesture names, or "all".
    pub gestures: Vec<String>,
    pub reset_all_on_recognition: bool,
    pub body: BodySelection,
}

impl Default for Recognition {
    fn default() -> Self {
        Self {
            gestures: vec!["all".into()],
            reset_all_on_recognition: true,
            body: BodySelection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Source {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub recognition: Recognition,
    #[serde(default)]
    pub source: Source,

    // nested tables flatten into "a.b" -> "value"
    #[serde(default, deserialize_with = "deserialize_bindings_flat")]
    pub bindings: HashMap<String, String>,
}

impl Profile {
    /// The profile compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(default_profile_text(), "built-in profile")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        Self::parse(&txt, &path.display().to_string())
    }

    fn parse(txt: &str, origin: &str) -> Result<Self> {
        let profile: Profile =
            toml::from_str(txt).map_err(|e| anyhow!("failed to parse {origin}: {e}"))?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    /// Enabled gestures in catalog order.
    pub fn gestures(&self) -> Result<Vec<GestureKind>> {
        let mut out = vec![];
        for name in &self.recognition.gestures {
            if name.trim().eq_ignore_ascii_case("all") {
                return Ok(GestureKind::ALL.to_vec());
            }
            let kind: GestureKind = name.parse().map_err(|e: String| anyhow!(e))?;
            if !out.contains(&kind) {
                out.push(kind);
            }
        }
        Ok(out)
    }

    pub fn binding_for(&self, kind: GestureKind) -> Option<&str> {
        self.bindings.get(kind.binding_key()).map(|s| s.as_str())
    }

    pub fn source_path(&self) -> PathBuf {
        match self.source.path.as_deref() {
            Some(p) => expand_home(p),
            None => default_source_path(),
        }
    }
}

// --------- custom bindings deserializer (tolerant) ----------
fn deserialize_bindings_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "bindings must be a table, got {:?}",
                other.type_str()
            )));
        }
    };

    let mut out = HashMap::new();
    flatten_table("", &table, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn flatten_table(
    prefix: &str,
    table: &toml::value::Table,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => {
                flatten_table(&key, sub, out)?;
            }
            other => {
                return Err(format!(
                    "binding '{}' value must be a string, got {}",
                    key,
                    other.type_str()
                ));
            }
        }
    }
    Ok(())
}
// ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn home_dir() -> PathBuf {
    UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir)
}

fn expand_home(p: &str) -> PathBuf {
    match p.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(p),
    }
}

pub fn config_dir() -> PathBuf {
    home_dir().join(".config").join("bodyctl")
}

pub fn default_source_path() -> PathBuf {
    home_dir().join(".local").join("run").join("bodyctl.poses")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_or_install_in(config_dir())
    }

    pub fn load_or_install_in(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn active_path(&self) -> PathBuf {
        self.profiles_dir.join(format!("{}.toml", self.active_name))
    }

    /// Re-reads the active profile. On error the previous one stays loaded.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        match fs::read_dir(&self.profiles_dir) {
            Ok(rd) => {
                for e in rd.flatten() {
                    let path = e.path();
                    if path.extension().is_some_and(|ext| ext == "toml") {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
            Err(e) => warn!("cannot read {}: {e}", self.profiles_dir.display()),
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        let source = self.profile.source_path();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "source": {
                "path": source,
                "exists": source.exists(),
                "fifo": is_fifo(&source),
            },
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input",
                "create_source": format!("mkfifo {}", source.display()),
            }
        })
    }
}

fn load_profile(dir: &Path, name: &str) -> Result<Profile> {
    Profile::from_path(&dir.join(format!("{name}.toml")))
}

fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if th.window_frames == 0 {
        return Err(anyhow!("thresholds.window_frames must be positive"));
    }
    if th.pause_frames >= th.window_frames || th.undetermined_pause() >= th.window_frames {
        return Err(anyhow!(
            "pause frames must be shorter than thresholds.window_frames ({})",
            th.window_frames
        ));
    }
    if th.hold_repeats == 0 || th.wave_repeats == 0 {
        return Err(anyhow!("thresholds.hold_repeats and wave_repeats must be at least 1"));
    }

    p.gestures()?;

    for (k, v) in &p.bindings {
        if k.trim().is_empty() {
            return Err(anyhow!("empty binding key"));
        }
        if !GestureKind::ALL.iter().any(|g| g.binding_key() == k) {
            return Err(anyhow!("binding '{}' does not name a gesture", k));
        }
        if v.trim().is_empty() {
            return Err(anyhow!("binding '{}' has empty action", k));
        }

        let action =
            parse_action(v).map_err(|e| anyhow!("binding '{}' has invalid action: {e}", k))?;
        if matches!(action, Action::Cmd(_)) && !p.meta.allow_commands {
            return Err(anyhow!(
                "binding '{}' uses cmd: but allow_commands=false",
                k
            ));
        }
    }
    Ok(())
}

pub fn is_fifo(p: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    fs::metadata(p)
        .map(|m| m.file_type().is_fifo())
        .unwrap_or(false)
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if let Some(rest) = line.strip_prefix("input:") {
                if rest
                    .split(':')
                    .nth(2)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
