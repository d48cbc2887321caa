use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::{
    process::Command,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use crate::actions::{UinputSink, parse_button, parse_chord};
use crate::config::Profile;
use crate::gestures::GestureEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Key(String),
    Mouse(String),
    Scroll { horizontal: bool, steps: i32 },
    Toggle,
    Log,
    Cmd(String),
}

/// Parses a binding, checking key names, buttons and scroll axes so a bad
/// binding is caught when the profile loads rather than when it fires.
pub fn parse_action(s: &str) -> Result<Action> {
    let s = s.trim();
    match s {
        "toggle" => return Ok(Action::Toggle),
        "log" => return Ok(Action::Log),
        _ => {}
    }
    if let Some(rest) = s.strip_prefix("key:") {
        parse_chord(rest)?;
        return Ok(Action::Key(rest.trim().to_string()));
    }
    if let Some(rest) = s.strip_prefix("mouse:") {
        parse_button(rest)?;
        return Ok(Action::Mouse(rest.trim().to_string()));
    }
    if let Some(rest) = s.strip_prefix("scroll:") {
        // "vertical@-3"; a bare axis scrolls one step
        let (axis, steps) = rest.split_once('@').unwrap_or((rest, "+1"));
        let horizontal = match axis.trim().to_ascii_lowercase().as_str() {
            "vertical" => false,
            "horizontal" => true,
            other => return Err(anyhow!("unknown scroll axis: {other}")),
        };
        let steps: i32 = steps
            .trim()
            .parse()
            .map_err(|_| anyhow!("bad scroll steps in '{s}'"))?;
        return Ok(Action::Scroll { horizontal, steps });
    }
    if let Some(rest) = s.strip_prefix("cmd:") {
        let line = rest.trim();
        if line.is_empty() {
            return Err(anyhow!("empty command in '{s}'"));
        }
        return Ok(Action::Cmd(line.to_string()));
    }
    Err(anyhow!("unknown action '{s}'"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Performed,
    Unbound,
    /// Output is toggled off.
    Suppressed,
    Toggled(bool),
}

/// Runs the action bound to `ev`. `toggle` always runs so a disabled daemon
/// can be switched back on; every other action is suppressed while `enabled`
/// is false.
pub fn dispatch_event(
    ev: &GestureEvent,
    profile: &Profile,
    enabled: &AtomicBool,
    sink: &mut UinputSink,
) -> Result<Outcome> {
    let Some(binding) = profile.binding_for(ev.kind) else {
        debug!("no binding for {}", ev.kind.binding_key());
        return Ok(Outcome::Unbound);
    };
    let action = parse_action(binding)?;

    if action == Action::Toggle {
        let now = !enabled.fetch_xor(true, Ordering::SeqCst);
        info!("output {}", if now { "enabled" } else { "disabled" });
        return Ok(Outcome::Toggled(now));
    }

    sink.set_enabled(enabled.load(Ordering::SeqCst));
    if !sink.is_enabled() {
        return Ok(Outcome::Suppressed);
    }

    match action {
        Action::Key(chord) => sink.key_chord(&chord)?,
        Action::Mouse(button) => sink.click_mouse(&button)?,
        Action::Scroll { horizontal, steps } => sink.scroll(horizontal, steps)?,
        Action::Log => info!("gesture {} from body {}", ev.kind, ev.tracking_id),
        Action::Cmd(line) => {
            if !profile.meta.allow_commands {
                return Err(anyhow!(
                    "binding '{}' uses cmd: but allow_commands=false",
                    ev.kind.binding_key()
                ));
            }
            let mut child = Command::new("sh")
                .arg("-c")
                .arg(&line)
                .env("BODYCTL_GESTURE", ev.kind.as_str())
                .env("BODYCTL_TRACKING_ID", ev.tracking_id.to_string())
                .spawn()
                .map_err(|e| anyhow!("failed to spawn '{line}': {e}"))?;
            debug!("spawned '{line}' (pid={})", child.id());
            // reap without blocking the pipeline
            thread::spawn(move || match child.wait() {
                Ok(status) if !status.success() => warn!("'{line}' exited with {status}"),
                Ok(_) => {}
                Err(e) => warn!("waiting for '{line}': {e}"),
            });
        }
        Action::Toggle => {}
    }
    Ok(Outcome::Performed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gestures::GestureKind;

    fn event(kind: GestureKind) -> GestureEvent {
        GestureEvent {
            kind,
            tracking_id: 1,
        }
    }

    #[test]
    fn parses_actions() {
        assert_eq!(parse_action("toggle").unwrap(), Action::Toggle);
        assert_eq!(parse_action("key:CTRL+MINUS").unwrap(), Action::Key("CTRL+MINUS".into()));
        assert_eq!(parse_action("mouse: left").unwrap(), Action::Mouse("left".into()));
        assert_eq!(
            parse_action("scroll:vertical@+3").unwrap(),
            Action::Scroll {
                horizontal: false,
                steps: 3
            }
        );
        assert_eq!(
            parse_action("scroll:horizontal@-2").unwrap(),
            Action::Scroll {
                horizontal: true,
                steps: -2
            }
        );
        assert_eq!(
            parse_action("scroll:vertical").unwrap(),
            Action::Scroll {
                horizontal: false,
                steps: 1
            }
        );
        assert!(parse_action("scroll:diagonal@1").is_err());
        assert!(parse_action("scroll:vertical@lots").is_err());
        assert!(parse_action("dance").is_err());
        assert!(parse_action("key:FOO").is_err());
        assert!(parse_action("key:CTRL+").is_err());
        assert!(parse_action("mouse:thumb").is_err());
        assert!(parse_action("cmd:  ").is_err());
    }

    #[test]
    fn toggle_runs_even_when_disabled() {
        let p = Profile::builtin().unwrap();
        let enabled = AtomicBool::new(true);
        let mut sink = UinputSink::noop();

        let hands = event(GestureKind::JoinedHands);
        assert_eq!(
            dispatch_event(&hands, &p, &enabled, &mut sink).unwrap(),
            Outcome::Toggled(false)
        );
        assert_eq!(
            dispatch_event(&event(GestureKind::SwipeLeft), &p, &enabled, &mut sink).unwrap(),
            Outcome::Suppressed
        );
        assert_eq!(
            dispatch_event(&hands, &p, &enabled, &mut sink).unwrap(),
            Outcome::Toggled(true)
        );
        assert_eq!(
            dispatch_event(&event(GestureKind::SwipeLeft), &p, &enabled, &mut sink).unwrap(),
            Outcome::Performed
        );
    }

    #[test]
    fn unbound_and_gated_commands() {
        let mut p = Profile::builtin().unwrap();
        let enabled = AtomicBool::new(true);
        let mut sink = UinputSink::noop();

        p.bindings.remove("menu");
        assert_eq!(
            dispatch_event(&event(GestureKind::Menu), &p, &enabled, &mut sink).unwrap(),
            Outcome::Unbound
        );

        p.bindings.insert("menu".into(), "cmd:true".into());
        assert!(dispatch_event(&event(GestureKind::Menu), &p, &enabled, &mut sink).is_err());
    }

    #[test]
    fn allowed_commands_run_and_are_reaped() {
        let mut p = Profile::builtin().unwrap();
        p.meta.allow_commands = true;
        p.bindings.insert("menu".into(), "cmd:true".into());
        let enabled = AtomicBool::new(true);
        let mut sink = UinputSink::noop();

        for _ in 0..3 {
            assert_eq!(
                dispatch_event(&event(GestureKind::Menu), &p, &enabled, &mut sink).unwrap(),
                Outcome::Performed
            );
        }

        enabled.store(false, Ordering::SeqCst);
        assert_eq!(
            dispatch_event(&event(GestureKind::Menu), &p, &enabled, &mut sink).unwrap(),
            Outcome::Suppressed
        );
    }
}
