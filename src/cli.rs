use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{
    env,
    io::{self, Write},
    path::Path,
    process::Command,
};

use crate::config::Profile;
use crate::controller::GestureController;
use crate::gestures::GestureKind;
use crate::{input, ipc, pose, synth};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("bodyctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(serde_json::json!({"op":"shutdown"})),
        Some("status") => request(serde_json::json!({"op":"status"})),
        Some("reload") => request(serde_json::json!({"op":"reload"})),
        Some("list") => request(serde_json::json!({"op":"list"})),
        Some("doctor") => request(serde_json::json!({"op":"doctor"})),
        Some("toggle") => request(serde_json::json!({"op":"toggle"})),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: bodyctl use <profile_name>"))?;
            request(serde_json::json!({"op":"use","profile":name}))
        }

        Some("gestures") => {
            let profile = profile_arg(&mut pargs)?;
            print_gestures(&profile);
            Ok(())
        }

        Some("replay") => {
            let profile = profile_arg(&mut pargs)?;
            let src: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: bodyctl replay <file|-> [--profile <path>]"))?;
            replay(&src, &profile)
        }

        Some("synth") => {
            let profile = profile_arg(&mut pargs)?;
            let tracking_id: u64 = pargs.opt_value_from_str("--tracking-id")?.unwrap_or(1);
            let lead_in: usize = pargs.opt_value_from_str("--lead-in")?.unwrap_or(15);
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: bodyctl synth <gesture> [--tracking-id N]"))?;
            let kind: GestureKind = name.parse().map_err(|e: String| anyhow!(e))?;
            write_synth(kind, &profile, tracking_id, lead_in)
        }

        Some("emit") => {
            // usage:
            //   bodyctl emit click right
            //   bodyctl emit scroll 3
            //   bodyctl emit key CTRL+EQUAL
            let what: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: bodyctl emit <click|scroll|key> ..."))?;
            let mut sink = crate::actions::UinputSink::new()?;
            match what.as_str() {
                "click" => {
                    let btn: String = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: bodyctl emit click <left|right|middle>"))?;
                    sink.click_mouse(&btn)?;
                    println!("ok: clicked {btn}");
                }
                "scroll" => {
                    let steps: i32 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: bodyctl emit scroll <steps>"))?;
                    sink.scroll(false, steps)?;
                    println!("ok: scrolled vertical {steps}");
                }
                "key" => {
                    let chord: String = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: bodyctl emit key CTRL+EQUAL"))?;
                    sink.key_chord(&chord)?;
                    println!("ok: sent key chord {chord}");
                }
                other => return Err(anyhow!("unknown emit kind: {other}")),
            }
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

/// `--profile <path>`, or the built-in profile.
fn profile_arg(pargs: &mut Arguments) -> Result<Profile> {
    let path: Option<String> = pargs.opt_value_from_str("--profile")?;
    match path {
        Some(p) => Profile::from_path(Path::new(&p)),
        None => Profile::builtin(),
    }
}

fn print_gestures(profile: &Profile) {
    let enabled = profile.gestures().unwrap_or_default();
    for kind in GestureKind::ALL {
        let segments = kind.segments(&profile.thresholds).len();
        let mark = if enabled.contains(&kind) { '*' } else { ' ' };
        let binding = profile.binding_for(kind).unwrap_or("-");
        println!(
            "{mark} {:<13} {:<13} {segments:>3} segments  {binding}",
            kind.as_str(),
            kind.binding_key()
        );
    }
}

fn replay(src: &str, profile: &Profile) -> Result<()> {
    let mut controller = GestureController::from_profile(profile)?;
    let mut reader = input::open_arg(src)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut frames = 0u64;
    let mut events = 0u64;
    while let Some(frame) = reader.next_frame()? {
        frames += 1;
        let Some(pose) = profile.recognition.body.pick(&frame) else {
            continue;
        };
        for ev in controller.update(pose) {
            events += 1;
            let line = serde_json::json!({
                "frame": frames,
                "gesture": ev.kind,
                "tracking_id": ev.tracking_id,
            });
            writeln!(out, "{line}")?;
        }
    }
    eprintln!(
        "replay: {frames} frames, {events} gestures, {} malformed lines skipped",
        reader.skipped
    );
    Ok(())
}

fn write_synth(kind: GestureKind, profile: &Profile, tracking_id: u64, lead_in: usize) -> Result<()> {
    let rest = synth::standing(tracking_id);
    let mut poses = vec![rest.clone(); lead_in];
    poses.extend(synth::script(kind, &profile.thresholds, tracking_id));
    poses.extend(vec![rest; lead_in]);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for p in &poses {
        writeln!(out, "{}", pose::encode_pose(p)?)?;
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"bodyctl: body-gesture daemon for depth-sensor skeleton streams

USAGE:
  bodyctl help [command]                 Show general or command-specific help
  bodyctl start                          Start the daemon
  bodyctl stop                           Stop the daemon
  bodyctl status                         Show daemon state and recognition counts
  bodyctl reload                         Reload active profile
  bodyctl use <name>                     Switch active profile
  bodyctl list                           List profiles
  bodyctl doctor                         Diagnose permissions and the pose source
  bodyctl toggle                         Turn gesture output off or back on
  bodyctl gestures [--profile <path>]    List known gestures and their bindings
  bodyctl replay <file|-> [--profile <path>]
                                         Recognize gestures in a recorded pose stream
  bodyctl synth <gesture> [--tracking-id N] [--lead-in N]
                                         Print a pose stream that performs <gesture>
  bodyctl emit click <left|right|middle> Emit a mouse click
  bodyctl emit scroll <steps>            Emit vertical scroll (+/- steps)
  bodyctl emit key CTRL+EQUAL            Emit a key or chord

TIPS:
  - Profiles: ~/.config/bodyctl/profiles
  - Active profile pointer: ~/.config/bodyctl/active
  - Pose source: mkfifo ~/.local/run/bodyctl.poses and write JSON lines to it
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: bodyctl start\nStarts the background daemon."),
        "stop" => println!("usage: bodyctl stop\nStops the running daemon."),
        "status" => println!(
            "usage: bodyctl status\nShows enabled flag, active profile, pose source, socket and per-gesture counts."
        ),
        "reload" => println!(
            "usage: bodyctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: bodyctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: bodyctl list\nLists available profiles and the active one."),
        "doctor" => println!(
            "usage: bodyctl doctor\nChecks uinput permissions and whether the pose source exists."
        ),
        "toggle" => println!(
            "usage: bodyctl toggle\nSuppresses or re-enables bound actions; gestures are still recognized."
        ),
        "gestures" => println!(
            "usage: bodyctl gestures [--profile <path>]\nLists every gesture, its binding key, segment count and action; '*' marks enabled ones."
        ),
        "replay" => println!(
            "usage: bodyctl replay <file|-> [--profile <path>]\nFeeds a JSON-lines pose stream through the recognizer and prints one line per gesture."
        ),
        "synth" => println!(
            "usage: bodyctl synth <gesture> [--tracking-id N] [--lead-in N] [--profile <path>]\nPrints a JSON-lines pose stream that performs <gesture>, padded with N standing frames."
        ),
        "emit" => println!(
            "usage:\n  bodyctl emit click <left|right|middle>\n  bodyctl emit scroll <steps>\n  bodyctl emit key CTRL+EQUAL"
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
