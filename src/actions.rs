use anyhow::{Result, anyhow};
use log::{info, warn};

pub struct UinputSink {
    enabled: bool,
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                enabled: true,
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self {
                enabled: true,
                linux: None,
            })
        }
    }

    pub fn noop() -> Self {
        Self {
            enabled: true,
            linux: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    pub fn set_enabled(&mut self, en: bool) {
        self.enabled = en;
    }

    pub fn scroll(&mut self, horizontal: bool, steps: i32) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.scroll(horizontal, steps)?;
        }
        Ok(())
    }

    pub fn click_mouse(&mut self, which: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let button = parse_button(which)?;
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.click(button)?;
        }
        let _ = button;
        Ok(())
    }

    /// Send a chord like "CTRL+EQUAL" or single "TAB"
    pub fn key_chord(&mut self, chord: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let names = parse_chord(chord)?;
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            let mut keys = Vec::with_capacity(names.len());
            for n in &names {
                keys.push(map_key(n)?);
            }
            // press in order
            for k in &keys {
                dev.key_send(*k, 1)?;
            }
            dev.sync()?;
            // release in reverse
            for k in keys.iter().rev() {
                dev.key_send(*k, 0)?;
            }
            dev.sync()?;
        }
        let _ = names;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
    Middle,
}

pub fn parse_button(which: &str) -> Result<Button> {
    match which.trim().to_ascii_lowercase().as_str() {
        "left" => Ok(Button::Left),
        "right" => Ok(Button::Right),
        "middle" => Ok(Button::Middle),
        other => Err(anyhow!("unknown mouse button: {other}")),
    }
}

/// Splits and upper-cases a chord, checking every token is a known key.
pub fn parse_chord(chord: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = chord
        .split('+')
        .map(|s| s.trim().to_ascii_uppercase())
        .collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(anyhow!("malformed key chord: '{chord}'"));
    }
    for p in &parts {
        if !KEY_NAMES.contains(&canonical_key(p)) {
            return Err(anyhow!("unsupported key token: {p}"));
        }
    }
    Ok(parts)
}

fn canonical_key(tok: &str) -> &str {
    match tok {
        "CONTROL" => "CTRL",
        "META" | "WIN" => "SUPER",
        "-" => "MINUS",
        "=" => "EQUAL",
        "ESCAPE" => "ESC",
        "RETURN" => "ENTER",
        "PGUP" => "PAGEUP",
        "PGDN" => "PAGEDOWN",
        other => other,
    }
}

const KEY_NAMES: [&str; 58] = [
    "CTRL", "ALT", "SHIFT", "SUPER", "TAB", "MINUS", "EQUAL", "ESC", "ENTER", "SPACE",
    "BACKSPACE", "DELETE", "HOME", "END", "PAGEUP", "PAGEDOWN", "LEFT", "RIGHT", "UP", "DOWN",
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12", "A", "B", "C", "D",
    "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W",
    "X", "Y", "Z",
];

#[cfg(target_os = "linux")]
fn map_key(tok: &str) -> Result<uinput::event::keyboard::Key> {
    use uinput::event::keyboard::Key as K;
    let k = match canonical_key(tok) {
        "CTRL" => K::LeftControl,
        "ALT" => K::LeftAlt,
        "SHIFT" => K::LeftShift,
        "SUPER" => K::LeftMeta,
        "TAB" => K::Tab,
        "MINUS" => K::Minus,
        "EQUAL" => K::Equal,
        "ESC" => K::Esc,
        "ENTER" => K::Enter,
        "SPACE" => K::Space,
        "BACKSPACE" => K::BackSpace,
        "DELETE" => K::Delete,
        "HOME" => K::Home,
        "END" => K::End,
        "PAGEUP" => K::PageUp,
        "PAGEDOWN" => K::PageDown,
        "LEFT" => K::Left,
        "RIGHT" => K::Right,
        "UP" => K::Up,
        "DOWN" => K::Down,
        "F1" => K::F1,
        "F2" => K::F2,
        "F3" => K::F3,
        "F4" => K::F4,
        "F5" => K::F5,
        "F6" => K::F6,
        "F7" => K::F7,
        "F8" => K::F8,
        "F9" => K::F9,
        "F10" => K::F10,
        "F11" => K::F11,
        "F12" => K::F12,
        "A" => K::A,
        "B" => K::B,
        "C" => K::C,
        "D" => K::D,
        "E" => K::E,
        "F" => K::F,
        "G" => K::G,
        "H" => K::H,
        "I" => K::I,
        "J" => K::J,
        "K" => K::K,
        "L" => K::L,
        "M" => K::M,
        "N" => K::N,
        "O" => K::O,
        "P" => K::P,
        "Q" => K::Q,
        "R" => K::R,
        "S" => K::S,
        "T" => K::T,
        "U" => K::U,
        "V" => K::V,
        "W" => K::W,
        "X" => K::X,
        "Y" => K::Y,
        "Z" => K::Z,
        other => return Err(anyhow!("unsupported key token: {other}")),
    };
    Ok(k)
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{controller::Mouse, relative};

        let mut builder = uinput::default()?
            .name("bodyctl virtual input")?
            // relative axes + wheel
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(relative::Wheel::Vertical)?
            .event(relative::Wheel::Horizontal)?
            // mouse buttons
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?;
        // every key a binding can name
        for name in KEY_NAMES {
            builder = builder.event(map_key(name)?)?;
        }
        let dev = builder.create()?;

        info!("uinput: created virtual device");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn key_send(&mut self, key: uinput::event::keyboard::Key, val: i32) -> Result<()> {
        self.dev.send(key, val)?;
        Ok(())
    }

    fn click(&mut self, button: Button) -> Result<()> {
        use uinput::event::controller::Mouse;
        let m = match button {
            Button::Left => Mouse::Left,
            Button::Right => Mouse::Right,
            Button::Middle => Mouse::Middle,
        };
        self.dev.send(m, 1)?;
        self.sync()?;
        self.dev.send(m, 0)?;
        self.sync()
    }

    fn scroll(&mut self, horizontal: bool, steps: i32) -> Result<()> {
        use uinput::event::relative::Wheel;
        let wheel = if horizontal {
            Wheel::Horizontal
        } else {
            Wheel::Vertical
        };
        self.dev.send(wheel, steps)?;
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chords_are_normalised_and_checked() {
        assert_eq!(parse_chord("ctrl + equal").unwrap(), vec!["CTRL", "EQUAL"]);
        assert_eq!(parse_chord("Escape").unwrap(), vec!["ESCAPE"]);
        assert!(parse_chord("CTRL+").is_err());
        assert!(parse_chord("HYPER+X").is_err());
    }

    #[test]
    fn every_key_name_maps() {
        #[cfg(target_os = "linux")]
        for name in KEY_NAMES {
            assert!(map_key(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn noop_sink_honours_enabled_flag() {
        let mut sink = UinputSink::noop();
        assert!(sink.is_enabled());
        sink.set_enabled(false);
        assert!(sink.key_chord("NOT_A_KEY").is_ok());
        sink.set_enabled(true);
        assert!(sink.key_chord("NOT_A_KEY").is_err());
        assert!(sink.click_mouse("left").is_ok());
        assert!(sink.click_mouse("thumb").is_err());
    }
}
