//! Global stop key, backed by `rdev`.
//!
//! # Usage
//!
//! ```no_run
//! use voice_fx::hotkey::{parse_key, StopKeyListener};
//! use voice_fx::pipeline::CancelToken;
//!
//! let cancel = CancelToken::new();
//! let key = parse_key("Escape").expect("unknown key");
//! let _listener = StopKeyListener::start(key, cancel.clone()).unwrap();
//! // ... poll `cancel.is_cancelled()` in the processing loop
//! ```

pub mod listener;

pub use listener::StopKeyListener;

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a key name from a config string into an [`rdev::Key`].
///
/// Supports F1–F12, common named keys and single ASCII letters in either case.
/// Returns `None` for unrecognised names.
///
/// # Examples
///
/// ```
/// use voice_fx::hotkey::parse_key;
///
/// assert_eq!(parse_key("F9"),     Some(rdev::Key::F9));
/// assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
/// assert_eq!(parse_key("q"),      Some(rdev::Key::KeyQ));
/// assert_eq!(parse_key("xyz"),    None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key;

    let named = match name {
        "Escape" | "Esc" => Key::Escape,
        "Space" => Key::Space,
        "Return" | "Enter" => Key::Return,
        "Tab" => Key::Tab,
        "Backspace" => Key::Backspace,
        "Delete" | "Del" => Key::Delete,
        "Home" => Key::Home,
        "End" => Key::End,
        "PageUp" => Key::PageUp,
        "PageDown" => Key::PageDown,
        "Pause" => Key::Pause,
        "ScrollLock" => Key::ScrollLock,
        "PrintScreen" => Key::PrintScreen,
        _ => return function_key(name).or_else(|| letter_key(name)),
    };
    Some(named)
}

fn function_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key::*;
    const KEYS: [rdev::Key; 12] = [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12];

    let n: usize = name.strip_prefix('F')?.parse().ok()?;
    KEYS.get(n.checked_sub(1)?).copied()
}

fn letter_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key::*;
    const KEYS: [rdev::Key; 26] = [
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN, KeyO,
        KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
    ];

    let mut chars = name.chars();
    let c = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !c.is_ascii_uppercase() {
        return None;
    }
    Some(KEYS[(c as u8 - b'A') as usize])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_function_keys() {
        assert_eq!(parse_key("F1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("F12"), Some(rdev::Key::F12));
        assert_eq!(parse_key("F0"), None);
        assert_eq!(parse_key("F13"), None);
    }

    #[test]
    fn parse_named_keys() {
        assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Esc"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Enter"), Some(rdev::Key::Return));
        assert_eq!(parse_key("Pause"), Some(rdev::Key::Pause));
    }

    #[test]
    fn parse_letter_keys_case_insensitive() {
        assert_eq!(parse_key("A"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("a"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("z"), Some(rdev::Key::KeyZ));
        // "F" alone is the letter, not a function key.
        assert_eq!(parse_key("F"), Some(rdev::Key::KeyF));
    }

    #[test]
    fn parse_unknown_key_returns_none() {
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("Ctrl+C"), None);
        assert_eq!(parse_key("1"), None);
    }
}
