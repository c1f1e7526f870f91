//! Platform-neutral key events.

use smol_str::SmolStr;

/// A keystroke as seen by the editor.
///
/// `key` is the logical key value (`"z"`, `"Backspace"`, `"$"`); `code` is the
/// legacy numeric key code, used for layout-independent shortcut checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyEvent {
    pub key: SmolStr,
    pub code: u32,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

const CODE_Y: u32 = 89;
const CODE_Z: u32 = 90;
const CODE_BACKTICK: u32 = 192;

impl KeyEvent {
    pub fn new(key: impl Into<SmolStr>, code: u32) -> Self {
        Self {
            key: key.into(),
            code,
            ..Default::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    fn has_mod(&self) -> bool {
        self.ctrl || self.meta
    }

    pub fn is_undo(&self) -> bool {
        !self.alt && self.has_mod() && self.code == CODE_Z && !self.shift
    }

    pub fn is_redo(&self) -> bool {
        !self.alt
            && self.has_mod()
            && (self.code == CODE_Y || (self.code == CODE_Z && self.shift))
    }

    pub fn is_backtick(&self) -> bool {
        !self.alt && !self.ctrl && !self.meta && !self.shift && self.code == CODE_BACKTICK
    }

    /// Normalized chord name, e.g. `Mod-Shift-z`, `Backspace`, `$`.
    ///
    /// `Mod` is Cmd on mac and Ctrl elsewhere. Shift is left out for
    /// single-character keys whose shifted form is already in `key`.
    pub fn chord(&self, mac: bool) -> SmolStr {
        let mut chars = self.key.chars();
        let single = match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        };
        let (modifier, other) = if mac {
            (self.meta, self.ctrl)
        } else {
            (self.ctrl, self.meta)
        };

        let mut out = String::new();
        if modifier {
            out.push_str("Mod-");
        }
        if other {
            out.push_str(if mac { "Ctrl-" } else { "Meta-" });
        }
        if self.alt {
            out.push_str("Alt-");
        }
        let shift_in_key = single.is_some_and(|c| !c.is_alphabetic());
        if self.shift && !shift_in_key {
            out.push_str("Shift-");
        }
        match single {
            Some(c) if c.is_alphabetic() => out.extend(c.to_lowercase()),
            _ => out.push_str(&self.key),
        }
        out.into()
    }
}

/// What a widget should do with a keystroke after interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeystrokeOutcome {
    /// Not handled; the widget applies its default handling.
    Forward,
    /// Handled by the bridge. The native default action is suppressed when
    /// `prevent_default` is set.
    Handled { prevent_default: bool },
}
