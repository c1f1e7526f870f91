//! Key bindings.
//!
//! Chords are written the ProseMirror way (`"Mod-z"`, `"Shift-Mod-z"`,
//! `"Backspace"`, `"$"`) and normalized on bind, so modifier order does not
//! matter.

use std::collections::HashMap;
use std::fmt;

use smol_str::SmolStr;

use crate::actions::{InsertMath, math_backspace, math_delete};
use crate::commands::{Chain, Command, delete_backward, delete_forward, select_all};
use crate::keys::KeyEvent;

/// What a bound chord does.
pub enum KeyAction {
    Command(Box<dyn Command>),
    Undo,
    Redo,
}

impl fmt::Debug for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(_) => f.write_str("Command(..)"),
            Self::Undo => f.write_str("Undo"),
            Self::Redo => f.write_str("Redo"),
        }
    }
}

pub struct Keymap {
    mac: bool,
    bindings: HashMap<SmolStr, KeyAction>,
}

impl fmt::Debug for Keymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chords: Vec<&SmolStr> = self.bindings.keys().collect();
        chords.sort();
        f.debug_struct("Keymap")
            .field("mac", &self.mac)
            .field("chords", &chords)
            .finish()
    }
}

impl Keymap {
    pub fn new(mac: bool) -> Self {
        Self {
            mac,
            bindings: HashMap::new(),
        }
    }

    /// The editor's default bindings with math support.
    ///
    /// `delimiter` inserts a math node via `insert`; Backspace and Delete
    /// select an adjacent math node before deleting it.
    pub fn math(delimiter: char, insert: InsertMath, mac: bool) -> Self {
        let mut keymap = Self::new(mac);
        keymap
            .bind(
                "Backspace",
                KeyAction::Command(Box::new(Chain::new(vec![
                    Box::new(math_backspace),
                    Box::new(delete_backward),
                ]))),
            )
            .bind(
                "Delete",
                KeyAction::Command(Box::new(Chain::new(vec![
                    Box::new(math_delete),
                    Box::new(delete_forward),
                ]))),
            )
            .bind("Mod-a", KeyAction::Command(Box::new(select_all)))
            .bind("Mod-z", KeyAction::Undo)
            .bind("Shift-Mod-z", KeyAction::Redo)
            .bind(
                &delimiter.to_string(),
                KeyAction::Command(Box::new(insert)),
            );
        if !mac {
            keymap.bind("Mod-y", KeyAction::Redo);
        }
        keymap
    }

    pub fn bind(&mut self, chord: &str, action: KeyAction) -> &mut Self {
        let chord = self.normalize(chord);
        tracing::trace!(%chord, ?action, "bind");
        self.bindings.insert(chord, action);
        self
    }

    pub fn lookup(&self, event: &KeyEvent) -> Option<&KeyAction> {
        self.bindings.get(&event.chord(self.mac))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn normalize(&self, chord: &str) -> SmolStr {
        // A trailing "-" is the minus key itself.
        let (mods, key) = match chord.strip_suffix("--") {
            Some(rest) => (rest, "-"),
            None if chord == "-" => ("", "-"),
            None => match chord.rsplit_once('-') {
                Some((mods, key)) => (mods, key),
                None => ("", chord),
            },
        };
        let mut event = KeyEvent::new(key, 0);
        for part in mods.split('-').filter(|p| !p.is_empty()) {
            match part {
                "Mod" if self.mac => event.meta = true,
                "Mod" => event.ctrl = true,
                "Ctrl" | "Control" => event.ctrl = true,
                "Meta" | "Cmd" => event.meta = true,
                "Alt" => event.alt = true,
                "Shift" => event.shift = true,
                other => tracing::warn!(modifier = other, chord, "unknown modifier in key binding"),
            }
        }
        event.chord(self.mac)
    }
}
