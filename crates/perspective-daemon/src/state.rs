//! Controller state record.

use std::collections::BTreeSet;

use perspective_types::{DisplayId, PerspectiveState};

use crate::registry::CallbackRegistry;

/// The single authoritative record, guarded by the controller lock.
///
/// `interactive_input_enabled` is derived: after every locked transaction it
/// equals [`interactive_target`](Self::interactive_target).
#[derive(Debug, Default)]
pub struct ControllerState {
    pub perspective: PerspectiveState,
    pub interactive_input_enabled: bool,
    /// Attached presentation displays. A set, so a detach for a display
    /// never seen cannot drive the count below zero.
    pub presentation_displays: BTreeSet<DisplayId>,
    pub registry: CallbackRegistry,
}

impl ControllerState {
    /// Whether a START command's precondition holds.
    pub fn can_start(&self) -> bool {
        self.perspective == PerspectiveState::Stopped
    }

    /// Whether a STOP command's precondition holds.
    pub fn can_stop(&self) -> bool {
        self.perspective == PerspectiveState::Running
    }

    pub fn presentation_connected(&self) -> bool {
        !self.presentation_displays.is_empty()
    }

    /// What `interactive_input_enabled` must be given the other fields.
    pub fn interactive_target(&self) -> bool {
        self.presentation_connected() && self.perspective == PerspectiveState::Running
    }

    /// Bring the derived field in line. Returns the new value if it changed.
    pub fn refresh_interactive(&mut self) -> Option<bool> {
        let target = self.interactive_target();
        if target == self.interactive_input_enabled {
            None
        } else {
            self.interactive_input_enabled = target;
            Some(target)
        }
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.perspective,
            interactive_input_enabled: self.interactive_input_enabled,
            presentation_displays: self.presentation_displays.len(),
            registered_clients: self.registry.len(),
        }
    }
}

/// Snapshot published after every locked transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStatus {
    pub state: PerspectiveState,
    pub interactive_input_enabled: bool,
    pub presentation_displays: usize,
    pub registered_clients: usize,
}

impl std::fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (interactive: {}, presentation displays: {}, clients: {})",
            self.state,
            self.interactive_input_enabled,
            self.presentation_displays,
            self.registered_clients
        )
    }
}
