use crate::protocol::{ActuatorSettings, GridDims, VENT_LEVEL_RANGE, VENT_SPEED_RANGE};

/// Actuator settings plus the pending-send flag.
///
/// Setters return whether the value changed. Unchanged or out-of-range values
/// leave both the settings and the dirty flag untouched.
#[derive(Debug, Clone)]
pub(crate) struct ActuatorState {
    settings: ActuatorSettings,
    dirty: bool,
    installed: bool,
}

impl ActuatorState {
    pub(crate) fn new(dims: GridDims) -> Self {
        Self {
            settings: ActuatorSettings::for_grid(dims),
            dirty: false,
            installed: false,
        }
    }

    pub(crate) const fn settings(&self) -> &ActuatorSettings {
        &self.settings
    }

    pub(crate) const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) const fn is_installed(&self) -> bool {
        self.installed
    }

    fn mark(&mut self, changed: bool) -> bool {
        self.dirty |= changed;
        changed
    }

    pub(crate) fn set_position(&mut self, position: [i32; 3]) -> bool {
        let changed = self.settings.position != position;
        self.settings.position = position;
        self.mark(changed)
    }

    pub(crate) fn set_direction(&mut self, direction: i32) -> bool {
        let changed = self.settings.direction != direction;
        self.settings.direction = direction;
        self.mark(changed)
    }

    pub(crate) fn set_vent_level(&mut self, level: i32) -> bool {
        if !VENT_LEVEL_RANGE.contains(&level) || self.settings.vent_level == level {
            return false;
        }
        self.settings.vent_level = level;
        self.mark(true)
    }

    pub(crate) fn set_vent_speed(&mut self, speed: i32) -> bool {
        if !VENT_SPEED_RANGE.contains(&speed) || self.settings.vent_speed == speed {
            return false;
        }
        self.settings.vent_speed = speed;
        self.mark(true)
    }

    /// Kind and position together, as reported by the placement UI.
    pub(crate) fn set_info(&mut self, kind: i32, position: [i32; 3]) -> bool {
        let kind_changed = self.settings.kind != kind;
        self.settings.kind = kind;
        let position_changed = self.set_position(position);
        self.mark(kind_changed) | position_changed
    }

    pub(crate) fn set_temperatures(&mut self, current: f32, target: f32) -> bool {
        if !current.is_finite() || !target.is_finite() {
            return false;
        }
        let changed = self.settings.current_temp != current || self.settings.target_temp != target;
        self.settings.current_temp = current;
        self.settings.target_temp = target;
        self.mark(changed)
    }

    /// Reset requests always resend, even if one is already pending.
    pub(crate) fn request_reset(&mut self) {
        self.settings.reset = true;
        self.dirty = true;
    }

    /// Server acknowledged the actuator info.
    pub(crate) fn clear_reset(&mut self) {
        self.settings.reset = false;
    }

    /// First placement: start polling physics and push the settings.
    pub(crate) fn install(&mut self) {
        self.installed = true;
        self.dirty = true;
    }

    /// Move back to the default spot for `dims` after the grid changed.
    pub(crate) fn rehome(&mut self, dims: GridDims) {
        self.settings.position = dims.actuator_home();
    }

    pub(crate) fn commit(&mut self) {
        self.dirty = false;
    }
}
