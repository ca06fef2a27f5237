//! External mode flags: the day/night lockout and the recall override.

/// Capability supplied by the time-of-day / player collaborators.
pub trait ModeFlags {
    fn is_night(&self) -> bool;

    /// An authorized long-distance recall is moving the player.
    fn recall_override_active(&self) -> bool {
        false
    }

    /// Returning home should wipe the graph. Keyed on night by default.
    fn long_rest_due(&self) -> bool {
        self.is_night()
    }

    /// Current stage (day) used to gate which entity types may spawn.
    fn stage(&self) -> u32 {
        0
    }
}

/// Night without an override blocks every graph transition.
pub fn transitions_locked(modes: &dyn ModeFlags) -> bool {
    modes.is_night() && !modes.recall_override_active()
}

/// Plain-value flags for drivers and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedModes {
    pub night: bool,
    pub recall_override: bool,
    /// `None` follows `night`.
    pub long_rest: Option<bool>,
    pub stage: u32,
}

impl FixedModes {
    pub fn day() -> Self {
        Self::default()
    }

    pub fn night() -> Self {
        Self {
            night: true,
            ..Self::default()
        }
    }
}

impl ModeFlags for FixedModes {
    fn is_night(&self) -> bool {
        self.night
    }

    fn recall_override_active(&self) -> bool {
        self.recall_override
    }

    fn long_rest_due(&self) -> bool {
        self.long_rest.unwrap_or(self.night)
    }

    fn stage(&self) -> u32 {
        self.stage
    }
}

/// Wraps collaborator flags and forces the override on while a recall runs.
pub(crate) struct RecallOverride<'a> {
    inner: &'a dyn ModeFlags,
    active: bool,
}

impl<'a> RecallOverride<'a> {
    pub(crate) fn new(inner: &'a dyn ModeFlags, active: bool) -> Self {
        Self { inner, active }
    }
}

impl ModeFlags for RecallOverride<'_> {
    fn is_night(&self) -> bool {
        self.inner.is_night()
    }

    fn recall_override_active(&self) -> bool {
        self.active || self.inner.recall_override_active()
    }

    fn long_rest_due(&self) -> bool {
        self.inner.long_rest_due()
    }

    fn stage(&self) -> u32 {
        self.inner.stage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_needs_night_without_override() {
        assert!(!transitions_locked(&FixedModes::day()));
        assert!(transitions_locked(&FixedModes::night()));
        let recalling = FixedModes {
            night: true,
            recall_override: true,
            ..FixedModes::default()
        };
        assert!(!transitions_locked(&recalling));
    }

    #[test]
    fn long_rest_follows_night_unless_set() {
        assert!(FixedModes::night().long_rest_due());
        assert!(!FixedModes::day().long_rest_due());
        let forced = FixedModes {
            long_rest: Some(true),
            ..FixedModes::day()
        };
        assert!(forced.long_rest_due());
    }

    #[test]
    fn recall_wrapper_lifts_lockout() {
        let night = FixedModes::night();
        assert!(transitions_locked(&RecallOverride::new(&night, false)));
        assert!(!transitions_locked(&RecallOverride::new(&night, true)));
    }
}
