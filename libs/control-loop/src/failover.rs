use agent_api::ClusterRole;

/// Operator-requested role change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    FailOver,
    FailBack,
}

impl Transition {
    pub fn target(self) -> ClusterRole {
        match self {
            Transition::FailOver => ClusterRole::Backup,
            Transition::FailBack => ClusterRole::Primary,
        }
    }
}

/// Result of applying a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub from: ClusterRole,
    pub to: ClusterRole,
}

impl Switch {
    /// True when the command named the role that was already active.
    pub fn is_repeat(&self) -> bool {
        self.from == self.to
    }
}

/// Two-state Primary/Backup machine. Starts on Primary, never terminates.
///
/// Transitions are not guarded: FailOver while on Backup is obeyed and
/// produces a `Switch` from Backup to Backup, so the caller rebuilds the
/// session against the same target.
#[derive(Debug)]
pub struct Failover {
    active: ClusterRole,
    switches: u64,
}

impl Default for Failover {
    fn default() -> Self {
        Self::new()
    }
}

impl Failover {
    pub fn new() -> Self {
        Self {
            active: ClusterRole::Primary,
            switches: 0,
        }
    }

    pub fn active(&self) -> ClusterRole {
        self.active
    }

    /// Number of transitions applied so far, repeats included.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    pub fn apply(&mut self, transition: Transition) -> Switch {
        let switch = Switch {
            from: self.active,
            to: transition.target(),
        };
        self.active = switch.to;
        self.switches += 1;
        switch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_primary() {
        let fsm = Failover::new();
        assert_eq!(fsm.active(), ClusterRole::Primary);
        assert_eq!(fsm.switches(), 0);
    }

    #[test]
    fn fail_over_then_back() {
        let mut fsm = Failover::new();
        let s = fsm.apply(Transition::FailOver);
        assert_eq!(s, Switch { from: ClusterRole::Primary, to: ClusterRole::Backup });
        assert!(!s.is_repeat());
        let s = fsm.apply(Transition::FailBack);
        assert_eq!(s, Switch { from: ClusterRole::Backup, to: ClusterRole::Primary });
        assert_eq!(fsm.active(), ClusterRole::Primary);
    }

    #[test]
    fn repeated_commands_are_obeyed() {
        let mut fsm = Failover::new();
        let s = fsm.apply(Transition::FailBack);
        assert!(s.is_repeat());
        assert_eq!(fsm.active(), ClusterRole::Primary);

        fsm.apply(Transition::FailOver);
        let s = fsm.apply(Transition::FailOver);
        assert!(s.is_repeat());
        assert_eq!(s.to, ClusterRole::Backup);
        assert_eq!(fsm.switches(), 3);
    }
}
