/// Activity flags for the inequality constraints of one subproblem.
///
/// The working set is the subset of inequality constraints currently treated
/// as equalities.  Physically it is this parallel flag array indexed by
/// constraint position alongside the problem's immutable inequality factors;
/// there is no separate constraint container to drift out of sync.  Cloning
/// the set snapshots the activity state, so a solve can be restarted from any
/// recorded configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    active: Vec<bool>,
}

impl WorkingSet {
    /// A working set over `num_constraints` inequalities, all inactive.
    pub fn new(num_constraints: usize) -> Self {
        Self {
            active: vec![false; num_constraints],
        }
    }

    /// A working set with caller-supplied activity flags.
    pub fn with_flags(active: Vec<bool>) -> Self {
        Self { active }
    }

    /// Number of constraints tracked (active and inactive).
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_active(&self, ix: usize) -> bool {
        self.active[ix]
    }

    pub fn activate(&mut self, ix: usize) {
        self.active[ix] = true;
    }

    pub fn deactivate(&mut self, ix: usize) {
        self.active[ix] = false;
    }

    pub fn num_active(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Positions of the active constraints, in ascending order.
    pub fn active_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, &a)| a)
            .map(|(ix, _)| ix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        let mut ws = WorkingSet::new(3);
        assert_eq!(ws.len(), 3);
        assert_eq!(ws.num_active(), 0);

        ws.activate(1);
        assert!(ws.is_active(1));
        assert!(!ws.is_active(0));
        assert_eq!(ws.num_active(), 1);
        assert_eq!(ws.active_positions().collect::<Vec<_>>(), vec![1]);

        ws.deactivate(1);
        assert_eq!(ws.num_active(), 0);
    }

    #[test]
    fn test_snapshot_restart() {
        let mut ws = WorkingSet::with_flags(vec![true, false]);
        let snapshot = ws.clone();
        ws.deactivate(0);
        assert_ne!(ws, snapshot);
        assert!(snapshot.is_active(0));
    }
}
