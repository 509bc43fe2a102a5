use crate::core::io::diagnostics::ChargeStatus;
use crate::core::models::ids::AtomId;
use crate::engine::config::MergePolicy;

/// A QM charge together with the fragment that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinedCharge {
    pub value: f64,
    pub center: AtomId,
    /// Distance from the producing fragment's center to the atom.
    pub distance: f64,
}

/// One refined value offered for an atom by a fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeWrite {
    pub atom: AtomId,
    pub value: f64,
    pub distance: f64,
}

/// Final per-atom charges, aligned to atom order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCharges {
    pub charges: Vec<f64>,
    pub statuses: Vec<ChargeStatus>,
}

impl MergedCharges {
    pub fn count(&self, status: ChargeStatus) -> usize {
        self.statuses.iter().filter(|&&s| s == status).count()
    }
}

/// Per-atom charge side table.
///
/// The empirical value is fixed at construction; refined values are only
/// written through [`ChargeLedger::merge_fragment`] under the ledger's policy.
#[derive(Debug, Clone)]
pub struct ChargeLedger {
    policy: MergePolicy,
    initial: Vec<f64>,
    initial_was_nan: Vec<bool>,
    refined: Vec<Option<RefinedCharge>>,
    unresolved: Vec<bool>,
}

impl ChargeLedger {
    /// Creates the ledger; NaN empirical values are stored as 0.0 and flagged.
    pub fn new(empirical: &[f64], policy: MergePolicy) -> Self {
        let initial_was_nan: Vec<bool> = empirical.iter().map(|c| c.is_nan()).collect();
        let initial = empirical
            .iter()
            .map(|&c| if c.is_nan() { 0.0 } else { c })
            .collect();
        Self {
            policy,
            initial,
            initial_was_nan,
            refined: vec![None; empirical.len()],
            unresolved: vec![false; empirical.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.initial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initial.is_empty()
    }

    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    pub fn refined(&self, atom: AtomId) -> Option<&RefinedCharge> {
        self.refined.get(atom.index()).and_then(Option::as_ref)
    }

    /// Applies one fragment's core charges, returning how many were accepted.
    pub fn merge_fragment(&mut self, center: AtomId, writes: &[ChargeWrite]) -> usize {
        let mut accepted = 0;
        for write in writes {
            let Some(slot) = self.refined.get_mut(write.atom.index()) else {
                continue;
            };
            let replace = match (self.policy, slot.as_ref()) {
                (_, None) => true,
                (MergePolicy::LastWriteWins, Some(_)) => true,
                (MergePolicy::NearestCenter, Some(current)) => write.distance < current.distance,
            };
            if replace {
                *slot = Some(RefinedCharge {
                    value: write.value,
                    center,
                    distance: write.distance,
                });
                accepted += 1;
            }
        }
        accepted
    }

    /// Flags atoms a failed fragment should have refined.
    pub fn mark_unresolved(&mut self, atoms: &[AtomId]) {
        for atom in atoms {
            if let Some(flag) = self.unresolved.get_mut(atom.index()) {
                *flag = true;
            }
        }
    }

    pub fn finalize(&self) -> MergedCharges {
        let (charges, statuses) = (0..self.len())
            .map(|i| match self.refined[i] {
                Some(r) if r.value.is_nan() => (0.0, ChargeStatus::NanZeroed),
                Some(r) => (r.value, ChargeStatus::Refined),
                None if self.unresolved[i] => (self.initial[i], ChargeStatus::Unresolved),
                None if self.initial_was_nan[i] => (0.0, ChargeStatus::NanZeroed),
                None => (self.initial[i], ChargeStatus::Empirical),
            })
            .unzip();
        MergedCharges { charges, statuses }
    }
}
