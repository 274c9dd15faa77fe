//! Which language-selector option holds which framework.

use blockharvest_core::{Framework, FrameworkMapping};
use tracing::debug;

/// Option index per framework, in `Framework::ALL` order; `None` when unavailable.
pub type Slots = [Option<usize>; 3];

/// Fixed positions: 0 = HTML, 1 = React, 2 = Vue.
pub fn slots_by_position(option_count: usize) -> Slots {
    Framework::ALL.map(|fw| Some(fw.position()).filter(|&i| i < option_count))
}

/// First option whose label names the framework; unrecognized labels are skipped.
pub fn slots_by_label<S: AsRef<str>>(labels: &[S]) -> Slots {
    let mut slots: Slots = [None; 3];
    for (index, label) in labels.iter().enumerate() {
        let label = label.as_ref();
        match Framework::from_label(label) {
            Some(fw) => {
                let slot = &mut slots[fw.position()];
                if slot.is_none() {
                    *slot = Some(index);
                }
            }
            None => debug!(label, index, "Ignoring unrecognized language option"),
        }
    }
    slots
}

pub fn uses_labels(mapping: FrameworkMapping) -> bool {
    matches!(mapping, FrameworkMapping::Label)
}
