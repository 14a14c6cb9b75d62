use repkl_schema::{Composition, Identifier};
use std::collections::BTreeSet;
use tracing::debug;

/// Identifiers to repackage for `target`: its own id plus every resource it
/// references, minus the resources of `base` when one is given.
///
/// Only the base's resource ids are subtracted, never `base.id`. The result
/// may be empty.
pub fn resolve_target_ids(
    target: &Composition,
    base: Option<&Composition>,
) -> BTreeSet<Identifier> {
    let mut ids: BTreeSet<Identifier> = target.resource_ids.clone();
    ids.insert(target.id.clone());

    if let Some(base) = base {
        let before = ids.len();
        ids.retain(|id| !base.resource_ids.contains(id));
        debug!(
            "base composition {} removed {} of {} identifiers",
            base.id,
            before - ids.len(),
            before
        );
    }

    ids
}
