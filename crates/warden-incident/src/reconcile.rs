//! Full-listing reconciliation.
//!
//! Event streams can miss changes (a dropped connection, a container removed
//! while the daemon was down). A periodic full listing is compared against
//! the tracked resources, and anything tracked but no longer listed is
//! reported in the kind's "missing" state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use warden_proto::ResourceKey;

use crate::observation::Observation;
use crate::state::ResourceState;
use crate::tracker::Incident;

/// Extends `listing` with observations for tracked resources it no longer
/// contains.
///
/// Resources already in `missing` state are skipped so repeated listings do
/// not produce repeated transitions.
#[must_use]
pub fn reconcile<S: ResourceState>(
    known: &[Incident<S>],
    mut listing: Vec<Observation<S>>,
    missing: S,
    observed_at: DateTime<Utc>,
) -> Vec<Observation<S>> {
    let listed: HashSet<ResourceKey> = listing.iter().map(|o| o.resource.clone()).collect();

    for incident in known {
        if listed.contains(&incident.resource) || incident.last_state == missing {
            continue;
        }
        let mut obs = Observation::new(incident.resource.clone(), missing).at(observed_at);
        obs.label.clone_from(&incident.label);
        obs.group.clone_from(&incident.group);
        listing.push(obs);
    }

    listing
}
