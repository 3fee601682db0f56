// dist_fft2d - A distributed two-dimensional real-to-complex FFT engine
// Copyright (C) 2021 Julian Jeggle, Raphael Wittkowski

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Collective-communication substrate contract and a reference,
//! in-process implementation of it.
//!
//! The engine itself never assumes a particular transport: it is handed
//! a [`Communicator`] trait object per named collective and just calls
//! `scatter_to`/`scatter_from`/`all_to_all` on it, generation-tagged.
//! [`ThreadCommunicator`] realises that contract with one rendezvous hub
//! per basename, shared across simulated localities via
//! [`CommunicatorRegistry`], standing in for the external collective
//! substrate; in a real deployment it would be an HPX or MPI binding
//! instead.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{FftError, Result};

/// A named collective endpoint with a fixed site count and this
/// locality's site index, keyed per call by a generation counter so
/// repeated calls on the same communicator cannot alias.
pub trait Communicator: Send + Sync {
    fn site_count(&self) -> usize;
    fn this_site(&self) -> usize;

    /// Called by the root of a scatter collective: `payload[j]` is the
    /// share destined for site `j`. Returns this (the root's) own share.
    fn scatter_to(&self, payload: Vec<Vec<f64>>, generation: u64) -> Result<Vec<f64>>;

    /// Called by every non-root site of a scatter collective: blocks
    /// until the root has deposited its payload, then returns this
    /// site's share.
    fn scatter_from(&self, generation: u64) -> Result<Vec<f64>>;

    /// All-to-all: `payload[j]` is this site's contribution to site `j`.
    /// Returns the receive set in source-rank order.
    fn all_to_all(&self, payload: Vec<Vec<f64>>, generation: u64) -> Result<Vec<Vec<f64>>>;
}

// Generous but finite: the in-process reference substrate has no peer
// process that can die mid-rendezvous, so a timeout here only guards
// against a genuine protocol bug (mismatched generation sequences
// between simulated localities) turning into a silent hang in tests.
const RENDEZVOUS_TIMEOUT: Duration = Duration::from_secs(30);

struct ScatterSlot {
    // One entry per site; taken (via `Option::take`) exactly once each.
    payload: Vec<Option<Vec<f64>>>,
    taken: usize,
}

struct ScatterHub {
    site_count: usize,
    slots: Mutex<HashMap<u64, ScatterSlot>>,
    cvar: Condvar,
}

impl ScatterHub {
    fn new(site_count: usize) -> Self {
        Self {
            site_count,
            slots: Mutex::new(HashMap::new()),
            cvar: Condvar::new(),
        }
    }

    fn deposit(&self, generation: u64, payload: Vec<Vec<f64>>) -> Result<()> {
        if payload.len() != self.site_count {
            return Err(FftError::Collective(format!(
                "scatter payload has {} shares, expected {}",
                payload.len(),
                self.site_count
            )));
        }
        let mut slots = self.slots.lock().unwrap();
        if slots.contains_key(&generation) {
            return Err(FftError::Collective(format!(
                "generation {} already has a pending deposit on this communicator",
                generation
            )));
        }
        slots.insert(
            generation,
            ScatterSlot {
                payload: payload.into_iter().map(Some).collect(),
                taken: 0,
            },
        );
        self.cvar.notify_all();
        Ok(())
    }

    fn take_share(&self, generation: u64, this_site: usize) -> Result<Vec<f64>> {
        let mut slots = self.slots.lock().unwrap();
        loop {
            if let Some(slot) = slots.get_mut(&generation) {
                if let Some(share) = slot.payload[this_site].take() {
                    slot.taken += 1;
                    if slot.taken == self.site_count {
                        slots.remove(&generation);
                    }
                    return Ok(share);
                }
                // Already taken by this site for this generation: a
                // protocol bug (double call), not a race.
                return Err(FftError::Collective(format!(
                    "site {} already took its share for generation {}",
                    this_site, generation
                )));
            }
            let (guard, timeout) = self
                .cvar
                .wait_timeout(slots, RENDEZVOUS_TIMEOUT)
                .unwrap();
            slots = guard;
            if timeout.timed_out() && !slots.contains_key(&generation) {
                return Err(FftError::Collective(format!(
                    "timed out waiting for scatter root to deposit generation {}",
                    generation
                )));
            }
        }
    }
}

struct AllToAllSlot {
    contributions: Vec<Option<Arc<Vec<Vec<f64>>>>>,
    arrived: usize,
}

struct AllToAllHub {
    site_count: usize,
    slots: Mutex<HashMap<u64, AllToAllSlot>>,
    cvar: Condvar,
}

impl AllToAllHub {
    fn new(site_count: usize) -> Self {
        Self {
            site_count,
            slots: Mutex::new(HashMap::new()),
            cvar: Condvar::new(),
        }
    }

    fn exchange(&self, generation: u64, this_site: usize, payload: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
        if payload.len() != self.site_count {
            return Err(FftError::Collective(format!(
                "all-to-all payload has {} shares, expected {}",
                payload.len(),
                self.site_count
            )));
        }
        let payload = Arc::new(payload);
        {
            let mut slots = self.slots.lock().unwrap();
            let slot = slots.entry(generation).or_insert_with(|| AllToAllSlot {
                contributions: vec![None; self.site_count],
                arrived: 0,
            });
            if slot.contributions[this_site].is_some() {
                return Err(FftError::Collective(format!(
                    "site {} already contributed to generation {}",
                    this_site, generation
                )));
            }
            slot.contributions[this_site] = Some(payload);
            slot.arrived += 1;
            if slot.arrived == self.site_count {
                self.cvar.notify_all();
            }
        }

        let mut slots = self.slots.lock().unwrap();
        loop {
            let ready = match slots.get(&generation) {
                Some(slot) => slot.arrived == self.site_count,
                None => true, // already consumed and evicted by us below
            };
            if ready {
                break;
            }
            let (guard, timeout) = self
                .cvar
                .wait_timeout(slots, RENDEZVOUS_TIMEOUT)
                .unwrap();
            slots = guard;
            if timeout.timed_out() {
                return Err(FftError::Collective(format!(
                    "timed out waiting for all-to-all peers on generation {}",
                    generation
                )));
            }
        }
        let slot = slots
            .get(&generation)
            .expect("slot present while any site still has to read its receive set");
        let mut received = Vec::with_capacity(self.site_count);
        for i in 0..self.site_count {
            let contribution = slot.contributions[i]
                .as_ref()
                .expect("all sites have arrived, so every contribution slot is filled");
            received.push(contribution[this_site].clone());
        }
        Ok(received)
    }
}

/// Reference [`Communicator`] implementation simulating multiple
/// localities as threads within one process, via shared rendezvous hubs.
pub struct ThreadCommunicator {
    this_site: usize,
    site_count: usize,
    basename: String,
    kind: ThreadCommunicatorKind,
}

enum ThreadCommunicatorKind {
    Scatter { root: usize, hub: Arc<ScatterHub> },
    AllToAll { hub: Arc<AllToAllHub> },
}

impl Communicator for ThreadCommunicator {
    fn site_count(&self) -> usize {
        self.site_count
    }

    fn this_site(&self) -> usize {
        self.this_site
    }

    fn scatter_to(&self, payload: Vec<Vec<f64>>, generation: u64) -> Result<Vec<f64>> {
        match &self.kind {
            ThreadCommunicatorKind::Scatter { root, hub } => {
                if *root != self.this_site {
                    return Err(FftError::Collective(format!(
                        "scatter_to called on non-root site {} for communicator '{}' (root {})",
                        self.this_site, self.basename, root
                    )));
                }
                log::debug!(
                    "communicator '{}' site {}: scatter_to generation {}",
                    self.basename,
                    self.this_site,
                    generation
                );
                hub.deposit(generation, payload)?;
                hub.take_share(generation, self.this_site)
            }
            ThreadCommunicatorKind::AllToAll { .. } => Err(FftError::Configuration(format!(
                "communicator '{}' was created for all-to-all, not scatter",
                self.basename
            ))),
        }
    }

    fn scatter_from(&self, generation: u64) -> Result<Vec<f64>> {
        match &self.kind {
            ThreadCommunicatorKind::Scatter { root, hub } => {
                if *root == self.this_site {
                    return Err(FftError::Collective(format!(
                        "scatter_from called on root site {} for communicator '{}'",
                        self.this_site, self.basename
                    )));
                }
                log::debug!(
                    "communicator '{}' site {}: scatter_from generation {}",
                    self.basename,
                    self.this_site,
                    generation
                );
                hub.take_share(generation, self.this_site)
            }
            ThreadCommunicatorKind::AllToAll { .. } => Err(FftError::Configuration(format!(
                "communicator '{}' was created for all-to-all, not scatter",
                self.basename
            ))),
        }
    }

    fn all_to_all(&self, payload: Vec<Vec<f64>>, generation: u64) -> Result<Vec<Vec<f64>>> {
        match &self.kind {
            ThreadCommunicatorKind::AllToAll { hub } => {
                log::debug!(
                    "communicator '{}' site {}: all_to_all generation {}",
                    self.basename,
                    self.this_site,
                    generation
                );
                hub.exchange(generation, self.this_site, payload)
            }
            ThreadCommunicatorKind::Scatter { .. } => Err(FftError::Configuration(format!(
                "communicator '{}' was created for scatter, not all-to-all",
                self.basename
            ))),
        }
    }
}

/// Registry of named communicators shared across simulated localities,
/// standing in for the HPX/MPI runtime's own communicator registry:
/// one communicator per collective root, created with a stable
/// basename. Construct one `CommunicatorRegistry` per run and share it
/// (e.g. behind an `Arc`) across every locality's `Engine`.
pub struct CommunicatorRegistry {
    site_count: usize,
    scatter_hubs: Mutex<HashMap<String, Arc<ScatterHub>>>,
    all_to_all_hubs: Mutex<HashMap<String, Arc<AllToAllHub>>>,
}

impl CommunicatorRegistry {
    pub fn new(site_count: usize) -> Self {
        Self {
            site_count,
            scatter_hubs: Mutex::new(HashMap::new()),
            all_to_all_hubs: Mutex::new(HashMap::new()),
        }
    }

    /// Attach to (creating on first call) the scatter communicator
    /// rooted at `root`, named by its basename (the ASCII form of
    /// `root`).
    pub fn scatter_communicator(&self, root: usize, this_site: usize) -> ThreadCommunicator {
        let basename = root.to_string();
        let hub = {
            let mut hubs = self.scatter_hubs.lock().unwrap();
            hubs.entry(basename.clone())
                .or_insert_with(|| Arc::new(ScatterHub::new(self.site_count)))
                .clone()
        };
        ThreadCommunicator {
            this_site,
            site_count: self.site_count,
            basename,
            kind: ThreadCommunicatorKind::Scatter { root, hub },
        }
    }

    /// Attach to (creating on first call) the single shared all-to-all
    /// communicator, basename `"0"`.
    pub fn all_to_all_communicator(&self, this_site: usize) -> ThreadCommunicator {
        let basename = "0".to_string();
        let hub = {
            let mut hubs = self.all_to_all_hubs.lock().unwrap();
            hubs.entry(basename.clone())
                .or_insert_with(|| Arc::new(AllToAllHub::new(self.site_count)))
                .clone()
        };
        ThreadCommunicator {
            this_site,
            site_count: self.site_count,
            basename,
            kind: ThreadCommunicatorKind::AllToAll { hub },
        }
    }
}
