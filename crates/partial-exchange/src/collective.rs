// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The all-reduce seam.
//!
//! The exchange never talks to a transport directly. It hands tensors to a
//! [`Collective`] and expects back their element-wise sum over all peers.
//!
//! | Implementation       | Peers | Use                                   |
//! |----------------------|-------|---------------------------------------|
//! | [`Loopback`]         | 1     | single-process training, unit tests   |
//! | [`InProcessCluster`] | N     | threads standing in for peers         |
//!
//! Every peer must issue the same sequence of reduce calls with the same
//! tensor names. [`crate::PartialExchange`] guarantees this by ordering the
//! active partition by name before reducing.

use crate::ExchangeError;
use std::collections::HashMap;
use std::sync::{Arc, Barrier, Mutex, MutexGuard};
use tensor_core::Tensor;

/// Sum-reduction across the peers of a cluster.
pub trait Collective {
    /// Number of peers taking part in every reduction.
    fn cluster_size(&self) -> usize;

    /// Rank of this peer in `0..cluster_size()`.
    fn self_rank(&self) -> usize;

    /// Returns the element-wise sum of `tensor` over all peers.
    fn all_reduce(&mut self, tensor: Tensor) -> Result<Tensor, ExchangeError>;

    /// Reduces a group of tensors. Results come back in input order.
    ///
    /// The default issues one [`all_reduce`](Self::all_reduce) per tensor.
    fn group_all_reduce(&mut self, tensors: Vec<Tensor>) -> Result<Vec<Tensor>, ExchangeError> {
        tensors.into_iter().map(|t| self.all_reduce(t)).collect()
    }
}

/// A cluster of one. Reduction is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Loopback;

impl Collective for Loopback {
    fn cluster_size(&self) -> usize {
        1
    }

    fn self_rank(&self) -> usize {
        0
    }

    fn all_reduce(&mut self, tensor: Tensor) -> Result<Tensor, ExchangeError> {
        Ok(tensor)
    }
}

struct Shared {
    size: usize,
    barrier: Barrier,
    round: Mutex<Round>,
}

impl Shared {
    fn round(&self) -> MutexGuard<'_, Round> {
        // A peer that panicked mid-round leaves the table consistent enough to
        // report missing contributions instead of cascading the panic.
        self.round.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Accumulator for one barrier round.
#[derive(Default)]
struct Round {
    /// Running sum and number of contributing peers, per tensor name.
    sums: HashMap<String, (Tensor, usize)>,
    /// First contribution that failed, as `(tensor, detail)`.
    failure: Option<(String, String)>,
}

impl Round {
    fn contribute(&mut self, rank: usize, tensor: Tensor) {
        if self.failure.is_some() {
            return;
        }
        let name = tensor.name().to_string();
        match self.sums.get_mut(&name) {
            Some((sum, count)) => match sum.add_assign(&tensor) {
                Ok(()) => *count += 1,
                Err(e) => self.failure = Some((name, format!("rank {rank}: {e}"))),
            },
            None => {
                self.sums.insert(name, (tensor, 1));
            }
        }
    }

    /// The reduced values of `names`. Fails for every peer if any peer's
    /// contribution failed or a tensor was not contributed by all peers.
    fn collect(&self, names: &[String], size: usize) -> Result<Vec<Tensor>, ExchangeError> {
        if let Some((tensor, detail)) = &self.failure {
            return Err(ExchangeError::Collective {
                tensor: tensor.clone(),
                detail: detail.clone(),
            });
        }
        names
            .iter()
            .map(|name| match self.sums.get(name) {
                Some((sum, count)) if *count == size => Ok(sum.clone()),
                Some((_, count)) => Err(ExchangeError::Collective {
                    tensor: name.clone(),
                    detail: format!("only {count} of {size} peers contributed"),
                }),
                None => Err(ExchangeError::Collective {
                    tensor: name.clone(),
                    detail: "no accumulated value after reduce".into(),
                }),
            })
            .collect()
    }

    fn reset(&mut self) {
        self.sums.clear();
        self.failure = None;
    }
}

/// N peers in one process, joined by a barrier and a shared accumulator.
///
/// ```text
/// phase 1: every peer adds its tensors into the shared round   ─┐ barrier
/// phase 2: every peer clones the summed tensors out             ─┤ barrier
/// phase 3: rank 0 clears the round for the next one             ─┘ barrier
/// ```
///
/// A failed contribution fails the round on every peer, never only on the
/// one that hit it. Each peer must run on its own thread; a peer that stops
/// calling into the collective stalls the others at the barrier.
#[derive(Clone)]
pub struct InProcessCluster {
    shared: Arc<Shared>,
}

impl InProcessCluster {
    /// Creates a cluster of `size` peers.
    pub fn new(size: usize) -> Result<Self, ExchangeError> {
        if size == 0 {
            return Err(ExchangeError::ConfigError(
                "cluster must have at least one peer".into(),
            ));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                size,
                barrier: Barrier::new(size),
                round: Mutex::new(Round::default()),
            }),
        })
    }

    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Handle for the peer with the given rank.
    pub fn peer(&self, rank: usize) -> Result<InProcessPeer, ExchangeError> {
        if rank >= self.shared.size {
            return Err(ExchangeError::ConfigError(format!(
                "rank {rank} out of range for cluster of {}",
                self.shared.size
            )));
        }
        Ok(InProcessPeer {
            rank,
            shared: Arc::clone(&self.shared),
        })
    }

    /// One handle per rank, in rank order.
    pub fn peers(&self) -> Vec<InProcessPeer> {
        (0..self.shared.size)
            .map(|rank| InProcessPeer {
                rank,
                shared: Arc::clone(&self.shared),
            })
            .collect()
    }
}

impl std::fmt::Debug for InProcessCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessCluster")
            .field("size", &self.shared.size)
            .finish()
    }
}

/// One peer of an [`InProcessCluster`].
pub struct InProcessPeer {
    rank: usize,
    shared: Arc<Shared>,
}

impl InProcessPeer {
    /// Runs one barrier round reducing all of `tensors` together.
    ///
    /// Errors are held until the round completes so a failing peer never
    /// leaves the others blocked at the barrier.
    fn reduce_round(&mut self, tensors: Vec<Tensor>) -> Result<Vec<Tensor>, ExchangeError> {
        let names: Vec<String> = tensors.iter().map(|t| t.name().to_string()).collect();

        {
            let mut round = self.shared.round();
            for tensor in tensors {
                round.contribute(self.rank, tensor);
            }
        }
        self.shared.barrier.wait();

        let reduced = self.shared.round().collect(&names, self.shared.size);
        self.shared.barrier.wait();

        if self.rank == 0 {
            self.shared.round().reset();
        }
        self.shared.barrier.wait();

        reduced
    }
}

impl Collective for InProcessPeer {
    fn cluster_size(&self) -> usize {
        self.shared.size
    }

    fn self_rank(&self) -> usize {
        self.rank
    }

    fn all_reduce(&mut self, tensor: Tensor) -> Result<Tensor, ExchangeError> {
        let name = tensor.name().to_string();
        self.reduce_round(vec![tensor])?
            .pop()
            .ok_or_else(|| ExchangeError::Collective {
                tensor: name,
                detail: "reduce round returned nothing".into(),
            })
    }

    fn group_all_reduce(&mut self, tensors: Vec<Tensor>) -> Result<Vec<Tensor>, ExchangeError> {
        if tensors.is_empty() {
            return Ok(Vec::new());
        }
        self.reduce_round(tensors)
    }
}

impl std::fmt::Debug for InProcessPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessPeer")
            .field("rank", &self.rank)
            .field("cluster_size", &self.shared.size)
            .finish()
    }
}
