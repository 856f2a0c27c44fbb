//! Peer selection for missing-transaction requests.
//!
//! Prefers the peer that submitted the block, falls back to a random known
//! peer, and reports which branch fired.

use std::net::IpAddr;
use tracing::{debug, warn};

use crate::ports::{PeerDirectory, PeerHandle};

/// Outcome of peer selection.
#[derive(Clone, Debug)]
pub enum PeerSelection {
    /// Peer registered under the submitter's address
    Matched(PeerHandle),
    /// Random known peer (submitter unknown or unregistered)
    Fallback(PeerHandle),
    /// No known peers
    None,
}

impl PeerSelection {
    pub fn peer(&self) -> Option<&PeerHandle> {
        match self {
            PeerSelection::Matched(peer) | PeerSelection::Fallback(peer) => Some(peer),
            PeerSelection::None => None,
        }
    }

    pub fn into_peer(self) -> Option<PeerHandle> {
        match self {
            PeerSelection::Matched(peer) | PeerSelection::Fallback(peer) => Some(peer),
            PeerSelection::None => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, PeerSelection::Matched(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PeerSelection::Fallback(_))
    }
}

/// Select a peer to ask for missing transactions.
///
/// Directory failures count as "no peer" for the step that failed.
pub async fn select_peer<D>(directory: &D, submitter: Option<IpAddr>) -> PeerSelection
where
    D: PeerDirectory + ?Sized,
{
    if let Some(ip) = submitter {
        match directory.get_peer(ip).await {
            Ok(Some(peer)) => {
                debug!(%ip, "Selected submitting peer");
                return PeerSelection::Matched(peer);
            }
            Ok(None) => debug!(%ip, "Submitter not registered, falling back to random peer"),
            Err(e) => warn!(%ip, error = %e, "Peer lookup failed, falling back to random peer"),
        }
    }

    match directory.get_random_peer().await {
        Ok(Some(peer)) => PeerSelection::Fallback(peer),
        Ok(None) => PeerSelection::None,
        Err(e) => {
            warn!(error = %e, "Random peer lookup failed");
            PeerSelection::None
        }
    }
}
