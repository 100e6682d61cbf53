use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use super::PendingTxRef;

/// Pending hashes observed recently, forgotten after `ttl` or once more
/// than `capacity` are held.
#[derive(Debug)]
pub struct RecentTxs {
    ttl: Duration,
    capacity: usize,
    seen: HashMap<PendingTxRef, Instant>,
    order: VecDeque<(PendingTxRef, Instant)>,
}

impl RecentTxs {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record `tx_ref`. Returns false if it was already seen inside the window.
    pub fn insert(&mut self, tx_ref: PendingTxRef, now: Instant) -> bool {
        self.prune(now);
        if self.seen.contains_key(&tx_ref) {
            return false;
        }
        self.seen.insert(tx_ref, now);
        self.order.push_back((tx_ref, now));
        while self.order.len() > self.capacity {
            if let Some((old, _)) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&(tx_ref, at)) = self.order.front() {
            if now.duration_since(at) < self.ttl {
                break;
            }
            self.order.pop_front();
            self.seen.remove(&tx_ref);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::H256;

    #[test]
    fn repeat_inside_window_rejected() {
        let mut recent = RecentTxs::new(Duration::from_secs(60), 100);
        let now = Instant::now();
        assert!(recent.insert(H256::repeat_byte(1), now));
        assert!(!recent.insert(H256::repeat_byte(1), now + Duration::from_secs(59)));
        assert!(recent.insert(H256::repeat_byte(2), now));
    }

    #[test]
    fn expired_entry_accepted_again() {
        let mut recent = RecentTxs::new(Duration::from_secs(60), 100);
        let now = Instant::now();
        assert!(recent.insert(H256::repeat_byte(1), now));
        assert!(recent.insert(H256::repeat_byte(1), now + Duration::from_secs(61)));
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut recent = RecentTxs::new(Duration::from_secs(600), 2);
        let now = Instant::now();
        recent.insert(H256::repeat_byte(1), now);
        recent.insert(H256::repeat_byte(2), now);
        recent.insert(H256::repeat_byte(3), now);
        assert_eq!(recent.len(), 2);
        // The oldest was evicted, so it counts as new again.
        assert!(recent.insert(H256::repeat_byte(1), now));
        assert!(!recent.insert(H256::repeat_byte(3), now));
    }
}
