//! Chained hash table of subscribers.

use crate::error::{EngineError, Result};
use crate::hashing::UniversalHash;
use crate::types::SubscriberId;

use super::subscriber::Subscriber;

/// Fixed-size hash table mapping subscriber id to [`Subscriber`].
///
/// Open chaining, no resizing. Each chain is sorted by id.
pub struct SubscriberDirectory {
    hash: UniversalHash,
    buckets: Vec<Vec<Subscriber>>,
    len: usize,
}

impl SubscriberDirectory {
    pub fn new(hash: UniversalHash) -> Self {
        let buckets = (0..hash.buckets()).map(|_| Vec::new()).collect();
        Self {
            hash,
            buckets,
            len: 0,
        }
    }

    pub fn hasher(&self) -> &UniversalHash {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bucket index for an id.
    pub fn bucket_of(&self, id: SubscriberId) -> usize {
        self.hash.hash(id.0)
    }

    fn chain(&self, id: SubscriberId) -> &Vec<Subscriber> {
        &self.buckets[self.bucket_of(id)]
    }

    pub fn insert(&mut self, subscriber: Subscriber) -> Result<()> {
        let id = subscriber.id();
        let bucket = self.bucket_of(id);
        let chain = &mut self.buckets[bucket];
        match chain.binary_search_by_key(&id, Subscriber::id) {
            Ok(_) => Err(EngineError::DuplicateSubscriber(id)),
            Err(at) => {
                chain.insert(at, subscriber);
                self.len += 1;
                Ok(())
            }
        }
    }

    pub fn get(&self, id: SubscriberId) -> Option<&Subscriber> {
        let chain = self.chain(id);
        chain
            .binary_search_by_key(&id, Subscriber::id)
            .ok()
            .map(|at| &chain[at])
    }

    pub fn get_mut(&mut self, id: SubscriberId) -> Option<&mut Subscriber> {
        let bucket = self.bucket_of(id);
        let chain = &mut self.buckets[bucket];
        match chain.binary_search_by_key(&id, Subscriber::id) {
            Ok(at) => Some(&mut chain[at]),
            Err(_) => None,
        }
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.get(id).is_some()
    }

    /// Remove a subscriber, handing back its record and archives.
    pub fn remove(&mut self, id: SubscriberId) -> Option<Subscriber> {
        let bucket = self.bucket_of(id);
        let chain = &mut self.buckets[bucket];
        let at = chain.binary_search_by_key(&id, Subscriber::id).ok()?;
        self.len -= 1;
        Some(chain.remove(at))
    }

    /// Subscribers bucket by bucket, ascending id within a bucket.
    pub fn iter(&self) -> impl Iterator<Item = &Subscriber> + '_ {
        self.buckets.iter().flatten()
    }

    pub fn ids(&self) -> Vec<SubscriberId> {
        self.iter().map(Subscriber::id).collect()
    }

    /// Chain length per bucket.
    pub fn bucket_lengths(&self) -> Vec<usize> {
        self.buckets.iter().map(Vec::len).collect()
    }
}
