//! Per-id serialization (spec.md §4.2: "an id-sharded lock or a per-id
//! actor"). A fixed shard table keyed by `id`'s low bits keeps Sync Manager
//! operations and Memory Manager operations on the same id from
//! interleaving, without the unbounded memory growth of one lock per id
//! ever seen.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

const SHARD_COUNT: usize = 64;

pub struct IdLocks {
    shards: Vec<Arc<Mutex<()>>>,
}

impl Default for IdLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl IdLocks {
    pub fn new() -> Self {
        Self { shards: (0..SHARD_COUNT).map(|_| Arc::new(Mutex::new(()))).collect() }
    }

    fn shard_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        let bytes = id.as_bytes();
        let index = (bytes[0] as usize) % self.shards.len();
        self.shards[index].clone()
    }

    /// Acquire the lock for `id`'s shard, held until the returned guard drops.
    pub async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        self.shard_for(id).lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_id_serializes() {
        let locks = Arc::new(IdLocks::new());
        let id = Uuid::new_v4();
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let l1 = locks.clone();
        let o1 = order.clone();
        let h1 = tokio::spawn(async move {
            let _guard = l1.lock(id).await;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            o1.lock().await.push(1);
        });

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let l2 = locks.clone();
        let o2 = order.clone();
        let h2 = tokio::spawn(async move {
            let _guard = l2.lock(id).await;
            o2.lock().await.push(2);
        });

        h1.await.unwrap();
        h2.await.unwrap();
        assert_eq!(*order.lock().await, vec![1, 2]);
    }
}
