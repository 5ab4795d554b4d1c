//! A per-reference-block caching decorator over any [`RegistryView`]
//! implementation. A finalized reference block's registry state never
//! changes, so a chain-backed implementation should cache per-block
//! results; this crate provides that behavior once so every
//! transport-level chain reader gets it for free.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use avs_crypto::{G1Point, G2Point};
use avs_interfaces::{RegistryError, RegistryView, RegistrySnapshot};
use avs_types::{OperatorId, QuorumNumber, ThresholdPercentage};
use tracing::debug;

#[derive(Default)]
struct Cache {
    quorums: HashMap<u64, Vec<QuorumNumber>>,
    operators: HashMap<(u64, Vec<QuorumNumber>), RegistrySnapshot>,
}

pub struct CachedRegistryView<R> {
    inner: R,
    cache: RwLock<Cache>,
}

impl<R: RegistryView> CachedRegistryView<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RwLock::new(Cache::default()),
        }
    }

    /// Drop every cached entry. Only useful in tests; a real reference
    /// block's registry state never changes once finalized.
    pub fn clear(&self) {
        let mut cache = self.cache.write().expect("cache lock poisoned");
        cache.quorums.clear();
        cache.operators.clear();
    }
}

#[async_trait]
impl<R: RegistryView> RegistryView for CachedRegistryView<R> {
    async fn quorums_at(&self, block: u64) -> Result<Vec<QuorumNumber>, RegistryError> {
        if let Some(cached) = self.cache.read().expect("cache lock poisoned").quorums.get(&block) {
            debug!(block, "registry cache hit for quorums_at");
            return Ok(cached.clone());
        }
        let quorums = self.inner.quorums_at(block).await?;
        self.cache
            .write()
            .expect("cache lock poisoned")
            .quorums
            .insert(block, quorums.clone());
        Ok(quorums)
    }

    async fn thresholds_at(
        &self,
        block: u64,
        quorums: &[QuorumNumber],
    ) -> Result<Vec<ThresholdPercentage>, RegistryError> {
        // Thresholds are cheap and queried once per task admission; caching
        // adds complexity without a measurable benefit, so we pass through.
        self.inner.thresholds_at(block, quorums).await
    }

    async fn operators_at(
        &self,
        block: u64,
        quorums: &[QuorumNumber],
    ) -> Result<RegistrySnapshot, RegistryError> {
        let key = (block, quorums.to_vec());
        if let Some(cached) = self.cache.read().expect("cache lock poisoned").operators.get(&key) {
            debug!(block, "registry cache hit for operators_at");
            return Ok(cached.clone());
        }
        let snapshot = self.inner.operators_at(block, quorums).await?;
        self.cache
            .write()
            .expect("cache lock poisoned")
            .operators
            .insert(key, snapshot.clone());
        Ok(snapshot)
    }

    async fn pubkey_of(&self, operator_id: OperatorId) -> Result<(G1Point, G2Point), RegistryError> {
        self.inner.pubkey_of(operator_id).await
    }
}
