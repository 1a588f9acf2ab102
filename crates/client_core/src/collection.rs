use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use shared::domain::{GroupId, ItemId};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{confirm::ConfirmGate, error::RpcError, rpc::Backend};

pub const CONFIRM_TITLE: &str = "Please confirm";

/// Server-assigned id of a collection entry.
pub trait RecordId: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn raw(self) -> i64;
}

impl RecordId for GroupId {
    fn raw(self) -> i64 {
        self.0
    }
}

impl RecordId for ItemId {
    fn raw(self) -> i64 {
        self.0
    }
}

pub trait Entity: Clone + Send + Sync + 'static {
    type Id: RecordId;

    fn id(&self) -> Self::Id;

    /// Short human-readable name used in prompts.
    fn label(&self) -> String;
}

/// Backend calls for one kind of ordered collection.
#[async_trait]
pub trait CollectionApi: Send + Sync + 'static {
    /// Key the collection is listed under: a group type or a group id.
    type Parent: Copy + Eq + fmt::Debug + Send + Sync + 'static;
    type Entity: Entity;
    type Draft: Send + Sync;

    const NAME: &'static str;

    async fn list(
        &self,
        backend: &Backend,
        parent: Self::Parent,
    ) -> Result<Vec<Self::Entity>, RpcError>;

    async fn create(
        &self,
        backend: &Backend,
        parent: Self::Parent,
        draft: &Self::Draft,
    ) -> Result<<Self::Entity as Entity>::Id, RpcError>;

    async fn update(
        &self,
        backend: &Backend,
        id: <Self::Entity as Entity>::Id,
        draft: &Self::Draft,
    ) -> Result<(), RpcError>;

    async fn delete(
        &self,
        backend: &Backend,
        id: <Self::Entity as Entity>::Id,
    ) -> Result<(), RpcError>;

    async fn switch(
        &self,
        backend: &Backend,
        id_a: <Self::Entity as Entity>::Id,
        id_b: <Self::Entity as Entity>::Id,
    ) -> Result<(), RpcError>;

    fn delete_prompt(&self, entity: Option<&Self::Entity>) -> String {
        match entity {
            Some(entity) => format!("Really delete [{}]?", entity.label()),
            None => "Really delete this entry?".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    /// Neighbour of `index` in this direction, if it lies inside `0..len`.
    pub fn neighbour(self, index: usize, len: usize) -> Option<usize> {
        if index >= len {
            return None;
        }
        let other = match self {
            MoveDirection::Up => index.checked_sub(1)?,
            MoveDirection::Down => index + 1,
        };
        (other < len).then_some(other)
    }
}

struct Cache<P, E> {
    parent: Option<P>,
    entries: Vec<E>,
    applied_seq: u64,
    generation: u64,
}

/// One server-backed ordered collection. Mutations never touch the cached
/// entries; a successful mutation bumps `version` and the owner refetches.
pub struct RemoteCollection<A: CollectionApi> {
    api: A,
    backend: Backend,
    gate: Arc<dyn ConfirmGate>,
    version: watch::Sender<u64>,
    next_seq: AtomicU64,
    cache: Mutex<Cache<A::Parent, A::Entity>>,
}

impl<A: CollectionApi> RemoteCollection<A> {
    pub fn new(api: A, backend: Backend, gate: Arc<dyn ConfirmGate>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            api,
            backend,
            gate,
            version,
            next_seq: AtomicU64::new(0),
            cache: Mutex::new(Cache {
                parent: None,
                entries: Vec::new(),
                applied_seq: 0,
                generation: 0,
            }),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Bumped every time a fetch result or a reset replaces the cached entries.
    pub async fn generation(&self) -> u64 {
        self.cache.lock().await.generation
    }

    pub async fn cached(&self) -> Vec<A::Entity> {
        self.cache.lock().await.entries.clone()
    }

    pub async fn parent(&self) -> Option<A::Parent> {
        self.cache.lock().await.parent
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.entries.is_empty()
    }

    pub async fn entry_at(&self, index: usize) -> Option<A::Entity> {
        self.cache.lock().await.entries.get(index).cloned()
    }

    pub async fn find(&self, id: <A::Entity as Entity>::Id) -> Option<A::Entity> {
        self.cache
            .lock()
            .await
            .entries
            .iter()
            .find(|entry| entry.id() == id)
            .cloned()
    }

    /// Fetches `parent`'s entries in server order. The result replaces the
    /// cache only if no fetch issued after this one has been applied yet; a
    /// failed fetch leaves the cache untouched.
    pub async fn list(&self, parent: A::Parent) -> Result<Vec<A::Entity>, RpcError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = self.api.list(&self.backend, parent).await.map_err(|err| {
            warn!(collection = A::NAME, ?parent, error = %err, "fetch failed");
            err
        })?;

        let mut cache = self.cache.lock().await;
        if seq > cache.applied_seq {
            cache.applied_seq = seq;
            cache.parent = Some(parent);
            cache.entries = fetched.clone();
            cache.generation += 1;
            debug!(collection = A::NAME, ?parent, seq, len = fetched.len(), "applied fetch");
        } else {
            debug!(
                collection = A::NAME,
                ?parent,
                seq,
                applied = cache.applied_seq,
                "discarding stale fetch"
            );
        }
        Ok(fetched)
    }

    /// Empties the cache and invalidates fetches still in flight.
    pub async fn reset(&self) {
        let issued = self.next_seq.load(Ordering::SeqCst);
        let mut cache = self.cache.lock().await;
        cache.applied_seq = cache.applied_seq.max(issued);
        cache.parent = None;
        cache.entries.clear();
        cache.generation += 1;
    }

    pub async fn create(
        &self,
        parent: A::Parent,
        draft: &A::Draft,
    ) -> Result<<A::Entity as Entity>::Id, RpcError> {
        let id = self
            .mutate("create", self.api.create(&self.backend, parent, draft))
            .await?;
        info!(collection = A::NAME, ?parent, %id, "created entry");
        Ok(id)
    }

    pub async fn update(
        &self,
        id: <A::Entity as Entity>::Id,
        draft: &A::Draft,
    ) -> Result<(), RpcError> {
        self.mutate("update", self.api.update(&self.backend, id, draft))
            .await
    }

    /// Deletes `id` after the confirm gate agrees. Returns `false`, without
    /// contacting the backend, when the user declines.
    pub async fn remove(&self, id: <A::Entity as Entity>::Id) -> Result<bool, RpcError> {
        let entry = self.find(id).await;
        let message = self.api.delete_prompt(entry.as_ref());
        if !self.gate.confirm(CONFIRM_TITLE, &message).await {
            debug!(collection = A::NAME, %id, "delete declined");
            return Ok(false);
        }
        self.mutate("delete", self.api.delete(&self.backend, id))
            .await?;
        info!(collection = A::NAME, %id, "deleted entry");
        Ok(true)
    }

    /// Swaps the entry at `index` with its neighbour. Returns the neighbour's
    /// index, or `None` when there is no neighbour and nothing was sent.
    pub async fn swap_adjacent(
        &self,
        index: usize,
        direction: MoveDirection,
    ) -> Result<Option<usize>, RpcError> {
        let pair = {
            let cache = self.cache.lock().await;
            direction
                .neighbour(index, cache.entries.len())
                .map(|other| (other, cache.entries[index].id(), cache.entries[other].id()))
        };
        let Some((other, id_a, id_b)) = pair else {
            return Ok(None);
        };

        self.mutate("switch", self.api.switch(&self.backend, id_a, id_b))
            .await?;
        Ok(Some(other))
    }

    /// Runs any other versioned mutation: bumps `version` only on success.
    pub async fn mutate<T, F>(&self, action: &'static str, op: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        match op.await {
            Ok(value) => {
                self.version.send_modify(|v| *v += 1);
                Ok(value)
            }
            Err(err) => {
                warn!(collection = A::NAME, action, error = %err, "mutation failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/collection_tests.rs"]
mod tests;
