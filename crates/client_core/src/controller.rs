use std::sync::Arc;

use shared::{
    domain::{GroupId, GroupType, ItemId},
    protocol::{ChangeGroupRequest, Empty, GroupDto, RpcMethod},
};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    bindings::{CoinAccountsApi, GroupsApi, StockTradesApi},
    collection::{CollectionApi, Entity, MoveDirection, RemoteCollection},
    confirm::ConfirmGate,
    error::{ClientError, RpcError},
    records::{account_name_suggestions, holdings_summary, HoldingsSummary, PriceFeed},
    rpc::Backend,
};

const MAX_GROUP_NAME_CHARS: usize = 64;

/// Snapshot republished after every sync.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedListView<E> {
    pub groups: Vec<GroupDto>,
    pub current_group_index: usize,
    pub items: Vec<E>,
    /// `false` until the first successful sync.
    pub loaded: bool,
}

impl<E> Default for GroupedListView<E> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            current_group_index: 0,
            items: Vec::new(),
            loaded: false,
        }
    }
}

impl<E> GroupedListView<E> {
    pub fn current_group(&self) -> Option<&GroupDto> {
        self.groups.get(self.current_group_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    Refreshed,
    /// User-visible message for a failed operation.
    Notice(String),
}

/// What the item cache was last derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ItemsKey {
    items_version: u64,
    current: usize,
    groups_generation: u64,
}

#[derive(Debug, Default)]
struct SyncState {
    current: usize,
    seen_groups_version: Option<u64>,
    seen_items: Option<ItemsKey>,
    loaded: bool,
}

/// Groups of one type plus the items of the selected group.
pub struct GroupedListController<I: CollectionApi<Parent = GroupId>> {
    group_type: GroupType,
    groups: RemoteCollection<GroupsApi>,
    items: RemoteCollection<I>,
    state: Mutex<SyncState>,
    view: watch::Sender<GroupedListView<I::Entity>>,
    events: broadcast::Sender<ListEvent>,
}

impl<I> GroupedListController<I>
where
    I: CollectionApi<Parent = GroupId>,
    I::Entity: Entity<Id = ItemId>,
{
    pub fn new(
        group_type: GroupType,
        items_api: I,
        backend: Backend,
        gate: Arc<dyn ConfirmGate>,
    ) -> Self {
        let (view, _) = watch::channel(GroupedListView::default());
        let (events, _) = broadcast::channel(64);
        Self {
            group_type,
            groups: RemoteCollection::new(GroupsApi, backend.clone(), gate.clone()),
            items: RemoteCollection::new(items_api, backend, gate),
            state: Mutex::new(SyncState::default()),
            view,
            events,
        }
    }

    pub fn group_type(&self) -> GroupType {
        self.group_type
    }

    pub fn groups(&self) -> &RemoteCollection<GroupsApi> {
        &self.groups
    }

    pub fn items(&self) -> &RemoteCollection<I> {
        &self.items
    }

    pub fn subscribe(&self) -> watch::Receiver<GroupedListView<I::Entity>> {
        self.view.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub fn view(&self) -> GroupedListView<I::Entity> {
        self.view.borrow().clone()
    }

    pub async fn current_group_index(&self) -> usize {
        self.state.lock().await.current
    }

    pub async fn current_group(&self) -> Option<GroupDto> {
        let current = self.current_group_index().await;
        self.groups.entry_at(current).await
    }

    /// Refetches whatever is out of date: the groups when their version moved,
    /// then the items when the items version, the selection or the groups
    /// sequence changed. An empty groups listing creates the type's default
    /// group once per call.
    pub async fn sync(&self) -> Result<(), ClientError> {
        let result = self.sync_once().await;
        self.report(result)
    }

    async fn sync_once(&self) -> Result<(), ClientError> {
        let mut bootstrapped = false;
        loop {
            let groups_version = self.groups.version();
            if self.state.lock().await.seen_groups_version == Some(groups_version) {
                break;
            }
            let fetched = self.groups.list(self.group_type).await?;
            if fetched.is_empty() && !bootstrapped {
                bootstrapped = true;
                let name = self.group_type.default_group_name().to_string();
                info!(group_type = %self.group_type, %name, "creating default group");
                self.groups.create(self.group_type, &name).await?;
                continue;
            }
            self.state.lock().await.seen_groups_version = Some(groups_version);
            break;
        }

        let groups = self.groups.cached().await;
        let groups_generation = self.groups.generation().await;
        let current = {
            let mut state = self.state.lock().await;
            if state.current >= groups.len() {
                state.current = 0;
            }
            state.current
        };

        let key = ItemsKey {
            items_version: self.items.version(),
            current,
            groups_generation,
        };
        if self.state.lock().await.seen_items != Some(key) {
            match groups.get(current) {
                Some(group) => {
                    self.items.list(group.id).await?;
                }
                None => self.items.reset().await,
            }
            self.state.lock().await.seen_items = Some(key);
        }

        self.state.lock().await.loaded = true;
        self.publish().await;
        let _ = self.events.send(ListEvent::Refreshed);
        Ok(())
    }

    async fn publish(&self) {
        let (current_group_index, loaded) = {
            let state = self.state.lock().await;
            (state.current, state.loaded)
        };
        let view = GroupedListView {
            groups: self.groups.cached().await,
            current_group_index,
            items: self.items.cached().await,
            loaded,
        };
        self.view.send_replace(view);
    }

    /// Follow-up sync after a committed change. Failures were already
    /// reported by `sync`; the change itself stays successful.
    async fn refresh(&self) {
        if let Err(err) = self.sync().await {
            debug!(group_type = %self.group_type, error = %err, "refresh after mutation failed");
        }
    }

    fn report<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(err) = &result {
            warn!(group_type = %self.group_type, error = %err, "operation failed");
            let _ = self.events.send(ListEvent::Notice(err.user_message()));
        }
        result
    }

    /// `Ok(None)` when there are no groups; an error for an index past the end.
    async fn group_at(&self, index: usize) -> Result<Option<GroupDto>, ClientError> {
        let groups = self.groups.cached().await;
        if groups.is_empty() {
            return Ok(None);
        }
        groups
            .get(index)
            .cloned()
            .map(Some)
            .ok_or_else(|| ClientError::validation(format!("group {} does not exist", index + 1)))
    }

    pub async fn select_group(&self, index: usize) -> Result<(), ClientError> {
        let selected = self.group_at(index).await;
        match self.report(selected)? {
            Some(_) => {
                self.state.lock().await.current = index;
                self.sync().await
            }
            None => Ok(()),
        }
    }

    /// `Ok(None)` until the groups have been loaded, so the default group
    /// is always created before any explicit one.
    pub async fn add_group(&self, name: &str) -> Result<Option<GroupId>, ClientError> {
        if self.groups.is_empty().await {
            return Ok(None);
        }
        let result: Result<GroupId, ClientError> = async {
            let name = validated_group_name(name)?;
            Ok(self.groups.create(self.group_type, &name).await?)
        }
        .await;
        let id = self.report(result)?;
        self.refresh().await;
        Ok(Some(id))
    }

    pub async fn update_group(&self, index: usize, name: &str) -> Result<bool, ClientError> {
        let result: Result<bool, ClientError> = async {
            let name = validated_group_name(name)?;
            let Some(group) = self.group_at(index).await? else {
                return Ok(false);
            };
            self.groups.update(group.id, &name).await?;
            Ok(true)
        }
        .await;
        let updated = self.report(result)?;
        if updated {
            self.refresh().await;
        }
        Ok(updated)
    }

    /// Deletes the group at `index` after confirmation and repairs the
    /// selection: an earlier group shifts it down by one, the selected group
    /// resets it to the first.
    pub async fn delete_group(&self, index: usize) -> Result<bool, ClientError> {
        let result: Result<bool, ClientError> = async {
            let Some(group) = self.group_at(index).await? else {
                return Ok(false);
            };
            Ok(self.groups.remove(group.id).await?)
        }
        .await;
        let deleted = self.report(result)?;
        if !deleted {
            return Ok(false);
        }

        {
            let mut state = self.state.lock().await;
            if index < state.current {
                state.current -= 1;
            } else if index == state.current {
                state.current = 0;
            }
        }
        self.refresh().await;
        Ok(true)
    }

    /// Swaps the group at `index` with its neighbour; the selection follows
    /// whichever of the two was selected.
    pub async fn move_group(&self, direction: MoveDirection, index: usize) -> Result<bool, ClientError> {
        let swapped = self
            .groups
            .swap_adjacent(index, direction)
            .await
            .map_err(ClientError::from);
        let Some(other) = self.report(swapped)? else {
            return Ok(false);
        };

        {
            let mut state = self.state.lock().await;
            if other == state.current {
                state.current = index;
            } else if index == state.current {
                state.current = other;
            }
        }
        self.refresh().await;
        Ok(true)
    }

    /// Creates an item in the selected group; `Ok(None)` when there is none.
    pub async fn add_item(&self, draft: &I::Draft) -> Result<Option<ItemId>, ClientError> {
        let Some(group) = self.current_group().await else {
            return Ok(None);
        };
        let created = self
            .items
            .create(group.id, draft)
            .await
            .map_err(ClientError::from);
        let id = self.report(created)?;
        self.refresh().await;
        Ok(Some(id))
    }

    /// `Ok(false)` when there are no groups.
    pub async fn update_item(&self, id: ItemId, draft: &I::Draft) -> Result<bool, ClientError> {
        if self.groups.is_empty().await {
            return Ok(false);
        }
        let updated = self.items.update(id, draft).await.map_err(ClientError::from);
        self.report(updated)?;
        self.refresh().await;
        Ok(true)
    }

    pub async fn delete_item(&self, index: usize) -> Result<bool, ClientError> {
        let Some(item) = self.items.entry_at(index).await else {
            return Ok(false);
        };
        let removed = self.items.remove(item.id()).await.map_err(ClientError::from);
        let deleted = self.report(removed)?;
        if deleted {
            self.refresh().await;
        }
        Ok(deleted)
    }

    pub async fn move_item(&self, direction: MoveDirection, index: usize) -> Result<bool, ClientError> {
        let swapped = self
            .items
            .swap_adjacent(index, direction)
            .await
            .map_err(ClientError::from);
        let moved = self.report(swapped)?.is_some();
        if moved {
            self.refresh().await;
        }
        Ok(moved)
    }

    /// Moves an item of the selected group into `to_group_id`, which must be
    /// another group of this controller's type.
    pub async fn change_item_group(
        &self,
        item_id: ItemId,
        to_group_id: Option<GroupId>,
    ) -> Result<bool, ClientError> {
        let result: Result<bool, ClientError> = async {
            let to_group_id =
                to_group_id.ok_or_else(|| ClientError::validation("Please choose a new group"))?;
            let groups = self.groups.cached().await;
            if groups.is_empty() {
                return Ok(false);
            }
            if !groups.iter().any(|group| group.id == to_group_id) {
                return Err(ClientError::validation("target group does not exist"));
            }
            if self.current_group().await.map(|group| group.id) == Some(to_group_id) {
                return Err(ClientError::validation("the item is already in that group"));
            }

            let backend = self.items.backend();
            self.items
                .mutate("change_group", async {
                    let _: Empty = backend
                        .call(
                            RpcMethod::ChangeGroup,
                            &ChangeGroupRequest {
                                id: item_id,
                                to_group_id,
                            },
                        )
                        .await?;
                    Ok::<(), RpcError>(())
                })
                .await?;
            info!(item_id = item_id.0, to_group = to_group_id.0, "moved item to another group");
            Ok(true)
        }
        .await;
        let moved = self.report(result)?;
        if moved {
            self.refresh().await;
        }
        Ok(moved)
    }

    /// Runs a record-specific mutation that is versioned like the built-in ones.
    pub async fn mutate_items<T, F>(&self, action: &'static str, op: F) -> Result<T, ClientError>
    where
        F: std::future::Future<Output = Result<T, RpcError>>,
    {
        let result = self.items.mutate(action, op).await.map_err(ClientError::from);
        let value = self.report(result)?;
        self.refresh().await;
        Ok(value)
    }
}

impl GroupedListController<StockTradesApi> {
    pub async fn close_trade(
        &self,
        id: ItemId,
        close_at: i64,
        close_amount: f64,
    ) -> Result<bool, ClientError> {
        if self.groups.is_empty().await {
            return Ok(false);
        }
        if close_at <= 0 {
            let err = Err(ClientError::validation("close date is required"));
            return self.report(err);
        }
        let backend = self.items.backend();
        self.mutate_items(
            "close",
            self.items.api().close(backend, id, close_at, close_amount),
        )
        .await?;
        Ok(true)
    }
}

impl GroupedListController<CoinAccountsApi> {
    /// Holdings of the selected group valued in `base_coin`.
    pub async fn holdings(&self, feed: &dyn PriceFeed, base_coin: &str) -> HoldingsSummary {
        holdings_summary(&self.items.cached().await, feed, base_coin)
    }

    pub async fn account_names(&self) -> Vec<String> {
        account_name_suggestions(&self.items.cached().await)
    }
}

fn validated_group_name(raw: &str) -> Result<String, ClientError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ClientError::validation("group name is required"));
    }
    if name.chars().count() > MAX_GROUP_NAME_CHARS {
        return Err(ClientError::validation(format!(
            "group name exceeds {MAX_GROUP_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
