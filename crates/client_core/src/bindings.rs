use async_trait::async_trait;
use shared::{
    domain::{GroupId, GroupType, ItemId},
    protocol::{
        AddCoinAccountRequest, AddGroupRequest, AddStockTradeRequest, CloseStockTradeRequest,
        CoinAccountDto, Empty, GroupDto, IdWrapper, ListCoinAccountsRequest,
        ListCoinAccountsResponse, ListGroupsRequest, ListGroupsResponse, ListStockTradesResponse,
        RpcMethod, StockTradeDto, SwitchOrderRequest, UpdateCoinAccountRequest,
        UpdateStockTradeRequest,
    },
};

use crate::{
    collection::{CollectionApi, Entity, RecordId},
    error::RpcError,
    records::{CoinAccountDraft, StockTradeDraft},
    rpc::Backend,
};

impl Entity for GroupDto {
    type Id = GroupId;

    fn id(&self) -> GroupId {
        self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl Entity for CoinAccountDto {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }

    fn label(&self) -> String {
        format!("coin {} in {}", self.sym, self.name)
    }
}

impl Entity for StockTradeDto {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }

    fn label(&self) -> String {
        self.stock_name.clone()
    }
}

fn switch_request<I: RecordId>(id_a: I, id_b: I) -> SwitchOrderRequest {
    SwitchOrderRequest {
        id_a: id_a.raw(),
        id_b: id_b.raw(),
    }
}

/// Top-level groups of one [`GroupType`]; drafts are group names.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupsApi;

#[async_trait]
impl CollectionApi for GroupsApi {
    type Parent = GroupType;
    type Entity = GroupDto;
    type Draft = String;

    const NAME: &'static str = "groups";

    async fn list(&self, backend: &Backend, parent: GroupType) -> Result<Vec<GroupDto>, RpcError> {
        let response: ListGroupsResponse = backend
            .call(
                RpcMethod::ListGroups,
                &ListGroupsRequest { group_type: parent },
            )
            .await?;
        Ok(response.groups)
    }

    async fn create(
        &self,
        backend: &Backend,
        parent: GroupType,
        draft: &String,
    ) -> Result<GroupId, RpcError> {
        let created: IdWrapper = backend
            .call(
                RpcMethod::AddGroup,
                &AddGroupRequest {
                    name: draft.clone(),
                    group_type: parent,
                },
            )
            .await?;
        Ok(GroupId(created.id))
    }

    async fn update(&self, backend: &Backend, id: GroupId, draft: &String) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(
                RpcMethod::UpdateGroup,
                &GroupDto {
                    id,
                    name: draft.clone(),
                },
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, backend: &Backend, id: GroupId) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(RpcMethod::DeleteGroup, &IdWrapper { id: id.0 })
            .await?;
        Ok(())
    }

    async fn switch(&self, backend: &Backend, id_a: GroupId, id_b: GroupId) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(RpcMethod::SwitchGroup, &switch_request(id_a, id_b))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoinAccountsApi;

#[async_trait]
impl CollectionApi for CoinAccountsApi {
    type Parent = GroupId;
    type Entity = CoinAccountDto;
    type Draft = CoinAccountDraft;

    const NAME: &'static str = "coin_accounts";

    async fn list(&self, backend: &Backend, parent: GroupId) -> Result<Vec<CoinAccountDto>, RpcError> {
        let response: ListCoinAccountsResponse = backend
            .call(
                RpcMethod::ListCoinAccounts,
                &ListCoinAccountsRequest { group_id: parent },
            )
            .await?;
        Ok(response.accounts)
    }

    async fn create(
        &self,
        backend: &Backend,
        parent: GroupId,
        draft: &CoinAccountDraft,
    ) -> Result<ItemId, RpcError> {
        let created: IdWrapper = backend
            .call(
                RpcMethod::AddCoinAccount,
                &AddCoinAccountRequest {
                    group_id: parent,
                    name: draft.name.clone(),
                    sym: draft.sym.clone(),
                    amount: draft.amount,
                },
            )
            .await?;
        Ok(ItemId(created.id))
    }

    async fn update(
        &self,
        backend: &Backend,
        id: ItemId,
        draft: &CoinAccountDraft,
    ) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(
                RpcMethod::UpdateCoinAccount,
                &UpdateCoinAccountRequest {
                    id,
                    name: draft.name.clone(),
                    sym: draft.sym.clone(),
                    amount: draft.amount,
                },
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, backend: &Backend, id: ItemId) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(RpcMethod::DeleteCoinAccount, &IdWrapper { id: id.0 })
            .await?;
        Ok(())
    }

    async fn switch(&self, backend: &Backend, id_a: ItemId, id_b: ItemId) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(RpcMethod::SwitchCoinAccount, &switch_request(id_a, id_b))
            .await?;
        Ok(())
    }

    fn delete_prompt(&self, entity: Option<&CoinAccountDto>) -> String {
        match entity {
            Some(account) => format!("Really delete coin [{}] ?", account.sym),
            None => "Really delete this account?".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StockTradesApi;

impl StockTradesApi {
    pub async fn close(
        &self,
        backend: &Backend,
        id: ItemId,
        close_at: i64,
        close_amount: f64,
    ) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(
                RpcMethod::CloseStockTrade,
                &CloseStockTradeRequest {
                    id,
                    close_at,
                    close_amount,
                },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CollectionApi for StockTradesApi {
    type Parent = GroupId;
    type Entity = StockTradeDto;
    type Draft = StockTradeDraft;

    const NAME: &'static str = "stock_trades";

    async fn list(&self, backend: &Backend, parent: GroupId) -> Result<Vec<StockTradeDto>, RpcError> {
        let response: ListStockTradesResponse = backend
            .call(RpcMethod::ListStockTrades, &IdWrapper { id: parent.0 })
            .await?;
        Ok(response.trades)
    }

    async fn create(
        &self,
        backend: &Backend,
        parent: GroupId,
        draft: &StockTradeDraft,
    ) -> Result<ItemId, RpcError> {
        let created: IdWrapper = backend
            .call(
                RpcMethod::AddStockTrade,
                &AddStockTradeRequest {
                    group_id: parent,
                    stock_sym: draft.stock_sym.clone(),
                    stock_name: draft.stock_name.clone(),
                    stock_num: draft.stock_num,
                    direction: draft.direction,
                    amount: draft.amount,
                    traded_at: draft.wire_traded_at(),
                },
            )
            .await?;
        Ok(ItemId(created.id))
    }

    async fn update(
        &self,
        backend: &Backend,
        id: ItemId,
        draft: &StockTradeDraft,
    ) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(
                RpcMethod::UpdateStockTrade,
                &UpdateStockTradeRequest {
                    id,
                    stock_sym: draft.stock_sym.clone(),
                    stock_name: draft.stock_name.clone(),
                    stock_num: draft.stock_num,
                    direction: draft.direction,
                    amount: draft.amount,
                    traded_at: draft.wire_traded_at(),
                },
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, backend: &Backend, id: ItemId) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(RpcMethod::DeleteStockTrade, &IdWrapper { id: id.0 })
            .await?;
        Ok(())
    }

    async fn switch(&self, backend: &Backend, id_a: ItemId, id_b: ItemId) -> Result<(), RpcError> {
        let _: Empty = backend
            .call(RpcMethod::SwitchStockTrade, &switch_request(id_a, id_b))
            .await?;
        Ok(())
    }

    fn delete_prompt(&self, entity: Option<&StockTradeDto>) -> String {
        match entity {
            Some(trade) => format!("Really delete this [{}] trade?", trade.stock_name),
            None => "Really delete this trade?".to_string(),
        }
    }
}
