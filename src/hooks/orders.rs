use std::{ops::Deref, time::Duration};

use futures::FutureExt;

use super::{FetchState, Resource, Tracker};
use crate::api::{
    Client, Result,
    types::{ConfirmPayment, CreateOrder, ExchangeRates, Order, OrderType},
};

/// Open orders, optionally filtered by type.
///
/// Every [`refetch`](Resource::refetch) uses the filter the hook was created with.
#[derive(Debug)]
pub struct ActiveOrders {
    filter: Option<OrderType>,
    resource: Resource<Vec<Order>>,
}

impl ActiveOrders {
    pub fn new(client: Client, filter: Option<OrderType>) -> Self {
        let resource = Resource::new(move || {
            let client = client.clone();
            async move { client.active_orders(filter).await }
        });
        Self { filter, resource }
    }

    /// Returns the order type filter.
    pub fn filter(&self) -> Option<OrderType> {
        self.filter
    }
}

impl Deref for ActiveOrders {
    type Target = Resource<Vec<Order>>;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

/// The authenticated user's orders.
///
/// Without a bearer token on `client`, fetching does nothing.
pub fn my_orders(client: Client) -> Resource<Vec<Order>> {
    Resource::from_fetcher(std::sync::Arc::new(move || {
        client.token()?;
        let client = client.clone();
        Some(async move { client.my_orders().await }.boxed())
    }))
}

/// Exchange rates, fetched immediately and then every `period` until dropped.
///
/// Must be called within a Tokio runtime.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use polkapay::{api, hooks};
///
/// # async fn example() {
/// let rates = hooks::exchange_rates(api::local(), Duration::from_secs(30));
/// let mut updates = rates.subscribe();
/// let state = updates.wait_for(|state| !state.loading).await.unwrap().clone();
/// # }
/// ```
pub fn exchange_rates(client: Client, period: Duration) -> Resource<ExchangeRates> {
    Resource::polling(
        move || {
            let client = client.clone();
            async move { client.exchange_rates().await }
        },
        period,
    )
}

/// Order mutations: create, accept, confirm payment and complete.
///
/// `data` is the order returned by the last successful mutation.
pub struct OrderActions {
    client: Client,
    tracker: Tracker<Order>,
}

impl std::fmt::Debug for OrderActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderActions")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl OrderActions {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            tracker: Tracker::new(),
        }
    }

    /// Creates an order.
    pub async fn create(&self, req: &CreateOrder) -> Result<Order> {
        self.tracker
            .run(self.client.create_order(req), store_order)
            .await
    }

    /// Accepts an order as a liquidity provider.
    pub async fn accept(&self, id: u64) -> Result<Order> {
        self.tracker
            .run(self.client.accept_order(id), store_order)
            .await
    }

    /// Reports the PIX payment of an order as sent.
    pub async fn confirm_payment(&self, id: u64, req: &ConfirmPayment) -> Result<Order> {
        self.tracker
            .run(self.client.confirm_payment(id, req), store_order)
            .await
    }

    /// Marks an order as completed.
    pub async fn complete(&self, id: u64) -> Result<Order> {
        self.tracker
            .run(self.client.complete_order(id), store_order)
            .await
    }

    pub fn state(&self) -> FetchState<Order> {
        self.tracker.state()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<FetchState<Order>> {
        self.tracker.subscribe()
    }
}

fn store_order(state: &mut FetchState<Order>, order: &Order) {
    state.data = Some(order.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> Client {
        Client::new("http://192.0.2.1:9/api/v1".parse().unwrap())
    }

    #[tokio::test]
    async fn test_my_orders_without_token_does_nothing() {
        let orders = my_orders(offline());
        assert!(orders.refetch().await.unwrap_err().is_unauthenticated());
        assert_eq!(orders.state(), FetchState::default());
    }

    #[tokio::test]
    async fn test_order_actions_require_token_for_accept() {
        let actions = OrderActions::new(offline());
        let err = actions.accept(1).await.unwrap_err();
        assert!(err.is_unauthenticated());

        let state = actions.state();
        assert_eq!(state.error.as_deref(), Some("authentication required"));
        assert!(!state.loading);
    }

    #[test]
    fn test_active_orders_keeps_filter() {
        let orders = ActiveOrders::new(offline(), Some(OrderType::Sell));
        assert_eq!(orders.filter(), Some(OrderType::Sell));
    }
}
