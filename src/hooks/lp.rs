use std::sync::Arc;

use futures::FutureExt;

use super::{FetchState, Resource, Tracker};
use crate::api::{
    Client, Error, Result,
    types::{LiquidityProvider, LpEarnings, Order, RegisterLp},
};

/// The authenticated user's liquidity provider profile.
///
/// Without a bearer token on the client, [`fetch`](Self::fetch) does nothing and
/// the mutations fail with [`Error::Unauthenticated`].
pub struct LpProfile {
    client: Client,
    tracker: Tracker<LiquidityProvider>,
}

impl std::fmt::Debug for LpProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LpProfile")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl LpProfile {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            tracker: Tracker::new(),
        }
    }

    /// Fetches the profile.
    pub async fn fetch(&self) -> Result<LiquidityProvider> {
        self.client.token().ok_or(Error::Unauthenticated)?;
        self.tracker
            .run(self.client.lp_profile(), store_profile)
            .await
    }

    /// Registers as a liquidity provider; the new profile becomes `data`.
    pub async fn register(&self, req: &RegisterLp) -> Result<LiquidityProvider> {
        self.client.token().ok_or(Error::Unauthenticated)?;
        self.tracker
            .run(self.client.register_lp(req), store_profile)
            .await
    }

    /// Toggles availability and patches `data` to match.
    ///
    /// This neither sets `loading` nor records failures in `error`.
    pub async fn update_availability(&self, is_available: bool) -> Result<()> {
        let update = self.client.set_lp_availability(is_available).await?;
        log::debug!("availability updated: {}", update.message);

        if !self.tracker.scope().is_cancelled() {
            self.tracker
                .modify_data(|profile| profile.is_available = update.is_available);
        }
        Ok(())
    }

    pub fn state(&self) -> FetchState<LiquidityProvider> {
        self.tracker.state()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<FetchState<LiquidityProvider>> {
        self.tracker.subscribe()
    }
}

fn store_profile(state: &mut FetchState<LiquidityProvider>, profile: &LiquidityProvider) {
    state.data = Some(profile.clone());
}

/// Aggregate liquidity provider statistics.
///
/// Without a bearer token on `client`, fetching does nothing.
pub fn lp_earnings(client: Client) -> Resource<LpEarnings> {
    authenticated(client, |client| async move { client.lp_earnings().await }.boxed())
}

/// Orders a liquidity provider can accept.
pub fn lp_available_orders(client: Client) -> Resource<Vec<Order>> {
    authenticated(client, |client| {
        async move { client.lp_available_orders().await }.boxed()
    })
}

/// Orders handled by the authenticated liquidity provider.
pub fn lp_orders(client: Client) -> Resource<Vec<Order>> {
    authenticated(client, |client| async move { client.lp_orders().await }.boxed())
}

fn authenticated<T, F>(client: Client, fetch: F) -> Resource<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(Client) -> futures::future::BoxFuture<'static, Result<T>> + Send + Sync + 'static,
{
    Resource::from_fetcher(Arc::new(move || {
        client.token()?;
        Some(fetch(client.clone()))
    }))
}
