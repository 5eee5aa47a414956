//! Per-session actors: serialized signal mailboxes and snapshot queries.
//!
//! Each session's saga runs as an addressable entity keyed by session
//! id. Mutating calls go through the entity's single-owner mailbox and
//! are applied one at a time in arrival order; once the Submitted
//! transition is observed, the actor runs the checkout pipeline before
//! draining further mailbox traffic. Reads never touch the mailbox:
//! the actor publishes a snapshot after every applied mutation and
//! readers clone the latest one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::SessionId;
use domain::{
    AddItem, AssignUser, CartItem, CartService, CartSession, CartState, CheckoutInfo, OpenSession,
    OrderInfo, ProductId, RemoveItem, ReviseCart, StageCheckout, UserId,
};
use event_store::EventStore;
use ledger::LedgerStore;
use tokio::sync::{Mutex, mpsc, watch};

use crate::coordinator::CheckoutCoordinator;
use crate::error::SagaError;

/// A cart mutation signal, applied fire-and-forget in arrival order.
#[derive(Debug, Clone)]
pub enum CartSignal {
    /// Add one unit of a product.
    AddItem(ProductId),
    /// Remove a product's line.
    RemoveItem(ProductId),
    /// Replace quantities of existing lines.
    ReviseItems(Vec<CartItem>),
    /// Attach a user to the session.
    AssignUser(UserId),
    /// Stage checkout form data (fires submission when a user is present).
    StageCheckout(CheckoutInfo),
}

/// A point-in-time snapshot of a session's cart.
#[derive(Debug, Clone)]
pub struct CartView {
    /// Session lifecycle state.
    pub state: CartState,
    /// Cart lines.
    pub items: Vec<CartItem>,
    /// Accumulating order info.
    pub info: OrderInfo,
}

impl From<&CartSession> for CartView {
    fn from(session: &CartSession) -> Self {
        Self {
            state: session.state(),
            items: session.items().to_vec(),
            info: session.info().clone(),
        }
    }
}

/// Handle to a session actor: signal sender plus snapshot receiver.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    signals: mpsc::Sender<CartSignal>,
    view: watch::Receiver<CartView>,
}

impl SessionHandle {
    /// Returns the session this handle addresses.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Enqueues a mutation signal.
    ///
    /// The signal is applied asynchronously, in arrival order relative
    /// to other signals on this session.
    pub async fn signal(&self, signal: CartSignal) -> Result<(), SagaError> {
        self.signals
            .send(signal)
            .await
            .map_err(|_| SagaError::MailboxClosed(self.session_id.clone()))
    }

    /// Returns the latest published snapshot.
    pub fn view(&self) -> CartView {
        self.view.borrow().clone()
    }

    /// Returns the cart lines from the latest snapshot.
    pub fn cart_items(&self) -> Vec<CartItem> {
        self.view.borrow().items.clone()
    }

    /// Returns the order info from the latest snapshot.
    pub fn info(&self) -> OrderInfo {
        self.view.borrow().info.clone()
    }

    /// Returns the session state from the latest snapshot.
    pub fn state(&self) -> CartState {
        self.view.borrow().state
    }

    /// Waits until the published snapshot satisfies the predicate.
    ///
    /// Returns false if the timeout elapses (or the actor dies) first.
    pub async fn wait_until<F>(&self, timeout: Duration, mut pred: F) -> bool
    where
        F: FnMut(&CartView) -> bool,
    {
        let mut rx = self.view.clone();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let view = rx.borrow();
                if pred(&view) {
                    return true;
                }
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                _ => {
                    let view = rx.borrow();
                    return pred(&view);
                }
            }
        }
    }
}

/// Owns the session actors, keyed by session id.
pub struct SessionRegistry<S, L>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    carts: Arc<CartService<S>>,
    coordinator: Arc<CheckoutCoordinator<S, L>>,
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl<S, L> SessionRegistry<S, L>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    /// Creates a new registry.
    pub fn new(carts: Arc<CartService<S>>, coordinator: Arc<CheckoutCoordinator<S, L>>) -> Self {
        Self {
            carts,
            coordinator,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Creates or attaches to the session's actor.
    ///
    /// A brand-new session gets a fresh cart; a known one is reloaded
    /// from its event history. A session that was interrupted
    /// mid-checkout (Submitted/Processing after a restart) has its
    /// pipeline re-driven from the last durable checkpoint.
    #[tracing::instrument(skip(self))]
    pub async fn start(
        &self,
        session_id: SessionId,
        user_id: Option<UserId>,
    ) -> Result<SessionHandle, SagaError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.get(&session_id) {
            return Ok(handle.clone());
        }

        let session = match self.carts.get_session(&session_id).await? {
            Some(session) => session,
            None => {
                metrics::counter!("sessions_opened").increment(1);
                self.carts
                    .open_session(OpenSession::new(session_id.clone(), user_id))
                    .await?
                    .aggregate
            }
        };

        let needs_resume = matches!(
            session.state(),
            CartState::Submitted | CartState::Processing
        );

        let (signal_tx, signal_rx) = mpsc::channel(64);
        let (view_tx, view_rx) = watch::channel(CartView::from(&session));
        let handle = SessionHandle {
            session_id: session_id.clone(),
            signals: signal_tx,
            view: view_rx,
        };
        sessions.insert(session_id.clone(), handle.clone());
        drop(sessions);

        tokio::spawn(run_session_actor(
            self.carts.clone(),
            self.coordinator.clone(),
            session_id,
            signal_rx,
            view_tx,
            needs_resume,
        ));

        Ok(handle)
    }

    /// Returns the handle for a session already attached in this process.
    pub async fn handle(&self, session_id: &SessionId) -> Option<SessionHandle> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Enqueues a signal on an attached session.
    pub async fn signal(
        &self,
        session_id: &SessionId,
        signal: CartSignal,
    ) -> Result<(), SagaError> {
        let handle = self
            .handle(session_id)
            .await
            .ok_or_else(|| SagaError::SessionNotFound(session_id.clone()))?;
        handle.signal(signal).await
    }
}

/// The per-session actor loop: applies one mailbox message at a time,
/// publishes a snapshot after each, and runs the checkout pipeline when
/// the submission guard fires.
async fn run_session_actor<S, L>(
    carts: Arc<CartService<S>>,
    coordinator: Arc<CheckoutCoordinator<S, L>>,
    session_id: SessionId,
    mut signals: mpsc::Receiver<CartSignal>,
    view: watch::Sender<CartView>,
    needs_resume: bool,
) where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    if needs_resume {
        if let Err(error) = coordinator.resume(&session_id).await {
            tracing::error!(%session_id, %error, "pipeline resume failed");
        }
        publish_view(&carts, &session_id, &view).await;
    }

    while let Some(signal) = signals.recv().await {
        let result = match signal {
            CartSignal::AddItem(product_id) => {
                carts
                    .add_item(AddItem::new(session_id.clone(), product_id))
                    .await
            }
            CartSignal::RemoveItem(product_id) => {
                carts
                    .remove_item(RemoveItem::new(session_id.clone(), product_id))
                    .await
            }
            CartSignal::ReviseItems(items) => {
                carts
                    .revise_cart(ReviseCart::new(session_id.clone(), items))
                    .await
            }
            CartSignal::AssignUser(user_id) => {
                carts
                    .assign_user(AssignUser::new(session_id.clone(), user_id))
                    .await
            }
            CartSignal::StageCheckout(info) => {
                carts
                    .stage_checkout(StageCheckout::new(session_id.clone(), info))
                    .await
            }
        };

        match result {
            Ok(result) => {
                let submitted = result.aggregate.state() == CartState::Submitted;
                let _ = view.send(CartView::from(&result.aggregate));

                // The pipeline runs to completion before the next queued
                // signal is considered; post-submission signals are
                // no-ops regardless.
                if submitted {
                    if let Err(error) = coordinator.execute(&session_id).await {
                        tracing::error!(%session_id, %error, "checkout pipeline failed to run");
                    }
                    publish_view(&carts, &session_id, &view).await;
                }
            }
            Err(error) => {
                tracing::error!(%session_id, %error, "signal could not be applied");
            }
        }
    }
}

async fn publish_view<S: EventStore>(
    carts: &CartService<S>,
    session_id: &SessionId,
    view: &watch::Sender<CartView>,
) {
    match carts.get_session(session_id).await {
        Ok(Some(session)) => {
            let _ = view.send(CartView::from(&session));
        }
        Ok(None) => {}
        Err(error) => {
            tracing::error!(%session_id, %error, "failed to refresh session view");
        }
    }
}
