//! Update dispatcher
//!
//! Entry point for every inbound update: classify, serialize per
//! conversation, load the session, run the pure transition, execute its
//! actions, persist the next state.

use super::error::{DispatchError, ErrorClass};
use super::locks::ConversationLocks;
use super::render;
use super::traits::{Reply, SessionStore, Transport};
use crate::commerce::{CommerceGateway, GatewayError, GatewayErrorKind};
use crate::credentials::{Credential, CredentialManager, IdentityProvider};
use crate::state_machine::{transition, ConversationId, Input, OutboundAction, SessionState, Update};
use crate::store::StoreError;
use std::future::Future;
use std::sync::Arc;

/// Generic dispatcher over any store, gateway, transport and identity provider
pub struct Dispatcher<S, G, T, I>
where
    S: SessionStore,
    G: CommerceGateway,
    T: Transport,
    I: IdentityProvider,
{
    store: S,
    gateway: G,
    transport: T,
    credentials: Arc<CredentialManager<I>>,
    locks: ConversationLocks,
}

impl<S, G, T, I> Dispatcher<S, G, T, I>
where
    S: SessionStore,
    G: CommerceGateway,
    T: Transport,
    I: IdentityProvider,
{
    pub fn new(store: S, gateway: G, transport: T, credentials: Arc<CredentialManager<I>>) -> Self {
        Self {
            store,
            gateway,
            transport,
            credentials,
            locks: ConversationLocks::new(),
        }
    }

    /// Process one update to completion.
    ///
    /// The conversation lock is the first thing awaited, so concurrent calls
    /// for one conversation run in the order they were first polled.
    ///
    /// On error the session keeps its pre-update state, the user has been
    /// told (best-effort) and the error is returned for logging.
    pub async fn handle(&self, update: Update) -> Result<(), DispatchError> {
        let conversation_id = update.conversation_id();
        let _guard = self.locks.acquire(conversation_id).await;

        if let Some(callback_id) = update.callback_id() {
            if let Err(e) = self.transport.answer_callback(callback_id).await {
                tracing::debug!(error = %e, "Failed to acknowledge callback");
            }
        }

        let input = update.input();
        let current = if input == Input::Start {
            SessionState::Start
        } else {
            match self.store.get(conversation_id).await {
                Ok(state) => state.unwrap_or_default(),
                Err(StoreError::UnknownState(e)) => {
                    tracing::warn!(
                        conv_id = %conversation_id,
                        error = %e,
                        "Stored session is unreadable, re-prompting"
                    );
                    self.notify(conversation_id, &render::prompt(SessionState::Start))
                        .await;
                    return Ok(());
                }
                Err(e) => {
                    let error = DispatchError::from(e);
                    self.notify(
                        conversation_id,
                        &Reply::text("Something went wrong on our side. Please try again."),
                    )
                    .await;
                    return Err(error);
                }
            }
        };

        let result = transition(current, &update);

        tracing::debug!(
            conv_id = %conversation_id,
            from = %current,
            to = %result.next_state,
            input = ?input,
            actions = result.actions.len(),
            "Transition"
        );

        let mut credential = None;
        for action in &result.actions {
            if let Err(e) = self.execute(conversation_id, action, &mut credential).await {
                self.report_failure(conversation_id, current, &e).await;
                return Err(e);
            }
        }

        if let Err(e) = self.store.set(conversation_id, result.next_state).await {
            let error = DispatchError::from(e);
            self.report_failure(conversation_id, current, &error).await;
            return Err(error);
        }

        if current != result.next_state {
            tracing::info!(
                conv_id = %conversation_id,
                from = %current,
                to = %result.next_state,
                "Session advanced"
            );
        }

        Ok(())
    }

    /// Run one action and send its reply.
    ///
    /// `credential` is fetched on the first commerce call of the update and
    /// reused by the ones after it.
    async fn execute(
        &self,
        conversation_id: ConversationId,
        action: &OutboundAction,
        credential: &mut Option<Credential>,
    ) -> Result<(), DispatchError> {
        let name = action.name();
        let gateway = &self.gateway;

        let reply = match action {
            OutboundAction::SendText { text } => Reply::text(text),

            OutboundAction::Reprompt { state } => render::prompt(*state),

            OutboundAction::PromptEmail => render::prompt(SessionState::AwaitingEmail),

            OutboundAction::DismissMessage { message_id } => {
                if let Err(e) = self
                    .transport
                    .delete_message(conversation_id, *message_id)
                    .await
                {
                    tracing::debug!(
                        conv_id = %conversation_id,
                        message_id,
                        error = %e,
                        "Failed to dismiss menu"
                    );
                }
                return Ok(());
            }

            OutboundAction::ShowCatalog => {
                let products = self
                    .call(credential, name, move |token| async move {
                        gateway.list_products(&token).await
                    })
                    .await?;
                render::catalog(&products)
            }

            OutboundAction::ShowProduct { product_id } => {
                let product = self
                    .call(credential, name, move |token| async move {
                        gateway.get_product(&token, product_id).await
                    })
                    .await?;
                let photo = self
                    .call(credential, name, move |token| async move {
                        gateway.download_primary_image(&token, product_id).await
                    })
                    .await;
                let photo = match photo {
                    Ok(photo) => photo,
                    Err(e) if e.class() == ErrorClass::AuthExpiredOrInvalid => return Err(e),
                    Err(e) => {
                        tracing::warn!(
                            product_id = %product_id,
                            error = %e,
                            "Product image unavailable, sending text card"
                        );
                        None
                    }
                };
                render::product_card(&product, photo)
            }

            OutboundAction::AddToCart {
                product_id,
                quantity,
            } => {
                let product = self
                    .call(credential, name, move |token| async move {
                        gateway.get_product(&token, product_id).await
                    })
                    .await?;
                let sku = product.sku.as_str();
                self.call(credential, name, move |token| async move {
                    gateway
                        .add_to_cart(&token, conversation_id, sku, *quantity)
                        .await
                })
                .await?;
                render::added_to_cart(&product, *quantity)
            }

            OutboundAction::ShowCart => {
                let cart = self
                    .call(credential, name, move |token| async move {
                        gateway.get_cart(&token, conversation_id).await
                    })
                    .await?;
                render::cart(&cart)
            }

            OutboundAction::RemoveFromCart { item_id } => {
                self.call(credential, name, move |token| async move {
                    gateway
                        .remove_from_cart(&token, conversation_id, item_id)
                        .await
                })
                .await?;
                render::removed_from_cart()
            }

            OutboundAction::CreateCustomer { email } => {
                self.call(credential, name, move |token| async move {
                    gateway.create_customer(&token, email).await
                })
                .await?;
                return Ok(());
            }
        };

        self.transport.send(conversation_id, &reply).await?;
        Ok(())
    }

    /// One commerce call with a valid credential.
    ///
    /// An `Auth` rejection forces a refresh and retries the call once.
    async fn call<R, F, Fut>(
        &self,
        credential: &mut Option<Credential>,
        action: &'static str,
        request: F,
    ) -> Result<R, DispatchError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<R, GatewayError>>,
    {
        let token = match credential.as_ref() {
            Some(c) => c.value.clone(),
            None => {
                let c = self.credentials.ensure_valid().await?;
                let token = c.value.clone();
                *credential = Some(c);
                token
            }
        };

        match request(token).await {
            Err(e) if e.kind == GatewayErrorKind::Auth => {
                tracing::warn!(action, "Commerce API rejected credential, refreshing");
                let fresh = self.credentials.force_refresh().await?;
                let token = fresh.value.clone();
                *credential = Some(fresh);
                request(token)
                    .await
                    .map_err(|e| DispatchError::gateway(action, e))
            }
            result => result.map_err(|e| DispatchError::gateway(action, e)),
        }
    }

    async fn report_failure(
        &self,
        conversation_id: ConversationId,
        state: SessionState,
        error: &DispatchError,
    ) {
        tracing::warn!(
            conv_id = %conversation_id,
            state = %state,
            class = ?error.class(),
            error = %error,
            "Update aborted, session left unchanged"
        );
        self.notify(conversation_id, &render::failure(error, state))
            .await;
    }

    async fn notify(&self, conversation_id: ConversationId, reply: &Reply) {
        if let Err(e) = self.transport.send(conversation_id, reply).await {
            tracing::error!(conv_id = %conversation_id, error = %e, "Failed to notify user");
        }
    }
}
