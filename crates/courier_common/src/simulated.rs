// --- File: crates/courier_common/src/simulated.rs ---
//! Simulated provider for development and test environments.
//!
//! Selecting it is an explicit configuration choice (`provider =
//! "simulated"`), rejected by config validation in production. It accepts
//! any message type, logs the dispatch and returns a locally generated
//! message id so the rest of the pipeline (usage log, webhook correlation)
//! behaves exactly as with a real backend.

use std::marker::PhantomData;

use tracing::info;
use uuid::Uuid;

use crate::error::CourierError;
use crate::services::{BoxFuture, Channel, ChannelProvider, DispatchResult};

pub struct SimulatedProvider<M> {
    channel: Channel,
    _marker: PhantomData<fn(M)>,
}

impl<M> SimulatedProvider<M> {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            _marker: PhantomData,
        }
    }
}

impl<M: Send + Sync + 'static> ChannelProvider<M> for SimulatedProvider<M> {
    fn send(&self, _message: M) -> BoxFuture<'_, DispatchResult, CourierError> {
        Box::pin(async move {
            let message_id = format!("sim-{}", Uuid::new_v4());
            info!(channel = %self.channel, %message_id, "Simulated dispatch");
            Ok(DispatchResult::sent(message_id))
        })
    }

    fn backend(&self) -> &'static str {
        "simulated"
    }

    fn channel(&self) -> Channel {
        self.channel
    }
}
