//! The delivery engine: turns a pending intent plus submitted text into a
//! persisted whisper and its gated group notification.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use hush_core::config::{GatePolicy, WhisperConfig};
use hush_store::types::{Stats, WhisperRecord};
use hush_store::Store;

use crate::error::WhisperError;
use crate::fanout;
use crate::gate::RevealToken;
use crate::transport::{Action, MembershipGate, Transport};

/// What the sender submitted in private. Anything that is not plain text
/// is rejected without touching the pending entry.
#[derive(Debug, Clone)]
pub enum SubmittedContent {
    Text(String),
    Other,
}

/// Shared whisper domain service: pending registry access, delivery,
/// reveal and oversight fanout over a transport seam.
pub struct WhisperService {
    store: Arc<Store>,
    transport: Arc<dyn Transport>,
    gate: Arc<dyn MembershipGate>,
    config: WhisperConfig,
}

impl WhisperService {
    pub fn new(
        store: Arc<Store>,
        transport: Arc<dyn Transport>,
        gate: Arc<dyn MembershipGate>,
        config: WhisperConfig,
    ) -> Self {
        Self {
            store,
            transport,
            gate,
            config,
        }
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    /// Membership gate consultation with the configured failure policy.
    /// A gate that cannot answer resolves to the policy, never a default.
    pub async fn eligible(&self, user_id: i64) -> bool {
        match self.gate.is_eligible(user_id).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(user_id, error = %e, "membership gate unreachable");
                matches!(self.config.gate_policy, GatePolicy::FailOpen)
            }
        }
    }

    /// Open (or replace) a pending whisper request for the sender.
    pub fn open_pending(
        &self,
        group_id: i64,
        sender_id: i64,
        receiver_id: i64,
        anchor_message_id: Option<i64>,
    ) -> Result<(), WhisperError> {
        let ttl = Duration::seconds(self.config.pending_ttl_secs as i64);
        self.store
            .pending_upsert(sender_id, group_id, receiver_id, ttl, anchor_message_id)?;
        Ok(())
    }

    /// Record the transient guide message for later cleanup.
    pub fn attach_guide(&self, sender_id: i64, message_id: i64) -> Result<(), WhisperError> {
        self.store.pending_attach_guide(sender_id, message_id)?;
        Ok(())
    }

    /// Accept a private submission against the sender's pending request.
    ///
    /// Preconditions, in order: membership gate, plain text only, a live
    /// pending entry. The pending entry is consumed before the notification
    /// is published; a publish failure therefore loses the intent and the
    /// sender is told to restart from the group.
    pub async fn submit(
        &self,
        sender_id: i64,
        content: &SubmittedContent,
    ) -> Result<WhisperRecord, WhisperError> {
        if !self.eligible(sender_id).await {
            return Err(WhisperError::NotEligible);
        }
        let text = match content {
            SubmittedContent::Text(t) => t.as_str(),
            SubmittedContent::Other => return Err(WhisperError::NotTextOnly),
        };
        let pending = self
            .store
            .pending_lookup(sender_id)?
            .ok_or(WhisperError::NoPendingRequest)?;

        self.store.pending_consume(sender_id)?;
        self.deliver(
            pending.group_id,
            sender_id,
            pending.receiver_id,
            text,
            pending.anchor_message_id,
            pending.guide_message_id,
        )
        .await
    }

    /// Inline-form bypass: the trigger already carried the whisper text,
    /// so the registry is skipped entirely. The caller has gate-checked
    /// the sender at trigger time.
    pub async fn submit_direct(
        &self,
        group_id: i64,
        sender_id: i64,
        receiver_id: i64,
        text: &str,
    ) -> Result<WhisperRecord, WhisperError> {
        self.deliver(group_id, sender_id, receiver_id, text, None, None)
            .await
    }

    async fn deliver(
        &self,
        group_id: i64,
        sender_id: i64,
        receiver_id: i64,
        text: &str,
        anchor_message_id: Option<i64>,
        guide_message_id: Option<i64>,
    ) -> Result<WhisperRecord, WhisperError> {
        let sender_name = self.display_name(sender_id, "sender").await;
        let receiver_name = self.display_name(receiver_id, "receiver").await;

        let token = RevealToken {
            group_id,
            sender_id,
            receiver_id,
        }
        .encode();
        let notice = format!(
            "{} | you have a whisper!\n👤 from: {}",
            self.transport.mention(receiver_id, &receiver_name),
            self.transport.mention(sender_id, &sender_name),
        );
        let actions = [Action::new("🔒 Show message", &token)];

        // The whisper is only persisted once the group has its notification.
        let message_id = self
            .transport
            .send_notification(group_id, &notice, anchor_message_id, &actions)
            .await
            .map_err(WhisperError::Notify)?;

        let record =
            self.store
                .insert_whisper(group_id, sender_id, receiver_id, text, message_id)?;
        info!(
            whisper = record.id,
            group_id, sender_id, receiver_id, "whisper delivered"
        );

        if let Some(guide) = guide_message_id {
            if !self.transport.delete_message(group_id, guide).await {
                debug!(group_id, guide, "guide message already gone");
            }
        }

        let group_title = self
            .store
            .chat_title(group_id)
            .unwrap_or(None)
            .unwrap_or_else(|| "group".to_string());
        fanout::report(
            &self.store,
            self.transport.as_ref(),
            self.config.owner_id,
            &record,
            &group_title,
            &sender_name,
            &receiver_name,
        )
        .await;

        Ok(record)
    }

    /// Best known display name: directory first, then the transport.
    pub(crate) async fn display_name(&self, user_id: i64, fallback: &str) -> String {
        if let Ok(Some(name)) = self.store.display_name(user_id) {
            return name;
        }
        if let Some(name) = self.transport.resolve_name(user_id).await {
            return name;
        }
        fallback.to_string()
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    // ---- owner administration ----

    /// Grant `watcher_id` oversight of `group_id`'s whispers.
    pub fn open_report(&self, group_id: i64, watcher_id: i64) -> Result<(), WhisperError> {
        self.store.add_watcher(group_id, watcher_id)?;
        info!(group_id, watcher_id, "report opened");
        Ok(())
    }

    /// Revoke oversight. Returns whether a subscription existed.
    pub fn close_report(&self, group_id: i64, watcher_id: i64) -> Result<bool, WhisperError> {
        let existed = self.store.remove_watcher(group_id, watcher_id)?;
        info!(group_id, watcher_id, existed, "report closed");
        Ok(existed)
    }

    pub fn stats(&self) -> Result<Stats, WhisperError> {
        Ok(self.store.stats()?)
    }
}
