//! Per-conversation state machine merging every message source into one
//! ordered, duplicate-free transcript.

use std::sync::Arc;
use tracing::warn;

use crate::bot::BotClient;
use crate::error::{ChatError, ChatResult};
use crate::filter::{ContentFilter, Filtered};
use crate::live::{ChangeFeed, EventScope, MessageEvent, Subscription};
use crate::models::{Message, NewMessage, UserProfile};
use crate::session::Session;
use crate::state::ChatContext;
use crate::store::MessageStore;
use crate::unread::UnreadAggregator;

/// Health of the live channel backing an open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
    Connected,
    /// No live channel exists; bot conversations are local-only.
    Offline,
    /// The channel failed. The transcript stays visible; recovering means
    /// re-opening the conversation.
    Lost(String),
}

/// What processing one live event did to the transcript.
#[derive(Debug, Clone)]
pub enum TranscriptUpdate {
    Appended(Message),
    Replaced(Message),
    SubscriptionLost(String),
}

/// Result of a successful send.
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    /// True when the content filter rewrote part of the message, so the UI
    /// can tell the sender.
    pub content_rewritten: bool,
}

/// One open conversation. Construction runs the initial fetch and read
/// reconciliation; the live subscription then feeds [`next_update`]. The
/// subscription is torn down when the controller is dropped, before any
/// later subscribe can run.
///
/// [`next_update`]: ConversationController::next_update
pub struct ConversationController {
    session: Session,
    peer: UserProfile,
    store: Arc<dyn MessageStore>,
    filter: Arc<dyn ContentFilter>,
    bot: Arc<dyn BotClient>,
    unread: Arc<UnreadAggregator>,
    transcript: Vec<Message>,
    subscription: Option<Subscription>,
    live: LiveStatus,
}

impl ConversationController {
    /// Opens the conversation with `peer`. A fetch error is terminal for
    /// this open; calling `open` again retries. A subscribe error is not:
    /// the conversation opens with [`LiveStatus::Lost`] and the transcript
    /// intact.
    pub async fn open(ctx: &ChatContext, peer: UserProfile) -> ChatResult<Self> {
        let store = if peer.is_bot {
            Arc::clone(&ctx.bot_store)
        } else {
            Arc::clone(&ctx.store)
        };
        let me = ctx.session.user_id().to_string();

        let transcript = store
            .list_by_pair(&me, &peer.id)
            .await
            .map_err(ChatError::Fetch)?;

        let mut controller = Self {
            session: ctx.session.clone(),
            peer,
            store,
            filter: Arc::clone(&ctx.filter),
            bot: Arc::clone(&ctx.bot),
            unread: Arc::clone(&ctx.unread),
            transcript,
            subscription: None,
            live: LiveStatus::Offline,
        };

        if !controller.peer.is_bot {
            // Reconcile read state before any live event is processed.
            controller.mark_initial_unread().await;
            match ctx
                .feed
                .subscribe(EventScope::Conversation {
                    a: me,
                    b: controller.peer.id.clone(),
                })
                .await
            {
                Ok(subscription) => {
                    controller.subscription = Some(subscription);
                    controller.live = LiveStatus::Connected;
                }
                Err(e) => {
                    warn!(peer = %controller.peer.id, error = %e, "live subscribe failed");
                    controller.live = LiveStatus::Lost(e.to_string());
                }
            }
        }
        controller.unread.set_active_peer(&controller.peer.id);

        Ok(controller)
    }

    pub fn peer(&self) -> &UserProfile {
        &self.peer
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn live_status(&self) -> &LiveStatus {
        &self.live
    }

    /// Bulk read reconciliation for everything the initial fetch brought in.
    async fn mark_initial_unread(&mut self) {
        let me = self.session.user_id();
        let unread_ids: Vec<String> = self
            .transcript
            .iter()
            .filter(|m| m.sender_id == self.peer.id && m.receiver_id == me && !m.read)
            .map(|m| m.id.clone())
            .collect();
        if unread_ids.is_empty() {
            return;
        }
        match self.store.mark_read(&unread_ids).await {
            // Acceptable staleness; the next open reconciles again.
            Err(e) => warn!(peer = %self.peer.id, error = %e, "bulk mark_read failed"),
            Ok(()) => self.unread.conversation_read(&self.peer.id),
        }
    }

    /// Waits for the next live event and merges it. Returns None when the
    /// conversation has no live channel (bot) or the channel has ended.
    pub async fn next_update(&mut self) -> Option<TranscriptUpdate> {
        loop {
            let item = match self.subscription.as_mut() {
                Some(subscription) => subscription.next().await,
                None => return None,
            };
            match item {
                Some(Ok(event)) => {
                    if let Some(update) = self.apply_event(event).await {
                        return Some(update);
                    }
                }
                Some(Err(e)) => {
                    let reason = e.to_string();
                    self.subscription = None;
                    self.live = LiveStatus::Lost(reason.clone());
                    return Some(TranscriptUpdate::SubscriptionLost(reason));
                }
                None => {
                    self.subscription = None;
                    return None;
                }
            }
        }
    }

    /// Merges one event into the transcript. Duplicate and irrelevant
    /// events produce None.
    pub async fn apply_event(&mut self, event: MessageEvent) -> Option<TranscriptUpdate> {
        match event {
            MessageEvent::Inserted(message) => self.apply_insert(message).await,
            MessageEvent::Updated(message) => self.apply_update(message),
        }
    }

    async fn apply_insert(&mut self, message: Message) -> Option<TranscriptUpdate> {
        let me = self.session.user_id();
        if !message.involves(me, &self.peer.id) {
            return None;
        }
        // The same row can arrive from more than one source; first one wins.
        if self.transcript.iter().any(|m| m.id == message.id) {
            return None;
        }

        if message.sender_id == self.peer.id && message.receiver_id == me {
            match self
                .store
                .mark_read(std::slice::from_ref(&message.id))
                .await
            {
                Err(e) => warn!(message_id = %message.id, error = %e, "mark_read failed"),
                Ok(()) => self.unread.conversation_read(&self.peer.id),
            }
        }

        let at = self
            .transcript
            .iter()
            .rposition(|m| m.ordering_key() <= message.ordering_key())
            .map(|i| i + 1)
            .unwrap_or(0);
        self.transcript.insert(at, message.clone());
        Some(TranscriptUpdate::Appended(message))
    }

    fn apply_update(&mut self, message: Message) -> Option<TranscriptUpdate> {
        if !message.involves(self.session.user_id(), &self.peer.id) {
            return None;
        }
        // Unknown id: not in this transcript yet; the next fetch or the
        // insert event reconciles.
        let slot = self.transcript.iter_mut().find(|m| m.id == message.id)?;
        *slot = message.clone();
        Some(TranscriptUpdate::Replaced(message))
    }

    /// Sends `text` to the open peer. Empty (after trimming) input is a
    /// no-op. For real peers the transcript is not touched here: the live
    /// insert event is the authority, and on failure the caller's input
    /// stays untouched for retry.
    pub async fn send(&mut self, text: &str) -> ChatResult<SendOutcome> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(SendOutcome::default());
        }
        let filtered = self.filter.apply(trimmed);

        if self.peer.is_bot {
            return self.send_to_bot(filtered).await;
        }

        let draft = NewMessage {
            sender_id: self.session.user_id().to_string(),
            receiver_id: self.peer.id.clone(),
            content: filtered.content,
            is_bot: false,
        };
        self.store.append(draft).await.map_err(ChatError::Send)?;

        Ok(SendOutcome {
            content_rewritten: filtered.rewritten,
        })
    }

    /// Bot round trip: the user's message is appended optimistically (there
    /// is no live-event path), then the responder is called. A failed round
    /// trip keeps the user's message and appends nothing else.
    async fn send_to_bot(&mut self, filtered: Filtered) -> ChatResult<SendOutcome> {
        let me = self.session.user_id().to_string();
        let prompt = filtered.content.clone();

        let user_message = self
            .store
            .append(NewMessage {
                sender_id: me.clone(),
                receiver_id: self.peer.id.clone(),
                content: filtered.content,
                is_bot: false,
            })
            .await
            .map_err(ChatError::Send)?;
        self.transcript.push(user_message);

        let reply = self.bot.reply(&prompt).await?;

        let bot_message = self
            .store
            .append(NewMessage {
                sender_id: self.peer.id.clone(),
                receiver_id: me,
                content: reply,
                is_bot: true,
            })
            .await
            .map_err(ChatError::Send)?;
        self.transcript.push(bot_message);

        Ok(SendOutcome {
            content_rewritten: filtered.rewritten,
        })
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        // Tear the live channel down before a later open can subscribe.
        self.subscription.take();
        self.unread.conversation_closed(&self.peer.id);
    }
}
