#![allow(dead_code)]

//! Shared fakes: an in-memory store wired to a channel-backed feed, so the
//! merge logic runs without a database or a live network.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use messaging_core::bot::BotClient;
use messaging_core::error::{BotError, StoreError, SubscriptionError};
use messaging_core::filter::WordListFilter;
use messaging_core::live::{
    ChangeFeed, EventScope, FeedItem, MessageEvent, Subscription, SubscriptionGuard,
};
use messaging_core::models::{Message, MessageId, NewMessage, UserId, UserProfile};
use messaging_core::session::Session;
use messaging_core::state::ChatContext;
use messaging_core::store::MessageStore;
use messaging_core::unread::UnreadAggregator;

pub fn profile(id: &str) -> UserProfile {
    UserProfile {
        id: id.into(),
        display_name: Some(id.to_uppercase()),
        email: None,
        avatar_url: None,
        is_bot: false,
    }
}

pub fn message_at(secs: i64, id: &str, sender: &str, receiver: &str, content: &str) -> Message {
    Message {
        id: id.into(),
        sender_id: sender.into(),
        receiver_id: receiver.into(),
        content: content.into(),
        created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        read: false,
        is_bot: false,
    }
}

fn scope_label(scope: &EventScope) -> String {
    match scope {
        EventScope::Conversation { a, b } => format!("conversation:{a}:{b}"),
        EventScope::Inbox { receiver } => format!("inbox:{receiver}"),
    }
}

/// Channel-backed change feed. Records subscribe/unsubscribe order so tests
/// can assert teardown happens before the next subscription.
#[derive(Clone, Default)]
pub struct FakeFeed {
    inner: Arc<FeedInner>,
}

#[derive(Default)]
struct FeedInner {
    subs: Mutex<Vec<FakeSub>>,
    log: Mutex<Vec<String>>,
}

struct FakeSub {
    scope: EventScope,
    tx: UnboundedSender<FeedItem>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: MessageEvent) {
        let subs = self.inner.subs.lock().unwrap();
        for sub in subs.iter() {
            if sub.scope.matches(event.message()) {
                let _ = sub.tx.send(Ok(event.clone()));
            }
        }
    }

    pub fn fail_all(&self) {
        let subs = self.inner.subs.lock().unwrap();
        for sub in subs.iter() {
            let _ = sub
                .tx
                .send(Err(SubscriptionError::Dropped("connection lost".into())));
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.inner.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeFeed for FakeFeed {
    async fn subscribe(&self, scope: EventScope) -> Result<Subscription, SubscriptionError> {
        let (tx, rx) = unbounded_channel();
        let label = scope_label(&scope);
        self.inner
            .log
            .lock()
            .unwrap()
            .push(format!("subscribe:{label}"));
        self.inner.subs.lock().unwrap().push(FakeSub { scope, tx });

        let inner = Arc::clone(&self.inner);
        let guard = SubscriptionGuard::with_callback(move || {
            inner
                .log
                .lock()
                .unwrap()
                .push(format!("unsubscribe:{label}"));
        });
        Ok(Subscription::new(rx, guard))
    }
}

/// In-memory message store that mirrors the production wiring: every
/// successful write is published to the attached feed.
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<Message>>,
    next_id: AtomicI64,
    feed: Option<FakeFeed>,
    fail_list: AtomicBool,
    fail_append: AtomicBool,
    mark_read_calls: Mutex<Vec<Vec<MessageId>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            feed: None,
            fail_list: AtomicBool::new(false),
            fail_append: AtomicBool::new(false),
            mark_read_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_feed(feed: FakeFeed) -> Self {
        Self {
            feed: Some(feed),
            ..Self::new()
        }
    }

    /// Pre-populates rows without emitting events (pre-session history).
    pub fn seed(&self, messages: Vec<Message>) {
        self.messages.lock().unwrap().extend(messages);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn mark_read_calls(&self) -> Vec<Vec<MessageId>> {
        self.mark_read_calls.lock().unwrap().clone()
    }

    fn emit(&self, event: MessageEvent) {
        if let Some(feed) = &self.feed {
            feed.emit(event);
        }
    }

    fn transport_error(what: &str) -> StoreError {
        StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, what.to_string()))
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn list_by_pair(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::transport_error("list failed"));
        }
        let mut messages: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.involves(a, b))
            .cloned()
            .collect();
        messages.sort_by(|x, y| x.ordering_key().cmp(&y.ordering_key()));
        Ok(messages)
    }

    async fn append(&self, draft: NewMessage) -> Result<Message, StoreError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(Self::transport_error("append failed"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id: format!("msg-{n:04}"),
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            content: draft.content,
            created_at: Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap(),
            read: false,
            is_bot: draft.is_bot,
        };
        self.messages.lock().unwrap().push(message.clone());
        self.emit(MessageEvent::Inserted(message.clone()));
        Ok(message)
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<(), StoreError> {
        self.mark_read_calls.lock().unwrap().push(ids.to_vec());
        let mut changed = Vec::new();
        {
            let mut messages = self.messages.lock().unwrap();
            for message in messages.iter_mut() {
                if !message.read && ids.contains(&message.id) {
                    message.read = true;
                    changed.push(message.clone());
                }
            }
        }
        for row in changed {
            self.emit(MessageEvent::Updated(row));
        }
        Ok(())
    }

    async fn count_unread_by_sender(
        &self,
        user: &str,
    ) -> Result<HashMap<UserId, i64>, StoreError> {
        let mut counts = HashMap::new();
        for message in self.messages.lock().unwrap().iter() {
            if message.receiver_id == user && !message.read {
                *counts.entry(message.sender_id.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn latest_by_peer(&self, user: &str) -> Result<HashMap<UserId, Message>, StoreError> {
        let mut latest: HashMap<UserId, Message> = HashMap::new();
        for message in self.messages.lock().unwrap().iter() {
            let peer = if message.sender_id == user {
                message.receiver_id.clone()
            } else if message.receiver_id == user {
                message.sender_id.clone()
            } else {
                continue;
            };
            match latest.get(&peer) {
                Some(existing) if existing.ordering_key() >= message.ordering_key() => {}
                _ => {
                    latest.insert(peer, message.clone());
                }
            }
        }
        Ok(latest)
    }
}

pub enum ScriptedReply {
    Text(String),
    Status(u16, String),
}

/// Bot stub with a queue of canned outcomes.
#[derive(Default)]
pub struct ScriptedBot {
    replies: Mutex<VecDeque<ScriptedReply>>,
}

impl ScriptedBot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Text(text.into()));
    }

    pub fn push_status(&self, status: u16, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Status(status, message.into()));
    }
}

#[async_trait]
impl BotClient for ScriptedBot {
    async fn reply(&self, _prompt: &str) -> Result<String, BotError> {
        match self.replies.lock().unwrap().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Status(status, message)) => {
                Err(BotError::Status { status, message })
            }
            None => Err(BotError::EmptyReply),
        }
    }
}

/// Everything a test needs, wired the way `ChatContext::connect` wires the
/// production backends.
pub struct TestHarness {
    pub store: Arc<InMemoryMessageStore>,
    pub feed: FakeFeed,
    pub bot: Arc<ScriptedBot>,
    pub ctx: ChatContext,
}

pub fn harness(user: &str) -> TestHarness {
    let feed = FakeFeed::new();
    let store = Arc::new(InMemoryMessageStore::with_feed(feed.clone()));
    harness_with_bot_store(user, feed, store.clone(), Arc::new(InMemoryMessageStore::new()))
}

pub fn harness_with_bot_store(
    user: &str,
    feed: FakeFeed,
    store: Arc<InMemoryMessageStore>,
    bot_store: Arc<dyn MessageStore>,
) -> TestHarness {
    let bot = Arc::new(ScriptedBot::new());
    let ctx = ChatContext {
        session: Session::new(profile(user)),
        store: store.clone(),
        bot_store,
        feed: Arc::new(feed.clone()),
        filter: Arc::new(WordListFilter::empty()),
        bot: bot.clone(),
        unread: Arc::new(UnreadAggregator::new(user)),
    };
    TestHarness {
        store,
        feed,
        bot,
        ctx,
    }
}
