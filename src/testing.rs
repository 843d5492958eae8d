//! In-memory stores, directory and broadcasters for unit and router tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::jwt::create_jwt,
    conversation::{
        ordered_pair, Conversation, ConversationKind, ConversationService, ConversationStore,
        IndividualConversation, MembershipGuard, Participant, ParticipantStatus,
    },
    error::{AppError, Result},
    message::{AuthoredMessage, Message, MessageService, MessageStatus, MessageStore},
    realtime::{BroadcastError, ChannelHub, Notifier, RealtimeBroadcaster, RealtimeEvent, SenderInfo},
    resilience::StorePolicy,
    state::{AppState, Config},
    user::{AvatarResolver, CdnAvatarResolver, User, UserDirectory, UserService},
};

pub const TEST_JWT_SECRET: &str = "test-secret";

#[derive(Default)]
struct StoreInner {
    conversations: Vec<(Conversation, Option<(Uuid, Uuid)>)>,
    participants: Vec<Participant>,
    messages: Vec<Message>,
}

/// Conversations, participants and messages behind one lock. Message
/// authors are joined from the directory the way the Postgres store joins
/// `users`.
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
    directory: Arc<InMemoryDirectory>,
    failing_member: Mutex<Option<Uuid>>,
}

impl InMemoryStore {
    pub fn new(directory: Arc<InMemoryDirectory>) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            directory,
            failing_member: Mutex::new(None),
        }
    }

    /// Makes inserting `user_id` into a new group fail, as a constraint or
    /// connection error would mid-transaction.
    pub fn fail_group_member(&self, user_id: Uuid) {
        *self.failing_member.lock().unwrap() = Some(user_id);
    }

    fn authored(&self, message: Message) -> AuthoredMessage {
        let author = self.directory.users.lock().unwrap().get(&message.user_id).cloned();
        AuthoredMessage {
            sender_name: author.as_ref().map(|u| u.username.clone()).unwrap_or_default(),
            sender_avatar_ref: author.and_then(|u| u.avatar_ref),
            message,
        }
    }

    pub fn set_participant_status(&self, conversation_id: i64, user_id: Uuid, status: ParticipantStatus) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner
            .participants
            .iter_mut()
            .find(|p| p.conversation_id == conversation_id && p.user_id == user_id)
        {
            p.status = status;
        }
    }

    pub fn conversation_count(&self) -> usize {
        self.inner.lock().unwrap().conversations.len()
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }
}

impl StoreInner {
    fn insert_conversation(
        &mut self,
        kind: ConversationKind,
        name: Option<&str>,
        pair: Option<(Uuid, Uuid)>,
    ) -> Conversation {
        let conversation = Conversation {
            id: self.conversations.len() as i64 + 1,
            name: name.map(str::to_string),
            kind,
            created_at: Utc::now(),
        };
        self.conversations.push((conversation.clone(), pair));
        conversation
    }

    fn participant(&self, conversation_id: i64, user_id: Uuid) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.conversation_id == conversation_id && p.user_id == user_id)
    }

    fn is_active(&self, conversation_id: i64, user_id: Uuid) -> bool {
        self.participant(conversation_id, user_id)
            .map(Participant::is_active)
            .unwrap_or(false)
    }

    fn join(&mut self, conversation_id: i64, user_id: Uuid) -> Participant {
        if let Some(existing) = self.participant(conversation_id, user_id) {
            return existing.clone();
        }
        let participant = Participant {
            conversation_id,
            user_id,
            joined_at: Utc::now(),
            status: ParticipantStatus::Active,
        };
        self.participants.push(participant.clone());
        participant
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn find_by_id(&self, conversation_id: i64) -> Result<Option<Conversation>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .conversations
            .iter()
            .map(|(c, _)| c)
            .find(|c| c.id == conversation_id)
            .cloned())
    }

    async fn find_participant(&self, conversation_id: i64, user_id: Uuid) -> Result<Option<Participant>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.participant(conversation_id, user_id).cloned())
    }

    async fn find_individual_conversation(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>> {
        let pair = ordered_pair(a, b);
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .conversations
            .iter()
            .filter(|(_, p)| *p == Some(pair))
            .map(|(c, _)| c)
            .find(|c| inner.is_active(c.id, a) && inner.is_active(c.id, b))
            .cloned())
    }

    async fn create_individual_conversation(&self, a: Uuid, b: Uuid) -> Result<IndividualConversation> {
        let pair = ordered_pair(a, b);
        let mut inner = self.inner.lock().unwrap();

        if let Some((existing, _)) = inner.conversations.iter().find(|(_, p)| *p == Some(pair)) {
            return Ok(IndividualConversation {
                conversation: existing.clone(),
                created: false,
            });
        }

        let conversation = inner.insert_conversation(ConversationKind::Individual, None, Some(pair));
        inner.join(conversation.id, pair.0);
        inner.join(conversation.id, pair.1);

        Ok(IndividualConversation {
            conversation,
            created: true,
        })
    }

    async fn create_group_conversation(&self, name: Option<&str>, members: &[Uuid]) -> Result<Conversation> {
        let failing = *self.failing_member.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();

        // Staged on a copy so a failed member leaves nothing behind.
        let mut staged = StoreInner {
            conversations: inner.conversations.clone(),
            participants: inner.participants.clone(),
            messages: Vec::new(),
        };
        let conversation = staged.insert_conversation(ConversationKind::Group, name, None);
        for user_id in members {
            if Some(*user_id) == failing {
                return Err(AppError::InternalError);
            }
            staged.join(conversation.id, *user_id);
        }

        inner.conversations = staged.conversations;
        inner.participants = staged.participants;
        Ok(conversation)
    }

    async fn add_participant(&self, conversation_id: i64, user_id: Uuid) -> Result<Participant> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.join(conversation_id, user_id))
    }

    async fn list_conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        let inner = self.inner.lock().unwrap();
        let mut conversations: Vec<_> = inner
            .conversations
            .iter()
            .map(|(c, _)| c)
            .filter(|c| inner.is_active(c.id, user_id))
            .cloned()
            .collect();
        conversations.sort_by(|x, y| (y.created_at, y.id).cmp(&(x.created_at, x.id)));
        Ok(conversations)
    }

    async fn find_other_participant(&self, conversation_id: i64, user_id: Uuid) -> Result<Option<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .participants
            .iter()
            .find(|p| p.conversation_id == conversation_id && p.user_id != user_id && p.is_active())
            .map(|p| p.user_id))
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append_message(
        &self,
        conversation_id: i64,
        user_id: Uuid,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<Message> {
        let mut inner = self.inner.lock().unwrap();
        let message = Message {
            id: inner.messages.len() as i64 + 1,
            conversation_id,
            user_id,
            content: content.to_string(),
            image_url: image_url.map(str::to_string),
            sent_at: Utc::now(),
            status: MessageStatus::Sent,
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<AuthoredMessage>> {
        let mut messages: Vec<_> = {
            let inner = self.inner.lock().unwrap();
            inner
                .messages
                .iter()
                .filter(|m| m.conversation_id == conversation_id && m.status != MessageStatus::Deleted)
                .cloned()
                .collect()
        };
        messages.sort_by_key(|m: &Message| (m.sent_at, m.id));
        Ok(messages.into_iter().map(|m| self.authored(m)).collect())
    }

    async fn latest_message(&self, conversation_id: i64) -> Result<Option<AuthoredMessage>> {
        Ok(self.list_messages(conversation_id).await?.pop())
    }

    async fn mark_others_read(&self, conversation_id: i64, reader_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut transitioned = 0;
        for m in inner.messages.iter_mut().filter(|m| {
            m.conversation_id == conversation_id
                && m.user_id != reader_id
                && m.status.can_transition_to(MessageStatus::Read)
        }) {
            m.status = MessageStatus::Read;
            transitioned += 1;
        }
        Ok(transitioned)
    }

    async fn count_unread(&self, conversation_id: i64, for_user: Uuid) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .messages
            .iter()
            .filter(|m| {
                m.conversation_id == conversation_id
                    && m.user_id != for_user
                    && m.status == MessageStatus::Sent
            })
            .count() as i64)
    }
}

/// Conversation store whose individual lookup always misses, so every
/// create goes through the insert and meets the pair constraint.
pub struct StaleLookupStore(pub Arc<InMemoryStore>);

#[async_trait]
impl ConversationStore for StaleLookupStore {
    async fn find_by_id(&self, conversation_id: i64) -> Result<Option<Conversation>> {
        self.0.find_by_id(conversation_id).await
    }

    async fn find_participant(&self, conversation_id: i64, user_id: Uuid) -> Result<Option<Participant>> {
        self.0.find_participant(conversation_id, user_id).await
    }

    async fn find_individual_conversation(&self, _: Uuid, _: Uuid) -> Result<Option<Conversation>> {
        Ok(None)
    }

    async fn create_individual_conversation(&self, a: Uuid, b: Uuid) -> Result<IndividualConversation> {
        self.0.create_individual_conversation(a, b).await
    }

    async fn create_group_conversation(&self, name: Option<&str>, members: &[Uuid]) -> Result<Conversation> {
        self.0.create_group_conversation(name, members).await
    }

    async fn add_participant(&self, conversation_id: i64, user_id: Uuid) -> Result<Participant> {
        self.0.add_participant(conversation_id, user_id).await
    }

    async fn list_conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        self.0.list_conversations_for_user(user_id).await
    }

    async fn find_other_participant(&self, conversation_id: i64, user_id: Uuid) -> Result<Option<Uuid>> {
        self.0.find_other_participant(conversation_id, user_id).await
    }
}

/// Message store whose every call hangs.
pub struct StalledMessageStore;

#[async_trait]
impl MessageStore for StalledMessageStore {
    async fn append_message(&self, _: i64, _: Uuid, _: &str, _: Option<&str>) -> Result<Message> {
        std::future::pending().await
    }

    async fn list_messages(&self, _: i64) -> Result<Vec<AuthoredMessage>> {
        std::future::pending().await
    }

    async fn latest_message(&self, _: i64) -> Result<Option<AuthoredMessage>> {
        std::future::pending().await
    }

    async fn mark_others_read(&self, _: i64, _: Uuid) -> Result<u64> {
        std::future::pending().await
    }

    async fn count_unread(&self, _: i64, _: Uuid) -> Result<i64> {
        std::future::pending().await
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryDirectory {
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn name_of(&self, user_id: Uuid) -> String {
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn search(&self, term: &str, exclude: Uuid, limit: i64) -> Result<Vec<User>> {
        let term = term.to_lowercase();
        let mut users: Vec<_> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.id != exclude)
            .filter(|u| {
                u.username.to_lowercase().contains(&term) || u.email.to_lowercase().contains(&term)
            })
            .cloned()
            .collect();
        users.sort_by(|x, y| x.username.cmp(&y.username));
        users.truncate(limit as usize);
        Ok(users)
    }
}

/// Directory whose every lookup hangs.
pub struct StalledDirectory;

#[async_trait]
impl UserDirectory for StalledDirectory {
    async fn find_by_id(&self, _: Uuid) -> Result<Option<User>> {
        std::future::pending().await
    }

    async fn search(&self, _: &str, _: Uuid, _: i64) -> Result<Vec<User>> {
        std::future::pending().await
    }
}

/// Records every published frame.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<(String, RealtimeEvent)>>,
}

impl RecordingBroadcaster {
    pub fn events(&self) -> Vec<(String, RealtimeEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl RealtimeBroadcaster for RecordingBroadcaster {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> std::result::Result<(), BroadcastError> {
        self.events
            .lock()
            .unwrap()
            .push((channel.to_string(), event.clone()));
        Ok(())
    }
}

pub struct FailingBroadcaster;

#[async_trait]
impl RealtimeBroadcaster for FailingBroadcaster {
    async fn publish(&self, _: &str, _: &RealtimeEvent) -> std::result::Result<(), BroadcastError> {
        Err(BroadcastError::Transport("connection refused".to_string()))
    }
}

pub struct StalledBroadcaster;

#[async_trait]
impl RealtimeBroadcaster for StalledBroadcaster {
    async fn publish(&self, _: &str, _: &RealtimeEvent) -> std::result::Result<(), BroadcastError> {
        std::future::pending().await
    }
}

pub fn fast_policy() -> StorePolicy {
    StorePolicy {
        timeout: Duration::from_millis(200),
        read_retries: 1,
        initial_backoff: Duration::from_millis(1),
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/social_chat_test".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        db_max_connections: 1,
        db_acquire_timeout_ms: 100,
        store_timeout_ms: 200,
        store_read_retries: 1,
        broadcast_timeout_ms: 50,
        realtime_channel_capacity: 8,
        avatar_base_url: Some("https://cdn.example.com/image/upload".to_string()),
        avatar_size: 200,
    }
}

/// Fully wired services over in-memory collaborators.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub membership: MembershipGuard,
    pub user_service: UserService,
    pub conversation_service: ConversationService,
    pub message_service: MessageService,
    avatars: Arc<dyn AvatarResolver>,
    notifier: Notifier,
}

impl Fixture {
    pub fn new() -> Self {
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        Self::build(broadcaster.clone(), broadcaster)
    }

    /// Services publish through `publisher`; `broadcaster` stays empty.
    pub fn with_broadcaster(publisher: Arc<dyn RealtimeBroadcaster>) -> Self {
        Self::build(Arc::new(RecordingBroadcaster::default()), publisher)
    }

    fn build(broadcaster: Arc<RecordingBroadcaster>, publisher: Arc<dyn RealtimeBroadcaster>) -> Self {
        let config = test_config();
        let policy = fast_policy();
        let directory = Arc::new(InMemoryDirectory::default());
        let store = Arc::new(InMemoryStore::new(directory.clone()));
        let avatars: Arc<dyn AvatarResolver> = Arc::new(CdnAvatarResolver::new(
            config.avatar_base_url.clone(),
            config.avatar_size,
        ));
        let notifier = Notifier::new(publisher, config.broadcast_timeout());

        let membership = MembershipGuard::new(store.clone(), policy.clone());
        let user_service = UserService::new(directory.clone(), avatars.clone(), policy.clone());
        let conversation_service = ConversationService::new(
            store.clone(),
            store.clone(),
            directory.clone(),
            avatars.clone(),
            membership.clone(),
            policy.clone(),
        );
        let message_service = MessageService::new(
            membership.clone(),
            store.clone(),
            avatars.clone(),
            notifier.clone(),
            policy,
        );

        Self {
            store,
            directory,
            broadcaster,
            membership,
            user_service,
            conversation_service,
            message_service,
            avatars,
            notifier,
        }
    }

    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    pub fn avatars(&self) -> Arc<dyn AvatarResolver> {
        self.avatars.clone()
    }

    fn insert_user(&self, name: &str, avatar_ref: Option<&str>, status: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            avatar_ref: avatar_ref.map(str::to_string),
            status: status.to_string(),
            created_at: Utc::now(),
        };
        let id = user.id;
        self.directory.insert(user);
        id
    }

    pub fn add_user(&self, name: &str) -> Uuid {
        self.insert_user(name, None, "active")
    }

    pub fn add_user_with_avatar(&self, name: &str, avatar_ref: &str) -> Uuid {
        self.insert_user(name, Some(avatar_ref), "active")
    }

    pub fn add_suspended_user(&self, name: &str) -> Uuid {
        self.insert_user(name, None, crate::user::user_models::STATUS_SUSPENDED)
    }

    pub async fn individual(&self, a: Uuid, b: Uuid) -> i64 {
        self.conversation_service
            .create_or_get_individual(a, b)
            .await
            .unwrap()
            .id
    }

    pub fn sender(&self, user_id: Uuid) -> SenderInfo {
        SenderInfo {
            user_id,
            display_name: self.directory.name_of(user_id),
        }
    }

    pub fn app_state(&self) -> AppState {
        let config = test_config();
        AppState {
            hub: ChannelHub::new(config.realtime_channel_capacity),
            config: Arc::new(config),
            user_directory: self.directory.clone(),
            membership: self.membership.clone(),
            conversation_service: self.conversation_service.clone(),
            message_service: self.message_service.clone(),
            user_service: self.user_service.clone(),
        }
    }

    pub fn token(&self, user_id: Uuid) -> String {
        create_jwt(user_id, TEST_JWT_SECRET, chrono::Duration::hours(1))
    }
}
