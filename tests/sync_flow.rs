//! End-to-end sync and pagination scenarios against an in-memory fetch job.

use brook_core::{
    fetch_older, Event, EventContent, EventId, FetchError, FetchState, JoinState, Membership,
    MessageFetcher, Room, RoomId, RoomNotice, SyncRoomData, TimelineChunk, UserId, UserRegistry,
};
use chrono::{TimeZone, Utc};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

fn message(id: &str, order: u64) -> Event {
    Event {
        id: EventId::from(id),
        sender: UserId::from("@b:s"),
        origin_ts: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        order,
        content: EventContent::Message {
            msgtype: "text".into(),
            body: serde_json::json!({ "body": id }),
        },
    }
}

fn member(user: &str, membership: Membership) -> Event {
    Event {
        id: EventId::from(format!("$m-{user}")),
        sender: UserId::from(user),
        origin_ts: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        order: 0,
        content: EventContent::RoomMember {
            user_id: UserId::from(user),
            membership,
            display_name: None,
        },
    }
}

/// Replays a scripted sequence of fetch outcomes and counts calls.
struct ScriptedFetcher {
    calls: AtomicUsize,
    pages: std::sync::Mutex<VecDeque<Result<TimelineChunk, FetchError>>>,
}

impl ScriptedFetcher {
    fn new(pages: Vec<Result<TimelineChunk, FetchError>>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            pages: std::sync::Mutex::new(pages.into()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MessageFetcher for ScriptedFetcher {
    fn fetch_older<'a>(
        &'a self,
        _room_id: &'a RoomId,
        _from: Option<&'a str>,
    ) -> BoxFuture<'a, Result<TimelineChunk, FetchError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .expect("fetch past the scripted pages")
        })
    }
}

/// Blocks inside the fetch until released, so tests can observe the
/// in-flight window.
struct GatedFetcher {
    calls: AtomicUsize,
    entered: Notify,
    release: Notify,
    page: TimelineChunk,
}

impl MessageFetcher for GatedFetcher {
    fn fetch_older<'a>(
        &'a self,
        _room_id: &'a RoomId,
        _from: Option<&'a str>,
    ) -> BoxFuture<'a, Result<TimelineChunk, FetchError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            Ok(self.page.clone())
        })
    }
}

fn initial_batch() -> SyncRoomData {
    SyncRoomData {
        join_state: JoinState::Join,
        timeline_prev_batch: Some("t10".into()),
        state: vec![member("@b:s", Membership::Join)],
        timeline: vec![message("$10", 10), message("$11", 11)],
        ephemeral: vec![],
        highlight_count: 0,
        notification_count: 2,
    }
}

fn synced_room(users: &mut UserRegistry) -> Room {
    let mut room = Room::new(RoomId::from("!lobby:s"), UserId::from("@a:s"));
    room.update_data(users, initial_batch());
    room
}

#[tokio::test]
async fn paginating_prepends_history_and_advances_the_token() {
    let mut users = UserRegistry::new();
    let room = synced_room(&mut users);
    let room = Mutex::new(room);
    let users = Mutex::new(users);

    let fetcher = ScriptedFetcher::new(vec![
        Ok(TimelineChunk {
            events: vec![message("$8", 8), message("$9", 9)],
            end_token: "t8".into(),
        }),
        Ok(TimelineChunk {
            events: vec![message("$7", 7)],
            end_token: "t7".into(),
        }),
    ]);

    assert_eq!(fetch_older(&room, &users, &fetcher).await.unwrap(), 2);
    assert_eq!(fetch_older(&room, &users, &fetcher).await.unwrap(), 1);

    let room = room.lock().await;
    let ids: Vec<_> = room
        .timeline_events()
        .iter()
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(ids, ["$7", "$8", "$9", "$10", "$11"]);
    assert_eq!(room.pagination_token(), Some("t7"));
    assert_eq!(room.fetch_state(), FetchState::Idle);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn paginated_events_raise_notices_and_state_changes() {
    let mut users = UserRegistry::new();
    let mut room = Room::new(RoomId::from("!lobby:s"), UserId::from("@a:s"));
    let mut rx = room.subscribe();
    room.update_data(&mut users, initial_batch());
    let room = Mutex::new(room);
    let users = Mutex::new(users);

    // The page carries an old membership event alongside a message.
    let fetcher = ScriptedFetcher::new(vec![Ok(TimelineChunk {
        events: vec![member("@c:s", Membership::Join), message("$9", 9)],
        end_token: "t8".into(),
    })]);

    assert_eq!(fetch_older(&room, &users, &fetcher).await.unwrap(), 2);

    let room = room.lock().await;
    assert!(room.has_member(&UserId::from("@c:s")));

    let mut new_messages = 0;
    while let Ok(notice) = rx.try_recv() {
        if matches!(notice, RoomNotice::NewMessage { .. }) {
            new_messages += 1;
        }
    }
    // Two from the sync batch, two from the page.
    assert_eq!(new_messages, 4);
}

#[tokio::test]
async fn concurrent_fetches_collapse_to_one_job() {
    let mut users = UserRegistry::new();
    let room = synced_room(&mut users);
    let room = Arc::new(Mutex::new(room));
    let users = Arc::new(Mutex::new(users));

    let fetcher = Arc::new(GatedFetcher {
        calls: AtomicUsize::new(0),
        entered: Notify::new(),
        release: Notify::new(),
        page: TimelineChunk {
            events: vec![message("$9", 9)],
            end_token: "t9".into(),
        },
    });

    let first = {
        let room = Arc::clone(&room);
        let users = Arc::clone(&users);
        let fetcher = Arc::clone(&fetcher);
        tokio::spawn(async move { fetch_older(&room, &users, fetcher.as_ref()).await })
    };
    fetcher.entered.notified().await;

    // Second caller while the first is suspended in the job: no-op.
    assert_eq!(fetch_older(&room, &users, fetcher.as_ref()).await.unwrap(), 0);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(room.lock().await.fetch_state(), FetchState::Fetching);

    fetcher.release.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), 1);

    let room = room.lock().await;
    assert_eq!(room.fetch_state(), FetchState::Idle);
    assert_eq!(room.pagination_token(), Some("t9"));
}

#[tokio::test]
async fn failed_fetch_can_simply_be_retried() {
    let mut users = UserRegistry::new();
    let room = synced_room(&mut users);
    let room = Mutex::new(room);
    let users = Mutex::new(users);

    let fetcher = ScriptedFetcher::new(vec![
        Err(FetchError::Transport("connection reset".into())),
        Ok(TimelineChunk {
            events: vec![message("$9", 9)],
            end_token: "t9".into(),
        }),
    ]);

    let err = fetch_older(&room, &users, &fetcher).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
    {
        let room = room.lock().await;
        assert_eq!(room.fetch_state(), FetchState::Idle);
        assert_eq!(room.pagination_token(), Some("t10"));
    }

    assert_eq!(fetch_older(&room, &users, &fetcher).await.unwrap(), 1);
    assert_eq!(room.lock().await.pagination_token(), Some("t9"));
}
