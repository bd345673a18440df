use crate::event::{Event, RoomId};
use crate::room::Room;
use crate::user::UserRegistry;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// Backward-fetch state of a room. At most one fetch runs at a time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FetchState {
    #[default]
    Idle,
    Fetching,
}

/// One page of older history returned by a fetch job, oldest boundary first.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineChunk {
    pub events: Vec<Event>,
    /// Token for the page before this one; becomes the room's new
    /// pagination token.
    pub end_token: String,
}

/// Why a backward fetch did not produce a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server rejected the request: {0}")]
    Rejected(String),
}

/// Job collaborator that retrieves history older than a pagination token.
/// Implemented by the transport layer; this crate only sequences the calls.
pub trait MessageFetcher {
    fn fetch_older<'a>(
        &'a self,
        room_id: &'a RoomId,
        from: Option<&'a str>,
    ) -> BoxFuture<'a, Result<TimelineChunk, FetchError>>;
}

/// A granted backward fetch: the token to request history before.
/// `None` means the room has no known history boundary yet.
#[derive(Clone, Debug, PartialEq)]
pub struct BackFetch {
    pub from: Option<String>,
}

impl Room {
    pub fn fetch_state(&self) -> FetchState {
        self.fetch_state
    }

    /// Oldest known point of the timeline, advanced by successful fetches.
    pub fn pagination_token(&self) -> Option<&str> {
        self.prev_batch.as_deref()
    }

    /// Claim the room's single backward-fetch slot. Returns `None` while a
    /// fetch is already in flight; the caller must hand the outcome to
    /// [`finish_back_fetch`](Self::finish_back_fetch) to release the slot.
    pub fn begin_back_fetch(&mut self) -> Option<BackFetch> {
        match self.fetch_state {
            FetchState::Fetching => None,
            FetchState::Idle => {
                self.fetch_state = FetchState::Fetching;
                Some(BackFetch {
                    from: self.prev_batch.clone(),
                })
            }
        }
    }

    /// Merge a fetch outcome and release the fetch slot. Every completion
    /// path releases it, success or failure.
    ///
    /// Returned events run through the full timeline path (insert, new
    /// message notice, piggybacked state dispatch); the pagination token
    /// advances only on success. A failure leaves the token alone so the
    /// caller can simply retry.
    pub fn finish_back_fetch(
        &mut self,
        users: &mut UserRegistry,
        outcome: Result<TimelineChunk, FetchError>,
    ) -> Result<usize, FetchError> {
        self.fetch_state = FetchState::Idle;
        match outcome {
            Ok(chunk) => {
                let merged = chunk.events.len();
                for event in chunk.events {
                    self.receive_timeline_event(users, event);
                }
                self.prev_batch = Some(chunk.end_token);
                Ok(merged)
            }
            Err(err) => {
                warn!(room = %self.id, error = %err, "back-pagination failed");
                Err(err)
            }
        }
    }
}

/// Fetch one page of older history for `room`, merging it into the
/// timeline. Returns the number of merged events; `Ok(0)` without touching
/// the fetcher when a fetch is already in flight.
///
/// The locks are taken only around the state transitions, never across the
/// await on the fetch job itself.
pub async fn fetch_older<F>(
    room: &Mutex<Room>,
    users: &Mutex<UserRegistry>,
    fetcher: &F,
) -> Result<usize, FetchError>
where
    F: MessageFetcher + ?Sized,
{
    let (room_id, from) = {
        let mut room = room.lock().await;
        match room.begin_back_fetch() {
            Some(BackFetch { from }) => (room.id().clone(), from),
            None => return Ok(0),
        }
    };

    let outcome = fetcher.fetch_older(&room_id, from.as_deref()).await;

    let mut users = users.lock().await;
    let mut room = room.lock().await;
    room.finish_back_fetch(&mut users, outcome)
}
