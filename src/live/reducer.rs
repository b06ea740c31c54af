//! Pure transitions from one poll list snapshot to the next.
//!
//! Every function here returns the *same* `Arc` when an event changes
//! nothing, so observers can skip work with `Arc::ptr_eq`.

use crate::api::models::Poll;
use crate::live::models::{LikeUpdate, PollEvent, VoteUpdate};
use std::sync::Arc;
use tracing::debug;

/// Immutable, newest-first list of polls.
pub type PollList = Arc<Vec<Arc<Poll>>>;

pub fn empty_list() -> PollList {
    Arc::new(Vec::new())
}

pub fn reduce(polls: &PollList, event: &PollEvent) -> PollList {
    match event {
        PollEvent::PollCreated(poll) => apply_created(polls, poll),
        PollEvent::Vote(update) => apply_vote(polls, update),
        PollEvent::Like(update) => apply_like(polls, update),
        PollEvent::Unknown { kind, .. } => {
            debug!("Ignoring unhandled event type: {}", kind);
            Arc::clone(polls)
        }
    }
}

pub fn reduce_all<'a, I>(polls: &PollList, events: I) -> PollList
where
    I: IntoIterator<Item = &'a PollEvent>,
{
    events
        .into_iter()
        .fold(Arc::clone(polls), |acc, event| reduce(&acc, event))
}

fn apply_created(polls: &PollList, poll: &Poll) -> PollList {
    if polls.iter().any(|p| p.id == poll.id) {
        return Arc::clone(polls);
    }

    let mut next = Vec::with_capacity(polls.len() + 1);
    next.push(Arc::new(poll.clone()));
    next.extend(polls.iter().cloned());
    Arc::new(next)
}

fn apply_vote(polls: &PollList, update: &VoteUpdate) -> PollList {
    let Some(index) = polls.iter().position(|p| p.id == update.poll_id) else {
        return Arc::clone(polls);
    };
    let poll = &polls[index];

    let Some(option_index) = poll.options.iter().position(|o| o.id == update.option_id) else {
        return Arc::clone(polls);
    };
    if poll.options[option_index].votes_count == update.votes_count {
        return Arc::clone(polls);
    }

    let mut patched = Poll::clone(poll);
    patched.options[option_index].votes_count = update.votes_count;
    replace_at(polls, index, patched)
}

fn apply_like(polls: &PollList, update: &LikeUpdate) -> PollList {
    let Some(index) = polls.iter().position(|p| p.id == update.poll_id) else {
        return Arc::clone(polls);
    };
    if polls[index].likes_count == update.likes_count {
        return Arc::clone(polls);
    }

    let mut patched = Poll::clone(&polls[index]);
    patched.likes_count = update.likes_count;
    replace_at(polls, index, patched)
}

fn replace_at(polls: &PollList, index: usize, poll: Poll) -> PollList {
    let mut next: Vec<Arc<Poll>> = polls.iter().cloned().collect();
    next[index] = Arc::new(poll);
    Arc::new(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::PollOption;
    use serde_json::json;

    fn poll(id: i64) -> Poll {
        Poll {
            id,
            question: format!("Question {id}"),
            created_by: Some("x".to_string()),
            likes_count: 0,
            options: vec![
                PollOption {
                    id: id * 10,
                    text: "A".to_string(),
                    votes_count: 0,
                },
                PollOption {
                    id: id * 10 + 1,
                    text: "B".to_string(),
                    votes_count: 0,
                },
            ],
        }
    }

    fn list(polls: Vec<Poll>) -> PollList {
        Arc::new(polls.into_iter().map(Arc::new).collect())
    }

    fn vote(poll_id: i64, option_id: i64, votes_count: u64) -> PollEvent {
        PollEvent::Vote(VoteUpdate {
            poll_id,
            option_id,
            votes_count,
        })
    }

    fn like(poll_id: i64, likes_count: u64) -> PollEvent {
        PollEvent::Like(LikeUpdate {
            poll_id,
            likes_count,
        })
    }

    #[test]
    fn created_poll_is_prepended() {
        let polls = list(vec![poll(1)]);
        let next = reduce(&polls, &PollEvent::PollCreated(poll(2)));
        let ids: Vec<i64> = next.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(Arc::ptr_eq(&polls[0], &next[1]));
    }

    #[test]
    fn duplicate_creation_is_idempotent() {
        let created = PollEvent::PollCreated(poll(2));
        let once = reduce(&empty_list(), &created);
        let twice = reduce(&once, &created);
        assert!(Arc::ptr_eq(&once, &twice));
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn duplicate_creation_keeps_existing_counts() {
        let polls = reduce(&list(vec![poll(1)]), &like(1, 4));
        let next = reduce(&polls, &PollEvent::PollCreated(poll(1)));
        assert_eq!(next[0].likes_count, 4);
    }

    #[test]
    fn vote_sets_authoritative_count() {
        let polls = list(vec![poll(2), poll(1)]);
        let next = reduce(&polls, &vote(1, 10, 5));

        assert!(!Arc::ptr_eq(&polls, &next));
        assert_eq!(next[1].options[0].votes_count, 5);
        assert_eq!(next[1].options[1].votes_count, 0);
        // untouched branch is shared
        assert!(Arc::ptr_eq(&polls[0], &next[0]));
        assert!(!Arc::ptr_eq(&polls[1], &next[1]));
        // input is not mutated
        assert_eq!(polls[1].options[0].votes_count, 0);
    }

    #[test]
    fn vote_with_same_count_keeps_identity() {
        let polls = reduce(&list(vec![poll(1)]), &vote(1, 10, 3));
        let next = reduce(&polls, &vote(1, 10, 3));
        assert!(Arc::ptr_eq(&polls, &next));
    }

    #[test]
    fn vote_for_unknown_poll_or_option_is_noop() {
        let polls = list(vec![poll(1)]);
        assert!(Arc::ptr_eq(&polls, &reduce(&polls, &vote(99, 10, 1))));
        assert!(Arc::ptr_eq(&polls, &reduce(&polls, &vote(1, 99, 1))));
    }

    #[test]
    fn last_vote_wins() {
        let polls = list(vec![poll(1)]);
        let events = [vote(1, 11, 4), vote(1, 11, 9), vote(1, 11, 2)];
        let next = reduce_all(&polls, &events);
        assert_eq!(next[0].options[1].votes_count, 2);
    }

    #[test]
    fn vote_preserves_option_order() {
        let polls = list(vec![poll(1)]);
        let next = reduce_all(&polls, &[vote(1, 11, 8), vote(1, 10, 1)]);
        let ids: Vec<i64> = next[0].options.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[test]
    fn like_sets_count_and_ignores_missing_poll() {
        let polls = list(vec![poll(1)]);
        let next = reduce(&polls, &like(1, 6));
        assert_eq!(next[0].likes_count, 6);

        let unchanged = reduce(&next, &like(99, 3));
        assert!(Arc::ptr_eq(&next, &unchanged));

        let same = reduce(&next, &like(1, 6));
        assert!(Arc::ptr_eq(&next, &same));
    }

    #[test]
    fn unknown_events_never_change_state() {
        let polls = list(vec![poll(1)]);
        let event = PollEvent::Unknown {
            kind: "poll_closed".to_string(),
            payload: json!({"poll_id": 1}),
        };
        assert!(Arc::ptr_eq(&polls, &reduce(&polls, &event)));
    }

    #[test]
    fn interleaved_duplicates_leave_one_poll() {
        let created = PollEvent::PollCreated(poll(5));
        let events = vec![
            created.clone(),
            vote(5, 50, 1),
            created.clone(),
            like(5, 2),
            PollEvent::PollCreated(poll(6)),
            created,
        ];
        let next = reduce_all(&empty_list(), &events);
        assert_eq!(next.iter().filter(|p| p.id == 5).count(), 1);
        assert_eq!(next.len(), 2);
        let five = next.iter().find(|p| p.id == 5).unwrap();
        assert_eq!(five.options[0].votes_count, 1);
        assert_eq!(five.likes_count, 2);
    }
}
