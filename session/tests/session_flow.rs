//! End-to-end session tests against the in-memory store.

use std::sync::{Arc, Mutex};

use tally_engine::{
    Field, FieldErrorKind, Item, ItemPatch, MutationRequest, TransportError, UnitMode,
    UpdatePolicy, Variant,
};
use tally_session::{
    Config, EditOp, EditSession, FixedRate, InMemoryStore, NoticeLevel, ParentResource,
    SessionError, SessionOptions, SessionState,
};

const PROJECT: u64 = 42;

/// Open a session on `items` with default options.
fn open(
    store: &Arc<InMemoryStore>,
    variant: Variant,
    items: Vec<Item>,
) -> EditSession<Arc<InMemoryStore>> {
    open_with(store, variant, items, SessionOptions::default())
}

fn open_with(
    store: &Arc<InMemoryStore>,
    variant: Variant,
    items: Vec<Item>,
    options: SessionOptions,
) -> EditSession<Arc<InMemoryStore>> {
    EditSession::open(
        ParentResource::new(variant, PROJECT, items),
        Arc::clone(store),
        options,
    )
    .unwrap()
}

fn set(session: &mut EditSession<Arc<InMemoryStore>>, index: usize, patch: ItemPatch) {
    session.edit(EditOp::Edit { index, patch }).unwrap();
}

fn rejected(message: &str) -> TransportError {
    TransportError::Rejected {
        message: message.into(),
    }
}

#[cfg(test)]
mod confirm_tests {
    use super::*;

    #[tokio::test]
    async fn test_abandoned_rows_are_dropped() {
        let store = InMemoryStore::new_shared();
        let mut session = open(
            &store,
            Variant::Milestone,
            vec![Item::new(PROJECT, "", 0), Item::new(PROJECT, "Phase 1", 500)],
        );

        let items = session.confirm().await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Phase 1");
        assert!(items[0].id.is_some());

        let requests = store.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].is_create());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_out_of_order_blocks_commit() {
        let store = InMemoryStore::new_shared();
        let mut session = open(
            &store,
            Variant::Milestone,
            vec![
                Item::persisted(7, PROJECT, "A", 1000),
                Item::new(PROJECT, "B", 500),
            ],
        );

        let err = session.confirm().await.unwrap_err();
        let errors = err.validation_errors().unwrap();

        assert_eq!(
            errors.field(1, Field::Amount).unwrap().kind,
            FieldErrorKind::OutOfOrder
        );
        assert!(errors.at(0).is_none());
        assert_eq!(store.call_count().await, 0);
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.errors(), errors);
    }

    #[tokio::test]
    async fn test_valid_milestones_are_non_decreasing() {
        let store = InMemoryStore::new_shared();
        let mut session = open(&store, Variant::Milestone, vec![]);

        for (index, amount) in [100u64, 100, 250].into_iter().enumerate() {
            if index > 0 {
                session.add().unwrap();
            }
            set(&mut session, index, ItemPatch::name(format!("M{}", index)));
            set(&mut session, index, ItemPatch::amount(amount));
        }

        let items = session.confirm().await.unwrap();
        assert!(items.windows(2).all(|pair| pair[0].amount <= pair[1].amount));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_succeeded_creates() {
        let store = InMemoryStore::new_shared();
        store.fail_name("Second", rejected("quota exceeded"));

        let mut session = open(
            &store,
            Variant::Milestone,
            vec![
                Item::new(PROJECT, "First", 100),
                Item::new(PROJECT, "Second", 200),
            ],
        );

        let err = session.confirm().await.unwrap_err();
        let commit = match err {
            SessionError::Commit(commit) => commit,
            other => panic!("expected commit error, got {:?}", other),
        };

        assert_eq!(commit.attempted, 2);
        assert_eq!(commit.failures.len(), 1);
        assert_eq!(commit.failures[0].position, 1);
        assert_eq!(commit.created.len(), 1);
        assert_eq!(store.items(Variant::Milestone, PROJECT).len(), 1);
        assert_eq!(
            store.get(Variant::Milestone, commit.created[0].id).unwrap().name,
            "First"
        );

        // Session reopens with the same working copy
        assert_eq!(session.state(), SessionState::Open);
        assert!(!session.is_busy());
        assert_eq!(session.items().len(), 2);
        assert!(session.items().iter().all(|item| item.id.is_none()));
        assert_eq!(session.notices().len(), 1);
        assert_eq!(session.notices()[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_retry_after_partial_failure_creates_again() {
        let store = InMemoryStore::new_shared();
        store.fail_name("Second", rejected("quota exceeded"));
        let mut session = open(
            &store,
            Variant::Milestone,
            vec![
                Item::new(PROJECT, "First", 100),
                Item::new(PROJECT, "Second", 200),
            ],
        );
        assert!(session.confirm().await.is_err());

        store.heal();
        let items = session.confirm().await.unwrap();

        assert_eq!(items.len(), 2);
        // "First" had no id in the working copy, so it was created twice
        assert_eq!(store.items(Variant::Milestone, PROJECT).len(), 3);
    }

    #[tokio::test]
    async fn test_missing_identity_fails_commit() {
        let store = InMemoryStore::new_shared();
        store.withhold_identity("Ghost");
        let mut session = open(
            &store,
            Variant::Reward,
            vec![Item::new(PROJECT, "Ghost", 1500)],
        );

        let err = session.confirm().await.unwrap_err();
        let commit = match err {
            SessionError::Commit(commit) => commit,
            other => panic!("expected commit error, got {:?}", other),
        };
        assert!(commit.has_missing_identity());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_always_policy_updates_unchanged_items() {
        let store = InMemoryStore::new_shared();
        let existing = store.seed(
            Variant::Milestone,
            PROJECT,
            vec![Item::new(PROJECT, "A", 100), Item::new(PROJECT, "B", 200)],
        );
        let mut session = open(&store, Variant::Milestone, existing.clone());

        let items = session.confirm().await.unwrap();

        assert_eq!(items, existing);
        let requests = store.requests().await;
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|req| matches!(req, MutationRequest::Update(_))));
    }

    #[tokio::test]
    async fn test_changed_only_policy_skips_unchanged_items() {
        let store = InMemoryStore::new_shared();
        let existing = store.seed(
            Variant::Milestone,
            PROJECT,
            vec![Item::new(PROJECT, "A", 100), Item::new(PROJECT, "B", 200)],
        );
        let mut session = open_with(
            &store,
            Variant::Milestone,
            existing.clone(),
            SessionOptions {
                update_policy: UpdatePolicy::ChangedOnly,
                ..Default::default()
            },
        );
        set(&mut session, 1, ItemPatch::name("B2"));

        let items = session.confirm().await.unwrap();

        assert_eq!(items[0], existing[0]);
        assert_eq!(items[1].name, "B2");
        let requests = store.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target_id(), existing[1].id);
    }

    #[tokio::test]
    async fn test_reward_updates_produce_success_notices() {
        let store = InMemoryStore::new_shared();
        let existing = store.seed(
            Variant::Reward,
            PROJECT,
            vec![Item::new(PROJECT, "Sticker", 500)],
        );
        let mut session = open(&store, Variant::Reward, existing);
        let index = session.add().unwrap();
        set(&mut session, index, ItemPatch::name("Poster"));
        set(&mut session, index, ItemPatch::amount(2500));

        session.confirm().await.unwrap();

        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
        assert_eq!(notices[0].title, "Successfully updated!");
        assert_eq!(
            notices[0].description,
            "Reward Sticker was successfully updated"
        );
    }

    #[tokio::test]
    async fn test_reward_cost_cap() {
        let store = InMemoryStore::new_shared();
        let mut session = open(
            &store,
            Variant::Reward,
            vec![Item::new(PROJECT, "Private dinner", 5_000_001)],
        );

        let err = session.confirm().await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(matches!(
            errors.field(0, Field::Amount).unwrap().kind,
            FieldErrorKind::AboveMaximum { .. }
        ));
        assert_eq!(store.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_bounded_concurrency_commits_everything() {
        let store = InMemoryStore::new_shared();
        let items: Vec<Item> = (1..=8)
            .map(|i| Item::new(PROJECT, format!("M{}", i), i * 100))
            .collect();
        let mut session = open_with(
            &store,
            Variant::Milestone,
            items,
            SessionOptions {
                max_in_flight: Some(3),
                ..Default::default()
            },
        );

        let committed = session.confirm().await.unwrap();

        assert_eq!(committed.len(), 8);
        assert_eq!(committed[7].name, "M8");
        assert_eq!(store.len(), 8);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_confirm() {
        let store = InMemoryStore::new_shared();
        let mut session = open(
            &store,
            Variant::Milestone,
            vec![Item::new(PROJECT, "A", 1)],
        );
        session.confirm().await.unwrap();

        assert!(matches!(
            session.confirm().await,
            Err(SessionError::Closed)
        ));
        assert_eq!(store.call_count().await, 1);
    }
}

#[cfg(test)]
mod remove_tests {
    use super::*;

    #[tokio::test]
    async fn test_removing_unsaved_item_is_local() {
        let store = InMemoryStore::new_shared();
        let mut session = open(&store, Variant::Milestone, vec![]);
        session.add().unwrap();

        session.remove(1).await.unwrap();

        assert_eq!(session.items().len(), 1);
        assert_eq!(store.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_removing_persisted_item_deletes_once() {
        let store = InMemoryStore::new_shared();
        let existing = store.seed(
            Variant::Milestone,
            PROJECT,
            vec![Item::new(PROJECT, "A", 100), Item::new(PROJECT, "B", 200)],
        );
        let mut session = open(&store, Variant::Milestone, existing.clone());

        session.remove(0).await.unwrap();

        let requests = store.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0], MutationRequest::Delete(_)));
        assert_eq!(requests[0].target_id(), existing[0].id);
        assert_eq!(session.items(), &existing[1..]);
        assert!(store.get(Variant::Milestone, existing[0].id.unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_item() {
        let store = InMemoryStore::new_shared();
        let existing = store.seed(
            Variant::Reward,
            PROJECT,
            vec![Item::new(PROJECT, "Mug", 1500)],
        );
        let id = existing[0].id.unwrap();
        store.fail_id(id, rejected("reward has backers"));
        let mut session = open(&store, Variant::Reward, existing.clone());

        let err = session.remove(0).await.unwrap_err();

        assert!(matches!(err, SessionError::Delete(_)));
        assert_eq!(session.items(), existing.as_slice());
        assert_eq!(session.state(), SessionState::Open);
        assert!(!session.is_busy());
        assert_eq!(session.notices().len(), 1);
        assert_eq!(session.notices()[0].level, NoticeLevel::Error);

        // Retry once the store accepts the delete
        store.heal();
        session.dismiss_notice(0);
        session.remove(0).await.unwrap();
        assert!(session.items().is_empty());
        assert_eq!(store.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_remove_out_of_bounds() {
        let store = InMemoryStore::new_shared();
        let mut session = open(&store, Variant::Milestone, vec![]);

        assert!(matches!(
            session.remove(3).await,
            Err(SessionError::Engine(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_revalidates_shown_errors() {
        let store = InMemoryStore::new_shared();
        let mut session = open(
            &store,
            Variant::Milestone,
            vec![
                Item::new(PROJECT, "A", 1000),
                Item::new(PROJECT, "B", 500),
                Item::new(PROJECT, "", 700),
            ],
        );
        assert!(session.confirm().await.is_err());
        assert!(session.errors().at(1).is_some());

        session.remove(1).await.unwrap();

        // The unnamed row moved up and now sits below A
        let errors = session.errors();
        assert_eq!(
            errors.field(1, Field::Name).unwrap().kind,
            FieldErrorKind::MissingField
        );
        assert!(errors.field(1, Field::Amount).is_some());
    }
}

#[cfg(test)]
mod cancel_tests {
    use super::*;

    #[tokio::test]
    async fn test_untouched_cancel_returns_input() {
        let store = InMemoryStore::new_shared();
        let mut zero_id = Item::new(PROJECT, "Draft", 0);
        zero_id.id = Some(0);
        let input = vec![zero_id, Item::persisted(9, PROJECT, "Saved", 10)];

        let mut session = open(&store, Variant::Milestone, input.clone());
        assert_eq!(session.cancel().unwrap(), input);

        let mut empty = open(&store, Variant::Reward, vec![]);
        assert_eq!(empty.cancel().unwrap(), Vec::<Item>::new());
        assert_eq!(store.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_valid_draft_filters_abandoned_rows() {
        let store = InMemoryStore::new_shared();
        let mut session = open(
            &store,
            Variant::Milestone,
            vec![Item::new(PROJECT, "A", 100)],
        );
        session.add().unwrap();

        let items = session.cancel().unwrap();

        assert_eq!(items, vec![Item::new(PROJECT, "A", 100)]);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(store.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_invalid_draft_returns_everything() {
        let store = InMemoryStore::new_shared();
        let mut session = open(
            &store,
            Variant::Milestone,
            vec![Item::new(PROJECT, "A", 100)],
        );
        let index = session.add().unwrap();
        set(&mut session, index, ItemPatch::amount(50));

        let items = session.cancel().unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].amount, 50);
        assert_eq!(store.call_count().await, 0);
    }
}

#[cfg(test)]
mod edit_tests {
    use super::*;

    #[tokio::test]
    async fn test_edit_clears_only_its_own_error() {
        let store = InMemoryStore::new_shared();
        let mut session = open(
            &store,
            Variant::Reward,
            vec![Item::new(PROJECT, "", 100), Item::new(PROJECT, "", 200)],
        );
        assert!(session.confirm().await.is_err());
        assert_eq!(session.errors().len(), 2);

        set(&mut session, 0, ItemPatch::name("Fixed"));

        assert!(session.errors().at(0).is_none());
        assert!(session.errors().at(1).is_some());
    }

    #[tokio::test]
    async fn test_change_listener_sees_every_version() {
        let store = InMemoryStore::new_shared();
        let mut session = open(&store, Variant::Milestone, vec![]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.on_change(move |version| sink.lock().unwrap().push(version));

        session.add().unwrap();
        set(&mut session, 0, ItemPatch::name("A"));
        session.remove(1).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(session.version(), 3);
    }

    #[tokio::test]
    async fn test_reward_display_amounts_are_dollars() {
        let store = InMemoryStore::new_shared();
        let config = Config {
            unit_mode: UnitMode::Display,
            ..Default::default()
        };
        let rates = FixedRate::from_btc_price(60_000.0).unwrap();
        let mut session = open_with(
            &store,
            Variant::Reward,
            vec![Item::new(PROJECT, "Shirt", 2_500)],
            config.session_options(Variant::Reward, &rates),
        );

        assert_eq!(session.display_amount(0), Some(25.0));

        session.set_display_amount(0, 25.0).unwrap();
        assert_eq!(session.items()[0].amount, 2_500);

        session.set_display_amount(0, 12.5).unwrap();
        assert_eq!(session.items()[0].amount, 1_250);
        assert_eq!(session.display_amount(0), Some(12.5));

        let items = session.confirm().await.unwrap();
        assert_eq!(items[0].amount, 1_250);
    }

    #[tokio::test]
    async fn test_edit_out_of_bounds() {
        let store = InMemoryStore::new_shared();
        let mut session = open(&store, Variant::Milestone, vec![]);

        let err = session
            .edit(EditOp::Edit {
                index: 4,
                patch: ItemPatch::name("x"),
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::Engine(_)));
    }
}
