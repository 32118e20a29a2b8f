//! Two tabs of the same origin: two clients over one SQLite file, and two
//! call sessions over one broadcast hub.

use std::sync::Arc;
use std::time::Duration;

use huddle_client::{ChatClient, ClientConfig, OpenChatPayload, StaticDirectory, SyncUpdate};
use huddle_media::testing::{FakeDevices, FakePeerFactory};
use huddle_media::{CallContext, CallError, CallState};
use huddle_net::BroadcastHub;
use huddle_shared::types::{CallType, ConversationId, Identity};
use huddle_store::{ConversationRepository, SqliteStore};
use tokio::sync::watch;

const SYNC_INTERVAL: Duration = Duration::from_millis(200);

fn tab(path: &std::path::Path, username: &str) -> (ChatClient, ClientConfig) {
    let config = ClientConfig {
        db_path: Some(path.to_path_buf()),
        username: Some(username.to_string()),
        sync_interval: SYNC_INTERVAL,
        ..ClientConfig::default()
    };
    let repo = ConversationRepository::new(Arc::new(SqliteStore::open_at(path).unwrap()));
    let identity = ChatClient::resolve_identity(&repo, &config);
    let client = ChatClient::new(repo, identity, Arc::new(StaticDirectory::new()), &config);
    (client, config)
}

async fn wait_for(
    updates: &mut watch::Receiver<SyncUpdate>,
    within: Duration,
    done: impl Fn(&SyncUpdate) -> bool,
) -> SyncUpdate {
    tokio::time::timeout(within, async {
        loop {
            {
                let update = updates.borrow_and_update();
                if done(&update) {
                    return update.clone();
                }
            }
            updates.changed().await.unwrap();
        }
    })
    .await
    .expect("condition not reached in time")
}

#[tokio::test]
async fn message_reaches_the_other_tab_within_one_interval() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huddle.db");

    let (alice, _) = tab(&path, "alice");
    let (mut bob, bob_config) = tab(&path, "@bob");

    let conv = alice
        .open_chat(&OpenChatPayload {
            username: "bob".into(),
            name: "Bob".into(),
            message: None,
            avatar: None,
        })
        .unwrap();

    bob.select_conversation(&conv).unwrap();
    let mut updates = bob.start_sync(&bob_config).subscribe();
    wait_for(&mut updates, Duration::from_secs(2), |u| u.view.selected.as_ref() == Some(&conv)).await;

    alice.send_message("hello", Vec::new()).unwrap();

    // Margin on top of one interval for the reconciliation itself.
    let update = wait_for(&mut updates, SYNC_INTERVAL + Duration::from_millis(300), |u| {
        !u.view.messages.is_empty()
    })
    .await;
    let hello = &update.view.messages[0];
    assert_eq!(hello.body(), "hello");
    assert_eq!(hello.sender(), &Identity::new("alice"));
    assert!(update.scroll_to_bottom);

    bob.shutdown().await;
}

fn call_context(hub: &BroadcastHub, devices: FakeDevices) -> CallContext {
    CallContext {
        devices: Arc::new(devices),
        peers: Arc::new(FakePeerFactory::new()),
        hub: hub.clone(),
    }
}

async fn wait_state(session: &huddle_media::CallSession, state: CallState) {
    for _ in 0..200 {
        if session.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session stuck in {:?}, wanted {:?}", session.state(), state);
}

#[tokio::test]
async fn two_sessions_on_one_hub_connect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huddle.db");
    let (alice, config) = tab(&path, "alice");
    let (bob, _) = tab(&path, "bob");
    let hub = BroadcastHub::new();
    let conv = ConversationId::from("conv_1");

    let alice_calls = alice.call_controller(call_context(&hub, FakeDevices::available()), &config);
    let bob_calls = bob.call_controller(call_context(&hub, FakeDevices::available()), &config);

    alice_calls.start_call(CallType::Video, Some(&conv)).await.unwrap();
    bob_calls.start_call(CallType::Video, Some(&conv)).await.unwrap();

    wait_state(alice_calls.session(), CallState::Connected).await;
    wait_state(bob_calls.session(), CallState::Connected).await;
    assert!(alice_calls.status().remote_tracks > 0);

    alice_calls.end_call().await;
    bob_calls.end_call().await;
    assert_eq!(alice_calls.status().state, CallState::Ended);
    assert_eq!(hub.subscriber_count(&conv.to_signaling_topic()), 0);
}

#[tokio::test]
async fn denied_permission_leaves_the_tab_idle_without_signaling() {
    let dir = tempfile::tempdir().unwrap();
    let (alice, config) = tab(&dir.path().join("huddle.db"), "alice");
    let hub = BroadcastHub::new();
    let conv = ConversationId::from("conv_1");

    let calls = alice.call_controller(call_context(&hub, FakeDevices::denying()), &config);
    let err = calls.start_call(CallType::Video, Some(&conv)).await.unwrap_err();

    assert!(matches!(err, CallError::PermissionDenied(_)));
    assert_eq!(calls.status().state, CallState::Idle);
    assert_eq!(hub.subscriber_count(&conv.to_signaling_topic()), 0);
    assert_eq!(alice.repository().notifications().unwrap()[0].kind, "call-error");
}
