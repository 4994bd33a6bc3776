//! Tests for `NotificationService`, `EventRouter` and the background jobs,
//! wired over the in-memory store and a real `Gateway`.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use civic_api::background::{expiry_sweep, RunGuard};
use civic_api::error::AppError;
use civic_api::notifications::service::DEFAULT_GRIEVANCE_TITLE;
use civic_api::notifications::{EventRouter, NotificationService, NotifyOptions};
use civic_api::ws::{Gateway, LivenessMonitor};
use civic_core::error::CoreError;
use civic_core::kinds::EventKind;
use civic_core::notification::{NotificationContent, NotificationKind, Priority};
use civic_core::template::TemplateSource;
use civic_db::models::notification::{NotificationFilter, Page};
use civic_db::{MemoryNotificationStore, NotificationStore};
use civic_events::{ChainEvent, ChainMeta, DomainEvent, EventBus};
use common::{drain_json, expect_frame, identity, ALICE, BOB};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

struct Harness {
    store: Arc<MemoryNotificationStore>,
    gateway: Arc<Gateway>,
    service: Arc<NotificationService>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryNotificationStore::new());
    let gateway = Arc::new(Gateway::default());
    let service = Arc::new(NotificationService::new(
        Arc::clone(&store) as Arc<dyn NotificationStore>,
        Arc::clone(&gateway),
    ));
    Harness {
        store,
        gateway,
        service,
    }
}

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn meta(tx: &str) -> ChainMeta {
    ChainMeta {
        timestamp: 1_700_000_000,
        block_number: 42,
        transaction_hash: tx.to_string(),
    }
}

// ---------------------------------------------------------------------------
// notify
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notify_renders_template_persists_and_pushes() {
    let h = harness();
    let (session, mut rx) = h.gateway.accept().await;
    h.gateway.authenticate(&session, ALICE, None).await.unwrap();
    drain_json(&mut rx);

    let delivery = h
        .service
        .notify(
            &identity(ALICE),
            &TemplateSource::from("document_verified"),
            data(json!({"documentType": "PAN"})),
            NotifyOptions::default(),
        )
        .await
        .unwrap();

    let n = &delivery.notification;
    assert_eq!(n.title, "Document Verified ✅");
    assert!(n.message.contains("PAN"));
    assert!(!n.message.contains("{documentType}"));
    assert_eq!(n.kind, NotificationKind::DocumentVerification);
    assert_eq!(n.priority, Priority::High);
    assert!(!n.is_read);
    assert_eq!(delivery.pushed, 1);
    assert_eq!(h.store.len().await, 1);

    let frame = expect_frame(&mut rx, "notification");
    assert_eq!(frame["data"]["id"], n.id);
    assert_eq!(frame["data"]["recipient"], ALICE);
}

#[tokio::test]
async fn notify_for_offline_recipient_still_persists() {
    let h = harness();

    let delivery = h
        .service
        .notify(
            &identity(BOB),
            &"service_outage".into(),
            data(json!({"serviceName": "Land Records"})),
            NotifyOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(delivery.pushed, 0);
    assert_eq!(h.service.unread_count(&identity(BOB)).await.unwrap(), 1);
    assert!(delivery
        .notification
        .message
        .contains("Land Records"));
}

#[tokio::test]
async fn notify_applies_overrides_and_default_expiry() {
    let h = harness();
    let before = Utc::now();

    let defaulted = h
        .service
        .notify(
            &identity(ALICE),
            &"grievance_assigned".into(),
            data(json!({"title": "Pothole", "grievanceId": "7"})),
            NotifyOptions::default(),
        )
        .await
        .unwrap()
        .notification;
    let expires = defaulted.expires_at.unwrap();
    assert!(expires >= before + Duration::days(30));
    assert!(expires <= Utc::now() + Duration::days(30));
    assert_eq!(
        defaulted.action_url.as_deref(),
        Some("/dashboard/grievances/7")
    );

    let fixed_expiry = Utc::now() + Duration::hours(1);
    let overridden = h
        .service
        .notify(
            &identity(ALICE),
            &"grievance_assigned".into(),
            data(json!({"title": "Pothole", "grievanceId": "7"})),
            NotifyOptions {
                priority: Some(Priority::Urgent),
                expires_at: Some(fixed_expiry),
                idempotency_key: None,
            },
        )
        .await
        .unwrap()
        .notification;
    assert_eq!(overridden.priority, Priority::Urgent);
    assert_eq!(overridden.expires_at, Some(fixed_expiry));
}

#[tokio::test]
async fn notify_unknown_template_fails_without_writing() {
    let h = harness();

    let result = h
        .service
        .notify(
            &identity(ALICE),
            &"no_such_template".into(),
            Map::new(),
            NotifyOptions::default(),
        )
        .await;

    assert_matches!(
        result,
        Err(AppError::Core(CoreError::UnknownTemplate(ref key))) if key == "no_such_template"
    );
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn mark_read_and_delete_enforce_ownership() {
    let h = harness();
    let id = h
        .service
        .notify(
            &identity(ALICE),
            &"citizen_registered".into(),
            Map::new(),
            NotifyOptions::default(),
        )
        .await
        .unwrap()
        .notification
        .id;

    assert_matches!(
        h.service.mark_read(id, &identity(BOB)).await,
        Err(AppError::Core(CoreError::NotFound { .. }))
    );
    assert_matches!(
        h.service.delete(id, &identity(BOB)).await,
        Err(AppError::Core(CoreError::NotFound { .. }))
    );

    h.service.mark_read(id, &identity(ALICE)).await.unwrap();
    h.service.mark_read(id, &identity(ALICE)).await.unwrap();
    assert_eq!(h.service.unread_count(&identity(ALICE)).await.unwrap(), 0);

    h.service.delete(id, &identity(ALICE)).await.unwrap();
    assert_matches!(
        h.service.delete(id, &identity(ALICE)).await,
        Err(AppError::Core(CoreError::NotFound { .. }))
    );
}

#[tokio::test]
async fn mark_all_read_counts_only_unread() {
    let h = harness();
    let alice = identity(ALICE);
    let mut ids = Vec::new();
    for _ in 0..7 {
        let n = h
            .service
            .notify(&alice, &"policy_update".into(), Map::new(), NotifyOptions::default())
            .await
            .unwrap()
            .notification;
        ids.push(n.id);
    }
    for id in &ids[..2] {
        h.service.mark_read(*id, &alice).await.unwrap();
    }

    assert_eq!(h.service.mark_all_read(&alice).await.unwrap(), 5);
    assert_eq!(h.service.unread_count(&alice).await.unwrap(), 0);

    let page = h
        .service
        .list(&alice, &NotificationFilter::default(), Page::new(Some(3), None))
        .await
        .unwrap();
    assert_eq!(page.notifications.len(), 3);
    assert_eq!(page.total, 7);
    assert_eq!(page.unread_count, 0);
}

// ---------------------------------------------------------------------------
// broadcast
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_without_targets_reaches_live_identities_once() {
    let h = harness();
    let (alice_1, mut rx_a1) = h.gateway.accept().await;
    let (alice_2, mut rx_a2) = h.gateway.accept().await;
    let (bob, mut rx_b) = h.gateway.accept().await;
    let (_anon, mut rx_anon) = h.gateway.accept().await;
    h.gateway.authenticate(&alice_1, ALICE, None).await.unwrap();
    h.gateway.authenticate(&alice_2, ALICE, None).await.unwrap();
    h.gateway.authenticate(&bob, BOB, None).await.unwrap();
    for rx in [&mut rx_a1, &mut rx_a2, &mut rx_b, &mut rx_anon] {
        drain_json(rx);
    }

    let report = h
        .service
        .broadcast(
            &"system_maintenance".into(),
            data(json!({"date": "Sunday", "startTime": "02:00", "endTime": "04:00"})),
            NotifyOptions::default(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.reach, 2);
    assert_eq!(report.persisted, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.pushed, 3);
    assert_eq!(h.store.len().await, 2);

    for rx in [&mut rx_a1, &mut rx_a2, &mut rx_b] {
        let frames = drain_json(rx);
        let pushed = frames.iter().filter(|f| f["type"] == "notification").count();
        assert_eq!(pushed, 1);
    }
    assert!(drain_json(&mut rx_anon).is_empty());
}

#[tokio::test]
async fn broadcast_with_targets_dedupes_and_persists_offline() {
    let h = harness();

    let report = h
        .service
        .broadcast(
            &"policy_update".into(),
            data(json!({"policyName": "Open Data", "policyId": "12"})),
            NotifyOptions::default(),
            Some(vec![identity(ALICE), identity(BOB), identity(ALICE)]),
        )
        .await
        .unwrap();

    assert_eq!(report.reach, 2);
    assert_eq!(report.persisted, 2);
    assert_eq!(report.pushed, 0);
    assert_eq!(h.service.unread_count(&identity(ALICE)).await.unwrap(), 1);
    assert_eq!(h.service.unread_count(&identity(BOB)).await.unwrap(), 1);
}

#[tokio::test]
async fn broadcast_with_unknown_template_fails_fast() {
    let h = harness();

    let result = h
        .service
        .broadcast(
            &"nope".into(),
            Map::new(),
            NotifyOptions::default(),
            Some(vec![identity(ALICE)]),
        )
        .await;

    assert_matches!(result, Err(AppError::Core(CoreError::UnknownTemplate(_))));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn broadcast_stores_custom_content_as_system_announcement() {
    let h = harness();
    let custom = TemplateSource::Custom(NotificationContent {
        title: "Water supply restored".to_string(),
        message: "Supply is back to normal in Ward 4.".to_string(),
        kind: NotificationKind::Success,
        priority: Priority::Low,
        action: None,
    });

    let report = h
        .service
        .broadcast(&custom, Map::new(), NotifyOptions::default(), Some(vec![identity(ALICE)]))
        .await
        .unwrap();
    assert_eq!(report.persisted, 1);

    let page = h
        .service
        .list(&identity(ALICE), &NotificationFilter::default(), Page::default())
        .await
        .unwrap();
    let stored = &page.notifications[0];
    assert_eq!(stored.kind, NotificationKind::SystemAnnouncement);
    assert_eq!(stored.priority, Priority::Low);
    let expires = stored.expires_at.unwrap();
    assert!(expires <= Utc::now() + Duration::days(7));
    assert!(expires > Utc::now() + Duration::days(6));
}

#[tokio::test]
async fn broadcast_with_past_expiry_is_rejected_once() {
    let h = harness();

    let result = h
        .service
        .broadcast(
            &"policy_update".into(),
            Map::new(),
            NotifyOptions {
                expires_at: Some(Utc::now() - Duration::hours(1)),
                ..Default::default()
            },
            Some(vec![identity(ALICE), identity(BOB)]),
        )
        .await;

    assert_matches!(result, Err(AppError::Core(CoreError::Validation(_))));
    assert!(h.store.is_empty().await);
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn router_pushes_addressed_event_only_to_bound_session() {
    let h = harness();
    let router = EventRouter::new(Arc::clone(&h.gateway));
    let (anon, mut rx_anon) = h.gateway.accept().await;
    let (authed, mut rx_authed) = h.gateway.accept().await;
    h.gateway.subscribe(&anon, &json!(["all"])).await.unwrap();
    h.gateway.subscribe(&authed, &json!(["all"])).await.unwrap();
    h.gateway.authenticate(&authed, ALICE, None).await.unwrap();
    drain_json(&mut rx_anon);
    drain_json(&mut rx_authed);

    let event = ChainEvent::DocumentVerified {
        document_id: 9,
        owner: Some(ALICE.to_uppercase().replacen("0X", "0x", 1)),
        doc_type: 1,
        verifier: BOB.to_string(),
        meta: meta("0xfeed"),
    }
    .into_domain_event();

    assert_eq!(router.route(&event).await, 1);

    let frame = expect_frame(&mut rx_authed, "blockchain_event");
    assert_eq!(frame["eventType"], "document_verified");
    assert_eq!(frame["data"]["documentType"], "PAN");
    assert!(drain_json(&mut rx_anon).is_empty());
}

#[tokio::test]
async fn router_pushes_unaddressed_event_to_all_subscribers() {
    let h = harness();
    let router = EventRouter::new(Arc::clone(&h.gateway));
    let (a, _rx_a) = h.gateway.accept().await;
    let (b, _rx_b) = h.gateway.accept().await;
    let (_c, _rx_c) = h.gateway.accept().await;
    h.gateway.subscribe(&a, &json!(["system_broadcast"])).await.unwrap();
    h.gateway.subscribe(&b, &json!(["all_events"])).await.unwrap();

    let event = DomainEvent::new(EventKind::SystemBroadcast, json!({"message": "hello"}));

    assert_eq!(router.route(&event).await, 2);
}

#[tokio::test]
async fn chain_event_issues_notification_once_per_transaction() {
    let h = harness();
    let event = ChainEvent::GrievanceSubmitted {
        grievance_id: 31,
        citizen: ALICE.to_string(),
        title: "Broken streetlight".to_string(),
        category: 4,
        priority: 2,
        meta: meta("0xabc123"),
    }
    .into_domain_event();

    let first = h.service.handle_event(&event).await.unwrap().unwrap();
    assert_eq!(first.kind, NotificationKind::GrievanceUpdate);
    assert!(first.message.contains("Broken streetlight"));
    assert!(first.message.contains("31"));
    assert_eq!(first.data["category"], "ROADS");

    let replay = h.service.handle_event(&event).await.unwrap().unwrap();
    assert_eq!(replay.id, first.id);
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn grievance_event_without_title_uses_default_title() {
    let h = harness();
    let submitted = DomainEvent::new(
        EventKind::GrievanceSubmitted,
        json!({"citizen": ALICE, "grievanceId": "7"}),
    );
    let resolved = DomainEvent::new(
        EventKind::GrievanceResolved,
        json!({"citizen": ALICE, "grievanceId": "7", "title": "  "}),
    );

    let first = h.service.handle_event(&submitted).await.unwrap().unwrap();
    let second = h.service.handle_event(&resolved).await.unwrap().unwrap();

    for n in [&first, &second] {
        assert!(n.message.contains(DEFAULT_GRIEVANCE_TITLE), "{}", n.message);
        assert!(!n.message.contains("{title}"));
    }
    assert!(first.message.contains("Reference ID: 7"));
}

#[tokio::test]
async fn events_without_recipient_or_template_issue_nothing() {
    let h = harness();

    let unaddressed = ChainEvent::GrievanceResolved {
        grievance_id: 1,
        citizen: None,
        title: "t".to_string(),
        officer: BOB.to_string(),
        resolution: "fixed".to_string(),
        meta: meta("0x1"),
    }
    .into_domain_event();
    let broadcast = DomainEvent::new(
        EventKind::SystemBroadcast,
        json!({"citizenAddress": ALICE}),
    );

    assert_eq!(h.service.handle_event(&unaddressed).await.unwrap(), None);
    assert_eq!(h.service.handle_event(&broadcast).await.unwrap(), None);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn chain_loop_consumes_bus_until_cancelled() {
    let h = harness();
    let bus = EventBus::default();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        Arc::clone(&h.service).run(bus.subscribe(), cancel.child_token()),
    );

    bus.publisher().submit_chain(ChainEvent::CitizenRegistered {
        citizen_address: ALICE.to_string(),
        name: "Alice".to_string(),
        meta: meta("0xbeef"),
    });

    let alice = identity(ALICE);
    let mut delivered = false;
    for _ in 0..50 {
        if h.service.unread_count(&alice).await.unwrap() == 1 {
            delivered = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(delivered, "chain loop did not issue the notification");

    cancel.cancel();
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Background jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expiry_sweep_purges_only_expired_rows() {
    let h = harness();
    let alice = identity(ALICE);
    let mut ids = Vec::new();
    for _ in 0..3 {
        let n = h
            .service
            .notify(&alice, &"citizen_verified".into(), Map::new(), NotifyOptions::default())
            .await
            .unwrap()
            .notification;
        ids.push(n.id);
    }
    assert!(
        h.store
            .set_expiry(ids[0], Some(Utc::now() - Duration::minutes(1)))
            .await
    );

    // Expired rows are already hidden before the sweep runs.
    assert_eq!(h.service.unread_count(&alice).await.unwrap(), 2);

    let guard = RunGuard::new();
    assert_eq!(expiry_sweep::sweep_once(&h.service, &guard).await, Some(1));
    assert_eq!(h.store.len().await, 2);
    assert_eq!(expiry_sweep::sweep_once(&h.service, &guard).await, Some(0));
}

#[tokio::test]
async fn expiry_sweep_skips_while_previous_run_is_active() {
    let h = harness();
    let guard = RunGuard::new();
    let _permit = guard.try_enter().unwrap();

    assert_eq!(expiry_sweep::sweep_once(&h.service, &guard).await, None);
}

#[tokio::test]
async fn liveness_monitor_evicts_silent_sessions() {
    let h = harness();
    let monitor = LivenessMonitor::new(Arc::clone(&h.gateway));
    let (silent, _rx_silent) = h.gateway.accept().await;
    let (chatty, _rx_chatty) = h.gateway.accept().await;

    for _ in 0..3 {
        monitor.run_once().await.unwrap();
        h.gateway.touch(&chatty).await;
    }

    assert_eq!(h.gateway.connection_count().await, 1);
    assert_eq!(h.gateway.identity_of(&silent).await, None);
    assert!(h.gateway.subscriptions(&chatty).await.is_some());
}

#[tokio::test]
async fn stats_combine_store_and_gateway_counters() {
    let h = harness();
    let (session, _rx) = h.gateway.accept().await;
    h.gateway.authenticate(&session, ALICE, None).await.unwrap();
    h.service
        .notify(&identity(ALICE), &"document_uploaded".into(), Map::new(), NotifyOptions::default())
        .await
        .unwrap();

    let stats = h.service.stats().await.unwrap();

    assert_eq!(stats.notifications.total, 1);
    assert_eq!(stats.notifications.total_unread, 1);
    assert_eq!(stats.realtime.total_clients, 1);
    assert_eq!(stats.realtime.authenticated_clients, 1);
}
