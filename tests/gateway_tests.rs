//! Gateway Integration Tests
//!
//! Multi-connection scenarios exercising the relay layer end to end:
//! registration, room fan-out, privileged emits, and disconnect notices.

use std::sync::Arc;

use commerce_gateway::auth::{Identity, Role, TrustLevel};
use commerce_gateway::config::ReportSettings;
use commerce_gateway::gateway::events::ServerEvent;
use commerce_gateway::gateway::relay;
use commerce_gateway::gateway::{ClientEvent, ConnectionHandle, Gateway};
use tokio::sync::mpsc;

fn identity(id: &str, role: Role) -> Identity {
    Identity {
        id: id.into(),
        email: format!("{}@shop.test", id),
        first_name: None,
        last_name: None,
        role,
    }
}

fn connect(
    gateway: &Arc<Gateway>,
    id: &str,
    role: Role,
) -> (
    Arc<ConnectionHandle>,
    mpsc::UnboundedReceiver<ServerEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = Arc::new(ConnectionHandle::new(
        identity(id, role),
        TrustLevel::Full,
        tx,
    ));
    gateway.register(handle.clone());
    (handle, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn emit(gateway: &Arc<Gateway>, conn: &Arc<ConnectionHandle>, frame: &str) {
    let event = ClientEvent::parse(frame).expect("test frame should parse");
    relay::dispatch(
        gateway,
        conn,
        event,
        &ReportSettings {
            tick_ms: 1,
            progress_step: 25,
        },
    );
}

#[tokio::test]
async fn dashboard_session_relays_and_disconnect_notice() {
    let gateway = Arc::new(Gateway::new());

    let (admin_a, mut rx_a) = connect(&gateway, "a1", Role::Admin);
    let (_admin_b, mut rx_b) = connect(&gateway, "a2", Role::Admin);
    let (customer, mut rx_c) = connect(&gateway, "u1", Role::Customer);

    // Admin A saw B's arrival notice... B arrived after A
    let a_setup: Vec<_> = drain(&mut rx_a);
    assert!(a_setup
        .iter()
        .any(|e| matches!(e, ServerEvent::AdminConnected { email, .. } if email == "a2@shop.test")));
    drain(&mut rx_b);
    drain(&mut rx_c);

    // Customer follows their order
    gateway.join(&customer, "order:42");

    // Product catalog change reaches every connection
    emit(
        &gateway,
        &admin_a,
        r#"{"event":"product:create","data":{"product":{"id":"p1","name":"Mug"}}}"#,
    );
    for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
        let events = drain(rx);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ServerEvent::ProductCreated(p) if p.updated_by == "a1@shop.test")),
            "every connection should see the product broadcast"
        );
    }

    // Order status change reaches the order room and the dashboard
    emit(
        &gateway,
        &admin_a,
        r#"{"event":"order:update_status","data":{"orderId":"42","status":"shipped","note":"left warehouse"}}"#,
    );
    let customer_events = drain(&mut rx_c);
    match customer_events.as_slice() {
        [ServerEvent::OrderStatusUpdated(payload)] => {
            assert_eq!(payload.order_id, "42");
            assert_eq!(payload.status, "shipped");
            assert_eq!(payload.note.as_deref(), Some("left warehouse"));
        }
        other => panic!("expected exactly one order update, got {:?}", other),
    }
    assert!(drain(&mut rx_b)
        .iter()
        .any(|e| matches!(e, ServerEvent::OrderStatusChanged(p) if p.order_id == "42")));

    // Customers cannot emit privileged events
    emit(
        &gateway,
        &customer,
        r#"{"event":"system:broadcast_notification","data":{"message":"pwned"}}"#,
    );
    assert!(matches!(
        drain(&mut rx_c).as_slice(),
        [ServerEvent::GatewayError { .. }]
    ));
    drain(&mut rx_a);
    drain(&mut rx_b);

    // Admin A leaves; remaining dashboard members get exactly one notice
    gateway.unregister(admin_a.id);
    let b_events = drain(&mut rx_b);
    let notices = b_events
        .iter()
        .filter(|e| matches!(e, ServerEvent::AdminDisconnected { email, .. } if email == "a1@shop.test"))
        .count();
    assert_eq!(notices, 1);
    // Customers are not dashboard members
    assert!(drain(&mut rx_c).is_empty());
}

#[tokio::test]
async fn system_notification_scenario() {
    let gateway = Arc::new(Gateway::new());
    let (admin_a, mut rx_a) = connect(&gateway, "a1", Role::Admin);
    let (_admin_b, mut rx_b) = connect(&gateway, "a2", Role::Admin);
    drain(&mut rx_a);
    drain(&mut rx_b);

    emit(
        &gateway,
        &admin_a,
        r#"{"event":"system:broadcast_notification","data":{"message":"sale started"}}"#,
    );

    let a_events = drain(&mut rx_a);
    let b_events = drain(&mut rx_b);

    for events in [&a_events, &b_events] {
        assert!(events.iter().any(|e| matches!(
            e,
            ServerEvent::NotificationSystem(n)
                if n.message == "sale started" && n.sent_by == "a1@shop.test"
        )));
    }
    // Only the non-sender gets the sent confirmation
    assert!(!a_events
        .iter()
        .any(|e| matches!(e, ServerEvent::SystemNotificationSent { .. })));
    assert!(b_events
        .iter()
        .any(|e| matches!(e, ServerEvent::SystemNotificationSent { .. })));
}

#[tokio::test]
async fn late_joiner_does_not_receive_prior_broadcast() {
    let gateway = Arc::new(Gateway::new());
    let (admin, mut rx_admin) = connect(&gateway, "a1", Role::Admin);
    let (early, mut rx_early) = connect(&gateway, "u1", Role::Customer);
    let (late, mut rx_late) = connect(&gateway, "u2", Role::Customer);
    drain(&mut rx_admin);

    gateway.join(&early, "order:7");
    emit(
        &gateway,
        &admin,
        r#"{"event":"order:update_status","data":{"orderId":"7","status":"packed"}}"#,
    );
    gateway.join(&late, "order:7");

    assert_eq!(drain(&mut rx_early).len(), 1);
    assert!(drain(&mut rx_late).is_empty());
}

#[tokio::test]
async fn report_generation_lifecycle() {
    let gateway = Arc::new(Gateway::new());
    let (admin, mut rx) = connect(&gateway, "a1", Role::Admin);
    drain(&mut rx);

    emit(
        &gateway,
        &admin,
        r#"{"event":"report:generate","data":{"reportId":"r1","reportType":"sales"}}"#,
    );

    let mut progress = Vec::new();
    let mut completions = 0;
    loop {
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("report should finish promptly")
            .expect("channel open");
        match event {
            ServerEvent::ReportGenerationStarted { ref report_id } => {
                assert_eq!(report_id, "r1");
            }
            ServerEvent::ReportGenerationProgress { progress: p, .. } => progress.push(p),
            ServerEvent::ReportGenerationComplete { ref report_id, .. } => {
                assert_eq!(report_id, "r1");
                completions += 1;
                break;
            }
            other => panic!("unexpected event during report run: {:?}", other),
        }
    }

    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last(), Some(&100));
    assert_eq!(completions, 1);
    assert_eq!(gateway.reports.running(), 0);
}

#[tokio::test]
async fn support_chat_flow() {
    let gateway = Arc::new(Gateway::new());
    let (customer, mut rx_c) = connect(&gateway, "u1", Role::Customer);
    let (admin, mut rx_a) = connect(&gateway, "a1", Role::Admin);
    drain(&mut rx_a);

    emit(
        &gateway,
        &customer,
        r#"{"event":"support:join_chat","data":{"chatId":"c9"}}"#,
    );
    emit(
        &gateway,
        &admin,
        r#"{"event":"support:join_chat","data":{"chatId":"c9"}}"#,
    );

    // Customer is told an admin joined their chat
    assert!(drain(&mut rx_c)
        .iter()
        .any(|e| matches!(e, ServerEvent::ChatAdminJoined { chat_id, .. } if chat_id == "c9")));

    emit(
        &gateway,
        &customer,
        r#"{"event":"support:send_message","data":{"chatId":"c9","message":"where is my order?"}}"#,
    );

    let admin_events = drain(&mut rx_a);
    let message = admin_events
        .iter()
        .find_map(|e| match e {
            ServerEvent::ChatNewMessage(m) => Some(m),
            _ => None,
        })
        .expect("admin should receive the chat message");
    assert_eq!(message.message, "where is my order?");
    assert_eq!(message.sender_id, "u1");
}
