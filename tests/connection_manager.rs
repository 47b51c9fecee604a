mod common;

use common::{patient_settings, settle, FakeBackend, FakeDevice, Harness};
use pixels_roll20::domain::models::{AppEvent, ConnectionStatus};
use pixels_roll20::domain::settings::Settings;
use pixels_roll20::infrastructure::bluetooth::protocol::ProtocolGeneration;
use pixels_roll20::infrastructure::bluetooth::BleError;

const FACE_5: [u8; 3] = [3, 1, 4];
const ROLLING: [u8; 3] = [3, 2, 0];

#[tokio::test(start_paused = true)]
async fn test_connect_announces_die_and_status() {
    let mut harness = Harness::new();
    let die = FakeDevice::modern("Pixel A");
    harness.backend.offer(&die);

    let name = harness.manager.connect_to_new_pixel().await.unwrap();

    assert_eq!(name, "Pixel A");
    assert_eq!(
        harness.drain(),
        vec![
            AppEvent::post_chat("Connected to Pixel A"),
            AppEvent::show_text("1 Pixel connected"),
        ]
    );
    let session = harness.manager.session("Pixel A").unwrap();
    assert_eq!(session.status, ConnectionStatus::Connected);
    assert_eq!(session.protocol, Some(ProtocolGeneration::Modern));
    assert!(!session.has_moved);
}

#[tokio::test(start_paused = true)]
async fn test_same_die_keeps_one_session() {
    let mut harness = Harness::new();
    let die = FakeDevice::modern("Pixel A");
    harness.backend.offer(&die);
    harness.backend.offer(&die);

    harness.manager.connect_to_new_pixel().await.unwrap();
    harness.drain();
    let name = harness.manager.connect_to_new_pixel().await.unwrap();

    assert_eq!(name, "Pixel A");
    assert_eq!(harness.manager.session_names(), vec!["Pixel A".to_string()]);
    assert_eq!(die.connect_calls(), 1);
    assert!(harness.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_two_dice_status() {
    let mut harness = Harness::new();
    harness.backend.offer(&FakeDevice::modern("Pixel A"));
    harness.backend.offer(&FakeDevice::modern("Pixel B"));

    harness.manager.connect_to_new_pixel().await.unwrap();
    harness.manager.connect_to_new_pixel().await.unwrap();

    assert_eq!(harness.manager.counts(), (2, 2));
    assert_eq!(harness.manager.status_text(), "2/2 Pixels connected");
}

#[tokio::test(start_paused = true)]
async fn test_legacy_die_falls_back() {
    let harness = Harness::new();
    let die = FakeDevice::new("Pixel Old", Some(ProtocolGeneration::Legacy));
    harness.backend.offer(&die);

    harness.manager.connect_to_new_pixel().await.unwrap();

    let session = harness.manager.session("Pixel Old").unwrap();
    assert_eq!(session.protocol, Some(ProtocolGeneration::Legacy));
    assert_eq!(
        die.resolved_services(),
        vec![
            ProtocolGeneration::Modern.service_uuid(),
            ProtocolGeneration::Legacy.service_uuid(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_device_is_released() {
    let mut harness = Harness::new();
    let die = FakeDevice::new("Pixel Fake", None);
    harness.backend.offer(&die);

    let result = harness.manager.connect_to_new_pixel().await;

    assert_eq!(result, Err(BleError::UnsupportedDevice("Pixel Fake".to_string())));
    assert!(harness.manager.session_names().is_empty());
    assert_eq!(die.disconnect_calls(), 1);
    assert!(harness.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_notification_failure_releases_device() {
    let mut harness = Harness::new();
    let die = FakeDevice::modern("Pixel A");
    die.set_notify_fails(true);
    harness.backend.offer(&die);

    let result = harness.manager.connect_to_new_pixel().await;

    assert_eq!(result, Err(BleError::Platform("notify refused".to_string())));
    assert_eq!(die.resolved_services(), vec![ProtocolGeneration::Modern.service_uuid()]);
    assert!(harness.manager.session_names().is_empty());
    assert_eq!(die.disconnect_calls(), 1);
    assert!(harness.drain().is_empty());

    // A later attempt starts from scratch
    die.set_notify_fails(false);
    harness.backend.offer(&die);
    harness.manager.connect_to_new_pixel().await.unwrap();
    assert_eq!(
        harness.drain(),
        vec![
            AppEvent::post_chat("Connected to Pixel A"),
            AppEvent::show_text("1 Pixel connected"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_discovery_errors_leave_no_session() {
    let harness = Harness::new();
    let result = harness.manager.connect_to_new_pixel().await;
    assert!(matches!(result, Err(BleError::DiscoveryFailed(_))));
    assert!(harness.manager.session_names().is_empty());

    let harness = Harness::with_backend(FakeBackend::unavailable(), Settings::default());
    let result = harness.manager.connect_to_new_pixel().await;
    assert_eq!(result, Err(BleError::Unavailable));
}

#[tokio::test(start_paused = true)]
async fn test_first_face_up_is_debounced() {
    let mut harness = Harness::new();
    let die = FakeDevice::modern("Pixel A");
    harness.backend.offer(&die);
    harness.manager.connect_to_new_pixel().await.unwrap();
    harness.drain();

    // Resting face reported right after connecting
    die.notify(&FACE_5);
    settle().await;
    assert!(harness.chat_lines().is_empty());

    die.notify(&ROLLING);
    die.notify(&FACE_5);
    settle().await;
    assert_eq!(
        harness.chat_lines(),
        vec!["&{template:default} {{name=Pixel A}} {{Roll=[[5]]}}".to_string()]
    );

    let session = harness.manager.session("Pixel A").unwrap();
    assert!(session.has_moved);
    assert_eq!(session.last_face_up, Some(4));
}

#[tokio::test(start_paused = true)]
async fn test_roll_with_visible_modifier() {
    let mut harness = Harness::new();
    let die = FakeDevice::modern("Pixel A");
    harness.backend.offer(&die);
    harness.manager.connect_to_new_pixel().await.unwrap();
    harness.modifier.set_value_from_str("3");
    harness.modifier.set_name("Strength");
    harness.modifier.set_visible(true);
    harness.drain();

    die.notify(&ROLLING);
    die.notify(&FACE_5);
    die.notify(&ROLLING);
    die.notify(&[3, 1, 19]);
    die.notify(&ROLLING);
    die.notify(&[3, 1, 0]);
    settle().await;

    assert_eq!(
        harness.chat_lines(),
        vec![
            "&{template:default} {{name=Pixel A (Strength)}} {{Pixel Roll=[[5]]}} {{Modifier=[[3]]}} {{Result=[[8]]}}".to_string(),
            "&{template:default} {{name=CRITICAL! Pixel A (Strength)}} {{Pixel Roll=[[20]]}} {{Modifier=[[3]]}} {{Result=[[23]]}}".to_string(),
            "&{template:default} {{name=FUMBLE! Pixel A (Strength)}} {{Pixel Roll=[[1]]}} {{Modifier=[[3]]}} {{Result=[[4]]}}".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_packets_do_not_roll() {
    let mut harness = Harness::new();
    let die = FakeDevice::modern("Pixel A");
    harness.backend.offer(&die);
    harness.manager.connect_to_new_pixel().await.unwrap();
    harness.drain();

    die.notify(&[]);
    die.notify(&[7, 1, 4]);
    die.notify(&[3, 1]);
    settle().await;
    assert!(harness.chat_lines().is_empty());
    // Unrecognized traffic still counts as movement for the debounce
    assert!(harness.manager.session("Pixel A").unwrap().has_moved);
}

#[tokio::test(start_paused = true)]
async fn test_silent_link_is_marked_disconnected() {
    let mut harness = Harness::new();
    let die = FakeDevice::modern("Pixel A");
    harness.backend.offer(&die);
    harness.manager.connect_to_new_pixel().await.unwrap();
    harness.drain();

    tokio::time::sleep(std::time::Duration::from_secs(36)).await;

    let session = harness.manager.session("Pixel A").unwrap();
    assert_eq!(session.status, ConnectionStatus::Disconnected);
    assert!(!session.reconnect_pending);
    assert_eq!(harness.drain(), vec![AppEvent::show_text("1 Pixel disconnected")]);
}

#[tokio::test(start_paused = true)]
async fn test_activity_keeps_link_alive() {
    let harness = Harness::new();
    let die = FakeDevice::modern("Pixel A");
    harness.backend.offer(&die);
    harness.manager.connect_to_new_pixel().await.unwrap();

    for _ in 0..6 {
        tokio::time::sleep(std::time::Duration::from_secs(20)).await;
        die.notify(&ROLLING);
    }
    settle().await;

    assert_eq!(
        harness.manager.session("Pixel A").unwrap().status,
        ConnectionStatus::Connected
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_all_forgets_every_die() {
    let mut harness = Harness::with_settings(patient_settings());
    let a = FakeDevice::modern("Pixel A");
    let b = FakeDevice::modern("Pixel B");
    harness.backend.offer(&a);
    harness.backend.offer(&b);
    harness.manager.connect_to_new_pixel().await.unwrap();
    harness.manager.connect_to_new_pixel().await.unwrap();
    harness.drain();

    harness.manager.disconnect_all().await;
    settle().await;

    assert!(harness.manager.session_names().is_empty());
    assert_eq!(a.disconnect_calls(), 1);
    assert_eq!(b.disconnect_calls(), 1);
    assert_eq!(harness.drain(), vec![AppEvent::show_text("No Pixel connected")]);
    // An explicit disconnect is not a drop: nothing tries to come back
    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert_eq!(a.connect_calls(), 1);
    assert_eq!(b.connect_calls(), 1);
}
