//! Control-topic protocol: inbound commands, acks and timer changes

use std::time::Duration;

use iot_fleet_sim::{
    hal::{MockClock, MockMqtt, MockRandom},
    services::run_event_loop,
    BulbState, DeviceRegistry, PublishScheduler, Simulator,
};
use tokio::sync::Notify;
use tokio::time::sleep;

fn sim() -> Simulator<MockMqtt, MockRandom, MockClock> {
    Simulator::new(
        DeviceRegistry::demo_fleet(),
        MockMqtt::new(),
        MockRandom::constant(0.5),
        MockClock::new(),
    )
}

/// Send one command through the control topic and return the ack text.
fn send(sim: &mut Simulator<MockMqtt, MockRandom, MockClock>, id: &str, cmd: &str) -> Option<String> {
    sim.client_mut().clear_published();
    sim.client_mut().queue_message(format!("iot/control/{id}"), cmd);
    sim.poll();
    sim.client()
        .published_to(&format!("iot/ack/{id}"))
        .first()
        .and_then(|p| p.payload_str())
        .map(str::to_string)
}

// ============================================================================
// Ack Table
// ============================================================================

#[test]
fn command_ack_table() {
    let cases = [
        ("vehicle-1", "SET_INTERVAL:1000", "ACK: Interval updated to 1000ms"),
        ("vehicle-1", "SET_INTERVAL:400", "NACK: Invalid interval"),
        ("vehicle-1", "SET_INTERVAL:500", "NACK: Invalid interval"),
        ("vehicle-1", "SET_INTERVAL:fast", "NACK: Invalid interval"),
        ("temp-sensor-1", "SET_THRESHOLD:30", "ACK: Threshold updated to 30°C"),
        ("temp-sensor-1", "SET_THRESHOLD:25.5", "ACK: Threshold updated to 25.5°C"),
        ("temp-sensor-1", "SET_THRESHOLD:warm", "NACK: Invalid threshold"),
        ("smart-bulb-1", "SET_THRESHOLD:30", "NACK: Command not supported for this device"),
        ("heart-monitor-1", "SET_THRESHOLD:30", "NACK: Command not supported for this device"),
        ("smart-bulb-1", "TURN_ON", "ACK: Bulb set to ON"),
        ("smart-bulb-1", "TURN_OFF", "ACK: Bulb set to OFF"),
        ("smart-bulb-1", "RESET", "ACK: Device reset to OFF"),
        ("vehicle-1", "TURN_ON", "NACK: Command not supported for this device"),
        ("temp-sensor-1", "RESET", "NACK: Command not supported for this device"),
        ("smart-bulb-1", "SELF_DESTRUCT", "NACK: Command not supported for this device"),
    ];

    let mut sim = sim();
    for (id, cmd, expected) in cases {
        assert_eq!(send(&mut sim, id, cmd).as_deref(), Some(expected), "{id} <- {cmd}");
    }
}

#[test]
fn unknown_device_is_silent() {
    let mut sim = sim();
    for cmd in ["TURN_ON", "SET_INTERVAL:1000", "SET_THRESHOLD:30", "BOGUS"] {
        assert_eq!(send(&mut sim, "ghost-9", cmd), None);
        assert!(sim.client().published.is_empty());
    }
    assert_eq!(sim.interval(), Duration::from_millis(3000));
}

#[test]
fn turn_on_publishes_telemetry_immediately() {
    let mut sim = sim();
    send(&mut sim, "smart-bulb-1", "TURN_ON");

    let telemetry = sim.client().published_to("iot/bulb/smart-bulb-1");
    assert_eq!(telemetry.len(), 1);
    let json = telemetry[0].json().unwrap();
    assert_eq!(json["value"], "ON");
    assert_eq!(json["unit"], "state");
    assert_eq!(
        sim.registry().get("smart-bulb-1").unwrap().bulb_state(),
        Some(BulbState::On)
    );
}

#[test]
fn nack_changes_nothing() {
    let mut sim = sim();
    send(&mut sim, "smart-bulb-1", "SET_THRESHOLD:10");
    send(&mut sim, "temp-sensor-1", "TURN_ON");
    send(&mut sim, "temp-sensor-1", "SET_THRESHOLD:nope");

    let registry = sim.registry();
    assert_eq!(registry.get("temp-sensor-1").unwrap().threshold(), Some(28.0));
    assert_eq!(registry.get("smart-bulb-1").unwrap().bulb_state(), Some(BulbState::Off));
    // nacks never republish telemetry
    assert!(sim.client().published_under("iot/temperature/").is_empty());
}

#[test]
fn threshold_update_applies_to_next_tick() {
    let mut sim = sim();
    // 0.5 reads 27.50, below the default 28
    sim.tick();
    assert!(sim.client().published_to("iot/alert/temp-sensor-1").is_empty());

    send(&mut sim, "temp-sensor-1", "SET_THRESHOLD:27.4");
    sim.tick();
    let alerts = sim.client().published_to("iot/alert/temp-sensor-1");
    assert_eq!(
        alerts[0].payload_str(),
        Some("ALERT: temp-sensor-1 exceeded threshold (27.50°C > 27.4°C)")
    );
}

#[test]
fn whitespace_around_commands_is_ignored() {
    let mut sim = sim();
    assert_eq!(
        send(&mut sim, "smart-bulb-1", "  TURN_ON\n").as_deref(),
        Some("ACK: Bulb set to ON")
    );
}

// ============================================================================
// Timer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn interval_change_takes_effect_without_restart() {
    let mut sim = sim();
    let mut scheduler = PublishScheduler::new(sim.interval());
    let inbox = Notify::new();

    // 0..3500ms at the default period: one tick
    run_event_loop(&mut sim, &mut scheduler, &inbox, sleep(Duration::from_millis(3500))).await;
    assert_eq!(sim.client().published_to("iot/gps/vehicle-1").len(), 1);

    sim.client_mut().queue_message("iot/control/vehicle-1", "SET_INTERVAL:1000");
    inbox.notify_one();
    let stats = run_event_loop(&mut sim, &mut scheduler, &inbox, sleep(Duration::from_millis(5200))).await;

    // ticks at 4500, 5500, ..., 8500
    assert_eq!(stats.ticks, 5);
    assert_eq!(sim.client().published_to("iot/gps/vehicle-1").len(), 6);
}

#[tokio::test(start_paused = true)]
async fn repeated_reschedules_leave_one_timer() {
    let mut sim = sim();
    let mut scheduler = PublishScheduler::new(sim.interval());
    let inbox = Notify::new();

    for period in [2000, 1500, 1000] {
        sim.client_mut().queue_message("iot/control/vehicle-1", format!("SET_INTERVAL:{period}"));
    }
    inbox.notify_one();

    let stats = run_event_loop(&mut sim, &mut scheduler, &inbox, sleep(Duration::from_millis(4500))).await;

    // one drain, one reschedule to the last value, ticks at 1000..=4000
    assert_eq!(stats.polls, 1);
    assert_eq!(stats.reschedules, 1);
    assert_eq!(stats.ticks, 4);
    assert_eq!(scheduler.period(), Duration::from_millis(1000));
    assert_eq!(sim.client().published_under("iot/ack/").len(), 3);
}
