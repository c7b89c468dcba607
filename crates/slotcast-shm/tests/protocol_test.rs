//! End-to-end server/client exchanges over mapped slots and index rings.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use common::{Harness, take};
use pretty_assertions::assert_eq;
use slotcast_core::{
    ConnectionState, DroppedInfo, Error, QueueWriter, ServerConfig, ServerStats,
};

fn config(slot_count: u32, class_limits: Vec<u32>) -> ServerConfig {
    ServerConfig::new(slot_count)
        .with_max_receivers(8)
        .with_class_limits(class_limits)
}

#[test]
fn round_trip_preserves_payload() {
    let mut h = Harness::new(&config(4, vec![4]), 64);
    let (_, mut client) = h.attach(0);

    let payload: Vec<u8> = (0..64).collect();
    let dropped = h.publish(&payload).unwrap();
    assert!(dropped.is_empty());

    let token = client.receive_slot().unwrap().expect("published slot");
    assert_eq!(client.access_slot_content(&token), payload.as_slice());
    client.release_slot(token).unwrap();

    h.server.reclaim_slots().unwrap();
    assert_eq!(
        h.server.stats(),
        ServerStats {
            slot_count: 4,
            free_slots: 4,
            receivers: 1,
            corrupted_receivers: 0,
        }
    );
}

#[test]
fn empty_queue_yields_nothing() {
    let mut h = Harness::new(&config(2, vec![2]), 8);
    let (_, mut client) = h.attach(0);
    for _ in 0..5 {
        assert!(client.receive_slot().unwrap().is_none());
    }
    assert_eq!(client.connection_state(), ConnectionState::Ok);
}

#[test]
fn fan_out_frees_slot_after_last_release() {
    let mut h = Harness::new(&config(2, vec![2]), 8);
    let mut clients: Vec<_> = (0..3).map(|_| h.attach(0).1).collect();

    h.publish(b"fanout").unwrap();
    let mut tokens: Vec<_> = clients
        .iter_mut()
        .map(|c| c.receive_slot().unwrap().expect("delivered"))
        .collect();
    for (client, token) in clients.iter().zip(&tokens) {
        assert_eq!(&client.access_slot_content(token)[..6], b"fanout");
    }

    for (i, client) in clients.iter_mut().enumerate() {
        client.release_slot(tokens.remove(0)).unwrap();
        h.server.reclaim_slots().unwrap();
        let expected_free = if i == 2 { 2 } else { 1 };
        assert_eq!(h.server.stats().free_slots, expected_free);
    }
}

/// Two slots, one class with limit 1, one receiver.
#[test]
fn class_limit_drops_until_reclaimed() {
    let mut h = Harness::new(&config(2, vec![1]), 8);
    let class = h.classes[0];
    let (_, mut client) = h.attach(0);

    assert!(h.publish(b"A").unwrap().is_empty());
    assert_eq!(h.server.class_slots_held(&class), 1);

    let dropped = h.publish(b"B").unwrap();
    assert!(dropped.contains(&class));
    assert_eq!(dropped.len(), 1);

    assert_eq!(take(&mut client, 1).unwrap(), b"A");
    assert!(client.receive_slot().unwrap().is_none());

    h.server.reclaim_slots().unwrap();
    assert_eq!(h.server.class_slots_held(&class), 0);

    assert!(h.publish(b"B").unwrap().is_empty());
    assert_eq!(take(&mut client, 1).unwrap(), b"B");
}

#[test]
fn slow_class_does_not_hold_back_others() {
    let mut h = Harness::new(&config(4, vec![1, 4]), 8);
    let (_, mut slow) = h.attach(0);
    let (_, mut fast) = h.attach(1);

    // The slow client keeps its first slot.
    h.publish(&[0]).unwrap();
    let held = slow.receive_slot().unwrap().expect("first slot");
    assert_eq!(take(&mut fast, 1).unwrap(), vec![0]);
    h.server.reclaim_slots().unwrap();

    let mut drops = 0;
    for i in 1..10u8 {
        let dropped = h.publish(&[i]).unwrap();
        if dropped.contains(&h.classes[0]) {
            drops += 1;
        }
        assert!(!dropped.contains(&h.classes[1]));
        assert_eq!(take(&mut fast, 1).unwrap(), vec![i]);
        h.server.reclaim_slots().unwrap();
    }
    assert_eq!(drops, 9);
    assert!(slow.receive_slot().unwrap().is_none());

    slow.release_slot(held).unwrap();
    h.server.reclaim_slots().unwrap();
    assert_eq!(h.server.stats().free_slots, 4);
}

#[test]
fn remove_receiver_releases_its_slots() {
    let mut h = Harness::new(&config(2, vec![2]), 8);
    let (gone, mut client) = h.attach(0);
    h.publish(b"x").unwrap();
    h.publish(b"y").unwrap();
    let _kept = client.receive_slot().unwrap().expect("slot");
    assert_eq!(h.server.stats().free_slots, 0);

    assert!(h.server.remove_receiver(&gone));
    assert_eq!(h.server.receiver_connection_state(&gone), None);
    assert!(!h.server.remove_receiver(&gone));
    assert_eq!(h.server.stats().free_slots, 2);
    assert_eq!(h.server.class_slots_held(&h.classes[0]), 0);

    let (_, mut next) = h.attach(0);
    h.publish(b"z").unwrap();
    assert_eq!(take(&mut next, 1).unwrap(), b"z");
}

#[test]
fn closed_client_corrupts_only_its_receiver() {
    let mut h = Harness::new(&config(4, vec![4]), 8);
    let (departed, queues) = h.attach_raw(0);
    let (healthy, mut client) = h.attach(0);
    queues.close();

    h.publish(b"after").unwrap();
    assert_eq!(
        h.server.receiver_connection_state(&departed),
        Some(ConnectionState::Corrupted)
    );
    assert_eq!(
        h.server.receiver_connection_state(&healthy),
        Some(ConnectionState::Ok)
    );
    assert_eq!(take(&mut client, 5).unwrap(), b"after");
    h.server.reclaim_slots().unwrap();
    assert_eq!(h.server.stats().corrupted_receivers, 1);
    assert_eq!(h.server.stats().free_slots, 4);
}

#[test]
fn releasing_unheld_slot_is_reported() {
    let mut h = Harness::new(&config(2, vec![2]), 8);
    let (rogue, mut queues) = h.attach_raw(0);
    let (_, mut client) = h.attach(0);

    queues.free_queue.push(1).unwrap();
    h.publish(b"ok").unwrap();

    let err = h.server.reclaim_slots().unwrap_err();
    assert!(matches!(
        err,
        Error::UnheldSlotReleased { receiver, slot: 1 } if receiver == rogue
    ));
    assert!(err.is_protocol_violation());
    assert_eq!(take(&mut client, 2).unwrap(), b"ok");
    h.server.reclaim_slots().unwrap();
}

#[test]
fn sending_without_receivers_recycles_slot() {
    let mut h = Harness::new(&config(1, vec![1]), 8);
    for _ in 0..3 {
        let token = h.server.acquire_slot().expect("the only slot");
        let result = h.server.send_slot(token, &mut DroppedInfo::new());
        assert!(matches!(result, Err(Error::NoReceivers)));
    }
    assert_eq!(h.server.stats().free_slots, 1);
}

#[test]
fn config_loaded_from_json() {
    let config: ServerConfig = serde_json::from_str(
        r#"{ "slot_count": 3, "max_receivers": 2, "class_limits": [1, 3] }"#,
    )
    .expect("valid config");
    let mut h = Harness::new(&config, 16);
    assert_eq!(h.classes.len(), 2);
    assert_eq!(h.server.class_limit(&h.classes[0]), 1);
    assert_eq!(h.server.class_limit(&h.classes[1]), 3);

    h.attach(0);
    h.attach(1);
    let (server_queues, _client_queues) = slotcast_shm::connection(3);
    assert!(
        h.server
            .add_receiver(
                &h.classes[0],
                server_queues.free_queue,
                server_queues.available_queue
            )
            .is_none()
    );
}
