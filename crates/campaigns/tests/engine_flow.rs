//! End-to-end flows through the public API: payload ingestion, trigger
//! evaluation, throttle handoff between campaigns, and persistence across
//! engine rebuilds.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use reach_campaigns::{AlwaysReady, CampaignEngine, CampaignStatus, Verdict};
use reach_core::{FixedClock, SdkConfig};
use reach_storage::{MemoryStorage, StorageManager};

const DAY_MS: i64 = 86_400_000;

fn engine_with(
    storage: StorageManager,
    clock: Arc<FixedClock>,
    payload: serde_json::Value,
) -> CampaignEngine {
    let mut config = SdkConfig::default();
    config.qa.enabled = true;

    let mut engine = CampaignEngine::new("app-user-1", &config, storage, Arc::new(AlwaysReady), clock);
    engine
        .store_campaigns_json(&payload.to_string())
        .expect("payload should parse");
    engine
}

fn two_campaign_payload() -> serde_json::Value {
    json!({
        "campaigns": {
            "campaigns": [
                {
                    "id": 101,
                    "priority": 1,
                    "start_date": 0,
                    "end_date": 10 * DAY_MS,
                    "rules": { "min_delay_between_messages": DAY_MS },
                    "triggers": [{ "event_name": "tv.event_simple" }],
                    "messages": [{ "id": 1010, "name": "IAM1" }],
                },
                {
                    "id": 202,
                    "priority": 2,
                    "start_date": 0,
                    "end_date": 10 * DAY_MS,
                    "triggers": [{ "event_name": "tv.event_simple" }],
                    "embedded_message": {
                        "id": 2020,
                        "data": "{\"offer\":\"spring\"}",
                        "type": "json",
                    },
                },
            ],
            "rules": { "max_impressions": 10 },
            "cdn_paths": { "message_images": "https://cdn.example.com/images/" },
        },
    })
}

#[test]
fn priority_pool_is_shared_between_iam_and_embedded() {
    let clock = Arc::new(FixedClock::at_epoch_ms(DAY_MS));
    let storage = StorageManager::new(Arc::new(MemoryStorage::new()));
    let mut engine = engine_with(storage, clock.clone(), two_campaign_payload());

    let iam_shown = Arc::new(AtomicU32::new(0));
    let embedded_shown = Arc::new(AtomicU32::new(0));
    let impressions = Arc::new(AtomicU32::new(0));

    let iam_counter = iam_shown.clone();
    engine.on_message(Box::new(move |message, campaign, images_cdn| {
        assert_eq!(message.name, "IAM1");
        assert_eq!(campaign.id, 101);
        assert_eq!(images_cdn, "https://cdn.example.com/images/");
        iam_counter.fetch_add(1, Ordering::SeqCst);
    }));
    let embedded_counter = embedded_shown.clone();
    engine.on_embedded_message(Box::new(move |message, _props| {
        assert_eq!(message.data, "{\"offer\":\"spring\"}");
        embedded_counter.fetch_add(1, Ordering::SeqCst);
    }));
    let impression_counter = impressions.clone();
    engine.on_impression(Box::new(move |_campaign| {
        impression_counter.fetch_add(1, Ordering::SeqCst);
    }));

    // Priority 1 IAM wins first.
    let first = engine.check_triggers("tv.event_simple", None, None);
    assert_eq!(first.code(), Verdict::Match);
    assert_eq!(first.winner(), Some(101));
    assert_eq!(iam_shown.load(Ordering::SeqCst), 1);
    assert_eq!(embedded_shown.load(Ordering::SeqCst), 0);

    // Once the IAM throttles itself, the embedded campaign takes the slot.
    clock.advance_ms(1_000);
    let second = engine.check_triggers("tv.event_simple", None, None);
    assert_eq!(second.winner(), Some(202));
    assert_eq!(embedded_shown.load(Ordering::SeqCst), 1);
    assert_eq!(impressions.load(Ordering::SeqCst), 2);

    // Exactly one campaign is selected per call.
    assert_eq!(
        first.campaigns.iter().filter(|c| c.displayed).count() +
        second.campaigns.iter().filter(|c| c.displayed).count(),
        2
    );
}

#[test]
fn conditioned_trigger_end_to_end() {
    let clock = Arc::new(FixedClock::at_epoch_ms(DAY_MS));
    let storage = StorageManager::new(Arc::new(MemoryStorage::new()));
    let mut engine = engine_with(
        storage,
        clock,
        json!({
            "campaigns": { "campaigns": [{
                "id": 7,
                "priority": 1,
                "start_date": 0,
                "end_date": 10 * DAY_MS,
                "triggers": [{
                    "event_name": "song1.played",
                    "conditions": {
                        "op": "and",
                        "args": [
                            { "key": "artist", "value": "prince", "op": "eq" },
                            { "key": "song", "value": "purple rain", "op": "eq" },
                        ],
                    },
                }],
                "messages": [{ "id": 317653 }],
            }]},
        }),
    );

    let shown_ids = Arc::new(Mutex::new(Vec::new()));
    let sink = shown_ids.clone();
    engine.on_message(Box::new(move |message, _campaign, _cdn| {
        sink.lock().unwrap().push(message.id);
    }));

    let full_payload = json!({ "artist": "prince", "song": "purple rain" })
        .as_object()
        .cloned()
        .unwrap();
    let outcome = engine.check_triggers("song1.played", Some(&full_payload), None);
    assert_eq!(outcome.code(), Verdict::Match);
    assert_eq!(*shown_ids.lock().unwrap(), vec![317653]);

    let partial_payload = json!({ "artist": "prince" }).as_object().cloned().unwrap();
    let outcome = engine.check_triggers("song1.played", Some(&partial_payload), None);
    assert_eq!(outcome.code(), Verdict::NoMatch);
    assert_eq!(shown_ids.lock().unwrap().len(), 1);
}

#[test]
fn global_launch_delay_blocks_single_campaign_payload() {
    let clock = Arc::new(FixedClock::at_epoch_ms(DAY_MS));
    let storage = StorageManager::new(Arc::new(MemoryStorage::new()));
    let mut engine = engine_with(
        storage,
        clock,
        json!({
            "campaigns": {
                "campaigns": [{
                    "id": 1,
                    "priority": 1,
                    "start_date": 0,
                    "end_date": 10 * DAY_MS,
                    "triggers": [{ "event_name": "tv.event_simple" }],
                    "messages": [{ "id": 10 }],
                }],
                "rules": { "delay_first_message": DAY_MS },
            },
        }),
    );

    let outcome = engine.check_triggers("tv.event_simple", None, None);
    assert_eq!(outcome.code(), Verdict::GlobalThrottleLaunchTime);
    assert!(!outcome.displayed());
}

#[test]
fn impressions_survive_rebuild_and_keep_throttling() {
    let clock = Arc::new(FixedClock::at_epoch_ms(DAY_MS));
    let storage = StorageManager::new(Arc::new(MemoryStorage::new()));

    let payload = json!({
        "campaigns": { "campaigns": [{
            "id": 315415,
            "priority": 1,
            "start_date": 0,
            "end_date": 10 * DAY_MS,
            "rules": { "max_impressions": 1 },
            "triggers": [{ "event_name": "tv.event_simple" }],
            "messages": [{ "id": 10 }],
        }]},
    });

    let mut engine = engine_with(storage.clone(), clock.clone(), payload);
    assert_eq!(
        engine.check_triggers("tv.event_simple", None, None).code(),
        Verdict::Match
    );
    assert_eq!(engine.campaign_state(315415).unwrap().impressions, 1);
    drop(engine);

    // A fresh engine for the same user restores the campaign list and
    // display history from storage; the impression cap still binds.
    let mut rebuilt = CampaignEngine::new(
        "app-user-1",
        &SdkConfig::default(),
        storage,
        Arc::new(AlwaysReady),
        clock,
    );
    assert_eq!(rebuilt.campaigns().len(), 1);
    let state = rebuilt.campaign_state(315415).unwrap();
    assert_eq!(state.impressions, 1);
    assert_eq!(state.status, CampaignStatus::Seen);

    let outcome = rebuilt.check_triggers("tv.event_simple", None, None);
    assert_eq!(outcome.code(), Verdict::ThrottleMaxImpressions);
}

#[test]
fn qa_report_shape_matches_wire_contract() {
    let clock = Arc::new(FixedClock::at_epoch_ms(DAY_MS));
    let storage = StorageManager::new(Arc::new(MemoryStorage::new()));
    let mut engine = engine_with(storage, clock, two_campaign_payload());

    let payload = json!({ "a": 1 }).as_object().cloned().unwrap();
    engine.check_triggers("tv.event_simple", Some(&payload), None);

    let reports = engine.drain_qa_reports();
    assert_eq!(reports.len(), 1);

    let value = serde_json::to_value(&reports[0]).unwrap();
    assert_eq!(value["event_name"], "tv.event_simple");
    assert_eq!(value["event_payload"]["a"], 1);
    assert_eq!(value["displayed"], true);
    let campaigns = value["campaigns"].as_array().unwrap();
    assert_eq!(campaigns.len(), 2);
    assert_eq!(campaigns[0]["id"], 101);
    assert_eq!(campaigns[0]["type"], "iam");
    assert_eq!(campaigns[1]["type"], "embedded");
    assert_eq!(campaigns[1]["displayed"], false);
}
