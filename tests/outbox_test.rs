mod common;

use catalog_facets::{
    entities::{outbox_event, AttributeType, OutboxEvent},
    events::{outbox, Event, EventSender},
};
use common::{attrs, item_input, TestApp};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;
use tokio::sync::mpsc;

async fn drain_all(app: &mut TestApp) -> Vec<Event> {
    let delivered = outbox::drain_once(&app.state.db, &app.state.event_sender, 100)
        .await
        .expect("drain failed");
    let mut events = Vec::with_capacity(delivered);
    while let Ok(event) = app.events.try_recv() {
        events.push(event);
    }
    assert_eq!(events.len(), delivered);
    events
}

#[tokio::test]
async fn item_creation_announces_itself_once() {
    let mut app = TestApp::new().await;
    let laptops = app.category("Laptops", "laptops", None).await;
    let cpu = app
        .bound_attribute(laptops.id, "cpu", AttributeType::Choice, false, 1)
        .await;
    drain_all(&mut app).await;

    let mut input = item_input("Announced", laptops.id);
    input.attributes = attrs(&[("cpu", json!("Intel i5"))]);
    let created = app.create_item(input).await;

    let events = drain_all(&mut app).await;
    assert!(events.contains(&Event::ItemCreated(created.item.id)));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::AttributeChoiceCreated { attribute_id, .. } if *attribute_id == cpu)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::ItemAttributeChanged { .. })));

    assert!(drain_all(&mut app).await.is_empty());
}

#[tokio::test]
async fn attribute_edits_emit_one_event_per_changed_code() {
    let mut app = TestApp::new().await;
    let laptops = app.category("Laptops", "laptops", None).await;
    app.bound_attribute(laptops.id, "ram", AttributeType::Int, false, 1).await;
    app.bound_attribute(laptops.id, "storage", AttributeType::Text, false, 2).await;
    let item_id = app.create_item(item_input("Edited", laptops.id)).await.item.id;
    drain_all(&mut app).await;

    let items = app.state.services.items.clone();
    items
        .set_item_attributes(item_id, attrs(&[("ram", json!(16)), ("storage", json!("512 GB"))]))
        .await
        .unwrap();
    items
        .set_item_attributes(item_id, attrs(&[("ram", json!(16)), ("storage", json!("1 TB"))]))
        .await
        .unwrap();

    let events = drain_all(&mut app).await;
    let fields: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::ItemAttributeChanged { item_id: id, field } if *id == item_id => Some(field.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields.iter().filter(|f| **f == "ram").count(), 1);
    assert_eq!(fields.iter().filter(|f| **f == "storage").count(), 2);
}

#[tokio::test]
async fn undeliverable_events_stay_pending_for_retry() {
    let app = TestApp::new().await;
    let laptops = app.category("Laptops", "laptops", None).await;
    app.create_item(item_input("Queued", laptops.id)).await;

    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let closed = EventSender::new(tx);
    let delivered = outbox::drain_once(&app.state.db, &closed, 100).await.unwrap();
    assert_eq!(delivered, 0);

    let rows = OutboxEvent::find()
        .filter(outbox_event::Column::EventType.eq("item_created"))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "pending");
    assert_eq!(rows[0].attempts, 1);
    assert!(rows[0].error_message.is_some());
}

#[tokio::test]
async fn stale_processing_rows_are_reclaimed() {
    let mut app = TestApp::new().await;
    let laptops = app.category("Laptops", "laptops", None).await;
    let item_id = app.create_item(item_input("Stranded", laptops.id)).await.item.id;

    let row = OutboxEvent::find()
        .filter(outbox_event::Column::EventType.eq("item_created"))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut stuck: outbox_event::ActiveModel = row.into();
    stuck.status = Set("processing".to_string());
    stuck.attempts = Set(1);
    stuck.updated_at = Set(Some(Utc::now() - Duration::hours(1)));
    stuck.update(&*app.state.db).await.unwrap();

    let events = drain_all(&mut app).await;
    assert!(events.contains(&Event::ItemCreated(item_id)));

    let rows = OutboxEvent::find()
        .filter(outbox_event::Column::EventType.eq("item_created"))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(rows[0].status, "delivered");
    assert_eq!(rows[0].attempts, 2);
}

#[tokio::test]
async fn fresh_processing_rows_are_left_alone() {
    let app = TestApp::new().await;
    let laptops = app.category("Laptops", "laptops", None).await;
    app.create_item(item_input("In Flight", laptops.id)).await;

    let row = OutboxEvent::find()
        .filter(outbox_event::Column::EventType.eq("item_created"))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut claimed: outbox_event::ActiveModel = row.into();
    claimed.status = Set("processing".to_string());
    claimed.updated_at = Set(Some(Utc::now()));
    claimed.update(&*app.state.db).await.unwrap();

    let cutoff = Utc::now() - Duration::seconds(outbox::PROCESSING_LEASE_SECS);
    assert_eq!(outbox::reclaim_abandoned(&app.state.db, cutoff).await.unwrap(), 0);
}
