//! End-to-end engine tests over the in-memory store, a manual-clock cache,
//! and a store-backed audit sink.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use smartstock::audit::{AuditSink, StoreAuditSink};
use smartstock::cache::{ManualClock, MemoryCache};
use smartstock::engine::Engine;
use smartstock::entity::catalog::{
    ActivityLog, Customer, FulfillmentStatus, Order, Product,
};
use smartstock::error::Error;
use smartstock::spec::{ListParams, ListSpec, RawFilter};
use smartstock::store::memory::MemoryStore;
use smartstock::store::DataStore;
use smartstock::store::Record;

fn setup() -> (Engine, Arc<MemoryStore>, ManualClock) {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(Utc::now());
    let cache = Arc::new(MemoryCache::with_clock(Arc::new(clock.clone())));
    let audit = Arc::new(StoreAuditSink::new(store.clone()));
    let engine = Engine::new(store.clone(), cache, audit);
    (engine, store, clock)
}

fn actor() -> Uuid {
    Uuid::now_v7()
}

async fn seed_orders(engine: &Engine, org: Uuid, totals: &[f64]) -> Vec<Order> {
    let by = actor();
    let mut orders = Vec::new();
    for &total in totals {
        let order = Order::new(org, Uuid::now_v7(), 1, total);
        orders.push(engine.create_order(org, order, by).await.unwrap());
    }
    orders
}

#[tokio::test]
async fn total_range_filter_returns_matches_and_exact_count() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    seed_orders(&engine, org, &[10.0, 25.0, 99.99, 150.0]).await;

    let page = engine
        .list::<Order>(
            ListParams::new(org)
                .sort("total", false)
                .filter("total", RawFilter::Numbers(vec![20.0, 100.0])),
        )
        .await
        .unwrap();

    let totals: Vec<f64> = page.rows.iter().map(|o| o.total).collect();
    assert_eq!(totals, vec![25.0, 99.99]);
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn range_bounds_are_inclusive_and_single_value_means_equality() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    seed_orders(&engine, org, &[20.0, 50.0, 100.0, 100.01]).await;

    let inclusive = engine
        .list::<Order>(
            ListParams::new(org).filter("total", RawFilter::Numbers(vec![20.0, 100.0])),
        )
        .await
        .unwrap();
    assert_eq!(inclusive.total, 3);

    let exact = engine
        .list::<Order>(ListParams::new(org).filter("total", RawFilter::Numbers(vec![50.0])))
        .await
        .unwrap();
    assert_eq!(exact.total, 1);
    assert_eq!(exact.rows[0].total, 50.0);
}

#[tokio::test]
async fn created_at_window_is_inclusive_and_single_date_means_equality() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let by = actor();
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    for day in 0..4 {
        let mut order = Order::new(org, Uuid::now_v7(), 1, 10.0);
        order.meta.created_at = base + chrono::Duration::days(day);
        engine.create_order(org, order, by).await.unwrap();
    }

    let window = engine
        .list::<Order>(ListParams::new(org).filter(
            "created_at",
            RawFilter::Dates(vec![
                base + chrono::Duration::days(1),
                base + chrono::Duration::days(2),
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(window.total, 2);
    assert!(window.rows.iter().all(|o| {
        o.meta.created_at >= base + chrono::Duration::days(1)
            && o.meta.created_at <= base + chrono::Duration::days(2)
    }));

    let exact = engine
        .list::<Order>(ListParams::new(org).filter("created_at", RawFilter::Dates(vec![base])))
        .await
        .unwrap();
    assert_eq!(exact.total, 1);
    assert_eq!(exact.rows[0].meta.created_at, base);
}

#[tokio::test]
async fn pagination_covers_every_row_exactly_once() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    // Identical totals force the id tie-break to keep windows disjoint.
    seed_orders(&engine, org, &[5.0; 25]).await;

    let mut seen = Vec::new();
    for page_no in 1..=3u32 {
        let page = engine
            .list::<Order>(
                ListParams::new(org)
                    .page(page_no)
                    .per_page(10)
                    .sort("total", true),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.rows.len(), if page_no == 3 { 5 } else { 10 });
        seen.extend(page.rows.iter().map(|o| o.meta.id));
    }

    seen.sort();
    let before = seen.len();
    seen.dedup();
    assert_eq!(seen.len(), before);
    assert_eq!(seen.len(), 25);
}

#[tokio::test]
async fn repeated_queries_return_identical_row_order() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    seed_orders(&engine, org, &[3.0, 1.0, 3.0, 2.0, 3.0]).await;

    let spec = ListSpec::new(org).sort("total", true);
    let first: Vec<Uuid> = engine
        .list_spec::<Order>(&spec)
        .await
        .unwrap()
        .rows
        .iter()
        .map(|o| o.meta.id)
        .collect();
    let second: Vec<Uuid> = engine
        .list_spec::<Order>(&spec)
        .await
        .unwrap()
        .rows
        .iter()
        .map(|o| o.meta.id)
        .collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn multi_select_with_only_unknown_values_matches_everything() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    seed_orders(&engine, org, &[1.0, 2.0]).await;

    let page = engine
        .list::<Order>(
            ListParams::new(org)
                .filter("fulfillment_status", RawFilter::Values(vec!["bogus".into()])),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn valid_multi_select_value_absent_from_data_matches_nothing() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    // Fresh orders are all pending.
    seed_orders(&engine, org, &[1.0, 2.0]).await;

    let page = engine
        .list::<Order>(
            ListParams::new(org)
                .filter("fulfillment_status", RawFilter::Values(vec!["cancelled".into()])),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.rows.is_empty());
}

#[tokio::test]
async fn organizations_never_see_each_other() {
    let (engine, _store, _clock) = setup();
    let org_a = Uuid::now_v7();
    let org_b = Uuid::now_v7();
    let a_orders = seed_orders(&engine, org_a, &[1.0, 2.0]).await;
    seed_orders(&engine, org_b, &[3.0]).await;

    let page = engine.list::<Order>(ListParams::new(org_a)).await.unwrap();
    assert_eq!(page.total, 2);
    assert!(page.rows.iter().all(|o| o.meta.org == org_a));

    // Cross-tenant fetch of a real row is indistinguishable from a miss.
    let err = engine
        .get::<Order>(org_b, a_orders[0].meta.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn create_with_foreign_org_is_a_scope_violation() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let other = Uuid::now_v7();
    let order = Order::new(other, Uuid::now_v7(), 1, 5.0);

    let err = engine.create_order(org, order, actor()).await.unwrap_err();
    assert!(matches!(err, Error::ScopeViolation));
}

#[tokio::test]
async fn order_numbers_are_sequential_per_org() {
    let (engine, _store, _clock) = setup();
    let org_a = Uuid::now_v7();
    let org_b = Uuid::now_v7();

    let a = seed_orders(&engine, org_a, &[1.0, 2.0, 3.0]).await;
    let b = seed_orders(&engine, org_b, &[4.0]).await;

    let numbers: Vec<u64> = a.iter().map(|o| o.order_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(b[0].order_number, 1);
}

#[tokio::test]
async fn client_supplied_total_is_stored_verbatim() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let created = seed_orders(&engine, org, &[123.45]).await;

    let fetched = engine.get::<Order>(org, created[0].meta.id).await.unwrap();
    assert_eq!(fetched.total, 123.45);
}

#[tokio::test]
async fn cached_list_is_stale_until_ttl_or_invalidation() {
    let (engine, store, clock) = setup();
    let org = Uuid::now_v7();
    seed_orders(&engine, org, &[1.0]).await;

    let spec = ListSpec::new(org);
    assert_eq!(engine.list_spec::<Order>(&spec).await.unwrap().total, 1);

    // Insert behind the engine's back; the cached page does not see it.
    let sneaky = Order::new(org, Uuid::now_v7(), 1, 2.0);
    store.insert(Record::from_entity(&sneaky)).await.unwrap();
    assert_eq!(engine.list_spec::<Order>(&spec).await.unwrap().total, 1);

    // TTL expiry picks it up.
    clock.advance(Duration::from_secs(1));
    assert_eq!(engine.list_spec::<Order>(&spec).await.unwrap().total, 2);
}

#[tokio::test]
async fn mutation_invalidates_list_cache_immediately() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    seed_orders(&engine, org, &[1.0]).await;

    let spec = ListSpec::new(org);
    assert_eq!(engine.list_spec::<Order>(&spec).await.unwrap().total, 1);

    // No clock movement: the engine's own write must bust the cache by tag.
    seed_orders(&engine, org, &[2.0]).await;
    assert_eq!(engine.list_spec::<Order>(&spec).await.unwrap().total, 2);
}

#[tokio::test]
async fn update_busts_the_cache_and_logs_one_update_entry() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let by = actor();
    let product = Product::new(org, "Widget", 10.0, Uuid::now_v7());
    let mut product = engine.create(org, &product, by).await.unwrap();

    let spec = ListSpec::new(org);
    let before = engine.list_spec::<Product>(&spec).await.unwrap();
    assert_eq!(before.rows[0].price, 10.0);

    product.price = 99.0;
    engine.update(org, &product, by).await.unwrap();

    // No clock movement: the update must bust the cached page by tag.
    let after = engine.list_spec::<Product>(&spec).await.unwrap();
    assert_eq!(after.rows[0].price, 99.0);

    let logs = engine
        .list::<ActivityLog>(ListParams::new(org).filter("q", RawFilter::Text("updated".into())))
        .await
        .unwrap();
    assert_eq!(logs.total, 1);
    assert_eq!(logs.rows[0].action, "Product: Update");
    assert_eq!(
        logs.rows[0].description,
        "Product \"Widget\" has been updated."
    );
}

#[tokio::test]
async fn create_writes_one_activity_entry_with_display_phrasing() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let customer = Customer::new(org, "Ada Lovelace", "ada@example.com");
    engine.create(org, &customer, actor()).await.unwrap();

    let logs = engine
        .list::<ActivityLog>(ListParams::new(org))
        .await
        .unwrap();
    assert_eq!(logs.total, 1);
    assert_eq!(logs.rows[0].action, "Customer: Create");
    assert_eq!(
        logs.rows[0].description,
        "Customer \"Ada Lovelace\" has been created."
    );
}

#[tokio::test]
async fn bulk_delete_logs_one_entry_listing_order_numbers() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let orders = seed_orders(&engine, org, &[10.0, 20.0, 30.0]).await;

    let deleted = engine
        .delete_many::<Order>(org, &[orders[0].meta.id, orders[1].meta.id], actor())
        .await
        .unwrap();
    assert_eq!(deleted.len(), 2);

    let remaining = engine.list::<Order>(ListParams::new(org)).await.unwrap();
    assert_eq!(remaining.total, 1);

    let logs = engine
        .list::<ActivityLog>(
            ListParams::new(org).filter("q", RawFilter::Text("deleted".into())),
        )
        .await
        .unwrap();
    assert_eq!(logs.total, 1);
    assert_eq!(logs.rows[0].action, "Orders: Delete");
    assert_eq!(
        logs.rows[0].description,
        "Orders deleted. List of orders: 1, 2"
    );
}

#[tokio::test]
async fn bulk_fulfillment_update_logs_one_entry_for_the_whole_batch() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let orders = seed_orders(&engine, org, &[10.0, 20.0]).await;
    let ids: Vec<Uuid> = orders.iter().map(|o| o.meta.id).collect();

    let updated = engine
        .set_order_fulfillment(org, &ids, FulfillmentStatus::Fulfilled, actor())
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);
    assert!(updated
        .iter()
        .all(|o| o.fulfillment_status == FulfillmentStatus::Fulfilled));

    let logs = engine
        .list::<ActivityLog>(
            ListParams::new(org).filter("q", RawFilter::Text("fulfillment".into())),
        )
        .await
        .unwrap();
    assert_eq!(logs.total, 1);
    assert_eq!(
        logs.rows[0].action,
        "Orders: Update Fulfillment Status To FULFILLED"
    );
    assert_eq!(
        logs.rows[0].description,
        "Order fulfillment status updated to fulfilled for 2 orders. List of orders: 1, 2"
    );
}

#[tokio::test]
async fn bulk_mutation_matching_nothing_logs_nothing() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    seed_orders(&engine, org, &[10.0]).await;

    let updated = engine
        .set_order_fulfillment(
            org,
            &[Uuid::now_v7()],
            FulfillmentStatus::Cancelled,
            actor(),
        )
        .await
        .unwrap();
    assert!(updated.is_empty());

    let logs = engine
        .list::<ActivityLog>(
            ListParams::new(org).filter("q", RawFilter::Text("fulfillment".into())),
        )
        .await
        .unwrap();
    assert_eq!(logs.total, 0);
}

#[tokio::test]
async fn activity_search_matches_action_or_description() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let by = actor();
    let customer = Customer::new(org, "Grace Hopper", "grace@example.com");
    engine.create(org, &customer, by).await.unwrap();
    seed_orders(&engine, org, &[10.0]).await;

    // "Hopper" appears only in the customer entry's description.
    let by_description = engine
        .list::<ActivityLog>(ListParams::new(org).filter("q", RawFilter::Text("Hopper".into())))
        .await
        .unwrap();
    assert_eq!(by_description.total, 1);

    // "Create" appears in both actions.
    let by_action = engine
        .list::<ActivityLog>(ListParams::new(org).filter("q", RawFilter::Text("create".into())))
        .await
        .unwrap();
    assert_eq!(by_action.total, 2);
}

#[tokio::test]
async fn bounds_resolve_min_max_and_refresh_after_writes() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    seed_orders(&engine, org, &[12.5, 80.0]).await;

    let bounds = engine.bounds::<Order>(org, "total").await.unwrap();
    assert_eq!(bounds.min_number(), Some(12.5));
    assert_eq!(bounds.max_number(), Some(80.0));

    // A write invalidates the bounds tag even though the hour-scale TTL has
    // not elapsed.
    seed_orders(&engine, org, &[200.0]).await;
    let bounds = engine.bounds::<Order>(org, "total").await.unwrap();
    assert_eq!(bounds.max_number(), Some(200.0));
}

#[tokio::test]
async fn bounds_on_an_empty_org_are_open() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();

    let bounds = engine.bounds::<Order>(org, "total").await.unwrap();
    assert_eq!(bounds.min, None);
    assert_eq!(bounds.max, None);
}

#[tokio::test]
async fn bounds_on_a_non_range_column_fail_validation() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();

    let err = engine
        .bounds::<Order>(org, "fulfillment_status")
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn facet_lists_distinct_values_scoped_to_the_org() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let other = Uuid::now_v7();
    let by = actor();
    for (name, city) in [("A", "Lisbon"), ("B", "Porto"), ("C", "Lisbon")] {
        let mut customer = Customer::new(org, name, format!("{}@example.com", name));
        customer.city = city.to_string();
        engine.create(org, &customer, by).await.unwrap();
    }
    let mut foreign = Customer::new(other, "D", "d@example.com");
    foreign.city = "Madrid".to_string();
    engine.create(other, &foreign, by).await.unwrap();

    let cities = engine.facet::<Customer>(org, "city").await.unwrap();
    assert_eq!(cities, vec!["Lisbon".to_string(), "Porto".to_string()]);
}

#[tokio::test]
async fn orders_sort_by_joined_product_name() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();
    let by = actor();
    let customer = engine
        .create(org, &Customer::new(org, "Buyer", "buyer@example.com"), by)
        .await
        .unwrap();

    let mut product_ids = Vec::new();
    for name in ["Zinc", "Anvil", "Mallet"] {
        let product = Product::new(org, name, 10.0, customer.meta.id);
        product_ids.push(engine.create(org, &product, by).await.unwrap().meta.id);
    }
    for id in &product_ids {
        engine
            .create_order(org, Order::new(org, *id, 1, 10.0), by)
            .await
            .unwrap();
    }

    let page = engine
        .list::<Order>(ListParams::new(org).sort("product", false))
        .await
        .unwrap();
    let products: Vec<Uuid> = page.rows.iter().map(|o| o.product_id).collect();
    assert_eq!(products, vec![product_ids[1], product_ids[2], product_ids[0]]);
}

#[tokio::test]
async fn unsupported_sort_in_a_prebuilt_spec_is_rejected() {
    let (engine, _store, _clock) = setup();
    let org = Uuid::now_v7();

    let err = engine
        .list_spec::<Order>(&ListSpec::new(org).sort("velocity", true))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedSort(field) if field == "velocity"));
}

struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn append(&self, _entry: ActivityLog) -> Result<(), Error> {
        Err(Error::Store("disk full".into()))
    }
}

#[tokio::test]
async fn audit_failure_surfaces_but_the_write_is_already_durable() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let engine = Engine::new(store.clone(), cache, Arc::new(FailingSink));
    let org = Uuid::now_v7();

    let order = Order::new(org, Uuid::now_v7(), 1, 9.0);
    let id = order.meta.id;
    let err = engine.create_order(org, order, actor()).await.unwrap_err();
    assert!(matches!(err, Error::AuditWrite(_)));

    let stored = engine.get::<Order>(org, id).await.unwrap();
    assert_eq!(stored.total, 9.0);
}
