//! Integration tests for the navigation stack: open/close lifecycle, pool
//! reuse, exit rejection and per-frame update delivery.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{MapFetcher, ProbeController, RecordingHost, entries, index_of, journal};
use panelkit::{
    Model, Navigator, NavigatorConfig, PanelRegistry, PanelTypeId, Phase, ResourceCache,
    StackError, StaticPathTable,
};
use serde_json::json;

struct Env {
    nav: Navigator,
    fetcher: Arc<MapFetcher>,
    host: Arc<RecordingHost>,
    journal: common::Journal,
    allow_exit: Arc<AtomicBool>,
    fail_loading: Arc<AtomicBool>,
    inventory_updates: Arc<AtomicUsize>,
    shop_updates: Arc<AtomicUsize>,
}

fn env() -> Env {
    let fetcher = Arc::new(
        MapFetcher::new()
            .insert("ui/inventory", b"inventory prefab")
            .insert("ui/shop", b"shop prefab"),
    );
    let host = Arc::new(RecordingHost::new());
    let cache = Arc::new(ResourceCache::new(fetcher.clone()));

    let journal = journal();
    let allow_exit = Arc::new(AtomicBool::new(true));
    let fail_loading = Arc::new(AtomicBool::new(false));
    let inventory_updates = Arc::new(AtomicUsize::new(0));
    let shop_updates = Arc::new(AtomicUsize::new(0));

    let mut registry = PanelRegistry::new();
    {
        let (journal, allow_exit, fail_loading, updates) = (
            journal.clone(),
            allow_exit.clone(),
            fail_loading.clone(),
            inventory_updates.clone(),
        );
        registry.register("inventory", move || {
            ProbeController::new(
                "inventory",
                journal.clone(),
                allow_exit.clone(),
                fail_loading.clone(),
                updates.clone(),
            )
        });
    }
    {
        let (journal, updates) = (journal.clone(), shop_updates.clone());
        registry.register("shop", move || {
            ProbeController::new(
                "shop",
                journal.clone(),
                Arc::new(AtomicBool::new(true)),
                Arc::new(AtomicBool::new(false)),
                updates.clone(),
            )
        });
    }
    {
        let (journal, updates) = (journal.clone(), shop_updates.clone());
        registry.register("ghost", move || {
            ProbeController::new(
                "ghost",
                journal.clone(),
                Arc::new(AtomicBool::new(true)),
                Arc::new(AtomicBool::new(false)),
                updates.clone(),
            )
        });
    }

    let mut paths = StaticPathTable::new();
    paths.insert("inventory", "ui/inventory");
    paths.insert("shop", "ui/shop");
    // `ghost` is registered but has no path on purpose

    let config = NavigatorConfig {
        halt_on_stack_corruption: false,
    };
    let nav = Navigator::new(config, cache, host.clone(), Arc::new(paths), registry);

    Env {
        nav,
        fetcher,
        host,
        journal,
        allow_exit,
        fail_loading,
        inventory_updates,
        shop_updates,
    }
}

#[tokio::test]
async fn test_open_close_reopen_reuses_pooled_instance() {
    let env = env();
    let type_id = PanelTypeId::from("inventory");

    let first = env.nav.open("inventory", Model::new()).await.unwrap();
    assert_eq!(first.phase, Phase::Active);
    assert!(env.nav.is_open(&type_id));

    assert!(env.nav.close("inventory").await.unwrap());
    assert!(!env.nav.is_open(&type_id));
    assert!(env.nav.pool().contains(&type_id));

    let second = env.nav.open("inventory", Model::new()).await.unwrap();
    assert_eq!(
        first.instance_id, second.instance_id,
        "reopen must reuse the pooled instance"
    );
    assert_eq!(first.surface, second.surface);
    // The surface was built once; the resource was fetched once
    assert_eq!(env.fetcher.fetch_count(), 1);
    assert_eq!(
        entries(&env.journal),
        vec![
            "load:inventory",
            "enter:inventory",
            "exit:inventory",
            "load:inventory",
            "enter:inventory",
        ]
    );
}

#[tokio::test]
async fn test_duplicate_open_is_rejected() {
    let env = env();

    env.nav.open("inventory", Model::new()).await.unwrap();
    let err = env.nav.open("inventory", Model::new()).await.unwrap_err();

    assert!(matches!(err, StackError::AlreadyOpen(_)));
    assert_eq!(env.nav.depth(), 1);
}

#[tokio::test]
async fn test_rejected_exit_keeps_panel_active_and_closable_later() {
    let env = env();
    let type_id = PanelTypeId::from("inventory");

    let opened = env.nav.open("inventory", Model::new()).await.unwrap();

    env.allow_exit.store(false, Ordering::SeqCst);
    assert!(!env.nav.close("inventory").await.unwrap());
    let found = env.nav.find(&type_id).unwrap();
    assert_eq!(found.phase, Phase::Active);
    assert!(env.host.state(opened.surface.unwrap()).visible);

    // A later close attempt must still be possible
    env.allow_exit.store(true, Ordering::SeqCst);
    assert!(env.nav.close("inventory").await.unwrap());
    assert!(!env.nav.is_open(&type_id));
}

#[tokio::test]
async fn test_closing_a_type_that_is_not_open_is_an_error() {
    let env = env();

    let err = env.nav.close("shop").await.unwrap_err();
    assert!(matches!(err, StackError::NotOnStack(_)));
}

#[tokio::test]
async fn test_update_is_delivered_only_while_active() {
    let env = env();

    env.nav.update();
    assert_eq!(env.inventory_updates.load(Ordering::SeqCst), 0);

    env.nav.open("inventory", Model::new()).await.unwrap();
    env.nav.update();
    env.nav.update();
    assert_eq!(env.inventory_updates.load(Ordering::SeqCst), 2);

    env.nav.close("inventory").await.unwrap();
    env.nav.update();
    assert_eq!(env.inventory_updates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_update_skips_externally_destroyed_surfaces() {
    let env = env();

    let opened = env.nav.open("inventory", Model::new()).await.unwrap();
    env.host.kill(opened.surface.unwrap());

    env.nav.update();
    assert_eq!(env.inventory_updates.load(Ordering::SeqCst), 0);
    // Skipped, not removed: only close removes stack entries
    assert_eq!(env.nav.depth(), 1);
}

#[tokio::test]
async fn test_unknown_path_aborts_before_any_loading() {
    let env = env();

    let err = env.nav.open("ghost", Model::new()).await.unwrap_err();
    assert!(matches!(err, StackError::UnknownPathForType(_)));
    assert_eq!(env.fetcher.fetch_count(), 0);
    assert_eq!(env.nav.depth(), 0);
    assert!(entries(&env.journal).is_empty());
}

#[tokio::test]
async fn test_loading_failure_rolls_the_open_back() {
    let env = env();

    env.fail_loading.store(true, Ordering::SeqCst);
    let err = env.nav.open("inventory", Model::new()).await.unwrap_err();

    assert!(matches!(err, StackError::LoadingAborted { .. }));
    assert_eq!(env.nav.depth(), 0);
    assert_eq!(env.host.alive_count(), 0);
    // The loading hook runs before acquisition, so nothing was fetched
    assert_eq!(env.fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn test_open_order_is_render_order() {
    let env = env();

    let below = env.nav.open("inventory", Model::new()).await.unwrap();
    let above = env.nav.open("shop", Model::new()).await.unwrap();

    assert_eq!(env.host.state(below.surface.unwrap()).order, 0);
    assert_eq!(env.host.state(above.surface.unwrap()).order, 1);
    assert_eq!(env.nav.top().unwrap().type_id, PanelTypeId::from("shop"));
}

#[tokio::test]
async fn test_back_closes_topmost_then_reports_empty() {
    let env = env();

    env.nav.open("inventory", Model::new()).await.unwrap();
    env.nav.open("shop", Model::new()).await.unwrap();

    assert!(env.nav.back().await.unwrap());
    assert!(!env.nav.is_open(&PanelTypeId::from("shop")));
    assert!(env.nav.is_open(&PanelTypeId::from("inventory")));

    assert!(env.nav.back().await.unwrap());
    assert!(!env.nav.back().await.unwrap(), "empty stack backs out as failure");
}

#[tokio::test]
async fn test_activation_observer_sees_panel_and_model() {
    let env = env();
    let seen: Arc<Mutex<Vec<(String, serde_json::Value)>>> = Arc::new(Mutex::new(Vec::new()));

    {
        let seen = seen.clone();
        env.nav.set_on_activated(move |panel, model| {
            seen.lock()
                .unwrap()
                .push((panel.type_id.to_string(), model.payload.clone()));
        });
    }

    env.nav
        .open("inventory", Model::with_payload(json!({ "gold": 250 })))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "inventory");
    assert_eq!(seen[0].1, json!({ "gold": 250 }));
}

#[tokio::test]
async fn test_update_model_mutates_the_open_panel() {
    let env = env();
    let type_id = PanelTypeId::from("inventory");

    env.nav
        .open("inventory", Model::with_payload(json!({ "gold": 0 })))
        .await
        .unwrap();

    env.nav
        .update_model(&type_id, |model| {
            model.payload = json!({ "gold": 999 });
        })
        .unwrap();

    let mut observed = serde_json::Value::Null;
    env.nav
        .update_model(&type_id, |model| observed = model.payload.clone())
        .unwrap();
    assert_eq!(observed, json!({ "gold": 999 }));

    let err = env
        .nav
        .update_model(&PanelTypeId::from("shop"), |_| {})
        .unwrap_err();
    assert!(matches!(err, StackError::NotOnStack(_)));
}

#[tokio::test]
async fn test_refresh_runs_the_refresh_hook() {
    let env = env();

    env.nav.open("inventory", Model::new()).await.unwrap();
    env.nav.refresh("inventory").await.unwrap();

    assert!(entries(&env.journal).contains(&"refresh:inventory".to_string()));
    assert!(
        index_of(&env.journal, "refresh:inventory") > index_of(&env.journal, "enter:inventory")
    );

    let err = env.nav.refresh("shop").await.unwrap_err();
    assert!(matches!(err, StackError::NotOnStack(_)));
}

#[tokio::test]
async fn test_clear_all_destroys_everything_and_bypasses_the_pool() {
    let env = env();

    let first = env.nav.open("inventory", Model::new()).await.unwrap();
    env.nav.open("shop", Model::new()).await.unwrap();
    assert_eq!(env.host.alive_count(), 2);

    env.nav.clear_all();
    assert_eq!(env.nav.depth(), 0);
    assert_eq!(env.host.alive_count(), 0);
    assert!(env.nav.pool().is_empty());

    // Nothing pooled, so a reopen builds a fresh instance and refetches
    let reopened = env.nav.open("inventory", Model::new()).await.unwrap();
    assert_ne!(first.instance_id, reopened.instance_id);
    assert_eq!(env.fetcher.fetch_count(), 3);
}
