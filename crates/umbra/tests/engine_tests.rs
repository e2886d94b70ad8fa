//! End-to-end behavior of the inversion engine over an in-memory document.

use std::cell::RefCell;
use std::rc::Rc;

use umbra::extract;
use umbra::prelude::*;
use umbra::{StorageError, contrast_ratio, invert_lightness};

type Engine = InversionEngine<MemoryDocument, MemoryStore>;

/// Route engine logs to the test harness; set `RUST_LOG=umbra=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine(doc: MemoryDocument) -> Engine {
    InversionEngine::new(doc, MemoryStore::new(), InvertConfig::default())
}

/// Feed whatever the document recorded since the last batch to the engine.
fn flush(engine: &mut Engine) {
    let batch = engine.document_mut().take_records();
    engine.handle_mutations(&batch);
}

fn inline(engine: &Engine, el: &NodeRef, property: StyleProperty) -> String {
    engine.document().inline_style(el, property)
}

/// Store whose every operation fails.
struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("blocked".into()))
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("blocked".into()))
    }
}

#[test]
fn test_disable_restores_original_inline_values() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let card = doc.append(&body, "div");
    doc.set_base_style(&card, StyleProperty::BackgroundColor, "rgb(255, 255, 255)");
    doc.set_inline_style(&card, StyleProperty::Color, "rgb(200, 0, 0)");
    doc.set_base_style(&card, StyleProperty::BoxShadow, "rgba(0, 0, 0, 0.1) 0px 2px 4px");
    let img = doc.append(&card, "img");
    doc.set_inline_style(&img, StyleProperty::Filter, "grayscale(1)");

    let mut engine = engine(doc);
    engine.enable();
    assert!(engine.document().is_observing());

    assert_eq!(inline(&engine, &card, StyleProperty::BackgroundColor), "rgb(0, 0, 0)");
    assert_ne!(inline(&engine, &card, StyleProperty::Color), "rgb(200, 0, 0)");
    assert_eq!(
        inline(&engine, &card, StyleProperty::BoxShadow),
        "rgba(255, 255, 255, 0.1) 0px 2px 4px"
    );
    assert_eq!(
        inline(&engine, &img, StyleProperty::Filter),
        "grayscale(1) invert(1) hue-rotate(180deg)"
    );

    engine.disable();

    assert_eq!(inline(&engine, &card, StyleProperty::BackgroundColor), "");
    assert_eq!(inline(&engine, &card, StyleProperty::Color), "rgb(200, 0, 0)");
    assert_eq!(inline(&engine, &card, StyleProperty::BoxShadow), "");
    assert_eq!(inline(&engine, &img, StyleProperty::Filter), "grayscale(1)");
    assert!(!engine.is_watching());
    assert!(!engine.document().is_observing());
}

#[test]
fn test_reenable_reuses_snapshots() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let panel = doc.append(&body, "section");
    doc.set_base_style(&panel, StyleProperty::BackgroundColor, "rgb(240, 240, 240)");

    let mut engine = engine(doc);
    engine.enable();
    let first = inline(&engine, &panel, StyleProperty::BackgroundColor);
    let tracked = engine.cache().len();

    engine.disable();
    assert_eq!(engine.cache().len(), tracked);
    engine.enable();
    assert_eq!(inline(&engine, &panel, StyleProperty::BackgroundColor), first);
    assert_eq!(first, "rgb(15, 15, 15)");
}

#[test]
fn test_inserted_subtree_is_inverted() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let panel = doc.append(&body, "section");
    doc.set_base_style(&panel, StyleProperty::BackgroundColor, "rgb(250, 250, 250)");

    let mut engine = engine(doc);
    engine.enable();
    let panel_bg = extract::parse(&inline(&engine, &panel, StyleProperty::BackgroundColor)).unwrap();

    let message = engine.document_mut().create_element("div");
    let text = engine.document_mut().append(&message, "span");
    engine
        .document_mut()
        .set_base_style(&text, StyleProperty::Color, "rgb(90, 90, 90)");
    engine.document_mut().append_child(&panel, &message);
    flush(&mut engine);

    let color = extract::parse(&inline(&engine, &text, StyleProperty::Color)).unwrap();
    assert!(contrast_ratio(color.opaque(), panel_bg.opaque()) >= 4.5);
    assert!(engine.cache().contains(engine.document().element_id(&message)));

    engine.disable();
    assert_eq!(inline(&engine, &text, StyleProperty::Color), "");
}

#[test]
fn test_class_change_moves_element_into_dynamic_context() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let list = doc.append(&body, "ul");
    let item = doc.append(&list, "li");
    doc.add_class(&item, "chat-item");
    doc.add_rule(".chat-item", StyleProperty::Color, "rgb(20, 20, 20)");
    doc.add_rule(".chat-item.active", StyleProperty::BackgroundColor, "rgb(230, 230, 230)");
    doc.add_rule(".chat-item.active", StyleProperty::Color, "rgb(0, 90, 200)");

    let mut engine = engine(doc);
    engine.enable();
    let id = engine.document().element_id(&item);
    assert!(!engine.cache().get(id).unwrap().is_dynamic());
    assert_eq!(inline(&engine, &item, StyleProperty::BackgroundColor), "");
    let static_color = inline(&engine, &item, StyleProperty::Color);
    assert_ne!(static_color, "");

    engine.document_mut().add_class(&item, "active");
    flush(&mut engine);
    assert!(engine.cache().get(id).unwrap().is_dynamic());
    assert_eq!(
        inline(&engine, &item, StyleProperty::BackgroundColor),
        "rgb(25, 25, 25)"
    );
    // recomputed from the rule color, not from the statically inverted inline value
    let highlight_bg = invert_lightness(Rgba::rgb(230, 230, 230));
    let expected = ContrastSearch::default().adjust(invert_lightness(Rgba::rgb(0, 90, 200)), highlight_bg);
    let active_color = inline(&engine, &item, StyleProperty::Color);
    assert_eq!(active_color, extract::serialize(expected));
    assert_ne!(active_color, static_color);
    let parsed = extract::parse(&active_color).unwrap();
    assert!(contrast_ratio(parsed.opaque(), highlight_bg.opaque()) >= 4.5);

    engine.document_mut().remove_class(&item, "active");
    flush(&mut engine);
    assert!(!engine.cache().get(id).unwrap().is_dynamic());
    assert_eq!(inline(&engine, &item, StyleProperty::BackgroundColor), "");
    assert_eq!(inline(&engine, &item, StyleProperty::Color), static_color);

    engine.disable();
    assert_eq!(inline(&engine, &item, StyleProperty::Color), "");
}

#[test]
fn test_dark_text_on_light_panel_stays_readable() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let panel = doc.append(&body, "div");
    doc.set_base_style(&panel, StyleProperty::BackgroundColor, "rgb(245, 245, 245)");
    let text = doc.append(&panel, "p");
    doc.set_base_style(&text, StyleProperty::Color, "rgb(20, 20, 20)");

    let mut engine = engine(doc);
    engine.enable();
    let bg = extract::parse(&inline(&engine, &panel, StyleProperty::BackgroundColor)).unwrap();
    let color = extract::parse(&inline(&engine, &text, StyleProperty::Color)).unwrap();
    assert!(bg.luminance() < 0.05);
    assert!(contrast_ratio(color.opaque(), bg.opaque()) >= 4.5);

    engine.disable();
    assert_eq!(inline(&engine, &text, StyleProperty::Color), "");
    assert_eq!(inline(&engine, &panel, StyleProperty::BackgroundColor), "");
}

#[test]
fn test_dynamic_element_tracks_rule_changes_across_enables() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let radio = doc.append(&body, "label");
    doc.add_class(&radio, "el-radio");
    doc.add_class(&radio, "is-checked");
    doc.add_rule(".el-radio", StyleProperty::BorderTopColor, "rgb(220, 220, 220)");

    let mut engine = engine(doc);
    engine.enable();
    let before = inline(&engine, &radio, StyleProperty::BorderTopColor);
    engine.disable();

    engine
        .document_mut()
        .add_rule(".el-radio", StyleProperty::BorderTopColor, "rgb(200, 200, 200)");
    engine.enable();
    let after = inline(&engine, &radio, StyleProperty::BorderTopColor);
    assert_ne!(before, after);
    assert_eq!(after, "rgb(55, 55, 55)");
}

#[test]
fn test_custom_dynamic_context() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let live = doc.append(&body, "div");
    doc.set_id(&live, "live");

    let mut engine = engine(doc).with_dynamic_context(DynamicContext::custom(
        |doc: &MemoryDocument, el: &NodeRef| doc.closest(el, "#live"),
    ));
    engine.enable();

    let id = engine.document().element_id(&live);
    assert!(engine.cache().get(id).unwrap().is_dynamic());
}

#[test]
fn test_removed_subtree_is_evicted() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let outer = doc.append(&body, "div");
    let inner = doc.append(&outer, "p");

    let mut engine = engine(doc);
    engine.enable();
    let outer_id = engine.document().element_id(&outer);
    let inner_id = engine.document().element_id(&inner);
    assert!(engine.cache().contains(inner_id));

    engine.document_mut().remove(&outer);
    flush(&mut engine);
    assert!(!engine.cache().contains(outer_id));
    assert!(!engine.cache().contains(inner_id));
}

#[test]
fn test_reinserted_subtree_is_inverted_from_original_style() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let panel = doc.append(&body, "section");
    doc.set_base_style(&panel, StyleProperty::BackgroundColor, "rgb(250, 250, 250)");

    let mut engine = engine(doc);
    engine.enable();
    let inverted = inline(&engine, &panel, StyleProperty::BackgroundColor);
    assert_eq!(inverted, "rgb(5, 5, 5)");

    engine.document_mut().remove(&panel);
    flush(&mut engine);
    assert!(!engine.cache().contains(engine.document().element_id(&panel)));
    assert_eq!(inline(&engine, &panel, StyleProperty::BackgroundColor), "");

    engine.document_mut().append_child(&body, &panel);
    flush(&mut engine);
    assert_eq!(inline(&engine, &panel, StyleProperty::BackgroundColor), inverted);

    engine.disable();
    assert_eq!(inline(&engine, &panel, StyleProperty::BackgroundColor), "");
}

#[test]
fn test_detached_nodes_are_not_tracked_again() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let item = doc.append(&body, "li");
    let label = doc.append(&item, "span");
    doc.set_base_style(&label, StyleProperty::Color, "rgb(40, 40, 40)");

    let mut engine = engine(doc);
    engine.enable();
    let tracked = engine.cache().len();
    assert!(engine.cache().contains(engine.document().element_id(&label)));

    // the class change is reported in the same batch as the removal
    engine.document_mut().remove(&item);
    let mut batch = engine.document_mut().take_records();
    batch.push(MutationRecord::class_changed(item));
    engine.handle_mutations(&batch);

    assert!(!engine.document().is_connected(&item));
    assert!(!engine.cache().contains(engine.document().element_id(&item)));
    assert!(!engine.cache().contains(engine.document().element_id(&label)));
    assert_eq!(engine.cache().len(), tracked - 2);
    assert_eq!(inline(&engine, &label, StyleProperty::Color), "");
}

#[test]
fn test_node_added_and_removed_in_one_batch_is_skipped() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let mut engine = engine(doc);
    engine.enable();
    let tracked = engine.cache().len();

    let toast = engine.document_mut().append(&body, "div");
    engine
        .document_mut()
        .set_base_style(&toast, StyleProperty::Color, "rgb(10, 10, 10)");
    engine.document_mut().remove(&toast);
    flush(&mut engine);

    assert!(!engine.cache().contains(engine.document().element_id(&toast)));
    assert_eq!(engine.cache().len(), tracked);
    assert_eq!(inline(&engine, &toast, StyleProperty::Color), "");
}

#[test]
fn test_full_scan_prunes_elements_removed_while_disabled() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let gone = doc.append(&body, "div");
    let kept = doc.append(&body, "div");

    let mut engine = engine(doc);
    engine.enable();
    engine.disable();
    engine.document_mut().remove(&gone);
    assert!(engine.document_mut().take_records().is_empty());

    engine.enable();
    assert!(!engine.cache().contains(engine.document().element_id(&gone)));
    assert!(engine.cache().contains(engine.document().element_id(&kept)));
}

#[test]
fn test_other_attribute_changes_are_ignored() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let el = doc.append(&body, "div");

    let mut engine = engine(doc);
    engine.enable();
    let before = engine.cache().clone();
    let color = inline(&engine, &el, StyleProperty::Color);

    engine.handle_mutations(&[MutationRecord::Attributes {
        target: el,
        name: "style".to_string(),
    }]);
    assert_eq!(engine.cache().len(), before.len());
    assert_eq!(inline(&engine, &el, StyleProperty::Color), color);
}

#[test]
fn test_storage_failures_do_not_break_toggling() {
    init_tracing();
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let el = doc.append(&body, "div");

    let mut engine = InversionEngine::new(doc, BrokenStore, InvertConfig::default());
    engine.mount();
    assert!(!engine.is_inverted());

    engine.toggle();
    assert!(engine.is_inverted());
    assert_ne!(engine.document().inline_style(&el, StyleProperty::Color), "");
    engine.toggle();
    assert!(!engine.is_inverted());
    assert_eq!(engine.document().inline_style(&el, StyleProperty::Color), "");
}

#[test]
fn test_null_store_never_restores() {
    let mut engine = InversionEngine::new(MemoryDocument::new(), NullStore, InvertConfig::default());
    engine.enable();
    drop(engine);

    let mut engine = InversionEngine::new(MemoryDocument::new(), NullStore, InvertConfig::default());
    engine.mount();
    assert!(!engine.is_inverted());
}

#[test]
fn test_unrecognized_stored_value_means_no_choice() {
    let store = MemoryStore::new().with("aiTutorThemeInverted", "maybe");
    let mut engine = InversionEngine::new(MemoryDocument::new(), store, InvertConfig::default());
    engine.mount();
    assert!(!engine.is_inverted());
}

#[test]
fn test_missing_root_only_flips_state() {
    init_tracing();
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    doc.remove(&body);
    let config = InvertConfig::default().with_root_selector("#app");

    let mut engine = InversionEngine::new(doc, MemoryStore::new(), config);
    engine.enable();
    assert!(engine.is_inverted());
    assert!(!engine.is_watching());
    assert!(engine.cache().is_empty());
    assert_eq!(engine.document().inline_writes(), 0);
    assert_eq!(engine.store().value("aiTutorThemeInverted"), Some("1"));

    engine.disable();
    assert!(!engine.is_inverted());
    assert_eq!(engine.document().inline_writes(), 0);
}

#[test]
fn test_unmatched_root_selector_falls_back_to_body() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let el = doc.append(&body, "div");
    let config = InvertConfig::default().with_root_selector("#app");

    let mut engine = InversionEngine::new(doc, MemoryStore::new(), config);
    engine.enable();
    let root = engine.document().root();
    assert!(!engine.cache().contains(engine.document().element_id(&root)));
    assert!(engine.cache().contains(engine.document().element_id(&el)));
}

#[test]
fn test_custom_storage_key() {
    let config = InvertConfig::default().with_storage_key("darkMode");
    let mut engine = InversionEngine::new(MemoryDocument::new(), MemoryStore::new(), config);
    engine.enable();
    assert_eq!(engine.store().value("darkMode"), Some("1"));
    assert_eq!(engine.store().value("aiTutorThemeInverted"), None);
}

#[test]
fn test_listeners_observe_toggle_sequence() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut engine = engine(MemoryDocument::new());
    let sink = Rc::clone(&seen);
    engine.on_change(move |inverted| sink.borrow_mut().push(inverted));

    engine.toggle();
    engine.toggle();
    engine.toggle();
    assert_eq!(*seen.borrow(), vec![true, false, true]);
}

#[test]
fn test_queue_drain_applies_batches_in_order() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let mut engine = engine(doc);
    engine.enable();

    let mut queue = MutationQueue::new();
    let first = engine.document_mut().append(&body, "div");
    queue.push(engine.document_mut().take_records());
    engine.document_mut().remove(&first);
    queue.push(engine.document_mut().take_records());
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.drain(&mut engine), 2);
    assert!(queue.is_empty());
    assert!(!engine.cache().contains(engine.document().element_id(&first)));
}

#[test]
fn test_svg_elements_are_themed() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let icon = doc.append_svg(&body, "svg");
    let path = doc.append_svg(&icon, "path");
    doc.set_base_style(&path, StyleProperty::Fill, "rgb(30, 30, 30)");

    let mut engine = engine(doc);
    engine.enable();
    assert_eq!(
        inline(&engine, &icon, StyleProperty::Filter),
        "invert(1) hue-rotate(180deg)"
    );
    assert_eq!(inline(&engine, &path, StyleProperty::Fill), "rgb(225, 225, 225)");
}

#[cfg(feature = "native")]
#[test]
fn test_file_store_survives_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut first = InversionEngine::new(
        MemoryDocument::new(),
        FileStore::new(&path),
        InvertConfig::default(),
    );
    first.enable();
    drop(first);

    let mut second = InversionEngine::new(
        MemoryDocument::new(),
        FileStore::new(&path),
        InvertConfig::default(),
    );
    assert!(!second.is_inverted());
    second.mount();
    assert!(second.is_inverted());
}
