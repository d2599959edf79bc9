use hs_core::dom::Document;
use hs_wasm::{is_initialized, load_database, process_page, urls_to_block_report, BrowserDocument};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn mount(html: &str) {
    let document = web_sys::window().unwrap().document().unwrap();
    let body = document.body().unwrap();
    body.set_inner_html(html);
}

#[wasm_bindgen_test]
fn browser_document_queries_and_styles() {
    mount(r#"<div class="promo" style="position: fixed">Win</div><p>Text</p>"#);
    let doc = BrowserDocument::current().unwrap();

    let promos = doc.query_selector_all(".promo").unwrap();
    assert_eq!(promos.len(), 1);
    assert_eq!(doc.computed_style(&promos[0], "position").unwrap(), "fixed");
    assert!(doc.is_html_element(&promos[0]));

    let paragraphs = doc.evaluate_xpath("//p").unwrap();
    assert_eq!(doc.text_content(&paragraphs[0]), "Text");
    assert!(doc.query_selector_all("div[[").is_err());
}

#[wasm_bindgen_test]
fn loaded_database_hides_and_queues() {
    mount(r#"<div class="ad-slot">Ad</div><main>Claim your free gift</main>"#);
    let raw = r###"[
        {"r": "##.ad-slot", "s": null, "t": "adserver"},
        {"r": "#?#main:has-text(/free gift/)", "s": true, "t": "scam", "id": "8"}
    ]"###;
    load_database(raw, None).unwrap();
    assert!(is_initialized());

    process_page("https://giveaway.example/").unwrap();

    let doc = BrowserDocument::current().unwrap();
    assert!(doc.query_selector_all(".ad-slot").unwrap().is_empty());
    let report = urls_to_block_report().unwrap();
    assert!(report.dyn_ref::<js_sys::Object>().is_some());
}
