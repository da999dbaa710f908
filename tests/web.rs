//! Smoke tests for the exported wasm API, run with `wasm-pack test --headless`
#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn formats_bubble_durations() {
    assert_eq!(moco_bx::format_duration(3661.0, true, true), "1:01:01");
    assert_eq!(moco_bx::format_duration(3661.0, true, false), "1:01");
    assert_eq!(moco_bx::format_duration(3661.0, false, false), "1.02");
}

#[wasm_bindgen_test]
fn negative_durations_clamp_to_zero() {
    assert_eq!(moco_bx::format_duration(-5.0, true, true), "0:00:00");
}
