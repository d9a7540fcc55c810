#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod utils;
pub mod animator;
pub mod scene;
#[cfg(target_arch = "wasm32")]
mod renderer;


#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn dummy_main() {
}


#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn run() {
    utils::set_panic_hook();
    renderer::main().await;
}
