#[cfg(target_arch = "wasm32")]
use leptos::prelude::mount_to_body;

#[cfg(target_arch = "wasm32")]
pub fn main() {
    mount_to_body(ingresso::app::App);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn main() {}
