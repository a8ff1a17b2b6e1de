#![cfg(target_arch = "wasm32")]

use wasm_bindgen::prelude::*;

use crate::host::DomHost;
use crate::{HeroConfig, HeroVisualization};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}

/// Mounted visualization handed to JavaScript.
#[wasm_bindgen]
pub struct HeroHandle {
    visualization: Option<HeroVisualization<DomHost>>,
}

#[wasm_bindgen]
impl HeroHandle {
    /// Stops the animation, removes the canvas and the listeners.
    pub fn unmount(&mut self) {
        if let Some(visualization) = self.visualization.take() {
            visualization.unmount();
        }
    }

    #[wasm_bindgen(getter, js_name = isMounted)]
    pub fn is_mounted(&self) -> bool {
        self.visualization.is_some()
    }
}

/// Mounts the hero visualization into the element with id `container_id`.
///
/// Returns `undefined` when the element does not exist or setup fails; the
/// failure is logged and the page keeps working without the background.
#[wasm_bindgen(js_name = mountHero)]
pub fn mount_hero(container_id: &str) -> Option<HeroHandle> {
    let host = DomHost::new(container_id);
    match HeroVisualization::mount(host, &HeroConfig::default()) {
        Ok(Some(visualization)) => Some(HeroHandle {
            visualization: Some(visualization),
        }),
        Ok(None) => {
            log::warn!("#{container_id} not found; hero visualization skipped");
            None
        }
        Err(err) => {
            log::error!("hero visualization failed to start: {err}");
            None
        }
    }
}
