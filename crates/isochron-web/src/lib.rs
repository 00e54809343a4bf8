#![cfg(target_arch = "wasm32")]
mod audio;

use audio::{AudioContextClock, WebAudioGraph};
use isochron_core::{Clock, PlaybackController, PlaybackStatus, Program, SchedulerConfig};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys as web;

type Controller = PlaybackController<AudioContextClock, WebAudioGraph>;
type TickSlot = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("isochron-web starting");
    Ok(())
}

struct Shared {
    controller: RefCell<Controller>,
    timer: Cell<Option<i32>>,
}

/// Page-facing handle. Create it from a user gesture so the browser lets the
/// audio context run.
#[wasm_bindgen]
pub struct Player {
    audio_ctx: web::AudioContext,
    shared: Rc<Shared>,
    tick: TickSlot,
}

fn audio_context() -> anyhow::Result<web::AudioContext> {
    web::AudioContext::new().map_err(|e| anyhow::anyhow!("AudioContext: {:?}", e))
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
impl Player {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Player, JsValue> {
        let audio_ctx = audio_context().map_err(to_js)?;
        let graph_ctx = audio_ctx.clone();
        let controller = PlaybackController::new(
            AudioContextClock::new(audio_ctx.clone()),
            move |_: &Program| WebAudioGraph::new(&graph_ctx),
        )
        .with_scheduler_config(SchedulerConfig::default());

        let shared = Rc::new(Shared {
            controller: RefCell::new(controller),
            timer: Cell::new(None),
        });
        let tick: TickSlot = Rc::new(RefCell::new(None));
        let weak = Rc::downgrade(&shared);
        let slot = Rc::clone(&tick);
        *tick.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            shared.timer.set(None);
            shared.controller.borrow_mut().tick();
            arm(&shared, &slot);
        }) as Box<dyn FnMut()>));

        Ok(Player {
            audio_ctx,
            shared,
            tick,
        })
    }

    /// Start a program given as JSON (`{"startBeatHz": 7, "stages": [...]}`).
    pub fn start(&self, program_json: &str) -> Result<(), JsValue> {
        let program = Program::from_json_str(program_json).map_err(to_js)?;
        self.play(program)
    }

    #[wasm_bindgen(js_name = startPreset)]
    pub fn start_preset(&self, name: &str) -> Result<(), JsValue> {
        let program = Program::preset(name).map_err(to_js)?;
        self.play(program)
    }

    pub fn stop(&self) {
        self.shared.controller.borrow_mut().stop();
        arm(&self.shared, &self.tick);
    }

    #[wasm_bindgen(js_name = setMuted)]
    pub fn set_muted(&self, muted: bool) {
        self.shared.controller.borrow_mut().set_muted(muted);
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f32) {
        self.shared.controller.borrow_mut().set_volume(volume);
    }

    pub fn elapsed(&self) -> f64 {
        self.shared.controller.borrow().elapsed()
    }

    #[wasm_bindgen(js_name = currentBeat)]
    pub fn current_beat(&self) -> Option<f64> {
        self.shared.controller.borrow().current_beat()
    }

    #[wasm_bindgen(js_name = currentStage)]
    pub fn current_stage(&self) -> Option<u32> {
        self.shared
            .controller
            .borrow()
            .current_stage()
            .map(|i| i as u32)
    }

    #[wasm_bindgen(js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.shared.controller.borrow().is_running()
    }

    /// Human-readable status, e.g. `playing`, `finished` or
    /// `could not start: ...`.
    pub fn status(&self) -> String {
        self.shared.controller.borrow().status().to_string()
    }

    /// JSON of every built-in program, keyed by name.
    pub fn presets() -> Result<String, JsValue> {
        let mut out = Vec::new();
        for name in isochron_core::PRESET_NAMES {
            let json = Program::preset(name)
                .and_then(|p| p.to_json_string())
                .map_err(to_js)?;
            out.push(format!("\"{name}\": {json}"));
        }
        Ok(format!("{{{}}}", out.join(", ")))
    }

    fn play(&self, program: Program) -> Result<(), JsValue> {
        // autoplay policies leave a fresh context suspended until resumed
        if let Ok(promise) = self.audio_ctx.resume() {
            spawn_local(async move {
                if let Err(e) = JsFuture::from(promise).await {
                    log::warn!("[player] resume: {:?}", e);
                }
            });
        }
        let started = self.shared.controller.borrow_mut().start(program);
        arm(&self.shared, &self.tick);
        match started {
            Ok(()) => Ok(()),
            Err(_) => {
                let status = self.shared.controller.borrow().status().clone();
                if let PlaybackStatus::Failed(_) = status {
                    log::error!("[player] {status}");
                }
                Err(to_js(status))
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        disarm(&self.shared);
        self.tick.borrow_mut().take();
    }
}

/// Schedule the next `tick` for the controller's next deadline, replacing
/// any pending timer.
fn arm(shared: &Shared, slot: &TickSlot) {
    disarm(shared);
    let (deadline, now) = {
        let controller = shared.controller.borrow();
        match controller.next_deadline() {
            Some(deadline) => (deadline, controller.clock().now()),
            None => return,
        }
    };
    let Some(window) = web::window() else {
        return;
    };
    let slot = slot.borrow();
    let Some(callback) = slot.as_ref() else {
        return;
    };
    let delay_ms = ((deadline - now) * 1000.0).ceil().max(0.0) as i32;
    match window.set_timeout_with_callback_and_timeout_and_arguments_0(
        callback.as_ref().unchecked_ref::<js_sys::Function>(),
        delay_ms,
    ) {
        Ok(id) => shared.timer.set(Some(id)),
        Err(e) => log::error!("[player] setTimeout: {:?}", e),
    }
}

fn disarm(shared: &Shared) {
    if let Some(id) = shared.timer.take() {
        if let Some(window) = web::window() {
            window.clear_timeout_with_handle(id);
        }
    }
}
