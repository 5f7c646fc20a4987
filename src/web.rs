//! Browser host: DOM listeners, pointer lock, the Gamepad API, fetch-backed
//! body loading and the two requestAnimationFrame loops.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Document, Event, HtmlCanvasElement, HtmlElement, KeyboardEvent, MouseEvent, Response,
    VisibilityState, Window,
};

use crate::config::Tuning;
use crate::controller::events::Signal;
use crate::controller::gamepad::{GamepadSnapshot, GamepadSource};
use crate::controller::physics::BoxWorld;
use crate::controller::pointer::PointerCapture;
use crate::error::{AssetError, DeviceError};
use crate::frame_loop::AvatarCore;
use crate::logging;
use crate::model::{AssetLoader, AssetRequest, Camera, LoadedBody, Scene};

thread_local! {
    static CORE: RefCell<Option<Rc<AvatarCore>>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    logging::init();
    let (window, document, canvas) = init_canvas(800, 600)?;
    setup_app(&window, &document, &canvas)
}

fn setup_app(window: &Window, document: &Document, canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
    let mut scene = Scene::with_camera(Camera::new(canvas.width(), canvas.height()));
    scene.spawn_point = Some(glam::Vec3::ZERO);

    let core = Rc::new(AvatarCore::new(
        Tuning::default(),
        Rc::new(RefCell::new(scene)),
        Box::new(WebPointerCapture { document: document.clone() }),
        Rc::new(BoxWorld::new().with_floor(0.0)),
        Rc::new(FetchAssetLoader::new("assets")),
    ));
    core.start();

    setup_input_listeners(document, window, canvas, core.clone())?;

    // Render-rate loop: rig integration and footsteps
    let mut frames = core.frame_loop();
    let performance = window.performance();
    RcCellCallback::new(window.clone(), move || {
        let now = performance.as_ref().map(|p| p.now()).unwrap_or(0.0);
        frames.update(now);
    })
    .start();

    // Gamepad polling on its own repaint-scheduled loop
    let source = WebGamepadSource { window: window.clone() };
    let pad_core = core.clone();
    RcCellCallback::new(window.clone(), move || pad_core.poll_gamepad(&source)).start();

    CORE.with(|slot| *slot.borrow_mut() = Some(core));
    tracing::info!("avatar rig running");
    Ok(())
}

fn with_core(f: impl FnOnce(&AvatarCore)) {
    CORE.with(|slot| {
        if let Some(core) = slot.borrow().as_ref() {
            f(core);
        }
    });
}

/// Called by page UI when a modal surface opens.
#[wasm_bindgen]
pub fn modal_opened(reason: String) {
    with_core(|core| core.bus.publish(Signal::ModalOpened { reason }));
}

#[wasm_bindgen]
pub fn modal_closed(reason: String) {
    with_core(|core| core.bus.publish(Signal::ModalClosed { reason }));
}

#[wasm_bindgen]
pub fn set_movement_enabled(enabled: bool) {
    with_core(|core| core.rig.borrow_mut().enable_movement(enabled));
}

fn is_text_field(document: &Document) -> bool {
    document
        .active_element()
        .map(|el| matches!(el.tag_name().as_str(), "INPUT" | "TEXTAREA" | "SELECT"))
        .unwrap_or(false)
}

fn setup_input_listeners(
    document: &Document,
    window: &Window,
    canvas: &HtmlCanvasElement,
    core: Rc<AvatarCore>,
) -> Result<(), JsValue> {
    // Keyboard down
    {
        let core = core.clone();
        let doc = document.clone();
        let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            let code = e.code();
            let text_capture = is_text_field(&doc);

            if core.input.borrow().is_release_pointer(&code) {
                core.pointer.borrow_mut().request_unlock();
            }

            let mut input = core.input.borrow_mut();
            input.set_text_capture(text_capture);
            input.on_key_down(&code);
            drop(input);

            if !text_capture
                && matches!(
                    code.as_str(),
                    "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight" | "Tab" | "Space"
                )
            {
                e.prevent_default();
            }
        }) as Box<dyn FnMut(KeyboardEvent)>);
        document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
        keydown.forget();
    }

    // Keyboard up
    {
        let core = core.clone();
        let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            core.input.borrow_mut().on_key_up(&e.code());
        }) as Box<dyn FnMut(KeyboardEvent)>);
        document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
        keyup.forget();
    }

    // Focus loss - clear all keys
    {
        let core = core.clone();
        let blur = Closure::wrap(Box::new(move |_e: Event| {
            core.input.borrow_mut().clear_held();
        }) as Box<dyn FnMut(Event)>);
        window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
        blur.forget();
    }

    // Visibility change - clear keys when hidden, reconcile capture when shown
    {
        let core = core.clone();
        let doc = document.clone();
        let visibility = Closure::wrap(Box::new(move |_e: Event| {
            if doc.visibility_state() == VisibilityState::Visible {
                core.pointer.borrow_mut().on_visible();
            } else {
                core.input.borrow_mut().clear_held();
            }
        }) as Box<dyn FnMut(Event)>);
        document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
        visibility.forget();
    }

    // Pointer lock change
    {
        let core = core.clone();
        let plc = Closure::wrap(Box::new(move |_e: Event| {
            core.pointer.borrow_mut().on_platform_lock_change();
        }) as Box<dyn FnMut(Event)>);
        document.add_event_listener_with_callback("pointerlockchange", plc.as_ref().unchecked_ref())?;
        plc.forget();
    }

    // Canvas click to enter pointer lock
    {
        let core = core.clone();
        let click = Closure::wrap(Box::new(move |_e: MouseEvent| {
            core.pointer.borrow_mut().on_surface_click();
        }) as Box<dyn FnMut(MouseEvent)>);
        canvas.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
        click.forget();
    }

    // Mouse move
    {
        let core = core.clone();
        let mm = Closure::wrap(Box::new(move |e: MouseEvent| {
            let dx = e.movement_x() as f32;
            let dy = e.movement_y() as f32;
            core.rig.borrow_mut().on_pointer_move(dx, dy);
        }) as Box<dyn FnMut(MouseEvent)>);
        document.add_event_listener_with_callback("mousemove", mm.as_ref().unchecked_ref())?;
        mm.forget();
    }

    Ok(())
}

/// Pointer lock on the document, targeting the first canvas.
struct WebPointerCapture {
    document: Document,
}

impl PointerCapture for WebPointerCapture {
    fn is_captured(&self) -> bool {
        self.document.pointer_lock_element().is_some()
    }

    fn request_capture(&self) {
        let canvas = self
            .document
            .query_selector("canvas")
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlElement>().ok());
        match canvas {
            Some(el) => el.request_pointer_lock(),
            None => tracing::warn!("no canvas to capture the pointer on"),
        }
    }

    fn release_capture(&self) {
        self.document.exit_pointer_lock();
    }
}

struct WebGamepadSource {
    window: Window,
}

impl GamepadSource for WebGamepadSource {
    fn gamepads(&self) -> Result<Vec<GamepadSnapshot>, DeviceError> {
        let navigator = self.window.navigator();
        // Insecure contexts and some embedded webviews lack the Gamepad API
        let supported = js_sys::Reflect::has(&navigator, &JsValue::from_str("getGamepads")).unwrap_or(false);
        if !supported {
            return Err(DeviceError::Unavailable);
        }
        let pads = navigator
            .get_gamepads()
            .map_err(|e| DeviceError::Query(format!("{e:?}")))?;

        let mut out = Vec::new();
        for entry in pads.iter() {
            // Empty slots come back as null
            let Ok(pad) = entry.dyn_into::<web_sys::Gamepad>() else {
                continue;
            };
            let axes = pad
                .axes()
                .iter()
                .map(|a| a.as_f64().unwrap_or(0.0) as f32)
                .collect();
            let buttons = pad
                .buttons()
                .iter()
                .map(|b| {
                    b.dyn_into::<web_sys::GamepadButton>()
                        .map(|b| b.pressed())
                        .unwrap_or(false)
                })
                .collect();
            out.push(GamepadSnapshot { id: pad.id(), connected: pad.connected(), axes, buttons });
        }
        Ok(out)
    }
}

/// Loads `<base>/<name>.json` body manifests over fetch.
pub struct FetchAssetLoader {
    base: String,
}

impl FetchAssetLoader {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into().trim_end_matches('/').to_string() }
    }
}

impl AssetLoader for FetchAssetLoader {
    fn load(&self, name: &str) -> AssetRequest {
        let (resolver, request) = AssetRequest::pending();
        let url = format!("{}/{}.json", self.base, name);
        wasm_bindgen_futures::spawn_local(async move {
            let result = fetch_body(&url).await;
            if let Err(e) = &result {
                tracing::debug!(%url, "body fetch failed: {e}");
            }
            resolver.resolve(result);
        });
        request
    }
}

async fn fetch_body(url: &str) -> Result<LoadedBody, AssetError> {
    let window = web_sys::window().ok_or_else(|| AssetError::Fetch("no window".into()))?;
    let resp = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| AssetError::Fetch(format!("{e:?}")))?;
    let resp: Response = resp
        .dyn_into()
        .map_err(|_| AssetError::Fetch("not a Response".into()))?;
    if resp.status() == 404 {
        return Err(AssetError::NotFound(url.to_string()));
    }
    if !resp.ok() {
        return Err(AssetError::Fetch(format!("HTTP {}", resp.status())));
    }
    let text = resp.text().map_err(|e| AssetError::Fetch(format!("{e:?}")))?;
    let text = JsFuture::from(text)
        .await
        .map_err(|e| AssetError::Fetch(format!("{e:?}")))?
        .as_string()
        .ok_or_else(|| AssetError::Fetch("body is not text".into()))?;
    LoadedBody::from_manifest(&text)
}

fn init_canvas(width: u32, height: u32) -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
    let window = web_sys::window().ok_or(js_error("no global `window`"))?;
    let document = window.document().ok_or(js_error("no document on window"))?;
    let body = document.body().ok_or(js_error("no body on document"))?;
    let canvas_el = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| js_error("failed to create canvas"))?;
    canvas_el.set_width(width);
    canvas_el.set_height(height);
    body.append_child(&canvas_el)?;
    Ok((window, document, canvas_el))
}

fn js_error<E: Into<String>>(msg: E) -> JsValue {
    JsValue::from_str(&msg.into())
}

type FrameClosure = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// Runs a callback on every animation frame for the life of the page.
struct RcCellCallback {
    inner: Rc<RefCell<Box<dyn FnMut()>>>,
    window: Window,
}

impl RcCellCallback {
    fn new(window: Window, f: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Box::new(f))),
            window,
        }
    }

    fn start(self) {
        let inner = self.inner.clone();
        let window = self.window.clone();

        let callback: FrameClosure = Rc::new(RefCell::new(None));
        let callback_clone = callback.clone();

        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            inner.borrow_mut().as_mut()();

            // Recursively schedule next frame
            schedule(&window, &callback_clone);
        }) as Box<dyn FnMut()>));

        schedule(&self.window, &callback);

        // Leak the closure to keep it alive
        std::mem::forget(callback);
    }
}

fn schedule(window: &Window, callback: &FrameClosure) {
    if let Some(cb) = callback.borrow().as_ref() {
        if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
            tracing::error!("requestAnimationFrame failed: {e:?}");
        }
    }
}
