use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, error};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Element, HtmlCanvasElement, HtmlElement, MouseEvent, WheelEvent};

use super::config::TopologyConfig;
use super::environment::Environment;
use super::events::TopologyEvent;
use super::interaction;
use super::model::Database;
use super::notifications::Notifications;
use super::render::{self, RenderState};
use super::router::{EventRouter, PointerEvent, Source, Target};
use super::topology::Topology;
use super::viewport::{Dimensions, PageMetrics, ViewportHost};

/// Frame step fed to the simulation, in seconds.
const FRAME: f32 = 0.016;

/// Measures the page around the canvas and sizes it.
struct PageHost {
	canvas: HtmlCanvasElement,
}

fn offset_height(element: Element) -> Option<f64> {
	element
		.dyn_into::<HtmlElement>()
		.ok()
		.map(|e| e.offset_height() as f64)
}

fn set_style_size(element: &HtmlElement, dimensions: Dimensions) {
	let style = element.style();
	let _ = style.set_property("width", &format!("{}px", dimensions.width));
	let _ = style.set_property("height", &format!("{}px", dimensions.height));
}

impl ViewportHost for PageHost {
	fn page_metrics(&self) -> Option<PageMetrics> {
		self.canvas.parent_element()?;
		let window = web_sys::window()?;
		let document = window.document()?;
		let window_height = window.inner_height().ok()?.as_f64()?;
		let navbar = document
			.query_selector(".navbar")
			.ok()
			.flatten()
			.and_then(offset_height);
		let viewport_width = document
			.get_element_by_id("viewport")
			.and_then(|v| window.get_computed_style(&v).ok().flatten())
			.and_then(|style| style.get_property_value("width").ok())
			.and_then(|width| width.trim_end_matches("px").parse::<f64>().ok());
		Some(PageMetrics {
			container_height: Some(window_height - navbar.unwrap_or(0.0) - 1.0),
			has_header: navbar.is_some(),
			bottom_navbar_height: document
				.query_selector(".bottom-navbar")
				.ok()
				.flatten()
				.and_then(offset_height),
			viewport_width,
		})
	}

	fn set_wrapper_size(&mut self, dimensions: Dimensions) {
		if let Some(wrapper) = self
			.canvas
			.parent_element()
			.and_then(|p| p.dyn_into::<HtmlElement>().ok())
		{
			set_style_size(&wrapper, dimensions);
		}
	}

	fn set_surface_size(&mut self, dimensions: Dimensions) {
		self.canvas.set_width(dimensions.width as u32);
		self.canvas.set_height(dimensions.height as u32);
	}

	fn set_zoom_plane_size(&mut self, dimensions: Dimensions) {
		set_style_size(&self.canvas, dimensions);
	}
}

/// Pointer bookkeeping needed to turn raw mouse events into the scene's
/// enter/leave, drag and click events.
#[derive(Default)]
struct PointerTrack {
	down: Option<Target>,
	hovered: Option<String>,
	status: Option<String>,
}

struct Wiring {
	topo: Rc<RefCell<Topology>>,
	router: EventRouter,
	on_event: Option<Callback<TopologyEvent>>,
}

impl Wiring {
	fn dispatch(&self, source: Source, event: &str, ev: &PointerEvent) {
		self.router
			.dispatch(&mut self.topo.borrow_mut(), source, event, ev);
	}

	/// Process fired events and hand them to the application.
	fn deliver(&self) {
		let events = self.topo.borrow_mut().process();
		if events.is_empty() {
			return;
		}
		self.router
			.relay(&mut self.topo.borrow_mut(), &events, js_sys::Date::now());
		if let Some(on_event) = self.on_event {
			for event in events {
				on_event.run(event);
			}
		}
		// Listeners may have changed the database.
		self.topo.borrow_mut().update();
	}

	fn app(&self, event: &str) {
		self.dispatch(Source::App, event, &PointerEvent::app(js_sys::Date::now()));
		self.deliver();
	}
}

fn pointer(canvas: &HtmlCanvasElement, ev: &MouseEvent) -> (f64, f64) {
	let rect = canvas.get_bounding_client_rect();
	(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	)
}

/// Synthesize enter/leave and over/out as the pointer crosses services.
fn track_hover(wiring: &Wiring, track: &mut PointerTrack, ev: &PointerEvent) {
	let service = match &ev.target {
		Target::Service(id) | Target::ServiceStatus(id) => Some(id.clone()),
		_ => None,
	};
	if service != track.hovered {
		if let Some(old) = track.hovered.take() {
			let leave = PointerEvent::new(Target::Service(old), ev.screen, ev.time_ms);
			wiring.dispatch(Source::Scene, "mouseleave", &leave);
		}
		if service.is_some() {
			wiring.dispatch(Source::Scene, "mouseenter", ev);
		}
		track.hovered = service;
	}
	let status = match &ev.target {
		Target::ServiceStatus(id) => Some(id.clone()),
		_ => None,
	};
	if status != track.status {
		if let Some(old) = track.status.take() {
			let out = PointerEvent::new(Target::ServiceStatus(old), ev.screen, ev.time_ms);
			wiring.dispatch(Source::Scene, "mouseout", &out);
		}
		if status.is_some() {
			wiring.dispatch(Source::Scene, "mouseover", ev);
		}
		track.status = status;
	}
}

#[component]
pub fn TopologyCanvas(
	db: Rc<RefCell<Database>>,
	env: Rc<dyn Environment>,
	#[prop(optional)] config: Option<TopologyConfig>,
	#[prop(optional)] on_event: Option<Callback<TopologyEvent>>,
	#[prop(optional)] notifications: Option<Notifications>,
) -> impl IntoView {
	let config = config.unwrap_or_else(TopologyConfig::load_from_document);
	let router = match config.validate().and_then(|()| interaction::router()) {
		Ok(router) => router,
		Err(e) => {
			error!("topology: {e}");
			return view! { <div class="topology topology-error">"Topology unavailable"</div> }
				.into_any();
		}
	};

	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let topo = Rc::new(RefCell::new(
		Topology::new(config, db, env.clone()).with_notifications(notifications.unwrap_or_default()),
	));
	let wiring = Rc::new(Wiring {
		topo: topo.clone(),
		router,
		on_event,
	});
	let track = Rc::new(RefCell::new(PointerTrack::default()));
	let anim = Rc::new(RefCell::new(RenderState::default()));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (wiring_init, animate_init, resize_cb_init) =
		(wiring.clone(), animate.clone(), resize_cb.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};
		let ctx: CanvasRenderingContext2d = match canvas.get_context("2d") {
			Ok(Some(ctx)) => match ctx.dyn_into() {
				Ok(ctx) => ctx,
				Err(_) => return,
			},
			_ => {
				debug!("topology: no 2d context, canvas stays blank");
				return;
			}
		};

		wiring_init
			.topo
			.borrow_mut()
			.set_host(Box::new(PageHost { canvas: canvas.clone() }));
		wiring_init.app("resize");
		wiring_init.app("rendered");

		let wiring_resize = wiring_init.clone();
		*resize_cb_init.borrow_mut() = Some(Closure::new(move || wiring_resize.app("resize")));
		if let Some(ref cb) = *resize_cb_init.borrow() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		let (wiring_anim, animate_inner, anim, env) =
			(wiring_init.clone(), animate_init.clone(), anim.clone(), env.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if wiring_anim.topo.borrow().is_torn_down() {
				return;
			}
			{
				let mut topo = wiring_anim.topo.borrow_mut();
				topo.tick(FRAME);
				topo.poll_long_click(js_sys::Date::now());
			}
			if env.poll() > 0 {
				wiring_anim.topo.borrow_mut().update();
			}
			wiring_anim.deliver();
			{
				let topo = wiring_anim.topo.borrow();
				let mut anim = anim.borrow_mut();
				anim.advance(FRAME as f64, topo.state.hovered.as_deref());
				render::render(&topo, &ctx, &anim);
			}
			if let (Some(cb), Some(window)) = (&*animate_inner.borrow(), web_sys::window()) {
				let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let cleanup = StoredValue::new_local((topo.clone(), resize_cb.clone()));
	on_cleanup(move || {
		cleanup.try_with_value(|(topo, resize_cb)| {
			topo.borrow_mut().teardown();
			if let (Some(cb), Some(window)) = (resize_cb.borrow_mut().take(), web_sys::window()) {
				let _ = window.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		});
	});

	let canvas_of = move || -> Option<HtmlCanvasElement> { canvas_ref.get().map(Into::into) };

	let (wiring_md, track_md) = (wiring.clone(), track.clone());
	let on_mousedown = move |ev: MouseEvent| {
		let Some(canvas) = canvas_of() else {
			return;
		};
		let screen = pointer(&canvas, &ev);
		let target = wiring_md.topo.borrow().hit_test(screen);
		let pe = PointerEvent::new(target.clone(), screen, js_sys::Date::now());
		wiring_md.dispatch(Source::Direct, "mousedown", &pe);
		wiring_md.dispatch(Source::Direct, "dragstart", &pe);
		track_md.borrow_mut().down = Some(target);
		wiring_md.deliver();
	};

	let (wiring_mm, track_mm) = (wiring.clone(), track.clone());
	let on_mousemove = move |ev: MouseEvent| {
		let Some(canvas) = canvas_of() else {
			return;
		};
		let screen = pointer(&canvas, &ev);
		let now = js_sys::Date::now();
		let target = wiring_mm.topo.borrow().hit_test(screen);
		let pe = PointerEvent::new(target, screen, now);
		let mut track = track_mm.borrow_mut();
		if let Some(down) = &track.down {
			wiring_mm.dispatch(Source::Direct, "drag", &PointerEvent::new(down.clone(), screen, now));
		} else {
			track_hover(&wiring_mm, &mut track, &pe);
		}
		wiring_mm.dispatch(Source::Scene, "mousemove", &pe);
		wiring_mm.dispatch(Source::App, "pointermove", &pe);
		wiring_mm.deliver();
	};

	let (wiring_mu, track_mu) = (wiring.clone(), track.clone());
	let on_mouseup = move |ev: MouseEvent| {
		let Some(canvas) = canvas_of() else {
			return;
		};
		let screen = pointer(&canvas, &ev);
		let now = js_sys::Date::now();
		let target = wiring_mu.topo.borrow().hit_test(screen);
		let Some(down) = track_mu.borrow_mut().down.take() else {
			return;
		};
		let released = PointerEvent::new(down.clone(), screen, now);
		wiring_mu.dispatch(Source::Direct, "mouseup", &released);
		wiring_mu.dispatch(Source::Direct, "dragend", &released);
		let pe = PointerEvent::new(target.clone(), screen, now);
		wiring_mu.dispatch(Source::App, "pointerup", &pe);
		// Press and release on the same thing is a click.
		if down.service_id() == target.service_id() {
			wiring_mu.dispatch(Source::Scene, "click", &pe);
		}
		wiring_mu.deliver();
	};

	let wiring_dc = wiring.clone();
	let on_dblclick = move |ev: MouseEvent| {
		let Some(canvas) = canvas_of() else {
			return;
		};
		let screen = pointer(&canvas, &ev);
		let target = wiring_dc.topo.borrow().hit_test(screen);
		let pe = PointerEvent::new(target, screen, js_sys::Date::now());
		wiring_dc.dispatch(Source::Scene, "dblclick", &pe);
		wiring_dc.deliver();
	};

	let (wiring_ml, track_ml) = (wiring.clone(), track.clone());
	let on_mouseleave = move |ev: MouseEvent| {
		let Some(canvas) = canvas_of() else {
			return;
		};
		let screen = pointer(&canvas, &ev);
		let now = js_sys::Date::now();
		let mut track = track_ml.borrow_mut();
		if let Some(down) = track.down.take() {
			let released = PointerEvent::new(down, screen, now);
			wiring_ml.dispatch(Source::Direct, "mouseup", &released);
			wiring_ml.dispatch(Source::Direct, "dragend", &released);
		}
		track_hover(&wiring_ml, &mut track, &PointerEvent::new(Target::Background, screen, now));
		wiring_ml.deliver();
	};

	let wiring_wh = wiring.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some(canvas) = canvas_of() else {
			return;
		};
		let screen = pointer(&canvas, &ev);
		let mut pe = PointerEvent::new(Target::Background, screen, js_sys::Date::now());
		pe.wheel_delta = ev.delta_y();
		wiring_wh.dispatch(Source::App, "wheel", &pe);
		wiring_wh.deliver();
	};

	let (wiring_zi, wiring_zo) = (wiring.clone(), wiring.clone());

	view! {
		<div class="topology">
			<canvas
				node_ref=canvas_ref
				class="topology-canvas zoom-plane"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:dblclick=on_dblclick
				on:mouseleave=on_mouseleave
				on:wheel=on_wheel
				style="display: block; cursor: grab;"
			/>
			<div class="zoom-controls">
				<button class="zoom-in" on:click=move |_| wiring_zi.app("zoom_in")>"+"</button>
				<button class="zoom-out" on:click=move |_| wiring_zo.app("zoom_out")>"−"</button>
			</div>
		</div>
	}
	.into_any()
}
