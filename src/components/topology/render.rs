use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::annotations::{Intent, LandscapeTarget, landscape_badge};
use super::layout::EdgeVisual;
use super::model::Database;
use super::service_box::ServiceBox;
use super::status_bar::{StatusBar, StatusBarOptions, humanize_number};
use super::topology::Topology;

const BACKGROUND: &str = "#1a1a2e";

/// Animation clocks that live outside the topology: dash flow on pending
/// relations and the hover glow fade.
#[derive(Clone, Debug, Default)]
pub struct RenderState {
	pub flow_time: f64,
	highlight_t: f64,
	/// Service whose glow is fading in or out.
	glowing: Option<String>,
}

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

impl RenderState {
	pub fn advance(&mut self, dt: f64, hovered: Option<&str>) {
		self.flow_time += dt;
		match hovered {
			Some(id) => {
				if self.glowing.as_deref() != Some(id) {
					self.glowing = Some(id.to_string());
					self.highlight_t = 0.0;
				}
				self.highlight_t += (1.0 - self.highlight_t) * 1.8 * dt;
			}
			None => {
				self.highlight_t += (0.0 - self.highlight_t) * 1.26 * dt;
				if self.highlight_t < 0.01 {
					self.highlight_t = 0.0;
					self.glowing = None;
				}
			}
		}
	}

	pub fn glow(&self, id: &str) -> f64 {
		if self.glowing.as_deref() == Some(id) {
			ease_out_cubic(self.highlight_t)
		} else {
			0.0
		}
	}
}

pub fn status_color(status: &str) -> &'static str {
	match status {
		"error" => "#df382c",
		"pending" | "installed" | "allocating" => "#eda913",
		"started" | "running" => "#38b44a",
		_ => "#888888",
	}
}

pub fn render(topo: &Topology, ctx: &CanvasRenderingContext2d, anim: &RenderState) {
	let size = topo.size();
	let t = topo.transform();
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, size.width, size.height);
	ctx.save();
	let _ = ctx.translate(t.x, t.y);
	let _ = ctx.scale(t.k, t.k);
	let edges = topo.edges();
	draw_edges(&edges, t.k, anim, ctx);
	if let Some((from, to)) = topo.dragline() {
		draw_dragline(from, to, t.k, anim, ctx);
	}
	let db = topo.db().borrow();
	for b in topo.boxes().values() {
		draw_service(b, &db, anim, ctx);
	}
	draw_labels(&edges, t.k, ctx);
	ctx.restore();
	draw_menu(topo, ctx);
}

fn dashed(ctx: &CanvasRenderingContext2d, dash: f64, gap: f64, offset: f64) {
	let _ = ctx.set_line_dash(&js_sys::Array::of2(
		&JsValue::from_f64(dash),
		&JsValue::from_f64(gap),
	));
	ctx.set_line_dash_offset(offset);
}

fn solid(ctx: &CanvasRenderingContext2d) {
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_edges(edges: &[EdgeVisual], k: f64, anim: &RenderState, ctx: &CanvasRenderingContext2d) {
	let (dash, gap) = (8.0 / k, 4.0 / k);
	for edge in edges {
		let highlighted = anim.glow(&edge.source).max(anim.glow(&edge.target));
		ctx.set_stroke_style_str(&format!("rgba(100, 180, 255, {})", 0.6 + 0.3 * highlighted));
		ctx.set_line_width((2.0 + highlighted) / k.max(0.5));
		if edge.pending {
			// Unconfirmed relations flow until the environment answers.
			dashed(ctx, dash, gap, -(anim.flow_time * 30.0) % (dash + gap));
		} else {
			solid(ctx);
		}
		ctx.begin_path();
		ctx.move_to(edge.x1, edge.y1);
		ctx.line_to(edge.x2, edge.y2);
		ctx.stroke();
	}
	solid(ctx);
}

fn draw_labels(edges: &[EdgeVisual], k: f64, ctx: &CanvasRenderingContext2d) {
	let font = 11.0 / k.max(0.5);
	ctx.set_font(&format!("{font}px sans-serif"));
	ctx.set_text_align("center");
	for edge in edges {
		let (mx, my) = edge.midpoint();
		let w = edge.label.len() as f64 * font * 0.6 + 10.0;
		ctx.set_fill_style_str("rgba(30, 30, 50, 0.9)");
		ctx.fill_rect(mx - w / 2.0, my - font, w, font * 1.6);
		ctx.set_fill_style_str("rgba(200, 220, 255, 0.9)");
		let _ = ctx.fill_text(&edge.label, mx, my + font * 0.3);
	}
	ctx.set_text_align("start");
}

fn draw_dragline(
	from: (f64, f64),
	to: (f64, f64),
	k: f64,
	anim: &RenderState,
	ctx: &CanvasRenderingContext2d,
) {
	let (dash, gap) = (6.0 / k, 6.0 / k);
	ctx.set_stroke_style_str("rgba(255, 255, 255, 0.8)");
	ctx.set_line_width(2.0 / k);
	dashed(ctx, dash, gap, -(anim.flow_time * 30.0) % (dash + gap));
	ctx.begin_path();
	ctx.move_to(from.0, from.1);
	ctx.line_to(to.0, to.1);
	ctx.stroke();
	solid(ctx);
}

fn draw_glow(ctx: &CanvasRenderingContext2d, (x, y): (f64, f64), radius: f64, t: f64) {
	let glow_radius = radius * (1.1 + 0.25 * t);
	let Ok(gradient) = ctx.create_radial_gradient(x, y, radius * 0.8, x, y, glow_radius) else {
		return;
	};
	let alpha = 0.35 * t;
	let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {alpha})"));
	let _ = gradient.add_color_stop(0.6, &format!("rgba(200, 220, 255, {})", alpha * 0.3));
	let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
	ctx.begin_path();
	let _ = ctx.arc(x, y, glow_radius, 0.0, 2.0 * PI);
	#[allow(deprecated)]
	ctx.set_fill_style(&gradient);
	ctx.fill();
}

fn draw_service(b: &ServiceBox, db: &Database, anim: &RenderState, ctx: &CanvasRenderingContext2d) {
	let (x, y) = b.xy();
	let r = b.w / 2.0;
	let (cx, cy) = (x + r, y + r);
	let t = anim.glow(&b.id);
	if t > 0.01 {
		draw_glow(ctx, (cx, cy), r, t);
	}

	ctx.set_global_alpha(if b.is_pending() { 0.5 } else { 1.0 });
	ctx.begin_path();
	let _ = ctx.arc(cx, cy, r, 0.0, 2.0 * PI);
	ctx.set_fill_style_str(if b.subordinate { "#3a3a5c" } else { "#2b2b45" });
	ctx.fill();
	ctx.set_stroke_style_str(if b.hovered { "#ffffff" } else { "#6c6c9c" });
	ctx.set_line_width(2.0);
	if b.is_pending() {
		dashed(ctx, 10.0, 6.0, 0.0);
	}
	ctx.stroke();
	solid(ctx);

	// Label sizes follow the box: 22px name, 16px charm at a 224px box.
	ctx.set_text_align("center");
	ctx.set_fill_style_str("#ffffff");
	ctx.set_font(&format!("{}px sans-serif", b.h * 22.0 / 224.0));
	let _ = ctx.fill_text(&b.name, cx, y + b.h * 0.25);
	ctx.set_fill_style_str("rgba(255, 255, 255, 0.7)");
	ctx.set_font(&format!("{}px sans-serif", b.h * 16.0 / 224.0));
	let _ = ctx.fill_text(&b.charm, cx, y + b.h * 0.8);

	draw_status(b, ctx);
	ctx.set_global_alpha(1.0);
	ctx.set_text_align("start");
	draw_badges(b, db, ctx);
}

/// Unit health: a status bar across the box and the unit count in the middle.
fn draw_status(b: &ServiceBox, ctx: &CanvasRenderingContext2d) {
	let (x, y) = b.xy();
	let (rx, ry) = b.relative_center();
	let mut bar = StatusBar::new(StatusBarOptions {
		width: b.w * 0.6,
		font_size: b.h / 20.0,
		..Default::default()
	});
	let left = x + b.w * 0.2;
	let top = y + ry + b.h / 6.0 + 4.0;
	for segment in bar.update(&b.status).to_vec() {
		let (sx, sw) = bar.extent(&segment);
		ctx.set_fill_style_str(status_color(&segment.key));
		ctx.fill_rect(left + sx, top, sw, bar.height());
	}

	ctx.begin_path();
	let _ = ctx.arc(x + rx, y + ry, b.w / 6.0, 0.0, 2.0 * PI);
	ctx.set_fill_style_str("#1a1a2e");
	ctx.fill();
	if b.show_unit_count {
		let units: u64 = b.status.values().sum();
		ctx.set_fill_style_str("#ffffff");
		ctx.set_font(&format!("bold {}px sans-serif", b.w / 9.0));
		let _ = ctx.fill_text(&humanize_number(units), x + rx, y + ry + b.w / 27.0);
	}
}

fn draw_badges(b: &ServiceBox, db: &Database, ctx: &CanvasRenderingContext2d) {
	let (x, y) = b.xy();
	let badges = [
		(Intent::Reboot, "#eda913"),
		(Intent::Security, "#df382c"),
	];
	let mut slot = 0.0;
	for (intent, color) in badges {
		if landscape_badge(db, LandscapeTarget::Service(&b.id), intent, Some("round")).is_none() {
			continue;
		}
		ctx.begin_path();
		let _ = ctx.arc(x + b.w * 0.85 - slot, y + b.h * 0.15, b.w / 16.0, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(color);
		ctx.fill();
		slot += b.w / 7.0;
	}
}

fn draw_menu(topo: &Topology, ctx: &CanvasRenderingContext2d) {
	let items = topo.menu_items();
	if items.is_empty() {
		return;
	}
	ctx.set_font("14px sans-serif");
	for (action, rect) in items {
		ctx.set_fill_style_str("rgba(245, 245, 250, 0.95)");
		ctx.fill_rect(rect.x, rect.y, rect.w, rect.h);
		ctx.set_stroke_style_str("#c0c0d0");
		ctx.set_line_width(1.0);
		ctx.stroke_rect(rect.x, rect.y, rect.w, rect.h);
		ctx.set_fill_style_str("#1a1a2e");
		let _ = ctx.fill_text(action.label(), rect.x + 12.0, rect.y + rect.h * 0.65);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn glow_fades_in_and_out() {
		let mut anim = RenderState::default();
		for _ in 0..60 {
			anim.advance(0.016, Some("mysql"));
		}
		let lit = anim.glow("mysql");
		assert!(lit > 0.5);
		assert_eq!(anim.glow("wordpress"), 0.0);

		for _ in 0..600 {
			anim.advance(0.016, None);
		}
		assert_eq!(anim.glow("mysql"), 0.0);
		assert!(anim.flow_time > 10.0);
	}

	#[test]
	fn hovering_another_service_restarts_the_fade() {
		let mut anim = RenderState::default();
		for _ in 0..60 {
			anim.advance(0.016, Some("mysql"));
		}
		anim.advance(0.016, Some("wordpress"));
		assert_eq!(anim.glow("mysql"), 0.0);
		assert!(anim.glow("wordpress") < 0.1);
	}

	#[test]
	fn known_statuses_have_colors() {
		assert_eq!(status_color("error"), "#df382c");
		assert_eq!(status_color("started"), status_color("running"));
		assert_eq!(status_color("mystery"), "#888888");
	}
}
