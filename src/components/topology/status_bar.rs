//! Linear percentage bar for unit status counts, reserving a minimum width so
//! small categories stay visible.

use std::cmp::Ordering;

/// Smallest share, in percent, a non-empty category is drawn with.
const MIN_RESERVE: f64 = 10.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
	pub key: String,
	pub count: u64,
	/// Share of the bar, in percent.
	pub percent: f64,
	/// Left offset, in percent.
	pub start: f64,
}

pub type SegmentOrder = fn(&Segment, &Segment) -> Ordering;

fn by_key(a: &Segment, b: &Segment) -> Ordering {
	a.key.cmp(&b.key)
}

#[derive(Clone, Debug)]
pub struct StatusBarOptions {
	/// Rendered width in pixels.
	pub width: f64,
	/// Label size; the bar is two pixels taller.
	pub font_size: f64,
	pub sort: Option<SegmentOrder>,
}

impl Default for StatusBarOptions {
	fn default() -> Self {
		Self {
			width: 270.0,
			font_size: 16.0,
			sort: Some(by_key),
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct StatusBar {
	pub options: StatusBarOptions,
	segments: Vec<Segment>,
}

impl StatusBar {
	pub fn new(options: StatusBarOptions) -> Self {
		Self {
			options,
			segments: Vec::new(),
		}
	}

	pub fn height(&self) -> f64 {
		self.options.font_size + 2.0
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	pub fn update<'a>(&mut self, data: impl IntoIterator<Item = (&'a String, &'a u64)>) -> &[Segment] {
		self.segments = map_data(
			data.into_iter().map(|(k, v)| (k.as_str(), *v)),
			self.options.sort,
		);
		&self.segments
	}

	/// Pixel offset and width of a segment.
	pub fn extent(&self, segment: &Segment) -> (f64, f64) {
		let scale = self.options.width / 100.0;
		(segment.start * scale, segment.percent * scale)
	}
}

/// Map category counts to bar segments. Zero counts are dropped. Categories
/// below the reserve are widened to it; the width this takes is given back by
/// the categories above the reserve, in proportion to their excess, and the
/// largest category absorbs what rounding leaves so the total is exactly 100.
pub fn map_data<'a>(data: impl IntoIterator<Item = (&'a str, u64)>, sort: Option<SegmentOrder>) -> Vec<Segment> {
	let counts: Vec<(&str, u64)> = data.into_iter().filter(|(_, v)| *v > 0).collect();
	if counts.is_empty() {
		return Vec::new();
	}
	let total: u64 = counts.iter().map(|(_, v)| v).sum();
	let reserve = MIN_RESERVE.min(100.0 / counts.len() as f64);

	let mut result: Vec<Segment> = counts
		.iter()
		.map(|&(key, count)| Segment {
			key: key.to_string(),
			count,
			percent: count as f64 / total as f64 * 100.0,
			start: 0.0,
		})
		.collect();

	let reserved: f64 = result
		.iter()
		.filter(|s| s.percent < reserve)
		.map(|s| reserve - s.percent)
		.sum();
	let excess: f64 = result
		.iter()
		.filter(|s| s.percent > reserve)
		.map(|s| s.percent - reserve)
		.sum();
	for s in &mut result {
		if s.percent < reserve {
			s.percent = reserve;
		} else if excess > 0.0 {
			s.percent -= reserved * (s.percent - reserve) / excess;
		}
	}

	if let Some(order) = sort {
		result.sort_by(order);
	}

	let sum: f64 = result.iter().map(|s| s.percent).sum();
	let max_count = result.iter().map(|s| s.count).max().unwrap_or(0);
	if let Some(largest) = result.iter_mut().find(|s| s.count == max_count) {
		largest.percent += 100.0 - sum;
	}

	let mut start = 0.0;
	for s in &mut result {
		s.start = start;
		start += s.percent;
	}
	result
}

/// Shorten large counts: `1500` → `1.5K`, `2000000` → `2M`.
pub fn humanize_number(n: u64) -> String {
	const UNITS: [(u64, &str); 3] = [(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];
	for (threshold, unit) in UNITS {
		if n > threshold {
			return if n % threshold == 0 {
				format!("{}{unit}", n / threshold)
			} else {
				format!("{:.1}{unit}", n as f64 / threshold as f64)
			};
		}
	}
	n.to_string()
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;

	fn total(segments: &[Segment]) -> f64 {
		segments.iter().map(|s| s.percent).sum()
	}

	#[test]
	fn small_categories_get_the_reserve() {
		let segments = map_data([("error", 4), ("pending", 2), ("running", 1337)], Some(by_key));
		assert_eq!(segments.len(), 3);
		assert!((total(&segments) - 100.0).abs() < 1e-9);
		assert_eq!(segments[0].key, "error");
		assert!((segments[0].percent - MIN_RESERVE).abs() < 1e-9);
		assert!((segments[1].percent - MIN_RESERVE).abs() < 1e-9);
		assert!((segments[2].percent - 80.0).abs() < 1e-9);
		assert!((segments[2].start - 20.0).abs() < 1e-9);
	}

	#[test]
	fn zero_counts_are_dropped() {
		let segments = map_data([("error", 0), ("running", 3)], None);
		assert_eq!(segments.len(), 1);
		assert_eq!(segments[0].key, "running");
		assert_eq!(segments[0].percent, 100.0);
		assert!(map_data([("error", 0)], None).is_empty());
	}

	#[test]
	fn allocation_always_sums_to_one_hundred() {
		let inputs: [&[(&str, u64)]; 5] = [
			&[("a", 1), ("b", 1), ("c", 1)],
			&[("a", 7), ("b", 13), ("c", 1), ("d", 999)],
			&[("a", 15), ("b", 15), ("c", 15), ("d", 15), ("e", 15), ("f", 15), ("g", 3), ("h", 3), ("i", 2), ("j", 2)],
			&[("a", 1); 1],
			&[("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5), ("f", 6), ("g", 7), ("h", 8), ("i", 9), ("j", 10), ("k", 11), ("l", 12)],
		];
		for input in inputs {
			let segments = map_data(input.iter().copied(), Some(by_key));
			assert!((total(&segments) - 100.0).abs() < 1e-9, "{input:?}");
			assert!(segments.iter().all(|s| s.percent > 0.0), "{input:?}");
			let last = segments.last().unwrap();
			assert!((last.start + last.percent - 100.0).abs() < 1e-9);
		}
	}

	#[test]
	fn caller_supplied_order_is_used() {
		let descending: SegmentOrder = |a, b| b.count.cmp(&a.count);
		let segments = map_data([("a", 1), ("b", 5), ("c", 3)], Some(descending));
		let keys: Vec<_> = segments.iter().map(|s| s.key.as_str()).collect();
		assert_eq!(keys, ["b", "c", "a"]);
		assert_eq!(segments[0].start, 0.0);
	}

	#[test]
	fn status_bar_scales_segments_to_pixels() {
		let mut bar = StatusBar::default();
		let data = BTreeMap::from([("running".to_string(), 3u64), ("error".to_string(), 1u64)]);
		let segments = bar.update(&data).to_vec();
		let (x, w) = bar.extent(&segments[1]);
		assert!((x - 0.25 * 270.0).abs() < 1e-9);
		assert!((w - 0.75 * 270.0).abs() < 1e-9);
		assert_eq!(bar.height(), 18.0);
	}

	#[test]
	fn humanized_numbers() {
		assert_eq!(humanize_number(999), "999");
		assert_eq!(humanize_number(1000), "1000");
		assert_eq!(humanize_number(1500), "1.5K");
		assert_eq!(humanize_number(2000), "2K");
		assert_eq!(humanize_number(2_000_000), "2M");
		assert_eq!(humanize_number(1_234_567), "1.2M");
	}
}
