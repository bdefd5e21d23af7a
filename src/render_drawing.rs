use nannou::prelude::*;
use serde::Deserialize;
use splines::{Interpolation, Key, Spline};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::playback::PlaybackState;
use crate::ui;

/// Bar gradient, top to bottom.
const BAR_TOP: u32 = 0xa855f7;
const BAR_MID: u32 = 0x9333ea;
const BAR_BOTTOM: u32 = 0x6b21a8;
const CORNER_COLORS: [u32; 4] = [0xa855f7, 0x9333ea, 0x6b21a8, 0xc084fc];

/// Fraction of the window height a full-scale bar reaches.
const BAR_HEIGHT_SCALE: f32 = 0.8;
const RADIAL_BASE: f32 = 0.2;
const RADIAL_REACH: f32 = 0.3;
const GLOW_SEGMENTS: usize = 24;

pub fn hex(rgb: u32, alpha: f32) -> Rgba {
    let channel = |shift: u32| ((rgb >> shift) & 0xff) as f32 / 255.0;
    rgba(channel(16), channel(8), channel(0), alpha)
}

fn level(byte: u8) -> f32 {
    byte as f32 / 255.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VisualStyle {
    #[default]
    Bars,
    Radial,
    Glow,
}

impl VisualStyle {
    pub fn next(self) -> Self {
        match self {
            VisualStyle::Bars => VisualStyle::Radial,
            VisualStyle::Radial => VisualStyle::Glow,
            VisualStyle::Glow => VisualStyle::Bars,
        }
    }

    fn visual(self) -> &'static dyn DrawVisual {
        match self {
            VisualStyle::Bars => &BarSpectrum,
            VisualStyle::Radial => &RadialSpectrum,
            VisualStyle::Glow => &CornerGlow,
        }
    }

    pub fn primitives(self, snapshot: &[u8], win: Rect, config: &DrawConfig) -> Vec<Primitive> {
        self.visual().primitives(snapshot, win, config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    pub style: VisualStyle,
    pub num_samples: usize, // number of samples to generate from spline curve
    /// Horizontal gap between neighbouring bars, in pixels.
    pub bar_gap: f32,
    pub glow_blur: f32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        DrawConfig {
            style: VisualStyle::Bars,
            num_samples: 400,
            bar_gap: 2.0,
            glow_blur: 20.0,
        }
    }
}

/// Backend-neutral drawing command. A frame is a flat list of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Filled convex polygon, colour interpolated between vertices.
    Shape(Vec<(Vec2, Rgba)>),
    Line {
        start: Vec2,
        end: Vec2,
        weight: f32,
        color: Rgba,
    },
    Polyline {
        points: Vec<Vec2>,
        weight: f32,
        color: Rgba,
    },
    Disc {
        center: Vec2,
        radius: f32,
        color: Rgba,
    },
}

/// A visualization style: a pure function of the snapshot and the window.
pub trait DrawVisual {
    fn primitives(&self, snapshot: &[u8], win: Rect, config: &DrawConfig) -> Vec<Primitive>;

    fn draw_visual(&self, draw: &Draw, snapshot: &[u8], win: Rect, config: &DrawConfig) {
        paint(draw, &self.primitives(snapshot, win, config));
    }
}

fn rect_shape(x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba) -> Primitive {
    Primitive::Shape(vec![
        (vec2(x0, y0), color),
        (vec2(x1, y0), color),
        (vec2(x1, y1), color),
        (vec2(x0, y1), color),
    ])
}

/// Linear bars along the bottom edge, one per bin.
pub struct BarSpectrum;

impl DrawVisual for BarSpectrum {
    fn primitives(&self, snapshot: &[u8], win: Rect, config: &DrawConfig) -> Vec<Primitive> {
        if snapshot.is_empty() {
            return Vec::new();
        }
        let bar_width = win.w() / snapshot.len() as f32;
        let drawn_width = (bar_width - config.bar_gap).max(0.0);
        let bottom = win.bottom();
        let blur = config.glow_blur.max(0.0);

        let mut out = Vec::with_capacity(snapshot.len() * 3);
        for (i, &v) in snapshot.iter().enumerate() {
            if v == 0 {
                continue;
            }
            let height = level(v) * win.h() * BAR_HEIGHT_SCALE;
            let x0 = win.left() + i as f32 * bar_width;
            let x1 = x0 + drawn_width;
            let top = bottom + height;

            if blur > 0.0 {
                out.push(rect_shape(x0 - blur, bottom, x1 + blur, top + blur, hex(BAR_TOP, 0.12)));
                let half = blur * 0.5;
                out.push(rect_shape(x0 - half, bottom, x1 + half, top + half, hex(BAR_TOP, 0.2)));
            }

            let mid = bottom + height * 0.5;
            out.push(Primitive::Shape(vec![
                (vec2(x0, bottom), hex(BAR_BOTTOM, 1.0)),
                (vec2(x1, bottom), hex(BAR_BOTTOM, 1.0)),
                (vec2(x1, mid), hex(BAR_MID, 1.0)),
                (vec2(x1, top), hex(BAR_TOP, 1.0)),
                (vec2(x0, top), hex(BAR_TOP, 1.0)),
                (vec2(x0, mid), hex(BAR_MID, 1.0)),
            ]));
        }
        out
    }
}

/// Spokes around a circle with a smooth outline through their tips.
pub struct RadialSpectrum;

impl DrawVisual for RadialSpectrum {
    fn primitives(&self, snapshot: &[u8], win: Rect, config: &DrawConfig) -> Vec<Primitive> {
        if snapshot.is_empty() {
            return Vec::new();
        }
        let center = win.xy();
        let size = win.w().min(win.h()).max(0.0);
        let base = size * RADIAL_BASE;
        let reach = size * RADIAL_REACH;
        let n = snapshot.len() as f32;
        let weight = (TAU * base / n * 0.6).max(1.0);

        let mut out = Vec::with_capacity(snapshot.len() + 2);
        let mut tips = Vec::with_capacity(snapshot.len());
        for (i, &v) in snapshot.iter().enumerate() {
            let amp = level(v);
            let theta = i as f32 / n * TAU;
            let dir = vec2(theta.cos(), theta.sin());
            let start = center + dir * base;
            let end = center + dir * (base + amp * reach);
            tips.push(end);

            if v > 0 {
                let color = lerp_color(hex(BAR_BOTTOM, 0.9), hex(BAR_TOP, 0.9), amp);
                out.push(Primitive::Line {
                    start,
                    end,
                    weight,
                    color,
                });
            }
        }

        if let Some(spline) = Spline2D::new(&tips) {
            out.push(Primitive::Polyline {
                points: spline.generate_samples(config.num_samples),
                weight: 2.0,
                color: hex(BAR_TOP, 0.8),
            });
        }
        out.push(Primitive::Disc {
            center,
            radius: size * 0.0125,
            color: hex(BAR_TOP, 1.0),
        });
        out
    }
}

/// One glow per window corner, each driven by a quarter of the spectrum
/// (bass bottom-left, then bottom-right, top-left, treble top-right).
pub struct CornerGlow;

impl CornerGlow {
    pub fn quadrant_levels(snapshot: &[u8]) -> [f32; 4] {
        let mut levels = [0.0; 4];
        if snapshot.is_empty() {
            return levels;
        }
        let chunk = (snapshot.len() + 3) / 4;
        for (level, bins) in levels.iter_mut().zip(snapshot.chunks(chunk)) {
            let sum: u32 = bins.iter().map(|&b| b as u32).sum();
            *level = sum as f32 / (bins.len() as f32 * 255.0);
        }
        levels
    }
}

impl DrawVisual for CornerGlow {
    fn primitives(&self, snapshot: &[u8], win: Rect, _config: &DrawConfig) -> Vec<Primitive> {
        let levels = Self::quadrant_levels(snapshot);
        let max_radius = win.w().max(win.h()) * 0.6;

        // corner, and the angle pointing into the window from it
        let corners = [
            (win.bottom_left(), 0.0),
            (win.bottom_right(), FRAC_PI_2),
            (win.top_left(), -FRAC_PI_2),
            (win.top_right(), PI),
        ];

        let mut out = Vec::new();
        for (i, ((corner, start_angle), level)) in corners.into_iter().zip(levels).enumerate() {
            if level <= 0.0 {
                continue;
            }
            let radius = max_radius * level;
            let color = CORNER_COLORS[i];
            let inner = hex(color, 0.8 * level);
            let outer = hex(color, 0.0);
            let arc: Vec<Vec2> = (0..=GLOW_SEGMENTS)
                .map(|s| {
                    let theta = start_angle + FRAC_PI_2 * s as f32 / GLOW_SEGMENTS as f32;
                    corner + vec2(theta.cos(), theta.sin()) * radius
                })
                .collect();
            // one triangle per segment; a single polygon gets re-triangulated
            // and loses the gradient away from the corner
            for edge in arc.windows(2) {
                out.push(Primitive::Shape(vec![
                    (corner, inner),
                    (edge[0], outer),
                    (edge[1], outer),
                ]));
            }
        }
        out
    }
}

fn lerp_color(a: Rgba, b: Rgba, t: f32) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: f32, y: f32| x + (y - x) * t;
    rgba(
        mix(a.red, b.red),
        mix(a.green, b.green),
        mix(a.blue, b.blue),
        mix(a.alpha, b.alpha),
    )
}

/// Closed Catmull-Rom curve through a ring of points.
struct Spline2D {
    x_spline: Spline<f32, f32>,
    y_spline: Spline<f32, f32>,
    length: usize,
}

impl Spline2D {
    /// Needs at least three points. The first three are appended again at
    /// the end so the curve closes on itself; interpolation then covers keys
    /// `1.0 .. len + 1`.
    fn new(points: &[Vec2]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }

        let spline_single_axis = |axis: usize| {
            let vals = points.iter().chain(points.iter().take(3)).map(|p| p[axis]);
            Spline::from_iter(
                vals.enumerate()
                    .map(|(i, val)| Key::new(i as f32, val, Interpolation::CatmullRom)),
            )
        };

        Some(Self {
            x_spline: spline_single_axis(0),
            y_spline: spline_single_axis(1),
            length: points.len(),
        })
    }

    fn sample(&self, t: f32) -> Option<Vec2> {
        Some(vec2(self.x_spline.sample(t)?, self.y_spline.sample(t)?))
    }

    fn generate_samples(&self, num_samples: usize) -> Vec<Vec2> {
        let num_samples = num_samples.max(2);
        let start = 1.0;
        let end = (self.length + 1) as f32; // exclusive
        let step = (end - start) / (num_samples as f32 - 1.0);

        let mut result: Vec<Vec2> = (0..num_samples - 1)
            .filter_map(|i| self.sample(start + i as f32 * step))
            .collect();
        result.extend(self.sample(end - 0.0001));
        result
    }
}

pub fn paint(draw: &Draw, primitives: &[Primitive]) {
    for primitive in primitives {
        match primitive {
            Primitive::Shape(points) => {
                draw.polygon().points_colored(points.iter().copied());
            }
            Primitive::Line {
                start,
                end,
                weight,
                color,
            } => {
                draw.line()
                    .start(*start)
                    .end(*end)
                    .weight(*weight)
                    .caps_round()
                    .color(*color);
            }
            Primitive::Polyline {
                points,
                weight,
                color,
            } => {
                draw.polyline()
                    .weight(*weight)
                    .color(*color)
                    .points(points.iter().copied());
            }
            Primitive::Disc {
                center,
                radius,
                color,
            } => {
                draw.ellipse().xy(*center).radius(*radius).color(*color);
            }
        }
    }
}

/// Paints one full frame: background, the active visualization, then the
/// controls on top.
pub fn draw_on_window(
    app: &App,
    frame: Frame,
    snapshot: &[u8],
    config: &DrawConfig,
    state: &PlaybackState,
) {
    let draw = app.draw();
    draw.background().color(BLACK);
    let win = app.window_rect();

    config.style.visual().draw_visual(&draw, snapshot, win, config);
    ui::render_ui(&draw, &ui::ControlLayout::new(win), state);

    if let Err(e) = draw.to_frame(app, &frame) {
        tracing::error!("failed to render frame: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Rect {
        Rect::from_w_h(1024.0, 768.0)
    }

    fn all_styles() -> [VisualStyle; 3] {
        [VisualStyle::Bars, VisualStyle::Radial, VisualStyle::Glow]
    }

    #[test]
    fn empty_snapshot_draws_nothing() {
        let config = DrawConfig::default();
        for style in all_styles() {
            assert!(style.primitives(&[], window(), &config).is_empty());
        }
    }

    #[test]
    fn degenerate_windows_do_not_panic() {
        let config = DrawConfig::default();
        let snapshot = [255u8; 128];
        for style in all_styles() {
            style.primitives(&snapshot, Rect::from_w_h(0.0, 0.0), &config);
            style.primitives(&snapshot[..1], Rect::from_w_h(3.0, 900.0), &config);
            style.primitives(&snapshot[..2], window(), &config);
        }
    }

    #[test]
    fn style_cycle_visits_everything() {
        let mut style = VisualStyle::default();
        let mut seen = vec![style];
        for _ in 0..2 {
            style = style.next();
            seen.push(style);
        }
        assert_eq!(seen, all_styles());
        assert_eq!(style.next(), VisualStyle::Bars);
    }

    #[test]
    fn full_scale_bar_reaches_eighty_percent() {
        let config = DrawConfig {
            glow_blur: 0.0,
            ..Default::default()
        };
        let mut snapshot = [0u8; 4];
        snapshot[1] = 255;
        let primitives = BarSpectrum.primitives(&snapshot, window(), &config);
        assert_eq!(primitives.len(), 1);

        let Primitive::Shape(points) = &primitives[0] else {
            panic!("bars are shapes");
        };
        let ys: Vec<f32> = points.iter().map(|(p, _)| p.y).collect();
        let xs: Vec<f32> = points.iter().map(|(p, _)| p.x).collect();
        let top = ys.iter().cloned().fold(f32::MIN, f32::max);
        let bottom = ys.iter().cloned().fold(f32::MAX, f32::min);
        assert_eq!(bottom, -384.0);
        assert!((top - bottom - 768.0 * 0.8).abs() < 1e-3);

        // second of four bars, 256 px wide minus the gap
        let left = xs.iter().cloned().fold(f32::MAX, f32::min);
        let right = xs.iter().cloned().fold(f32::MIN, f32::max);
        assert_eq!(left, -512.0 + 256.0);
        assert_eq!(right, -512.0 + 256.0 + 254.0);
    }

    #[test]
    fn bar_gradient_runs_top_to_bottom() {
        let config = DrawConfig {
            glow_blur: 0.0,
            ..Default::default()
        };
        let primitives = BarSpectrum.primitives(&[128], window(), &config);
        let Primitive::Shape(points) = &primitives[0] else {
            panic!("bars are shapes");
        };
        let (bottom, bottom_color) = points[0];
        let (top, top_color) = points[3];
        assert!(top.y > bottom.y);
        assert_eq!(top_color, hex(BAR_TOP, 1.0));
        assert_eq!(bottom_color, hex(BAR_BOTTOM, 1.0));
    }

    #[test]
    fn glow_halo_is_drawn_behind_bars() {
        let primitives = BarSpectrum.primitives(&[200, 0, 50], window(), &DrawConfig::default());
        // two halos and the bar itself for each non-zero bin
        assert_eq!(primitives.len(), 6);
    }

    #[test]
    fn radial_spokes_stay_inside_the_window() {
        let win = window();
        let primitives = RadialSpectrum.primitives(&[255u8; 64], win, &DrawConfig::default());
        let spokes: Vec<_> = primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Line { end, .. } => Some(*end),
                _ => None,
            })
            .collect();
        assert_eq!(spokes.len(), 64);
        for end in spokes {
            assert!((end.length() - 768.0 * 0.5).abs() < 1e-2);
        }
        assert!(primitives
            .iter()
            .any(|p| matches!(p, Primitive::Polyline { points, .. } if points.len() == 400)));
    }

    #[test]
    fn first_spoke_points_right() {
        let win = window();
        let primitives = RadialSpectrum.primitives(&[255u8; 16], win, &DrawConfig::default());
        let Some(Primitive::Line { start, end, .. }) = primitives.first() else {
            panic!("first primitive is a spoke");
        };
        assert!(end.x > start.x);
        assert!((end.y - win.y()).abs() < 1e-3);
        assert!((start.y - win.y()).abs() < 1e-3);
    }

    #[test]
    fn spline_needs_three_points() {
        assert!(Spline2D::new(&[vec2(0.0, 0.0), vec2(1.0, 1.0)]).is_none());
        let ring = [vec2(1.0, 0.0), vec2(0.0, 1.0), vec2(-1.0, 0.0), vec2(0.0, -1.0)];
        let spline = Spline2D::new(&ring).unwrap();
        let samples = spline.generate_samples(50);
        assert_eq!(samples.len(), 50);
        // closed: the curve starts on the second key and wraps back to it
        assert!((samples[0] - ring[1]).length() < 1e-4);
        assert!((samples[49] - ring[1]).length() < 1e-2);
    }

    #[test]
    fn quadrant_levels_average_each_quarter() {
        let mut snapshot = [0u8; 8];
        snapshot[0] = 255;
        snapshot[1] = 255;
        snapshot[7] = 51;
        let levels = CornerGlow::quadrant_levels(&snapshot);
        assert_eq!(levels[0], 1.0);
        assert_eq!(levels[1], 0.0);
        assert_eq!(levels[2], 0.0);
        assert!((levels[3] - 0.1).abs() < 1e-6);

        assert_eq!(CornerGlow::quadrant_levels(&[]), [0.0; 4]);
        assert_eq!(CornerGlow::quadrant_levels(&[255])[0], 1.0);
    }

    #[test]
    fn silent_corners_are_skipped() {
        let mut snapshot = [0u8; 8];
        snapshot[0] = 255;
        let primitives = CornerGlow.primitives(&snapshot, window(), &DrawConfig::default());
        assert_eq!(primitives.len(), GLOW_SEGMENTS);
        for primitive in &primitives {
            let Primitive::Shape(triangle) = primitive else {
                panic!("glows are shapes");
            };
            assert_eq!(triangle[0].0, window().bottom_left());
        }
    }

    #[test]
    fn every_glow_triangle_touches_its_corner() {
        let win = window();
        let primitives = CornerGlow.primitives(&[255u8; 8], win, &DrawConfig::default());
        assert_eq!(primitives.len(), 4 * GLOW_SEGMENTS);

        let corners = [win.bottom_left(), win.bottom_right(), win.top_left(), win.top_right()];
        for (i, primitive) in primitives.iter().enumerate() {
            let Primitive::Shape(triangle) = primitive else {
                panic!("glows are shapes");
            };
            assert_eq!(triangle.len(), 3);
            let (corner, color) = triangle[0];
            assert_eq!(corner, corners[i / GLOW_SEGMENTS]);
            assert!(color.alpha > 0.0);
            assert!(triangle[1..].iter().all(|(p, c)| c.alpha == 0.0 && *p != corner));
        }
    }
}
