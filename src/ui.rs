use nannou::prelude::*;

use crate::playback::PlaybackState;
use crate::render_drawing::hex;

const TITLE: &str = "SoundScape";
/// Widest the control column gets, matching a 42rem layout.
const MAX_COLUMN_WIDTH: f32 = 672.0;
const COLUMN_MARGIN: f32 = 32.0;
const BAR_HEIGHT: f32 = 8.0;
/// Bars are thin; clicks a little above or below still count.
const BAR_HIT_SLOP: f32 = 8.0;
const THUMB_RADIUS: f32 = 8.0;

const ACCENT: u32 = 0xa855f7;
const BUTTON: u32 = 0x9333ea;
const LABEL: u32 = 0xd8b4fe;
const TRACK: u32 = 0x1f2937;
const FILL_START: u32 = 0x9333ea;
const FILL_END: u32 = 0xc084fc;

/// What a click on the controls asks the player to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    Upload,
    TogglePlay,
    /// Offset of the click from the bar's left edge and the bar's width.
    Seek { offset: f32, width: f32 },
    Volume { offset: f32, width: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ButtonType {
    Upload,
    PlayPause,
}

/// Axis-aligned box given by its bottom-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox(f32, f32, f32, f32);

impl BBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        BBox(x, y, w, h)
    }

    pub fn centered(center: Vec2, w: f32, h: f32) -> Self {
        BBox(center.x - w / 2.0, center.y - h / 2.0, w, h)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let BBox(x, y, w, h) = *self;
        point.x >= x && point.x <= x + w && point.y >= y && point.y <= y + h
    }

    pub fn left(&self) -> f32 {
        self.0
    }

    pub fn width(&self) -> f32 {
        self.2
    }

    pub fn center(&self) -> Vec2 {
        vec2(self.0 + self.2 / 2.0, self.1 + self.3 / 2.0)
    }

    fn grown_y(&self, by: f32) -> Self {
        BBox(self.0, self.1 - by, self.2, self.3 + 2.0 * by)
    }

    fn draw_rect(&self, draw: &Draw, color: Rgba) {
        draw.rect().xy(self.center()).w_h(self.2, self.3).color(color);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Button {
    pub button_type: ButtonType,
    pub bbox: BBox,
}

impl Button {
    pub fn new(button_type: ButtonType, bbox: BBox) -> Self {
        Button { button_type, bbox }
    }

    fn label(&self, state: &PlaybackState) -> &'static str {
        match self.button_type {
            ButtonType::Upload => "Upload Audio",
            ButtonType::PlayPause if state.is_playing => "Pause",
            ButtonType::PlayPause => "Play",
        }
    }

    fn draw(&self, draw: &Draw, state: &PlaybackState) {
        let color = match self.button_type {
            ButtonType::Upload => hex(BUTTON, 1.0),
            ButtonType::PlayPause => hex(ACCENT, 1.0),
        };
        self.bbox.draw_rect(draw, color);
        draw.text(self.label(state))
            .xy(self.bbox.center())
            .w_h(self.bbox.2, self.bbox.3)
            .font_size(16)
            .color(WHITE);
    }
}

/// Where every control sits for a given window size. Recomputed each frame,
/// so it follows resizes without any bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlLayout {
    pub title: Vec2,
    pub track_name: Vec2,
    pub buttons: [Button; 2],
    pub time_labels: BBox,
    pub seek_bar: BBox,
    pub volume_label: BBox,
    pub volume_bar: BBox,
}

impl ControlLayout {
    pub fn new(win: Rect) -> Self {
        let width = (win.w() - 2.0 * COLUMN_MARGIN).clamp(0.0, MAX_COLUMN_WIDTH);
        let cx = win.x();
        let cy = win.y();
        let left = cx - width / 2.0;
        let row = |dy: f32, h: f32| BBox::new(left, cy + dy - h / 2.0, width, h);

        ControlLayout {
            title: vec2(cx, cy + 170.0),
            track_name: vec2(cx, cy + 125.0),
            buttons: [
                Button::new(ButtonType::Upload, BBox::centered(vec2(cx, cy + 80.0), 180.0, 48.0)),
                Button::new(ButtonType::PlayPause, BBox::centered(vec2(cx, cy + 16.0), 140.0, 48.0)),
            ],
            time_labels: row(-44.0, 20.0),
            seek_bar: row(-66.0, BAR_HEIGHT),
            volume_label: row(-106.0, 20.0),
            volume_bar: row(-128.0, BAR_HEIGHT),
        }
    }

    /// Maps a click position to the control under it, if any.
    pub fn hit_test(&self, point: Vec2) -> Option<UiAction> {
        for button in &self.buttons {
            if button.bbox.contains(point) {
                return Some(match button.button_type {
                    ButtonType::Upload => UiAction::Upload,
                    ButtonType::PlayPause => UiAction::TogglePlay,
                });
            }
        }

        let bar_click = |bar: &BBox| {
            bar.grown_y(BAR_HIT_SLOP)
                .contains(point)
                .then(|| (point.x - bar.left(), bar.width()))
        };
        if let Some((offset, width)) = bar_click(&self.seek_bar) {
            return Some(UiAction::Seek { offset, width });
        }
        if let Some((offset, width)) = bar_click(&self.volume_bar) {
            return Some(UiAction::Volume { offset, width });
        }
        None
    }
}

fn draw_bar(draw: &Draw, bar: &BBox, ratio: f32) {
    bar.draw_rect(draw, hex(TRACK, 1.0));

    let ratio = ratio.clamp(0.0, 1.0);
    let BBox(x, y, w, h) = *bar;
    let fill_right = x + w * ratio;
    if ratio > 0.0 {
        draw.polygon().points_colored([
            (vec2(x, y), hex(FILL_START, 1.0)),
            (vec2(fill_right, y), hex(FILL_END, 1.0)),
            (vec2(fill_right, y + h), hex(FILL_END, 1.0)),
            (vec2(x, y + h), hex(FILL_START, 1.0)),
        ]);
    }
    draw.ellipse()
        .x_y(fill_right, y + h / 2.0)
        .radius(THUMB_RADIUS)
        .color(hex(FILL_END, 1.0));
}

fn draw_label_row(draw: &Draw, row: &BBox, left_text: &str, right_text: &str) {
    for (text, left_aligned) in [(left_text, true), (right_text, false)] {
        let label = draw
            .text(text)
            .xy(row.center())
            .w_h(row.2, row.3)
            .font_size(14)
            .color(hex(LABEL, 1.0));
        if left_aligned {
            label.left_justify();
        } else {
            label.right_justify();
        }
    }
}

pub fn render_ui(draw: &Draw, layout: &ControlLayout, state: &PlaybackState) {
    draw.text(TITLE)
        .xy(layout.title)
        .w_h(layout.seek_bar.width().max(400.0), 80.0)
        .font_size(56)
        .color(WHITE);

    if let Some(name) = state.track_name() {
        draw.text(&name)
            .xy(layout.track_name)
            .w_h(layout.seek_bar.width(), 24.0)
            .font_size(14)
            .color(hex(LABEL, 0.8));
    }

    for button in &layout.buttons {
        button.draw(draw, state);
    }

    draw_label_row(
        draw,
        &layout.time_labels,
        &state.current_label(),
        &state.duration_label(),
    );
    draw_bar(draw, &layout.seek_bar, state.progress() as f32);

    draw_label_row(draw, &layout.volume_label, "Volume", &state.volume_label());
    draw_bar(draw, &layout.volume_bar, state.volume);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ControlLayout {
        ControlLayout::new(Rect::from_w_h(1280.0, 800.0))
    }

    #[test]
    fn bbox_contains_its_edges() {
        let b = BBox::new(0.0, 0.0, 10.0, 5.0);
        assert!(b.contains(vec2(0.0, 0.0)));
        assert!(b.contains(vec2(10.0, 5.0)));
        assert!(!b.contains(vec2(10.1, 2.0)));
        assert_eq!(BBox::centered(vec2(5.0, 2.5), 10.0, 5.0), b);
    }

    #[test]
    fn column_is_capped_and_centered() {
        let l = layout();
        assert_eq!(l.seek_bar.width(), MAX_COLUMN_WIDTH);
        assert_eq!(l.seek_bar.left(), -MAX_COLUMN_WIDTH / 2.0);

        let narrow = ControlLayout::new(Rect::from_w_h(400.0, 800.0));
        assert_eq!(narrow.volume_bar.width(), 400.0 - 2.0 * COLUMN_MARGIN);

        let tiny = ControlLayout::new(Rect::from_w_h(10.0, 10.0));
        assert_eq!(tiny.seek_bar.width(), 0.0);
    }

    #[test]
    fn buttons_are_hit() {
        let l = layout();
        let upload = l.buttons[0].bbox.center();
        let play = l.buttons[1].bbox.center();
        assert_eq!(l.hit_test(upload), Some(UiAction::Upload));
        assert_eq!(l.hit_test(play), Some(UiAction::TogglePlay));
    }

    #[test]
    fn bar_clicks_report_offset_and_width() {
        let l = layout();
        let seek = l.seek_bar;
        let click = vec2(seek.left() + 100.0, seek.center().y + 5.0);
        assert_eq!(
            l.hit_test(click),
            Some(UiAction::Seek {
                offset: 100.0,
                width: MAX_COLUMN_WIDTH
            })
        );

        let volume = l.volume_bar;
        let click = vec2(volume.left() + volume.width(), volume.center().y);
        assert_eq!(
            l.hit_test(click),
            Some(UiAction::Volume {
                offset: MAX_COLUMN_WIDTH,
                width: MAX_COLUMN_WIDTH
            })
        );
    }

    #[test]
    fn empty_space_is_ignored() {
        let l = layout();
        assert_eq!(l.hit_test(vec2(600.0, 390.0)), None);
        assert_eq!(l.hit_test(vec2(0.0, -300.0)), None);
    }

    #[test]
    fn play_label_tracks_state() {
        let button = Button::new(ButtonType::PlayPause, BBox::new(0.0, 0.0, 1.0, 1.0));
        let mut state = PlaybackState::default();
        assert_eq!(button.label(&state), "Play");
        state.is_playing = true;
        assert_eq!(button.label(&state), "Pause");
    }
}
