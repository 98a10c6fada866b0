use anyhow::{Context, Result};
use eframe::egui;
use image::DynamicImage;
use mask_annotate::{BrushColor, MaskConfig, MaskLayer, MaskState, Mode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tiny_skia::{Pixmap, Transform};

// ── Sample Metadata ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BloodSmear {
    Thin,
    Thick,
}

impl BloodSmear {
    fn label(self) -> &'static str {
        match self {
            BloodSmear::Thin => "Thin",
            BloodSmear::Thick => "Thick",
        }
    }
}

/// What the downstream submission receives next to the exported mask.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SampleMetadata {
    sample_id: String,
    blood_smear: BloodSmear,
    mask: PathBuf,
}

fn sample_id(image_path: &Path) -> String {
    image_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

// ── Persistence ─────────────────────────────────────────────────────────────

fn maskz_path(image_path: &Path) -> PathBuf {
    image_path.with_extension(format!(
        "{}.maskz",
        image_path
            .extension()
            .unwrap_or_default()
            .to_str()
            .unwrap_or("")
    ))
}

fn load_mask_state(image_path: &Path) -> Result<Option<MaskState>> {
    let path = maskz_path(image_path);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("reading mask state from {}", path.display()))?;
    let state = MaskState::from_json(&data)
        .with_context(|| format!("parsing mask state from {}", path.display()))?;
    Ok(Some(state))
}

fn save_mask_state(image_path: &Path, state: &MaskState) -> Result<()> {
    let path = maskz_path(image_path);
    std::fs::write(&path, state.to_json()?)
        .with_context(|| format!("writing mask state to {}", path.display()))
}

/// Restores `state` into `layer`, or leaves the layer empty when the saved state
/// is inconsistent. Returns whether the state was adopted.
fn adopt_saved_state(layer: &mut MaskLayer, state: MaskState, image_path: &Path) -> bool {
    match layer.restore_state(state) {
        Ok(()) => {
            log::info!(
                "Restored {} stroke(s) for {}",
                layer.committed_count(),
                image_path.display()
            );
            true
        }
        Err(err) => {
            log::error!("Ignoring saved mask state for {}: {err}", image_path.display());
            false
        }
    }
}

fn load_config(path: &Path) -> Result<MaskConfig> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing config {}", path.display()))
}

// ── App ─────────────────────────────────────────────────────────────────────

const DEFAULT_BRUSH: [u8; 3] = [255, 0, 0];

struct MaskApp {
    image_path: PathBuf,
    texture: Option<egui::TextureHandle>,
    image_size: (f32, f32),
    raw_image: DynamicImage,

    layer: MaskLayer,
    mask_target: Pixmap,
    mask_texture: Option<egui::TextureHandle>,
    mask_dirty: bool,

    mode: Mode,
    color: [u8; 3],
    blood_smear: Option<BloodSmear>,
    status: Option<String>,

    // pan & zoom
    pan: egui::Vec2,
    zoom: f32,
    panning: bool,
}

impl MaskApp {
    fn new(image_path: PathBuf, config: MaskConfig) -> Result<Self> {
        let raw_image = image::open(&image_path)
            .with_context(|| format!("opening image {}", image_path.display()))?;
        let (width, height) = (raw_image.width(), raw_image.height());

        let mut layer = MaskLayer::new(config);
        layer.init_size(width, height)?;
        layer.init_brush_color(BrushColor::rgb(
            DEFAULT_BRUSH[0],
            DEFAULT_BRUSH[1],
            DEFAULT_BRUSH[2],
        ))?;

        let mut color = DEFAULT_BRUSH;
        match load_mask_state(&image_path) {
            Ok(Some(state)) => {
                if adopt_saved_state(&mut layer, state, &image_path) {
                    if let Some(restored) = layer.brush_color() {
                        color = [restored.r, restored.g, restored.b];
                    }
                }
            }
            Ok(None) => {}
            Err(err) => log::error!("{err:#}"),
        }

        let mask_target = Pixmap::new(width, height)
            .with_context(|| format!("allocating a {width}x{height} mask target"))?;

        Ok(Self {
            image_path,
            texture: None,
            image_size: (width as f32, height as f32),
            raw_image,
            layer,
            mask_target,
            mask_texture: None,
            mask_dirty: true,
            mode: Mode::Draw,
            color,
            blood_smear: None,
            status: None,
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
            panning: false,
        })
    }

    fn auto_save(&self) {
        if let Err(err) = save_mask_state(&self.image_path, &self.layer.capture_state()) {
            log::error!("{err:#}");
        }
    }

    fn undo(&mut self) {
        if self.layer.undo_available() {
            self.layer.undo();
            self.mask_dirty = true;
            self.auto_save();
        }
    }

    fn redo(&mut self) {
        if self.layer.redo_available() {
            self.layer.redo();
            self.mask_dirty = true;
            self.auto_save();
        }
    }

    fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
        if let Err(err) = self.layer.set_scale(zoom) {
            log::warn!("{err}");
        }
    }

    /// Convert image-space coords to screen-space
    fn image_to_screen(&self, canvas_rect: egui::Rect, img_pos: egui::Pos2) -> egui::Pos2 {
        let center = canvas_rect.center();
        center
            + self.pan
            + (img_pos.to_vec2() - egui::vec2(self.image_size.0, self.image_size.1) * 0.5)
                * self.zoom
    }

    /// Convert screen-space coords to image-space
    fn screen_to_image(&self, canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> egui::Pos2 {
        let center = canvas_rect.center();
        let rel = screen_pos - center - self.pan;
        egui::pos2(
            rel.x / self.zoom + self.image_size.0 * 0.5,
            rel.y / self.zoom + self.image_size.1 * 0.5,
        )
    }

    fn image_rect_on_screen(&self, canvas_rect: egui::Rect) -> egui::Rect {
        let top_left = self.image_to_screen(canvas_rect, egui::Pos2::ZERO);
        let bot_right = self.image_to_screen(
            canvas_rect,
            egui::pos2(self.image_size.0, self.image_size.1),
        );
        egui::Rect::from_min_max(top_left, bot_right)
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        let rgba = self.raw_image.to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        let pixels = rgba.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
        self.texture = Some(ctx.load_texture("image", color_image, egui::TextureOptions::LINEAR));
    }

    /// Recomposes the mask and uploads it whenever something changed.
    fn update_mask_texture(&mut self, ctx: &egui::Context) {
        if !self.mask_dirty && !self.layer.is_drawing() && self.mask_texture.is_some() {
            return;
        }
        self.mask_target.fill(tiny_skia::Color::TRANSPARENT);
        self.layer.render(&mut self.mask_target.as_mut(), Transform::identity());

        let size = [
            self.mask_target.width() as usize,
            self.mask_target.height() as usize,
        ];
        let color_image = egui::ColorImage::from_rgba_premultiplied(size, self.mask_target.data());
        if let Some(texture) = &mut self.mask_texture {
            texture.set(color_image, egui::TextureOptions::NEAREST);
        } else {
            self.mask_texture =
                Some(ctx.load_texture("mask", color_image, egui::TextureOptions::NEAREST));
        }
        self.mask_dirty = false;
    }

    fn export_mask(&mut self) {
        let Some(blood_smear) = self.blood_smear else {
            self.status = Some("Select a blood smear type before exporting".to_owned());
            return;
        };
        let Some(mask) = self.layer.flatten() else {
            return;
        };

        let default_name = format!("{}_mask.png", sample_id(&self.image_path));
        let mut dialog = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name(default_name.as_str());
        if let Some(dir) = self.image_path.parent() {
            dialog = dialog.set_directory(dir);
        }
        let Some(out_path) = dialog.save_file() else {
            return;
        };

        let result = mask
            .save(&out_path)
            .with_context(|| format!("writing mask to {}", out_path.display()))
            .and_then(|()| {
                let metadata = SampleMetadata {
                    sample_id: sample_id(&self.image_path),
                    blood_smear,
                    mask: out_path.clone(),
                };
                let meta_path = out_path.with_extension("json");
                std::fs::write(&meta_path, serde_json::to_string_pretty(&metadata)?)
                    .with_context(|| format!("writing metadata to {}", meta_path.display()))
            });

        match result {
            Ok(()) => {
                log::info!("Exported mask to {}", out_path.display());
                self.status = Some(format!("Exported {}", out_path.display()));
            }
            Err(err) => {
                log::error!("{err:#}");
                self.status = Some("Export failed, see log".to_owned());
            }
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for MaskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_texture(ctx);

        // Keyboard shortcuts
        let (undo, redo, export) = ctx.input(|i| {
            let z = i.modifiers.ctrl && i.key_pressed(egui::Key::Z);
            (
                z && !i.modifiers.shift,
                z && i.modifiers.shift,
                i.modifiers.ctrl && i.key_pressed(egui::Key::S),
            )
        });
        if undo {
            self.undo();
        }
        if redo {
            self.redo();
        }
        if export {
            self.export_mask();
        }

        // Top toolbar
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.mode, Mode::Draw, "Draw");
                ui.selectable_value(&mut self.mode, Mode::Erase, "Erase");
                ui.separator();
                ui.label("Color:");
                if ui.color_edit_button_srgb(&mut self.color).changed() {
                    let [r, g, b] = self.color;
                    if let Err(err) = self.layer.set_brush_color(BrushColor::rgb(r, g, b)) {
                        log::warn!("{err}");
                    }
                }
                ui.separator();
                if ui
                    .add_enabled(self.layer.undo_available(), egui::Button::new("Undo"))
                    .clicked()
                {
                    self.undo();
                }
                if ui
                    .add_enabled(self.layer.redo_available(), egui::Button::new("Redo"))
                    .clicked()
                {
                    self.redo();
                }
                ui.separator();
                egui::ComboBox::from_label("Blood smear")
                    .selected_text(self.blood_smear.map_or("—", BloodSmear::label))
                    .show_ui(ui, |ui| {
                        for smear in [BloodSmear::Thin, BloodSmear::Thick] {
                            ui.selectable_value(&mut self.blood_smear, Some(smear), smear.label());
                        }
                    });
                if ui.button("Export").clicked() {
                    self.export_mask();
                }
                ui.separator();
                ui.label(format!("Zoom: {:.0}%", self.zoom * 100.0));
                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status);
                }
            });
        });
        self.layer.set_mode(self.mode);

        // Canvas
        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;

            // Handle pan (middle mouse button)
            let middle_down = ctx.input(|i| i.pointer.middle_down());
            if middle_down {
                let delta = ctx.input(|i| i.pointer.delta());
                self.pan += delta;
                self.panning = true;
            } else {
                self.panning = false;
            }

            // Handle zoom (scroll wheel)
            let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
            if scroll_delta != 0.0 && response.hovered() {
                let zoom_factor = 1.0 + scroll_delta * 0.002;
                let new_zoom = (self.zoom * zoom_factor).clamp(0.1, 10.0);
                if let Some(cursor) = response.hover_pos() {
                    let center = canvas_rect.center();
                    let cursor_rel = cursor - center - self.pan;
                    self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
                }
                self.set_zoom(new_zoom);
            }

            // Handle mask gestures (primary button only, not while panning)
            let focused = ctx.input(|i| i.focused);
            if self.layer.is_drawing() && (self.panning || !focused) {
                self.layer.gesture_cancel();
                self.mask_dirty = true;
            } else if !self.panning {
                if response.drag_started_by(egui::PointerButton::Primary) {
                    if let Some(pos) = response.interact_pointer_pos() {
                        let img_pos = self.screen_to_image(canvas_rect, pos);
                        self.layer.gesture_start(img_pos.x, img_pos.y);
                    }
                }

                if response.dragged_by(egui::PointerButton::Primary) {
                    if let Some(pos) = response.interact_pointer_pos() {
                        let img_pos = self.screen_to_image(canvas_rect, pos);
                        self.layer.gesture_move(img_pos.x, img_pos.y);
                    }
                }

                if response.drag_stopped_by(egui::PointerButton::Primary) {
                    if self.layer.gesture_end() {
                        self.auto_save();
                    }
                    self.mask_dirty = true;
                }
            }

            self.update_mask_texture(ctx);

            // Draw background
            painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

            let img_rect = self.image_rect_on_screen(canvas_rect);
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            if let Some(ref tex) = self.texture {
                painter.image(tex.id(), img_rect, uv, egui::Color32::WHITE);
            }
            if let Some(ref mask) = self.mask_texture {
                painter.image(mask.id(), img_rect, uv, egui::Color32::WHITE);
            }
        });
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: mask-annotate <image.png|jpg> [config.json]");
        std::process::exit(1);
    }

    let image_path = PathBuf::from(&args[1]);
    if !image_path.exists() {
        eprintln!("File not found: {}", image_path.display());
        std::process::exit(1);
    }

    let config = match args.get(2) {
        Some(path) => load_config(Path::new(path)).unwrap_or_else(|err| {
            log::error!("{err:#}, falling back to defaults");
            MaskConfig::default()
        }),
        None => MaskConfig::default(),
    };

    let app = match MaskApp::new(image_path.clone(), config) {
        Ok(app) => app,
        Err(err) => {
            log::error!("{err:#}");
            std::process::exit(1);
        }
    };

    let title = format!(
        "mask-annotate — {}",
        image_path
            .file_name()
            .unwrap_or_default()
            .to_str()
            .unwrap_or("")
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    if let Err(err) = eframe::run_native(&title, options, Box::new(move |_cc| Ok(Box::new(app)))) {
        log::error!("Failed to run eframe: {err}");
        std::process::exit(1);
    }
}
