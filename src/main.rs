use eframe::egui::{self, Color32, RichText, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use text_image_block::constants::{
    BLOCK_TYPE_NAME, COLOR_TOAST_ERROR, COLOR_TOAST_INFO, COLOR_TOAST_SUCCESS, COLOR_TOOLBAR_BG,
    EDITOR_COLUMN_WIDTH, INITIAL_WINDOW_HEIGHT, INITIAL_WINDOW_WIDTH, TOAST_LIFETIME,
    TOOLBAR_BUTTON_SIZE, TOOLBAR_ICON_SIZE, TOOLBAR_START_SPACING,
};
use text_image_block::paths::AppPaths;
use text_image_block::{
    BlockConstructorArgs, BlockData, BlockStyles, BlockTool, EditorApi, Notification,
    NotificationStyle, Notifier, TextImageBlock, UploadConfig,
};
use uuid::Uuid;

/// Saved blocks of another type that can be converted through their text.
const PARAGRAPH_TYPE_NAME: &str = "paragraph";

fn main() -> eframe::Result<()> {
    env_logger::init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| eframe::Error::AppCreation(Box::new(err)))?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([INITIAL_WINDOW_WIDTH, INITIAL_WINDOW_HEIGHT]),
        ..Default::default()
    };

    eframe::run_native(
        "Text & Image",
        options,
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(TextImageApp::new(runtime)))
        }),
    )
}

#[derive(Serialize, Deserialize)]
struct Document {
    blocks: Vec<SavedBlock>,
}

#[derive(Serialize, Deserialize)]
struct SavedBlock {
    id: Uuid,
    #[serde(rename = "type")]
    kind: String,
    data: Value,
}

struct Toast {
    notification: Notification,
    shown_at: Instant,
}

#[derive(Default)]
struct ToastNotifier {
    toasts: RefCell<Vec<Toast>>,
}

impl Notifier for ToastNotifier {
    fn show(&self, notification: Notification) {
        match notification.style {
            NotificationStyle::Error => log::error!("{}", notification.message),
            _ => log::info!("{}", notification.message),
        }
        self.toasts.borrow_mut().push(Toast {
            notification,
            shown_at: Instant::now(),
        });
    }
}

struct EditorBlock {
    id: Uuid,
    block: TextImageBlock,
}

struct TextImageApp {
    blocks: Vec<EditorBlock>,
    notifier: Rc<ToastNotifier>,
    api: EditorApi,
    block_config: Value,
    paths: Option<AppPaths>,
    document_file: Option<PathBuf>,
    _runtime: tokio::runtime::Runtime,
}

impl TextImageApp {
    fn new(runtime: tokio::runtime::Runtime) -> Self {
        let paths = AppPaths::from_project_dirs();
        if let Some(paths) = &paths {
            if let Err(err) = paths.ensure_dirs_exist() {
                log::warn!("Failed to create app directories: {err}");
            }
        }

        let config = paths
            .as_ref()
            .map(|paths| UploadConfig::load_or_default(&paths.config_file))
            .unwrap_or_default();
        if config.endpoint.is_empty() {
            log::warn!("No upload endpoint configured; uploads will fail");
        }
        let block_config = serde_json::to_value(&config).unwrap_or(Value::Null);

        let notifier = Rc::new(ToastNotifier::default());
        let api = EditorApi {
            styles: BlockStyles::default(),
            notifier: notifier.clone(),
            runtime: runtime.handle().clone(),
        };

        let mut app = Self {
            blocks: Vec::new(),
            notifier,
            api,
            block_config,
            paths,
            document_file: None,
            _runtime: runtime,
        };
        app.add_block(Value::Object(Default::default()));
        app
    }

    fn add_block(&mut self, data: Value) {
        let block = TextImageBlock::new(BlockConstructorArgs {
            data,
            config: self.block_config.clone(),
            api: self.api.clone(),
        });
        self.blocks.push(EditorBlock {
            id: Uuid::new_v4(),
            block,
        });
    }

    fn remove_block(&mut self, id: Uuid) {
        if let Some(index) = self.blocks.iter().position(|b| b.id == id) {
            let mut removed = self.blocks.remove(index);
            removed.block.destroy();
        }
    }

    fn clear_blocks(&mut self) {
        for mut entry in self.blocks.drain(..) {
            entry.block.destroy();
        }
    }

    fn document(&mut self) -> Document {
        let sanitize = TextImageBlock::sanitize();
        let mut blocks = Vec::new();
        for entry in &mut self.blocks {
            let saved = entry.block.save();
            if !TextImageBlock::validate(saved) {
                log::warn!("Skipping block {} with empty text", entry.id);
                continue;
            }
            match serde_json::to_value(sanitize.apply(saved)) {
                Ok(data) => blocks.push(SavedBlock {
                    id: entry.id,
                    kind: BLOCK_TYPE_NAME.to_string(),
                    data,
                }),
                Err(err) => log::error!("Failed to serialize block {}: {err}", entry.id),
            }
        }
        Document { blocks }
    }

    fn save_document(&mut self) {
        let mut dialog = rfd::FileDialog::new()
            .add_filter("Document", &["json"])
            .set_file_name("document.json");
        if let Some(paths) = &self.paths {
            dialog = dialog.set_directory(&paths.documents);
        }
        let Some(path) = dialog.save_file() else {
            return;
        };

        let document = self.document();
        match write_document(&path, &document) {
            Ok(()) => {
                self.notifier.show(Notification::success(format!(
                    "Saved {} block(s)",
                    document.blocks.len()
                )));
                self.document_file = Some(path);
            }
            Err(err) => self.notifier.show(Notification::error(err)),
        }
    }

    fn load_document(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("Document", &["json"]);
        if let Some(paths) = &self.paths {
            dialog = dialog.set_directory(&paths.documents);
        }
        let Some(path) = dialog.pick_file() else {
            return;
        };

        let document = match read_document(&path) {
            Ok(document) => document,
            Err(err) => {
                self.notifier.show(Notification::error(err));
                return;
            }
        };

        self.clear_blocks();
        for saved in document.blocks {
            let data = match saved.kind.as_str() {
                BLOCK_TYPE_NAME => saved.data,
                PARAGRAPH_TYPE_NAME => {
                    let text = saved.data.get("text").and_then(Value::as_str).unwrap_or("");
                    match serde_json::to_value(TextImageBlock::import(text)) {
                        Ok(data) => data,
                        Err(err) => {
                            log::warn!("Failed to convert paragraph {}: {err}", saved.id);
                            continue;
                        }
                    }
                }
                other => {
                    log::warn!("Skipping unsupported block type '{other}'");
                    continue;
                }
            };
            self.add_block(data);
            if let Some(last) = self.blocks.last_mut() {
                last.id = saved.id;
            }
        }
        self.notifier.show(Notification::info(format!(
            "Loaded {} block(s)",
            self.blocks.len()
        )));
        if self.blocks.is_empty() {
            self.add_block(serde_json::to_value(BlockData::default()).unwrap_or(Value::Null));
        }
        self.document_file = Some(path);
    }

    fn show_toasts(&self, ctx: &egui::Context) {
        let mut toasts = self.notifier.toasts.borrow_mut();
        toasts.retain(|toast| toast.shown_at.elapsed() < TOAST_LIFETIME);
        if toasts.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_BOTTOM, Vec2::new(-16.0, -16.0))
            .show(ctx, |ui| {
                for toast in toasts.iter() {
                    let fill = match toast.notification.style {
                        NotificationStyle::Error => COLOR_TOAST_ERROR,
                        NotificationStyle::Success => COLOR_TOAST_SUCCESS,
                        NotificationStyle::Info => COLOR_TOAST_INFO,
                    };
                    egui::Frame::default()
                        .fill(fill)
                        .rounding(4.0)
                        .inner_margin(8.0)
                        .show(ui, |ui| {
                            ui.label(
                                RichText::new(&toast.notification.message).color(Color32::WHITE),
                            );
                        });
                }
            });

        let next_expiry = toasts
            .iter()
            .map(|toast| TOAST_LIFETIME.saturating_sub(toast.shown_at.elapsed()))
            .min();
        if let Some(wait) = next_expiry {
            ctx.request_repaint_after(wait);
        }
    }
}

fn toolbar_button(ui: &mut egui::Ui, icon: &str, hint: &str) -> bool {
    ui.add(
        egui::Button::new(RichText::new(icon).size(TOOLBAR_ICON_SIZE))
            .min_size(Vec2::splat(TOOLBAR_BUTTON_SIZE))
            .frame(false),
    )
    .on_hover_text(hint)
    .clicked()
}

fn write_document(path: &Path, document: &Document) -> Result<(), String> {
    let file = std::fs::File::create(path)
        .map_err(|err| format!("Failed to create {}: {err}", path.display()))?;
    serde_json::to_writer_pretty(file, document)
        .map_err(|err| format!("Failed to write {}: {err}", path.display()))
}

fn read_document(path: &Path) -> Result<Document, String> {
    let file = std::fs::File::open(path)
        .map_err(|err| format!("Failed to open {}: {err}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|err| format!("Failed to parse {}: {err}", path.display()))
}

impl eframe::App for TextImageApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("toolbar")
            .frame(
                egui::Frame::default()
                    .fill(COLOR_TOOLBAR_BG)
                    .inner_margin(0.0)
                    .outer_margin(0.0),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.add_space(TOOLBAR_START_SPACING);
                    let toolbox = TextImageBlock::toolbox();
                    if toolbar_button(ui, toolbox.icon, &format!("Add {}", toolbox.title)) {
                        self.add_block(Value::Object(Default::default()));
                    }
                    if toolbar_button(ui, "💾", "Save Document") {
                        self.save_document();
                    }
                    if toolbar_button(ui, "📂", "Load Document") {
                        self.load_document();
                    }
                    if let Some(path) = &self.document_file {
                        ui.label(
                            RichText::new(path.display().to_string()).color(Color32::GRAY),
                        );
                    }
                });
            });

        let mut removed = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.set_max_width(EDITOR_COLUMN_WIDTH);
                    for entry in &mut self.blocks {
                        ui.push_id(entry.id, |ui| {
                            ui.horizontal(|ui| {
                                if ui.small_button("🗑").on_hover_text("Remove block").clicked() {
                                    removed = Some(entry.id);
                                }
                            });
                            entry.block.render(ui);
                        });
                        ui.separator();
                    }
                });
        });

        if let Some(id) = removed {
            self.remove_block(id);
        }

        self.show_toasts(ctx);
    }
}
