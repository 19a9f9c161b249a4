//! The contract between a block and the editor that hosts it.

use crate::block::BlockStateController;
use crate::block_data::BlockData;
use crate::config::UploadConfig;
use crate::constants::{
    COLOR_LOADING_BG, COLOR_PLACEHOLDER_BG, TOOLBOX_ICON, TOOLBOX_TITLE, CARD_CORNER_RADIUS,
    CARD_MARGIN,
};
use crate::markup::{self, ALLOWED_INLINE_TAGS};
use crate::upload::UploadCoordinator;
use egui::{Color32, Frame, Response, Rounding, Stroke};
use serde_json::Value;
use std::rc::Rc;
use std::sync::Arc;
use tokio::runtime::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStyle {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub style: NotificationStyle,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            style: NotificationStyle::Error,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            style: NotificationStyle::Success,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            style: NotificationStyle::Info,
        }
    }
}

/// Transient user-facing messages raised by blocks.
pub trait Notifier {
    fn show(&self, notification: Notification);
}

/// Shared look of blocks so every block type themes the same way.
#[derive(Debug, Clone)]
pub struct BlockStyles {
    pub block: Frame,
    pub input: Frame,
    pub loader: Color32,
    pub placeholder: Color32,
}

impl Default for BlockStyles {
    fn default() -> Self {
        Self {
            block: Frame::none().inner_margin(CARD_MARGIN),
            input: Frame::none()
                .inner_margin(CARD_MARGIN)
                .rounding(Rounding::same(CARD_CORNER_RADIUS))
                .stroke(Stroke::new(1.0, Color32::from_gray(70))),
            loader: COLOR_LOADING_BG,
            placeholder: COLOR_PLACEHOLDER_BG,
        }
    }
}

/// Services the host hands to each block it constructs.
#[derive(Clone)]
pub struct EditorApi {
    pub styles: BlockStyles,
    pub notifier: Rc<dyn Notifier>,
    pub runtime: Handle,
}

impl EditorApi {
    /// Attaches a hover tooltip to a rendered element.
    pub fn tooltip(&self, response: Response, text: &str) -> Response {
        response.on_hover_text(text)
    }
}

/// Entry shown in the host's block picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toolbox {
    pub icon: &'static str,
    pub title: &'static str,
}

/// Which saved field is exchanged when converting to and from plain-text blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionConfig {
    pub export: &'static str,
    pub import: &'static str,
}

/// Markup each saved field may keep; the host's sanitizer removes the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeConfig {
    pub rules: Vec<(&'static str, &'static [&'static str])>,
}

impl SanitizeConfig {
    pub fn allowed_tags(&self, field: &str) -> &'static [&'static str] {
        self.rules
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, tags)| *tags)
            .unwrap_or(&[])
    }

    /// Host-side enforcement of the declared rules for a text-image record.
    pub fn apply(&self, data: &BlockData) -> BlockData {
        BlockData {
            text: markup::strip_disallowed(&data.text, self.allowed_tags("text")),
            title: markup::strip_disallowed(&data.title, self.allowed_tags("title")),
            description: markup::strip_disallowed(
                &data.description,
                self.allowed_tags("description"),
            ),
            image: data.image.clone(),
        }
    }
}

/// Arguments a host passes when it creates a block.
pub struct BlockConstructorArgs {
    pub data: Value,
    pub config: Value,
    pub api: EditorApi,
}

/// The lifecycle every block type implements for the host.
pub trait BlockTool {
    type Data;

    fn toolbox() -> Toolbox;
    fn conversion_config() -> ConversionConfig;
    fn sanitize() -> SanitizeConfig;

    fn render(&mut self, ui: &mut egui::Ui);
    fn save(&mut self) -> &Self::Data;
    fn validate(saved: &Self::Data) -> bool;

    /// Text handed to a plain-text block on conversion.
    fn export(saved: &Self::Data) -> String;
    /// Data built from a plain-text block on conversion.
    fn import(text: &str) -> Self::Data;

    /// Called when the host removes the block.
    fn destroy(&mut self) {}
}

/// A block with rich text, an uploadable image, a title and a description.
pub struct TextImageBlock {
    pub(crate) controller: BlockStateController,
    pub(crate) api: EditorApi,
}

impl TextImageBlock {
    pub fn new(args: BlockConstructorArgs) -> Self {
        let config = Arc::new(UploadConfig::from_value(args.config));
        let uploader = UploadCoordinator::new(Arc::clone(&config), args.api.runtime.clone());
        Self::with_controller(
            BlockStateController::new(
                BlockData::from_value(args.data),
                config,
                Box::new(uploader),
                Rc::clone(&args.api.notifier),
            ),
            args.api,
        )
    }

    pub fn with_controller(controller: BlockStateController, api: EditorApi) -> Self {
        Self { controller, api }
    }

    pub fn controller(&self) -> &BlockStateController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut BlockStateController {
        &mut self.controller
    }
}

impl BlockTool for TextImageBlock {
    type Data = BlockData;

    fn toolbox() -> Toolbox {
        Toolbox {
            icon: TOOLBOX_ICON,
            title: TOOLBOX_TITLE,
        }
    }

    fn conversion_config() -> ConversionConfig {
        ConversionConfig {
            export: "text",
            import: "text",
        }
    }

    fn sanitize() -> SanitizeConfig {
        SanitizeConfig {
            rules: vec![
                ("text", ALLOWED_INLINE_TAGS),
                ("title", ALLOWED_INLINE_TAGS),
                ("description", ALLOWED_INLINE_TAGS),
            ],
        }
    }

    fn render(&mut self, ui: &mut egui::Ui) {
        crate::view::show_block(ui, &mut self.controller, &self.api);
    }

    fn save(&mut self) -> &BlockData {
        self.controller.save()
    }

    fn validate(saved: &BlockData) -> bool {
        BlockStateController::validate(saved)
    }

    fn export(saved: &BlockData) -> String {
        saved.text.clone()
    }

    fn import(text: &str) -> BlockData {
        BlockData {
            text: text.to_string(),
            ..BlockData::default()
        }
    }

    fn destroy(&mut self) {
        self.controller.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_data::ImageFile;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Toasts(RefCell<Vec<Notification>>);

    impl Notifier for Toasts {
        fn show(&self, notification: Notification) {
            self.0.borrow_mut().push(notification);
        }
    }

    #[test]
    fn export_carries_text_only() {
        let data = BlockData {
            text: "Hello <b>world</b>".into(),
            title: "T".into(),
            description: "D".into(),
            image: Some(ImageFile::new("https://x/y.png")),
        };
        assert_eq!(TextImageBlock::export(&data), "Hello <b>world</b>");
    }

    #[test]
    fn import_fills_text_only() {
        let data = TextImageBlock::import("plain words");
        assert_eq!(data.text, "plain words");
        assert!(data.title.is_empty());
        assert!(data.description.is_empty());
        assert!(data.image.is_none());
    }

    #[test]
    fn static_contract_matches_the_block() {
        assert_eq!(
            TextImageBlock::conversion_config(),
            ConversionConfig {
                export: "text",
                import: "text"
            }
        );
        assert_eq!(TextImageBlock::toolbox().title, TOOLBOX_TITLE);

        let sanitize = TextImageBlock::sanitize();
        for field in ["text", "title", "description"] {
            assert_eq!(sanitize.allowed_tags(field), &["br", "b", "i", "a"]);
        }
        assert!(sanitize.allowed_tags("image").is_empty());
    }

    #[test]
    fn notification_constructors_set_style() {
        assert_eq!(Notification::error("e").style, NotificationStyle::Error);
        assert_eq!(Notification::success("s").style, NotificationStyle::Success);
        assert_eq!(Notification::info("i").style, NotificationStyle::Info);
    }

    #[test]
    fn sanitize_rules_strip_everything_else() {
        let data = BlockData {
            text: "<p>Hi <b>there</b></p>".into(),
            title: "<span>Cap</span>".into(),
            description: "<i>ok</i>".into(),
            image: None,
        };
        let clean = TextImageBlock::sanitize().apply(&data);
        assert_eq!(clean.text, "Hi <b>there</b>");
        assert_eq!(clean.title, "Cap");
        assert_eq!(clean.description, "<i>ok</i>");
    }

    #[tokio::test]
    async fn constructs_from_empty_data_and_config() {
        let notifier = Rc::new(Toasts::default());
        let block = TextImageBlock::new(BlockConstructorArgs {
            data: serde_json::json!({}),
            config: Value::Null,
            api: EditorApi {
                styles: BlockStyles::default(),
                notifier,
                runtime: Handle::current(),
            },
        });
        assert_eq!(block.controller().data(), &BlockData::default());
        assert_eq!(block.controller().config(), &UploadConfig::default());
        assert!(!TextImageBlock::validate(block.controller().data()));
    }
}
