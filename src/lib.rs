//! An editor block pairing rich text with an uploadable image and two captions.

pub mod block;
pub mod block_data;
pub mod config;
pub mod constants;
pub mod markup;
pub mod paths;
pub mod tool;
pub mod upload;
pub mod view;

pub use block::{BlockStateController, EditKey, EditableRegions, VisualState};
pub use block_data::{BlockData, ImageFile};
pub use config::UploadConfig;
pub use tool::{
    BlockConstructorArgs, BlockStyles, BlockTool, EditorApi, Notification, NotificationStyle,
    Notifier, TextImageBlock,
};
pub use upload::{UploadCoordinator, UploadError, UploadResponse, Uploader};
