//! Centralized constants for upload defaults, timing, UI sizing, and colors.
//!
//! Every default of the upload configuration lives here so the config layer and
//! the tests agree on a single source of truth.

use egui::Color32;
use std::time::Duration;

// =============================================================================
// UPLOAD DEFAULTS
// =============================================================================

/// Form field name the picked file is sent under.
pub const DEFAULT_FIELD: &str = "image";

/// Accept list used for the file dialog when none is configured.
pub const DEFAULT_TYPES: &str = "image/*";

/// Placeholder shown in the rich-text region while it is empty.
pub const DEFAULT_TEXT_PLACEHOLDER: &str = "Text";

/// Placeholder shown in the title caption while it is empty.
pub const DEFAULT_TITLE_PLACEHOLDER: &str = "Title";

/// Placeholder shown in the description caption while it is empty.
pub const DEFAULT_DESCRIPTION_PLACEHOLDER: &str = "Description";

/// Request timeout for one upload attempt.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// MIME type sent for files whose format cannot be guessed from the extension.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Message raised through the notifier for any failed upload.
pub const UPLOAD_FAILED_MESSAGE: &str = "Couldn't upload image. Please try another.";

// =============================================================================
// TIMING
// =============================================================================

/// How long the loader stays visible after an upload resolves, success or failure.
pub const LOADER_DISPLAY_DELAY: Duration = Duration::from_millis(500);

/// How often a block with an upload in flight checks for its result.
pub const UPLOAD_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lifetime of a toast in the demo host.
pub const TOAST_LIFETIME: Duration = Duration::from_secs(4);

// =============================================================================
// TOOLBOX
// =============================================================================

/// Label shown for the block in the host's toolbox.
pub const TOOLBOX_TITLE: &str = "Text & Image";

/// Icon shown for the block in the host's toolbox.
pub const TOOLBOX_ICON: &str = "🖼";

/// Type name under which saved blocks are stored in a document.
pub const BLOCK_TYPE_NAME: &str = "textImage";

/// Tooltip on the delete control of the image region.
pub const DELETE_TOOLTIP: &str = "Delete image";

/// Tooltip on an empty image region.
pub const UPLOAD_TOOLTIP: &str = "Click to upload an image";

// =============================================================================
// BLOCK LAYOUT CONSTANTS
// =============================================================================

/// Height of the image region inside the card.
pub const IMAGE_REGION_HEIGHT: f32 = 220.0;

/// Minimum height of the rich-text region.
pub const TEXT_REGION_ROWS: usize = 3;

/// Spacing between the regions of a block.
pub const REGION_SPACING: f32 = 6.0;

/// Inner margin of the caption card.
pub const CARD_MARGIN: f32 = 8.0;

/// Corner radius for the card and the image region.
pub const CARD_CORNER_RADIUS: f32 = 6.0;

/// Size of the delete control overlaid on the image region.
pub const DELETE_BUTTON_SIZE: f32 = 20.0;

/// Offset of the delete control from the image region's top-right corner.
pub const DELETE_BUTTON_OFFSET: f32 = 6.0;

/// Font size of the placeholder glyph in an empty image region.
pub const PLACEHOLDER_ICON_SIZE: f32 = 40.0;

/// Size of the loader spinner.
pub const LOADER_SIZE: f32 = 32.0;

// =============================================================================
// WINDOW CONSTANTS
// =============================================================================

/// Initial window width when the demo starts.
pub const INITIAL_WINDOW_WIDTH: f32 = 800.0;

/// Initial window height when the demo starts.
pub const INITIAL_WINDOW_HEIGHT: f32 = 600.0;

/// Maximum width of the block column in the demo.
pub const EDITOR_COLUMN_WIDTH: f32 = 650.0;

// =============================================================================
// TOOLBAR CONSTANTS
// =============================================================================

/// Spacing at the start of the toolbar.
pub const TOOLBAR_START_SPACING: f32 = 8.0;

/// Size of toolbar button icons.
pub const TOOLBAR_ICON_SIZE: f32 = 24.0;

/// Minimum size for toolbar buttons.
pub const TOOLBAR_BUTTON_SIZE: f32 = 32.0;

// =============================================================================
// COLORS
// =============================================================================

/// Fill of an empty image region.
pub const COLOR_PLACEHOLDER_BG: Color32 = Color32::from_rgb(60, 60, 60);

/// Placeholder glyph color.
pub const COLOR_PLACEHOLDER_ICON: Color32 = Color32::from_rgb(150, 150, 150);

/// Fill of the image region while the loader is shown.
pub const COLOR_LOADING_BG: Color32 = Color32::from_rgb(40, 40, 40);

/// Delete button color when hovered.
pub const COLOR_DELETE_BUTTON_HOVER: Color32 = Color32::from_rgb(255, 100, 100);

/// Delete button color in normal state.
pub const COLOR_DELETE_BUTTON: Color32 = Color32::RED;

/// Background color for the toolbar.
pub const COLOR_TOOLBAR_BG: Color32 = Color32::from_rgb(30, 30, 30);

/// Toast fill for error notifications.
pub const COLOR_TOAST_ERROR: Color32 = Color32::from_rgb(170, 40, 40);

/// Toast fill for success notifications.
pub const COLOR_TOAST_SUCCESS: Color32 = Color32::from_rgb(30, 120, 60);

/// Toast fill for plain notifications.
pub const COLOR_TOAST_INFO: Color32 = Color32::from_rgb(50, 50, 70);
