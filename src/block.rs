use crate::block_data::BlockData;
use crate::config::UploadConfig;
use crate::constants::{LOADER_DISPLAY_DELAY, UPLOAD_POLL_INTERVAL};
use crate::markup;
use crate::tool::{Notification, Notifier};
use crate::upload::{PendingUpload, UploadError, UploadResponse, Uploader};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the image region currently shows. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    /// Placeholder graphic; clicking it starts an upload.
    Empty,
    /// Loader shown while an upload runs or while its result is held back.
    Loading,
    /// The attached image is the region's background.
    Loaded,
    /// An upload failed; the loader is still up until the display delay ends.
    Failed,
}

/// Keys that can empty the rich-text region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Backspace,
    Delete,
    Other,
}

/// Live contents of the three editable regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditableRegions {
    pub text: String,
    pub title: String,
    pub description: String,
}

impl EditableRegions {
    fn from_data(data: &BlockData) -> Self {
        Self {
            text: data.text.clone(),
            title: data.title.clone(),
            description: data.description.clone(),
        }
    }
}

enum Settle {
    Loaded,
    Failed(&'static str),
}

struct ScheduledTransition {
    due: Instant,
    settle: Settle,
}

/// Owns one block's data and drives its image region through
/// `Empty -> Loading -> Loaded | Failed -> Empty`.
///
/// Time is passed in explicitly, so the delayed leave from `Loading` is a
/// stored deadline applied by [`poll`](Self::poll). Dropping or destroying the
/// controller discards the deadline and any upload still in flight.
pub struct BlockStateController {
    data: BlockData,
    config: Arc<UploadConfig>,
    regions: EditableRegions,
    visual: VisualState,
    uploader: Box<dyn Uploader>,
    notifier: Rc<dyn Notifier>,
    in_flight: Option<PendingUpload>,
    scheduled: Option<ScheduledTransition>,
    destroyed: bool,
}

impl BlockStateController {
    pub fn new(
        data: BlockData,
        config: Arc<UploadConfig>,
        uploader: Box<dyn Uploader>,
        notifier: Rc<dyn Notifier>,
    ) -> Self {
        let visual = if data.has_image() {
            VisualState::Loaded
        } else {
            VisualState::Empty
        };
        Self {
            regions: EditableRegions::from_data(&data),
            data,
            config,
            visual,
            uploader,
            notifier,
            in_flight: None,
            scheduled: None,
            destroyed: false,
        }
    }

    pub fn data(&self) -> &BlockData {
        &self.data
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn visual_state(&self) -> VisualState {
        self.visual
    }

    pub fn regions(&self) -> &EditableRegions {
        &self.regions
    }

    pub fn regions_mut(&mut self) -> &mut EditableRegions {
        &mut self.regions
    }

    /// URL to paint as the region's background, only once the image is shown.
    pub fn image_url(&self) -> Option<&str> {
        match self.visual {
            VisualState::Loaded => self.data.image.as_ref().map(|image| image.url.as_str()),
            _ => None,
        }
    }

    /// True while an upload is running or its result is still being held back.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
            || self.scheduled.is_some()
            || matches!(self.visual, VisualState::Loading | VisualState::Failed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // =========================================================================
    // USER EVENTS
    // =========================================================================

    /// Click on the image region. Starts an upload unless one is already
    /// running for this block. Returns whether an upload started.
    pub fn on_image_click(&mut self) -> bool {
        if !self.can_start_upload() {
            return false;
        }
        let visual = &mut self.visual;
        match self
            .uploader
            .prompt_and_upload(&mut || *visual = VisualState::Loading)
        {
            Some(pending) => {
                self.in_flight = Some(pending);
                true
            }
            None => {
                log::debug!("File selection cancelled");
                false
            }
        }
    }

    /// Paste of a remote image URL. Same state machine as a picked file.
    pub fn on_url_paste(&mut self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() || !self.can_start_upload() {
            return false;
        }
        let visual = &mut self.visual;
        let pending = self
            .uploader
            .upload_by_url(url, &mut || *visual = VisualState::Loading);
        self.in_flight = Some(pending);
        true
    }

    /// Click on the delete control. Detaches the image immediately.
    pub fn on_delete_click(&mut self) -> bool {
        if self.destroyed || self.is_busy() || self.data.image.is_none() {
            return false;
        }
        self.data.image = None;
        self.visual = VisualState::Empty;
        log::debug!("Image removed from block");
        true
    }

    /// Key release in the rich-text region.
    pub fn on_text_key(&mut self, key: EditKey) -> bool {
        match key {
            EditKey::Backspace | EditKey::Delete => markup::normalize_empty(&mut self.regions.text),
            EditKey::Other => false,
        }
    }

    fn can_start_upload(&self) -> bool {
        if self.destroyed {
            return false;
        }
        if self.is_busy() {
            log::debug!("Ignoring upload request while another is in flight");
            return false;
        }
        true
    }

    // =========================================================================
    // UPLOAD COMPLETION AND TIMERS
    // =========================================================================

    /// Applies a finished upload and any elapsed display delay.
    /// Returns true when something visible changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.destroyed {
            return false;
        }

        let mut changed = false;
        if let Some(pending) = self.in_flight.take() {
            match pending.try_finish() {
                Ok(Ok(response)) => {
                    self.upload_succeeded(response, now);
                    changed = true;
                }
                Ok(Err(err)) => {
                    self.upload_failed(err, now);
                    changed = true;
                }
                Err(pending) => self.in_flight = Some(pending),
            }
        }

        let due = matches!(&self.scheduled, Some(scheduled) if now >= scheduled.due);
        if due {
            if let Some(scheduled) = self.scheduled.take() {
                self.settle(scheduled.settle);
                changed = true;
            }
        }
        changed
    }

    /// How long the host may wait before the next [`poll`](Self::poll) matters.
    pub fn next_poll_in(&self, now: Instant) -> Option<Duration> {
        if self.destroyed {
            return None;
        }
        let timer = self
            .scheduled
            .as_ref()
            .map(|scheduled| scheduled.due.saturating_duration_since(now));
        let upload = self.in_flight.as_ref().map(|_| UPLOAD_POLL_INTERVAL);
        match (timer, upload) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn upload_succeeded(&mut self, response: UploadResponse, now: Instant) {
        log::info!("Image attached: {}", response.file.url);
        self.data.image = Some(response.file);
        self.scheduled = Some(ScheduledTransition {
            due: now + LOADER_DISPLAY_DELAY,
            settle: Settle::Loaded,
        });
    }

    fn upload_failed(&mut self, err: UploadError, now: Instant) {
        log::warn!("Image upload failed: {err}");
        self.visual = VisualState::Failed;
        self.scheduled = Some(ScheduledTransition {
            due: now + LOADER_DISPLAY_DELAY,
            settle: Settle::Failed(err.user_message()),
        });
    }

    fn settle(&mut self, settle: Settle) {
        match settle {
            Settle::Loaded => self.visual = VisualState::Loaded,
            Settle::Failed(message) => {
                self.visual = if self.data.has_image() {
                    VisualState::Loaded
                } else {
                    VisualState::Empty
                };
                self.notifier.show(Notification::error(message));
            }
        }
    }

    /// Cancels the pending display delay and drops any in-flight upload.
    /// Nothing fires after this.
    pub fn destroy(&mut self) {
        if self.in_flight.take().is_some() {
            log::debug!("Discarding in-flight upload of destroyed block");
        }
        self.scheduled = None;
        self.destroyed = true;
    }

    // =========================================================================
    // OUTPUT
    // =========================================================================

    /// Copies the trimmed region contents into the block data and returns it.
    pub fn save(&mut self) -> &BlockData {
        self.data.text = self.regions.text.trim().to_string();
        self.data.title = self.regions.title.trim().to_string();
        self.data.description = self.regions.description.trim().to_string();
        &self.data
    }

    /// A saved block is valid when its text has visible content.
    pub fn validate(saved: &BlockData) -> bool {
        !saved.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_data::ImageFile;
    use crate::constants::UPLOAD_FAILED_MESSAGE;
    use crate::tool::NotificationStyle;
    use crate::upload::{pending_upload, UploadCompleter};
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeUploader {
        cancel_dialog: Cell<bool>,
        calls: Cell<usize>,
        completers: RefCell<Vec<UploadCompleter>>,
        log: RefCell<Vec<&'static str>>,
        resolve_immediately: RefCell<Option<Result<UploadResponse, UploadError>>>,
    }

    impl FakeUploader {
        fn start(&self, on_preview_start: &mut dyn FnMut()) -> PendingUpload {
            self.calls.set(self.calls.get() + 1);
            on_preview_start();
            self.log.borrow_mut().push("preview");
            let (completer, pending) = pending_upload();
            match self.resolve_immediately.borrow_mut().take() {
                Some(outcome) => {
                    self.log.borrow_mut().push("resolved");
                    completer.complete(outcome);
                }
                None => self.completers.borrow_mut().push(completer),
            }
            pending
        }

        fn resolve(&self, outcome: Result<UploadResponse, UploadError>) {
            let completer = self.completers.borrow_mut().remove(0);
            self.log.borrow_mut().push("resolved");
            completer.complete(outcome);
        }
    }

    impl Uploader for Rc<FakeUploader> {
        fn prompt_and_upload(&self, on_preview_start: &mut dyn FnMut()) -> Option<PendingUpload> {
            if self.cancel_dialog.get() {
                return None;
            }
            Some(self.start(on_preview_start))
        }

        fn upload_by_url(&self, _url: &str, on_preview_start: &mut dyn FnMut()) -> PendingUpload {
            self.start(on_preview_start)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        shown: RefCell<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn show(&self, notification: Notification) {
            self.shown.borrow_mut().push(notification);
        }
    }

    struct Harness {
        controller: BlockStateController,
        uploader: Rc<FakeUploader>,
        notifier: Rc<RecordingNotifier>,
    }

    fn harness(data: BlockData) -> Harness {
        let uploader = Rc::new(FakeUploader::default());
        let notifier = Rc::new(RecordingNotifier::default());
        let controller = BlockStateController::new(
            data,
            Arc::new(UploadConfig::default()),
            Box::new(Rc::clone(&uploader)),
            notifier.clone(),
        );
        Harness {
            controller,
            uploader,
            notifier,
        }
    }

    fn success(url: &str) -> Result<UploadResponse, UploadError> {
        Ok(UploadResponse {
            file: ImageFile::new(url),
            body: json!({ "success": 1, "file": { "url": url } }),
        })
    }

    fn with_image(url: &str) -> BlockData {
        BlockData {
            text: "Hello".into(),
            image: Some(ImageFile::new(url)),
            ..BlockData::default()
        }
    }

    #[test]
    fn validate_depends_only_on_trimmed_text() {
        let mut data = with_image("https://x/y.png");
        data.title = "Title".into();
        data.description = "Description".into();
        assert!(BlockStateController::validate(&data));

        for text in ["", "   ", "\n\t "] {
            data.text = text.into();
            assert!(!BlockStateController::validate(&data));
        }

        let bare = BlockData {
            text: " x ".into(),
            ..BlockData::default()
        };
        assert!(BlockStateController::validate(&bare));
    }

    #[test]
    fn starts_empty_or_loaded_from_saved_data() {
        assert_eq!(harness(BlockData::default()).controller.visual_state(), VisualState::Empty);

        let restored = harness(with_image("https://x/y.png"));
        assert_eq!(restored.controller.visual_state(), VisualState::Loaded);
        assert_eq!(restored.controller.image_url(), Some("https://x/y.png"));
    }

    #[test]
    fn malformed_saved_image_renders_as_empty() {
        let data = BlockData::from_value(json!({ "text": "hi", "image": { "name": "y.png" } }));
        let h = harness(data);
        assert_eq!(h.controller.visual_state(), VisualState::Empty);
        assert_eq!(h.controller.image_url(), None);
    }

    #[test]
    fn successful_upload_shows_image_after_delay() {
        let mut h = harness(BlockData::default());
        let t0 = Instant::now();

        assert!(h.controller.on_image_click());
        assert_eq!(h.controller.visual_state(), VisualState::Loading);
        assert!(!h.controller.poll(t0));

        h.uploader.resolve(success("https://x/y.png"));
        assert!(h.controller.poll(t0));
        assert_eq!(h.controller.visual_state(), VisualState::Loading);
        assert_eq!(
            h.controller.data().image.as_ref().map(|i| i.url.as_str()),
            Some("https://x/y.png")
        );
        assert_eq!(h.controller.image_url(), None);

        assert!(!h.controller.poll(t0 + LOADER_DISPLAY_DELAY - Duration::from_millis(1)));
        assert_eq!(h.controller.visual_state(), VisualState::Loading);

        assert!(h.controller.poll(t0 + LOADER_DISPLAY_DELAY));
        assert_eq!(h.controller.visual_state(), VisualState::Loaded);
        assert_eq!(h.controller.image_url(), Some("https://x/y.png"));
        assert!(h.notifier.shown.borrow().is_empty());
        assert!(!h.controller.is_busy());
    }

    #[test]
    fn every_failure_kind_notifies_once_and_reverts() {
        let failures = [
            UploadError::Rejected("success flag was 0".into()),
            UploadError::Transport("connection refused".into()),
            UploadError::MalformedResponse("response has no file.url".into()),
        ];
        for failure in failures {
            let mut h = harness(BlockData::default());
            let t0 = Instant::now();
            h.controller.on_image_click();
            h.uploader.resolve(Err(failure));

            h.controller.poll(t0);
            assert_eq!(h.controller.visual_state(), VisualState::Failed);
            assert!(h.notifier.shown.borrow().is_empty());

            h.controller.poll(t0 + LOADER_DISPLAY_DELAY);
            assert_eq!(h.controller.visual_state(), VisualState::Empty);
            assert!(h.controller.data().image.is_none());

            let shown = h.notifier.shown.borrow();
            assert_eq!(shown.len(), 1);
            assert_eq!(shown[0].style, NotificationStyle::Error);
            assert_eq!(shown[0].message, UPLOAD_FAILED_MESSAGE);
            drop(shown);

            h.controller.poll(t0 + LOADER_DISPLAY_DELAY * 4);
            assert_eq!(h.notifier.shown.borrow().len(), 1);
        }
    }

    #[test]
    fn failed_replacement_keeps_previous_image() {
        let mut h = harness(with_image("https://x/old.png"));
        let t0 = Instant::now();
        assert!(h.controller.on_image_click());
        h.uploader.resolve(Err(UploadError::Rejected("HTTP 500".into())));
        h.controller.poll(t0);
        h.controller.poll(t0 + LOADER_DISPLAY_DELAY);

        assert_eq!(h.controller.visual_state(), VisualState::Loaded);
        assert_eq!(h.controller.image_url(), Some("https://x/old.png"));
        assert_eq!(h.notifier.shown.borrow().len(), 1);
    }

    #[test]
    fn delete_is_synchronous_and_offline() {
        let mut h = harness(with_image("https://x/y.png"));
        assert!(h.controller.on_delete_click());
        assert_eq!(h.controller.visual_state(), VisualState::Empty);
        assert!(h.controller.data().image.is_none());
        assert_eq!(h.uploader.calls.get(), 0);
        assert!(!h.controller.is_busy());

        assert!(!h.controller.on_delete_click());
    }

    #[test]
    fn only_one_upload_in_flight() {
        let mut h = harness(BlockData::default());
        let t0 = Instant::now();
        assert!(h.controller.on_image_click());
        assert!(!h.controller.on_image_click());
        assert!(!h.controller.on_url_paste("https://remote/cat.png"));
        assert_eq!(h.uploader.calls.get(), 1);

        h.uploader.resolve(success("https://x/y.png"));
        h.controller.poll(t0);
        assert!(!h.controller.on_image_click());
        assert!(!h.controller.on_delete_click());

        h.controller.poll(t0 + LOADER_DISPLAY_DELAY);
        assert!(h.controller.on_image_click());
        assert_eq!(h.uploader.calls.get(), 2);
    }

    #[test]
    fn preview_starts_before_an_instant_result() {
        let mut h = harness(BlockData::default());
        *h.uploader.resolve_immediately.borrow_mut() = Some(Err(UploadError::Transport("x".into())));
        let t0 = Instant::now();

        assert!(h.controller.on_image_click());
        assert_eq!(h.controller.visual_state(), VisualState::Loading);
        assert_eq!(*h.uploader.log.borrow(), vec!["preview", "resolved"]);

        h.controller.poll(t0);
        assert_eq!(h.controller.visual_state(), VisualState::Failed);
        h.controller.poll(t0 + LOADER_DISPLAY_DELAY);
        assert_eq!(h.controller.visual_state(), VisualState::Empty);
    }

    #[test]
    fn cancelled_dialog_leaves_block_untouched() {
        let mut h = harness(BlockData::default());
        h.uploader.cancel_dialog.set(true);
        assert!(!h.controller.on_image_click());
        assert_eq!(h.controller.visual_state(), VisualState::Empty);
        assert!(!h.controller.is_busy());
    }

    #[test]
    fn url_paste_runs_through_the_same_transitions() {
        let mut h = harness(BlockData::default());
        let t0 = Instant::now();
        assert!(!h.controller.on_url_paste("   "));
        assert!(h.controller.on_url_paste("https://remote/cat.png"));
        assert_eq!(h.controller.visual_state(), VisualState::Loading);

        h.uploader.resolve(success("https://x/cat.png"));
        h.controller.poll(t0);
        h.controller.poll(t0 + LOADER_DISPLAY_DELAY);
        assert_eq!(h.controller.image_url(), Some("https://x/cat.png"));
    }

    #[test]
    fn destroy_cancels_pending_transitions() {
        let mut h = harness(BlockData::default());
        let t0 = Instant::now();
        h.controller.on_image_click();
        h.uploader.resolve(Err(UploadError::Rejected("no".into())));
        h.controller.poll(t0);
        h.controller.destroy();
        assert!(h.controller.is_destroyed());

        assert!(!h.controller.poll(t0 + LOADER_DISPLAY_DELAY));
        assert!(h.notifier.shown.borrow().is_empty());
        assert_eq!(h.controller.next_poll_in(t0), None);
        assert!(!h.controller.on_image_click());
    }

    #[test]
    fn destroy_discards_in_flight_upload() {
        let mut h = harness(BlockData::default());
        h.controller.on_image_click();
        h.controller.destroy();
        h.uploader.resolve(success("https://x/y.png"));

        assert!(!h.controller.poll(Instant::now() + LOADER_DISPLAY_DELAY));
        assert!(h.controller.data().image.is_none());
    }

    #[test]
    fn next_poll_tracks_upload_and_delay() {
        let mut h = harness(BlockData::default());
        let t0 = Instant::now();
        assert_eq!(h.controller.next_poll_in(t0), None);

        h.controller.on_image_click();
        assert_eq!(h.controller.next_poll_in(t0), Some(UPLOAD_POLL_INTERVAL));

        h.uploader.resolve(success("https://x/y.png"));
        h.controller.poll(t0);
        assert_eq!(
            h.controller.next_poll_in(t0 + Duration::from_millis(200)),
            Some(Duration::from_millis(300))
        );
    }

    #[test]
    fn save_trims_regions_and_round_trips() {
        let mut h = harness(with_image("https://x/y.png"));
        {
            let regions = h.controller.regions_mut();
            regions.text = "  Hello <b>world</b>\n".into();
            regions.title = " Sunset ".into();
            regions.description = "   ".into();
        }
        let saved = h.controller.save().clone();
        assert_eq!(saved.text, "Hello <b>world</b>");
        assert_eq!(saved.title, "Sunset");
        assert_eq!(saved.description, "");
        assert_eq!(saved.image.as_ref().map(|i| i.url.as_str()), Some("https://x/y.png"));

        let restored = harness(BlockData::from_value(serde_json::to_value(&saved).unwrap()));
        assert_eq!(
            restored.controller.regions(),
            &EditableRegions {
                text: "Hello <b>world</b>".into(),
                title: "Sunset".into(),
                description: String::new(),
            }
        );
        assert_eq!(restored.controller.image_url(), Some("https://x/y.png"));
    }

    #[test]
    fn emptying_text_with_delete_keys_drops_line_break_artifact() {
        let mut h = harness(BlockData::default());
        h.controller.regions_mut().text = "<br>".into();
        assert!(!h.controller.on_text_key(EditKey::Other));
        assert_eq!(h.controller.regions().text, "<br>");
        assert!(h.controller.on_text_key(EditKey::Backspace));
        assert_eq!(h.controller.regions().text, "");

        h.controller.regions_mut().text = "a<br>".into();
        assert!(!h.controller.on_text_key(EditKey::Delete));
        assert_eq!(h.controller.save().text, "a<br>");
    }
}
