use crate::block::{BlockStateController, EditKey, VisualState};
use crate::constants::{
    CARD_CORNER_RADIUS, COLOR_DELETE_BUTTON, COLOR_DELETE_BUTTON_HOVER, COLOR_PLACEHOLDER_ICON,
    DELETE_BUTTON_OFFSET, DELETE_BUTTON_SIZE, DELETE_TOOLTIP, IMAGE_REGION_HEIGHT, LOADER_SIZE,
    PLACEHOLDER_ICON_SIZE, REGION_SPACING, TEXT_REGION_ROWS, UPLOAD_TOOLTIP,
};
use crate::markup::is_remote_url;
use crate::tool::EditorApi;
use egui::{vec2, Align2, Color32, FontId, Key, Rect, Rounding, Sense, TextEdit, Vec2};
use std::time::Instant;

/// Draws a text-image block and feeds its interactions back into the controller.
pub fn show_block(ui: &mut egui::Ui, controller: &mut BlockStateController, api: &EditorApi) {
    if controller.is_destroyed() {
        return;
    }
    let now = Instant::now();
    if controller.poll(now) {
        ui.ctx().request_repaint();
    }
    if let Some(wait) = controller.next_poll_in(now) {
        ui.ctx().request_repaint_after(wait);
    }

    api.styles.block.show(ui, |ui| {
        ui.vertical(|ui| {
            text_region(ui, controller);
            ui.add_space(REGION_SPACING);
            api.styles.input.show(ui, |ui| {
                image_region(ui, controller, api);
                ui.add_space(REGION_SPACING);

                let title_hint = controller.config().title_placeholder.clone();
                let description_hint = controller.config().description_placeholder.clone();
                let regions = controller.regions_mut();
                ui.add(
                    TextEdit::singleline(&mut regions.title)
                        .hint_text(title_hint)
                        .desired_width(f32::INFINITY),
                );
                ui.add(
                    TextEdit::singleline(&mut regions.description)
                        .hint_text(description_hint)
                        .desired_width(f32::INFINITY),
                );
            });
        });
    });
}

fn text_region(ui: &mut egui::Ui, controller: &mut BlockStateController) {
    let hint = controller.config().text_placeholder.clone();
    let response = ui.add(
        TextEdit::multiline(&mut controller.regions_mut().text)
            .hint_text(hint)
            .desired_rows(TEXT_REGION_ROWS)
            .desired_width(f32::INFINITY),
    );

    if response.has_focus() {
        let key = ui.input(|i| {
            if i.key_released(Key::Backspace) {
                EditKey::Backspace
            } else if i.key_released(Key::Delete) {
                EditKey::Delete
            } else {
                EditKey::Other
            }
        });
        controller.on_text_key(key);
    }
}

fn image_region(ui: &mut egui::Ui, controller: &mut BlockStateController, api: &EditorApi) {
    let size = vec2(ui.available_width(), IMAGE_REGION_HEIGHT);
    let (rect, response) = ui.allocate_exact_size(size, Sense::click());
    let rounding = Rounding::same(CARD_CORNER_RADIUS);
    let mut delete_clicked = false;

    match controller.visual_state() {
        VisualState::Empty => {
            let painter = ui.painter_at(rect);
            painter.rect_filled(rect, rounding, api.styles.placeholder);
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "🖼",
                FontId::proportional(PLACEHOLDER_ICON_SIZE),
                COLOR_PLACEHOLDER_ICON,
            );
        }
        VisualState::Loading | VisualState::Failed => {
            ui.painter_at(rect).rect_filled(rect, rounding, api.styles.loader);
            let spinner_rect = Rect::from_center_size(rect.center(), Vec2::splat(LOADER_SIZE));
            ui.put(spinner_rect, egui::Spinner::new().size(LOADER_SIZE));
        }
        VisualState::Loaded => {
            if let Some(url) = controller.image_url() {
                egui::Image::new(url.to_string())
                    .rounding(rounding)
                    .paint_at(ui, rect);
            }
            delete_clicked = delete_control(ui, rect, response.id, api);
        }
    }

    let response = match controller.visual_state() {
        VisualState::Empty => api.tooltip(response, UPLOAD_TOOLTIP),
        _ => response,
    };

    if delete_clicked {
        controller.on_delete_click();
    } else if response.clicked() {
        controller.on_image_click();
    } else if response.hovered() {
        let text_has_focus = ui.memory(|m| m.focused().is_some());
        if let Some(url) = ui.input(|i| pasted_url(&i.events, text_has_focus)) {
            controller.on_url_paste(&url);
        }
    }
}

/// A remote URL pasted over the image region. A focused text field takes
/// the paste itself, so nothing is uploaded then.
fn pasted_url(events: &[egui::Event], text_has_focus: bool) -> Option<String> {
    if text_has_focus {
        return None;
    }
    events
        .iter()
        .find_map(|event| match event {
            egui::Event::Paste(text) => Some(text.trim().to_string()),
            _ => None,
        })
        .filter(|text| is_remote_url(text))
}

fn delete_control(ui: &mut egui::Ui, region: Rect, region_id: egui::Id, api: &EditorApi) -> bool {
    let center = region.right_top()
        + vec2(
            -DELETE_BUTTON_SIZE / 2.0 - DELETE_BUTTON_OFFSET,
            DELETE_BUTTON_SIZE / 2.0 + DELETE_BUTTON_OFFSET,
        );
    let rect = Rect::from_center_size(center, Vec2::splat(DELETE_BUTTON_SIZE));
    let response = ui.interact(rect, region_id.with("delete"), Sense::click());

    let painter = ui.painter_at(region);
    painter.circle_filled(
        rect.center(),
        DELETE_BUTTON_SIZE / 2.0,
        if response.hovered() {
            COLOR_DELETE_BUTTON_HOVER
        } else {
            COLOR_DELETE_BUTTON
        },
    );
    painter.text(
        rect.center(),
        Align2::CENTER_CENTER,
        "x",
        FontId::monospace(DELETE_BUTTON_SIZE * 0.7),
        Color32::WHITE,
    );

    api.tooltip(response, DELETE_TOOLTIP).clicked()
}
