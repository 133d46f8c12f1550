//! UI overlays using bevy_egui: model selector, controls, point form,
//! export, and toast notification

use std::time::Duration;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::window::FileDragAndDrop;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

use pointmap_core::{points_to_json, ModelSource, SourceError};

use crate::app::{Annotations, FormTarget, LoadProgress, PendingPoint, PendingSource};
use crate::model::CurrentModel;
use crate::placement::PlacementState;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SelectorState>()
            .init_resource::<PointFormState>()
            .init_resource::<ActiveToast>()
            .add_systems(Update, handle_dropped_files)
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

/// Which intake tab is active in the model selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SelectorTab {
    #[default]
    File,
    Url,
}

#[derive(Resource, Default)]
pub struct SelectorState {
    tab: SelectorTab,
    url: String,
    error: Option<String>,
}

/// Point form buffers. `active` marks that the buffers belong to the current
/// pending target, so reopening the form repopulates them.
#[derive(Resource, Default)]
pub struct PointFormState {
    active: bool,
    name: String,
    description: String,
}

pub const TOAST_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

/// Transient notification that auto-dismisses after its configured duration
#[derive(Debug)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    timer: Timer,
    dismissed: bool,
}

impl Toast {
    pub fn new(message: impl Into<String>, kind: ToastKind, duration: Duration) -> Self {
        Self {
            message: message.into(),
            kind,
            timer: Timer::new(duration, TimerMode::Once),
            dismissed: false,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Success, TOAST_DURATION)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Error, TOAST_DURATION)
    }

    /// Advance the toast. Returns true exactly once, on the tick its
    /// duration elapses.
    pub fn tick(&mut self, delta: Duration) -> bool {
        self.timer.tick(delta);
        if self.timer.finished() && !self.dismissed {
            self.dismissed = true;
            return true;
        }
        false
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed
    }

    pub fn remaining_fraction(&self) -> f32 {
        self.timer.fraction_remaining()
    }
}

#[derive(Resource, Default)]
pub struct ActiveToast(pub Option<Toast>);

/// Grouped system parameters for the main UI system to stay under Bevy's
/// system parameter limit
#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    pub contexts: EguiContexts<'w, 's>,
    pub selector: ResMut<'w, SelectorState>,
    pub pending_source: ResMut<'w, PendingSource>,
    pub model: ResMut<'w, CurrentModel>,
    pub progress: Res<'w, LoadProgress>,
    pub placement: ResMut<'w, PlacementState>,
    pub store: ResMut<'w, Annotations>,
    pub pending_point: ResMut<'w, PendingPoint>,
    pub form: ResMut<'w, PointFormState>,
    pub toast: ResMut<'w, ActiveToast>,
    pub time: Res<'w, Time>,
}

fn ui_system(mut params: UiParams) {
    let delta = params.time.delta();
    let Ok(ctx) = params.contexts.ctx_mut() else {
        return;
    };

    draw_toast(ctx, &mut params.toast, delta);

    // No source yet: the selector is the whole UI
    if params.model.source.is_none() && params.pending_source.0.is_none() {
        draw_model_selector(ctx, &mut params.selector, &mut params.pending_source);
        return;
    }

    // Load in flight or failed: progress overlay
    if !params.model.is_ready() {
        draw_loading_overlay(ctx, &mut params.model, &params.progress);
        return;
    }

    draw_controls(ctx, &mut params.placement);
    draw_export_button(ctx, &params.store, &mut params.toast);
    draw_point_form(
        ctx,
        &mut params.pending_point,
        &mut params.form,
        &mut params.store,
    );
}

fn draw_model_selector(
    ctx: &egui::Context,
    selector: &mut SelectorState,
    pending_source: &mut PendingSource,
) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() * 0.25);
            ui.heading("3D Point Mapper");
            ui.label("Load a GLB model to start mapping points");
            ui.add_space(16.0);

            ui.horizontal(|ui| {
                ui.selectable_value(&mut selector.tab, SelectorTab::File, "Open File");
                ui.selectable_value(&mut selector.tab, SelectorTab::Url, "From URL");
            });
            ui.add_space(12.0);

            match selector.tab {
                SelectorTab::File => {
                    if ui.button("Choose a .glb file\u{2026}").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("GLB model", &["glb"])
                            .pick_file()
                        {
                            // The dialog filter is advisory; validate anyway
                            select_source(
                                ModelSource::from_file(path.display().to_string()),
                                selector,
                                pending_source,
                            );
                        }
                    }
                }
                SelectorTab::Url => {
                    ui.add(
                        egui::TextEdit::singleline(&mut selector.url)
                            .hint_text("Enter GLB file URL")
                            .desired_width(320.0),
                    );
                    if ui.button("Load Model").clicked() {
                        select_source(
                            ModelSource::from_url(selector.url.clone()),
                            selector,
                            pending_source,
                        );
                    }
                }
            }

            if let Some(error) = &selector.error {
                ui.add_space(8.0);
                ui.colored_label(egui::Color32::from_rgb(255, 100, 100), error);
            }
        });
    });
}

/// Dropping a .glb anywhere on the window selects it as the source
fn handle_dropped_files(
    mut drops: MessageReader<FileDragAndDrop>,
    mut selector: ResMut<SelectorState>,
    mut pending_source: ResMut<PendingSource>,
    mut toast: ResMut<ActiveToast>,
) {
    for message in drops.read() {
        let FileDragAndDrop::DroppedFile { path_buf, .. } = message else {
            continue;
        };
        match ModelSource::from_file(path_buf.display().to_string()) {
            Ok(source) => {
                selector.error = None;
                pending_source.0 = Some(source);
            }
            Err(err) => {
                tracing::warn!("Rejected dropped file: {err}");
                toast.0 = Some(Toast::error("Please drop a GLB file"));
            }
        }
    }
}

fn select_source(
    result: Result<ModelSource, SourceError>,
    selector: &mut SelectorState,
    pending_source: &mut PendingSource,
) {
    match result {
        Ok(source) => {
            selector.error = None;
            pending_source.0 = Some(source);
        }
        Err(err) => {
            tracing::warn!("Rejected model source: {err}");
            selector.error = Some(err.to_string());
        }
    }
}

fn draw_loading_overlay(ctx: &egui::Context, model: &mut CurrentModel, progress: &LoadProgress) {
    egui::Window::new("Loading model")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
        .show(ctx, |ui| {
            ui.add(
                egui::ProgressBar::new(progress.value() as f32 / 100.0)
                    .desired_width(240.0)
                    .show_percentage(),
            );
            if let Some(error) = model.error.clone() {
                ui.add_space(8.0);
                ui.colored_label(
                    egui::Color32::from_rgb(255, 100, 100),
                    format!("Load failed: {error}"),
                );
                if ui.button("Choose another model").clicked() {
                    model.reset_after_failure();
                }
            }
        });
}

fn draw_controls(ctx: &egui::Context, placement: &mut PlacementState) {
    egui::Area::new(egui::Id::new("controls-panel"))
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(16.0, 16.0))
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                let label = if placement.placing {
                    "Cancel Point"
                } else {
                    "Add Point"
                };
                if ui.button(label).clicked() {
                    placement.placing = !placement.placing;
                    if !placement.placing {
                        placement.candidate = None;
                    }
                }
                if placement.placing {
                    ui.label("Click anywhere on the model to place a point");
                }
            });
        });
}

fn draw_export_button(ctx: &egui::Context, store: &Annotations, toast: &mut ActiveToast) {
    egui::Area::new(egui::Id::new("export-button"))
        .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-16.0, 16.0))
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                if ui.button("Export Points").clicked() {
                    match points_to_json(store.0.points()) {
                        Ok(json) => {
                            ctx.copy_text(json);
                            toast.0 = Some(Toast::success("Points data copied to clipboard"));
                        }
                        Err(err) => {
                            tracing::error!("Export failed: {err}");
                            toast.0 = Some(Toast::error("Failed to export points"));
                        }
                    }
                }
            });
        });
}

fn draw_point_form(
    ctx: &egui::Context,
    pending: &mut PendingPoint,
    form: &mut PointFormState,
    store: &mut Annotations,
) {
    let Some(target) = pending.0.clone() else {
        form.active = false;
        return;
    };

    if !form.active {
        form.active = true;
        match &target {
            FormTarget::New { .. } => {
                form.name.clear();
                form.description.clear();
            }
            FormTarget::Edit { id } => {
                if let Some(point) = store.0.get(*id) {
                    form.name = point.name.clone();
                    form.description = point.description.clone();
                }
            }
        }
    }

    let title = match &target {
        FormTarget::New { .. } => "Add Point",
        FormTarget::Edit { .. } => "Edit Point",
    };

    let mut close = false;
    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
        .show(ctx, |ui| {
            ui.label("Name:");
            ui.text_edit_singleline(&mut form.name);
            ui.label("Description:");
            ui.text_edit_multiline(&mut form.description);
            ui.add_space(8.0);

            // Both fields are required before the point can be saved
            let can_save = !form.name.trim().is_empty() && !form.description.trim().is_empty();
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(can_save, egui::Button::new("Save"))
                    .clicked()
                {
                    match target {
                        FormTarget::New { position } => {
                            let id = store.0.add(
                                position.to_array(),
                                form.name.trim(),
                                form.description.trim(),
                            );
                            tracing::info!(id, "point saved");
                        }
                        FormTarget::Edit { id } => {
                            store.0.update(id, form.name.trim(), form.description.trim());
                            tracing::info!(id, "point updated");
                        }
                    }
                    close = true;
                }
                if ui.button("Cancel").clicked() {
                    close = true;
                }
            });
        });

    if close {
        pending.0 = None;
        form.active = false;
    }
}

fn draw_toast(ctx: &egui::Context, slot: &mut ActiveToast, delta: Duration) {
    let Some(toast) = slot.0.as_mut() else {
        return;
    };

    if toast.tick(delta) {
        tracing::debug!("Toast dismissed: {}", toast.message);
    }
    if toast.is_dismissed() {
        slot.0 = None;
        return;
    }

    egui::Area::new(egui::Id::new("toast"))
        .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, 20.0))
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.horizontal(|ui| {
                    let icon = match toast.kind {
                        ToastKind::Success => "\u{2713}",
                        ToastKind::Error => "\u{2717}",
                    };
                    ui.label(icon);
                    ui.label(&toast.message);
                });
                // Progress strip draining over the toast's lifetime
                let width = 160.0 * toast.remaining_fraction();
                let (rect, _) =
                    ui.allocate_exact_size(egui::vec2(width.max(0.0), 2.0), egui::Sense::hover());
                ui.painter().rect_filled(
                    rect,
                    egui::CornerRadius::ZERO,
                    egui::Color32::from_white_alpha(96),
                );
            });
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_dismisses_exactly_once() {
        let mut toast = Toast::new("exported", ToastKind::Success, Duration::from_millis(100));
        assert!(!toast.tick(Duration::from_millis(50)));
        assert!(!toast.is_dismissed());

        // Crossing the configured duration fires the dismissal once
        assert!(toast.tick(Duration::from_millis(60)));
        assert!(toast.is_dismissed());

        // Further ticks never fire it again
        assert!(!toast.tick(Duration::from_millis(60)));
        assert!(!toast.tick(Duration::from_millis(1000)));
    }

    #[test]
    fn test_toast_progress_drains_over_duration() {
        let mut toast = Toast::new("exported", ToastKind::Success, Duration::from_millis(100));
        assert_eq!(toast.remaining_fraction(), 1.0);
        toast.tick(Duration::from_millis(50));
        assert!(toast.remaining_fraction() < 1.0);
        toast.tick(Duration::from_millis(100));
        assert_eq!(toast.remaining_fraction(), 0.0);
    }
}
