//! 3D-anchored marker labels for stored points

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

use pointmap_core::Point;

use crate::app::{Annotations, FormTarget, PendingPoint};
use crate::scene::MainCamera;

pub struct MarkersPlugin;

impl Plugin for MarkersPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MarkerOverlay>()
            .add_systems(EguiPrimaryContextPass, draw_markers);
    }
}

/// How long the options row lingers after the pointer leaves a marker
const OPTIONS_GRACE: Duration = Duration::from_millis(300);
/// Removal animation length; the store delete is deferred until it ends
const REMOVAL_ANIMATION: Duration = Duration::from_millis(500);

/// Interaction phase of a single marker label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum MarkerPhase {
    #[default]
    Idle,
    Hovered,
    /// Pointer has left but the options row is still in its grace period
    OptionsRevealed,
    Removing,
}

#[derive(Debug, Default)]
struct MarkerState {
    phase: MarkerPhase,
    options_grace: Option<Timer>,
    removal: Option<Timer>,
}

/// Interaction state for every marker, owned here rather than scattered
/// across per-label flags. Selection is exclusive.
#[derive(Resource, Default)]
pub struct MarkerOverlay {
    selected: Option<u32>,
    states: HashMap<u32, MarkerState>,
}

/// One tick of the hover state machine
fn next_phase(phase: MarkerPhase, pointer_over: bool, grace_expired: bool) -> MarkerPhase {
    match phase {
        MarkerPhase::Removing => MarkerPhase::Removing,
        _ if pointer_over => MarkerPhase::Hovered,
        MarkerPhase::Hovered => MarkerPhase::OptionsRevealed,
        MarkerPhase::OptionsRevealed if grace_expired => MarkerPhase::Idle,
        other => other,
    }
}

/// Re-derive the visible label set from the store and draw each marker at
/// its reprojected screen position
fn draw_markers(
    mut contexts: EguiContexts,
    mut overlay: ResMut<MarkerOverlay>,
    mut store: ResMut<Annotations>,
    mut pending: ResMut<PendingPoint>,
    camera_query: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    time: Res<Time>,
) {
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };
    let Ok((camera, camera_transform)) = camera_query.single() else {
        return;
    };
    let overlay = overlay.as_mut();

    // Advance timers; collect removals whose animation just ended
    let mut expired_removals: Vec<u32> = Vec::new();
    for (&id, marker) in overlay.states.iter_mut() {
        if let Some(timer) = marker.removal.as_mut() {
            timer.tick(time.delta());
            if timer.just_finished() {
                expired_removals.push(id);
            }
        }
        if let Some(timer) = marker.options_grace.as_mut() {
            timer.tick(time.delta());
        }
    }
    if !expired_removals.is_empty() {
        for id in expired_removals {
            // The record may already be gone; remove() ignores unknown ids
            store.0.remove(id);
            tracing::debug!(id, "deferred point removal applied");
        }
        // Deleting renumbers the surviving points, so cached interaction
        // state would attach to the wrong labels - rebuild from scratch
        overlay.states.clear();
        overlay.selected = None;
    }

    // Drop state for ids that left the store through other paths
    let live: HashSet<u32> = store.0.points().iter().map(|p| p.id).collect();
    overlay.states.retain(|id, _| live.contains(id));
    if overlay.selected.is_some_and(|id| !live.contains(&id)) {
        overlay.selected = None;
    }

    let points: Vec<Point> = store.0.points().to_vec();
    let mut toggle: Option<u32> = None;
    let mut edit: Option<u32> = None;

    for point in &points {
        let world = Vec3::from_array(point.position);
        // Off-screen or behind-camera anchors simply don't draw this frame
        let Ok(screen) = camera.world_to_viewport(camera_transform, world) else {
            continue;
        };

        let selected = overlay.selected == Some(point.id);
        let marker = overlay.states.entry(point.id).or_default();
        let removing = marker.phase == MarkerPhase::Removing;
        let removal_fraction = marker.removal.as_ref().map(|t| t.fraction()).unwrap_or(0.0);

        let fill = if selected {
            egui::Color32::from_rgba_unmultiplied(60, 60, 60, 242)
        } else if marker.phase == MarkerPhase::Hovered {
            egui::Color32::from_rgba_unmultiplied(50, 50, 50, 242)
        } else {
            egui::Color32::from_rgba_unmultiplied(30, 30, 30, 242)
        };
        let label_text = if point.name.is_empty() {
            "\u{2022}".to_string()
        } else {
            point.name.clone()
        };

        let label = egui::Area::new(egui::Id::new(("point-marker", point.id)))
            .pivot(egui::Align2::CENTER_CENTER)
            .fixed_pos(egui::pos2(screen.x, screen.y))
            .show(ctx, |ui| {
                let opacity = if removing {
                    (1.0 - removal_fraction).max(0.0)
                } else if selected {
                    1.0
                } else {
                    0.9
                };
                ui.set_opacity(opacity);
                let scale = if removing {
                    1.0 - removal_fraction * 0.3
                } else if selected {
                    1.1
                } else {
                    1.0
                };
                let text = egui::RichText::new(label_text)
                    .color(egui::Color32::WHITE)
                    .size(14.0 * scale);
                ui.add(egui::Button::new(text).fill(fill))
            })
            .inner;

        let label_hovered = label.hovered();
        if label.clicked() && !removing {
            toggle = Some(point.id);
        }

        // Options row in its own area just below the label
        let show_options = !removing
            && matches!(
                marker.phase,
                MarkerPhase::Hovered | MarkerPhase::OptionsRevealed
            );
        let mut options_hovered = false;
        if show_options {
            let options = egui::Area::new(egui::Id::new(("point-marker-options", point.id)))
                .pivot(egui::Align2::CENTER_TOP)
                .fixed_pos(egui::pos2(screen.x, screen.y + 20.0))
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        if ui.button("Edit").clicked() {
                            edit = Some(point.id);
                        }
                        if ui.button("Delete").clicked() {
                            marker.phase = MarkerPhase::Removing;
                            marker.removal = Some(Timer::new(REMOVAL_ANIMATION, TimerMode::Once));
                        }
                    });
                });
            options_hovered = options.response.contains_pointer();
        }

        if marker.phase != MarkerPhase::Removing {
            let pointer_over = label_hovered || options_hovered;
            let grace_expired = marker.options_grace.as_ref().is_some_and(|t| t.finished());
            let was = marker.phase;
            marker.phase = next_phase(marker.phase, pointer_over, grace_expired);
            match (was, marker.phase) {
                (MarkerPhase::Hovered, MarkerPhase::OptionsRevealed) => {
                    marker.options_grace = Some(Timer::new(OPTIONS_GRACE, TimerMode::Once));
                }
                (_, MarkerPhase::Hovered) | (_, MarkerPhase::Idle) => {
                    marker.options_grace = None;
                }
                _ => {}
            }
        }
    }

    // Exclusive selection: a second marker displaces the first, clicking the
    // selected marker deselects it
    if let Some(id) = toggle {
        overlay.selected = if overlay.selected == Some(id) {
            None
        } else {
            Some(id)
        };
    }

    // Edit bypasses animation and goes straight to the form
    if let Some(id) = edit {
        if pending.0.is_none() {
            pending.0 = Some(FormTarget::Edit { id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_marker_hovers_on_pointer_enter() {
        assert_eq!(
            next_phase(MarkerPhase::Idle, true, false),
            MarkerPhase::Hovered
        );
    }

    #[test]
    fn test_pointer_exit_enters_grace_period() {
        assert_eq!(
            next_phase(MarkerPhase::Hovered, false, false),
            MarkerPhase::OptionsRevealed
        );
    }

    #[test]
    fn test_options_stay_revealed_until_grace_expires() {
        assert_eq!(
            next_phase(MarkerPhase::OptionsRevealed, false, false),
            MarkerPhase::OptionsRevealed
        );
        assert_eq!(
            next_phase(MarkerPhase::OptionsRevealed, false, true),
            MarkerPhase::Idle
        );
    }

    #[test]
    fn test_reentering_options_row_cancels_collapse() {
        assert_eq!(
            next_phase(MarkerPhase::OptionsRevealed, true, true),
            MarkerPhase::Hovered
        );
    }

    #[test]
    fn test_removing_is_terminal_for_hover_input() {
        assert_eq!(
            next_phase(MarkerPhase::Removing, true, false),
            MarkerPhase::Removing
        );
        assert_eq!(
            next_phase(MarkerPhase::Removing, false, true),
            MarkerPhase::Removing
        );
    }

    #[test]
    fn test_removal_timer_fires_exactly_once() {
        let mut timer = Timer::new(REMOVAL_ANIMATION, TimerMode::Once);
        timer.tick(Duration::from_millis(600));
        assert!(timer.just_finished());
        timer.tick(Duration::from_millis(100));
        assert!(!timer.just_finished());
    }

    #[test]
    fn test_deferred_delete_tolerates_missing_record() {
        // The point may have been removed through another path while the
        // animation played; the deferred delete must be a silent no-op
        let mut store = pointmap_core::PointStore::new();
        store.add([0.0, 0.0, 0.0], "A", "first");
        store.remove(1);
        store.remove(1);
        assert!(store.is_empty());
    }
}
