//! Bevy application setup and shared viewer state

use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;

use pointmap_core::{ModelSource, PointStore};

use crate::markers::MarkersPlugin;
use crate::model::ModelPlugin;
use crate::placement::PlacementPlugin;
use crate::scene::ScenePlugin;
use crate::ui::UiPlugin;

/// The in-memory annotation store. Session-local; survives model swaps but
/// not restarts.
#[derive(Resource, Default)]
pub struct Annotations(pub PointStore);

/// A source locator handed from the model selector to the loader
#[derive(Resource, Default)]
pub struct PendingSource(pub Option<ModelSource>);

/// Load progress as a 0-100 percentage, monotonically non-decreasing within
/// a single load. Reset when a new load starts, forced to 0 on failure.
#[derive(Debug, Default, Resource)]
pub struct LoadProgress(u8);

impl LoadProgress {
    /// Begin a new load at 0%.
    pub fn restart(&mut self) {
        self.0 = 0;
    }

    /// Report progress; values below the current one are ignored.
    pub fn report(&mut self, percent: u8) {
        self.0 = self.0.max(percent.min(100));
    }

    /// A failed load shows 0% rather than a stale value.
    pub fn fail(&mut self) {
        self.0 = 0;
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// The point currently waiting on the form: freshly placed, or an existing
/// record being edited. At most one exists at any time.
#[derive(Debug, Clone, PartialEq)]
pub enum FormTarget {
    New { position: Vec3 },
    Edit { id: u32 },
}

#[derive(Resource, Default)]
pub struct PendingPoint(pub Option<FormTarget>);

/// Orbit camera controller settings
#[derive(Debug, Clone, Resource)]
pub struct CameraSettings {
    pub distance: f32,
    pub target_distance: f32, // For smooth zoom
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            distance: 10.0,
            target_distance: 10.0,
            azimuth: 0.785, // Start rotated ~45 degrees
            elevation: 0.34, // Slightly elevated view
            target: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
            min_distance: 0.5,
            max_distance: 100.0,
        }
    }
}

/// Run the Bevy application
pub fn run() {
    App::new()
        .insert_resource(ClearColor(Color::srgb(0.08, 0.08, 0.1)))
        .insert_resource(WinitSettings::default())
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Pointmap".to_string(),
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Sources are absolute paths or URLs, not files under assets/
                    file_path: "".to_string(),
                    // Don't look for .meta files - remote servers won't have them
                    meta_check: bevy::asset::AssetMetaCheck::Never,
                    ..default()
                }),
        )
        .add_plugins(EguiPlugin::default())
        .init_resource::<Annotations>()
        .init_resource::<PendingSource>()
        .init_resource::<LoadProgress>()
        .init_resource::<PendingPoint>()
        .init_resource::<CameraSettings>()
        .add_plugins(ScenePlugin)
        .add_plugins(ModelPlugin)
        .add_plugins(PlacementPlugin)
        .add_plugins(MarkersPlugin)
        .add_plugins(UiPlugin)
        .run();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_progress_is_monotonic_within_a_load() {
        let mut progress = LoadProgress::default();
        progress.report(40);
        progress.report(25);
        assert_eq!(progress.value(), 40);
        progress.report(100);
        assert_eq!(progress.value(), 100);
    }

    #[test]
    fn test_load_progress_restart_and_fail_reset_to_zero() {
        let mut progress = LoadProgress::default();
        progress.report(80);
        progress.restart();
        assert_eq!(progress.value(), 0);
        progress.report(130);
        assert_eq!(progress.value(), 100);
        progress.fail();
        assert_eq!(progress.value(), 0);
    }
}
