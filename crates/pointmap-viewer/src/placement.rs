//! Per-frame pointer raycasting and point placement

use bevy::picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings};
use bevy::prelude::*;
use bevy::render::alpha::AlphaMode;
use bevy_egui::EguiContexts;

use crate::app::{FormTarget, PendingPoint};
use crate::model::{CurrentModel, ModelBounds};
use crate::scene::MainCamera;

pub struct PlacementPlugin;

impl Plugin for PlacementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlacementState>()
            .init_resource::<IndicatorHandle>()
            .add_systems(
                Update,
                (update_candidate, commit_candidate, sync_indicator).chain(),
            );
    }
}

/// Hits farther than this many bounding-box extents from the model center
/// are treated as background geometry, not anchors.
pub const CANDIDATE_RANGE_FACTOR: f32 = 1.5;

/// Transient placement interaction state. Single-writer, never persisted.
#[derive(Resource, Default)]
pub struct PlacementState {
    pub placing: bool,
    pub candidate: Option<Vec3>,
}

/// Marker component for placement indicator geometry, excluded from raycasts
#[derive(Component)]
pub struct IndicatorGeometry;

#[derive(Resource, Default)]
struct IndicatorHandle {
    root: Option<Entity>,
    scale: f32,
}

/// True when a hit is close enough to the model to be a plausible anchor
fn accepts_hit(point: Vec3, center: Vec3, max_dim: f32) -> bool {
    point.distance(center) < max_dim * CANDIDATE_RANGE_FACTOR
}

/// The anchor candidate for this tick: the nearest qualifying hit, or None
/// when placement is off or no model is loaded.
fn candidate_for_tick(
    placing: bool,
    model_ready: bool,
    hits_nearest_first: impl IntoIterator<Item = Vec3>,
    center: Vec3,
    max_dim: f32,
) -> Option<Vec3> {
    if !placing || !model_ready {
        return None;
    }
    hits_nearest_first
        .into_iter()
        .find(|point| accepts_hit(*point, center, max_dim))
}

/// Project the cursor through the camera and intersect the scene. Runs every
/// frame; bounded by scene intersection cost.
fn update_candidate(
    mut state: ResMut<PlacementState>,
    model: Res<CurrentModel>,
    bounds: Res<ModelBounds>,
    windows: Query<&Window>,
    camera_query: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    indicator_query: Query<(), With<IndicatorGeometry>>,
    mut ray_cast: MeshRayCast,
) {
    if !state.placing || !model.is_ready() || !bounds.is_ready() {
        state.candidate = None;
        return;
    }

    let cursor = windows.single().ok().and_then(|w| w.cursor_position());
    let Some(cursor) = cursor else {
        state.candidate = None;
        return;
    };
    let Ok((camera, camera_transform)) = camera_query.single() else {
        state.candidate = None;
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, cursor) else {
        state.candidate = None;
        return;
    };

    // The indicator must not capture the raycast that positions it
    let filter = |entity: Entity| !indicator_query.contains(entity);
    let settings = MeshRayCastSettings::default()
        .with_filter(&filter)
        .never_early_exit();
    let hits = ray_cast.cast_ray(ray, &settings);

    state.candidate = candidate_for_tick(
        true,
        true,
        hits.iter().map(|(_, hit)| hit.point),
        bounds.center,
        bounds.max_dim,
    );
}

/// A click with a live candidate commits it as the pending point and leaves
/// placement mode. The click is consumed here; marker and camera interaction
/// never see it.
fn commit_candidate(
    mut state: ResMut<PlacementState>,
    mut pending: ResMut<PendingPoint>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut contexts: EguiContexts,
) {
    if !state.placing || !mouse_button.just_pressed(MouseButton::Left) {
        return;
    }

    // Clicks over UI belong to the UI
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input() || ctx.is_pointer_over_area())
        .unwrap_or(false);
    if egui_wants_pointer {
        return;
    }

    let Some(position) = state.candidate else {
        return; // No qualifying hit under the pointer
    };
    if pending.0.is_some() {
        return; // A point is already being created or edited
    }

    pending.0 = Some(FormTarget::New { position });
    state.placing = false;
    state.candidate = None;
    tracing::debug!(
        "Placement committed at ({:.3}, {:.3}, {:.3})",
        position.x,
        position.y,
        position.z
    );
}

/// Pulsing ring-and-sphere indicator that tracks the current candidate.
/// Rebuilt when the model scale changes so it stays proportionate.
fn sync_indicator(
    mut commands: Commands,
    mut indicator: ResMut<IndicatorHandle>,
    state: Res<PlacementState>,
    bounds: Res<ModelBounds>,
    time: Res<Time>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut indicator_query: Query<(&mut Transform, &mut Visibility), With<IndicatorGeometry>>,
) {
    if bounds.is_ready() && indicator.scale != bounds.max_dim {
        if let Some(root) = indicator.root.take() {
            commands.entity(root).despawn();
        }

        let ring_radius = bounds.max_dim * 0.04;
        let ring_material = materials.add(StandardMaterial {
            base_color: Color::srgba(1.0, 1.0, 1.0, 0.3),
            unlit: true,
            alpha_mode: AlphaMode::Blend,
            ..default()
        });
        let core_material = materials.add(StandardMaterial {
            base_color: Color::srgba(1.0, 1.0, 1.0, 0.5),
            unlit: true,
            alpha_mode: AlphaMode::Blend,
            ..default()
        });
        let ring_mesh = meshes.add(Torus {
            minor_radius: ring_radius * 0.12,
            major_radius: ring_radius,
        });

        let root = commands
            .spawn((Transform::default(), Visibility::Hidden, IndicatorGeometry))
            .with_children(|parent| {
                // Two perpendicular rings around a translucent core
                parent.spawn((
                    Mesh3d(ring_mesh.clone()),
                    MeshMaterial3d(ring_material.clone()),
                    IndicatorGeometry,
                ));
                parent.spawn((
                    Mesh3d(ring_mesh),
                    MeshMaterial3d(ring_material),
                    Transform::from_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)),
                    IndicatorGeometry,
                ));
                parent.spawn((
                    Mesh3d(meshes.add(Sphere::new(ring_radius * 0.4))),
                    MeshMaterial3d(core_material),
                    IndicatorGeometry,
                ));
            })
            .id();
        indicator.root = Some(root);
        indicator.scale = bounds.max_dim;
    }

    let Some(root) = indicator.root else {
        return;
    };
    let Ok((mut transform, mut visibility)) = indicator_query.get_mut(root) else {
        return;
    };

    match state.candidate {
        Some(position) if state.placing => {
            *visibility = Visibility::Visible;
            let t = time.elapsed_secs();
            transform.translation = position;
            transform.rotation = Quat::from_rotation_y(t);
            transform.scale = Vec3::splat(1.0 + (t * 2.0).sin() * 0.1);
        }
        _ => {
            *visibility = Visibility::Hidden;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_DIM: f32 = 2.0;

    #[test]
    fn test_no_candidate_while_placement_off() {
        // Even a perfect surface hit is ignored when the mode is off
        let hits = vec![Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0)];
        assert_eq!(
            candidate_for_tick(false, true, hits, Vec3::ZERO, MAX_DIM),
            None
        );
    }

    #[test]
    fn test_no_candidate_without_model() {
        let hits = vec![Vec3::ZERO];
        assert_eq!(
            candidate_for_tick(true, false, hits, Vec3::ZERO, MAX_DIM),
            None
        );
    }

    #[test]
    fn test_hit_at_surface_center_always_accepted() {
        assert!(accepts_hit(Vec3::ZERO, Vec3::ZERO, MAX_DIM));
    }

    #[test]
    fn test_distance_filter_boundary() {
        let center = Vec3::ZERO;
        assert!(accepts_hit(Vec3::new(2.9, 0.0, 0.0), center, MAX_DIM));
        // Exactly 1.5x the extent is already out of range
        assert!(!accepts_hit(Vec3::new(3.0, 0.0, 0.0), center, MAX_DIM));
        assert!(!accepts_hit(Vec3::new(50.0, 0.0, 0.0), center, MAX_DIM));
    }

    #[test]
    fn test_first_qualifying_hit_wins() {
        // Nearest-first hit order: background geometry in front is skipped,
        // then the first in-range hit is taken
        let hits = vec![
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.5, 0.0, 0.0),
        ];
        assert_eq!(
            candidate_for_tick(true, true, hits, Vec3::ZERO, MAX_DIM),
            Some(Vec3::new(1.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_candidate_cleared_when_mode_toggles_off() {
        let center = Vec3::ZERO;
        let hits = vec![Vec3::new(MAX_DIM * 0.5, 0.0, 0.0)];

        let on = candidate_for_tick(true, true, hits.clone(), center, MAX_DIM);
        assert_eq!(on, Some(Vec3::new(1.0, 0.0, 0.0)));

        // Same pointer, same hits, next tick with the mode off
        let off = candidate_for_tick(false, true, hits, center, MAX_DIM);
        assert_eq!(off, None);
    }

    #[test]
    fn test_no_qualifying_hit_clears_candidate() {
        let hits = vec![Vec3::new(100.0, 0.0, 0.0)];
        assert_eq!(
            candidate_for_tick(true, true, hits, Vec3::ZERO, MAX_DIM),
            None
        );
    }
}
