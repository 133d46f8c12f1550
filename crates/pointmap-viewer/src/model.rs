//! GLB model loading and view-space normalization

use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy::bevy_camera::primitives::MeshAabb;

use pointmap_core::ModelSource;

use crate::app::{CameraSettings, LoadProgress, PendingSource};
use crate::scene::MainCamera;

pub struct ModelPlugin;

impl Plugin for ModelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CurrentModel>()
            .init_resource::<ModelBounds>()
            .add_systems(Update, (begin_load, poll_load, normalize_model).chain());
    }
}

/// Marker component for the root entity of the loaded model scene
#[derive(Component)]
pub struct ModelRoot;

/// The model occupying the viewer slot. Owns the asset handles and the
/// spawned scene root; replacing the source releases both.
#[derive(Resource, Default)]
pub struct CurrentModel {
    pub source: Option<ModelSource>,
    loading: Option<Handle<Gltf>>,
    pub root: Option<Entity>,
    pub normalized: bool,
    pub error: Option<String>,
}

impl CurrentModel {
    pub fn is_ready(&self) -> bool {
        self.root.is_some() && self.normalized
    }

    /// Return to the empty-model state after a failed load so the user can
    /// pick another source. Only valid while nothing is spawned.
    pub fn reset_after_failure(&mut self) {
        self.source = None;
        self.loading = None;
        self.normalized = false;
        self.error = None;
    }
}

/// Bounding-box metrics of the loaded model, recorded after recentering
/// (so `center` is the origin). `max_dim == 0.0` means no model.
#[derive(Debug, Clone, Copy, Resource, Default)]
pub struct ModelBounds {
    pub size: Vec3,
    pub center: Vec3,
    pub max_dim: f32,
}

impl ModelBounds {
    pub fn is_ready(&self) -> bool {
        self.max_dim > 0.0
    }
}

/// Camera framing derived from the model's largest bounding-box extent.
/// Scale-invariant: works the same for millimeter and kilometer models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

pub fn camera_frame(max_dim: f32) -> CameraFrame {
    let distance = max_dim * 2.0;
    CameraFrame {
        near: max_dim * 0.001,
        far: max_dim * 100.0,
        position: Vec3::new(distance, distance * 0.5, distance),
    }
}

/// Size, center, and largest extent of an axis-aligned box.
pub fn bounds_metrics(min: Vec3, max: Vec3) -> (Vec3, Vec3, f32) {
    let size = max - min;
    let center = (min + max) * 0.5;
    let max_dim = size.x.max(size.y).max(size.z);
    (size, center, max_dim)
}

/// Start loading a newly selected source, releasing the previous model first.
fn begin_load(
    mut commands: Commands,
    mut pending: ResMut<PendingSource>,
    mut model: ResMut<CurrentModel>,
    mut bounds: ResMut<ModelBounds>,
    mut progress: ResMut<LoadProgress>,
    asset_server: Res<AssetServer>,
) {
    let Some(source) = pending.0.take() else {
        return;
    };

    // Release the previous handle before the new load begins - despawning the
    // root drops the scene's geometry and materials with it
    if let Some(root) = model.root.take() {
        commands.entity(root).despawn();
    }
    model.loading = None;
    model.normalized = false;
    model.error = None;
    *bounds = ModelBounds::default();
    progress.restart();

    tracing::info!("Loading model from {}", source.locator());
    let handle: Handle<Gltf> = asset_server.load(source.locator().to_string());
    model.loading = Some(handle);
    model.source = Some(source);
}

/// Poll the in-flight load and spawn the scene once the glTF is parsed
fn poll_load(
    mut commands: Commands,
    mut model: ResMut<CurrentModel>,
    mut progress: ResMut<LoadProgress>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
) {
    let Some(handle) = model.loading.clone() else {
        return;
    };

    match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) => {
            let Some(gltf) = gltf_assets.get(&handle) else {
                return;
            };
            let scene_handle = gltf
                .default_scene
                .clone()
                .or_else(|| gltf.scenes.first().cloned());
            let Some(scene_handle) = scene_handle else {
                tracing::error!("Model loaded but contains no scenes");
                model.error = Some("model contains no scenes".to_string());
                model.loading = None;
                progress.fail();
                return;
            };

            let root = commands.spawn((SceneRoot(scene_handle), ModelRoot)).id();
            model.root = Some(root);
            model.loading = None;
            progress.report(100);
            tracing::info!("Model loaded");
        }
        Some(LoadState::Failed(err)) => {
            tracing::error!("Failed to load model: {err}");
            model.error = Some(err.to_string());
            model.loading = None;
            progress.fail();
        }
        _ => {
            // Still loading; byte progress is not observable through the
            // asset server, so the percentage stays put until completion
        }
    }
}

/// Recenter the loaded model at the origin, frame the camera from its bounds,
/// and apply the uniform presentation finish. Runs once per loaded model.
#[allow(clippy::too_many_arguments)]
fn normalize_model(
    mut model: ResMut<CurrentModel>,
    mut bounds: ResMut<ModelBounds>,
    mut camera_settings: ResMut<CameraSettings>,
    mut projections: Query<&mut Projection, With<MainCamera>>,
    mut roots: Query<&mut Transform, With<ModelRoot>>,
    children: Query<&Children>,
    mesh_query: Query<(&Mesh3d, &GlobalTransform)>,
    meshes: Res<Assets<Mesh>>,
    material_query: Query<&MeshMaterial3d<StandardMaterial>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if model.normalized {
        return;
    }
    let Some(root) = model.root else {
        return;
    };

    // The glTF scene spawns asynchronously; wait until meshes exist under
    // the root and their world transforms have propagated
    let Some((min, max)) = collect_bounds(root, &children, &mesh_query, meshes.as_ref()) else {
        return;
    };

    let (size, center, max_dim) = bounds_metrics(min, max);
    if max_dim <= 0.0 {
        tracing::warn!("Model has degenerate bounds, skipping normalization");
        model.normalized = true;
        return;
    }

    // Subtract the bounding-box center rather than zeroing the position -
    // the two differ when geometry is not centered on its own origin
    if let Ok(mut transform) = roots.get_mut(root) {
        transform.translation -= center;
    }

    let frame = camera_frame(max_dim);
    if let Ok(mut projection) = projections.single_mut() {
        if let Projection::Perspective(ref mut perspective) = *projection {
            perspective.near = frame.near;
            perspective.far = frame.far;
        }
    }

    // Re-aim the orbit controller at the recentred model
    let radius = frame.position.length();
    camera_settings.target = Vec3::ZERO;
    camera_settings.distance = radius;
    camera_settings.target_distance = radius;
    camera_settings.azimuth = frame.position.z.atan2(frame.position.x);
    camera_settings.elevation = (frame.position.y / radius).asin();
    camera_settings.min_distance = radius * 0.25;
    camera_settings.max_distance = radius * 4.0;

    // Uniform presentation finish on every mesh in the hierarchy
    let mut finished = 0;
    for entity in std::iter::once(root).chain(children.iter_descendants(root)) {
        if let Ok(material_handle) = material_query.get(entity) {
            if let Some(material) = materials.get_mut(&material_handle.0) {
                material.perceptual_roughness = 0.5;
                material.metallic = 0.5;
                finished += 1;
            }
        }
    }

    *bounds = ModelBounds {
        size,
        center: Vec3::ZERO,
        max_dim,
    };
    model.normalized = true;

    tracing::info!(
        "Model normalized: size=({:.3}, {:.3}, {:.3}), max_dim={:.3}, {} materials",
        size.x,
        size.y,
        size.z,
        max_dim,
        finished
    );
}

/// Merged world-space AABB over every mesh under `root`, or None while the
/// scene has no meshes yet
fn collect_bounds(
    root: Entity,
    children: &Query<&Children>,
    mesh_query: &Query<(&Mesh3d, &GlobalTransform)>,
    meshes: &Assets<Mesh>,
) -> Option<(Vec3, Vec3)> {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    let mut found = false;

    for entity in std::iter::once(root).chain(children.iter_descendants(root)) {
        let Ok((mesh_handle, global)) = mesh_query.get(entity) else {
            continue;
        };
        let Some(mesh) = meshes.get(&mesh_handle.0) else {
            continue;
        };
        let Some(aabb) = mesh.compute_aabb() else {
            continue;
        };
        let center = Vec3::from(aabb.center);
        let half = Vec3::from(aabb.half_extents);
        for corner in aabb_corners(center, half) {
            let world = global.transform_point(corner);
            min = min.min(world);
            max = max.max(world);
        }
        found = true;
    }

    found.then_some((min, max))
}

fn aabb_corners(center: Vec3, half: Vec3) -> [Vec3; 8] {
    let mut corners = [Vec3::ZERO; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let sign = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        *corner = center + half * sign;
    }
    corners
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_camera_frame_for_two_unit_model() {
        // A (2,2,2) box frames to near=0.002, far=200, camera at (4,2,4)
        let frame = camera_frame(2.0);
        assert_relative_eq!(frame.near, 0.002);
        assert_relative_eq!(frame.far, 200.0);
        assert_eq!(frame.position, Vec3::new(4.0, 2.0, 4.0));
    }

    #[test]
    fn test_camera_frame_scale_invariance() {
        let small = camera_frame(0.002);
        let large = camera_frame(2000.0);
        assert!(small.near < small.far);
        assert!(large.near < large.far);
        assert_relative_eq!(small.far / small.near, large.far / large.near);
    }

    #[test]
    fn test_bounds_metrics_off_origin_box() {
        let (size, center, max_dim) =
            bounds_metrics(Vec3::new(4.0, 4.0, 4.0), Vec3::new(6.0, 6.0, 6.0));
        assert_eq!(size, Vec3::splat(2.0));
        assert_eq!(center, Vec3::splat(5.0));
        assert_relative_eq!(max_dim, 2.0);
    }

    #[test]
    fn test_recentering_is_idempotent() {
        let min = Vec3::new(4.0, 4.0, 4.0);
        let max = Vec3::new(6.0, 6.0, 6.0);
        let (_, center, _) = bounds_metrics(min, max);

        // After translating by -center the box is centered at the origin,
        // so a second pass computes a zero offset
        let (_, center2, _) = bounds_metrics(min - center, max - center);
        assert_eq!(center2, Vec3::ZERO);
    }

    #[test]
    fn test_aabb_corners_span_the_box() {
        let corners = aabb_corners(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(0.5));
        let min = corners.iter().copied().reduce(Vec3::min).unwrap();
        let max = corners.iter().copied().reduce(Vec3::max).unwrap();
        assert_eq!(min, Vec3::new(0.5, 1.5, 2.5));
        assert_eq!(max, Vec3::new(1.5, 2.5, 3.5));
    }
}
