//! Temporary material simplification for offscreen passes.
//!
//! Rendering a whole scene into a small texture does not need normal maps,
//! ambient occlusion and friends, but each of them occupies a texture unit and
//! can push a draw over the device limit. Before the offscreen render every
//! material that supports extended maps has them stripped; right after the
//! render the exact same references are written back.
//!
//! The bracket is a scope guard: [`MaterialSimplificationCache::simplify`]
//! returns a [`SimplifiedScene`] that restores on drop, so a render can never
//! leave a scene simplified.

use crate::ecs::{RenderMesh, TextureId};
use crate::material::{MapSlot, Material};
use crate::scene::SceneGraph;
use glam::Vec2;
use hecs::Entity;
use std::collections::HashMap;
use std::ops::Deref;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimplifyError {
    /// A previous pass was never restored.
    #[error("simplification cache still holds {0} entries from a previous pass")]
    CacheNotDrained(usize),
}

/// Everything a simplify pass changes on one material.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialSnapshot {
    pub maps: [Option<TextureId>; 9],
    pub normal_scale: Vec2,
    pub displacement_scale: f32,
    pub displacement_bias: f32,
    pub ao_map_intensity: f32,
    pub light_map_intensity: f32,
    pub env_map_intensity: f32,
}

impl MaterialSnapshot {
    pub fn capture(material: &Material) -> Self {
        Self {
            maps: MapSlot::ALL.map(|slot| material.slot(slot)),
            normal_scale: material.normal_scale,
            displacement_scale: material.displacement_scale,
            displacement_bias: material.displacement_bias,
            ao_map_intensity: material.ao_map_intensity,
            light_map_intensity: material.light_map_intensity,
            env_map_intensity: material.env_map_intensity,
        }
    }

    /// Write the snapshot back verbatim.
    pub fn apply(&self, material: &mut Material) {
        for (slot, map) in MapSlot::ALL.iter().zip(self.maps) {
            *material.slot_mut(*slot) = map;
        }
        material.normal_scale = self.normal_scale;
        material.displacement_scale = self.displacement_scale;
        material.displacement_bias = self.displacement_bias;
        material.ao_map_intensity = self.ao_map_intensity;
        material.light_map_intensity = self.light_map_intensity;
        material.env_map_intensity = self.env_map_intensity;
    }
}

/// Strip every extended map and zero the scalars that only matter with them.
fn strip(material: &mut Material) {
    for slot in MapSlot::ALL {
        *material.slot_mut(slot) = None;
    }
    material.displacement_scale = 0.0;
    material.displacement_bias = 0.0;
    material.ao_map_intensity = 0.0;
    material.light_map_intensity = 0.0;
    material.env_map_intensity = 0.0;
    material.mark_dirty();
}

/// Snapshots of materials that are currently simplified, keyed by
/// `(entity, material slot)`.
#[derive(Debug, Default)]
pub struct MaterialSimplificationCache {
    entries: HashMap<(Entity, usize), MaterialSnapshot>,
}

impl MaterialSimplificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entity: Entity, slot: usize) -> bool {
        self.entries.contains_key(&(entity, slot))
    }

    /// Strip extended maps from every eligible material in `scene`.
    ///
    /// Fails without touching the scene if a previous pass was not restored.
    pub fn simplify<'a>(
        &'a mut self,
        scene: &'a mut SceneGraph,
    ) -> Result<SimplifiedScene<'a>, SimplifyError> {
        if !self.entries.is_empty() {
            return Err(SimplifyError::CacheNotDrained(self.entries.len()));
        }

        for (entity, mesh) in scene.world_mut().query_mut::<&mut RenderMesh>() {
            for (slot, material) in mesh.materials.iter_mut().enumerate() {
                if !material.kind.supports_extended_maps() {
                    continue;
                }
                let key = (entity, slot);
                if self.entries.contains_key(&key) {
                    continue;
                }
                self.entries.insert(key, MaterialSnapshot::capture(material));
                strip(material);
            }
        }

        log::trace!(
            "simplified {} materials in scene '{}'",
            self.entries.len(),
            scene.name()
        );

        Ok(SimplifiedScene {
            scene,
            cache: self,
            restored: false,
        })
    }

    /// Write every snapshot back into `scene` and drain the cache.
    ///
    /// Entries whose entity or slot disappeared in the meantime are dropped.
    fn restore(&mut self, scene: &mut SceneGraph) -> usize {
        let mut restored = 0;
        for ((entity, slot), snapshot) in self.entries.drain() {
            let Ok(mut mesh) = scene.world_mut().get::<&mut RenderMesh>(entity) else {
                log::debug!("simplified entity {entity:?} vanished before restore");
                continue;
            };
            match mesh.materials.get_mut(slot) {
                Some(material) => {
                    snapshot.apply(material);
                    material.mark_dirty();
                    restored += 1;
                }
                None => log::debug!("material slot {slot} of {entity:?} vanished before restore"),
            }
        }
        restored
    }
}

/// A scene with simplified materials. Dropping it restores the originals.
pub struct SimplifiedScene<'a> {
    scene: &'a mut SceneGraph,
    cache: &'a mut MaterialSimplificationCache,
    restored: bool,
}

impl SimplifiedScene<'_> {
    /// Number of materials currently simplified.
    pub fn simplified_count(&self) -> usize {
        self.cache.len()
    }

    /// Restore explicitly, returning how many materials were written back.
    pub fn restore(mut self) -> usize {
        self.restored = true;
        self.cache.restore(self.scene)
    }
}

impl Deref for SimplifiedScene<'_> {
    type Target = SceneGraph;

    fn deref(&self) -> &SceneGraph {
        &*self.scene
    }
}

impl Drop for SimplifiedScene<'_> {
    fn drop(&mut self) {
        if !self.restored {
            self.cache.restore(self.scene);
        }
    }
}
