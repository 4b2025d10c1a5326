//! Surface materials attached to renderable entities.
//!
//! A [`Material`] mirrors the usual PBR layout: a base color map plus a set of
//! *extended* maps (normal, roughness, metalness, ...) that each occupy a texture
//! unit when the material is drawn. [`MaterialKind::Basic`] materials only ever
//! use the base map; the other kinds can carry every extended map.

use crate::color::Color;
use crate::ecs::TextureId;
use glam::Vec2;

/// Which shading model a material uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaterialKind {
    /// Unlit, base color map only.
    Basic,
    /// Metallic/roughness PBR.
    #[default]
    Standard,
    /// Standard plus clearcoat/sheen style extras.
    Physical,
}

impl MaterialKind {
    /// Whether this kind can bind maps beyond the base color map.
    pub fn supports_extended_maps(self) -> bool {
        !matches!(self, MaterialKind::Basic)
    }
}

/// The non-essential texture maps of a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapSlot {
    Normal,
    Roughness,
    Metalness,
    AmbientOcclusion,
    Displacement,
    Alpha,
    Light,
    Environment,
    Emissive,
}

impl MapSlot {
    pub const ALL: [MapSlot; 9] = [
        MapSlot::Normal,
        MapSlot::Roughness,
        MapSlot::Metalness,
        MapSlot::AmbientOcclusion,
        MapSlot::Displacement,
        MapSlot::Alpha,
        MapSlot::Light,
        MapSlot::Environment,
        MapSlot::Emissive,
    ];
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    pub color: Color,
    /// Base color map.
    pub map: Option<TextureId>,

    pub normal_map: Option<TextureId>,
    pub normal_scale: Vec2,
    pub roughness_map: Option<TextureId>,
    pub metalness_map: Option<TextureId>,
    pub ao_map: Option<TextureId>,
    pub ao_map_intensity: f32,
    pub displacement_map: Option<TextureId>,
    pub displacement_scale: f32,
    pub displacement_bias: f32,
    pub alpha_map: Option<TextureId>,
    pub light_map: Option<TextureId>,
    pub light_map_intensity: f32,
    pub env_map: Option<TextureId>,
    pub env_map_intensity: f32,
    pub emissive_map: Option<TextureId>,
    pub emissive_intensity: f32,

    /// Bumped whenever the material changes in a way that needs the renderer to
    /// rebuild its bindings.
    pub version: u32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            kind: MaterialKind::Standard,
            color: Color::WHITE,
            map: None,
            normal_map: None,
            normal_scale: Vec2::ONE,
            roughness_map: None,
            metalness_map: None,
            ao_map: None,
            ao_map_intensity: 1.0,
            displacement_map: None,
            displacement_scale: 1.0,
            displacement_bias: 0.0,
            alpha_map: None,
            light_map: None,
            light_map_intensity: 1.0,
            env_map: None,
            env_map_intensity: 1.0,
            emissive_map: None,
            emissive_intensity: 1.0,
            version: 0,
        }
    }
}

impl Material {
    /// A standard PBR material tinted with `color`.
    pub fn standard(color: Color) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    /// An unlit material, typically showing a single texture.
    pub fn basic(color: Color) -> Self {
        Self {
            kind: MaterialKind::Basic,
            color,
            ..Default::default()
        }
    }

    /// Set the base color map.
    pub fn with_map(mut self, texture: TextureId) -> Self {
        self.map = Some(texture);
        self
    }

    /// Set one of the extended maps.
    pub fn with_slot(mut self, slot: MapSlot, texture: TextureId) -> Self {
        *self.slot_mut(slot) = Some(texture);
        self
    }

    pub fn slot(&self, slot: MapSlot) -> Option<TextureId> {
        match slot {
            MapSlot::Normal => self.normal_map,
            MapSlot::Roughness => self.roughness_map,
            MapSlot::Metalness => self.metalness_map,
            MapSlot::AmbientOcclusion => self.ao_map,
            MapSlot::Displacement => self.displacement_map,
            MapSlot::Alpha => self.alpha_map,
            MapSlot::Light => self.light_map,
            MapSlot::Environment => self.env_map,
            MapSlot::Emissive => self.emissive_map,
        }
    }

    pub fn slot_mut(&mut self, slot: MapSlot) -> &mut Option<TextureId> {
        match slot {
            MapSlot::Normal => &mut self.normal_map,
            MapSlot::Roughness => &mut self.roughness_map,
            MapSlot::Metalness => &mut self.metalness_map,
            MapSlot::AmbientOcclusion => &mut self.ao_map,
            MapSlot::Displacement => &mut self.displacement_map,
            MapSlot::Alpha => &mut self.alpha_map,
            MapSlot::Light => &mut self.light_map,
            MapSlot::Environment => &mut self.env_map,
            MapSlot::Emissive => &mut self.emissive_map,
        }
    }

    /// Number of extended maps currently bound.
    pub fn extended_map_count(&self) -> u32 {
        MapSlot::ALL
            .iter()
            .filter(|slot| self.slot(**slot).is_some())
            .count() as u32
    }

    /// Number of texture units a draw with this material samples from.
    pub fn texture_units(&self) -> u32 {
        self.map.is_some() as u32 + self.extended_map_count()
    }

    /// Flag the material as changed.
    pub fn mark_dirty(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_units_counts_base_and_extended() {
        let material = Material::standard(Color::WHITE)
            .with_map(TextureId(0))
            .with_slot(MapSlot::Normal, TextureId(1))
            .with_slot(MapSlot::Emissive, TextureId(2));
        assert_eq!(material.extended_map_count(), 2);
        assert_eq!(material.texture_units(), 3);
    }

    #[test]
    fn basic_does_not_support_extended_maps() {
        assert!(!Material::basic(Color::WHITE).kind.supports_extended_maps());
        assert!(MaterialKind::Physical.supports_extended_maps());
    }

    #[test]
    fn slot_mut_targets_matching_field() {
        let mut material = Material::default();
        for (i, slot) in MapSlot::ALL.iter().enumerate() {
            *material.slot_mut(*slot) = Some(TextureId(i));
        }
        assert_eq!(material.ao_map, Some(TextureId(3)));
        assert_eq!(material.emissive_map, Some(TextureId(8)));
        assert_eq!(material.extended_map_count(), 9);
    }
}
