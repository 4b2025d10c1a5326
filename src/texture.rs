use crate::color::Color;
use crate::gpu::GpuContext;

/// A GPU texture that can be bound to shaders.
///
/// Render targets are textures too: they are created with
/// [`render_target`](Self::render_target) and can be drawn into as well as
/// sampled.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a texture from raw RGBA data.
    pub fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Self::sampler(gpu, label, wgpu::AddressMode::Repeat);

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    /// A 1×1 texture of a single color.
    pub fn solid(gpu: &GpuContext, color: Color, label: &str) -> Self {
        let data = color.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        Self::from_rgba(gpu, &data, 1, 1, label)
    }

    /// A texture that can be rendered into and then sampled.
    ///
    /// Uses the surface format so scene passes built for the window can draw
    /// into it unchanged.
    pub fn render_target(gpu: &GpuContext, width: u32, height: u32, label: &str) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: gpu.config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Self::sampler(gpu, label, wgpu::AddressMode::ClampToEdge);

        Self {
            texture,
            view,
            sampler,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// A blocky noise texture tinted around `base`, handy as a stand-in
    /// material map.
    pub fn noise(gpu: &GpuContext, size: u32, seed: u32, base: Color, label: &str) -> Self {
        let mut data = vec![0u8; (size * size * 4) as usize];
        let base = base.to_array();

        for y in 0..size {
            for x in 0..size {
                let idx = ((y * size + x) * 4) as usize;
                // Four-pixel cells with a little per-pixel jitter.
                let cell = (Self::hash(x / 4, y / 4, seed) % 48) as f32 / 255.0;
                let jitter = (Self::hash(x, y, seed.wrapping_add(7919)) % 16) as f32 / 255.0;
                let shade = cell + jitter - 0.12;

                for channel in 0..3 {
                    data[idx + channel] = ((base[channel] + shade).clamp(0.0, 1.0) * 255.0) as u8;
                }
                data[idx + 3] = 255;
            }
        }

        Self::from_rgba(gpu, &data, size, size, label)
    }

    fn sampler(gpu: &GpuContext, label: &str, address_mode: wgpu::AddressMode) -> wgpu::Sampler {
        gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} Sampler")),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        })
    }

    /// Simple hash function for procedural generation.
    fn hash(x: u32, y: u32, seed: u32) -> u32 {
        let mut h = seed;
        h = h.wrapping_add(x.wrapping_mul(374761393));
        h = h.wrapping_add(y.wrapping_mul(668265263));
        h ^= h >> 13;
        h = h.wrapping_mul(1274126177);
        h ^= h >> 16;
        h
    }
}
