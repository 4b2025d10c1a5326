//! Film grain and desaturation over a finished frame.
//!
//! [`GrainPass`] samples the renderer's frame texture and writes it to the
//! current render pass, usually the swapchain image. While the
//! [`GrainSettings`] are inactive the frame is copied through untouched, so
//! the pass can stay in the frame loop permanently.

use crate::gpu::GpuContext;
use crate::texture::Texture;
use crate::transition::GrainSettings;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct GrainUniforms {
    resolution: [f32; 2],
    time: f32,
    intensity: f32,
    desaturate: f32,
    enabled: f32,
    _pad: [f32; 2],
}

impl GrainUniforms {
    fn new(resolution: [f32; 2], settings: &GrainSettings) -> Self {
        let enabled = settings.is_active();
        Self {
            resolution,
            time: settings.time,
            intensity: if enabled { settings.intensity } else { 0.0 },
            desaturate: if enabled { settings.desaturate } else { 0.0 },
            enabled: if enabled { 1.0 } else { 0.0 },
            _pad: [0.0; 2],
        }
    }
}

pub struct GrainPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl GrainPass {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grain Shader"),
            source: wgpu::ShaderSource::Wgsl(GRAIN_SHADER.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grain Uniforms"),
            size: std::mem::size_of::<GrainUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Grain Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Grain Bind Group Layout"),
            entries: &[
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Frame texture
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Grain Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Grain Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group_layout,
            sampler,
        }
    }

    /// Draw `frame` into `render_pass` with the current grain applied.
    pub fn render(
        &self,
        gpu: &GpuContext,
        render_pass: &mut wgpu::RenderPass,
        frame: &Texture,
        settings: &GrainSettings,
    ) {
        let uniforms = GrainUniforms::new([gpu.width() as f32, gpu.height() as f32], settings);
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Grain Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&frame.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

const GRAIN_SHADER: &str = r#"
struct Uniforms {
    resolution: vec2f,
    time: f32,
    intensity: f32,
    desaturate: f32,
    enabled: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var frame_texture: texture_2d<f32>;
@group(0) @binding(2) var frame_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
}

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> VertexOutput {
    let corner = vec2f(f32((vi << 1u) & 2u), f32(vi & 2u));
    var out: VertexOutput;
    out.position = vec4f(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2f(corner.x, 1.0 - corner.y);
    return out;
}

fn hash(p: vec2f) -> f32 {
    let q = fract(p * vec2f(123.34, 456.21));
    let r = q + dot(q, q + 45.32);
    return fract(r.x * r.y);
}

@fragment
fn fs(in: VertexOutput) -> @location(0) vec4f {
    var color = textureSample(frame_texture, frame_sampler, in.uv).rgb;
    if (u.enabled < 0.5) {
        return vec4f(color, 1.0);
    }

    let luma = dot(color, vec3f(0.2126, 0.7152, 0.0722));
    color = mix(color, vec3f(luma), clamp(u.desaturate, 0.0, 1.0));

    // Reseed about 24 times a second so the grain flickers like film.
    let frame = floor(u.time * 24.0);
    let noise = hash(floor(in.uv * u.resolution) + frame * 17.0) - 0.5;
    color = color + noise * u.intensity * 0.5;

    return vec4f(clamp(color, vec3f(0.0), vec3f(1.0)), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_settings_zero_the_effect() {
        let mut settings = GrainSettings::default();
        settings.intensity = 0.6;
        settings.desaturate = 0.8;
        settings.enabled = false;

        let uniforms = GrainUniforms::new([800.0, 600.0], &settings);
        assert_eq!(uniforms.enabled, 0.0);
        assert_eq!(uniforms.intensity, 0.0);
        assert_eq!(uniforms.desaturate, 0.0);
    }

    #[test]
    fn active_settings_pass_through() {
        let settings = GrainSettings {
            intensity: 0.4,
            desaturate: 0.5,
            time: 2.0,
            enabled: true,
        };

        let uniforms = GrainUniforms::new([800.0, 600.0], &settings);
        assert_eq!(uniforms.enabled, 1.0);
        assert_eq!(uniforms.intensity, 0.4);
        assert_eq!(uniforms.desaturate, 0.5);
        assert_eq!(uniforms.time, 2.0);
        assert_eq!(std::mem::size_of::<GrainUniforms>() % 16, 0);
    }
}
