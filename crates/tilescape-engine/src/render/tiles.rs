use std::collections::HashMap;

use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::render::{RenderCtx, RenderTarget};
use crate::scene::{SceneRoot, Texture, TextureId};

use super::common::{premul_alpha_blend, view_ubo_min_binding_size, ViewUniform};
use super::frame::{BatchKind, FrameGeometry, TileVertex};

/// Uploaded textures not referenced for this many frames are released.
const TEXTURE_RETAIN_FRAMES: u64 = 120;

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    last_used: u64,
}

/// Draws every mesh attached to a [`SceneRoot`].
///
/// Textured quads, fills and lines share one vertex format and one shader;
/// untextured draws bind a 1x1 white texture. Tile images are uploaded once
/// per [`TextureId`] and released after they go unused for a while.
#[derive(Default)]
pub struct TileMeshRenderer {
    pipeline_format: Option<wgpu::TextureFormat>,
    fill_pipeline: Option<wgpu::RenderPipeline>,
    line_pipeline: Option<wgpu::RenderPipeline>,

    view_bgl: Option<wgpu::BindGroupLayout>,
    texture_bgl: Option<wgpu::BindGroupLayout>,
    view_bind_group: Option<wgpu::BindGroup>,
    view_ubo: Option<wgpu::Buffer>,
    sampler: Option<wgpu::Sampler>,
    white: Option<GpuTexture>,

    textures: HashMap<TextureId, GpuTexture>,

    vbo: Option<wgpu::Buffer>,
    vbo_capacity: usize,
    ibo: Option<wgpu::Buffer>,
    ibo_capacity: usize,
    line_vbo: Option<wgpu::Buffer>,
    line_vbo_capacity: usize,

    frame: FrameGeometry,
    frame_index: u64,
}

impl TileMeshRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders `root` back-to-front into `target`. The view is cleared first
    /// when the target carries a clear color.
    pub fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, root: &mut SceneRoot) {
        self.ensure_pipelines(ctx);
        self.ensure_bindings(ctx);
        self.frame_index += 1;

        let mut frame = std::mem::take(&mut self.frame);
        frame.build(root.iter_in_paint_order().map(|(_, node)| node), ctx.viewport.center);

        for texture in &frame.textures {
            self.ensure_texture(ctx, texture);
        }
        self.release_stale_textures();

        if !frame.batches.is_empty() || target.clear.is_some() {
            self.write_view_uniform(ctx);
            self.upload(ctx, &frame);
            self.encode(target, &frame);
        }

        self.frame = frame;
    }

    fn encode(&self, target: &mut RenderTarget<'_>, frame: &FrameGeometry) {
        let Some(fill_pipeline) = self.fill_pipeline.as_ref() else { return };
        let Some(line_pipeline) = self.line_pipeline.as_ref() else { return };
        let Some(view_bind_group) = self.view_bind_group.as_ref() else { return };
        let Some(white) = self.white.as_ref() else { return };
        let load = target.load_op();

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tilescape tile pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_bind_group(0, view_bind_group, &[]);

        for batch in &frame.batches {
            match batch.kind {
                BatchKind::Textured(id) => {
                    // Images that could not be uploaded leave a gap.
                    let Some(texture) = self.textures.get(&id) else { continue };
                    let (Some(vbo), Some(ibo)) = (self.vbo.as_ref(), self.ibo.as_ref()) else { continue };
                    rpass.set_pipeline(fill_pipeline);
                    rpass.set_bind_group(1, &texture.bind_group, &[]);
                    rpass.set_vertex_buffer(0, vbo.slice(..));
                    rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
                    rpass.draw_indexed(batch.range.clone(), 0, 0..1);
                }
                BatchKind::Fill => {
                    let (Some(vbo), Some(ibo)) = (self.vbo.as_ref(), self.ibo.as_ref()) else { continue };
                    rpass.set_pipeline(fill_pipeline);
                    rpass.set_bind_group(1, &white.bind_group, &[]);
                    rpass.set_vertex_buffer(0, vbo.slice(..));
                    rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
                    rpass.draw_indexed(batch.range.clone(), 0, 0..1);
                }
                BatchKind::Lines => {
                    let Some(line_vbo) = self.line_vbo.as_ref() else { continue };
                    rpass.set_pipeline(line_pipeline);
                    rpass.set_bind_group(1, &white.bind_group, &[]);
                    rpass.set_vertex_buffer(0, line_vbo.slice(..));
                    rpass.draw(batch.range.clone(), 0..1);
                }
            }
        }
    }

    fn upload(&mut self, ctx: &RenderCtx<'_>, frame: &FrameGeometry) {
        let vertex_usage = wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST;
        let index_usage = wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST;

        write_growing(ctx, &mut self.vbo, &mut self.vbo_capacity, &frame.vertices, vertex_usage, "tilescape tile vbo");
        write_growing(ctx, &mut self.ibo, &mut self.ibo_capacity, &frame.indices, index_usage, "tilescape tile ibo");
        write_growing(
            ctx,
            &mut self.line_vbo,
            &mut self.line_vbo_capacity,
            &frame.line_vertices,
            vertex_usage,
            "tilescape line vbo",
        );
    }

    fn ensure_texture(&mut self, ctx: &RenderCtx<'_>, texture: &Texture) {
        if let Some(gpu) = self.textures.get_mut(&texture.id()) {
            gpu.last_used = self.frame_index;
            return;
        }
        let Some(bgl) = self.texture_bgl.as_ref() else { return };
        let Some(sampler) = self.sampler.as_ref() else { return };

        let image = texture.image();
        if image.width() == 0 || image.height() == 0 {
            log::debug!("TileMeshRenderer: skipping zero-sized texture {:?}", texture.id());
            return;
        }

        let pixels = premultiplied_rgba(image);
        let gpu = upload_texture(ctx, bgl, sampler, image.width(), image.height(), &pixels, self.frame_index);
        self.textures.insert(texture.id(), gpu);
    }

    fn release_stale_textures(&mut self) {
        let frame = self.frame_index;
        let before = self.textures.len();
        self.textures
            .retain(|_, gpu| frame.saturating_sub(gpu.last_used) <= TEXTURE_RETAIN_FRAMES);
        let released = before - self.textures.len();
        if released > 0 {
            log::trace!("TileMeshRenderer: released {released} textures");
        }
    }

    fn ensure_pipelines(&mut self, ctx: &RenderCtx<'_>) {
        if self.pipeline_format == Some(ctx.surface_format)
            && self.fill_pipeline.is_some()
            && self.line_pipeline.is_some()
        {
            return;
        }

        let shader_src = include_str!("shaders/tile.wgsl");
        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tilescape tile shader"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let view_bgl = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tilescape view bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(view_ubo_min_binding_size()),
                },
                count: None,
            }],
        });

        let texture_bgl = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tilescape texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tilescape tile pipeline layout"),
            bind_group_layouts: &[&view_bgl, &texture_bgl],
            immediate_size: 0,
        });

        let make_pipeline = |label: &str, topology: wgpu::PrimitiveTopology| {
            ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[TileVertex::layout()],
                },

                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: ctx.surface_format,
                        blend: Some(premul_alpha_blend()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // Tessellated fills arrive in either winding.
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        let fill_pipeline = make_pipeline("tilescape fill pipeline", wgpu::PrimitiveTopology::TriangleList);
        let line_pipeline = make_pipeline("tilescape line pipeline", wgpu::PrimitiveTopology::LineList);

        self.pipeline_format = Some(ctx.surface_format);
        self.fill_pipeline = Some(fill_pipeline);
        self.line_pipeline = Some(line_pipeline);
        self.view_bgl = Some(view_bgl);
        self.texture_bgl = Some(texture_bgl);

        // Bind groups were created against the old layouts.
        self.view_bind_group = None;
        self.view_ubo = None;
        self.white = None;
        self.textures.clear();
    }

    fn ensure_bindings(&mut self, ctx: &RenderCtx<'_>) {
        if self.sampler.is_none() {
            self.sampler = Some(ctx.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("tilescape tile sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            }));
        }

        if self.view_bind_group.is_none() || self.view_ubo.is_none() {
            let Some(bgl) = self.view_bgl.as_ref() else { return };

            let view_ubo = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("tilescape view ubo"),
                size: std::mem::size_of::<ViewUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tilescape view bind group"),
                layout: bgl,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: view_ubo.as_entire_binding(),
                }],
            });

            self.view_ubo = Some(view_ubo);
            self.view_bind_group = Some(bind_group);
        }

        if self.white.is_none() {
            let Some(bgl) = self.texture_bgl.as_ref() else { return };
            let Some(sampler) = self.sampler.as_ref() else { return };
            self.white = Some(upload_texture(ctx, bgl, sampler, 1, 1, &[255; 4], u64::MAX));
        }
    }

    fn write_view_uniform(&mut self, ctx: &RenderCtx<'_>) {
        let Some(ubo) = self.view_ubo.as_ref() else { return };
        let u = ViewUniform::from_viewport(&ctx.viewport);
        ctx.queue.write_buffer(ubo, 0, bytemuck::bytes_of(&u));
    }
}

/// Writes `data` into `slot`, reallocating with power-of-two growth when the
/// buffer is too small.
fn write_growing<T: bytemuck::Pod>(
    ctx: &RenderCtx<'_>,
    slot: &mut Option<wgpu::Buffer>,
    capacity: &mut usize,
    data: &[T],
    usage: wgpu::BufferUsages,
    label: &str,
) {
    if data.is_empty() {
        return;
    }

    if data.len() > *capacity || slot.is_none() {
        let new_cap = data.len().next_power_of_two().max(64);
        *slot = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (new_cap * std::mem::size_of::<T>()) as u64,
            usage,
            mapped_at_creation: false,
        }));
        *capacity = new_cap;
    }

    let Some(buffer) = slot.as_ref() else { return };
    ctx.queue.write_buffer(buffer, 0, bytemuck::cast_slice(data));
}

fn upload_texture(
    ctx: &RenderCtx<'_>,
    bgl: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    pixels: &[u8],
    frame_index: u64,
) -> GpuTexture {
    let texture = ctx.device.create_texture_with_data(
        ctx.queue,
        &wgpu::TextureDescriptor {
            label: Some("tilescape tile texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        pixels,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("tilescape texture bind group"),
        layout: bgl,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    GpuTexture { _texture: texture, bind_group, last_used: frame_index }
}

/// Converts straight-alpha RGBA8 to premultiplied RGBA8 for the tile shader.
fn premultiplied_rgba(image: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(image.as_raw().len());
    for px in image.pixels() {
        let [r, g, b, a] = px.0;
        let mul = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        out.extend_from_slice(&[mul(r), mul(g), mul(b), a]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiply_scales_color_by_alpha() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 128, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([255, 255, 255, 128]));

        let px = premultiplied_rgba(&img);
        assert_eq!(&px[0..4], &[255, 128, 0, 255]);
        assert_eq!(&px[4..8], &[128, 128, 128, 128]);
    }

    #[test]
    fn premultiply_zero_alpha_is_black() {
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([200, 100, 50, 0]));
        assert_eq!(premultiplied_rgba(&img), vec![0, 0, 0, 0]);
    }
}
