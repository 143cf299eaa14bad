//! Offscreen color renderer.
//!
//! One instance is bound to a single frame size. Everything the pass needs (device,
//! pipeline, source and target textures, uniform and readback buffers) is created once in
//! [`ColorRenderer::init`] and reused for every frame until [`ColorRenderer::destroy`].

use crate::context::GpuContext;
use crate::error::{GpuError, GpuResult};
use crate::texture::{GpuTexture, ReadbackBuffer, FRAME_FORMAT};
use clipfx_color::shader::{self, ShaderUniforms};
use clipfx_core::{ColorParams, FrameBuffer};
use tracing::{debug, info, warn};

struct RenderState {
    ctx: GpuContext,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniforms: wgpu::Buffer,
    source: GpuTexture,
    target: GpuTexture,
    readback: ReadbackBuffer,
}

impl RenderState {
    fn build(ctx: GpuContext, width: u32, height: u32) -> GpuResult<Self> {
        let max = ctx.max_texture_dimension();
        if width > max || height > max {
            return Err(GpuError::Device(format!(
                "{width}x{height} exceeds max texture dimension {max}"
            )));
        }

        let parts = ctx.scoped(|device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Color Shader"),
                source: wgpu::ShaderSource::Wgsl(shader::wgsl_source().into()),
            });

            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Color Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Color Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Color Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(shader::VERTEX_ENTRY),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(shader::FRAGMENT_ENTRY),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: FRAME_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });

            let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Color Uniforms"),
                size: std::mem::size_of::<ShaderUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let source = GpuTexture::for_video_frame(device, width, height);
            let target = GpuTexture::render_target(device, width, height);
            let readback = ReadbackBuffer::new(device, width, height);

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Color Bind Group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: uniforms.as_entire_binding(),
                    },
                ],
            });

            (pipeline, bind_group, uniforms, source, target, readback)
        })?;

        let (pipeline, bind_group, uniforms, source, target, readback) = parts;
        Ok(Self {
            ctx,
            pipeline,
            bind_group,
            uniforms,
            source,
            target,
            readback,
        })
    }

    fn render(&self, frame: &FrameBuffer, params: &ColorParams, out: &mut Vec<u8>) -> GpuResult<()> {
        self.source.upload_frame(&self.ctx.queue, frame)?;
        self.ctx.queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&ShaderUniforms::from(params)),
        );

        self.ctx.scoped(|device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Color Encoder"),
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Color Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &self.target.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &self.bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
            self.readback.record_copy(&mut encoder, &self.target);
            self.ctx.queue.submit(Some(encoder.finish()));
        })?;

        self.readback.read_into(&self.ctx.device, out)
    }

    fn release(self) {
        self.source.texture.destroy();
        self.target.texture.destroy();
        self.readback.buffer.destroy();
        self.uniforms.destroy();
        self.ctx.device.destroy();
    }
}

/// GPU color pass for frames of one fixed size.
pub struct ColorRenderer {
    width: u32,
    height: u32,
    state: Option<RenderState>,
    destroyed: bool,
    frames_rendered: u64,
}

impl ColorRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: None,
            destroyed: false,
            frames_rendered: 0,
        }
    }

    /// Acquire a device and build the pass. Returns false when the hardware can't do it.
    pub fn init(&mut self) -> bool {
        if self.state.is_some() {
            return true;
        }
        if self.destroyed || self.width == 0 || self.height == 0 {
            return false;
        }

        let ctx = match GpuContext::new_blocking() {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!("GPU unavailable, using CPU color path: {e}");
                return false;
            }
        };

        match RenderState::build(ctx, self.width, self.height) {
            Ok(state) => {
                info!(width = self.width, height = self.height, "GPU color renderer ready");
                self.state = Some(state);
                true
            }
            Err(e) => {
                warn!("GPU color pipeline setup failed: {e}");
                false
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.state.is_some()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Render `frame` into a new buffer. `None` means the caller should use the CPU path.
    pub fn process_frame(&mut self, frame: &FrameBuffer, params: &ColorParams) -> Option<FrameBuffer> {
        let mut out = FrameBuffer::new(self.width, self.height);
        self.process_into(frame, params, &mut out).then_some(out)
    }

    /// Render `frame` into `out`, reusing its allocation. Returns false on any failure,
    /// in which case `out` holds no meaningful pixels.
    pub fn process_into(&mut self, frame: &FrameBuffer, params: &ColorParams, out: &mut FrameBuffer) -> bool {
        let Some(state) = self.state.as_ref() else {
            return false;
        };
        match state.render(frame, params, &mut out.data) {
            Ok(()) => {
                out.width = self.width;
                out.height = self.height;
                self.frames_rendered += 1;
                true
            }
            Err(e) => {
                warn!("GPU frame failed, falling back to CPU: {e}");
                false
            }
        }
    }

    /// Release every GPU object. Safe to call more than once.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        if let Some(state) = self.state.take() {
            state.release();
            debug!(frames = self.frames_rendered, "GPU color renderer destroyed");
        }
    }
}

impl Drop for ColorRenderer {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for ColorRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorRenderer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("available", &self.is_available())
            .field("frames_rendered", &self.frames_rendered)
            .finish()
    }
}
