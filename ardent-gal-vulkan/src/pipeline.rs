//! Pipeline layout and pipeline state objects.
//!
//! Render pipelines are lowered from the flat descriptor in one pass and
//! target dynamic rendering; viewport, scissor, blend constants and stencil
//! reference are always dynamic.

use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;

use ardent_gal::error::GalError;
use ardent_gal::flags::{PipelineKind, PrimitiveTopology};
use ardent_gal::pipeline::{
    BlendState, ComputePipelineDesc, PipelineLayout, PipelineLayoutApi, PipelineLayoutDesc,
    PipelineApi, RenderPipelineDesc,
};
use ardent_gal::shader::{Shader, ShaderApi};
use ash::vk;
use smallvec::SmallVec;

use crate::conv;
use crate::device::DeviceShared;
use crate::shader::VulkanShader;

pub(crate) struct VulkanPipelineLayout {
    shared: Arc<DeviceShared>,
    desc: PipelineLayoutDesc,
    layout: vk::PipelineLayout,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_base: u32,
    push_stages: vk::ShaderStageFlags,
}

impl VulkanPipelineLayout {
    pub(crate) fn new(
        shared: Arc<DeviceShared>,
        desc: &PipelineLayoutDesc,
    ) -> Result<Arc<Self>, GalError> {
        let device = &shared.device;
        let desc = desc.clone();

        let mut sets = desc.sets.clone();
        sets.sort_by_key(|s| s.space);

        let mut set_layouts = Vec::with_capacity(sets.len());
        for set in &sets {
            let bindings: Vec<_> = set
                .entries
                .iter()
                .map(|entry| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(entry.binding)
                        .descriptor_type(conv::descriptor_type(entry.kind))
                        .descriptor_count(entry.count.max(1))
                        .stage_flags(conv::shader_stages(entry.visibility))
                })
                .collect();
            let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let layout = unsafe {
                device
                    .create_descriptor_set_layout(&info, None)
                    .map_err(|e| GalError::creation("descriptor set layout", e))
            };
            let layout = match layout {
                Ok(layout) => layout,
                Err(e) => {
                    for layout in set_layouts {
                        unsafe { device.destroy_descriptor_set_layout(layout, None) };
                    }
                    return Err(e);
                }
            };
            set_layouts.push(layout);
        }

        let mut push_stages = vk::ShaderStageFlags::empty();
        let ranges: Vec<_> = desc
            .push_constants
            .iter()
            .map(|range| {
                let stages = conv::shader_stages(range.visibility);
                push_stages |= stages;
                vk::PushConstantRange::default()
                    .stage_flags(stages)
                    .offset(range.offset)
                    .size(range.size)
            })
            .collect();
        let push_constant_base = desc.push_constants.iter().map(|r| r.offset).min().unwrap_or(0);

        let info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&ranges);
        let layout = unsafe {
            device
                .create_pipeline_layout(&info, None)
                .map_err(|e| GalError::creation("pipeline layout", e))?
        };

        if let Some(label) = &desc.label {
            shared.set_object_name(layout, label);
        }

        Ok(Arc::new(Self {
            shared,
            desc,
            layout,
            set_layouts,
            push_constant_base,
            push_stages,
        }))
    }

    #[inline]
    pub(crate) fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }

    #[inline]
    pub(crate) fn push_stages(&self) -> vk::ShaderStageFlags {
        self.push_stages
    }
}

impl PipelineLayoutApi for VulkanPipelineLayout {
    fn desc(&self) -> &PipelineLayoutDesc {
        &self.desc
    }

    fn push_constant_base(&self) -> u32 {
        self.push_constant_base
    }

    fn set_label(&self, label: &str) {
        self.shared.set_object_name(self.layout, label);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipelineLayout {
    fn drop(&mut self) {
        let frame = self.shared.current_frame();
        self.shared
            .destroy
            .lock()
            .pipeline_layouts
            .push((self.layout, std::mem::take(&mut self.set_layouts)), frame);
    }
}

pub(crate) struct VulkanPipeline {
    shared: Arc<DeviceShared>,
    kind: PipelineKind,
    pipeline: vk::Pipeline,
    topology: Option<PrimitiveTopology>,
    vertex_strides: Vec<u32>,
    /// Keeps descriptor set layouts alive for the pipeline's lifetime.
    layout: PipelineLayout,
}

impl VulkanPipeline {
    pub(crate) fn new_render(
        shared: Arc<DeviceShared>,
        desc: &RenderPipelineDesc,
    ) -> Result<Arc<Self>, GalError> {
        let device = &shared.device;
        let layout = layout_of(&desc.layout)?;

        let vertex = shader_of(&desc.vertex_shader)?;
        let vertex_entry = CString::new(vertex.1.entry_point().to_owned())
            .map_err(|_| GalError::validation("shader entry point contains a nul byte"))?;

        let fragment_entry;
        let mut stages: SmallVec<[vk::PipelineShaderStageCreateInfo; 2]> = SmallVec::new();
        stages.push(
            vk::PipelineShaderStageCreateInfo::default()
                .stage(conv::shader_stage(vertex.1.stage()))
                .module(vertex.0)
                .name(&vertex_entry),
        );

        if let Some(fragment) = &desc.fragment_shader {
            let fragment = shader_of(fragment)?;
            fragment_entry = CString::new(fragment.1.entry_point().to_owned())
                .map_err(|_| GalError::validation("shader entry point contains a nul byte"))?;
            stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(conv::shader_stage(fragment.1.stage()))
                    .module(fragment.0)
                    .name(&fragment_entry),
            );
        }

        let mut bindings = Vec::with_capacity(desc.vertex_buffers.len());
        let mut attributes = Vec::new();
        let mut strides = Vec::with_capacity(desc.vertex_buffers.len());
        for (index, buffer) in desc.vertex_buffers.iter().enumerate() {
            bindings.push(
                vk::VertexInputBindingDescription::default()
                    .binding(index as u32)
                    .stride(buffer.stride)
                    .input_rate(conv::step_mode(buffer.step_mode)),
            );
            strides.push(buffer.stride);
            for attribute in &buffer.attributes {
                attributes.push(
                    vk::VertexInputAttributeDescription::default()
                        .location(attribute.shader_location)
                        .binding(index as u32)
                        .format(conv::vertex_format(attribute.format))
                        .offset(attribute.offset),
                );
            }
        }
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(conv::topology(desc.primitive.topology));

        let tessellation = vk::PipelineTessellationStateCreateInfo::default()
            .patch_control_points(desc.primitive.patch_control_points);

        // Actual rects are always set dynamically.
        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(conv::cull_mode(desc.primitive.cull_mode))
            .front_face(conv::front_face(desc.primitive.front_face))
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(conv::sample_count(desc.sample_count))
            .alpha_to_coverage_enable(desc.alpha_to_coverage_enabled);

        let depth_stencil = match &desc.depth_stencil {
            Some(state) => vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(state.depth_test_enabled())
                .depth_write_enable(state.depth_write_enabled)
                .depth_compare_op(conv::compare_op(state.depth_compare))
                .stencil_test_enable(state.stencil_test_enabled())
                .front(stencil_face(&state.stencil_front, state))
                .back(stencil_face(&state.stencil_back, state)),
            None => vk::PipelineDepthStencilStateCreateInfo::default(),
        };

        let default_blend = BlendState::default();
        let blend_attachments: Vec<_> = (0..desc.color_formats.len())
            .map(|i| {
                let state = desc.blend.get(i).unwrap_or(&default_blend);
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(state.blend_enabled)
                    .src_color_blend_factor(conv::blend_factor(state.color.src_factor))
                    .dst_color_blend_factor(conv::blend_factor(state.color.dst_factor))
                    .color_blend_op(conv::blend_op(state.color.operation))
                    .src_alpha_blend_factor(conv::blend_factor(state.alpha.src_factor))
                    .dst_alpha_blend_factor(conv::blend_factor(state.alpha.dst_factor))
                    .alpha_blend_op(conv::blend_op(state.alpha.operation))
                    .color_write_mask(conv::color_write_mask(state.write_mask))
            })
            .collect();
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::BLEND_CONSTANTS,
            vk::DynamicState::STENCIL_REFERENCE,
        ];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let color_formats: Vec<_> = desc
            .color_formats
            .iter()
            .map(|f| conv::pixel_format(*f))
            .collect();
        let depth_format = desc
            .depth_stencil_format
            .map(conv::pixel_format)
            .unwrap_or(vk::Format::UNDEFINED);
        let stencil_format = match desc.depth_stencil_format {
            Some(format) if format.info().has_stencil => conv::pixel_format(format),
            _ => vk::Format::UNDEFINED,
        };
        let mut rendering = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format)
            .stencil_attachment_format(stencil_format);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .tessellation_state(&tessellation)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(layout.handle())
            .push_next(&mut rendering);

        let pipeline = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
                .map_err(|(_, e)| GalError::creation("render pipeline", e))?[0]
        };

        if let Some(label) = &desc.label {
            shared.set_object_name(pipeline, label);
        }

        Ok(Arc::new(Self {
            shared,
            kind: PipelineKind::Render,
            pipeline,
            topology: Some(desc.primitive.topology),
            vertex_strides: strides,
            layout: desc.layout.clone(),
        }))
    }

    pub(crate) fn new_compute(
        shared: Arc<DeviceShared>,
        desc: &ComputePipelineDesc,
    ) -> Result<Arc<Self>, GalError> {
        let layout = layout_of(&desc.layout)?;
        let shader = shader_of(&desc.shader)?;
        let entry = CString::new(shader.1.entry_point().to_owned())
            .map_err(|_| GalError::validation("shader entry point contains a nul byte"))?;

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(conv::shader_stage(shader.1.stage()))
            .module(shader.0)
            .name(&entry);
        let info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(layout.handle());

        let pipeline = unsafe {
            shared
                .device
                .create_compute_pipelines(vk::PipelineCache::null(), &[info], None)
                .map_err(|(_, e)| GalError::creation("compute pipeline", e))?[0]
        };

        if let Some(label) = &desc.label {
            shared.set_object_name(pipeline, label);
        }

        Ok(Arc::new(Self {
            shared,
            kind: PipelineKind::Compute,
            pipeline,
            topology: None,
            vertex_strides: Vec::new(),
            layout: desc.layout.clone(),
        }))
    }

    #[inline]
    pub(crate) fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub(crate) fn vk_layout(&self) -> vk::PipelineLayout {
        // The layout handle was created by this backend.
        self.layout
            .api()
            .as_any()
            .downcast_ref::<VulkanPipelineLayout>()
            .map(|l| l.handle())
            .unwrap_or_default()
    }

    pub(crate) fn vk_push_stages(&self) -> vk::ShaderStageFlags {
        self.layout
            .api()
            .as_any()
            .downcast_ref::<VulkanPipelineLayout>()
            .map(|l| l.push_stages())
            .unwrap_or_default()
    }
}

fn layout_of(layout: &PipelineLayout) -> Result<&VulkanPipelineLayout, GalError> {
    layout
        .api()
        .as_any()
        .downcast_ref::<VulkanPipelineLayout>()
        .ok_or_else(|| GalError::validation("pipeline layout belongs to another backend"))
}

fn shader_of(shader: &Shader) -> Result<(vk::ShaderModule, &dyn ShaderApi), GalError> {
    let api = shader.api();
    let module = api
        .as_any()
        .downcast_ref::<VulkanShader>()
        .ok_or_else(|| GalError::validation("shader belongs to another backend"))?
        .handle();
    Ok((module, api))
}

fn stencil_face(
    face: &ardent_gal::pipeline::StencilFaceState,
    state: &ardent_gal::pipeline::DepthStencilState,
) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: conv::stencil_op(face.fail_op),
        pass_op: conv::stencil_op(face.pass_op),
        depth_fail_op: conv::stencil_op(face.depth_fail_op),
        compare_op: conv::compare_op(face.compare),
        compare_mask: state.stencil_read_mask,
        write_mask: state.stencil_write_mask,
        // Set dynamically.
        reference: 0,
    }
}

impl PipelineApi for VulkanPipeline {
    fn kind(&self) -> PipelineKind {
        self.kind
    }

    fn topology(&self) -> Option<PrimitiveTopology> {
        self.topology
    }

    fn vertex_strides(&self) -> &[u32] {
        &self.vertex_strides
    }

    fn set_label(&self, label: &str) {
        self.shared.set_object_name(self.pipeline, label);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        let frame = self.shared.current_frame();
        self.shared.destroy.lock().pipelines.push(self.pipeline, frame);
    }
}
