/// Mock graphics device for unit tests (no GPU required)
///
/// Simulates just enough of a GPU to check the orchestration rules:
///
/// - fences complete only when waited on (or on `wait_idle`), and re-recording
///   a command list whose last submission is still pending is reported as
///   "command buffer still in use"
/// - acquire/submit/present check the semaphore hand-off of their frame slot
/// - recorded copies and layout transitions execute at submission, and a copy
///   into a texture outside `TransferDst` fails
/// - descriptor pools enforce their capacity
/// - the swapchain refuses to recreate while the device is busy or an old
///   image view is still referenced
///
/// Every create/destroy of a GPU object is appended to a shared event log.

use std::any::Any;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use crate::error::{Error, Result, StaleReason};
use crate::graphics_device::{
    validate_resources, BindingGroup, BindingLayout, BindingResource, Buffer, BufferDesc, BufferUsage,
    ClearValue, ColorSpace, CommandList, DescriptorPool, DescriptorPoolDesc, Extent2D, FrameSync,
    Framebuffer, FramebufferDesc, GraphicsDevice, ImageLayout, MemoryLocation, Pipeline, PipelineDesc,
    RenderPass, RenderPassDesc, Shader, ShaderDesc, ShaderStage, SurfaceCapabilities, SurfaceFormat,
    Swapchain, Texture, TextureDesc, TextureFormat, TextureInfo, TextureUsage, choose_extent,
    choose_image_count, choose_surface_format, check_range,
};

/// SPIR-V magic number, little endian
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Smallest byte blob the mock accepts as a shader binary
pub fn spirv_stub() -> Vec<u8> {
    let mut code = SPIRV_MAGIC.to_le_bytes().to_vec();
    code.extend_from_slice(&[0u8; 16]);
    code
}

fn backend_error(message: impl Into<String>) -> Error {
    Error::BackendError(message.into())
}

// ============================================================================
// Shared state
// ============================================================================

#[derive(Debug, Default, Clone)]
struct MockSyncState {
    fence_signaled: bool,
    pending_submission: Option<u64>,
    image_acquired: bool,
    render_finished: bool,
}

/// Everything the mock GPU knows, shared by the device and its objects
#[derive(Debug, Default)]
pub struct MockGpuState {
    /// Lifecycle events in order ("create:framebuffer", "wait_idle", ...)
    pub events: Vec<String>,
    /// Live object count per kind
    pub live: HashMap<String, i64>,
    /// Command lists re-recorded while their last submission was pending
    pub in_use_violations: u32,
    /// Frame submissions
    pub submissions: u32,
    /// One-shot (upload) submissions
    pub one_shot_submissions: u32,
    /// Successful presents
    pub presents: u32,
    /// Commands of the last submitted frame
    pub last_frame_commands: Vec<String>,
    /// Next acquire reports this staleness
    pub fail_next_acquire: Option<StaleReason>,
    /// Next present reports this staleness
    pub fail_next_present: Option<StaleReason>,
    next_id: u64,
    next_submission: u64,
    incomplete: HashSet<u64>,
    syncs: HashMap<u64, MockSyncState>,
}

impl MockGpuState {
    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn created(&mut self, kind: &str) {
        self.events.push(format!("create:{}", kind));
        *self.live.entry(kind.to_string()).or_insert(0) += 1;
    }

    fn destroyed(&mut self, kind: &str) {
        self.events.push(format!("destroy:{}", kind));
        *self.live.entry(kind.to_string()).or_insert(0) -= 1;
    }

    /// Number of live objects of `kind`
    pub fn live(&self, kind: &str) -> i64 {
        self.live.get(kind).copied().unwrap_or(0)
    }

    /// Number of events equal to `event`
    pub fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    /// Index of the first event equal to `event`
    pub fn first(&self, event: &str) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }

    /// True when no submitted work is pending
    pub fn is_idle(&self) -> bool {
        self.incomplete.is_empty()
    }

    fn complete(&mut self, sync_id: u64) {
        if let Some(sync) = self.syncs.get_mut(&sync_id) {
            if let Some(serial) = sync.pending_submission.take() {
                self.incomplete.remove(&serial);
            }
            sync.fence_signaled = true;
        }
    }

    fn complete_all(&mut self) {
        let ids: Vec<u64> = self.syncs.keys().copied().collect();
        for id in ids {
            if self.syncs[&id].pending_submission.is_some() {
                self.complete(id);
            }
        }
        self.incomplete.clear();
    }
}

pub type SharedState = Arc<Mutex<MockGpuState>>;

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    state: SharedState,
    kind: String,
    pub desc: BufferDesc,
    data: Arc<Mutex<Vec<u8>>>,
}

impl MockBuffer {
    /// Raw contents, whatever the memory location
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.desc.size
    }

    fn usage(&self) -> BufferUsage {
        self.desc.usage
    }

    fn location(&self) -> MemoryLocation {
        self.desc.location
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.desc.location == MemoryLocation::GpuOnly {
            return Err(Error::InvalidResource("buffer is not host-visible".to_string()));
        }
        check_range(self.desc.size, offset, data.len() as u64)?;
        let mut contents = self.data.lock().unwrap();
        contents[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        if self.desc.location == MemoryLocation::GpuOnly {
            return Err(Error::InvalidResource("buffer is not host-visible".to_string()));
        }
        check_range(self.desc.size, offset, len)?;
        let contents = self.data.lock().unwrap();
        Ok(contents[offset as usize..(offset + len) as usize].to_vec())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        self.state.lock().unwrap().destroyed(&self.kind);
    }
}

fn mock_buffer(buffer: &dyn Buffer) -> Result<&MockBuffer> {
    buffer
        .as_any()
        .downcast_ref::<MockBuffer>()
        .ok_or_else(|| Error::InvalidResource("not a mock buffer".to_string()))
}

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    /// `None` for swapchain views, which the chain owns
    state: Option<SharedState>,
    kind: &'static str,
    pub id: u64,
    info: TextureInfo,
    data: Arc<Mutex<Vec<u8>>>,
    layout: Arc<Mutex<ImageLayout>>,
}

impl MockTexture {
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub fn layout(&self) -> ImageLayout {
        *self.layout.lock().unwrap()
    }
}

impl Texture for MockTexture {
    fn info(&self) -> TextureInfo {
        self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockTexture {
    fn drop(&mut self) {
        if let Some(state) = &self.state {
            state.lock().unwrap().destroyed(self.kind);
        }
    }
}

fn mock_texture(texture: &dyn Texture) -> Result<&MockTexture> {
    texture
        .as_any()
        .downcast_ref::<MockTexture>()
        .ok_or_else(|| Error::InvalidResource("not a mock texture".to_string()))
}

// ============================================================================
// Mock Shader, RenderPass, Pipeline, Framebuffer
// ============================================================================

pub struct MockShader {
    stage: ShaderStage,
    entry_point: String,
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockRenderPass {
    state: SharedState,
    subpass_count: u32,
    attachment_count: u32,
}

impl RenderPass for MockRenderPass {
    fn subpass_count(&self) -> u32 {
        self.subpass_count
    }

    fn attachment_count(&self) -> u32 {
        self.attachment_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockRenderPass {
    fn drop(&mut self) {
        self.state.lock().unwrap().destroyed("render_pass");
    }
}

pub struct MockPipeline {
    state: SharedState,
    viewport: Extent2D,
    subpass: u32,
    binding_layouts: Vec<BindingLayout>,
    push_constant_size: u32,
    pub depth_test: bool,
}

impl Pipeline for MockPipeline {
    fn viewport(&self) -> Extent2D {
        self.viewport
    }

    fn subpass(&self) -> u32 {
        self.subpass
    }

    fn binding_layouts(&self) -> &[BindingLayout] {
        &self.binding_layouts
    }

    fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockPipeline {
    fn drop(&mut self) {
        self.state.lock().unwrap().destroyed("pipeline");
    }
}

pub struct MockFramebuffer {
    state: SharedState,
    width: u32,
    height: u32,
    /// Ids of the attached textures, in attachment order
    pub attachment_ids: Vec<u64>,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockFramebuffer {
    fn drop(&mut self) {
        self.state.lock().unwrap().destroyed("framebuffer");
    }
}

// ============================================================================
// Mock DescriptorPool / BindingGroup
// ============================================================================

pub struct MockDescriptorPool {
    state: SharedState,
    layout: BindingLayout,
    capacity: u32,
    allocated: AtomicU32,
}

impl DescriptorPool for MockDescriptorPool {
    fn layout(&self) -> BindingLayout {
        self.layout
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn allocated(&self) -> u32 {
        self.allocated.load(Ordering::Relaxed)
    }

    fn allocate(&self, resources: &[BindingResource]) -> Result<Arc<dyn BindingGroup>> {
        validate_resources(self.layout, resources)?;
        if self.allocated() >= self.capacity {
            return Err(Error::PoolExhausted { capacity: self.capacity });
        }

        let mut resource_ids = Vec::with_capacity(resources.len());
        for resource in resources {
            match resource {
                BindingResource::UniformBuffer(buffer) => {
                    mock_buffer(*buffer)?;
                    resource_ids.push(0);
                }
                BindingResource::SampledTexture(texture, _) => {
                    let texture = mock_texture(*texture)?;
                    if texture.layout() != ImageLayout::ShaderReadOnly {
                        return Err(Error::InvalidResource(format!(
                            "texture {} bound for sampling in layout {:?}",
                            texture.id,
                            texture.layout()
                        )));
                    }
                    resource_ids.push(texture.id);
                }
                BindingResource::InputAttachment(texture) => {
                    resource_ids.push(mock_texture(*texture)?.id);
                }
            }
        }

        self.allocated.fetch_add(1, Ordering::Relaxed);
        let id = self.state.lock().unwrap().alloc_id();
        Ok(Arc::new(MockBindingGroup { id, layout: self.layout, resource_ids }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockDescriptorPool {
    fn drop(&mut self) {
        self.state.lock().unwrap().destroyed("descriptor_pool");
    }
}

pub struct MockBindingGroup {
    pub id: u64,
    layout: BindingLayout,
    /// Texture ids bound (0 for buffers)
    pub resource_ids: Vec<u64>,
}

impl BindingGroup for MockBindingGroup {
    fn layout(&self) -> BindingLayout {
        self.layout
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock FrameSync
// ============================================================================

pub struct MockFrameSync {
    state: SharedState,
    pub id: u64,
}

impl FrameSync for MockFrameSync {
    fn wait(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let sync = state.syncs.get(&self.id).cloned().unwrap_or_default();
        if sync.pending_submission.is_some() {
            state.complete(self.id);
            Ok(())
        } else if sync.fence_signaled {
            Ok(())
        } else {
            Err(backend_error("waiting on an unsignaled fence with no pending submission would never return"))
        }
    }

    fn reset(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let sync = state.syncs.entry(self.id).or_default();
        if sync.pending_submission.is_some() {
            return Err(backend_error("fence reset while its submission is pending"));
        }
        sync.fence_signaled = false;
        Ok(())
    }

    fn is_signaled(&self) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.syncs.get(&self.id).map(|s| s.fence_signaled).unwrap_or(false))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockFrameSync {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.syncs.remove(&self.id);
        state.destroyed("frame_sync");
    }
}

fn mock_sync(sync: &dyn FrameSync) -> Result<&MockFrameSync> {
    sync.as_any()
        .downcast_ref::<MockFrameSync>()
        .ok_or_else(|| Error::InvalidResource("not a mock frame sync".to_string()))
}

// ============================================================================
// Mock CommandList
// ============================================================================

enum PendingOp {
    CopyBuffer {
        src: Arc<Mutex<Vec<u8>>>,
        dst: Arc<Mutex<Vec<u8>>>,
        size: usize,
    },
    Transition {
        texture_id: u64,
        layout: Arc<Mutex<ImageLayout>>,
        old: ImageLayout,
        new: ImageLayout,
    },
    CopyToTexture {
        texture_id: u64,
        src: Arc<Mutex<Vec<u8>>>,
        dst: Arc<Mutex<Vec<u8>>>,
        layout: Arc<Mutex<ImageLayout>>,
    },
}

impl PendingOp {
    fn execute(&self) -> Result<()> {
        match self {
            PendingOp::CopyBuffer { src, dst, size } => {
                let bytes = src.lock().unwrap()[..*size].to_vec();
                dst.lock().unwrap()[..*size].copy_from_slice(&bytes);
            }
            PendingOp::Transition { texture_id, layout, old, new } => {
                let mut current = layout.lock().unwrap();
                if *old != ImageLayout::Undefined && *current != *old {
                    return Err(backend_error(format!(
                        "texture {} transitioned from {:?} but is in {:?}",
                        texture_id, old, *current
                    )));
                }
                *current = *new;
            }
            PendingOp::CopyToTexture { texture_id, src, dst, layout } => {
                let current = *layout.lock().unwrap();
                if current != ImageLayout::TransferDst {
                    return Err(backend_error(format!(
                        "copy into texture {} in layout {:?}",
                        texture_id, current
                    )));
                }
                let mut texels = dst.lock().unwrap();
                let len = texels.len();
                let bytes = src.lock().unwrap()[..len].to_vec();
                texels.copy_from_slice(&bytes);
            }
        }
        Ok(())
    }
}

pub struct MockCommandList {
    state: SharedState,
    kind: &'static str,
    /// Human-readable log of what was recorded since the last `begin`
    pub commands: Vec<String>,
    pending: Vec<PendingOp>,
    recording: bool,
    in_render_pass: bool,
    subpass: u32,
    subpass_count: u32,
    bound_subpass: Option<u32>,
    vertex_bound: bool,
    index_bound: bool,
    in_flight: Cell<Option<u64>>,
}

impl MockCommandList {
    fn new(state: SharedState, kind: &'static str) -> Self {
        Self {
            state,
            kind,
            commands: Vec::new(),
            pending: Vec::new(),
            recording: false,
            in_render_pass: false,
            subpass: 0,
            subpass_count: 0,
            bound_subpass: None,
            vertex_bound: false,
            index_bound: false,
            in_flight: Cell::new(None),
        }
    }

    fn require_recording(&self) -> Result<()> {
        if !self.recording {
            return Err(backend_error("Command list not recording"));
        }
        Ok(())
    }

    fn require_render_pass(&self) -> Result<()> {
        self.require_recording()?;
        if !self.in_render_pass {
            return Err(backend_error("Not inside a render pass"));
        }
        Ok(())
    }

    fn require_outside_render_pass(&self) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(backend_error("Transfer command inside a render pass"));
        }
        Ok(())
    }

    fn require_pipeline(&self) -> Result<()> {
        if self.bound_subpass != Some(self.subpass) {
            return Err(backend_error(format!("No pipeline bound for subpass {}", self.subpass)));
        }
        Ok(())
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        if let Some(serial) = self.in_flight.get() {
            let mut state = self.state.lock().unwrap();
            if state.incomplete.contains(&serial) {
                state.in_use_violations += 1;
                return Err(backend_error("command buffer still in use"));
            }
        }
        self.commands.clear();
        self.pending.clear();
        self.recording = true;
        self.in_render_pass = false;
        self.bound_subpass = None;
        self.vertex_bound = false;
        self.index_bound = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(backend_error("end() inside a render pass"));
        }
        self.recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(backend_error("Render pass already begun"));
        }
        if clear_values.len() as u32 != render_pass.attachment_count() {
            return Err(Error::InvalidResource(format!(
                "{} clear values for {} attachments",
                clear_values.len(),
                render_pass.attachment_count()
            )));
        }
        let ids = framebuffer
            .as_any()
            .downcast_ref::<MockFramebuffer>()
            .map(|f| f.attachment_ids.clone())
            .unwrap_or_default();
        self.in_render_pass = true;
        self.subpass = 0;
        self.subpass_count = render_pass.subpass_count();
        self.bound_subpass = None;
        self.commands.push(format!(
            "begin_render_pass {}x{} {:?}",
            framebuffer.width(),
            framebuffer.height(),
            ids
        ));
        Ok(())
    }

    fn next_subpass(&mut self) -> Result<()> {
        self.require_render_pass()?;
        if self.subpass + 1 >= self.subpass_count {
            return Err(backend_error("No subpass left"));
        }
        self.subpass += 1;
        self.commands.push("next_subpass".to_string());
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.require_render_pass()?;
        if self.subpass + 1 != self.subpass_count {
            return Err(backend_error("Render pass ended before its last subpass"));
        }
        self.in_render_pass = false;
        self.commands.push("end_render_pass".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.require_render_pass()?;
        if pipeline.subpass() != self.subpass {
            return Err(backend_error(format!(
                "Pipeline for subpass {} bound in subpass {}",
                pipeline.subpass(),
                self.subpass
            )));
        }
        self.bound_subpass = Some(self.subpass);
        self.commands.push(format!("bind_pipeline subpass={}", pipeline.subpass()));
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        pipeline: &dyn Pipeline,
        set_index: u32,
        binding_group: &dyn BindingGroup,
    ) -> Result<()> {
        self.require_render_pass()?;
        self.require_pipeline()?;
        match pipeline.binding_layouts().get(set_index as usize) {
            Some(layout) if *layout == binding_group.layout() => {}
            expected => {
                return Err(Error::InvalidResource(format!(
                    "set {} expects {:?}, got {:?}",
                    set_index,
                    expected,
                    binding_group.layout()
                )))
            }
        }
        let id = binding_group
            .as_any()
            .downcast_ref::<MockBindingGroup>()
            .map(|g| g.id)
            .unwrap_or(0);
        self.commands.push(format!("bind_set {} group={}", set_index, id));
        Ok(())
    }

    fn push_constants(&mut self, pipeline: &dyn Pipeline, offset: u32, data: &[u8]) -> Result<()> {
        self.require_render_pass()?;
        if offset as usize + data.len() > pipeline.push_constant_size() as usize {
            return Err(Error::InvalidResource(format!(
                "push constant range {}+{} exceeds {}",
                offset,
                data.len(),
                pipeline.push_constant_size()
            )));
        }
        self.commands.push(format!("push_constants {}", data.len()));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()> {
        self.require_render_pass()?;
        if buffer.usage() != BufferUsage::Vertex {
            return Err(Error::InvalidResource("not a vertex buffer".to_string()));
        }
        self.vertex_bound = true;
        self.commands.push(format!("bind_vertex_buffer {}", offset));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()> {
        self.require_render_pass()?;
        if buffer.usage() != BufferUsage::Index {
            return Err(Error::InvalidResource("not an index buffer".to_string()));
        }
        self.index_bound = true;
        self.commands.push(format!("bind_index_buffer {}", offset));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_render_pass()?;
        self.require_pipeline()?;
        self.commands.push(format!("draw {} {}", vertex_count, first_vertex));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_render_pass()?;
        self.require_pipeline()?;
        if !self.vertex_bound || !self.index_bound {
            return Err(backend_error("draw_indexed without vertex and index buffers"));
        }
        self.commands.push(format!("draw_indexed {} {} {}", index_count, first_index, vertex_offset));
        Ok(())
    }

    fn copy_buffer(&mut self, src: &dyn Buffer, dst: &dyn Buffer, size: u64) -> Result<()> {
        self.require_outside_render_pass()?;
        check_range(src.size(), 0, size)?;
        check_range(dst.size(), 0, size)?;
        let src = mock_buffer(src)?;
        let dst = mock_buffer(dst)?;
        self.pending.push(PendingOp::CopyBuffer {
            src: Arc::clone(&src.data),
            dst: Arc::clone(&dst.data),
            size: size as usize,
        });
        self.commands.push(format!("copy_buffer {}", size));
        Ok(())
    }

    fn transition_texture(&mut self, texture: &dyn Texture, old: ImageLayout, new: ImageLayout) -> Result<()> {
        self.require_outside_render_pass()?;
        let texture = mock_texture(texture)?;
        self.pending.push(PendingOp::Transition {
            texture_id: texture.id,
            layout: Arc::clone(&texture.layout),
            old,
            new,
        });
        self.commands.push(format!("transition {} {:?}->{:?}", texture.id, old, new));
        Ok(())
    }

    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, texture: &dyn Texture) -> Result<()> {
        self.require_outside_render_pass()?;
        check_range(src.size(), 0, texture.info().byte_size())?;
        let src = mock_buffer(src)?;
        let texture = mock_texture(texture)?;
        self.pending.push(PendingOp::CopyToTexture {
            texture_id: texture.id,
            src: Arc::clone(&src.data),
            dst: Arc::clone(&texture.data),
            layout: Arc::clone(&texture.layout),
        });
        self.commands.push(format!("copy_buffer_to_texture {}", texture.id));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockCommandList {
    fn drop(&mut self) {
        self.state.lock().unwrap().destroyed(self.kind);
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    state: SharedState,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(MockGpuState::default())) }
    }

    /// Shared state, for assertions
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// A swapchain on a 1..=4096 surface that offers 2..=3 images
    pub fn create_swapchain(&self, extent: Extent2D) -> Result<MockSwapchain> {
        let caps = SurfaceCapabilities {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: None,
            min_extent: Extent2D::new(1, 1),
            max_extent: Extent2D::new(4096, 4096),
        };
        MockSwapchain::new(self.state(), caps, extent)
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("zero-sized buffer".to_string()));
        }
        let kind = format!("buffer:{:?}", desc.usage);
        self.state.lock().unwrap().created(&kind);
        Ok(Arc::new(MockBuffer {
            state: self.state(),
            kind,
            data: Arc::new(Mutex::new(vec![0; desc.size as usize])),
            desc,
        }))
    }

    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource("zero-sized texture".to_string()));
        }
        let kind = match desc.usage {
            TextureUsage::Sampled => "texture",
            TextureUsage::ColorAttachment | TextureUsage::DepthAttachment => "attachment",
        };
        let info = TextureInfo { width: desc.width, height: desc.height, format: desc.format, usage: desc.usage };
        let id = {
            let mut state = self.state.lock().unwrap();
            state.created(kind);
            state.alloc_id()
        };
        Ok(Arc::new(MockTexture {
            state: Some(self.state()),
            kind,
            id,
            info,
            data: Arc::new(Mutex::new(vec![0; info.byte_size() as usize])),
            layout: Arc::new(Mutex::new(ImageLayout::Undefined)),
        }))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        let magic = desc.code.get(..4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        if magic != Some(SPIRV_MAGIC) || desc.code.len() % 4 != 0 {
            return Err(Error::ShaderLoad("not a SPIR-V binary".to_string()));
        }
        Ok(Arc::new(MockShader { stage: desc.stage, entry_point: desc.entry_point.to_string() }))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        desc.validate()?;
        self.state.lock().unwrap().created("render_pass");
        Ok(Arc::new(MockRenderPass {
            state: self.state(),
            subpass_count: desc.subpasses.len() as u32,
            attachment_count: desc.attachments.len() as u32,
        }))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        if desc.vertex_shader.stage() != ShaderStage::Vertex || desc.fragment_shader.stage() != ShaderStage::Fragment {
            return Err(Error::PipelineCreation("shader stages do not match".to_string()));
        }
        if desc.subpass >= desc.render_pass.subpass_count() {
            return Err(Error::PipelineCreation(format!("subpass {} out of range", desc.subpass)));
        }
        if desc.push_constant_size % 4 != 0 {
            return Err(Error::PipelineCreation("push constant size not a multiple of 4".to_string()));
        }
        self.state.lock().unwrap().created("pipeline");
        Ok(Arc::new(MockPipeline {
            state: self.state(),
            viewport: desc.viewport,
            subpass: desc.subpass,
            binding_layouts: desc.binding_layouts.clone(),
            push_constant_size: desc.push_constant_size,
            depth_test: desc.depth_test,
        }))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        if desc.attachments.len() as u32 != desc.render_pass.attachment_count() {
            return Err(Error::InvalidResource(format!(
                "{} views for {} attachments",
                desc.attachments.len(),
                desc.render_pass.attachment_count()
            )));
        }
        let mut attachment_ids = Vec::with_capacity(desc.attachments.len());
        for view in &desc.attachments {
            let info = view.info();
            if info.width != desc.width || info.height != desc.height {
                return Err(Error::InvalidResource(format!(
                    "{}x{} view in a {}x{} framebuffer",
                    info.width, info.height, desc.width, desc.height
                )));
            }
            attachment_ids.push(mock_texture(view.as_ref())?.id);
        }
        self.state.lock().unwrap().created("framebuffer");
        Ok(Arc::new(MockFramebuffer {
            state: self.state(),
            width: desc.width,
            height: desc.height,
            attachment_ids,
        }))
    }

    fn create_descriptor_pool(&self, desc: DescriptorPoolDesc) -> Result<Arc<dyn DescriptorPool>> {
        self.state.lock().unwrap().created("descriptor_pool");
        Ok(Arc::new(MockDescriptorPool {
            state: self.state(),
            layout: desc.layout,
            capacity: desc.max_sets,
            allocated: AtomicU32::new(0),
        }))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        self.state.lock().unwrap().created("command_list");
        Ok(Box::new(MockCommandList::new(self.state(), "command_list")))
    }

    fn create_frame_sync(&self) -> Result<Box<dyn FrameSync>> {
        let mut state = self.state.lock().unwrap();
        state.created("frame_sync");
        let id = state.alloc_id();
        state.syncs.insert(id, MockSyncState { fence_signaled: true, ..Default::default() });
        Ok(Box::new(MockFrameSync { state: self.state(), id }))
    }

    fn begin_one_shot(&self) -> Result<Box<dyn CommandList>> {
        self.state.lock().unwrap().created("one_shot");
        let mut cmd = MockCommandList::new(self.state(), "one_shot");
        cmd.begin()?;
        Ok(Box::new(cmd))
    }

    fn submit_one_shot(&self, mut cmd: Box<dyn CommandList>) -> Result<()> {
        cmd.end()?;
        let cmd = cmd
            .as_any()
            .downcast_ref::<MockCommandList>()
            .ok_or_else(|| Error::InvalidResource("not a mock command list".to_string()))?;
        for op in &cmd.pending {
            op.execute()?;
        }
        self.state.lock().unwrap().one_shot_submissions += 1;
        Ok(())
    }

    fn submit_frame(&self, cmd: &dyn CommandList, sync: &dyn FrameSync) -> Result<()> {
        let cmd = cmd
            .as_any()
            .downcast_ref::<MockCommandList>()
            .ok_or_else(|| Error::InvalidResource("not a mock command list".to_string()))?;
        if cmd.recording {
            return Err(backend_error("submitting a command list that is still recording"));
        }
        let sync = mock_sync(sync)?;

        let mut state = self.state.lock().unwrap();
        let record = state.syncs.get(&sync.id).cloned().unwrap_or_default();
        if record.fence_signaled || record.pending_submission.is_some() {
            return Err(backend_error("submit with a fence that was not reset"));
        }
        if !record.image_acquired {
            return Err(backend_error("submit waits on an image-acquired semaphore nobody signals"));
        }

        state.next_submission += 1;
        let serial = state.next_submission;
        state.incomplete.insert(serial);
        if let Some(record) = state.syncs.get_mut(&sync.id) {
            record.image_acquired = false;
            record.render_finished = true;
            record.pending_submission = Some(serial);
        }
        cmd.in_flight.set(Some(serial));
        state.submissions += 1;
        state.last_frame_commands = cmd.commands.clone();
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.complete_all();
        state.events.push("wait_idle".to_string());
        Ok(())
    }

    fn color_attachment_format(&self) -> TextureFormat {
        TextureFormat::R8G8B8A8_UNORM
    }

    fn depth_format(&self) -> TextureFormat {
        TextureFormat::D32_FLOAT
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    state: SharedState,
    caps: SurfaceCapabilities,
    formats: Vec<SurfaceFormat>,
    extent: Extent2D,
    format: TextureFormat,
    views: Vec<Arc<dyn Texture>>,
    next_image: u32,
    acquired: Vec<u32>,
}

impl MockSwapchain {
    pub fn new(state: SharedState, caps: SurfaceCapabilities, requested: Extent2D) -> Result<Self> {
        let formats = vec![
            SurfaceFormat { format: Some(TextureFormat::B8G8R8A8_UNORM), color_space: ColorSpace::SrgbNonlinear },
            SurfaceFormat { format: Some(TextureFormat::B8G8R8A8_SRGB), color_space: ColorSpace::SrgbNonlinear },
        ];
        let mut chain = Self {
            state,
            caps,
            formats,
            extent: Extent2D::default(),
            format: TextureFormat::B8G8R8A8_SRGB,
            views: Vec::new(),
            next_image: 0,
            acquired: Vec::new(),
        };
        chain.build(requested)?;
        Ok(chain)
    }

    /// Change what the surface reports, as a window system would on resize
    pub fn set_capabilities(&mut self, caps: SurfaceCapabilities) {
        self.caps = caps;
    }

    fn build(&mut self, requested: Extent2D) -> Result<()> {
        let index = choose_surface_format(&self.formats)
            .ok_or_else(|| Error::SurfaceUnsupported("surface reports no formats".to_string()))?;
        self.format = self.formats[index].format.unwrap_or(TextureFormat::B8G8R8A8_UNORM);
        self.extent = choose_extent(&self.caps, requested);

        let count = choose_image_count(&self.caps);
        let mut state = self.state.lock().unwrap();
        self.views = (0..count)
            .map(|_| {
                let info = TextureInfo {
                    width: self.extent.width,
                    height: self.extent.height,
                    format: self.format,
                    usage: TextureUsage::ColorAttachment,
                };
                Arc::new(MockTexture {
                    state: None,
                    kind: "swapchain_view",
                    id: state.alloc_id(),
                    info,
                    data: Arc::new(Mutex::new(Vec::new())),
                    layout: Arc::new(Mutex::new(ImageLayout::Undefined)),
                }) as Arc<dyn Texture>
            })
            .collect();
        self.next_image = 0;
        self.acquired.clear();
        Ok(())
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, sync: &dyn FrameSync) -> Result<u32> {
        let sync = mock_sync(sync)?;
        let mut state = self.state.lock().unwrap();
        match state.fail_next_acquire.take() {
            Some(StaleReason::OutOfDate) => return Err(Error::SurfaceStale(StaleReason::OutOfDate)),
            Some(StaleReason::Suboptimal) => state.events.push("acquire:suboptimal".to_string()),
            None => {}
        }
        if self.acquired.len() >= self.views.len() {
            return Err(backend_error("every image is acquired; acquire would never return"));
        }
        let record = state.syncs.entry(sync.id).or_default();
        if record.image_acquired {
            return Err(backend_error("image-acquired semaphore is already signaled"));
        }
        record.image_acquired = true;

        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.views.len() as u32;
        self.acquired.push(index);
        Ok(index)
    }

    fn present(&mut self, image_index: u32, sync: &dyn FrameSync) -> Result<()> {
        let sync = mock_sync(sync)?;
        let position = self
            .acquired
            .iter()
            .position(|i| *i == image_index)
            .ok_or_else(|| Error::InvalidResource(format!("image {} was not acquired", image_index)))?;

        let mut state = self.state.lock().unwrap();
        let record = state.syncs.entry(sync.id).or_default();
        if !record.render_finished {
            return Err(backend_error("present waits on a rendering-finished semaphore nobody signals"));
        }
        record.render_finished = false;
        self.acquired.remove(position);

        if let Some(reason) = state.fail_next_present.take() {
            return Err(Error::SurfaceStale(reason));
        }
        state.presents += 1;
        Ok(())
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.is_idle() {
                return Err(backend_error("swapchain recreated while the device is busy"));
            }
            if self.views.iter().any(|view| Arc::strong_count(view) > 1) {
                return Err(Error::InvalidResource("old image view still referenced".to_string()));
            }
            state.events.push("recreate_swapchain".to_string());
        }
        self.build(extent)
    }

    fn image_count(&self) -> u32 {
        self.views.len() as u32
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn image_view(&self, index: u32) -> Result<Arc<dyn Texture>> {
        self.views
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::InvalidResource(format!(
                "image view {} out of range ({} images)",
                index,
                self.views.len()
            )))
    }
}

// ============================================================================
// Mock ImageDecoder
// ============================================================================

/// Decodes any path into a 2x2 image whose texels depend on the path
///
/// Paths containing "missing" fail like an absent file. Every decode is
/// counted, so tests can check the cache does not decode twice.
#[derive(Default)]
pub struct MockImageDecoder {
    pub decodes: Arc<AtomicU32>,
}

impl crate::resource::ImageDecoder for MockImageDecoder {
    fn decode(&self, path: &std::path::Path) -> Result<crate::resource::DecodedImage> {
        let name = path.to_string_lossy();
        if name.contains("missing") {
            return Err(Error::AssetImport(format!("{}: not found", name)));
        }
        self.decodes.fetch_add(1, Ordering::Relaxed);
        let seed = name.bytes().fold(7u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
        Ok(crate::resource::DecodedImage {
            width: 2,
            height: 2,
            rgba: (0..16u8).map(|i| seed.wrapping_add(i)).collect(),
        })
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
