/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns the instance-level setup: loader, instance, validation messenger,
/// adapter choice and logical device. Everything it creates shares one
/// `GpuContext`.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::{Arc, Mutex};
use vista_engine::vista::config::EngineConfig;
use vista_engine::vista::render::{
    find_memory_type, select_adapter, AdapterCandidate, Buffer, BufferDesc, BufferUsage, CommandList,
    DescriptorPool, DescriptorPoolDesc, Extent2D, FrameSync, Framebuffer, FramebufferDesc, MemoryLocation,
    Pipeline, PipelineDesc, RenderPass, RenderPassDesc, Shader, ShaderDesc, Texture, TextureDesc,
    TextureFormat, TextureInfo, TextureUsage,
};
use vista_engine::vista::{Error, GraphicsDevice, Result};
use vista_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_warn};

use crate::downcast;
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::{DebugMessenger, GpuContext, QueueInfo};
use crate::vulkan_descriptor_pool::VulkanDescriptorPool;
use crate::vulkan_format::{
    adapter_type_from_vk, aspect_mask, memory_flags_from_vk, memory_location_to_allocator,
    read_aspect_mask, required_memory_flags, texture_format_to_vk,
};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_shader::VulkanShader;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_sync::VulkanFrameSync;
use crate::vulkan_texture::{create_view, VulkanTexture};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Format of the off-screen color attachment
const COLOR_ATTACHMENT_FORMAT: TextureFormat = TextureFormat::R8G8B8A8_UNORM;

/// Depth formats in order of preference
const DEPTH_CANDIDATES: [TextureFormat; 3] = [
    TextureFormat::D32_FLOAT,
    TextureFormat::D32_FLOAT_S8_UINT,
    TextureFormat::D24_UNORM_S8_UINT,
];

/// Vulkan device implementation
///
/// Central object for creating resources and submitting commands. Swapchains
/// are created per window with [`VulkanGraphicsDevice::create_swapchain`].
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    surface_loader: ash::khr::surface::Instance,
    /// Shared with every descriptor pool
    samplers: Arc<Mutex<SamplerCache>>,
    depth_format: TextureFormat,
    adapter_name: String,
}

/// Instance-level objects created so far, destroyed in reverse order on failure
#[derive(Default)]
struct PartialInit {
    instance: Option<ash::Instance>,
    debug: Option<DebugMessenger>,
    device: Option<ash::Device>,
}

impl Drop for PartialInit {
    fn drop(&mut self) {
        unsafe {
            if let Some(device) = self.device.take() {
                device.destroy_device(None);
            }
            if let Some(debug) = self.debug.take() {
                crate::debug::cleanup_debug_config();
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }
            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
        }
    }
}

/// First format of `candidates` the device can use as depth attachment
pub(crate) fn pick_depth_format(
    candidates: &[TextureFormat],
    supported: impl Fn(TextureFormat) -> bool,
) -> Option<TextureFormat> {
    candidates.iter().copied().find(|&format| supported(format))
}

pub(crate) fn buffer_usage_flags(usage: BufferUsage) -> vk::BufferUsageFlags {
    match usage {
        BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
        BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
    }
}

pub(crate) fn texture_usage_flags(usage: TextureUsage) -> vk::ImageUsageFlags {
    match usage {
        TextureUsage::Sampled => vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
        TextureUsage::ColorAttachment => {
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::INPUT_ATTACHMENT
        }
        TextureUsage::DepthAttachment => {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::INPUT_ATTACHMENT
        }
    }
}

impl VulkanGraphicsDevice {
    /// Create the device for rendering to `window`
    ///
    /// Validation is enabled when `config.enable_validation` is set and the
    /// crate was built with the `vulkan-validation` feature.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &EngineConfig) -> Result<Self> {
        let entry = unsafe {
            ash::Entry::load()
                .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to load Vulkan library: {:?}", e))?
        };

        let display_handle = window
            .display_handle()
            .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to get display handle: {}", e))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to get window handle: {}", e))?;

        let validation = Self::validation_enabled(&entry, config);
        let mut init = PartialInit::default();

        // Instance
        let app_name = CString::new(config.app_name.as_str())
            .map_err(|_| engine_err!("vista::vulkan", InitializationFailed, "Application name contains a NUL byte"))?;
        let (major, minor, patch) = config.app_version;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(c"Vista")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to get required extensions: {}", e))?
            .to_vec();
        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        let layer_names = if validation { vec![VALIDATION_LAYER.as_ptr()] } else { Vec::new() };

        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = unsafe {
            entry
                .create_instance(&instance_info, None)
                .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to create Vulkan instance: {:?}", e))?
        };
        init.instance = Some(instance.clone());

        // Validation messages go through the engine logger
        if validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            crate::debug::init_debug_config();

            let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(crate::debug::severity_filter(config.log_level))
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

            let messenger = unsafe {
                loader
                    .create_debug_utils_messenger(&debug_info, None)
                    .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to create debug messenger: {:?}", e))?
            };
            init.debug = Some(DebugMessenger { loader, messenger });
        }

        // Temporary surface, only to ask adapters about presentation
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        let surface = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle.as_raw(), window_handle.as_raw(), None)
                .map_err(|e| engine_err!("vista::vulkan", SurfaceUnsupported, "Failed to create surface: {:?}", e))?
        };

        let physical_devices = unsafe { instance.enumerate_physical_devices() };
        let selection = physical_devices
            .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to enumerate physical devices: {:?}", e))
            .and_then(|devices| {
                let candidates: Vec<AdapterCandidate> = devices
                    .iter()
                    .map(|&pd| Self::describe_adapter(&instance, &surface_loader, surface, pd))
                    .collect();
                let selection = select_adapter(&candidates)?;
                Ok((devices[selection.index], candidates[selection.index].name.clone(), selection))
            });

        unsafe { surface_loader.destroy_surface(surface, None) };
        let (physical_device, adapter_name, selection) = selection?;

        engine_info!(
            "vista::vulkan",
            "Using adapter '{}' (graphics family {}, present family {})",
            adapter_name,
            selection.graphics_queue_family,
            selection.present_queue_family
        );

        // Logical device
        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(selection.graphics_queue_family)
            .queue_priorities(&queue_priorities)];
        if selection.needs_separate_present_queue() {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(selection.present_queue_family)
                    .queue_priorities(&queue_priorities),
            );
        }

        let supported_features = unsafe { instance.get_physical_device_features(physical_device) };
        let anisotropy_enabled = supported_features.sampler_anisotropy == vk::TRUE;
        let device_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy_enabled);
        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device, &device_info, None)
                .map_err(|e| engine_err!("vista::vulkan", DeviceCreation, "Failed to create logical device: {:?}", e))?
        };
        init.device = Some(device.clone());

        let queues = unsafe {
            QueueInfo {
                graphics_queue: device.get_device_queue(selection.graphics_queue_family, 0),
                graphics_queue_family: selection.graphics_queue_family,
                present_queue: device.get_device_queue(selection.present_queue_family, 0),
                present_queue_family: selection.present_queue_family,
            }
        };

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let memory_types: Vec<_> = memory_properties.memory_types[..memory_properties.memory_type_count as usize]
            .iter()
            .map(|memory_type| memory_flags_from_vk(memory_type.property_flags))
            .collect();

        let depth_format = pick_depth_format(&DEPTH_CANDIDATES, |format| {
            let properties = unsafe {
                instance.get_physical_device_format_properties(physical_device, texture_format_to_vk(format))
            };
            properties
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| engine_err!("vista::vulkan", NoSuitableDevice, "'{}' supports none of the depth formats", adapter_name))?;

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to create GPU allocator: {:?}", e))?;

        // Reusable pool for one-shot uploads
        let upload_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(selection.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_command_pool = unsafe {
            device
                .create_command_pool(&upload_pool_info, None)
                .map_err(|e| engine_err!("vista::vulkan", InitializationFailed, "Failed to create upload command pool: {:?}", e))?
        };

        // From here the context owns instance, messenger and device
        init.device = None;
        init.instance = None;
        let debug = init.debug.take();

        let ctx = Arc::new(GpuContext::new(
            entry,
            instance,
            physical_device,
            device,
            allocator,
            queues,
            upload_command_pool,
            memory_types,
            anisotropy_enabled,
            debug,
        ));

        engine_info!(
            "vista::vulkan",
            "Vulkan device ready (validation {}, depth {:?}, anisotropy {})",
            if validation { "on" } else { "off" },
            depth_format,
            anisotropy_enabled
        );

        Ok(Self {
            samplers: Arc::new(Mutex::new(SamplerCache::new(Arc::clone(&ctx)))),
            ctx,
            surface_loader,
            depth_format,
            adapter_name,
        })
    }

    /// Whether to load the validation layer for this run
    fn validation_enabled(entry: &ash::Entry, config: &EngineConfig) -> bool {
        if !config.enable_validation {
            return false;
        }
        if !cfg!(feature = "vulkan-validation") {
            engine_warn!(
                "vista::vulkan",
                "Validation requested but the backend was built without the vulkan-validation feature"
            );
            return false;
        }

        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let available = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().map(|name| name == VALIDATION_LAYER).unwrap_or(false));
        if !available {
            engine_warn!("vista::vulkan", "{:?} is not installed, running without validation", VALIDATION_LAYER);
        }
        available
    }

    /// Plain-data description of what `physical_device` offers for `surface`
    fn describe_adapter(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> AdapterCandidate {
        unsafe {
            let properties = instance.get_physical_device_properties(physical_device);
            let name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "Unknown adapter".to_string());

            let families = instance.get_physical_device_queue_family_properties(physical_device);
            let graphics_queue_family = families
                .iter()
                .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|index| index as u32);

            let can_present = |family: u32| {
                surface_loader
                    .get_physical_device_surface_support(physical_device, family, surface)
                    .unwrap_or(false)
            };
            // Prefer presenting from the graphics family
            let present_queue_family = graphics_queue_family
                .filter(|&family| can_present(family))
                .or_else(|| (0..families.len() as u32).find(|&family| can_present(family)));

            let extensions = instance
                .enumerate_device_extension_properties(physical_device)
                .unwrap_or_default();
            let has_swapchain = extensions.iter().any(|extension| {
                extension
                    .extension_name_as_c_str()
                    .map(|name| name == ash::khr::swapchain::NAME)
                    .unwrap_or(false)
            });
            let missing_extensions = if has_swapchain {
                Vec::new()
            } else {
                vec![ash::khr::swapchain::NAME.to_string_lossy().into_owned()]
            };

            let (surface_format_count, present_mode_count) = if present_queue_family.is_some() {
                (
                    surface_loader
                        .get_physical_device_surface_formats(physical_device, surface)
                        .map(|formats| formats.len())
                        .unwrap_or(0),
                    surface_loader
                        .get_physical_device_surface_present_modes(physical_device, surface)
                        .map(|modes| modes.len())
                        .unwrap_or(0),
                )
            } else {
                (0, 0)
            };

            AdapterCandidate {
                name,
                adapter_type: adapter_type_from_vk(properties.device_type),
                graphics_queue_family,
                present_queue_family,
                missing_extensions,
                surface_format_count,
                present_mode_count,
            }
        }
    }

    /// Name of the adapter in use
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Create the presentable chain for `window`, sized to `extent` where the
    /// surface leaves the choice to the application
    pub fn create_swapchain<W: HasDisplayHandle + HasWindowHandle>(
        &self,
        window: &W,
        extent: Extent2D,
    ) -> Result<VulkanSwapchain> {
        let display_handle = window
            .display_handle()
            .map_err(|e| engine_err!("vista::vulkan", SurfaceUnsupported, "Failed to get display handle: {}", e))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| engine_err!("vista::vulkan", SurfaceUnsupported, "Failed to get window handle: {}", e))?;

        let surface = unsafe {
            ash_window::create_surface(
                &self.ctx.entry,
                &self.ctx.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| engine_err!("vista::vulkan", SurfaceUnsupported, "Failed to create surface: {:?}", e))?
        };

        let supported = unsafe {
            self.surface_loader
                .get_physical_device_surface_support(self.ctx.physical_device, self.ctx.present_queue_family, surface)
                .unwrap_or(false)
        };
        if !supported {
            unsafe { self.surface_loader.destroy_surface(surface, None) };
            engine_bail!("vista::vulkan", SurfaceUnsupported,
                "Queue family {} cannot present to this window", self.ctx.present_queue_family);
        }

        VulkanSwapchain::new(Arc::clone(&self.ctx), self.surface_loader.clone(), surface, extent)
    }

    /// Allocate memory for a resource, checking a memory type exists first
    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        find_memory_type(&self.ctx.memory_types, requirements.memory_type_bits, required_memory_flags(location))
            .map_err(|e| {
                engine_error!("vista::vulkan", "{} ({:?}): {}", name, location, e);
                e
            })?;

        self.ctx
            .allocator()?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: memory_location_to_allocator(location),
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("vista::vulkan", "Out of GPU memory for {} ({:.2} MB): {:?}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    fn free(&self, allocation: Allocation) {
        if let Ok(mut allocator) = self.ctx.allocator() {
            allocator.free(allocation).ok();
        }
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("zero-sized buffer".to_string()));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(buffer_usage_flags(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            self.ctx
                .device
                .create_buffer(&buffer_info, None)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create buffer of {} bytes: {:?}", desc.size, e))?
        };

        let requirements = unsafe { self.ctx.device.get_buffer_memory_requirements(buffer) };
        let allocation = match self.allocate("buffer", requirements, desc.location, true) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.ctx.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
            self.free(allocation);
            unsafe { self.ctx.device.destroy_buffer(buffer, None) };
            engine_bail!("vista::vulkan", "Failed to bind buffer memory: {:?}", e);
        }

        Ok(Arc::new(VulkanBuffer::new(
            Arc::clone(&self.ctx),
            buffer,
            allocation,
            desc.size,
            desc.usage,
            desc.location,
        )))
    }

    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!("zero-sized texture {}x{}", desc.width, desc.height)));
        }
        if (desc.usage == TextureUsage::DepthAttachment) != desc.format.is_depth() {
            return Err(Error::InvalidResource(format!(
                "{:?} cannot be used as {:?}",
                desc.format, desc.usage
            )));
        }

        let format = texture_format_to_vk(desc.format);
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(texture_usage_flags(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            self.ctx
                .device
                .create_image(&image_info, None)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create {}x{} image: {:?}", desc.width, desc.height, e))?
        };

        let requirements = unsafe { self.ctx.device.get_image_memory_requirements(image) };
        let allocation = match self.allocate("texture", requirements, MemoryLocation::GpuOnly, false) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.ctx.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let bound = unsafe { self.ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) };
        let view = bound.and_then(|_| create_view(&self.ctx.device, image, format, aspect_mask(desc.format)));
        let view = match view {
            Ok(view) => view,
            Err(e) => {
                self.free(allocation);
                unsafe { self.ctx.device.destroy_image(image, None) };
                engine_bail!("vista::vulkan", "Failed to set up texture memory or view: {:?}", e);
            }
        };

        // Descriptors need a single aspect, attachments need both
        let read_view = if desc.format.has_stencil() {
            match create_view(&self.ctx.device, image, format, read_aspect_mask(desc.format)) {
                Ok(read_view) => Some(read_view),
                Err(e) => {
                    unsafe { self.ctx.device.destroy_image_view(view, None) };
                    self.free(allocation);
                    unsafe { self.ctx.device.destroy_image(image, None) };
                    engine_bail!("vista::vulkan", "Failed to create depth read view: {:?}", e);
                }
            }
        } else {
            None
        };

        let info = TextureInfo {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
        };
        Ok(Arc::new(VulkanTexture::new(Arc::clone(&self.ctx), image, view, read_view, allocation, info)))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(VulkanShader::create(Arc::clone(&self.ctx), desc)?))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(VulkanRenderPass::create(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::create(Arc::clone(&self.ctx), desc)?))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        Ok(Arc::new(VulkanFramebuffer::create(Arc::clone(&self.ctx), desc)?))
    }

    fn create_descriptor_pool(&self, desc: DescriptorPoolDesc) -> Result<Arc<dyn DescriptorPool>> {
        Ok(Arc::new(VulkanDescriptorPool::create(
            Arc::clone(&self.ctx),
            Arc::clone(&self.samplers),
            desc,
        )?))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(Arc::clone(&self.ctx))?))
    }

    fn create_frame_sync(&self) -> Result<Box<dyn FrameSync>> {
        Ok(Box::new(VulkanFrameSync::new(Arc::clone(&self.ctx))?))
    }

    fn begin_one_shot(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::one_shot(Arc::clone(&self.ctx))?))
    }

    fn submit_one_shot(&self, mut cmd: Box<dyn CommandList>) -> Result<()> {
        cmd.end()?;
        let vk_cmd: &VulkanCommandList = downcast(cmd.as_any(), "command list")?;

        let fence = unsafe {
            self.ctx
                .device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to create upload fence: {:?}", e))?
        };

        let command_buffers = [vk_cmd.command_buffer()];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        let result = unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], fence)
                .and_then(|_| self.ctx.device.wait_for_fences(&[fence], true, u64::MAX))
        };

        unsafe { self.ctx.device.destroy_fence(fence, None) };
        result.map_err(|e| engine_err!("vista::vulkan", "One-shot submission failed: {:?}", e))
    }

    fn submit_frame(&self, cmd: &dyn CommandList, sync: &dyn FrameSync) -> Result<()> {
        let vk_cmd: &VulkanCommandList = downcast(cmd.as_any(), "command list")?;
        let vk_sync: &VulkanFrameSync = downcast(sync.as_any(), "frame sync")?;
        if vk_cmd.is_recording() {
            return Err(Error::BackendError("submitting a command list that is still recording".to_string()));
        }

        let wait_semaphores = [vk_sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [vk_cmd.command_buffer()];
        let signal_semaphores = [vk_sync.render_finished];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], vk_sync.in_flight)
                .map_err(|e| engine_err!("vista::vulkan", "Failed to submit frame: {:?}", e))
        }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| engine_err!("vista::vulkan", "Failed to wait idle: {:?}", e))
        }
    }

    fn color_attachment_format(&self) -> TextureFormat {
        COLOR_ATTACHMENT_FORMAT
    }

    fn depth_format(&self) -> TextureFormat {
        self.depth_format
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
        engine_debug!("vista::vulkan", "Vulkan device dropped ('{}')", self.adapter_name);
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
