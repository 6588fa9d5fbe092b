/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Contains everything needed for GPU operations:
/// - Instance and logical device for Vulkan API calls
/// - Allocator for memory management
/// - Graphics and present queues
/// - Command pool for one-shot upload operations
///
/// Every buffer, texture, pipeline, pool, command list and swapchain holds an
/// `Arc<GpuContext>`. The context is destroyed with the last of them, which
/// makes destroying the device while anything still references it impossible.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};
use vista_engine::vista::render::MemoryPropertyFlags;
use vista_engine::vista::Result;
use vista_engine::{engine_debug, engine_err};

pub struct GpuContext {
    /// Vulkan loader (surfaces are created per swapchain)
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// Dropped before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    /// Same handle as `graphics_queue` when one family does both
    pub present_queue: vk::Queue,
    pub present_queue_family: u32,

    /// Reusable command pool for one-shot upload operations
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub upload_command_pool: Mutex<vk::CommandPool>,

    /// Properties of each device memory type, indexed like the driver reports them
    pub memory_types: Vec<MemoryPropertyFlags>,

    /// Whether sampler anisotropy was enabled on the logical device
    pub anisotropy_enabled: bool,

    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

/// Queue handles and families of the logical device
pub struct QueueInfo {
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,
    pub present_queue_family: u32,
}

/// Validation messenger, when the instance was created with one
pub struct DebugMessenger {
    pub loader: ash::ext::debug_utils::Instance,
    pub messenger: vk::DebugUtilsMessengerEXT,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        queues: QueueInfo,
        upload_command_pool: vk::CommandPool,
        memory_types: Vec<MemoryPropertyFlags>,
        anisotropy_enabled: bool,
        debug: Option<DebugMessenger>,
    ) -> Self {
        let (debug_utils_loader, debug_messenger) = match debug {
            Some(debug) => (Some(debug.loader), Some(debug.messenger)),
            None => (None, None),
        };

        Self {
            entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue: queues.graphics_queue,
            graphics_queue_family: queues.graphics_queue_family,
            present_queue: queues.present_queue,
            present_queue_family: queues.present_queue_family,
            upload_command_pool: Mutex::new(upload_command_pool),
            memory_types,
            anisotropy_enabled,
            debug_utils_loader,
            debug_messenger,
        }
    }

    /// Lock the allocator
    pub fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!("vista::vulkan", "GPU allocator mutex poisoned"))
    }

    /// Lock the upload command pool
    pub fn upload_pool(&self) -> Result<MutexGuard<'_, vk::CommandPool>> {
        self.upload_command_pool
            .lock()
            .map_err(|_| engine_err!("vista::vulkan", "Upload command pool mutex poisoned"))
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Upload command pool
            if let Ok(pool) = self.upload_command_pool.get_mut() {
                if *pool != vk::CommandPool::null() {
                    self.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }

            // 2. Allocator: frees its VkDeviceMemory blocks, needs the device
            ManuallyDrop::drop(&mut self.allocator);

            // 3. Debug messenger, after silencing the callback
            crate::debug::cleanup_debug_config();
            if let (Some(loader), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            // 4. Device, then instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }

        engine_debug!("vista::vulkan", "GPU context destroyed");
    }
}
