//! Instance, surface, and device setup.
//!
//! Initialization runs top-down: [`VulkanInstance`] loads the library and
//! creates the instance, [`SurfaceHandle`] binds it to a window,
//! [`PhysicalDeviceInfo`] picks a GPU, and [`LogicalDevice`] opens it.
//! [`VulkanContext`] owns the whole chain plus the swapchain built on it,
//! with fields declared in reverse creation order so teardown unwinds
//! correctly.
//!
//! Resource constructors further down the backend do not take the whole
//! context; they take a [`DeviceContext`], a small immutable bundle of the
//! handles and cached device properties they actually need.

use std::collections::HashSet;
use std::ffi::{c_void, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr;
use ash::{vk, Device, Entry, Instance};

use crate::core::config::RendererConfig;
use crate::render::window::Window;

use super::swapchain::Swapchain;
use super::{VulkanError, VulkanResult};

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Whether a Vulkan loader is present on this system.
///
/// Cheap enough to call before committing to renderer creation.
pub fn is_supported() -> bool {
    unsafe { Entry::load() }.is_ok()
}

fn to_cstring(s: &str) -> VulkanResult<CString> {
    CString::new(s).map_err(|_| {
        VulkanError::InitializationFailed(format!("string contains an interior nul byte: {s}"))
    })
}

/// Routes validation layer messages into the `log` facade.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}

/// The Vulkan instance, with optional validation layers and debug output.
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug_utils: Option<DebugUtils>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    api_version: u32,
}

impl VulkanInstance {
    /// Load the Vulkan library and create an instance with the extensions
    /// the window system requires.
    ///
    /// Validation layers are enabled according to
    /// [`RendererConfig::validation_enabled`], silently downgraded with a
    /// warning when the layer is not installed.
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("failed to load Vulkan library: {e}"))
        })?;

        let api_version = match entry.try_enumerate_instance_version() {
            Ok(Some(version)) => version,
            Ok(None) => vk::API_VERSION_1_0,
            Err(e) => return Err(VulkanError::Api(e)),
        };

        let app_name = to_cstring(&config.application_name)?;
        let engine_name = to_cstring("forge_engine")?;
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let validation = config.validation_enabled() && validation_layer_available(&entry)?;
        if config.validation_enabled() && !validation {
            log::warn!("validation layers requested but {VALIDATION_LAYER} is not installed");
        }

        let required_extensions = window
            .get_required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let extension_names = required_extensions
            .iter()
            .map(|ext| to_cstring(ext))
            .collect::<VulkanResult<Vec<_>>>()?;
        let mut extension_ptrs: Vec<*const std::os::raw::c_char> =
            extension_names.iter().map(|ext| ext.as_ptr()).collect();
        if validation {
            extension_ptrs.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if validation {
            vec![to_cstring(VALIDATION_LAYER)?]
        } else {
            Vec::new()
        };
        let layer_ptrs: Vec<*const std::os::raw::c_char> =
            layer_names.iter().map(|layer| layer.as_ptr()).collect();

        let enabled_features = [
            vk::ValidationFeatureEnableEXT::SYNCHRONIZATION_VALIDATION,
            vk::ValidationFeatureEnableEXT::BEST_PRACTICES,
        ];
        let mut validation_features =
            vk::ValidationFeaturesEXT::builder().enabled_validation_features(&enabled_features);

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);
        if validation {
            create_info = create_info.push_next(&mut validation_features);
        }

        let instance =
            unsafe { entry.create_instance(&create_info, None) }.map_err(VulkanError::Api)?;
        log::debug!(
            "Vulkan instance created (loader {}, validation {})",
            version_to_string(api_version),
            if validation { "on" } else { "off" }
        );

        let (debug_utils, debug_messenger) = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = create_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            api_version,
        })
    }

    /// The loaded Vulkan entry points.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// The instance handle wrapper.
    pub fn handle(&self) -> &Instance {
        &self.instance
    }

    /// Highest instance-level API version the loader supports.
    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Loader version formatted as `major.minor.patch`.
    pub fn version_string(&self) -> String {
        version_to_string(self.api_version)
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) =
                (self.debug_utils.as_ref(), self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn version_to_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
    let layers = entry
        .enumerate_instance_layer_properties()
        .map_err(VulkanError::Api)?;
    Ok(layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name.to_string_lossy() == VALIDATION_LAYER
    }))
}

fn create_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .map_err(VulkanError::Api)
}

/// A window surface plus the extension loader that operates on it.
///
/// Also the query point for everything surface-dependent: capabilities,
/// formats, present modes, and per-family presentation support.
pub struct SurfaceHandle {
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl SurfaceHandle {
    /// Create a presentable surface on `window`.
    pub fn new(entry: &Entry, instance: &Instance, window: &mut Window) -> VulkanResult<Self> {
        let surface_loader = khr::Surface::new(entry, instance);
        let surface = window
            .create_vulkan_surface(instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        Ok(Self {
            surface_loader,
            surface,
        })
    }

    /// Raw surface handle.
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Current surface capabilities. Re-queried on every swapchain build
    /// because the extent limits track the window size.
    pub fn capabilities(
        &self,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(device, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    /// Pixel formats the surface supports.
    pub fn formats(&self, device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(device, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    /// Present modes the surface supports.
    pub fn present_modes(
        &self,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(device, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    /// Whether `queue_family` on `device` can present to this surface.
    pub fn supports_present(
        &self,
        device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> VulkanResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(device, queue_family, self.surface)
        }
        .map_err(VulkanError::Api)
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// A selected physical device and everything queried about it up front.
///
/// The handle is not owned; physical devices belong to the instance.
pub struct PhysicalDeviceInfo {
    /// Physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties, including limits.
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported optional features.
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory heaps and types, cached for allocation decisions.
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family with graphics support.
    pub graphics_family: u32,
    /// Queue family that can present to the surface. May equal
    /// `graphics_family`.
    pub present_family: u32,
    /// Highest sample count usable for both color and depth attachments.
    pub msaa_samples: vk::SampleCountFlags,
}

impl PhysicalDeviceInfo {
    /// Pick the best physical device for rendering to `surface`.
    ///
    /// Devices missing a graphics or present queue, the swapchain
    /// extension, any surface format or present mode, or anisotropic
    /// filtering are disqualified. The rest are ranked by
    /// [`score_device`]; ties keep the earliest enumerated device. No
    /// usable device is a hard error.
    pub fn select(instance: &Instance, surface: &SurfaceHandle) -> VulkanResult<Self> {
        let devices =
            unsafe { instance.enumerate_physical_devices() }.map_err(VulkanError::Api)?;

        let mut best: Option<Self> = None;
        let mut best_score = -1;
        for device in devices {
            let properties = unsafe { instance.get_physical_device_properties(device) };
            let candidate = Self::evaluate(instance, surface, device, properties)?;
            let score = score_device(&properties, candidate.is_some());
            log::debug!("physical device {} scored {score}", device_name(&properties));
            if score > best_score {
                if let Some(info) = candidate {
                    best_score = score;
                    best = Some(info);
                }
            }
        }

        let info = best.ok_or(VulkanError::NoSuitableDevice)?;
        log::info!(
            "selected GPU: {} ({:?}, {:?} MSAA)",
            device_name(&info.properties),
            info.properties.device_type,
            info.msaa_samples
        );
        Ok(info)
    }

    /// Returns `None` when the device cannot run the renderer at all.
    fn evaluate(
        instance: &Instance,
        surface: &SurfaceHandle,
        device: vk::PhysicalDevice,
        properties: vk::PhysicalDeviceProperties,
    ) -> VulkanResult<Option<Self>> {
        let (graphics_family, present_family) =
            match find_queue_families(instance, surface, device)? {
                (Some(graphics), Some(present)) => (graphics, present),
                _ => return Ok(None),
            };

        if !supports_swapchain_extension(instance, device)? {
            return Ok(None);
        }
        if surface.formats(device)?.is_empty() || surface.present_modes(device)?.is_empty() {
            return Ok(None);
        }

        let features = unsafe { instance.get_physical_device_features(device) };
        if features.sampler_anisotropy != vk::TRUE {
            return Ok(None);
        }

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        Ok(Some(Self {
            device,
            properties,
            features,
            memory_properties,
            graphics_family,
            present_family,
            msaa_samples: max_sample_count(&properties),
        }))
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

fn find_queue_families(
    instance: &Instance,
    surface: &SurfaceHandle,
    device: vk::PhysicalDevice,
) -> VulkanResult<(Option<u32>, Option<u32>)> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut graphics = None;
    let mut present = None;
    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(index);
        }
        if present.is_none() && surface.supports_present(device, index)? {
            present = Some(index);
        }
        if graphics.is_some() && present.is_some() {
            break;
        }
    }
    Ok((graphics, present))
}

fn supports_swapchain_extension(
    instance: &Instance,
    device: vk::PhysicalDevice,
) -> VulkanResult<bool> {
    let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
        .map_err(VulkanError::Api)?;
    Ok(extensions.iter().any(|ext| {
        let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        name == khr::Swapchain::name()
    }))
}

/// Rank a device for selection. Unsuitable devices score `-1`; suitable
/// ones score 1000 for a discrete GPU plus the maximum 2D image dimension
/// as a capability proxy.
fn score_device(properties: &vk::PhysicalDeviceProperties, suitable: bool) -> i32 {
    if !suitable {
        return -1;
    }
    let mut score = 0;
    if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 1000;
    }
    score + properties.limits.max_image_dimension_2d as i32
}

/// Highest sample count supported by both color and depth framebuffer
/// attachments.
fn max_sample_count(properties: &vk::PhysicalDeviceProperties) -> vk::SampleCountFlags {
    let counts = properties.limits.framebuffer_color_sample_counts
        & properties.limits.framebuffer_depth_sample_counts;
    for candidate in [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ] {
        if counts.contains(candidate) {
            return candidate;
        }
    }
    vk::SampleCountFlags::TYPE_1
}

/// The sample count actually used: the configured request clamped to what
/// the device supports. Both sides are single power-of-two bits, so the
/// numeric minimum is the correct clamp.
pub(crate) fn effective_sample_count(
    device_max: vk::SampleCountFlags,
    requested: u32,
) -> vk::SampleCountFlags {
    vk::SampleCountFlags::from_raw(device_max.as_raw().min(requested))
}

/// The opened device and its queues.
pub struct LogicalDevice {
    device: Device,
    swapchain_loader: khr::Swapchain,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Open `physical` with one queue per distinct family and anisotropic
    /// filtering enabled.
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let mut unique_families = HashSet::new();
        unique_families.insert(physical.graphics_family);
        unique_families.insert(physical.present_family);

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);
        let extension_names = [khr::Swapchain::name().as_ptr()];

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical.device, &create_info, None) }
            .map_err(VulkanError::Api)?;

        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };
        let swapchain_loader = khr::Swapchain::new(instance, &device);

        log::debug!(
            "logical device created (graphics family {}, present family {})",
            physical.graphics_family,
            physical.present_family
        );

        Ok(Self {
            device,
            swapchain_loader,
            graphics_queue,
            present_queue,
        })
    }

    /// The device handle wrapper.
    pub fn handle(&self) -> &Device {
        &self.device
    }

    /// Swapchain extension loader for this device.
    pub fn swapchain_loader(&self) -> &khr::Swapchain {
        &self.swapchain_loader
    }

    /// Queue used for graphics and transfer submissions.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue used for presentation.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Block until the device finishes all submitted work.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(VulkanError::Api)
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Immutable bundle of device handles and cached properties that resource
/// constructors need.
///
/// Cloning is cheap; the contained dispatch tables are reference counted
/// and destruction stays with [`LogicalDevice`] and [`VulkanInstance`].
#[derive(Clone)]
pub struct DeviceContext {
    instance: Instance,
    device: Device,
    physical_device: vk::PhysicalDevice,
    graphics_queue: vk::Queue,
    graphics_family: u32,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    limits: vk::PhysicalDeviceLimits,
}

impl DeviceContext {
    /// Device handle wrapper.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Instance handle wrapper.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Physical device the logical device was opened on.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Queue for graphics and transfer submissions.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue family index of the graphics queue.
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    /// Cached memory heap and type table.
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Cached device limits.
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.limits
    }
}

/// Owns the instance-to-swapchain chain.
///
/// Field order is teardown order: the swapchain goes first, then the
/// device (which waits for idle), then the surface, then the instance.
pub struct VulkanContext {
    swapchain: Swapchain,
    device: LogicalDevice,
    physical: PhysicalDeviceInfo,
    surface: SurfaceHandle,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Build the full chain for rendering into `window`.
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, config)?;
        let surface = SurfaceHandle::new(instance.entry(), instance.handle(), window)?;
        let physical = PhysicalDeviceInfo::select(instance.handle(), &surface)?;
        let device = LogicalDevice::new(instance.handle(), &physical)?;
        let swapchain = Swapchain::new(
            device.handle().clone(),
            device.swapchain_loader().clone(),
            &surface,
            &physical,
            window.get_framebuffer_size(),
        )?;

        Ok(Self {
            swapchain,
            device,
            physical,
            surface,
            instance,
        })
    }

    /// The instance wrapper.
    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    /// The surface wrapper.
    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    /// The selected physical device.
    pub fn physical(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    /// The logical device wrapper.
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// The current swapchain.
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Rebuild the swapchain for a new framebuffer size. Surface support
    /// is re-queried from scratch; the old swapchain is handed to the
    /// driver for resource reuse before being destroyed.
    pub fn recreate_swapchain(&mut self, framebuffer_size: (u32, u32)) -> VulkanResult<()> {
        let Self {
            swapchain,
            surface,
            physical,
            ..
        } = self;
        swapchain.recreate(surface, physical, framebuffer_size)
    }

    /// Bundle the handles resource constructors need.
    pub fn device_context(&self) -> DeviceContext {
        DeviceContext {
            instance: self.instance.handle().clone(),
            device: self.device.handle().clone(),
            physical_device: self.physical.device,
            graphics_queue: self.device.graphics_queue(),
            graphics_family: self.physical.graphics_family,
            memory_properties: self.physical.memory_properties,
            limits: self.physical.properties.limits,
        }
    }

    /// Block until the device is idle.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.device.wait_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties_with(
        device_type: vk::PhysicalDeviceType,
        max_dimension: u32,
    ) -> vk::PhysicalDeviceProperties {
        vk::PhysicalDeviceProperties {
            device_type,
            limits: vk::PhysicalDeviceLimits {
                max_image_dimension_2d: max_dimension,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn unsuitable_device_scores_negative_one() {
        let properties = properties_with(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        assert_eq!(score_device(&properties, false), -1);
    }

    #[test]
    fn discrete_gpu_outscores_integrated() {
        let discrete = properties_with(vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        let integrated = properties_with(vk::PhysicalDeviceType::INTEGRATED_GPU, 8192);
        assert!(score_device(&discrete, true) > score_device(&integrated, true));
    }

    #[test]
    fn larger_image_limit_breaks_type_ties() {
        let small = properties_with(vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        let large = properties_with(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        assert!(score_device(&large, true) > score_device(&small, true));
    }

    #[test]
    fn integrated_gpu_with_huge_limit_can_win() {
        // The dimension term is a genuine tiebreaker, not a cosmetic one.
        let discrete = properties_with(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let integrated = properties_with(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384);
        assert!(score_device(&integrated, true) > score_device(&discrete, true));
    }

    fn properties_with_samples(
        color: vk::SampleCountFlags,
        depth: vk::SampleCountFlags,
    ) -> vk::PhysicalDeviceProperties {
        vk::PhysicalDeviceProperties {
            limits: vk::PhysicalDeviceLimits {
                framebuffer_color_sample_counts: color,
                framebuffer_depth_sample_counts: depth,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn max_sample_count_takes_highest_common_bit() {
        let properties = properties_with_samples(
            vk::SampleCountFlags::TYPE_1
                | vk::SampleCountFlags::TYPE_4
                | vk::SampleCountFlags::TYPE_8,
            vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_4,
        );
        assert_eq!(max_sample_count(&properties), vk::SampleCountFlags::TYPE_4);
    }

    #[test]
    fn max_sample_count_falls_back_to_single_sampling() {
        let properties = properties_with_samples(
            vk::SampleCountFlags::TYPE_1,
            vk::SampleCountFlags::TYPE_1,
        );
        assert_eq!(max_sample_count(&properties), vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn effective_sample_count_clamps_to_device_maximum() {
        assert_eq!(
            effective_sample_count(vk::SampleCountFlags::TYPE_4, 8),
            vk::SampleCountFlags::TYPE_4
        );
    }

    #[test]
    fn effective_sample_count_honors_smaller_request() {
        assert_eq!(
            effective_sample_count(vk::SampleCountFlags::TYPE_8, 2),
            vk::SampleCountFlags::TYPE_2
        );
    }
}
