/// Adapter selection and memory-type search
///
/// Backends describe what each physical adapter offers as plain data; the
/// decisions are made here so they can be tested without a GPU.

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_info, engine_warn};

bitflags! {
    /// Properties of one device memory type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryPropertyFlags: u32 {
        const DEVICE_LOCAL = 1 << 0;
        const HOST_VISIBLE = 1 << 1;
        const HOST_COHERENT = 1 << 2;
        const HOST_CACHED = 1 << 3;
        const LAZILY_ALLOCATED = 1 << 4;
    }
}

/// Find the first memory type allowed by `type_mask` that has every `required` flag
///
/// `memory_types[i]` holds the properties of memory type `i`; bit `i` of
/// `type_mask` says whether the resource may live in it.
pub fn find_memory_type(
    memory_types: &[MemoryPropertyFlags],
    type_mask: u32,
    required: MemoryPropertyFlags,
) -> Result<u32> {
    memory_types
        .iter()
        .enumerate()
        .take(32)
        .find(|(index, properties)| {
            type_mask & (1u32 << index) != 0 && properties.contains(required)
        })
        .map(|(index, _)| index as u32)
        .ok_or_else(|| {
            Error::NoSuitableMemory(format!(
                "no memory type in mask {:#034b} has {:?}",
                type_mask, required
            ))
        })
}

/// Kind of physical adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

/// What one physical adapter offers for a given surface
#[derive(Debug, Clone)]
pub struct AdapterCandidate {
    /// Driver-reported device name
    pub name: String,
    pub adapter_type: AdapterType,
    /// First queue family with graphics support
    pub graphics_queue_family: Option<u32>,
    /// First queue family able to present to the surface
    pub present_queue_family: Option<u32>,
    /// Required device extensions the adapter does not expose
    pub missing_extensions: Vec<String>,
    /// Number of surface formats available
    pub surface_format_count: usize,
    /// Number of present modes available
    pub present_mode_count: usize,
}

impl AdapterCandidate {
    /// Why this adapter cannot be used, or `None` if it qualifies
    pub fn rejection_reason(&self) -> Option<String> {
        if self.graphics_queue_family.is_none() {
            return Some("no graphics queue family".to_string());
        }
        if self.present_queue_family.is_none() {
            return Some("no queue family can present to the surface".to_string());
        }
        if !self.missing_extensions.is_empty() {
            return Some(format!("missing extensions: {}", self.missing_extensions.join(", ")));
        }
        if self.surface_format_count == 0 {
            return Some("surface reports no formats".to_string());
        }
        if self.present_mode_count == 0 {
            return Some("surface reports no present modes".to_string());
        }
        None
    }
}

/// The chosen adapter and its queue families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterSelection {
    /// Index into the candidate list
    pub index: usize,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,
}

impl AdapterSelection {
    /// True when presentation needs its own queue
    pub fn needs_separate_present_queue(&self) -> bool {
        self.graphics_queue_family != self.present_queue_family
    }
}

/// Pick the adapter to render with
///
/// Candidates failing [`AdapterCandidate::rejection_reason`] are skipped. Among
/// the survivors a discrete GPU wins; otherwise the first survivor is used.
pub fn select_adapter(candidates: &[AdapterCandidate]) -> Result<AdapterSelection> {
    let mut first_suitable: Option<usize> = None;
    let mut discrete: Option<usize> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        match candidate.rejection_reason() {
            Some(reason) => {
                engine_debug!("vista::adapter", "Skipping '{}': {}", candidate.name, reason);
            }
            None => {
                first_suitable.get_or_insert(index);
                if candidate.adapter_type == AdapterType::Discrete && discrete.is_none() {
                    discrete = Some(index);
                }
            }
        }
    }

    let index = discrete.or(first_suitable).ok_or_else(|| {
        engine_warn!("vista::adapter", "None of {} adapter(s) qualified", candidates.len());
        Error::NoSuitableDevice(format!(
            "none of {} adapter(s) offers graphics + present queues, the swapchain extension and surface support",
            candidates.len()
        ))
    })?;

    let chosen = &candidates[index];
    engine_info!("vista::adapter", "Selected '{}' ({:?})", chosen.name, chosen.adapter_type);

    // Both families are Some: rejection_reason() returned None for this candidate
    match (chosen.graphics_queue_family, chosen.present_queue_family) {
        (Some(graphics_queue_family), Some(present_queue_family)) => Ok(AdapterSelection {
            index,
            graphics_queue_family,
            present_queue_family,
        }),
        _ => Err(Error::NoSuitableDevice(format!("'{}' lost its queue families", chosen.name))),
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
