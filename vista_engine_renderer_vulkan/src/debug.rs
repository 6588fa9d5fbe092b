/// Vulkan validation messages routed through the engine logger
///
/// The debug messenger callback maps validation severities onto engine log
/// severities, counts every message it sees and remembers how often each one
/// repeated, so a run can end with a short report.

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use vista_engine::vista::log::LogSeverity;
use vista_engine::vista::Engine;

const VALIDATION_SOURCE: &str = "vista::vulkan::validation";

/// Whether the callback forwards anything (set while a messenger exists)
static ENABLED: AtomicBool = AtomicBool::new(false);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences per message id, for the repeat marker and the report
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Number of validation messages received, per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn record(&self, severity: LogSeverity) {
        let counter = match severity {
            LogSeverity::Error => &self.errors,
            LogSeverity::Warn => &self.warnings,
            LogSeverity::Info => &self.info,
            LogSeverity::Debug | LogSeverity::Trace => &self.verbose,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Start forwarding validation messages, with fresh statistics
pub(crate) fn init_debug_config() {
    VALIDATION_STATS.reset();
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }
    ENABLED.store(true, Ordering::Release);
}

/// Stop forwarding; statistics stay readable
pub(crate) fn cleanup_debug_config() {
    ENABLED.store(false, Ordering::Release);
}

/// Validation messages received since the device was created
pub fn validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Print validation statistics to stdout
pub fn print_validation_stats_report() {
    let stats = validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());

    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }

    println!("  {} {}", "Total:".white().bold(), stats.total());

    if let Ok(tracker) = MESSAGE_TRACKER.lock() {
        let repeated = tracker
            .as_ref()
            .map(|messages| messages.values().filter(|&&count| count > 1).count())
            .unwrap_or(0);
        if repeated > 0 {
            println!("\n  {} message(s) appeared multiple times", repeated);
        }
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

/// Engine severity for a validation message
pub(crate) fn severity_of(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Debug
    }
}

/// Validation severities worth asking the layer for at `level`
pub(crate) fn severity_filter(level: LogSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let mut flags = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    if level <= LogSeverity::Warn {
        flags |= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    }
    if level <= LogSeverity::Info {
        flags |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO;
    }
    if level <= LogSeverity::Debug {
        flags |= vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
    }
    flags
}

pub(crate) fn type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

fn track_message(message_id: &str) -> u32 {
    let Ok(mut tracker) = MESSAGE_TRACKER.lock() else {
        return 1;
    };
    let count = tracker
        .get_or_insert_with(FxHashMap::default)
        .entry(message_id.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

/// Vulkan debug messenger callback
///
/// # Safety
///
/// Called by the validation layer with a valid callback data pointer.
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if !ENABLED.load(Ordering::Acquire) || p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = *p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown".into()
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        "No message".into()
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    let severity = severity_of(message_severity);
    VALIDATION_STATS.record(severity);

    let occurrences = track_message(&message_id_name);
    let repeat = if occurrences > 1 {
        format!(" [x{}]", occurrences)
    } else {
        String::new()
    };

    Engine::log(
        severity,
        VALIDATION_SOURCE,
        format!("[{}] {}{}: {}", type_label(message_type), message_id_name, repeat, message),
    );

    // Never abort the Vulkan call that triggered the message
    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
