use super::*;

// ============================================================================
// Helpers
// ============================================================================

fn candidate(name: &str, adapter_type: AdapterType) -> AdapterCandidate {
    AdapterCandidate {
        name: name.to_string(),
        adapter_type,
        graphics_queue_family: Some(0),
        present_queue_family: Some(0),
        missing_extensions: Vec::new(),
        surface_format_count: 2,
        present_mode_count: 1,
    }
}

// ============================================================================
// Memory type search
// ============================================================================

#[test]
fn test_find_memory_type_first_match() {
    let types = [
        MemoryPropertyFlags::DEVICE_LOCAL,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT | MemoryPropertyFlags::HOST_CACHED,
    ];
    let required = MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT;

    assert_eq!(find_memory_type(&types, 0b111, required).unwrap(), 1);
}

#[test]
fn test_find_memory_type_respects_mask() {
    let types = [
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        MemoryPropertyFlags::DEVICE_LOCAL,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
    ];
    // Type 0 matches the properties but is excluded by the mask
    let index = find_memory_type(&types, 0b110, MemoryPropertyFlags::HOST_VISIBLE).unwrap();
    assert_eq!(index, 2);
}

#[test]
fn test_find_memory_type_no_match() {
    let types = [MemoryPropertyFlags::DEVICE_LOCAL, MemoryPropertyFlags::DEVICE_LOCAL];
    let err = find_memory_type(&types, 0b11, MemoryPropertyFlags::HOST_VISIBLE).unwrap_err();
    assert!(matches!(err, Error::NoSuitableMemory(_)));
}

#[test]
fn test_find_memory_type_empty_mask() {
    let types = [MemoryPropertyFlags::DEVICE_LOCAL];
    assert!(find_memory_type(&types, 0, MemoryPropertyFlags::DEVICE_LOCAL).is_err());
}

#[test]
fn test_find_memory_type_empty_requirement_matches_any_allowed() {
    let types = [MemoryPropertyFlags::DEVICE_LOCAL, MemoryPropertyFlags::HOST_VISIBLE];
    assert_eq!(find_memory_type(&types, 0b10, MemoryPropertyFlags::empty()).unwrap(), 1);
}

// ============================================================================
// Candidate rejection
// ============================================================================

#[test]
fn test_complete_candidate_is_accepted() {
    assert!(candidate("gpu", AdapterType::Integrated).rejection_reason().is_none());
}

#[test]
fn test_rejection_reasons() {
    let mut c = candidate("gpu", AdapterType::Discrete);
    c.graphics_queue_family = None;
    assert!(c.rejection_reason().unwrap().contains("graphics"));

    let mut c = candidate("gpu", AdapterType::Discrete);
    c.present_queue_family = None;
    assert!(c.rejection_reason().unwrap().contains("present"));

    let mut c = candidate("gpu", AdapterType::Discrete);
    c.missing_extensions = vec!["VK_KHR_swapchain".to_string()];
    assert!(c.rejection_reason().unwrap().contains("VK_KHR_swapchain"));

    let mut c = candidate("gpu", AdapterType::Discrete);
    c.surface_format_count = 0;
    assert!(c.rejection_reason().unwrap().contains("formats"));

    let mut c = candidate("gpu", AdapterType::Discrete);
    c.present_mode_count = 0;
    assert!(c.rejection_reason().unwrap().contains("present modes"));
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_discrete_preferred_over_earlier_integrated() {
    let candidates = [
        candidate("igpu", AdapterType::Integrated),
        candidate("dgpu", AdapterType::Discrete),
    ];
    assert_eq!(select_adapter(&candidates).unwrap().index, 1);
}

#[test]
fn test_first_suitable_when_no_discrete() {
    let candidates = [
        candidate("cpu", AdapterType::Cpu),
        candidate("igpu", AdapterType::Integrated),
    ];
    assert_eq!(select_adapter(&candidates).unwrap().index, 0);
}

#[test]
fn test_unsuitable_discrete_is_skipped() {
    let mut dgpu = candidate("dgpu", AdapterType::Discrete);
    dgpu.missing_extensions = vec!["VK_KHR_swapchain".to_string()];
    let candidates = [dgpu, candidate("igpu", AdapterType::Integrated)];

    assert_eq!(select_adapter(&candidates).unwrap().index, 1);
}

#[test]
fn test_no_candidates() {
    assert!(matches!(select_adapter(&[]), Err(Error::NoSuitableDevice(_))));
}

#[test]
fn test_all_candidates_rejected() {
    let mut a = candidate("a", AdapterType::Discrete);
    a.present_queue_family = None;
    let mut b = candidate("b", AdapterType::Integrated);
    b.surface_format_count = 0;

    assert!(matches!(select_adapter(&[a, b]), Err(Error::NoSuitableDevice(_))));
}

#[test]
fn test_separate_present_queue() {
    let mut c = candidate("gpu", AdapterType::Discrete);
    c.graphics_queue_family = Some(0);
    c.present_queue_family = Some(2);

    let selection = select_adapter(&[c]).unwrap();
    assert_eq!(selection.graphics_queue_family, 0);
    assert_eq!(selection.present_queue_family, 2);
    assert!(selection.needs_separate_present_queue());
}

#[test]
fn test_shared_queue_family() {
    let selection = select_adapter(&[candidate("gpu", AdapterType::Discrete)]).unwrap();
    assert!(!selection.needs_separate_present_queue());
}
