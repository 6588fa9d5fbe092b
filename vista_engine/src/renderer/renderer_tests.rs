use std::f32::consts::PI;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use super::*;
use crate::error::StaleReason;
use crate::graphics_device::mock_graphics_device::{
    spirv_stub, MockGraphicsDevice, MockImageDecoder, SharedState,
};
use crate::graphics_device::{CommandList, RenderPass};
use crate::resource::{ImportedMaterial, ImportedMesh};

// ============================================================================
// Helpers
// ============================================================================

fn sources() -> ShaderSources {
    ShaderSources {
        scene_vertex: spirv_stub(),
        scene_fragment: spirv_stub(),
        composite_vertex: spirv_stub(),
        composite_fragment: spirv_stub(),
    }
}

fn renderer_with(extent: Extent2D, settings: RendererSettings) -> (Renderer, SharedState) {
    let device = Arc::new(MockGraphicsDevice::new());
    let state = device.state();
    let swapchain = device.create_swapchain(extent).unwrap();
    let renderer = Renderer::new(
        device,
        Box::new(swapchain),
        &sources(),
        settings,
        Box::new(MockImageDecoder::default()),
        None,
    )
    .unwrap();
    (renderer, state)
}

fn renderer(extent: Extent2D) -> (Renderer, SharedState) {
    renderer_with(extent, RendererSettings::default())
}

fn triangle() -> (Vec<Vertex>, Vec<u32>) {
    (
        vec![
            Vertex::new([0.0, -0.5, 0.0], [1.0, 0.0, 0.0], [0.5, 0.0]),
            Vertex::new([0.5, 0.5, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ],
        vec![0, 1, 2],
    )
}

/// First word of each recorded command
fn ops(commands: &[String]) -> Vec<&str> {
    commands.iter().map(|c| c.split(' ').next().unwrap_or("")).collect()
}

// ============================================================================
// Frame loop
// ============================================================================

#[test]
fn test_triangle_frame_800x600() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    let (vertices, indices) = triangle();
    renderer.add_mesh(&vertices, &indices, TextureId::DEFAULT).unwrap();

    let status = renderer.draw_frame().unwrap();
    assert_eq!(status, FrameStatus::Presented { image_index: 0 });

    {
        let state = state.lock().unwrap();
        assert_eq!(state.submissions, 1);
        assert_eq!(state.presents, 1);
        assert_eq!(state.in_use_violations, 0);
        assert!(!state.is_idle());
        assert_eq!(
            ops(&state.last_frame_commands),
            vec![
                "begin_render_pass",
                "bind_pipeline",
                "bind_vertex_buffer",
                "bind_index_buffer",
                "push_constants",
                "bind_set",
                "bind_set",
                "draw_indexed",
                "next_subpass",
                "bind_pipeline",
                "bind_set",
                "draw",
                "end_render_pass",
            ]
        );
        assert!(state.last_frame_commands[0].starts_with("begin_render_pass 800x600"));
        assert!(state.last_frame_commands.contains(&"push_constants 64".to_string()));
        assert!(state.last_frame_commands.contains(&"draw_indexed 3 0 0".to_string()));
        assert!(state.last_frame_commands.contains(&"draw 3 0".to_string()));
    }

    // The frame's fence signals once the device drains
    renderer.wait_idle().unwrap();
    assert!(state.lock().unwrap().is_idle());
    assert_eq!(renderer.stats().frame_count(), 1);
}

#[test]
fn test_thousand_frames_never_reuse_busy_command_list() {
    let (mut renderer, state) = renderer(Extent2D::new(640, 480));
    let (vertices, indices) = triangle();
    renderer.add_mesh(&vertices, &indices, TextureId::DEFAULT).unwrap();

    for frame in 0..1200u32 {
        let status = renderer.draw_frame().unwrap();
        assert_eq!(status, FrameStatus::Presented { image_index: frame % 3 });
    }

    let state = state.lock().unwrap();
    assert_eq!(state.in_use_violations, 0);
    assert_eq!(state.submissions, 1200);
    assert_eq!(state.presents, 1200);
    assert_eq!(renderer.stats().frame_count(), 1200);
}

#[test]
fn test_slots_advance_modulo_frames_in_flight() {
    let settings = RendererSettings { frames_in_flight: 3, ..RendererSettings::default() };
    let (mut renderer, state) = renderer_with(Extent2D::new(320, 240), settings);

    for expected in [1, 2, 0, 1] {
        renderer.draw_frame().unwrap();
        assert_eq!(renderer.current_frame(), expected);
    }
    assert_eq!(state.lock().unwrap().in_use_violations, 0);
}

#[test]
fn test_camera_uniform_written_to_acquired_image() {
    let (mut renderer, _state) = renderer(Extent2D::new(800, 600));
    renderer.camera_mut().set_view(Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0)));

    let status = renderer.draw_frame().unwrap();
    let FrameStatus::Presented { image_index } = status else { panic!("{:?}", status) };

    let expected = bytemuck::bytes_of(&renderer.camera().uniform()).to_vec();
    let buffer = &renderer.resources.as_ref().unwrap().uniform_buffers[image_index as usize];
    assert_eq!(buffer.read(0, expected.len() as u64).unwrap(), expected);
}

#[test]
fn test_each_mesh_is_drawn_with_its_texture() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    let wood = renderer.load_texture("wood.png").unwrap();
    let (vertices, indices) = triangle();
    renderer.add_mesh(&vertices, &indices, TextureId::DEFAULT).unwrap();
    renderer.add_mesh(&vertices, &indices, wood).unwrap();

    renderer.draw_frame().unwrap();

    let state = state.lock().unwrap();
    let set1: Vec<&String> = state
        .last_frame_commands
        .iter()
        .filter(|c| c.starts_with("bind_set 1"))
        .collect();
    assert_eq!(set1.len(), 2);
    assert_ne!(set1[0], set1[1]);
    assert_eq!(state.last_frame_commands.iter().filter(|c| c.starts_with("draw_indexed")).count(), 2);
}

#[test]
fn test_empty_scene_still_composites() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    renderer.draw_frame().unwrap();

    let state = state.lock().unwrap();
    assert_eq!(
        ops(&state.last_frame_commands),
        vec!["begin_render_pass", "bind_pipeline", "next_subpass", "bind_pipeline", "bind_set", "draw", "end_render_pass"]
    );
}

// ============================================================================
// Staleness and rebuild
// ============================================================================

#[test]
fn test_stale_acquire_rebuilds_without_submitting() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    renderer.draw_frame().unwrap();

    state.lock().unwrap().fail_next_acquire = Some(StaleReason::OutOfDate);
    assert_eq!(renderer.draw_frame().unwrap(), FrameStatus::Rebuilt);
    {
        let state = state.lock().unwrap();
        assert_eq!(state.submissions, 1);
        assert_eq!(state.presents, 1);
        assert_eq!(state.count("recreate_swapchain"), 1);
    }
    assert_eq!(renderer.stats().rebuild_count(), 1);

    assert!(matches!(renderer.draw_frame().unwrap(), FrameStatus::Presented { .. }));
    assert_eq!(state.lock().unwrap().in_use_violations, 0);
}

#[test]
fn test_suboptimal_acquire_still_draws() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    state.lock().unwrap().fail_next_acquire = Some(StaleReason::Suboptimal);

    assert_eq!(renderer.draw_frame().unwrap(), FrameStatus::Presented { image_index: 0 });
    assert_eq!(state.lock().unwrap().count("recreate_swapchain"), 0);
}

#[test]
fn test_stale_present_rebuilds() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));

    for reason in [StaleReason::Suboptimal, StaleReason::OutOfDate] {
        state.lock().unwrap().fail_next_present = Some(reason);
        assert_eq!(renderer.draw_frame().unwrap(), FrameStatus::Rebuilt);
    }

    {
        let state = state.lock().unwrap();
        assert_eq!(state.submissions, 2);
        assert_eq!(state.presents, 0);
        assert_eq!(state.count("recreate_swapchain"), 2);
    }

    for _ in 0..10 {
        assert!(matches!(renderer.draw_frame().unwrap(), FrameStatus::Presented { .. }));
    }
    assert_eq!(state.lock().unwrap().in_use_violations, 0);
}

#[test]
fn test_rebuild_ordering() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    let (vertices, indices) = triangle();
    renderer.add_mesh(&vertices, &indices, TextureId::DEFAULT).unwrap();
    renderer.draw_frame().unwrap();
    let pools_before = state.lock().unwrap().live("descriptor_pool");

    state.lock().unwrap().events.clear();
    renderer.rebuild(Extent2D::new(1024, 768)).unwrap();

    let state = state.lock().unwrap();
    let wait_idle = state.first("wait_idle").unwrap();
    let destroy_framebuffer = state.first("destroy:framebuffer").unwrap();
    let destroy_render_pass = state.first("destroy:render_pass").unwrap();
    let recreate = state.first("recreate_swapchain").unwrap();
    let create_render_pass = state.first("create:render_pass").unwrap();
    let create_framebuffer = state.first("create:framebuffer").unwrap();

    assert!(wait_idle < destroy_framebuffer);
    assert!(destroy_framebuffer < destroy_render_pass);
    assert!(destroy_render_pass < recreate);
    assert!(recreate < create_render_pass);
    assert!(create_render_pass < create_framebuffer);

    // Per-object resources are untouched
    assert_eq!(state.count("destroy:buffer:Vertex"), 0);
    assert_eq!(state.count("destroy:buffer:Index"), 0);
    assert_eq!(state.count("destroy:texture"), 0);
    assert_eq!(state.live("descriptor_pool"), pools_before);
}

#[test]
fn test_rebuild_twice_at_same_extent_is_stable() {
    let (mut renderer, _state) = renderer(Extent2D::new(800, 600));
    let image_count = renderer.image_count();
    let format = renderer.format();

    for _ in 0..2 {
        renderer.rebuild(Extent2D::new(800, 600)).unwrap();
        assert_eq!(renderer.image_count(), image_count);
        assert_eq!(renderer.format(), format);
        assert_eq!(renderer.extent(), Extent2D::new(800, 600));
    }
}

#[test]
fn test_resize_round_trip_matches_fresh_creation() {
    let a = Extent2D::new(800, 600);
    let b = Extent2D::new(1920, 1080);

    let (mut resized, _state) = renderer(a);
    resized.request_resize(b);
    resized.draw_frame().unwrap();
    assert_eq!(resized.extent(), b);
    assert_eq!(resized.pipeline_viewport(), Some(b));

    resized.request_resize(a);
    resized.draw_frame().unwrap();

    let (fresh, _fresh_state) = renderer(a);
    assert_eq!(resized.extent(), fresh.extent());
    assert_eq!(resized.framebuffer_count(), fresh.framebuffer_count());
    assert_eq!(resized.pipeline_viewport(), fresh.pipeline_viewport());
    assert_eq!(resized.image_count(), fresh.image_count());
    assert_eq!(resized.format(), fresh.format());
    assert_eq!(resized.camera().projection_matrix(), fresh.camera().projection_matrix());
}

#[test]
fn test_resize_applies_at_next_frame() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    renderer.request_resize(Extent2D::new(1024, 512));
    assert_eq!(renderer.extent(), Extent2D::new(800, 600));
    assert_eq!(state.lock().unwrap().count("recreate_swapchain"), 0);

    assert!(matches!(renderer.draw_frame().unwrap(), FrameStatus::Presented { .. }));
    assert_eq!(renderer.extent(), Extent2D::new(1024, 512));

    let expected = Camera::looking_at_origin(2.0);
    assert_eq!(renderer.camera().projection_matrix(), expected.projection_matrix());
}

#[test]
fn test_minimized_window_skips_frames() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    renderer.request_resize(Extent2D::new(0, 0));

    assert_eq!(renderer.draw_frame().unwrap(), FrameStatus::Skipped);
    assert_eq!(renderer.draw_frame().unwrap(), FrameStatus::Skipped);
    assert_eq!(state.lock().unwrap().submissions, 0);

    renderer.request_resize(Extent2D::new(800, 600));
    assert!(matches!(renderer.draw_frame().unwrap(), FrameStatus::Presented { .. }));
}

// ============================================================================
// Textures and models
// ============================================================================

#[test]
fn test_texture_capacity() {
    let settings = RendererSettings { max_objects: 4, ..RendererSettings::default() };
    let (mut renderer, _state) = renderer_with(Extent2D::new(800, 600), settings);

    // The default texture does not use up any of the four
    let ids: Vec<TextureId> = ["a.png", "b.png", "c.png", "d.png"]
        .iter()
        .map(|p| renderer.load_texture(p).unwrap())
        .collect();
    assert_eq!(ids, vec![TextureId(1), TextureId(2), TextureId(3), TextureId(4)]);

    let err = renderer.load_texture("e.png").unwrap_err();
    assert!(matches!(err, Error::PoolExhausted { capacity: 4 }));

    for id in ids {
        assert!(renderer.textures().binding_group(id).is_ok());
    }
    assert_eq!(renderer.load_texture("b.png").unwrap(), TextureId(2));
}

#[test]
fn test_unresolved_texture_slot_is_rejected() {
    let (mut renderer, _state) = renderer(Extent2D::new(800, 600));
    let (vertices, indices) = triangle();

    let err = renderer.add_mesh(&vertices, &indices, TextureId(7)).unwrap_err();
    assert!(matches!(err, Error::InvalidResource(_)));
    assert_eq!(renderer.model_count(), 0);
}

#[test]
fn test_create_mesh_model_maps_materials_to_textures() {
    let device = Arc::new(MockGraphicsDevice::new());
    let swapchain = device.create_swapchain(Extent2D::new(800, 600)).unwrap();
    let decoder = MockImageDecoder::default();
    let decodes = Arc::clone(&decoder.decodes);
    let mut renderer = Renderer::new(
        device,
        Box::new(swapchain),
        &sources(),
        RendererSettings::default(),
        Box::new(decoder),
        None,
    )
    .unwrap();

    let (vertices, indices) = triangle();
    let positions: Vec<[f32; 3]> = vertices.iter().map(|v| v.pos).collect();
    let mesh = |material| ImportedMesh {
        positions: positions.clone(),
        tex_coords: None,
        indices: indices.clone(),
        material,
    };
    let imported = ImportedModel {
        meshes: vec![mesh(Some(0)), mesh(Some(1)), mesh(None), mesh(Some(9))],
        materials: vec![
            ImportedMaterial { diffuse_texture: Some("C:\\art\\textures\\wood.png".to_string()) },
            ImportedMaterial { diffuse_texture: None },
        ],
    };

    let dir = PathBuf::from("assets/textures");
    let key = renderer.create_mesh_model(&imported, &dir).unwrap();
    let model = renderer.mesh_model(key).unwrap();

    let slots: Vec<TextureId> = model.meshes().iter().map(|m| m.texture_id()).collect();
    assert_eq!(slots, vec![TextureId(1), TextureId::DEFAULT, TextureId::DEFAULT, TextureId::DEFAULT]);
    assert_eq!(renderer.textures().path(TextureId(1)), Some(dir.join("wood.png").as_path()));

    // A second model sharing the texture does not decode it again
    renderer.create_mesh_model(&imported, &dir).unwrap();
    assert_eq!(decodes.load(Ordering::Relaxed), 1);
    assert_eq!(renderer.model_count(), 2);
}

#[test]
fn test_missing_model_texture_fails() {
    let (mut renderer, _state) = renderer(Extent2D::new(800, 600));
    let imported = ImportedModel {
        meshes: Vec::new(),
        materials: vec![ImportedMaterial { diffuse_texture: Some("missing.png".to_string()) }],
    };
    let err = renderer.create_mesh_model(&imported, Path::new("")).unwrap_err();
    assert!(matches!(err, Error::AssetImport(_)));
}

#[test]
fn test_unload_model_waits_for_idle_device() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    let (vertices, indices) = triangle();
    let key = renderer.add_mesh(&vertices, &indices, TextureId::DEFAULT).unwrap();
    renderer.draw_frame().unwrap();

    state.lock().unwrap().events.clear();
    renderer.unload_model(key).unwrap();

    {
        let state = state.lock().unwrap();
        assert!(state.first("wait_idle").unwrap() < state.first("destroy:buffer:Vertex").unwrap());
        assert_eq!(state.live("buffer:Vertex"), 0);
    }
    assert!(renderer.mesh_model(key).is_err());
    assert!(renderer.unload_model(key).is_err());

    // The next frame draws nothing but still presents
    assert!(matches!(renderer.draw_frame().unwrap(), FrameStatus::Presented { .. }));
}

#[test]
fn test_model_spin() {
    let (mut renderer, _state) = renderer(Extent2D::new(800, 600));
    let (vertices, indices) = triangle();
    let key = renderer.add_mesh(&vertices, &indices, TextureId::DEFAULT).unwrap();

    let base = Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0));
    renderer.set_model_transform(key, base).unwrap();
    renderer.set_model_spin(key, Vec3::Y, PI).unwrap();
    renderer.update(Duration::from_millis(500));

    let expected = base * Mat4::from_rotation_y(PI / 2.0);
    let actual = renderer.mesh_model(key).unwrap().transform();
    assert!(actual.abs_diff_eq(expected, 1e-5), "{:?} != {:?}", actual, expected);

    assert!(renderer.set_model_spin(key, Vec3::ZERO, 1.0).is_err());
}

// ============================================================================
// Overlay
// ============================================================================

struct QuadOverlay;

impl Overlay for QuadOverlay {
    fn record(&mut self, cmd: &mut dyn CommandList, render_pass: &dyn RenderPass) -> Result<()> {
        assert_eq!(render_pass.subpass_count(), 2);
        cmd.draw(6, 0)
    }
}

#[test]
fn test_overlay_records_before_composite() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    renderer.set_overlay(Box::new(QuadOverlay));
    renderer.draw_frame().unwrap();

    let state = state.lock().unwrap();
    let commands = &state.last_frame_commands;
    let overlay_draw = commands.iter().position(|c| c == "draw 6 0").unwrap();
    let next_subpass = commands.iter().position(|c| c == "next_subpass").unwrap();
    assert!(overlay_draw < next_subpass);
}

// ============================================================================
// Setup and teardown
// ============================================================================

#[test]
fn test_setup_order() {
    let (_renderer, state) = renderer(Extent2D::new(800, 600));
    let state = state.lock().unwrap();

    let frame_sync = state.first("create:frame_sync").unwrap();
    let texture = state.first("create:texture").unwrap();
    let render_pass = state.first("create:render_pass").unwrap();
    assert!(frame_sync < texture);
    assert!(texture < render_pass);
    assert_eq!(state.live("frame_sync"), 2);
}

#[test]
fn test_invalid_settings_are_rejected() {
    let device = Arc::new(MockGraphicsDevice::new());
    let swapchain = device.create_swapchain(Extent2D::new(800, 600)).unwrap();
    let settings = RendererSettings { frames_in_flight: 0, ..RendererSettings::default() };

    let result = Renderer::new(
        device,
        Box::new(swapchain),
        &sources(),
        settings,
        Box::new(MockImageDecoder::default()),
        None,
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_drop_releases_every_gpu_object() {
    let (mut renderer, state) = renderer(Extent2D::new(800, 600));
    let (vertices, indices) = triangle();
    let wood = renderer.load_texture("wood.png").unwrap();
    renderer.add_mesh(&vertices, &indices, wood).unwrap();
    for _ in 0..5 {
        renderer.draw_frame().unwrap();
    }
    renderer.rebuild(Extent2D::new(640, 480)).unwrap();
    renderer.draw_frame().unwrap();

    state.lock().unwrap().events.clear();
    drop(renderer);

    let state = state.lock().unwrap();
    assert_eq!(state.events.first().map(String::as_str), Some("wait_idle"));
    for (kind, live) in &state.live {
        assert_eq!(*live, 0, "{} leaked", kind);
    }
}
