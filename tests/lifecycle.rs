use glam::{Vec2, Vec3};
use once_cell::sync::Lazy;

use hero_scene::{
    CursorState, HeadlessHost, HeroConfig, HeroVisualization, SetupError, SignalKind,
};

static CONFIG: Lazy<HeroConfig> = Lazy::new(|| HeroConfig {
    seed: Some(11),
    ..HeroConfig::default()
});

const FRAME_MS: f64 = 1000.0 / 60.0;

fn mount(host: &HeadlessHost) -> HeroVisualization<HeadlessHost> {
    HeroVisualization::mount(host.clone(), &CONFIG)
        .expect("setup succeeds")
        .expect("mount target present")
}

fn run_frames(host: &HeadlessHost, range: std::ops::Range<u32>) {
    for frame in range {
        host.frame(frame as f64 * FRAME_MS);
    }
}

/// Client position of a world point for an 800x600 viewport.
fn client_of(visualization: &HeroVisualization<HeadlessHost>, world: Vec3) -> Vec2 {
    let ndc = visualization.with_scene(|scene| scene.camera.view_proj().project_point3(world));
    Vec2::new((ndc.x + 1.0) * 400.0, (1.0 - ndc.y) * 300.0)
}

#[test]
fn mount_registers_four_listeners_and_a_surface() {
    let host = HeadlessHost::new(800, 600);
    let visualization = mount(&host);
    assert_eq!(visualization.listener_count(), 4);
    for kind in SignalKind::ALL {
        assert_eq!(host.bus().listeners_for(kind), 1);
    }
    assert_eq!(host.attached_surfaces(), 1);
    assert_eq!(host.live_resources(), 6);
    assert_eq!(visualization.surface_size(), Some((800, 600)));
    visualization.with_scene(|scene| {
        assert_eq!(scene.particles.len(), 800);
        assert_eq!(scene.shapes.len(), 2);
        assert_eq!(scene.lights.len(), 3);
    });
}

#[test]
fn absent_mount_target_is_a_no_op() {
    let host = HeadlessHost::without_mount(800, 600);
    let mounted = HeroVisualization::mount(host.clone(), &CONFIG).expect("setup succeeds");
    assert!(mounted.is_none());
    assert_eq!(host.bus().listener_count(), 0);
    assert_eq!(host.live_resources(), 0);
    assert_eq!(host.attached_surfaces(), 0);
}

#[test]
fn teardown_is_total() {
    let host = HeadlessHost::new(800, 600);
    let visualization = mount(&host);
    run_frames(&host, 0..30);
    visualization.unmount();

    assert_eq!(host.bus().listener_count(), 0);
    assert_eq!(host.cursor(), CursorState::Default);
    assert_eq!(host.live_resources(), 0);
    assert_eq!(host.attached_surfaces(), 0);
    assert_eq!(host.frame(10_000.0), 0);
}

#[test]
fn dropping_tears_down() {
    let host = HeadlessHost::new(800, 600);
    {
        let _visualization = mount(&host);
        run_frames(&host, 0..5);
    }
    assert_eq!(host.bus().listener_count(), 0);
    assert_eq!(host.live_resources(), 0);
}

#[test]
fn teardown_without_mount_target_skips_detach() {
    let host = HeadlessHost::new(800, 600);
    let visualization = mount(&host);
    host.remove_mount();
    visualization.unmount();
    assert_eq!(host.attached_surfaces(), 1);
    assert_eq!(host.live_resources(), 0);
    assert_eq!(host.bus().listener_count(), 0);
}

#[test]
fn resize_updates_aspect_and_surface() {
    let host = HeadlessHost::new(800, 600);
    let visualization = mount(&host);
    assert_eq!(host.resize(400, 300), 1);
    assert_eq!(visualization.surface_size(), Some((400, 300)));
    let aspect = visualization.with_scene(|scene| scene.camera.aspect);
    assert!((aspect - 4.0 / 3.0).abs() < 1e-6);

    host.resize(1000, 250);
    let aspect = visualization.with_scene(|scene| scene.camera.aspect);
    assert!((aspect - 4.0).abs() < 1e-6);
}

#[test]
fn resize_with_absent_target_is_ignored() {
    let host = HeadlessHost::new(800, 600);
    let visualization = mount(&host);
    host.remove_mount();
    host.bus().emit(hero_scene::HostSignal::Resize);
    assert_eq!(visualization.surface_size(), Some((800, 600)));
}

#[test]
fn centred_pointer_settles_camera_at_rest() {
    let host = HeadlessHost::new(800, 600);
    let visualization = mount(&host);
    host.pointer_move(Vec2::new(0.0, 0.0));
    run_frames(&host, 0..120);
    host.pointer_move(Vec2::new(400.0, 300.0));
    run_frames(&host, 120..720);

    let position = visualization.with_scene(|scene| scene.camera.position);
    assert!(position.x.abs() < 1e-4);
    assert!(position.y.abs() < 1e-4);
    assert_eq!(position.z, 5.0);
    assert_eq!(visualization.frames_rendered(), 720);
}

#[test]
fn hovering_a_shape_sets_pointer_cursor() {
    let host = HeadlessHost::new(800, 600);
    let visualization = mount(&host);
    let sphere = visualization.with_scene(|scene| scene.shapes[1].transform.position);
    host.pointer_move(client_of(&visualization, sphere));
    host.frame(0.0);
    assert_eq!(host.cursor(), CursorState::Pointer);
    assert_eq!(visualization.with_scene(|scene| scene.hovered()), Some(1));

    host.pointer_move(Vec2::new(790.0, 10.0));
    host.frame(FRAME_MS);
    assert_eq!(host.cursor(), CursorState::Default);

    host.pointer_move(client_of(&visualization, sphere));
    host.frame(2.0 * FRAME_MS);
    visualization.unmount();
    assert_eq!(host.cursor(), CursorState::Default);
}

#[test]
fn scroll_intent_is_applied_by_frames_only() {
    let host = HeadlessHost::new(800, 600);
    let visualization = mount(&host);
    host.scroll(500.0);
    let before = visualization.with_scene(|scene| scene.scroll());
    assert_eq!(before.smoothed, 0.0);
    assert_eq!(visualization.input().scroll_target(), 500.0);

    host.frame(0.0);
    let after = visualization.with_scene(|scene| scene.scroll());
    assert!((after.smoothed - 25.0).abs() < 1e-4);
}

#[test]
fn surface_failure_aborts_setup_cleanly() {
    let host = HeadlessHost::new(800, 600);
    host.fail_surface_creation();
    let result = HeroVisualization::mount(host.clone(), &CONFIG);
    assert!(matches!(result, Err(SetupError::Surface(_))));
    assert_eq!(host.bus().listener_count(), 0);
    assert_eq!(host.attached_surfaces(), 0);
}

#[test]
fn pixel_ratio_is_capped() {
    let host = HeadlessHost::with_pixel_ratio(400, 300, 3.0);
    let _visualization = mount(&host);
    assert_eq!(host.surface_pixel_ratio(), Some(2.0));

    let retina = HeadlessHost::with_pixel_ratio(400, 300, 1.5);
    let _visualization = mount(&retina);
    assert_eq!(retina.surface_pixel_ratio(), Some(1.5));
}
