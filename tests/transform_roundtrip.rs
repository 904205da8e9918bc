use glam::Vec2;
use spritesync::camera::CanvasCamera;
use spritesync::config::{EditorConfig, ViewportConfig};
use spritesync::geometry::{ImageSize, Rect};

const IMAGES: [(u32, u32); 5] = [(16, 16), (64, 32), (800, 600), (1024, 768), (4096, 1024)];
const ZOOMS: [f32; 6] = [0.25, 0.5, 1.0, 1.35, 2.0, 4.0];
const PANS: [Vec2; 3] = [Vec2::ZERO, Vec2::new(-120.5, 33.25), Vec2::new(512.0, -64.0)];

fn rects_for(image: ImageSize) -> Vec<Rect> {
    let w = image.width as i32;
    let h = image.height as i32;
    vec![
        Rect::new(0, 0, w, h),
        Rect::new(0, 0, 10, 10),
        Rect::new(w / 3, h / 5, (w / 2).max(1), (h / 3).max(1)),
        Rect::new(w - 11, h - 13, 11, 13),
        Rect::new(1, 2, 3, 4),
    ]
}

#[test]
fn integer_source_rects_survive_view_roundtrip() {
    for (width, height) in IMAGES {
        let image = ImageSize::new(width, height);
        let mut camera = CanvasCamera::new(&EditorConfig::default());
        camera.fit_stage(image, &ViewportConfig::default()).expect("stage fit");
        for zoom in ZOOMS {
            camera.set_zoom(zoom);
            for pan in PANS {
                camera.fit_to_screen();
                camera.set_zoom(zoom);
                camera.pan_by(pan);
                for rect in rects_for(image) {
                    let view = camera.rect_to_view(rect).expect("rect to view");
                    let source = camera.rect_to_source(view).expect("rect to source");
                    assert_eq!(
                        CanvasCamera::commit_rect(source),
                        rect,
                        "image {width}x{height} zoom {zoom} pan {pan:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn refitting_the_stage_never_moves_source_geometry() {
    let image = ImageSize::new(300, 200);
    let rect = Rect::new(12, 40, 64, 32);
    let mut camera = CanvasCamera::new(&EditorConfig::default());
    camera.fit_stage(image, &ViewportConfig::default()).expect("stage fit");
    let before = camera.rect_to_view(rect).expect("view rect");

    let wide = ViewportConfig { width: 1920, height: 1080, ..ViewportConfig::default() };
    camera.fit_stage(image, &wide).expect("refit");
    let after = camera.rect_to_view(rect).expect("view rect");
    assert_eq!(CanvasCamera::commit_rect(camera.rect_to_source(after).expect("source")), rect);
    assert!(after.size.x >= before.size.x);
}

#[test]
fn zoom_stays_within_limits_after_arbitrary_input() {
    let mut camera = CanvasCamera::new(&EditorConfig::default());
    for delta in [-3.0_f32, 7.0, -0.5, 120.0, -1.0e6, f32::NAN] {
        camera.apply_wheel(delta);
        camera.set_zoom(camera.zoom() * delta);
        let percent = camera.zoom_percent();
        assert!((25..=400).contains(&percent), "zoom {percent}% escaped its range");
    }
}
