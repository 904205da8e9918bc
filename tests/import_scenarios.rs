use std::io::Cursor;
use std::time::Duration;

use image::{ImageFormat, Rgba, RgbaImage};
use spritesync::archive::ArchiveEntry;
use spritesync::config::AppConfig;
use spritesync::events::EditorEvent;
use spritesync::geometry::{Origin, Rect};
use spritesync::item_xml::import::BindingStatus;
use spritesync::item_xml::patch_sprite_geometry;
use spritesync::item_xml::PatchRequest;
use spritesync::EditorApp;

const WRENCH_XML: &str = r#"<Items><Item identifier="wrench"><Sprite texture="wrench.png" sourcerect="0,0,32,32" origin="0.5,0.5"/></Item></Items>"#;

const FILELIST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<contentpackage name="Wrench Pack" modversion="0.3" corepackage="false" />"#;

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 0, 255]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

fn import(app: &mut EditorApp, entries: Vec<ArchiveEntry>) {
    app.import_archive(entries);
    assert!(app.wait_for_images(Duration::from_secs(10)), "decodes finished in time");
}

#[test]
fn wrench_document_binds_one_sprite() {
    let mut app = EditorApp::new(AppConfig::default());
    import(
        &mut app,
        vec![
            ArchiveEntry::text("WrenchPack/filelist.xml", FILELIST),
            ArchiveEntry::text("WrenchPack/items.xml", WRENCH_XML),
            ArchiveEntry::binary("WrenchPack/wrench.png", png(64, 64)),
        ],
    );

    assert_eq!(app.registry().len(), 1);
    let sprite = app.registry().iter().next().expect("wrench sprite");
    assert_eq!(sprite.name, "wrench");
    assert_eq!(sprite.identifier.as_deref(), Some("wrench"));
    assert_eq!(sprite.state, "Normal");
    assert_eq!(sprite.source_rect, Rect::new(0, 0, 32, 32));
    assert_eq!(sprite.origin, Origin::new(0.5, 0.5));
    assert_eq!(sprite.image_ref.as_ref().map(|key| key.as_str()), Some("WrenchPack/wrench.png"));
    assert_eq!(sprite.xml_file(), Some("WrenchPack/items.xml"));

    let report = app.import_report().expect("import report");
    assert_eq!(report.sprite_count, 1);
    assert_eq!(report.bound(), 1);
    assert_eq!(report.mod_info.as_ref().map(|info| info.id.as_str()), Some("wrench_pack"));
    assert_eq!(app.export_mod_id(), "wrench_pack");

    let events = app.drain_events();
    assert!(events.iter().any(|event| matches!(event, EditorEvent::ImageBound { .. })));
}

#[test]
fn import_then_unchanged_patch_roundtrips_document() {
    let mut app = EditorApp::new_inline(AppConfig::default());
    import(
        &mut app,
        vec![
            ArchiveEntry::text("items.xml", WRENCH_XML),
            ArchiveEntry::binary("wrench.png", png(64, 64)),
        ],
    );
    let sprite = app.registry().iter().next().expect("sprite").clone();
    let request = PatchRequest {
        identifier: sprite.identifier.as_deref().expect("identifier"),
        state: &sprite.state,
        source_rect: sprite.source_rect,
        origin: sprite.origin,
    };
    let text = app.documents().get("items.xml").expect("document");
    assert_eq!(patch_sprite_geometry(text, &request).expect("patch"), WRENCH_XML);
    assert!(!app.commit_geometry(sprite.id, sprite.source_rect, sprite.origin).expect("commit"));
    assert!(app.registry().modified_files().is_empty());
}

#[test]
fn broken_images_leave_sprites_unbound() {
    let mut app = EditorApp::new(AppConfig::default());
    import(
        &mut app,
        vec![
            ArchiveEntry::text("items.xml", WRENCH_XML),
            ArchiveEntry::binary("wrench.xcf", b"gimp xcf file".to_vec()),
        ],
    );
    let sprite = app.registry().iter().next().expect("sprite");
    assert!(sprite.image_ref.is_none());
    let report = app.import_report().expect("report");
    assert!(matches!(report.bindings[0].status, BindingStatus::DecodeFailed(_)));
    assert_eq!(report.bound(), 0);
}

#[test]
fn multi_state_items_share_components() {
    let xml = r#"<Items>
  <Item identifier="lamp" name="Lamp">
    <Sprite texture="lamp.png" sourcerect="0,0,16,16" state="On"/>
    <Sprite texture="lamp.png" sourcerect="16,0,16,16" state="Off"/>
    <Holdable slots="Any"/>
    <ItemContainer capacity="1"/>
  </Item>
</Items>"#;
    let mut app = EditorApp::new_inline(AppConfig::default());
    import(&mut app, vec![ArchiveEntry::text("items.xml", xml), ArchiveEntry::binary("lamp.png", png(32, 16))]);
    let names: Vec<_> = app.registry().iter().map(|sprite| sprite.name.clone()).collect();
    assert_eq!(names, vec!["Lamp_On".to_string(), "Lamp_Off".to_string()]);
    for sprite in app.registry().iter() {
        let kinds: Vec<_> =
            app.registry().list_components(sprite.id).iter().map(|component| component.kind.clone()).collect();
        assert_eq!(kinds, vec!["Holdable".to_string(), "ItemContainer".to_string()]);
    }
    assert_eq!(app.registry().components_of_type("Holdable").len(), 2);
}

#[test]
fn reimport_resets_previous_project() {
    let mut app = EditorApp::new_inline(AppConfig::default());
    import(&mut app, vec![ArchiveEntry::text("items.xml", WRENCH_XML)]);
    assert_eq!(app.registry().len(), 1);
    import(&mut app, vec![ArchiveEntry::text("other.xml", "<Items/>")]);
    assert!(app.registry().is_empty());
    assert!(app.documents().get("items.xml").is_none());
}
