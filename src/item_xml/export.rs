use std::fmt::Write as _;

use quick_xml::escape::escape;

use crate::registry::{Component, Sprite};

const SCHEMA_LOCATION: &str = "../../../../schemas/Items.xsd";

/// Flat regeneration of an items document: one `Item` per sprite, with its components.
///
/// Sprites are identified by their display name and all share the `{mod_id}.png` texture.
pub fn generate_items_xml<'a>(
    mod_id: &str,
    sprites: impl IntoIterator<Item = &'a Sprite>,
    components: &[Component],
) -> String {
    let mod_id = escape(mod_id);
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    // Writing into a String cannot fail.
    let _ = writeln!(
        xml,
        "<Items xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:noNamespaceSchemaLocation=\"{SCHEMA_LOCATION}\">"
    );
    for sprite in sprites {
        let _ = writeln!(
            xml,
            "  <Item identifier=\"{}\" category=\"Equipment\" Tags=\"{mod_id}\" cargocontaineridentifier=\"{mod_id}\">",
            escape(sprite.name.as_str())
        );
        let _ = writeln!(
            xml,
            "    <Sprite texture=\"{mod_id}.png\" sourcerect=\"{}\" origin=\"{}\" />",
            sprite.source_rect.to_attribute(),
            sprite.origin.to_attribute()
        );
        for component in components.iter().filter(|component| component.sprite_id == sprite.id) {
            let _ = writeln!(xml, "    <{}", component.kind);
            for (key, value) in component.properties.iter() {
                let _ = writeln!(xml, "      {key}=\"{}\"", escape(value));
            }
            xml.push_str("    />\n");
        }
        xml.push_str("  </Item>\n");
    }
    xml.push_str("</Items>");
    xml
}
