pub mod app;
pub mod archive;
pub mod camera;
pub mod config;
pub mod documents;
pub mod events;
pub mod geometry;
pub mod images;
pub mod interaction;
pub mod item_xml;
pub mod registry;
pub mod texture_match;

pub use app::EditorApp;
pub use item_xml::XmlSyncError;
