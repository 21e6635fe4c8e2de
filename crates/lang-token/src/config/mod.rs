mod editor;

pub use editor::{
    DEFAULT_PORT, DEFAULT_REFERENCE, EditorConfig, EditorSettings, ServerSettings,
};
