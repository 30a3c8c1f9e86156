use std::collections::HashMap;

use super::TextureHandle;

/// Interning table between texture names and [`TextureHandle`]s.
///
/// ```ignore
/// let mut textures = TextureRegistry::new();
/// let model = load_model(file, |name| textures.handle(name))?;
/// save_model(&model, out, ModelFormat::Ascii, |h| textures.name(h).map(str::to_owned))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TextureRegistry {
    names: Vec<String>,
    handles: HashMap<String, TextureHandle>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `name`, allocating a new one the first time it is seen.
    pub fn handle(&mut self, name: &str) -> TextureHandle {
        if let Some(&handle) = self.handles.get(name) {
            return handle;
        }
        let handle = TextureHandle(self.names.len() as u32);
        self.names.push(name.to_owned());
        self.handles.insert(name.to_owned(), handle);
        handle
    }

    /// Name a handle was created for.
    pub fn name(&self, handle: TextureHandle) -> Option<&str> {
        self.names.get(handle.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
