// Minimal string interner handing out stable `StringId`s for event names.
use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::ids::StringId;

#[derive(Clone, Debug, Default)]
pub struct StringPool {
    ids: HashMap<String, StringId>,
    strings: Vec<String>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, value: &str) -> Result<StringId, Error> {
        if let Some(id) = self.ids.get(value) {
            return Ok(*id);
        }
        let id = StringId::from_index(self.strings.len())?;
        self.strings.push(value.to_string());
        self.ids.insert(value.to_string(), id);
        Ok(id)
    }

    pub fn get(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
