use std::collections::BTreeMap;
use std::sync::Arc;

/// Canonical text of every item document in the project, keyed by archive filename.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: BTreeMap<String, Arc<str>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, content: Arc<str>) -> Option<Arc<str>> {
        self.documents.insert(filename.into(), content)
    }

    pub fn get(&self, filename: &str) -> Option<&Arc<str>> {
        self.documents.get(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.documents.contains_key(filename)
    }

    /// Replaces the text of an existing document. Unknown files are left alone.
    pub fn replace(&mut self, filename: &str, content: Arc<str>) -> bool {
        match self.documents.get_mut(filename) {
            Some(slot) => {
                *slot = content;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<str>)> {
        self.documents.iter().map(|(name, text)| (name.as_str(), text))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_only_touches_known_documents() {
        let mut store = DocumentStore::new();
        store.insert("items.xml", Arc::from("<Items/>"));
        assert!(store.replace("items.xml", Arc::from("<Items><Item/></Items>")));
        assert!(!store.replace("other.xml", Arc::from("<Items/>")));
        assert_eq!(store.get("items.xml").map(|text| &**text), Some("<Items><Item/></Items>"));
        assert_eq!(store.len(), 1);
    }
}
