//! Bounded full-content cache.
//!
//! Keys are `"{project}:{entity_id}"`; values are truncated note bodies.
//! No TTL — entries live until evicted by capacity or an explicit clear.
//! Least-recently-used entries go first.

use std::collections::HashMap;
use std::collections::VecDeque;

pub struct ContentCache {
    capacity: usize,
    entries: HashMap<String, String>,
    /// Access order, least recent at the front.
    order: VecDeque<String>,
}

impl ContentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Cache key for a note within an optional project scope.
    pub fn key(project: Option<&str>, entity_id: &str) -> String {
        format!("{}:{}", project.unwrap_or(""), entity_id)
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: String, value: String) {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
            if self.entries.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        } else {
            self.touch(&key);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos).expect("position is valid");
            self.order.push_back(k);
        }
    }
}
