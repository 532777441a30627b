use std::collections::BTreeMap;

use crate::bake::BakedImage;
use crate::foundation::error::{LabError, LabResult};

/// Opaque handle to an on-screen image resource (an object URL in a browser).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayHandle(pub u64);

/// Where baked images are shown. Every handle returned by
/// [`present`](Self::present) stays alive until it is released.
pub trait ImageDisplay {
    fn present(&mut self, image: &BakedImage) -> LabResult<DisplayHandle>;
    fn release(&mut self, handle: DisplayHandle);
}

/// In-memory display that keeps the bytes of every live handle.
#[derive(Debug, Default)]
pub struct BlobRegistry {
    next_id: u64,
    live: BTreeMap<DisplayHandle, BakedImage>,
    created: u64,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: DisplayHandle) -> Option<&BakedImage> {
        self.live.get(&handle)
    }

    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    /// Total handles ever created.
    pub fn created(&self) -> u64 {
        self.created
    }
}

impl ImageDisplay for BlobRegistry {
    fn present(&mut self, image: &BakedImage) -> LabResult<DisplayHandle> {
        if image.bytes.is_empty() {
            return Err(LabError::validation("cannot present an empty image"));
        }
        self.next_id += 1;
        let handle = DisplayHandle(self.next_id);
        self.live.insert(handle, image.clone());
        self.created += 1;
        Ok(handle)
    }

    fn release(&mut self, handle: DisplayHandle) {
        self.live.remove(&handle);
    }
}
