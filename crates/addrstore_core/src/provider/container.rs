//! In-memory slot for one record.

/// Current value of one record plus its reconciliation state.
///
/// `cached == false` means `data` is default-initialized and has not been
/// read from the backing store yet, or a write failed and the value is no
/// longer known to match the medium.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordContainer<R> {
    cached: bool,
    data: Option<R>,
}

impl<R> RecordContainer<R> {
    pub fn uncached(data: R) -> Self {
        Self {
            cached: false,
            data: Some(data),
        }
    }

    pub fn cached(data: R) -> Self {
        Self {
            cached: true,
            data: Some(data),
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn set_cached(&mut self, cached: bool) {
        self.cached = cached;
    }

    pub fn data(&self) -> Option<&R> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut R> {
        self.data.as_mut()
    }

    /// Swaps in `data`, returning the previous value.
    pub fn replace(&mut self, data: R) -> Option<R> {
        self.data.replace(data)
    }
}
