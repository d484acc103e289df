/// Offset-based page request (zero-based page number)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn new(page: u64, size: u64) -> Self {
        Self { page, size }
    }

    pub fn first(size: u64) -> Self {
        Self::new(0, size)
    }

    pub fn offset(&self) -> u64 {
        self.page * self.size
    }

    pub fn next(&self) -> Self {
        Self::new(self.page + 1, self.size)
    }
}

/// One page of results
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub request: PageRequest,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest) -> Self {
        Self { items, request }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// A short page means the population is exhausted.
    pub fn has_next(&self) -> bool {
        self.request.size > 0 && self.items.len() as u64 == self.request.size
    }
}
