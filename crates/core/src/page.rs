use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(number: u32, size: u32) -> Self {
        Self { number, size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number) * u64::from(self.size)
    }

    pub fn validate(&self, max_size: u32) -> Result<(), CoreError> {
        if self.size == 0 || self.size > max_size {
            return Err(CoreError::validation(
                "size",
                format!("page size must be between 1 and {max_size}"),
            ));
        }
        Ok(())
    }
}

/// Page envelope: `{content, totalElements, number, size, totalPages}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub number: u32,
    pub size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = u64::from(request.size.max(1));
        Self {
            content,
            total_elements,
            number: request.number,
            size: request.size,
            total_pages: total_elements.div_ceil(size),
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            content: self.content.into_iter().map(f).collect::<Result<Vec<_>, _>>()?,
            total_elements: self.total_elements,
            number: self.number,
            size: self.size,
            total_pages: self.total_pages,
        })
    }
}
