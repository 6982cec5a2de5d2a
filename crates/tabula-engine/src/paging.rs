use serde::{Deserialize, Serialize};

use crate::schema::FieldDefinition;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 200;

/// 1-based page request. Missing or zero values fall back to the first
/// page and the default size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u32 {
        match self.page_size {
            None | Some(0) => DEFAULT_PAGE_SIZE,
            Some(n) => n.min(MAX_PAGE_SIZE),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page() as u64 - 1) * self.page_size() as u64
    }

    pub fn take(&self) -> u64 {
        self.page_size() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse<T> {
    pub page: u32,
    pub page_size: u32,
    pub pages: u64,
    pub total_count: u64,
    pub record_start: u64,
    pub record_end: u64,
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDefinition>>,
}

impl<T> PagedResponse<T> {
    pub fn new(request: &PageRequest, total_count: u64, data: Vec<T>) -> Self {
        let page_size = request.page_size();
        let record_start = request.skip() + 1;
        let record_end = total_count.min(record_start + page_size as u64 - 1);

        Self {
            page: request.page(),
            page_size,
            pages: total_count.div_ceil(page_size as u64),
            total_count,
            record_start,
            record_end,
            data,
            fields: None,
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldDefinition>) -> Self {
        self.fields = Some(fields);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_partial_page() {
        let req = PageRequest::new(3, 10);
        assert_eq!(req.skip(), 20);
        let resp = PagedResponse::new(&req, 25, vec![0u8; 5]);
        assert_eq!(resp.pages, 3);
        assert_eq!(resp.record_start, 21);
        assert_eq!(resp.record_end, 25);
    }

    #[test]
    fn defaults_and_clamping() {
        let req = PageRequest::default();
        assert_eq!((req.page(), req.page_size()), (1, DEFAULT_PAGE_SIZE));
        let req = PageRequest::new(0, 0);
        assert_eq!((req.page(), req.page_size(), req.skip()), (1, 10, 0));
        assert_eq!(PageRequest::new(1, 5000).page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn empty_result() {
        // recordEnd < recordStart signals an empty page
        let resp = PagedResponse::<u8>::new(&PageRequest::default(), 0, vec![]);
        assert_eq!(resp.pages, 0);
        assert_eq!((resp.record_start, resp.record_end), (1, 0));
    }

    #[test]
    fn serializes_camel_case_without_fields() {
        let resp = PagedResponse::new(&PageRequest::new(1, 2), 3, vec![1, 2]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["pageSize"], 2);
        assert_eq!(json["totalCount"], 3);
        assert_eq!(json["pages"], 2);
        assert!(json.get("fields").is_none());
    }
}
