use serde::{Deserialize, Serialize};

/// One page of a `wanted/missing` style listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub page: u32,

    #[serde(default)]
    pub page_size: u32,

    #[serde(default)]
    pub total_records: u32,

    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

impl<T> Page<T> {
    /// True once `page` (1-based) covers every record the server reported.
    #[must_use]
    pub fn is_last(&self, page: u32, page_size: u32) -> bool {
        u64::from(page) * u64::from(page_size) >= u64::from(self.total_records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_detection() {
        let page: Page<()> = Page {
            page: 2,
            page_size: 100,
            total_records: 200,
            records: vec![],
        };
        assert!(page.is_last(2, 100));
        assert!(!page.is_last(1, 100));
    }

    #[test]
    fn deserializes_sonarr_envelope() {
        let json = r#"{"page":1,"pageSize":10,"sortKey":"airDateUtc","totalRecords":3,"records":[1,2,3]}"#;
        let page: Page<u8> = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_records, 3);
        assert_eq!(page.records, vec![1, 2, 3]);
    }
}
