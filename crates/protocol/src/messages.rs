use serde::{Deserialize, Serialize};

use crate::envelope::ApiStatus;

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One entry of a recursive `listall` page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub fs_id: u64,
    pub path: String,
    pub server_filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub isdir: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5: String,
    #[serde(default)]
    pub category: i32,
    #[serde(default)]
    pub server_mtime: i64,
    #[serde(default)]
    pub server_ctime: i64,
    #[serde(default)]
    pub local_mtime: i64,
    #[serde(default)]
    pub local_ctime: i64,
}

impl ListEntry {
    pub fn is_dir(&self) -> bool {
        self.isdir != 0
    }
}

/// Response of `multimedia?method=listall`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListAllResponse {
    pub errno: i32,
    #[serde(default)]
    pub errmsg: String,
    #[serde(default)]
    pub cursor: u64,
    #[serde(default)]
    pub has_more: i32,
    #[serde(default)]
    pub list: Vec<ListEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<serde_json::Value>,
}

impl ListAllResponse {
    pub fn has_more(&self) -> bool {
        self.has_more != 0
    }
}

impl ApiStatus for ListAllResponse {
    fn errno(&self) -> i32 {
        self.errno
    }
    fn errmsg(&self) -> &str {
        &self.errmsg
    }
}

// ---------------------------------------------------------------------------
// Chunked upload
// ---------------------------------------------------------------------------

/// Response of `file?method=precreate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecreateResponse {
    pub errno: i32,
    #[serde(default)]
    pub errmsg: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub uploadid: String,
    #[serde(default)]
    pub return_type: i32,
    #[serde(default)]
    pub block_list: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<serde_json::Value>,
}

impl ApiStatus for PrecreateResponse {
    fn errno(&self) -> i32 {
        self.errno
    }
    fn errmsg(&self) -> &str {
        &self.errmsg
    }
}

/// Response of `pcs/superfile2?method=upload` for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceUploadResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5: String,
    #[serde(default)]
    pub error_code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<serde_json::Value>,
}

impl ApiStatus for SliceUploadResponse {
    fn errno(&self) -> i32 {
        self.error_code
    }
    fn errmsg(&self) -> &str {
        &self.error_msg
    }
}

/// Response of `file?method=create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub errno: i32,
    #[serde(default)]
    pub errmsg: String,
    #[serde(default)]
    pub fs_id: u64,
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub server_filename: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub isdir: i32,
    #[serde(default)]
    pub category: i32,
    #[serde(default)]
    pub ctime: i64,
    #[serde(default)]
    pub mtime: i64,
}

impl ApiStatus for CreateResponse {
    fn errno(&self) -> i32 {
        self.errno
    }
    fn errmsg(&self) -> &str {
        &self.errmsg
    }
}

// ---------------------------------------------------------------------------
// Single-shot upload
// ---------------------------------------------------------------------------

/// Response of `pcs/file?method=upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmallUploadResponse {
    #[serde(default)]
    pub fs_id: u64,
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub ctime: i64,
    #[serde(default)]
    pub mtime: i64,
    #[serde(default)]
    pub error_code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<serde_json::Value>,
}

impl ApiStatus for SmallUploadResponse {
    fn errno(&self) -> i32 {
        self.error_code
    }
    fn errmsg(&self) -> &str {
        &self.error_msg
    }
}

// ---------------------------------------------------------------------------
// Metadata / download links
// ---------------------------------------------------------------------------

/// Metadata of one file, including its short-lived download link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub fs_id: u64,
    pub filename: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub isdir: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dlink: String,
    #[serde(default)]
    pub category: i32,
}

/// Response of `multimedia?method=filemetas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetasResponse {
    pub errno: i32,
    #[serde(default)]
    pub errmsg: String,
    #[serde(default)]
    pub list: Vec<FileMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<serde_json::Value>,
}

impl ApiStatus for FileMetasResponse {
    fn errno(&self) -> i32 {
        self.errno
    }
    fn errmsg(&self) -> &str {
        &self.errmsg
    }
}

/// Serializes a chunk manifest the way precreate/create expect it: a JSON
/// array of hex digests.
pub fn encode_block_list(blocks: &[String]) -> Result<String, serde_json::Error> {
    serde_json::to_string(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listall_page_parses() {
        let json = r#"{
            "cursor": 1000,
            "errmsg": "succ",
            "errno": 0,
            "has_more": 1,
            "list": [
                {"category": 6, "fs_id": 42, "isdir": 0, "md5": "abc",
                 "path": "/apps/backup/b.txt", "server_filename": "b.txt", "size": 5},
                {"fs_id": 7, "isdir": 1, "path": "/apps/backup/dir", "server_filename": "dir"}
            ],
            "request_id": "8843217"
        }"#;
        let resp: ListAllResponse = serde_json::from_str(json).unwrap();
        assert!(resp.has_more());
        assert_eq!(resp.cursor, 1000);
        assert_eq!(resp.list.len(), 2);
        assert_eq!(resp.list[0].fs_id, 42);
        assert!(!resp.list[0].is_dir());
        assert!(resp.list[1].is_dir());
        assert!(resp.check().is_ok());
    }

    #[test]
    fn listall_missing_path_has_no_list() {
        let json = r#"{"errno": 31066, "errmsg": "file does not exist", "request_id": 1}"#;
        let resp: ListAllResponse = serde_json::from_str(json).unwrap();
        assert!(resp.list.is_empty());
        assert!(!resp.has_more());
        assert_eq!(resp.check().unwrap_err().errno, 31066);
    }

    #[test]
    fn precreate_parses_upload_id() {
        let json = r#"{"path":"/apps/backup/big.bin","uploadid":"N1-abc","return_type":1,"block_list":[0,1,2],"errno":0,"request_id":1}"#;
        let resp: PrecreateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.uploadid, "N1-abc");
        assert_eq!(resp.block_list, vec![0, 1, 2]);
    }

    #[test]
    fn slice_error_code_maps_to_status() {
        let json = r#"{"error_code":31299,"error_msg":"upload id invalid","request_id":9}"#;
        let resp: SliceUploadResponse = serde_json::from_str(json).unwrap();
        let err = resp.check().unwrap_err();
        assert_eq!(err.errno, 31299);
        assert_eq!(err.message, "upload id invalid");
    }

    #[test]
    fn small_upload_success_has_zero_error_code() {
        let json = r#"{"ctime":1,"fs_id":99,"md5":"remote-md5","mtime":1,"path":"/apps/backup/a.txt","request_id":1,"size":5}"#;
        let resp: SmallUploadResponse = serde_json::from_str(json).unwrap();
        assert!(resp.check().is_ok());
        assert_eq!(resp.md5, "remote-md5");
    }

    #[test]
    fn block_list_is_json_array() {
        let blocks = vec!["aa".to_string(), "bb".to_string()];
        assert_eq!(encode_block_list(&blocks).unwrap(), r#"["aa","bb"]"#);
    }
}
