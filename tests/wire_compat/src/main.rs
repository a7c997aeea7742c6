fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use cloudsync_protocol::{
        ApiStatus, CreateResponse, FileMetasResponse, ListAllResponse, PrecreateResponse,
        SliceUploadResponse, SmallUploadResponse, errno,
    };

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    fn parse_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
        serde_json::from_value(load_fixture(name))
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"))
    }

    /// Normalizes numbers to f64 so `65` and `65.0` compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it and compares the JSON values.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  ours: {reserialized}"
        );
    }

    // --- Listing ---

    #[test]
    fn fixture_listall_page() {
        roundtrip_test::<ListAllResponse>("listall_page.json");

        let page: ListAllResponse = parse_fixture("listall_page.json");
        assert!(page.has_more());
        assert_eq!(page.cursor, 1000);
        assert!(!page.list[0].is_dir());
        assert!(page.list[1].is_dir());
        assert!(page.list[1].md5.is_empty());
    }

    #[test]
    fn fixture_listall_partial() {
        roundtrip_test::<ListAllResponse>("listall_partial.json");
        let page: ListAllResponse = parse_fixture("listall_partial.json");
        assert_eq!(page.errno, errno::PARTIAL_LISTING);
    }

    #[test]
    fn fixture_listall_missing_dir() {
        let page: ListAllResponse = parse_fixture("listall_missing_dir.json");
        assert!(errno::is_missing_path(page.errno));
        assert!(page.list.is_empty());
        assert!(!page.has_more());
    }

    #[test]
    fn fixture_listall_tolerates_unknown_fields() {
        let page: ListAllResponse = parse_fixture("listall_vendor_raw.json");
        assert_eq!(page.errno, errno::SUCCESS);
        assert_eq!(page.list.len(), 1);
        let entry = &page.list[0];
        assert_eq!(entry.fs_id, 1105230011);
        assert_eq!(entry.server_filename, "a.txt");
        assert_eq!(entry.size, 11);
        assert!(page.check().is_ok());
    }

    // --- Chunked upload ---

    #[test]
    fn fixture_precreate() {
        roundtrip_test::<PrecreateResponse>("precreate.json");
        let resp: PrecreateResponse = parse_fixture("precreate.json");
        assert!(resp.uploadid.starts_with("N1-"));
        assert_eq!(resp.block_list, vec![0, 1, 2]);
    }

    #[test]
    fn fixture_slice_upload() {
        roundtrip_test::<SliceUploadResponse>("slice_upload.json");
        let resp: SliceUploadResponse = parse_fixture("slice_upload.json");
        assert!(resp.check().is_ok());
    }

    #[test]
    fn fixture_create() {
        roundtrip_test::<CreateResponse>("create.json");
        let resp: CreateResponse = parse_fixture("create.json");
        assert_eq!(resp.size, 9 * 1024 * 1024);
        assert!(!resp.md5.is_empty());
    }

    // --- Single-shot upload ---

    #[test]
    fn fixture_small_upload() {
        roundtrip_test::<SmallUploadResponse>("small_upload.json");
    }

    #[test]
    fn fixture_small_upload_error() {
        let resp: SmallUploadResponse = parse_fixture("small_upload_error.json");
        let err = resp.check().unwrap_err();
        assert_eq!(err.errno, 31064);
        assert_eq!(err.message, "file is not authorized");
    }

    // --- Metadata ---

    #[test]
    fn fixture_filemetas() {
        roundtrip_test::<FileMetasResponse>("filemetas.json");
        let resp: FileMetasResponse = parse_fixture("filemetas.json");
        assert_eq!(resp.list[0].fs_id, 42);
        assert!(resp.list[0].dlink.starts_with("https://"));
    }
}
