//! Exercises every file share backend through the FileShareStorage trait

#[cfg(test)]
mod integration_tests {
    use crate::shares::config::{ShareBackend, ShareConfig};
    use crate::shares::FileShareStorage;
    use bytes::Bytes;
    use std::sync::Arc;

    fn stores(dir: &tempfile::TempDir) -> Vec<(&'static str, Arc<dyn FileShareStorage>)> {
        let local = ShareConfig {
            backend: ShareBackend::Local,
            base_path: dir.path().to_string_lossy().into_owned(),
        };
        let mock = ShareConfig {
            backend: ShareBackend::Mock,
            ..ShareConfig::default()
        };
        vec![
            ("local", local.create_store().unwrap()),
            ("mock", mock.create_store().unwrap()),
        ]
    }

    #[tokio::test]
    async fn test_file_share_contract() {
        let dir = tempfile::tempdir().unwrap();
        for (name, store) in stores(&dir) {
            assert!(store.create_share_if_not_exists("contracts").await.unwrap(), "{}", name);
            assert!(!store.create_share_if_not_exists("contracts").await.unwrap(), "{}", name);
            assert!(store.create_directory_if_not_exists("contracts", "payments").await.unwrap());
            assert!(!store.create_directory_if_not_exists("contracts", "payments").await.unwrap());
            assert!(store.directory_exists("contracts", "").await.unwrap(), "{}: root", name);

            let props = store
                .upload_file("contracts", "payments", "proof.pdf", Bytes::from_static(b"v1"))
                .await
                .unwrap();
            assert_eq!(props.name, "proof.pdf");
            store
                .upload_file("contracts", "payments", "proof.pdf", Bytes::from_static(b"v2"))
                .await
                .unwrap();
            assert_eq!(
                store.download_file("contracts", "payments", "proof.pdf").await.unwrap(),
                Bytes::from_static(b"v2"),
                "{}: overwrite",
                name
            );

            store
                .upload_file("contracts", "", "terms.txt", Bytes::from_static(b"root"))
                .await
                .unwrap();
            assert_eq!(
                store.download_file("contracts", "", "terms.txt").await.unwrap(),
                Bytes::from_static(b"root")
            );

            let missing = store
                .download_file("contracts", "payments", "absent.pdf")
                .await
                .unwrap_err();
            assert!(missing.is_not_found(), "{}", name);
            assert_eq!(store.list_directories("contracts").await.unwrap(), vec!["payments"]);
        }
    }

    #[tokio::test]
    async fn test_missing_share() {
        let dir = tempfile::tempdir().unwrap();
        for (name, store) in stores(&dir) {
            let err = store
                .create_directory_if_not_exists("nowhere", "payments")
                .await
                .unwrap_err();
            assert!(err.is_not_found(), "{}", name);
        }
    }
}
